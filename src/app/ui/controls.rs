use eframe::egui::{self, Key, Response, RichText, Ui};

use crate::chain::NodeType;

use super::super::render_utils::node_color;
use super::super::{AppRequest, ViewModel};

const SLIDER_KEY_BASE_RATE: f32 = 10.0;
const SLIDER_KEY_ACCEL_PER_SEC: f32 = 9.0;
const SLIDER_KEY_ACCEL_MAX: f32 = 40.0;

const LEGEND: [NodeType; 7] = [
    NodeType::Main,
    NodeType::Exchange,
    NodeType::Protocol,
    NodeType::Contract,
    NodeType::User,
    NodeType::HighActivity,
    NodeType::Unknown,
];

#[derive(Clone, Copy, Default)]
struct SliderKeyHoldState {
    positive_secs: f32,
    negative_secs: f32,
}

fn slider_key_accel_multiplier(hold_secs: f32) -> f32 {
    let ramp = hold_secs * SLIDER_KEY_ACCEL_PER_SEC;
    (1.0 + ramp + ramp * ramp * 0.15).min(SLIDER_KEY_ACCEL_MAX)
}

/// Holding an arrow key on a focused slider speeds up the longer it is held.
fn apply_slider_arrow_acceleration(
    ui: &Ui,
    response: &Response,
    value: &mut f32,
    min: f32,
    max: f32,
) -> bool {
    let state_id = response.id.with("arrow_key_hold_state");
    let mut hold_state = ui.ctx().data(|data| {
        data.get_temp::<SliderKeyHoldState>(state_id)
            .unwrap_or_default()
    });

    if !response.has_focus() {
        ui.ctx()
            .data_mut(|data| data.insert_temp(state_id, SliderKeyHoldState::default()));
        return false;
    }

    let (delta_time, increase_down, decrease_down) = ui.input(|input| {
        (
            input.stable_dt.min(0.1),
            input.key_down(Key::ArrowRight) || input.key_down(Key::ArrowUp),
            input.key_down(Key::ArrowLeft) || input.key_down(Key::ArrowDown),
        )
    });

    hold_state.positive_secs = if increase_down {
        hold_state.positive_secs + delta_time
    } else {
        0.0
    };
    hold_state.negative_secs = if decrease_down {
        hold_state.negative_secs + delta_time
    } else {
        0.0
    };
    ui.ctx()
        .data_mut(|data| data.insert_temp(state_id, hold_state));

    let direction = (increase_down as i8) - (decrease_down as i8);
    if direction == 0 {
        return false;
    }

    let hold_secs = if direction > 0 {
        hold_state.positive_secs
    } else {
        hold_state.negative_secs
    };
    let step = ((max - min) / 200.0).max(0.0005);
    let speed = SLIDER_KEY_BASE_RATE * slider_key_accel_multiplier(hold_secs);

    let old_value = *value;
    *value = (*value + direction as f32 * step * speed * delta_time).clamp(min, max);
    ui.ctx().request_repaint();
    (*value - old_value).abs() > f32::EPSILON
}

fn physics_slider(
    ui: &mut Ui,
    value: &mut f32,
    range: std::ops::RangeInclusive<f32>,
    text: &str,
    hint: &str,
) -> bool {
    let (min, max) = (*range.start(), *range.end());
    let slider = ui
        .add(
            egui::Slider::new(value, range)
                .text(text)
                .clamping(egui::SliderClamping::Always),
        )
        .on_hover_text(hint);
    if slider.hovered() {
        slider.request_focus();
    }
    let mut changed = slider.changed();
    changed |= apply_slider_arrow_acceleration(ui, &slider, value, min, max);
    changed
}

impl ViewModel {
    pub(in crate::app) fn draw_controls(&mut self, ui: &mut Ui, request: &mut Option<AppRequest>) {
        ui.heading("Graph Controls");
        ui.separator();
        ui.add_space(4.0);

        ui.label("Filter (label or address)")
            .on_hover_text("Fuzzy-highlight matching nodes without changing the graph.");
        ui.text_edit_singleline(&mut self.filter);

        ui.separator();
        self.draw_stats(ui, request);
        ui.separator();

        ui.checkbox(&mut self.live_physics, "Live physics simulation")
            .on_hover_text("Keep simulating layout forces while viewing the graph.");
        ui.horizontal_wrapped(|ui| {
            if let Some(render) = self.render.as_mut() {
                if ui.button("Reheat").clicked() {
                    render.simulation.reheat();
                }
                if ui.button("Stop").clicked() {
                    render.simulation.stop();
                }
            }
            if ui.button("Reset view").clicked() {
                self.reset_view();
            }
            if ui.button("Center on wallet").clicked() {
                self.center_on_root();
            }
            if ui
                .button("Reset layout")
                .on_hover_text("Place every node again from scratch.")
                .clicked()
            {
                self.rebuild_graph(false);
            }
        });

        let mut layout_changed = false;
        ui.collapsing("Physics tuning", |ui| {
            let layout = &mut self.layout;
            layout_changed |= physics_slider(
                ui,
                &mut layout.link_distance_scale,
                10.0..=300.0,
                "Link distance",
                "Spacing of lightly used links. Busy links stay shorter.",
            );
            layout_changed |= physics_slider(
                ui,
                &mut layout.link_distance_base,
                0.0..=120.0,
                "Minimum distance",
                "Distance even the busiest link keeps.",
            );
            layout_changed |= physics_slider(
                ui,
                &mut layout.node_charge,
                -600.0..=0.0,
                "Node repulsion",
                "How strongly nodes push each other apart.",
            );
            layout_changed |= physics_slider(
                ui,
                &mut layout.root_charge,
                -2000.0..=0.0,
                "Root repulsion",
                "Repulsion of the searched wallet.",
            );
            layout_changed |= physics_slider(
                ui,
                &mut layout.center_strength,
                0.0..=0.3,
                "Centering",
                "Pull toward the middle of the canvas.",
            );
            layout_changed |= physics_slider(
                ui,
                &mut layout.collision_strength,
                0.0..=1.0,
                "Collision",
                "How hard overlapping nodes are separated.",
            );
            layout_changed |= physics_slider(
                ui,
                &mut layout.collision_padding,
                0.0..=30.0,
                "Collision padding",
                "Gap kept between node edges.",
            );
            layout_changed |= physics_slider(
                ui,
                &mut layout.velocity_decay,
                0.05..=0.9,
                "Friction",
                "Fraction of velocity lost each step.",
            );
        });
        if layout_changed {
            self.apply_layout_changes();
        }

        ui.separator();
        ui.label(RichText::new("Legend").strong());
        for node_type in LEGEND {
            ui.horizontal(|ui| {
                let (rect, _) =
                    ui.allocate_exact_size(egui::vec2(12.0, 12.0), egui::Sense::hover());
                ui.painter()
                    .circle_filled(rect.center(), 5.5, node_color(node_type));
                ui.label(node_type.label());
            });
        }
        ui.small("Yellow ring: searched wallet. Inner ring: known protocol.");
    }

    fn draw_stats(&mut self, ui: &mut Ui, request: &mut Option<AppRequest>) {
        let (nodes, edges) = self
            .render
            .as_ref()
            .map(|render| (render.graph.node_count(), render.graph.edges.len()))
            .unwrap_or_default();
        ui.label(format!("Nodes: {nodes}"));
        ui.label(format!("Connections: {edges}"));
        if let Some(render) = self.render.as_ref() {
            ui.small(format!("Layout temperature: {:.3}", render.simulation.alpha()));
        }
        ui.label(format!(
            "Transactions: {}",
            self.session.transactions().len()
        ));
        if let Some(strategy) = self
            .session
            .connections()
            .as_slice()
            .first()
            .map(|connection| connection.strategy)
        {
            ui.small(format!("Links from {}", strategy.label()));
        }

        ui.add_space(4.0);
        ui.horizontal(|ui| {
            let refresh = ui
                .add_enabled(!self.refreshing, egui::Button::new("Refresh"))
                .on_hover_text("Fetch the latest transactions and merge them in.");
            if refresh.clicked() {
                *request = Some(AppRequest::Refresh);
            }
            if self.refreshing {
                ui.spinner();
            }
        });
        if let Some(error) = &self.refresh_error {
            ui.colored_label(ui.visuals().error_fg_color, format!("Refresh failed: {error}"));
        } else if let Some(added) = self.last_refresh_added {
            ui.small(match added {
                0 => "No new transactions".to_owned(),
                1 => "+1 new transaction".to_owned(),
                added => format!("+{added} new transactions"),
            });
        }
    }
}
