use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use eframe::egui::{
    self, Align2, Color32, CursorIcon, FontId, PointerButton, Pos2, Rect, Sense, Stroke, Ui, vec2,
};
use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;

use crate::util::{format_amount, format_sol, format_timestamp};

use super::super::highlight::build_highlight_state;
use super::super::physics::LayoutError;
use super::super::render_utils::{
    PATH_COLOR, ROOT_RING, SELECTION_RING, blend_color, category_color, circle_visible, dim_color,
    draw_background, edge_visible, node_color, screen_to_world, world_to_screen,
};
use super::super::{AppRequest, FilterCache, RenderGraph, ViewModel};
use super::{
    InteractionCommand, InteractionEvent, InteractionState, can_explore, hit_test_edge,
    hit_test_node,
};

const EDGE_HIT_TOLERANCE: f32 = 5.0;

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_owned())
}

fn draw_tooltip(painter: &egui::Painter, rect: Rect, anchor: Pos2, text: String) {
    let galley = painter.layout_no_wrap(text, FontId::proportional(12.5), Color32::from_gray(235));
    let size = galley.size() + vec2(16.0, 12.0);
    let mut origin = anchor + vec2(14.0, 14.0);
    if origin.x + size.x > rect.right() {
        origin.x = anchor.x - size.x - 14.0;
    }
    if origin.y + size.y > rect.bottom() {
        origin.y = anchor.y - size.y - 14.0;
    }
    let frame = Rect::from_min_size(origin, size);
    painter.rect_filled(frame, 4.0, Color32::from_rgba_unmultiplied(15, 23, 42, 235));
    painter.rect_stroke(
        frame,
        4.0,
        Stroke::new(1.0, Color32::from_gray(70)),
        egui::StrokeKind::Inside,
    );
    painter.galley(origin + vec2(8.0, 6.0), galley, Color32::from_gray(235));
}

impl RenderGraph {
    fn update_screen_space(&mut self, rect: Rect, pan: egui::Vec2, zoom: f32) {
        let scratch = &mut self.view_scratch;
        scratch.screen_positions.clear();
        scratch.screen_radii.clear();
        for node in self.simulation.nodes() {
            scratch
                .screen_positions
                .push(world_to_screen(rect, pan, zoom, node.pos));
            scratch
                .screen_radii
                .push((node.radius * zoom.powf(0.6)).clamp(2.5, 60.0));
        }

        scratch.visible_indices.clear();
        for index in 0..scratch.screen_positions.len() {
            if circle_visible(rect, scratch.screen_positions[index], scratch.screen_radii[index]) {
                scratch.visible_indices.push(index);
            }
        }
    }

    /// One guarded simulation step. Errors and panics are recorded and stop
    /// the layout instead of unwinding into the host.
    fn advance_layout(&mut self, layout: &crate::config::LayoutConfig) -> bool {
        if self.layout_error.is_some() {
            return false;
        }

        let simulation = &mut self.simulation;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| simulation.tick(layout)))
            .unwrap_or_else(|payload| Err(LayoutError::Panicked(panic_message(payload.as_ref()))));

        match outcome {
            Ok(moving) => moving,
            Err(error) => {
                log::error!("layout failed: {error}");
                self.simulation.stop();
                self.layout_error = Some(error.to_string());
                false
            }
        }
    }

    fn node_tooltip(&self, index: usize) -> Option<String> {
        let node = self.graph.nodes.get(index)?;
        let mut lines = vec![
            node.label.clone(),
            format!("Type: {}", node.node_type.label()),
            format!("Balance: {}", format_sol(node.balance)),
            format!("Activity: {} transactions", node.activity),
            format!("Connections: {}", node.connection_count),
        ];
        if let Some(protocol) = &node.protocol {
            lines.push(format!("Protocol: {} ({})", protocol.name, protocol.category.label()));
        }
        if node.synthesized {
            lines.push("No wallet data, seen only in transactions".to_owned());
        }
        Some(lines.join("\n"))
    }

    fn edge_tooltip(&self, index: usize) -> Option<String> {
        let edge = self.graph.edges.get(index)?;
        let label = |id: &str| {
            self.graph
                .node(id)
                .map(|node| node.label.clone())
                .unwrap_or_else(|| id.to_owned())
        };
        let mut lines = vec![
            format!("{} → {}", label(&edge.source), label(&edge.target)),
            format!("Transactions: {}", edge.transaction_count),
        ];
        if !edge.strategy.is_count_only() {
            lines.push(format!("Value: {}", format_amount(edge.value)));
        }
        lines.push(format!("Last seen: {}", format_timestamp(edge.last_interaction_time)));
        lines.push(format!("From {}", edge.strategy.label()));
        Some(lines.join("\n"))
    }
}

impl ViewModel {
    fn filter_matches(&mut self) -> Option<Arc<HashSet<usize>>> {
        let query = self.filter.trim();
        if query.is_empty() {
            return None;
        }

        if let Some(cached) = &self.filter_cache
            && cached.render_revision == self.render_revision
            && cached.query == query
        {
            return Some(Arc::clone(&cached.matches));
        }

        let render = self.render.as_ref()?;
        let matcher = SkimMatcherV2::default().ignore_case();
        let matches = render
            .graph
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| {
                matcher.fuzzy_match(&node.label, query).is_some()
                    || matcher.fuzzy_match(&node.id, query).is_some()
            })
            .map(|(index, _)| index)
            .collect::<HashSet<_>>();
        let matches = Arc::new(matches);

        self.filter_cache = Some(FilterCache {
            query: query.to_owned(),
            render_revision: self.render_revision,
            matches: Arc::clone(&matches),
        });
        Some(matches)
    }

    fn draw_layout_error(ui: &mut Ui, message: &str) -> bool {
        let mut reset = false;
        ui.vertical_centered(|ui| {
            ui.add_space(120.0);
            ui.heading("Error rendering visualization");
            ui.add_space(6.0);
            ui.label(message);
            ui.add_space(10.0);
            reset = ui.button("Reset layout").clicked();
        });
        reset
    }

    pub(in crate::app) fn draw_graph(&mut self, ui: &mut Ui, request: &mut Option<AppRequest>) {
        let Some(render) = self.render.as_ref() else {
            ui.vertical_centered(|ui| {
                ui.add_space(120.0);
                ui.heading("No activity found for this address");
            });
            return;
        };
        if let Some(message) = render.layout_error.clone() {
            if Self::draw_layout_error(ui, &message) {
                self.rebuild_graph(false);
            }
            return;
        }

        let (rect, response) = ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());
        let painter = ui.painter_at(rect);
        draw_background(&painter, rect, self.pan, self.zoom);

        self.handle_graph_zoom(ui, rect, &response);
        let matches = self.filter_matches();
        let layout = self.layout;
        let live_physics = self.live_physics;
        let (pan, zoom) = (self.pan, self.zoom);

        let Some(render) = self.render.as_mut() else {
            return;
        };

        // Drag hit tests use positions from before this step.
        render.update_screen_space(rect, pan, zoom);
        let pointer = ui.input(|input| input.pointer.hover_pos());
        let hovered_node = pointer.and_then(|pointer| {
            hit_test_node(
                pointer,
                &render.view_scratch.visible_indices,
                &render.view_scratch.screen_positions,
                &render.view_scratch.screen_radii,
            )
        });

        if response.drag_started_by(PointerButton::Primary)
            && let Some(index) = hovered_node
            && let Some(press) = response.interact_pointer_pos()
        {
            render
                .simulation
                .drag_start(index, screen_to_world(rect, pan, zoom, press), &layout);
            self.dragging = Some(index);
        }
        if let Some(index) = self.dragging {
            if response.dragged_by(PointerButton::Primary)
                && let Some(position) = response.interact_pointer_pos()
            {
                render
                    .simulation
                    .drag_to(index, screen_to_world(rect, pan, zoom, position));
            }
            if response.drag_stopped() {
                render.simulation.drag_end(index);
                self.dragging = None;
            }
        }

        let moving = if live_physics || self.dragging.is_some() {
            render.advance_layout(&layout)
        } else {
            false
        };
        if render.layout_error.is_some() {
            ui.ctx().request_repaint();
            return;
        }
        if moving || self.dragging.is_some() {
            ui.ctx().request_repaint();
        }

        render.update_screen_space(rect, pan, zoom);
        let hovered_node = self.dragging.or_else(|| {
            pointer.and_then(|pointer| {
                hit_test_node(
                    pointer,
                    &render.view_scratch.visible_indices,
                    &render.view_scratch.screen_positions,
                    &render.view_scratch.screen_radii,
                )
            })
        });
        let hovered_edge = match (hovered_node, pointer) {
            (None, Some(pointer)) if response.hovered() => hit_test_edge(
                pointer,
                &render.edges,
                &render.view_scratch.screen_positions,
                EDGE_HIT_TOLERANCE,
            ),
            _ => None,
        };

        let hover_event = match hovered_node.and_then(|index| render.graph.nodes.get(index)) {
            Some(node) if response.hovered() || self.dragging.is_some() => {
                InteractionEvent::HoverNode(node.id.clone())
            }
            _ => InteractionEvent::HoverNone,
        };
        self.controller.handle(hover_event);
        match self.controller.state() {
            InteractionState::Exploring(_) => ui.ctx().set_cursor_icon(CursorIcon::Progress),
            _ if self.dragging.is_some() => ui.ctx().set_cursor_icon(CursorIcon::Grabbing),
            _ if hovered_node.is_some() => ui.ctx().set_cursor_icon(CursorIcon::PointingHand),
            _ => {}
        }

        let mut command = None;
        if response.double_clicked_by(PointerButton::Primary)
            && let Some(node) = hovered_node.and_then(|index| render.graph.nodes.get(index))
            && can_explore(node)
        {
            command = self
                .controller
                .handle(InteractionEvent::Explore(node.id.clone()));
        } else if response.clicked_by(PointerButton::Primary) {
            let event = match hovered_node.and_then(|index| render.graph.nodes.get(index)) {
                Some(node) => InteractionEvent::ClickNode(node.id.clone()),
                None => InteractionEvent::ClickBackground,
            };
            command = self.controller.handle(event);
        }
        if let Some(InteractionCommand::Explore(address)) = command {
            *request = Some(AppRequest::Explore(address));
        }

        let highlight =
            build_highlight_state(render, self.controller.focus(), self.controller.selected());
        let filter_active = matches.as_ref().is_some_and(|matches| !matches.is_empty());
        let zoom_sqrt = zoom.sqrt();

        let positions = &render.view_scratch.screen_positions;
        for (index, (&(source, target), edge)) in
            render.edges.iter().zip(&render.graph.edges).enumerate()
        {
            let (start, end) = (positions[source], positions[target]);
            if !edge_visible(rect, start, end, 4.0) {
                continue;
            }

            let on_path = highlight
                .as_ref()
                .is_some_and(|state| state.path_edges.contains(&index));
            let focused = highlight
                .as_ref()
                .is_some_and(|state| state.focus_edges.contains(&index))
                || hovered_edge == Some(index);
            let base = category_color(edge.category);

            let (width, color) = if on_path {
                ((edge.thickness + 1.5) * zoom_sqrt, PATH_COLOR)
            } else if focused {
                (
                    (edge.thickness + 0.8) * zoom_sqrt,
                    blend_color(base, Color32::WHITE, 0.35),
                )
            } else if highlight.is_some() || filter_active {
                (edge.thickness * 0.6 * zoom_sqrt, dim_color(base, 0.25))
            } else {
                (edge.thickness * zoom_sqrt, dim_color(base, 0.75))
            };
            painter.line_segment([start, end], Stroke::new(width.clamp(0.5, 9.0), color));

            let direction = end - start;
            let length = direction.length();
            if (on_path || focused) && length > 24.0 {
                let unit = direction / length;
                let tip = end - unit * (render.view_scratch.screen_radii[target] + 2.0);
                let normal = vec2(-unit.y, unit.x) * 4.0;
                painter.add(egui::Shape::convex_polygon(
                    vec![tip, tip - unit * 9.0 + normal, tip - unit * 9.0 - normal],
                    color,
                    Stroke::NONE,
                ));
            }
        }

        let mut draw_order = render.view_scratch.visible_indices.clone();
        draw_order.sort_by(|a, b| {
            render.view_scratch.screen_radii[*a].total_cmp(&render.view_scratch.screen_radii[*b])
        });
        for index in draw_order {
            let node = &render.graph.nodes[index];
            let position = render.view_scratch.screen_positions[index];
            let radius = render.view_scratch.screen_radii[index];

            let is_hovered = hovered_node == Some(index);
            let is_selected = self.controller.selected() == Some(node.id.as_str());
            let on_path = highlight
                .as_ref()
                .is_some_and(|state| state.path_nodes.contains(&index));
            let focused = highlight
                .as_ref()
                .is_some_and(|state| state.focus_nodes.contains(&index));
            let is_match = matches.as_ref().is_some_and(|matches| matches.contains(&index));

            let base = node_color(node.node_type);
            let color = if is_hovered || is_selected || focused || on_path {
                base
            } else if is_match {
                blend_color(base, Color32::WHITE, 0.3)
            } else if highlight.is_some() || filter_active {
                dim_color(base, 0.35)
            } else {
                base
            };

            painter.circle_filled(position, radius, color);
            if node.synthesized {
                painter.circle_stroke(
                    position,
                    radius,
                    Stroke::new(1.0, Color32::from_rgba_unmultiplied(15, 15, 15, 200)),
                );
            }
            if node.is_root {
                painter.circle_stroke(position, radius + 3.0, Stroke::new(2.0, ROOT_RING));
            }
            if is_selected {
                painter.circle_stroke(position, radius + 6.0, Stroke::new(1.6, SELECTION_RING));
            }
            if node.protocol.is_some() {
                painter.circle_stroke(
                    position,
                    radius * 0.55,
                    Stroke::new(1.2, Color32::from_rgba_unmultiplied(255, 255, 255, 150)),
                );
            }

            let show_label =
                is_hovered || is_selected || node.is_root || is_match || on_path || zoom > 1.4;
            if show_label {
                painter.text(
                    position + vec2(radius + 5.0, 0.0),
                    Align2::LEFT_CENTER,
                    &node.label,
                    FontId::proportional(12.0),
                    Color32::from_gray(230),
                );
            }
        }

        if render.edges.is_empty() {
            painter.text(
                rect.center_top() + vec2(0.0, 18.0),
                Align2::CENTER_TOP,
                "No connections found",
                FontId::proportional(15.0),
                Color32::from_gray(200),
            );
        }

        if let Some(pointer) = pointer.filter(|_| response.hovered()) {
            let tooltip = match (hovered_node, hovered_edge) {
                (Some(index), _) => render.node_tooltip(index),
                (None, Some(index)) => render.edge_tooltip(index),
                (None, None) => None,
            };
            if let Some(text) = tooltip {
                draw_tooltip(&painter, rect, pointer, text);
            }
        }

        self.handle_graph_pan(&response);
    }
}
