use eframe::egui::{self, Pos2, Rect, Ui};

use crate::chain::is_valid_address;
use crate::network::GraphNode;

use super::super::ViewModel;
use super::super::render_utils::screen_to_world;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) enum InteractionState {
    #[default]
    Idle,
    Hovering(String),
    Selected(String),
    Exploring(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum InteractionEvent {
    HoverNode(String),
    HoverNone,
    ClickNode(String),
    ClickBackground,
    Close,
    Explore(String),
    /// The host refused the explore request (bad address).
    ExploreRejected,
    DataArrived,
}

/// What the host has to do in response to an event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum InteractionCommand {
    Select(String),
    Deselect,
    Explore(String),
}

/// Pointer-driven selection state. It never fetches anything itself: an
/// explore request is handed back to the host as a command.
#[derive(Debug, Default)]
pub(crate) struct InteractionController {
    state: InteractionState,
    hovered: Option<String>,
}

impl InteractionController {
    pub(crate) fn state(&self) -> &InteractionState {
        &self.state
    }

    pub(crate) fn hovered(&self) -> Option<&str> {
        self.hovered.as_deref()
    }

    pub(crate) fn selected(&self) -> Option<&str> {
        match &self.state {
            InteractionState::Selected(id) => Some(id),
            _ => None,
        }
    }

    pub(crate) fn is_exploring(&self) -> bool {
        matches!(self.state, InteractionState::Exploring(_))
    }

    /// Node whose neighbourhood is highlighted: hover wins over selection.
    pub(crate) fn focus(&self) -> Option<&str> {
        self.hovered().or_else(|| self.selected())
    }

    pub(crate) fn handle(&mut self, event: InteractionEvent) -> Option<InteractionCommand> {
        use InteractionState::{Exploring, Hovering, Idle, Selected};

        match event {
            InteractionEvent::HoverNode(id) => {
                if matches!(self.state, Idle | Hovering(_)) {
                    self.state = Hovering(id.clone());
                }
                self.hovered = Some(id);
                None
            }
            InteractionEvent::HoverNone => {
                self.hovered = None;
                if matches!(self.state, Hovering(_)) {
                    self.state = Idle;
                }
                None
            }
            InteractionEvent::ClickNode(id) => {
                if self.is_exploring() {
                    return None;
                }
                self.state = Selected(id.clone());
                Some(InteractionCommand::Select(id))
            }
            InteractionEvent::ClickBackground | InteractionEvent::Close => match self.state {
                Selected(_) => {
                    self.state = Idle;
                    Some(InteractionCommand::Deselect)
                }
                Hovering(_) => {
                    self.state = Idle;
                    None
                }
                Idle | Exploring(_) => None,
            },
            InteractionEvent::Explore(id) => {
                if self.is_exploring() {
                    return None;
                }
                self.hovered = None;
                self.state = Exploring(id.clone());
                Some(InteractionCommand::Explore(id))
            }
            InteractionEvent::ExploreRejected => {
                if self.is_exploring() {
                    self.state = Idle;
                }
                None
            }
            InteractionEvent::DataArrived => {
                self.hovered = None;
                self.state = Idle;
                None
            }
        }
    }
}

/// Whether `node` can become the root of a new search.
pub(crate) fn can_explore(node: &GraphNode) -> bool {
    !node.is_root && is_valid_address(&node.id)
}

/// Closest node whose disc contains `pointer`.
pub(crate) fn hit_test_node(
    pointer: Pos2,
    candidates: &[usize],
    screen_positions: &[Pos2],
    screen_radii: &[f32],
) -> Option<usize> {
    candidates
        .iter()
        .filter_map(|&index| {
            let distance = screen_positions.get(index)?.distance(pointer);
            (distance <= *screen_radii.get(index)?).then_some((index, distance))
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(index, _)| index)
}

pub(crate) fn distance_to_segment(point: Pos2, start: Pos2, end: Pos2) -> f32 {
    let segment = end - start;
    let length_sq = segment.length_sq();
    if length_sq <= f32::EPSILON {
        return point.distance(start);
    }
    let t = ((point - start).dot(segment) / length_sq).clamp(0.0, 1.0);
    point.distance(start + segment * t)
}

/// Closest edge within `tolerance` screen pixels of `pointer`.
pub(crate) fn hit_test_edge(
    pointer: Pos2,
    edges: &[(usize, usize)],
    screen_positions: &[Pos2],
    tolerance: f32,
) -> Option<usize> {
    edges
        .iter()
        .enumerate()
        .filter_map(|(index, &(source, target))| {
            let start = *screen_positions.get(source)?;
            let end = *screen_positions.get(target)?;
            let distance = distance_to_segment(pointer, start, end);
            (distance <= tolerance).then_some((index, distance))
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(index, _)| index)
}

impl ViewModel {
    pub(in crate::app) fn handle_graph_zoom(
        &mut self,
        ui: &Ui,
        rect: Rect,
        response: &egui::Response,
    ) {
        if !response.hovered() {
            return;
        }

        let scroll = ui.input(|input| input.raw_scroll_delta.y);
        if scroll.abs() <= f32::EPSILON {
            return;
        }

        let pointer = ui
            .input(|input| input.pointer.hover_pos())
            .unwrap_or_else(|| rect.center());
        let anchor = screen_to_world(rect, self.pan, self.zoom, pointer);

        let factor = (1.0 + scroll * 0.0015).clamp(0.8, 1.25);
        self.zoom = (self.zoom * factor).clamp(0.1, 5.0);
        self.pan = pointer - rect.center() - anchor * self.zoom;
    }

    /// Background drags and secondary/middle drags move the viewport.
    pub(in crate::app) fn handle_graph_pan(&mut self, response: &egui::Response) {
        let background_drag =
            self.dragging.is_none() && response.dragged_by(egui::PointerButton::Primary);
        if background_drag
            || response.dragged_by(egui::PointerButton::Secondary)
            || response.dragged_by(egui::PointerButton::Middle)
        {
            self.pan += response.drag_delta();
        }
    }

    /// Pans so the searched wallet sits in the middle, keeping the zoom.
    pub(in crate::app) fn center_on_root(&mut self) {
        let root = self.render.as_ref().and_then(|render| {
            render
                .root_index
                .and_then(|index| render.simulation.position(index))
        });
        if let Some(position) = root {
            self.pan = -position * self.zoom;
        }
    }

    pub(in crate::app) fn reset_view(&mut self) {
        self.pan = egui::Vec2::ZERO;
        self.zoom = 1.0;
    }
}

#[cfg(test)]
mod tests {
    use eframe::egui::pos2;

    use super::*;

    #[test]
    fn hover_and_leave() {
        let mut controller = InteractionController::default();
        controller.handle(InteractionEvent::HoverNode("A".to_owned()));
        assert_eq!(controller.state(), &InteractionState::Hovering("A".to_owned()));
        assert_eq!(controller.focus(), Some("A"));

        controller.handle(InteractionEvent::HoverNone);
        assert_eq!(controller.state(), &InteractionState::Idle);
        assert_eq!(controller.focus(), None);
    }

    #[test]
    fn hover_does_not_replace_selection() {
        let mut controller = InteractionController::default();
        let command = controller.handle(InteractionEvent::ClickNode("A".to_owned()));
        assert_eq!(command, Some(InteractionCommand::Select("A".to_owned())));

        controller.handle(InteractionEvent::HoverNode("B".to_owned()));
        assert_eq!(controller.selected(), Some("A"));
        assert_eq!(controller.focus(), Some("B"));

        controller.handle(InteractionEvent::HoverNone);
        assert_eq!(controller.focus(), Some("A"));

        let command = controller.handle(InteractionEvent::Close);
        assert_eq!(command, Some(InteractionCommand::Deselect));
        assert_eq!(controller.state(), &InteractionState::Idle);
    }

    #[test]
    fn explore_clears_selection_until_data_arrives() {
        let mut controller = InteractionController::default();
        controller.handle(InteractionEvent::ClickNode("A".to_owned()));

        let command = controller.handle(InteractionEvent::Explore("A".to_owned()));
        assert_eq!(command, Some(InteractionCommand::Explore("A".to_owned())));
        assert_eq!(controller.selected(), None);
        assert!(controller.is_exploring());

        assert_eq!(controller.handle(InteractionEvent::ClickNode("B".to_owned())), None);
        assert_eq!(controller.handle(InteractionEvent::Explore("B".to_owned())), None);

        controller.handle(InteractionEvent::DataArrived);
        assert_eq!(controller.state(), &InteractionState::Idle);
    }

    #[test]
    fn rejected_explore_returns_to_idle() {
        let mut controller = InteractionController::default();
        controller.handle(InteractionEvent::Explore("5h6xBEau".to_owned()));
        assert!(controller.is_exploring());

        controller.handle(InteractionEvent::ExploreRejected);
        assert_eq!(controller.state(), &InteractionState::Idle);

        let command = controller.handle(InteractionEvent::ClickNode("B".to_owned()));
        assert_eq!(command, Some(InteractionCommand::Select("B".to_owned())));

        controller.handle(InteractionEvent::ExploreRejected);
        assert_eq!(controller.selected(), Some("B"));
    }

    #[test]
    fn only_real_non_root_addresses_are_explorable() {
        let node = |id: &str, is_root: bool| GraphNode {
            id: id.to_owned(),
            label: id.to_owned(),
            node_type: crate::chain::NodeType::Unknown,
            category: None,
            balance: 0.0,
            activity: 0,
            connection_count: 0,
            is_root,
            protocol: None,
            synthesized: true,
        };
        let address = "JUP6LkbZbjS1jKKwapdHNy74zcZ3tLUZoi5QNyVTaV4";

        assert!(can_explore(&node(address, false)));
        assert!(!can_explore(&node(address, true)));
        assert!(!can_explore(&node("5h6xBEau", false)));
    }

    #[test]
    fn background_click_from_idle_is_a_no_op() {
        let mut controller = InteractionController::default();
        assert_eq!(controller.handle(InteractionEvent::ClickBackground), None);
        assert_eq!(controller.state(), &InteractionState::Idle);
    }

    #[test]
    fn node_hit_test_prefers_closest_center() {
        let positions = [pos2(0.0, 0.0), pos2(8.0, 0.0), pos2(100.0, 100.0)];
        let radii = [10.0, 10.0, 5.0];
        let candidates = [0, 1, 2];
        assert_eq!(hit_test_node(pos2(6.0, 0.0), &candidates, &positions, &radii), Some(1));
        assert_eq!(hit_test_node(pos2(50.0, 50.0), &candidates, &positions, &radii), None);
        assert_eq!(hit_test_node(pos2(6.0, 0.0), &[0], &positions, &radii), Some(0));
    }

    #[test]
    fn edge_hit_test_uses_segment_distance() {
        let positions = [pos2(0.0, 0.0), pos2(100.0, 0.0), pos2(0.0, 100.0)];
        let edges = [(0, 1), (0, 2)];
        assert_eq!(hit_test_edge(pos2(50.0, 3.0), &edges, &positions, 4.0), Some(0));
        assert_eq!(hit_test_edge(pos2(2.0, 60.0), &edges, &positions, 4.0), Some(1));
        assert_eq!(hit_test_edge(pos2(150.0, 0.0), &edges, &positions, 4.0), None);
        assert!((distance_to_segment(pos2(-3.0, 4.0), pos2(0.0, 0.0), pos2(10.0, 0.0)) - 5.0).abs() < 1e-5);
    }
}
