use std::collections::HashSet;

mod collect;

use self::collect::{collect_path, collect_touching};
use super::{HighlightState, RenderGraph};

/// Highlight for the hovered (or selected) node plus, when something is
/// selected, its path back to the root.
pub(super) fn build_highlight_state(
    cache: &RenderGraph,
    focus: Option<&str>,
    selected: Option<&str>,
) -> Option<HighlightState> {
    let focus_index = focus.and_then(|id| cache.node_index(id));
    let selected_id = selected.filter(|id| cache.node_index(id).is_some());
    if focus_index.is_none() && selected_id.is_none() {
        return None;
    }

    let mut state = HighlightState {
        focus_nodes: HashSet::new(),
        focus_edges: HashSet::new(),
        path_nodes: HashSet::new(),
        path_edges: HashSet::new(),
    };

    if let Some(index) = focus_index {
        collect_touching(cache, index, &mut state.focus_nodes, &mut state.focus_edges);
    }

    if let Some(path) = selected_id.and_then(|id| cache.graph.path_from_root(id)) {
        collect_path(cache, &path, &mut state.path_nodes, &mut state.path_edges);
    }

    Some(state)
}
