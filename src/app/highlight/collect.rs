use std::collections::HashSet;

use super::super::RenderGraph;

/// Marks `index`, every edge touching it and the nodes at the other ends.
pub(super) fn collect_touching(
    cache: &RenderGraph,
    index: usize,
    nodes: &mut HashSet<usize>,
    edges: &mut HashSet<usize>,
) {
    if index >= cache.neighbors.len() {
        return;
    }
    nodes.insert(index);
    for (edge_index, &(source, target)) in cache.edges.iter().enumerate() {
        if source == index || target == index {
            edges.insert(edge_index);
            nodes.insert(source);
            nodes.insert(target);
        }
    }
}

/// Marks the nodes of `path` and one edge per consecutive pair, whichever
/// direction it was recorded in.
pub(super) fn collect_path(
    cache: &RenderGraph,
    path: &[String],
    nodes: &mut HashSet<usize>,
    edges: &mut HashSet<usize>,
) {
    let indices = path
        .iter()
        .filter_map(|id| cache.node_index(id))
        .collect::<Vec<_>>();
    nodes.extend(indices.iter().copied());

    for pair in indices.windows(2) {
        let [from, to] = pair else {
            continue;
        };
        if let Some(edge_index) = cache.edges.iter().position(|&(source, target)| {
            (source == *from && target == *to) || (source == *to && target == *from)
        }) {
            edges.insert(edge_index);
        }
    }
}
