use std::collections::HashMap;

use eframe::egui::{Vec2, vec2};

use crate::config::LayoutConfig;
use crate::network::{GraphNode, WalletGraph};
use crate::util::stable_pair;

use super::super::physics::{SimLink, SimNode, Simulation};
use super::super::render_utils::node_radius;
use super::super::{RenderGraph, ViewScratch};

const GOLDEN_ANGLE: f32 = 2.399_963;

/// Phyllotaxis spiral slot around the origin for nodes with no prior place.
fn spiral_position(index: usize) -> Vec2 {
    let radius = 10.0 * (0.5 + index as f32).sqrt();
    let angle = index as f32 * GOLDEN_ANGLE;
    vec2(angle.cos(), angle.sin()) * radius
}

fn jitter(id: &str) -> Vec2 {
    let (x, y) = stable_pair(id);
    vec2(x, y) * 12.0
}

fn body_for(node: &GraphNode, layout: &LayoutConfig) -> (f32, f32) {
    let radius = node_radius(
        node.balance,
        node.activity,
        node.is_root,
        node.protocol.is_some(),
        layout,
    );
    let charge = if node.is_root {
        layout.root_charge
    } else {
        layout.node_charge
    };
    (radius, charge)
}

impl RenderGraph {
    /// Lays out `graph`, keeping the positions of nodes that were already on
    /// screen in `previous`. New nodes start next to a placed neighbour when
    /// they have one.
    pub(in crate::app) fn new(
        graph: WalletGraph,
        previous: Option<&RenderGraph>,
        layout: &LayoutConfig,
    ) -> Self {
        let index_by_id = graph
            .nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (node.id.clone(), index))
            .collect::<HashMap<_, _>>();

        let edges = graph
            .edges
            .iter()
            .filter_map(|edge| {
                Some((
                    *index_by_id.get(&edge.source)?,
                    *index_by_id.get(&edge.target)?,
                ))
            })
            .collect::<Vec<_>>();

        let mut neighbors = vec![Vec::new(); graph.nodes.len()];
        for &(source, target) in &edges {
            neighbors[source].push(target);
            neighbors[target].push(source);
        }

        let carried = |id: &str| {
            let prior = previous?;
            let index = *prior.index_by_id.get(id)?;
            prior.simulation.nodes().get(index).map(|node| node.pos)
        };

        let mut positions: Vec<Option<Vec2>> =
            graph.nodes.iter().map(|node| carried(&node.id)).collect();
        let reused = positions.iter().filter(|position| position.is_some()).count();
        for index in 0..positions.len() {
            if positions[index].is_some() {
                continue;
            }
            let anchor = neighbors[index]
                .iter()
                .find_map(|&neighbor| positions[neighbor]);
            let id = graph.nodes[index].id.as_str();
            positions[index] = Some(match anchor {
                Some(anchor) => anchor + jitter(id),
                None => spiral_position(index) + jitter(id) * 0.1,
            });
        }

        let nodes = graph
            .nodes
            .iter()
            .zip(positions)
            .map(|(node, position)| {
                let (radius, charge) = body_for(node, layout);
                SimNode::new(position.unwrap_or_default(), radius, charge)
            })
            .collect::<Vec<_>>();

        let links = graph
            .edges
            .iter()
            .zip(&edges)
            .map(|(edge, &(source, target))| SimLink {
                source,
                target,
                transaction_count: edge.transaction_count,
            })
            .collect();

        let mut simulation = Simulation::new(nodes, links);
        if reused > 0 && reused == graph.nodes.len() {
            // Same node set as before: nudge instead of a full restart.
            simulation.reheat_to(0.3);
        }

        log::debug!(
            "render graph: {} nodes ({} placed before), {} edges",
            graph.nodes.len(),
            reused,
            edges.len()
        );

        Self {
            root_index: graph
                .root_id
                .as_ref()
                .and_then(|id| index_by_id.get(id).copied()),
            graph,
            simulation,
            edges,
            neighbors,
            index_by_id,
            layout_error: None,
            view_scratch: ViewScratch::default(),
        }
    }

    /// Re-derives radii and charges after a layout edit and warms the
    /// simulation back up.
    pub(in crate::app) fn apply_layout(&mut self, layout: &LayoutConfig) {
        for (body, node) in self.simulation.nodes_mut().iter_mut().zip(&self.graph.nodes) {
            (body.radius, body.charge) = body_for(node, layout);
        }
        self.simulation.reheat_to(0.5);
    }

    pub(in crate::app) fn node_index(&self, id: &str) -> Option<usize> {
        self.index_by_id.get(id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::Wallet;
    use crate::network::{AggregationStrategy, Connection, build_graph};

    fn connection(source: &str, target: &str) -> Connection {
        Connection {
            source: source.to_owned(),
            target: target.to_owned(),
            value: 1.0,
            transaction_count: 1,
            last_interaction_time: 0,
            protocol: None,
            strategy: AggregationStrategy::TokenTransfers,
        }
    }

    #[test]
    fn rebuild_keeps_known_positions() {
        let layout = LayoutConfig::default();
        let wallets = [Wallet::new("A")];
        let first = RenderGraph::new(
            build_graph(&wallets, &[connection("A", "B")]),
            None,
            &layout,
        );
        let a_before = first.simulation.position(0).expect("A placed");

        let second = RenderGraph::new(
            build_graph(&wallets, &[connection("A", "B"), connection("A", "C")]),
            Some(&first),
            &layout,
        );
        assert_eq!(second.simulation.position(0), Some(a_before));
        let c = second.node_index("C").expect("C exists");
        let c_pos = second.simulation.position(c).expect("C placed");
        assert!((c_pos - a_before).length() <= 12.0 * std::f32::consts::SQRT_2 + 1e-3);
        assert_eq!(second.edges, vec![(0, 1), (0, 2)]);
        assert_eq!(second.root_index, Some(0));
    }

    #[test]
    fn isolated_nodes_get_distinct_slots() {
        let layout = LayoutConfig::default();
        let wallets = [Wallet::new("A"), Wallet::new("B"), Wallet::new("C")];
        let render = RenderGraph::new(build_graph(&wallets, &[]), None, &layout);
        let positions = render
            .simulation
            .nodes()
            .iter()
            .map(|node| node.pos)
            .collect::<Vec<_>>();
        assert!(render.edges.is_empty());
        assert!((positions[0] - positions[1]).length() > 1.0);
        assert!((positions[1] - positions[2]).length() > 1.0);
    }
}
