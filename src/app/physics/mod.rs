mod forces;
mod quadtree;

use eframe::egui::Vec2;
use thiserror::Error;

use crate::config::LayoutConfig;
use forces::{
    Bodies, ChargeParams, CollisionParams, LinkParams, accumulate_charge, accumulate_collisions,
    accumulate_links,
};
use quadtree::QuadNode;

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("node {index} left the finite plane")]
    NonFinite { index: usize },

    #[error("layout step panicked: {0}")]
    Panicked(String),
}

#[derive(Clone, Debug)]
pub struct SimNode {
    pub pos: Vec2,
    pub vel: Vec2,
    /// Set while the node is dragged; the node stays exactly here.
    pub pinned: Option<Vec2>,
    pub radius: f32,
    pub charge: f32,
}

impl SimNode {
    pub fn new(pos: Vec2, radius: f32, charge: f32) -> Self {
        Self {
            pos,
            vel: Vec2::ZERO,
            pinned: None,
            radius,
            charge,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct SimLink {
    pub source: usize,
    pub target: usize,
    pub transaction_count: u64,
}

#[derive(Default)]
pub struct LayoutScratch {
    positions: Vec<Vec2>,
    velocities: Vec<Vec2>,
    charges: Vec<f32>,
    radii: Vec<f32>,
    pinned: Vec<bool>,
    degrees: Vec<u32>,
    deltas: Vec<Vec2>,
}

/// Advances every free node by one step at the given `alpha`.
///
/// Pinned nodes keep their pinned coordinates and zero velocity, while still
/// repelling and blocking the nodes around them.
pub fn step_layout(
    nodes: &mut [SimNode],
    links: &[SimLink],
    alpha: f32,
    config: &LayoutConfig,
    scratch: &mut LayoutScratch,
) -> Result<(), LayoutError> {
    let node_count = nodes.len();
    if node_count == 0 {
        return Ok(());
    }

    scratch.positions.clear();
    scratch.velocities.clear();
    scratch.charges.clear();
    scratch.radii.clear();
    scratch.pinned.clear();
    let mut max_radius = 0.0_f32;
    for node in nodes.iter() {
        scratch.positions.push(node.pinned.unwrap_or(node.pos));
        scratch.velocities.push(node.vel);
        scratch.charges.push(node.charge);
        scratch.radii.push(node.radius);
        scratch.pinned.push(node.pinned.is_some());
        max_radius = max_radius.max(node.radius);
    }
    scratch.deltas.clear();
    scratch.deltas.resize(node_count, Vec2::ZERO);

    scratch.degrees.clear();
    scratch.degrees.resize(node_count, 0);
    for link in links {
        if link.source < node_count && link.target < node_count && link.source != link.target {
            scratch.degrees[link.source] += 1;
            scratch.degrees[link.target] += 1;
        }
    }

    accumulate_links(
        links,
        &scratch.positions,
        &scratch.velocities,
        &scratch.degrees,
        LinkParams {
            alpha,
            strength: config.link_strength,
            distance_scale: config.link_distance_scale,
            distance_base: config.link_distance_base,
        },
        &mut scratch.deltas,
    );

    if let Some(tree) = QuadNode::build(&scratch.positions, &scratch.charges) {
        let charge = ChargeParams {
            alpha,
            theta: config.barnes_hut_theta,
            softening: config.charge_softening.max(1e-3),
        };
        for (index, delta) in scratch.deltas.iter_mut().enumerate() {
            accumulate_charge(&tree, index, &scratch.positions, &scratch.charges, charge, delta);
        }

        let reach = (max_radius + config.collision_padding) * 2.0;
        accumulate_collisions(
            &tree,
            &tree,
            true,
            Bodies {
                positions: &scratch.positions,
                radii: &scratch.radii,
                pinned: &scratch.pinned,
            },
            CollisionParams {
                strength: config.collision_strength,
                padding: config.collision_padding,
                reach_sq: reach * reach,
            },
            &mut scratch.deltas,
        );
    }

    let retain = 1.0 - config.velocity_decay.clamp(0.0, 1.0);
    let max_speed_sq = config.max_speed * config.max_speed;
    for (index, node) in nodes.iter_mut().enumerate() {
        if let Some(pinned) = node.pinned {
            node.pos = pinned;
            node.vel = Vec2::ZERO;
            continue;
        }

        let mut velocity = node.vel + scratch.deltas[index];
        velocity -= node.pos * (config.center_strength * alpha);
        velocity *= retain;
        let speed_sq = velocity.length_sq();
        if speed_sq > max_speed_sq {
            velocity *= config.max_speed / speed_sq.sqrt();
        }

        node.vel = velocity;
        node.pos += velocity;
        if !node.pos.is_finite() || !node.vel.is_finite() {
            return Err(LayoutError::NonFinite { index });
        }
    }

    Ok(())
}

/// Cooling force simulation over a fixed node and link set.
pub struct Simulation {
    nodes: Vec<SimNode>,
    links: Vec<SimLink>,
    alpha: f32,
    alpha_target: f32,
    scratch: LayoutScratch,
}

impl Simulation {
    pub fn new(nodes: Vec<SimNode>, links: Vec<SimLink>) -> Self {
        Self {
            nodes,
            links,
            alpha: 1.0,
            alpha_target: 0.0,
            scratch: LayoutScratch::default(),
        }
    }

    pub fn nodes(&self) -> &[SimNode] {
        &self.nodes
    }

    /// For radius and charge edits.
    pub fn nodes_mut(&mut self) -> &mut [SimNode] {
        &mut self.nodes
    }

    pub fn position(&self, index: usize) -> Option<Vec2> {
        self.nodes.get(index).map(|node| node.pos)
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn is_running(&self, config: &LayoutConfig) -> bool {
        !self.nodes.is_empty() && self.alpha >= config.alpha_min
    }

    /// Runs one step if the simulation is still warm. Returns whether it ran.
    pub fn tick(&mut self, config: &LayoutConfig) -> Result<bool, LayoutError> {
        if !self.is_running(config) {
            return Ok(false);
        }
        self.alpha += (self.alpha_target - self.alpha) * config.alpha_decay;
        step_layout(&mut self.nodes, &self.links, self.alpha, config, &mut self.scratch)?;
        Ok(true)
    }

    pub fn drag_start(&mut self, index: usize, pos: Vec2, config: &LayoutConfig) {
        self.alpha_target = config.alpha_drag_target;
        if self.alpha < config.alpha_min {
            self.alpha = config.alpha_min;
        }
        self.pin(index, pos);
    }

    pub fn drag_to(&mut self, index: usize, pos: Vec2) {
        self.pin(index, pos);
    }

    pub fn drag_end(&mut self, index: usize) {
        self.alpha_target = 0.0;
        if let Some(node) = self.nodes.get_mut(index) {
            node.pinned = None;
        }
    }

    fn pin(&mut self, index: usize, pos: Vec2) {
        if let Some(node) = self.nodes.get_mut(index) {
            node.pinned = Some(pos);
            node.pos = pos;
            node.vel = Vec2::ZERO;
        }
    }

    pub fn reheat(&mut self) {
        self.reheat_to(1.0);
    }

    pub fn reheat_to(&mut self, alpha: f32) {
        self.alpha = alpha.clamp(0.0, 1.0);
    }

    pub fn stop(&mut self) {
        self.alpha = 0.0;
        self.alpha_target = 0.0;
    }
}
