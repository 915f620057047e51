use eframe::egui::{Vec2, vec2};

use super::quadtree::QuadNode;
use super::SimLink;

/// Unit vector from `to` towards `from`. Coincident bodies get a direction
/// derived from their indices so the pair still separates symmetrically.
fn separation(from: usize, to: usize, delta: Vec2, distance: f32) -> Vec2 {
    if distance > 1e-4 {
        return delta / distance;
    }
    let (low, high) = (from.min(to), from.max(to));
    let angle = (low as f32 * 0.618_034 + high as f32 * 0.414_214) * std::f32::consts::TAU;
    let direction = vec2(angle.cos(), angle.sin());
    if from < to { direction } else { -direction }
}

#[derive(Clone, Copy)]
pub(super) struct ChargeParams {
    pub(super) alpha: f32,
    pub(super) theta: f32,
    pub(super) softening: f32,
}

/// Velocity change on body `index` from every charged body in `cell`.
/// Negative charges repel.
pub(super) fn accumulate_charge(
    cell: &QuadNode,
    index: usize,
    positions: &[Vec2],
    charges: &[f32],
    params: ChargeParams,
    delta_v: &mut Vec2,
) {
    if cell.count == 0 || cell.charge == 0.0 {
        return;
    }
    let point = positions[index];

    if cell.is_leaf() {
        for &other in cell.indices.iter().filter(|&&other| other != index) {
            let delta = point - positions[other];
            let distance_sq = delta.length_sq();
            let direction = separation(index, other, delta, distance_sq.sqrt());
            let distance_sq = distance_sq.max(params.softening);
            *delta_v -= direction * (charges[other] * params.alpha / distance_sq.sqrt());
        }
        return;
    }

    let delta = point - cell.center;
    let distance_sq = delta.length_sq().max(params.softening);
    let distance = distance_sq.sqrt();
    if !cell.bounds.contains(point) && cell.bounds.side() / distance < params.theta {
        *delta_v -= (delta / distance) * (cell.charge * params.alpha / distance);
        return;
    }

    for child in cell.children() {
        accumulate_charge(child, index, positions, charges, params, delta_v);
    }
}

#[derive(Clone, Copy)]
pub(super) struct CollisionParams {
    pub(super) strength: f32,
    pub(super) padding: f32,
    pub(super) reach_sq: f32,
}

/// Per-body inputs to collision resolution.
#[derive(Clone, Copy)]
pub(super) struct Bodies<'a> {
    pub(super) positions: &'a [Vec2],
    pub(super) radii: &'a [f32],
    pub(super) pinned: &'a [bool],
}

fn resolve_overlap(
    from: usize,
    to: usize,
    bodies: Bodies<'_>,
    params: CollisionParams,
    deltas: &mut [Vec2],
) {
    let Bodies {
        positions,
        radii,
        pinned,
    } = bodies;
    let delta = positions[from] - positions[to];
    let distance = delta.length();
    let min_distance = radii[from] + radii[to] + params.padding * 2.0;
    if distance >= min_distance {
        return;
    }

    let push = separation(from, to, delta, distance) * (min_distance - distance) * params.strength;
    // Pinned bodies are obstacles: the free side takes the whole push.
    let (from_share, to_share) = match (pinned[from], pinned[to]) {
        (true, true) => (0.0, 0.0),
        (true, false) => (0.0, 1.0),
        (false, true) => (1.0, 0.0),
        (false, false) => {
            let from_sq = radii[from] * radii[from];
            let to_sq = radii[to] * radii[to];
            let total = (from_sq + to_sq).max(f32::EPSILON);
            (to_sq / total, from_sq / total)
        }
    };
    deltas[from] += push * from_share;
    deltas[to] -= push * to_share;
}

/// Pairwise overlap resolution over two quadtree cells, pruning cell pairs
/// that are further apart than any two bodies could touch.
pub(super) fn accumulate_collisions(
    cell_a: &QuadNode,
    cell_b: &QuadNode,
    same_cell: bool,
    bodies: Bodies<'_>,
    params: CollisionParams,
    deltas: &mut [Vec2],
) {
    if cell_a.bounds.gap_sq(cell_b.bounds) > params.reach_sq {
        return;
    }

    if cell_a.is_leaf() && cell_b.is_leaf() {
        for (position, &from) in cell_a.indices.iter().enumerate() {
            let partners = if same_cell {
                &cell_a.indices[position + 1..]
            } else {
                &cell_b.indices[..]
            };
            for &to in partners {
                resolve_overlap(from, to, bodies, params, deltas);
            }
        }
        return;
    }

    if same_cell {
        let children = cell_a.children().collect::<Vec<_>>();
        for (position, &child) in children.iter().enumerate() {
            accumulate_collisions(child, child, true, bodies, params, deltas);
            for &other in &children[position + 1..] {
                accumulate_collisions(child, other, false, bodies, params, deltas);
            }
        }
        return;
    }

    let split_a = !cell_a.is_leaf()
        && (cell_b.is_leaf() || cell_a.bounds.half_extent >= cell_b.bounds.half_extent);
    if split_a {
        for child in cell_a.children() {
            accumulate_collisions(child, cell_b, false, bodies, params, deltas);
        }
    } else {
        for child in cell_b.children() {
            accumulate_collisions(cell_a, child, false, bodies, params, deltas);
        }
    }
}

/// Preferred link length: more shared transactions pull the pair closer.
pub(super) fn link_distance(transaction_count: u64, scale: f32, base: f32) -> f32 {
    scale / ((transaction_count as f32).sqrt() + 1.0) + base
}

#[derive(Clone, Copy)]
pub(super) struct LinkParams {
    pub(super) alpha: f32,
    pub(super) strength: f32,
    pub(super) distance_scale: f32,
    pub(super) distance_base: f32,
}

/// Spring force along each link, split by degree so hubs move less.
pub(super) fn accumulate_links(
    links: &[SimLink],
    positions: &[Vec2],
    velocities: &[Vec2],
    degrees: &[u32],
    params: LinkParams,
    deltas: &mut [Vec2],
) {
    let node_count = positions.len();
    for link in links {
        let (source, target) = (link.source, link.target);
        if source == target || source >= node_count || target >= node_count {
            continue;
        }

        let delta = (positions[target] + velocities[target]) - (positions[source] + velocities[source]);
        let distance = delta.length().max(1e-3);
        let preferred =
            link_distance(link.transaction_count, params.distance_scale, params.distance_base);
        let strength = params.strength / degrees[source].min(degrees[target]).max(1) as f32;
        let correction = delta * ((distance - preferred) / distance * params.alpha * strength);

        let source_degree = degrees[source] as f32;
        let target_degree = degrees[target] as f32;
        let bias = source_degree / (source_degree + target_degree).max(1.0);
        deltas[target] -= correction * bias;
        deltas[source] += correction * (1.0 - bias);
    }
}
