use eframe::egui::{Color32, Painter, Pos2, Rect, Stroke, Vec2};

use crate::chain::{NodeType, ProtocolCategory};
use crate::config::LayoutConfig;

pub(super) const CANVAS_BACKGROUND: Color32 = Color32::from_rgb(16, 19, 27);
pub(super) const ROOT_RING: Color32 = Color32::from_rgb(250, 204, 21);
pub(super) const SELECTION_RING: Color32 = Color32::from_rgb(255, 255, 255);
pub(super) const PATH_COLOR: Color32 = Color32::from_rgb(250, 204, 21);
pub(super) const EDGE_DEFAULT: Color32 = Color32::from_rgb(100, 116, 139);

pub(super) fn blend_color(base: Color32, overlay: Color32, amount: f32) -> Color32 {
    let amount = amount.clamp(0.0, 1.0);
    let mix = |from: u8, to: u8| (from as f32 + (to as f32 - from as f32) * amount) as u8;
    Color32::from_rgba_unmultiplied(
        mix(base.r(), overlay.r()),
        mix(base.g(), overlay.g()),
        mix(base.b(), overlay.b()),
        mix(base.a(), overlay.a()),
    )
}

pub(super) fn dim_color(color: Color32, factor: f32) -> Color32 {
    let factor = factor.clamp(0.0, 1.0);
    Color32::from_rgba_unmultiplied(
        (color.r() as f32 * factor) as u8,
        (color.g() as f32 * factor) as u8,
        (color.b() as f32 * factor) as u8,
        (color.a() as f32 * (0.3 + factor * 0.7)) as u8,
    )
}

pub(super) fn node_color(node_type: NodeType) -> Color32 {
    match node_type {
        NodeType::Main => Color32::from_rgb(250, 204, 21),
        NodeType::Exchange => Color32::from_rgb(56, 189, 248),
        NodeType::Protocol => Color32::from_rgb(167, 139, 250),
        NodeType::User => Color32::from_rgb(74, 222, 128),
        NodeType::Contract => Color32::from_rgb(251, 146, 60),
        NodeType::HighActivity => Color32::from_rgb(244, 114, 182),
        NodeType::Unknown => Color32::from_rgb(148, 163, 184),
    }
}

pub(super) fn category_color(category: Option<ProtocolCategory>) -> Color32 {
    match category {
        Some(ProtocolCategory::Dex) => Color32::from_rgb(34, 211, 238),
        Some(ProtocolCategory::Aggregator) => Color32::from_rgb(45, 212, 191),
        Some(ProtocolCategory::Lending) => Color32::from_rgb(192, 132, 252),
        Some(ProtocolCategory::Staking) => Color32::from_rgb(129, 140, 248),
        Some(ProtocolCategory::NftMarketplace) => Color32::from_rgb(251, 113, 133),
        Some(ProtocolCategory::Infrastructure) => Color32::from_rgb(203, 213, 225),
        Some(ProtocolCategory::Other) => Color32::from_rgb(253, 186, 116),
        None => EDGE_DEFAULT,
    }
}

/// Collision and drawing radius in world units. Grows with balance and
/// activity, then gets flat bonuses for the root and protocol nodes.
pub(crate) fn node_radius(
    balance: f64,
    activity: u64,
    is_root: bool,
    has_protocol: bool,
    config: &LayoutConfig,
) -> f32 {
    let balance = if balance.is_finite() { balance.max(0.0) } else { 0.0 };
    let divisor = config.radius_balance_divisor.max(f32::EPSILON);
    let activity_bonus = ((activity as f32).ln_1p() * config.radius_activity_scale)
        .min(config.radius_activity_max);

    let mut radius = (balance.sqrt() as f32) / divisor + config.radius_base + activity_bonus;
    if is_root {
        radius += config.radius_root_bonus;
    }
    if has_protocol {
        radius += config.radius_protocol_bonus;
    }
    radius.min(config.radius_max)
}

pub(super) fn draw_background(painter: &Painter, rect: Rect, pan: Vec2, zoom: f32) {
    painter.rect_filled(rect, 0.0, CANVAS_BACKGROUND);

    let step = (64.0 * zoom.clamp(0.5, 2.0)).max(24.0);
    let origin = rect.center() + pan;
    let stroke = Stroke::new(1.0, Color32::from_rgba_unmultiplied(51, 65, 85, 60));

    let mut x = rect.left() + (origin.x - rect.left()).rem_euclid(step);
    while x < rect.right() {
        painter.line_segment([Pos2::new(x, rect.top()), Pos2::new(x, rect.bottom())], stroke);
        x += step;
    }
    let mut y = rect.top() + (origin.y - rect.top()).rem_euclid(step);
    while y < rect.bottom() {
        painter.line_segment([Pos2::new(rect.left(), y), Pos2::new(rect.right(), y)], stroke);
        y += step;
    }
}

pub(super) fn circle_visible(rect: Rect, position: Pos2, radius: f32) -> bool {
    rect.expand(radius).contains(position)
}

/// Cheap bounding-box rejection for edges entirely off screen.
pub(super) fn edge_visible(rect: Rect, start: Pos2, end: Pos2, padding: f32) -> bool {
    Rect::from_two_pos(start, end)
        .expand(padding)
        .intersects(rect)
}

pub(super) fn world_to_screen(rect: Rect, pan: Vec2, zoom: f32, world: Vec2) -> Pos2 {
    rect.center() + pan + world * zoom
}

pub(super) fn screen_to_world(rect: Rect, pan: Vec2, zoom: f32, screen: Pos2) -> Vec2 {
    (screen - rect.center() - pan) / zoom
}

#[cfg(test)]
mod tests {
    use eframe::egui::vec2;

    use super::*;

    #[test]
    fn radius_never_shrinks_with_balance() {
        let config = LayoutConfig::default();
        let mut previous = 0.0;
        for balance in [0.0, 0.5, 1.0, 10.0, 250.0, 4_000.0, 1.0e6, 1.0e9] {
            let radius = node_radius(balance, 12, false, false, &config);
            assert!(radius >= previous, "radius dropped at balance {balance}");
            previous = radius;
        }
    }

    #[test]
    fn radius_grows_with_activity_and_bonuses() {
        let config = LayoutConfig::default();
        let quiet = node_radius(5.0, 0, false, false, &config);
        let busy = node_radius(5.0, 500, false, false, &config);
        assert!(busy > quiet);
        assert!(node_radius(5.0, 0, true, false, &config) > quiet);
        assert!(node_radius(5.0, 0, false, true, &config) > quiet);
        assert!(node_radius(f64::NAN, 0, false, false, &config).is_finite());
    }

    #[test]
    fn screen_and_world_round_trip() {
        let rect = Rect::from_min_size(Pos2::ZERO, vec2(800.0, 600.0));
        let pan = vec2(30.0, -12.0);
        let world = vec2(-120.0, 45.0);
        let screen = world_to_screen(rect, pan, 1.7, world);
        let back = screen_to_world(rect, pan, 1.7, screen);
        assert!((back - world).length() < 1e-3);
    }
}
