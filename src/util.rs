use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};

/// `ABCD…WXYZ` form of an address; short inputs are returned unchanged.
pub fn short_address(address: &str) -> String {
    let chars = address.chars().collect::<Vec<_>>();
    if chars.len() <= 10 {
        return address.to_owned();
    }
    let head = chars[..4].iter().collect::<String>();
    let tail = chars[chars.len() - 4..].iter().collect::<String>();
    format!("{head}…{tail}")
}

pub fn format_sol(balance: f64) -> String {
    format!("{} SOL", format_amount(balance))
}

pub fn format_amount(amount: f64) -> String {
    if !amount.is_finite() {
        return "-".to_owned();
    }
    let magnitude = amount.abs();
    if magnitude >= 1_000_000_000.0 {
        format!("{:.2}B", amount / 1_000_000_000.0)
    } else if magnitude >= 1_000_000.0 {
        format!("{:.2}M", amount / 1_000_000.0)
    } else if magnitude >= 10_000.0 {
        format!("{:.1}K", amount / 1_000.0)
    } else if magnitude >= 1.0 || magnitude == 0.0 {
        format!("{amount:.2}")
    } else {
        format!("{amount:.4}")
    }
}

pub fn format_timestamp(seconds: i64) -> String {
    if seconds <= 0 {
        return "unknown".to_owned();
    }
    DateTime::<Utc>::from_timestamp(seconds, 0)
        .map(|time| time.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| "unknown".to_owned())
}

/// Deterministic pseudo-random pair in `[-1, 1]` derived from `id`.
pub fn stable_pair(id: &str) -> (f32, f32) {
    let mut hasher = DefaultHasher::new();
    id.hash(&mut hasher);
    let hash = hasher.finish();

    let x = ((hash & 0xffff_ffff) as f64 / u32::MAX as f64) as f32;
    let y = ((hash >> 32) as f64 / u32::MAX as f64) as f32;
    (x * 2.0 - 1.0, y * 2.0 - 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shortens_long_addresses_only() {
        assert_eq!(
            short_address("9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin"),
            "9xQe…VFin"
        );
        assert_eq!(short_address("A"), "A");
    }

    #[test]
    fn amounts_scale_with_magnitude() {
        assert_eq!(format_amount(0.0), "0.00");
        assert_eq!(format_amount(12.5), "12.50");
        assert_eq!(format_amount(0.01234), "0.0123");
        assert_eq!(format_amount(25_000.0), "25.0K");
        assert_eq!(format_amount(3_400_000.0), "3.40M");
        assert_eq!(format_sol(1.0), "1.00 SOL");
    }

    #[test]
    fn timestamps_render_in_utc() {
        assert_eq!(format_timestamp(0), "unknown");
        assert_eq!(format_timestamp(1_700_000_000), "2023-11-14 22:13 UTC");
    }

    #[test]
    fn stable_pair_is_deterministic_and_bounded() {
        let (x, y) = stable_pair("wallet");
        assert_eq!((x, y), stable_pair("wallet"));
        assert!((-1.0..=1.0).contains(&x) && (-1.0..=1.0).contains(&y));
    }
}
