use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Runtime configuration. Every section falls back to its defaults, so a
/// config file only needs the keys it overrides.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub graph: GraphConfig,
    pub layout: LayoutConfig,
    pub source: SourceConfig,
}

/// Heuristics used while aggregating connections and classifying nodes.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Balance (SOL) above which an untyped wallet is drawn as an exchange.
    pub exchange_balance_threshold: f64,
    /// Balance (SOL) above which an untyped wallet is drawn as a user.
    pub user_balance_threshold: f64,
    /// A wallet touching more distinct connections than this is high-activity.
    pub high_activity_connections: usize,
    /// Share of a wallet's transactions one protocol must appear in before
    /// the wallet is tagged with it.
    pub protocol_dominance_ratio: f64,
    /// Targets linked from `accounts[0]` in the co-occurrence fallback.
    pub max_account_targets: usize,
    /// Connect pseudo-addresses cut from the signature when a transaction
    /// lists fewer than two accounts. Display-only; off by default.
    pub signature_fallback: bool,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            exchange_balance_threshold: 1_000.0,
            user_balance_threshold: 10.0,
            high_activity_connections: 3,
            protocol_dominance_ratio: 0.3,
            max_account_targets: 4,
            signature_fallback: false,
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub link_distance_scale: f32,
    pub link_distance_base: f32,
    pub link_strength: f32,
    pub root_charge: f32,
    pub node_charge: f32,
    pub charge_softening: f32,
    pub barnes_hut_theta: f32,
    pub center_strength: f32,
    pub collision_strength: f32,
    pub collision_padding: f32,
    pub velocity_decay: f32,
    pub max_speed: f32,
    pub alpha_decay: f32,
    pub alpha_min: f32,
    pub alpha_drag_target: f32,
    pub radius_base: f32,
    pub radius_balance_divisor: f32,
    pub radius_activity_scale: f32,
    pub radius_activity_max: f32,
    pub radius_root_bonus: f32,
    pub radius_protocol_bonus: f32,
    pub radius_max: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            link_distance_scale: 100.0,
            link_distance_base: 50.0,
            link_strength: 1.0,
            root_charge: -500.0,
            node_charge: -200.0,
            charge_softening: 1.0,
            barnes_hut_theta: 0.72,
            center_strength: 0.03,
            collision_strength: 0.7,
            collision_padding: 2.0,
            velocity_decay: 0.4,
            max_speed: 40.0,
            alpha_decay: 0.0228,
            alpha_min: 0.001,
            alpha_drag_target: 0.3,
            radius_base: 5.0,
            radius_balance_divisor: 10.0,
            radius_activity_scale: 2.2,
            radius_activity_max: 14.0,
            radius_root_bonus: 8.0,
            radius_protocol_bonus: 4.0,
            radius_max: 64.0,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub transaction_limit: usize,
    pub max_wallet_lookups: usize,
    pub cache_ttl_secs: u64,
    pub cache_capacity: usize,
}

impl SourceConfig {
    pub const MAX_TRANSACTION_LIMIT: usize = 100;

    pub fn clamped_limit(&self) -> usize {
        self.transaction_limit.clamp(1, Self::MAX_TRANSACTION_LIMIT)
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            transaction_limit: 50,
            max_wallet_lookups: 24,
            cache_ttl_secs: 300,
            cache_capacity: 256,
        }
    }
}

pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };

    if !path.exists() {
        log::warn!(
            "config file {} not found, using default values",
            path.display()
        );
        return Ok(Config::default());
    }

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let config = toml::from_str::<Config>(&contents)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;
    log::info!("loaded config from {}", path.display());
    Ok(config)
}
