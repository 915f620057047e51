mod app;
mod chain;
mod config;
mod network;
mod util;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, anyhow};
use clap::Parser;

use chain::{CachedSource, ChainSource, SnapshotSource};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// JSON snapshot of wallet and transaction responses to explore.
    #[arg(long)]
    snapshot: PathBuf,

    /// Wallet to load on startup.
    #[arg(long)]
    address: Option<String>,

    /// TOML file overriding classification, layout and source settings.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Where recent searches are remembered between runs.
    #[arg(long)]
    history_file: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = config::load_config(args.config.as_deref())?;
    let snapshot = SnapshotSource::open(&args.snapshot)
        .with_context(|| format!("could not load snapshot {}", args.snapshot.display()))?;
    let source: Arc<dyn ChainSource> = Arc::new(CachedSource::new(
        snapshot,
        Duration::from_secs(config.source.cache_ttl_secs),
        config.source.cache_capacity,
    ));
    log::info!("loaded snapshot {}", args.snapshot.display());

    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default().with_inner_size([1440.0, 920.0]),
        ..Default::default()
    };

    eframe::run_native(
        "wallet-graph",
        options,
        Box::new(move |cc| {
            Ok(Box::new(app::WalletGraphApp::new(
                cc,
                config,
                source,
                args.history_file,
                args.address,
            )))
        }),
    )
    .map_err(|error| anyhow!("window closed with an error: {error}"))
}
