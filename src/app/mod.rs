use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

use eframe::egui::{self, Context, Pos2, Vec2};

use crate::chain::{ChainSource, ProtocolRegistry, SourceError, is_valid_address};
use crate::config::{Config, GraphConfig, LayoutConfig};
use crate::network::WalletGraph;

mod graph;
mod highlight;
mod history;
mod physics;
mod render_utils;
mod session;
mod ui;

use graph::{InteractionController, InteractionEvent};
use history::SearchHistory;
use physics::Simulation;
use session::{FetchMode, PipelineMessage, PipelineRequest, RequestTracker, Session, spawn_fetch};

pub struct WalletGraphApp {
    config: Config,
    registry: Arc<ProtocolRegistry>,
    source: Arc<dyn ChainSource>,
    history: SearchHistory,
    history_path: Option<PathBuf>,
    tracker: RequestTracker,
    tx: Sender<PipelineMessage>,
    rx: Receiver<PipelineMessage>,
    state: AppState,
    search_input: String,
    address_error: Option<String>,
}

enum AppState {
    Empty,
    Loading { address: String },
    Ready(Box<ViewModel>),
    Error { address: String, message: String },
}

/// Requests the graph view hands back to the app.
pub(crate) enum AppRequest {
    Explore(String),
    Refresh,
}

struct ViewModel {
    session: Session,
    graph_config: GraphConfig,
    registry: Arc<ProtocolRegistry>,
    layout: LayoutConfig,
    render: Option<RenderGraph>,
    controller: InteractionController,
    pan: Vec2,
    zoom: f32,
    live_physics: bool,
    filter: String,
    filter_cache: Option<FilterCache>,
    render_revision: u64,
    dragging: Option<usize>,
    refreshing: bool,
    refresh_error: Option<String>,
    last_refresh_added: Option<usize>,
}

struct FilterCache {
    query: String,
    render_revision: u64,
    matches: Arc<HashSet<usize>>,
}

struct RenderGraph {
    graph: WalletGraph,
    simulation: Simulation,
    /// Node index pairs, parallel to `graph.edges`.
    edges: Vec<(usize, usize)>,
    neighbors: Vec<Vec<usize>>,
    index_by_id: HashMap<String, usize>,
    root_index: Option<usize>,
    layout_error: Option<String>,
    view_scratch: ViewScratch,
}

#[derive(Default)]
struct ViewScratch {
    screen_positions: Vec<Pos2>,
    screen_radii: Vec<f32>,
    visible_indices: Vec<usize>,
}

struct HighlightState {
    focus_nodes: HashSet<usize>,
    focus_edges: HashSet<usize>,
    path_nodes: HashSet<usize>,
    path_edges: HashSet<usize>,
}

impl WalletGraphApp {
    pub fn new(
        _cc: &eframe::CreationContext<'_>,
        config: Config,
        source: Arc<dyn ChainSource>,
        history_path: Option<PathBuf>,
        initial_address: Option<String>,
    ) -> Self {
        let history = match history_path.as_deref() {
            Some(path) => SearchHistory::load(path).unwrap_or_else(|error| {
                log::warn!("ignoring search history: {error:#}");
                SearchHistory::default()
            }),
            None => SearchHistory::default(),
        };

        let (tx, rx) = mpsc::channel();
        let mut app = Self {
            config,
            registry: Arc::new(ProtocolRegistry::builtin()),
            source,
            history,
            history_path,
            tracker: RequestTracker::default(),
            tx,
            rx,
            state: AppState::Empty,
            search_input: String::new(),
            address_error: None,
        };

        if let Some(address) = initial_address {
            app.search_input = address.clone();
            app.submit_search(&address);
        }
        app
    }

    /// Validates `input` and, when it is an address, starts a fresh fetch.
    /// Returns whether a fetch was started.
    fn submit_search(&mut self, input: &str) -> bool {
        let address = input.trim();
        if !is_valid_address(address) {
            self.address_error = Some("Not a valid Solana address".to_owned());
            return false;
        }
        self.address_error = None;
        self.start_fetch(address, FetchMode::Fresh);
        true
    }

    fn start_fetch(&mut self, address: &str, mode: FetchMode) {
        let generation = self.tracker.start(address);
        log::info!("fetching {address} ({mode:?}, generation {generation})");

        if mode == FetchMode::Fresh {
            self.record_history(address);
            self.state = AppState::Loading {
                address: address.to_owned(),
            };
        }

        spawn_fetch(
            Arc::clone(&self.source),
            PipelineRequest {
                address: address.to_owned(),
                generation,
                mode,
                limit: self.config.source.clamped_limit(),
                max_wallet_lookups: self.config.source.max_wallet_lookups,
            },
            self.tx.clone(),
        );
    }

    fn clear(&mut self) {
        self.tracker.cancel();
        self.state = AppState::Empty;
    }

    fn record_history(&mut self, address: &str) {
        self.history.record(address);
        self.persist_history();
    }

    fn persist_history(&self) {
        if let Some(path) = &self.history_path
            && let Err(error) = self.history.save(path)
        {
            log::warn!("could not save search history: {error:#}");
        }
    }

    fn poll_results(&mut self) {
        loop {
            let message = match self.rx.try_recv() {
                Ok(message) => message,
                Err(TryRecvError::Empty) => return,
                Err(TryRecvError::Disconnected) => {
                    let address = self.tracker.active().unwrap_or_default().to_owned();
                    self.state = AppState::Error {
                        address,
                        message: SourceError::Disconnected.to_string(),
                    };
                    return;
                }
            };

            if !self.tracker.accept(&message) {
                log::debug!(
                    "dropping stale result for {} (generation {})",
                    message.address,
                    message.generation
                );
                continue;
            }
            self.commit(message);
        }
    }

    fn commit(&mut self, message: PipelineMessage) {
        let PipelineMessage {
            address,
            mode,
            outcome,
            ..
        } = message;

        if mode == FetchMode::Refresh
            && let AppState::Ready(model) = &mut self.state
        {
            match outcome {
                Ok(batch) => model.apply_refresh(batch),
                Err(error) => {
                    log::warn!("refresh of {address} failed: {error}");
                    model.refreshing = false;
                    model.refresh_error = Some(error.to_string());
                }
            }
            return;
        }

        self.state = match outcome {
            Ok(batch) => {
                let mut model = ViewModel::new(
                    Session::new(&address),
                    self.config.graph.clone(),
                    Arc::clone(&self.registry),
                    self.config.layout,
                );
                model.apply_refresh(batch);
                model.last_refresh_added = None;
                AppState::Ready(Box::new(model))
            }
            Err(error) => {
                log::warn!("fetch of {address} failed: {error}");
                AppState::Error {
                    address,
                    message: error.to_string(),
                }
            }
        };
    }
}

impl eframe::App for WalletGraphApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        self.poll_results();
        self.draw_search_bar(ctx);

        let mut request = None;
        let mut retry = None;
        match &mut self.state {
            AppState::Empty => {
                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.vertical_centered(|ui| {
                        ui.add_space(120.0);
                        ui.heading("Search a wallet address to map its connections");
                    });
                });
            }
            AppState::Loading { address } => {
                ctx.request_repaint();
                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.vertical_centered(|ui| {
                        ui.add_space(120.0);
                        ui.heading(format!("Loading {address}..."));
                        ui.add_space(8.0);
                        ui.spinner();
                    });
                });
            }
            AppState::Error { address, message } => {
                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.heading("Failed to load wallet data");
                    ui.add_space(6.0);
                    ui.label(message.as_str());
                    ui.add_space(10.0);
                    if !address.is_empty() && ui.button("Retry").clicked() {
                        retry = Some(address.clone());
                    }
                });
            }
            AppState::Ready(model) => {
                model.show(ctx, &mut request);
                if model.refreshing {
                    ctx.request_repaint();
                }
            }
        }

        if let Some(address) = retry {
            self.start_fetch(&address, FetchMode::Fresh);
        }

        match request {
            Some(AppRequest::Explore(address)) => {
                self.search_input = address.clone();
                if !self.submit_search(&address)
                    && let AppState::Ready(model) = &mut self.state
                {
                    log::warn!("cannot explore {address}: not a wallet address");
                    model.controller.handle(InteractionEvent::ExploreRejected);
                }
            }
            Some(AppRequest::Refresh) => {
                if let AppState::Ready(model) = &mut self.state {
                    model.refreshing = true;
                    model.refresh_error = None;
                    let address = model.session.address().to_owned();
                    self.start_fetch(&address, FetchMode::Refresh);
                }
            }
            None => {}
        }
    }
}
