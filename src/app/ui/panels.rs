use std::sync::Arc;

use eframe::egui::{self, Context, Vec2};

use crate::chain::ProtocolRegistry;
use crate::config::{GraphConfig, LayoutConfig};
use crate::network::ConnectionAggregator;

use super::super::graph::{InteractionController, InteractionEvent};
use super::super::session::{PipelineBatch, Session};
use super::super::{AppRequest, RenderGraph, ViewModel};

impl ViewModel {
    pub(in crate::app) fn new(
        session: Session,
        graph_config: GraphConfig,
        registry: Arc<ProtocolRegistry>,
        layout: LayoutConfig,
    ) -> Self {
        Self {
            session,
            graph_config,
            registry,
            layout,
            render: None,
            controller: InteractionController::default(),
            pan: Vec2::ZERO,
            zoom: 1.0,
            live_physics: true,
            filter: String::new(),
            filter_cache: None,
            render_revision: 0,
            dragging: None,
            refreshing: false,
            refresh_error: None,
            last_refresh_added: None,
        }
    }

    /// Merges a fetched batch into the session and redraws the graph around
    /// the nodes already on screen.
    pub(in crate::app) fn apply_refresh(&mut self, batch: PipelineBatch) {
        let aggregator = ConnectionAggregator::new(&self.registry, &self.graph_config);
        let added = self.session.apply(batch, &aggregator);
        log::info!(
            "{}: {added} new transactions, {} connections",
            self.session.address(),
            self.session.connections().len()
        );

        self.last_refresh_added = Some(added);
        self.refreshing = false;
        self.refresh_error = None;
        self.controller.handle(InteractionEvent::DataArrived);
        self.rebuild_graph(true);
    }

    /// Rebuilds the node set and the simulation. With `keep_positions` the
    /// nodes that survive keep their place.
    pub(in crate::app) fn rebuild_graph(&mut self, keep_positions: bool) {
        let graph = self.session.graph(&self.graph_config, &self.registry);
        let previous = self.render.take().filter(|_| keep_positions);

        self.render = if graph.is_empty() {
            None
        } else {
            Some(RenderGraph::new(graph, previous.as_ref(), &self.layout))
        };
        self.render_revision = self.render_revision.wrapping_add(1);
        self.filter_cache = None;
        self.dragging = None;
    }

    /// Pushes edited charges into the running simulation and wakes it up.
    pub(in crate::app) fn apply_layout_changes(&mut self) {
        let layout = self.layout;
        if let Some(render) = self.render.as_mut() {
            render.apply_layout(&layout);
        }
    }

    pub(in crate::app) fn show(&mut self, ctx: &Context, request: &mut Option<AppRequest>) {
        egui::SidePanel::left("controls")
            .resizable(true)
            .default_width(300.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical()
                    .id_salt("controls_scroll")
                    .show(ui, |ui| self.draw_controls(ui, request));
            });

        egui::SidePanel::right("details")
            .resizable(true)
            .default_width(340.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical()
                    .id_salt("details_scroll")
                    .show(ui, |ui| self.draw_details(ui, request));
            });

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| self.draw_graph(ui, request));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{TransactionRecord, Wallet};

    fn transfer(signature: &str, from: &str, to: &str) -> TransactionRecord {
        TransactionRecord {
            signature: signature.to_owned(),
            timestamp: 1_700_000_000,
            native_transfers: vec![crate::chain::NativeTransfer {
                from: Some(from.to_owned()),
                to: Some(to.to_owned()),
                amount: 1_000_000_000,
            }],
            ..TransactionRecord::default()
        }
    }

    fn model() -> ViewModel {
        ViewModel::new(
            Session::new("A"),
            GraphConfig::default(),
            Arc::new(ProtocolRegistry::builtin()),
            LayoutConfig::default(),
        )
    }

    #[test]
    fn refresh_keeps_existing_positions() {
        let mut model = model();
        model.apply_refresh(PipelineBatch {
            root: Some(Wallet::new("A")),
            transactions: vec![transfer("s1", "A", "B")],
            ..PipelineBatch::default()
        });
        let before = {
            let render = model.render.as_ref().expect("graph rendered");
            let index = render.node_index("B").expect("B present");
            render.simulation.nodes()[index].pos
        };
        assert_eq!(model.last_refresh_added, Some(1));

        model.apply_refresh(PipelineBatch {
            transactions: vec![transfer("s1", "A", "B"), transfer("s2", "B", "C")],
            ..PipelineBatch::default()
        });
        let render = model.render.as_ref().expect("graph rendered");
        let index = render.node_index("B").expect("B present");
        assert_eq!(render.simulation.nodes()[index].pos, before);
        assert!(render.node_index("C").is_some());
        assert_eq!(model.last_refresh_added, Some(1));
        assert_eq!(model.render_revision, 2);
    }

    #[test]
    fn empty_batch_leaves_nothing_to_draw() {
        let mut model = model();
        model.apply_refresh(PipelineBatch::default());
        assert!(!model.refreshing);
        assert!(model.render.is_none());
        assert_eq!(model.last_refresh_added, Some(0));
    }
}
