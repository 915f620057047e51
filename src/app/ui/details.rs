use eframe::egui::{self, RichText, Ui};

use crate::chain::mints_moved_by;
use crate::util::{format_amount, format_sol, format_timestamp, short_address};

use super::super::graph::{InteractionCommand, InteractionEvent, can_explore};
use super::super::{AppRequest, ViewModel};

const PATH_INLINE_LIMIT: usize = 10;

struct ConnectionRow {
    counterpart: String,
    label: String,
    outgoing: bool,
    value: f64,
    transaction_count: u64,
    count_only: bool,
}

impl ViewModel {
    pub(in crate::app) fn draw_details(&mut self, ui: &mut Ui, request: &mut Option<AppRequest>) {
        ui.heading("Selection Details");
        ui.add_space(6.0);

        let Some(selected_id) = self.controller.selected().map(str::to_owned) else {
            ui.label("Click a node to see its details. Double-click to explore it.");
            return;
        };
        let Some(render) = self.render.as_ref() else {
            return;
        };
        let Some(node) = render.graph.node(&selected_id).cloned() else {
            ui.label("Selected node is no longer in the graph.");
            return;
        };

        let mut event = None;
        ui.horizontal(|ui| {
            ui.label(RichText::new(&node.label).strong());
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui.small_button("Close").clicked() {
                    event = Some(InteractionEvent::Close);
                }
            });
        });
        ui.small(node.id.as_str());
        ui.add_space(6.0);

        ui.label(format!("Type: {}", node.node_type.label()));
        if let Some(category) = node.category {
            ui.label(format!("Category: {}", category.label()));
        }
        if let Some(protocol) = &node.protocol {
            ui.label(format!("Protocol: {}", protocol.name));
        }
        ui.label(format!("Balance: {}", format_sol(node.balance)));
        ui.label(format!("Activity: {} transactions", node.activity));
        ui.label(format!("Connections: {}", node.connection_count));

        if let Some(wallet) = self.session.wallet(&selected_id) {
            if let Some(first) = wallet.first_activity_at {
                ui.label(format!("First seen: {}", format_timestamp(first)));
            }
            if let Some(last) = wallet.last_activity_at {
                ui.label(format!("Last seen: {}", format_timestamp(last)));
            }
            if !wallet.token_balances.is_empty() {
                ui.collapsing(
                    format!("Token accounts: {}", wallet.token_balances.len()),
                    |ui| {
                        for balance in &wallet.token_balances {
                            ui.small(format!(
                                "{}  {}",
                                short_address(&balance.mint),
                                format_amount(balance.amount)
                            ))
                            .on_hover_text(balance.mint.as_str());
                        }
                    },
                );
            }
        }
        let mints = mints_moved_by(self.session.transactions(), &selected_id);
        if !mints.is_empty() {
            ui.label(format!("Tokens moved: {}", mints.len()))
                .on_hover_text(mints.join("\n"));
        }
        if node.synthesized {
            ui.small("Only seen as a counterparty. Balance and activity are estimates.");
        }

        ui.add_space(6.0);
        let explorable = can_explore(&node);
        let explore = ui
            .add_enabled(explorable, egui::Button::new("Explore this wallet"))
            .on_hover_text("Search this address and map its own connections.");
        if explore.clicked() {
            event = Some(InteractionEvent::Explore(node.id.clone()));
        }

        ui.separator();
        ui.label(RichText::new("Path from searched wallet").strong());
        match render.graph.path_from_root(&selected_id) {
            Some(path) if path.len() > 1 => {
                let labels = path
                    .iter()
                    .map(|id| {
                        render
                            .graph
                            .node(id)
                            .map(|node| node.label.clone())
                            .unwrap_or_else(|| short_address(id))
                    })
                    .collect::<Vec<_>>();
                let rendered = if labels.len() <= PATH_INLINE_LIMIT {
                    labels.join(" → ")
                } else {
                    format!(
                        "{} → … → {}",
                        labels[..6].join(" → "),
                        labels[labels.len() - 3..].join(" → ")
                    )
                };
                ui.label(rendered);
            }
            Some(_) => {
                ui.label("This is the searched wallet.");
            }
            None => {
                ui.label("Not connected to the searched wallet.");
            }
        }

        ui.separator();
        ui.label(RichText::new("Connections").strong());
        let rows = connection_rows(render, &selected_id);
        if rows.is_empty() {
            ui.label("No connections for this node.");
        } else {
            egui::ScrollArea::vertical()
                .id_salt("connections_scroll")
                .max_height(320.0)
                .auto_shrink([false, true])
                .show_rows(ui, 20.0, rows.len(), |ui, row_range| {
                    for row in &rows[row_range] {
                        let arrow = if row.outgoing { "→" } else { "←" };
                        let amount = if row.count_only {
                            String::new()
                        } else {
                            format!(", {}", format_amount(row.value))
                        };
                        let text = format!(
                            "{arrow} {}  ({} tx{amount})",
                            row.label, row.transaction_count
                        );
                        if ui
                            .link(text)
                            .on_hover_text(row.counterpart.as_str())
                            .clicked()
                        {
                            event = Some(InteractionEvent::ClickNode(row.counterpart.clone()));
                        }
                    }
                });
        }

        if let Some(event) = event
            && let Some(InteractionCommand::Explore(address)) = self.controller.handle(event)
        {
            *request = Some(AppRequest::Explore(address));
        }
    }
}

/// Edges touching `id`, busiest first.
fn connection_rows(render: &super::super::RenderGraph, id: &str) -> Vec<ConnectionRow> {
    let mut rows = render
        .graph
        .edges_touching(id)
        .into_iter()
        .filter_map(|index| render.graph.edges.get(index))
        .map(|edge| {
            let outgoing = edge.source == id;
            let counterpart = if outgoing { &edge.target } else { &edge.source };
            ConnectionRow {
                label: render
                    .graph
                    .node(counterpart)
                    .map(|node| node.label.clone())
                    .unwrap_or_else(|| short_address(counterpart)),
                counterpart: counterpart.clone(),
                outgoing,
                value: edge.value,
                transaction_count: edge.transaction_count,
                count_only: edge.strategy.is_count_only(),
            }
        })
        .collect::<Vec<_>>();
    rows.sort_by(|a, b| {
        b.transaction_count
            .cmp(&a.transaction_count)
            .then_with(|| a.label.cmp(&b.label))
    });
    rows
}
