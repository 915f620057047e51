use eframe::egui::{self, Context, Key};

use crate::util::short_address;

use super::super::{AppState, WalletGraphApp};

impl WalletGraphApp {
    pub(in crate::app) fn draw_search_bar(&mut self, ctx: &Context) {
        let mut submitted = None;
        let mut clear_requested = false;
        let mut history_cleared = false;
        let mut forgotten = None;

        egui::TopBottomPanel::top("search_bar")
            .resizable(false)
            .show(ctx, |ui| {
                ui.add_space(4.0);
                ui.horizontal(|ui| {
                    ui.heading("wallet-graph");
                    ui.separator();

                    let input = ui.add(
                        egui::TextEdit::singleline(&mut self.search_input)
                            .hint_text("Solana wallet address")
                            .desired_width(420.0),
                    );
                    let entered =
                        input.lost_focus() && ui.input(|input| input.key_pressed(Key::Enter));
                    if ui.button("Search").clicked() || entered {
                        submitted = Some(self.search_input.clone());
                    }

                    ui.add_enabled_ui(!self.history.entries().is_empty(), |ui| {
                        ui.menu_button("History", |ui| {
                            for address in self.history.entries() {
                                ui.horizontal(|ui| {
                                    if ui
                                        .button(short_address(address))
                                        .on_hover_text(address.as_str())
                                        .clicked()
                                    {
                                        submitted = Some(address.clone());
                                        ui.close();
                                    }
                                    if ui.small_button("×").on_hover_text("Forget").clicked() {
                                        forgotten = Some(address.clone());
                                    }
                                });
                            }
                            ui.separator();
                            if ui.button("Clear history").clicked() {
                                history_cleared = true;
                                ui.close();
                            }
                        });
                    });

                    let has_content = !matches!(self.state, AppState::Empty);
                    if ui
                        .add_enabled(has_content, egui::Button::new("Clear"))
                        .clicked()
                    {
                        clear_requested = true;
                    }

                    if let Some(error) = &self.address_error {
                        ui.colored_label(ui.visuals().error_fg_color, error.as_str());
                    }
                });
                ui.add_space(4.0);
            });

        if let Some(address) = forgotten {
            self.history.remove(&address);
            self.persist_history();
        }
        if history_cleared {
            self.history.clear();
            self.persist_history();
        }
        if clear_requested {
            self.search_input.clear();
            self.address_error = None;
            self.clear();
        }
        if let Some(input) = submitted {
            self.search_input = input.trim().to_owned();
            self.submit_search(&input);
        }
    }
}
