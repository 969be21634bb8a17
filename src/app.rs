use eframe::egui;

use crate::marker::MarkerConfig;
use crate::state::AppState;
use crate::ui::{map, panels};

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

pub struct MapaApp {
    pub state: AppState,
}

impl MapaApp {
    pub fn new(marker_config: MarkerConfig) -> Self {
        let mut state = AppState::default();
        state.marker_config = marker_config;
        Self { state }
    }
}

impl eframe::App for MapaApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // ---- Top panel: menu bar ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &mut self.state);
        });

        // ---- Left side panel: filters ----
        egui::SidePanel::left("filter_panel")
            .default_width(240.0)
            .resizable(true)
            .show(ctx, |ui| {
                panels::side_panel(ui, &mut self.state);
            });

        // ---- Bottom panel: filtered records table ----
        if self.state.dataset.is_some() {
            egui::TopBottomPanel::bottom("records_table")
                .default_height(200.0)
                .resizable(true)
                .show(ctx, |ui| {
                    panels::records_table(ui, &self.state);
                });
        }

        // ---- Central panel: facility map ----
        egui::CentralPanel::default().show(ctx, |ui| {
            map::facility_map(ui, &mut self.state);
        });

        // ---- Detail popup for the selected marker ----
        panels::detail_window(ctx, &mut self.state);
    }
}
