mod app;
mod color;
mod data;
mod marker;
mod state;
mod ui;

use std::path::Path;

use app::MapaApp;
use eframe::egui;
use marker::MarkerConfig;

fn main() -> eframe::Result {
    env_logger::init();

    // Radius tuning lives next to the executable; defaults apply otherwise.
    let marker_config = MarkerConfig::load_or_default(Path::new("marker_config.json"));

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_min_inner_size([600.0, 400.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Mapa Interactivo de Establecimientos",
        options,
        Box::new(move |_cc| Ok(Box::new(MapaApp::new(marker_config)))),
    )
}
