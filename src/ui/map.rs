use eframe::egui::{self, Color32, Ui};
use egui_plot::{MarkerShape, Plot, PlotBounds, PlotPoint, Points};

use crate::marker::{self, Marker};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Facility map (central panel)
// ---------------------------------------------------------------------------

/// Convert a tile-style zoom level to the longitude span shown by the plot.
fn lon_span_for_zoom(zoom: f64) -> f64 {
    360.0 / 2f64.powf(zoom)
}

fn zoom_for_lon_span(span: f64) -> f64 {
    (360.0 / span.max(1e-9)).log2()
}

/// Render the facility map: one sized, colored circle per visible record
/// plus the fixed reference marker. Hovering shows the tooltip, clicking
/// selects the facility for the detail popup.
pub fn facility_map(ui: &mut Ui, state: &mut AppState) {
    let Some(dataset) = state.dataset.clone() else {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("Abre un archivo para ver el mapa  (Archivo → Abrir…)");
        });
        return;
    };

    let markers =
        marker::build_markers(&dataset.facilities, &state.visible, &state.marker_config);

    let apply_viewport = state.viewport_dirty;
    state.viewport_dirty = false;
    let viewport = state.viewport.clone();

    let response = Plot::new("facility_map")
        .data_aspect(1.0)
        .show_grid(true)
        .x_axis_label("Longitud")
        .y_axis_label("Latitud")
        .allow_drag(true)
        .allow_scroll(true)
        .allow_zoom(true)
        .allow_boxed_zoom(true)
        .legend(egui_plot::Legend::default())
        .show(ui, |plot_ui| {
            if apply_viewport {
                let lon_span = lon_span_for_zoom(viewport.zoom);
                let lat_span = lon_span / 2.0;
                let (lat, lon) = viewport.center;
                plot_ui.set_plot_bounds(PlotBounds::from_min_max(
                    [lon - lon_span / 2.0, lat - lat_span / 2.0],
                    [lon + lon_span / 2.0, lat + lat_span / 2.0],
                ));
            }

            for (_, m) in &markers {
                plot_ui.points(
                    Points::new(vec![[m.lon, m.lat]])
                        .shape(MarkerShape::Circle)
                        .filled(true)
                        .radius(m.radius as f32)
                        .color(m.fill),
                );
            }

            // Reference location, rendered regardless of filters.
            plot_ui.points(
                Points::new(vec![[marker::REFERENCE_LON, marker::REFERENCE_LAT]])
                    .shape(MarkerShape::Diamond)
                    .filled(true)
                    .radius(9.0)
                    .color(Color32::from_rgb(0x00, 0x30, 0x80))
                    .name(marker::REFERENCE_NAME),
            );

            plot_ui.plot_bounds()
        });

    // Persist the viewport across interactions.
    let bounds = response.inner;
    let center = (
        (bounds.min()[1] + bounds.max()[1]) / 2.0,
        (bounds.min()[0] + bounds.max()[0]) / 2.0,
    );
    state.viewport.center = center;
    state.viewport.zoom = zoom_for_lon_span(bounds.max()[0] - bounds.min()[0]);

    // Hover tooltip and click selection, in screen space.
    let transform = response.transform;
    if let Some(pointer) = response.response.hover_pos() {
        let hit = hovered_marker(&markers, pointer, |lon, lat| {
            transform.position_from_point(&PlotPoint::new(lon, lat))
        });
        if let Some((facility_idx, m)) = hit {
            egui::show_tooltip_at_pointer(
                ui.ctx(),
                response.response.layer_id,
                egui::Id::new("marker_tooltip"),
                |ui: &mut Ui| {
                    ui.label(&m.tooltip);
                },
            );
            if response.response.clicked() {
                state.selected = Some(facility_idx);
            }
        }
    }
}

/// Find the marker under the pointer, if any. Distances are compared in
/// screen points so the hit area matches the drawn radius.
fn hovered_marker<'a>(
    markers: &'a [(usize, Marker)],
    pointer: egui::Pos2,
    to_screen: impl Fn(f64, f64) -> egui::Pos2,
) -> Option<(usize, &'a Marker)> {
    let mut best: Option<(usize, &Marker, f32)> = None;
    for (facility_idx, m) in markers {
        let pos = to_screen(m.lon, m.lat);
        let dist = pos.distance(pointer);
        let hit_radius = m.radius as f32 + 2.0;
        if dist <= hit_radius && best.map_or(true, |(_, _, d)| dist < d) {
            best = Some((*facility_idx, m, dist));
        }
    }
    best.map(|(i, m, _)| (i, m))
}
