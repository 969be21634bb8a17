use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};
use egui_extras::{Column, TableBuilder};

use crate::color;
use crate::data::filter::DepFilter;
use crate::data::model::Program;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("Archivo", |ui: &mut Ui| {
            if ui.button("Abrir…").clicked() {
                open_file_dialog(state);
                ui.close_menu();
            }
            let can_export = state.dataset.is_some() && !state.visible.is_empty();
            if ui
                .add_enabled(can_export, egui::Button::new("Exportar filtrados…"))
                .clicked()
            {
                export_dialog(state);
                ui.close_menu();
            }
        });

        ui.separator();

        if let (Some(ds), Some(name)) = (&state.dataset, &state.file_name) {
            ui.label(format!(
                "'{name}': {} registros válidos, {} visibles",
                ds.len(),
                state.visible.len()
            ));
        }

        if let Some(msg) = &state.status_message {
            ui.separator();
            let color = if msg.starts_with("Error") {
                Color32::RED
            } else {
                ui.visuals().text_color()
            };
            ui.label(RichText::new(msg).color(color));
        }
    });
}

// ---------------------------------------------------------------------------
// Left side panel – filter widgets
// ---------------------------------------------------------------------------

/// Render the filter panel: program multi-select, dependency combo,
/// enrollment range, reset, and the record counters.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Filtros");
    ui.separator();

    let Some(dataset) = state.dataset.clone() else {
        ui.label("Sube un archivo Excel para comenzar.");
        return;
    };

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            // ---- Program categories ----
            ui.strong("Programa");
            for program in Program::ALL {
                if !dataset.programs_present.contains(&program) {
                    continue;
                }
                let mut checked = state.filters.programs.contains(&program);
                let label = RichText::new(program.label()).color(color::fill_for(program));
                if ui.checkbox(&mut checked, label).changed() {
                    state.toggle_program(program);
                }
            }
            ui.separator();

            // ---- Dependency code ----
            ui.strong("Dependencia (COD_DEPE2)");
            if dataset.dep_codes.is_empty() {
                ui.label("'COD_DEPE2' sin valores.");
            } else {
                let current = match &state.filters.dep {
                    DepFilter::All => "Todos".to_string(),
                    DepFilter::Code(c) => c.clone(),
                };
                egui::ComboBox::from_id_salt("dep_filter")
                    .selected_text(&current)
                    .show_ui(ui, |ui: &mut Ui| {
                        if ui.selectable_label(current == "Todos", "Todos").clicked() {
                            state.set_dep(DepFilter::All);
                        }
                        for code in &dataset.dep_codes {
                            if ui.selectable_label(current == *code, code).clicked() {
                                state.set_dep(DepFilter::Code(code.clone()));
                            }
                        }
                    });
            }
            ui.separator();

            // ---- Enrollment range ----
            ui.strong("Matrícula Total");
            match dataset.enrollment_bounds {
                None => {
                    ui.label("'MAT_TOTAL' no encontrado.");
                }
                Some((lo, hi)) if lo == hi => {
                    // Single observed value: a fixed one-value "range".
                    ui.label(format!("{lo} (valor único)"));
                }
                Some((lo, hi)) => {
                    let (mut min, mut max) = state.filters.enrollment.unwrap_or((lo, hi));
                    let changed = ui
                        .add(egui::Slider::new(&mut min, lo..=hi).text("mín"))
                        .changed()
                        | ui
                            .add(egui::Slider::new(&mut max, lo..=hi).text("máx"))
                            .changed();
                    if changed {
                        state.set_enrollment_range(Some((min, max)));
                    }
                }
            }
            ui.separator();

            if ui.button("♻ Limpiar filtros").clicked() {
                state.reset_filters();
            }
            ui.add_space(4.0);

            ui.label(format!(
                "Registros tras filtros: {}",
                state.visible.len()
            ));
            if state.visible.is_empty() {
                ui.label(RichText::new("0 registros con estos filtros.").color(Color32::YELLOW));
            }
            if let Some(warn) = &state.perf_warning {
                ui.label(RichText::new(warn).color(Color32::ORANGE));
            }
            if let Some(warn) = &state.warning {
                ui.label(RichText::new(warn).color(Color32::ORANGE));
            }
        });
}

// ---------------------------------------------------------------------------
// Filtered-records table (bottom panel)
// ---------------------------------------------------------------------------

/// Table of the currently visible records, in the prioritized column order.
pub fn records_table(ui: &mut Ui, state: &AppState) {
    let Some(dataset) = &state.dataset else {
        return;
    };

    TableBuilder::new(ui)
        .striped(true)
        .column(Column::auto())
        .column(Column::remainder())
        .columns(Column::auto(), 6)
        .header(18.0, |mut header| {
            for title in [
                "RBD", "NOM_RBD", "Programa", "MAT_TOTAL", "COD_DEPE", "COD_DEPE2", "LATITUD",
                "LONGITUD",
            ] {
                header.col(|ui: &mut Ui| {
                    ui.strong(title);
                });
            }
        })
        .body(|body| {
            body.rows(18.0, state.visible.len(), |mut row| {
                let Some(&idx) = state.visible.get(row.index()) else {
                    return;
                };
                let Some(fac) = dataset.facilities.get(idx) else {
                    return;
                };
                row.col(|ui: &mut Ui| {
                    ui.label(fac.id.to_string());
                });
                row.col(|ui: &mut Ui| {
                    ui.label(&fac.name);
                });
                row.col(|ui: &mut Ui| {
                    ui.label(RichText::new(fac.program.label()).color(color::fill_for(fac.program)));
                });
                row.col(|ui: &mut Ui| {
                    ui.label(fac.enrollment.to_string());
                });
                row.col(|ui: &mut Ui| {
                    ui.label(&fac.dep_code_1);
                });
                row.col(|ui: &mut Ui| {
                    ui.label(&fac.dep_code_2);
                });
                row.col(|ui: &mut Ui| {
                    ui.label(format!("{:.6}", fac.lat));
                });
                row.col(|ui: &mut Ui| {
                    ui.label(format!("{:.6}", fac.lon));
                });
            });
        });
}

// ---------------------------------------------------------------------------
// Detail window for the selected marker
// ---------------------------------------------------------------------------

/// Floating detail card for the facility selected on the map.
pub fn detail_window(ctx: &egui::Context, state: &mut AppState) {
    let Some(idx) = state.selected else {
        return;
    };
    let Some(dataset) = state.dataset.clone() else {
        state.selected = None;
        return;
    };
    let Some(fac) = dataset.facilities.get(idx) else {
        log::warn!("selected facility index {idx} out of range");
        state.selected = None;
        return;
    };

    let mut open = true;
    egui::Window::new(format!("RBD {}", fac.id))
        .open(&mut open)
        .collapsible(false)
        .resizable(false)
        .show(ctx, |ui: &mut Ui| {
            ui.heading(RichText::new(&fac.name).color(color::fill_for(fac.program)));
            ui.separator();
            ui.label(format!("Programa: {}", fac.program));
            ui.label(format!(
                "Dependencia (1/2): {} / {}",
                fac.dep_code_1, fac.dep_code_2
            ));
            ui.label(format!("PIE: {}", if fac.has_pie { "Sí" } else { "No" }));
            ui.label(format!("PACE: {}", if fac.has_pace { "Sí" } else { "No" }));
            ui.label(format!("Matrícula Total: {}", fac.enrollment));
            let active = fac.active_levels();
            ui.label(format!(
                "Enseñanzas Activas (01-06): {}",
                if active.is_empty() {
                    "Ninguna".to_string()
                } else {
                    active.join(", ")
                }
            ));
            ui.label(format!("({:.6}, {:.6})", fac.lat, fac.lon));
        });
    if !open {
        state.selected = None;
    }
}

// ---------------------------------------------------------------------------
// File dialogs
// ---------------------------------------------------------------------------

pub fn open_file_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Abrir base de establecimientos")
        .add_filter("Hojas de cálculo", &["xlsx", "xls", "csv"])
        .add_filter("Excel", &["xlsx", "xls"])
        .add_filter("CSV", &["csv"])
        .pick_file();

    if let Some(path) = file {
        state.load_path(&path);
    }
}

pub fn export_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Exportar datos filtrados")
        .set_file_name("datos_filtrados.xlsx")
        .add_filter("Excel", &["xlsx"])
        .save_file();

    if let Some(path) = file {
        // Errors are reported through the status message.
        let _ = state.export_visible(&path);
    }
}
