use std::path::Path;
use std::sync::Arc;

use crate::data::export::{self, ExportError};
use crate::data::filter::{DepFilter, FilterState, filtered_indices, performance_warning};
use crate::data::loader::LoadCache;
use crate::data::model::{Dataset, Program};
use crate::marker::MarkerConfig;

// ---------------------------------------------------------------------------
// Map viewport
// ---------------------------------------------------------------------------

pub const DEFAULT_CENTER: (f64, f64) = (-33.45, -70.67);
pub const DEFAULT_ZOOM: f64 = 10.0;

/// Map center and zoom. Persisted across interactions, reset with filters.
#[derive(Debug, Clone, PartialEq)]
pub struct Viewport {
    /// `(lat, lon)`
    pub center: (f64, f64),
    pub zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Viewport {
            center: DEFAULT_CENTER,
            zoom: DEFAULT_ZOOM,
        }
    }
}

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The full session state, independent of rendering. Every user action maps
/// to one explicit method here followed by a pure recompute; nothing outside
/// this struct is mutated across interactions.
pub struct AppState {
    /// Validated dataset (None until a file loads successfully).
    pub dataset: Option<Arc<Dataset>>,

    /// Name of the loaded file, shown in the UI.
    pub file_name: Option<String>,

    /// Current filter predicates.
    pub filters: FilterState,

    /// Indices of facilities passing the current filters (cached).
    pub visible: Vec<usize>,

    /// Map center/zoom, persisted across reruns.
    pub viewport: Viewport,

    /// Set when the viewport was reset programmatically; the map widget
    /// consumes it and re-applies the bounds once.
    pub viewport_dirty: bool,

    /// Facility index selected on the map (detail popup).
    pub selected: Option<usize>,

    /// Tunable marker-radius parameters.
    pub marker_config: MarkerConfig,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,

    /// Non-fatal load warning (dropped rows, missing optional columns).
    pub warning: Option<String>,

    /// Oversized-result warning, recomputed on every filter pass.
    pub perf_warning: Option<String>,

    /// Content-keyed ingestion cache.
    pub cache: LoadCache,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            dataset: None,
            file_name: None,
            filters: FilterState::default(),
            visible: Vec::new(),
            viewport: Viewport::default(),
            viewport_dirty: true,
            selected: None,
            marker_config: MarkerConfig::default(),
            status_message: None,
            warning: None,
            perf_warning: None,
            cache: LoadCache::new(8),
        }
    }
}

impl AppState {
    /// Load a spreadsheet through the memo cache. On failure the previously
    /// loaded data stays active and only the status message changes.
    pub fn load_path(&mut self, path: &Path) {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("<unnamed>")
            .to_string();

        match self.cache.load(path) {
            Ok((dataset, cache_hit)) => {
                if cache_hit {
                    log::info!("'{name}' served from cache");
                }
                self.set_dataset(dataset, name, cache_hit);
            }
            Err(e) => {
                log::error!("failed to load '{name}': {e:#}");
                self.status_message = Some(format!("Error: {e}"));
            }
        }
    }

    /// Install a freshly validated dataset and reset filters and viewport
    /// to their defaults.
    pub fn set_dataset(&mut self, dataset: Arc<Dataset>, name: String, cache_hit: bool) {
        self.filters = FilterState::for_dataset(&dataset);
        self.visible = (0..dataset.len()).collect();
        self.viewport = Viewport::default();
        self.viewport_dirty = true;
        self.selected = None;
        self.status_message = Some(format!("{} registros válidos en '{name}'", dataset.len()));

        // Cleaning warnings are informational and not re-raised on a cache hit.
        self.warning = if cache_hit {
            None
        } else {
            let mut notes = Vec::new();
            if dataset.dropped_rows > 0 {
                notes.push(format!(
                    "{} filas descartadas por coordenadas inválidas",
                    dataset.dropped_rows
                ));
            }
            if !dataset.missing_optional.is_empty() {
                notes.push(format!(
                    "columnas opcionales ausentes: {}",
                    dataset.missing_optional.join(", ")
                ));
            }
            (!notes.is_empty()).then(|| notes.join(" · "))
        };

        self.file_name = Some(name);
        self.dataset = Some(dataset);
        self.refilter();
    }

    /// Pure recompute of the visible subset from the current predicates.
    pub fn refilter(&mut self) {
        if let Some(ds) = &self.dataset {
            self.visible = filtered_indices(ds, &self.filters);
            self.perf_warning = performance_warning(self.visible.len());
        }
    }

    /// Restore default filter state and default map viewport.
    pub fn reset_filters(&mut self) {
        if let Some(ds) = &self.dataset {
            self.filters = FilterState::for_dataset(ds);
        } else {
            self.filters = FilterState::default();
        }
        self.viewport = Viewport::default();
        self.viewport_dirty = true;
        self.selected = None;
        self.refilter();
    }

    /// Toggle one program category in the selection.
    pub fn toggle_program(&mut self, program: Program) {
        if !self.filters.programs.remove(&program) {
            self.filters.programs.insert(program);
        }
        self.refilter();
    }

    /// Set the dependency-code predicate.
    pub fn set_dep(&mut self, dep: DepFilter) {
        self.filters.dep = dep;
        self.refilter();
    }

    /// Set the inclusive enrollment range.
    pub fn set_enrollment_range(&mut self, range: Option<(i64, i64)>) {
        self.filters.enrollment = range.map(|(lo, hi)| (lo.min(hi), lo.max(hi)));
        self.refilter();
    }

    /// Export the currently visible subset to an xlsx file.
    pub fn export_visible(&mut self, path: &Path) -> Result<(), ExportError> {
        let Some(ds) = &self.dataset else {
            return Ok(());
        };
        match export::write_xlsx(ds, &self.visible, path) {
            Ok(()) => {
                self.status_message = Some(format!(
                    "{} registros exportados a '{}'",
                    self.visible.len(),
                    path.display()
                ));
                Ok(())
            }
            Err(e) => {
                log::error!("export failed: {e:#}");
                self.status_message = Some(format!("Error: {e}"));
                Err(e)
            }
        }
    }
}
