use std::path::Path;

use eframe::egui::Color32;
use serde::Deserialize;

use crate::color;
use crate::data::model::Facility;

// ---------------------------------------------------------------------------
// Reference location – always rendered, regardless of filters
// ---------------------------------------------------------------------------

pub const REFERENCE_NAME: &str = "COLEGIO TENIENTE DAGOBERTO GODOY";
pub const REFERENCE_LAT: f64 = -33.5597464;
pub const REFERENCE_LON: f64 = -70.65811107;

// ---------------------------------------------------------------------------
// Radius configuration
// ---------------------------------------------------------------------------

/// Tunable marker-radius parameters. Loaded from a JSON file when present
/// so the scaling can be adjusted without recompiling; the defaults are the
/// reference values.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MarkerConfig {
    pub min_radius: f64,
    pub max_radius: f64,
    pub base_size: f64,
    pub exponent: f64,
    pub divisor: f64,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        MarkerConfig {
            min_radius: 5.0,
            max_radius: 18.0,
            base_size: 3.0,
            exponent: 0.4,
            divisor: 2.5,
        }
    }
}

impl MarkerConfig {
    /// Read the config from a JSON file; fall back to the defaults when the
    /// file is absent or malformed (malformed is logged, not fatal).
    pub fn load_or_default(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(cfg) => {
                    log::info!("marker config loaded from '{}'", path.display());
                    cfg
                }
                Err(e) => {
                    log::warn!("invalid marker config '{}': {e}; using defaults", path.display());
                    MarkerConfig::default()
                }
            },
            Err(_) => MarkerConfig::default(),
        }
    }

    /// Marker radius for an enrollment count. Deterministic and monotonic
    /// non-decreasing; always within `[min_radius, max_radius]`.
    pub fn radius(&self, enrollment: i64) -> f64 {
        if enrollment <= 0 {
            return self.min_radius;
        }
        let raw = self.base_size + (enrollment as f64).powf(self.exponent) / self.divisor;
        raw.clamp(self.min_radius, self.max_radius)
    }
}

// ---------------------------------------------------------------------------
// Escaping – spreadsheet text is untrusted
// ---------------------------------------------------------------------------

/// Escape text for inclusion in HTML markup.
pub fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            other => out.push(other),
        }
    }
    out
}

/// Escape already-HTML-safe text for embedding inside a JS template or
/// quoted string (the rendering engine's scripting context).
pub fn js_escape(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('`', "\\`")
        .replace("${", "\\${")
        .replace('\'', "\\'")
}

// ---------------------------------------------------------------------------
// Marker – the renderable representation of one record
// ---------------------------------------------------------------------------

/// Visual representation of one facility: position, scaled radius, fill and
/// stroke colors, and pre-escaped popup/tooltip text.
#[derive(Debug, Clone)]
pub struct Marker {
    pub lat: f64,
    pub lon: f64,
    pub radius: f64,
    pub fill: Color32,
    pub stroke: Color32,
    pub tooltip: String,
    pub popup_html: String,
}

/// Build the marker for a single facility. Returns None (and logs) when the
/// record cannot be represented; the caller skips it and keeps rendering.
pub fn build_marker(fac: &Facility, config: &MarkerConfig) -> Option<Marker> {
    if !fac.lat.is_finite() || !fac.lon.is_finite() {
        log::warn!("skipping marker for RBD {}: non-finite coordinates", fac.id);
        return None;
    }

    let fill = color::fill_for(fac.program);
    Some(Marker {
        lat: fac.lat,
        lon: fac.lon,
        radius: config.radius(fac.enrollment),
        fill,
        stroke: color::stroke_for(fill),
        tooltip: tooltip_text(fac),
        popup_html: popup_html(fac),
    })
}

/// Build markers for a filtered view, keeping each marker paired with its
/// facility index. One bad row never aborts the batch; it is skipped.
pub fn build_markers(
    facilities: &[Facility],
    indices: &[usize],
    config: &MarkerConfig,
) -> Vec<(usize, Marker)> {
    indices
        .iter()
        .filter_map(|&i| {
            let fac = facilities.get(i)?;
            build_marker(fac, config).map(|m| (i, m))
        })
        .collect()
}

/// Tooltip line: HTML-escaped then JS-escaped facility name, plus the id.
pub fn tooltip_text(fac: &Facility) -> String {
    let name = js_escape(&html_escape(&fac.name));
    format!("{name} (RBD: {})", fac.id)
}

/// Popup card for one facility. Every user-originated string goes through
/// [`html_escape`]; numeric fields are formatted from their typed values.
pub fn popup_html(fac: &Facility) -> String {
    let name = html_escape(&fac.name);
    let dep1 = html_escape(&fac.dep_code_1);
    let dep2 = html_escape(&fac.dep_code_2);
    let pie = if fac.has_pie { "Sí" } else { "No" };
    let pace = if fac.has_pace { "Sí" } else { "No" };
    let active = fac.active_levels();
    let levels = if active.is_empty() {
        "Ninguna (01-06)".to_string()
    } else {
        html_escape(&active.join(", "))
    };
    let header_color = color::hex_for(fac.program);

    format!(
        concat!(
            r#"<div style="width: 350px; font-size: 14px;">"#,
            r#"<div style="background: {clr}; color: white; padding: 10px 15px; text-align: center;">"#,
            r#"<strong style="font-size: 16px; display: block;">{name}</strong>"#,
            r#"<span style="font-size: 13px;">RBD: {id}</span></div>"#,
            r#"<div style="padding: 10px 15px; background: #f9f9f9; line-height: 1.5;">"#,
            r#"<p><strong>Dependencia (1/2):</strong> {dep1} / {dep2}</p>"#,
            r#"<p><strong>PIE:</strong> {pie}</p>"#,
            r#"<p><strong>PACE:</strong> {pace}</p>"#,
            r#"<p><strong>Matrícula Total:</strong> {mat}</p>"#,
            r#"<p><strong>Enseñanzas Activas (01-06):</strong><br>{levels}</p>"#,
            r#"</div></div>"#
        ),
        clr = header_color,
        name = name,
        id = fac.id,
        dep1 = dep1,
        dep2 = dep2,
        pie = pie,
        pace = pace,
        mat = fac.enrollment,
        levels = levels,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::Program;

    fn facility(name: &str, enrollment: i64, pie: bool, pace: bool) -> Facility {
        Facility {
            id: 42,
            name: name.to_string(),
            dep_code_1: "1".to_string(),
            dep_code_2: "2".to_string(),
            has_pie: pie,
            has_pace: pace,
            levels: Default::default(),
            enrollment,
            lat: -33.4,
            lon: -70.6,
            program: Program::from_flags(pie, pace),
        }
    }

    #[test]
    fn radius_stays_within_bounds_and_is_monotonic() {
        let cfg = MarkerConfig::default();
        let mut prev = 0.0f64;
        for e in [0, 1, 5, 10, 50, 100, 500, 1_000, 10_000, 1_000_000] {
            let r = cfg.radius(e);
            assert!(r >= cfg.min_radius && r <= cfg.max_radius, "radius {r} out of bounds");
            assert!(r >= prev, "radius not monotonic at enrollment {e}");
            prev = r;
        }
    }

    #[test]
    fn zero_enrollment_gets_the_minimum_radius() {
        let cfg = MarkerConfig::default();
        assert_eq!(cfg.radius(0), cfg.min_radius);
        assert_eq!(cfg.radius(-5), cfg.min_radius);
    }

    #[test]
    fn reference_radius_for_enrollment_100() {
        let cfg = MarkerConfig::default();
        let expected = (3.0 + 100f64.powf(0.4) / 2.5).clamp(5.0, 18.0);
        assert!((cfg.radius(100) - expected).abs() < 1e-12);
    }

    #[test]
    fn config_is_externally_tunable_via_json() {
        let cfg: MarkerConfig =
            serde_json::from_str(r#"{"min_radius": 2.0, "max_radius": 30.0}"#).unwrap();
        assert_eq!(cfg.min_radius, 2.0);
        assert_eq!(cfg.max_radius, 30.0);
        // Unspecified fields keep the defaults.
        assert_eq!(cfg.exponent, 0.4);
        assert!(cfg.radius(0) == 2.0);
    }

    #[test]
    fn popup_escapes_adversarial_names() {
        let fac = facility("<script>alert(\"x\")</script>", 100, true, false);
        let html = popup_html(&fac);
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("&quot;x&quot;"));
    }

    #[test]
    fn tooltip_is_safe_for_a_scripting_context() {
        let fac = facility("Escuela `O'Higgins` ${x} \\", 100, false, false);
        let tip = tooltip_text(&fac);
        assert!(!tip.contains('`') || tip.contains("\\`"));
        assert!(tip.contains("\\${"));
        assert!(tip.contains("\\\\"));
        // The single quote was HTML-escaped first, so no raw quote remains.
        assert!(!tip.contains('\''));
    }

    #[test]
    fn scenario_pie_marker_is_red_with_computed_radius() {
        let cfg = MarkerConfig::default();
        let fac = facility("Escuela", 100, true, false);
        let marker = build_marker(&fac, &cfg).unwrap();
        assert_eq!(crate::color::hex_for(fac.program), "#E41A1C");
        let expected = (3.0 + 100f64.powf(0.4) / 2.5).clamp(5.0, 18.0);
        assert!((marker.radius - expected).abs() < 1e-12);
    }

    #[test]
    fn bad_rows_are_skipped_without_aborting_the_batch() {
        let cfg = MarkerConfig::default();
        let good = facility("A", 10, false, false);
        let mut bad = facility("B", 10, false, false);
        bad.lat = f64::NAN;
        let facilities = vec![good, bad];
        let markers = build_markers(&facilities, &[0, 1], &cfg);
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].0, 0, "surviving marker keeps its facility index");
    }
}
