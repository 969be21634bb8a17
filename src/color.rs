use eframe::egui::Color32;
use palette::{Hsl, IntoColor, Srgb};

use crate::data::model::Program;

// ---------------------------------------------------------------------------
// Category color table
// ---------------------------------------------------------------------------

/// Fallback for anything outside the fixed category table.
pub const DEFAULT_HEX: &str = "#808080";

/// Fixed category → color mapping (ColorBrewer-style hues).
pub fn hex_for(program: Program) -> &'static str {
    match program {
        Program::Pie => "#E41A1C",
        Program::Pace => "#377EB8",
        Program::PieAndPace => "#984EA3",
        Program::Other => "#4daf4a",
    }
}

/// Marker fill color for a category.
pub fn fill_for(program: Program) -> Color32 {
    hex_to_color(hex_for(program)).unwrap_or_else(|| {
        hex_to_color(DEFAULT_HEX).unwrap_or(Color32::GRAY)
    })
}

/// Marker outline: the fill darkened in HSL space.
pub fn stroke_for(fill: Color32) -> Color32 {
    let srgb = Srgb::new(
        fill.r() as f32 / 255.0,
        fill.g() as f32 / 255.0,
        fill.b() as f32 / 255.0,
    );
    let mut hsl: Hsl = srgb.into_color();
    hsl.lightness *= 0.45;
    let rgb: Srgb = hsl.into_color();
    Color32::from_rgb(
        (rgb.red * 255.0) as u8,
        (rgb.green * 255.0) as u8,
        (rgb.blue * 255.0) as u8,
    )
}

fn hex_to_color(hex: &str) -> Option<Color32> {
    let hex = hex.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some(Color32::from_rgb(r, g, b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_table_matches_the_fixed_hex_values() {
        assert_eq!(hex_for(Program::Pie), "#E41A1C");
        assert_eq!(hex_for(Program::Pace), "#377EB8");
        assert_eq!(hex_for(Program::PieAndPace), "#984EA3");
        assert_eq!(hex_for(Program::Other), "#4daf4a");
    }

    #[test]
    fn fill_parses_to_the_expected_rgb() {
        assert_eq!(fill_for(Program::Pie), Color32::from_rgb(0xE4, 0x1A, 0x1C));
        assert_eq!(fill_for(Program::Pace), Color32::from_rgb(0x37, 0x7E, 0xB8));
    }

    #[test]
    fn stroke_is_darker_than_fill() {
        for p in Program::ALL {
            let fill = fill_for(p);
            let stroke = stroke_for(fill);
            let sum = |c: Color32| c.r() as u32 + c.g() as u32 + c.b() as u32;
            assert!(sum(stroke) < sum(fill), "stroke not darker for {p}");
        }
    }

}
