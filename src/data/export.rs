use std::path::Path;

use rust_xlsxwriter::{Format, Workbook, XlsxError};
use thiserror::Error;

use super::model::Dataset;

// ---------------------------------------------------------------------------
// Filtered-subset export (xlsx)
// ---------------------------------------------------------------------------

/// Output column order: identifier and name first, then the derived
/// category, enrollment, dependency codes, coordinates, and the raw
/// indicator columns last. This matches the prioritized display order.
pub const EXPORT_COLUMNS: [&str; 10] = [
    "RBD",
    "NOM_RBD",
    "programa",
    "MAT_TOTAL",
    "COD_DEPE",
    "COD_DEPE2",
    "LATITUD",
    "LONGITUD",
    "CONVENIO_PIE",
    "PACE",
];

/// Export failure, surfaced with the underlying cause. The file on disk is
/// only written after the whole workbook serialized successfully, so a
/// failure never leaves a truncated download behind.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to serialize workbook")]
    Serialize(#[from] XlsxError),

    #[error("failed to write '{path}'")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Serialize the selected records to an in-memory xlsx workbook.
/// `indices` is the filtered view; pass `0..dataset.len()` for everything.
pub fn to_buffer(dataset: &Dataset, indices: &[usize]) -> Result<Vec<u8>, ExportError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet().set_name("Sheet1")?;

    let header_format = Format::new().set_bold();
    for (col, name) in EXPORT_COLUMNS.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *name, &header_format)?;
    }

    for (row_no, &idx) in indices.iter().enumerate() {
        let Some(fac) = dataset.facilities.get(idx) else {
            log::warn!("export: skipping out-of-range index {idx}");
            continue;
        };
        let row = (row_no + 1) as u32;
        worksheet.write_number(row, 0, fac.id as f64)?;
        worksheet.write_string(row, 1, &fac.name)?;
        worksheet.write_string(row, 2, fac.program.label())?;
        worksheet.write_number(row, 3, fac.enrollment as f64)?;
        worksheet.write_string(row, 4, &fac.dep_code_1)?;
        worksheet.write_string(row, 5, &fac.dep_code_2)?;
        worksheet.write_number(row, 6, fac.lat)?;
        worksheet.write_number(row, 7, fac.lon)?;
        worksheet.write_number(row, 8, if fac.has_pie { 1.0 } else { 0.0 })?;
        worksheet.write_number(row, 9, if fac.has_pace { 1.0 } else { 0.0 })?;
    }

    Ok(workbook.save_to_buffer()?)
}

/// Serialize and write to disk. Serialization happens fully in memory
/// first; only a complete workbook ever reaches the filesystem.
pub fn write_xlsx(dataset: &Dataset, indices: &[usize], path: &Path) -> Result<(), ExportError> {
    let buffer = to_buffer(dataset, indices)?;
    std::fs::write(path, &buffer).map_err(|e| ExportError::Write {
        path: path.display().to_string(),
        source: e,
    })?;
    log::info!("exported {} records to '{}'", indices.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::load_bytes;
    use crate::data::model::{Facility, Program};
    use calamine::{Data, Reader, open_workbook_auto_from_rs};
    use std::io::Cursor;

    fn facility(id: i64, enrollment: i64, lat: f64, lon: f64) -> Facility {
        Facility {
            id,
            name: format!("Escuela {id}"),
            dep_code_1: "1".to_string(),
            dep_code_2: "2".to_string(),
            has_pie: id % 2 == 0,
            has_pace: false,
            levels: Default::default(),
            enrollment,
            lat,
            lon,
            program: Program::from_flags(id % 2 == 0, false),
        }
    }

    fn sample_dataset() -> Dataset {
        Dataset::from_facilities(
            vec![
                facility(1, 100, -33.40, -70.60),
                facility(2, 250, -33.51, -70.71),
                facility(3, 80, -33.62, -70.82),
            ],
            0,
            Vec::new(),
        )
    }

    #[test]
    fn header_row_preserves_prioritized_column_order() {
        let ds = sample_dataset();
        let buffer = to_buffer(&ds, &[0, 1, 2]).unwrap();

        let mut wb = open_workbook_auto_from_rs(Cursor::new(buffer)).unwrap();
        let sheet = wb.sheet_names().first().cloned().unwrap();
        let range = wb.worksheet_range(&sheet).unwrap();
        let header: Vec<String> = range
            .rows()
            .next()
            .unwrap()
            .iter()
            .map(|c| match c {
                Data::String(s) => s.clone(),
                other => format!("{other:?}"),
            })
            .collect();
        assert_eq!(header, EXPORT_COLUMNS.to_vec());
    }

    #[test]
    fn exported_subset_round_trips_through_ingestion() {
        let ds = sample_dataset();
        // Export only two of the three records, then re-ingest.
        let buffer = to_buffer(&ds, &[0, 2]).unwrap();
        let reloaded = load_bytes("roundtrip.xlsx", &buffer).unwrap();

        assert_eq!(reloaded.len(), 2);
        for (orig_idx, fac) in [0usize, 2].into_iter().zip(&reloaded.facilities) {
            let orig = &ds.facilities[orig_idx];
            assert_eq!(fac.id, orig.id);
            assert_eq!(fac.enrollment, orig.enrollment);
            assert!((fac.lat - orig.lat).abs() < 1e-9);
            assert!((fac.lon - orig.lon).abs() < 1e-9);
        }
    }

    #[test]
    fn adversarial_names_survive_export_verbatim() {
        let mut ds = sample_dataset();
        ds.facilities[0].name = "<script>alert('x')</script>".to_string();
        let buffer = to_buffer(&ds, &[0]).unwrap();
        let reloaded = load_bytes("adversarial.xlsx", &buffer).unwrap();
        // Spreadsheet cells carry raw text; escaping belongs to rendering.
        assert_eq!(reloaded.facilities[0].name, "<script>alert('x')</script>");
    }
}
