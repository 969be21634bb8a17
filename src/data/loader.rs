use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use calamine::{Data, Reader, open_workbook_auto_from_rs};
use thiserror::Error;

use super::model::{Dataset, Facility, Program};

// ---------------------------------------------------------------------------
// Column contract
// ---------------------------------------------------------------------------

/// Columns the ingestion layer looks for. Exact names are a fixed external
/// contract with the source spreadsheets.
pub const COLS_OF_INTEREST: [&str; 15] = [
    "RBD", "NOM_RBD", "COD_DEPE", "COD_DEPE2", "CONVENIO_PIE", "PACE", "ENS_01", "ENS_02",
    "ENS_03", "ENS_04", "ENS_05", "ENS_06", "MAT_TOTAL", "LATITUD", "LONGITUD",
];

/// Columns without which no processing is possible.
pub const COLS_CRITICAL: [&str; 3] = ["RBD", "LATITUD", "LONGITUD"];

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Structured ingestion failure. A failed load never disturbs previously
/// loaded data; the caller decides how to report it.
#[derive(Debug, Error)]
pub enum LoadError {
    /// One or more critical columns are absent. No partial result exists.
    #[error("missing critical columns: {}", .0.join(", "))]
    CriticalColumnsMissing(Vec<String>),

    /// Every row was dropped during coordinate cleaning.
    #[error("no rows with valid coordinates remain after cleaning")]
    NoValidRows,

    /// File type we do not know how to parse.
    #[error("unsupported file extension: .{0}")]
    UnsupportedExtension(String),

    /// I/O or format-level failure while reading the file.
    #[error("failed to read '{name}'")]
    Read {
        name: String,
        #[source]
        source: anyhow::Error,
    },
}

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load and validate a facility spreadsheet from disk. Dispatch by extension.
///
/// Supported formats:
/// * `.xlsx` / `.xls` – Excel workbook, first sheet, header row
/// * `.csv`           – same header contract, comma-separated
pub fn load_file(path: &Path) -> Result<Dataset, LoadError> {
    let name = file_name(path);
    let bytes = std::fs::read(path).map_err(|e| LoadError::Read {
        name: name.clone(),
        source: anyhow::Error::new(e).context("reading file"),
    })?;
    load_bytes(&name, &bytes)
}

/// Load and validate from an in-memory byte buffer, dispatching on the
/// extension of `name`.
pub fn load_bytes(name: &str, bytes: &[u8]) -> Result<Dataset, LoadError> {
    let ext = name
        .rsplit('.')
        .next()
        .unwrap_or("")
        .to_ascii_lowercase();

    let table = match ext.as_str() {
        "xlsx" | "xls" => read_excel(bytes),
        "csv" => read_csv(bytes),
        other => return Err(LoadError::UnsupportedExtension(other.to_string())),
    }
    .map_err(|e| LoadError::Read {
        name: name.to_string(),
        source: e,
    })?;

    let dataset = build_dataset(&table.headers, table.rows)?;
    log::info!(
        "loaded '{}': {} valid rows, {} dropped, {} optional columns missing",
        name,
        dataset.len(),
        dataset.dropped_rows,
        dataset.missing_optional.len()
    );
    Ok(dataset)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unnamed>")
        .to_string()
}

// ---------------------------------------------------------------------------
// Raw table readers
// ---------------------------------------------------------------------------

/// Header row plus stringified body rows; the validation step below is
/// format-agnostic and only ever sees this shape.
struct RawTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

fn read_excel(bytes: &[u8]) -> Result<RawTable> {
    let cursor = Cursor::new(bytes.to_vec());
    let mut workbook = open_workbook_auto_from_rs(cursor).context("opening Excel workbook")?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| anyhow!("workbook contains no sheets"))?;
    let range = workbook
        .worksheet_range(&sheet_name)
        .with_context(|| format!("reading sheet '{sheet_name}'"))?;

    let mut rows_iter = range.rows();
    let headers: Vec<String> = rows_iter
        .next()
        .ok_or_else(|| anyhow!("sheet '{sheet_name}' is empty"))?
        .iter()
        .map(|c| cell_to_string(c).trim().to_string())
        .collect();

    let rows: Vec<Vec<String>> = rows_iter
        .map(|row| row.iter().map(cell_to_string).collect())
        .collect();

    Ok(RawTable { headers, rows })
}

/// Stringify a calamine cell. Integer-valued floats lose the trailing `.0`
/// so identifier and count columns parse back as integers.
fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(n) => {
            if n.fract() == 0.0 && n.abs() < 1e15 {
                format!("{}", *n as i64)
            } else {
                format!("{n}")
            }
        }
        Data::Int(n) => format!("{n}"),
        Data::Bool(b) => if *b { "1" } else { "0" }.to_string(),
        Data::Error(e) => format!("#{e:?}"),
        // Dates are stringified defensively; none are expected in this domain.
        Data::DateTime(dt) => format!("{}", dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
    }
}

fn read_csv(bytes: &[u8]) -> Result<RawTable> {
    let mut reader = csv::Reader::from_reader(bytes);
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        rows.push(record.iter().map(|s| s.to_string()).collect());
    }

    Ok(RawTable { headers, rows })
}

// ---------------------------------------------------------------------------
// Validation & cleaning
// ---------------------------------------------------------------------------

/// Turn a raw table into a validated [`Dataset`].
///
/// * Missing critical columns fail the whole load.
/// * Missing optional columns are recorded and processing continues.
/// * Rows with unparseable coordinates are dropped and counted.
/// * Identifier, indicator and enrollment cells default to 0 on parse failure.
fn build_dataset(headers: &[String], rows: Vec<Vec<String>>) -> Result<Dataset, LoadError> {
    let col = |name: &str| headers.iter().position(|h| h == name);

    let missing_critical: Vec<String> = COLS_CRITICAL
        .iter()
        .filter(|c| col(c).is_none())
        .map(|c| c.to_string())
        .collect();
    if !missing_critical.is_empty() {
        return Err(LoadError::CriticalColumnsMissing(missing_critical));
    }

    let missing_optional: Vec<String> = COLS_OF_INTEREST
        .iter()
        .filter(|c| col(c).is_none())
        .map(|c| c.to_string())
        .collect();
    if !missing_optional.is_empty() {
        log::warn!("missing optional columns: {}", missing_optional.join(", "));
    }

    // Critical columns are guaranteed present at this point.
    let idx_id = col("RBD").unwrap_or_default();
    let idx_lat = col("LATITUD").unwrap_or_default();
    let idx_lon = col("LONGITUD").unwrap_or_default();
    let idx_name = col("NOM_RBD");
    let idx_dep1 = col("COD_DEPE");
    let idx_dep2 = col("COD_DEPE2");
    let idx_pie = col("CONVENIO_PIE");
    let idx_pace = col("PACE");
    let idx_enrollment = col("MAT_TOTAL");
    let idx_levels: Vec<Option<usize>> = (1..=6).map(|i| col(&format!("ENS_0{i}"))).collect();

    let mut facilities = Vec::with_capacity(rows.len());
    let mut dropped_rows = 0usize;

    for row in rows {
        let cell = |idx: Option<usize>| idx.and_then(|i| row.get(i)).map(String::as_str);

        // Coordinates are the only hard per-row requirement.
        let lat = cell(Some(idx_lat)).and_then(parse_f64);
        let lon = cell(Some(idx_lon)).and_then(parse_f64);
        let (Some(lat), Some(lon)) = (lat, lon) else {
            dropped_rows += 1;
            continue;
        };

        let has_pie = parse_int_or_zero(cell(idx_pie)) == 1;
        let has_pace = parse_int_or_zero(cell(idx_pace)) == 1;

        let mut levels: [String; 6] = Default::default();
        for (slot, idx) in levels.iter_mut().zip(&idx_levels) {
            *slot = cell(*idx).unwrap_or("").trim().to_string();
        }

        facilities.push(Facility {
            id: parse_int_or_zero(cell(Some(idx_id))),
            name: cell(idx_name).unwrap_or("").trim().to_string(),
            dep_code_1: cell(idx_dep1).unwrap_or("").trim().to_string(),
            dep_code_2: cell(idx_dep2).unwrap_or("").trim().to_string(),
            has_pie,
            has_pace,
            levels,
            enrollment: parse_int_or_zero(cell(idx_enrollment)).max(0),
            lat,
            lon,
            program: Program::from_flags(has_pie, has_pace),
        });
    }

    if facilities.is_empty() {
        return Err(LoadError::NoValidRows);
    }
    if dropped_rows > 0 {
        log::warn!("dropped {dropped_rows} rows with invalid coordinates");
    }

    Ok(Dataset::from_facilities(
        facilities,
        dropped_rows,
        missing_optional,
    ))
}

fn parse_f64(s: &str) -> Option<f64> {
    let t = s.trim();
    if t.is_empty() {
        return None;
    }
    t.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Integer parse with the fail-soft default: unparseable or absent ⇒ 0.
/// Accepts float-formatted cells ("12.0") the way a numeric coercion would.
fn parse_int_or_zero(s: Option<&str>) -> i64 {
    let Some(t) = s.map(str::trim) else { return 0 };
    t.parse::<i64>()
        .ok()
        .or_else(|| t.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f as i64))
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Content-keyed memo cache
// ---------------------------------------------------------------------------

/// Memoizes validated datasets keyed by file identity (name + content
/// digest). Re-loading byte-identical input returns the cached result
/// without recomputation and without re-emitting cleaning warnings.
pub struct LoadCache {
    capacity: usize,
    // FIFO order; oldest entry evicted first.
    entries: Vec<(CacheKey, Arc<Dataset>)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CacheKey {
    name: String,
    digest: blake3::Hash,
}

impl LoadCache {
    pub fn new(capacity: usize) -> Self {
        LoadCache {
            capacity: capacity.max(1),
            entries: Vec::new(),
        }
    }

    /// Load through the cache. Returns the dataset and whether it was a hit.
    pub fn load(&mut self, path: &Path) -> Result<(Arc<Dataset>, bool), LoadError> {
        let name = file_name(path);
        let bytes = std::fs::read(path).map_err(|e| LoadError::Read {
            name: name.clone(),
            source: anyhow::Error::new(e).context("reading file"),
        })?;
        self.load_from_bytes(&name, &bytes)
    }

    /// Byte-buffer variant of [`LoadCache::load`].
    pub fn load_from_bytes(
        &mut self,
        name: &str,
        bytes: &[u8],
    ) -> Result<(Arc<Dataset>, bool), LoadError> {
        let key = CacheKey {
            name: name.to_string(),
            digest: blake3::hash(bytes),
        };

        if let Some((_, dataset)) = self.entries.iter().find(|(k, _)| *k == key) {
            log::debug!("cache hit for '{name}'");
            return Ok((Arc::clone(dataset), true));
        }

        let dataset = Arc::new(load_bytes(name, bytes)?);
        if self.entries.len() >= self.capacity {
            self.entries.remove(0);
        }
        self.entries.push((key, Arc::clone(&dataset)));
        Ok((dataset, false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_HEADER: &str = "RBD,NOM_RBD,COD_DEPE,COD_DEPE2,CONVENIO_PIE,PACE,\
                               ENS_01,ENS_02,ENS_03,ENS_04,ENS_05,ENS_06,MAT_TOTAL,LATITUD,LONGITUD";

    fn load_csv(body: &str) -> Result<Dataset, LoadError> {
        load_bytes("test.csv", body.as_bytes())
    }

    #[test]
    fn missing_critical_columns_name_exactly_the_absent_ones() {
        let err = load_csv("RBD,NOM_RBD\n1,Escuela\n").unwrap_err();
        match err {
            LoadError::CriticalColumnsMissing(cols) => {
                assert_eq!(cols, vec!["LATITUD", "LONGITUD"]);
            }
            other => panic!("expected CriticalColumnsMissing, got {other:?}"),
        }
    }

    #[test]
    fn rows_with_unparseable_coordinates_are_dropped_and_counted() {
        let body = format!(
            "{FULL_HEADER}\n\
             1,A,1,1,1,0,110,0,0,0,0,0,100,-33.4,-70.6\n\
             2,B,1,1,0,0,110,0,0,0,0,0,200,not-a-number,-70.6\n\
             3,C,1,1,0,1,110,0,0,0,0,0,300,-33.5,\n\
             4,D,1,2,1,1,110,0,0,0,0,0,400,-33.6,-70.7\n"
        );
        let ds = load_csv(&body).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.dropped_rows, 2);
        assert_eq!(ds.facilities[0].id, 1);
        assert_eq!(ds.facilities[1].id, 4);
    }

    #[test]
    fn all_rows_invalid_fails_with_no_valid_rows() {
        let body = format!("{FULL_HEADER}\n1,A,1,1,1,0,110,0,0,0,0,0,100,bad,bad\n");
        assert!(matches!(load_csv(&body).unwrap_err(), LoadError::NoValidRows));
    }

    #[test]
    fn optional_columns_missing_is_non_fatal_and_reported() {
        let ds = load_csv("RBD,LATITUD,LONGITUD\n7,-33.4,-70.6\n").unwrap();
        assert_eq!(ds.len(), 1);
        assert!(ds.missing_optional.contains(&"NOM_RBD".to_string()));
        assert!(ds.missing_optional.contains(&"MAT_TOTAL".to_string()));
        // Fail-soft defaults for the absent descriptive fields.
        let fac = &ds.facilities[0];
        assert_eq!(fac.enrollment, 0);
        assert_eq!(fac.program, Program::Other);
        assert_eq!(fac.name, "");
    }

    #[test]
    fn unparseable_optional_fields_default_to_zero() {
        let body = format!(
            "{FULL_HEADER}\n\
             xx,A,1,1,yes,2,110,0,0,0,0,0,lots,-33.4,-70.6\n"
        );
        let ds = load_csv(&body).unwrap();
        let fac = &ds.facilities[0];
        assert_eq!(fac.id, 0);
        assert!(!fac.has_pie); // "yes" is not the integer 1
        assert!(!fac.has_pace); // 2 is not 1
        assert_eq!(fac.enrollment, 0);
    }

    #[test]
    fn categories_derived_at_ingestion() {
        let body = format!(
            "{FULL_HEADER}\n\
             1,A,1,1,1,0,110,0,0,0,0,0,100,-33.4,-70.6\n\
             2,B,1,1,0,1,110,0,0,0,0,0,100,-33.4,-70.6\n\
             3,C,1,1,1,1,110,0,0,0,0,0,100,-33.4,-70.6\n\
             4,D,1,1,0,0,110,0,0,0,0,0,100,-33.4,-70.6\n"
        );
        let ds = load_csv(&body).unwrap();
        let programs: Vec<Program> = ds.facilities.iter().map(|f| f.program).collect();
        assert_eq!(
            programs,
            vec![Program::Pie, Program::Pace, Program::PieAndPace, Program::Other]
        );
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        assert!(matches!(
            load_bytes("data.parquet", b"whatever").unwrap_err(),
            LoadError::UnsupportedExtension(ext) if ext == "parquet"
        ));
    }

    #[test]
    fn cache_returns_memoized_dataset_for_identical_bytes() {
        let body = format!("{FULL_HEADER}\n1,A,1,1,1,0,110,0,0,0,0,0,100,-33.4,-70.6\n");
        let mut cache = LoadCache::new(4);

        let (first, hit1) = cache.load_from_bytes("base.csv", body.as_bytes()).unwrap();
        assert!(!hit1);
        let (second, hit2) = cache.load_from_bytes("base.csv", body.as_bytes()).unwrap();
        assert!(hit2);
        assert!(Arc::ptr_eq(&first, &second));

        // Same name, different content: must recompute.
        let changed = body.replace("100", "200");
        let (_, hit3) = cache.load_from_bytes("base.csv", changed.as_bytes()).unwrap();
        assert!(!hit3);
    }

    #[test]
    fn cache_evicts_oldest_entry_at_capacity() {
        let row = "1,A,1,1,1,0,110,0,0,0,0,0,100,-33.4,-70.6";
        let mut cache = LoadCache::new(2);
        for name in ["a.csv", "b.csv", "c.csv"] {
            let body = format!("{FULL_HEADER}\n{row}\n");
            cache.load_from_bytes(name, body.as_bytes()).unwrap();
        }
        // "a.csv" was evicted; loading it again is a miss.
        let body = format!("{FULL_HEADER}\n{row}\n");
        let (_, hit) = cache.load_from_bytes("a.csv", body.as_bytes()).unwrap();
        assert!(!hit);
    }
}
