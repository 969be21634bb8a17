use std::collections::BTreeSet;
use std::fmt;

// ---------------------------------------------------------------------------
// Program – derived category from the two indicator columns
// ---------------------------------------------------------------------------

/// Program classification derived from the `CONVENIO_PIE` and `PACE`
/// indicator columns. Computed once at ingestion and stored on the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Program {
    Pie,
    Pace,
    PieAndPace,
    Other,
}

impl Program {
    /// All categories, in display order.
    pub const ALL: [Program; 4] = [
        Program::Pie,
        Program::Pace,
        Program::PieAndPace,
        Program::Other,
    ];

    /// Total function of the two indicator flags.
    pub fn from_flags(has_pie: bool, has_pace: bool) -> Self {
        match (has_pie, has_pace) {
            (true, true) => Program::PieAndPace,
            (true, false) => Program::Pie,
            (false, true) => Program::Pace,
            (false, false) => Program::Other,
        }
    }

    /// User-facing label, matching the labels used by the source data.
    pub fn label(&self) -> &'static str {
        match self {
            Program::Pie => "PIE",
            Program::Pace => "PACE",
            Program::PieAndPace => "PIE y PACE",
            Program::Other => "Otros",
        }
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Facility – one validated row of the spreadsheet
// ---------------------------------------------------------------------------

/// One school facility (a validated spreadsheet row).
#[derive(Debug, Clone)]
pub struct Facility {
    /// `RBD` – national facility identifier. 0 when absent or unparseable.
    pub id: i64,
    /// `NOM_RBD` – display name. Untrusted text; escape before rendering.
    pub name: String,
    /// `COD_DEPE` – first administrative dependency code (free-form).
    pub dep_code_1: String,
    /// `COD_DEPE2` – second dependency code; the one the filter matches on.
    pub dep_code_2: String,
    /// `CONVENIO_PIE == 1`
    pub has_pie: bool,
    /// `PACE == 1`
    pub has_pace: bool,
    /// `ENS_01`..`ENS_06` coerced to text for uniform comparison.
    pub levels: [String; 6],
    /// `MAT_TOTAL` – total enrollment. 0 when absent or unparseable.
    pub enrollment: i64,
    /// `LATITUD` – rows without a parseable value never reach this struct.
    pub lat: f64,
    /// `LONGITUD`
    pub lon: f64,
    /// Derived from `(has_pie, has_pace)` at ingestion.
    pub program: Program,
}

impl Facility {
    /// Education levels considered active: non-empty and not a `0` / `N/A`
    /// placeholder. Returns the level numbers ("01".."06").
    pub fn active_levels(&self) -> Vec<String> {
        self.levels
            .iter()
            .enumerate()
            .filter(|(_, v)| {
                let t = v.trim();
                !t.is_empty() && t != "0" && t != "N/A"
            })
            .map(|(i, _)| format!("0{}", i + 1))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Dataset – the complete validated record set
// ---------------------------------------------------------------------------

/// The full validated record set plus precomputed filter-widget data.
/// Immutable once built; a filter pass only ever produces index subsets.
#[derive(Debug, Clone)]
pub struct Dataset {
    /// All validated facilities, in file order.
    pub facilities: Vec<Facility>,
    /// Distinct `dep_code_2` values, numerically sorted when all-numeric,
    /// otherwise numeric values first then the rest lexicographically.
    pub dep_codes: Vec<String>,
    /// `(min, max)` enrollment over all records; None when the set is empty.
    pub enrollment_bounds: Option<(i64, i64)>,
    /// Program categories actually present in the data.
    pub programs_present: BTreeSet<Program>,
    /// Rows excluded for missing/unparseable coordinates (informational).
    pub dropped_rows: usize,
    /// Optional columns absent from the file (informational).
    pub missing_optional: Vec<String>,
}

impl Dataset {
    /// Build the widget indices from the validated rows.
    pub fn from_facilities(
        facilities: Vec<Facility>,
        dropped_rows: usize,
        missing_optional: Vec<String>,
    ) -> Self {
        let mut dep_set: BTreeSet<String> = BTreeSet::new();
        let mut programs_present: BTreeSet<Program> = BTreeSet::new();
        let mut bounds: Option<(i64, i64)> = None;

        for fac in &facilities {
            if !fac.dep_code_2.trim().is_empty() {
                dep_set.insert(fac.dep_code_2.clone());
            }
            programs_present.insert(fac.program);
            bounds = Some(match bounds {
                None => (fac.enrollment, fac.enrollment),
                Some((lo, hi)) => (lo.min(fac.enrollment), hi.max(fac.enrollment)),
            });
        }

        let mut dep_codes: Vec<String> = dep_set.into_iter().collect();
        dep_codes.sort_by(|a, b| match (a.parse::<i64>(), b.parse::<i64>()) {
            (Ok(x), Ok(y)) => x.cmp(&y),
            (Ok(_), Err(_)) => std::cmp::Ordering::Less,
            (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
            (Err(_), Err(_)) => a.cmp(b),
        });

        Dataset {
            facilities,
            dep_codes,
            enrollment_bounds: bounds,
            programs_present,
            dropped_rows,
            missing_optional,
        }
    }

    /// Number of validated records.
    pub fn len(&self) -> usize {
        self.facilities.len()
    }

    /// Whether the dataset is empty.
    pub fn is_empty(&self) -> bool {
        self.facilities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facility(dep2: &str, enrollment: i64, pie: bool, pace: bool) -> Facility {
        Facility {
            id: 1,
            name: "Escuela".to_string(),
            dep_code_1: "1".to_string(),
            dep_code_2: dep2.to_string(),
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
    fn program_is_total_over_both_flags() {
        assert_eq!(Program::from_flags(true, true), Program::PieAndPace);
        assert_eq!(Program::from_flags(true, false), Program::Pie);
        assert_eq!(Program::from_flags(false, true), Program::Pace);
        assert_eq!(Program::from_flags(false, false), Program::Other);
    }

    #[test]
    fn dep_codes_sort_numerically_before_text() {
        let ds = Dataset::from_facilities(
            vec![
                facility("10", 5, false, false),
                facility("2", 5, false, false),
                facility("CORP", 5, false, false),
                facility("1", 5, false, false),
            ],
            0,
            Vec::new(),
        );
        assert_eq!(ds.dep_codes, vec!["1", "2", "10", "CORP"]);
    }

    #[test]
    fn enrollment_bounds_cover_min_and_max() {
        let ds = Dataset::from_facilities(
            vec![
                facility("1", 120, true, false),
                facility("1", 30, false, true),
                facility("1", 800, false, false),
            ],
            0,
            Vec::new(),
        );
        assert_eq!(ds.enrollment_bounds, Some((30, 800)));
        assert!(ds.programs_present.contains(&Program::Pie));
        assert!(ds.programs_present.contains(&Program::Pace));
        assert!(ds.programs_present.contains(&Program::Other));
        assert!(!ds.programs_present.contains(&Program::PieAndPace));
    }

    #[test]
    fn active_levels_skip_placeholders() {
        let mut fac = facility("1", 10, false, false);
        fac.levels = [
            "110".to_string(),
            "0".to_string(),
            "N/A".to_string(),
            "  ".to_string(),
            "310".to_string(),
            String::new(),
        ];
        assert_eq!(fac.active_levels(), vec!["01", "05"]);
    }
}
