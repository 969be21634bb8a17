use std::collections::BTreeSet;

use super::model::{Dataset, Program};

// ---------------------------------------------------------------------------
// Filter predicates
// ---------------------------------------------------------------------------

/// Above this many matched records the map gets slow; the caller is warned
/// but filtering never aborts.
pub const WARN_THRESHOLD: usize = 15_000;

/// Dependency-code predicate: the sentinel matches everything, otherwise
/// exact string equality against `dep_code_2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DepFilter {
    All,
    Code(String),
}

impl DepFilter {
    fn matches(&self, dep_code_2: &str) -> bool {
        match self {
            DepFilter::All => true,
            DepFilter::Code(c) => dep_code_2 == c,
        }
    }
}

/// The current set of user-selected predicates. Mutated only by explicit
/// user actions; reset to defaults on new-file load or explicit clear.
///
/// Invariant owned by the UI layer: `programs` starts populated with every
/// category present in the data. An empty set is only valid transiently and
/// excludes everything at evaluation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterState {
    pub programs: BTreeSet<Program>,
    pub dep: DepFilter,
    /// Inclusive `[min, max]` enrollment range; None ⇒ no restriction.
    pub enrollment: Option<(i64, i64)>,
}

impl Default for FilterState {
    fn default() -> Self {
        FilterState {
            programs: BTreeSet::new(),
            dep: DepFilter::All,
            enrollment: None,
        }
    }
}

impl FilterState {
    /// Default filter state for a freshly loaded dataset: every available
    /// category selected, dependency unrestricted, enrollment spanning the
    /// full observed range (a single-value range when all records share one
    /// enrollment value).
    pub fn for_dataset(dataset: &Dataset) -> Self {
        FilterState {
            programs: dataset.programs_present.clone(),
            dep: DepFilter::All,
            enrollment: dataset.enrollment_bounds,
        }
    }
}

// ---------------------------------------------------------------------------
// Filter pass
// ---------------------------------------------------------------------------

/// Return indices of facilities passing all active predicates.
///
/// Pure, order-preserving, one O(n) scan. Predicates AND together:
/// * program membership in the selected set (empty set passes nothing),
/// * dependency code match,
/// * inclusive enrollment range.
pub fn filtered_indices(dataset: &Dataset, filters: &FilterState) -> Vec<usize> {
    dataset
        .facilities
        .iter()
        .enumerate()
        .filter(|(_, fac)| {
            if !filters.programs.contains(&fac.program) {
                return false;
            }
            if !filters.dep.matches(&fac.dep_code_2) {
                return false;
            }
            if let Some((lo, hi)) = filters.enrollment {
                if fac.enrollment < lo || fac.enrollment > hi {
                    return false;
                }
            }
            true
        })
        .map(|(i, _)| i)
        .collect()
}

/// Performance warning for oversized result sets, surfaced to the caller.
pub fn performance_warning(matched: usize) -> Option<String> {
    (matched > WARN_THRESHOLD).then(|| {
        format!("{matched} markers exceed the {WARN_THRESHOLD} threshold; the map may be slow")
    })
}
