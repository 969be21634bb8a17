/// Data layer: core types, ingestion, filtering, and export.
///
/// Architecture:
/// ```text
///  .xlsx / .xls / .csv
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse + validate + clean → Dataset (memoized by content)
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  Dataset  │  Vec<Facility>, derived categories, widget indices
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐       ┌──────────┐
///   │  filter   │──────▶│  export   │  filtered indices → xlsx download
///   └──────────┘       └──────────┘
/// ```

pub mod export;
pub mod filter;
pub mod loader;
pub mod model;
