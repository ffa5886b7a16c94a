/// Data layer: core types, loading, filtering and exploding.
///
/// Architecture:
/// ```text
///  <config>_<name>_<datafile>.parquet / .json / .csv
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse files, add provenance → ResultTable
///   └──────────┘
///        │
///        ▼
///   ┌─────────────┐
///   │ ResultTable  │  rows of Value cells, schema inferred once
///   └─────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  typed column predicates → filtered rows
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ explode   │  payload sequences → one row per element
///   └──────────┘
/// ```

pub mod explode;
pub mod filter;
pub mod loader;
pub mod model;
