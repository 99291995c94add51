/// Data layer: core types, loading, normalization and metrics.
///
/// Architecture:
/// ```text
///  .csv / .txt / .json / .parquet / .fits
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → Table (+ fits for the binary format)
///   └──────────┘
///        │
///        ▼
///   ┌───────────┐
///   │ normalize  │  width check, numeric coercion, "--" → 0
///   └───────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ metrics   │  Teff window (filter) → ratio columns → drop zero rows
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ append    │  hand-entered planets, same ratios, same window
///   └──────────┘
/// ```

pub mod append;
pub mod error;
pub mod filter;
pub mod fits;
pub mod loader;
pub mod metrics;
pub mod model;
pub mod normalize;

pub use append::{append, Appended, NewPlanet};
pub use error::{PipelineError, Result};
pub use filter::TeffRange;
pub use loader::{load, load_file, Format, HeaderMode, LoadReport};
pub use metrics::{compute, find};
pub use model::{Row, Table, Value};
pub use normalize::normalize;
