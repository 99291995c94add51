//! Exoplanet catalog pipeline.
//!
//! Loads stellar/planetary parameters from CSV, text, JSON, Parquet or FITS
//! tables, keeps the planets whose host star lies in an effective
//! temperature window, and derives two habitability ratios:
//!
//! - `stellar_to_planet_radius_ratio = st_rad / pl_rade * 109.7522`
//! - `orbital_distance_to_stellar_radius_ratio = pl_orbsmax / st_rad * 107.1428`
//!
//! # Example
//!
//! ```no_run
//! use earth_habitability::data::{compute, find, load_file, normalize, HeaderMode};
//!
//! let (table, report) = load_file("catalog.csv".as_ref(), HeaderMode::Auto).unwrap();
//! println!("{report}");
//! let table = normalize(&table, 7).unwrap();
//! let result = compute(&table, 4000.0, 6000.0);
//! let kepler = find(&result, "Kepler-22 b");
//! ```

pub mod cli;
pub mod config;
pub mod data;
pub mod render;
pub mod session;

pub use config::PipelineConfig;
pub use session::Session;
