use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::data::filter::TeffRange;
use crate::data::loader::HeaderMode;
use crate::data::model::MIN_COLUMNS;
use crate::data::normalize::MISSING_TOKEN;

/// Pipeline settings. Every field has a default, so an empty file is a
/// valid configuration.
///
/// ```toml
/// min_teff = 4000.0
/// max_teff = 6000.0
/// min_columns = 7
/// missing_token = "--"
/// header = "auto"   # or "present" / "absent"
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Lower temperature bound in Kelvin (inclusive).
    pub min_teff: f64,
    /// Upper temperature bound in Kelvin (inclusive).
    pub max_teff: f64,
    pub min_columns: usize,
    pub missing_token: String,
    pub header: HeaderMode,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let range = TeffRange::default();
        Self {
            min_teff: range.min,
            max_teff: range.max,
            min_columns: MIN_COLUMNS,
            missing_token: MISSING_TOKEN.to_string(),
            header: HeaderMode::Auto,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("Invalid config file '{}'", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn teff_range(&self) -> TeffRange {
        TeffRange::new(self.min_teff, self.max_teff)
    }
}
