use std::io::Read;
use std::path::Path;

use crate::config::PipelineConfig;
use crate::data::append::{append, NewPlanet};
use crate::data::error::Result;
use crate::data::filter::TeffRange;
use crate::data::loader::{self, LoadReport};
use crate::data::metrics::{compute, find};
use crate::data::model::{Row, Table};
use crate::data::normalize::normalize_with_token;

// ---------------------------------------------------------------------------
// Session state
// ---------------------------------------------------------------------------

/// Everything one interactive session carries, independent of rendering.
pub struct Session {
    pub config: PipelineConfig,

    /// Normalized catalog (None until a file is opened).
    pub normalized: Option<Table>,

    /// What the loader reported for the current catalog.
    pub report: Option<LoadReport>,

    /// Current result: filtered catalog plus accepted manual entries.
    pub filtered: Table,

    /// Planets entered by hand, replayed when the range changes.
    pub manual: Vec<NewPlanet>,

    pub range: TeffRange,

    /// Status / error message for the caller to show.
    pub status_message: Option<String>,
}

impl Default for Session {
    fn default() -> Self {
        Session::new(PipelineConfig::default())
    }
}

impl Session {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            range: config.teff_range(),
            config,
            normalized: None,
            report: None,
            filtered: Table::new(Vec::<String>::new()),
            manual: Vec::new(),
            status_message: None,
        }
    }

    /// Load, normalize and compute a catalog from disk.
    ///
    /// On failure nothing in the session changes except the status message.
    pub fn open(&mut self, path: &Path) -> Result<&Table> {
        let loaded = loader::load_file(path, self.config.header);
        self.ingest(loaded)
    }

    /// Same as [`open`](Self::open) for an uploaded byte stream.
    pub fn open_reader<R: Read>(&mut self, reader: R, file_name: &str) -> Result<&Table> {
        let loaded = loader::load(reader, file_name, self.config.header);
        self.ingest(loaded)
    }

    fn ingest(&mut self, loaded: Result<(Table, LoadReport)>) -> Result<&Table> {
        let normalized = loaded.and_then(|(table, report)| {
            normalize_with_token(&table, self.config.min_columns, &self.config.missing_token)
                .map(|t| (t, report))
        });

        match normalized {
            Ok((table, report)) => {
                self.filtered = compute(&table, self.range.min, self.range.max);
                self.normalized = Some(table);
                self.report = Some(report);
                self.manual.clear();
                self.status_message = Some(report.to_string());
                Ok(&self.filtered)
            }
            Err(e) => {
                log::error!("Failed to load file: {e}");
                self.status_message = Some(format!("Error: {e}"));
                Err(e)
            }
        }
    }

    /// Change the temperature window and rebuild the result, replaying
    /// manual entries against the new window.
    pub fn set_range(&mut self, min_teff: f64, max_teff: f64) -> &Table {
        self.range = TeffRange::new(min_teff, max_teff);
        let base = match &self.normalized {
            Some(table) => compute(table, min_teff, max_teff),
            None => Table::new(Vec::<String>::new()),
        };
        self.filtered = append(&base, &self.manual, min_teff, max_teff).table;
        &self.filtered
    }

    /// Append hand-entered planets to the current result. Returns how many
    /// passed the temperature window.
    pub fn add_planets(&mut self, planets: &[NewPlanet]) -> usize {
        let appended = append(&self.filtered, planets, self.range.min, self.range.max);
        for row in appended.added_rows() {
            log::debug!("added {}", row.planet_name().unwrap_or("<unnamed>"));
        }
        self.filtered = appended.table;
        self.manual.extend_from_slice(planets);
        self.status_message = Some(if appended.added == 0 {
            "No new planets met the temperature criteria.".to_string()
        } else {
            format!("{} new planets added and processed.", appended.added)
        });
        appended.added
    }

    /// Exact lookup in the current result.
    pub fn lookup(&self, name: &str) -> Option<&Row> {
        find(&self.filtered, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = "pl_name,hostname,pl_orbsmax,pl_rade,st_rad,st_spectype,st_teff\n\
                           Kepler-22 b,Kepler-22,0.812,2.1,0.98,G5 V,5518\n\
                           Kepler-62 f,Kepler-62,0.718,1.41,0.64,K2 V,4925\n\
                           KELT-9 b,KELT-9,0.034,21.2,2.36,A0,10170\n";

    fn opened() -> Session {
        let mut session = Session::default();
        session.open_reader(CATALOG.as_bytes(), "catalog.csv").unwrap();
        session
    }

    #[test]
    fn open_runs_the_whole_pipeline() {
        let session = opened();
        assert_eq!(session.filtered.len(), 2);
        assert_eq!(session.report.unwrap().rows, 3);
        assert!(session.lookup("KELT-9 b").is_none());
        assert!(session.lookup("Kepler-22 b").is_some());
    }

    #[test]
    fn failed_open_keeps_previous_state() {
        let mut session = opened();
        let before = session.filtered.clone();

        let err = session.open_reader("a,b\n1,2\n".as_bytes(), "small.csv").unwrap_err();
        assert!(matches!(err, crate::data::PipelineError::Schema { actual: 2, .. }));
        assert_eq!(session.filtered, before);
        assert!(session.status_message.unwrap().starts_with("Error:"));
    }

    #[test]
    fn manual_planets_survive_a_range_change() {
        let mut session = opened();
        let added = session.add_planets(&[NewPlanet::new("Home", "Sun", 1.0, 1.0, 1.0, 5772.0)]);
        assert_eq!(added, 1);
        assert_eq!(session.filtered.len(), 3);
        let fresh = session.filtered.tail(added);
        assert_eq!(fresh.rows[0].planet_name(), Some("Home"));
        assert_eq!(fresh.width(), session.filtered.width());

        session.set_range(5000.0, 6000.0);
        assert!(session.lookup("Home").is_some());
        assert!(session.lookup("Kepler-62 f").is_none());
        assert_eq!(session.filtered.len(), 2);
    }

    #[test]
    fn add_planets_reports_when_nothing_qualifies() {
        let mut session = opened();
        let added = session.add_planets(&[NewPlanet::new("Hot", "Star", 1.0, 1.0, 1.0, 9000.0)]);
        assert_eq!(added, 0);
        assert_eq!(
            session.status_message.as_deref(),
            Some("No new planets met the temperature criteria.")
        );
    }

    #[test]
    fn planets_can_be_added_without_a_catalog() {
        let mut session = Session::default();
        session.add_planets(&[NewPlanet::new("Home", "Sun", 1.0, 1.0, 1.0, 5772.0)]);
        assert_eq!(session.filtered.len(), 1);
        assert_eq!(session.filtered.width(), 9);
    }
}
