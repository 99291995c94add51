use log::{info, warn};

use super::filter::TeffRange;
use super::metrics::add_derived_columns;
use super::model::{
    ColumnKind, Row, Stage, Table, Value, DERIVED_COLUMNS, EFFECTIVE_TEMP, HOST_NAME, MIN_COLUMNS,
    ORBITAL_DISTANCE, PLANET_NAME, PLANET_RADIUS, SPECTRAL_TYPE, STELLAR_RADIUS,
};

/// A planet typed in by hand.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPlanet {
    pub name: String,
    pub host: String,
    pub orbital_distance: f64,
    pub planet_radius: f64,
    pub stellar_radius: f64,
    /// Optional; empty when not given.
    pub spectral_type: String,
    pub effective_temp: f64,
}

impl NewPlanet {
    pub fn new(
        name: &str,
        host: &str,
        orbital_distance: f64,
        planet_radius: f64,
        stellar_radius: f64,
        effective_temp: f64,
    ) -> Self {
        NewPlanet {
            name: name.trim().to_string(),
            host: host.trim().to_string(),
            orbital_distance,
            planet_radius,
            stellar_radius,
            spectral_type: String::new(),
            effective_temp,
        }
    }

    pub fn with_spectral_type(mut self, spectral_type: &str) -> Self {
        self.spectral_type = spectral_type.trim().to_string();
        self
    }

    fn fields(&self) -> Vec<Value> {
        let mut fields = vec![Value::Missing; MIN_COLUMNS];
        fields[PLANET_NAME] = Value::Text(self.name.clone());
        fields[HOST_NAME] = Value::Text(self.host.clone());
        fields[ORBITAL_DISTANCE] = Value::Float(self.orbital_distance);
        fields[PLANET_RADIUS] = Value::Float(self.planet_radius);
        fields[STELLAR_RADIUS] = Value::Float(self.stellar_radius);
        fields[SPECTRAL_TYPE] = Value::Text(self.spectral_type.clone());
        fields[EFFECTIVE_TEMP] = Value::Float(self.effective_temp).to_numeric();
        fields
    }
}

/// Result of [`append`]: the merged table and how many rows it gained.
#[derive(Debug, Clone, PartialEq)]
pub struct Appended {
    pub table: Table,
    pub added: usize,
}

impl Appended {
    /// The rows this call added, in entry order.
    pub fn added_rows(&self) -> &[Row] {
        &self.table.rows[self.table.len().saturating_sub(self.added)..]
    }
}

/// Add the entries of `new_rows` whose temperature falls in
/// `[min_teff, max_teff]` after the rows of `existing`.
///
/// New rows get the same ratio columns as [`compute`](super::metrics::compute)
/// but are not screened for zero radii. Existing rows keep their order and
/// come first; new rows follow in entry order. When nothing qualifies,
/// `existing` is returned unchanged with `added == 0`.
pub fn append(existing: &Table, new_rows: &[NewPlanet], min_teff: f64, max_teff: f64) -> Appended {
    let range = TeffRange::new(min_teff, max_teff);

    let mut entered = Table::with_canonical_columns(MIN_COLUMNS);
    for planet in new_rows {
        entered.push_row(planet.fields());
    }
    add_derived_columns(&mut entered);

    let qualifying: Vec<_> = entered.rows.iter().filter(|row| range.admits(row)).collect();
    if qualifying.is_empty() {
        if !new_rows.is_empty() {
            warn!("No new planets met the temperature criteria.");
        }
        return Appended {
            table: existing.clone(),
            added: 0,
        };
    }

    let mut merged = if existing.width() == 0 {
        let mut empty = Table::with_canonical_columns(MIN_COLUMNS);
        empty.stage = Stage::Computed;
        empty
    } else {
        existing.clone()
    };
    if !merged.has_derived_columns() {
        add_derived_columns(&mut merged);
    }

    // Map each entry onto the merged schema: source positions line up,
    // source columns past the seventh are missing, ratios go by name.
    let entered_ratio = |name: &str| {
        DERIVED_COLUMNS
            .iter()
            .position(|d| *d == name)
            .map(|i| MIN_COLUMNS + i)
    };
    let mut source_pos = 0;
    let layout: Vec<Option<usize>> = merged
        .columns
        .iter()
        .map(|c| match c.kind {
            ColumnKind::Source => {
                let pos = source_pos;
                source_pos += 1;
                (pos < MIN_COLUMNS).then_some(pos)
            }
            ColumnKind::Derived => entered_ratio(&c.name),
        })
        .collect();

    for row in &qualifying {
        merged.push_row(
            layout
                .iter()
                .map(|slot| {
                    slot.and_then(|i| row.get(i).cloned())
                        .unwrap_or(Value::Missing)
                })
                .collect(),
        );
    }

    let added = qualifying.len();
    info!("{added} new planets added and processed.");
    Appended {
        table: merged,
        added,
    }
}
