use std::fmt;

use serde::Serialize;

// ---------------------------------------------------------------------------
// Column positions and derived-column constants
// ---------------------------------------------------------------------------

pub const PLANET_NAME: usize = 0;
pub const HOST_NAME: usize = 1;
/// Semi-major axis (or orbital period, depending on the catalog export).
pub const ORBITAL_DISTANCE: usize = 2;
/// Planet radius in Earth radii (some catalogs export a diameter here).
pub const PLANET_RADIUS: usize = 3;
/// Stellar radius in solar radii.
pub const STELLAR_RADIUS: usize = 4;
pub const SPECTRAL_TYPE: usize = 5;
/// Stellar effective temperature in Kelvin.
pub const EFFECTIVE_TEMP: usize = 6;

/// A table needs at least this many columns before anything is computed.
pub const MIN_COLUMNS: usize = 7;

/// Names assigned positionally when a file carries no header row.
pub const CANONICAL_COLUMNS: [&str; MIN_COLUMNS] = [
    "pl_name",
    "hostname",
    "pl_orbsmax",
    "pl_rade",
    "st_rad",
    "st_spectype",
    "st_teff",
];

/// Header names accepted as "the planet name column" by lookups.
pub const PLANET_NAME_ALIASES: [&str; 4] = ["pl_name", "planet_name", "planet name", "name"];

/// Solar radius expressed in Earth radii.
pub const SOLAR_TO_EARTH_RADIUS: f64 = 109.7522;
/// Astronomical unit expressed in solar radii.
pub const AU_TO_SOLAR_RADIUS: f64 = 107.1428;

pub const RADIUS_RATIO_COLUMN: &str = "stellar_to_planet_radius_ratio";
pub const ORBIT_RATIO_COLUMN: &str = "orbital_distance_to_stellar_radius_ratio";

/// Derived columns in the order they are appended by the metric engine.
pub const DERIVED_COLUMNS: [&str; 2] = [RADIUS_RATIO_COLUMN, ORBIT_RATIO_COLUMN];

/// `stellar_radius / planet_radius * 109.7522`
pub fn radius_ratio(stellar_radius: f64, planet_radius: f64) -> f64 {
    stellar_radius / planet_radius * SOLAR_TO_EARTH_RADIUS
}

/// `orbital_distance / stellar_radius * 107.1428`
pub fn orbit_ratio(orbital_distance: f64, stellar_radius: f64) -> f64 {
    orbital_distance / stellar_radius * AU_TO_SOLAR_RADIUS
}

/// Column name for position `idx` in a headerless table.
pub fn canonical_name(idx: usize) -> String {
    CANONICAL_COLUMNS
        .get(idx)
        .map(|s| s.to_string())
        .unwrap_or_else(|| format!("col_{}", idx + 1))
}

// ---------------------------------------------------------------------------
// Value – a single cell
// ---------------------------------------------------------------------------

/// A dynamically-typed cell, close to what a catalog export can hold.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    /// Absent measurement: empty field, null, or the sentinel token.
    Missing,
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => write!(f, "{s}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Missing => write!(f, "<missing>"),
        }
    }
}

impl Value {
    /// Type a raw text field the way a catalog reader would.
    pub fn guess(raw: &str) -> Value {
        let s = raw.trim();
        if s.is_empty() {
            return Value::Missing;
        }
        if let Ok(i) = s.parse::<i64>() {
            return Value::Integer(i);
        }
        if let Ok(f) = s.parse::<f64>() {
            return Value::Float(f);
        }
        if s == "true" || s == "false" {
            return Value::Bool(s == "true");
        }
        Value::Text(s.to_string())
    }

    /// Numeric view of an already-numeric cell.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Integer(i) => Some(*i as f64),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Coerce to a float; anything that does not parse becomes `Missing`.
    pub fn to_numeric(&self) -> Value {
        let parsed = match self {
            Value::Text(s) => s.trim().parse::<f64>().ok(),
            other => other.as_f64(),
        };
        match parsed {
            Some(v) if !v.is_nan() => Value::Float(v),
            _ => Value::Missing,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    pub fn is_zero(&self) -> bool {
        self.as_f64() == Some(0.0)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Row – one planet record
// ---------------------------------------------------------------------------

/// One catalog record, interpreted positionally.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub fields: Vec<Value>,
}

impl Row {
    pub fn new(fields: Vec<Value>) -> Self {
        Row { fields }
    }

    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.fields.get(idx)
    }

    /// Numeric value at `idx`, if that cell holds one.
    pub fn number(&self, idx: usize) -> Option<f64> {
        self.get(idx).and_then(Value::as_f64)
    }

    pub fn planet_name(&self) -> Option<&str> {
        self.get(PLANET_NAME).and_then(Value::as_str)
    }

    pub fn effective_temp(&self) -> Option<f64> {
        self.number(EFFECTIVE_TEMP)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Table – the complete dataset flowing through the pipeline
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Read from the input file or entered by the user.
    Source,
    /// Appended by the metric engine.
    Derived,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
}

impl Column {
    pub fn source(name: impl Into<String>) -> Self {
        Column {
            name: name.into(),
            kind: ColumnKind::Source,
        }
    }

    pub fn derived(name: impl Into<String>) -> Self {
        Column {
            name: name.into(),
            kind: ColumnKind::Derived,
        }
    }
}

/// How far a table has travelled through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Loaded,
    Normalized,
    /// Filtered by temperature, with the derived columns appended.
    Computed,
}

/// Fixed-width rows plus the column schema they share.
///
/// Every row has exactly `columns.len()` fields. Source columns come first,
/// derived columns (if any) follow in [`DERIVED_COLUMNS`] order.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub columns: Vec<Column>,
    pub rows: Vec<Row>,
    pub stage: Stage,
}

impl Table {
    /// Empty table with the given source column names.
    pub fn new<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        Table {
            columns: names.into_iter().map(Column::source).collect(),
            rows: Vec::new(),
            stage: Stage::Loaded,
        }
    }

    /// Empty table with `width` positionally named columns.
    pub fn with_canonical_columns(width: usize) -> Self {
        Table::new((0..width).map(canonical_name))
    }

    /// Append a row, padding with `Missing` or truncating to the table width.
    pub fn push_row(&mut self, mut fields: Vec<Value>) {
        fields.resize(self.width(), Value::Missing);
        self.rows.push(Row::new(fields));
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Number of non-derived columns.
    pub fn source_width(&self) -> usize {
        self.columns
            .iter()
            .filter(|c| c.kind == ColumnKind::Source)
            .count()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn has_derived_columns(&self) -> bool {
        self.columns.iter().any(|c| c.kind == ColumnKind::Derived)
    }

    /// Values of one column, top to bottom.
    pub fn column_values(&self, idx: usize) -> impl Iterator<Item = &Value> {
        self.rows.iter().filter_map(move |r| r.get(idx))
    }

    /// Position of the planet-name column: a header match if the file had
    /// one, otherwise position 0.
    pub fn planet_name_index(&self) -> usize {
        self.columns
            .iter()
            .position(|c| {
                c.kind == ColumnKind::Source
                    && PLANET_NAME_ALIASES
                        .iter()
                        .any(|alias| c.name.trim().eq_ignore_ascii_case(alias))
            })
            .unwrap_or(PLANET_NAME)
    }

    /// Copy of the schema with the rows at `indices`, in that order.
    pub fn select(&self, indices: &[usize]) -> Table {
        Table {
            columns: self.columns.clone(),
            rows: indices
                .iter()
                .filter_map(|&i| self.rows.get(i).cloned())
                .collect(),
            stage: self.stage,
        }
    }

    /// Copy of the schema with only the last `n` rows.
    pub fn tail(&self, n: usize) -> Table {
        Table {
            columns: self.columns.clone(),
            rows: self.rows[self.rows.len().saturating_sub(n)..].to_vec(),
            stage: self.stage,
        }
    }
}
