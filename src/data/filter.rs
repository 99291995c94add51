use super::model::{Row, Table, ORBITAL_DISTANCE, PLANET_RADIUS, STELLAR_RADIUS};

// ---------------------------------------------------------------------------
// Row predicates
// ---------------------------------------------------------------------------

/// Inclusive effective-temperature window in Kelvin.
///
/// An inverted window (`min > max`) is legal and selects nothing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TeffRange {
    pub min: f64,
    pub max: f64,
}

impl TeffRange {
    pub fn new(min: f64, max: f64) -> Self {
        TeffRange { min, max }
    }

    /// `min <= teff <= max`; NaN never matches.
    pub fn contains(&self, teff: f64) -> bool {
        self.min <= teff && teff <= self.max
    }

    /// A row passes when its temperature cell is numeric and in range.
    pub fn admits(&self, row: &Row) -> bool {
        row.effective_temp().is_some_and(|t| self.contains(t))
    }
}

impl Default for TeffRange {
    fn default() -> Self {
        TeffRange::new(4000.0, 6000.0)
    }
}

/// A row whose distance or radius cell is exactly zero would yield an
/// undefined ratio.
pub fn is_degenerate(row: &Row) -> bool {
    [ORBITAL_DISTANCE, PLANET_RADIUS, STELLAR_RADIUS]
        .iter()
        .any(|&idx| row.get(idx).is_some_and(|v| v.is_zero()))
}

// ---------------------------------------------------------------------------
// Index selection
// ---------------------------------------------------------------------------

/// Indices of rows inside `range`, in table order.
pub fn in_range_indices(table: &Table, range: TeffRange) -> Vec<usize> {
    table
        .rows
        .iter()
        .enumerate()
        .filter(|(_, row)| range.admits(row))
        .map(|(i, _)| i)
        .collect()
}

/// Indices of rows that are not degenerate, in table order.
pub fn non_degenerate_indices(table: &Table) -> Vec<usize> {
    table
        .rows
        .iter()
        .enumerate()
        .filter(|(_, row)| !is_degenerate(row))
        .map(|(i, _)| i)
        .collect()
}
