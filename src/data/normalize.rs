use log::debug;

use super::error::{PipelineError, Result};
use super::model::{
    Stage, Table, Value, EFFECTIVE_TEMP, ORBITAL_DISTANCE, PLANET_RADIUS, STELLAR_RADIUS,
};

/// Token catalogs use for "no measurement".
pub const MISSING_TOKEN: &str = "--";

/// Positions coerced to numbers before anything is computed.
pub const NUMERIC_COLUMNS: [usize; 4] = [ORBITAL_DISTANCE, PLANET_RADIUS, STELLAR_RADIUS, EFFECTIVE_TEMP];

/// Validate the width of `table` and return a normalized copy.
///
/// * fewer than `min_columns` columns → [`PipelineError::Schema`]
/// * positions 2, 3, 4 and 6 are coerced to floats; anything unparseable
///   becomes missing instead of failing
/// * every `"--"` cell, in any column, becomes missing
/// * every missing cell, in any column, becomes `0`
///
/// Zero is the marker for "originally missing or malformed"; the metric
/// engine drops rows whose radius or distance columns carry it.
pub fn normalize(table: &Table, min_columns: usize) -> Result<Table> {
    normalize_with_token(table, min_columns, MISSING_TOKEN)
}

/// [`normalize`] with a caller-chosen sentinel token.
pub fn normalize_with_token(table: &Table, min_columns: usize, missing_token: &str) -> Result<Table> {
    if table.width() < min_columns {
        return Err(PipelineError::Schema {
            expected: min_columns,
            actual: table.width(),
        });
    }

    let mut out = table.clone();
    let mut filled = 0usize;

    for row in &mut out.rows {
        for idx in NUMERIC_COLUMNS {
            if let Some(cell) = row.fields.get_mut(idx) {
                *cell = cell.to_numeric();
            }
        }

        for cell in &mut row.fields {
            let missing = match cell {
                Value::Missing => true,
                Value::Text(s) => s == missing_token,
                Value::Float(v) => v.is_nan(),
                _ => false,
            };
            if missing {
                *cell = Value::Float(0.0);
                filled += 1;
            }
        }
    }

    out.stage = out.stage.max(Stage::Normalized);
    debug!(
        "normalized {} rows x {} columns, {filled} missing cells zero-filled",
        out.len(),
        out.width()
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(fields: &[&str]) -> Vec<Value> {
        fields.iter().map(|f| Value::guess(f)).collect()
    }

    #[test]
    fn too_few_columns_reports_actual_width() {
        let table = Table::with_canonical_columns(5);
        assert_eq!(
            normalize(&table, 7).unwrap_err(),
            PipelineError::Schema {
                expected: 7,
                actual: 5
            }
        );
    }

    #[test]
    fn sentinel_is_zero_filled_in_every_column() {
        let mut table = Table::with_canonical_columns(7);
        table.push_row(row(&["--", "Kepler-22", "0.8", "--", "0.98", "--", "5518"]));
        let out = normalize(&table, 7).unwrap();

        let fields = &out.rows[0].fields;
        assert_eq!(fields[0], Value::Float(0.0));
        assert_eq!(fields[1], Value::Text("Kepler-22".into()));
        assert_eq!(fields[2], Value::Float(0.8));
        assert_eq!(fields[3], Value::Float(0.0));
        assert_eq!(fields[5], Value::Float(0.0));
        assert_eq!(fields[6], Value::Float(5518.0));
        assert_eq!(out.stage, Stage::Normalized);
    }

    #[test]
    fn unparseable_numbers_become_zero_without_error() {
        let mut table = Table::with_canonical_columns(8);
        table.push_row(row(&["b", "h", "far", "2", "1", "G2", "hot", "note"]));
        let out = normalize(&table, 7).unwrap();

        let fields = &out.rows[0].fields;
        assert_eq!(fields[2], Value::Float(0.0));
        assert_eq!(fields[6], Value::Float(0.0));
        // non-numeric positions are left alone
        assert_eq!(fields[5], Value::Text("G2".into()));
        assert_eq!(fields[7], Value::Text("note".into()));
    }

    #[test]
    fn empty_cells_are_filled_everywhere() {
        let mut table = Table::with_canonical_columns(7);
        table.push_row(vec![Value::Text("b".into())]);
        let out = normalize(&table, 7).unwrap();
        assert!(out.rows[0].fields[1..].iter().all(|v| *v == Value::Float(0.0)));
    }

    #[test]
    fn custom_token() {
        let mut table = Table::with_canonical_columns(7);
        table.push_row(row(&["b", "N/A", "1", "2", "3", "G", "5000"]));
        let out = normalize_with_token(&table, 7, "N/A").unwrap();
        assert_eq!(out.rows[0].fields[1], Value::Float(0.0));
    }

    #[test]
    fn input_is_left_untouched() {
        let mut table = Table::with_canonical_columns(7);
        table.push_row(row(&["b", "h", "--", "2", "1", "G", "5000"]));
        let before = table.clone();
        let _ = normalize(&table, 7).unwrap();
        assert_eq!(table, before);
    }
}
