use log::debug;

use super::filter::{in_range_indices, non_degenerate_indices, TeffRange};
use super::model::{
    orbit_ratio, radius_ratio, Column, ColumnKind, Row, Stage, Table, Value, DERIVED_COLUMNS,
    ORBITAL_DISTANCE, PLANET_RADIUS, STELLAR_RADIUS,
};

/// Filter `table` to `min_teff <= st_teff <= max_teff`, append the two
/// ratio columns, then drop rows whose distance or radius is zero.
///
/// The input is not modified. Running `compute` again on its own output
/// with the same bounds returns an identical table.
pub fn compute(table: &Table, min_teff: f64, max_teff: f64) -> Table {
    let range = TeffRange::new(min_teff, max_teff);

    let mut out = table.select(&in_range_indices(table, range));
    let in_range = out.len();
    add_derived_columns(&mut out);

    let mut out = out.select(&non_degenerate_indices(&out));
    out.stage = Stage::Computed;
    debug!(
        "compute [{min_teff}, {max_teff}]: {} rows in, {in_range} in range, {} kept",
        table.len(),
        out.len()
    );
    out
}

/// The two ratios for one row, in [`DERIVED_COLUMNS`] order. Non-numeric
/// inputs give missing ratios; zero inputs give infinities or NaN.
pub fn derived_values(row: &Row) -> [Value; 2] {
    let ratio = |a: usize, b: usize, f: fn(f64, f64) -> f64| match (row.number(a), row.number(b)) {
        (Some(a), Some(b)) => Value::Float(f(a, b)),
        _ => Value::Missing,
    };
    [
        ratio(STELLAR_RADIUS, PLANET_RADIUS, radius_ratio),
        ratio(ORBITAL_DISTANCE, STELLAR_RADIUS, orbit_ratio),
    ]
}

/// Append the ratio columns, or recompute them in place if the table
/// already carries them.
pub(crate) fn add_derived_columns(table: &mut Table) {
    let slots: Vec<usize> = DERIVED_COLUMNS
        .iter()
        .map(|name| {
            match table
                .columns
                .iter()
                .position(|c| c.kind == ColumnKind::Derived && c.name == *name)
            {
                Some(idx) => idx,
                None => {
                    table.columns.push(Column::derived(*name));
                    table.columns.len() - 1
                }
            }
        })
        .collect();

    let width = table.width();
    for row in &mut table.rows {
        let values = derived_values(row);
        row.fields.resize(width, Value::Missing);
        for (slot, value) in slots.iter().zip(values) {
            row.fields[*slot] = value;
        }
    }
}

/// Exact, case-sensitive lookup by planet name. Uses the header-named
/// planet column when there is one, position 0 otherwise.
pub fn find<'a>(table: &'a Table, name: &str) -> Option<&'a Row> {
    let idx = table.planet_name_index();
    table
        .rows
        .iter()
        .find(|row| row.get(idx).and_then(Value::as_str) == Some(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{ORBIT_RATIO_COLUMN, RADIUS_RATIO_COLUMN};

    fn planet(name: &str, orbit: f64, radius: f64, st_rad: f64, teff: f64) -> Vec<Value> {
        vec![
            Value::Text(name.into()),
            Value::Text("host".into()),
            Value::Float(orbit),
            Value::Float(radius),
            Value::Float(st_rad),
            Value::Text("G".into()),
            Value::Float(teff),
        ]
    }

    fn catalog() -> Table {
        let mut t = Table::with_canonical_columns(7);
        t.push_row(planet("a", 100.0, 2.0, 1.0, 5500.0));
        t.push_row(planet("hot", 100.0, 2.0, 1.0, 7000.0));
        t.push_row(planet("flat", 100.0, 0.0, 1.0, 5000.0));
        t.push_row(planet("edge", 1.0, 1.0, 1.0, 4000.0));
        t
    }

    #[test]
    fn appends_named_ratio_columns() {
        let out = compute(&catalog(), 4000.0, 6000.0);
        assert_eq!(out.width(), 9);
        assert_eq!(out.columns[7].name, RADIUS_RATIO_COLUMN);
        assert_eq!(out.columns[8].name, ORBIT_RATIO_COLUMN);
        assert_eq!(out.columns[7].kind, ColumnKind::Derived);
        assert_eq!(out.source_width(), 7);
        assert_eq!(out.stage, Stage::Computed);
    }

    #[test]
    fn filters_by_range_then_drops_degenerate_rows() {
        let out = compute(&catalog(), 4000.0, 6000.0);
        let names: Vec<_> = out.rows.iter().filter_map(Row::planet_name).collect();
        assert_eq!(names, vec!["a", "edge"]);
    }

    #[test]
    fn ratio_values() {
        let out = compute(&catalog(), 4000.0, 6000.0);
        let row = &out.rows[0];
        assert!((row.number(7).unwrap() - 54.8761).abs() < 1e-9);
        assert!((row.number(8).unwrap() - 10714.28).abs() < 1e-9);
    }

    #[test]
    fn second_pass_is_a_no_op() {
        let once = compute(&catalog(), 4000.0, 6000.0);
        let twice = compute(&once, 4000.0, 6000.0);
        assert_eq!(once, twice);
    }

    #[test]
    fn input_is_not_mutated() {
        let input = catalog();
        let before = input.clone();
        let _ = compute(&input, 4000.0, 6000.0);
        assert_eq!(input, before);
    }

    #[test]
    fn find_is_exact_and_case_sensitive() {
        let mut t = Table::with_canonical_columns(7);
        t.push_row(planet("Kepler-22 b", 0.8, 2.1, 0.98, 5518.0));
        assert!(find(&t, "Kepler-22 b").is_some());
        assert!(find(&t, "kepler-22 b").is_none());
        assert!(find(&t, "Kepler-22").is_none());
    }

    #[test]
    fn find_uses_named_planet_column() {
        let mut t = Table::new(["id", "pl_name", "c", "d", "e", "f", "g"]);
        t.push_row(vec![Value::Text("x".into()), Value::Text("TOI-700 d".into())]);
        assert!(find(&t, "TOI-700 d").is_some());
        assert!(find(&t, "x").is_none());
    }
}
