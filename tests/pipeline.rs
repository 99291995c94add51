use earth_habitability::data::fits::encode_bintable;
use earth_habitability::data::model::{
    ColumnKind, ORBIT_RATIO_COLUMN, RADIUS_RATIO_COLUMN,
};
use earth_habitability::data::{
    append, compute, find, load, normalize, HeaderMode, NewPlanet, PipelineError, Table, Value,
};

const MIN_TEFF: f64 = 4000.0;
const MAX_TEFF: f64 = 6000.0;

fn load_csv(text: &str) -> Table {
    load(text.as_bytes(), "catalog.csv", HeaderMode::Auto).unwrap().0
}

fn run(text: &str, min: f64, max: f64) -> Table {
    let table = normalize(&load_csv(text), 7).unwrap();
    compute(&table, min, max)
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * b.abs().max(1.0)
}

#[test]
fn single_row_scenario() {
    let out = run("name,host,100,2,1,G,5500\n", MIN_TEFF, MAX_TEFF);
    assert_eq!(out.len(), 1);

    let r1 = out.column_index(RADIUS_RATIO_COLUMN).unwrap();
    let r2 = out.column_index(ORBIT_RATIO_COLUMN).unwrap();
    let row = &out.rows[0];
    assert!(close(row.number(r1).unwrap(), 54.8761));
    assert!(close(row.number(r2).unwrap(), 10714.28));
}

#[test]
fn hot_star_is_excluded() {
    let out = run("name,host,100,2,1,G,7000\n", MIN_TEFF, MAX_TEFF);
    assert!(out.is_empty());
    // the ratio columns exist even when nothing survives
    assert_eq!(out.width(), 9);
}

#[test]
fn missing_planet_radius_is_dropped() {
    let out = run("name,host,100,--,1,G,5500\n", MIN_TEFF, MAX_TEFF);
    assert!(out.is_empty());
}

#[test]
fn normalize_reports_real_width_for_narrow_tables() {
    for width in 0..7 {
        let mut table = Table::with_canonical_columns(width);
        table.push_row(vec![Value::Text("x".into()); width]);
        match normalize(&table, 7) {
            Err(PipelineError::Schema { expected, actual }) => {
                assert_eq!(expected, 7);
                assert_eq!(actual, width);
            }
            other => panic!("width {width}: expected schema error, got {other:?}"),
        }
    }
}

#[test]
fn normalize_accepts_any_wide_table() {
    for width in 7..12 {
        let mut table = Table::with_canonical_columns(width);
        table.push_row(vec![Value::Text("--".into()); width]);
        table.push_row(vec![Value::Text("junk".into()); width]);
        table.push_row(Vec::new());
        let out = normalize(&table, 7).unwrap();
        assert!(out.rows[0].fields.iter().all(|v| *v == Value::Float(0.0)));
        assert!(out.rows[2].fields.iter().all(|v| *v == Value::Float(0.0)));
    }
}

const CATALOG: &str = "\
# synthetic
pl_name,hostname,pl_orbsmax,pl_rade,st_rad,st_spectype,st_teff
Kepler-22 b,Kepler-22,0.812,2.1,0.98,G5 V,5518
Kepler-62 f,Kepler-62,0.718,1.41,0.64,K2 V,4925
KELT-9 b,KELT-9,0.034,21.2,2.36,A0,10170
TRAPPIST-1 e,TRAPPIST-1,0.029,0.92,0.12,M8 V,2566
Kepler-452 b,Kepler-452,1.046,1.63,1.11,--,5757
Lost b,Lost,--,1.0,1.0,G,5000
Flat b,Flat,1.0,1.0,0,G,5000
Edge b,Edge,1.0,1.0,1.0,K,4000
Top b,Top,1.0,1.0,1.0,F,6000
";

#[test]
fn compute_never_keeps_zero_inputs() {
    let out = run(CATALOG, 0.0, 20000.0);
    for row in &out.rows {
        for idx in [2, 3, 4] {
            assert!(!row.fields[idx].is_zero(), "{:?}", row.planet_name());
        }
    }
    assert!(find(&out, "Lost b").is_none());
    assert!(find(&out, "Flat b").is_none());
}

#[test]
fn ratios_hold_for_every_row() {
    let out = run(CATALOG, 0.0, 20000.0);
    let r1 = out.column_index(RADIUS_RATIO_COLUMN).unwrap();
    let r2 = out.column_index(ORBIT_RATIO_COLUMN).unwrap();
    assert_eq!(out.columns[r1].kind, ColumnKind::Derived);

    for row in &out.rows {
        let (d, rp, rs) = (
            row.number(2).unwrap(),
            row.number(3).unwrap(),
            row.number(4).unwrap(),
        );
        assert!(close(row.number(r1).unwrap(), rs / rp * 109.7522));
        assert!(close(row.number(r2).unwrap(), d / rs * 107.1428));
    }
}

#[test]
fn range_is_inclusive_and_order_preserved() {
    let out = run(CATALOG, MIN_TEFF, MAX_TEFF);
    let names: Vec<_> = out.rows.iter().filter_map(|r| r.planet_name()).collect();
    assert_eq!(
        names,
        vec!["Kepler-22 b", "Kepler-62 f", "Kepler-452 b", "Edge b", "Top b"]
    );
}

#[test]
fn sentinel_in_text_column_becomes_zero() {
    let out = run(CATALOG, MIN_TEFF, MAX_TEFF);
    let row = find(&out, "Kepler-452 b").unwrap();
    assert_eq!(row.fields[5], Value::Float(0.0));
}

#[test]
fn compute_is_idempotent() {
    let once = run(CATALOG, MIN_TEFF, MAX_TEFF);
    let twice = compute(&once, MIN_TEFF, MAX_TEFF);
    assert_eq!(once, twice);
}

#[test]
fn find_exact_case_sensitive() {
    let out = run(CATALOG, MIN_TEFF, MAX_TEFF);
    let row = find(&out, "Kepler-22 b").unwrap();
    assert_eq!(row.fields[1], Value::Text("Kepler-22".into()));
    assert!(find(&out, "kepler-22 b").is_none());
    assert!(find(&out, "Kepler-22").is_none());
    assert!(find(&out, "KELT-9 b").is_none());
}

#[test]
fn append_nothing_is_identity() {
    let existing = run(CATALOG, MIN_TEFF, MAX_TEFF);
    let out = append(&existing, &[], MIN_TEFF, MAX_TEFF);
    assert_eq!(out.table, existing);
    assert_eq!(out.added, 0);
}

#[test]
fn append_keeps_existing_rows_as_prefix() {
    let existing = run(CATALOG, MIN_TEFF, MAX_TEFF);
    let new = [
        NewPlanet::new("Earth", "Sun", 1.0, 1.0, 1.0, 5772.0).with_spectral_type("G2 V"),
        NewPlanet::new("Proxima b", "Proxima Centauri", 0.0485, 1.07, 0.154, 3042.0),
        NewPlanet::new("Warm", "Star", 0.5, 1.5, 0.9, 5100.0),
    ];
    let out = append(&existing, &new, MIN_TEFF, MAX_TEFF);

    assert_eq!(out.added, 2);
    assert_eq!(out.table.len(), existing.len() + 2);
    assert_eq!(&out.table.rows[..existing.len()], &existing.rows[..]);
    assert_eq!(out.table.rows[existing.len()].planet_name(), Some("Earth"));
    assert_eq!(out.table.rows[existing.len() + 1].planet_name(), Some("Warm"));

    let r1 = out.table.column_index(RADIUS_RATIO_COLUMN).unwrap();
    let earth = find(&out.table, "Earth").unwrap();
    assert!(close(earth.number(r1).unwrap(), 109.7522));
}

#[test]
fn append_with_no_qualifying_rows_returns_existing() {
    let existing = run(CATALOG, MIN_TEFF, MAX_TEFF);
    let new = [NewPlanet::new("Cold", "Dwarf", 0.1, 1.0, 0.1, 2500.0)];
    let out = append(&existing, &new, MIN_TEFF, MAX_TEFF);
    assert_eq!(out.added, 0);
    assert_eq!(out.table, existing);
}

#[test]
fn text_and_fits_inputs_agree_with_csv() {
    let from_csv = run(CATALOG, MIN_TEFF, MAX_TEFF);

    let txt: String = CATALOG
        .lines()
        .filter(|l| !l.starts_with('#'))
        .map(|l| {
            l.split(',')
                .map(|f| if f.contains(' ') { format!("\"{f}\"") } else { f.to_string() })
                .collect::<Vec<_>>()
                .join("  ")
        })
        .collect::<Vec<_>>()
        .join("\n");
    let (table, _) = load(txt.as_bytes(), "catalog.txt", HeaderMode::Auto).unwrap();
    let from_txt = compute(&normalize(&table, 7).unwrap(), MIN_TEFF, MAX_TEFF);
    assert_eq!(from_txt.len(), from_csv.len());

    let fits = encode_bintable(&load_csv(CATALOG));
    let (table, report) = load(&fits[..], "catalog.FITS", HeaderMode::Auto).unwrap();
    assert_eq!(report.rows, 9);
    let from_fits = compute(&normalize(&table, 7).unwrap(), MIN_TEFF, MAX_TEFF);
    let names = |t: &Table| -> Vec<String> {
        t.rows
            .iter()
            .filter_map(|r| r.planet_name().map(str::to_string))
            .collect()
    };
    assert_eq!(names(&from_fits), names(&from_csv));
}

#[test]
fn unsupported_extension_is_fatal() {
    let err = load(CATALOG.as_bytes(), "catalog.xls", HeaderMode::Auto).unwrap_err();
    assert!(matches!(err, PipelineError::UnsupportedFormat { ref extension } if extension == "xls"));
    assert!(err.to_string().contains(".xls"));
}

#[test]
fn corrupt_fits_is_io_error() {
    let err = load(&b"SIMPLE  =                    T"[..], "broken.fits", HeaderMode::Auto).unwrap_err();
    match err {
        PipelineError::Io { source_name, message } => {
            assert_eq!(source_name, "broken.fits");
            assert!(message.contains("truncated"));
        }
        other => panic!("expected Io, got {other:?}"),
    }
}

#[test]
fn fits_with_impossible_column_sizes_is_io_error() {
    use earth_habitability::data::fits::HeaderBuilder;

    let mut bytes = HeaderBuilder::new()
        .raw("SIMPLE", "T")
        .raw("BITPIX", 8)
        .raw("NAXIS", 0)
        .finish();
    bytes.extend(
        HeaderBuilder::new()
            .string("XTENSION", "BINTABLE")
            .raw("BITPIX", 8)
            .raw("NAXIS", 2)
            .raw("NAXIS1", 8)
            .raw("NAXIS2", 1)
            .raw("TFIELDS", 2)
            .string("TFORM1", "9223372036854775808B")
            .string("TFORM2", "9223372036854775808B")
            .finish(),
    );
    bytes.resize(bytes.len() + 2880, 0);

    let err = load(&bytes[..], "huge.fits", HeaderMode::Auto).unwrap_err();
    assert!(matches!(err, PipelineError::Io { ref source_name, .. } if source_name == "huge.fits"));
}
