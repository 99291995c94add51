//! Writes a small synthetic exoplanet catalog in every supported format.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use parquet::arrow::ArrowWriter;

use earth_habitability::data::fits::encode_bintable;
use earth_habitability::data::model::{Table, Value, CANONICAL_COLUMNS};
use earth_habitability::render;

#[derive(Parser, Debug)]
#[command(name = "generate_sample", about = "Write sample_catalog.{csv,txt,json,parquet,fits}")]
struct Args {
    /// Directory the catalogs are written to
    #[arg(default_value = ".")]
    out_dir: PathBuf,

    /// Number of planets to generate
    #[arg(default_value_t = 40)]
    rows: usize,
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn uniform(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_f64()
    }
}

/// Rough Morgan-Keenan class for a main-sequence star of temperature `teff`.
fn spectral_type(teff: f64) -> &'static str {
    match teff as u32 {
        0..=3699 => "M V",
        3700..=5199 => "K V",
        5200..=5999 => "G V",
        6000..=7499 => "F V",
        _ => "A V",
    }
}

fn round(v: f64, digits: i32) -> f64 {
    let p = 10f64.powi(digits);
    (v * p).round() / p
}

fn build_catalog(rows: usize, rng: &mut SimpleRng) -> Table {
    let mut table = Table::new(CANONICAL_COLUMNS);
    for i in 0..rows {
        let host = format!("Sample-{}", i / 2 + 1);
        let name = format!("{host} {}", if i % 2 == 0 { 'b' } else { 'c' });
        let teff = round(rng.uniform(2500.0, 7500.0), 0);
        let stellar_radius = round((teff / 5772.0).powf(1.5) * rng.uniform(0.8, 1.2), 3);
        let orbit = round(rng.uniform(0.01, 2.0), 4);

        // Every seventh planet has no measured radius, like real catalog gaps.
        let radius = if i % 7 == 3 {
            Value::Text("--".into())
        } else {
            Value::Float(round(rng.uniform(0.5, 15.0), 2))
        };

        table.push_row(vec![
            Value::Text(name),
            Value::Text(host),
            Value::Float(orbit),
            radius,
            Value::Float(stellar_radius),
            Value::Text(spectral_type(teff).to_string()),
            Value::Integer(teff as i64),
        ]);
    }
    table
}

fn write_csv(table: &Table, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(table.column_names())?;
    for row in &table.rows {
        writer.write_record(row.fields.iter().map(|v| v.to_string()))?;
    }
    writer.flush()?;
    Ok(())
}

fn write_txt(table: &Table, path: &Path) -> Result<()> {
    let mut out = String::from("# synthetic catalog, whitespace delimited\n");
    out.push_str(&table.column_names().join(" "));
    out.push('\n');
    for row in &table.rows {
        let fields: Vec<String> = row
            .fields
            .iter()
            .map(|v| match v {
                Value::Text(s) if s.contains(' ') => format!("\"{s}\""),
                other => other.to_string(),
            })
            .collect();
        out.push_str(&fields.join("  "));
        out.push('\n');
    }
    std::fs::write(path, out)?;
    Ok(())
}

fn write_parquet(table: &Table, path: &Path) -> Result<()> {
    let batch = render::to_record_batch(table)?;
    let file = std::fs::File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

fn main() -> Result<()> {
    let Args { out_dir, rows } = Args::parse();
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("creating {}", out_dir.display()))?;

    let mut rng = SimpleRng::new(42);
    let table = build_catalog(rows, &mut rng);

    let path = |ext: &str| out_dir.join(format!("sample_catalog.{ext}"));

    write_csv(&table, &path("csv")).context("writing CSV")?;
    write_txt(&table, &path("txt")).context("writing TXT")?;
    std::fs::write(
        path("json"),
        serde_json::to_string_pretty(&render::to_json(&table))?,
    )
    .context("writing JSON")?;
    write_parquet(&table, &path("parquet")).context("writing Parquet")?;
    std::fs::write(path("fits"), encode_bintable(&table)).context("writing FITS")?;

    println!(
        "Wrote {} planets to {}/sample_catalog.{{csv,txt,json,parquet,fits}}",
        table.len(),
        out_dir.display()
    );
    Ok(())
}
