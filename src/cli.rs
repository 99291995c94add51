//! Command-line front end: one pipeline run per invocation.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use log::info;

use crate::config::PipelineConfig;
use crate::data::append::NewPlanet;
use crate::render;
use crate::session::Session;

#[derive(Parser, Debug)]
#[command(name = "earth")]
#[command(about = "EARTH - Exoplanet Assessment for Relative Terrestrial Habitability", version)]
pub struct Cli {
    /// Path to TOML config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Catalog file (.csv, .txt, .tsv, .dat, .json, .parquet, .fits)
    pub file: PathBuf,

    /// Minimum stellar temperature in Kelvin
    #[arg(long)]
    pub min_teff: Option<f64>,

    /// Maximum stellar temperature in Kelvin
    #[arg(long)]
    pub max_teff: Option<f64>,

    /// Show the row for this exact planet name
    #[arg(long)]
    pub find: Option<String>,

    /// Add a planet: "name,host,orbit,radius,stellar_radius,spectral_type,teff"
    #[arg(long = "add", value_name = "RECORD")]
    pub add: Vec<String>,

    /// Output format for the result table
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

/// Parse one `--add` record. Fields are trimmed; a number that does not
/// parse becomes NaN, which no temperature window admits.
pub fn parse_record(record: &str) -> Result<NewPlanet> {
    let fields: Vec<&str> = record.split(',').map(str::trim).collect();
    if fields.len() != 7 {
        bail!(
            "expected 7 comma-separated fields (name,host,orbit,radius,stellar_radius,spectral_type,teff), got {}",
            fields.len()
        );
    }
    let number = |s: &str| s.parse::<f64>().unwrap_or(f64::NAN);
    Ok(NewPlanet::new(
        fields[0],
        fields[1],
        number(fields[2]),
        number(fields[3]),
        number(fields[4]),
        number(fields[6]),
    )
    .with_spectral_type(fields[5]))
}

pub fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_toml_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(min) = cli.min_teff {
        config.min_teff = min;
    }
    if let Some(max) = cli.max_teff {
        config.max_teff = max;
    }
    info!(
        "Stellar temperature window: {} K to {} K",
        config.min_teff, config.max_teff
    );

    let planets = cli
        .add
        .iter()
        .map(|r| parse_record(r).with_context(|| format!("invalid --add record '{r}'")))
        .collect::<Result<Vec<_>>>()?;

    let mut session = Session::new(config);
    session
        .open(&cli.file)
        .with_context(|| format!("loading {}", cli.file.display()))?;
    if let Some(report) = &session.report {
        println!("{report}");
    }

    if !planets.is_empty() {
        let added = session.add_planets(&planets);
        if let Some(msg) = &session.status_message {
            println!("{msg}");
        }
        if added > 0 {
            println!("Newly added planets:");
            println!("{}", render::pretty(&session.filtered.tail(added))?);
        }
    }

    match cli.format {
        OutputFormat::Table => println!("{}", render::pretty(&session.filtered)?),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&render::to_json(&session.filtered))?),
    }

    if let Some(name) = &cli.find {
        match session.lookup(name) {
            Some(row) => {
                println!("Details for the specified planet:");
                let mut single = session.filtered.clone();
                single.rows = vec![row.clone()];
                println!("{}", render::pretty(&single)?);
            }
            None => println!("No data found for planet '{name}'."),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_add_record() {
        let p = parse_record(" Home , Sun , 1.0 , 1 , 1 , G2 V , 5772 ").unwrap();
        assert_eq!(p.name, "Home");
        assert_eq!(p.spectral_type, "G2 V");
        assert_eq!(p.effective_temp, 5772.0);
    }

    #[test]
    fn empty_spectral_type_and_bad_numbers() {
        let p = parse_record("x,y,1,2,3,,warm").unwrap();
        assert_eq!(p.spectral_type, "");
        assert!(p.effective_temp.is_nan());
    }

    #[test]
    fn wrong_field_count_is_rejected() {
        assert!(parse_record("x,y,1").is_err());
    }

    #[test]
    fn cli_arguments() {
        let cli = Cli::try_parse_from([
            "earth", "cat.csv", "--min-teff", "3000", "--add", "a,b,1,1,1,,5000", "--add",
            "c,d,1,1,1,G,5100", "--format", "json", "-vv",
        ])
        .unwrap();
        assert_eq!(cli.min_teff, Some(3000.0));
        assert_eq!(cli.add.len(), 2);
        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.verbose, 2);
    }
}
