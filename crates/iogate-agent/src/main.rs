//! iogate: immunotherapy eligibility, efficacy gating and irAE-aware drug selection.
//! Entry point for the command-line binary.

mod config;
mod report;

use anyhow::Context;
use clap::{Parser, Subcommand};
use iogate_common::reference::ReferenceTables;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::report::{parse_profile, Report};

#[derive(Parser)]
#[command(
    name = "iogate",
    version,
    about = "Checkpoint-inhibitor eligibility and safety-adjusted drug selection",
    long_about = "Evaluates a patient's biomarker profile against IO eligibility rules, \
                  scores candidate checkpoint inhibitors through the biomarker gates and \
                  selects the lowest-irAE-risk option."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assess one patient profile
    #[command(about = "Assess a patient profile (outputs: JSON report on stdout)")]
    Assess {
        /// Path to the patient profile JSON
        #[arg(long, value_name = "FILE")]
        profile: String,

        /// Reference tables (.yaml, .json or .toml); overrides the config file
        #[arg(long, value_name = "FILE")]
        tables: Option<String>,

        /// Single-line JSON
        #[arg(long)]
        compact: bool,
    },

    /// Print the validated reference tables
    Tables {
        #[arg(long, value_name = "FILE")]
        tables: Option<String>,
    },
}

fn load_tables(path: Option<&str>) -> anyhow::Result<(ReferenceTables, String)> {
    match path {
        Some(p) => {
            let tables = ReferenceTables::from_path(p)
                .with_context(|| format!("loading reference tables from {p}"))?;
            info!(path = p, drugs = tables.drug_profiles.len(), "Reference tables loaded");
            Ok((tables, p.to_string()))
        }
        None => Ok((ReferenceTables::default(), "builtin".to_string())),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = Config::path();
    let loaded = Config::load_from(&config_path)?;
    let config = loaded.clone().unwrap_or_default();

    // Logs on stderr so stdout carries only the report.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter)),
        )
        .init();

    if loaded.is_none() {
        warn!(path = %config_path.display(), "Config file not found, using defaults");
    }

    match cli.command {
        Commands::Assess { profile, tables, compact } => {
            let (tables, source) = load_tables(config.tables_path(tables.as_deref()))?;
            let content = std::fs::read_to_string(&profile)
                .with_context(|| format!("reading patient profile {profile}"))?;
            let patient = parse_profile(&content)
                .with_context(|| format!("parsing patient profile {profile}"))?;

            let report = Report::build(&patient, &tables, &source)?;
            info!(report_id = %report.report_id, patient = %patient.patient_id, "Report generated");
            println!("{}", report.to_json(config.output.pretty && !compact)?);
        }
        Commands::Tables { tables } => {
            let (tables, _) = load_tables(config.tables_path(tables.as_deref()))?;
            let out = if config.output.pretty {
                serde_json::to_string_pretty(&tables)?
            } else {
                serde_json::to_string(&tables)?
            };
            println!("{out}");
        }
    }

    Ok(())
}
