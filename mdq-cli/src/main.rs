//! MDQ CLI: normalize, quality-check and reconcile provider CSV batches.
//!
//! Commands:
//! - `normalize`: map a provider CSV onto the canonical schema
//! - `check`: normalize, then flag anomalies and score the source
//! - `reconcile`: compare a primary and a secondary source within tolerance
//! - `merge`: build a statistical consensus across any number of sources
//!
//! Every command prints one JSON document to stdout or `--out`.

mod commands;
mod input;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use commands::Stages;

#[derive(Parser)]
#[command(
    name = "mdq",
    about = "MDQ CLI: market-data normalization, quality and reconciliation"
)]
struct Cli {
    /// Pipeline config (TOML). Defaults are used when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Write the JSON result here instead of stdout.
    #[arg(long, global = true)]
    out: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Map a provider CSV onto the canonical schema.
    Normalize {
        /// Data type: price, dividend or earnings.
        #[arg(long = "type")]
        data_type: String,

        /// Source name. Defaults to the file stem.
        #[arg(long)]
        source: Option<String>,

        file: PathBuf,
    },
    /// Normalize a CSV, then report anomalies and source reliability.
    Check {
        /// Data type: price, dividend or earnings.
        #[arg(long = "type")]
        data_type: String,

        /// Source name. Defaults to the file stem.
        #[arg(long)]
        source: Option<String>,

        file: PathBuf,
    },
    /// Reconcile a primary source against a secondary one.
    Reconcile {
        /// Data type: price, dividend or earnings.
        #[arg(long = "type")]
        data_type: String,

        /// Key columns, comma-separated (e.g. date,symbol).
        #[arg(long)]
        keys: Option<String>,

        /// Value columns to compare, comma-separated.
        #[arg(long)]
        values: Option<String>,

        primary: PathBuf,
        secondary: PathBuf,
    },
    /// Merge any number of sources into one consensus record per key.
    Merge {
        /// Data type: price, dividend or earnings.
        #[arg(long = "type")]
        data_type: String,

        /// Key columns, comma-separated.
        #[arg(long)]
        keys: Option<String>,

        /// Value columns to merge, comma-separated.
        #[arg(long)]
        values: Option<String>,

        /// Weight majority votes by each source's reliability score.
        #[arg(long, default_value_t = false)]
        weighted: bool,

        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let stages = Stages::load(cli.config.as_deref())?;
    let output = match cli.command {
        Commands::Normalize {
            data_type,
            source,
            file,
        } => commands::normalize(&stages, &file, &data_type, source.as_deref())?,
        Commands::Check {
            data_type,
            source,
            file,
        } => commands::check(&stages, &file, &data_type, source.as_deref())?,
        Commands::Reconcile {
            data_type,
            keys,
            values,
            primary,
            secondary,
        } => commands::reconcile(
            &stages,
            &data_type,
            keys.as_deref(),
            values.as_deref(),
            &primary,
            &secondary,
        )?,
        Commands::Merge {
            data_type,
            keys,
            values,
            weighted,
            files,
        } => commands::merge(
            &stages,
            &data_type,
            keys.as_deref(),
            values.as_deref(),
            weighted,
            &files,
        )?,
    };

    write_output(cli.out.as_deref(), &output)
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn write_output(out: Option<&Path>, value: &serde_json::Value) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match out {
        Some(path) => std::fs::write(path, json)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{json}")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_merge_with_globals() {
        let cli = Cli::try_parse_from([
            "mdq", "merge", "--type", "price", "--weighted", "a.csv", "b.csv", "--verbose",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Merge { weighted, files, .. } => {
                assert!(weighted);
                assert_eq!(files.len(), 2);
            }
            _ => panic!("expected merge"),
        }
    }

    #[test]
    fn merge_requires_files() {
        assert!(Cli::try_parse_from(["mdq", "merge", "--type", "price"]).is_err());
    }

    #[test]
    fn output_goes_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        write_output(Some(&path), &serde_json::json!({ "ok": true })).unwrap();
        let back: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back["ok"], true);
    }
}
