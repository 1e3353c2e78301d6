#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line toolchain for the data hub.
//!
//! One binary covering the operator workflow end to end: register
//! sources and datasets from a TOML config, run file and API
//! ingestions, inspect datasets, run analyses, and drive the built-in
//! sample demo.

mod commands;
mod config;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use data_hub_store::db::{DataHubDb, connect_from_env};

use crate::commands::AnalyzeKind;

/// Data hub ingestion and analytics toolchain.
#[derive(Parser)]
#[command(version, about = "Data hub ingestion and analytics toolchain")]
struct Args {
    /// SQLite database path, overriding DATA_HUB_DB_PATH.
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Register the sources and datasets named in a TOML hub config.
    Setup {
        /// Path of the hub config file.
        #[arg(long)]
        config: PathBuf,
    },
    /// Load the built-in product sample through the ingestion pipeline.
    Sample {
        /// Dataset name to load the sample into.
        #[arg(long, default_value = "Sample Product Data")]
        dataset: String,
    },
    /// Ingest a local JSON or CSV file into an existing dataset.
    IngestFile {
        /// Source id.
        #[arg(long)]
        source: i64,
        /// Dataset id.
        #[arg(long)]
        dataset: i64,
        /// File to ingest.
        #[arg(long)]
        path: PathBuf,
        /// File format, json or csv.
        #[arg(long, default_value = "json")]
        format: String,
    },
    /// Ingest from an HTTP API endpoint into an existing dataset.
    IngestApi {
        /// Source id.
        #[arg(long)]
        source: i64,
        /// Dataset id.
        #[arg(long)]
        dataset: i64,
        /// Endpoint URL to pull from.
        #[arg(long)]
        endpoint: String,
        /// Key of the response object holding the record list.
        #[arg(long)]
        data_field: Option<String>,
    },
    /// List all datasets.
    Datasets,
    /// Run one analysis and print the stored result.
    Analyze {
        /// Dataset id.
        #[arg(long)]
        dataset: i64,
        /// Which analysis to run.
        #[arg(long, value_enum)]
        kind: AnalyzeKind,
        /// Timestamp field, required for trend analyses.
        #[arg(long)]
        time_field: Option<String>,
        /// Numeric value field, required for trend analyses.
        #[arg(long)]
        value_field: Option<String>,
    },
    /// Run the end-to-end sample workflow.
    Demo,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();

    let args = Args::parse();
    let db = match &args.db_path {
        Some(path) => DataHubDb::open(path)?,
        None => connect_from_env()?,
    };

    match args.command {
        Command::Setup { config } => commands::setup(&db, &config),
        Command::Sample { dataset } => commands::load_sample(&db, &dataset).await.map(|_| ()),
        Command::IngestFile {
            source,
            dataset,
            path,
            format,
        } => commands::ingest_file(&db, source, dataset, &path, &format).await,
        Command::IngestApi {
            source,
            dataset,
            endpoint,
            data_field,
        } => commands::ingest_api(&db, source, dataset, &endpoint, data_field.as_deref()).await,
        Command::Datasets => commands::list_datasets(&db),
        Command::Analyze {
            dataset,
            kind,
            time_field,
            value_field,
        } => commands::analyze(
            &db,
            dataset,
            kind,
            time_field.as_deref(),
            value_field.as_deref(),
        ),
        Command::Demo => commands::demo(&db).await,
    }
}
