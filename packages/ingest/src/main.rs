#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for running ingestions against the record store.

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use data_hub_ingest::{ingest_from_api, ingest_from_file, list_datasets};
use data_hub_store::{db, queries};

#[derive(Parser)]
#[command(name = "data_hub_ingest", about = "Data hub ingestion tool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest records from an HTTP API endpoint
    Api {
        /// Source id the run is attributed to
        #[arg(long)]
        source: i64,
        /// Dataset id the records land in
        #[arg(long)]
        dataset: i64,
        /// Endpoint URL returning JSON
        #[arg(long)]
        endpoint: String,
        /// Response key holding the record array (e.g. "results")
        #[arg(long)]
        data_field: Option<String>,
        /// Request header as `name=value` (repeatable)
        #[arg(long = "header")]
        headers: Vec<String>,
        /// Query parameter as `name=value` (repeatable)
        #[arg(long = "param")]
        params: Vec<String>,
    },
    /// Ingest records from a local JSON or CSV file
    File {
        /// Source id the run is attributed to
        #[arg(long)]
        source: i64,
        /// Dataset id the records land in
        #[arg(long)]
        dataset: i64,
        /// Path to the file
        #[arg(long)]
        path: PathBuf,
        /// File format ("json" or "csv")
        #[arg(long, default_value = "json")]
        format: String,
    },
    /// List all registered data sources
    Sources,
    /// List all datasets
    Datasets,
}

/// Splits repeated `name=value` CLI arguments into a map.
fn parse_pairs(raw: &[String], what: &str) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    for entry in raw {
        if let Some((key, value)) = entry.split_once('=') {
            map.insert(key.trim().to_string(), value.trim().to_string());
        } else {
            log::warn!("Ignoring malformed {what} {entry:?} (expected name=value)");
        }
    }
    map
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    let db = db::connect_from_env()?;

    match cli.command {
        Commands::Api {
            source,
            dataset,
            endpoint,
            data_field,
            headers,
            params,
        } => {
            let headers = parse_pairs(&headers, "header");
            let params = parse_pairs(&params, "param");
            let log = ingest_from_api(
                &db,
                source,
                dataset,
                &endpoint,
                &headers,
                &params,
                data_field.as_deref(),
            )
            .await?;
            println!(
                "Run {} {}: {} processed, {} failed",
                log.id, log.status, log.records_processed, log.records_failed
            );
            if let Some(message) = log.error_message {
                println!("Error: {message}");
            }
        }
        Commands::File {
            source,
            dataset,
            path,
            format,
        } => {
            let log = ingest_from_file(&db, source, dataset, &path, &format).await?;
            println!(
                "Run {} {}: {} processed, {} failed",
                log.id, log.status, log.records_processed, log.records_failed
            );
            if let Some(message) = log.error_message {
                println!("Error: {message}");
            }
        }
        Commands::Sources => {
            let sources = queries::list_sources(&db)?;
            println!("{:<6} {:<12} NAME", "ID", "KIND");
            println!("{}", "-".repeat(50));
            for source in &sources {
                println!("{:<6} {:<12} {}", source.id, source.kind, source.name);
            }
        }
        Commands::Datasets => {
            let datasets = list_datasets(&db)?;
            println!("{:<6} {:<10} NAME", "ID", "RECORDS");
            println!("{}", "-".repeat(50));
            for dataset in &datasets {
                println!(
                    "{:<6} {:<10} {}",
                    dataset.id, dataset.record_count, dataset.name
                );
            }
        }
    }

    Ok(())
}
