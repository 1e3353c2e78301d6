//! Subcommand implementations for the data hub CLI.
//!
//! Each command borrows the shared [`DataHubDb`] handle resolved in
//! `main`. Operator-facing output goes through `println!`; operational
//! detail goes through `log` like everywhere else in the hub.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use clap::ValueEnum;
use data_hub_analytics::{
    AnalysisOutcome, analysis_history, run_statistical_analysis, run_summary_analysis,
    run_trend_analysis,
};
use data_hub_analytics_models::{StatisticalParams, TrendParams};
use data_hub_ingest::{
    create_dataset, ensure_dataset, ensure_source, ingest_from_api, ingest_from_file,
    register_source,
};
use data_hub_store::{db::DataHubDb, queries};
use data_hub_store_models::{IngestionLogRow, IngestionStatus, SourceKind};
use data_hub_visualize::{ChartData, chart_data};
use serde_json::{Value, json};

use crate::config;

/// Distinguishes temp files when several sample loads share a process.
static SAMPLE_FILE_SEQ: AtomicU64 = AtomicU64::new(0);

/// Registers every source and dataset named in a TOML hub config, in
/// declaration order. Datasets may reference sources from the same
/// config or ones already registered in the store.
///
/// # Errors
///
/// Returns an error if the config cannot be read, a dataset names an
/// unknown source, or a store insert fails.
pub fn setup(db: &DataHubDb, config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = config::load(config_path)?;
    log::info!(
        "Hub config loaded from {}: {} sources, {} datasets",
        config_path.display(),
        config.sources.len(),
        config.datasets.len()
    );

    let mut source_ids: BTreeMap<String, i64> = BTreeMap::new();
    for entry in &config.sources {
        let row = register_source(
            db,
            &entry.name,
            entry.kind,
            entry.description.as_deref(),
            entry.connection.as_ref(),
        )?;
        println!("Registered source {} ({})", row.id, row.name);
        source_ids.insert(row.name.clone(), row.id);
    }

    for entry in &config.datasets {
        let source_id = if let Some(id) = source_ids.get(&entry.source) {
            *id
        } else if let Some(row) = queries::find_source_by_name(db, &entry.source)? {
            row.id
        } else {
            return Err(format!(
                "Dataset {:?} names an unknown source {:?}",
                entry.name, entry.source
            )
            .into());
        };
        let row = create_dataset(db, &entry.name, source_id, entry.description.as_deref(), None)?;
        println!("Registered dataset {} ({})", row.id, row.name);
    }

    Ok(())
}

fn sample_products() -> Vec<Value> {
    [
        ("Product A", 29.99, "Electronics", "2023-01-01", 150),
        ("Product B", 19.99, "Books", "2023-01-02", 89),
        ("Product C", 49.99, "Electronics", "2023-01-03", 210),
        ("Product D", 14.99, "Books", "2023-01-04", 65),
        ("Product E", 99.99, "Home", "2023-01-05", 42),
        ("Product F", 39.99, "Electronics", "2023-01-06", 180),
        ("Product G", 24.99, "Books", "2023-01-07", 95),
        ("Product H", 79.99, "Home", "2023-01-08", 33),
    ]
    .into_iter()
    .map(|(name, price, category, date, sales)| {
        json!({
            "name": name,
            "price": price,
            "category": category,
            "date": date,
            "sales": sales,
        })
    })
    .collect()
}

/// Loads the built-in product sample through the file ingestion path,
/// registering the synthetic source and the dataset by name first.
///
/// Returns the dataset id. Repeat runs reuse the source and dataset
/// and append another copy of the sample records.
///
/// # Errors
///
/// Returns an error if registration, the staging file write, or the
/// ingestion run fails.
pub async fn load_sample(
    db: &DataHubDb,
    dataset_name: &str,
) -> Result<i64, Box<dyn std::error::Error>> {
    let source = ensure_source(
        db,
        "Sample Data",
        SourceKind::Synthetic,
        Some("Sample data for demonstration"),
        None,
    )?;
    let dataset = ensure_dataset(
        db,
        dataset_name,
        source.id,
        Some("Sample product data for demonstration"),
        None,
    )?;

    let seq = SAMPLE_FILE_SEQ.fetch_add(1, Ordering::Relaxed);
    let path = std::env::temp_dir().join(format!(
        "data_hub_sample_{}_{seq}.json",
        std::process::id()
    ));
    std::fs::write(&path, serde_json::to_string(&sample_products())?)?;

    let outcome = ingest_from_file(db, source.id, dataset.id, &path, "json").await;
    let _ = std::fs::remove_file(&path);
    print_log(&outcome?);

    Ok(dataset.id)
}

/// Runs one file ingestion against existing source and dataset ids.
///
/// # Errors
///
/// Returns an error if either id does not resolve or the ingestion log
/// cannot be managed. Per-run fetch failures land in the printed log.
pub async fn ingest_file(
    db: &DataHubDb,
    source_id: i64,
    dataset_id: i64,
    path: &Path,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let log = ingest_from_file(db, source_id, dataset_id, path, format).await?;
    print_log(&log);
    Ok(())
}

/// Runs one API ingestion against existing source and dataset ids.
///
/// # Errors
///
/// Returns an error if either id does not resolve or the ingestion log
/// cannot be managed. HTTP failures land in the printed log.
pub async fn ingest_api(
    db: &DataHubDb,
    source_id: i64,
    dataset_id: i64,
    endpoint: &str,
    data_field: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let log = ingest_from_api(
        db,
        source_id,
        dataset_id,
        endpoint,
        &BTreeMap::new(),
        &BTreeMap::new(),
        data_field,
    )
    .await?;
    print_log(&log);
    Ok(())
}

fn print_log(log: &IngestionLogRow) {
    if log.status == IngestionStatus::Completed {
        println!(
            "Ingestion run {}: {} records processed, {} failed",
            log.id, log.records_processed, log.records_failed
        );
    } else {
        println!(
            "Ingestion run {} {}: {}",
            log.id,
            log.status,
            log.error_message.as_deref().unwrap_or("unknown error")
        );
    }
}

/// Prints a table of every dataset.
///
/// # Errors
///
/// Returns an error if the store query fails.
pub fn list_datasets(db: &DataHubDb) -> Result<(), Box<dyn std::error::Error>> {
    let datasets = data_hub_ingest::list_datasets(db)?;
    if datasets.is_empty() {
        println!("No datasets registered.");
        return Ok(());
    }

    println!("{:>4}  {:<32} {:>8}  last updated", "id", "name", "records");
    for summary in &datasets {
        println!(
            "{:>4}  {:<32} {:>8}  {}",
            summary.id,
            summary.name,
            summary.record_count,
            summary.last_updated.format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(())
}

/// Analysis kinds selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AnalyzeKind {
    Statistical,
    Trend,
    Summary,
}

/// Runs one analysis and prints the stored row, or the reason the
/// dataset could not support it.
///
/// # Errors
///
/// Returns an error if the dataset id does not resolve, the store
/// fails, or a trend analysis is missing its field arguments.
pub fn analyze(
    db: &DataHubDb,
    dataset_id: i64,
    kind: AnalyzeKind,
    time_field: Option<&str>,
    value_field: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let outcome = match kind {
        AnalyzeKind::Statistical => {
            run_statistical_analysis(db, dataset_id, &StatisticalParams::default())?
        }
        AnalyzeKind::Trend => {
            let (Some(time_field), Some(value_field)) = (time_field, value_field) else {
                return Err("trend analyses require --time-field and --value-field".into());
            };
            let params = TrendParams {
                time_field: time_field.to_string(),
                value_field: value_field.to_string(),
            };
            run_trend_analysis(db, dataset_id, &params)?
        }
        AnalyzeKind::Summary => run_summary_analysis(db, dataset_id)?,
    };

    match outcome {
        AnalysisOutcome::Stored(row) => {
            println!("Stored analysis {} ({})", row.id, row.kind);
            println!("{}", serde_json::to_string_pretty(&row.result)?);
        }
        AnalysisOutcome::Error { error } => println!("Analysis refused: {error}"),
    }
    Ok(())
}

/// Runs the end-to-end sample workflow: load the product sample, run
/// each analysis kind, project a chart, and list the history.
///
/// # Errors
///
/// Returns an error if any step fails against the store.
pub async fn demo(db: &DataHubDb) -> Result<(), Box<dyn std::error::Error>> {
    println!("Data hub demo");
    println!("{}", "=".repeat(50));

    let dataset_id = load_sample(db, "Sample Product Data").await?;
    println!("\n1. Sample dataset ready with id {dataset_id}");

    let datasets = data_hub_ingest::list_datasets(db)?;
    println!("Available datasets: {}", datasets.len());
    for summary in &datasets {
        println!("  - {}: {} records", summary.name, summary.record_count);
    }

    println!("\n2. Running summary analysis...");
    match run_summary_analysis(db, dataset_id)? {
        AnalysisOutcome::Stored(row) => println!("Analysis id: {}", row.id),
        AnalysisOutcome::Error { error } => println!("Analysis refused: {error}"),
    }

    println!("\n3. Running statistical analysis...");
    match run_statistical_analysis(db, dataset_id, &StatisticalParams::default())? {
        AnalysisOutcome::Stored(row) => println!("Analysis id: {}", row.id),
        AnalysisOutcome::Error { error } => println!("Analysis refused: {error}"),
    }

    println!("\n4. Projecting a bar chart of price by name...");
    match chart_data(db, dataset_id, "bar", "name", Some("price"))? {
        ChartData::Axes(chart) => {
            println!("Generated chart data with {} data points", chart.x_axis.len());
        }
        ChartData::Error(err) => println!("Chart refused: {}", err.error),
        other => println!("Unexpected chart shape: {other:?}"),
    }

    println!("\n5. Running trend analysis over date/sales...");
    let trend_params = TrendParams {
        time_field: "date".to_string(),
        value_field: "sales".to_string(),
    };
    match run_trend_analysis(db, dataset_id, &trend_params)? {
        AnalysisOutcome::Stored(row) => {
            let trend = &row.result["trend"];
            println!(
                "Trend direction: {}, R-squared: {:.3}",
                trend["direction"].as_str().unwrap_or("unknown"),
                trend["r_squared"].as_f64().unwrap_or_default()
            );
        }
        AnalysisOutcome::Error { error } => println!("Analysis refused: {error}"),
    }

    println!("\n6. Analysis history:");
    for entry in analysis_history(db, Some(dataset_id))? {
        println!(
            "  - analysis {} ({}) at {}",
            entry.id,
            entry.kind,
            entry.created_at.format("%Y-%m-%d %H:%M:%S")
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use data_hub_store::{db::DataHubDb, queries};
    use data_hub_store_models::SourceKind;

    use super::{AnalyzeKind, analyze, demo, load_sample, setup};

    #[tokio::test]
    async fn sample_load_is_idempotent_on_names_but_appends_records() {
        let db = DataHubDb::open_in_memory().unwrap();

        let first = load_sample(&db, "Sample Product Data").await.unwrap();
        assert_eq!(queries::count_records(&db, first).unwrap(), 8);

        let second = load_sample(&db, "Sample Product Data").await.unwrap();
        assert_eq!(second, first);
        assert_eq!(queries::count_records(&db, first).unwrap(), 16);
        assert_eq!(queries::list_sources(&db).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn demo_runs_end_to_end_and_persists_analyses() {
        let db = DataHubDb::open_in_memory().unwrap();

        demo(&db).await.unwrap();

        let datasets = data_hub_ingest::list_datasets(&db).unwrap();
        assert_eq!(datasets.len(), 1);
        assert_eq!(datasets[0].record_count, 8);

        let history = data_hub_analytics::analysis_history(&db, Some(datasets[0].id)).unwrap();
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn setup_registers_config_entries() {
        let db = DataHubDb::open_in_memory().unwrap();
        let path =
            std::env::temp_dir().join(format!("data_hub_setup_{}.toml", std::process::id()));
        std::fs::write(
            &path,
            concat!(
                "[[sources]]\n",
                "name = \"city api\"\n",
                "kind = \"API\"\n",
                "connection = { endpoint = \"https://example.com\" }\n",
                "\n",
                "[[datasets]]\n",
                "name = \"events\"\n",
                "source = \"city api\"\n",
            ),
        )
        .unwrap();

        let result = setup(&db, &path);
        let _ = std::fs::remove_file(&path);
        result.unwrap();

        let sources = queries::list_sources(&db).unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].kind, SourceKind::Api);

        let datasets = data_hub_ingest::list_datasets(&db).unwrap();
        assert_eq!(datasets.len(), 1);
        assert_eq!(datasets[0].name, "events");
    }

    #[test]
    fn setup_rejects_datasets_with_unknown_sources() {
        let db = DataHubDb::open_in_memory().unwrap();
        let path =
            std::env::temp_dir().join(format!("data_hub_setup_bad_{}.toml", std::process::id()));
        std::fs::write(&path, "[[datasets]]\nname = \"orphan\"\nsource = \"ghost\"\n").unwrap();

        let result = setup(&db, &path);
        let _ = std::fs::remove_file(&path);

        let err = result.unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn trend_analyses_require_field_arguments() {
        let db = DataHubDb::open_in_memory().unwrap();

        let err = analyze(&db, 1, AnalyzeKind::Trend, None, None).unwrap_err();

        assert!(err.to_string().contains("--time-field"));
    }
}
