#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Ingestion pipeline: registers sources, creates datasets, and runs
//! fetch-and-persist cycles against the record store.
//!
//! Every run is bracketed by an ingestion log row. The log opens as
//! RUNNING before any payload work starts and is closed exactly once on
//! every path: COMPLETED with per-record counts, or FAILED with the
//! error message when the payload could not be acquired or persisted.
//! A failed run is still a normal return value, not an `Err`; callers
//! inspect the log's status.

pub mod processor;

use std::collections::BTreeMap;
use std::path::Path;

use chrono::Utc;
use data_hub_fetch::{ApiFetcher, FetchError, FileFetcher, RecordFetcher};
use data_hub_store::db::DataHubDb;
use data_hub_store::{StoreError, queries};
use data_hub_store_models::{
    DatasetRow, DatasetSummary, IngestionLogRow, IngestionStatus, SourceKind, SourceRow,
};
use serde_json::{Value, json};

/// Errors that can occur in the ingestion pipeline.
///
/// Payload-level failures during a run do not surface here; they are
/// captured in the run's FAILED log row. An `Err` means the run could
/// not be bracketed at all (unknown source or dataset, or the store
/// refused the log row).
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// Record store operation failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Payload acquisition failed outside a bracketed run.
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),
}

/// Registers a new data source.
///
/// `connection_info` defaults to an empty object. Names are not unique;
/// registering twice creates two sources.
///
/// # Errors
///
/// Returns [`IngestError::Store`] if the insert fails.
pub fn register_source(
    db: &DataHubDb,
    name: &str,
    kind: SourceKind,
    description: Option<&str>,
    connection_info: Option<&Value>,
) -> Result<SourceRow, IngestError> {
    let empty = json!({});
    let info = connection_info.unwrap_or(&empty);
    Ok(queries::insert_source(db, name, kind, description, info)?)
}

/// Creates a dataset bound to an existing source.
///
/// # Errors
///
/// Returns [`IngestError::Store`] with `SourceNotFound` if `source_id`
/// does not resolve.
pub fn create_dataset(
    db: &DataHubDb,
    name: &str,
    source_id: i64,
    description: Option<&str>,
    schema_info: Option<&Value>,
) -> Result<DatasetRow, IngestError> {
    Ok(queries::insert_dataset(
        db,
        name,
        source_id,
        description,
        schema_info,
    )?)
}

/// Returns the source with this name, registering it if absent.
///
/// When an existing source is found it is returned as-is; the kind,
/// description, and connection info arguments only apply to a fresh
/// registration.
///
/// # Errors
///
/// Returns [`IngestError::Store`] if the lookup or insert fails.
pub fn ensure_source(
    db: &DataHubDb,
    name: &str,
    kind: SourceKind,
    description: Option<&str>,
    connection_info: Option<&Value>,
) -> Result<SourceRow, IngestError> {
    if let Some(existing) = queries::find_source_by_name(db, name)? {
        return Ok(existing);
    }
    register_source(db, name, kind, description, connection_info)
}

/// Returns the dataset with this name, creating it if absent.
///
/// # Errors
///
/// Returns [`IngestError::Store`] if the lookup or insert fails, or
/// with `SourceNotFound` when a fresh dataset names an unknown source.
pub fn ensure_dataset(
    db: &DataHubDb,
    name: &str,
    source_id: i64,
    description: Option<&str>,
    schema_info: Option<&Value>,
) -> Result<DatasetRow, IngestError> {
    if let Some(existing) = queries::find_dataset_by_name(db, name)? {
        return Ok(existing);
    }
    create_dataset(db, name, source_id, description, schema_info)
}

/// Lists all datasets as compact summaries.
///
/// # Errors
///
/// Returns [`IngestError::Store`] if the query fails.
pub fn list_datasets(db: &DataHubDb) -> Result<Vec<DatasetSummary>, IngestError> {
    Ok(queries::list_datasets(db)?)
}

/// Runs one API ingestion: GET the endpoint (with retry), flatten the
/// body into candidates, persist the object-shaped ones.
///
/// # Errors
///
/// Returns [`IngestError::Store`] if the source or dataset does not
/// resolve or the log row cannot be managed. HTTP and decode failures
/// end up in the returned FAILED log instead.
pub async fn ingest_from_api(
    db: &DataHubDb,
    source_id: i64,
    dataset_id: i64,
    endpoint: &str,
    headers: &BTreeMap<String, String>,
    params: &BTreeMap<String, String>,
    data_field: Option<&str>,
) -> Result<IngestionLogRow, IngestError> {
    let fetcher = ApiFetcher::new(endpoint)
        .with_headers(headers.clone())
        .with_params(params.clone())
        .with_data_field(data_field.map(str::to_string));
    ingest_with(db, source_id, dataset_id, &fetcher).await
}

/// Runs one file ingestion from a local JSON or CSV file.
///
/// # Errors
///
/// Returns [`IngestError::Store`] if the source or dataset does not
/// resolve or the log row cannot be managed. Read, decode, and
/// unsupported-format failures end up in the returned FAILED log.
pub async fn ingest_from_file(
    db: &DataHubDb,
    source_id: i64,
    dataset_id: i64,
    path: &Path,
    format: &str,
) -> Result<IngestionLogRow, IngestError> {
    let fetcher = FileFetcher::new(path, format);
    ingest_with(db, source_id, dataset_id, &fetcher).await
}

/// Runs one ingestion with an arbitrary fetcher.
///
/// Candidates that are JSON objects are persisted in source order with
/// `{"source_id", "ingested_at"}` metadata; every other candidate counts
/// as failed. No deduplication is applied: ingesting the same payload
/// twice stores it twice. After the batch lands, the dataset's
/// `record_count` is recomputed by an exact COUNT.
///
/// # Errors
///
/// Returns [`IngestError::Store`] if the source or dataset does not
/// resolve or the log row cannot be managed.
pub async fn ingest_with(
    db: &DataHubDb,
    source_id: i64,
    dataset_id: i64,
    fetcher: &dyn RecordFetcher,
) -> Result<IngestionLogRow, IngestError> {
    // Resolve both ends before a log row exists, so bad ids fail loudly.
    queries::get_source(db, source_id)?;
    let dataset = queries::get_dataset(db, dataset_id)?;

    let log_row = queries::open_ingestion_log(db, dataset_id, source_id)?;
    log::info!(
        "Ingestion run {} started for dataset {} ({})",
        log_row.id,
        dataset.id,
        dataset.name
    );

    match execute_run(db, source_id, dataset_id, fetcher).await {
        Ok((processed, failed)) => {
            let closed = queries::close_ingestion_log(
                db,
                log_row.id,
                IngestionStatus::Completed,
                processed,
                failed,
                None,
            )?;
            log::info!(
                "Ingestion run {} completed: {processed} processed, {failed} failed",
                log_row.id
            );
            Ok(closed)
        }
        Err(e) => {
            log::error!("Data ingestion failed: {e}");
            // The log row carries the payload-level message, not the
            // pipeline wrapper.
            let message = match &e {
                IngestError::Fetch(fetch) => fetch.to_string(),
                IngestError::Store(store) => store.to_string(),
            };
            let closed = queries::close_ingestion_log(
                db,
                log_row.id,
                IngestionStatus::Failed,
                0,
                0,
                Some(&message),
            )?;
            Ok(closed)
        }
    }
}

/// Acquires the payload and persists object candidates. Returns
/// `(records_processed, records_failed)`.
async fn execute_run(
    db: &DataHubDb,
    source_id: i64,
    dataset_id: i64,
    fetcher: &dyn RecordFetcher,
) -> Result<(i64, i64), IngestError> {
    let candidates = fetcher.fetch_records().await?;

    let mut batch: Vec<(Value, Value)> = Vec::with_capacity(candidates.len());
    let mut records_failed: i64 = 0;

    for candidate in candidates {
        if candidate.is_object() {
            let metadata = json!({
                "source_id": source_id,
                "ingested_at": Utc::now().to_rfc3339(),
            });
            batch.push((candidate, metadata));
        } else {
            records_failed += 1;
        }
    }

    let inserted = queries::insert_records(db, dataset_id, &batch)?;
    queries::update_dataset_stats(db, dataset_id)?;

    let records_processed = i64::try_from(inserted).unwrap_or(i64::MAX);
    Ok((records_processed, records_failed))
}
