//! Query functions for every stored entity.
//!
//! All functions take the [`DataHubDb`] handle, acquire the connection for
//! the duration of one statement (or one transaction for batch inserts),
//! and map missing rows to the typed not-found errors in [`StoreError`].

use chrono::{DateTime, Utc};
use data_hub_store_models::{
    AnalysisKind, AnalysisRow, AnalysisSummary, DatasetRow, DatasetSummary, IngestionLogRow,
    IngestionStatus, QueryRow, RecordRow, SourceKind, SourceRow,
};
use rusqlite::types::Type;
use rusqlite::{OptionalExtension, Row, params};
use serde_json::Value;

use crate::StoreError;
use crate::db::DataHubDb;

// ---------------------------------------------------------------------------
// Row mapping helpers
// ---------------------------------------------------------------------------

fn json_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Value> {
    let text: String = row.get(idx)?;
    serde_json::from_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn optional_json_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Value>> {
    let text: Option<String> = row.get(idx)?;
    match text {
        Some(text) => serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))),
        None => Ok(None),
    }
}

fn datetime_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn optional_datetime_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let text: Option<String> = row.get(idx)?;
    match text {
        Some(text) => DateTime::parse_from_rfc3339(&text)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))),
        None => Ok(None),
    }
}

fn enum_column<T: std::str::FromStr>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let text: String = row.get(idx)?;
    text.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn row_to_source(row: &Row<'_>) -> rusqlite::Result<SourceRow> {
    Ok(SourceRow {
        id: row.get(0)?,
        name: row.get(1)?,
        kind: enum_column::<SourceKind>(row, 2)?,
        description: row.get(3)?,
        connection_info: json_column(row, 4)?,
        is_active: row.get(5)?,
        created_at: datetime_column(row, 6)?,
    })
}

fn row_to_dataset(row: &Row<'_>) -> rusqlite::Result<DatasetRow> {
    Ok(DatasetRow {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        source_id: row.get(3)?,
        schema_info: optional_json_column(row, 4)?,
        record_count: row.get(5)?,
        size_bytes: row.get(6)?,
        created_at: datetime_column(row, 7)?,
        updated_at: datetime_column(row, 8)?,
    })
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<RecordRow> {
    Ok(RecordRow {
        id: row.get(0)?,
        dataset_id: row.get(1)?,
        payload: json_column(row, 2)?,
        metadata: json_column(row, 3)?,
        created_at: datetime_column(row, 4)?,
        updated_at: datetime_column(row, 5)?,
    })
}

fn row_to_log(row: &Row<'_>) -> rusqlite::Result<IngestionLogRow> {
    Ok(IngestionLogRow {
        id: row.get(0)?,
        dataset_id: row.get(1)?,
        source_id: row.get(2)?,
        records_processed: row.get(3)?,
        records_failed: row.get(4)?,
        started_at: datetime_column(row, 5)?,
        completed_at: optional_datetime_column(row, 6)?,
        status: enum_column::<IngestionStatus>(row, 7)?,
        error_message: row.get(8)?,
    })
}

fn row_to_analysis(row: &Row<'_>) -> rusqlite::Result<AnalysisRow> {
    Ok(AnalysisRow {
        id: row.get(0)?,
        dataset_id: row.get(1)?,
        kind: enum_column::<AnalysisKind>(row, 2)?,
        parameters: json_column(row, 3)?,
        result: json_column(row, 4)?,
        created_at: datetime_column(row, 5)?,
    })
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// Registers a new data source.
///
/// No uniqueness is enforced on `name`: registering the same name twice
/// creates two distinct sources. Idempotency is the caller's concern.
///
/// # Errors
///
/// Returns [`StoreError`] if the insert fails.
pub fn insert_source(
    db: &DataHubDb,
    name: &str,
    kind: SourceKind,
    description: Option<&str>,
    connection_info: &Value,
) -> Result<SourceRow, StoreError> {
    let now = Utc::now();
    let conn = db.acquire();
    conn.execute(
        "INSERT INTO data_sources (name, kind, description, connection_info, is_active, created_at)
         VALUES (?1, ?2, ?3, ?4, 1, ?5)",
        params![
            name,
            kind.as_ref(),
            description,
            connection_info.to_string(),
            now.to_rfc3339(),
        ],
    )?;
    let id = conn.last_insert_rowid();
    log::info!("Registered source {id} ({name}, {kind})");

    Ok(SourceRow {
        id,
        name: name.to_string(),
        kind,
        description: description.map(str::to_string),
        connection_info: connection_info.clone(),
        is_active: true,
        created_at: now,
    })
}

const SOURCE_COLUMNS: &str =
    "id, name, kind, description, connection_info, is_active, created_at";

/// Fetches one source by id.
///
/// # Errors
///
/// Returns [`StoreError::SourceNotFound`] if the id does not resolve.
pub fn get_source(db: &DataHubDb, id: i64) -> Result<SourceRow, StoreError> {
    let conn = db.acquire();
    let mut stmt =
        conn.prepare(&format!("SELECT {SOURCE_COLUMNS} FROM data_sources WHERE id = ?1"))?;
    stmt.query_row(params![id], row_to_source)
        .optional()?
        .ok_or(StoreError::SourceNotFound { id })
}

/// Finds the first source with the given name, by id order.
///
/// # Errors
///
/// Returns [`StoreError`] if the query fails.
pub fn find_source_by_name(db: &DataHubDb, name: &str) -> Result<Option<SourceRow>, StoreError> {
    let conn = db.acquire();
    let mut stmt = conn.prepare(&format!(
        "SELECT {SOURCE_COLUMNS} FROM data_sources WHERE name = ?1 ORDER BY id LIMIT 1"
    ))?;
    Ok(stmt.query_row(params![name], row_to_source).optional()?)
}

/// Lists all registered sources in id order.
///
/// # Errors
///
/// Returns [`StoreError`] if the query fails.
pub fn list_sources(db: &DataHubDb) -> Result<Vec<SourceRow>, StoreError> {
    let conn = db.acquire();
    let mut stmt =
        conn.prepare(&format!("SELECT {SOURCE_COLUMNS} FROM data_sources ORDER BY id"))?;
    let rows = stmt.query_map([], row_to_source)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

// ---------------------------------------------------------------------------
// Datasets
// ---------------------------------------------------------------------------

const DATASET_COLUMNS: &str = "id, name, description, source_id, schema_info, record_count, \
                               size_bytes, created_at, updated_at";

/// Creates a dataset bound to an existing source.
///
/// # Errors
///
/// Returns [`StoreError::SourceNotFound`] if `source_id` does not resolve,
/// or [`StoreError`] if the insert fails.
pub fn insert_dataset(
    db: &DataHubDb,
    name: &str,
    source_id: i64,
    description: Option<&str>,
    schema_info: Option<&Value>,
) -> Result<DatasetRow, StoreError> {
    get_source(db, source_id)?;

    let now = Utc::now();
    let conn = db.acquire();
    conn.execute(
        "INSERT INTO datasets (name, description, source_id, schema_info, record_count, \
         created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, 0, ?5, ?5)",
        params![
            name,
            description,
            source_id,
            schema_info.map(std::string::ToString::to_string),
            now.to_rfc3339(),
        ],
    )?;
    let id = conn.last_insert_rowid();
    log::info!("Created dataset {id} ({name}) for source {source_id}");

    Ok(DatasetRow {
        id,
        name: name.to_string(),
        description: description.map(str::to_string),
        source_id,
        schema_info: schema_info.cloned(),
        record_count: 0,
        size_bytes: None,
        created_at: now,
        updated_at: now,
    })
}

/// Fetches one dataset by id.
///
/// # Errors
///
/// Returns [`StoreError::DatasetNotFound`] if the id does not resolve.
pub fn get_dataset(db: &DataHubDb, id: i64) -> Result<DatasetRow, StoreError> {
    let conn = db.acquire();
    let mut stmt =
        conn.prepare(&format!("SELECT {DATASET_COLUMNS} FROM datasets WHERE id = ?1"))?;
    stmt.query_row(params![id], row_to_dataset)
        .optional()?
        .ok_or(StoreError::DatasetNotFound { id })
}

/// Finds the first dataset with the given name, by id order.
///
/// # Errors
///
/// Returns [`StoreError`] if the query fails.
pub fn find_dataset_by_name(db: &DataHubDb, name: &str) -> Result<Option<DatasetRow>, StoreError> {
    let conn = db.acquire();
    let mut stmt = conn.prepare(&format!(
        "SELECT {DATASET_COLUMNS} FROM datasets WHERE name = ?1 ORDER BY id LIMIT 1"
    ))?;
    Ok(stmt.query_row(params![name], row_to_dataset).optional()?)
}

/// Lists all datasets as compact summaries, in id order.
///
/// # Errors
///
/// Returns [`StoreError`] if the query fails.
pub fn list_datasets(db: &DataHubDb) -> Result<Vec<DatasetSummary>, StoreError> {
    let conn = db.acquire();
    let mut stmt = conn.prepare(
        "SELECT id, name, description, record_count, updated_at FROM datasets ORDER BY id",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(DatasetSummary {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            record_count: row.get(3)?,
            last_updated: datetime_column(row, 4)?,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Recomputes the denormalized dataset statistics.
///
/// `record_count` is set from an exact COUNT query and `size_bytes` from
/// the summed payload length, then `updated_at` is bumped. Called after
/// every ingestion or cleaning pass rather than incrementally per insert,
/// so a completed run always leaves the count consistent with the rows.
///
/// # Errors
///
/// Returns [`StoreError::DatasetNotFound`] if the id does not resolve.
pub fn update_dataset_stats(db: &DataHubDb, dataset_id: i64) -> Result<(), StoreError> {
    let conn = db.acquire();
    let affected = conn.execute(
        "UPDATE datasets SET
            record_count = (SELECT COUNT(*) FROM data_records WHERE dataset_id = ?1),
            size_bytes = (SELECT COALESCE(SUM(LENGTH(payload)), 0)
                          FROM data_records WHERE dataset_id = ?1),
            updated_at = ?2
         WHERE id = ?1",
        params![dataset_id, Utc::now().to_rfc3339()],
    )?;
    if affected == 0 {
        return Err(StoreError::DatasetNotFound { id: dataset_id });
    }
    log::debug!("Refreshed stats for dataset {dataset_id}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

const RECORD_COLUMNS: &str = "id, dataset_id, payload, metadata, created_at, updated_at";

/// Inserts one record.
///
/// # Errors
///
/// Returns [`StoreError`] if the insert fails.
pub fn insert_record(
    db: &DataHubDb,
    dataset_id: i64,
    payload: &Value,
    metadata: &Value,
) -> Result<RecordRow, StoreError> {
    let now = Utc::now();
    let conn = db.acquire();
    conn.execute(
        "INSERT INTO data_records (dataset_id, payload, metadata, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?4)",
        params![
            dataset_id,
            payload.to_string(),
            metadata.to_string(),
            now.to_rfc3339(),
        ],
    )?;

    Ok(RecordRow {
        id: conn.last_insert_rowid(),
        dataset_id,
        payload: payload.clone(),
        metadata: metadata.clone(),
        created_at: now,
        updated_at: now,
    })
}

/// Inserts a batch of records in one transaction, preserving slice order.
///
/// Returns the number of rows inserted. An error rolls the whole batch
/// back, so a failed run contributes no partial rows.
///
/// # Errors
///
/// Returns [`StoreError`] if any insert fails.
pub fn insert_records(
    db: &DataHubDb,
    dataset_id: i64,
    items: &[(Value, Value)],
) -> Result<u64, StoreError> {
    if items.is_empty() {
        return Ok(0);
    }

    let mut conn = db.acquire();
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO data_records (dataset_id, payload, metadata, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
        )?;
        let now = Utc::now().to_rfc3339();
        for (payload, metadata) in items {
            stmt.execute(params![dataset_id, payload.to_string(), metadata.to_string(), now])?;
        }
    }
    tx.commit()?;

    Ok(u64::try_from(items.len()).unwrap_or(0))
}

/// Fetches one record by id.
///
/// # Errors
///
/// Returns [`StoreError::RecordNotFound`] if the id does not resolve.
pub fn get_record(db: &DataHubDb, id: i64) -> Result<RecordRow, StoreError> {
    let conn = db.acquire();
    let mut stmt =
        conn.prepare(&format!("SELECT {RECORD_COLUMNS} FROM data_records WHERE id = ?1"))?;
    stmt.query_row(params![id], row_to_record)
        .optional()?
        .ok_or(StoreError::RecordNotFound { id })
}

/// Loads every record of a dataset in insertion order.
///
/// # Errors
///
/// Returns [`StoreError`] if the query fails.
pub fn records_for_dataset(db: &DataHubDb, dataset_id: i64) -> Result<Vec<RecordRow>, StoreError> {
    let conn = db.acquire();
    let mut stmt = conn.prepare(&format!(
        "SELECT {RECORD_COLUMNS} FROM data_records WHERE dataset_id = ?1 ORDER BY id"
    ))?;
    let rows = stmt.query_map(params![dataset_id], row_to_record)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Loads a page of records with an optional equality filter over payload
/// fields.
///
/// Filter values compare as text against the extracted payload field, so
/// `{"price": 10}` matches records whose `price` is the number `10`.
/// Filter keys containing a double quote cannot be expressed as a JSON
/// path and are skipped with a warning.
///
/// # Errors
///
/// Returns [`StoreError`] if the query fails.
pub fn query_records(
    db: &DataHubDb,
    dataset_id: i64,
    filter: Option<&serde_json::Map<String, Value>>,
    limit: u32,
    offset: u32,
) -> Result<Vec<RecordRow>, StoreError> {
    let mut sql =
        format!("SELECT {RECORD_COLUMNS} FROM data_records WHERE dataset_id = ?");
    let mut owned: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(dataset_id)];

    if let Some(filter) = filter {
        for (field, value) in filter {
            if field.contains('"') {
                log::warn!("Skipping unfilterable field name {field:?}");
                continue;
            }
            sql.push_str(" AND CAST(json_extract(payload, ?) AS TEXT) = ?");
            owned.push(Box::new(format!("$.\"{field}\"")));
            owned.push(Box::new(filter_text(value)));
        }
    }

    sql.push_str(" ORDER BY id LIMIT ? OFFSET ?");
    owned.push(Box::new(limit));
    owned.push(Box::new(offset));

    let conn = db.acquire();
    let mut stmt = conn.prepare(&sql)?;
    let param_refs: Vec<&dyn rusqlite::ToSql> = owned.iter().map(AsRef::as_ref).collect();
    let rows = stmt.query_map(param_refs.as_slice(), row_to_record)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

fn filter_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Returns the number of records stored for a dataset.
///
/// # Errors
///
/// Returns [`StoreError`] if the query fails.
pub fn count_records(db: &DataHubDb, dataset_id: i64) -> Result<u64, StoreError> {
    let conn = db.acquire();
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM data_records WHERE dataset_id = ?1",
        params![dataset_id],
        |row| row.get(0),
    )?;
    Ok(u64::try_from(count).unwrap_or(0))
}

/// Rewrites a record's payload and bumps `updated_at`.
///
/// Callers decide whether the payload actually changed; this function
/// always bumps the timestamp.
///
/// # Errors
///
/// Returns [`StoreError::RecordNotFound`] if the id does not resolve.
pub fn update_record_payload(
    db: &DataHubDb,
    record_id: i64,
    payload: &Value,
) -> Result<(), StoreError> {
    let conn = db.acquire();
    let affected = conn.execute(
        "UPDATE data_records SET payload = ?1, updated_at = ?2 WHERE id = ?3",
        params![payload.to_string(), Utc::now().to_rfc3339(), record_id],
    )?;
    if affected == 0 {
        return Err(StoreError::RecordNotFound { id: record_id });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Ingestion logs
// ---------------------------------------------------------------------------

const LOG_COLUMNS: &str = "id, dataset_id, source_id, records_processed, records_failed, \
                           started_at, completed_at, status, error_message";

/// Opens a new ingestion log row with status RUNNING.
///
/// # Errors
///
/// Returns [`StoreError`] if the insert fails.
pub fn open_ingestion_log(
    db: &DataHubDb,
    dataset_id: i64,
    source_id: i64,
) -> Result<IngestionLogRow, StoreError> {
    let now = Utc::now();
    let conn = db.acquire();
    conn.execute(
        "INSERT INTO data_ingestion_logs (dataset_id, source_id, records_processed, \
         records_failed, started_at, status)
         VALUES (?1, ?2, 0, 0, ?3, ?4)",
        params![
            dataset_id,
            source_id,
            now.to_rfc3339(),
            IngestionStatus::Running.as_ref(),
        ],
    )?;

    Ok(IngestionLogRow {
        id: conn.last_insert_rowid(),
        dataset_id,
        source_id,
        records_processed: 0,
        records_failed: 0,
        started_at: now,
        completed_at: None,
        status: IngestionStatus::Running,
        error_message: None,
    })
}

/// Writes the terminal state of an ingestion run and returns the closed
/// row. Called exactly once per run, on both the success and failure
/// paths.
///
/// # Errors
///
/// Returns [`StoreError::LogNotFound`] if the id does not resolve.
pub fn close_ingestion_log(
    db: &DataHubDb,
    log_id: i64,
    status: IngestionStatus,
    records_processed: i64,
    records_failed: i64,
    error_message: Option<&str>,
) -> Result<IngestionLogRow, StoreError> {
    {
        let conn = db.acquire();
        let affected = conn.execute(
            "UPDATE data_ingestion_logs SET
                status = ?1,
                records_processed = ?2,
                records_failed = ?3,
                error_message = ?4,
                completed_at = ?5
             WHERE id = ?6",
            params![
                status.as_ref(),
                records_processed,
                records_failed,
                error_message,
                Utc::now().to_rfc3339(),
                log_id,
            ],
        )?;
        if affected == 0 {
            return Err(StoreError::LogNotFound { id: log_id });
        }
    }
    get_ingestion_log(db, log_id)
}

/// Fetches one ingestion log by id.
///
/// # Errors
///
/// Returns [`StoreError::LogNotFound`] if the id does not resolve.
pub fn get_ingestion_log(db: &DataHubDb, id: i64) -> Result<IngestionLogRow, StoreError> {
    let conn = db.acquire();
    let mut stmt = conn.prepare(&format!(
        "SELECT {LOG_COLUMNS} FROM data_ingestion_logs WHERE id = ?1"
    ))?;
    stmt.query_row(params![id], row_to_log)
        .optional()?
        .ok_or(StoreError::LogNotFound { id })
}

/// Lists all ingestion logs for a dataset, most recent first.
///
/// # Errors
///
/// Returns [`StoreError`] if the query fails.
pub fn logs_for_dataset(
    db: &DataHubDb,
    dataset_id: i64,
) -> Result<Vec<IngestionLogRow>, StoreError> {
    let conn = db.acquire();
    let mut stmt = conn.prepare(&format!(
        "SELECT {LOG_COLUMNS} FROM data_ingestion_logs WHERE dataset_id = ?1 ORDER BY id DESC"
    ))?;
    let rows = stmt.query_map(params![dataset_id], row_to_log)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

// ---------------------------------------------------------------------------
// Analyses
// ---------------------------------------------------------------------------

const ANALYSIS_COLUMNS: &str = "id, dataset_id, kind, parameters, result, created_at";

/// Persists one immutable analysis result.
///
/// # Errors
///
/// Returns [`StoreError`] if the insert fails.
pub fn insert_analysis(
    db: &DataHubDb,
    dataset_id: i64,
    kind: AnalysisKind,
    parameters: &Value,
    result: &Value,
) -> Result<AnalysisRow, StoreError> {
    let now = Utc::now();
    let conn = db.acquire();
    conn.execute(
        "INSERT INTO data_analyses (dataset_id, kind, parameters, result, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            dataset_id,
            kind.as_ref(),
            parameters.to_string(),
            result.to_string(),
            now.to_rfc3339(),
        ],
    )?;

    Ok(AnalysisRow {
        id: conn.last_insert_rowid(),
        dataset_id,
        kind,
        parameters: parameters.clone(),
        result: result.clone(),
        created_at: now,
    })
}

/// Fetches one stored analysis by id.
///
/// # Errors
///
/// Returns [`StoreError::AnalysisNotFound`] if the id does not resolve.
pub fn get_analysis(db: &DataHubDb, id: i64) -> Result<AnalysisRow, StoreError> {
    let conn = db.acquire();
    let mut stmt = conn.prepare(&format!(
        "SELECT {ANALYSIS_COLUMNS} FROM data_analyses WHERE id = ?1"
    ))?;
    stmt.query_row(params![id], row_to_analysis)
        .optional()?
        .ok_or(StoreError::AnalysisNotFound { id })
}

/// Lists analysis summaries, most recent first, optionally scoped to one
/// dataset.
///
/// # Errors
///
/// Returns [`StoreError`] if the query fails.
pub fn list_analyses(
    db: &DataHubDb,
    dataset_id: Option<i64>,
) -> Result<Vec<AnalysisSummary>, StoreError> {
    const SUMMARY_COLUMNS: &str =
        "id, dataset_id, kind, parameters, created_at, result <> 'null' AS has_results";

    let conn = db.acquire();
    let map = |row: &Row<'_>| -> rusqlite::Result<AnalysisSummary> {
        Ok(AnalysisSummary {
            id: row.get(0)?,
            dataset_id: row.get(1)?,
            kind: enum_column::<AnalysisKind>(row, 2)?,
            parameters: json_column(row, 3)?,
            created_at: datetime_column(row, 4)?,
            has_results: row.get(5)?,
        })
    };

    let rows = if let Some(dataset_id) = dataset_id {
        let mut stmt = conn.prepare(&format!(
            "SELECT {SUMMARY_COLUMNS} FROM data_analyses
             WHERE dataset_id = ?1 ORDER BY id DESC"
        ))?;
        let rows = stmt.query_map(params![dataset_id], map)?;
        rows.collect::<Result<Vec<_>, _>>()?
    } else {
        let mut stmt = conn.prepare(&format!(
            "SELECT {SUMMARY_COLUMNS} FROM data_analyses ORDER BY id DESC"
        ))?;
        let rows = stmt.query_map([], map)?;
        rows.collect::<Result<Vec<_>, _>>()?
    };

    Ok(rows)
}

// ---------------------------------------------------------------------------
// Query audit
// ---------------------------------------------------------------------------

/// Writes one query audit row.
///
/// # Errors
///
/// Returns [`StoreError`] if the insert fails.
pub fn insert_query_log(
    db: &DataHubDb,
    user_id: i64,
    query_text: &str,
    dataset_id: Option<i64>,
    result: &Value,
    execution_time_ms: i64,
) -> Result<QueryRow, StoreError> {
    let now = Utc::now();
    let conn = db.acquire();
    conn.execute(
        "INSERT INTO data_queries (user_id, query_text, dataset_id, result, \
         execution_time_ms, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            user_id,
            query_text,
            dataset_id,
            result.to_string(),
            execution_time_ms,
            now.to_rfc3339(),
        ],
    )?;

    Ok(QueryRow {
        id: conn.last_insert_rowid(),
        user_id,
        query_text: query_text.to_string(),
        dataset_id,
        result: result.clone(),
        execution_time_ms,
        created_at: now,
    })
}
