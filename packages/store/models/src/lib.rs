#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Record store row types, enums, and summaries.
//!
//! These types represent the shapes of data as stored in and retrieved from
//! the `SQLite` record store. Record payloads are schema-flexible: two rows
//! in the same dataset may carry completely different keys, so payloads and
//! metadata are kept as [`serde_json::Value`] rather than fixed structs.
//! They are distinct from the API response types in `data_hub_server_models`.

pub mod parsing;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum_macros::{AsRefStr, Display, EnumString};

/// Kind of origin a [`SourceRow`] pulls data from.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceKind {
    /// An HTTP API endpoint returning JSON.
    Api,
    /// A local JSON or CSV file.
    File,
    /// An external relational database.
    Database,
    /// A streaming feed.
    Stream,
    /// Generated in-process (sample/demo data).
    Synthetic,
}

impl SourceKind {
    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Api,
            Self::File,
            Self::Database,
            Self::Stream,
            Self::Synthetic,
        ]
    }
}

/// Lifecycle status of one ingestion run.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum IngestionStatus {
    /// The run is in progress; counts are not final.
    Running,
    /// The run finished; per-record failures may still be counted.
    Completed,
    /// A top-level failure aborted the run; `error_message` is set.
    Failed,
}

/// Kind of analysis persisted in a [`AnalysisRow`].
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AnalysisKind {
    /// Descriptive statistics, correlations, categorical frequencies.
    Statistical,
    /// Linear-regression trend fit of a value field over time.
    Trend,
    /// Dataset-level column/null/type summary.
    Summary,
}

impl AnalysisKind {
    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Statistical, Self::Trend, Self::Summary]
    }
}

/// A registered external data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRow {
    /// Primary key.
    pub id: i64,
    /// Human-readable name. Not unique: registering the same name twice
    /// creates two distinct sources.
    pub name: String,
    /// What kind of origin this source pulls from.
    pub kind: SourceKind,
    /// Free-text description.
    pub description: Option<String>,
    /// Opaque connection parameters (URLs, credentials, paths).
    pub connection_info: Value,
    /// Whether the source is available for ingestion.
    pub is_active: bool,
    /// When the source was registered.
    pub created_at: DateTime<Utc>,
}

/// A named, growable collection of records drawn from one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetRow {
    /// Primary key.
    pub id: i64,
    /// Human-readable name.
    pub name: String,
    /// Free-text description.
    pub description: Option<String>,
    /// Owning source.
    pub source_id: i64,
    /// Inferred schema summary, if one has been recorded.
    pub schema_info: Option<Value>,
    /// Denormalized count of records in this dataset. Recomputed by an
    /// exact COUNT query after every ingestion or cleaning pass, never
    /// incremented alongside individual inserts.
    pub record_count: i64,
    /// Estimated payload size in bytes.
    pub size_bytes: Option<i64>,
    /// When the dataset was created.
    pub created_at: DateTime<Utc>,
    /// Last time records were ingested or modified.
    pub updated_at: DateTime<Utc>,
}

/// One ingested item with its schema-flexible payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordRow {
    /// Primary key.
    pub id: i64,
    /// Owning dataset.
    pub dataset_id: i64,
    /// The ingested item. Arbitrary JSON shape; not fixed across records
    /// in the same dataset.
    pub payload: Value,
    /// Origin metadata (`source_id`, `ingested_at`).
    pub metadata: Value,
    /// When the record was ingested.
    pub created_at: DateTime<Utc>,
    /// Bumped only when a cleaning or transform pass actually changed
    /// the payload.
    pub updated_at: DateTime<Utc>,
}

/// Audit row for one ingestion run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionLogRow {
    /// Primary key.
    pub id: i64,
    /// Target dataset.
    pub dataset_id: i64,
    /// Source the run pulled from.
    pub source_id: i64,
    /// Items successfully persisted.
    pub records_processed: i64,
    /// Items skipped as malformed.
    pub records_failed: i64,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run reached a terminal status.
    pub completed_at: Option<DateTime<Utc>>,
    /// Current lifecycle status.
    pub status: IngestionStatus,
    /// Failure message when `status` is [`IngestionStatus::Failed`].
    pub error_message: Option<String>,
}

/// An immutable, persisted analysis result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRow {
    /// Primary key.
    pub id: i64,
    /// Dataset the analysis ran over.
    pub dataset_id: i64,
    /// What kind of analysis this is.
    #[serde(rename = "analysis_type")]
    pub kind: AnalysisKind,
    /// Input parameters the run was invoked with.
    pub parameters: Value,
    /// Result payload. May itself be a structured `{"error": …}` value
    /// when the dataset had no usable data.
    #[serde(rename = "results")]
    pub result: Value,
    /// When the analysis was persisted.
    pub created_at: DateTime<Utc>,
}

/// Audit row for one ad-hoc query through the facade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRow {
    /// Primary key.
    pub id: i64,
    /// Issuing user.
    pub user_id: i64,
    /// The free-text query as submitted.
    pub query_text: String,
    /// Dataset the query targeted, if any.
    pub dataset_id: Option<i64>,
    /// Result snapshot: total count plus a small sample.
    pub result: Value,
    /// Wall-clock execution time in milliseconds.
    pub execution_time_ms: i64,
    /// When the query ran.
    pub created_at: DateTime<Utc>,
}

/// A user row. Present as a foreign-key target for [`QueryRow`]; the core
/// pipeline does not otherwise exercise it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRow {
    /// Primary key.
    pub id: i64,
    /// Login name.
    pub username: String,
    /// Contact email.
    pub email: String,
    /// Credential hash.
    pub password_hash: String,
    /// Whether the account is active.
    pub is_active: bool,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
}

/// Compact dataset listing entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    /// Primary key.
    pub id: i64,
    /// Human-readable name.
    pub name: String,
    /// Free-text description.
    pub description: Option<String>,
    /// Denormalized record count.
    pub record_count: i64,
    /// Last time records were ingested or modified.
    pub last_updated: DateTime<Utc>,
}

/// Compact analysis listing entry for history views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    /// Primary key.
    pub id: i64,
    /// Dataset the analysis ran over.
    pub dataset_id: i64,
    /// What kind of analysis this is.
    #[serde(rename = "analysis_type")]
    pub kind: AnalysisKind,
    /// Input parameters the run was invoked with.
    pub parameters: Value,
    /// When the analysis was persisted.
    pub created_at: DateTime<Utc>,
    /// Whether the stored result payload is non-null.
    pub has_results: bool,
}
