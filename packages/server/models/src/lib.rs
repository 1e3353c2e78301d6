#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Request and response types for the data hub API server.
//!
//! Every successful endpoint wraps its payload as
//! `{"status": "success", "data": …}`; the types here describe the
//! `data` side of that envelope plus the request bodies and query
//! strings the handlers accept.

use std::collections::BTreeMap;

use data_hub_store_models::{DatasetRow, RecordRow};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Health check payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiHealth {
    /// Package name of the serving binary.
    pub name: String,
    /// Package version of the serving binary.
    pub version: String,
    /// Whether the server considers itself healthy.
    pub healthy: bool,
}

/// Query string accepted by the record listing endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordsQuery {
    /// Page size; clamped server-side.
    pub limit: Option<u32>,
    /// Number of records to skip.
    pub offset: Option<u32>,
    /// URL-encoded JSON object of payload-field equality filters.
    pub filter: Option<String>,
}

/// One page of records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordsPage {
    /// The records on this page.
    pub records: Vec<RecordRow>,
    /// Number of records on this page.
    pub count: usize,
    /// Effective page size after clamping.
    pub limit: u32,
    /// Offset the page started at.
    pub offset: u32,
}

/// Body of the ad-hoc query endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    /// Free-text query; defaults to the empty string.
    #[serde(default)]
    pub query: String,
}

/// Result snapshot persisted with each query audit row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySnapshot {
    /// Total records the query matched.
    pub count: usize,
    /// At most the first five matching records.
    pub sample: Vec<RecordRow>,
}

/// Body of the API ingestion endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestApiRequest {
    /// Source to find or create.
    pub source_name: String,
    /// Dataset to find or create.
    pub dataset_name: String,
    /// HTTP endpoint to pull from.
    pub endpoint: String,
    /// Extra request headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Extra query parameters.
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    /// Key of the response object holding the record list.
    pub data_field: Option<String>,
}

/// Body of the file ingestion endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestFileRequest {
    /// Source to find or create.
    pub source_name: String,
    /// Dataset to find or create.
    pub dataset_name: String,
    /// Path of the file to ingest, local to the server.
    pub file_path: String,
    /// `json` or `csv`; defaults to `json`.
    #[serde(default = "default_file_format")]
    pub file_format: String,
}

fn default_file_format() -> String {
    "json".to_string()
}

/// Query string naming the two fields a trend or time series runs over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendQuery {
    /// Field parsed as the timestamp axis.
    pub time: Option<String>,
    /// Field coerced to the numeric value axis.
    pub value: Option<String>,
}

/// Query string naming chart axes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartQuery {
    /// X axis field; doubles as the category field for pie charts and
    /// the value field for histograms.
    pub x: Option<String>,
    /// Y axis field, where the chart kind needs one.
    pub y: Option<String>,
}

/// Null profile of one field in a describe report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldProfile {
    /// Records in the dataset.
    pub total_records: u64,
    /// Records where the field is present and non-null.
    pub non_null_count: u64,
    /// Percentage of records missing the field or holding null.
    pub null_percentage: f64,
}

/// Field-level profile of a dataset, keyed off the first record's
/// fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescribeReport {
    /// Dataset primary key.
    pub dataset_id: i64,
    /// Dataset name.
    pub name: String,
    /// Records profiled.
    pub record_count: u64,
    /// Fields of the first record.
    pub fields: Vec<String>,
    /// Per-field null profile.
    pub summary: BTreeMap<String, FieldProfile>,
}

/// Composite dashboard view of one dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dashboard {
    /// Full dataset detail.
    pub dataset: DatasetRow,
    /// Result payload of the summary analysis run for this build.
    pub summary: Value,
    /// At most the first ten records.
    pub sample: Vec<RecordRow>,
    /// Auto-selected chart payloads: a `pie` over the first categorical
    /// field and a `histogram` over the first numeric field, each
    /// present only when such a field exists and projects cleanly.
    pub charts: BTreeMap<String, Value>,
}
