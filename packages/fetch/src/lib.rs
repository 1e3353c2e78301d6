#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Payload acquisition for the ingestion pipeline.
//!
//! Every ingestion run acquires its raw records through the
//! [`RecordFetcher`] trait: [`ApiFetcher`] pulls JSON from an HTTP
//! endpoint with retry, [`FileFetcher`] reads local JSON or CSV files.
//! Both produce a flat list of candidate [`serde_json::Value`]s; the
//! pipeline decides per candidate whether it is a persistable object.

pub mod retry;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

/// Errors that can occur while acquiring a payload.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// HTTP request failed at the transport level.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint answered with a non-success status after retries.
    #[error("API request failed with status {status}")]
    Status {
        /// Terminal HTTP status code.
        status: u16,
    },

    /// A header name or value could not be encoded into a request.
    #[error("Invalid header: {message}")]
    Header {
        /// Description of the offending header.
        message: String,
    },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV parsing failed.
    #[error("CSV parse error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error (file read).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The requested file format has no reader.
    #[error("Unsupported file format: {format}")]
    UnsupportedFormat {
        /// The format string as the caller supplied it.
        format: String,
    },
}

/// Configuration shared by HTTP fetchers.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
        }
    }
}

impl FetchConfig {
    /// Overrides the per-request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds a [`reqwest::Client`] with the configured timeout and the
    /// given default headers.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Header`] if a header name or value is not
    /// encodable, or [`FetchError::Http`] if the client cannot be built.
    pub fn build_client(
        &self,
        headers: &BTreeMap<String, String>,
    ) -> Result<reqwest::Client, FetchError> {
        let mut header_map = reqwest::header::HeaderMap::new();
        for (key, value) in headers {
            let name = reqwest::header::HeaderName::from_bytes(key.as_bytes()).map_err(|e| {
                FetchError::Header {
                    message: format!("invalid header name '{key}': {e}"),
                }
            })?;
            let val =
                reqwest::header::HeaderValue::from_str(value).map_err(|e| FetchError::Header {
                    message: format!("invalid header value '{value}': {e}"),
                })?;
            header_map.insert(name, val);
        }
        reqwest::Client::builder()
            .default_headers(header_map)
            .timeout(self.timeout)
            .build()
            .map_err(FetchError::Http)
    }
}

/// Flattens a decoded body into individual record candidates.
///
/// When `data_field` is given and the body is an object carrying that
/// key, the nested value is flattened instead; a missing key or a
/// non-object body falls back to the whole body. Arrays contribute one
/// candidate per element; any other value is a single candidate. Non-
/// object candidates are kept so the pipeline can count them as failed.
#[must_use]
pub fn extract_candidates(body: &Value, data_field: Option<&str>) -> Vec<Value> {
    let selected = match data_field {
        Some(field) => body.get(field).unwrap_or(body),
        None => body,
    };

    match selected {
        Value::Array(items) => items.clone(),
        other => vec![other.clone()],
    }
}

/// Reads a local file and flattens it into record candidates.
///
/// The format string is matched case-insensitively. JSON files are
/// decoded whole and flattened with [`extract_candidates`]; CSV files
/// yield one object per row, keyed by the trimmed header row, every
/// value a JSON string.
///
/// # Errors
///
/// Returns [`FetchError::UnsupportedFormat`] for an unknown format
/// (message carries the caller's original spelling),
/// [`FetchError::Io`] if the file cannot be read, or a decode error for
/// malformed content.
pub fn read_file_payload(path: &Path, format: &str) -> Result<Vec<Value>, FetchError> {
    match format.to_lowercase().as_str() {
        "json" => {
            let text = std::fs::read_to_string(path)?;
            let body: Value = serde_json::from_str(&text)?;
            Ok(extract_candidates(&body, None))
        }
        "csv" => read_csv_records(path),
        _ => Err(FetchError::UnsupportedFormat {
            format: format.to_string(),
        }),
    }
}

fn read_csv_records(path: &Path) -> Result<Vec<Value>, FetchError> {
    let file = std::fs::File::open(path)?;
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(file);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_owned())
        .collect();

    let mut records: Vec<Value> = Vec::new();
    for result in reader.records() {
        let row = result?;
        let mut map = serde_json::Map::new();
        for (i, header) in headers.iter().enumerate() {
            let value = row.get(i).unwrap_or("").trim().to_owned();
            map.insert(header.clone(), Value::String(value));
        }
        records.push(Value::Object(map));
    }

    log::debug!("Parsed {} records from {}", records.len(), path.display());
    Ok(records)
}

/// Acquisition seam used by the ingestion pipeline.
///
/// Implementations turn an endpoint or path into record candidates.
/// Tests drive the pipeline with stub implementations that never touch
/// the network.
#[async_trait]
pub trait RecordFetcher: Send + Sync {
    /// Fetches all candidates for one ingestion run.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] if acquisition fails at the payload level;
    /// the pipeline records it in the run's FAILED log.
    async fn fetch_records(&self) -> Result<Vec<Value>, FetchError>;
}

/// Fetches JSON records from an HTTP endpoint.
pub struct ApiFetcher {
    config: FetchConfig,
    endpoint: String,
    headers: BTreeMap<String, String>,
    params: BTreeMap<String, String>,
    data_field: Option<String>,
}

impl ApiFetcher {
    /// Creates a fetcher for the given endpoint with default settings.
    #[must_use]
    pub fn new(endpoint: &str) -> Self {
        Self {
            config: FetchConfig::default(),
            endpoint: endpoint.to_owned(),
            headers: BTreeMap::new(),
            params: BTreeMap::new(),
            data_field: None,
        }
    }

    /// Replaces the fetch configuration.
    #[must_use]
    pub fn with_config(mut self, config: FetchConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the default headers sent with every request.
    #[must_use]
    pub fn with_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    /// Sets the query parameters sent with every request.
    #[must_use]
    pub fn with_params(mut self, params: BTreeMap<String, String>) -> Self {
        self.params = params;
        self
    }

    /// Names the response key holding the record array.
    #[must_use]
    pub fn with_data_field(mut self, data_field: Option<String>) -> Self {
        self.data_field = data_field;
        self
    }
}

#[async_trait]
impl RecordFetcher for ApiFetcher {
    async fn fetch_records(&self) -> Result<Vec<Value>, FetchError> {
        let client = self.config.build_client(&self.headers)?;
        let params: Vec<(&str, &str)> = self
            .params
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();

        log::info!("Fetching records from {}", self.endpoint);
        let body = retry::send_json(|| client.get(&self.endpoint).query(&params)).await?;

        Ok(extract_candidates(&body, self.data_field.as_deref()))
    }
}

/// Reads records from a local file.
pub struct FileFetcher {
    path: PathBuf,
    format: String,
}

impl FileFetcher {
    /// Creates a fetcher for the given path and format string.
    #[must_use]
    pub fn new(path: &Path, format: &str) -> Self {
        Self {
            path: path.to_path_buf(),
            format: format.to_owned(),
        }
    }
}

#[async_trait]
impl RecordFetcher for FileFetcher {
    async fn fetch_records(&self) -> Result<Vec<Value>, FetchError> {
        log::info!(
            "Reading {} records from {}",
            self.format,
            self.path.display()
        );
        read_file_payload(&self.path, &self.format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn array_body_yields_one_candidate_per_element() {
        let body = json!([{"a": 1}, {"a": 2}]);
        let candidates = extract_candidates(&body, None);
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[1], json!({"a": 2}));
    }

    #[test]
    fn single_object_body_is_one_candidate() {
        let body = json!({"a": 1});
        assert_eq!(extract_candidates(&body, None), vec![json!({"a": 1})]);
    }

    #[test]
    fn data_field_unwraps_nested_array() {
        let body = json!({"results": [{"a": 1}], "total": 1});
        let candidates = extract_candidates(&body, Some("results"));
        assert_eq!(candidates, vec![json!({"a": 1})]);
    }

    #[test]
    fn missing_data_field_falls_back_to_whole_body() {
        let body = json!({"a": 1});
        let candidates = extract_candidates(&body, Some("results"));
        assert_eq!(candidates, vec![json!({"a": 1})]);
    }

    #[test]
    fn scalar_body_is_kept_for_downstream_failure_counting() {
        let body = json!(42);
        assert_eq!(extract_candidates(&body, None), vec![json!(42)]);
    }

    #[test]
    fn unsupported_format_carries_original_spelling() {
        let err = read_file_payload(Path::new("/nonexistent"), "parquet").unwrap_err();
        assert_eq!(err.to_string(), "Unsupported file format: parquet");
    }

    #[test]
    fn format_matching_is_case_insensitive() {
        let tmp = std::env::temp_dir().join("fetch_format_case_test.json");
        std::fs::write(&tmp, r#"[{"a": 1}]"#).unwrap();

        let records = read_file_payload(&tmp, "JSON").unwrap();
        assert_eq!(records.len(), 1);

        let _ = std::fs::remove_file(&tmp);
    }

    #[test]
    fn csv_rows_become_string_valued_objects() {
        let tmp = std::env::temp_dir().join("fetch_csv_test.csv");
        std::fs::write(&tmp, "name, price\nWidget, 19.99\nGadget, 5\n").unwrap();

        let records = read_file_payload(&tmp, "csv").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["name"], json!("Widget"));
        assert_eq!(records[0]["price"], json!("19.99"));
        assert_eq!(records[1]["price"], json!("5"));

        let _ = std::fs::remove_file(&tmp);
    }
}
