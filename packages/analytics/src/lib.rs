#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Analysis runners over stored datasets.
//!
//! Each `run_*` function loads a dataset's records, computes a typed
//! result payload, persists it as an analysis row, and returns the row.
//! Problems with the data itself (no records, missing fields, too few
//! valid points) come back as an [`AnalysisOutcome::Error`] payload and
//! are not persisted; store and serialization failures are real errors.

pub mod frame;
pub mod stats;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use data_hub_analytics_models::{
    CategoricalStats, ColumnStats, Correlations, DatasetProfile, DateRange, DescriptiveStats,
    NumericSummary, Quartiles, StatisticalParams, StatisticalResults, SummaryResults,
    TrendDirection, TrendLine, TrendParams, TrendResults, TrendSummary, ValueRange,
};
use data_hub_store::{StoreError, db::DataHubDb, queries};
use data_hub_store_models::{
    AnalysisKind, AnalysisRow, AnalysisSummary,
    parsing::{coerce_datetime, coerce_f64},
};
use serde::Serialize;
use serde_json::{Value, json};

use crate::frame::Frame;

/// Error payload message for analyses and charts over an empty dataset.
pub const NO_RECORDS_MESSAGE: &str = "No records found for this dataset";

/// Errors from the analysis runners.
#[derive(Debug, thiserror::Error)]
pub enum AnalyticsError {
    /// A record store operation failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// An analysis payload could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Outcome of one analysis run.
///
/// Serializes as either the stored analysis row or a bare
/// `{"error": ...}` object.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum AnalysisOutcome {
    /// The analysis ran and its row was persisted.
    Stored(AnalysisRow),
    /// The dataset could not support the analysis; nothing was persisted.
    Error {
        /// Human-readable reason.
        error: String,
    },
}

impl AnalysisOutcome {
    fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }

    /// Returns the persisted row when the run succeeded.
    #[must_use]
    pub const fn stored(&self) -> Option<&AnalysisRow> {
        match self {
            Self::Stored(row) => Some(row),
            Self::Error { .. } => None,
        }
    }
}

/// Runs a statistical analysis: descriptive stats, optional correlation
/// matrix, and categorical frequency profiles.
///
/// # Errors
///
/// Returns [`AnalyticsError`] if the store or serialization fails.
pub fn run_statistical_analysis(
    db: &DataHubDb,
    dataset_id: i64,
    params: &StatisticalParams,
) -> Result<AnalysisOutcome, AnalyticsError> {
    let records = queries::records_for_dataset(db, dataset_id)?;
    if records.is_empty() {
        return Ok(AnalysisOutcome::error(NO_RECORDS_MESSAGE));
    }
    let frame = Frame::from_records(&records);
    let numeric: Vec<String> = frame
        .columns()
        .iter()
        .filter(|name| frame.is_numeric(name))
        .cloned()
        .collect();

    let mut results = StatisticalResults::default();

    if params.include_descriptive_stats {
        results.descriptive_stats = Some(if numeric.is_empty() {
            DescriptiveStats::Unavailable("No numeric columns found".to_string())
        } else {
            let columns = numeric
                .iter()
                .filter_map(|name| {
                    describe_column(frame.number_values(name))
                        .map(|stats| (name.clone(), stats))
                })
                .collect();
            DescriptiveStats::Columns(columns)
        });
    }

    if params.include_correlations {
        results.correlations = Some(if numeric.len() > 1 {
            Correlations::Matrix(correlation_matrix(&frame, &numeric))
        } else {
            Correlations::Unavailable(
                "Not enough numeric columns for correlation analysis".to_string(),
            )
        });
    }

    let categorical: BTreeMap<String, CategoricalStats> = frame
        .columns()
        .iter()
        .filter(|name| frame.is_categorical(name))
        .map(|name| (name.clone(), categorical_stats(&frame, name)))
        .collect();
    if !categorical.is_empty() {
        results.categorical_stats = Some(categorical);
    }

    let parameters = serde_json::to_value(params)?;
    store_result(db, dataset_id, AnalysisKind::Statistical, &parameters, &results)
}

/// Runs a trend analysis: least-squares fit of a value field against
/// elapsed days of a time field.
///
/// Rows where either field fails to parse are dropped before fitting.
///
/// # Errors
///
/// Returns [`AnalyticsError`] if the store or serialization fails.
#[allow(clippy::cast_precision_loss)]
pub fn run_trend_analysis(
    db: &DataHubDb,
    dataset_id: i64,
    params: &TrendParams,
) -> Result<AnalysisOutcome, AnalyticsError> {
    let records = queries::records_for_dataset(db, dataset_id)?;
    if records.is_empty() {
        return Ok(AnalysisOutcome::error(NO_RECORDS_MESSAGE));
    }
    let frame = Frame::from_records(&records);
    if !frame.has_column(&params.time_field) || !frame.has_column(&params.value_field) {
        return Ok(AnalysisOutcome::error(format!(
            "Required fields not found: {}, {}",
            params.time_field, params.value_field
        )));
    }

    let mut points: Vec<(DateTime<Utc>, f64)> = frame
        .rows()
        .filter_map(|row| {
            let time = row.get(&params.time_field).and_then(coerce_datetime)?;
            let value = row.get(&params.value_field).and_then(coerce_f64)?;
            Some((time, value))
        })
        .collect();
    if points.len() < 2 {
        return Ok(AnalysisOutcome::error(
            "Not enough valid data points for trend analysis",
        ));
    }
    points.sort_by_key(|(time, _)| *time);

    let start = points[0].0;
    let end = points[points.len() - 1].0;
    let xs: Vec<f64> = points
        .iter()
        .map(|(time, _)| (*time - start).num_days() as f64)
        .collect();
    let ys: Vec<f64> = points.iter().map(|(_, value)| *value).collect();

    let Some(fit) = stats::linear_regression(&xs, &ys) else {
        let message = "Cannot calculate a linear regression if all x values are identical";
        log::error!("Trend analysis failed: {message}");
        return Ok(AnalysisOutcome::error(message));
    };

    let results = TrendResults {
        trend: TrendLine {
            slope: fit.slope,
            intercept: fit.intercept,
            r_squared: fit.r_value * fit.r_value,
            p_value: fit.p_value,
            std_err: fit.std_err,
            direction: TrendDirection::from_slope(fit.slope),
        },
        summary: TrendSummary {
            total_points: points.len() as u64,
            date_range: DateRange { start, end },
            value_range: ValueRange {
                min: ys.iter().copied().fold(f64::INFINITY, f64::min),
                max: ys.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                mean: stats::mean(&ys).unwrap_or_default(),
            },
        },
    };

    let parameters = serde_json::to_value(params)?;
    store_result(db, dataset_id, AnalysisKind::Trend, &parameters, &results)
}

/// Runs a summary analysis: dataset-level column profile plus a
/// stat-major numeric overview when numeric columns exist.
///
/// # Errors
///
/// Returns [`AnalyticsError`] if the store or serialization fails.
pub fn run_summary_analysis(
    db: &DataHubDb,
    dataset_id: i64,
) -> Result<AnalysisOutcome, AnalyticsError> {
    let records = queries::records_for_dataset(db, dataset_id)?;
    if records.is_empty() {
        return Ok(AnalysisOutcome::error(NO_RECORDS_MESSAGE));
    }
    let frame = Frame::from_records(&records);

    let profile = DatasetProfile {
        total_records: frame.len() as u64,
        total_columns: frame.columns().len() as u64,
        memory_usage: records
            .iter()
            .map(|record| record.payload.to_string().len() as u64)
            .sum(),
        column_names: frame.columns().to_vec(),
        data_types: frame
            .columns()
            .iter()
            .map(|name| (name.clone(), frame.column_type(name)))
            .collect(),
        null_counts: frame
            .columns()
            .iter()
            .map(|name| (name.clone(), frame.null_count(name) as u64))
            .collect(),
    };

    let numeric: Vec<String> = frame
        .columns()
        .iter()
        .filter(|name| frame.is_numeric(name))
        .cloned()
        .collect();
    let numeric_summary = if numeric.is_empty() {
        None
    } else {
        Some(numeric_summary(&frame, &numeric))
    };

    let results = SummaryResults {
        summary: profile,
        numeric_summary,
    };
    store_result(db, dataset_id, AnalysisKind::Summary, &json!({}), &results)
}

/// Lists persisted analyses, newest first, optionally scoped to one
/// dataset.
///
/// # Errors
///
/// Returns [`AnalyticsError`] if the store query fails.
pub fn analysis_history(
    db: &DataHubDb,
    dataset_id: Option<i64>,
) -> Result<Vec<AnalysisSummary>, AnalyticsError> {
    Ok(queries::list_analyses(db, dataset_id)?)
}

/// Fetches one persisted analysis, `None` if the id does not resolve.
///
/// # Errors
///
/// Returns [`AnalyticsError`] if the store query fails.
pub fn analysis_result(
    db: &DataHubDb,
    analysis_id: i64,
) -> Result<Option<AnalysisRow>, AnalyticsError> {
    match queries::get_analysis(db, analysis_id) {
        Ok(row) => Ok(Some(row)),
        Err(StoreError::AnalysisNotFound { .. }) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn store_result<T: Serialize>(
    db: &DataHubDb,
    dataset_id: i64,
    kind: AnalysisKind,
    parameters: &Value,
    results: &T,
) -> Result<AnalysisOutcome, AnalyticsError> {
    let results = serde_json::to_value(results)?;
    let row = queries::insert_analysis(db, dataset_id, kind, parameters, &results)?;
    log::debug!("Stored {kind} analysis {} for dataset {dataset_id}", row.id);
    Ok(AnalysisOutcome::Stored(row))
}

fn describe_column(mut values: Vec<f64>) -> Option<ColumnStats> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    Some(ColumnStats {
        count: values.len() as u64,
        mean: stats::mean(&values)?,
        std: stats::sample_std(&values),
        min: values[0],
        p25: stats::quantile(&values, 0.25)?,
        p50: stats::quantile(&values, 0.5)?,
        p75: stats::quantile(&values, 0.75)?,
        max: values[values.len() - 1],
    })
}

/// Pairwise-complete Pearson matrix. Cells where either column has zero
/// variance over the shared rows are null, the diagonal included.
fn correlation_matrix(
    frame: &Frame,
    columns: &[String],
) -> BTreeMap<String, BTreeMap<String, Option<f64>>> {
    let mut matrix = BTreeMap::new();
    for a in columns {
        let mut row = BTreeMap::new();
        for b in columns {
            row.insert(b.clone(), pairwise_pearson(frame, a, b));
        }
        matrix.insert(a.clone(), row);
    }
    matrix
}

fn pairwise_pearson(frame: &Frame, a: &str, b: &str) -> Option<f64> {
    let mut xs = Vec::new();
    let mut ys = Vec::new();
    for row in frame.rows() {
        let x = row.get(a).and_then(Value::as_f64);
        let y = row.get(b).and_then(Value::as_f64);
        if let (Some(x), Some(y)) = (x, y) {
            xs.push(x);
            ys.push(y);
        }
    }
    stats::pearson(&xs, &ys)
}

fn categorical_stats(frame: &Frame, name: &str) -> CategoricalStats {
    let counts = frame.value_counts(name);
    CategoricalStats {
        unique_values: counts.len() as u64,
        most_common: counts.first().map(|(label, _)| label.clone()),
        top_values: counts.into_iter().collect(),
    }
}

fn numeric_summary(frame: &Frame, columns: &[String]) -> NumericSummary {
    let mut mean = BTreeMap::new();
    let mut std = BTreeMap::new();
    let mut median = BTreeMap::new();
    let mut p25 = BTreeMap::new();
    let mut p75 = BTreeMap::new();
    for name in columns {
        let mut values = frame.number_values(name);
        values.sort_by(f64::total_cmp);
        if let Some(center) = stats::mean(&values) {
            mean.insert(name.clone(), center);
        }
        std.insert(name.clone(), stats::sample_std(&values));
        if let Some(mid) = stats::quantile(&values, 0.5) {
            median.insert(name.clone(), mid);
        }
        if let Some(lower) = stats::quantile(&values, 0.25) {
            p25.insert(name.clone(), lower);
        }
        if let Some(upper) = stats::quantile(&values, 0.75) {
            p75.insert(name.clone(), upper);
        }
    }
    NumericSummary {
        mean,
        std,
        median,
        quartiles: Quartiles { p25, p75 },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use data_hub_store_models::SourceKind;

    fn seeded_db(payloads: &[Value]) -> (DataHubDb, i64) {
        let db = DataHubDb::open_in_memory().unwrap();
        let source =
            queries::insert_source(&db, "unit", SourceKind::Api, None, &json!({})).unwrap();
        let dataset = queries::insert_dataset(&db, "unit-data", source.id, None, None).unwrap();
        let items: Vec<(Value, Value)> = payloads
            .iter()
            .map(|payload| (payload.clone(), json!({})))
            .collect();
        queries::insert_records(&db, dataset.id, &items).unwrap();
        (db, dataset.id)
    }

    fn approx(value: &Value, expected: f64) -> bool {
        value
            .as_f64()
            .is_some_and(|v| (v - expected).abs() < 1e-6)
    }

    #[test]
    fn describe_matches_hand_computed_quartiles() {
        let (db, dataset_id) = seeded_db(&[
            json!({"price": 10, "name": "a"}),
            json!({"price": 20, "name": "b"}),
            json!({"price": 30, "name": "c"}),
            json!({"price": 40, "name": "d"}),
        ]);
        let outcome =
            run_statistical_analysis(&db, dataset_id, &StatisticalParams::default()).unwrap();
        let row = outcome.stored().expect("analysis should persist");
        assert_eq!(row.kind, AnalysisKind::Statistical);
        assert_eq!(row.parameters["include_descriptive_stats"], json!(true));
        assert_eq!(row.parameters["include_correlations"], json!(false));

        let stats = &row.result["descriptive_stats"]["price"];
        assert_eq!(stats["count"], json!(4));
        assert!(approx(&stats["mean"], 25.0));
        assert!(approx(&stats["std"], 12.909_944));
        assert!(approx(&stats["min"], 10.0));
        assert!(approx(&stats["25%"], 17.5));
        assert!(approx(&stats["50%"], 25.0));
        assert!(approx(&stats["75%"], 32.5));
        assert!(approx(&stats["max"], 40.0));
    }

    #[test]
    fn no_numeric_columns_reports_explanatory_string() {
        let (db, dataset_id) = seeded_db(&[json!({"name": "a"}), json!({"name": "b"})]);
        let outcome =
            run_statistical_analysis(&db, dataset_id, &StatisticalParams::default()).unwrap();
        let row = outcome.stored().unwrap();
        assert_eq!(row.result["descriptive_stats"], json!("No numeric columns found"));
        assert!(row.result["categorical_stats"]["name"].is_object());
    }

    #[test]
    fn correlations_gated_by_params_and_column_count() {
        let payloads = [
            json!({"x": 1, "y": 2}),
            json!({"x": 2, "y": 4}),
            json!({"x": 3, "y": 6}),
        ];
        let (db, dataset_id) = seeded_db(&payloads);

        let default_run =
            run_statistical_analysis(&db, dataset_id, &StatisticalParams::default()).unwrap();
        assert!(default_run.stored().unwrap().result.get("correlations").is_none());

        let params = StatisticalParams {
            include_descriptive_stats: true,
            include_correlations: true,
        };
        let with_matrix = run_statistical_analysis(&db, dataset_id, &params).unwrap();
        let matrix = &with_matrix.stored().unwrap().result["correlations"];
        assert!(approx(&matrix["x"]["y"], 1.0));
        assert!(approx(&matrix["y"]["x"], 1.0));
        assert!(approx(&matrix["x"]["x"], 1.0));

        let (db, lone) = seeded_db(&[json!({"x": 1}), json!({"x": 2})]);
        let outcome = run_statistical_analysis(&db, lone, &params).unwrap();
        assert_eq!(
            outcome.stored().unwrap().result["correlations"],
            json!("Not enough numeric columns for correlation analysis")
        );
    }

    #[test]
    fn categorical_counts_full_table_and_mode_tie() {
        let (db, dataset_id) = seeded_db(&[
            json!({"cat": "b"}),
            json!({"cat": "a"}),
            json!({"cat": "b"}),
            json!({"cat": "c"}),
            json!({"cat": "a"}),
        ]);
        let outcome =
            run_statistical_analysis(&db, dataset_id, &StatisticalParams::default()).unwrap();
        let stats = &outcome.stored().unwrap().result["categorical_stats"]["cat"];
        assert_eq!(stats["unique_values"], json!(3));
        assert_eq!(stats["top_values"], json!({"a": 2, "b": 2, "c": 1}));
        assert_eq!(stats["most_common"], json!("a"));
    }

    #[test]
    fn empty_dataset_returns_error_without_persisting() {
        let (db, dataset_id) = seeded_db(&[]);

        let outcome =
            run_statistical_analysis(&db, dataset_id, &StatisticalParams::default()).unwrap();
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            json!({"error": NO_RECORDS_MESSAGE})
        );

        let summary = run_summary_analysis(&db, dataset_id).unwrap();
        assert!(summary.stored().is_none());

        let params = TrendParams {
            time_field: "date".to_string(),
            value_field: "value".to_string(),
        };
        let trend = run_trend_analysis(&db, dataset_id, &params).unwrap();
        assert!(trend.stored().is_none());

        assert!(analysis_history(&db, Some(dataset_id)).unwrap().is_empty());
    }

    #[test]
    fn increasing_series_trends_upward() {
        // Out of order on purpose; the runner sorts by time.
        let (db, dataset_id) = seeded_db(&[
            json!({"date": "2024-01-03", "value": 30}),
            json!({"date": "2024-01-01", "value": 10}),
            json!({"date": "2024-01-05", "value": 50}),
            json!({"date": "2024-01-02", "value": 20}),
            json!({"date": "2024-01-04", "value": 40}),
        ]);
        let params = TrendParams {
            time_field: "date".to_string(),
            value_field: "value".to_string(),
        };
        let outcome = run_trend_analysis(&db, dataset_id, &params).unwrap();
        let row = outcome.stored().expect("trend should persist");
        assert_eq!(row.kind, AnalysisKind::Trend);

        let trend = &row.result["trend"];
        assert!(approx(&trend["slope"], 10.0));
        assert!(approx(&trend["intercept"], 10.0));
        assert!(approx(&trend["r_squared"], 1.0));
        assert!(trend["p_value"].as_f64().unwrap() < 1e-6);
        assert_eq!(trend["direction"], json!("increasing"));

        let summary = &row.result["summary"];
        assert_eq!(summary["total_points"], json!(5));
        let start = summary["date_range"]["start"].as_str().unwrap();
        let end = summary["date_range"]["end"].as_str().unwrap();
        assert!(start.starts_with("2024-01-01"));
        assert!(end.starts_with("2024-01-05"));
        assert!(approx(&summary["value_range"]["min"], 10.0));
        assert!(approx(&summary["value_range"]["max"], 50.0));
        assert!(approx(&summary["value_range"]["mean"], 30.0));
    }

    #[test]
    fn trend_requires_both_fields() {
        let (db, dataset_id) = seeded_db(&[json!({"date": "2024-01-01", "value": 1})]);
        let params = TrendParams {
            time_field: "timestamp".to_string(),
            value_field: "value".to_string(),
        };
        let outcome = run_trend_analysis(&db, dataset_id, &params).unwrap();
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            json!({"error": "Required fields not found: timestamp, value"})
        );
    }

    #[test]
    fn trend_with_sparse_valid_points_refuses() {
        let (db, dataset_id) = seeded_db(&[
            json!({"date": "2024-01-01", "value": 10}),
            json!({"date": "not a date", "value": 20}),
            json!({"date": "2024-01-03", "value": "n/a"}),
        ]);
        let params = TrendParams {
            time_field: "date".to_string(),
            value_field: "value".to_string(),
        };
        let outcome = run_trend_analysis(&db, dataset_id, &params).unwrap();
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            json!({"error": "Not enough valid data points for trend analysis"})
        );
    }

    #[test]
    fn same_day_timestamps_cannot_fit() {
        let (db, dataset_id) = seeded_db(&[
            json!({"date": "2024-01-01", "value": 10}),
            json!({"date": "2024-01-01", "value": 20}),
        ]);
        let params = TrendParams {
            time_field: "date".to_string(),
            value_field: "value".to_string(),
        };
        let outcome = run_trend_analysis(&db, dataset_id, &params).unwrap();
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            json!({"error": "Cannot calculate a linear regression if all x values are identical"})
        );
    }

    #[test]
    fn summary_profiles_columns() {
        let (db, dataset_id) = seeded_db(&[
            json!({"name": "a", "price": 10, "tag": null}),
            json!({"name": "b", "price": 30}),
        ]);
        let outcome = run_summary_analysis(&db, dataset_id).unwrap();
        let row = outcome.stored().expect("summary should persist");
        assert_eq!(row.kind, AnalysisKind::Summary);
        assert_eq!(row.parameters, json!({}));

        let summary = &row.result["summary"];
        assert_eq!(summary["total_records"], json!(2));
        assert_eq!(summary["total_columns"], json!(3));
        assert_eq!(summary["column_names"], json!(["name", "price", "tag"]));
        assert_eq!(summary["data_types"]["name"], json!("text"));
        assert_eq!(summary["data_types"]["price"], json!("number"));
        assert_eq!(summary["data_types"]["tag"], json!("null"));
        assert_eq!(summary["null_counts"]["name"], json!(0));
        assert_eq!(summary["null_counts"]["tag"], json!(2));
        assert!(summary["memory_usage"].as_u64().unwrap() > 0);

        let numeric = &row.result["numeric_summary"];
        assert!(approx(&numeric["mean"]["price"], 20.0));
        assert!(approx(&numeric["std"]["price"], 14.142_136));
        assert!(approx(&numeric["median"]["price"], 20.0));
        assert!(approx(&numeric["quartiles"]["25%"]["price"], 15.0));
        assert!(approx(&numeric["quartiles"]["75%"]["price"], 25.0));
    }

    #[test]
    fn history_and_result_roundtrip() {
        let (db, dataset_id) = seeded_db(&[json!({"price": 10}), json!({"price": 20})]);
        run_summary_analysis(&db, dataset_id).unwrap();
        let latest =
            run_statistical_analysis(&db, dataset_id, &StatisticalParams::default()).unwrap();
        let latest_id = latest.stored().unwrap().id;

        let history = analysis_history(&db, Some(dataset_id)).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, latest_id);
        assert_eq!(history[0].kind, AnalysisKind::Statistical);
        assert_eq!(history[1].kind, AnalysisKind::Summary);
        assert!(history.iter().all(|entry| entry.has_results));

        let fetched = analysis_result(&db, latest_id).unwrap().unwrap();
        assert_eq!(fetched.result, latest.stored().unwrap().result);
        assert!(analysis_result(&db, 9999).unwrap().is_none());
    }
}
