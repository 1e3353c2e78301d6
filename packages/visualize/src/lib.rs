#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Chart-ready projections of dataset records.
//!
//! Nothing here renders anything. The functions reshape stored records
//! into the aligned arrays a charting frontend consumes: category/value
//! pairs for line and bar charts, point pairs for scatter plots, label
//! frequencies for pie charts, binned counts for histograms, and a
//! sorted time series. Datasets that cannot support the requested chart
//! produce an `{"error": ...}` payload rather than a failure.

use chrono::{DateTime, Utc};
use data_hub_analytics::{NO_RECORDS_MESSAGE, frame::Frame};
use data_hub_store::{StoreError, db::DataHubDb, queries};
use data_hub_store_models::parsing::{coerce_datetime, coerce_f64};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Bin count for histogram charts.
const HISTOGRAM_BINS: usize = 20;

/// Errors from chart projection.
#[derive(Debug, thiserror::Error)]
pub enum VisualizeError {
    /// A record store operation failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Why a chart could not be built from this dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartError {
    /// Human-readable reason.
    pub error: String,
}

/// Aligned category/value arrays for line and bar charts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxesChart {
    /// Requested chart type, `line` or `bar`.
    pub chart_type: String,
    /// Raw x values, one per kept row.
    pub x_axis: Vec<Value>,
    /// Numeric y values aligned with `x_axis`.
    pub y_axis: Vec<f64>,
    /// Label for the x axis.
    pub x_label: String,
    /// Label for the y axis.
    pub y_label: String,
}

/// Point pairs for scatter plots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointsChart {
    /// Always `scatter`.
    pub chart_type: String,
    /// Raw x values, one per kept row.
    pub x_values: Vec<Value>,
    /// Numeric y values aligned with `x_values`.
    pub y_values: Vec<f64>,
    /// Label for the x axis.
    pub x_label: String,
    /// Label for the y axis.
    pub y_label: String,
}

/// Label frequencies for pie charts, most frequent first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PieChart {
    /// Always `pie`.
    pub chart_type: String,
    /// Distinct labels of the categorical field.
    pub labels: Vec<String>,
    /// Occurrence counts aligned with `labels`.
    pub values: Vec<u64>,
    /// Chart title.
    pub title: String,
}

/// Binned value counts for histograms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramChart {
    /// Always `histogram`.
    pub chart_type: String,
    /// Bin edges; one more edge than there are counts.
    pub bins: Vec<f64>,
    /// Count of values falling in each bin.
    pub values: Vec<u64>,
    /// Label for the x axis.
    pub x_label: String,
    /// Chart title.
    pub title: String,
}

/// Chart payload for one dataset, or the reason none could be built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChartData {
    /// Line or bar chart.
    Axes(AxesChart),
    /// Scatter plot.
    Points(PointsChart),
    /// Pie chart.
    Pie(PieChart),
    /// Histogram.
    Histogram(HistogramChart),
    /// The dataset cannot support the requested chart.
    Error(ChartError),
}

impl ChartData {
    fn error(message: impl Into<String>) -> Self {
        Self::Error(ChartError {
            error: message.into(),
        })
    }
}

/// Chronologically sorted series of a value field over a time field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesData {
    /// RFC 3339 timestamps in ascending order.
    pub x_values: Vec<String>,
    /// Numeric values aligned with `x_values`.
    pub y_values: Vec<f64>,
    /// Label for the x axis.
    pub x_label: String,
    /// Label for the y axis.
    pub y_label: String,
    /// Chart title.
    pub title: String,
}

/// Time series payload, or the reason none could be built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeSeries {
    /// The sorted series.
    Data(TimeSeriesData),
    /// The dataset cannot support a time series.
    Error(ChartError),
}

impl TimeSeries {
    fn error(message: impl Into<String>) -> Self {
        Self::Error(ChartError {
            error: message.into(),
        })
    }
}

/// Projects a dataset into the payload for one chart type.
///
/// `line` and `bar` pair raw x values with numeric-coerced y values and
/// drop rows where either side is unusable; `scatter` does the same
/// under point-style keys; `pie` counts a categorical field; and
/// `histogram` bins a numeric-coercible field. Unknown chart types and
/// unusable fields come back as an error payload, not an `Err`.
///
/// # Errors
///
/// Returns [`VisualizeError`] if loading the records fails.
#[allow(clippy::too_many_lines)]
pub fn chart_data(
    db: &DataHubDb,
    dataset_id: i64,
    chart_type: &str,
    x_field: &str,
    y_field: Option<&str>,
) -> Result<ChartData, VisualizeError> {
    let records = queries::records_for_dataset(db, dataset_id)?;
    if records.is_empty() {
        return Ok(ChartData::error(NO_RECORDS_MESSAGE));
    }
    let frame = Frame::from_records(&records);
    if !frame.has_column(x_field) {
        return Ok(ChartData::error(format!(
            "X field '{x_field}' not found in dataset"
        )));
    }

    let chart = match chart_type {
        "line" | "bar" => {
            let Some(y_field) = y_field else {
                return Ok(ChartData::error(format!(
                    "Y field is required for {chart_type} charts"
                )));
            };
            if !frame.has_column(y_field) {
                return Ok(ChartData::error(format!(
                    "Y field '{y_field}' not found in dataset"
                )));
            }
            let (x_axis, y_axis) = aligned_pairs(&frame, x_field, y_field);
            ChartData::Axes(AxesChart {
                chart_type: chart_type.to_string(),
                x_axis,
                y_axis,
                x_label: x_field.to_string(),
                y_label: y_field.to_string(),
            })
        }
        "scatter" => {
            let Some(y_field) = y_field else {
                return Ok(ChartData::error("Y field is required for scatter charts"));
            };
            if !frame.has_column(y_field) {
                return Ok(ChartData::error(format!(
                    "Y field '{y_field}' not found in dataset"
                )));
            }
            let (x_values, y_values) = aligned_pairs(&frame, x_field, y_field);
            ChartData::Points(PointsChart {
                chart_type: "scatter".to_string(),
                x_values,
                y_values,
                x_label: x_field.to_string(),
                y_label: y_field.to_string(),
            })
        }
        "pie" => {
            if !frame.is_categorical(x_field) {
                return Ok(ChartData::error(format!(
                    "Field '{x_field}' is not categorical, cannot create pie chart"
                )));
            }
            let counts = frame.value_counts(x_field);
            ChartData::Pie(PieChart {
                chart_type: "pie".to_string(),
                labels: counts.iter().map(|(label, _)| label.clone()).collect(),
                values: counts.iter().map(|(_, count)| *count).collect(),
                title: format!("Distribution of {x_field}"),
            })
        }
        "histogram" => {
            let values: Vec<f64> = frame.values(x_field).filter_map(coerce_f64).collect();
            if values.is_empty() {
                return Ok(ChartData::error(format!(
                    "Field '{x_field}' has no numeric data for histogram"
                )));
            }
            let (bins, counts) = histogram(&values, HISTOGRAM_BINS);
            ChartData::Histogram(HistogramChart {
                chart_type: "histogram".to_string(),
                bins,
                values: counts,
                x_label: x_field.to_string(),
                title: format!("Distribution of {x_field}"),
            })
        }
        other => {
            return Ok(ChartData::error(format!("Unsupported chart type: {other}")));
        }
    };
    log::debug!("Built {chart_type} chart for dataset {dataset_id}");
    Ok(chart)
}

/// Projects a dataset into a time series of a value field over a time
/// field, sorted chronologically. Rows where either field fails to
/// parse are dropped; an empty series is a valid result.
///
/// # Errors
///
/// Returns [`VisualizeError`] if loading the records fails.
pub fn time_series_data(
    db: &DataHubDb,
    dataset_id: i64,
    time_field: &str,
    value_field: &str,
) -> Result<TimeSeries, VisualizeError> {
    let records = queries::records_for_dataset(db, dataset_id)?;
    if records.is_empty() {
        return Ok(TimeSeries::error(NO_RECORDS_MESSAGE));
    }
    let frame = Frame::from_records(&records);
    if !frame.has_column(time_field) || !frame.has_column(value_field) {
        return Ok(TimeSeries::error(format!(
            "Required fields not found: {time_field}, {value_field}"
        )));
    }

    let mut points: Vec<(DateTime<Utc>, f64)> = frame
        .rows()
        .filter_map(|row| {
            let time = row.get(time_field).and_then(coerce_datetime)?;
            let value = row.get(value_field).and_then(coerce_f64)?;
            Some((time, value))
        })
        .collect();
    points.sort_by_key(|(time, _)| *time);

    log::debug!("Built time series for dataset {dataset_id} ({} points)", points.len());
    Ok(TimeSeries::Data(TimeSeriesData {
        x_values: points.iter().map(|(time, _)| time.to_rfc3339()).collect(),
        y_values: points.iter().map(|(_, value)| *value).collect(),
        x_label: time_field.to_string(),
        y_label: value_field.to_string(),
        title: format!("Time Series: {value_field} over {time_field}"),
    }))
}

/// Pairs raw x cells with numeric-coerced y cells, dropping rows where
/// the x cell is missing or null or the y cell will not coerce.
fn aligned_pairs(frame: &Frame, x_field: &str, y_field: &str) -> (Vec<Value>, Vec<f64>) {
    let mut xs = Vec::new();
    let mut ys = Vec::new();
    for row in frame.rows() {
        let Some(x) = row.get(x_field).filter(|value| !value.is_null()) else {
            continue;
        };
        let Some(y) = row.get(y_field).and_then(coerce_f64) else {
            continue;
        };
        xs.push(x.clone());
        ys.push(y);
    }
    (xs, ys)
}

/// Evenly spaced bin edges over the value range with per-bin counts.
/// Bins are half-open except the last, which also takes the maximum; a
/// constant series widens to a unit range around the value.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::suboptimal_flops
)]
fn histogram(values: &[f64], bins: usize) -> (Vec<f64>, Vec<u64>) {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let (lo, hi) = if max > min {
        (min, max)
    } else {
        (min - 0.5, max + 0.5)
    };
    let edges = (0..=bins)
        .map(|i| lo + (hi - lo) * (i as f64 / bins as f64))
        .collect();
    let mut counts = vec![0_u64; bins];
    for &value in values {
        let position = (value - lo) / (hi - lo) * bins as f64;
        let index = (position as usize).min(bins - 1);
        counts[index] += 1;
    }
    (edges, counts)
}
