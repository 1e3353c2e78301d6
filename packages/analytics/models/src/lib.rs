#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Analysis parameter and result types.
//!
//! These are the shapes persisted in analysis rows and returned over the
//! API: column maps keyed by field name, with quartile keys spelled
//! `"25%"`/`"50%"`/`"75%"` on the wire. Insufficient-data cases serialize
//! as bare explanation strings in place of the column maps.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Options for a statistical analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatisticalParams {
    /// Include per-column descriptive statistics.
    #[serde(default = "default_true")]
    pub include_descriptive_stats: bool,
    /// Include the pairwise correlation matrix.
    #[serde(default)]
    pub include_correlations: bool,
}

impl Default for StatisticalParams {
    fn default() -> Self {
        Self {
            include_descriptive_stats: true,
            include_correlations: false,
        }
    }
}

const fn default_true() -> bool {
    true
}

/// Fields a trend analysis regresses over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendParams {
    /// Field parsed as the timestamp axis.
    pub time_field: String,
    /// Field coerced to the numeric value axis.
    pub value_field: String,
}

/// Descriptive statistics for one numeric column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnStats {
    /// Number of non-null values.
    pub count: u64,
    /// Arithmetic mean.
    pub mean: f64,
    /// Sample standard deviation (n-1); null when fewer than two values.
    pub std: Option<f64>,
    /// Smallest value.
    pub min: f64,
    /// First quartile, linear interpolation.
    #[serde(rename = "25%")]
    pub p25: f64,
    /// Median.
    #[serde(rename = "50%")]
    pub p50: f64,
    /// Third quartile.
    #[serde(rename = "75%")]
    pub p75: f64,
    /// Largest value.
    pub max: f64,
}

/// Descriptive-statistics section: per-column stats, or an explanation
/// string when the dataset has no numeric columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DescriptiveStats {
    /// Stats keyed by column name.
    Columns(BTreeMap<String, ColumnStats>),
    /// Why no stats were computed.
    Unavailable(String),
}

/// Correlation section: full pairwise Pearson matrix, or an explanation
/// string when fewer than two numeric columns exist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Correlations {
    /// `matrix[a][b]` is the Pearson correlation of columns `a` and `b`;
    /// null where undefined (zero variance).
    Matrix(BTreeMap<String, BTreeMap<String, Option<f64>>>),
    /// Why no matrix was computed.
    Unavailable(String),
}

/// Frequency profile of one categorical column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoricalStats {
    /// Distinct non-null values.
    pub unique_values: u64,
    /// Value -> occurrence count, over every distinct value.
    pub top_values: BTreeMap<String, u64>,
    /// Modal value; ties break toward the smallest label. Null when the
    /// column holds no non-null values.
    pub most_common: Option<String>,
}

/// Result payload of a statistical analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatisticalResults {
    /// Present when descriptive stats were requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub descriptive_stats: Option<DescriptiveStats>,
    /// Present when correlations were requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlations: Option<Correlations>,
    /// Present when the dataset has at least one categorical column.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categorical_stats: Option<BTreeMap<String, CategoricalStats>>,
}

/// Direction label derived from a fitted slope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    /// Slope is positive.
    Increasing,
    /// Slope is negative.
    Decreasing,
    /// Slope is exactly zero.
    Stable,
}

impl TrendDirection {
    /// Classifies a fitted slope.
    #[must_use]
    pub const fn from_slope(slope: f64) -> Self {
        if slope > 0.0 {
            Self::Increasing
        } else if slope < 0.0 {
            Self::Decreasing
        } else {
            Self::Stable
        }
    }
}

impl std::fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Increasing => write!(f, "increasing"),
            Self::Decreasing => write!(f, "decreasing"),
            Self::Stable => write!(f, "stable"),
        }
    }
}

/// Fitted regression line of value against elapsed days.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendLine {
    /// Change in value per elapsed day.
    pub slope: f64,
    /// Fitted value at the earliest timestamp.
    pub intercept: f64,
    /// Coefficient of determination.
    pub r_squared: f64,
    /// Two-sided p-value of the slope.
    pub p_value: f64,
    /// Standard error of the slope estimate.
    pub std_err: f64,
    /// Direction label derived from the slope.
    pub direction: TrendDirection,
}

/// Time span covered by the valid points of a trend analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    /// Earliest timestamp.
    pub start: DateTime<Utc>,
    /// Latest timestamp.
    pub end: DateTime<Utc>,
}

/// Value spread of the valid points of a trend analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    /// Smallest value.
    pub min: f64,
    /// Largest value.
    pub max: f64,
    /// Arithmetic mean.
    pub mean: f64,
}

/// Point-count and range summary attached to a trend result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSummary {
    /// Valid (time, value) pairs used in the fit.
    pub total_points: u64,
    /// Time span covered.
    pub date_range: DateRange,
    /// Value spread covered.
    pub value_range: ValueRange,
}

/// Result payload of a trend analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendResults {
    /// The fitted line.
    pub trend: TrendLine,
    /// Range summary of the points behind the fit.
    pub summary: TrendSummary,
}

/// Inferred type of one column across a dataset's records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    /// Every non-null value is a JSON number.
    Number,
    /// Every non-null value is a string.
    Text,
    /// Every non-null value is a boolean.
    Boolean,
    /// Every non-null value is an array.
    Array,
    /// Every non-null value is an object.
    Object,
    /// Every occurrence is null.
    Null,
    /// Non-null values of more than one JSON type.
    Mixed,
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number => write!(f, "number"),
            Self::Text => write!(f, "text"),
            Self::Boolean => write!(f, "boolean"),
            Self::Array => write!(f, "array"),
            Self::Object => write!(f, "object"),
            Self::Null => write!(f, "null"),
            Self::Mixed => write!(f, "mixed"),
        }
    }
}

/// Column-level profile of a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetProfile {
    /// Number of records.
    pub total_records: u64,
    /// Number of distinct columns across all records.
    pub total_columns: u64,
    /// Total serialized payload size in bytes.
    pub memory_usage: u64,
    /// Column names in first-seen order.
    pub column_names: Vec<String>,
    /// Inferred type per column.
    pub data_types: BTreeMap<String, ColumnType>,
    /// Missing-or-null count per column.
    pub null_counts: BTreeMap<String, u64>,
}

/// 25th/75th percentile maps of a numeric summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quartiles {
    /// First quartile per column.
    #[serde(rename = "25%")]
    pub p25: BTreeMap<String, f64>,
    /// Third quartile per column.
    #[serde(rename = "75%")]
    pub p75: BTreeMap<String, f64>,
}

/// Stat-major numeric summary over all numeric columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericSummary {
    /// Mean per column.
    pub mean: BTreeMap<String, f64>,
    /// Sample standard deviation per column; null when fewer than two
    /// values.
    pub std: BTreeMap<String, Option<f64>>,
    /// Median per column.
    pub median: BTreeMap<String, f64>,
    /// Quartile maps.
    pub quartiles: Quartiles,
}

/// Result payload of a summary analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryResults {
    /// Column-level dataset profile.
    pub summary: DatasetProfile,
    /// Present when the dataset has at least one numeric column.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numeric_summary: Option<NumericSummary>,
}
