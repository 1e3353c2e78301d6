//! Column-oriented view over schema-flexible record payloads.
//!
//! Records in one dataset may carry completely different keys, so there
//! is no fixed schema to project onto. A [`Frame`] collects the union of
//! keys in first-seen order and infers a per-column type from the
//! non-null values, which is what the statistical and summary analyses
//! (and the pie-chart categorical check) dispatch on.

use std::collections::BTreeMap;

use data_hub_analytics_models::ColumnType;
use data_hub_store_models::RecordRow;
use serde_json::{Map, Value};

/// Column view over one dataset's record payloads.
pub struct Frame {
    columns: Vec<String>,
    rows: Vec<Map<String, Value>>,
}

impl Frame {
    /// Builds a frame from record payloads. A non-object payload
    /// contributes a row with no columns.
    #[must_use]
    pub fn from_records(records: &[RecordRow]) -> Self {
        let mut columns: Vec<String> = Vec::new();
        let mut rows = Vec::with_capacity(records.len());
        for record in records {
            let map = record.payload.as_object().cloned().unwrap_or_default();
            for key in map.keys() {
                if !columns.iter().any(|column| column == key) {
                    columns.push(key.clone());
                }
            }
            rows.push(map);
        }
        Self { columns, rows }
    }

    /// Number of records behind this frame.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the frame holds no records.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column names in first-seen order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Whether any record carries the named field.
    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|column| column == name)
    }

    /// Row payloads in record order.
    pub fn rows(&self) -> impl Iterator<Item = &Map<String, Value>> {
        self.rows.iter()
    }

    /// Non-null values of one column, in record order.
    pub fn values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Value> {
        self.rows
            .iter()
            .filter_map(move |row| row.get(name))
            .filter(|value| !value.is_null())
    }

    /// Infers the column type from its non-null values.
    #[must_use]
    pub fn column_type(&self, name: &str) -> ColumnType {
        let mut seen: Option<ColumnType> = None;
        for value in self.values(name) {
            let kind = match value {
                Value::Number(_) => ColumnType::Number,
                Value::String(_) => ColumnType::Text,
                Value::Bool(_) => ColumnType::Boolean,
                Value::Array(_) => ColumnType::Array,
                Value::Object(_) => ColumnType::Object,
                Value::Null => continue,
            };
            match seen {
                None => seen = Some(kind),
                Some(prev) if prev == kind => {}
                Some(_) => return ColumnType::Mixed,
            }
        }
        seen.unwrap_or(ColumnType::Null)
    }

    /// Whether statistical analyses treat the column as numeric: every
    /// non-null value is a JSON number.
    #[must_use]
    pub fn is_numeric(&self, name: &str) -> bool {
        self.column_type(name) == ColumnType::Number
    }

    /// Whether statistical analyses treat the column as categorical.
    /// Everything that is neither numeric nor boolean counts, including
    /// mixed and all-null columns.
    #[must_use]
    pub fn is_categorical(&self, name: &str) -> bool {
        !matches!(
            self.column_type(name),
            ColumnType::Number | ColumnType::Boolean
        )
    }

    /// Values of a numeric column as `f64`, in record order. Cells that
    /// are not JSON numbers are skipped, not coerced.
    #[must_use]
    pub fn number_values(&self, name: &str) -> Vec<f64> {
        self.values(name).filter_map(Value::as_f64).collect()
    }

    /// Rows where the column is missing or null.
    #[must_use]
    pub fn null_count(&self, name: &str) -> usize {
        self.rows
            .iter()
            .filter(|row| row.get(name).is_none_or(Value::is_null))
            .count()
    }

    /// Distinct non-null values with occurrence counts, most frequent
    /// first, ties broken by label.
    #[must_use]
    pub fn value_counts(&self, name: &str) -> Vec<(String, u64)> {
        let mut counts: BTreeMap<String, u64> = BTreeMap::new();
        for value in self.values(name) {
            *counts.entry(category_label(value)).or_insert(0) += 1;
        }
        let mut pairs: Vec<(String, u64)> = counts.into_iter().collect();
        pairs.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        pairs
    }
}

/// Stable label for a categorical cell: strings pass through, anything
/// else uses its JSON text.
#[must_use]
pub fn category_label(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use data_hub_store_models::RecordRow;
    use serde_json::json;

    fn record(payload: Value) -> RecordRow {
        let now = Utc::now();
        RecordRow {
            id: 0,
            dataset_id: 1,
            payload,
            metadata: json!({}),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn columns_keep_first_seen_order() {
        let records = vec![
            record(json!({"name": "A", "price": 10})),
            record(json!({"price": 20, "category": "tools"})),
        ];
        let frame = Frame::from_records(&records);
        assert_eq!(frame.columns(), ["name", "price", "category"]);
        assert_eq!(frame.len(), 2);
    }

    #[test]
    fn typing_distinguishes_uniform_mixed_and_null_columns() {
        let records = vec![
            record(json!({"n": 1, "t": "a", "b": true, "m": 1, "z": null})),
            record(json!({"n": 2.5, "t": "b", "b": false, "m": "x", "z": null})),
        ];
        let frame = Frame::from_records(&records);
        assert_eq!(frame.column_type("n"), ColumnType::Number);
        assert_eq!(frame.column_type("t"), ColumnType::Text);
        assert_eq!(frame.column_type("b"), ColumnType::Boolean);
        assert_eq!(frame.column_type("m"), ColumnType::Mixed);
        assert_eq!(frame.column_type("z"), ColumnType::Null);
        assert_eq!(frame.column_type("missing"), ColumnType::Null);
    }

    #[test]
    fn boolean_columns_are_neither_numeric_nor_categorical() {
        let records = vec![record(json!({"flag": true})), record(json!({"flag": false}))];
        let frame = Frame::from_records(&records);
        assert!(!frame.is_numeric("flag"));
        assert!(!frame.is_categorical("flag"));
        assert!(frame.is_categorical("absent"));
    }

    #[test]
    fn number_values_skip_numeric_looking_strings() {
        let records = vec![
            record(json!({"price": 10})),
            record(json!({"price": "20"})),
            record(json!({"price": null})),
        ];
        let frame = Frame::from_records(&records);
        assert_eq!(frame.number_values("price"), vec![10.0]);
        assert_eq!(frame.column_type("price"), ColumnType::Mixed);
    }

    #[test]
    fn null_count_covers_missing_and_explicit_null() {
        let records = vec![
            record(json!({"a": 1, "b": null})),
            record(json!({"a": 2})),
            record(json!({"b": 3})),
        ];
        let frame = Frame::from_records(&records);
        assert_eq!(frame.null_count("a"), 1);
        assert_eq!(frame.null_count("b"), 2);
    }

    #[test]
    fn value_counts_order_by_count_then_label() {
        let records = vec![
            record(json!({"cat": "b"})),
            record(json!({"cat": "a"})),
            record(json!({"cat": "b"})),
            record(json!({"cat": "c"})),
            record(json!({"cat": "a"})),
        ];
        let frame = Frame::from_records(&records);
        let counts = frame.value_counts("cat");
        assert_eq!(
            counts,
            vec![
                ("a".to_string(), 2),
                ("b".to_string(), 2),
                ("c".to_string(), 1),
            ]
        );
    }

    #[test]
    fn category_labels_stringify_non_string_scalars() {
        assert_eq!(category_label(&json!("plain")), "plain");
        assert_eq!(category_label(&json!(10)), "10");
        assert_eq!(category_label(&json!(true)), "true");
    }
}
