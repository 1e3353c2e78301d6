//! Cleaning and transformation passes over stored records.
//!
//! A pass loads every record of a dataset, rewrites payloads in memory,
//! and persists only the records whose payload actually changed, bumping
//! `updated_at` for exactly those. A rule that fails on one field is
//! logged and skipped; it never fails the record or the pass.

use std::sync::LazyLock;

use data_hub_store::db::DataHubDb;
use data_hub_store::queries;
use data_hub_store_models::parsing::parse_flexible_datetime;
use regex::Regex;
use serde_json::Value;

use crate::IngestError;

/// Characters to strip before numeric coercion (currency symbols,
/// thousands separators, stray units).
static NON_NUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^0-9.\-]").expect("valid regex"));

/// Errors a [`CleanRule`] can produce for a single field value.
#[derive(Debug, thiserror::Error)]
pub enum CleanError {
    /// The rule needs a string value.
    #[error("value {raw} is not a string")]
    NotText {
        /// The offending value, rendered as JSON.
        raw: String,
    },

    /// The value could not be coerced to a number.
    #[error("cannot coerce {raw} to a number")]
    NotNumeric {
        /// The offending value, rendered as JSON.
        raw: String,
    },

    /// The value did not match any known date format.
    #[error("unrecognized date {raw}")]
    UnrecognizedDate {
        /// The offending value, rendered as JSON.
        raw: String,
    },
}

/// A field-level cleaning rule.
#[derive(Debug, Clone, PartialEq)]
pub enum CleanRule {
    /// Trim surrounding whitespace from a string value.
    Trim,
    /// Lowercase a string value.
    Lowercase,
    /// Uppercase a string value.
    Uppercase,
    /// Coerce to a JSON number, stripping currency symbols and
    /// thousands separators first.
    Numeric,
    /// Rewrite a date string to RFC 3339.
    NormalizeDate,
    /// Replace a JSON null with the given default.
    NullDefault(Value),
}

impl CleanRule {
    /// Applies this rule to one field value, returning the replacement.
    ///
    /// # Errors
    ///
    /// Returns [`CleanError`] if the value has the wrong shape for the
    /// rule; the caller logs and keeps the original value.
    pub fn apply(&self, value: &Value) -> Result<Value, CleanError> {
        match self {
            Self::Trim => text(value).map(|s| Value::String(s.trim().to_string())),
            Self::Lowercase => text(value).map(|s| Value::String(s.to_lowercase())),
            Self::Uppercase => text(value).map(|s| Value::String(s.to_uppercase())),
            Self::Numeric => coerce_numeric(value),
            Self::NormalizeDate => normalize_date(value),
            Self::NullDefault(default) => Ok(if value.is_null() {
                default.clone()
            } else {
                value.clone()
            }),
        }
    }
}

fn text(value: &Value) -> Result<&str, CleanError> {
    value.as_str().ok_or_else(|| CleanError::NotText {
        raw: value.to_string(),
    })
}

fn coerce_numeric(value: &Value) -> Result<Value, CleanError> {
    match value {
        Value::Number(_) => Ok(value.clone()),
        Value::String(s) => {
            let stripped = NON_NUMERIC.replace_all(s, "");
            let parsed = stripped
                .parse::<f64>()
                .map_err(|_| CleanError::NotNumeric {
                    raw: value.to_string(),
                })?;
            serde_json::Number::from_f64(parsed)
                .map(Value::Number)
                .ok_or_else(|| CleanError::NotNumeric {
                    raw: value.to_string(),
                })
        }
        other => Err(CleanError::NotNumeric {
            raw: other.to_string(),
        }),
    }
}

fn normalize_date(value: &Value) -> Result<Value, CleanError> {
    let s = text(value)?;
    parse_flexible_datetime(s)
        .map(|dt| Value::String(dt.to_rfc3339()))
        .ok_or_else(|| CleanError::UnrecognizedDate {
            raw: value.to_string(),
        })
}

/// Result type for caller-supplied whole-payload transforms.
pub type TransformResult = Result<Value, Box<dyn std::error::Error + Send + Sync>>;

/// Applies field-level cleaning rules to every record of a dataset.
///
/// Each rule targets one payload field and only runs when the field is
/// present. Returns the number of records whose payload changed; only
/// those get `updated_at` bumped. Dataset stats are recomputed when
/// anything changed.
///
/// # Errors
///
/// Returns [`IngestError::Store`] if loading or persisting records fails.
pub fn clean_data(
    db: &DataHubDb,
    dataset_id: i64,
    rules: &[(&str, CleanRule)],
) -> Result<usize, IngestError> {
    let records = queries::records_for_dataset(db, dataset_id)?;
    let mut cleaned = 0_usize;

    for record in records {
        let mut payload = record.payload.clone();
        if let Some(map) = payload.as_object_mut() {
            for (field, rule) in rules {
                let Some(current) = map.get(*field) else {
                    continue;
                };
                match rule.apply(current) {
                    Ok(next) => {
                        map.insert((*field).to_string(), next);
                    }
                    Err(e) => log::warn!("Cleaning rule failed for field {field}: {e}"),
                }
            }
        }

        if payload != record.payload {
            queries::update_record_payload(db, record.id, &payload)?;
            cleaned += 1;
        }
    }

    if cleaned > 0 {
        queries::update_dataset_stats(db, dataset_id)?;
    }
    log::info!("Cleaning pass over dataset {dataset_id} rewrote {cleaned} record(s)");
    Ok(cleaned)
}

/// Applies a whole-payload transform to every record of a dataset.
///
/// A transform error for one record is logged and leaves that record
/// unmodified; the pass continues. Returns the number of records whose
/// payload changed.
///
/// # Errors
///
/// Returns [`IngestError::Store`] if loading or persisting records fails.
pub fn transform_data(
    db: &DataHubDb,
    dataset_id: i64,
    transform: &dyn Fn(&Value) -> TransformResult,
) -> Result<usize, IngestError> {
    let records = queries::records_for_dataset(db, dataset_id)?;
    let mut transformed = 0_usize;

    for record in records {
        match transform(&record.payload) {
            Ok(next) => {
                if next != record.payload {
                    queries::update_record_payload(db, record.id, &next)?;
                    transformed += 1;
                }
            }
            Err(e) => log::error!("Transformation failed: {e}"),
        }
    }

    if transformed > 0 {
        queries::update_dataset_stats(db, dataset_id)?;
    }
    log::info!("Transform pass over dataset {dataset_id} rewrote {transformed} record(s)");
    Ok(transformed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use data_hub_store_models::SourceKind;
    use serde_json::json;

    fn seeded_dataset(db: &DataHubDb, payloads: &[Value]) -> i64 {
        let source =
            queries::insert_source(db, "clean source", SourceKind::File, None, &json!({}))
                .unwrap();
        let dataset = queries::insert_dataset(db, "clean dataset", source.id, None, None).unwrap();
        let items: Vec<(Value, Value)> = payloads
            .iter()
            .map(|p| (p.clone(), json!({"source_id": source.id})))
            .collect();
        queries::insert_records(db, dataset.id, &items).unwrap();
        dataset.id
    }

    #[test]
    fn trim_is_idempotent() {
        let db = DataHubDb::open_in_memory().unwrap();
        let dataset_id = seeded_dataset(
            &db,
            &[json!({"name": "  Widget  "}), json!({"name": "Gadget"})],
        );

        let cleaned = clean_data(&db, dataset_id, &[("name", CleanRule::Trim)]).unwrap();
        assert_eq!(cleaned, 1);

        let records = queries::records_for_dataset(&db, dataset_id).unwrap();
        assert_eq!(records[0].payload["name"], json!("Widget"));
        assert_eq!(records[1].payload["name"], json!("Gadget"));

        // Second pass changes nothing
        let cleaned = clean_data(&db, dataset_id, &[("name", CleanRule::Trim)]).unwrap();
        assert_eq!(cleaned, 0);
    }

    #[test]
    fn numeric_rule_strips_currency_and_separators() {
        let rule = CleanRule::Numeric;
        assert_eq!(rule.apply(&json!("$1,299.99")).unwrap(), json!(1299.99));
        assert_eq!(rule.apply(&json!("-$45.20")).unwrap(), json!(-45.2));
        assert_eq!(rule.apply(&json!(7.5)).unwrap(), json!(7.5));
        assert!(rule.apply(&json!("n/a")).is_err());
        assert!(rule.apply(&json!(null)).is_err());
    }

    #[test]
    fn date_rule_rewrites_to_rfc3339() {
        let rule = CleanRule::NormalizeDate;
        assert_eq!(
            rule.apply(&json!("01/15/2024")).unwrap(),
            json!("2024-01-15T00:00:00+00:00")
        );
        assert!(rule.apply(&json!("yesterday")).is_err());
    }

    #[test]
    fn null_default_fills_only_nulls() {
        let rule = CleanRule::NullDefault(json!(0));
        assert_eq!(rule.apply(&json!(null)).unwrap(), json!(0));
        assert_eq!(rule.apply(&json!(5)).unwrap(), json!(5));
    }

    #[test]
    fn failed_rule_skips_field_but_keeps_the_rest() {
        let db = DataHubDb::open_in_memory().unwrap();
        let dataset_id = seeded_dataset(
            &db,
            &[json!({"price": "$10.00", "name": "  A  "}), json!({"price": "n/a", "name": "B"})],
        );

        let cleaned = clean_data(
            &db,
            dataset_id,
            &[("price", CleanRule::Numeric), ("name", CleanRule::Trim)],
        )
        .unwrap();
        assert_eq!(cleaned, 1);

        let records = queries::records_for_dataset(&db, dataset_id).unwrap();
        assert_eq!(records[0].payload["price"], json!(10.0));
        assert_eq!(records[0].payload["name"], json!("A"));
        // The failed Numeric rule left the raw value alone
        assert_eq!(records[1].payload["price"], json!("n/a"));
    }

    #[test]
    fn missing_field_is_not_an_error() {
        let db = DataHubDb::open_in_memory().unwrap();
        let dataset_id = seeded_dataset(&db, &[json!({"name": "A"})]);

        let cleaned = clean_data(&db, dataset_id, &[("price", CleanRule::Numeric)]).unwrap();
        assert_eq!(cleaned, 0);
    }

    #[test]
    fn transform_rewrites_and_counts_changed_records() {
        let db = DataHubDb::open_in_memory().unwrap();
        let dataset_id = seeded_dataset(&db, &[json!({"v": 1}), json!({"v": 2}), json!({"v": 2})]);

        let transformed = transform_data(&db, dataset_id, &|payload| {
            let mut next = payload.clone();
            if next["v"] == json!(2) {
                next["doubled"] = json!(4);
            }
            Ok(next)
        })
        .unwrap();
        assert_eq!(transformed, 2);

        let records = queries::records_for_dataset(&db, dataset_id).unwrap();
        assert!(records[0].payload.get("doubled").is_none());
        assert_eq!(records[1].payload["doubled"], json!(4));
    }

    #[test]
    fn transform_error_leaves_record_unmodified() {
        let db = DataHubDb::open_in_memory().unwrap();
        let dataset_id = seeded_dataset(&db, &[json!({"v": 1}), json!({"v": 2})]);

        let transformed = transform_data(&db, dataset_id, &|payload| {
            if payload["v"] == json!(1) {
                return Err("refusing v=1".into());
            }
            let mut next = payload.clone();
            next["ok"] = json!(true);
            Ok(next)
        })
        .unwrap();
        assert_eq!(transformed, 1);

        let records = queries::records_for_dataset(&db, dataset_id).unwrap();
        assert_eq!(records[0].payload, json!({"v": 1}));
        assert_eq!(records[1].payload["ok"], json!(true));
    }
}
