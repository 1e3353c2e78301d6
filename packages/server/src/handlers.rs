//! Route handlers for the data hub API.
//!
//! Successful responses wrap their payload as
//! `{"status": "success", "data": …}`; failures return
//! `{"status": "error", "message": …}` with a matching status code.
//! Structured shape problems reported by the analytics and chart
//! engines are payloads, not failures, and travel inside `data`.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;

use actix_web::{HttpResponse, web};
use data_hub_analytics::frame::Frame;
use data_hub_analytics::{
    analysis_history, analysis_result, run_statistical_analysis, run_summary_analysis,
    run_trend_analysis,
};
use data_hub_analytics_models::{StatisticalParams, TrendParams};
use data_hub_ingest::{ensure_dataset, ensure_source, ingest_from_api, ingest_from_file};
use data_hub_server_models::{
    ApiHealth, ChartQuery, Dashboard, DescribeReport, FieldProfile, IngestApiRequest,
    IngestFileRequest, QueryRequest, QuerySnapshot, RecordsPage, RecordsQuery, TrendQuery,
};
use data_hub_store::{StoreError, queries};
use data_hub_store_models::{DatasetRow, RecordRow, SourceKind};
use data_hub_visualize::{chart_data, time_series_data};
use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::AppState;

const DEFAULT_PAGE_LIMIT: u32 = 100;
const MAX_PAGE_LIMIT: u32 = 1000;
const QUERY_SAMPLE_SIZE: usize = 5;
const DASHBOARD_SAMPLE_SIZE: usize = 10;

/// User id every facade-issued query is audited under.
const DEFAULT_USER_ID: i64 = 1;

fn success(data: impl Serialize) -> HttpResponse {
    match serde_json::to_value(data) {
        Ok(value) => HttpResponse::Ok().json(json!({"status": "success", "data": value})),
        Err(e) => {
            log::error!("Failed to serialize response payload: {e}");
            HttpResponse::InternalServerError()
                .json(json!({"status": "error", "message": e.to_string()}))
        }
    }
}

fn not_found(message: &str) -> HttpResponse {
    HttpResponse::NotFound().json(json!({"status": "error", "message": message}))
}

fn bad_request(message: &str) -> HttpResponse {
    HttpResponse::BadRequest().json(json!({"status": "error", "message": message}))
}

fn internal_error(context: &str, error: &dyn std::fmt::Display) -> HttpResponse {
    log::error!("{context}: {error}");
    HttpResponse::InternalServerError()
        .json(json!({"status": "error", "message": error.to_string()}))
}

/// Resolves a dataset, or hands back the response the handler should
/// return instead.
fn load_dataset(state: &AppState, dataset_id: i64) -> Result<DatasetRow, HttpResponse> {
    match queries::get_dataset(&state.db, dataset_id) {
        Ok(dataset) => Ok(dataset),
        Err(StoreError::DatasetNotFound { .. }) => Err(not_found("Dataset not found")),
        Err(e) => Err(internal_error("Failed to load dataset", &e)),
    }
}

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    success(ApiHealth {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        healthy: true,
    })
}

/// `GET /api/datasets`
pub async fn datasets(state: web::Data<AppState>) -> HttpResponse {
    match queries::list_datasets(&state.db) {
        Ok(summaries) => success(summaries),
        Err(e) => internal_error("Failed to list datasets", &e),
    }
}

/// `GET /api/dataset/{id}`
pub async fn dataset_detail(state: web::Data<AppState>, path: web::Path<i64>) -> HttpResponse {
    match load_dataset(&state, path.into_inner()) {
        Ok(dataset) => success(dataset),
        Err(resp) => resp,
    }
}

/// `GET /api/dataset/{id}/records` with pagination and an optional
/// equality filter over payload fields.
pub async fn dataset_records(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    query: web::Query<RecordsQuery>,
) -> HttpResponse {
    let dataset_id = path.into_inner();
    if let Err(resp) = load_dataset(&state, dataset_id) {
        return resp;
    }

    let filter = match query.filter.as_deref() {
        Some(raw) => match serde_json::from_str::<Map<String, Value>>(raw) {
            Ok(map) => Some(map),
            Err(_) => return bad_request("Invalid filter query"),
        },
        None => None,
    };

    let limit = query
        .limit
        .unwrap_or(DEFAULT_PAGE_LIMIT)
        .clamp(1, MAX_PAGE_LIMIT);
    let offset = query.offset.unwrap_or(0);

    match queries::query_records(&state.db, dataset_id, filter.as_ref(), limit, offset) {
        Ok(records) => success(RecordsPage {
            count: records.len(),
            records,
            limit,
            offset,
        }),
        Err(e) => internal_error("Failed to load records", &e),
    }
}

/// `POST /api/dataset/{id}/query`: lists the dataset and writes a
/// query audit row carrying a count-plus-sample snapshot.
pub async fn dataset_query(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    body: web::Json<QueryRequest>,
) -> HttpResponse {
    let dataset_id = path.into_inner();
    if let Err(resp) = load_dataset(&state, dataset_id) {
        return resp;
    }

    let started = Instant::now();
    let mut records = match queries::records_for_dataset(&state.db, dataset_id) {
        Ok(records) => records,
        Err(e) => return internal_error("Failed to load records", &e),
    };

    let count = records.len();
    records.truncate(QUERY_SAMPLE_SIZE);
    let snapshot = QuerySnapshot {
        count,
        sample: records,
    };
    let result = match serde_json::to_value(&snapshot) {
        Ok(value) => value,
        Err(e) => return internal_error("Failed to serialize query snapshot", &e),
    };

    let elapsed_ms = i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX);
    match queries::insert_query_log(
        &state.db,
        DEFAULT_USER_ID,
        &body.query,
        Some(dataset_id),
        &result,
        elapsed_ms,
    ) {
        Ok(row) => success(row),
        Err(e) => internal_error("Failed to record query", &e),
    }
}

/// `POST /api/ingest/api`: finds or creates the source and dataset by
/// name, then runs one API ingestion. The closed log row comes back
/// whether the run COMPLETED or FAILED.
pub async fn ingest_api(
    state: web::Data<AppState>,
    body: web::Json<IngestApiRequest>,
) -> HttpResponse {
    let body = body.into_inner();
    let connection_info = json!({"endpoint": body.endpoint});
    let source = match ensure_source(
        &state.db,
        &body.source_name,
        SourceKind::Api,
        Some(&format!("API source for {}", body.source_name)),
        Some(&connection_info),
    ) {
        Ok(source) => source,
        Err(e) => return internal_error("Failed to register source", &e),
    };
    let dataset = match ensure_dataset(
        &state.db,
        &body.dataset_name,
        source.id,
        Some(&format!("Dataset from {}", body.source_name)),
        None,
    ) {
        Ok(dataset) => dataset,
        Err(e) => return internal_error("Failed to create dataset", &e),
    };

    match ingest_from_api(
        &state.db,
        source.id,
        dataset.id,
        &body.endpoint,
        &body.headers,
        &body.params,
        body.data_field.as_deref(),
    )
    .await
    {
        Ok(log_row) => success(log_row),
        Err(e) => internal_error("Data ingestion failed", &e),
    }
}

/// `POST /api/ingest/file`
pub async fn ingest_file(
    state: web::Data<AppState>,
    body: web::Json<IngestFileRequest>,
) -> HttpResponse {
    let body = body.into_inner();
    let connection_info = json!({"file_path": body.file_path});
    let source = match ensure_source(
        &state.db,
        &body.source_name,
        SourceKind::File,
        Some(&format!("File source for {}", body.source_name)),
        Some(&connection_info),
    ) {
        Ok(source) => source,
        Err(e) => return internal_error("Failed to register source", &e),
    };
    let dataset = match ensure_dataset(
        &state.db,
        &body.dataset_name,
        source.id,
        Some(&format!("Dataset from {}", body.source_name)),
        None,
    ) {
        Ok(dataset) => dataset,
        Err(e) => return internal_error("Failed to create dataset", &e),
    };

    match ingest_from_file(
        &state.db,
        source.id,
        dataset.id,
        Path::new(&body.file_path),
        &body.file_format,
    )
    .await
    {
        Ok(log_row) => success(log_row),
        Err(e) => internal_error("Data ingestion failed", &e),
    }
}

/// `GET /api/analytics/statistical/{id}`
pub async fn analytics_statistical(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    params: web::Query<StatisticalParams>,
) -> HttpResponse {
    let dataset_id = path.into_inner();
    if let Err(resp) = load_dataset(&state, dataset_id) {
        return resp;
    }
    let params = params.into_inner();
    match run_statistical_analysis(&state.db, dataset_id, &params) {
        Ok(outcome) => success(outcome),
        Err(e) => internal_error("Statistical analysis failed", &e),
    }
}

/// `GET /api/analytics/trend/{id}?time=&value=`
pub async fn analytics_trend(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    query: web::Query<TrendQuery>,
) -> HttpResponse {
    let dataset_id = path.into_inner();
    if let Err(resp) = load_dataset(&state, dataset_id) {
        return resp;
    }
    let (Some(time_field), Some(value_field)) = (query.time.clone(), query.value.clone()) else {
        return bad_request("time and value query parameters are required");
    };
    let params = TrendParams {
        time_field,
        value_field,
    };
    match run_trend_analysis(&state.db, dataset_id, &params) {
        Ok(outcome) => success(outcome),
        Err(e) => internal_error("Trend analysis failed", &e),
    }
}

/// `GET /api/analytics/summary/{id}`
pub async fn analytics_summary(state: web::Data<AppState>, path: web::Path<i64>) -> HttpResponse {
    let dataset_id = path.into_inner();
    if let Err(resp) = load_dataset(&state, dataset_id) {
        return resp;
    }
    match run_summary_analysis(&state.db, dataset_id) {
        Ok(outcome) => success(outcome),
        Err(e) => internal_error("Summary analysis failed", &e),
    }
}

/// `GET /api/analytics/describe/{id}`: per-field null profile, cached
/// until the dataset next changes.
pub async fn analytics_describe(state: web::Data<AppState>, path: web::Path<i64>) -> HttpResponse {
    let dataset = match load_dataset(&state, path.into_inner()) {
        Ok(dataset) => dataset,
        Err(resp) => return resp,
    };

    let cache_key = format!("describe:{}:{}", dataset.id, dataset.updated_at.to_rfc3339());
    if let Some(cached) = state.cache.get(&cache_key) {
        return success(cached);
    }

    let records = match queries::records_for_dataset(&state.db, dataset.id) {
        Ok(records) => records,
        Err(e) => return internal_error("Failed to load records", &e),
    };

    let report = describe_dataset(&dataset, &records);
    match serde_json::to_value(&report) {
        Ok(value) => {
            state.cache.put(&cache_key, value.clone());
            success(value)
        }
        Err(e) => internal_error("Failed to serialize describe report", &e),
    }
}

/// Builds the null profile over the first record's fields.
#[allow(clippy::cast_precision_loss)]
fn describe_dataset(dataset: &DatasetRow, records: &[RecordRow]) -> DescribeReport {
    let fields: Vec<String> = records
        .first()
        .and_then(|record| record.payload.as_object())
        .map(|payload| payload.keys().cloned().collect())
        .unwrap_or_default();

    let total = records.len();
    let mut summary = BTreeMap::new();
    for field in &fields {
        let non_null = records
            .iter()
            .filter(|record| record.payload.get(field).is_some_and(|v| !v.is_null()))
            .count();
        summary.insert(
            field.clone(),
            FieldProfile {
                total_records: total as u64,
                non_null_count: non_null as u64,
                null_percentage: (total - non_null) as f64 / total as f64 * 100.0,
            },
        );
    }

    DescribeReport {
        dataset_id: dataset.id,
        name: dataset.name.clone(),
        record_count: total as u64,
        fields,
        summary,
    }
}

/// `GET /api/analyses/{id}`: analysis history for one dataset, newest
/// first.
pub async fn analyses_history(state: web::Data<AppState>, path: web::Path<i64>) -> HttpResponse {
    let dataset_id = path.into_inner();
    if let Err(resp) = load_dataset(&state, dataset_id) {
        return resp;
    }
    match analysis_history(&state.db, Some(dataset_id)) {
        Ok(summaries) => success(summaries),
        Err(e) => internal_error("Failed to list analyses", &e),
    }
}

/// `GET /api/analysis/{analysis_id}`
pub async fn analysis_detail(state: web::Data<AppState>, path: web::Path<i64>) -> HttpResponse {
    match analysis_result(&state.db, path.into_inner()) {
        Ok(Some(row)) => success(row),
        Ok(None) => not_found("Analysis not found"),
        Err(e) => internal_error("Failed to load analysis", &e),
    }
}

/// `GET /api/visualize/{chart_kind}/{id}?x=&y=`
pub async fn visualize_chart(
    state: web::Data<AppState>,
    path: web::Path<(String, i64)>,
    query: web::Query<ChartQuery>,
) -> HttpResponse {
    let (chart_kind, dataset_id) = path.into_inner();
    if let Err(resp) = load_dataset(&state, dataset_id) {
        return resp;
    }
    let Some(x_field) = query.x.as_deref() else {
        return bad_request("x query parameter is required");
    };
    match chart_data(&state.db, dataset_id, &chart_kind, x_field, query.y.as_deref()) {
        Ok(chart) => success(chart),
        Err(e) => internal_error("Failed to build chart data", &e),
    }
}

/// `GET /api/visualize/timeseries/{id}?time=&value=`
pub async fn visualize_timeseries(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    query: web::Query<TrendQuery>,
) -> HttpResponse {
    let dataset_id = path.into_inner();
    if let Err(resp) = load_dataset(&state, dataset_id) {
        return resp;
    }
    let (Some(time_field), Some(value_field)) = (query.time.as_deref(), query.value.as_deref())
    else {
        return bad_request("time and value query parameters are required");
    };
    match time_series_data(&state.db, dataset_id, time_field, value_field) {
        Ok(series) => success(series),
        Err(e) => internal_error("Failed to build time series", &e),
    }
}

/// `GET /api/dashboard/{id}`: composite view with a fresh summary
/// analysis, a record sample, and auto-selected charts. Cached until
/// the dataset changes, so each dataset version persists exactly one
/// dashboard summary analysis.
pub async fn dashboard(state: web::Data<AppState>, path: web::Path<i64>) -> HttpResponse {
    let dataset = match load_dataset(&state, path.into_inner()) {
        Ok(dataset) => dataset,
        Err(resp) => return resp,
    };

    let cache_key = format!("dashboard:{}:{}", dataset.id, dataset.updated_at.to_rfc3339());
    if let Some(cached) = state.cache.get(&cache_key) {
        return success(cached);
    }

    let records = match queries::records_for_dataset(&state.db, dataset.id) {
        Ok(records) => records,
        Err(e) => return internal_error("Failed to load records", &e),
    };
    if records.is_empty() {
        return not_found("No records found in dataset");
    }

    let summary = match run_summary_analysis(&state.db, dataset.id) {
        Ok(outcome) => outcome.stored().map_or(Value::Null, |row| row.result.clone()),
        Err(e) => return internal_error("Summary analysis failed", &e),
    };

    let frame = Frame::from_records(&records);
    let mut charts = BTreeMap::new();
    if let Some(field) = frame.columns().iter().find(|name| frame.is_categorical(name)) {
        if let Some(chart) = dashboard_chart(&state, dataset.id, "pie", field) {
            charts.insert("pie".to_string(), chart);
        }
    }
    if let Some(field) = frame.columns().iter().find(|name| frame.is_numeric(name)) {
        if let Some(chart) = dashboard_chart(&state, dataset.id, "histogram", field) {
            charts.insert("histogram".to_string(), chart);
        }
    }

    let mut sample = records;
    sample.truncate(DASHBOARD_SAMPLE_SIZE);

    let view = Dashboard {
        dataset,
        summary,
        sample,
        charts,
    };
    match serde_json::to_value(&view) {
        Ok(value) => {
            state.cache.put(&cache_key, value.clone());
            success(value)
        }
        Err(e) => internal_error("Failed to serialize dashboard", &e),
    }
}

/// Builds one dashboard chart, degrading to `None` when the projection
/// fails.
fn dashboard_chart(
    state: &AppState,
    dataset_id: i64,
    chart_kind: &str,
    field: &str,
) -> Option<Value> {
    match chart_data(&state.db, dataset_id, chart_kind, field, None) {
        Ok(chart) => serde_json::to_value(&chart).ok(),
        Err(e) => {
            log::error!("Failed to build dashboard {chart_kind} chart: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use actix_web::{App, http::StatusCode, test};
    use data_hub_store::db::DataHubDb;

    use super::*;
    use crate::{api_scope, cache::ResponseCache};

    fn seeded_state(payloads: &[Value]) -> (web::Data<AppState>, i64) {
        let db = DataHubDb::open_in_memory().unwrap();
        let source =
            queries::insert_source(&db, "unit", SourceKind::Api, None, &json!({})).unwrap();
        let dataset = queries::insert_dataset(&db, "unit-data", source.id, None, None).unwrap();
        let batch: Vec<(Value, Value)> = payloads
            .iter()
            .map(|payload| (payload.clone(), json!({"source_id": source.id})))
            .collect();
        queries::insert_records(&db, dataset.id, &batch).unwrap();
        queries::update_dataset_stats(&db, dataset.id).unwrap();

        let state = web::Data::new(AppState {
            db,
            cache: ResponseCache::new(Duration::from_secs(3600)),
        });
        (state, dataset.id)
    }

    fn product_payloads() -> Vec<Value> {
        vec![
            json!({"name": "Hammer", "price": 10.0, "category": "tools", "date": "2024-01-01", "sales": 100}),
            json!({"name": "Saw", "price": 20.0, "category": "tools", "date": "2024-01-02", "sales": 110}),
            json!({"name": "Teddy", "price": 30.0, "category": "toys", "date": "2024-01-03", "sales": 120}),
            json!({"name": "Blocks", "price": 40.0, "category": "toys", "date": "2024-01-04", "sales": 130}),
        ]
    }

    async fn get(state: &web::Data<AppState>, uri: &str) -> (StatusCode, Value) {
        let app =
            test::init_service(App::new().app_data(state.clone()).service(api_scope())).await;
        let req = test::TestRequest::get().uri(uri).to_request();
        let resp = test::call_service(&app, req).await;
        let status = resp.status();
        let body: Value = test::read_body_json(resp).await;
        (status, body)
    }

    async fn post(state: &web::Data<AppState>, uri: &str, body: Value) -> (StatusCode, Value) {
        let app =
            test::init_service(App::new().app_data(state.clone()).service(api_scope())).await;
        let req = test::TestRequest::post().uri(uri).set_json(body).to_request();
        let resp = test::call_service(&app, req).await;
        let status = resp.status();
        let body: Value = test::read_body_json(resp).await;
        (status, body)
    }

    #[actix_web::test]
    async fn health_reports_package_metadata() {
        let (state, _) = seeded_state(&[]);
        let (status, body) = get(&state, "/api/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], json!("success"));
        assert_eq!(body["data"]["healthy"], json!(true));
        assert_eq!(body["data"]["version"], json!(env!("CARGO_PKG_VERSION")));
    }

    #[actix_web::test]
    async fn unknown_dataset_is_a_not_found_envelope() {
        let (state, _) = seeded_state(&[]);
        for uri in [
            "/api/dataset/999",
            "/api/dataset/999/records",
            "/api/analytics/describe/999",
            "/api/dashboard/999",
        ] {
            let (status, body) = get(&state, uri).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
            assert_eq!(body["status"], json!("error"));
            assert_eq!(body["message"], json!("Dataset not found"));
        }
    }

    #[actix_web::test]
    async fn record_pages_clamp_limits_and_echo_pagination() {
        let (state, dataset_id) = seeded_state(&product_payloads());

        let (status, body) =
            get(&state, &format!("/api/dataset/{dataset_id}/records?limit=5000")).await;
        assert_eq!(status, StatusCode::OK);
        let data = &body["data"];
        assert_eq!(data["limit"], json!(1000));
        assert_eq!(data["count"], json!(4));
        assert_eq!(data["records"].as_array().unwrap().len(), 4);

        let (_, body) =
            get(&state, &format!("/api/dataset/{dataset_id}/records?limit=2&offset=3")).await;
        let data = &body["data"];
        assert_eq!(data["count"], json!(1));
        assert_eq!(data["offset"], json!(3));
        assert_eq!(data["records"][0]["payload"]["name"], json!("Blocks"));
    }

    #[actix_web::test]
    async fn record_filters_validate_and_narrow() {
        let (state, dataset_id) = seeded_state(&product_payloads());

        let (status, body) =
            get(&state, &format!("/api/dataset/{dataset_id}/records?filter=%7Bnot-json")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], json!("Invalid filter query"));

        // {"category":"toys"}
        let encoded = "%7B%22category%22%3A%22toys%22%7D";
        let (status, body) =
            get(&state, &format!("/api/dataset/{dataset_id}/records?filter={encoded}")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["count"], json!(2));
    }

    #[actix_web::test]
    async fn query_endpoint_persists_an_audit_snapshot() {
        let (state, dataset_id) = seeded_state(&product_payloads());

        let (status, body) = post(
            &state,
            &format!("/api/dataset/{dataset_id}/query"),
            json!({"query": "all products"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let data = &body["data"];
        assert_eq!(data["user_id"], json!(1));
        assert_eq!(data["query_text"], json!("all products"));
        assert_eq!(data["result"]["count"], json!(4));
        assert_eq!(data["result"]["sample"].as_array().unwrap().len(), 4);
        assert!(data["execution_time_ms"].as_i64().unwrap() >= 0);

        let (status, body) =
            post(&state, &format!("/api/dataset/{dataset_id}/query"), json!({})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["query_text"], json!(""));
    }

    #[actix_web::test]
    async fn file_ingestion_creates_and_reuses_sources_by_name() {
        let (state, _) = seeded_state(&[]);

        let tmp = std::env::temp_dir().join("server_ingest_file_test.json");
        std::fs::write(&tmp, r#"[{"name": "a", "v": 1}, {"name": "b", "v": 2}]"#).unwrap();
        let request = json!({
            "source_name": "drop folder",
            "dataset_name": "drops",
            "file_path": tmp.to_string_lossy(),
        });

        let (status, body) = post(&state, "/api/ingest/file", request.clone()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], json!("COMPLETED"));
        assert_eq!(body["data"]["records_processed"], json!(2));

        // same names reuse the same source and dataset
        let (_, body) = post(&state, "/api/ingest/file", request).await;
        assert_eq!(body["data"]["records_processed"], json!(2));

        let (_, body) = get(&state, "/api/datasets").await;
        let datasets = body["data"].as_array().unwrap();
        let drops = datasets
            .iter()
            .find(|dataset| dataset["name"] == json!("drops"))
            .unwrap();
        assert_eq!(drops["record_count"], json!(4));

        let _ = std::fs::remove_file(&tmp);
    }

    #[actix_web::test]
    async fn describe_profiles_null_percentages_per_field() {
        let payloads = vec![
            json!({"name": "a", "score": 1}),
            json!({"name": "b", "score": null}),
            json!({"name": "c"}),
            json!({"name": "d", "score": 4}),
        ];
        let (state, dataset_id) = seeded_state(&payloads);

        let (status, body) = get(&state, &format!("/api/analytics/describe/{dataset_id}")).await;
        assert_eq!(status, StatusCode::OK);
        let data = &body["data"];
        assert_eq!(data["record_count"], json!(4));
        assert_eq!(data["fields"], json!(["name", "score"]));
        assert_eq!(data["summary"]["score"]["non_null_count"], json!(2));
        assert_eq!(data["summary"]["score"]["null_percentage"], json!(50.0));
        assert_eq!(data["summary"]["name"]["null_percentage"], json!(0.0));
    }

    #[actix_web::test]
    async fn describe_on_an_empty_dataset_reports_zero_fields() {
        let (state, dataset_id) = seeded_state(&[]);
        let (_, body) = get(&state, &format!("/api/analytics/describe/{dataset_id}")).await;
        let data = &body["data"];
        assert_eq!(data["record_count"], json!(0));
        assert_eq!(data["fields"], json!([]));
        assert_eq!(data["summary"], json!({}));
    }

    #[actix_web::test]
    async fn trend_route_requires_time_and_value_parameters() {
        let (state, dataset_id) = seeded_state(&product_payloads());

        let (status, body) = get(&state, &format!("/api/analytics/trend/{dataset_id}")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], json!("time and value query parameters are required"));

        let (status, body) =
            get(&state, &format!("/api/analytics/trend/{dataset_id}?time=date&value=sales")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["analysis_type"], json!("TREND"));
        assert_eq!(body["data"]["results"]["trend"]["direction"], json!("increasing"));
    }

    #[actix_web::test]
    async fn analytics_routes_persist_history() {
        let (state, dataset_id) = seeded_state(&product_payloads());

        let (status, body) = get(
            &state,
            &format!("/api/analytics/statistical/{dataset_id}?include_correlations=true"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let results = &body["data"]["results"];
        assert!(results["descriptive_stats"]["price"]["mean"].is_number());
        let price_sales = results["correlations"]["price"]["sales"].as_f64().unwrap();
        assert!((price_sales - 1.0).abs() < 1e-9);

        let (_, body) = get(&state, &format!("/api/analytics/summary/{dataset_id}")).await;
        assert_eq!(body["data"]["results"]["summary"]["total_records"], json!(4));

        let (_, body) = get(&state, &format!("/api/analyses/{dataset_id}")).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 2);
        let first_id = body["data"][0]["id"].as_i64().unwrap();

        let (status, body) = get(&state, &format!("/api/analysis/{first_id}")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["id"], json!(first_id));

        let (status, body) = get(&state, "/api/analysis/9999").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], json!("Analysis not found"));
    }

    #[actix_web::test]
    async fn chart_routes_pass_engine_payloads_through() {
        let (state, dataset_id) = seeded_state(&product_payloads());

        let (status, body) =
            get(&state, &format!("/api/visualize/pie/{dataset_id}?x=category")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["labels"], json!(["tools", "toys"]));
        assert_eq!(body["data"]["values"], json!([2, 2]));

        // a numeric field cannot back a pie chart, but that is an engine
        // payload, not a handler failure
        let (status, body) =
            get(&state, &format!("/api/visualize/pie/{dataset_id}?x=price")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["data"]["error"],
            json!("Field 'price' is not categorical, cannot create pie chart")
        );

        let (status, body) =
            get(&state, &format!("/api/visualize/line/{dataset_id}?x=name")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["error"], json!("Y field is required for line charts"));

        let (status, body) = get(&state, &format!("/api/visualize/bar/{dataset_id}")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], json!("x query parameter is required"));

        let (status, body) = get(
            &state,
            &format!("/api/visualize/timeseries/{dataset_id}?time=date&value=sales"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["y_values"], json!([100.0, 110.0, 120.0, 130.0]));
    }

    #[actix_web::test]
    async fn dashboard_composes_and_caches_one_summary_per_version() {
        let (state, dataset_id) = seeded_state(&product_payloads());

        let (status, body) = get(&state, &format!("/api/dashboard/{dataset_id}")).await;
        assert_eq!(status, StatusCode::OK);
        let data = &body["data"];
        assert_eq!(data["dataset"]["id"], json!(dataset_id));
        assert_eq!(data["summary"]["summary"]["total_records"], json!(4));
        assert_eq!(data["sample"].as_array().unwrap().len(), 4);
        // first categorical column is "category", first numeric is "price"
        assert_eq!(data["charts"]["pie"]["title"], json!("Distribution of category"));
        assert_eq!(data["charts"]["histogram"]["title"], json!("Distribution of price"));

        // the cached rebuild must not persist a second summary analysis
        let (status, _) = get(&state, &format!("/api/dashboard/{dataset_id}")).await;
        assert_eq!(status, StatusCode::OK);
        let (_, body) = get(&state, &format!("/api/analyses/{dataset_id}")).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
    }

    #[actix_web::test]
    async fn dashboard_requires_records() {
        let (state, dataset_id) = seeded_state(&[]);
        let (status, body) = get(&state, &format!("/api/dashboard/{dataset_id}")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], json!("No records found in dataset"));
    }
}
