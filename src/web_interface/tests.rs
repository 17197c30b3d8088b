use std::sync::Arc;

use serde_json::Value;
use warp::http::StatusCode;

use super::routes::routes;
use crate::configuration::Config;
use crate::error_handling::types::StoreError;
use crate::explorer::FlowExplorer;
use crate::records::LogRecord;
use crate::store::types::*;
use crate::store::{LogStore, MemoryStore};
use crate::test_support::sample_records;

/// Refuses every request, as an unreachable cluster would.
struct UnreachableStore;

impl UnreachableStore {
    fn refuse<T>() -> Result<T, StoreError> {
        Err(StoreError::ConnectionFailed("connection refused".into()))
    }
}

impl LogStore for UnreachableStore {
    fn aggregate_sources(&self, _: &AggregationRequest) -> Result<AggregationPage, StoreError> {
        Self::refuse()
    }

    fn search_source(&self, _: &SourceSearch) -> Result<SearchPage, StoreError> {
        Self::refuse()
    }

    fn open_scroll(&self, _: &ScrollRequest) -> Result<ScrollPage, StoreError> {
        Self::refuse()
    }

    fn next_scroll(&self, _: &ScrollId, _: &str) -> Result<ScrollPage, StoreError> {
        Self::refuse()
    }

    fn clear_scroll(&self, _: &ScrollId) -> Result<(), StoreError> {
        Ok(())
    }

    fn describe(&self) -> String {
        "unreachable".into()
    }
}

fn explorer_over(records: Vec<LogRecord>) -> Arc<FlowExplorer> {
    Arc::new(FlowExplorer::new(Arc::new(MemoryStore::new(records)), &Config::default()).unwrap())
}

fn unreachable_explorer() -> Arc<FlowExplorer> {
    Arc::new(FlowExplorer::new(Arc::new(UnreachableStore), &Config::default()).unwrap())
}

async fn get(explorer: Arc<FlowExplorer>, path: &str) -> (StatusCode, Value) {
    let response = warp::test::request()
        .method("GET")
        .path(path)
        .reply(&routes(explorer))
        .await;
    let body = serde_json::from_slice(response.body()).unwrap_or(Value::Null);
    (response.status(), body)
}

#[tokio::test]
async fn test_index_lists_endpoints() {
    let response = warp::test::request()
        .path("/")
        .reply(&routes(explorer_over(Vec::new())))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = String::from_utf8_lossy(response.body());
    assert!(html.contains("/api/aggregates"));
    assert!(html.contains("/api/logs/overview"));
}

#[tokio::test]
async fn test_aggregates_with_totals() {
    let (status, body) = get(explorer_over(sample_records()), "/api/aggregates").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rows"].as_array().unwrap().len(), 5);
    assert_eq!(body["totals"]["flows"], 12);
    assert_eq!(body["totals"]["permits"], 7);
    assert_eq!(body["totals"]["denies"], 5);
}

#[tokio::test]
async fn test_aggregates_apply_filters() {
    let (status, body) = get(explorer_over(sample_records()), "/api/aggregates?min_permit=2").await;
    assert_eq!(status, StatusCode::OK);
    let ips: Vec<&str> = body["rows"]
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["source_ip"].as_str().unwrap())
        .collect();
    assert_eq!(ips, vec!["10.70.1.1", "8.8.8.8"]);
}

#[tokio::test]
async fn test_bad_parameters_are_400() {
    let explorer = explorer_over(sample_records());
    for path in [
        "/api/aggregates?min_permit=lots",
        "/api/aggregates?min_permit=5&max_permit=1",
        "/api/aggregates?start=2024-01-02&end=2024-01-01",
        "/api/aggregates/top?metric=bytes",
        "/api/aggregates/export?format=xlsx",
        "/api/logs?dst_ports=http",
        "/api/logs?page=zero",
        "/api/logs/export?columns=bytes",
    ] {
        let (status, body) = get(explorer.clone(), path).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", path);
        assert!(body["message"].is_string(), "{}", path);
    }
}

#[tokio::test]
async fn test_store_failure_is_502_with_cause() {
    let explorer = unreachable_explorer();
    for path in ["/api/aggregates", "/api/sources/8.8.8.8/logs", "/api/logs", "/api/logs/export"] {
        let (status, body) = get(explorer.clone(), path).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY, "{}", path);
        assert!(body["cause"].as_str().unwrap().contains("connection refused"));
    }
}

#[tokio::test]
async fn test_empty_store_is_200() {
    let explorer = explorer_over(Vec::new());
    let (status, body) = get(explorer.clone(), "/api/aggregates").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rows"], Value::Array(Vec::new()));

    let (status, body) = get(explorer, "/api/logs").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"], Value::Array(Vec::new()));
    assert_eq!(body["total_pages"], 1);
}

#[tokio::test]
async fn test_top_sources_keep_ties_in_order() {
    let (status, body) = get(explorer_over(sample_records()), "/api/aggregates/top?metric=deny&n=2").await;
    assert_eq!(status, StatusCode::OK);
    let rows = body.as_array().unwrap();
    assert_eq!(rows[0]["source_ip"], "192.168.1.20");
    assert_eq!(rows[1]["source_ip"], "1.1.1.1");
}

#[tokio::test]
async fn test_local_sources() {
    let (status, body) = get(explorer_over(sample_records()), "/api/aggregates/local").await;
    assert_eq!(status, StatusCode::OK);
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0]["source_ip"], "10.70.1.1");
}

#[tokio::test]
async fn test_aggregate_export_download() {
    let response = warp::test::request()
        .path("/api/aggregates/export?columns=source_ip,deny")
        .reply(&routes(explorer_over(sample_records())))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "text/csv; charset=utf-8");
    assert_eq!(
        response.headers()["content-disposition"],
        "attachment; filename=\"aggregates.csv\""
    );
    let text = String::from_utf8_lossy(response.body());
    assert!(text.starts_with("source_ip,deny\r\n1.1.1.1,1\r\n"));
}

#[tokio::test]
async fn test_source_logs_narrowed_by_time() {
    let explorer = explorer_over(sample_records());
    let (status, body) = get(explorer.clone(), "/api/sources/8.8.8.8/logs").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["records"].as_array().unwrap().len(), 3);
    assert_eq!(body["summary"]["permits"], 2);
    assert_eq!(body["daily"].as_array().unwrap().len(), 1);

    let (_, body) = get(
        explorer,
        "/api/sources/8.8.8.8/logs?start=2024-01-01T00:04&end=2024-01-01T00:05",
    )
    .await;
    assert_eq!(body["summary"]["total"], 2);
}

#[tokio::test]
async fn test_logs_filter_and_page() {
    let (status, body) = get(
        explorer_over(sample_records()),
        "/api/logs?protocols=udp&per_page=2&page=2",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["scanned"], 12);
    assert_eq!(body["total_items"], 4);
    assert_eq!(body["total_pages"], 2);
    assert_eq!(body["page"], 2);
    assert_eq!(body["items"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_log_options_and_overview() {
    let explorer = explorer_over(sample_records());
    let (status, body) = get(explorer.clone(), "/api/logs/options").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["actions"], serde_json::json!(["DENY", "PERMIT"]));

    let (status, body) = get(explorer, "/api/logs/overview?n=1&actions=deny").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["records"], 5);
    assert_eq!(body["permits"], 0);
    assert_eq!(body["top_source_ips"][0]["value"], "192.168.1.20");
}
