use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode},
};
use gearcache::application::export::{ExportError, ExportReceipt, ExportService, Exporter};
use gearcache::application::fetch::{FetchOptions, FetchService};
use gearcache::cache::{FileStore, ReadThroughCache, SystemClock};
use gearcache::domain::{Catalog, GearRecord};
use gearcache::infra::http::{AppState, REQUEST_ID_HEADER, build_router};
use gearcache::infra::producer::FallbackProducer;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

#[derive(Default)]
struct RecordingExporter {
    uploads: Mutex<Vec<(String, String, usize)>>,
}

#[async_trait]
impl Exporter for RecordingExporter {
    async fn export(
        &self,
        destination: &str,
        sheet_name: &str,
        records: &[GearRecord],
    ) -> Result<ExportReceipt, ExportError> {
        self.uploads.lock().expect("lock").push((
            destination.to_string(),
            sheet_name.to_string(),
            records.len(),
        ));
        Ok(ExportReceipt {
            rows_updated: records.len() as u64 + 1,
            range: format!("'{sheet_name}'!A1:H{}", records.len() + 1),
        })
    }
}

struct TestApp {
    _dir: TempDir,
    router: Router,
}

fn app(exporter: Option<Arc<RecordingExporter>>) -> TestApp {
    let dir = TempDir::new().expect("tempdir");
    let root = dir.path().to_path_buf();
    app_at(dir, root, exporter)
}

fn app_at(dir: TempDir, root: PathBuf, exporter: Option<Arc<RecordingExporter>>) -> TestApp {
    let cache = Arc::new(ReadThroughCache::new(
        FileStore::new(root),
        Duration::from_secs(24 * 60 * 60),
        Arc::new(SystemClock),
    ));
    let fetch = Arc::new(FetchService::new(
        Arc::new(Catalog::reference()),
        cache,
        Arc::new(FallbackProducer::new()),
        FetchOptions::default(),
    ));
    let exporter = exporter.map(|exporter| exporter as Arc<dyn Exporter>);
    let export = Arc::new(ExportService::new(fetch.clone(), exporter));
    TestApp {
        _dir: dir,
        router: build_router(AppState::new(fetch, export)),
    }
}

async fn send(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            builder = builder.header("content-type", "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    let response = router
        .clone()
        .oneshot(builder.body(body).expect("request"))
        .await
        .expect("router should respond");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn classes_lists_catalog_and_phases() {
    let app = app(None);
    let (status, body) = send(&app.router, Method::GET, "/api/classes", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["classes"]["mage"], json!(["arcane", "fire", "frost"]));
    assert_eq!(body["data"]["phases"], json!([1, 2, 3, 4, 5, 6]));
}

#[tokio::test]
async fn phase_route_reports_miss_then_hit() {
    let app = app(None);

    let (status, first) = send(&app.router, Method::GET, "/api/bis/mage/frost/3", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["cached"], false);
    assert_eq!(first["degraded"], true);
    assert_eq!(first["data"].as_array().map(Vec::len), Some(7));
    assert_eq!(first["data"][0]["class"], "mage");
    assert_eq!(first["data"][0]["itemId"], "10003");

    let (_, second) = send(&app.router, Method::GET, "/api/bis/mage/frost/3", None).await;
    assert_eq!(second["cached"], true);
    assert_eq!(second["data"], first["data"]);
}

#[tokio::test]
async fn invalid_requests_are_rejected_with_readable_errors() {
    let app = app(None);

    let (status, body) = send(&app.router, Method::GET, "/api/bis/mage/tank/1", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "success": false, "error": "Invalid class or spec" }));

    let (status, body) = send(&app.router, Method::GET, "/api/bis/mage/frost/9", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Phase must be between 1 and 6");

    let (status, body) = send(&app.router, Method::GET, "/api/bis/mage/frost/two", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (_, keys) = send(&app.router, Method::GET, "/api/cache/keys", None).await;
    assert_eq!(keys["keys"], json!([]));
}

#[tokio::test]
async fn all_phases_route_concatenates_in_order() {
    let app = app(None);
    let (status, body) = send(&app.router, Method::GET, "/api/bis/warrior/fury", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["failedPhases"], json!([]));
    let data = body["data"].as_array().expect("data array");
    assert_eq!(data.len(), 42);
    assert_eq!(data[0]["phase"], 1);
    assert_eq!(data[41]["phase"], 6);
}

#[tokio::test]
async fn cache_routes_list_and_clear() {
    let app = app(None);
    send(&app.router, Method::GET, "/api/bis/mage/fire/1", None).await;
    send(&app.router, Method::GET, "/api/bis/mage/fire/2", None).await;

    let (_, keys) = send(&app.router, Method::GET, "/api/cache/keys", None).await;
    assert_eq!(keys["keys"], json!(["mage_fire_phase1", "mage_fire_phase2"]));

    let (status, cleared) = send(&app.router, Method::DELETE, "/api/cache", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cleared["message"], "Cache cleared successfully");
    assert_eq!(cleared["removed"], 2);
    assert_eq!(cleared["degraded"], false);

    let (_, keys) = send(&app.router, Method::GET, "/api/cache/keys", None).await;
    assert_eq!(keys["keys"], json!([]));
}

#[tokio::test]
async fn unusable_cache_directory_degrades_every_cache_route() {
    let dir = TempDir::new().expect("tempdir");
    let root = dir.path().join("cache");
    std::fs::write(&root, b"not a directory").expect("write");
    let app = app_at(dir, root, None);

    let (status, phase) = send(&app.router, Method::GET, "/api/bis/mage/frost/3", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(phase["cached"], false);
    assert_eq!(phase["data"].as_array().map(Vec::len), Some(7));

    let (status, keys) = send(&app.router, Method::GET, "/api/cache/keys", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(keys["keys"], json!([]));

    let (status, cleared) = send(&app.router, Method::DELETE, "/api/cache", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cleared["success"], true);
    assert_eq!(cleared["removed"], 0);
    assert_eq!(cleared["degraded"], true);

    let (status, health) = send(&app.router, Method::GET, "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["services"]["cache"], false);
}

#[tokio::test]
async fn export_validates_before_checking_configuration() {
    let app = app(None);

    let (status, body) = send(
        &app.router,
        Method::POST,
        "/api/export",
        Some(json!({ "className": "mage", "specName": "frost" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "spreadsheetId is required");

    let (status, body) = send(
        &app.router,
        Method::POST,
        "/api/export",
        Some(json!({ "spreadsheetId": "sheet-1", "className": "mage" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "className and specName are required");

    let (status, _) = send(
        &app.router,
        Method::POST,
        "/api/export",
        Some(json!({ "spreadsheetId": "sheet-1", "className": "mage", "specName": "frost" })),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn export_uploads_single_phase_and_all_phases() {
    let exporter = Arc::new(RecordingExporter::default());
    let app = app(Some(exporter.clone()));

    let (status, body) = send(
        &app.router,
        Method::POST,
        "/api/export",
        Some(json!({
            "spreadsheetId": "sheet-1",
            "className": "mage",
            "specName": "frost",
            "phase": "2"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Exported 7 items to Google Sheets");
    assert_eq!(body["result"]["rowsUpdated"], 8);

    let (status, body) = send(
        &app.router,
        Method::POST,
        "/api/export",
        Some(json!({
            "spreadsheetId": "sheet-1",
            "worksheetName": "Frost",
            "className": "mage",
            "specName": "frost"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Exported 42 items to Google Sheets");

    let uploads = exporter.uploads.lock().expect("lock").clone();
    assert_eq!(
        uploads,
        vec![
            ("sheet-1".to_string(), "BiS Data".to_string(), 7),
            ("sheet-1".to_string(), "Frost".to_string(), 42),
        ]
    );
}

#[tokio::test]
async fn export_rejects_malformed_json() {
    let app = app(None);
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/export")
        .header("content-type", "application/json")
        .body(Body::from("{ not json"))
        .expect("request");
    let response = app.router.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn health_reports_services() {
    let app = app(None);
    let (status, body) = send(&app.router, Method::GET, "/api/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["producer"], "fallback");
    assert_eq!(body["services"]["scraper"], true);
    assert_eq!(body["services"]["sheets"], false);
}

#[tokio::test]
async fn request_id_is_echoed_or_generated() {
    let app = app(None);

    let request = Request::builder()
        .uri("/api/health")
        .header(REQUEST_ID_HEADER, "req-42")
        .body(Body::empty())
        .expect("request");
    let response = app.router.clone().oneshot(request).await.expect("response");
    assert_eq!(
        response
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok()),
        Some("req-42")
    );

    let request = Request::builder()
        .uri("/nowhere")
        .body(Body::empty())
        .expect("request");
    let response = app.router.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(response.headers().contains_key(REQUEST_ID_HEADER));
}
