//! Summary and downloadable reports.

mod common;

use axum::http::StatusCode;
use common::{id_of, TestApp};
use rstest::rstest;
use serde_json::Value;

/// Asserts the bytes look like a document of the given format
fn assert_document(format: &str, bytes: &[u8]) {
    match format {
        "pdf" => assert!(bytes.starts_with(b"%PDF")),
        // xlsx is a zip container
        "xlsx" => assert!(bytes.starts_with(b"PK")),
        "csv" => assert!(std::str::from_utf8(bytes).unwrap().starts_with("Serial,")),
        "json" => {
            let doc: Value = serde_json::from_slice(bytes).unwrap();
            assert!(doc["rows"].is_array());
        }
        other => panic!("unexpected format {other}"),
    }
}

#[rstest]
#[case("pdf", "application/pdf")]
#[case("xlsx", "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet")]
#[case("csv", "text/csv; charset=utf-8")]
#[case("json", "application/json")]
#[tokio::test]
async fn empty_product_report_is_a_valid_document(#[case] format: &str, #[case] mime: &str) {
    let app = TestApp::new().await;

    let (status, content_type, bytes) = app
        .get_bytes(&format!("/api/v1/reports/products?format={format}"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type, mime);
    assert_document(format, &bytes);
}

#[rstest]
#[case("pdf")]
#[case("xlsx")]
#[case("csv")]
#[case("json")]
#[tokio::test]
async fn product_report_lists_the_catalog(#[case] format: &str) {
    let app = TestApp::new().await;
    let fixture = app.seed_fixture("R1").await;
    app.seed_product(&fixture, "ThinkPad T14").await;

    let (status, _, bytes) = app
        .get_bytes(&format!("/api/v1/reports/products?format={format}"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_document(format, &bytes);
}

#[tokio::test]
async fn json_reports_respect_the_filters() {
    let app = TestApp::new().await;
    let fixture = app.seed_fixture("R2").await;
    let held = app.seed_product(&fixture, "Held").await;
    app.seed_product(&fixture, "In stock").await;
    app.deliver(&fixture, id_of(&held)).await;

    let (_, _, bytes) = app.get_bytes("/api/v1/reports/products").await;
    let doc: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(doc["total"], 2);

    let (_, _, bytes) = app
        .get_bytes(&format!(
            "/api/v1/reports/products?format=json&employee_id={}",
            fixture.employee_id
        ))
        .await;
    let doc: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(doc["total"], 1);
    assert_eq!(doc["rows"][0]["Model"], "Held");

    let (_, _, bytes) = app
        .get_bytes("/api/v1/reports/products?format=json&status=available")
        .await;
    let doc: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(doc["total"], 1);
    assert_eq!(doc["rows"][0]["Model"], "In stock");

    let (status, _, bytes) = app
        .get_bytes("/api/v1/reports/assignments?format=json")
        .await;
    assert_eq!(status, StatusCode::OK);
    let doc: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(doc["total"], 1);
    assert_eq!(doc["rows"][0]["Kind"], "Delivery");
}

#[tokio::test]
async fn downloads_are_attachments() {
    let app = TestApp::new().await;
    let response = app
        .request(
            axum::http::Method::GET,
            "/api/v1/reports/assignments?format=csv",
            None,
            Some(app.token()),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response
        .headers()
        .get(axum::http::header::CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(disposition.starts_with("attachment; filename=\"assignments"));
    assert!(disposition.ends_with(".csv\""));
}

#[tokio::test]
async fn unknown_format_is_rejected() {
    let app = TestApp::new().await;
    let (status, body) = app.get("/api/v1/reports/products?format=docx").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Bad Request");
    assert!(body["message"].as_str().unwrap().contains("docx"));
}

#[tokio::test]
async fn receipt_is_a_pdf() {
    let app = TestApp::new().await;
    let fixture = app.seed_fixture("R3").await;
    let product = app.seed_product(&fixture, "Tablet").await;
    let delivery = app.deliver(&fixture, id_of(&product)).await;

    let (status, content_type, bytes) = app
        .get_bytes(&format!(
            "/api/v1/reports/assignments/{}/receipt",
            id_of(&delivery)
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type, "application/pdf");
    assert!(bytes.starts_with(b"%PDF"));
}

#[tokio::test]
async fn summary_counts_the_catalog_and_ledger() {
    let app = TestApp::new().await;

    let (status, empty) = app.get("/api/v1/reports/summary").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(empty["data"]["total_products"], 0);
    assert!(empty["data"]["average_value"].is_null());

    let fixture = app.seed_fixture("R4").await;
    let first = app.seed_product(&fixture, "One").await;
    app.seed_product(&fixture, "Two").await;
    app.deliver(&fixture, id_of(&first)).await;

    let (_, summary) = app.get("/api/v1/reports/summary").await;
    let data = &summary["data"];
    assert_eq!(data["total_products"], 2);
    assert_eq!(data["by_status"]["assigned"], 1);
    assert_eq!(data["by_status"]["available"], 1);
    let total: f64 = data["total_value"].as_str().unwrap().parse().unwrap();
    assert!((total - 1799.80).abs() < 0.001);
    assert_eq!(data["recent_events"], 1);
    assert_eq!(
        data["open_assignments_by_department"].as_array().unwrap().len(),
        1
    );
}

#[tokio::test]
async fn out_of_range_windows_do_not_break_the_summary() {
    let app = TestApp::new().await;
    let fixture = app.seed_fixture("R5").await;
    app.seed_product(&fixture, "Spare").await;

    let service = assettrack_api::services::reports::ReportService::new(
        app.state.db.clone(),
        app.state.event_sender.clone(),
        i64::MAX,
        -30,
    );
    let summary = service.inventory_summary().await.expect("summary");
    assert_eq!(summary.total_products, 1);
    assert_eq!(summary.recent_events, 0);
}
