//! Product catalog and product types over HTTP.

mod common;

use axum::http::StatusCode;
use common::{id_of, TestApp};
use serde_json::json;

#[tokio::test]
async fn registering_a_product_allocates_codes_and_records_a_movement() {
    let app = TestApp::new().await;
    let fixture = app.seed_fixture("P1").await;

    let product = app.seed_product(&fixture, "ThinkPad T14").await;
    let id = id_of(&product);

    assert_eq!(product["status"], "available");
    assert_eq!(product["condition"], "new");
    assert_eq!(product["active"], true);
    assert!(!product["serial_number"].as_str().unwrap().is_empty());
    assert!(!product["internal_code"].as_str().unwrap().is_empty());

    let (status, movements) = app
        .get(&format!("/api/v1/movements?product_id={id}"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(movements["data"]["total"], 1);
    assert_eq!(movements["data"]["items"][0]["kind"], "registered");
    assert_eq!(movements["data"]["items"][0]["performed_by"], "tester");
}

#[tokio::test]
async fn product_types_number_serials_sequentially() {
    let app = TestApp::new().await;
    let fixture = app.seed_fixture("P2").await;

    let kind = app
        .create(
            "/api/v1/product-types",
            json!({
                "name": "Laptop",
                "code_prefix": "lap",
                "attribute_schema": [
                    { "name": "memory", "kind": "text", "required": true },
                    { "name": "screen_size", "kind": "number" }
                ]
            }),
        )
        .await;
    assert_eq!(kind["code_prefix"], "LAP");

    let mut serials = Vec::new();
    for model in ["T14", "X1 Carbon"] {
        let product = app
            .create(
                "/api/v1/products",
                json!({
                    "product_type_id": kind["id"],
                    "category_id": fixture.category_id,
                    "brand_id": fixture.brand_id,
                    "location_id": fixture.location_id,
                    "model": model,
                    "attributes": { "memory": "16GB", "screen_size": 14 }
                }),
            )
            .await;
        serials.push(product["serial_number"].as_str().unwrap().to_string());
    }
    assert_eq!(serials, vec!["LAP0001", "LAP0002"]);

    let (status, body) = app
        .post(
            "/api/v1/products",
            json!({
                "product_type_id": kind["id"],
                "category_id": fixture.category_id,
                "brand_id": fixture.brand_id,
                "location_id": fixture.location_id,
                "model": "Missing memory",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    // a type in use cannot be deleted
    let (status, _) = app
        .delete(&format!("/api/v1/product-types/{}", id_of(&kind)))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn duplicate_serial_numbers_conflict() {
    let app = TestApp::new().await;
    let fixture = app.seed_fixture("P3").await;

    let body = json!({
        "serial_number": "sn-001",
        "category_id": fixture.category_id,
        "brand_id": fixture.brand_id,
        "location_id": fixture.location_id,
        "model": "EliteBook",
    });
    let first = app.create("/api/v1/products", body.clone()).await;
    assert_eq!(first["serial_number"], "SN-001");

    let (status, _) = app.post("/api/v1/products", body).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn list_filters_search_and_status_counts() {
    let app = TestApp::new().await;
    let fixture = app.seed_fixture("P4").await;
    app.seed_product(&fixture, "ThinkPad T14").await;
    app.seed_product(&fixture, "Latitude 5440").await;

    let (status, all) = app.get("/api/v1/products").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all["data"]["total"], 2);

    let (_, found) = app.get("/api/v1/products?search=latitude").await;
    assert_eq!(found["data"]["total"], 1);
    assert_eq!(found["data"]["items"][0]["model"], "Latitude 5440");

    let (_, paged) = app.get("/api/v1/products?limit=1&page=2").await;
    assert_eq!(paged["data"]["items"].as_array().unwrap().len(), 1);
    assert_eq!(paged["data"]["total_pages"], 2);

    let (status, counts) = app.get("/api/v1/products/status-counts").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(counts["data"]["available"], 2);
    assert_eq!(counts["data"]["total"], 2);
}

#[tokio::test]
async fn condition_and_attribute_updates_are_logged() {
    let app = TestApp::new().await;
    let fixture = app.seed_fixture("P5").await;
    let product = app.seed_product(&fixture, "MacBook Air").await;
    let id = id_of(&product);

    let (status, updated) = app
        .put(
            &format!("/api/v1/products/{id}/condition"),
            json!({ "condition": "used_good" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["data"]["condition"], "used_good");

    let (status, updated) = app
        .put(
            &format!("/api/v1/products/{id}/attributes"),
            json!({ "attributes": { "colour": "silver" } }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["data"]["attributes"]["colour"], "silver");

    let (_, movements) = app
        .get(&format!("/api/v1/movements?product_id={id}&kind=update"))
        .await;
    assert_eq!(movements["data"]["total"], 2);
}

#[tokio::test]
async fn retire_and_soft_delete() {
    let app = TestApp::new().await;
    let fixture = app.seed_fixture("P6").await;
    let retired = app.seed_product(&fixture, "Old desktop").await;
    let removed = app.seed_product(&fixture, "Broken tablet").await;

    let (status, body) = app
        .post(
            &format!("/api/v1/products/{}/retire", id_of(&retired)),
            json!({ "notes": "end of life" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "retired");
    assert_eq!(body["data"]["condition"], "retired");

    let (status, _) = app
        .post(
            &format!("/api/v1/products/{}/retire", id_of(&retired)),
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // a full edit cannot bring the condition back either
    let edit = |condition: &str| {
        json!({
            "category_id": fixture.category_id,
            "brand_id": fixture.brand_id,
            "location_id": fixture.location_id,
            "model": "Old desktop (storage)",
            "condition": condition,
        })
    };
    let uri = format!("/api/v1/products/{}", id_of(&retired));
    let (status, _) = app.put(&uri, edit("used_good")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, body) = app.put(&uri, edit("retired")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["model"], "Old desktop (storage)");
    assert_eq!(body["data"]["condition"], "retired");

    let (status, _) = app
        .delete(&format!("/api/v1/products/{}", id_of(&removed)))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, visible) = app.get("/api/v1/products").await;
    assert_eq!(visible["data"]["total"], 1);

    let (_, everything) = app.get("/api/v1/products?include_inactive=true").await;
    assert_eq!(everything["data"]["total"], 2);
}

#[tokio::test]
async fn unassigned_products_are_held_by_their_location() {
    let app = TestApp::new().await;
    let fixture = app.seed_fixture("P7").await;
    let product = app.seed_product(&fixture, "Projector").await;

    let (status, body) = app
        .get(&format!("/api/v1/products/{}/holder", id_of(&product)))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["holder"], "location");
    assert_eq!(body["data"]["location_id"], json!(fixture.location_id));
}

#[tokio::test]
async fn missing_products_return_not_found() {
    let app = TestApp::new().await;
    let (status, body) = app
        .get(&format!("/api/v1/products/{}", uuid::Uuid::new_v4()))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["message"].is_string());
}
