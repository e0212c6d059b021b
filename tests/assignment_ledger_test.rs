//! Deliveries, loans, returns and repairs through the ledger endpoints.

mod common;

use assert_matches::assert_matches;
use assettrack_api::{
    entities::{assignment_event, EventKind, ProductCondition},
    errors::ServiceError,
};
use axum::http::StatusCode;
use chrono::{Duration, Utc};
use common::{id_of, TestApp};
use sea_orm::{ActiveModelTrait, Set};
use serde_json::{json, Value};

fn kinds(history: &Value) -> Vec<&str> {
    history["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["kind"].as_str().unwrap())
        .collect()
}

#[tokio::test]
async fn delivery_return_repair_cycle() {
    let app = TestApp::new().await;
    let fixture = app.seed_fixture("L1").await;
    let product = app.seed_product(&fixture, "ThinkPad T14").await;
    let product_id = id_of(&product);

    // delivery
    let delivery = app.deliver(&fixture, product_id).await;
    assert_eq!(delivery["kind"], "delivery");
    assert_eq!(delivery["opened_by"], "tester");
    assert_eq!(delivery["department_id"], json!(fixture.department_id));
    assert!(delivery["closed_at"].is_null());

    let (_, body) = app.get(&format!("/api/v1/products/{product_id}")).await;
    assert_eq!(body["data"]["status"], "assigned");

    let (_, holder) = app
        .get(&format!("/api/v1/products/{product_id}/holder"))
        .await;
    assert_eq!(holder["data"]["holder"], "employee");
    assert_eq!(holder["data"]["employee_id"], json!(fixture.employee_id));

    // return
    let (status, closed) = app
        .post(
            &format!("/api/v1/assignments/{}/return", id_of(&delivery)),
            json!({ "condition": "used_good", "reason": "upgrade" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{closed}");
    assert_eq!(closed["data"]["id"], delivery["id"]);
    assert!(closed["data"]["closed_at"].is_string());
    assert_eq!(closed["data"]["return_reason"], "upgrade");

    let (_, body) = app.get(&format!("/api/v1/products/{product_id}")).await;
    assert_eq!(body["data"]["status"], "available");
    assert_eq!(body["data"]["condition"], "used_good");

    // repair and back
    let (status, repair) = app
        .post(
            &format!("/api/v1/products/{product_id}/repair"),
            json!({ "notes": "keyboard" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(repair["data"]["kind"], "repair");

    let (_, body) = app.get(&format!("/api/v1/products/{product_id}")).await;
    assert_eq!(body["data"]["status"], "under_repair");

    let (status, _) = app
        .post(
            &format!("/api/v1/products/{product_id}/repair/complete"),
            json!({ "condition": "used_fair" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.get(&format!("/api/v1/products/{product_id}")).await;
    assert_eq!(body["data"]["status"], "available");
    assert_eq!(body["data"]["condition"], "used_fair");

    let (status, history) = app
        .get(&format!("/api/v1/products/{product_id}/history"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        kinds(&history),
        vec!["delivery", "return", "repair", "repair_completed"]
    );
    assert_eq!(history["data"][1]["closes_event_id"], delivery["id"]);
}

#[tokio::test]
async fn a_product_has_at_most_one_open_event() {
    let app = TestApp::new().await;
    let fixture = app.seed_fixture("L2").await;
    let product = app.seed_product(&fixture, "Latitude").await;
    let product_id = id_of(&product);

    app.deliver(&fixture, product_id).await;

    let (status, body) = app
        .post(
            "/api/v1/assignments",
            json!({
                "product_id": product_id,
                "employee_id": fixture.employee_id,
                "kind": "delivery",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["message"].as_str().unwrap().contains("open"));
}

#[tokio::test]
async fn the_database_rejects_a_second_open_row() {
    let app = TestApp::new().await;
    let fixture = app.seed_fixture("L8").await;
    let product = app.seed_product(&fixture, "Latitude").await;
    let product_id = id_of(&product);
    app.deliver(&fixture, product_id).await;

    // written straight through the entity, bypassing the ledger checks
    let err = assignment_event::ActiveModel {
        id: Set(uuid::Uuid::new_v4()),
        product_id: Set(product_id),
        employee_id: Set(Some(fixture.employee_id)),
        department_id: Set(Some(fixture.department_id)),
        kind: Set(EventKind::Loan),
        opened_at: Set(Utc::now()),
        expected_end: Set(Some(Utc::now() + Duration::days(7))),
        closed_at: Set(None),
        condition_at_open: Set(ProductCondition::UsedGood),
        opened_by: Set("importer".to_string()),
        ..Default::default()
    }
    .insert(&*app.state.db)
    .await
    .map_err(ServiceError::from)
    .unwrap_err();
    assert_matches!(err, ServiceError::Conflict(_));

    let (_, history) = app
        .get(&format!("/api/v1/products/{product_id}/history"))
        .await;
    assert_eq!(kinds(&history), vec!["delivery"]);
}

#[tokio::test]
async fn closing_without_an_open_event_conflicts() {
    let app = TestApp::new().await;
    let fixture = app.seed_fixture("L3").await;
    let product = app.seed_product(&fixture, "Surface").await;
    let delivery = app.deliver(&fixture, id_of(&product)).await;
    let uri = format!("/api/v1/assignments/{}/return", id_of(&delivery));
    let body = json!({ "condition": "used_good", "reason": "employee_change" });

    let (status, _) = app.post(&uri, body.clone()).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.post(&uri, body).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .post(
            &format!("/api/v1/products/{}/repair/complete", id_of(&product)),
            json!({ "condition": "used_good" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn loans_need_an_expected_end_and_show_up_overdue() {
    let app = TestApp::new().await;
    let fixture = app.seed_fixture("L4").await;
    let product = app.seed_product(&fixture, "Camera").await;

    let (status, _) = app
        .post(
            "/api/v1/assignments",
            json!({
                "product_id": product["id"],
                "employee_id": fixture.employee_id,
                "kind": "loan",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let loan = app
        .create(
            "/api/v1/assignments",
            json!({
                "product_id": product["id"],
                "employee_id": fixture.employee_id,
                "kind": "loan",
                "opened_at": "2024-01-01T09:00:00Z",
                "expected_end": "2024-01-10T18:00:00Z",
            }),
        )
        .await;

    let (status, overdue) = app.get("/api/v1/assignments/overdue").await;
    assert_eq!(status, StatusCode::OK);
    let overdue = overdue["data"].as_array().unwrap();
    assert_eq!(overdue.len(), 1);
    assert_eq!(overdue[0]["id"], loan["id"]);
}

#[tokio::test]
async fn repair_of_an_assigned_product_closes_the_assignment() {
    let app = TestApp::new().await;
    let fixture = app.seed_fixture("L5").await;
    let product = app.seed_product(&fixture, "Dock").await;
    let product_id = id_of(&product);
    let delivery = app.deliver(&fixture, product_id).await;

    let (status, _) = app
        .post(&format!("/api/v1/products/{product_id}/repair"), json!({}))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, event) = app
        .get(&format!("/api/v1/assignments/{}", id_of(&delivery)))
        .await;
    assert!(event["data"]["closed_at"].is_string());
    assert_eq!(event["data"]["return_reason"], "fault");

    let (_, history) = app
        .get(&format!("/api/v1/products/{product_id}/history"))
        .await;
    assert_eq!(kinds(&history), vec!["delivery", "return", "repair"]);
}

#[tokio::test]
async fn acknowledge_then_void() {
    let app = TestApp::new().await;
    let fixture = app.seed_fixture("L6").await;
    let product = app.seed_product(&fixture, "Monitor").await;
    let product_id = id_of(&product);
    let delivery = app.deliver(&fixture, product_id).await;
    let event_id = id_of(&delivery);

    let (status, acked) = app
        .post(
            &format!("/api/v1/assignments/{event_id}/acknowledge"),
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(acked["data"]["acknowledged"], true);

    let (status, _) = app
        .post(
            &format!("/api/v1/assignments/{event_id}/acknowledge"),
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, voided) = app
        .post(
            &format!("/api/v1/assignments/{event_id}/void"),
            json!({ "reason": "wrong employee" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(voided["data"]["voided"], true);

    let (_, body) = app.get(&format!("/api/v1/products/{product_id}")).await;
    assert_eq!(body["data"]["status"], "available");

    // voiding appends nothing
    let (_, history) = app
        .get(&format!("/api/v1/products/{product_id}/history"))
        .await;
    assert_eq!(kinds(&history), vec!["delivery"]);

    // the product can be handed out again
    app.deliver(&fixture, product_id).await;
}

#[tokio::test]
async fn list_filters_by_employee_and_open_state() {
    let app = TestApp::new().await;
    let fixture = app.seed_fixture("L7").await;
    let first = app.seed_product(&fixture, "Phone").await;
    let second = app.seed_product(&fixture, "Tablet").await;
    let delivery = app.deliver(&fixture, id_of(&first)).await;
    app.deliver(&fixture, id_of(&second)).await;

    app.post(
        &format!("/api/v1/assignments/{}/return", id_of(&delivery)),
        json!({ "condition": "used_good", "reason": "transfer" }),
    )
    .await;

    let (status, open) = app
        .get(&format!(
            "/api/v1/assignments?employee_id={}&open_only=true",
            fixture.employee_id
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(open["data"]["total"], 1);
    assert_eq!(open["data"]["items"][0]["product_id"], second["id"]);

    let (_, all) = app
        .get(&format!("/api/v1/assignments?employee_id={}", fixture.employee_id))
        .await;
    assert_eq!(all["data"]["total"], 3);
}
