//! Registry endpoints: categories, brands, suppliers, locations,
//! departments and employees.

mod common;

use axum::http::StatusCode;
use common::{id_of, TestApp};
use rstest::rstest;
use serde_json::json;

#[rstest]
#[case("categories", json!({ "name": "Monitors" }))]
#[case("brands", json!({ "name": "Dell" }))]
#[case("suppliers", json!({ "name": "Acme Supplies", "email": "sales@acme.test" }))]
#[case("locations", json!({ "name": "Main office", "building": "A", "floor": "2", "room": "201" }))]
#[case("departments", json!({ "name": "Finance", "manager": "Luis Gil" }))]
#[tokio::test]
async fn registry_rows_can_be_created_read_and_listed(
    #[case] kind: &str,
    #[case] body: serde_json::Value,
) {
    let app = TestApp::new().await;

    let created = app.create(&format!("/api/v1/{kind}"), body).await;
    let id = id_of(&created);
    assert_eq!(created["active"], true);

    let (status, fetched) = app.get(&format!("/api/v1/{kind}/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["data"]["id"], created["id"]);

    let (status, list) = app.get(&format!("/api/v1/{kind}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["data"]["total"], 1);
    assert_eq!(list["data"]["items"][0]["id"], created["id"]);
}

#[tokio::test]
async fn category_codes_are_generated_and_kept_unique() {
    let app = TestApp::new().await;

    let first = app
        .create("/api/v1/categories", json!({ "name": "Laptops" }))
        .await;
    let second = app
        .create("/api/v1/categories", json!({ "name": "Laptop bags" }))
        .await;

    let first_code = first["code"].as_str().unwrap();
    let second_code = second["code"].as_str().unwrap();
    assert!(!first_code.is_empty());
    assert_eq!(first_code, first_code.to_ascii_uppercase());
    assert_ne!(first_code, second_code);

    let (status, _) = app
        .post("/api/v1/categories", json!({ "name": "Laptops" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn unknown_registry_is_a_json_bad_request() {
    let app = TestApp::new().await;
    let (status, body) = app.get("/api/v1/widgets").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Bad Request");
    assert!(body["message"].as_str().unwrap().contains("widgets"));

    let (status, body) = app.get("/api/v1/brands/not-a-uuid").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn invalid_payloads_are_rejected() {
    let app = TestApp::new().await;

    let (status, _) = app.post("/api/v1/brands", json!({ "name": "" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post("/api/v1/brands", json!({ "name": "HP", "colour": "blue" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let department = app
        .create("/api/v1/departments", json!({ "name": "Legal" }))
        .await;
    let (status, _) = app
        .post(
            "/api/v1/employees",
            json!({
                "full_name": "Marta Sanz",
                "national_id": "1234Z",
                "email": "marta@example.com",
                "department_id": department["id"],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn referenced_rows_cannot_be_deleted() {
    let app = TestApp::new().await;
    let fixture = app.seed_fixture("A").await;
    app.seed_product(&fixture, "ThinkPad T14").await;

    let (status, body) = app
        .delete(&format!("/api/v1/categories/{}", fixture.category_id))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["message"].as_str().unwrap().contains("product"));

    let (status, _) = app
        .delete(&format!("/api/v1/departments/{}", fixture.department_id))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let unused = app
        .create("/api/v1/brands", json!({ "name": "Unused" }))
        .await;
    let (status, _) = app
        .delete(&format!("/api/v1/brands/{}", id_of(&unused)))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .get(&format!("/api/v1/brands/{}", id_of(&unused)))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn toggle_active_flips_the_flag_and_filters_lists() {
    let app = TestApp::new().await;
    let location = app
        .create("/api/v1/locations", json!({ "name": "Basement" }))
        .await;
    let id = id_of(&location);

    let (status, toggled) = app
        .post(&format!("/api/v1/locations/{id}/toggle-active"), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(toggled["data"]["active"], false);

    let (_, active) = app.get("/api/v1/locations?active=true").await;
    assert_eq!(active["data"]["total"], 0);

    let (_, inactive) = app.get("/api/v1/locations?active=false").await;
    assert_eq!(inactive["data"]["total"], 1);
}

#[tokio::test]
async fn department_employees_and_employee_search() {
    let app = TestApp::new().await;
    let fixture = app.seed_fixture("B").await;

    let (status, body) = app
        .get(&format!(
            "/api/v1/departments/{}/employees",
            fixture.department_id
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    let employees = body["data"].as_array().unwrap();
    assert_eq!(employees.len(), 1);
    assert_eq!(employees[0]["id"], json!(fixture.employee_id));

    let (_, found) = app.get("/api/v1/employees?search=Ruiz").await;
    assert_eq!(found["data"]["total"], 1);

    let (_, missing) = app.get("/api/v1/employees?search=Nobody").await;
    assert_eq!(missing["data"]["total"], 0);

    // only departments have an employee listing
    let (status, _) = app
        .get(&format!(
            "/api/v1/brands/{}/employees",
            fixture.brand_id
        ))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn laptop_categories_get_hardware_attribute_suggestions() {
    let app = TestApp::new().await;
    let category = app
        .create("/api/v1/categories", json!({ "name": "Laptops" }))
        .await;

    let (status, body) = app
        .get(&format!(
            "/api/v1/categories/{}/attribute-suggestions",
            id_of(&category)
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["category_name"], "Laptops");
    assert!(!body["data"]["fields"].as_array().unwrap().is_empty());
}
