#![allow(dead_code)]

use std::sync::Arc;

use assettrack_api::{
    auth::{AuthConfig, AuthService},
    config::AppConfig,
    db,
    events::{self, EventSender},
    media::MediaStore,
    AppState,
};
use axum::{
    body::{self, Body},
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

/// Application wired against a throwaway SQLite file and media root.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    token: String,
    _event_task: tokio::task::JoinHandle<()>,
    _dir: TempDir,
}

/// Ids of the reference rows a product needs
#[derive(Debug, Clone, Copy)]
pub struct Fixture {
    pub category_id: Uuid,
    pub brand_id: Uuid,
    pub location_id: Uuid,
    pub department_id: Uuid,
    pub employee_id: Uuid,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}/test.db?mode=rwc", dir.path().display()),
            "test_secret_key_for_testing_purposes_only_32chars".to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.media_root = dir.path().join("media").display().to_string();
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let media = Arc::new(MediaStore::new(cfg.media_root()));
        media.ensure_dirs().await.expect("create media dirs");

        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = Arc::new(EventSender::new(event_tx));
        let event_task = tokio::spawn(events::process_events(event_rx));

        let auth_service = Arc::new(AuthService::new(AuthConfig::from(&cfg)));
        let token = auth_service
            .issue_token("tester", Some("Test Operator".to_string()), vec![])
            .expect("issue test token");

        let state = AppState::new(Arc::new(pool), cfg, event_sender, media, auth_service);
        let router = assettrack_api::build_router(state.clone());

        Self {
            router,
            state,
            token,
            _event_task: event_task,
            _dir: dir,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Authenticated request returning the status and the decoded JSON body
    /// (`Value::Null` for an empty body).
    pub async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let response = self.request(method, uri, body, Some(self.token())).await;
        let status = response.status();
        let bytes = response_bytes(response).await;
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json response")
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(body)).await
    }

    pub async fn put(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::PUT, uri, Some(body)).await
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::DELETE, uri, None).await
    }

    /// Authenticated GET returning status, content type and raw bytes
    pub async fn get_bytes(&self, uri: &str) -> (StatusCode, String, Vec<u8>) {
        let response = self
            .request(Method::GET, uri, None, Some(self.token()))
            .await;
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        (status, content_type, response_bytes(response).await)
    }

    /// POST that must succeed with 201; returns the `data` payload
    pub async fn create(&self, uri: &str, body: Value) -> Value {
        let (status, json) = self.post(uri, body).await;
        assert_eq!(status, StatusCode::CREATED, "POST {uri} failed: {json}");
        json["data"].clone()
    }

    /// Registers one row of every reference table a product and an assignment need
    pub async fn seed_fixture(&self, suffix: &str) -> Fixture {
        let category = self
            .create(
                "/api/v1/categories",
                json!({ "name": format!("Laptops {suffix}"), "attribute_fields": ["ram", "cpu"] }),
            )
            .await;
        let brand = self
            .create("/api/v1/brands", json!({ "name": format!("Lenovo {suffix}") }))
            .await;
        let location = self
            .create(
                "/api/v1/locations",
                json!({ "name": format!("Warehouse {suffix}"), "building": "HQ", "floor": "1" }),
            )
            .await;
        let department = self
            .create(
                "/api/v1/departments",
                json!({ "name": format!("Engineering {suffix}") }),
            )
            .await;
        let employee = self
            .create(
                "/api/v1/employees",
                json!({
                    "full_name": format!("Ana Ruiz {suffix}"),
                    "national_id": national_id(suffix),
                    "email": format!("ana.{}@example.com", suffix.to_lowercase()),
                    "department_id": department["id"],
                }),
            )
            .await;

        Fixture {
            category_id: id_of(&category),
            brand_id: id_of(&brand),
            location_id: id_of(&location),
            department_id: id_of(&department),
            employee_id: id_of(&employee),
        }
    }

    /// Registers a product against the fixture and returns its JSON
    pub async fn seed_product(&self, fixture: &Fixture, model: &str) -> Value {
        self.create(
            "/api/v1/products",
            json!({
                "category_id": fixture.category_id,
                "brand_id": fixture.brand_id,
                "location_id": fixture.location_id,
                "model": model,
                "purchase_date": "2024-03-01",
                "purchase_price": "899.90",
            }),
        )
        .await
    }

    /// Opens a delivery of `product_id` to the fixture employee
    pub async fn deliver(&self, fixture: &Fixture, product_id: Uuid) -> Value {
        self.create(
            "/api/v1/assignments",
            json!({
                "product_id": product_id,
                "employee_id": fixture.employee_id,
                "kind": "delivery",
            }),
        )
        .await
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

pub async fn response_bytes(response: Response) -> Vec<u8> {
    body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes")
        .to_vec()
}

pub fn id_of(value: &Value) -> Uuid {
    value["id"]
        .as_str()
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(|| panic!("no id in {value}"))
}

/// Eight digits derived from the suffix plus a trailing letter
fn national_id(suffix: &str) -> String {
    let digits: u32 = suffix
        .bytes()
        .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32));
    format!("{:08}Z", digits % 100_000_000)
}
