//! AssetTrack API Library
//!
//! Inventory backend for physical assets: master data, product catalog,
//! sticker generation, the assignment ledger and reporting.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod health;
pub mod media;
pub mod middleware_helpers;
pub mod migrator;
pub mod openapi;
pub mod reports;
pub mod services;
pub mod stickers;
pub mod tracing;

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    response::Json,
    routing::{get, post, put},
    Router,
};
use chrono::Utc;
use serde::Serialize;
use std::{sync::Arc, time::Duration};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
};
use utoipa::ToSchema;

use crate::auth::{AuthRouterExt, AuthService};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<db::DbPool>,
    pub config: config::AppConfig,
    pub event_sender: Arc<events::EventSender>,
    pub services: handlers::AppServices,
    pub media: Arc<media::MediaStore>,
    pub auth: Arc<AuthService>,
}

impl AppState {
    /// Wires every service around one pool, event channel and media store
    pub fn new(
        db: Arc<db::DbPool>,
        config: config::AppConfig,
        event_sender: Arc<events::EventSender>,
        media: Arc<media::MediaStore>,
        auth: Arc<AuthService>,
    ) -> Self {
        let services =
            handlers::AppServices::new(db.clone(), event_sender.clone(), media.clone(), &config);
        Self {
            db,
            config,
            event_sender,
            services,
            media,
            auth,
        }
    }
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }
}

#[cfg(test)]
mod response_tests {
    use super::*;
    use chrono::DateTime;

    #[tokio::test]
    async fn success_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-123"), async {
                ApiResponse::success("ok")
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-123"));
        DateTime::parse_from_rfc3339(&meta.timestamp).expect("timestamp should parse");
    }

    #[tokio::test]
    async fn error_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-err"), async {
                ApiResponse::<()>::error("oops".into())
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-err"));
        assert!(!response.success);
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

/// Every `/api/v1` route; all of them require a bearer token
pub fn api_v1_routes() -> Router<AppState> {
    use handlers::{assignments, master_data, product_types, products, reports, stickers};

    let catalog = Router::new()
        .route(
            "/product-types",
            get(product_types::list_product_types).post(product_types::create_product_type),
        )
        .route(
            "/product-types/:id",
            get(product_types::get_product_type)
                .put(product_types::update_product_type)
                .delete(product_types::delete_product_type),
        )
        .route(
            "/products",
            get(products::list_products).post(products::create_product),
        )
        .route("/products/status-counts", get(products::status_counts))
        .route(
            "/products/:id",
            get(products::get_product)
                .put(products::update_product)
                .delete(products::delete_product),
        )
        .route("/products/:id/condition", put(products::update_condition))
        .route("/products/:id/attributes", put(products::update_attributes))
        .route("/products/:id/retire", post(products::retire_product))
        .route("/products/:id/holder", get(products::current_holder))
        .route("/products/:id/history", get(products::product_history))
        .route("/movements", get(products::list_movements));

    let sticker_routes = Router::new()
        .route(
            "/products/:id/stickers",
            get(stickers::list_product_stickers).post(stickers::generate_stickers),
        )
        .route("/stickers/lookup/:code", get(stickers::lookup_sticker))
        .route(
            "/stickers/:id",
            get(stickers::get_sticker).delete(stickers::deactivate_sticker),
        )
        .route("/stickers/:id/image", get(stickers::sticker_image))
        .route("/stickers/:id/printed", post(stickers::mark_printed));

    let ledger = Router::new()
        .route(
            "/assignments",
            get(assignments::list_assignments).post(assignments::open_assignment),
        )
        .route("/assignments/overdue", get(assignments::overdue_loans))
        .route("/assignments/:id", get(assignments::get_assignment))
        .route("/assignments/:id/return", post(assignments::close_assignment))
        .route(
            "/assignments/:id/acknowledge",
            post(assignments::acknowledge_assignment),
        )
        .route("/assignments/:id/void", post(assignments::void_assignment))
        .route("/products/:id/repair", post(assignments::send_to_repair))
        .route(
            "/products/:id/repair/complete",
            post(assignments::complete_repair),
        );

    let report_routes = Router::new()
        .route("/reports/summary", get(reports::inventory_summary))
        .route("/reports/products", get(reports::products_report))
        .route("/reports/assignments", get(reports::assignments_report))
        .route(
            "/reports/assignments/:id/receipt",
            get(reports::assignment_receipt),
        );

    // Registry tables share handlers keyed by the first segment; the static
    // routes above take precedence over `:kind`.
    let registry = Router::new()
        .route(
            "/:kind",
            get(master_data::list_master).post(master_data::create_master),
        )
        .route(
            "/:kind/:id",
            get(master_data::get_master)
                .put(master_data::update_master)
                .delete(master_data::delete_master),
        )
        .route("/:kind/:id/toggle-active", post(master_data::toggle_active))
        .route("/:kind/:id/employees", get(master_data::department_employees))
        .route(
            "/:kind/:id/attribute-suggestions",
            get(master_data::attribute_suggestions),
        );

    Router::new()
        .merge(catalog)
        .merge(sticker_routes)
        .merge(ledger)
        .merge(report_routes)
        .merge(registry)
        .with_auth()
}

fn cors_layer(config: &config::AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_allowed_origins
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    if !origins.is_empty() {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    } else if config.is_development() {
        CorsLayer::permissive()
    } else {
        // same-origin only
        CorsLayer::new()
    }
}

/// Full application: health, API, OpenAPI document and the shared layers
pub fn build_router(state: AppState) -> Router {
    let auth = state.auth.clone();
    let config = state.config.clone();

    Router::<AppState>::new()
        .route("/", get(|| async { "assettrack-api up" }))
        .nest("/health", health::health_routes())
        .nest("/api/v1", api_v1_routes())
        .merge(openapi::swagger_ui())
        .layer(DefaultBodyLimit::max(config.max_body_size))
        // HTTP tracing layer for consistent request/response telemetry
        .layer(crate::tracing::configure_http_tracing())
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.request_timeout_secs,
        )))
        .layer(cors_layer(&config))
        // Inject AuthService into request extensions for auth middleware
        .layer(axum::middleware::from_fn_with_state(
            auth,
            |axum::extract::State(auth): axum::extract::State<Arc<AuthService>>,
             mut req: axum::http::Request<axum::body::Body>,
             next: axum::middleware::Next| async move {
                req.extensions_mut().insert(auth);
                next.run(req).await
            },
        ))
        // Ensure every request carries a request id for traceability
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
        .with_state(state)
}
