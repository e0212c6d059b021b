/*!
 * # Health Check Module
 *
 * - Basic health check (`/health`): the process is up
 * - Readiness check (`/health/ready`): the database answers and the media
 *   root is usable
 * - Version (`/health/version`): build information
 */

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use tracing::{error, info};

use crate::{db, AppState};

/// Basic health status
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Up,
    Down,
}

/// Health check detail
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct HealthDetail {
    pub status: HealthStatus,
    pub message: Option<String>,
}

impl HealthDetail {
    fn up() -> Self {
        Self {
            status: HealthStatus::Up,
            message: None,
        }
    }

    fn down(message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Down,
            message: Some(message.into()),
        }
    }
}

/// Readiness report
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct HealthInfo {
    pub status: HealthStatus,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub details: BTreeMap<String, HealthDetail>,
}

impl HealthInfo {
    fn from_details(details: BTreeMap<String, HealthDetail>) -> Self {
        let status = if details.values().all(|d| d.status == HealthStatus::Up) {
            HealthStatus::Up
        } else {
            HealthStatus::Down
        };
        Self {
            status,
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: Utc::now(),
            details,
        }
    }
}

/// Returns build and version information
pub async fn version_info() -> impl IntoResponse {
    Json(json!({
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "commit": option_env!("GIT_HASH").unwrap_or("unknown"),
    }))
}

/// Basic health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": HealthStatus::Up,
            "version": env!("CARGO_PKG_VERSION"),
            "timestamp": Utc::now().to_rfc3339(),
        })),
    )
}

/// Readiness check endpoint
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let mut details = BTreeMap::new();

    let database = match db::check_connection(&state.db).await {
        Ok(()) => HealthDetail::up(),
        Err(e) => {
            error!("Database health check failed: {}", e);
            HealthDetail::down("database unreachable")
        }
    };
    details.insert("database".to_string(), database);

    let media = match state.media.ensure_dirs().await {
        Ok(()) => HealthDetail::up(),
        Err(e) => {
            error!("Media root check failed: {}", e);
            HealthDetail::down("media root not writable")
        }
    };
    details.insert("media".to_string(), media);

    let health = HealthInfo::from_details(details);
    let status_code = match health.status {
        HealthStatus::Up => StatusCode::OK,
        HealthStatus::Down => StatusCode::SERVICE_UNAVAILABLE,
    };
    if health.status != HealthStatus::Up {
        info!(?health.details, "Readiness check failed");
    }

    (status_code, Json(health))
}

/// Creates router with health check endpoints
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/version", get(version_info))
}
