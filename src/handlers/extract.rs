//! Request extractors whose rejections render as `ErrorResponse` JSON.

use async_trait::async_trait;
use axum::{
    extract::{FromRequest, FromRequestParts, Path, Query, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;

use crate::errors::ServiceError;

/// JSON request body
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

/// Path parameters
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiPath<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

/// Query string
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode};
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Payload {
        name: String,
    }

    #[tokio::test]
    async fn malformed_bodies_become_invalid_input() {
        let req = axum::http::Request::builder()
            .header("content-type", "application/json")
            .body(Body::from(r#"{"name": "ok", "extra": 1}"#))
            .unwrap();
        let err = ApiJson::<Payload>::from_request(req, &()).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let req = axum::http::Request::builder()
            .header("content-type", "application/json")
            .body(Body::from(r#"{"name": "ok"}"#))
            .unwrap();
        let ApiJson(payload) = ApiJson::<Payload>::from_request(req, &()).await.unwrap();
        assert_eq!(payload.name, "ok");
    }

    #[tokio::test]
    async fn bad_query_strings_become_invalid_input() {
        #[derive(Debug, Deserialize)]
        struct Filter {
            #[allow(dead_code)]
            page: u64,
        }

        let (mut parts, _) = axum::http::Request::builder()
            .uri("/items?page=first")
            .body(())
            .unwrap()
            .into_parts();
        let err = ApiQuery::<Filter>::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }
}
