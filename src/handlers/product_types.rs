use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use super::common::{created, page_request, CreatedResult};
use super::extract::{ApiJson, ApiPath, ApiQuery};
use crate::{
    entities::product_type,
    errors::ServiceError,
    services::product_types::{ProductTypeInput, ProductTypeQuery},
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};

#[utoipa::path(
    get,
    path = "/api/v1/product-types",
    params(ProductTypeQuery),
    responses(
        (status = 200, description = "Product types listed", body = ApiResponse<PaginatedResponse<product_type::Model>>)
    ),
    tag = "product-types"
)]
pub async fn list_product_types(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ProductTypeQuery>,
) -> ApiResult<PaginatedResponse<product_type::Model>> {
    let page = page_request(&state, query.page, query.limit);
    let types = state.services.product_types.list(&query, page).await?;
    Ok(Json(ApiResponse::success(types.into())))
}

#[utoipa::path(
    get,
    path = "/api/v1/product-types/:id",
    params(("id" = Uuid, Path, description = "Product type ID")),
    responses(
        (status = 200, description = "Product type fetched", body = ApiResponse<product_type::Model>),
        (status = 404, description = "Product type not found", body = crate::errors::ErrorResponse)
    ),
    tag = "product-types"
)]
pub async fn get_product_type(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<product_type::Model> {
    Ok(Json(ApiResponse::success(
        state.services.product_types.get(id).await?,
    )))
}

#[utoipa::path(
    post,
    path = "/api/v1/product-types",
    request_body = ProductTypeInput,
    responses(
        (status = 201, description = "Product type created", body = ApiResponse<product_type::Model>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 409, description = "Name or prefix already used", body = crate::errors::ErrorResponse)
    ),
    tag = "product-types"
)]
pub async fn create_product_type(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<ProductTypeInput>,
) -> CreatedResult<product_type::Model> {
    let created_type = state.services.product_types.create(payload).await?;
    Ok(created(created_type))
}

#[utoipa::path(
    put,
    path = "/api/v1/product-types/:id",
    params(("id" = Uuid, Path, description = "Product type ID")),
    request_body = ProductTypeInput,
    responses(
        (status = 200, description = "Product type updated", body = ApiResponse<product_type::Model>),
        (status = 404, description = "Product type not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Name or prefix already used", body = crate::errors::ErrorResponse)
    ),
    tag = "product-types"
)]
pub async fn update_product_type(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<ProductTypeInput>,
) -> ApiResult<product_type::Model> {
    let updated = state.services.product_types.update(id, payload).await?;
    Ok(Json(ApiResponse::success(updated)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/product-types/:id",
    params(("id" = Uuid, Path, description = "Product type ID")),
    responses(
        (status = 204, description = "Product type deleted"),
        (status = 404, description = "Product type not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Products still use the type", body = crate::errors::ErrorResponse)
    ),
    tag = "product-types"
)]
pub async fn delete_product_type(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state.services.product_types.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
