use axum::{
    extract::State,
    http::StatusCode,
    Extension, Json,
};
use uuid::Uuid;

use super::common::{created, page_request, CreatedResult};
use super::extract::{ApiJson, ApiPath, ApiQuery};
use crate::{
    auth::AuthUser,
    entities::{assignment_event, product, stock_movement},
    errors::ServiceError,
    services::products::{
        AttributesUpdate, ConditionUpdate, CurrentHolder, MovementQuery, ProductInput,
        ProductQuery, RetireRequest, StatusCounts,
    },
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};

#[utoipa::path(
    get,
    path = "/api/v1/products",
    params(ProductQuery),
    responses(
        (status = 200, description = "Products listed", body = ApiResponse<PaginatedResponse<product::Model>>)
    ),
    tag = "products"
)]
pub async fn list_products(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ProductQuery>,
) -> ApiResult<PaginatedResponse<product::Model>> {
    let page = page_request(&state, query.page, query.limit);
    let products = state.services.products.list_products(&query, page).await?;
    Ok(Json(ApiResponse::success(products.into())))
}

#[utoipa::path(
    get,
    path = "/api/v1/products/status-counts",
    responses(
        (status = 200, description = "Active products per status", body = ApiResponse<StatusCounts>)
    ),
    tag = "products"
)]
pub async fn status_counts(State(state): State<AppState>) -> ApiResult<StatusCounts> {
    let counts = state.services.products.status_counts().await?;
    Ok(Json(ApiResponse::success(counts)))
}

#[utoipa::path(
    get,
    path = "/api/v1/products/:id",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product fetched", body = ApiResponse<product::Model>),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    tag = "products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<product::Model> {
    Ok(Json(ApiResponse::success(
        state.services.products.get_product(id).await?,
    )))
}

#[utoipa::path(
    post,
    path = "/api/v1/products",
    request_body = ProductInput,
    responses(
        (status = 201, description = "Product registered", body = ApiResponse<product::Model>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 409, description = "Serial number or barcode already used", body = crate::errors::ErrorResponse)
    ),
    tag = "products"
)]
pub async fn create_product(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(payload): ApiJson<ProductInput>,
) -> CreatedResult<product::Model> {
    let product = state
        .services
        .products
        .create_product(payload, &user.subject)
        .await?;
    Ok(created(product))
}

#[utoipa::path(
    put,
    path = "/api/v1/products/:id",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = ProductInput,
    responses(
        (status = 200, description = "Product updated", body = ApiResponse<product::Model>),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Serial number or barcode already used", body = crate::errors::ErrorResponse)
    ),
    tag = "products"
)]
pub async fn update_product(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<ProductInput>,
) -> ApiResult<product::Model> {
    let product = state
        .services
        .products
        .update_product(id, payload, &user.subject)
        .await?;
    Ok(Json(ApiResponse::success(product)))
}

#[utoipa::path(
    put,
    path = "/api/v1/products/:id/condition",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = ConditionUpdate,
    responses(
        (status = 200, description = "Condition recorded", body = ApiResponse<product::Model>),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    tag = "products"
)]
pub async fn update_condition(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<ConditionUpdate>,
) -> ApiResult<product::Model> {
    let product = state
        .services
        .products
        .update_condition(id, payload.condition, &user.subject)
        .await?;
    Ok(Json(ApiResponse::success(product)))
}

#[utoipa::path(
    put,
    path = "/api/v1/products/:id/attributes",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = AttributesUpdate,
    responses(
        (status = 200, description = "Attributes replaced", body = ApiResponse<product::Model>),
        (status = 400, description = "Attributes do not match the type schema", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    tag = "products"
)]
pub async fn update_attributes(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<AttributesUpdate>,
) -> ApiResult<product::Model> {
    let product = state
        .services
        .products
        .update_attributes(id, payload.attributes, &user.subject)
        .await?;
    Ok(Json(ApiResponse::success(product)))
}

#[utoipa::path(
    post,
    path = "/api/v1/products/:id/retire",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = RetireRequest,
    responses(
        (status = 200, description = "Product retired", body = ApiResponse<product::Model>),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Product is assigned or in repair", body = crate::errors::ErrorResponse)
    ),
    tag = "products"
)]
pub async fn retire_product(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<RetireRequest>,
) -> ApiResult<product::Model> {
    let product = state
        .services
        .products
        .retire_product(id, payload.notes, &user.subject)
        .await?;
    Ok(Json(ApiResponse::success(product)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/products/:id",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 204, description = "Product deactivated"),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Product is assigned or in repair", body = crate::errors::ErrorResponse)
    ),
    tag = "products"
)]
pub async fn delete_product(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state
        .services
        .products
        .delete_product(id, &user.subject)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/v1/products/:id/holder",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Current holder of the product", body = ApiResponse<CurrentHolder>),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    tag = "products"
)]
pub async fn current_holder(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<CurrentHolder> {
    let holder = state.services.products.current_holder(id).await?;
    Ok(Json(ApiResponse::success(holder)))
}

#[utoipa::path(
    get,
    path = "/api/v1/products/:id/history",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Ledger rows of the product, oldest first", body = ApiResponse<Vec<assignment_event::Model>>),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    tag = "products"
)]
pub async fn product_history(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Vec<assignment_event::Model>> {
    let history = state.services.assignments.product_history(id).await?;
    Ok(Json(ApiResponse::success(history)))
}

#[utoipa::path(
    get,
    path = "/api/v1/movements",
    params(MovementQuery),
    responses(
        (status = 200, description = "Stock movements listed", body = ApiResponse<PaginatedResponse<stock_movement::Model>>)
    ),
    tag = "products"
)]
pub async fn list_movements(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<MovementQuery>,
) -> ApiResult<PaginatedResponse<stock_movement::Model>> {
    let page = page_request(&state, query.page, query.limit);
    let movements = state.services.products.list_movements(&query, page).await?;
    Ok(Json(ApiResponse::success(movements.into())))
}
