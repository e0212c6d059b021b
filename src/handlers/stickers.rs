use axum::{
    extract::State,
    response::Response,
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use super::common::{file_response, Disposition};
use super::extract::{ApiJson, ApiPath, ApiQuery};
use crate::{
    entities::sticker,
    errors::ServiceError,
    services::stickers::{GenerateStickers, GeneratedSticker, StickerLookup},
    ApiResponse, ApiResult, AppState,
};

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StickerListQuery {
    /// Also list deactivated stickers
    pub include_inactive: Option<bool>,
}

#[utoipa::path(
    get,
    path = "/api/v1/products/:id/stickers",
    params(
        ("id" = Uuid, Path, description = "Product ID"),
        StickerListQuery
    ),
    responses(
        (status = 200, description = "Stickers of the product", body = ApiResponse<Vec<sticker::Model>>),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    tag = "stickers"
)]
pub async fn list_product_stickers(
    State(state): State<AppState>,
    ApiPath(product_id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<StickerListQuery>,
) -> ApiResult<Vec<sticker::Model>> {
    let stickers = state
        .services
        .stickers
        .list_for_product(product_id, query.include_inactive.unwrap_or(false))
        .await?;
    Ok(Json(ApiResponse::success(stickers)))
}

#[utoipa::path(
    post,
    path = "/api/v1/products/:id/stickers",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = GenerateStickers,
    responses(
        (status = 200, description = "Stickers issued or reused", body = ApiResponse<Vec<GeneratedSticker>>),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Product is inactive or the code is taken", body = crate::errors::ErrorResponse)
    ),
    tag = "stickers"
)]
pub async fn generate_stickers(
    State(state): State<AppState>,
    ApiPath(product_id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<GenerateStickers>,
) -> ApiResult<Vec<GeneratedSticker>> {
    let generated = state
        .services
        .stickers
        .generate(product_id, payload.kinds)
        .await?;
    Ok(Json(ApiResponse::success(generated)))
}

#[utoipa::path(
    get,
    path = "/api/v1/stickers/:id",
    params(("id" = Uuid, Path, description = "Sticker ID")),
    responses(
        (status = 200, description = "Sticker fetched", body = ApiResponse<sticker::Model>),
        (status = 404, description = "Sticker not found", body = crate::errors::ErrorResponse)
    ),
    tag = "stickers"
)]
pub async fn get_sticker(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<sticker::Model> {
    Ok(Json(ApiResponse::success(
        state.services.stickers.get(id).await?,
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/stickers/:id/image",
    params(("id" = Uuid, Path, description = "Sticker ID")),
    responses(
        (status = 200, description = "PNG symbol or PDF label",
            content((String = "image/png"), (String = "application/pdf"))),
        (status = 404, description = "Sticker or image not found", body = crate::errors::ErrorResponse)
    ),
    tag = "stickers"
)]
pub async fn sticker_image(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Response, ServiceError> {
    let image = state.services.stickers.image(id).await?;
    Ok(file_response(
        image.bytes,
        image.content_type,
        &image.file_name,
        Disposition::Inline,
    ))
}

#[utoipa::path(
    post,
    path = "/api/v1/stickers/:id/printed",
    params(("id" = Uuid, Path, description = "Sticker ID")),
    responses(
        (status = 200, description = "Sticker marked as printed", body = ApiResponse<sticker::Model>),
        (status = 404, description = "Sticker not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Sticker is inactive", body = crate::errors::ErrorResponse)
    ),
    tag = "stickers"
)]
pub async fn mark_printed(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<sticker::Model> {
    let sticker = state.services.stickers.mark_printed(id).await?;
    Ok(Json(ApiResponse::success(sticker)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/stickers/:id",
    params(("id" = Uuid, Path, description = "Sticker ID")),
    responses(
        (status = 200, description = "Sticker deactivated", body = ApiResponse<sticker::Model>),
        (status = 404, description = "Sticker not found", body = crate::errors::ErrorResponse)
    ),
    tag = "stickers"
)]
pub async fn deactivate_sticker(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<sticker::Model> {
    let sticker = state.services.stickers.deactivate(id).await?;
    Ok(Json(ApiResponse::success(sticker)))
}

#[utoipa::path(
    get,
    path = "/api/v1/stickers/lookup/:code",
    params(("code" = String, Path, description = "Scanned sticker code, case-insensitive")),
    responses(
        (status = 200, description = "Product and current holder behind the code", body = ApiResponse<StickerLookup>),
        (status = 404, description = "No active sticker with that code", body = crate::errors::ErrorResponse)
    ),
    tag = "stickers"
)]
pub async fn lookup_sticker(
    State(state): State<AppState>,
    ApiPath(code): ApiPath<String>,
) -> ApiResult<StickerLookup> {
    let lookup = state.services.stickers.lookup(&code).await?;
    Ok(Json(ApiResponse::success(lookup)))
}
