use axum::{
    extract::State,
    Extension, Json,
};
use uuid::Uuid;

use super::common::{created, page_request, CreatedResult};
use super::extract::{ApiJson, ApiPath, ApiQuery};
use crate::{
    auth::AuthUser,
    entities::assignment_event,
    services::assignments::{
        CloseAssignment, CompleteRepair, EventQuery, OpenAssignment, RepairRequest, VoidRequest,
    },
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};

#[utoipa::path(
    get,
    path = "/api/v1/assignments",
    params(EventQuery),
    responses(
        (status = 200, description = "Ledger rows listed", body = ApiResponse<PaginatedResponse<assignment_event::Model>>)
    ),
    tag = "assignments"
)]
pub async fn list_assignments(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<EventQuery>,
) -> ApiResult<PaginatedResponse<assignment_event::Model>> {
    let page = page_request(&state, query.page, query.limit);
    let events = state.services.assignments.list_events(&query, page).await?;
    Ok(Json(ApiResponse::success(events.into())))
}

#[utoipa::path(
    get,
    path = "/api/v1/assignments/overdue",
    responses(
        (status = 200, description = "Open loans past their expected end", body = ApiResponse<Vec<assignment_event::Model>>)
    ),
    tag = "assignments"
)]
pub async fn overdue_loans(State(state): State<AppState>) -> ApiResult<Vec<assignment_event::Model>> {
    let loans = state.services.assignments.list_overdue_loans().await?;
    Ok(Json(ApiResponse::success(loans)))
}

#[utoipa::path(
    get,
    path = "/api/v1/assignments/:id",
    params(("id" = Uuid, Path, description = "Ledger event ID")),
    responses(
        (status = 200, description = "Ledger event fetched", body = ApiResponse<assignment_event::Model>),
        (status = 404, description = "Event not found", body = crate::errors::ErrorResponse)
    ),
    tag = "assignments"
)]
pub async fn get_assignment(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<assignment_event::Model> {
    Ok(Json(ApiResponse::success(
        state.services.assignments.get_event(id).await?,
    )))
}

#[utoipa::path(
    post,
    path = "/api/v1/assignments",
    request_body = OpenAssignment,
    responses(
        (status = 201, description = "Assignment opened", body = ApiResponse<assignment_event::Model>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 409, description = "Product is not available", body = crate::errors::ErrorResponse)
    ),
    tag = "assignments"
)]
pub async fn open_assignment(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(payload): ApiJson<OpenAssignment>,
) -> CreatedResult<assignment_event::Model> {
    let event = state
        .services
        .assignments
        .open_assignment(payload, &user.subject)
        .await?;
    Ok(created(event))
}

#[utoipa::path(
    post,
    path = "/api/v1/assignments/:id/return",
    params(("id" = Uuid, Path, description = "Opening event ID")),
    request_body = CloseAssignment,
    responses(
        (status = 200, description = "Assignment closed; returns the opening row with its closing stamp", body = ApiResponse<assignment_event::Model>),
        (status = 404, description = "Event not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Event is not open", body = crate::errors::ErrorResponse)
    ),
    tag = "assignments"
)]
pub async fn close_assignment(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<CloseAssignment>,
) -> ApiResult<assignment_event::Model> {
    let event = state
        .services
        .assignments
        .close_assignment(id, payload, &user.subject)
        .await?;
    Ok(Json(ApiResponse::success(event)))
}

#[utoipa::path(
    post,
    path = "/api/v1/assignments/:id/acknowledge",
    params(("id" = Uuid, Path, description = "Opening event ID")),
    responses(
        (status = 200, description = "Receipt confirmed by the employee", body = ApiResponse<assignment_event::Model>),
        (status = 404, description = "Event not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Already acknowledged", body = crate::errors::ErrorResponse)
    ),
    tag = "assignments"
)]
pub async fn acknowledge_assignment(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<assignment_event::Model> {
    let event = state.services.assignments.acknowledge(id).await?;
    Ok(Json(ApiResponse::success(event)))
}

#[utoipa::path(
    post,
    path = "/api/v1/assignments/:id/void",
    params(("id" = Uuid, Path, description = "Ledger event ID")),
    request_body = VoidRequest,
    responses(
        (status = 200, description = "Event voided", body = ApiResponse<assignment_event::Model>),
        (status = 404, description = "Event not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Event cannot be voided", body = crate::errors::ErrorResponse)
    ),
    tag = "assignments"
)]
pub async fn void_assignment(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<VoidRequest>,
) -> ApiResult<assignment_event::Model> {
    let event = state
        .services
        .assignments
        .void_event(id, payload, &user.subject)
        .await?;
    Ok(Json(ApiResponse::success(event)))
}

#[utoipa::path(
    post,
    path = "/api/v1/products/:id/repair",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = RepairRequest,
    responses(
        (status = 201, description = "Repair opened", body = ApiResponse<assignment_event::Model>),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Product is already in repair or retired", body = crate::errors::ErrorResponse)
    ),
    tag = "assignments"
)]
pub async fn send_to_repair(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(product_id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<RepairRequest>,
) -> CreatedResult<assignment_event::Model> {
    let event = state
        .services
        .assignments
        .send_to_repair(product_id, payload, &user.subject)
        .await?;
    Ok(created(event))
}

#[utoipa::path(
    post,
    path = "/api/v1/products/:id/repair/complete",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = CompleteRepair,
    responses(
        (status = 200, description = "Repair closed; returns the repair row with its closing stamp", body = ApiResponse<assignment_event::Model>),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Product is not in repair", body = crate::errors::ErrorResponse)
    ),
    tag = "assignments"
)]
pub async fn complete_repair(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(product_id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<CompleteRepair>,
) -> ApiResult<assignment_event::Model> {
    let event = state
        .services
        .assignments
        .complete_repair(product_id, payload, &user.subject)
        .await?;
    Ok(Json(ApiResponse::success(event)))
}
