use axum::{
    extract::State,
    Json,
};
use uuid::Uuid;

use super::extract::{ApiPath, ApiQuery};
use crate::{
    errors::ServiceError,
    reports::RenderedReport,
    services::reports::{InventorySummary, ReportFilter},
    ApiResponse, ApiResult, AppState,
};

#[utoipa::path(
    get,
    path = "/api/v1/reports/summary",
    responses(
        (status = 200, description = "Inventory dashboard figures", body = ApiResponse<InventorySummary>)
    ),
    tag = "reports"
)]
pub async fn inventory_summary(State(state): State<AppState>) -> ApiResult<InventorySummary> {
    let summary = state.services.reports.inventory_summary().await?;
    Ok(Json(ApiResponse::success(summary)))
}

#[utoipa::path(
    get,
    path = "/api/v1/reports/products",
    params(ReportFilter),
    responses(
        (status = 200, description = "Products report as a download",
            content(
                (String = "application/pdf"),
                (String = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
                (String = "text/csv"),
                (String = "application/json")
            ))
    ),
    tag = "reports"
)]
pub async fn products_report(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<ReportFilter>,
) -> Result<RenderedReport, ServiceError> {
    state.services.reports.products_report(&filter).await
}

#[utoipa::path(
    get,
    path = "/api/v1/reports/assignments",
    params(ReportFilter),
    responses(
        (status = 200, description = "Assignments report as a download",
            content(
                (String = "application/pdf"),
                (String = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
                (String = "text/csv"),
                (String = "application/json")
            ))
    ),
    tag = "reports"
)]
pub async fn assignments_report(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<ReportFilter>,
) -> Result<RenderedReport, ServiceError> {
    state.services.reports.assignments_report(&filter).await
}

#[utoipa::path(
    get,
    path = "/api/v1/reports/assignments/:id/receipt",
    params(("id" = Uuid, Path, description = "Delivery or loan event ID")),
    responses(
        (status = 200, description = "Signed receipt for one event", content_type = "application/pdf"),
        (status = 404, description = "Event not found", body = crate::errors::ErrorResponse)
    ),
    tag = "reports"
)]
pub async fn assignment_receipt(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<RenderedReport, ServiceError> {
    state.services.reports.assignment_receipt(id).await
}
