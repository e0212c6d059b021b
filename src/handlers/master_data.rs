//! Registry endpoints shared by categories, brands, suppliers, locations,
//! departments and employees. The table is picked by the first path segment.

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::common::{created, page_request, CreatedResult};
use super::extract::{ApiJson, ApiPath, ApiQuery};
use crate::{
    entities::{brand, category, department, employee, location, supplier},
    errors::ServiceError,
    services::{
        master_data::{
            AttributeSuggestion, BrandInput, CategoryInput, DepartmentInput, EmployeeInput,
            LocationInput, MasterKind, MasterListQuery, SupplierInput,
        },
        Page,
    },
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};

/// Runs `$body` with `$E` bound to the entity of `$kind`
macro_rules! with_entity {
    ($kind:expr, $E:ident => $body:expr) => {
        match $kind {
            MasterKind::Categories => {
                type $E = category::Entity;
                $body
            }
            MasterKind::Brands => {
                type $E = brand::Entity;
                $body
            }
            MasterKind::Suppliers => {
                type $E = supplier::Entity;
                $body
            }
            MasterKind::Locations => {
                type $E = location::Entity;
                $body
            }
            MasterKind::Departments => {
                type $E = department::Entity;
                $body
            }
            MasterKind::Employees => {
                type $E = employee::Entity;
                $body
            }
        }
    };
}

fn to_json<T: Serialize>(value: T) -> Result<Value, ServiceError> {
    serde_json::to_value(value).map_err(|e| ServiceError::InternalError(e.to_string()))
}

fn json_page<T: Serialize>(page: Page<T>) -> Result<PaginatedResponse<Value>, ServiceError> {
    let total_pages = page.total_pages();
    let page = page.map(to_json);
    Ok(PaginatedResponse {
        items: page.items.into_iter().collect::<Result<_, _>>()?,
        total: page.total,
        page: page.page,
        limit: page.limit,
        total_pages,
    })
}

fn parse<T: DeserializeOwned>(kind: MasterKind, body: Value) -> Result<T, ServiceError> {
    serde_json::from_value(body)
        .map_err(|e| ServiceError::InvalidInput(format!("invalid {} payload: {e}", kind.singular())))
}

#[utoipa::path(
    get,
    path = "/api/v1/:kind",
    params(
        ("kind" = MasterKind, Path, description = "Registry table"),
        MasterListQuery
    ),
    responses(
        (status = 200, description = "Registry rows listed", body = ApiResponse<PaginatedResponse<serde_json::Value>>),
        (status = 400, description = "Unknown registry", body = crate::errors::ErrorResponse)
    ),
    tag = "master-data"
)]
pub async fn list_master(
    State(state): State<AppState>,
    ApiPath(kind): ApiPath<MasterKind>,
    ApiQuery(query): ApiQuery<MasterListQuery>,
) -> ApiResult<PaginatedResponse<Value>> {
    let page = page_request(&state, query.page, query.limit);
    let service = &state.services.master_data;

    let response = if kind == MasterKind::Employees {
        json_page(service.list_employees(&query, page).await?)?
    } else {
        with_entity!(kind, E => json_page(service.list::<E>(&query, page).await?)?)
    };
    Ok(Json(ApiResponse::success(response)))
}

#[utoipa::path(
    get,
    path = "/api/v1/:kind/:id",
    params(
        ("kind" = MasterKind, Path, description = "Registry table"),
        ("id" = Uuid, Path, description = "Row ID")
    ),
    responses(
        (status = 200, description = "Registry row fetched", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "Row not found", body = crate::errors::ErrorResponse)
    ),
    tag = "master-data"
)]
pub async fn get_master(
    State(state): State<AppState>,
    ApiPath((kind, id)): ApiPath<(MasterKind, Uuid)>,
) -> ApiResult<Value> {
    let service = &state.services.master_data;
    let value = with_entity!(kind, E => to_json(service.get::<E>(id).await?)?);
    Ok(Json(ApiResponse::success(value)))
}

#[utoipa::path(
    post,
    path = "/api/v1/:kind",
    params(("kind" = MasterKind, Path, description = "Registry table")),
    request_body(
        content = serde_json::Value,
        description = "CategoryInput, BrandInput, SupplierInput, LocationInput, DepartmentInput or EmployeeInput"
    ),
    responses(
        (status = 201, description = "Registry row created", body = ApiResponse<serde_json::Value>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 409, description = "Duplicate name or code", body = crate::errors::ErrorResponse)
    ),
    tag = "master-data"
)]
pub async fn create_master(
    State(state): State<AppState>,
    ApiPath(kind): ApiPath<MasterKind>,
    ApiJson(body): ApiJson<Value>,
) -> CreatedResult<Value> {
    let service = &state.services.master_data;
    let value = match kind {
        MasterKind::Categories => to_json(service.create_category(parse::<CategoryInput>(kind, body)?).await?),
        MasterKind::Brands => to_json(service.create_brand(parse::<BrandInput>(kind, body)?).await?),
        MasterKind::Suppliers => to_json(service.create_supplier(parse::<SupplierInput>(kind, body)?).await?),
        MasterKind::Locations => to_json(service.create_location(parse::<LocationInput>(kind, body)?).await?),
        MasterKind::Departments => {
            to_json(service.create_department(parse::<DepartmentInput>(kind, body)?).await?)
        }
        MasterKind::Employees => to_json(service.create_employee(parse::<EmployeeInput>(kind, body)?).await?),
    }?;
    Ok(created(value))
}

#[utoipa::path(
    put,
    path = "/api/v1/:kind/:id",
    params(
        ("kind" = MasterKind, Path, description = "Registry table"),
        ("id" = Uuid, Path, description = "Row ID")
    ),
    request_body(content = serde_json::Value, description = "Same payload as for creation"),
    responses(
        (status = 200, description = "Registry row updated", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "Row not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Duplicate name or code", body = crate::errors::ErrorResponse)
    ),
    tag = "master-data"
)]
pub async fn update_master(
    State(state): State<AppState>,
    ApiPath((kind, id)): ApiPath<(MasterKind, Uuid)>,
    ApiJson(body): ApiJson<Value>,
) -> ApiResult<Value> {
    let service = &state.services.master_data;
    let value = match kind {
        MasterKind::Categories => to_json(service.update_category(id, parse(kind, body)?).await?),
        MasterKind::Brands => to_json(service.update_brand(id, parse(kind, body)?).await?),
        MasterKind::Suppliers => to_json(service.update_supplier(id, parse(kind, body)?).await?),
        MasterKind::Locations => to_json(service.update_location(id, parse(kind, body)?).await?),
        MasterKind::Departments => to_json(service.update_department(id, parse(kind, body)?).await?),
        MasterKind::Employees => to_json(service.update_employee(id, parse(kind, body)?).await?),
    }?;
    Ok(Json(ApiResponse::success(value)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/:kind/:id",
    params(
        ("kind" = MasterKind, Path, description = "Registry table"),
        ("id" = Uuid, Path, description = "Row ID")
    ),
    responses(
        (status = 204, description = "Registry row deleted"),
        (status = 404, description = "Row not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Row is still referenced", body = crate::errors::ErrorResponse)
    ),
    tag = "master-data"
)]
pub async fn delete_master(
    State(state): State<AppState>,
    ApiPath((kind, id)): ApiPath<(MasterKind, Uuid)>,
) -> Result<StatusCode, ServiceError> {
    let service = &state.services.master_data;
    with_entity!(kind, E => service.delete::<E>(id).await?);
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/v1/:kind/:id/toggle-active",
    params(
        ("kind" = MasterKind, Path, description = "Registry table"),
        ("id" = Uuid, Path, description = "Row ID")
    ),
    responses(
        (status = 200, description = "Active flag flipped", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "Row not found", body = crate::errors::ErrorResponse)
    ),
    tag = "master-data"
)]
pub async fn toggle_active(
    State(state): State<AppState>,
    ApiPath((kind, id)): ApiPath<(MasterKind, Uuid)>,
) -> ApiResult<Value> {
    let service = &state.services.master_data;
    let value = with_entity!(kind, E => to_json(service.toggle_active::<E>(id).await?)?);
    Ok(Json(ApiResponse::success(value)))
}

#[utoipa::path(
    get,
    path = "/api/v1/departments/:id/employees",
    params(("id" = Uuid, Path, description = "Department ID")),
    responses(
        (status = 200, description = "Employees of the department", body = ApiResponse<Vec<employee::Model>>),
        (status = 404, description = "Department not found", body = crate::errors::ErrorResponse)
    ),
    tag = "master-data"
)]
pub async fn department_employees(
    State(state): State<AppState>,
    ApiPath((kind, id)): ApiPath<(MasterKind, Uuid)>,
) -> ApiResult<Vec<employee::Model>> {
    if kind != MasterKind::Departments {
        return Err(ServiceError::NotFound(format!("{kind} have no employees")));
    }
    let employees = state
        .services
        .master_data
        .list_department_employees(id)
        .await?;
    Ok(Json(ApiResponse::success(employees)))
}

#[utoipa::path(
    get,
    path = "/api/v1/categories/:id/attribute-suggestions",
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Suggested attribute fields", body = ApiResponse<AttributeSuggestion>),
        (status = 404, description = "Category not found", body = crate::errors::ErrorResponse)
    ),
    tag = "master-data"
)]
pub async fn attribute_suggestions(
    State(state): State<AppState>,
    ApiPath((kind, id)): ApiPath<(MasterKind, Uuid)>,
) -> ApiResult<AttributeSuggestion> {
    if kind != MasterKind::Categories {
        return Err(ServiceError::NotFound(format!(
            "{kind} have no attribute suggestions"
        )));
    }
    let suggestion = state
        .services
        .master_data
        .suggest_attribute_fields(id)
        .await?;
    Ok(Json(ApiResponse::success(suggestion)))
}
