use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use crate::{
    errors::ServiceError,
    reports::RenderedReport,
    services::{Page, PageRequest},
    ApiResponse, AppState, PaginatedResponse,
};

/// Result of a handler that creates a resource
pub type CreatedResult<T> = Result<(StatusCode, Json<ApiResponse<T>>), ServiceError>;

/// Standard created response
pub fn created<T>(data: T) -> (StatusCode, Json<ApiResponse<T>>) {
    (StatusCode::CREATED, Json(ApiResponse::success(data)))
}

/// Page request clamped to the configured page sizes
pub fn page_request(state: &AppState, page: Option<u64>, limit: Option<u64>) -> PageRequest {
    PageRequest::new(page.unwrap_or(1), state.config.page_size(limit))
}

impl<T> From<Page<T>> for PaginatedResponse<T> {
    fn from(page: Page<T>) -> Self {
        let total_pages = page.total_pages();
        Self {
            items: page.items,
            total: page.total,
            page: page.page,
            limit: page.limit,
            total_pages,
        }
    }
}

/// How a browser should treat a binary download
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Inline,
    Attachment,
}

/// Binary body with content type and file name headers
pub fn file_response(
    bytes: Vec<u8>,
    content_type: &str,
    file_name: &str,
    disposition: Disposition,
) -> Response {
    let kind = match disposition {
        Disposition::Inline => "inline",
        Disposition::Attachment => "attachment",
    };
    let safe_name: String = file_name
        .chars()
        .filter(|c| c.is_ascii_graphic() && *c != '"' && *c != '\\')
        .collect();

    let mut response = (StatusCode::OK, Body::from(bytes)).into_response();
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(content_type) {
        headers.insert(header::CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&format!("{kind}; filename=\"{safe_name}\"")) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    response
}

impl IntoResponse for RenderedReport {
    fn into_response(self) -> Response {
        file_response(
            self.bytes,
            self.content_type,
            &self.file_name,
            Disposition::Attachment,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_convert_with_total_pages() {
        let page = Page::new(vec![1, 2, 3], 7, PageRequest::new(1, 3));
        let response = PaginatedResponse::from(page);
        assert_eq!(response.total_pages, 3);
        assert_eq!(response.items, vec![1, 2, 3]);
    }

    #[test]
    fn downloads_carry_a_sanitised_file_name() {
        let response = file_response(
            b"a,b".to_vec(),
            "text/csv",
            "products \"all\".csv",
            Disposition::Attachment,
        );
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/csv");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"productsall.csv\""
        );
    }
}
