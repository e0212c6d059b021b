pub mod assignments;
pub mod attributes;
pub mod maintenance;
pub mod master_data;
pub mod product_types;
pub mod products;
pub mod reports;
pub mod stickers;

use sea_orm::{ConnectionTrait, EntityTrait, PaginatorTrait, Select};
use serde::Serialize;

use crate::errors::ServiceError;

/// Page requested by a caller, already clamped to the configured limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// One-based page number
    pub page: u64,
    pub limit: u64,
}

impl PageRequest {
    pub fn new(page: u64, limit: u64) -> Self {
        Self {
            page: page.max(1),
            limit: limit.max(1),
        }
    }

    /// Zero-based page index for SeaORM paginators
    pub fn index(&self) -> u64 {
        self.page - 1
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, 20)
    }
}

/// One page of results
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, request: PageRequest) -> Self {
        Self {
            items,
            total,
            page: request.page,
            limit: request.limit,
        }
    }

    pub fn total_pages(&self) -> u64 {
        if self.total == 0 {
            0
        } else {
            (self.total + self.limit - 1) / self.limit
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            limit: self.limit,
        }
    }
}

/// Fails with a conflict when `query` matches any row
pub(crate) async fn ensure_absent<E, C>(
    db: &C,
    query: Select<E>,
    message: impl FnOnce() -> String,
) -> Result<(), ServiceError>
where
    E: EntityTrait,
    E::Model: Sync,
    C: ConnectionTrait,
{
    if query.count(db).await? > 0 {
        return Err(ServiceError::Conflict(message()));
    }
    Ok(())
}

/// Trims a required text field
pub(crate) fn required_text(value: &str, field: &str) -> Result<String, ServiceError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::ValidationError(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

/// Trims an optional text field, mapping blank to `None`
pub(crate) fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Upper-case code derived from a display name: its first six ASCII
/// alphanumerics, or `GEN` when there are none.
pub(crate) fn code_from_name(name: &str) -> String {
    let code: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(6)
        .collect::<String>()
        .to_ascii_uppercase();

    if code.is_empty() {
        "GEN".to_string()
    } else {
        code
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_from_name_keeps_six_ascii_alphanumerics() {
        assert_eq!(code_from_name("Human Resources"), "HUMANR");
        assert_eq!(code_from_name("I+D"), "ID");
        assert_eq!(code_from_name("Área técnica"), "REATCN");
        assert_eq!(code_from_name("---"), "GEN");
    }

    #[test]
    fn page_math() {
        let page = Page::new(vec![1, 2, 3], 45, PageRequest::new(0, 20));
        assert_eq!(page.page, 1);
        assert_eq!(page.total_pages(), 3);
        assert_eq!(page.map(|n| n * 2).items, vec![2, 4, 6]);

        let empty: Page<u8> = Page::new(vec![], 0, PageRequest::default());
        assert_eq!(empty.total_pages(), 0);
    }

    #[test]
    fn optional_text_maps_blank_to_none() {
        assert_eq!(optional_text(Some("  ".into())), None);
        assert_eq!(optional_text(Some(" x ".into())), Some("x".into()));
        assert!(required_text(" ", "name").is_err());
    }
}
