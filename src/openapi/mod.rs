use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "AssetTrack API",
        version = "0.1.0",
        description = r#"
# AssetTrack Inventory API

Tracks physical assets from registration to retirement.

## Features

- **Master data**: categories, brands, suppliers, locations, departments and employees
- **Catalog**: products with type-driven serial numbers and custom attributes
- **Stickers**: QR codes, Code 128 barcodes and printable PDF labels with scan lookup
- **Ledger**: deliveries, loans, returns and repairs with at most one open event per product
- **Reports**: inventory summary plus product and assignment reports as PDF, Excel, CSV or JSON

## Authentication

Every `/api/v1` endpoint requires a bearer token:

```
Authorization: Bearer <your-jwt-token>
```

Tokens are minted with `assettrack-admin issue-token --subject <name>`.

## Pagination

List endpoints accept `page` (default 1) and `limit` (default and maximum
come from configuration).
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "master-data", description = "Registry tables shared by the catalog"),
        (name = "product-types", description = "Product types and their serial counters"),
        (name = "products", description = "Product catalog"),
        (name = "stickers", description = "QR, barcode and label stickers"),
        (name = "assignments", description = "Assignment and repair ledger"),
        (name = "reports", description = "Summaries and downloadable reports")
    ),
    modifiers(&SecurityAddon),
    security(("bearer_auth" = [])),
    paths(
        // Master data
        crate::handlers::master_data::list_master,
        crate::handlers::master_data::get_master,
        crate::handlers::master_data::create_master,
        crate::handlers::master_data::update_master,
        crate::handlers::master_data::delete_master,
        crate::handlers::master_data::toggle_active,
        crate::handlers::master_data::department_employees,
        crate::handlers::master_data::attribute_suggestions,

        // Product types
        crate::handlers::product_types::list_product_types,
        crate::handlers::product_types::get_product_type,
        crate::handlers::product_types::create_product_type,
        crate::handlers::product_types::update_product_type,
        crate::handlers::product_types::delete_product_type,

        // Products
        crate::handlers::products::list_products,
        crate::handlers::products::status_counts,
        crate::handlers::products::get_product,
        crate::handlers::products::create_product,
        crate::handlers::products::update_product,
        crate::handlers::products::update_condition,
        crate::handlers::products::update_attributes,
        crate::handlers::products::retire_product,
        crate::handlers::products::delete_product,
        crate::handlers::products::current_holder,
        crate::handlers::products::product_history,
        crate::handlers::products::list_movements,

        // Stickers
        crate::handlers::stickers::list_product_stickers,
        crate::handlers::stickers::generate_stickers,
        crate::handlers::stickers::get_sticker,
        crate::handlers::stickers::sticker_image,
        crate::handlers::stickers::mark_printed,
        crate::handlers::stickers::deactivate_sticker,
        crate::handlers::stickers::lookup_sticker,

        // Ledger
        crate::handlers::assignments::list_assignments,
        crate::handlers::assignments::overdue_loans,
        crate::handlers::assignments::get_assignment,
        crate::handlers::assignments::open_assignment,
        crate::handlers::assignments::close_assignment,
        crate::handlers::assignments::acknowledge_assignment,
        crate::handlers::assignments::void_assignment,
        crate::handlers::assignments::send_to_repair,
        crate::handlers::assignments::complete_repair,

        // Reports
        crate::handlers::reports::inventory_summary,
        crate::handlers::reports::products_report,
        crate::handlers::reports::assignments_report,
        crate::handlers::reports::assignment_receipt,
    ),
    components(
        schemas(
            // Common types
            crate::ApiResponse<serde_json::Value>,
            crate::PaginatedResponse<serde_json::Value>,

            // Master data
            crate::services::master_data::MasterKind,
            crate::services::master_data::CategoryInput,
            crate::services::master_data::BrandInput,
            crate::services::master_data::SupplierInput,
            crate::services::master_data::LocationInput,
            crate::services::master_data::DepartmentInput,
            crate::services::master_data::EmployeeInput,
            crate::entities::category::Model,
            crate::entities::brand::Model,
            crate::entities::supplier::Model,
            crate::entities::location::Model,
            crate::entities::department::Model,
            crate::entities::employee::Model,

            // Catalog
            crate::services::attributes::AttributeField,
            crate::services::attributes::FieldKind,
            crate::entities::ProductStatus,
            crate::entities::ProductCondition,
            crate::entities::MovementKind,

            // Stickers and ledger
            crate::entities::StickerKind,
            crate::entities::EventKind,
            crate::entities::ReturnReason,

            // Reports
            crate::reports::ReportFormat,

            // Error types
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_the_inventory_surface() {
        let openapi = ApiDocV1::openapi();
        let json = serde_json::to_string_pretty(&openapi).unwrap();
        assert!(json.contains("AssetTrack API"));
        assert!(json.contains("/api/v1/products"));
        assert!(json.contains("/api/v1/reports/summary"));
        assert!(json.contains("bearer_auth"));
    }

    #[test]
    fn downloads_document_each_content_type() {
        let openapi = serde_json::to_value(ApiDocV1::openapi()).unwrap();
        let content = |path: &str| {
            openapi["paths"][path]["get"]["responses"]["200"]["content"]
                .as_object()
                .cloned()
                .unwrap_or_default()
        };

        let report = content("/api/v1/reports/products");
        for mime in ["application/pdf", "text/csv", "application/json"] {
            assert!(report.contains_key(mime), "missing {mime}");
        }
        assert_eq!(report.len(), 4);

        let image = content("/api/v1/stickers/:id/image");
        assert!(image.contains_key("image/png"));
        assert!(image.contains_key("application/pdf"));
    }
}
