use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_master_data_tables::Migration),
            Box::new(m20240101_000002_create_catalog_tables::Migration),
            Box::new(m20240101_000003_create_stickers_table::Migration),
            Box::new(m20240101_000004_create_assignment_events_table::Migration),
            Box::new(m20240101_000005_create_stock_movements_table::Migration),
        ]
    }
}

/// Tables in foreign-key order, children last. Used by the admin reset.
pub const TABLES_IN_FK_ORDER: [&str; 11] = [
    "categories",
    "brands",
    "suppliers",
    "locations",
    "departments",
    "employees",
    "product_types",
    "products",
    "stickers",
    "assignment_events",
    "stock_movements",
];

mod m20240101_000001_create_master_data_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_master_data_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Categories::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Categories::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Categories::Name)
                                .string_len(100)
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(Categories::Code)
                                .string_len(10)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Categories::Description).text().null())
                        .col(ColumnDef::new(Categories::AttributeFields).json().not_null())
                        .col(
                            ColumnDef::new(Categories::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Categories::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Categories::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Brands::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Brands::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Brands::Name)
                                .string_len(100)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Brands::Description).text().null())
                        .col(
                            ColumnDef::new(Brands::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Brands::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Brands::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Suppliers::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Suppliers::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Suppliers::Name)
                                .string_len(200)
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(Suppliers::TaxId)
                                .string_len(20)
                                .null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Suppliers::Phone).string_len(20).null())
                        .col(ColumnDef::new(Suppliers::Email).string_len(254).null())
                        .col(ColumnDef::new(Suppliers::Address).text().null())
                        .col(
                            ColumnDef::new(Suppliers::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Suppliers::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Suppliers::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Locations::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Locations::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Locations::Name)
                                .string_len(100)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Locations::Building).string_len(100).null())
                        .col(ColumnDef::new(Locations::Floor).string_len(20).null())
                        .col(ColumnDef::new(Locations::Room).string_len(50).null())
                        .col(ColumnDef::new(Locations::Description).text().null())
                        .col(
                            ColumnDef::new(Locations::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Locations::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Locations::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Departments::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Departments::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Departments::Name)
                                .string_len(100)
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(Departments::Code)
                                .string_len(10)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Departments::Description).text().null())
                        .col(ColumnDef::new(Departments::Manager).string_len(100).null())
                        .col(
                            ColumnDef::new(Departments::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Departments::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Departments::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Employees::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Employees::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Employees::FullName).string_len(200).not_null())
                        .col(
                            ColumnDef::new(Employees::NationalId)
                                .string_len(9)
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(Employees::Email)
                                .string_len(254)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Employees::Phone).string_len(20).null())
                        .col(ColumnDef::new(Employees::DepartmentId).uuid().not_null())
                        .col(ColumnDef::new(Employees::JobTitle).string_len(100).null())
                        .col(ColumnDef::new(Employees::HiredOn).date().null())
                        .col(ColumnDef::new(Employees::LeftOn).date().null())
                        .col(
                            ColumnDef::new(Employees::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Employees::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Employees::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_employees_department_id")
                                .from(Employees::Table, Employees::DepartmentId)
                                .to(Departments::Table, Departments::Id)
                                .on_delete(ForeignKeyAction::Restrict)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_employees_department_id")
                        .table(Employees::Table)
                        .col(Employees::DepartmentId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Employees::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Departments::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Locations::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Suppliers::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Brands::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Categories::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Categories {
        Table,
        Id,
        Name,
        Code,
        Description,
        AttributeFields,
        Active,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum Brands {
        Table,
        Id,
        Name,
        Description,
        Active,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum Suppliers {
        Table,
        Id,
        Name,
        TaxId,
        Phone,
        Email,
        Address,
        Active,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum Locations {
        Table,
        Id,
        Name,
        Building,
        Floor,
        Room,
        Description,
        Active,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum Departments {
        Table,
        Id,
        Name,
        Code,
        Description,
        Manager,
        Active,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum Employees {
        Table,
        Id,
        FullName,
        NationalId,
        Email,
        Phone,
        DepartmentId,
        JobTitle,
        HiredOn,
        LeftOn,
        Active,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000002_create_catalog_tables {
    use super::m20240101_000001_create_master_data_tables::{
        Brands, Categories, Locations, Suppliers,
    };
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_catalog_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ProductTypes::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ProductTypes::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductTypes::Name)
                                .string_len(100)
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(ProductTypes::CodePrefix)
                                .string_len(10)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(ProductTypes::Description).text().null())
                        .col(
                            ColumnDef::new(ProductTypes::AttributeSchema)
                                .json()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductTypes::LastNumber)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(ProductTypes::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(ProductTypes::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductTypes::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Products::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Products::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Products::InternalCode)
                                .string_len(20)
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(Products::SerialNumber)
                                .string_len(100)
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(Products::Barcode)
                                .string_len(50)
                                .null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Products::ProductTypeId).uuid().null())
                        .col(ColumnDef::new(Products::CategoryId).uuid().not_null())
                        .col(ColumnDef::new(Products::BrandId).uuid().not_null())
                        .col(ColumnDef::new(Products::SupplierId).uuid().null())
                        .col(ColumnDef::new(Products::LocationId).uuid().not_null())
                        .col(ColumnDef::new(Products::Model).string_len(100).not_null())
                        .col(ColumnDef::new(Products::Status).string_len(20).not_null())
                        .col(ColumnDef::new(Products::Condition).string_len(20).not_null())
                        .col(ColumnDef::new(Products::PurchaseDate).date().null())
                        .col(ColumnDef::new(Products::PurchasePrice).decimal_len(12, 2).null())
                        .col(ColumnDef::new(Products::InvoiceNumber).string_len(50).null())
                        .col(ColumnDef::new(Products::WarrantyEnd).date().null())
                        .col(ColumnDef::new(Products::Attributes).json().not_null())
                        .col(ColumnDef::new(Products::Notes).text().null())
                        .col(
                            ColumnDef::new(Products::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Products::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Products::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_products_product_type_id")
                                .from(Products::Table, Products::ProductTypeId)
                                .to(ProductTypes::Table, ProductTypes::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_products_category_id")
                                .from(Products::Table, Products::CategoryId)
                                .to(Categories::Table, Categories::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_products_brand_id")
                                .from(Products::Table, Products::BrandId)
                                .to(Brands::Table, Brands::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_products_supplier_id")
                                .from(Products::Table, Products::SupplierId)
                                .to(Suppliers::Table, Suppliers::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_products_location_id")
                                .from(Products::Table, Products::LocationId)
                                .to(Locations::Table, Locations::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .to_owned(),
                )
                .await?;

            for (name, column) in [
                ("idx_products_category_id", Products::CategoryId),
                ("idx_products_brand_id", Products::BrandId),
                ("idx_products_location_id", Products::LocationId),
                ("idx_products_status", Products::Status),
            ] {
                manager
                    .create_index(
                        Index::create()
                            .if_not_exists()
                            .name(name)
                            .table(Products::Table)
                            .col(column)
                            .to_owned(),
                    )
                    .await?;
            }

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(ProductTypes::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum ProductTypes {
        Table,
        Id,
        Name,
        CodePrefix,
        Description,
        AttributeSchema,
        LastNumber,
        Active,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum Products {
        Table,
        Id,
        InternalCode,
        SerialNumber,
        Barcode,
        ProductTypeId,
        CategoryId,
        BrandId,
        SupplierId,
        LocationId,
        Model,
        Status,
        Condition,
        PurchaseDate,
        PurchasePrice,
        InvoiceNumber,
        WarrantyEnd,
        Attributes,
        Notes,
        Active,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000003_create_stickers_table {
    use super::m20240101_000002_create_catalog_tables::Products;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_stickers_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Stickers::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Stickers::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Stickers::ProductId).uuid().not_null())
                        .col(ColumnDef::new(Stickers::Kind).string_len(20).not_null())
                        .col(
                            ColumnDef::new(Stickers::Code)
                                .string_len(120)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Stickers::Payload).text().not_null())
                        .col(ColumnDef::new(Stickers::ImagePath).string_len(255).null())
                        .col(
                            ColumnDef::new(Stickers::Printed)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(Stickers::PrintedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Stickers::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Stickers::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_stickers_product_id")
                                .from(Stickers::Table, Stickers::ProductId)
                                .to(Products::Table, Products::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stickers_product_id")
                        .table(Stickers::Table)
                        .col(Stickers::ProductId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Stickers::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Stickers {
        Table,
        Id,
        ProductId,
        Kind,
        Code,
        Payload,
        ImagePath,
        Printed,
        PrintedAt,
        Active,
        CreatedAt,
    }
}

mod m20240101_000004_create_assignment_events_table {
    use super::m20240101_000001_create_master_data_tables::{Departments, Employees};
    use super::m20240101_000002_create_catalog_tables::Products;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000004_create_assignment_events_table"
        }
    }

    /// At most one open delivery, loan or repair per product.
    const OPEN_EVENT_INDEX: &str = "CREATE UNIQUE INDEX IF NOT EXISTS ux_assignment_events_open \
         ON assignment_events (product_id) \
         WHERE closed_at IS NULL AND kind IN ('delivery', 'loan', 'repair')";

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(AssignmentEvents::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(AssignmentEvents::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(AssignmentEvents::ProductId).uuid().not_null())
                        .col(ColumnDef::new(AssignmentEvents::EmployeeId).uuid().null())
                        .col(ColumnDef::new(AssignmentEvents::DepartmentId).uuid().null())
                        .col(
                            ColumnDef::new(AssignmentEvents::Kind)
                                .string_len(20)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(AssignmentEvents::OpenedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(AssignmentEvents::ExpectedEnd)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(AssignmentEvents::ClosedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(AssignmentEvents::ConditionAtOpen)
                                .string_len(20)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(AssignmentEvents::ConditionAtClose)
                                .string_len(20)
                                .null(),
                        )
                        .col(
                            ColumnDef::new(AssignmentEvents::ReturnReason)
                                .string_len(20)
                                .null(),
                        )
                        .col(ColumnDef::new(AssignmentEvents::NotesOpen).text().null())
                        .col(ColumnDef::new(AssignmentEvents::NotesClose).text().null())
                        .col(
                            ColumnDef::new(AssignmentEvents::OpenedBy)
                                .string_len(150)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(AssignmentEvents::ClosedBy)
                                .string_len(150)
                                .null(),
                        )
                        .col(
                            ColumnDef::new(AssignmentEvents::Acknowledged)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(AssignmentEvents::AcknowledgedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(AssignmentEvents::ClosesEventId).uuid().null())
                        .col(
                            ColumnDef::new(AssignmentEvents::Voided)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(AssignmentEvents::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_assignment_events_product_id")
                                .from(AssignmentEvents::Table, AssignmentEvents::ProductId)
                                .to(Products::Table, Products::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_assignment_events_employee_id")
                                .from(AssignmentEvents::Table, AssignmentEvents::EmployeeId)
                                .to(Employees::Table, Employees::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_assignment_events_department_id")
                                .from(AssignmentEvents::Table, AssignmentEvents::DepartmentId)
                                .to(Departments::Table, Departments::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_assignment_events_closes_event_id")
                                .from(AssignmentEvents::Table, AssignmentEvents::ClosesEventId)
                                .to(AssignmentEvents::Table, AssignmentEvents::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .to_owned(),
                )
                .await?;

            for (name, column) in [
                ("idx_assignment_events_product_id", AssignmentEvents::ProductId),
                ("idx_assignment_events_employee_id", AssignmentEvents::EmployeeId),
                ("idx_assignment_events_opened_at", AssignmentEvents::OpenedAt),
            ] {
                manager
                    .create_index(
                        Index::create()
                            .if_not_exists()
                            .name(name)
                            .table(AssignmentEvents::Table)
                            .col(column)
                            .to_owned(),
                    )
                    .await?;
            }

            manager
                .get_connection()
                .execute_unprepared(OPEN_EVENT_INDEX)
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(AssignmentEvents::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum AssignmentEvents {
        Table,
        Id,
        ProductId,
        EmployeeId,
        DepartmentId,
        Kind,
        OpenedAt,
        ExpectedEnd,
        ClosedAt,
        ConditionAtOpen,
        ConditionAtClose,
        ReturnReason,
        NotesOpen,
        NotesClose,
        OpenedBy,
        ClosedBy,
        Acknowledged,
        AcknowledgedAt,
        ClosesEventId,
        Voided,
        CreatedAt,
    }
}

mod m20240101_000005_create_stock_movements_table {
    use super::m20240101_000001_create_master_data_tables::Locations;
    use super::m20240101_000002_create_catalog_tables::Products;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000005_create_stock_movements_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(StockMovements::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockMovements::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockMovements::ProductId).uuid().not_null())
                        .col(
                            ColumnDef::new(StockMovements::Kind)
                                .string_len(20)
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockMovements::FromLocationId).uuid().null())
                        .col(ColumnDef::new(StockMovements::ToLocationId).uuid().null())
                        .col(ColumnDef::new(StockMovements::Description).text().not_null())
                        .col(ColumnDef::new(StockMovements::PreviousValues).json().null())
                        .col(ColumnDef::new(StockMovements::NewValues).json().null())
                        .col(
                            ColumnDef::new(StockMovements::PerformedBy)
                                .string_len(150)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockMovements::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_stock_movements_product_id")
                                .from(StockMovements::Table, StockMovements::ProductId)
                                .to(Products::Table, Products::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_stock_movements_from_location_id")
                                .from(StockMovements::Table, StockMovements::FromLocationId)
                                .to(Locations::Table, Locations::Id)
                                .on_delete(ForeignKeyAction::SetNull),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_stock_movements_to_location_id")
                                .from(StockMovements::Table, StockMovements::ToLocationId)
                                .to(Locations::Table, Locations::Id)
                                .on_delete(ForeignKeyAction::SetNull),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_movements_product_id")
                        .table(StockMovements::Table)
                        .col(StockMovements::ProductId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StockMovements::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum StockMovements {
        Table,
        Id,
        ProductId,
        Kind,
        FromLocationId,
        ToLocationId,
        Description,
        PreviousValues,
        NewValues,
        PerformedBy,
        CreatedAt,
    }
}
