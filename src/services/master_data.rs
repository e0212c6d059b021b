use chrono::{NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::DbPool,
    entities::{
        assignment_event, brand, category, department, employee, location, product, supplier,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        attributes::{suggest_attribute_fields, AttributeField},
        code_from_name, ensure_absent, optional_text, required_text, Page, PageRequest,
    },
};

pub static NATIONAL_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{8}[A-Z]$").expect("valid national id pattern"));
static UPPER_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9]{1,10}$").expect("valid code pattern"));

/// Reference tables of the registry, named as they appear in routes
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MasterKind {
    Categories,
    Brands,
    Suppliers,
    Locations,
    Departments,
    Employees,
}

impl MasterKind {
    pub fn singular(&self) -> &'static str {
        match self {
            Self::Categories => "category",
            Self::Brands => "brand",
            Self::Suppliers => "supplier",
            Self::Locations => "location",
            Self::Departments => "department",
            Self::Employees => "employee",
        }
    }
}

/// Column accessors shared by every registry table
pub trait MasterEntity: EntityTrait {
    const KIND: MasterKind;
    fn id_column() -> Self::Column;
    fn order_column() -> Self::Column;
    fn active_column() -> Self::Column;
    fn updated_at_column() -> Self::Column;
    fn search_columns() -> Vec<Self::Column>;
}

impl MasterEntity for category::Entity {
    const KIND: MasterKind = MasterKind::Categories;
    fn id_column() -> Self::Column {
        category::Column::Id
    }
    fn order_column() -> Self::Column {
        category::Column::Name
    }
    fn active_column() -> Self::Column {
        category::Column::Active
    }
    fn updated_at_column() -> Self::Column {
        category::Column::UpdatedAt
    }
    fn search_columns() -> Vec<Self::Column> {
        vec![category::Column::Name, category::Column::Code]
    }
}

impl MasterEntity for brand::Entity {
    const KIND: MasterKind = MasterKind::Brands;
    fn id_column() -> Self::Column {
        brand::Column::Id
    }
    fn order_column() -> Self::Column {
        brand::Column::Name
    }
    fn active_column() -> Self::Column {
        brand::Column::Active
    }
    fn updated_at_column() -> Self::Column {
        brand::Column::UpdatedAt
    }
    fn search_columns() -> Vec<Self::Column> {
        vec![brand::Column::Name]
    }
}

impl MasterEntity for supplier::Entity {
    const KIND: MasterKind = MasterKind::Suppliers;
    fn id_column() -> Self::Column {
        supplier::Column::Id
    }
    fn order_column() -> Self::Column {
        supplier::Column::Name
    }
    fn active_column() -> Self::Column {
        supplier::Column::Active
    }
    fn updated_at_column() -> Self::Column {
        supplier::Column::UpdatedAt
    }
    fn search_columns() -> Vec<Self::Column> {
        vec![
            supplier::Column::Name,
            supplier::Column::TaxId,
            supplier::Column::Email,
        ]
    }
}

impl MasterEntity for location::Entity {
    const KIND: MasterKind = MasterKind::Locations;
    fn id_column() -> Self::Column {
        location::Column::Id
    }
    fn order_column() -> Self::Column {
        location::Column::Name
    }
    fn active_column() -> Self::Column {
        location::Column::Active
    }
    fn updated_at_column() -> Self::Column {
        location::Column::UpdatedAt
    }
    fn search_columns() -> Vec<Self::Column> {
        vec![
            location::Column::Name,
            location::Column::Building,
            location::Column::Room,
        ]
    }
}

impl MasterEntity for department::Entity {
    const KIND: MasterKind = MasterKind::Departments;
    fn id_column() -> Self::Column {
        department::Column::Id
    }
    fn order_column() -> Self::Column {
        department::Column::Name
    }
    fn active_column() -> Self::Column {
        department::Column::Active
    }
    fn updated_at_column() -> Self::Column {
        department::Column::UpdatedAt
    }
    fn search_columns() -> Vec<Self::Column> {
        vec![department::Column::Name, department::Column::Code]
    }
}

impl MasterEntity for employee::Entity {
    const KIND: MasterKind = MasterKind::Employees;
    fn id_column() -> Self::Column {
        employee::Column::Id
    }
    fn order_column() -> Self::Column {
        employee::Column::FullName
    }
    fn active_column() -> Self::Column {
        employee::Column::Active
    }
    fn updated_at_column() -> Self::Column {
        employee::Column::UpdatedAt
    }
    fn search_columns() -> Vec<Self::Column> {
        vec![
            employee::Column::FullName,
            employee::Column::NationalId,
            employee::Column::Email,
            employee::Column::JobTitle,
        ]
    }
}

/// Filters accepted by every registry list endpoint
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MasterListQuery {
    /// Free-text search over names and codes
    pub search: Option<String>,
    pub active: Option<bool>,
    /// Employees only: restrict to one department
    pub department_id: Option<Uuid>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

impl MasterListQuery {
    fn search_term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CategoryInput {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    /// Generated from the name when omitted
    #[validate(regex = "UPPER_CODE")]
    pub code: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub attribute_fields: Vec<String>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct BrandInput {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub description: Option<String>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct SupplierInput {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(max = 20))]
    pub tax_id: Option<String>,
    #[validate(length(max = 20))]
    pub phone: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub address: Option<String>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct LocationInput {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(max = 100))]
    pub building: Option<String>,
    #[validate(length(max = 20))]
    pub floor: Option<String>,
    #[validate(length(max = 50))]
    pub room: Option<String>,
    pub description: Option<String>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct DepartmentInput {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    /// Generated from the name when omitted
    #[validate(regex = "UPPER_CODE")]
    pub code: Option<String>,
    pub description: Option<String>,
    #[validate(length(max = 100))]
    pub manager: Option<String>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct EmployeeInput {
    #[validate(length(min = 1, max = 200))]
    pub full_name: String,
    /// 8 digits followed by an upper-case letter
    #[validate(regex = "NATIONAL_ID")]
    #[schema(example = "12345678Z")]
    pub national_id: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(max = 20))]
    pub phone: Option<String>,
    pub department_id: Uuid,
    #[validate(length(max = 100))]
    pub job_title: Option<String>,
    pub hired_on: Option<NaiveDate>,
    pub left_on: Option<NaiveDate>,
    pub active: Option<bool>,
}

/// Attribute fields suggested for a category
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AttributeSuggestion {
    pub category_id: Uuid,
    pub category_name: String,
    /// Equipment family detected from the category name
    pub detected_family: String,
    pub fields: Vec<AttributeField>,
}

/// Registry of categories, brands, suppliers, locations, departments and employees
#[derive(Clone)]
pub struct MasterDataService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl MasterDataService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    // ---- generic operations -------------------------------------------------

    /// Fetches a registry row by id
    pub async fn get<E>(&self, id: Uuid) -> Result<E::Model, ServiceError>
    where
        E: MasterEntity,
    {
        find_master::<E, _>(&*self.db_pool, id).await
    }

    /// Lists registry rows ordered by name
    #[instrument(skip(self))]
    pub async fn list<E>(
        &self,
        query: &MasterListQuery,
        page: PageRequest,
    ) -> Result<Page<E::Model>, ServiceError>
    where
        E: MasterEntity,
        E::Model: Sync,
    {
        let db = &*self.db_pool;
        let mut select = E::find();

        if let Some(term) = query.search_term() {
            let mut any = Condition::any();
            for column in E::search_columns() {
                any = any.add(column.contains(term));
            }
            select = select.filter(any);
        }
        if let Some(active) = query.active {
            select = select.filter(E::active_column().eq(active));
        }

        let paginator = select.order_by_asc(E::order_column()).paginate(db, page.limit);
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.index()).await?;

        Ok(Page::new(items, total, page))
    }

    /// Flips the `active` flag
    #[instrument(skip(self))]
    pub async fn toggle_active<E>(&self, id: Uuid) -> Result<E::Model, ServiceError>
    where
        E: MasterEntity,
    {
        let db = &*self.db_pool;
        let current = find_master::<E, _>(db, id).await?;
        let active = matches!(
            sea_orm::ModelTrait::get(&current, E::active_column()),
            sea_orm::Value::Bool(Some(true))
        );

        E::update_many()
            .col_expr(E::active_column(), Expr::value(!active))
            .col_expr(E::updated_at_column(), Expr::value(Utc::now()))
            .filter(E::id_column().eq(id))
            .exec(db)
            .await?;

        self.event_sender
            .send_or_log(Event::MasterDataUpdated {
                kind: E::KIND.to_string(),
                id,
            })
            .await;
        info!(kind = %E::KIND, %id, active = !active, "Toggled active flag");

        find_master::<E, _>(db, id).await
    }

    /// Deletes a registry row that nothing references
    #[instrument(skip(self))]
    pub async fn delete<E>(&self, id: Uuid) -> Result<(), ServiceError>
    where
        E: MasterEntity,
    {
        let db = &*self.db_pool;
        find_master::<E, _>(db, id).await?;
        self.ensure_unreferenced(E::KIND, id).await?;

        E::delete_many()
            .filter(E::id_column().eq(id))
            .exec(db)
            .await?;

        self.event_sender
            .send_or_log(Event::MasterDataDeleted {
                kind: E::KIND.to_string(),
                id,
            })
            .await;
        info!(kind = %E::KIND, %id, "Deleted registry entry");
        Ok(())
    }

    /// Rejects deletion while products, employees or ledger events point at `id`
    async fn ensure_unreferenced(&self, kind: MasterKind, id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;

        let product_column = match kind {
            MasterKind::Categories => Some(product::Column::CategoryId),
            MasterKind::Brands => Some(product::Column::BrandId),
            MasterKind::Suppliers => Some(product::Column::SupplierId),
            MasterKind::Locations => Some(product::Column::LocationId),
            MasterKind::Departments | MasterKind::Employees => None,
        };

        if let Some(column) = product_column {
            let count = product::Entity::find()
                .filter(column.eq(id))
                .count(db)
                .await?;
            if count > 0 {
                return Err(ServiceError::Conflict(format!(
                    "{} is referenced by {count} product(s)",
                    kind.singular()
                )));
            }
        }

        if kind == MasterKind::Departments {
            let employees = employee::Entity::find()
                .filter(employee::Column::DepartmentId.eq(id))
                .count(db)
                .await?;
            if employees > 0 {
                return Err(ServiceError::Conflict(format!(
                    "department has {employees} employee(s)"
                )));
            }
        }

        let event_column = match kind {
            MasterKind::Departments => Some(assignment_event::Column::DepartmentId),
            MasterKind::Employees => Some(assignment_event::Column::EmployeeId),
            _ => None,
        };

        if let Some(column) = event_column {
            let events = assignment_event::Entity::find()
                .filter(column.eq(id))
                .count(db)
                .await?;
            if events > 0 {
                return Err(ServiceError::Conflict(format!(
                    "{} is referenced by {events} assignment event(s)",
                    kind.singular()
                )));
            }
        }

        Ok(())
    }

    async fn publish_created(&self, kind: MasterKind, id: Uuid) {
        self.event_sender
            .send_or_log(Event::MasterDataCreated {
                kind: kind.to_string(),
                id,
            })
            .await;
    }

    async fn publish_updated(&self, kind: MasterKind, id: Uuid) {
        self.event_sender
            .send_or_log(Event::MasterDataUpdated {
                kind: kind.to_string(),
                id,
            })
            .await;
    }

    // ---- categories ---------------------------------------------------------

    #[instrument(skip(self, input))]
    pub async fn create_category(&self, input: CategoryInput) -> Result<category::Model, ServiceError> {
        input.validate()?;
        let db = &*self.db_pool;
        let name = required_text(&input.name, "name")?;

        ensure_absent(
            db,
            category::Entity::find().filter(category::Column::Name.eq(name.as_str())),
            || format!("category '{name}' already exists"),
        )
        .await?;

        let code = match optional_text(input.code) {
            Some(code) => {
                let code = code.to_ascii_uppercase();
                ensure_absent(
                    db,
                    category::Entity::find().filter(category::Column::Code.eq(code.as_str())),
                    || format!("category code '{code}' already exists"),
                )
                .await?;
                code
            }
            None => {
                free_code(db, &name, |candidate| {
                    category::Entity::find().filter(category::Column::Code.eq(candidate))
                })
                .await?
            }
        };

        let model = category::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name),
            code: Set(code),
            description: Set(optional_text(input.description)),
            attribute_fields: Set(serde_json::json!(clean_field_names(input.attribute_fields))),
            active: Set(input.active.unwrap_or(true)),
            ..Default::default()
        }
        .insert(db)
        .await?;

        self.publish_created(MasterKind::Categories, model.id).await;
        info!(category_id = %model.id, code = %model.code, "Category created");
        Ok(model)
    }

    #[instrument(skip(self, input))]
    pub async fn update_category(
        &self,
        id: Uuid,
        input: CategoryInput,
    ) -> Result<category::Model, ServiceError> {
        input.validate()?;
        let db = &*self.db_pool;
        let existing = find_master::<category::Entity, _>(db, id).await?;
        let name = required_text(&input.name, "name")?;

        ensure_absent(
            db,
            category::Entity::find()
                .filter(category::Column::Name.eq(name.as_str()))
                .filter(category::Column::Id.ne(id)),
            || format!("category '{name}' already exists"),
        )
        .await?;

        let code = optional_text(input.code)
            .map(|c| c.to_ascii_uppercase())
            .unwrap_or_else(|| existing.code.clone());
        ensure_absent(
            db,
            category::Entity::find()
                .filter(category::Column::Code.eq(code.as_str()))
                .filter(category::Column::Id.ne(id)),
            || format!("category code '{code}' already exists"),
        )
        .await?;

        let mut model: category::ActiveModel = existing.into();
        model.name = Set(name);
        model.code = Set(code);
        model.description = Set(optional_text(input.description));
        model.attribute_fields = Set(serde_json::json!(clean_field_names(input.attribute_fields)));
        if let Some(active) = input.active {
            model.active = Set(active);
        }
        let model = model.update(db).await?;

        self.publish_updated(MasterKind::Categories, id).await;
        Ok(model)
    }

    /// Suggests custom attribute fields for products of a category
    pub async fn suggest_attribute_fields(
        &self,
        category_id: Uuid,
    ) -> Result<AttributeSuggestion, ServiceError> {
        let category = find_master::<category::Entity, _>(&*self.db_pool, category_id).await?;
        let (family, fields) = suggest_attribute_fields(&category.name);

        Ok(AttributeSuggestion {
            category_id,
            category_name: category.name,
            detected_family: family.to_string(),
            fields,
        })
    }

    // ---- brands -------------------------------------------------------------

    #[instrument(skip(self, input))]
    pub async fn create_brand(&self, input: BrandInput) -> Result<brand::Model, ServiceError> {
        input.validate()?;
        let db = &*self.db_pool;
        let name = required_text(&input.name, "name")?;

        ensure_absent(
            db,
            brand::Entity::find().filter(brand::Column::Name.eq(name.as_str())),
            || format!("brand '{name}' already exists"),
        )
        .await?;

        let model = brand::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name),
            description: Set(optional_text(input.description)),
            active: Set(input.active.unwrap_or(true)),
            ..Default::default()
        }
        .insert(db)
        .await?;

        self.publish_created(MasterKind::Brands, model.id).await;
        Ok(model)
    }

    #[instrument(skip(self, input))]
    pub async fn update_brand(&self, id: Uuid, input: BrandInput) -> Result<brand::Model, ServiceError> {
        input.validate()?;
        let db = &*self.db_pool;
        let existing = find_master::<brand::Entity, _>(db, id).await?;
        let name = required_text(&input.name, "name")?;

        ensure_absent(
            db,
            brand::Entity::find()
                .filter(brand::Column::Name.eq(name.as_str()))
                .filter(brand::Column::Id.ne(id)),
            || format!("brand '{name}' already exists"),
        )
        .await?;

        let mut model: brand::ActiveModel = existing.into();
        model.name = Set(name);
        model.description = Set(optional_text(input.description));
        if let Some(active) = input.active {
            model.active = Set(active);
        }
        let model = model.update(db).await?;

        self.publish_updated(MasterKind::Brands, id).await;
        Ok(model)
    }

    // ---- suppliers ----------------------------------------------------------

    #[instrument(skip(self, input))]
    pub async fn create_supplier(&self, input: SupplierInput) -> Result<supplier::Model, ServiceError> {
        input.validate()?;
        let db = &*self.db_pool;
        let name = required_text(&input.name, "name")?;
        let tax_id = optional_text(input.tax_id).map(|t| t.to_ascii_uppercase());

        self.check_supplier_unique(&name, tax_id.as_deref(), None).await?;

        let model = supplier::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name),
            tax_id: Set(tax_id),
            phone: Set(optional_text(input.phone)),
            email: Set(optional_text(input.email)),
            address: Set(optional_text(input.address)),
            active: Set(input.active.unwrap_or(true)),
            ..Default::default()
        }
        .insert(db)
        .await?;

        self.publish_created(MasterKind::Suppliers, model.id).await;
        Ok(model)
    }

    #[instrument(skip(self, input))]
    pub async fn update_supplier(
        &self,
        id: Uuid,
        input: SupplierInput,
    ) -> Result<supplier::Model, ServiceError> {
        input.validate()?;
        let db = &*self.db_pool;
        let existing = find_master::<supplier::Entity, _>(db, id).await?;
        let name = required_text(&input.name, "name")?;
        let tax_id = optional_text(input.tax_id).map(|t| t.to_ascii_uppercase());

        self.check_supplier_unique(&name, tax_id.as_deref(), Some(id))
            .await?;

        let mut model: supplier::ActiveModel = existing.into();
        model.name = Set(name);
        model.tax_id = Set(tax_id);
        model.phone = Set(optional_text(input.phone));
        model.email = Set(optional_text(input.email));
        model.address = Set(optional_text(input.address));
        if let Some(active) = input.active {
            model.active = Set(active);
        }
        let model = model.update(db).await?;

        self.publish_updated(MasterKind::Suppliers, id).await;
        Ok(model)
    }

    async fn check_supplier_unique(
        &self,
        name: &str,
        tax_id: Option<&str>,
        exclude: Option<Uuid>,
    ) -> Result<(), ServiceError> {
        let db = &*self.db_pool;
        let not_self = |select: sea_orm::Select<supplier::Entity>| match exclude {
            Some(id) => select.filter(supplier::Column::Id.ne(id)),
            None => select,
        };

        ensure_absent(
            db,
            not_self(supplier::Entity::find().filter(supplier::Column::Name.eq(name))),
            || format!("supplier '{name}' already exists"),
        )
        .await?;

        if let Some(tax_id) = tax_id {
            ensure_absent(
                db,
                not_self(supplier::Entity::find().filter(supplier::Column::TaxId.eq(tax_id))),
                || format!("a supplier with tax id '{tax_id}' already exists"),
            )
            .await?;
        }

        Ok(())
    }

    // ---- locations ----------------------------------------------------------

    #[instrument(skip(self, input))]
    pub async fn create_location(&self, input: LocationInput) -> Result<location::Model, ServiceError> {
        input.validate()?;
        let db = &*self.db_pool;
        let name = required_text(&input.name, "name")?;

        ensure_absent(
            db,
            location::Entity::find().filter(location::Column::Name.eq(name.as_str())),
            || format!("location '{name}' already exists"),
        )
        .await?;

        let model = location::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name),
            building: Set(optional_text(input.building)),
            floor: Set(optional_text(input.floor)),
            room: Set(optional_text(input.room)),
            description: Set(optional_text(input.description)),
            active: Set(input.active.unwrap_or(true)),
            ..Default::default()
        }
        .insert(db)
        .await?;

        self.publish_created(MasterKind::Locations, model.id).await;
        Ok(model)
    }

    #[instrument(skip(self, input))]
    pub async fn update_location(
        &self,
        id: Uuid,
        input: LocationInput,
    ) -> Result<location::Model, ServiceError> {
        input.validate()?;
        let db = &*self.db_pool;
        let existing = find_master::<location::Entity, _>(db, id).await?;
        let name = required_text(&input.name, "name")?;

        ensure_absent(
            db,
            location::Entity::find()
                .filter(location::Column::Name.eq(name.as_str()))
                .filter(location::Column::Id.ne(id)),
            || format!("location '{name}' already exists"),
        )
        .await?;

        let mut model: location::ActiveModel = existing.into();
        model.name = Set(name);
        model.building = Set(optional_text(input.building));
        model.floor = Set(optional_text(input.floor));
        model.room = Set(optional_text(input.room));
        model.description = Set(optional_text(input.description));
        if let Some(active) = input.active {
            model.active = Set(active);
        }
        let model = model.update(db).await?;

        self.publish_updated(MasterKind::Locations, id).await;
        Ok(model)
    }

    // ---- departments --------------------------------------------------------

    #[instrument(skip(self, input))]
    pub async fn create_department(
        &self,
        input: DepartmentInput,
    ) -> Result<department::Model, ServiceError> {
        input.validate()?;
        let db = &*self.db_pool;
        let name = required_text(&input.name, "name")?;

        ensure_absent(
            db,
            department::Entity::find().filter(department::Column::Name.eq(name.as_str())),
            || format!("department '{name}' already exists"),
        )
        .await?;

        let code = match optional_text(input.code) {
            Some(code) => {
                let code = code.to_ascii_uppercase();
                ensure_absent(
                    db,
                    department::Entity::find().filter(department::Column::Code.eq(code.as_str())),
                    || format!("department code '{code}' already exists"),
                )
                .await?;
                code
            }
            None => {
                free_code(db, &name, |candidate| {
                    department::Entity::find().filter(department::Column::Code.eq(candidate))
                })
                .await?
            }
        };

        let model = department::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name),
            code: Set(code),
            description: Set(optional_text(input.description)),
            manager: Set(optional_text(input.manager)),
            active: Set(input.active.unwrap_or(true)),
            ..Default::default()
        }
        .insert(db)
        .await?;

        self.publish_created(MasterKind::Departments, model.id).await;
        info!(department_id = %model.id, code = %model.code, "Department created");
        Ok(model)
    }

    #[instrument(skip(self, input))]
    pub async fn update_department(
        &self,
        id: Uuid,
        input: DepartmentInput,
    ) -> Result<department::Model, ServiceError> {
        input.validate()?;
        let db = &*self.db_pool;
        let existing = find_master::<department::Entity, _>(db, id).await?;
        let name = required_text(&input.name, "name")?;

        ensure_absent(
            db,
            department::Entity::find()
                .filter(department::Column::Name.eq(name.as_str()))
                .filter(department::Column::Id.ne(id)),
            || format!("department '{name}' already exists"),
        )
        .await?;

        let code = optional_text(input.code)
            .map(|c| c.to_ascii_uppercase())
            .unwrap_or_else(|| existing.code.clone());
        ensure_absent(
            db,
            department::Entity::find()
                .filter(department::Column::Code.eq(code.as_str()))
                .filter(department::Column::Id.ne(id)),
            || format!("department code '{code}' already exists"),
        )
        .await?;

        let mut model: department::ActiveModel = existing.into();
        model.name = Set(name);
        model.code = Set(code);
        model.description = Set(optional_text(input.description));
        model.manager = Set(optional_text(input.manager));
        if let Some(active) = input.active {
            model.active = Set(active);
        }
        let model = model.update(db).await?;

        self.publish_updated(MasterKind::Departments, id).await;
        Ok(model)
    }

    /// Employees of a department, ordered by name
    pub async fn list_department_employees(
        &self,
        department_id: Uuid,
    ) -> Result<Vec<employee::Model>, ServiceError> {
        let db = &*self.db_pool;
        find_master::<department::Entity, _>(db, department_id).await?;

        Ok(employee::Entity::find()
            .filter(employee::Column::DepartmentId.eq(department_id))
            .order_by_asc(employee::Column::FullName)
            .all(db)
            .await?)
    }

    // ---- employees ----------------------------------------------------------

    /// Lists employees, optionally restricted to one department
    pub async fn list_employees(
        &self,
        query: &MasterListQuery,
        page: PageRequest,
    ) -> Result<Page<employee::Model>, ServiceError> {
        let Some(department_id) = query.department_id else {
            return self.list::<employee::Entity>(query, page).await;
        };

        let db = &*self.db_pool;
        let mut select =
            employee::Entity::find().filter(employee::Column::DepartmentId.eq(department_id));
        if let Some(term) = query.search_term() {
            let mut any = Condition::any();
            for column in employee::Entity::search_columns() {
                any = any.add(column.contains(term));
            }
            select = select.filter(any);
        }
        if let Some(active) = query.active {
            select = select.filter(employee::Column::Active.eq(active));
        }

        let paginator = select
            .order_by_asc(employee::Column::FullName)
            .paginate(db, page.limit);
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.index()).await?;
        Ok(Page::new(items, total, page))
    }

    #[instrument(skip(self, input))]
    pub async fn create_employee(&self, input: EmployeeInput) -> Result<employee::Model, ServiceError> {
        input.validate()?;
        let db = &*self.db_pool;
        let full_name = required_text(&input.full_name, "full_name")?;
        let email = input.email.trim().to_lowercase();

        self.check_employee(&input, &email, None).await?;

        let model = employee::ActiveModel {
            id: Set(Uuid::new_v4()),
            full_name: Set(full_name),
            national_id: Set(input.national_id.clone()),
            email: Set(email),
            phone: Set(optional_text(input.phone)),
            department_id: Set(input.department_id),
            job_title: Set(optional_text(input.job_title)),
            hired_on: Set(input.hired_on),
            left_on: Set(input.left_on),
            active: Set(input.active.unwrap_or(true)),
            ..Default::default()
        }
        .insert(db)
        .await?;

        self.publish_created(MasterKind::Employees, model.id).await;
        info!(employee_id = %model.id, "Employee created");
        Ok(model)
    }

    #[instrument(skip(self, input))]
    pub async fn update_employee(
        &self,
        id: Uuid,
        input: EmployeeInput,
    ) -> Result<employee::Model, ServiceError> {
        input.validate()?;
        let db = &*self.db_pool;
        let existing = find_master::<employee::Entity, _>(db, id).await?;
        let full_name = required_text(&input.full_name, "full_name")?;
        let email = input.email.trim().to_lowercase();

        self.check_employee(&input, &email, Some(id)).await?;

        let mut model: employee::ActiveModel = existing.into();
        model.full_name = Set(full_name);
        model.national_id = Set(input.national_id.clone());
        model.email = Set(email);
        model.phone = Set(optional_text(input.phone));
        model.department_id = Set(input.department_id);
        model.job_title = Set(optional_text(input.job_title));
        model.hired_on = Set(input.hired_on);
        model.left_on = Set(input.left_on);
        if let Some(active) = input.active {
            model.active = Set(active);
        }
        let model = model.update(db).await?;

        self.publish_updated(MasterKind::Employees, id).await;
        Ok(model)
    }

    async fn check_employee(
        &self,
        input: &EmployeeInput,
        email: &str,
        exclude: Option<Uuid>,
    ) -> Result<(), ServiceError> {
        let db = &*self.db_pool;

        if let (Some(hired), Some(left)) = (input.hired_on, input.left_on) {
            if left < hired {
                return Err(ServiceError::ValidationError(
                    "left_on cannot precede hired_on".into(),
                ));
            }
        }

        let department = department::Entity::find_by_id(input.department_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("department", input.department_id))?;
        if !department.active && exclude.is_none() {
            return Err(ServiceError::InvalidOperation(format!(
                "department '{}' is inactive",
                department.name
            )));
        }

        let not_self = |select: sea_orm::Select<employee::Entity>| match exclude {
            Some(id) => select.filter(employee::Column::Id.ne(id)),
            None => select,
        };

        ensure_absent(
            db,
            not_self(
                employee::Entity::find()
                    .filter(employee::Column::NationalId.eq(input.national_id.as_str())),
            ),
            || format!("an employee with national id '{}' already exists", input.national_id),
        )
        .await?;

        ensure_absent(
            db,
            not_self(employee::Entity::find().filter(employee::Column::Email.eq(email))),
            || format!("an employee with email '{email}' already exists"),
        )
        .await
    }
}

async fn find_master<E, C>(db: &C, id: Uuid) -> Result<E::Model, ServiceError>
where
    E: MasterEntity,
    C: ConnectionTrait,
{
    E::find()
        .filter(E::id_column().eq(id))
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::not_found(E::KIND.singular(), id))
}

/// First free code derived from `name`: `HUMANR`, then `HUMANR1`, `HUMANR2`...
async fn free_code<E, C, F>(db: &C, name: &str, lookup: F) -> Result<String, ServiceError>
where
    E: EntityTrait,
    E::Model: Sync,
    C: ConnectionTrait,
    F: Fn(&str) -> sea_orm::Select<E>,
{
    let base = code_from_name(name);
    let mut candidate = base.clone();
    let mut counter = 1;

    while lookup(&candidate).count(db).await? > 0 {
        candidate = format!("{base}{counter}");
        counter += 1;
    }

    Ok(candidate)
}

fn clean_field_names(fields: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for field in fields {
        let field = field.trim().to_string();
        if !field.is_empty() && !out.contains(&field) {
            out.push(field);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn national_id_pattern() {
        assert!(NATIONAL_ID.is_match("12345678Z"));
        assert!(!NATIONAL_ID.is_match("1234567Z"));
        assert!(!NATIONAL_ID.is_match("12345678z"));
        assert!(!NATIONAL_ID.is_match("X2345678Z"));
    }

    #[test]
    fn employee_input_validation() {
        let mut input = EmployeeInput {
            full_name: "Ana Ruiz".into(),
            national_id: "12345678Z".into(),
            email: "ana@example.com".into(),
            phone: None,
            department_id: Uuid::new_v4(),
            job_title: None,
            hired_on: None,
            left_on: None,
            active: None,
        };
        assert!(input.validate().is_ok());

        input.national_id = "123".into();
        input.email = "not-an-email".into();
        let errors = input.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("national_id"));
        assert!(errors.field_errors().contains_key("email"));
    }

    #[test]
    fn kinds_serialize_as_route_segments() {
        assert_eq!(
            serde_json::to_value(MasterKind::Departments).unwrap(),
            "departments"
        );
        assert_eq!(MasterKind::Employees.to_string(), "employees");
        assert_eq!(MasterKind::Categories.singular(), "category");
    }

    #[test]
    fn field_names_are_trimmed_and_deduplicated() {
        assert_eq!(
            clean_field_names(vec![" ram ".into(), "".into(), "ram".into(), "cpu".into()]),
            vec!["ram".to_string(), "cpu".to_string()]
        );
    }
}
