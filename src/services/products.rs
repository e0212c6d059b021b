use chrono::{DateTime, Datelike, NaiveDate, Utc};
use metrics::counter;
use rand::Rng;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{sync::Arc, time::Instant};
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::{self, DbPool},
    entities::{
        brand, category, department, employee, location, product, product_type,
        stock_movement, supplier, EventKind, MovementKind, ProductCondition, ProductStatus,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        assignments::open_event, attributes, optional_text, product_types::next_serial,
        stickers, Page, PageRequest,
    },
};

const CODE_ATTEMPTS: usize = 20;

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ProductInput {
    /// Serial numbers are taken from the type counter when a type is given
    pub product_type_id: Option<Uuid>,
    /// Explicit serial number; generated when omitted
    #[validate(length(min = 1, max = 100))]
    pub serial_number: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub barcode: Option<String>,
    pub category_id: Uuid,
    pub brand_id: Uuid,
    pub supplier_id: Option<Uuid>,
    pub location_id: Uuid,
    #[validate(length(min = 1, max = 200))]
    pub model: String,
    pub condition: Option<ProductCondition>,
    pub purchase_date: Option<NaiveDate>,
    #[schema(value_type = Option<String>, example = "899.90")]
    pub purchase_price: Option<Decimal>,
    #[validate(length(max = 50))]
    pub invoice_number: Option<String>,
    pub warranty_end: Option<NaiveDate>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub attributes: Value,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ConditionUpdate {
    pub condition: ProductCondition,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AttributesUpdate {
    #[schema(value_type = Object)]
    pub attributes: Value,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct RetireRequest {
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProductQuery {
    /// Matches serial, model, internal code and barcode
    pub search: Option<String>,
    pub product_type_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub brand_id: Option<Uuid>,
    pub supplier_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
    pub status: Option<ProductStatus>,
    pub condition: Option<ProductCondition>,
    /// Soft-deleted products are hidden unless set
    pub include_inactive: Option<bool>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MovementQuery {
    pub product_id: Option<Uuid>,
    pub kind: Option<MovementKind>,
    /// Matches the description and the performing user
    pub search: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct StatusCounts {
    pub available: u64,
    pub assigned: u64,
    pub under_repair: u64,
    pub retired: u64,
    pub total: u64,
}

/// Where a product is right now
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(tag = "holder", rename_all = "snake_case")]
pub enum CurrentHolder {
    Employee {
        event_id: Uuid,
        kind: EventKind,
        employee_id: Option<Uuid>,
        employee_name: Option<String>,
        department_id: Option<Uuid>,
        department_name: Option<String>,
        since: DateTime<Utc>,
        expected_end: Option<DateTime<Utc>>,
    },
    Repair {
        event_id: Uuid,
        since: DateTime<Utc>,
    },
    Location {
        location_id: Uuid,
        location_name: String,
    },
}

/// Product catalog
#[derive(Clone)]
pub struct ProductService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl ProductService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Registers a product, allocating its serial number and internal code
    #[instrument(skip(self, input))]
    pub async fn create_product(
        &self,
        input: ProductInput,
        actor: &str,
    ) -> Result<product::Model, ServiceError> {
        input.validate()?;
        let started = Instant::now();
        let txn = self.db_pool.begin().await?;

        let refs = References::load(&txn, &input).await?;
        let attributes = refs.validate_attributes(&input.attributes)?;
        let barcode = optional_text(input.barcode.clone());
        if let Some(barcode) = &barcode {
            ensure_barcode_free(&txn, barcode, None).await?;
        }

        let serial_number = match optional_text(input.serial_number.clone()) {
            Some(serial) => {
                let serial = serial.to_ascii_uppercase();
                ensure_serial_free(&txn, &serial, None).await?;
                serial
            }
            None => match &refs.product_type {
                Some(kind) => next_serial(&txn, kind.id).await?,
                None => random_serial(&txn, &refs.category.code).await?,
            },
        };
        let internal_code = random_internal_code(&txn, &refs.category.code).await?;

        let model = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            internal_code: Set(internal_code),
            serial_number: Set(serial_number),
            barcode: Set(barcode),
            product_type_id: Set(input.product_type_id),
            category_id: Set(input.category_id),
            brand_id: Set(input.brand_id),
            supplier_id: Set(input.supplier_id),
            location_id: Set(input.location_id),
            model: Set(input.model.trim().to_string()),
            status: Set(ProductStatus::Available),
            condition: Set(input.condition.unwrap_or(ProductCondition::New)),
            purchase_date: Set(input.purchase_date),
            purchase_price: Set(input.purchase_price),
            invoice_number: Set(optional_text(input.invoice_number)),
            warranty_end: Set(input.warranty_end),
            attributes: Set(attributes),
            notes: Set(optional_text(input.notes)),
            active: Set(true),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        record_movement(
            &txn,
            Movement::new(model.id, MovementKind::Registered, actor)
                .to(Some(model.location_id))
                .describe(format!(
                    "Registered {} {} ({})",
                    refs.brand.name, model.model, model.serial_number
                )),
        )
        .await?;

        db::commit(txn, "create_product", started).await?;

        counter!("assettrack.products.registered", 1);
        self.event_sender
            .send_or_log(Event::ProductRegistered(model.id))
            .await;
        info!(
            product_id = %model.id,
            serial = %model.serial_number,
            internal_code = %model.internal_code,
            "Product registered"
        );
        Ok(model)
    }

    pub async fn get_product(&self, id: Uuid) -> Result<product::Model, ServiceError> {
        find_product(&*self.db_pool, id).await
    }

    #[instrument(skip(self))]
    pub async fn list_products(
        &self,
        query: &ProductQuery,
        page: PageRequest,
    ) -> Result<Page<product::Model>, ServiceError> {
        let paginator = filter_products(query)
            .order_by_desc(product::Column::CreatedAt)
            .paginate(&*self.db_pool, page.limit);
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.index()).await?;
        Ok(Page::new(items, total, page))
    }

    /// Number of active products per status
    pub async fn status_counts(&self) -> Result<StatusCounts, ServiceError> {
        let db = &*self.db_pool;
        let count = |status: ProductStatus| {
            product::Entity::find()
                .filter(product::Column::Active.eq(true))
                .filter(product::Column::Status.eq(status))
                .count(db)
        };

        let counts = StatusCounts {
            available: count(ProductStatus::Available).await?,
            assigned: count(ProductStatus::Assigned).await?,
            under_repair: count(ProductStatus::UnderRepair).await?,
            retired: count(ProductStatus::Retired).await?,
            total: 0,
        };
        Ok(StatusCounts {
            total: counts.available + counts.assigned + counts.under_repair + counts.retired,
            ..counts
        })
    }

    /// Replaces the editable fields of a product. Status is owned by the ledger.
    #[instrument(skip(self, input))]
    pub async fn update_product(
        &self,
        id: Uuid,
        input: ProductInput,
        actor: &str,
    ) -> Result<product::Model, ServiceError> {
        input.validate()?;
        let started = Instant::now();
        let txn = self.db_pool.begin().await?;
        let existing = find_product(&txn, id).await?;
        if existing.status == ProductStatus::Retired
            && input.condition.is_some_and(|c| c != existing.condition)
        {
            return Err(ServiceError::InvalidOperation(
                "retired products cannot change condition".into(),
            ));
        }

        let refs = References::load(&txn, &input).await?;
        let attributes = refs.validate_attributes(&input.attributes)?;

        let barcode = optional_text(input.barcode.clone());
        if let Some(barcode) = &barcode {
            ensure_barcode_free(&txn, barcode, Some(id)).await?;
        }
        let serial_number = match optional_text(input.serial_number.clone()) {
            Some(serial) => {
                let serial = serial.to_ascii_uppercase();
                ensure_serial_free(&txn, &serial, Some(id)).await?;
                serial
            }
            None => existing.serial_number.clone(),
        };

        let mut model: product::ActiveModel = existing.clone().into();
        model.serial_number = Set(serial_number);
        model.barcode = Set(barcode);
        model.product_type_id = Set(input.product_type_id);
        model.category_id = Set(input.category_id);
        model.brand_id = Set(input.brand_id);
        model.supplier_id = Set(input.supplier_id);
        model.location_id = Set(input.location_id);
        model.model = Set(input.model.trim().to_string());
        if let Some(condition) = input.condition {
            model.condition = Set(condition);
        }
        model.purchase_date = Set(input.purchase_date);
        model.purchase_price = Set(input.purchase_price);
        model.invoice_number = Set(optional_text(input.invoice_number));
        model.warranty_end = Set(input.warranty_end);
        model.attributes = Set(attributes);
        model.notes = Set(optional_text(input.notes));
        let updated = model.update(&txn).await?;

        if updated.serial_number != existing.serial_number {
            let moved = stickers::rekey_for_serial(&txn, id, &updated.serial_number).await?;
            if moved > 0 {
                info!(%id, moved, serial = %updated.serial_number, "Stickers re-keyed to the new serial");
            }
        }
        record_changes(&txn, &existing, &updated, actor).await?;
        db::commit(txn, "update_product", started).await?;

        self.event_sender
            .send_or_log(Event::ProductUpdated(id))
            .await;
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn update_condition(
        &self,
        id: Uuid,
        condition: ProductCondition,
        actor: &str,
    ) -> Result<product::Model, ServiceError> {
        let started = Instant::now();
        let txn = self.db_pool.begin().await?;
        let existing = find_product(&txn, id).await?;
        if existing.status == ProductStatus::Retired {
            return Err(ServiceError::InvalidOperation(
                "retired products cannot change condition".into(),
            ));
        }

        let mut model: product::ActiveModel = existing.clone().into();
        model.condition = Set(condition);
        let updated = model.update(&txn).await?;

        record_changes(&txn, &existing, &updated, actor).await?;
        db::commit(txn, "update_condition", started).await?;

        self.event_sender
            .send_or_log(Event::ProductUpdated(id))
            .await;
        Ok(updated)
    }

    /// Replaces the custom attributes, validated against the product type
    #[instrument(skip(self, attributes))]
    pub async fn update_attributes(
        &self,
        id: Uuid,
        attributes: Value,
        actor: &str,
    ) -> Result<product::Model, ServiceError> {
        let started = Instant::now();
        let txn = self.db_pool.begin().await?;
        let existing = find_product(&txn, id).await?;

        let schema = match existing.product_type_id {
            Some(type_id) => {
                let kind = product_type::Entity::find_by_id(type_id)
                    .one(&txn)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("product type", type_id))?;
                attributes::parse_schema(&kind.attribute_schema)?
            }
            None => Vec::new(),
        };
        let attributes = attributes::validate_attributes(&schema, &attributes)?;

        let mut model: product::ActiveModel = existing.clone().into();
        model.attributes = Set(attributes);
        let updated = model.update(&txn).await?;

        record_changes(&txn, &existing, &updated, actor).await?;
        db::commit(txn, "update_attributes", started).await?;

        self.event_sender
            .send_or_log(Event::ProductUpdated(id))
            .await;
        Ok(updated)
    }

    /// Takes a product out of service for good
    #[instrument(skip(self))]
    pub async fn retire_product(
        &self,
        id: Uuid,
        notes: Option<String>,
        actor: &str,
    ) -> Result<product::Model, ServiceError> {
        let started = Instant::now();
        let txn = self.db_pool.begin().await?;
        let existing = find_product(&txn, id).await?;

        if existing.status == ProductStatus::Retired {
            return Err(ServiceError::InvalidOperation(
                "product is already retired".into(),
            ));
        }
        if let Some(event) = open_event(&txn, id).await? {
            return Err(ServiceError::InvalidOperation(format!(
                "product has an open {} event",
                event.kind
            )));
        }

        let mut model: product::ActiveModel = existing.clone().into();
        model.status = Set(ProductStatus::Retired);
        model.condition = Set(ProductCondition::Retired);
        let updated = model.update(&txn).await?;

        let description = match optional_text(notes) {
            Some(notes) => format!("Retired: {notes}"),
            None => "Retired".to_string(),
        };
        record_movement(
            &txn,
            Movement::new(id, MovementKind::Retired, actor)
                .from(Some(existing.location_id))
                .describe(description)
                .values(
                    serde_json::json!({"status": existing.status, "condition": existing.condition}),
                    serde_json::json!({"status": updated.status, "condition": updated.condition}),
                ),
        )
        .await?;
        db::commit(txn, "retire_product", started).await?;

        self.event_sender
            .send_or_log(Event::ProductRetired(id))
            .await;
        info!(product_id = %id, "Product retired");
        Ok(updated)
    }

    /// Soft delete
    #[instrument(skip(self))]
    pub async fn delete_product(&self, id: Uuid, actor: &str) -> Result<(), ServiceError> {
        let started = Instant::now();
        let txn = self.db_pool.begin().await?;
        let existing = find_product(&txn, id).await?;

        if !existing.active {
            return Ok(());
        }
        if let Some(event) = open_event(&txn, id).await? {
            return Err(ServiceError::InvalidOperation(format!(
                "product has an open {} event",
                event.kind
            )));
        }

        let mut model: product::ActiveModel = existing.clone().into();
        model.active = Set(false);
        let updated = model.update(&txn).await?;
        record_changes(&txn, &existing, &updated, actor).await?;
        db::commit(txn, "delete_product", started).await?;

        self.event_sender
            .send_or_log(Event::ProductDeactivated(id))
            .await;
        info!(product_id = %id, "Product deactivated");
        Ok(())
    }

    /// Holder derived from the latest non-void open event, else the registered location
    pub async fn current_holder(&self, id: Uuid) -> Result<CurrentHolder, ServiceError> {
        let product = find_product(&*self.db_pool, id).await?;
        current_holder(&*self.db_pool, &product).await
    }

    #[instrument(skip(self))]
    pub async fn list_movements(
        &self,
        query: &MovementQuery,
        page: PageRequest,
    ) -> Result<Page<stock_movement::Model>, ServiceError> {
        let mut select = stock_movement::Entity::find();

        if let Some(product_id) = query.product_id {
            select = select.filter(stock_movement::Column::ProductId.eq(product_id));
        }
        if let Some(kind) = query.kind {
            select = select.filter(stock_movement::Column::Kind.eq(kind));
        }
        if let Some(term) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            select = select.filter(
                Condition::any()
                    .add(stock_movement::Column::Description.contains(term))
                    .add(stock_movement::Column::PerformedBy.contains(term)),
            );
        }
        if let Some(from) = query.from {
            select = select.filter(stock_movement::Column::CreatedAt.gte(start_of_day(from)));
        }
        if let Some(to) = query.to {
            select = select.filter(stock_movement::Column::CreatedAt.lt(end_of_day(to)));
        }

        let paginator = select
            .order_by_desc(stock_movement::Column::CreatedAt)
            .paginate(&*self.db_pool, page.limit);
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.index()).await?;
        Ok(Page::new(items, total, page))
    }
}

/// Select with the catalog filters applied
pub(crate) fn filter_products(query: &ProductQuery) -> sea_orm::Select<product::Entity> {
    let mut select = product::Entity::find();

    if !query.include_inactive.unwrap_or(false) {
        select = select.filter(product::Column::Active.eq(true));
    }
    if let Some(term) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        select = select.filter(
            Condition::any()
                .add(product::Column::SerialNumber.contains(term))
                .add(product::Column::Model.contains(term))
                .add(product::Column::InternalCode.contains(term))
                .add(product::Column::Barcode.contains(term)),
        );
    }
    if let Some(id) = query.product_type_id {
        select = select.filter(product::Column::ProductTypeId.eq(id));
    }
    if let Some(id) = query.category_id {
        select = select.filter(product::Column::CategoryId.eq(id));
    }
    if let Some(id) = query.brand_id {
        select = select.filter(product::Column::BrandId.eq(id));
    }
    if let Some(id) = query.supplier_id {
        select = select.filter(product::Column::SupplierId.eq(id));
    }
    if let Some(id) = query.location_id {
        select = select.filter(product::Column::LocationId.eq(id));
    }
    if let Some(status) = query.status {
        select = select.filter(product::Column::Status.eq(status));
    }
    if let Some(condition) = query.condition {
        select = select.filter(product::Column::Condition.eq(condition));
    }
    select
}

pub(crate) async fn find_product<C>(conn: &C, id: Uuid) -> Result<product::Model, ServiceError>
where
    C: ConnectionTrait,
{
    product::Entity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::not_found("product", id))
}

pub(crate) async fn current_holder<C>(
    conn: &C,
    product: &product::Model,
) -> Result<CurrentHolder, ServiceError>
where
    C: ConnectionTrait,
{
    if let Some(event) = open_event(conn, product.id).await? {
        if event.kind == EventKind::Repair {
            return Ok(CurrentHolder::Repair {
                event_id: event.id,
                since: event.opened_at,
            });
        }

        let employee = match event.employee_id {
            Some(id) => employee::Entity::find_by_id(id).one(conn).await?,
            None => None,
        };
        let department = match event.department_id {
            Some(id) => department::Entity::find_by_id(id).one(conn).await?,
            None => None,
        };
        return Ok(CurrentHolder::Employee {
            event_id: event.id,
            kind: event.kind,
            employee_id: event.employee_id,
            employee_name: employee.map(|e| e.full_name),
            department_id: event.department_id,
            department_name: department.map(|d| d.name),
            since: event.opened_at,
            expected_end: event.expected_end,
        });
    }

    let location = location::Entity::find_by_id(product.location_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::not_found("location", product.location_id))?;
    Ok(CurrentHolder::Location {
        location_id: location.id,
        location_name: location.display_name(),
    })
}

/// Active master data a product points at
struct References {
    product_type: Option<product_type::Model>,
    category: category::Model,
    brand: brand::Model,
}

impl References {
    async fn load<C: ConnectionTrait>(conn: &C, input: &ProductInput) -> Result<Self, ServiceError> {
        let category = category::Entity::find_by_id(input.category_id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::not_found("category", input.category_id))?;
        require_active(category.active, "category", &category.name)?;

        let brand = brand::Entity::find_by_id(input.brand_id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::not_found("brand", input.brand_id))?;
        require_active(brand.active, "brand", &brand.name)?;

        let location = location::Entity::find_by_id(input.location_id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::not_found("location", input.location_id))?;
        require_active(location.active, "location", &location.name)?;

        if let Some(supplier_id) = input.supplier_id {
            let supplier = supplier::Entity::find_by_id(supplier_id)
                .one(conn)
                .await?
                .ok_or_else(|| ServiceError::not_found("supplier", supplier_id))?;
            require_active(supplier.active, "supplier", &supplier.name)?;
        }

        let product_type = match input.product_type_id {
            Some(type_id) => {
                let kind = product_type::Entity::find_by_id(type_id)
                    .one(conn)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("product type", type_id))?;
                require_active(kind.active, "product type", &kind.name)?;
                Some(kind)
            }
            None => None,
        };

        Ok(Self {
            product_type,
            category,
            brand,
        })
    }

    fn validate_attributes(&self, attributes: &Value) -> Result<Value, ServiceError> {
        let schema = match &self.product_type {
            Some(kind) => attributes::parse_schema(&kind.attribute_schema)?,
            None => Vec::new(),
        };
        attributes::validate_attributes(&schema, attributes)
    }
}

fn require_active(active: bool, entity: &str, name: &str) -> Result<(), ServiceError> {
    if active {
        Ok(())
    } else {
        Err(ServiceError::InvalidOperation(format!(
            "{entity} '{name}' is inactive"
        )))
    }
}

async fn ensure_serial_free<C: ConnectionTrait>(
    conn: &C,
    serial: &str,
    exclude: Option<Uuid>,
) -> Result<(), ServiceError> {
    let mut select = product::Entity::find().filter(product::Column::SerialNumber.eq(serial));
    if let Some(id) = exclude {
        select = select.filter(product::Column::Id.ne(id));
    }
    if select.count(conn).await? > 0 {
        return Err(ServiceError::Conflict(format!(
            "serial number '{serial}' already exists"
        )));
    }
    Ok(())
}

async fn ensure_barcode_free<C: ConnectionTrait>(
    conn: &C,
    barcode: &str,
    exclude: Option<Uuid>,
) -> Result<(), ServiceError> {
    let mut select = product::Entity::find().filter(product::Column::Barcode.eq(barcode));
    if let Some(id) = exclude {
        select = select.filter(product::Column::Id.ne(id));
    }
    if select.count(conn).await? > 0 {
        return Err(ServiceError::Conflict(format!(
            "barcode '{barcode}' already exists"
        )));
    }
    Ok(())
}

/// First three characters of a category code
fn category_tag(code: &str) -> String {
    let tag: String = code
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(3)
        .collect::<String>()
        .to_ascii_uppercase();
    if tag.is_empty() {
        "GEN".into()
    } else {
        tag
    }
}

pub(crate) fn candidate_serial(year: i32, category_code: &str, number: u32) -> String {
    format!("{year}{}{number:04}", category_tag(category_code))
}

pub(crate) fn candidate_internal_code(category_code: &str, number: u32) -> String {
    format!("{}-{number:06}", category_tag(category_code))
}

async fn random_serial<C: ConnectionTrait>(conn: &C, category_code: &str) -> Result<String, ServiceError> {
    let year = Utc::now().year();
    for _ in 0..CODE_ATTEMPTS {
        let number = rand::thread_rng().gen_range(0..10_000);
        let candidate = candidate_serial(year, category_code, number);
        let taken = product::Entity::find()
            .filter(product::Column::SerialNumber.eq(candidate.as_str()))
            .count(conn)
            .await?
            > 0;
        if !taken {
            return Ok(candidate);
        }
    }
    Err(ServiceError::Conflict(
        "could not allocate a free serial number".into(),
    ))
}

async fn random_internal_code<C: ConnectionTrait>(
    conn: &C,
    category_code: &str,
) -> Result<String, ServiceError> {
    for _ in 0..CODE_ATTEMPTS {
        let number = rand::thread_rng().gen_range(0..1_000_000);
        let candidate = candidate_internal_code(category_code, number);
        let taken = product::Entity::find()
            .filter(product::Column::InternalCode.eq(candidate.as_str()))
            .count(conn)
            .await?
            > 0;
        if !taken {
            return Ok(candidate);
        }
    }
    Err(ServiceError::Conflict(
        "could not allocate a free internal code".into(),
    ))
}

/// Stock movement about to be recorded
pub(crate) struct Movement {
    product_id: Uuid,
    kind: MovementKind,
    from_location_id: Option<Uuid>,
    to_location_id: Option<Uuid>,
    description: String,
    previous_values: Option<Value>,
    new_values: Option<Value>,
    performed_by: String,
}

impl Movement {
    pub(crate) fn new(product_id: Uuid, kind: MovementKind, actor: &str) -> Self {
        Self {
            product_id,
            kind,
            from_location_id: None,
            to_location_id: None,
            description: String::new(),
            previous_values: None,
            new_values: None,
            performed_by: actor.to_string(),
        }
    }

    pub(crate) fn from(mut self, location: Option<Uuid>) -> Self {
        self.from_location_id = location;
        self
    }

    pub(crate) fn to(mut self, location: Option<Uuid>) -> Self {
        self.to_location_id = location;
        self
    }

    pub(crate) fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub(crate) fn values(mut self, previous: Value, new: Value) -> Self {
        self.previous_values = Some(previous);
        self.new_values = Some(new);
        self
    }
}

pub(crate) async fn record_movement<C: ConnectionTrait>(
    conn: &C,
    movement: Movement,
) -> Result<stock_movement::Model, ServiceError> {
    let row = stock_movement::ActiveModel {
        id: Set(Uuid::new_v4()),
        product_id: Set(movement.product_id),
        kind: Set(movement.kind),
        from_location_id: Set(movement.from_location_id),
        to_location_id: Set(movement.to_location_id),
        description: Set(movement.description),
        previous_values: Set(movement.previous_values),
        new_values: Set(movement.new_values),
        performed_by: Set(movement.performed_by),
        ..Default::default()
    }
    .insert(conn)
    .await?;
    Ok(row)
}

/// Records an `update` movement with the changed fields, plus a `transfer`
/// when the location moved
async fn record_changes<C: ConnectionTrait>(
    conn: &C,
    before: &product::Model,
    after: &product::Model,
    actor: &str,
) -> Result<(), ServiceError> {
    let (previous, new) = changed_fields(before, after)?;
    if previous.is_empty() {
        return Ok(());
    }

    let fields: Vec<&str> = previous.keys().map(String::as_str).collect();
    let description = format!("Updated {}", fields.join(", "));
    record_movement(
        conn,
        Movement::new(after.id, MovementKind::Update, actor)
            .describe(description)
            .values(Value::Object(previous), Value::Object(new)),
    )
    .await?;

    if before.location_id != after.location_id {
        record_movement(
            conn,
            Movement::new(after.id, MovementKind::Transfer, actor)
                .from(Some(before.location_id))
                .to(Some(after.location_id))
                .describe("Location changed"),
        )
        .await?;
    }

    Ok(())
}

fn changed_fields(
    before: &product::Model,
    after: &product::Model,
) -> Result<(Map<String, Value>, Map<String, Value>), ServiceError> {
    let to_map = |model: &product::Model| match serde_json::to_value(model) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ServiceError::InternalError("product is not an object".into())),
        Err(e) => Err(ServiceError::InternalError(e.to_string())),
    };
    let before = to_map(before)?;
    let after = to_map(after)?;

    let mut previous = Map::new();
    let mut new = Map::new();
    for (key, value) in &after {
        if matches!(key.as_str(), "updated_at" | "created_at") {
            continue;
        }
        let old = before.get(key).cloned().unwrap_or(Value::Null);
        if &old != value {
            previous.insert(key.clone(), old);
            new.insert(key.clone(), value.clone());
        }
    }
    Ok((previous, new))
}

pub(crate) fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

pub(crate) fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    start_of_day(date) + chrono::Duration::days(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> product::Model {
        let now = Utc::now();
        product::Model {
            id: Uuid::new_v4(),
            internal_code: "LAP-000123".into(),
            serial_number: "LAP0001".into(),
            barcode: None,
            product_type_id: None,
            category_id: Uuid::new_v4(),
            brand_id: Uuid::new_v4(),
            supplier_id: None,
            location_id: Uuid::new_v4(),
            model: "ThinkPad T14".into(),
            status: ProductStatus::Available,
            condition: ProductCondition::New,
            purchase_date: None,
            purchase_price: None,
            invoice_number: None,
            warranty_end: None,
            attributes: serde_json::json!({}),
            notes: None,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn generated_codes_follow_the_catalog_format() {
        assert_eq!(candidate_serial(2024, "COMPUT", 42), "2024COM0042");
        assert_eq!(candidate_internal_code("AU", 7), "AU-000007");
        assert_eq!(candidate_internal_code("", 123456), "GEN-123456");
    }

    #[test]
    fn only_changed_fields_are_reported() {
        let before = sample();
        let mut after = before.clone();
        after.condition = ProductCondition::Damaged;
        after.updated_at = before.updated_at + chrono::Duration::seconds(5);

        let (previous, new) = changed_fields(&before, &after).unwrap();
        assert_eq!(previous.len(), 1);
        assert_eq!(previous["condition"], "new");
        assert_eq!(new["condition"], "damaged");
    }

    #[test]
    fn day_bounds_cover_the_whole_day() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!((end_of_day(date) - start_of_day(date)).num_hours(), 24);
    }
}
