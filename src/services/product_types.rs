use once_cell::sync::Lazy;
use regex::Regex;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::DbPool,
    entities::{product, product_type},
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        attributes::{validate_schema, AttributeField, FieldKind},
        ensure_absent, optional_text, required_text, Page, PageRequest,
    },
};

static PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z]{2,6}$").expect("valid prefix pattern"));

const KIND: &str = "product_types";

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ProductTypeInput {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    /// Two to six letters, stored upper-case
    #[validate(regex = "PREFIX")]
    #[schema(example = "LAP")]
    pub code_prefix: String,
    pub description: Option<String>,
    #[serde(default)]
    pub attribute_schema: Vec<AttributeField>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProductTypeQuery {
    pub search: Option<String>,
    pub active: Option<bool>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

/// Product types and their serial counters
#[derive(Clone)]
pub struct ProductTypeService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl ProductTypeService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    #[instrument(skip(self, input))]
    pub async fn create(&self, input: ProductTypeInput) -> Result<product_type::Model, ServiceError> {
        input.validate()?;
        validate_schema(&input.attribute_schema)?;
        let db = &*self.db_pool;
        let name = required_text(&input.name, "name")?;
        let prefix = input.code_prefix.trim().to_ascii_uppercase();

        self.check_unique(&name, &prefix, None).await?;

        let model = product_type::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name),
            code_prefix: Set(prefix),
            description: Set(optional_text(input.description)),
            attribute_schema: Set(serde_json::to_value(&input.attribute_schema)
                .map_err(|e| ServiceError::InternalError(e.to_string()))?),
            active: Set(input.active.unwrap_or(true)),
            ..Default::default()
        }
        .insert(db)
        .await?;

        self.event_sender
            .send_or_log(Event::MasterDataCreated {
                kind: KIND.into(),
                id: model.id,
            })
            .await;
        info!(product_type_id = %model.id, prefix = %model.code_prefix, "Product type created");
        Ok(model)
    }

    pub async fn get(&self, id: Uuid) -> Result<product_type::Model, ServiceError> {
        product_type::Entity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::not_found("product type", id))
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        query: &ProductTypeQuery,
        page: PageRequest,
    ) -> Result<Page<product_type::Model>, ServiceError> {
        let mut select = product_type::Entity::find();

        if let Some(term) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            select = select.filter(
                Condition::any()
                    .add(product_type::Column::Name.contains(term))
                    .add(product_type::Column::CodePrefix.contains(term)),
            );
        }
        if let Some(active) = query.active {
            select = select.filter(product_type::Column::Active.eq(active));
        }

        let paginator = select
            .order_by_asc(product_type::Column::Name)
            .paginate(&*self.db_pool, page.limit);
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.index()).await?;
        Ok(Page::new(items, total, page))
    }

    /// Replaces the definition of a type; the serial counter is kept
    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        id: Uuid,
        input: ProductTypeInput,
    ) -> Result<product_type::Model, ServiceError> {
        input.validate()?;
        validate_schema(&input.attribute_schema)?;
        let existing = self.get(id).await?;
        let name = required_text(&input.name, "name")?;
        let prefix = input.code_prefix.trim().to_ascii_uppercase();

        self.check_unique(&name, &prefix, Some(id)).await?;

        let mut model: product_type::ActiveModel = existing.into();
        model.name = Set(name);
        model.code_prefix = Set(prefix);
        model.description = Set(optional_text(input.description));
        model.attribute_schema = Set(serde_json::to_value(&input.attribute_schema)
            .map_err(|e| ServiceError::InternalError(e.to_string()))?);
        if let Some(active) = input.active {
            model.active = Set(active);
        }
        let model = model.update(&*self.db_pool).await?;

        self.event_sender
            .send_or_log(Event::MasterDataUpdated {
                kind: KIND.into(),
                id,
            })
            .await;
        Ok(model)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;
        self.get(id).await?;

        let products = product::Entity::find()
            .filter(product::Column::ProductTypeId.eq(id))
            .count(db)
            .await?;
        if products > 0 {
            return Err(ServiceError::Conflict(format!(
                "product type is referenced by {products} product(s)"
            )));
        }

        product_type::Entity::delete_by_id(id).exec(db).await?;
        self.event_sender
            .send_or_log(Event::MasterDataDeleted {
                kind: KIND.into(),
                id,
            })
            .await;
        Ok(())
    }

    /// Creates the default product types that do not exist yet.
    /// Returns the names of the types created.
    #[instrument(skip(self))]
    pub async fn seed_defaults(&self) -> Result<Vec<String>, ServiceError> {
        let db = &*self.db_pool;
        let mut created = Vec::new();

        for (name, prefix, description, fields) in default_types() {
            let exists = product_type::Entity::find()
                .filter(
                    Condition::any()
                        .add(product_type::Column::Name.eq(name))
                        .add(product_type::Column::CodePrefix.eq(prefix)),
                )
                .count(db)
                .await?
                > 0;
            if exists {
                continue;
            }

            self.create(ProductTypeInput {
                name: name.into(),
                code_prefix: prefix.into(),
                description: Some(description.into()),
                attribute_schema: fields,
                active: Some(true),
            })
            .await?;
            created.push(name.to_string());
        }

        info!(count = created.len(), "Seeded default product types");
        Ok(created)
    }

    async fn check_unique(
        &self,
        name: &str,
        prefix: &str,
        exclude: Option<Uuid>,
    ) -> Result<(), ServiceError> {
        let db = &*self.db_pool;
        let not_self = |select: sea_orm::Select<product_type::Entity>| match exclude {
            Some(id) => select.filter(product_type::Column::Id.ne(id)),
            None => select,
        };

        ensure_absent(
            db,
            not_self(product_type::Entity::find().filter(product_type::Column::Name.eq(name))),
            || format!("product type '{name}' already exists"),
        )
        .await?;
        ensure_absent(
            db,
            not_self(
                product_type::Entity::find().filter(product_type::Column::CodePrefix.eq(prefix)),
            ),
            || format!("code prefix '{prefix}' is already in use"),
        )
        .await
    }
}

/// `{PREFIX}{n:04}`
pub fn format_serial(prefix: &str, number: i32) -> String {
    format!("{prefix}{number:04}")
}

/// Takes the next serial number from the type's counter.
///
/// Must run inside the product-creation transaction. Numbers already used as
/// a serial (for example typed in by hand) are skipped.
pub(crate) async fn next_serial<C>(conn: &C, product_type_id: Uuid) -> Result<String, ServiceError>
where
    C: ConnectionTrait,
{
    let kind = product_type::Entity::find_by_id(product_type_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::not_found("product type", product_type_id))?;

    let mut number = kind.last_number;
    let serial = loop {
        number += 1;
        let candidate = format_serial(&kind.code_prefix, number);
        let taken = product::Entity::find()
            .filter(product::Column::SerialNumber.eq(candidate.as_str()))
            .count(conn)
            .await?
            > 0;
        if !taken {
            break candidate;
        }
        warn!(serial = %candidate, "Serial already taken, skipping");
    };

    let result = product_type::Entity::update_many()
        .col_expr(product_type::Column::LastNumber, Expr::value(number))
        .filter(product_type::Column::Id.eq(product_type_id))
        .filter(product_type::Column::LastNumber.eq(kind.last_number))
        .exec(conn)
        .await?;
    if result.rows_affected == 0 {
        return Err(ServiceError::Conflict(
            "serial counter changed concurrently, retry the request".into(),
        ));
    }

    Ok(serial)
}

fn connection_field() -> AttributeField {
    AttributeField::new("connection", FieldKind::Select, false)
        .with_label("Connection")
        .with_options(&["USB", "Bluetooth", "Wireless 2.4GHz"])
}

fn computer_fields(systems: &[&str]) -> Vec<AttributeField> {
    vec![
        AttributeField::new("processor", FieldKind::Text, false).with_label("Processor"),
        AttributeField::new("ram", FieldKind::Select, false)
            .with_label("RAM")
            .with_options(&["4GB", "8GB", "16GB", "32GB", "64GB"]),
        AttributeField::new("storage", FieldKind::Text, false).with_label("Storage"),
        AttributeField::new("graphics_card", FieldKind::Text, false).with_label("Graphics card"),
        AttributeField::new("operating_system", FieldKind::Select, false)
            .with_label("Operating system")
            .with_options(systems),
    ]
}

/// Built-in catalogue of product types: name, prefix, description, fields
pub fn default_types() -> Vec<(&'static str, &'static str, &'static str, Vec<AttributeField>)> {
    vec![
        (
            "Mobile phone",
            "PHN",
            "Mobile phones and smartphones",
            vec![
                AttributeField::new("imei", FieldKind::Text, true).with_label("IMEI"),
                AttributeField::new("carrier", FieldKind::Select, false)
                    .with_label("Carrier")
                    .with_options(&["Movistar", "Vodafone", "Orange", "Yoigo", "Unlocked"]),
                AttributeField::new("data_plan", FieldKind::Text, false).with_label("Data plan"),
                AttributeField::new("phone_number", FieldKind::Text, false)
                    .with_label("Phone number"),
            ],
        ),
        (
            "Mouse",
            "MOU",
            "Mice and pointing devices",
            vec![
                connection_field(),
                AttributeField::new("dpi", FieldKind::Number, false).with_label("Max DPI"),
                AttributeField::new("buttons", FieldKind::Number, false).with_label("Buttons"),
            ],
        ),
        (
            "Keyboard",
            "KEY",
            "Keyboards",
            vec![
                connection_field(),
                AttributeField::new("switch_type", FieldKind::Select, false)
                    .with_label("Key type")
                    .with_options(&["Mechanical", "Membrane", "Chiclet"]),
                AttributeField::new("layout", FieldKind::Select, false)
                    .with_label("Layout")
                    .with_options(&["Spanish", "English", "International"]),
            ],
        ),
        (
            "Monitor",
            "MON",
            "Monitors and displays",
            vec![
                AttributeField::new("size_inches", FieldKind::Number, false)
                    .with_label("Size (inches)"),
                AttributeField::new("resolution", FieldKind::Select, false)
                    .with_label("Resolution")
                    .with_options(&["1920x1080", "2560x1440", "3840x2160", "1366x768"]),
                AttributeField::new("panel", FieldKind::Select, false)
                    .with_label("Panel type")
                    .with_options(&["IPS", "TN", "VA", "OLED"]),
            ],
        ),
        (
            "Laptop",
            "LAP",
            "Portable computers",
            computer_fields(&["Windows 10", "Windows 11", "macOS", "Linux"]),
        ),
        (
            "Desktop",
            "DSK",
            "Desktop computers",
            computer_fields(&["Windows 10", "Windows 11", "Linux"]),
        ),
        (
            "Printer",
            "PRN",
            "Printers and multifunction devices",
            vec![
                AttributeField::new("print_technology", FieldKind::Select, false)
                    .with_label("Technology")
                    .with_options(&["Laser", "Inkjet", "Thermal"]),
                AttributeField::new("color", FieldKind::Select, false)
                    .with_label("Color")
                    .with_options(&["Monochrome", "Color"]),
                AttributeField::new("functions", FieldKind::Select, false)
                    .with_label("Functions")
                    .with_options(&["Print", "Print and scan", "Multifunction", "Multifunction with fax"]),
            ],
        ),
        (
            "Tablet",
            "TAB",
            "Tablets",
            vec![
                AttributeField::new("screen_inches", FieldKind::Number, false)
                    .with_label("Screen size (inches)"),
                AttributeField::new("storage", FieldKind::Select, false)
                    .with_label("Storage")
                    .with_options(&["16GB", "32GB", "64GB", "128GB", "256GB", "512GB"]),
                AttributeField::new("connectivity", FieldKind::Select, false)
                    .with_label("Connectivity")
                    .with_options(&["WiFi", "WiFi + 4G", "WiFi + 5G"]),
                AttributeField::new("operating_system", FieldKind::Select, false)
                    .with_label("Operating system")
                    .with_options(&["Android", "iOS", "Windows"]),
            ],
        ),
        (
            "Headset",
            "HDS",
            "Headsets and headphones",
            vec![
                AttributeField::new("connection", FieldKind::Select, false)
                    .with_label("Connection")
                    .with_options(&["Jack 3.5mm", "USB", "Bluetooth", "Wireless"]),
                AttributeField::new("fit", FieldKind::Select, false)
                    .with_label("Type")
                    .with_options(&["In-ear", "On-ear", "Over-ear"]),
                AttributeField::new("noise_cancelling", FieldKind::Boolean, false)
                    .with_label("Noise cancelling"),
            ],
        ),
        (
            "Webcam",
            "WEB",
            "Webcams",
            vec![
                AttributeField::new("resolution", FieldKind::Select, false)
                    .with_label("Resolution")
                    .with_options(&["720p", "1080p", "4K"]),
                AttributeField::new("fps", FieldKind::Select, false)
                    .with_label("FPS")
                    .with_options(&["30fps", "60fps"]),
                AttributeField::new("microphone", FieldKind::Boolean, false)
                    .with_label("Built-in microphone"),
            ],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn serials_are_zero_padded() {
        assert_eq!(format_serial("LAP", 1), "LAP0001");
        assert_eq!(format_serial("PHN", 123), "PHN0123");
        assert_eq!(format_serial("MON", 12345), "MON12345");
    }

    #[test]
    fn default_types_have_valid_schemas_and_unique_prefixes() {
        let types = default_types();
        let prefixes: HashSet<_> = types.iter().map(|(_, p, _, _)| *p).collect();
        assert_eq!(prefixes.len(), types.len());

        for (name, prefix, _, fields) in &types {
            assert!(PREFIX.is_match(prefix), "{name}");
            validate_schema(fields).unwrap();
        }
    }

    #[test]
    fn prefix_must_be_letters() {
        let input = ProductTypeInput {
            name: "Laptop".into(),
            code_prefix: "L4P".into(),
            description: None,
            attribute_schema: vec![],
            active: None,
        };
        assert!(input.validate().is_err());
    }
}
