use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, ActiveValue::Set, ConnectionTrait};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Lifecycle status of a product
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    ToSchema,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProductStatus {
    #[sea_orm(string_value = "available")]
    Available,
    #[sea_orm(string_value = "assigned")]
    Assigned,
    #[sea_orm(string_value = "under_repair")]
    UnderRepair,
    #[sea_orm(string_value = "retired")]
    Retired,
}

impl ProductStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Available => "Available",
            Self::Assigned => "Assigned",
            Self::UnderRepair => "Under repair",
            Self::Retired => "Retired",
        }
    }
}

/// Physical condition of a product
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    ToSchema,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProductCondition {
    #[sea_orm(string_value = "new")]
    New,
    #[sea_orm(string_value = "used_good")]
    UsedGood,
    #[sea_orm(string_value = "used_fair")]
    UsedFair,
    #[sea_orm(string_value = "damaged")]
    Damaged,
    #[sea_orm(string_value = "retired")]
    Retired,
}

impl ProductCondition {
    pub fn label(&self) -> &'static str {
        match self {
            Self::New => "New",
            Self::UsedGood => "Used - good",
            Self::UsedFair => "Used - fair",
            Self::Damaged => "Damaged",
            Self::Retired => "Retired",
        }
    }
}

/// Catalogued physical asset
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "products")]
#[schema(as = Product)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// `{CAT}-{6 digits}`
    #[sea_orm(unique)]
    pub internal_code: String,
    #[sea_orm(unique)]
    pub serial_number: String,
    #[sea_orm(unique)]
    pub barcode: Option<String>,
    pub product_type_id: Option<Uuid>,
    pub category_id: Uuid,
    pub brand_id: Uuid,
    pub supplier_id: Option<Uuid>,
    /// Registered location
    pub location_id: Uuid,
    pub model: String,
    pub status: ProductStatus,
    pub condition: ProductCondition,
    pub purchase_date: Option<NaiveDate>,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub purchase_price: Option<Decimal>,
    pub invoice_number: Option<String>,
    pub warranty_end: Option<NaiveDate>,
    /// Custom attributes keyed by the product type's field names
    #[schema(value_type = Object)]
    pub attributes: serde_json::Value,
    pub notes: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    pub fn warranty_active(&self, today: NaiveDate) -> bool {
        self.warranty_end.map(|end| end >= today).unwrap_or(false)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product_type::Entity",
        from = "Column::ProductTypeId",
        to = "super::product_type::Column::Id"
    )]
    ProductType,
    #[sea_orm(
        belongs_to = "super::category::Entity",
        from = "Column::CategoryId",
        to = "super::category::Column::Id"
    )]
    Category,
    #[sea_orm(
        belongs_to = "super::brand::Entity",
        from = "Column::BrandId",
        to = "super::brand::Column::Id"
    )]
    Brand,
    #[sea_orm(
        belongs_to = "super::supplier::Entity",
        from = "Column::SupplierId",
        to = "super::supplier::Column::Id"
    )]
    Supplier,
    #[sea_orm(
        belongs_to = "super::location::Entity",
        from = "Column::LocationId",
        to = "super::location::Column::Id"
    )]
    Location,
    #[sea_orm(has_many = "super::sticker::Entity")]
    Stickers,
    #[sea_orm(has_many = "super::assignment_event::Entity")]
    AssignmentEvents,
    #[sea_orm(has_many = "super::stock_movement::Entity")]
    StockMovements,
}

impl Related<super::product_type::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProductType.def()
    }
}

impl Related<super::category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl Related<super::brand::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Brand.def()
    }
}

impl Related<super::supplier::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Supplier.def()
    }
}

impl Related<super::location::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Location.def()
    }
}

impl Related<super::sticker::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Stickers.def()
    }
}

impl Related<super::assignment_event::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AssignmentEvents.def()
    }
}

impl Related<super::stock_movement::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StockMovements.def()
    }
}

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        let now = Utc::now();

        if insert {
            if let ActiveValue::NotSet = active_model.active {
                active_model.active = Set(true);
            }
            if let ActiveValue::NotSet = active_model.status {
                active_model.status = Set(ProductStatus::Available);
            }
            if let ActiveValue::NotSet = active_model.attributes {
                active_model.attributes = Set(serde_json::json!({}));
            }
            active_model.created_at = Set(now);
        }

        active_model.updated_at = Set(now);
        Ok(active_model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enums_serialize_as_snake_case() {
        assert_eq!(
            serde_json::to_value(ProductStatus::UnderRepair).unwrap(),
            "under_repair"
        );
        assert_eq!(ProductCondition::UsedGood.to_string(), "used_good");
        assert_eq!(
            serde_json::from_value::<ProductCondition>("used_fair".into()).unwrap(),
            ProductCondition::UsedFair
        );
    }
}
