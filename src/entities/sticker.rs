use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, ActiveValue::Set, ConnectionTrait};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Kind of identifier printed for a product
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
pub enum StickerKind {
    #[sea_orm(string_value = "qr")]
    Qr,
    #[sea_orm(string_value = "barcode")]
    Barcode,
    #[sea_orm(string_value = "simple_label")]
    SimpleLabel,
    #[sea_orm(string_value = "full_label")]
    FullLabel,
}

impl StickerKind {
    /// Prefix of the sticker code
    pub fn code_prefix(&self) -> &'static str {
        match self {
            Self::Qr => "QR",
            Self::Barcode => "BC",
            Self::SimpleLabel => "LS",
            Self::FullLabel => "LF",
        }
    }

    /// File extension of the rendered artifact
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Qr | Self::Barcode => "png",
            Self::SimpleLabel | Self::FullLabel => "pdf",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Qr | Self::Barcode => "image/png",
            Self::SimpleLabel | Self::FullLabel => "application/pdf",
        }
    }
}

/// Identifier issued for a product
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "stickers")]
#[schema(as = Sticker)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub product_id: Uuid,
    pub kind: StickerKind,
    /// Globally unique code, `{QR|BC|LS|LF}-{serial}`
    #[sea_orm(unique)]
    pub code: String,
    /// Content encoded in the image
    pub payload: String,
    /// Path of the rendered artifact relative to the media root
    pub image_path: Option<String>,
    pub printed: bool,
    pub printed_at: Option<DateTime<Utc>>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;

        if insert {
            if let ActiveValue::NotSet = active_model.active {
                active_model.active = Set(true);
            }
            if let ActiveValue::NotSet = active_model.printed {
                active_model.printed = Set(false);
            }
            active_model.created_at = Set(Utc::now());
        }

        Ok(active_model)
    }
}
