use chrono::Utc;
use metrics::counter;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Instant};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    db::{self, DbPool},
    entities::{brand, category, location, product, sticker, StickerKind},
    errors::ServiceError,
    events::{Event, EventSender},
    media::{MediaStore, STICKER_DIR},
    services::products::{current_holder, find_product, CurrentHolder},
    stickers::{self, LabelContent},
};

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct GenerateStickers {
    /// Defaults to `[qr]`
    #[serde(default)]
    pub kinds: Vec<StickerKind>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GeneratedSticker {
    pub sticker: sticker::Model,
    /// False when an existing sticker was reused
    pub created: bool,
}

/// Result of scanning a sticker
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StickerLookup {
    pub sticker: sticker::Model,
    pub product: product::Model,
    pub holder: CurrentHolder,
}

/// Bytes of a rendered sticker
#[derive(Debug, Clone)]
pub struct StickerImage {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    pub file_name: String,
}

#[derive(Clone)]
pub struct StickerService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    media: Arc<MediaStore>,
}

impl StickerService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>, media: Arc<MediaStore>) -> Self {
        Self {
            db_pool,
            event_sender,
            media,
        }
    }

    /// Issues the requested kinds of sticker for a product.
    ///
    /// A kind that already has a sticker is reused; a deactivated one is
    /// reactivated and rendered again.
    #[instrument(skip(self))]
    pub async fn generate(
        &self,
        product_id: Uuid,
        kinds: Vec<StickerKind>,
    ) -> Result<Vec<GeneratedSticker>, ServiceError> {
        let mut requested: Vec<StickerKind> = Vec::new();
        for kind in kinds {
            if !requested.contains(&kind) {
                requested.push(kind);
            }
        }
        if requested.is_empty() {
            requested.push(StickerKind::Qr);
        }

        let started = Instant::now();
        let txn = self.db_pool.begin().await?;
        let product = find_product(&txn, product_id).await?;
        if !product.active {
            return Err(ServiceError::InvalidOperation(
                "stickers cannot be issued for an inactive product".into(),
            ));
        }
        let label = label_content(&txn, &product).await?;
        let brand = label.brand.clone();

        let mut results = Vec::with_capacity(requested.len());
        let mut written = Vec::new();
        let mut stale = Vec::new();
        for kind in requested {
            let code = stickers::code_for(kind, &product.serial_number);
            let payload = stickers::payload_for(
                kind,
                &product.serial_number,
                &brand,
                &product.model,
                product.barcode.as_deref(),
            );
            let taken = sticker::Entity::find()
                .filter(sticker::Column::Code.eq(code.as_str()))
                .filter(sticker::Column::ProductId.ne(product.id))
                .one(&txn)
                .await?;
            if taken.is_some() {
                return Err(ServiceError::Conflict(format!(
                    "sticker code {code} belongs to another product"
                )));
            }

            // active rows first, then the oldest
            let existing = sticker::Entity::find()
                .filter(sticker::Column::ProductId.eq(product.id))
                .filter(sticker::Column::Kind.eq(kind))
                .order_by_desc(sticker::Column::Active)
                .order_by_asc(sticker::Column::CreatedAt)
                .one(&txn)
                .await?;

            match existing {
                Some(existing) if existing.active && existing.code == code => {
                    results.push(GeneratedSticker {
                        sticker: existing,
                        created: false,
                    });
                }
                Some(existing) => {
                    let path = self.store(kind, &code, &payload, &label, &mut written).await?;
                    if let Some(old) = existing.image_path.as_ref().filter(|old| **old != path) {
                        stale.push(old.clone());
                    }
                    let recoded = existing.code != code;
                    let mut model: sticker::ActiveModel = existing.into();
                    if recoded {
                        model.printed = Set(false);
                        model.printed_at = Set(None);
                    }
                    model.code = Set(code);
                    model.active = Set(true);
                    model.payload = Set(payload);
                    model.image_path = Set(Some(path));
                    let revived = model.update(&txn).await?;
                    info!(code = %revived.code, "Reactivated sticker");
                    results.push(GeneratedSticker {
                        sticker: revived,
                        created: false,
                    });
                }
                None => {
                    let path = self.store(kind, &code, &payload, &label, &mut written).await?;
                    let created = sticker::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        product_id: Set(product.id),
                        kind: Set(kind),
                        code: Set(code),
                        payload: Set(payload),
                        image_path: Set(Some(path)),
                        ..Default::default()
                    }
                    .insert(&txn)
                    .await?;
                    counter!("assettrack.stickers.generated", 1, "kind" => kind.to_string());
                    results.push(GeneratedSticker {
                        sticker: created,
                        created: true,
                    });
                }
            }
        }

        if let Err(err) = db::commit(txn, "generate_stickers", started).await {
            for path in written {
                let _ = self.media.remove(&path).await;
            }
            return Err(err.into());
        }
        for path in stale {
            if let Err(err) = self.media.remove(&path).await {
                warn!(%path, error = %err, "Could not remove replaced sticker image");
            }
        }

        for result in results.iter().filter(|r| r.created) {
            self.event_sender
                .send_or_log(Event::StickerGenerated {
                    product_id,
                    sticker_id: result.sticker.id,
                    code: result.sticker.code.clone(),
                })
                .await;
        }
        Ok(results)
    }

    async fn store(
        &self,
        kind: StickerKind,
        code: &str,
        payload: &str,
        label: &LabelContent,
        written: &mut Vec<String>,
    ) -> Result<String, ServiceError> {
        let label = LabelContent {
            code: code.to_string(),
            ..label.clone()
        };
        let bytes = stickers::render(kind, payload, &label)?;
        let path = sticker_path(code, kind);
        self.media.write(&path, &bytes).await?;
        written.push(path.clone());
        Ok(path)
    }

    pub async fn list_for_product(
        &self,
        product_id: Uuid,
        include_inactive: bool,
    ) -> Result<Vec<sticker::Model>, ServiceError> {
        let db = &*self.db_pool;
        find_product(db, product_id).await?;

        let mut select = sticker::Entity::find().filter(sticker::Column::ProductId.eq(product_id));
        if !include_inactive {
            select = select.filter(sticker::Column::Active.eq(true));
        }
        Ok(select
            .order_by_asc(sticker::Column::CreatedAt)
            .all(db)
            .await?)
    }

    pub async fn get(&self, id: Uuid) -> Result<sticker::Model, ServiceError> {
        sticker::Entity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::not_found("sticker", id))
    }

    /// Rendered artifact of an active sticker
    pub async fn image(&self, id: Uuid) -> Result<StickerImage, ServiceError> {
        let sticker = self.get(id).await?;
        let path = match (&sticker.image_path, sticker.active) {
            (Some(path), true) => path.clone(),
            _ => {
                return Err(ServiceError::NotFound(format!(
                    "sticker {} has no image",
                    sticker.code
                )))
            }
        };

        Ok(StickerImage {
            bytes: self.media.read(&path).await?,
            content_type: sticker.kind.content_type(),
            file_name: format!("{}.{}", sticker.code, sticker.kind.extension()),
        })
    }

    #[instrument(skip(self))]
    pub async fn mark_printed(&self, id: Uuid) -> Result<sticker::Model, ServiceError> {
        let sticker = self.get(id).await?;
        if !sticker.active {
            return Err(ServiceError::InvalidOperation(
                "inactive stickers cannot be printed".into(),
            ));
        }

        let mut model: sticker::ActiveModel = sticker.into();
        model.printed = Set(true);
        model.printed_at = Set(Some(Utc::now()));
        let sticker = model.update(&*self.db_pool).await?;

        self.event_sender.send_or_log(Event::StickerPrinted(id)).await;
        Ok(sticker)
    }

    /// Marks a sticker inactive and removes its image
    #[instrument(skip(self))]
    pub async fn deactivate(&self, id: Uuid) -> Result<sticker::Model, ServiceError> {
        let sticker = self.get(id).await?;
        let image_path = sticker.image_path.clone();

        let mut model: sticker::ActiveModel = sticker.into();
        model.active = Set(false);
        model.image_path = Set(None);
        let sticker = model.update(&*self.db_pool).await?;

        if let Some(path) = image_path {
            self.media.remove(&path).await?;
        }
        self.event_sender
            .send_or_log(Event::StickerDeactivated(id))
            .await;
        info!(code = %sticker.code, "Sticker deactivated");
        Ok(sticker)
    }

    /// Resolves a scanned code to its product and current holder
    #[instrument(skip(self))]
    pub async fn lookup(&self, code: &str) -> Result<StickerLookup, ServiceError> {
        let db = &*self.db_pool;
        let code = code.trim().to_ascii_uppercase();

        let sticker = sticker::Entity::find()
            .filter(sticker::Column::Code.eq(code.as_str()))
            .filter(sticker::Column::Active.eq(true))
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("no active sticker with code {code}")))?;
        let product = find_product(db, sticker.product_id).await?;
        let holder = current_holder(db, &product).await?;

        Ok(StickerLookup {
            sticker,
            product,
            holder,
        })
    }
}

/// Moves the stickers of a product onto the codes of its new serial number.
///
/// The rows are deactivated because their printed images still carry the old
/// code; generating the kind again revives the same row.
pub(crate) async fn rekey_for_serial<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    serial: &str,
) -> Result<usize, ServiceError> {
    let rows = sticker::Entity::find()
        .filter(sticker::Column::ProductId.eq(product_id))
        .all(conn)
        .await?;

    let mut moved = 0;
    for row in rows {
        let code = stickers::code_for(row.kind, serial);
        if row.code == code {
            continue;
        }
        let mut model: sticker::ActiveModel = row.into();
        model.code = Set(code);
        model.active = Set(false);
        model.printed = Set(false);
        model.printed_at = Set(None);
        model.update(conn).await?;
        moved += 1;
    }
    Ok(moved)
}

/// `stickers/{code}.{png|pdf}`
pub fn sticker_path(code: &str, kind: StickerKind) -> String {
    format!("{STICKER_DIR}/{code}.{}", kind.extension())
}

async fn label_content<C: ConnectionTrait>(
    conn: &C,
    product: &product::Model,
) -> Result<LabelContent, ServiceError> {
    let brand = brand::Entity::find_by_id(product.brand_id)
        .one(conn)
        .await?
        .map(|b| b.name)
        .unwrap_or_default();
    let category = category::Entity::find_by_id(product.category_id)
        .one(conn)
        .await?
        .map(|c| c.name)
        .unwrap_or_default();
    let location = location::Entity::find_by_id(product.location_id)
        .one(conn)
        .await?
        .map(|l| l.display_name());

    Ok(LabelContent {
        code: String::new(),
        serial: product.serial_number.clone(),
        internal_code: product.internal_code.clone(),
        brand,
        model: product.model.clone(),
        category,
        location,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sticker_files_live_under_the_sticker_dir() {
        assert_eq!(sticker_path("QR-LAP0001", StickerKind::Qr), "stickers/QR-LAP0001.png");
        assert_eq!(
            sticker_path("LS-LAP0001", StickerKind::SimpleLabel),
            "stickers/LS-LAP0001.pdf"
        );
    }

    #[test]
    fn generate_request_defaults_to_no_kinds() {
        let req: GenerateStickers = serde_json::from_str("{}").unwrap();
        assert!(req.kinds.is_empty());
    }
}
