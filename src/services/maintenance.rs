//! Out-of-band maintenance run from the admin binary.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::Serialize;
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::Instant,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    db::{self, DbPool},
    entities::{product, sticker, StickerKind},
    errors::ServiceError,
    media::{MediaStore, STICKER_DIR},
    migrator::TABLES_IN_FK_ORDER,
};

/// Rows removed per table by a reset
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResetReport {
    pub tables: Vec<(String, u64)>,
    pub files_removed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StickerCleanupReport {
    /// Rows whose product no longer exists
    pub orphaned: usize,
    /// Extra active rows for the same product and kind
    pub duplicates: usize,
    /// Active stickers of inactive products
    pub deactivated: usize,
    /// Files in the sticker directory that no row points at
    pub unreferenced_files: usize,
}

#[derive(Clone)]
pub struct MaintenanceService {
    db_pool: Arc<DbPool>,
    media: Arc<MediaStore>,
}

impl MaintenanceService {
    pub fn new(db_pool: Arc<DbPool>, media: Arc<MediaStore>) -> Self {
        Self { db_pool, media }
    }

    /// Deletes every row, children first, and the stored sticker images
    #[instrument(skip(self))]
    pub async fn reset(&self) -> Result<ResetReport, ServiceError> {
        let started = Instant::now();
        let txn = self.db_pool.begin().await?;
        let mut report = ResetReport::default();

        for table in TABLES_IN_FK_ORDER.iter().rev() {
            let result = txn
                .execute_unprepared(&format!("DELETE FROM {table}"))
                .await?;
            report.tables.push((table.to_string(), result.rows_affected()));
        }
        db::commit(txn, "reset", started).await?;

        for file in self.media.list(STICKER_DIR).await? {
            if self.media.remove(&file).await? {
                report.files_removed += 1;
            }
        }

        warn!(files = report.files_removed, "Database reset");
        Ok(report)
    }

    /// Removes orphaned and duplicate stickers, deactivates stickers of
    /// inactive products and deletes image files nothing references
    #[instrument(skip(self))]
    pub async fn clean_stickers(&self) -> Result<StickerCleanupReport, ServiceError> {
        let db = &*self.db_pool;
        let mut report = StickerCleanupReport::default();

        let products: HashMap<Uuid, bool> = product::Entity::find()
            .all(db)
            .await?
            .into_iter()
            .map(|p| (p.id, p.active))
            .collect();
        let stickers = sticker::Entity::find()
            .order_by_asc(sticker::Column::CreatedAt)
            .all(db)
            .await?;

        let mut kept: HashSet<(Uuid, StickerKind)> = HashSet::new();
        let mut doomed = Vec::new();
        let mut to_deactivate = Vec::new();

        for s in stickers {
            match products.get(&s.product_id) {
                None => {
                    report.orphaned += 1;
                    doomed.push(s);
                }
                Some(_) if s.active && !kept.insert((s.product_id, s.kind)) => {
                    report.duplicates += 1;
                    doomed.push(s);
                }
                Some(false) if s.active => to_deactivate.push(s),
                Some(_) => {}
            }
        }

        for s in doomed {
            sticker::Entity::delete_many()
                .filter(sticker::Column::Id.eq(s.id))
                .exec(db)
                .await?;
            if let Some(path) = s.image_path {
                self.media.remove(&path).await?;
            }
        }

        for s in to_deactivate {
            let path = s.image_path.clone();
            let mut model: sticker::ActiveModel = s.into();
            model.active = Set(false);
            model.image_path = Set(None);
            model.update(db).await?;
            if let Some(path) = path {
                self.media.remove(&path).await?;
            }
            report.deactivated += 1;
        }

        let referenced: HashSet<String> = sticker::Entity::find()
            .filter(sticker::Column::ImagePath.is_not_null())
            .all(db)
            .await?
            .into_iter()
            .filter_map(|s| s.image_path)
            .collect();
        for file in self.media.list(STICKER_DIR).await? {
            if !referenced.contains(&file) && self.media.remove(&file).await? {
                report.unreferenced_files += 1;
            }
        }

        info!(?report, "Sticker cleanup finished");
        Ok(report)
    }
}
