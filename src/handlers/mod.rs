use std::sync::Arc;

use crate::{
    config::AppConfig,
    db::DbPool,
    events::EventSender,
    media::MediaStore,
    services::{
        assignments::AssignmentService, master_data::MasterDataService,
        product_types::ProductTypeService, products::ProductService, reports::ReportService,
        stickers::StickerService,
    },
};

pub mod assignments;
pub mod common;
pub mod extract;
pub mod master_data;
pub mod product_types;
pub mod products;
pub mod reports;
pub mod stickers;

// Re-export AppState for use by handlers
pub use crate::AppState;

/// Container for the services behind the HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub master_data: Arc<MasterDataService>,
    pub product_types: Arc<ProductTypeService>,
    pub products: Arc<ProductService>,
    pub assignments: Arc<AssignmentService>,
    pub stickers: Arc<StickerService>,
    pub reports: Arc<ReportService>,
}

impl AppServices {
    /// Create a new AppServices instance sharing one pool and event channel
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        media: Arc<MediaStore>,
        config: &AppConfig,
    ) -> Self {
        Self {
            master_data: Arc::new(MasterDataService::new(
                db_pool.clone(),
                event_sender.clone(),
            )),
            product_types: Arc::new(ProductTypeService::new(
                db_pool.clone(),
                event_sender.clone(),
            )),
            products: Arc::new(ProductService::new(db_pool.clone(), event_sender.clone())),
            assignments: Arc::new(AssignmentService::new(
                db_pool.clone(),
                event_sender.clone(),
            )),
            stickers: Arc::new(StickerService::new(
                db_pool.clone(),
                event_sender.clone(),
                media,
            )),
            reports: Arc::new(ReportService::new(
                db_pool,
                event_sender,
                config.warranty_alert_days,
                config.recent_activity_days,
            )),
        }
    }
}
