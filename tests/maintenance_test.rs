//! Reset and sticker cleanup run by the admin binary.

mod common;

use std::sync::Arc;

use assettrack_api::{
    entities::sticker,
    media::STICKER_DIR,
    services::{maintenance::MaintenanceService, product_types::ProductTypeService},
};
use common::{id_of, TestApp};
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use serde_json::json;

fn maintenance(app: &TestApp) -> MaintenanceService {
    MaintenanceService::new(app.state.db.clone(), app.state.media.clone())
}

#[tokio::test]
async fn reset_empties_every_table_and_the_sticker_directory() {
    let app = TestApp::new().await;
    let fixture = app.seed_fixture("M1").await;
    let product = app.seed_product(&fixture, "Laptop").await;
    app.post(
        &format!("/api/v1/products/{}/stickers", id_of(&product)),
        json!({ "kinds": ["qr", "full_label"] }),
    )
    .await;
    app.deliver(&fixture, id_of(&product)).await;

    let report = maintenance(&app).reset().await.expect("reset");
    assert_eq!(report.files_removed, 2);
    let deleted = |table: &str| {
        report
            .tables
            .iter()
            .find(|(name, _)| name == table)
            .map(|(_, rows)| *rows)
            .unwrap()
    };
    assert_eq!(deleted("products"), 1);
    assert_eq!(deleted("stickers"), 2);
    assert_eq!(deleted("assignment_events"), 1);

    let (_, products) = app.get("/api/v1/products?include_inactive=true").await;
    assert_eq!(products["data"]["total"], 0);
    let (_, categories) = app.get("/api/v1/categories").await;
    assert_eq!(categories["data"]["total"], 0);
    assert!(app.state.media.list(STICKER_DIR).await.unwrap().is_empty());
}

#[tokio::test]
async fn clean_stickers_deactivates_stickers_of_inactive_products() {
    let app = TestApp::new().await;
    let fixture = app.seed_fixture("M2").await;
    let kept = app.seed_product(&fixture, "Kept").await;
    let removed = app.seed_product(&fixture, "Removed").await;
    for product in [&kept, &removed] {
        app.post(
            &format!("/api/v1/products/{}/stickers", id_of(product)),
            json!({ "kinds": ["qr"] }),
        )
        .await;
    }
    app.delete(&format!("/api/v1/products/{}", id_of(&removed)))
        .await;

    // a stray file no sticker row points at
    app.state
        .media
        .write(&format!("{STICKER_DIR}/QR-STRAY.png"), b"stray")
        .await
        .unwrap();

    let report = maintenance(&app).clean_stickers().await.expect("clean");
    assert_eq!(report.deactivated, 1);
    assert_eq!(report.orphaned, 0);
    assert_eq!(report.duplicates, 0);
    assert_eq!(report.unreferenced_files, 1);

    let stickers = sticker::Entity::find()
        .all(&*app.state.db)
        .await
        .unwrap();
    let active: Vec<_> = stickers.iter().filter(|s| s.active).collect();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].product_id, id_of(&kept));
    assert_eq!(app.state.media.list(STICKER_DIR).await.unwrap().len(), 1);

    // a second pass finds nothing left to do
    let again = maintenance(&app).clean_stickers().await.unwrap();
    assert_eq!(again, Default::default());
}

#[tokio::test]
async fn clean_stickers_drops_duplicate_active_rows() {
    let app = TestApp::new().await;
    let fixture = app.seed_fixture("M3").await;
    let product = app.seed_product(&fixture, "Printer").await;
    let (_, body) = app
        .post(
            &format!("/api/v1/products/{}/stickers", id_of(&product)),
            json!({ "kinds": ["qr"] }),
        )
        .await;
    let original = &body["data"][0]["sticker"];

    // a second active qr row for the same product, as an import might leave behind
    sticker::ActiveModel {
        id: Set(uuid::Uuid::new_v4()),
        product_id: Set(id_of(&product)),
        kind: Set(sticker::StickerKind::Qr),
        code: Set(format!("{}-DUP", original["code"].as_str().unwrap())),
        payload: Set("duplicate".to_string()),
        image_path: Set(None),
        ..Default::default()
    }
    .insert(&*app.state.db)
    .await
    .unwrap();

    let report = maintenance(&app).clean_stickers().await.unwrap();
    assert_eq!(report.duplicates, 1);

    let remaining = sticker::Entity::find().all(&*app.state.db).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, id_of(original));
}

#[tokio::test]
async fn default_product_types_are_seeded_once() {
    let app = TestApp::new().await;
    let service = ProductTypeService::new(app.state.db.clone(), Arc::clone(&app.state.event_sender));

    let created = service.seed_defaults().await.unwrap();
    assert!(!created.is_empty());

    let again = service.seed_defaults().await.unwrap();
    assert!(again.is_empty());

    let (_, listed) = app.get("/api/v1/product-types").await;
    assert_eq!(listed["data"]["total"], created.len());
}
