//! Sticker issuance, images and scan lookup.

mod common;

use std::collections::HashSet;

use axum::http::StatusCode;
use common::{id_of, TestApp};
use serde_json::json;

const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G'];

#[tokio::test]
async fn generation_is_idempotent_per_kind() {
    let app = TestApp::new().await;
    let fixture = app.seed_fixture("S1").await;
    let product = app.seed_product(&fixture, "ThinkPad T14").await;
    let uri = format!("/api/v1/products/{}/stickers", id_of(&product));

    let (status, first) = app
        .post(&uri, json!({ "kinds": ["qr", "barcode", "full_label"] }))
        .await;
    assert_eq!(status, StatusCode::OK, "{first}");
    let first = first["data"].as_array().unwrap().clone();
    assert_eq!(first.len(), 3);
    assert!(first.iter().all(|g| g["created"] == true));

    let codes: HashSet<&str> = first
        .iter()
        .map(|g| g["sticker"]["code"].as_str().unwrap())
        .collect();
    assert_eq!(codes.len(), 3);

    let (_, again) = app.post(&uri, json!({ "kinds": ["qr"] })).await;
    let again = &again["data"][0];
    assert_eq!(again["created"], false);
    assert_eq!(again["sticker"]["id"], first[0]["sticker"]["id"]);

    let (_, listed) = app.get(&uri).await;
    assert_eq!(listed["data"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn empty_request_issues_a_qr_sticker() {
    let app = TestApp::new().await;
    let fixture = app.seed_fixture("S2").await;
    let product = app.seed_product(&fixture, "Latitude").await;

    let (status, body) = app
        .post(
            &format!("/api/v1/products/{}/stickers", id_of(&product)),
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let sticker = &body["data"][0]["sticker"];
    assert_eq!(sticker["kind"], "qr");
    let serial = product["serial_number"].as_str().unwrap();
    assert_eq!(sticker["code"], format!("QR-{serial}"));
}

#[tokio::test]
async fn images_are_served_with_their_content_type() {
    let app = TestApp::new().await;
    let fixture = app.seed_fixture("S3").await;
    let product = app.seed_product(&fixture, "Projector").await;

    let (_, body) = app
        .post(
            &format!("/api/v1/products/{}/stickers", id_of(&product)),
            json!({ "kinds": ["qr", "simple_label"] }),
        )
        .await;
    let qr = id_of(&body["data"][0]["sticker"]);
    let label = id_of(&body["data"][1]["sticker"]);

    let (status, content_type, bytes) = app
        .get_bytes(&format!("/api/v1/stickers/{qr}/image"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type, "image/png");
    assert!(bytes.starts_with(PNG_MAGIC));

    let (status, content_type, bytes) = app
        .get_bytes(&format!("/api/v1/stickers/{label}/image"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type, "application/pdf");
    assert!(bytes.starts_with(b"%PDF"));
}

#[tokio::test]
async fn lookup_resolves_the_product_and_holder() {
    let app = TestApp::new().await;
    let fixture = app.seed_fixture("S4").await;
    let product = app.seed_product(&fixture, "Headset").await;
    let product_id = id_of(&product);

    let (_, body) = app
        .post(
            &format!("/api/v1/products/{product_id}/stickers"),
            json!({ "kinds": ["barcode"] }),
        )
        .await;
    let code = body["data"][0]["sticker"]["code"]
        .as_str()
        .unwrap()
        .to_string();

    app.deliver(&fixture, product_id).await;

    let (status, found) = app
        .get(&format!(
            "/api/v1/stickers/lookup/{}",
            code.to_ascii_lowercase()
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(found["data"]["product"]["id"], product["id"]);
    assert_eq!(found["data"]["holder"]["holder"], "employee");

    let (status, _) = app.get("/api/v1/stickers/lookup/QR-NOPE").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn printing_and_deactivation() {
    let app = TestApp::new().await;
    let fixture = app.seed_fixture("S5").await;
    let product = app.seed_product(&fixture, "Keyboard").await;
    let uri = format!("/api/v1/products/{}/stickers", id_of(&product));

    let (_, body) = app.post(&uri, json!({ "kinds": ["qr"] })).await;
    let sticker = &body["data"][0]["sticker"];
    let id = id_of(sticker);
    let code = sticker["code"].as_str().unwrap().to_string();

    let (status, printed) = app
        .post(&format!("/api/v1/stickers/{id}/printed"), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(printed["data"]["printed_at"].is_string());

    let (status, deactivated) = app.delete(&format!("/api/v1/stickers/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deactivated["data"]["active"], false);

    let (status, _) = app
        .get(&format!("/api/v1/stickers/lookup/{code}"))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, active) = app.get(&uri).await;
    assert_eq!(active["data"].as_array().unwrap().len(), 0);
    let (_, everything) = app.get(&format!("{uri}?include_inactive=true")).await;
    assert_eq!(everything["data"].as_array().unwrap().len(), 1);

    // regenerating revives the same row
    let (_, revived) = app.post(&uri, json!({ "kinds": ["qr"] })).await;
    assert_eq!(revived["data"][0]["sticker"]["id"], json!(id));
    assert_eq!(revived["data"][0]["sticker"]["active"], true);
}

#[tokio::test]
async fn inactive_products_get_no_stickers() {
    let app = TestApp::new().await;
    let fixture = app.seed_fixture("S6").await;
    let product = app.seed_product(&fixture, "Mouse").await;
    let id = id_of(&product);

    app.delete(&format!("/api/v1/products/{id}")).await;

    let (status, _) = app
        .post(&format!("/api/v1/products/{id}/stickers"), json!({}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn serial_changes_move_stickers_to_the_new_code() {
    let app = TestApp::new().await;
    let fixture = app.seed_fixture("S7").await;
    let first = app.seed_product(&fixture, "ThinkPad X1").await;
    let first_id = id_of(&first);
    let old_serial = first["serial_number"].as_str().unwrap().to_string();
    let uri = format!("/api/v1/products/{first_id}/stickers");

    let (_, body) = app.post(&uri, json!({ "kinds": ["qr"] })).await;
    let original = body["data"][0]["sticker"].clone();
    assert_eq!(original["code"], format!("QR-{old_serial}"));

    let (status, _) = app
        .put(
            &format!("/api/v1/products/{first_id}"),
            json!({
                "category_id": fixture.category_id,
                "brand_id": fixture.brand_id,
                "location_id": fixture.location_id,
                "model": "ThinkPad X1",
                "serial_number": "RENAMED01",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    // the printed code no longer resolves
    let (status, _) = app
        .get(&format!("/api/v1/stickers/lookup/QR-{old_serial}"))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, again) = app.post(&uri, json!({ "kinds": ["qr"] })).await;
    assert_eq!(status, StatusCode::OK);
    let again = &again["data"][0];
    assert_eq!(again["created"], false);
    assert_eq!(again["sticker"]["id"], original["id"]);
    assert_eq!(again["sticker"]["code"], "QR-RENAMED01");

    let (_, everything) = app.get(&format!("{uri}?include_inactive=true")).await;
    let codes: Vec<&str> = everything["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["code"].as_str().unwrap())
        .collect();
    assert_eq!(codes, vec!["QR-RENAMED01"]);

    // the freed serial and its code can go to another product
    let second = app
        .create(
            "/api/v1/products",
            json!({
                "category_id": fixture.category_id,
                "brand_id": fixture.brand_id,
                "location_id": fixture.location_id,
                "model": "ThinkPad T14",
                "serial_number": old_serial,
            }),
        )
        .await;
    let (status, body) = app
        .post(
            &format!("/api/v1/products/{}/stickers", id_of(&second)),
            json!({ "kinds": ["qr"] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"][0]["created"], true);

    let (_, found) = app
        .get(&format!("/api/v1/stickers/lookup/QR-{old_serial}"))
        .await;
    assert_eq!(found["data"]["product"]["id"], second["id"]);
}
