use actix_web::{http::StatusCode, web, web::ServiceConfig};
use chrono::Utc;
use payment_common::Secret;
use terminal_payment_engine::{
    db_types::InvoiceStatus,
    events::EventProducers,
    helpers::sign_payload,
    test_utils::{prepare_test_env, random_db_path, tear_down, ScriptedProcessor},
    InvoiceManagement,
    PaymentDispatchApi,
    PaymentMode,
    SqliteDatabase,
    WebhookApi,
};

use super::helpers::{bind_reader, fast_policy, invoice_id, json, post_raw, seed_invoice, seed_shop, shop_id};
use crate::{helpers::STRIPE_SIGNATURE_HEADER, routes::StripeWebhookRoute};

const SECRET: &str = "whsec_endpoint_tests";

fn configure(db: &SqliteDatabase) -> impl FnOnce(&mut ServiceConfig) {
    let api = WebhookApi::new(db.clone(), EventProducers::default(), Secret::new(SECRET.to_string()));
    move |cfg| {
        cfg.service(StripeWebhookRoute::<SqliteDatabase>::new()).app_data(web::Data::new(api));
    }
}

fn succeeded(intent_id: &str, invoice: &str) -> Vec<u8> {
    serde_json::json!({
        "id": format!("evt_{intent_id}"),
        "type": "payment_intent.succeeded",
        "data": { "object": { "id": intent_id, "metadata": { "invoiceId": invoice, "shopId": "shop1" } } }
    })
    .to_string()
    .into_bytes()
}

fn signature(payload: &[u8]) -> Vec<(&'static str, String)> {
    let header = sign_payload(SECRET, Utc::now().timestamp(), payload).expect("Error signing payload");
    vec![(STRIPE_SIGNATURE_HEADER, header)]
}

async fn dispatched_payment(db: &SqliteDatabase) -> String {
    seed_shop(db, "shop1").await;
    bind_reader(db, "shop1", "tmr_reader_1").await;
    seed_invoice(db, "shop1", "inv1").await;
    let api = PaymentDispatchApi::new(db.clone(), ScriptedProcessor::new(), EventProducers::default(), fast_policy());
    let dispatched = api.create_payment(&invoice_id("inv1"), &shop_id("shop1"), PaymentMode::Live).await.unwrap();
    dispatched.payment_intent
}

#[actix_web::test]
async fn webhook_without_signature() {
    let db = prepare_test_env(&random_db_path()).await;
    let intent_id = dispatched_payment(&db).await;
    let (status, body) = post_raw("/webhooks/stripe", succeeded(&intent_id, "inv1"), &[], configure(&db)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json(&body)["error"].is_string());
    let invoice = db.fetch_invoice(&invoice_id("inv1")).await.unwrap().unwrap();
    assert_ne!(invoice.status, InvoiceStatus::Paid);
    tear_down(db).await;
}

#[actix_web::test]
async fn webhook_with_a_forged_signature() {
    let db = prepare_test_env(&random_db_path()).await;
    let intent_id = dispatched_payment(&db).await;
    let payload = succeeded(&intent_id, "inv1");
    let forged = sign_payload("whsec_someone_else", Utc::now().timestamp(), &payload).unwrap();
    let headers = [(STRIPE_SIGNATURE_HEADER, forged)];
    let (status, _) = post_raw("/webhooks/stripe", payload, &headers, configure(&db)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let invoice = db.fetch_invoice(&invoice_id("inv1")).await.unwrap().unwrap();
    assert_ne!(invoice.status, InvoiceStatus::Paid);
    tear_down(db).await;
}

#[actix_web::test]
async fn webhook_pays_the_invoice() {
    let db = prepare_test_env(&random_db_path()).await;
    let intent_id = dispatched_payment(&db).await;
    let payload = succeeded(&intent_id, "inv1");
    let (status, body) = post_raw("/webhooks/stripe", payload.clone(), &signature(&payload), configure(&db)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(json(&body)["received"], true);
    let invoice = db.fetch_invoice(&invoice_id("inv1")).await.unwrap().unwrap();
    assert_eq!(invoice.status, InvoiceStatus::Paid);
    assert_eq!(invoice.payment_intent_id.as_deref(), Some(intent_id.as_str()));

    // Redelivery is acknowledged and changes nothing
    let paid_date = invoice.paid_date;
    let (status, _) = post_raw("/webhooks/stripe", payload.clone(), &signature(&payload), configure(&db)).await;
    assert_eq!(status, StatusCode::OK);
    let invoice = db.fetch_invoice(&invoice_id("inv1")).await.unwrap().unwrap();
    assert_eq!(invoice.paid_date, paid_date);
    tear_down(db).await;
}

#[actix_web::test]
async fn signed_but_malformed_webhooks_are_acknowledged() {
    let db = prepare_test_env(&random_db_path()).await;
    let payload = b"{\"id\": \"evt_1\", \"type\": ".to_vec();
    let (status, body) = post_raw("/webhooks/stripe", payload.clone(), &signature(&payload), configure(&db)).await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let payload = serde_json::json!({ "id": "evt_2", "type": "account.updated", "data": { "object": {} } })
        .to_string()
        .into_bytes();
    let (status, _) = post_raw("/webhooks/stripe", payload.clone(), &signature(&payload), configure(&db)).await;
    assert_eq!(status, StatusCode::OK);
    tear_down(db).await;
}
