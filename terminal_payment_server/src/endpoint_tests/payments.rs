use actix_web::{http::StatusCode, web, web::ServiceConfig};
use terminal_payment_engine::{
    db_types::InvoiceStatus,
    events::EventProducers,
    test_utils::{prepare_test_env, random_db_path, tear_down, Fault, Op, ScriptedProcessor},
    InvoiceManagement,
    PaymentDispatchApi,
    SqliteDatabase,
};

use super::helpers::{bind_reader, fast_policy, invoice_id, json, policy, post_request, seed_invoice, seed_shop};
use crate::{config::TestModePolicy, routes::CreatePaymentRoute};

fn configure(
    db: &SqliteDatabase,
    processor: &ScriptedProcessor,
    test_mode: web::Data<TestModePolicy>,
) -> impl FnOnce(&mut ServiceConfig) {
    let api = PaymentDispatchApi::new(db.clone(), processor.clone(), EventProducers::default(), fast_policy());
    move |cfg| {
        cfg.service(CreatePaymentRoute::<SqliteDatabase, ScriptedProcessor>::new())
            .app_data(test_mode)
            .app_data(web::Data::new(api));
    }
}

async fn shop_with_reader(reader: &str) -> SqliteDatabase {
    let db = prepare_test_env(&random_db_path()).await;
    seed_shop(&db, "shop1").await;
    bind_reader(&db, "shop1", reader).await;
    seed_invoice(&db, "shop1", "inv1").await;
    db
}

const PAY_INV1: &str = r#"{"invoiceId": "inv1", "shopId": "shop1"}"#;

#[actix_web::test]
async fn create_payment() {
    let db = shop_with_reader("tmr_reader_1").await;
    let processor = ScriptedProcessor::new();
    let (status, body) =
        post_request("/terminal/create-payment", PAY_INV1, configure(&db, &processor, policy(false, false))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let body = json(&body);
    assert_eq!(body["success"], true);
    assert_eq!(body["amount"], 11_000);
    assert_eq!(body["terminal_id"], "tmr_reader_1");
    assert!(body["paymentIntent"].as_str().unwrap().starts_with("pi_"));
    assert_eq!(processor.calls(Op::ProcessIntent), 1);
    // Only the webhook pays the invoice
    let invoice = db.fetch_invoice(&invoice_id("inv1")).await.unwrap().unwrap();
    assert_ne!(invoice.status, InvoiceStatus::Paid);

    // The reader is still busy with the first intent
    let (status, _) =
        post_request("/terminal/create-payment", PAY_INV1, configure(&db, &processor, policy(false, false))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(processor.calls(Op::CreateIntent), 1);
    tear_down(db).await;
}

#[actix_web::test]
async fn create_payment_unknown_invoice() {
    let db = shop_with_reader("tmr_reader_1").await;
    let processor = ScriptedProcessor::new();
    let body = r#"{"invoiceId": "inv404", "shopId": "shop1"}"#;
    let (status, _) =
        post_request("/terminal/create-payment", body, configure(&db, &processor, policy(false, false))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(processor.total_calls(), 0);
    tear_down(db).await;
}

#[actix_web::test]
async fn create_payment_without_a_reader() {
    let db = prepare_test_env(&random_db_path()).await;
    seed_shop(&db, "shop1").await;
    seed_invoice(&db, "shop1", "inv1").await;
    let processor = ScriptedProcessor::new();
    let (status, body) =
        post_request("/terminal/create-payment", PAY_INV1, configure(&db, &processor, policy(false, false))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json(&body)["error"].as_str().unwrap().contains("shop1"));
    assert_eq!(processor.total_calls(), 0);
    tear_down(db).await;
}

#[actix_web::test]
async fn create_payment_reader_rejects_the_intent() {
    let db = shop_with_reader("tmr_reader_1").await;
    let processor = ScriptedProcessor::new();
    processor.fail(Op::ProcessIntent, Fault::Reject("reader is busy".into()), 1);
    let (status, _) =
        post_request("/terminal/create-payment", PAY_INV1, configure(&db, &processor, policy(false, false))).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(processor.calls(Op::CancelIntent), 1);

    // The slot was released, so the payment can be retried
    let (status, body) =
        post_request("/terminal/create-payment", PAY_INV1, configure(&db, &processor, policy(false, false))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    tear_down(db).await;
}

#[actix_web::test]
async fn test_mode_payments() {
    let db = shop_with_reader("sim_tmr_1").await;
    let processor = ScriptedProcessor::new();
    let body = r#"{"invoiceId": "inv1", "shopId": "shop1", "testMode": true}"#;

    // The server does not allow per-request test mode, so this is a live payment on a simulated reader
    let (status, _) =
        post_request("/terminal/create-payment", body, configure(&db, &processor, policy(false, false))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) =
        post_request("/terminal/create-payment", body, configure(&db, &processor, policy(false, true))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let body = json(&body);
    assert!(body["paymentIntent"].as_str().unwrap().starts_with("sim_pi_"));
    assert!(body["message"].as_str().unwrap().contains("Test payment"));
    assert_eq!(processor.total_calls(), 0);
    let invoice = db.fetch_invoice(&invoice_id("inv1")).await.unwrap().unwrap();
    assert_eq!(invoice.status, InvoiceStatus::Paid);

    // Paid invoices cannot be charged again
    let (status, _) =
        post_request("/terminal/create-payment", PAY_INV1, configure(&db, &processor, policy(true, false))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    tear_down(db).await;
}

#[actix_web::test]
async fn live_and_test_payments_have_the_same_shape() {
    let keys = |body: &str| {
        let mut keys = json(body).as_object().expect("a JSON object").keys().cloned().collect::<Vec<_>>();
        keys.sort();
        keys
    };
    let live_db = shop_with_reader("tmr_reader_1").await;
    let processor = ScriptedProcessor::new();
    let (status, live) =
        post_request("/terminal/create-payment", PAY_INV1, configure(&live_db, &processor, policy(false, false))).await;
    assert_eq!(status, StatusCode::OK, "{live}");

    let test_db = shop_with_reader("sim_tmr_1").await;
    let (status, test) =
        post_request("/terminal/create-payment", PAY_INV1, configure(&test_db, &processor, policy(true, false))).await;
    assert_eq!(status, StatusCode::OK, "{test}");

    assert_eq!(keys(&live), keys(&test));
    assert_ne!(json(&live)["paymentIntent"], json(&test)["paymentIntent"]);
    tear_down(live_db).await;
    tear_down(test_db).await;
}
