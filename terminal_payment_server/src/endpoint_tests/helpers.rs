use actix_web::{body::MessageBody, http::StatusCode, test, test::TestRequest, web, web::ServiceConfig, App};
use log::debug;
use serde_json::Value;
use terminal_payment_engine::{
    db_types::{
        BindResult,
        InvoiceId,
        LineItem,
        NewInvoice,
        NewShop,
        ShopAccount,
        ShopAddress,
        ShopId,
        TerminalBinding,
        TerminalStatus,
    },
    payment_objects::{DispatchPolicy, RetryPolicy},
    InvoiceManagement,
    ShopAccountManagement,
    SqliteDatabase,
};

use crate::{
    config::TestModePolicy,
    helpers::{json_config, path_config},
};

pub async fn get_request(path: &str, configure: impl FnOnce(&mut ServiceConfig)) -> (StatusCode, String) {
    call(TestRequest::get().uri(path), configure).await
}

pub async fn post_request(path: &str, body: &str, configure: impl FnOnce(&mut ServiceConfig)) -> (StatusCode, String) {
    let req = TestRequest::post()
        .uri(path)
        .insert_header(("Content-Type", "application/json"))
        .set_payload(body.to_string());
    call(req, configure).await
}

pub async fn post_raw(
    path: &str,
    body: Vec<u8>,
    headers: &[(&'static str, String)],
    configure: impl FnOnce(&mut ServiceConfig),
) -> (StatusCode, String) {
    let mut req = TestRequest::post().uri(path).set_payload(body);
    for (name, value) in headers {
        req = req.insert_header((*name, value.clone()));
    }
    call(req, configure).await
}

async fn call(req: TestRequest, configure: impl FnOnce(&mut ServiceConfig)) -> (StatusCode, String) {
    let app = App::new().app_data(path_config()).app_data(json_config()).configure(configure);
    let service = test::init_service(app).await;
    debug!("Making request");
    let res = test::call_service(&service, req.to_request()).await;
    let status = res.status();
    let bytes = res.into_body().try_into_bytes().unwrap_or_default();
    (status, String::from_utf8_lossy(&bytes).into_owned())
}

pub fn json(body: &str) -> Value {
    serde_json::from_str(body).unwrap_or_else(|e| panic!("Response is not JSON ({e}): {body}"))
}

pub fn policy(global: bool, allow_per_request: bool) -> web::Data<TestModePolicy> {
    web::Data::new(TestModePolicy::new(global, allow_per_request))
}

//--------------------------------------    Seed data    ----------------------------------------------------

pub fn shop_id(id: &str) -> ShopId {
    id.parse().expect("valid shop id")
}

pub fn invoice_id(id: &str) -> InvoiceId {
    id.parse().expect("valid invoice id")
}

/// A shop row as the store would return it.
pub fn shop(id: &str) -> ShopAccount {
    let now = chrono::Utc::now();
    ShopAccount {
        shop_id: shop_id(id),
        name: Some(format!("Barber {id}")),
        address_line1: Some("1 Main St".into()),
        city: Some("Springfield".into()),
        state: Some("IL".into()),
        postal_code: Some("62701".into()),
        country: Some("US".into()),
        connected_account_id: None,
        payouts_enabled: false,
        terminal_id: None,
        terminal_serial: None,
        terminal_model: None,
        terminal_status: None,
        location_id: None,
        created_at: now,
        updated_at: now,
    }
}

pub async fn seed_shop(db: &SqliteDatabase, id: &str) -> ShopAccount {
    let address = ShopAddress {
        line1: "1 Main St".into(),
        city: "Springfield".into(),
        state: "IL".into(),
        postal_code: "62701".into(),
        country: "US".into(),
    };
    let shop = NewShop::new(shop_id(id)).with_name(format!("Barber {id}")).with_address(address);
    db.upsert_shop(shop).await.expect("Error creating shop")
}

pub async fn bind_reader(db: &SqliteDatabase, id: &str, terminal_id: &str) {
    let binding = TerminalBinding {
        terminal_id: terminal_id.into(),
        serial: format!("WSC-{terminal_id}"),
        model: "bbpos_wisepos_e".into(),
        status: TerminalStatus::Online,
        location_id: "tml_1".into(),
    };
    match db.bind_terminal_if_unbound(&shop_id(id), &binding).await.expect("Error binding reader") {
        BindResult::Bound(_) => {},
        BindResult::AlreadyBound(t) => panic!("Shop {id} is already bound to {t}"),
    }
}

/// Two haircuts at $50 plus 10% tax: $110.00 due.
pub async fn seed_invoice(db: &SqliteDatabase, shop: &str, id: &str) {
    let items = vec![LineItem::new(2.0, 50.0)];
    let invoice = NewInvoice::new(invoice_id(id), shop_id(shop), items).with_tax_rate(10.0);
    db.insert_invoice(invoice).await.expect("Error creating invoice");
}

pub fn fast_policy() -> DispatchPolicy {
    DispatchPolicy {
        dispatch_timeout: std::time::Duration::from_millis(200),
        cancel_retry: RetryPolicy { max_attempts: 2, backoff: std::time::Duration::from_millis(10) },
        simulated_delay: std::time::Duration::from_millis(10),
        ..DispatchPolicy::default()
    }
}
