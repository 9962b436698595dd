#![allow(dead_code)]
use std::time::Duration;

use terminal_payment_engine::{
    db_types::{
        BindResult,
        Invoice,
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
    test_utils::{prepare_test_env, random_db_path},
    InvoiceManagement,
    ShopAccountManagement,
    SqliteDatabase,
};

pub async fn new_db() -> SqliteDatabase {
    prepare_test_env(&random_db_path()).await
}

pub fn shop_id(id: &str) -> ShopId {
    id.parse().expect("valid shop id")
}

pub fn invoice_id(id: &str) -> InvoiceId {
    id.parse().expect("valid invoice id")
}

pub fn address() -> ShopAddress {
    ShopAddress {
        line1: "1 Main St".into(),
        city: "Springfield".into(),
        state: "IL".into(),
        postal_code: "62701".into(),
        country: "US".into(),
    }
}

pub async fn seed_shop(db: &SqliteDatabase, id: &str) -> ShopAccount {
    let shop = NewShop::new(shop_id(id)).with_name(format!("Barber {id}")).with_address(address());
    db.upsert_shop(shop).await.expect("Error creating shop")
}

pub async fn seed_connected_shop(db: &SqliteDatabase, id: &str, account_id: &str) -> ShopAccount {
    seed_shop(db, id).await;
    db.set_connected_account_if_absent(&shop_id(id), account_id).await.expect("Error linking account");
    db.fetch_shop(&shop_id(id)).await.unwrap().unwrap()
}

pub async fn bind_reader(db: &SqliteDatabase, id: &str, terminal_id: &str) -> ShopAccount {
    let binding = TerminalBinding {
        terminal_id: terminal_id.into(),
        serial: format!("WSC-{terminal_id}"),
        model: "bbpos_wisepos_e".into(),
        status: TerminalStatus::Online,
        location_id: "tml_1".into(),
    };
    match db.bind_terminal_if_unbound(&shop_id(id), &binding).await.expect("Error binding reader") {
        BindResult::Bound(shop) => shop,
        BindResult::AlreadyBound(t) => panic!("Shop {id} is already bound to {t}"),
    }
}

/// Two haircuts at $50 plus 10% tax: $110.00 due.
pub async fn seed_invoice(db: &SqliteDatabase, shop: &str, id: &str) -> Invoice {
    let items = vec![LineItem::new(2.0, 50.0)];
    let invoice = NewInvoice::new(invoice_id(id), shop_id(shop), items).with_tax_rate(10.0);
    db.insert_invoice(invoice).await.expect("Error creating invoice")
}

/// Short timeouts so that failure paths run quickly.
pub fn fast_policy() -> DispatchPolicy {
    DispatchPolicy {
        dispatch_timeout: Duration::from_millis(200),
        cancel_retry: RetryPolicy { max_attempts: 3, backoff: Duration::from_millis(10) },
        simulated_delay: Duration::from_millis(10),
        ..DispatchPolicy::default()
    }
}
