use actix_web::{http::StatusCode, web, web::ServiceConfig};
use payment_common::Cents;
use terminal_payment_engine::{
    account_objects::OnboardingUrls,
    db_types::ShopAccount,
    test_utils::{Op, ScriptedProcessor},
    traits::{BalanceSnapshot, PayoutInterval},
    ShopAccountApi,
};

use super::{
    helpers::{get_request, json, policy, post_request, shop},
    mocks::MockShopStore,
};
use crate::routes::{
    AutoWithdrawRoute,
    CreateAccountRoute,
    RequestPayoutRoute,
    StripeBalancePostRoute,
    StripeBalanceRoute,
    StripeConnectRoute,
};

fn configure(store: MockShopStore, processor: ScriptedProcessor) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        let api = ShopAccountApi::new(store, processor, OnboardingUrls::default());
        cfg.service(CreateAccountRoute::<MockShopStore, ScriptedProcessor>::new())
            .service(StripeConnectRoute::<MockShopStore, ScriptedProcessor>::new())
            .service(StripeBalanceRoute::<MockShopStore, ScriptedProcessor>::new())
            .service(StripeBalancePostRoute::<MockShopStore, ScriptedProcessor>::new())
            .service(RequestPayoutRoute::<MockShopStore, ScriptedProcessor>::new())
            .service(AutoWithdrawRoute::<MockShopStore, ScriptedProcessor>::new())
            .app_data(policy(false, false))
            .app_data(web::Data::new(api));
    }
}

fn connected(id: &str) -> ShopAccount {
    let mut shop = shop(id);
    shop.connected_account_id = Some("acct_barber".into());
    shop.payouts_enabled = true;
    shop
}

fn unconnected_store() -> MockShopStore {
    let mut store = MockShopStore::new();
    store.expect_fetch_shop().returning(|id| Ok(Some(shop(id.as_str()))));
    store
}

fn connected_store() -> MockShopStore {
    let mut store = MockShopStore::new();
    store.expect_fetch_shop().returning(|id| Ok(Some(connected(id.as_str()))));
    store
}

#[actix_web::test]
async fn create_account() {
    let _ = env_logger::try_init();
    let mut store = unconnected_store();
    store
        .expect_set_connected_account_if_absent()
        .times(1)
        .returning(|_, account_id| Ok(account_id.to_string()));
    let processor = ScriptedProcessor::new();
    let body = r#"{"shopId": "shop1"}"#;
    let (status, body) = post_request("/connect/create-account", body, configure(store, processor.clone())).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let body = json(&body);
    assert_eq!(body["success"], true);
    assert_eq!(body["accountId"], "acct_1");
    assert_eq!(processor.calls(Op::CreateAccount), 1);
}

#[actix_web::test]
async fn create_account_is_idempotent() {
    let _ = env_logger::try_init();
    let processor = ScriptedProcessor::new();
    let body = r#"{"shopId": "shop1"}"#;
    let (status, body) =
        post_request("/connect/create-account", body, configure(connected_store(), processor.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["accountId"], "acct_barber");
    assert_eq!(processor.total_calls(), 0);
}

#[actix_web::test]
async fn onboarding_link() {
    let _ = env_logger::try_init();
    let body = r#"{"shopId": "shop1"}"#;
    let (status, body) = post_request("/stripe-connect", body, configure(connected_store(), ScriptedProcessor::new())).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let body = json(&body);
    assert_eq!(body["url"], "https://connect.example.com/setup/acct_barber");
    assert_eq!(body["accountId"], "acct_barber");
}

#[actix_web::test]
async fn onboarding_unknown_shop() {
    let _ = env_logger::try_init();
    let mut store = MockShopStore::new();
    store.expect_fetch_shop().returning(|_| Ok(None));
    let body = r#"{"shopId": "nobody"}"#;
    let (status, _) = post_request("/stripe-connect", body, configure(store, ScriptedProcessor::new())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn balance_of_unconnected_shop() {
    let _ = env_logger::try_init();
    let processor = ScriptedProcessor::new();
    let (status, body) = get_request("/stripe-balance/shop1", configure(unconnected_store(), processor.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body["success"], true);
    assert_eq!(body["connected"], false);
    assert_eq!(body["available"], 0);
    assert_eq!(processor.total_calls(), 0);
}

#[actix_web::test]
async fn balance_by_post() {
    let _ = env_logger::try_init();
    let processor = ScriptedProcessor::new();
    processor.set_balance(BalanceSnapshot { available: Cents::from(5_000), pending: Cents::from(2_500) });
    processor.add_charge(Cents::from(11_000), true);
    processor.add_charge(Cents::from(4_000), false);
    processor.add_payout(Cents::from(3_000));
    let (status, body) = post_request("/stripe-balance/shop1", "", configure(connected_store(), processor)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let body = json(&body);
    assert_eq!(body["connected"], true);
    assert_eq!(body["available"], 5_000);
    assert_eq!(body["pending"], 2_500);
    assert_eq!(body["current"], 7_500);
    assert_eq!(body["total_revenue"], 11_000);
    assert_eq!(body["recent_payout"], 3_000);
    assert_eq!(body["payouts_enabled"], true);
}

#[actix_web::test]
async fn payout_needs_a_connected_account() {
    let _ = env_logger::try_init();
    let processor = ScriptedProcessor::new();
    let (status, body) =
        post_request("/stripe-request-payout/shop1", "", configure(unconnected_store(), processor.clone())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json(&body)["error"].as_str().unwrap().contains("no connected account"));
    assert_eq!(processor.total_calls(), 0);
}

#[actix_web::test]
async fn payout_of_the_whole_balance() {
    let _ = env_logger::try_init();
    let processor = ScriptedProcessor::new();
    processor.set_balance(BalanceSnapshot { available: Cents::from(5_000), pending: Cents::default() });
    let (status, body) =
        post_request("/stripe-request-payout/shop1", "", configure(connected_store(), processor.clone())).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(json(&body)["payout"]["amount"], 5_000);
    assert_eq!(processor.calls(Op::CreatePayout), 1);
}

#[actix_web::test]
async fn payout_of_a_given_amount() {
    let _ = env_logger::try_init();
    let processor = ScriptedProcessor::new();
    let body = r#"{"amount": 1200}"#;
    let (status, body) =
        post_request("/stripe-request-payout/shop1", body, configure(connected_store(), processor.clone())).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(json(&body)["payout"]["amount"], 1_200);
    assert_eq!(processor.calls(Op::Balance), 0);
}

#[actix_web::test]
async fn payout_with_malformed_body() {
    let _ = env_logger::try_init();
    let processor = ScriptedProcessor::new();
    let body = r#"{"amount": "#;
    let (status, _) =
        post_request("/stripe-request-payout/shop1", body, configure(connected_store(), processor.clone())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(processor.total_calls(), 0);
}

#[actix_web::test]
async fn payout_with_nothing_available() {
    let _ = env_logger::try_init();
    let (status, _) =
        post_request("/stripe-request-payout/shop1", "", configure(connected_store(), ScriptedProcessor::new())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn auto_withdraw() {
    let _ = env_logger::try_init();
    let mut store = connected_store();
    store.expect_set_payouts_enabled().withf(|_, enabled| !*enabled).times(1).returning(|_, _| Ok(()));
    let processor = ScriptedProcessor::new();
    let body = r#"{"enabled": false}"#;
    let (status, body) =
        post_request("/stripe-auto-withdraw/shop1", body, configure(store, processor.clone())).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(json(&body)["interval"], "manual");
    assert_eq!(processor.payout_interval(), Some(PayoutInterval::Manual));
}

#[actix_web::test]
async fn auto_withdraw_needs_a_flag() {
    let _ = env_logger::try_init();
    let (status, _) =
        post_request("/stripe-auto-withdraw/shop1", "{}", configure(connected_store(), ScriptedProcessor::new())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
