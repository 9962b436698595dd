use actix_web::{http::StatusCode, web, web::ServiceConfig};
use terminal_payment_engine::{
    db_types::{BindResult, TerminalStatus},
    test_utils::{Op, ScriptedProcessor},
    TerminalApi,
};

use super::{
    helpers::{get_request, json, policy, post_request, shop},
    mocks::MockShopStore,
};
use crate::routes::{RegisterTerminalRoute, TerminalStatusRoute};

fn configure(store: MockShopStore, processor: ScriptedProcessor) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        let api = TerminalApi::new(store, processor);
        cfg.service(RegisterTerminalRoute::<MockShopStore, ScriptedProcessor>::new())
            .service(TerminalStatusRoute::<MockShopStore, ScriptedProcessor>::new())
            .app_data(policy(false, false))
            .app_data(web::Data::new(api));
    }
}

#[actix_web::test]
async fn register_terminal() {
    let _ = env_logger::try_init();
    let mut store = MockShopStore::new();
    store.expect_fetch_shop().returning(|id| Ok(Some(shop(id.as_str()))));
    store.expect_fetch_shop_for_terminal().returning(|_| Ok(None));
    store.expect_bind_terminal_if_unbound().times(1).returning(|id, binding| {
        assert_eq!(binding.terminal_id, "tmr_reader_1");
        let mut bound = shop(id.as_str());
        bound.terminal_id = Some(binding.terminal_id.clone());
        Ok(BindResult::Bound(bound))
    });
    let processor = ScriptedProcessor::new();
    let body = r#"{"shopId": "shop1", "registrationCode": "abcde-12345"}"#;
    let (status, body) = post_request("/terminal/register", body, configure(store, processor.clone())).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let body = json(&body);
    assert_eq!(body["success"], true);
    assert_eq!(body["reader"]["id"], "tmr_reader_1");
    assert_eq!(body["reader"]["status"], "online");
    assert_eq!(body["reader"]["device_type"], "bbpos_wisepos_e");
    assert!(body["location"]["id"].is_string());
    assert_eq!(processor.calls(Op::AssignDevice), 1);
}

#[actix_web::test]
async fn register_terminal_twice() {
    let _ = env_logger::try_init();
    let mut store = MockShopStore::new();
    store.expect_fetch_shop().returning(|id| {
        let mut bound = shop(id.as_str());
        bound.terminal_id = Some("tmr_1".into());
        Ok(Some(bound))
    });
    let processor = ScriptedProcessor::new();
    let body = r#"{"shopId": "shop1", "registrationCode": "ABCDE-12345"}"#;
    let (status, body) = post_request("/terminal/register", body, configure(store, processor.clone())).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let body = json(&body);
    assert_eq!(body["existing_terminal_id"], "tmr_1");
    assert_eq!(processor.total_calls(), 0);
}

#[actix_web::test]
async fn register_terminal_bad_code() {
    let _ = env_logger::try_init();
    // The store has no expectations, so any call to it fails the test
    let store = MockShopStore::new();
    let body = r#"{"shopId": "shop1", "registrationCode": "12345"}"#;
    let (status, body) = post_request("/terminal/register", body, configure(store, ScriptedProcessor::new())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json(&body)["error"].as_str().unwrap().contains("not a valid registration code"));
}

#[actix_web::test]
async fn register_terminal_bad_shop_id() {
    let _ = env_logger::try_init();
    let store = MockShopStore::new();
    let body = r#"{"shopId": "shop 1; drop table", "registrationCode": "ABCDE-12345"}"#;
    let (status, body) = post_request("/terminal/register", body, configure(store, ScriptedProcessor::new())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json(&body)["error"].as_str().unwrap().contains("Could not read request body"));
}

#[actix_web::test]
async fn register_terminal_no_readers() {
    let _ = env_logger::try_init();
    let mut store = MockShopStore::new();
    store.expect_fetch_shop().returning(|id| Ok(Some(shop(id.as_str()))));
    // The only reader belongs to another shop
    store.expect_fetch_shop_for_terminal().returning(|_| Ok(Some(shop("other"))));
    let body = r#"{"shopId": "shop1", "registrationCode": "ABCDE-12345"}"#;
    let (status, _) = post_request("/terminal/register", body, configure(store, ScriptedProcessor::new())).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[actix_web::test]
async fn terminal_status_invalid_path() {
    let _ = env_logger::try_init();
    let store = MockShopStore::new();
    let (status, body) = get_request("/terminal/status/bad%20id", configure(store, ScriptedProcessor::new())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json(&body)["error"].as_str().unwrap().contains("Could not read request path"));
}

#[actix_web::test]
async fn terminal_status_not_registered() {
    let _ = env_logger::try_init();
    let mut store = MockShopStore::new();
    store.expect_fetch_shop().returning(|id| Ok(Some(shop(id.as_str()))));
    let processor = ScriptedProcessor::new();
    let (status, body) = get_request("/terminal/status/shop1", configure(store, processor.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["status"], "not_registered");
    assert_eq!(processor.total_calls(), 0);
}

#[actix_web::test]
async fn terminal_status_refreshes_from_the_processor() {
    let _ = env_logger::try_init();
    let mut store = MockShopStore::new();
    store.expect_fetch_shop().returning(|id| {
        let mut bound = shop(id.as_str());
        bound.terminal_id = Some("tmr_reader_1".into());
        bound.terminal_status = Some(TerminalStatus::Online);
        Ok(Some(bound))
    });
    store
        .expect_update_terminal_status()
        .withf(|_, status| *status == TerminalStatus::Offline)
        .times(1)
        .returning(|_, _| Ok(()));
    let processor = ScriptedProcessor::new();
    processor.set_device_status("tmr_reader_1", TerminalStatus::Offline);
    let (status, body) = get_request("/terminal/status/shop1", configure(store, processor)).await;
    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body["status"], "offline");
    assert_eq!(body["terminal_id"], "tmr_reader_1");
}

#[actix_web::test]
async fn terminal_status_unknown_shop() {
    let _ = env_logger::try_init();
    let mut store = MockShopStore::new();
    store.expect_fetch_shop().returning(|_| Ok(None));
    let (status, _) = get_request("/terminal/status/nobody", configure(store, ScriptedProcessor::new())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
