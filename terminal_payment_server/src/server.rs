use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use log::*;
use terminal_payment_engine::{
    events::EventProducers,
    PaymentDispatchApi,
    ShopAccountApi,
    SqliteDatabase,
    TerminalApi,
    WebhookApi,
};

use crate::{
    config::ServerConfig,
    errors::ServerError,
    helpers::{json_config, path_config},
    integrations::stripe::{create_engine_event_handlers, StripeProcessor},
    routes::{
        health,
        AutoWithdrawRoute,
        CreateAccountRoute,
        CreatePaymentRoute,
        RegisterTerminalRoute,
        RequestPayoutRoute,
        StripeBalancePostRoute,
        StripeBalanceRoute,
        StripeConnectRoute,
        StripeWebhookRoute,
        TerminalStatusRoute,
    },
    sweeper::start_sweeper,
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.run_migrations().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    info!("🚀️ Database ready at {}", config.database_url);
    let processor = StripeProcessor::new(config.stripe.clone())
        .map_err(|e| ServerError::ConfigurationError(format!("Could not create the Stripe client. {e}")))?;
    let handlers = create_engine_event_handlers();
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let sweeper_api = PaymentDispatchApi::new(db.clone(), processor.clone(), producers.clone(), config.dispatch);
    // Runs until the process exits
    let _sweeper = start_sweeper(sweeper_api, config.sweeper_interval, config.stale_attempt_age);
    let srv = create_server_instance(config, db, processor, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    processor: StripeProcessor,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let (host, port) = (config.host.clone(), config.port);
    let srv = HttpServer::new(move || {
        let terminal_api = TerminalApi::new(db.clone(), processor.clone());
        let accounts_api = ShopAccountApi::new(db.clone(), processor.clone(), config.onboarding_urls.clone());
        let dispatch_api = PaymentDispatchApi::new(db.clone(), processor.clone(), producers.clone(), config.dispatch);
        let webhook_api = WebhookApi::new(db.clone(), producers.clone(), config.webhook_secret.clone())
            .with_tolerance(config.webhook_tolerance);
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("sps::access_log"))
            .app_data(path_config())
            .app_data(json_config())
            .app_data(web::Data::new(config.test_mode))
            .app_data(web::Data::new(terminal_api))
            .app_data(web::Data::new(accounts_api))
            .app_data(web::Data::new(dispatch_api))
            .app_data(web::Data::new(webhook_api))
            .service(health)
            .service(RegisterTerminalRoute::<SqliteDatabase, StripeProcessor>::new())
            .service(TerminalStatusRoute::<SqliteDatabase, StripeProcessor>::new())
            .service(CreatePaymentRoute::<SqliteDatabase, StripeProcessor>::new())
            .service(CreateAccountRoute::<SqliteDatabase, StripeProcessor>::new())
            .service(StripeConnectRoute::<SqliteDatabase, StripeProcessor>::new())
            .service(StripeBalanceRoute::<SqliteDatabase, StripeProcessor>::new())
            .service(StripeBalancePostRoute::<SqliteDatabase, StripeProcessor>::new())
            .service(RequestPayoutRoute::<SqliteDatabase, StripeProcessor>::new())
            .service(AutoWithdrawRoute::<SqliteDatabase, StripeProcessor>::new())
            .service(StripeWebhookRoute::<SqliteDatabase>::new())
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((host.as_str(), port))?
    .run();
    Ok(srv)
}
