//! The server's HTTP handlers.
//!
//! Handlers only parse the request and translate engine results into responses. The work happens in the engine APIs
//! held in the app data.
//!
//! Every payment route resolves a [`PaymentMode`](terminal_payment_engine::PaymentMode) from the server's
//! [`TestModePolicy`] and the request's optional `testMode` flag before calling into the engine.
use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use log::*;
use serde_json::json;
use terminal_payment_engine::{
    db_types::ShopId,
    traits::{PaymentProcessor, ShopAccountManagement, TerminalPaymentDatabase},
    PaymentDispatchApi,
    ShopAccountApi,
    TerminalApi,
    WebhookApi,
    WebhookError,
    WebhookOutcome,
};

use crate::{
    config::TestModePolicy,
    data_objects::{
        AccountResponse,
        AutoWithdrawRequest,
        AutoWithdrawResponse,
        BalanceResponse,
        CreatePaymentRequest,
        CreatePaymentResponse,
        ModeQuery,
        OnboardingResponse,
        PayoutRequest,
        PayoutResponse,
        RegisterTerminalRequest,
        RegisterTerminalResponse,
        ShopRequest,
    },
    errors::ServerError,
    helpers::signature_header,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Terminals  ----------------------------------------------------
route!(register_terminal => Post "/terminal/register" impl ShopAccountManagement, PaymentProcessor);
/// Registers a card reader to a shop.
///
/// The body carries the shop id and the registration code shown on the reader's screen (`XXXXX-XXXXX`). If the shop
/// already has a reader, the response is a 409 with the existing reader's id in `existing_terminal_id`.
pub async fn register_terminal<B, P>(
    body: web::Json<RegisterTerminalRequest>,
    policy: web::Data<TestModePolicy>,
    api: web::Data<TerminalApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: ShopAccountManagement,
    P: PaymentProcessor,
{
    let RegisterTerminalRequest { shop_id, registration_code, test_mode } = body.into_inner();
    let mode = policy.resolve(test_mode);
    debug!("💻️ POST register terminal for shop {shop_id} ({mode:?})");
    let registered = api.register(&shop_id, &registration_code, mode).await.map_err(|e| {
        debug!("💻️ Could not register a reader for shop {shop_id}. {e}");
        e
    })?;
    info!("💻️ Reader {} registered to shop {shop_id}", registered.reader.id);
    Ok(HttpResponse::Ok().json(RegisterTerminalResponse::from(registered)))
}

route!(terminal_status => Get "/terminal/status/{shop_id}" impl ShopAccountManagement, PaymentProcessor);
pub async fn terminal_status<B, P>(
    path: web::Path<ShopId>,
    query: web::Query<ModeQuery>,
    policy: web::Data<TestModePolicy>,
    api: web::Data<TerminalApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: ShopAccountManagement,
    P: PaymentProcessor,
{
    let shop_id = path.into_inner();
    let mode = policy.resolve(query.test_mode);
    trace!("💻️ GET terminal status for shop {shop_id}");
    let status = api.get_status(&shop_id, mode).await?;
    Ok(HttpResponse::Ok().json(status))
}

//----------------------------------------------   Payments  ----------------------------------------------------
route!(create_payment => Post "/terminal/create-payment" impl TerminalPaymentDatabase, PaymentProcessor);
/// Sends the amount due on an invoice to the shop's reader.
///
/// A successful response means the reader is waiting for the customer's card. The invoice is marked as paid once the
/// processor confirms the payment via the webhook (or, in test mode, after the simulated delay).
pub async fn create_payment<B, P>(
    body: web::Json<CreatePaymentRequest>,
    policy: web::Data<TestModePolicy>,
    api: web::Data<PaymentDispatchApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: TerminalPaymentDatabase,
    P: PaymentProcessor,
{
    let CreatePaymentRequest { invoice_id, shop_id, test_mode } = body.into_inner();
    let mode = policy.resolve(test_mode);
    debug!("💻️ POST create payment for invoice {invoice_id} at shop {shop_id} ({mode:?})");
    let dispatched = api.create_payment(&invoice_id, &shop_id, mode).await.map_err(|e| {
        warn!("💻️ Payment for invoice {invoice_id} could not be started. {e}");
        e
    })?;
    Ok(HttpResponse::Ok().json(CreatePaymentResponse::from(dispatched)))
}

//----------------------------------------------   Connected accounts  --------------------------------------------
route!(create_account => Post "/connect/create-account" impl ShopAccountManagement, PaymentProcessor);
pub async fn create_account<B, P>(
    body: web::Json<ShopRequest>,
    policy: web::Data<TestModePolicy>,
    api: web::Data<ShopAccountApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: ShopAccountManagement,
    P: PaymentProcessor,
{
    let ShopRequest { shop_id, test_mode } = body.into_inner();
    debug!("💻️ POST create connected account for shop {shop_id}");
    let account_id = api.ensure_connected_account(&shop_id, policy.resolve(test_mode)).await?;
    Ok(HttpResponse::Ok().json(AccountResponse { success: true, account_id }))
}

route!(stripe_connect => Post "/stripe-connect" impl ShopAccountManagement, PaymentProcessor);
/// Returns a single-use link to the processor's hosted onboarding flow, creating the connected account first if needed.
pub async fn stripe_connect<B, P>(
    body: web::Json<ShopRequest>,
    policy: web::Data<TestModePolicy>,
    api: web::Data<ShopAccountApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: ShopAccountManagement,
    P: PaymentProcessor,
{
    let ShopRequest { shop_id, test_mode } = body.into_inner();
    debug!("💻️ POST onboarding link for shop {shop_id}");
    let result = api.create_onboarding_link(&shop_id, policy.resolve(test_mode)).await?;
    Ok(HttpResponse::Ok().json(OnboardingResponse { success: true, url: result.url, account_id: result.account_id }))
}

route!(stripe_balance => Get "/stripe-balance/{shop_id}" impl ShopAccountManagement, PaymentProcessor);
pub async fn stripe_balance<B, P>(
    path: web::Path<ShopId>,
    query: web::Query<ModeQuery>,
    policy: web::Data<TestModePolicy>,
    api: web::Data<ShopAccountApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: ShopAccountManagement,
    P: PaymentProcessor,
{
    let shop_id = path.into_inner();
    trace!("💻️ Balance request for shop {shop_id}");
    let balance = api.get_balance(&shop_id, policy.resolve(query.test_mode)).await?;
    Ok(HttpResponse::Ok().json(BalanceResponse { success: true, balance }))
}

// The shop front end fetches the balance with a POST
route!(stripe_balance_post => Post "/stripe-balance/{shop_id}" impl ShopAccountManagement, PaymentProcessor);
pub async fn stripe_balance_post<B, P>(
    path: web::Path<ShopId>,
    query: web::Query<ModeQuery>,
    policy: web::Data<TestModePolicy>,
    api: web::Data<ShopAccountApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: ShopAccountManagement,
    P: PaymentProcessor,
{
    stripe_balance(path, query, policy, api).await
}

route!(request_payout => Post "/stripe-request-payout/{shop_id}" impl ShopAccountManagement, PaymentProcessor);
/// Pays out the shop's available balance, or the `amount` given in the body, to its bank account.
///
/// The body is optional. An empty body requests a payout of the whole available balance.
pub async fn request_payout<B, P>(
    path: web::Path<ShopId>,
    body: web::Bytes,
    policy: web::Data<TestModePolicy>,
    api: web::Data<ShopAccountApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: ShopAccountManagement,
    P: PaymentProcessor,
{
    let shop_id = path.into_inner();
    let PayoutRequest { amount, test_mode } = if body.iter().all(u8::is_ascii_whitespace) {
        PayoutRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| ServerError::InvalidRequestBody(e.to_string()))?
    };
    debug!("💻️ POST payout request for shop {shop_id}. Amount: {amount:?}");
    let payout = api.request_payout(&shop_id, amount, policy.resolve(test_mode)).await?;
    Ok(HttpResponse::Ok().json(PayoutResponse { success: true, payout }))
}

route!(auto_withdraw => Post "/stripe-auto-withdraw/{shop_id}" impl ShopAccountManagement, PaymentProcessor);
pub async fn auto_withdraw<B, P>(
    path: web::Path<ShopId>,
    body: web::Json<AutoWithdrawRequest>,
    policy: web::Data<TestModePolicy>,
    api: web::Data<ShopAccountApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: ShopAccountManagement,
    P: PaymentProcessor,
{
    let shop_id = path.into_inner();
    let AutoWithdrawRequest { enabled, test_mode } = body.into_inner();
    debug!("💻️ POST auto-withdraw {enabled} for shop {shop_id}");
    let interval = api.set_auto_withdraw(&shop_id, enabled, policy.resolve(test_mode)).await?;
    Ok(HttpResponse::Ok().json(AutoWithdrawResponse { success: true, interval }))
}

//----------------------------------------------   Webhooks  ----------------------------------------------------
route!(stripe_webhook => Post "/webhooks/stripe" impl TerminalPaymentDatabase);
/// Receives payment intent events from the processor.
///
/// The raw body is needed to verify the signature, so it is not deserialized by actix. Deliveries with a bad signature
/// get a 400. Every correctly signed delivery is acknowledged with a 200, including ones that are ignored, so that the
/// processor does not retry them. Database failures return a 500 and the processor will redeliver the event later.
pub async fn stripe_webhook<B>(
    req: HttpRequest,
    body: web::Bytes,
    api: web::Data<WebhookApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: TerminalPaymentDatabase,
{
    trace!("💻️ Received webhook delivery ({} bytes)", body.len());
    let outcome = api.handle_processor_event(&body, signature_header(&req)).await.map_err(|e| {
        match &e {
            WebhookError::SignatureInvalid(_) => warn!("💻️ Webhook rejected. {e}"),
            WebhookError::DatabaseError(_) => error!("💻️ Webhook could not be applied. It will be redelivered. {e}"),
        }
        e
    })?;
    match &outcome {
        WebhookOutcome::InvoicePaid(id) => info!("💻️ Webhook marked invoice {id} as paid"),
        WebhookOutcome::Malformed(reason) => warn!("💻️ Acknowledging a malformed webhook. {reason}"),
        other => debug!("💻️ Webhook handled. {other:?}"),
    }
    Ok(HttpResponse::Ok().json(json!({ "received": true })))
}
