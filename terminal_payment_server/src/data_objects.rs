//! Request and response bodies for the HTTP API.
//!
//! Request fields are camelCase, as sent by the shop front end. Response field names follow what that front end already
//! reads, which is a mix of both conventions.
use payment_common::Cents;
use serde::{Deserialize, Serialize};
use terminal_payment_engine::{
    account_objects::BalanceSummary,
    db_types::{InvoiceId, ShopId, TerminalStatus},
    payment_objects::PaymentDispatched,
    terminal_objects::RegisteredTerminal,
    traits::{DeviceLocation, PayoutInterval, PayoutSummary},
};

//--------------------------------------        Requests       ---------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterTerminalRequest {
    pub shop_id: ShopId,
    pub registration_code: String,
    #[serde(default)]
    pub test_mode: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentRequest {
    pub invoice_id: InvoiceId,
    pub shop_id: ShopId,
    #[serde(default)]
    pub test_mode: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopRequest {
    pub shop_id: ShopId,
    #[serde(default)]
    pub test_mode: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutRequest {
    /// The amount to pay out, in cents. Defaults to the whole available balance.
    #[serde(default)]
    pub amount: Option<Cents>,
    #[serde(default)]
    pub test_mode: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoWithdrawRequest {
    pub enabled: bool,
    #[serde(default)]
    pub test_mode: Option<bool>,
}

/// The query string accepted by `GET` routes, e.g. `?testMode=true`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModeQuery {
    #[serde(default)]
    pub test_mode: Option<bool>,
}

//--------------------------------------       Responses       ---------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaderSummary {
    pub id: String,
    pub serial: String,
    pub status: TerminalStatus,
    pub device_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterTerminalResponse {
    pub success: bool,
    pub reader: ReaderSummary,
    pub location: DeviceLocation,
}

impl From<RegisteredTerminal> for RegisterTerminalResponse {
    fn from(value: RegisteredTerminal) -> Self {
        let RegisteredTerminal { reader, location } = value;
        let reader =
            ReaderSummary { id: reader.id, serial: reader.serial, status: reader.status, device_type: reader.model };
        Self { success: true, reader, location }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePaymentResponse {
    pub success: bool,
    #[serde(rename = "paymentIntent")]
    pub payment_intent: String,
    pub amount: Cents,
    pub application_fee: Cents,
    pub terminal_id: String,
    pub message: String,
}

impl From<PaymentDispatched> for CreatePaymentResponse {
    fn from(value: PaymentDispatched) -> Self {
        Self {
            success: true,
            payment_intent: value.payment_intent,
            amount: value.amount,
            application_fee: value.application_fee,
            terminal_id: value.terminal_id,
            message: value.message,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountResponse {
    pub success: bool,
    #[serde(rename = "accountId")]
    pub account_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnboardingResponse {
    pub success: bool,
    pub url: String,
    #[serde(rename = "accountId")]
    pub account_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub success: bool,
    #[serde(flatten)]
    pub balance: BalanceSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutResponse {
    pub success: bool,
    pub payout: PayoutSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoWithdrawResponse {
    pub success: bool,
    pub interval: PayoutInterval,
}
