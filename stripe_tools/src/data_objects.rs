use std::collections::HashMap;

use chrono::{DateTime, Utc};
use payment_common::Cents;
use serde::{Deserialize, Serialize};

/// A page of results from one of Stripe's list endpoints.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct List<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
}

//--------------------------------------     Connect       ------------------------------------------------------------
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeAccount {
    pub id: String,
    #[serde(default)]
    pub charges_enabled: bool,
    #[serde(default)]
    pub payouts_enabled: bool,
    #[serde(default)]
    pub details_submitted: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountLink {
    pub url: String,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BalanceAmount {
    pub amount: Cents,
    pub currency: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Balance {
    #[serde(default)]
    pub available: Vec<BalanceAmount>,
    #[serde(default)]
    pub pending: Vec<BalanceAmount>,
}

impl Balance {
    pub fn available_in(&self, currency: &str) -> Cents {
        sum_currency(&self.available, currency)
    }

    pub fn pending_in(&self, currency: &str) -> Cents {
        sum_currency(&self.pending, currency)
    }
}

fn sum_currency(amounts: &[BalanceAmount], currency: &str) -> Cents {
    amounts.iter().filter(|a| a.currency.eq_ignore_ascii_case(currency)).map(|a| a.amount).sum()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Charge {
    pub id: String,
    pub amount: Cents,
    #[serde(default)]
    pub amount_refunded: Cents,
    pub status: String,
    #[serde(default)]
    pub paid: bool,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created: DateTime<Utc>,
}

impl Charge {
    pub fn succeeded(&self) -> bool {
        self.status == "succeeded"
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Payout {
    pub id: String,
    pub amount: Cents,
    pub currency: String,
    pub status: String,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub arrival_date: DateTime<Utc>,
}

//--------------------------------------     Terminal      ------------------------------------------------------------
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Address {
    pub line1: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TerminalLocation {
    pub id: String,
    pub display_name: String,
    pub address: Address,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReaderAction {
    #[serde(rename = "type")]
    pub action_type: String,
    pub status: String,
    #[serde(default)]
    pub failure_message: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TerminalReader {
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
    pub serial_number: String,
    pub device_type: String,
    /// `online` or `offline`. Stripe omits it for readers that have never connected.
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub action: Option<ReaderAction>,
    #[serde(default)]
    pub deleted: bool,
}

impl TerminalReader {
    pub fn is_online(&self) -> bool {
        self.status.as_deref() == Some("online")
    }
}

//--------------------------------------  Payment Intents  ------------------------------------------------------------
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransferData {
    pub destination: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PaymentIntent {
    pub id: String,
    pub amount: Cents,
    pub currency: String,
    pub status: String,
    #[serde(default)]
    pub application_fee_amount: Option<Cents>,
    #[serde(default)]
    pub transfer_data: Option<TransferData>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// The parameters for a card-present payment intent.
#[derive(Debug, Clone)]
pub struct NewPaymentIntent {
    pub amount: Cents,
    pub currency: String,
    pub metadata: Vec<(String, String)>,
    /// Destination charge routing: the connected account and the platform's application fee.
    pub destination: Option<(String, Cents)>,
}

impl NewPaymentIntent {
    pub fn form_params(&self) -> Vec<(String, String)> {
        let mut params = vec![
            ("amount".to_string(), self.amount.value().to_string()),
            ("currency".to_string(), self.currency.to_lowercase()),
            ("payment_method_types[]".to_string(), "card_present".to_string()),
            ("capture_method".to_string(), "automatic".to_string()),
        ];
        params.extend(self.metadata.iter().map(|(k, v)| (format!("metadata[{k}]"), v.clone())));
        if let Some((account, fee)) = &self.destination {
            params.push(("transfer_data[destination]".to_string(), account.clone()));
            params.push(("application_fee_amount".to_string(), fee.value().to_string()));
        }
        params
    }
}
