//! Processor-side resources, limited to the fields the engine consumes.
use chrono::{DateTime, Utc};
use payment_common::Cents;
use serde::{Deserialize, Serialize};

use crate::db_types::{InvoiceId, ShopId, TerminalStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnboardingLink {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

/// A connected account's balance, in USD.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    pub available: Cents,
    pub pending: Cents,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeSummary {
    pub id: String,
    pub amount: Cents,
    pub succeeded: bool,
    pub created: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutSummary {
    pub id: String,
    pub amount: Cents,
    pub status: String,
    pub arrival_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayoutInterval {
    /// Funds are paid out automatically every day.
    Daily,
    /// Funds stay in the balance until a payout is requested.
    Manual,
}

impl PayoutInterval {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutInterval::Daily => "daily",
            PayoutInterval::Manual => "manual",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceLocation {
    pub id: String,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalDevice {
    pub id: String,
    pub serial: String,
    pub model: String,
    pub status: TerminalStatus,
    pub location_id: Option<String>,
    pub label: Option<String>,
    /// The action the reader is currently performing, e.g. `process_payment_intent`.
    pub current_action: Option<String>,
}

impl TerminalDevice {
    /// Readers that are not assigned to a location, or are offline, may be claimed by a shop.
    pub fn is_available(&self) -> bool {
        self.location_id.is_none() || self.status == TerminalStatus::Offline
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentStatus {
    Created,
    Processing,
    Succeeded,
    Canceled,
    Failed,
}

impl IntentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, IntentStatus::Succeeded | IntentStatus::Canceled | IntentStatus::Failed)
    }
}

/// Routes the funds of a destination charge to a connected account, less the platform's fee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentDestination {
    pub account_id: String,
    pub application_fee: Cents,
}

#[derive(Debug, Clone)]
pub struct IntentRequest {
    pub amount: Cents,
    pub currency: String,
    pub invoice_id: InvoiceId,
    pub shop_id: ShopId,
    pub destination: Option<IntentDestination>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub amount: Cents,
    pub currency: String,
    pub status: IntentStatus,
    pub application_fee: Option<Cents>,
    pub destination_account: Option<String>,
    pub invoice_id: Option<String>,
    pub shop_id: Option<String>,
}
