use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use payment_common::Cents;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

const MAX_ID_LENGTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid {kind} '{value}': {reason}")]
pub struct IdValidationError {
    pub kind: &'static str,
    pub value: String,
    pub reason: &'static str,
}

fn validate_id(kind: &'static str, value: &str) -> Result<(), IdValidationError> {
    let fail = |reason| Err(IdValidationError { kind, value: value.to_string(), reason });
    if value.is_empty() {
        return fail("it is empty");
    }
    if value.len() > MAX_ID_LENGTH {
        return fail("it is too long");
    }
    if !value.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return fail("only letters, digits, '-' and '_' are allowed");
    }
    Ok(())
}

/// Generates a validated string identifier. Values that arrive over the wire (path segments, JSON bodies) are checked
/// on deserialization, so handlers only ever see well-formed ids.
macro_rules! string_id {
    ($name:ident, $kind:literal) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
        #[sqlx(transparent)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = IdValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                validate_id($kind, s)?;
                Ok(Self(s.to_string()))
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                validate_id($kind, &value)?;
                Ok(Self(value))
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

//--------------------------------------        Ids            ---------------------------------------------------------
string_id!(ShopId, "shop id");
string_id!(InvoiceId, "invoice id");

//--------------------------------------    TerminalStatus     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TerminalStatus {
    NotRegistered,
    Online,
    Offline,
}

impl Display for TerminalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TerminalStatus::NotRegistered => write!(f, "not_registered"),
            TerminalStatus::Online => write!(f, "online"),
            TerminalStatus::Offline => write!(f, "offline"),
        }
    }
}

//--------------------------------------     ShopAccount       ---------------------------------------------------------
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopAddress {
    pub line1: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

impl ShopAddress {
    /// Used when a shop has no address on file. Device locations require one.
    pub fn placeholder() -> Self {
        Self {
            line1: "123 Main St".into(),
            city: "San Francisco".into(),
            state: "CA".into(),
            postal_code: "94111".into(),
            country: "US".into(),
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ShopAccount {
    pub shop_id: ShopId,
    pub name: Option<String>,
    pub address_line1: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub connected_account_id: Option<String>,
    pub payouts_enabled: bool,
    pub terminal_id: Option<String>,
    pub terminal_serial: Option<String>,
    pub terminal_model: Option<String>,
    pub terminal_status: Option<TerminalStatus>,
    pub location_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ShopAccount {
    /// The address on file, if every field needed for a device location is present.
    pub fn address(&self) -> Option<ShopAddress> {
        Some(ShopAddress {
            line1: self.address_line1.clone()?,
            city: self.city.clone()?,
            state: self.state.clone()?,
            postal_code: self.postal_code.clone()?,
            country: self.country.clone()?,
        })
    }

    pub fn display_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| format!("Shop {}", self.shop_id))
    }

    pub fn terminal_status(&self) -> TerminalStatus {
        match (&self.terminal_id, self.terminal_status) {
            (None, _) => TerminalStatus::NotRegistered,
            (Some(_), Some(status)) => status,
            (Some(_), None) => TerminalStatus::Offline,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewShop {
    pub shop_id: ShopId,
    pub name: Option<String>,
    pub address: Option<ShopAddress>,
}

impl NewShop {
    pub fn new(shop_id: ShopId) -> Self {
        Self { shop_id, name: None, address: None }
    }

    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_address(mut self, address: ShopAddress) -> Self {
        self.address = Some(address);
        self
    }
}

/// The device details persisted on a shop when a reader is bound to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalBinding {
    pub terminal_id: String,
    pub serial: String,
    pub model: String,
    pub status: TerminalStatus,
    pub location_id: String,
}

#[derive(Debug, Clone)]
pub enum BindResult {
    Bound(ShopAccount),
    /// The shop already had a device. Carries the id of the existing device.
    AlreadyBound(String),
}

//--------------------------------------    InvoiceStatus      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
    Void,
}

impl InvoiceStatus {
    pub fn is_payable(&self) -> bool {
        matches!(self, InvoiceStatus::Draft | InvoiceStatus::Sent)
    }
}

impl Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvoiceStatus::Draft => write!(f, "draft"),
            InvoiceStatus::Sent => write!(f, "sent"),
            InvoiceStatus::Paid => write!(f, "paid"),
            InvoiceStatus::Void => write!(f, "void"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid status: {0}")]
pub struct ConversionError(String);

impl FromStr for InvoiceStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "sent" => Ok(Self::Sent),
            "paid" => Ok(Self::Paid),
            "void" => Ok(Self::Void),
            s => Err(ConversionError(format!("Invalid invoice status: {s}"))),
        }
    }
}

//--------------------------------------        Invoice        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub description: Option<String>,
    pub qty: f64,
    pub unit_price: f64,
}

impl LineItem {
    pub fn new(qty: f64, unit_price: f64) -> Self {
        Self { description: None, qty, unit_price }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub shop_id: ShopId,
    pub items: Vec<LineItem>,
    /// Percentage, e.g. `10.0` for 10%
    pub tax_rate: f64,
    /// Percentage, e.g. `5.0` for 5%
    pub discount_rate: f64,
    pub status: InvoiceStatus,
    pub paid_date: Option<DateTime<Utc>>,
    pub payment_intent_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    pub fn subtotal(&self) -> f64 {
        self.items.iter().map(|i| i.qty * i.unit_price).sum()
    }

    /// The amount due, in cents. Always derived from the stored line items, tax and discount.
    pub fn amount_due(&self) -> Result<Cents, payment_common::CentsConversionError> {
        let subtotal = self.subtotal();
        let tax = subtotal * self.tax_rate / 100.0;
        let discount = subtotal * self.discount_rate / 100.0;
        Cents::try_from(subtotal + tax - discount)
    }
}

#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub id: InvoiceId,
    pub shop_id: ShopId,
    pub items: Vec<LineItem>,
    pub tax_rate: f64,
    pub discount_rate: f64,
    pub status: InvoiceStatus,
}

impl NewInvoice {
    pub fn new(id: InvoiceId, shop_id: ShopId, items: Vec<LineItem>) -> Self {
        Self { id, shop_id, items, tax_rate: 0.0, discount_rate: 0.0, status: InvoiceStatus::Draft }
    }

    pub fn with_tax_rate(mut self, tax_rate: f64) -> Self {
        self.tax_rate = tax_rate;
        self
    }

    pub fn with_discount_rate(mut self, discount_rate: f64) -> Self {
        self.discount_rate = discount_rate;
        self
    }

    pub fn with_status(mut self, status: InvoiceStatus) -> Self {
        self.status = status;
        self
    }
}

//--------------------------------------    AttemptStatus      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AttemptStatus {
    /// The invoice's payment slot is claimed; the intent may not exist yet.
    Pending,
    /// The intent has been handed to the reader and is awaiting the customer.
    Dispatched,
    Succeeded,
    Canceled,
    Failed,
    /// Dispatch failed and the intent could not be canceled. Needs attention. Holds the payment slot until the sweeper
    /// cancels the intent.
    Orphaned,
    /// A pending claim that never produced an intent, released by the sweeper.
    Abandoned,
}

impl AttemptStatus {
    /// Whether an attempt in this state holds the invoice's payment slot.
    pub fn is_active(&self) -> bool {
        matches!(self, AttemptStatus::Pending | AttemptStatus::Dispatched | AttemptStatus::Orphaned)
    }
}

impl Display for AttemptStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AttemptStatus::Pending => "pending",
            AttemptStatus::Dispatched => "dispatched",
            AttemptStatus::Succeeded => "succeeded",
            AttemptStatus::Canceled => "canceled",
            AttemptStatus::Failed => "failed",
            AttemptStatus::Orphaned => "orphaned",
            AttemptStatus::Abandoned => "abandoned",
        };
        f.write_str(s)
    }
}

//--------------------------------------    PaymentAttempt     ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PaymentAttempt {
    pub id: i64,
    pub invoice_id: InvoiceId,
    pub shop_id: ShopId,
    pub intent_id: Option<String>,
    pub amount_cents: Cents,
    pub application_fee_cents: Cents,
    pub reader_id: String,
    pub status: AttemptStatus,
    pub last_error: Option<String>,
    pub cancel_attempts: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPaymentAttempt {
    pub invoice_id: InvoiceId,
    pub shop_id: ShopId,
    pub amount: Cents,
    pub application_fee: Cents,
    pub reader_id: String,
}
