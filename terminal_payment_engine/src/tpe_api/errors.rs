use payment_common::Cents;
use thiserror::Error;

use crate::{
    db_types::{InvoiceId, InvoiceStatus, ShopId},
    helpers::SignatureError,
    traits::{ProcessorError, StoreError},
};

#[derive(Debug, Clone, Error)]
pub enum ShopAccountError {
    #[error("Shop {0} does not exist")]
    ShopNotFound(ShopId),
    #[error("Shop {0} has no connected account yet")]
    NotConnected(ShopId),
    #[error("Invalid request for shop {shop_id}: {reason}")]
    ValidationError { shop_id: ShopId, reason: String },
    #[error("The payment processor is unavailable for shop {shop_id}: {reason}")]
    ProcessorUnavailable { shop_id: ShopId, reason: String },
    #[error("The payment processor failed a request for shop {shop_id}: {reason}")]
    ProcessorError { shop_id: ShopId, reason: String },
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl ShopAccountError {
    pub(crate) fn from_processor(shop_id: &ShopId, e: ProcessorError) -> Self {
        let shop_id = shop_id.clone();
        if e.is_unavailable() {
            Self::ProcessorUnavailable { shop_id, reason: e.to_string() }
        } else {
            Self::ProcessorError { shop_id, reason: e.to_string() }
        }
    }
}

impl From<StoreError> for ShopAccountError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::ShopNotFound(id) => Self::ShopNotFound(id),
            e => Self::DatabaseError(e.to_string()),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum TerminalError {
    #[error("{0}")]
    InvalidRegistrationCode(String),
    #[error("Shop {0} does not exist")]
    ShopNotFound(ShopId),
    #[error("Shop {shop_id} already has reader {terminal_id} registered")]
    AlreadyRegistered { shop_id: ShopId, terminal_id: String },
    #[error("There are no readers available to register to shop {0}")]
    NoAvailableDevice(ShopId),
    #[error("Could not create a reader location for shop {shop_id}: {reason}")]
    LocationCreationFailed { shop_id: ShopId, reason: String },
    #[error("The payment processor is unavailable for shop {shop_id}: {reason}")]
    ProcessorUnavailable { shop_id: ShopId, reason: String },
    #[error("The payment processor failed a request for shop {shop_id}: {reason}")]
    ProcessorError { shop_id: ShopId, reason: String },
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl TerminalError {
    pub(crate) fn from_processor(shop_id: &ShopId, e: ProcessorError) -> Self {
        let shop_id = shop_id.clone();
        if e.is_unavailable() {
            Self::ProcessorUnavailable { shop_id, reason: e.to_string() }
        } else {
            Self::ProcessorError { shop_id, reason: e.to_string() }
        }
    }
}

impl From<StoreError> for TerminalError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::ShopNotFound(id) => Self::ShopNotFound(id),
            e => Self::DatabaseError(e.to_string()),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    #[error("Invoice {invoice_id} does not exist for shop {shop_id}")]
    InvoiceNotFound { invoice_id: InvoiceId, shop_id: ShopId },
    #[error("Invoice {invoice_id} has an invalid amount due: {reason}")]
    InvalidAmount { invoice_id: InvoiceId, reason: String },
    #[error("Shop {0} does not have a card reader registered")]
    NoTerminal(ShopId),
    #[error("Invoice {0} already has a payment in progress")]
    PaymentInProgress(InvoiceId),
    #[error("Invoice {invoice_id} cannot be paid while it is {status}")]
    InvoiceNotPayable { invoice_id: InvoiceId, status: InvoiceStatus },
    #[error("The payment processor is unavailable for invoice {invoice_id}: {reason}")]
    ProcessorUnavailable { invoice_id: InvoiceId, reason: String },
    #[error("The payment processor failed a request for invoice {invoice_id}: {reason}")]
    ProcessorError { invoice_id: InvoiceId, reason: String },
    /// The intent was created but the reader did not accept it. `canceled` records whether compensation succeeded.
    #[error("Reader {terminal_id} could not take payment {intent_id} for invoice {invoice_id}: {reason}")]
    TerminalProcessingFailed {
        invoice_id: InvoiceId,
        terminal_id: String,
        intent_id: String,
        reason: String,
        canceled: bool,
    },
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl DispatchError {
    pub(crate) fn from_processor(invoice_id: &InvoiceId, e: ProcessorError) -> Self {
        let invoice_id = invoice_id.clone();
        if e.is_unavailable() {
            Self::ProcessorUnavailable { invoice_id, reason: e.to_string() }
        } else {
            Self::ProcessorError { invoice_id, reason: e.to_string() }
        }
    }

    pub(crate) fn invalid_amount(invoice_id: &InvoiceId, amount: Cents) -> Self {
        Self::InvalidAmount { invoice_id: invoice_id.clone(), reason: format!("{amount} is not a positive amount") }
    }
}

impl From<StoreError> for DispatchError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::PaymentInProgress(id) => Self::PaymentInProgress(id),
            StoreError::InvoiceNotPayable { invoice_id, status } => Self::InvoiceNotPayable { invoice_id, status },
            e => Self::DatabaseError(e.to_string()),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum WebhookError {
    #[error("Webhook signature verification failed: {0}")]
    SignatureInvalid(#[from] SignatureError),
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<StoreError> for WebhookError {
    fn from(e: StoreError) -> Self {
        Self::DatabaseError(e.to_string())
    }
}
