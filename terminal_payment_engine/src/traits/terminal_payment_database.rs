use thiserror::Error;

use crate::{
    db_types::{InvoiceId, InvoiceStatus, ShopId},
    traits::{InvoiceManagement, PaymentAttemptManagement, ShopAccountManagement},
};

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Shop {0} does not exist")]
    ShopNotFound(ShopId),
    #[error("Invoice {0} does not exist")]
    InvoiceNotFound(InvoiceId),
    #[error("Invoice {0} already exists")]
    InvoiceAlreadyExists(InvoiceId),
    #[error("Invoice {0} already has a payment in progress")]
    PaymentInProgress(InvoiceId),
    #[error("Invoice {invoice_id} cannot be paid while it is {status}")]
    InvoiceNotPayable { invoice_id: InvoiceId, status: InvoiceStatus },
    #[error("Payment attempt {0} does not exist")]
    AttemptNotFound(i64),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::DatabaseError(e.to_string())
    }
}

/// The highest level of behaviour for storage backends supporting the terminal payment engine.
#[allow(async_fn_in_trait)]
pub trait TerminalPaymentDatabase: Clone + ShopAccountManagement + InvoiceManagement + PaymentAttemptManagement {
    /// The URL of the database
    fn url(&self) -> &str;
}
