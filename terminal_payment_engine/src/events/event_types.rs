use serde::{Deserialize, Serialize};

use crate::db_types::{Invoice, PaymentAttempt};

/// Emitted exactly once per invoice, when a verified payment moves it to `paid`.
#[derive(Debug, Clone, Serialize)]
pub struct InvoicePaidEvent {
    pub invoice: Invoice,
}

impl InvoicePaidEvent {
    pub fn new(invoice: Invoice) -> Self {
        Self { invoice }
    }
}

/// Emitted when a payment intent could not be dispatched to a reader and could not be canceled either. The intent may
/// still be collectable by the processor, so someone needs to look at it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentOrphanedEvent {
    pub attempt_id: i64,
    pub invoice_id: String,
    pub shop_id: String,
    pub intent_id: String,
    pub reason: String,
}

impl IntentOrphanedEvent {
    pub fn new(attempt: &PaymentAttempt, intent_id: &str, reason: &str) -> Self {
        Self {
            attempt_id: attempt.id,
            invoice_id: attempt.invoice_id.to_string(),
            shop_id: attempt.shop_id.to_string(),
            intent_id: intent_id.to_string(),
            reason: reason.to_string(),
        }
    }
}
