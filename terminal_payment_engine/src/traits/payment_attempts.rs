use std::time::Duration;

use crate::{
    db_types::{AttemptStatus, InvoiceId, NewPaymentAttempt, PaymentAttempt},
    traits::StoreError,
};

/// A change to a payment attempt. `None` fields are left as they are.
#[derive(Debug, Clone, Default)]
pub struct AttemptUpdate {
    pub status: Option<AttemptStatus>,
    pub intent_id: Option<String>,
    pub last_error: Option<String>,
    /// Only apply the update if the attempt is still `pending`, `dispatched` or `orphaned`.
    pub open_only: bool,
}

impl AttemptUpdate {
    pub fn status(status: AttemptStatus) -> Self {
        Self { status: Some(status), ..Default::default() }
    }

    pub fn with_intent_id<S: Into<String>>(mut self, intent_id: S) -> Self {
        self.intent_id = Some(intent_id.into());
        self
    }

    pub fn with_error<S: Into<String>>(mut self, error: S) -> Self {
        self.last_error = Some(error.into());
        self
    }

    pub fn if_open(mut self) -> Self {
        self.open_only = true;
        self
    }
}

/// The local ledger of payment intents.
#[allow(async_fn_in_trait)]
pub trait PaymentAttemptManagement {
    /// Atomically claims the invoice's payment slot by inserting a `pending` attempt.
    ///
    /// The claim succeeds only if the invoice is `draft` or `sent` and has no `pending`, `dispatched` or `orphaned`
    /// attempt. Otherwise the result is [`StoreError::PaymentInProgress`], [`StoreError::InvoiceNotPayable`] or
    /// [`StoreError::InvoiceNotFound`].
    async fn claim_payment_slot(&self, attempt: NewPaymentAttempt) -> Result<PaymentAttempt, StoreError>;

    /// Applies the update. Fails with [`StoreError::AttemptNotFound`] if there is no such attempt, or if the update is
    /// `open_only` and the attempt has already been closed.
    async fn update_attempt(&self, id: i64, update: AttemptUpdate) -> Result<PaymentAttempt, StoreError>;

    /// Records one more cancellation try against the attempt and returns the new count.
    async fn increment_cancel_attempts(&self, id: i64) -> Result<i64, StoreError>;

    /// Moves the active or orphaned attempt for `intent_id` to `status`. Returns `None` if there is no such attempt,
    /// or it is already closed.
    async fn close_attempt_for_intent(
        &self,
        intent_id: &str,
        status: AttemptStatus,
    ) -> Result<Option<PaymentAttempt>, StoreError>;

    async fn fetch_attempts_for_invoice(&self, invoice_id: &InvoiceId) -> Result<Vec<PaymentAttempt>, StoreError>;

    async fn fetch_attempts_by_status(&self, status: AttemptStatus) -> Result<Vec<PaymentAttempt>, StoreError>;

    /// Marks `pending` attempts that never received an intent and are older than `age` as `abandoned`, releasing the
    /// invoices' payment slots. Returns the attempts that were abandoned.
    async fn abandon_stale_attempts(&self, age: Duration) -> Result<Vec<PaymentAttempt>, StoreError>;

    /// Fetches `dispatched` attempts that have been waiting on the customer for at least `age`.
    async fn fetch_expired_dispatches(&self, age: Duration) -> Result<Vec<PaymentAttempt>, StoreError>;
}
