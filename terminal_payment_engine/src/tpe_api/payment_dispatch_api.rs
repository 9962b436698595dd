//! Turns an invoice into a card-present payment on the shop's reader.
//!
//! The flow for a single call is:
//! 1. The amount is computed from the stored invoice. Client-supplied totals are never used.
//! 2. The invoice's payment slot is claimed in the store. An invoice has at most one active intent at a time.
//! 3. An intent is created and handed to the reader, bounded by the dispatch timeout.
//! 4. If the reader does not accept it, the intent is canceled (with retries). An intent that cannot be canceled is
//!    marked orphaned and an [`IntentOrphanedEvent`] is raised. An orphaned intent keeps the invoice's payment slot
//!    until the sweeper manages to cancel it.
//!
//! A dispatched intent that the customer never pays is canceled by the sweeper once the dispatch expiry has passed.
//!
//! A successful dispatch leaves the invoice untouched. Only a verified `payment_intent.succeeded` webhook marks it paid.
//! In test mode that webhook is simulated after a short delay, through the same guarded transition.
use std::{fmt::Debug, time::Duration};

use log::*;
use payment_common::{Cents, USD_CURRENCY_CODE_LOWER};

use crate::{
    db_types::{AttemptStatus, InvoiceId, NewPaymentAttempt, PaymentAttempt, ShopId},
    events::{EventProducers, IntentOrphanedEvent},
    simulator::{is_simulated_id, TestModeSimulator},
    tpe_api::{
        errors::DispatchError,
        payment_objects::{DispatchPolicy, PaymentDispatched, PaymentMode},
        webhook_api::reconcile_paid,
    },
    traits::{
        AttemptUpdate,
        IntentDestination,
        IntentRequest,
        PaymentProcessor,
        StoreError,
        TerminalPaymentDatabase,
    },
};

/// What a sweep of the attempt ledger did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Orphaned intents that were canceled on this pass
    pub canceled: Vec<String>,
    /// Orphaned intents that still could not be canceled
    pub still_orphaned: Vec<String>,
    /// Dispatched intents that expired unpaid and were canceled on this pass
    pub expired: Vec<String>,
    /// Stale claims that were released
    pub abandoned: Vec<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Compensation {
    Canceled,
    Orphaned,
    /// A webhook settled the attempt while it was being canceled.
    ClosedElsewhere,
}

pub struct PaymentDispatchApi<B, P> {
    db: B,
    processor: P,
    simulator: TestModeSimulator,
    producers: EventProducers,
    policy: DispatchPolicy,
}

impl<B, P> Debug for PaymentDispatchApi<B, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentDispatchApi ({:?})", self.policy)
    }
}

impl<B, P> PaymentDispatchApi<B, P>
where
    B: TerminalPaymentDatabase,
    P: PaymentProcessor,
{
    pub fn new(db: B, processor: P, producers: EventProducers, policy: DispatchPolicy) -> Self {
        Self { db, processor, simulator: TestModeSimulator::new(), producers, policy }
    }

    pub fn policy(&self) -> &DispatchPolicy {
        &self.policy
    }

    /// Starts a card-present payment for the invoice on the shop's reader.
    ///
    /// Returns once the reader has accepted the intent. The invoice is not marked as paid here.
    pub async fn create_payment(
        &self,
        invoice_id: &InvoiceId,
        shop_id: &ShopId,
        mode: PaymentMode,
    ) -> Result<PaymentDispatched, DispatchError> {
        let not_found = || DispatchError::InvoiceNotFound { invoice_id: invoice_id.clone(), shop_id: shop_id.clone() };
        let invoice = self.db.fetch_invoice_for_shop(invoice_id, shop_id).await?.ok_or_else(not_found)?;
        let amount = invoice
            .amount_due()
            .map_err(|e| DispatchError::InvalidAmount { invoice_id: invoice_id.clone(), reason: e.to_string() })?;
        if !amount.is_positive() {
            return Err(DispatchError::invalid_amount(invoice_id, amount));
        }
        let shop = self.db.fetch_shop(shop_id).await?.ok_or_else(|| DispatchError::NoTerminal(shop_id.clone()))?;
        let terminal_id = shop.terminal_id.clone().ok_or_else(|| DispatchError::NoTerminal(shop_id.clone()))?;
        if !mode.is_test() && is_simulated_id(&terminal_id) {
            warn!("💳️ Shop {shop_id} only has simulated reader {terminal_id}. It cannot take live payments");
            return Err(DispatchError::NoTerminal(shop_id.clone()));
        }
        let fee = self.policy.fees.fee_for(amount);
        let destination =
            shop.connected_account_id.map(|account_id| IntentDestination { account_id, application_fee: fee });
        let application_fee = if destination.is_some() { fee } else { Cents::default() };
        let claim = NewPaymentAttempt {
            invoice_id: invoice_id.clone(),
            shop_id: shop_id.clone(),
            amount,
            application_fee,
            reader_id: terminal_id.clone(),
        };
        let attempt = self.db.claim_payment_slot(claim).await.map_err(|e| match e {
            StoreError::InvoiceNotFound(_) => not_found(),
            e => DispatchError::from(e),
        })?;
        let request = IntentRequest {
            amount,
            currency: USD_CURRENCY_CODE_LOWER.to_string(),
            invoice_id: invoice_id.clone(),
            shop_id: shop_id.clone(),
            destination,
        };
        let intent_id = with_processor!(self, mode, p => self.dispatch_with(p, &attempt, &request).await)?;
        let message = if mode.is_test() {
            tokio::time::sleep(self.policy.simulated_delay).await;
            reconcile_paid(&self.db, &self.producers, invoice_id, &intent_id).await?;
            format!("Test payment of {amount} completed on simulated reader {terminal_id}")
        } else {
            format!("Payment of {amount} sent to reader {terminal_id}. Waiting for the customer to present a card")
        };
        info!("💳️ {message} (invoice {invoice_id}, intent {intent_id})");
        Ok(PaymentDispatched { payment_intent: intent_id, amount, application_fee, terminal_id, message })
    }

    /// Creates the intent and hands it to the reader. Returns the intent id if the reader accepted it.
    async fn dispatch_with<Q: PaymentProcessor>(
        &self,
        processor: &Q,
        attempt: &PaymentAttempt,
        request: &IntentRequest,
    ) -> Result<String, DispatchError> {
        let invoice_id = &attempt.invoice_id;
        let intent = match processor.create_payment_intent(request).await {
            Ok(intent) => intent,
            Err(e) => {
                warn!("💳️ Could not create an intent for invoice {invoice_id}. Releasing its payment slot. {e}");
                let update = AttemptUpdate::status(AttemptStatus::Failed).with_error(e.to_string());
                self.db.update_attempt(attempt.id, update).await?;
                return Err(DispatchError::from_processor(invoice_id, e));
            },
        };
        self.db.update_attempt(attempt.id, AttemptUpdate::default().with_intent_id(&intent.id)).await?;
        trace!("💳️ Intent {} created for invoice {invoice_id}", intent.id);
        let timeout = self.policy.dispatch_timeout;
        let dispatched =
            tokio::time::timeout(timeout, processor.process_payment_intent(&attempt.reader_id, &intent.id)).await;
        let reason = match dispatched {
            Ok(Ok(_)) => {
                self.db.update_attempt(attempt.id, AttemptUpdate::status(AttemptStatus::Dispatched)).await?;
                debug!("💳️ Intent {} is on reader {}", intent.id, attempt.reader_id);
                return Ok(intent.id);
            },
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("the reader did not respond within {}s", timeout.as_secs_f32()),
        };
        warn!("💳️ Reader {} did not take intent {} for invoice {invoice_id}. {reason}", attempt.reader_id, intent.id);
        let canceled = self.compensate(processor, attempt, &intent.id, &reason).await? == Compensation::Canceled;
        Err(DispatchError::TerminalProcessingFailed {
            invoice_id: invoice_id.clone(),
            terminal_id: attempt.reader_id.clone(),
            intent_id: intent.id,
            reason,
            canceled,
        })
    }

    /// Cancels an intent that will not be paid, retrying with backoff. An intent that cannot be canceled is left
    /// orphaned and an [`IntentOrphanedEvent`] is raised.
    async fn compensate<Q: PaymentProcessor>(
        &self,
        processor: &Q,
        attempt: &PaymentAttempt,
        intent_id: &str,
        reason: &str,
    ) -> Result<Compensation, DispatchError> {
        let retry = self.policy.cancel_retry;
        let max_attempts = retry.max_attempts.max(1);
        let mut last_error = String::new();
        for n in 1..=max_attempts {
            self.db.increment_cancel_attempts(attempt.id).await?;
            match processor.cancel_payment_intent(intent_id).await {
                Ok(_) => {
                    let update = AttemptUpdate::status(AttemptStatus::Canceled).with_error(reason);
                    if !self.settle(attempt, update).await? {
                        return Ok(Compensation::ClosedElsewhere);
                    }
                    info!("💳️ Intent {intent_id} for invoice {} canceled", attempt.invoice_id);
                    return Ok(Compensation::Canceled);
                },
                Err(e) => {
                    warn!("💳️ Cancel {n}/{max_attempts} of intent {intent_id} failed. {e}");
                    last_error = e.to_string();
                    if n < max_attempts {
                        tokio::time::sleep(retry.delay_before(n)).await;
                    }
                },
            }
        }
        let update = AttemptUpdate::status(AttemptStatus::Orphaned)
            .with_error(format!("{reason}. Cancellation failed: {last_error}"));
        if !self.settle(attempt, update).await? {
            return Ok(Compensation::ClosedElsewhere);
        }
        error!(
            "🚨️ Intent {intent_id} for invoice {} could not be canceled after {max_attempts} tries and is orphaned. \
             {last_error}",
            attempt.invoice_id
        );
        self.producers.publish_intent_orphaned(IntentOrphanedEvent::new(attempt, intent_id, &last_error)).await;
        Ok(Compensation::Orphaned)
    }

    /// Writes the outcome of a compensation. Returns `false` if a webhook closed the attempt first, in which case the
    /// webhook's outcome stands.
    async fn settle(&self, attempt: &PaymentAttempt, update: AttemptUpdate) -> Result<bool, DispatchError> {
        match self.db.update_attempt(attempt.id, update.if_open()).await {
            Ok(_) => Ok(true),
            Err(StoreError::AttemptNotFound(_)) => {
                let (id, invoice_id) = (attempt.id, &attempt.invoice_id);
                info!("💳️ Attempt #{id} for invoice {invoice_id} was closed while it was being canceled");
                Ok(false)
            },
            Err(e) => Err(e.into()),
        }
    }

    /// Housekeeping for the attempt ledger.
    ///
    /// * Each orphaned intent gets one more cancellation try.
    /// * Dispatched intents that the customer has not paid within the dispatch expiry are canceled, with the same
    ///   retries as a failed dispatch.
    /// * Pending claims older than `stale_after` that never produced an intent are abandoned, releasing the slot.
    pub async fn sweep(&self, stale_after: Duration) -> Result<SweepReport, DispatchError> {
        let mut report = SweepReport::default();
        for attempt in self.db.fetch_attempts_by_status(AttemptStatus::Orphaned).await? {
            let Some(intent_id) = attempt.intent_id.clone() else {
                continue;
            };
            self.db.increment_cancel_attempts(attempt.id).await?;
            let result = if is_simulated_id(&intent_id) {
                self.simulator.cancel_payment_intent(&intent_id).await
            } else {
                self.processor.cancel_payment_intent(&intent_id).await
            };
            match result {
                Ok(_) => {
                    self.db.close_attempt_for_intent(&intent_id, AttemptStatus::Canceled).await?;
                    info!("🧹️ Orphaned intent {intent_id} for invoice {} is now canceled", attempt.invoice_id);
                    report.canceled.push(intent_id);
                },
                Err(e) => {
                    warn!("🧹️ Orphaned intent {intent_id} still cannot be canceled. {e}");
                    report.still_orphaned.push(intent_id);
                },
            }
        }
        let expiry = self.policy.dispatch_expiry;
        for attempt in self.db.fetch_expired_dispatches(expiry).await? {
            let Some(intent_id) = attempt.intent_id.clone() else {
                continue;
            };
            let reason = format!("The customer did not pay within {}s", expiry.as_secs());
            info!("🧹️ Intent {intent_id} for invoice {} has expired. Canceling it", attempt.invoice_id);
            let outcome = if is_simulated_id(&intent_id) {
                self.compensate(&self.simulator, &attempt, &intent_id, &reason).await?
            } else {
                self.compensate(&self.processor, &attempt, &intent_id, &reason).await?
            };
            match outcome {
                Compensation::Canceled => report.expired.push(intent_id),
                Compensation::Orphaned => report.still_orphaned.push(intent_id),
                Compensation::ClosedElsewhere => {},
            }
        }
        let abandoned = self.db.abandon_stale_attempts(stale_after).await?;
        for attempt in &abandoned {
            info!("🧹️ Released stale payment claim #{} for invoice {}", attempt.id, attempt.invoice_id);
        }
        report.abandoned = abandoned.into_iter().map(|a| a.id).collect();
        Ok(report)
    }
}
