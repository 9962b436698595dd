//! Verifies processor webhooks and reconciles them into invoice state.
//!
//! Deliveries are at-least-once, so every state change made here is guarded on the prior state and redelivering an
//! event is a no-op.
use std::{fmt::Debug, time::Duration};

use log::*;
use payment_common::Secret;
use serde::Deserialize;
use serde_json::Value;

use crate::{
    db_types::{AttemptStatus, Invoice, InvoiceId},
    events::{EventProducers, InvoicePaidEvent},
    helpers::{verify_signature, DEFAULT_SIGNATURE_TOLERANCE},
    tpe_api::errors::WebhookError,
    traits::{InvoiceManagement, PaymentAttemptManagement, StoreError},
};

pub const INTENT_SUCCEEDED: &str = "payment_intent.succeeded";
pub const INTENT_CANCELED: &str = "payment_intent.canceled";
pub const INTENT_FAILED: &str = "payment_intent.payment_failed";

/// The payment intent events the reconciler acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessorEvent {
    IntentSucceeded { event_id: String, intent_id: String, invoice_id: Option<InvoiceId> },
    IntentCanceled { event_id: String, intent_id: String },
    IntentFailed { event_id: String, intent_id: String, reason: Option<String> },
    Other { event_id: String, event_type: String },
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: RawEventData,
}

#[derive(Debug, Deserialize)]
struct RawEventData {
    object: Value,
}

impl ProcessorEvent {
    /// Parses a webhook body. Only the fields the reconciler needs are read.
    pub fn parse(payload: &[u8]) -> Result<Self, String> {
        let raw: RawEvent = serde_json::from_slice(payload).map_err(|e| format!("Invalid event JSON: {e}"))?;
        let RawEvent { id: event_id, event_type, data } = raw;
        if !event_type.starts_with("payment_intent.") {
            return Ok(Self::Other { event_id, event_type });
        }
        let intent_id = data
            .object
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| format!("Event {event_id} ({event_type}) has no payment intent id"))?
            .to_string();
        let event = match event_type.as_str() {
            INTENT_SUCCEEDED => {
                let invoice_id = data.object.pointer("/metadata/invoiceId").and_then(Value::as_str).and_then(|s| {
                    s.parse::<InvoiceId>()
                        .map_err(|e| warn!("🪝️ Event {event_id} carries an unusable invoice id. {e}"))
                        .ok()
                });
                Self::IntentSucceeded { event_id, intent_id, invoice_id }
            },
            INTENT_CANCELED => Self::IntentCanceled { event_id, intent_id },
            INTENT_FAILED => {
                let reason = data.object.pointer("/last_payment_error/message").and_then(Value::as_str).map(String::from);
                Self::IntentFailed { event_id, intent_id, reason }
            },
            _ => Self::Other { event_id, event_type },
        };
        Ok(event)
    }
}

/// What the reconciler did with an event. Every outcome is acknowledged to the processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// The invoice was moved to `paid` by this delivery.
    InvoicePaid(InvoiceId),
    /// The invoice was already paid. Nothing changed.
    AlreadyPaid(InvoiceId),
    AttemptClosed { intent_id: String, status: AttemptStatus },
    Ignored(String),
    /// The body was correctly signed, but could not be understood.
    Malformed(String),
}

pub struct WebhookApi<B> {
    db: B,
    producers: EventProducers,
    secret: Secret<String>,
    tolerance: Duration,
}

impl<B> Debug for WebhookApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WebhookApi")
    }
}

impl<B> WebhookApi<B>
where B: InvoiceManagement + PaymentAttemptManagement
{
    pub fn new(db: B, producers: EventProducers, secret: Secret<String>) -> Self {
        Self { db, producers, secret, tolerance: DEFAULT_SIGNATURE_TOLERANCE }
    }

    pub fn with_tolerance(mut self, tolerance: Duration) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Verifies the signature of a webhook delivery and applies it.
    ///
    /// An invalid signature is the only error that is not caused by this server; it leaves no trace beyond a log line.
    /// Correctly signed bodies that cannot be parsed are logged and acknowledged.
    pub async fn handle_processor_event(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<WebhookOutcome, WebhookError> {
        if let Err(e) = verify_signature(self.secret.reveal(), signature_header, payload, self.tolerance) {
            warn!("🪝️ Rejecting webhook delivery. {e}");
            return Err(WebhookError::SignatureInvalid(e));
        }
        match ProcessorEvent::parse(payload) {
            Ok(event) => self.apply_event(event).await,
            Err(reason) => {
                error!("🪝️ Acknowledging a signed webhook that could not be parsed. {reason}");
                Ok(WebhookOutcome::Malformed(reason))
            },
        }
    }

    /// Applies an already-verified event.
    pub async fn apply_event(&self, event: ProcessorEvent) -> Result<WebhookOutcome, WebhookError> {
        match event {
            ProcessorEvent::IntentSucceeded { event_id, intent_id, invoice_id: Some(invoice_id) } => {
                debug!("🪝️ Event {event_id}: {intent_id} succeeded for invoice {invoice_id}");
                match reconcile_paid(&self.db, &self.producers, &invoice_id, &intent_id).await? {
                    Some(_) => Ok(WebhookOutcome::InvoicePaid(invoice_id)),
                    None => Ok(WebhookOutcome::AlreadyPaid(invoice_id)),
                }
            },
            ProcessorEvent::IntentSucceeded { event_id, intent_id, invoice_id: None } => {
                info!("🪝️ Event {event_id}: {intent_id} succeeded, but is not linked to an invoice. Ignoring it");
                Ok(WebhookOutcome::Ignored(INTENT_SUCCEEDED.to_string()))
            },
            ProcessorEvent::IntentCanceled { event_id, intent_id } => {
                debug!("🪝️ Event {event_id}: {intent_id} was canceled");
                self.close_attempt(intent_id, AttemptStatus::Canceled, INTENT_CANCELED).await
            },
            ProcessorEvent::IntentFailed { event_id, intent_id, reason } => {
                let reason = reason.unwrap_or_else(|| "no reason given".into());
                info!("🪝️ Event {event_id}: payment {intent_id} failed. {reason}");
                self.close_attempt(intent_id, AttemptStatus::Failed, INTENT_FAILED).await
            },
            ProcessorEvent::Other { event_id, event_type } => {
                trace!("🪝️ Event {event_id} of type {event_type} is not handled. Acknowledging it");
                Ok(WebhookOutcome::Ignored(event_type))
            },
        }
    }

    async fn close_attempt(
        &self,
        intent_id: String,
        status: AttemptStatus,
        event_type: &str,
    ) -> Result<WebhookOutcome, WebhookError> {
        match self.db.close_attempt_for_intent(&intent_id, status).await? {
            Some(attempt) => {
                info!("🪝️ Payment slot for invoice {} released. Attempt #{} is {status}", attempt.invoice_id, attempt.id);
                Ok(WebhookOutcome::AttemptClosed { intent_id, status })
            },
            None => {
                debug!("🪝️ No open attempt for {intent_id}. Nothing to do");
                Ok(WebhookOutcome::Ignored(event_type.to_string()))
            },
        }
    }
}

/// The single path by which an invoice becomes paid. The store applies the transition only if the invoice is not
/// already paid, and the `InvoicePaid` event is only published when it did.
pub(crate) async fn reconcile_paid<B: InvoiceManagement>(
    db: &B,
    producers: &EventProducers,
    invoice_id: &InvoiceId,
    intent_id: &str,
) -> Result<Option<Invoice>, StoreError> {
    let paid = db.mark_invoice_paid(invoice_id, intent_id).await?;
    match &paid {
        Some(invoice) => {
            info!("🪝️ Invoice {invoice_id} is paid by {intent_id}");
            producers.publish_invoice_paid(InvoicePaidEvent::new(invoice.clone())).await;
        },
        None => info!("🪝️ Invoice {invoice_id} is already paid, or does not exist. {intent_id} changes nothing"),
    }
    Ok(paid)
}
