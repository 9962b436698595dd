//! The live [`PaymentProcessor`], backed by Stripe Connect and Stripe Terminal.
//!
//! Also hosts the event hooks that the server attaches to the payment engine.
use futures::future::BoxFuture;
use log::*;
use payment_common::{Cents, USD_CURRENCY_CODE};
use stripe_tools::{
    Address,
    NewPaymentIntent,
    PaymentIntent as StripeIntent,
    Payout,
    StripeApi,
    StripeApiError,
    StripeConfig,
    TerminalReader,
};
use terminal_payment_engine::{
    db_types::{ShopAccount, ShopAddress, ShopId, TerminalStatus},
    events::{EventHandlers, EventHooks, IntentOrphanedEvent, InvoicePaidEvent},
    traits::{
        BalanceSnapshot,
        ChargeSummary,
        DeviceLocation,
        IntentRequest,
        IntentStatus,
        OnboardingLink,
        PaymentIntent,
        PaymentProcessor,
        PayoutInterval,
        PayoutSummary,
        ProcessorError,
        TerminalDevice,
    },
};

pub const ENGINE_EVENT_BUFFER_SIZE: usize = 25;
/// Stripe caps list pages at 100 items.
const MAX_PAGE_SIZE: u32 = 100;

#[derive(Clone)]
pub struct StripeProcessor {
    api: StripeApi,
}

impl StripeProcessor {
    pub fn new(config: StripeConfig) -> Result<Self, StripeApiError> {
        let api = StripeApi::new(config)?;
        Ok(Self { api })
    }
}

fn processor_error(e: StripeApiError) -> ProcessorError {
    match e {
        StripeApiError::NotConfigured => ProcessorError::NotConfigured,
        StripeApiError::NotFound(msg) => ProcessorError::NotFound(msg),
        StripeApiError::QueryError { status, message } if status >= 500 || status == 429 => {
            ProcessorError::Unavailable(format!("Error {status}. {message}"))
        },
        StripeApiError::QueryError { status, message } => {
            ProcessorError::Rejected(format!("Error {status}. {message}"))
        },
        e if e.is_unavailable() => ProcessorError::Unavailable(e.to_string()),
        e => ProcessorError::Rejected(e.to_string()),
    }
}

impl PaymentProcessor for StripeProcessor {
    async fn create_connected_account(&self, shop: &ShopAccount) -> Result<String, ProcessorError> {
        let account = self
            .api
            .create_express_account(shop.shop_id.as_str(), shop.name.as_deref())
            .await
            .map_err(processor_error)?;
        Ok(account.id)
    }

    async fn create_onboarding_link(
        &self,
        account_id: &str,
        refresh_url: &str,
        return_url: &str,
    ) -> Result<OnboardingLink, ProcessorError> {
        let link = self.api.create_account_link(account_id, refresh_url, return_url).await.map_err(processor_error)?;
        Ok(OnboardingLink { url: link.url, expires_at: link.expires_at })
    }

    async fn fetch_balance(&self, account_id: &str) -> Result<BalanceSnapshot, ProcessorError> {
        let balance = self.api.retrieve_balance(account_id).await.map_err(processor_error)?;
        Ok(BalanceSnapshot {
            available: balance.available_in(USD_CURRENCY_CODE),
            pending: balance.pending_in(USD_CURRENCY_CODE),
        })
    }

    async fn fetch_recent_charges(&self, account_id: &str, limit: u32) -> Result<Vec<ChargeSummary>, ProcessorError> {
        let charges = self.api.list_charges(account_id, limit.min(MAX_PAGE_SIZE)).await.map_err(processor_error)?;
        let charges = charges
            .data
            .into_iter()
            .map(|c| ChargeSummary { succeeded: c.succeeded(), id: c.id, amount: c.amount, created: c.created })
            .collect();
        Ok(charges)
    }

    async fn fetch_recent_payouts(&self, account_id: &str, limit: u32) -> Result<Vec<PayoutSummary>, ProcessorError> {
        let payouts = self.api.list_payouts(account_id, limit.min(MAX_PAGE_SIZE)).await.map_err(processor_error)?;
        Ok(payouts.data.into_iter().map(payout_summary).collect())
    }

    async fn create_payout(&self, account_id: &str, amount: Cents) -> Result<PayoutSummary, ProcessorError> {
        let payout = self.api.create_payout(account_id, amount, USD_CURRENCY_CODE).await.map_err(processor_error)?;
        info!("💸️ Payout {} of {} requested for {account_id}", payout.id, payout.amount);
        Ok(payout_summary(payout))
    }

    async fn set_payout_interval(&self, account_id: &str, interval: PayoutInterval) -> Result<(), ProcessorError> {
        self.api.update_payout_schedule(account_id, interval.as_str()).await.map_err(processor_error)?;
        Ok(())
    }

    async fn create_location(
        &self,
        display_name: &str,
        address: &ShopAddress,
    ) -> Result<DeviceLocation, ProcessorError> {
        let address = Address {
            line1: address.line1.clone(),
            city: address.city.clone(),
            state: address.state.clone(),
            postal_code: address.postal_code.clone(),
            country: address.country.clone(),
        };
        let location = self.api.create_location(display_name, &address).await.map_err(processor_error)?;
        Ok(DeviceLocation { id: location.id, display_name: location.display_name })
    }

    async fn list_devices(&self) -> Result<Vec<TerminalDevice>, ProcessorError> {
        let readers = self.api.list_readers(MAX_PAGE_SIZE).await.map_err(processor_error)?;
        Ok(readers.data.into_iter().filter(|r| !r.deleted).map(terminal_device).collect())
    }

    async fn assign_device(
        &self,
        device_id: &str,
        location_id: &str,
        shop_id: &ShopId,
    ) -> Result<TerminalDevice, ProcessorError> {
        let label = format!("Shop {shop_id}");
        let metadata = [("locationId", location_id), ("shopId", shop_id.as_str())];
        // Stripe cannot move a registered reader, so the shop's location is only recorded in the metadata
        let reader = self.api.update_reader(device_id, &label, &metadata).await.map_err(processor_error)?;
        Ok(terminal_device(reader))
    }

    async fn fetch_device(&self, device_id: &str) -> Result<Option<TerminalDevice>, ProcessorError> {
        let reader = self.api.retrieve_reader(device_id).await.map_err(processor_error)?;
        Ok(reader.map(terminal_device))
    }

    async fn create_payment_intent(&self, request: &IntentRequest) -> Result<PaymentIntent, ProcessorError> {
        let intent = NewPaymentIntent {
            amount: request.amount,
            currency: request.currency.clone(),
            metadata: vec![
                ("invoiceId".to_string(), request.invoice_id.to_string()),
                ("shopId".to_string(), request.shop_id.to_string()),
            ],
            destination: request.destination.as_ref().map(|d| (d.account_id.clone(), d.application_fee)),
        };
        let intent = self.api.create_payment_intent(&intent).await.map_err(processor_error)?;
        Ok(payment_intent(intent))
    }

    async fn process_payment_intent(&self, device_id: &str, intent_id: &str) -> Result<TerminalDevice, ProcessorError> {
        let reader = self.api.process_payment_intent(device_id, intent_id).await.map_err(processor_error)?;
        if let Some(msg) = reader.action.as_ref().and_then(|a| a.failure_message.as_ref()) {
            return Err(ProcessorError::Rejected(format!("Reader {device_id} failed the action. {msg}")));
        }
        Ok(terminal_device(reader))
    }

    async fn cancel_payment_intent(&self, intent_id: &str) -> Result<PaymentIntent, ProcessorError> {
        let intent = self.api.cancel_payment_intent(intent_id).await.map_err(processor_error)?;
        Ok(payment_intent(intent))
    }
}

fn payout_summary(payout: Payout) -> PayoutSummary {
    PayoutSummary { id: payout.id, amount: payout.amount, status: payout.status, arrival_date: payout.arrival_date }
}

fn terminal_device(reader: TerminalReader) -> TerminalDevice {
    let status = if reader.is_online() { TerminalStatus::Online } else { TerminalStatus::Offline };
    TerminalDevice {
        status,
        current_action: reader.action.map(|a| a.action_type),
        id: reader.id,
        serial: reader.serial_number,
        model: reader.device_type,
        location_id: reader.location,
        label: reader.label,
    }
}

fn intent_status(status: &str) -> IntentStatus {
    match status {
        "requires_payment_method" | "requires_confirmation" | "requires_action" | "requires_capture" => {
            IntentStatus::Created
        },
        "processing" => IntentStatus::Processing,
        "succeeded" => IntentStatus::Succeeded,
        "canceled" => IntentStatus::Canceled,
        _ => IntentStatus::Failed,
    }
}

fn payment_intent(mut intent: StripeIntent) -> PaymentIntent {
    PaymentIntent {
        status: intent_status(&intent.status),
        invoice_id: intent.metadata.remove("invoiceId"),
        shop_id: intent.metadata.remove("shopId"),
        destination_account: intent.transfer_data.map(|t| t.destination),
        application_fee: intent.application_fee_amount,
        id: intent.id,
        amount: intent.amount,
        currency: intent.currency,
    }
}

/// Builds the handlers for engine events.
///
/// 1. InvoicePaidEvent: logged. Downstream notifications (SMS, email) are owned by other services that read the invoice
///    table.
/// 2. IntentOrphanedEvent: a payment intent could not be dispatched and could not be canceled either. Logged at error
///    level. The sweeper keeps trying to cancel it.
pub fn create_engine_event_handlers() -> EventHandlers {
    let mut hooks = EventHooks::default();
    hooks.on_invoice_paid(|ev: InvoicePaidEvent| {
        let invoice = ev.invoice;
        info!(
            "🧾️ Invoice {} for shop {} is paid. Payment intent: {}",
            invoice.id,
            invoice.shop_id,
            invoice.payment_intent_id.as_deref().unwrap_or("unknown")
        );
        no_op()
    });
    hooks.on_intent_orphaned(|ev: IntentOrphanedEvent| {
        error!(
            "🚨️ Payment intent {} for invoice {} (shop {}) is orphaned and may still be collectable. Attempt #{}. {}",
            ev.intent_id, ev.invoice_id, ev.shop_id, ev.attempt_id, ev.reason
        );
        no_op()
    });
    EventHandlers::new(ENGINE_EVENT_BUFFER_SIZE, hooks)
}

fn no_op() -> BoxFuture<'static, ()> {
    Box::pin(async {})
}
