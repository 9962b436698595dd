//! # Test-mode simulator
//!
//! [`TestModeSimulator`] is a [`PaymentProcessor`] that never leaves the process. It hands back the same types as the
//! live processor, filled with synthetic values, so that a shop can exercise the whole device and payment flow without
//! hardware, network access or real money.
//!
//! Identifiers have the form `sim_{kind}_{unix millis}_{counter}`. The counter is process-wide, so ids are unique even
//! when many are minted in the same millisecond.
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{Duration, Utc};
use log::*;
use payment_common::{Cents, USD_CURRENCY_CODE_LOWER};

use crate::{
    db_types::{ShopAccount, ShopAddress, ShopId, TerminalStatus},
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

pub const SIMULATED_ID_PREFIX: &str = "sim_";
const SIMULATED_DEVICE_MODEL: &str = "simulated_wisepos_e";

static COUNTER: AtomicU64 = AtomicU64::new(0);

/// Mints a new synthetic identifier for a resource of the given kind, e.g. `sim_pi_1718000000123_4`.
pub fn simulated_id(kind: &str) -> String {
    let n = COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("{SIMULATED_ID_PREFIX}{kind}_{}_{n}", Utc::now().timestamp_millis())
}

pub fn is_simulated_id(id: &str) -> bool {
    id.starts_with(SIMULATED_ID_PREFIX)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TestModeSimulator;

impl TestModeSimulator {
    pub fn new() -> Self {
        Self
    }

    fn device(id: String, location_id: Option<String>, label: Option<String>) -> TerminalDevice {
        let serial = format!("SIM-{}", id.rsplit('_').next().unwrap_or("0"));
        TerminalDevice {
            id,
            serial,
            model: SIMULATED_DEVICE_MODEL.to_string(),
            status: TerminalStatus::Online,
            location_id,
            label,
            current_action: None,
        }
    }
}

impl PaymentProcessor for TestModeSimulator {
    async fn create_connected_account(&self, shop: &ShopAccount) -> Result<String, ProcessorError> {
        let id = simulated_id("acct");
        info!("🧪️ Simulated connected account {id} for shop {}", shop.shop_id);
        Ok(id)
    }

    async fn create_onboarding_link(
        &self,
        account_id: &str,
        _refresh_url: &str,
        return_url: &str,
    ) -> Result<OnboardingLink, ProcessorError> {
        let url = format!("{return_url}?simulated_account={account_id}");
        Ok(OnboardingLink { url, expires_at: Utc::now() + Duration::minutes(5) })
    }

    async fn fetch_balance(&self, _account_id: &str) -> Result<BalanceSnapshot, ProcessorError> {
        Ok(BalanceSnapshot::default())
    }

    async fn fetch_recent_charges(&self, _account_id: &str, _limit: u32) -> Result<Vec<ChargeSummary>, ProcessorError> {
        Ok(Vec::new())
    }

    async fn fetch_recent_payouts(&self, _account_id: &str, _limit: u32) -> Result<Vec<PayoutSummary>, ProcessorError> {
        Ok(Vec::new())
    }

    async fn create_payout(&self, account_id: &str, amount: Cents) -> Result<PayoutSummary, ProcessorError> {
        info!("🧪️ Simulated payout of {amount} from {account_id}");
        Ok(PayoutSummary {
            id: simulated_id("po"),
            amount,
            status: "pending".to_string(),
            arrival_date: Utc::now() + Duration::days(2),
        })
    }

    async fn set_payout_interval(&self, account_id: &str, interval: PayoutInterval) -> Result<(), ProcessorError> {
        debug!("🧪️ Simulated payout schedule for {account_id} set to {}", interval.as_str());
        Ok(())
    }

    async fn create_location(
        &self,
        display_name: &str,
        _address: &ShopAddress,
    ) -> Result<DeviceLocation, ProcessorError> {
        Ok(DeviceLocation { id: simulated_id("tml"), display_name: display_name.to_string() })
    }

    async fn list_devices(&self) -> Result<Vec<TerminalDevice>, ProcessorError> {
        Ok(vec![Self::device(simulated_id("tmr"), None, None)])
    }

    async fn assign_device(
        &self,
        device_id: &str,
        location_id: &str,
        shop_id: &ShopId,
    ) -> Result<TerminalDevice, ProcessorError> {
        info!("🧪️ Simulated reader {device_id} assigned to shop {shop_id}");
        Ok(Self::device(device_id.to_string(), Some(location_id.to_string()), Some(format!("Shop {shop_id}"))))
    }

    async fn fetch_device(&self, device_id: &str) -> Result<Option<TerminalDevice>, ProcessorError> {
        Ok(Some(Self::device(device_id.to_string(), None, None)))
    }

    async fn create_payment_intent(&self, request: &IntentRequest) -> Result<PaymentIntent, ProcessorError> {
        let id = simulated_id("pi");
        info!("🧪️ Simulated payment intent {id} for {} (invoice {})", request.amount, request.invoice_id);
        Ok(PaymentIntent {
            id,
            amount: request.amount,
            currency: request.currency.to_lowercase(),
            status: IntentStatus::Created,
            application_fee: request.destination.as_ref().map(|d| d.application_fee),
            destination_account: request.destination.as_ref().map(|d| d.account_id.clone()),
            invoice_id: Some(request.invoice_id.to_string()),
            shop_id: Some(request.shop_id.to_string()),
        })
    }

    async fn process_payment_intent(&self, device_id: &str, intent_id: &str) -> Result<TerminalDevice, ProcessorError> {
        debug!("🧪️ Simulated dispatch of {intent_id} to {device_id}");
        let mut device = Self::device(device_id.to_string(), None, None);
        device.current_action = Some("process_payment_intent".to_string());
        Ok(device)
    }

    async fn cancel_payment_intent(&self, intent_id: &str) -> Result<PaymentIntent, ProcessorError> {
        debug!("🧪️ Simulated cancellation of {intent_id}");
        Ok(PaymentIntent {
            id: intent_id.to_string(),
            amount: Cents::default(),
            currency: USD_CURRENCY_CODE_LOWER.to_string(),
            status: IntentStatus::Canceled,
            application_fee: None,
            destination_account: None,
            invoice_id: None,
            shop_id: None,
        })
    }
}
