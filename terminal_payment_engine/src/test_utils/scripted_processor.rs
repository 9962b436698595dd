//! A [`PaymentProcessor`] whose behaviour tests can script.
//!
//! Every call is counted. Any operation can be made to fail, or to hang, a given number of times. Reader inventory,
//! balances and charges are held in memory and can be edited between calls. Ids look like live processor ids, so
//! live-mode code paths treat them as real.
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
        Mutex,
    },
    time::Duration,
};

use chrono::Utc;
use payment_common::Cents;

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

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    CreateAccount,
    OnboardingLink,
    Balance,
    Charges,
    Payouts,
    CreatePayout,
    PayoutInterval,
    CreateLocation,
    ListDevices,
    AssignDevice,
    FetchDevice,
    CreateIntent,
    ProcessIntent,
    CancelIntent,
}

#[derive(Debug, Clone)]
pub enum Fault {
    Reject(String),
    Unavailable,
    /// Never answers. Use with a short dispatch timeout.
    Hang,
}

#[derive(Default)]
struct Script {
    calls: HashMap<Op, usize>,
    faults: HashMap<Op, (Fault, usize)>,
    devices: Vec<TerminalDevice>,
    balance: BalanceSnapshot,
    charges: Vec<ChargeSummary>,
    payouts: Vec<PayoutSummary>,
    intents: Vec<IntentRequest>,
    payout_interval: Option<PayoutInterval>,
}

#[derive(Clone, Default)]
pub struct ScriptedProcessor {
    script: Arc<Mutex<Script>>,
    ids: Arc<AtomicU64>,
}

impl ScriptedProcessor {
    /// A processor with a single unassigned, online reader.
    pub fn new() -> Self {
        let processor = Self::default();
        processor.add_device(Self::reader("tmr_reader_1", TerminalStatus::Online, None));
        processor
    }

    pub fn reader(id: &str, status: TerminalStatus, location_id: Option<&str>) -> TerminalDevice {
        TerminalDevice {
            id: id.to_string(),
            serial: format!("WSC-{}", id.to_uppercase()),
            model: "bbpos_wisepos_e".to_string(),
            status,
            location_id: location_id.map(String::from),
            label: None,
            current_action: None,
        }
    }

    fn with_script<T>(&self, f: impl FnOnce(&mut Script) -> T) -> T {
        let mut script = self.script.lock().expect("script lock poisoned");
        f(&mut script)
    }

    /// Makes the next `times` calls to `op` fail with `fault`.
    pub fn fail(&self, op: Op, fault: Fault, times: usize) {
        self.with_script(|s| s.faults.insert(op, (fault, times)));
    }

    pub fn calls(&self, op: Op) -> usize {
        self.with_script(|s| s.calls.get(&op).copied().unwrap_or_default())
    }

    pub fn total_calls(&self) -> usize {
        self.with_script(|s| s.calls.values().sum())
    }

    pub fn add_device(&self, device: TerminalDevice) {
        self.with_script(|s| s.devices.push(device));
    }

    pub fn remove_device(&self, device_id: &str) {
        self.with_script(|s| s.devices.retain(|d| d.id != device_id));
    }

    pub fn set_device_status(&self, device_id: &str, status: TerminalStatus) {
        self.with_script(|s| s.devices.iter_mut().filter(|d| d.id == device_id).for_each(|d| d.status = status));
    }

    pub fn set_balance(&self, balance: BalanceSnapshot) {
        self.with_script(|s| s.balance = balance);
    }

    pub fn add_charge(&self, amount: Cents, succeeded: bool) {
        let id = self.next_id("ch");
        self.with_script(|s| s.charges.push(ChargeSummary { id, amount, succeeded, created: Utc::now() }));
    }

    pub fn add_payout(&self, amount: Cents) {
        let id = self.next_id("po");
        self.with_script(|s| {
            s.payouts.push(PayoutSummary { id, amount, status: "paid".into(), arrival_date: Utc::now() })
        });
    }

    /// The intent requests that were sent, in order.
    pub fn intent_requests(&self) -> Vec<IntentRequest> {
        self.with_script(|s| s.intents.clone())
    }

    pub fn payout_interval(&self) -> Option<PayoutInterval> {
        self.with_script(|s| s.payout_interval)
    }

    fn next_id(&self, kind: &str) -> String {
        format!("{kind}_{}", self.ids.fetch_add(1, Ordering::SeqCst) + 1)
    }

    async fn call(&self, op: Op) -> Result<(), ProcessorError> {
        let fault = self.with_script(|s| {
            *s.calls.entry(op).or_default() += 1;
            match s.faults.get_mut(&op) {
                Some((fault, remaining)) if *remaining > 0 => {
                    *remaining -= 1;
                    Some(fault.clone())
                },
                _ => None,
            }
        });
        match fault {
            None => Ok(()),
            Some(Fault::Reject(msg)) => Err(ProcessorError::Rejected(msg)),
            Some(Fault::Unavailable) => Err(ProcessorError::Unavailable(format!("{op:?} timed out"))),
            Some(Fault::Hang) => {
                tokio::time::sleep(Duration::from_secs(3_600)).await;
                Err(ProcessorError::Unavailable(format!("{op:?} hung")))
            },
        }
    }
}

impl PaymentProcessor for ScriptedProcessor {
    async fn create_connected_account(&self, _shop: &ShopAccount) -> Result<String, ProcessorError> {
        self.call(Op::CreateAccount).await?;
        Ok(self.next_id("acct"))
    }

    async fn create_onboarding_link(
        &self,
        account_id: &str,
        _refresh_url: &str,
        _return_url: &str,
    ) -> Result<OnboardingLink, ProcessorError> {
        self.call(Op::OnboardingLink).await?;
        let url = format!("https://connect.example.com/setup/{account_id}");
        Ok(OnboardingLink { url, expires_at: Utc::now() + chrono::Duration::minutes(5) })
    }

    async fn fetch_balance(&self, _account_id: &str) -> Result<BalanceSnapshot, ProcessorError> {
        self.call(Op::Balance).await?;
        Ok(self.with_script(|s| s.balance))
    }

    async fn fetch_recent_charges(&self, _account_id: &str, limit: u32) -> Result<Vec<ChargeSummary>, ProcessorError> {
        self.call(Op::Charges).await?;
        Ok(self.with_script(|s| s.charges.iter().rev().take(limit as usize).cloned().collect()))
    }

    async fn fetch_recent_payouts(&self, _account_id: &str, limit: u32) -> Result<Vec<PayoutSummary>, ProcessorError> {
        self.call(Op::Payouts).await?;
        Ok(self.with_script(|s| s.payouts.iter().rev().take(limit as usize).cloned().collect()))
    }

    async fn create_payout(&self, _account_id: &str, amount: Cents) -> Result<PayoutSummary, ProcessorError> {
        self.call(Op::CreatePayout).await?;
        let payout = PayoutSummary { id: self.next_id("po"), amount, status: "pending".into(), arrival_date: Utc::now() };
        self.with_script(|s| s.payouts.push(payout.clone()));
        Ok(payout)
    }

    async fn set_payout_interval(&self, _account_id: &str, interval: PayoutInterval) -> Result<(), ProcessorError> {
        self.call(Op::PayoutInterval).await?;
        self.with_script(|s| s.payout_interval = Some(interval));
        Ok(())
    }

    async fn create_location(
        &self,
        display_name: &str,
        _address: &ShopAddress,
    ) -> Result<DeviceLocation, ProcessorError> {
        self.call(Op::CreateLocation).await?;
        Ok(DeviceLocation { id: self.next_id("tml"), display_name: display_name.to_string() })
    }

    async fn list_devices(&self) -> Result<Vec<TerminalDevice>, ProcessorError> {
        self.call(Op::ListDevices).await?;
        Ok(self.with_script(|s| s.devices.clone()))
    }

    async fn assign_device(
        &self,
        device_id: &str,
        _location_id: &str,
        shop_id: &ShopId,
    ) -> Result<TerminalDevice, ProcessorError> {
        self.call(Op::AssignDevice).await?;
        self.with_script(|s| {
            let device = s
                .devices
                .iter_mut()
                .find(|d| d.id == device_id)
                .ok_or_else(|| ProcessorError::NotFound(device_id.to_string()))?;
            device.label = Some(format!("Shop {shop_id}"));
            Ok(device.clone())
        })
    }

    async fn fetch_device(&self, device_id: &str) -> Result<Option<TerminalDevice>, ProcessorError> {
        self.call(Op::FetchDevice).await?;
        Ok(self.with_script(|s| s.devices.iter().find(|d| d.id == device_id).cloned()))
    }

    async fn create_payment_intent(&self, request: &IntentRequest) -> Result<PaymentIntent, ProcessorError> {
        self.call(Op::CreateIntent).await?;
        self.with_script(|s| s.intents.push(request.clone()));
        Ok(PaymentIntent {
            id: self.next_id("pi"),
            amount: request.amount,
            currency: request.currency.clone(),
            status: IntentStatus::Created,
            application_fee: request.destination.as_ref().map(|d| d.application_fee),
            destination_account: request.destination.as_ref().map(|d| d.account_id.clone()),
            invoice_id: Some(request.invoice_id.to_string()),
            shop_id: Some(request.shop_id.to_string()),
        })
    }

    async fn process_payment_intent(&self, device_id: &str, _intent_id: &str) -> Result<TerminalDevice, ProcessorError> {
        self.call(Op::ProcessIntent).await?;
        let device = self.with_script(|s| s.devices.iter().find(|d| d.id == device_id).cloned());
        let mut device = device.ok_or_else(|| ProcessorError::NotFound(device_id.to_string()))?;
        device.current_action = Some("process_payment_intent".into());
        Ok(device)
    }

    async fn cancel_payment_intent(&self, intent_id: &str) -> Result<PaymentIntent, ProcessorError> {
        self.call(Op::CancelIntent).await?;
        Ok(PaymentIntent {
            id: intent_id.to_string(),
            amount: Cents::default(),
            currency: "usd".into(),
            status: IntentStatus::Canceled,
            application_fee: None,
            destination_account: None,
            invoice_id: None,
            shop_id: None,
        })
    }
}
