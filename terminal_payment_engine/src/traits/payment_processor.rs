use payment_common::Cents;
use thiserror::Error;

use crate::{
    db_types::{ShopAccount, ShopAddress, ShopId},
    traits::{
        BalanceSnapshot,
        ChargeSummary,
        DeviceLocation,
        IntentRequest,
        OnboardingLink,
        PaymentIntent,
        PayoutInterval,
        PayoutSummary,
        TerminalDevice,
    },
};

#[derive(Debug, Clone, Error)]
pub enum ProcessorError {
    #[error("The payment processor has not been configured")]
    NotConfigured,
    #[error("The payment processor could not be reached: {0}")]
    Unavailable(String),
    #[error("The payment processor rejected the request: {0}")]
    Rejected(String),
    #[error("The payment processor could not find {0}")]
    NotFound(String),
}

impl ProcessorError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, ProcessorError::NotConfigured | ProcessorError::Unavailable(_))
    }
}

/// The card processor operations the engine relies on.
///
/// Implementations must be cheap to clone; every API holds its own copy.
#[allow(async_fn_in_trait)]
pub trait PaymentProcessor: Clone {
    //--------------------------------------   Connected accounts  -----------------------------------------------------

    /// Creates a connected account for the shop that can accept card payments and receive transfers. Returns the
    /// account id.
    async fn create_connected_account(&self, shop: &ShopAccount) -> Result<String, ProcessorError>;

    async fn create_onboarding_link(
        &self,
        account_id: &str,
        refresh_url: &str,
        return_url: &str,
    ) -> Result<OnboardingLink, ProcessorError>;

    async fn fetch_balance(&self, account_id: &str) -> Result<BalanceSnapshot, ProcessorError>;

    /// The most recent charges on the account, newest first.
    async fn fetch_recent_charges(&self, account_id: &str, limit: u32) -> Result<Vec<ChargeSummary>, ProcessorError>;

    /// The most recent payouts from the account, newest first.
    async fn fetch_recent_payouts(&self, account_id: &str, limit: u32) -> Result<Vec<PayoutSummary>, ProcessorError>;

    async fn create_payout(&self, account_id: &str, amount: Cents) -> Result<PayoutSummary, ProcessorError>;

    async fn set_payout_interval(&self, account_id: &str, interval: PayoutInterval) -> Result<(), ProcessorError>;

    //--------------------------------------       Devices         -----------------------------------------------------

    async fn create_location(&self, display_name: &str, address: &ShopAddress)
        -> Result<DeviceLocation, ProcessorError>;

    /// The processor's inventory of readers.
    async fn list_devices(&self) -> Result<Vec<TerminalDevice>, ProcessorError>;

    /// Labels the reader for the shop and records `location_id` against it. The returned device reports the location
    /// the processor actually has the reader at, which need not be `location_id`.
    async fn assign_device(
        &self,
        device_id: &str,
        location_id: &str,
        shop_id: &ShopId,
    ) -> Result<TerminalDevice, ProcessorError>;

    /// Fetches the reader. Returns `None` if the processor no longer knows about it.
    async fn fetch_device(&self, device_id: &str) -> Result<Option<TerminalDevice>, ProcessorError>;

    //--------------------------------------    Payment intents     ----------------------------------------------------

    async fn create_payment_intent(&self, request: &IntentRequest) -> Result<PaymentIntent, ProcessorError>;

    /// Hands the intent to the reader, which then prompts the customer for their card.
    async fn process_payment_intent(&self, device_id: &str, intent_id: &str) -> Result<TerminalDevice, ProcessorError>;

    async fn cancel_payment_intent(&self, intent_id: &str) -> Result<PaymentIntent, ProcessorError>;
}
