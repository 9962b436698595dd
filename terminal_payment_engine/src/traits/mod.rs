//! # Backend contracts
//!
//! This module defines the interfaces that storage backends and payment processors must implement in order to be
//! driven by the engine's APIs.
//!
//! ## Storage
//! * [`ShopAccountManagement`] covers the shop record: connected account, address and the bound card reader.
//! * [`InvoiceManagement`] covers invoices, including the guarded transition to `paid`.
//! * [`PaymentAttemptManagement`] is the local ledger of payment intents. It enforces that an invoice has at most one
//!   active payment intent at a time.
//! * [`TerminalPaymentDatabase`] ties the three together. It is the bound used by the public APIs.
//!
//! ## Processors
//! [`PaymentProcessor`] abstracts the card processor. The live implementation talks to Stripe; the
//! [`crate::TestModeSimulator`] is an inert stand-in that never leaves the process.
mod data_objects;
mod invoice_management;
mod payment_attempts;
mod payment_processor;
mod shop_account_management;
mod terminal_payment_database;

pub use data_objects::{
    BalanceSnapshot,
    ChargeSummary,
    DeviceLocation,
    IntentDestination,
    IntentRequest,
    IntentStatus,
    OnboardingLink,
    PaymentIntent,
    PayoutInterval,
    PayoutSummary,
    TerminalDevice,
};
pub use invoice_management::InvoiceManagement;
pub use payment_attempts::{AttemptUpdate, PaymentAttemptManagement};
pub use payment_processor::{PaymentProcessor, ProcessorError};
pub use shop_account_management::ShopAccountManagement;
pub use terminal_payment_database::{StoreError, TerminalPaymentDatabase};
