//! Terminal Payment Engine
//!
//! The terminal payment engine lets shops take in-person card payments on a reader that belongs to them, with the funds
//! routed to the shop's own connected account and a platform fee split off at source.
//! This library contains the core logic. It is processor-agnostic; the processor plugs in through the
//! [`PaymentProcessor`] trait.
//!
//! The library is divided into two main sections:
//! 1. Storage ([`mod@sqlite`] and [`mod@traits`]). SQLite is the supported backend. You should never need to access the
//!    database directly. Instead, use the public API provided by the engine. The exception is the data types used in
//!    the database. These are defined in the `db_types` module and are public.
//! 2. The engine's public API objects: [`ShopAccountApi`], [`TerminalApi`], [`PaymentDispatchApi`] and [`WebhookApi`].
//!
//! Every API call takes a [`PaymentMode`]. Test mode is served by the built-in [`TestModeSimulator`], which never
//! touches the processor.
//!
//! The engine also emits events (an invoice was paid, an intent was orphaned) that you can hook into with
//! [`events::EventHooks`].

pub mod db_types;
pub mod events;
pub mod helpers;
pub mod simulator;
#[cfg(feature = "sqlite")]
pub mod sqlite;
mod tpe_api;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use simulator::TestModeSimulator;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use tpe_api::{
    account_objects,
    errors::{DispatchError, ShopAccountError, TerminalError, WebhookError},
    payment_dispatch_api::{PaymentDispatchApi, SweepReport},
    payment_objects,
    payment_objects::PaymentMode,
    shop_account_api::ShopAccountApi,
    terminal_api::TerminalApi,
    terminal_objects,
    webhook_api::{ProcessorEvent, WebhookApi, WebhookOutcome},
};
pub use traits::{
    InvoiceManagement,
    PaymentAttemptManagement,
    PaymentProcessor,
    ProcessorError,
    ShopAccountManagement,
    StoreError,
    TerminalPaymentDatabase,
};
