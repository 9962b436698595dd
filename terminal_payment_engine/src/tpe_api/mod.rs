//! # Terminal payment engine public API
//!
//! The `tpe_api` module exposes the programmatic API for the terminal payment engine. Each component is a small API
//! object, so that callers can pick the functionality they need.
//!
//! * [`shop_account_api`] maps shops to connected accounts at the processor: onboarding, balances and payouts.
//! * [`terminal_api`] registers card readers to shops and reports their status.
//! * [`payment_dispatch_api`] turns an invoice into a payment intent on the shop's reader, and compensates when the
//!   reader cannot take it.
//! * [`webhook_api`] verifies processor webhooks and reconciles their outcome into invoices. It is the only path by
//!   which an invoice becomes `paid`.
//!
//! # API usage
//!
//! Every API is created from a storage backend and a [`crate::traits::PaymentProcessor`]. Each call takes a
//! [`PaymentMode`]; test-mode calls are routed to the built-in [`crate::TestModeSimulator`] instead of the processor.
//!
//! ```rust,ignore
//! use terminal_payment_engine::{PaymentMode, SqliteDatabase, TerminalApi};
//! let db = SqliteDatabase::new_with_url(...).await?;
//! let api = TerminalApi::new(db, stripe_processor);
//! let status = api.get_status(&shop_id, PaymentMode::Live).await?;
//! ```

/// Evaluates `$body` with `$p` bound to the processor that serves `$mode`.
macro_rules! with_processor {
    ($self:ident, $mode:expr, $p:ident => $body:expr) => {
        match $mode {
            $crate::tpe_api::payment_objects::PaymentMode::Live => {
                let $p = &$self.processor;
                $body
            },
            $crate::tpe_api::payment_objects::PaymentMode::Test => {
                let $p = &$self.simulator;
                $body
            },
        }
    };
}

pub mod account_objects;
pub mod errors;
pub mod payment_dispatch_api;
pub mod payment_objects;
pub mod shop_account_api;
pub mod terminal_api;
pub mod terminal_objects;
pub mod webhook_api;
