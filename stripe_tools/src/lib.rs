//! A small, typed client for the parts of the Stripe REST API used by the terminal payment server.
//!
//! Only the fields the server consumes are modelled. Requests are form-encoded, as Stripe expects, and every call can
//! optionally be made on behalf of a connected account via the `Stripe-Account` header.
mod api;
mod config;
mod error;

pub mod data_objects;

pub use api::{FormParams, StripeApi};
pub use config::StripeConfig;
pub use data_objects::{
    AccountLink,
    Address,
    Balance,
    BalanceAmount,
    Charge,
    List,
    NewPaymentIntent,
    PaymentIntent,
    Payout,
    ReaderAction,
    StripeAccount,
    TerminalLocation,
    TerminalReader,
};
pub use error::StripeApiError;
