//! # Shop payment server
//! This crate hosts the HTTP server for in-person card payments. It is responsible for:
//! * Registering card readers to shops and reporting their status.
//! * Sending invoice payments to a shop's reader.
//! * Onboarding shops to Stripe Connect, and reporting on and paying out their balances.
//! * Receiving Stripe webhooks and reconciling completed payments into invoices.
//!
//! The payment logic itself lives in `terminal_payment_engine`. This crate wires it to actix-web and to Stripe.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/terminal/register`, `/terminal/status/{shop_id}`: reader registration and status.
//! * `/terminal/create-payment`: start a payment on the shop's reader.
//! * `/connect/create-account`, `/stripe-connect`: connected account creation and onboarding.
//! * `/stripe-balance/{shop_id}`, `/stripe-request-payout/{shop_id}`, `/stripe-auto-withdraw/{shop_id}`: funds.
//! * `/webhooks/stripe`: the Stripe webhook receiver.

pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod helpers;
pub mod integrations;
pub mod routes;
pub mod server;
pub mod sweeper;

#[cfg(test)]
mod endpoint_tests;
