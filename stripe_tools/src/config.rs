use std::time::Duration;

use log::*;
use payment_common::Secret;

pub const DEFAULT_STRIPE_API_BASE: &str = "https://api.stripe.com/v1";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub secret_key: Secret<String>,
    /// Base URL of the REST API, without a trailing slash. Overridden in tests.
    pub api_base: String,
    pub request_timeout: Duration,
}

impl Default for StripeConfig {
    fn default() -> Self {
        Self {
            secret_key: Secret::default(),
            api_base: DEFAULT_STRIPE_API_BASE.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl StripeConfig {
    pub fn new(secret_key: &str) -> Self {
        Self { secret_key: Secret::new(secret_key.to_string()), ..Default::default() }
    }

    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    pub fn new_from_env_or_default() -> Self {
        let secret_key = Secret::new(std::env::var("SPS_STRIPE_SECRET_KEY").unwrap_or_else(|_| {
            warn!("SPS_STRIPE_SECRET_KEY not set. Live processor calls will fail until it is configured");
            String::default()
        }));
        let api_base = std::env::var("SPS_STRIPE_API_BASE")
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| DEFAULT_STRIPE_API_BASE.to_string());
        let request_timeout = std::env::var("SPS_STRIPE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().map_err(|e| warn!("Ignoring invalid SPS_STRIPE_TIMEOUT_SECS. {e}")).ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT);
        Self { secret_key, api_base, request_timeout }
    }
}
