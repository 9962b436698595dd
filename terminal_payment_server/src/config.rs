use std::{env, fmt::Display, str::FromStr, time::Duration};

use log::*;
use payment_common::{
    helpers::{env_flag, env_parse},
    Cents,
    Secret,
};
use stripe_tools::StripeConfig;
use terminal_payment_engine::{
    account_objects::OnboardingUrls,
    helpers::DEFAULT_SIGNATURE_TOLERANCE,
    payment_objects::{DispatchPolicy, FeePolicy, RetryPolicy},
    PaymentMode,
};

const DEFAULT_SPS_HOST: &str = "127.0.0.1";
const DEFAULT_SPS_PORT: u16 = 8370;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/shop_payments.db";
const DEFAULT_SWEEPER_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_STALE_ATTEMPT_AGE: Duration = Duration::from_secs(15 * 60);

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Connection details for the live processor
    pub stripe: StripeConfig,
    /// The shared secret used to sign webhook deliveries. If it is not set, every webhook is rejected.
    pub webhook_secret: Secret<String>,
    pub webhook_tolerance: Duration,
    pub onboarding_urls: OnboardingUrls,
    pub test_mode: TestModePolicy,
    pub dispatch: DispatchPolicy,
    /// How often the sweeper runs over the payment attempt ledger.
    pub sweeper_interval: Duration,
    /// Payment claims that never reached a reader are released after this long.
    pub stale_attempt_age: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SPS_HOST.to_string(),
            port: DEFAULT_SPS_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            stripe: StripeConfig::default(),
            webhook_secret: Secret::default(),
            webhook_tolerance: DEFAULT_SIGNATURE_TOLERANCE,
            onboarding_urls: OnboardingUrls::default(),
            test_mode: TestModePolicy::default(),
            dispatch: DispatchPolicy::default(),
            sweeper_interval: DEFAULT_SWEEPER_INTERVAL,
            stale_attempt_age: DEFAULT_STALE_ATTEMPT_AGE,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("SPS_HOST").ok().unwrap_or_else(|| DEFAULT_SPS_HOST.into());
        let port = env_or("SPS_PORT", DEFAULT_SPS_PORT);
        let database_url = env::var("SPS_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ SPS_DATABASE_URL is not set. Using {DEFAULT_DATABASE_URL}");
            DEFAULT_DATABASE_URL.to_string()
        });
        let stripe = StripeConfig::new_from_env_or_default();
        let webhook_secret = Secret::new(env::var("SPS_STRIPE_WEBHOOK_SECRET").ok().unwrap_or_else(|| {
            error!(
                "🪛️ SPS_STRIPE_WEBHOOK_SECRET is not set. Every webhook delivery will be rejected, and invoices paid on \
                 a live reader will never be marked as paid."
            );
            String::default()
        }));
        let webhook_tolerance =
            Duration::from_secs(env_or("SPS_WEBHOOK_TOLERANCE_SECS", DEFAULT_SIGNATURE_TOLERANCE.as_secs()));
        let defaults = OnboardingUrls::default();
        let onboarding_urls = OnboardingUrls {
            refresh_url: env::var("SPS_CONNECT_REFRESH_URL").unwrap_or(defaults.refresh_url),
            return_url: env::var("SPS_CONNECT_RETURN_URL").unwrap_or(defaults.return_url),
        };
        let test_mode = TestModePolicy::from_env();
        let dispatch = dispatch_policy_from_env();
        let sweeper_interval =
            Duration::from_secs(env_or("SPS_SWEEPER_INTERVAL_SECS", DEFAULT_SWEEPER_INTERVAL.as_secs()).max(1));
        let stale_attempt_age =
            Duration::from_secs(60 * env_or("SPS_STALE_ATTEMPT_MINS", DEFAULT_STALE_ATTEMPT_AGE.as_secs() / 60));
        Self {
            host,
            port,
            database_url,
            stripe,
            webhook_secret,
            webhook_tolerance,
            onboarding_urls,
            test_mode,
            dispatch,
            sweeper_interval,
            stale_attempt_age,
        }
    }
}

/// Decides which processor serves a request.
///
/// When the server runs in test mode, every request is simulated. Otherwise, a request may ask for test mode with its
/// `testMode` flag, but the flag is only honoured if the server allows it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TestModePolicy {
    pub global: bool,
    pub allow_per_request: bool,
}

impl TestModePolicy {
    pub fn new(global: bool, allow_per_request: bool) -> Self {
        Self { global, allow_per_request }
    }

    pub fn from_env() -> Self {
        let global = env_flag("SPS_TEST_MODE", false);
        let allow_per_request = env_flag("SPS_ALLOW_REQUEST_TEST_MODE", false);
        if global {
            warn!("🪛️ SPS_TEST_MODE is set. No request will reach the payment processor.");
        } else if allow_per_request {
            info!("🪛️ Requests may ask for test mode with the testMode flag.");
        }
        Self { global, allow_per_request }
    }

    pub fn resolve(&self, requested: Option<bool>) -> PaymentMode {
        match (self.global, requested) {
            (true, _) => PaymentMode::Test,
            (false, Some(true)) if self.allow_per_request => PaymentMode::Test,
            (false, Some(true)) => {
                debug!("🪛️ Ignoring a request for test mode. SPS_ALLOW_REQUEST_TEST_MODE is not set.");
                PaymentMode::Live
            },
            _ => PaymentMode::Live,
        }
    }
}

fn dispatch_policy_from_env() -> DispatchPolicy {
    let defaults = DispatchPolicy::default();
    let fees = FeePolicy::new(
        env_or("SPS_PLATFORM_FEE_BPS", defaults.fees.basis_points),
        Cents::from(env_or("SPS_PLATFORM_FEE_FLAT_CENTS", defaults.fees.flat_fee.value())),
    );
    let dispatch_timeout =
        Duration::from_secs(env_or("SPS_DISPATCH_TIMEOUT_SECS", defaults.dispatch_timeout.as_secs()).max(1));
    let cancel_retry = RetryPolicy {
        max_attempts: env_or("SPS_CANCEL_MAX_ATTEMPTS", defaults.cancel_retry.max_attempts).max(1),
        backoff: Duration::from_millis(env_or(
            "SPS_CANCEL_BACKOFF_MS",
            defaults.cancel_retry.backoff.as_millis() as u64,
        )),
    };
    let simulated_delay =
        Duration::from_millis(env_or("SPS_SIMULATED_PAYMENT_DELAY_MS", defaults.simulated_delay.as_millis() as u64));
    let dispatch_expiry =
        Duration::from_secs(60 * env_or("SPS_DISPATCH_EXPIRY_MINS", defaults.dispatch_expiry.as_secs() / 60).max(1));
    info!(
        "🪛️ Platform fee: {} bps + {}. Dispatch timeout: {}s. Cancel retries: {}. Unpaid payments expire after {}m.",
        fees.basis_points,
        fees.flat_fee,
        dispatch_timeout.as_secs(),
        cancel_retry.max_attempts,
        dispatch_expiry.as_secs() / 60
    );
    DispatchPolicy { fees, dispatch_timeout, cancel_retry, simulated_delay, dispatch_expiry }
}

/// Reads `name` from the environment, logging and falling back to `default` if it is unset or invalid.
fn env_or<T>(name: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env_parse::<T>(name) {
        Ok(Some(v)) => v,
        Ok(None) => {
            debug!("🪛️ {name} is not set. Using the default value of {default}.");
            default
        },
        Err(e) => {
            error!("🪛️ {e} Using the default, {default}, instead.");
            default
        },
    }
}
