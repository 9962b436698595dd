use std::time::Duration;

use payment_common::Cents;
use serde::{Deserialize, Serialize};

/// Selects the processor a call is routed to. `Test` calls go to the [`crate::TestModeSimulator`] and never reach the
/// network.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMode {
    #[default]
    Live,
    Test,
}

impl PaymentMode {
    pub fn from_test_flag(test_mode: bool) -> Self {
        if test_mode {
            PaymentMode::Test
        } else {
            PaymentMode::Live
        }
    }

    pub fn is_test(&self) -> bool {
        matches!(self, PaymentMode::Test)
    }
}

pub const DEFAULT_FEE_BASIS_POINTS: u32 = 500;
pub const DEFAULT_FLAT_FEE_CENTS: i64 = 5;

/// The platform's cut of a destination charge: a percentage of the amount, in basis points, plus a flat fee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeePolicy {
    pub basis_points: u32,
    pub flat_fee: Cents,
}

impl Default for FeePolicy {
    fn default() -> Self {
        Self { basis_points: DEFAULT_FEE_BASIS_POINTS, flat_fee: Cents::from(DEFAULT_FLAT_FEE_CENTS) }
    }
}

impl FeePolicy {
    pub fn new(basis_points: u32, flat_fee: Cents) -> Self {
        Self { basis_points, flat_fee }
    }

    pub fn fee_for(&self, amount: Cents) -> Cents {
        amount.apply_basis_points(self.basis_points) + self.flat_fee
    }
}

/// How hard to try to cancel an intent that could not be dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Wait between consecutive tries. Doubles after every failure.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, backoff: Duration::from_millis(500) }
    }
}

impl RetryPolicy {
    pub fn delay_before(&self, attempt: u32) -> Duration {
        self.backoff * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchPolicy {
    pub fees: FeePolicy,
    /// Upper bound on handing an intent to a reader. Exceeding it is treated as a dispatch failure.
    pub dispatch_timeout: Duration,
    pub cancel_retry: RetryPolicy,
    /// How long a test-mode payment takes to "complete" on the simulated reader.
    pub simulated_delay: Duration,
    /// A dispatched intent that has not been paid after this long is canceled by the sweeper.
    pub dispatch_expiry: Duration,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            fees: FeePolicy::default(),
            dispatch_timeout: Duration::from_secs(30),
            cancel_retry: RetryPolicy::default(),
            simulated_delay: Duration::from_millis(2_000),
            dispatch_expiry: Duration::from_secs(10 * 60),
        }
    }
}

/// The result of a successful dispatch. Live and test mode return the same shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentDispatched {
    pub payment_intent: String,
    pub amount: Cents,
    pub application_fee: Cents,
    pub terminal_id: String,
    pub message: String,
}
