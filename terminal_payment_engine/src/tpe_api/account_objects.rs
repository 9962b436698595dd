use chrono::{DateTime, Utc};
use payment_common::Cents;
use serde::{Deserialize, Serialize};

/// Where the processor's hosted onboarding flow sends the shop owner back to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnboardingUrls {
    /// Used when the link has expired or was already visited
    pub refresh_url: String,
    /// Used when the owner completes or leaves the flow
    pub return_url: String,
}

impl Default for OnboardingUrls {
    fn default() -> Self {
        Self {
            refresh_url: "http://localhost:8370/stripe-connect/refresh".to_string(),
            return_url: "http://localhost:8370/stripe-connect/return".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnboardingResult {
    pub account_id: String,
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

/// A shop's funds at the processor. All amounts are in USD cents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSummary {
    pub connected: bool,
    pub available: Cents,
    pub pending: Cents,
    /// `available + pending`
    pub current: Cents,
    /// Sum of the succeeded charges among the most recent ones
    pub total_revenue: Cents,
    /// The amount of the most recent payout
    pub recent_payout: Cents,
    pub payouts_enabled: bool,
}

impl BalanceSummary {
    /// The result for a shop that has not connected an account yet. This is not an error.
    pub fn not_connected() -> Self {
        Self::default()
    }
}
