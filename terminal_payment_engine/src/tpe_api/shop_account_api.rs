//! Maps shops to connected accounts at the processor.
use std::fmt::Debug;

use log::*;
use payment_common::Cents;

use crate::{
    db_types::{ShopAccount, ShopId},
    simulator::TestModeSimulator,
    tpe_api::{
        account_objects::{BalanceSummary, OnboardingResult, OnboardingUrls},
        errors::ShopAccountError,
        payment_objects::PaymentMode,
    },
    traits::{PaymentProcessor, PayoutInterval, PayoutSummary, ShopAccountManagement},
};

/// How many recent charges are summed into a shop's revenue figure.
pub const REVENUE_WINDOW: u32 = 100;

pub struct ShopAccountApi<B, P> {
    db: B,
    processor: P,
    simulator: TestModeSimulator,
    urls: OnboardingUrls,
}

impl<B, P> Debug for ShopAccountApi<B, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ShopAccountApi")
    }
}

impl<B, P> ShopAccountApi<B, P>
where
    B: ShopAccountManagement,
    P: PaymentProcessor,
{
    pub fn new(db: B, processor: P, urls: OnboardingUrls) -> Self {
        Self { db, processor, simulator: TestModeSimulator::new(), urls }
    }

    async fn fetch_shop(&self, shop_id: &ShopId) -> Result<ShopAccount, ShopAccountError> {
        self.db.fetch_shop(shop_id).await?.ok_or_else(|| ShopAccountError::ShopNotFound(shop_id.clone()))
    }

    /// Returns the shop's connected account id, creating the account at the processor if the shop does not have one.
    ///
    /// This call is idempotent. If two requests race to create the account, only the first one to be stored is kept
    /// and both callers receive its id.
    ///
    /// In test mode a simulated account id is returned for shops without an account, and nothing is persisted.
    pub async fn ensure_connected_account(
        &self,
        shop_id: &ShopId,
        mode: PaymentMode,
    ) -> Result<String, ShopAccountError> {
        let shop = self.fetch_shop(shop_id).await?;
        if let Some(account_id) = shop.connected_account_id {
            trace!("🏦️ Shop {shop_id} already has connected account {account_id}");
            return Ok(account_id);
        }
        if mode.is_test() {
            let simulated = self.simulator.create_connected_account(&shop).await;
            return simulated.map_err(|e| ShopAccountError::from_processor(shop_id, e));
        }
        let created = self
            .processor
            .create_connected_account(&shop)
            .await
            .map_err(|e| ShopAccountError::from_processor(shop_id, e))?;
        let stored = self.db.set_connected_account_if_absent(shop_id, &created).await?;
        if stored == created {
            info!("🏦️ Shop {shop_id} is now linked to connected account {created}");
        } else {
            warn!(
                "🏦️ Shop {shop_id} was linked to {stored} by a concurrent request. The account {created} that was just \
                 created is not used"
            );
        }
        Ok(stored)
    }

    /// Creates a single-use link to the processor's hosted onboarding flow. The connected account is created first if
    /// the shop does not have one.
    pub async fn create_onboarding_link(
        &self,
        shop_id: &ShopId,
        mode: PaymentMode,
    ) -> Result<OnboardingResult, ShopAccountError> {
        let account_id = self.ensure_connected_account(shop_id, mode).await?;
        let OnboardingUrls { refresh_url, return_url } = &self.urls;
        let link = with_processor!(self, mode, p => p.create_onboarding_link(&account_id, refresh_url, return_url).await)
            .map_err(|e| ShopAccountError::from_processor(shop_id, e))?;
        debug!("🏦️ Onboarding link for shop {shop_id} expires at {}", link.expires_at);
        Ok(OnboardingResult { account_id, url: link.url, expires_at: link.expires_at })
    }

    /// Summarises the shop's funds. Shops without a connected account get an all-zero, `connected: false` summary.
    ///
    /// The revenue and recent payout figures are best-effort; if either query fails it is logged and reported as zero.
    pub async fn get_balance(&self, shop_id: &ShopId, mode: PaymentMode) -> Result<BalanceSummary, ShopAccountError> {
        let shop = self.fetch_shop(shop_id).await?;
        let Some(account_id) = shop.connected_account_id else {
            debug!("🏦️ Shop {shop_id} has no connected account. Reporting an empty balance");
            return Ok(BalanceSummary::not_connected());
        };
        with_processor!(self, mode, p => {
            let balance = p.fetch_balance(&account_id).await.map_err(|e| ShopAccountError::from_processor(shop_id, e))?;
            let total_revenue = match p.fetch_recent_charges(&account_id, REVENUE_WINDOW).await {
                Ok(charges) => charges.iter().filter(|c| c.succeeded).map(|c| c.amount).sum(),
                Err(e) => {
                    warn!("🏦️ Could not fetch charges for shop {shop_id}. Reporting zero revenue. {e}");
                    Cents::default()
                },
            };
            let recent_payout = match p.fetch_recent_payouts(&account_id, 1).await {
                Ok(payouts) => payouts.first().map(|po| po.amount).unwrap_or_default(),
                Err(e) => {
                    warn!("🏦️ Could not fetch payouts for shop {shop_id}. Reporting zero. {e}");
                    Cents::default()
                },
            };
            Ok(BalanceSummary {
                connected: true,
                available: balance.available,
                pending: balance.pending,
                current: balance.available + balance.pending,
                total_revenue,
                recent_payout,
                payouts_enabled: shop.payouts_enabled,
            })
        })
    }

    /// Pays out `amount` from the shop's connected account to its bank. If no amount is given, the entire available
    /// balance is paid out.
    pub async fn request_payout(
        &self,
        shop_id: &ShopId,
        amount: Option<Cents>,
        mode: PaymentMode,
    ) -> Result<PayoutSummary, ShopAccountError> {
        let shop = self.fetch_shop(shop_id).await?;
        let account_id = shop.connected_account_id.ok_or_else(|| ShopAccountError::NotConnected(shop_id.clone()))?;
        let invalid = |reason: String| ShopAccountError::ValidationError { shop_id: shop_id.clone(), reason };
        with_processor!(self, mode, p => {
            let amount = match amount {
                Some(a) if a.is_positive() => a,
                Some(a) => return Err(invalid(format!("payout amount must be positive, not {a}"))),
                None => {
                    let balance =
                        p.fetch_balance(&account_id).await.map_err(|e| ShopAccountError::from_processor(shop_id, e))?;
                    if !balance.available.is_positive() {
                        return Err(invalid("there are no available funds to pay out".to_string()));
                    }
                    balance.available
                },
            };
            let payout =
                p.create_payout(&account_id, amount).await.map_err(|e| ShopAccountError::from_processor(shop_id, e))?;
            info!("🏦️ Payout {} of {amount} requested for shop {shop_id}", payout.id);
            Ok(payout)
        })
    }

    /// Switches the connected account between daily automatic payouts and manual payouts.
    pub async fn set_auto_withdraw(
        &self,
        shop_id: &ShopId,
        enabled: bool,
        mode: PaymentMode,
    ) -> Result<PayoutInterval, ShopAccountError> {
        let shop = self.fetch_shop(shop_id).await?;
        let account_id = shop.connected_account_id.ok_or_else(|| ShopAccountError::NotConnected(shop_id.clone()))?;
        let interval = if enabled { PayoutInterval::Daily } else { PayoutInterval::Manual };
        with_processor!(self, mode, p => p.set_payout_interval(&account_id, interval).await)
            .map_err(|e| ShopAccountError::from_processor(shop_id, e))?;
        if !mode.is_test() {
            self.db.set_payouts_enabled(shop_id, enabled).await?;
        }
        info!("🏦️ Payout schedule for shop {shop_id} set to {}", interval.as_str());
        Ok(interval)
    }
}
