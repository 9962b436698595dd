use crate::{
    db_types::{BindResult, NewShop, ShopAccount, ShopId, TerminalBinding, TerminalStatus},
    traits::StoreError,
};

/// Persistence for shop records.
///
/// Shops are never deleted. Every write that can race with another flow is conditional on the prior state of the row,
/// so that concurrent requests cannot overwrite each other's results.
#[allow(async_fn_in_trait)]
pub trait ShopAccountManagement {
    async fn fetch_shop(&self, shop_id: &ShopId) -> Result<Option<ShopAccount>, StoreError>;

    /// Creates the shop if it does not exist, or refreshes its name and address if it does. Processor-side fields
    /// (connected account, terminal) are left untouched.
    async fn upsert_shop(&self, shop: NewShop) -> Result<ShopAccount, StoreError>;

    /// Stores `account_id` as the shop's connected account, but only if the shop does not have one yet.
    ///
    /// Returns the connected account id that is on record after the call. If another request won the race, that is
    /// the other request's id, not `account_id`.
    async fn set_connected_account_if_absent(&self, shop_id: &ShopId, account_id: &str) -> Result<String, StoreError>;

    async fn set_payouts_enabled(&self, shop_id: &ShopId, enabled: bool) -> Result<(), StoreError>;

    /// Binds a card reader to the shop, but only if the shop has no reader bound yet.
    async fn bind_terminal_if_unbound(
        &self,
        shop_id: &ShopId,
        binding: &TerminalBinding,
    ) -> Result<BindResult, StoreError>;

    /// Refreshes the cached status of the shop's bound reader.
    async fn update_terminal_status(&self, shop_id: &ShopId, status: TerminalStatus) -> Result<(), StoreError>;

    /// Returns the shop that the given reader is bound to, if any.
    async fn fetch_shop_for_terminal(&self, terminal_id: &str) -> Result<Option<ShopAccount>, StoreError>;
}
