use mockall::mock;
use terminal_payment_engine::{
    db_types::{BindResult, NewShop, ShopAccount, ShopId, TerminalBinding, TerminalStatus},
    traits::{ShopAccountManagement, StoreError},
};

mock! {
    pub ShopStore {}
    impl ShopAccountManagement for ShopStore {
        async fn fetch_shop(&self, shop_id: &ShopId) -> Result<Option<ShopAccount>, StoreError>;
        async fn upsert_shop(&self, shop: NewShop) -> Result<ShopAccount, StoreError>;
        async fn set_connected_account_if_absent(&self, shop_id: &ShopId, account_id: &str) -> Result<String, StoreError>;
        async fn set_payouts_enabled(&self, shop_id: &ShopId, enabled: bool) -> Result<(), StoreError>;
        async fn bind_terminal_if_unbound(&self, shop_id: &ShopId, binding: &TerminalBinding) -> Result<BindResult, StoreError>;
        async fn update_terminal_status(&self, shop_id: &ShopId, status: TerminalStatus) -> Result<(), StoreError>;
        async fn fetch_shop_for_terminal(&self, terminal_id: &str) -> Result<Option<ShopAccount>, StoreError>;
    }
}
