//! `SqliteDatabase` is a concrete implementation of a terminal payment engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the storage traits defined in the [`crate::traits`]
//! module.
use std::{fmt::Debug, time::Duration};

use log::*;
use sqlx::{migrate::MigrateError, SqlitePool};

use super::db::{attempts, db_url, invoices, new_pool, shops};
use crate::{
    db_types::{
        AttemptStatus,
        BindResult,
        Invoice,
        InvoiceId,
        NewInvoice,
        NewPaymentAttempt,
        NewShop,
        PaymentAttempt,
        ShopAccount,
        ShopId,
        TerminalBinding,
        TerminalStatus,
    },
    traits::{
        AttemptUpdate,
        InvoiceManagement,
        PaymentAttemptManagement,
        ShopAccountManagement,
        StoreError,
        TerminalPaymentDatabase,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl TerminalPaymentDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }
}

impl ShopAccountManagement for SqliteDatabase {
    async fn fetch_shop(&self, shop_id: &ShopId) -> Result<Option<ShopAccount>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let shop = shops::fetch_shop(shop_id, &mut conn).await?;
        Ok(shop)
    }

    async fn upsert_shop(&self, shop: NewShop) -> Result<ShopAccount, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let shop = shops::upsert_shop(shop, &mut conn).await?;
        Ok(shop)
    }

    async fn set_connected_account_if_absent(&self, shop_id: &ShopId, account_id: &str) -> Result<String, StoreError> {
        let mut conn = self.pool.acquire().await?;
        shops::set_connected_account_if_absent(shop_id, account_id, &mut conn).await
    }

    async fn set_payouts_enabled(&self, shop_id: &ShopId, enabled: bool) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        shops::set_payouts_enabled(shop_id, enabled, &mut conn).await
    }

    async fn bind_terminal_if_unbound(
        &self,
        shop_id: &ShopId,
        binding: &TerminalBinding,
    ) -> Result<BindResult, StoreError> {
        let mut tx = self.pool.begin().await?;
        let result = shops::bind_terminal_if_unbound(shop_id, binding, &mut tx).await?;
        tx.commit().await?;
        Ok(result)
    }

    async fn update_terminal_status(&self, shop_id: &ShopId, status: TerminalStatus) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        shops::update_terminal_status(shop_id, status, &mut conn).await
    }

    async fn fetch_shop_for_terminal(&self, terminal_id: &str) -> Result<Option<ShopAccount>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let shop = shops::fetch_shop_for_terminal(terminal_id, &mut conn).await?;
        Ok(shop)
    }
}

impl InvoiceManagement for SqliteDatabase {
    async fn insert_invoice(&self, invoice: NewInvoice) -> Result<Invoice, StoreError> {
        let mut tx = self.pool.begin().await?;
        let invoice = invoices::insert_invoice(invoice, &mut tx).await?;
        tx.commit().await?;
        Ok(invoice)
    }

    async fn fetch_invoice(&self, invoice_id: &InvoiceId) -> Result<Option<Invoice>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let invoice = invoices::fetch_invoice(invoice_id, &mut conn).await?;
        Ok(invoice)
    }

    async fn fetch_invoice_for_shop(
        &self,
        invoice_id: &InvoiceId,
        shop_id: &ShopId,
    ) -> Result<Option<Invoice>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let invoice = invoices::fetch_invoice_for_shop(invoice_id, shop_id, &mut conn).await?;
        Ok(invoice)
    }

    async fn mark_invoice_paid(&self, invoice_id: &InvoiceId, intent_id: &str) -> Result<Option<Invoice>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let invoice = invoices::mark_invoice_paid(invoice_id, intent_id, &mut tx).await?;
        if invoice.is_some() {
            let attempt = attempts::close_attempt_for_intent(intent_id, AttemptStatus::Succeeded, &mut tx).await?;
            match attempt {
                Some(a) => trace!("🗃️ Attempt #{} for invoice {invoice_id} marked as succeeded", a.id),
                None => debug!("🗃️ Invoice {invoice_id} paid by {intent_id}, which has no open payment attempt"),
            }
        }
        tx.commit().await?;
        Ok(invoice)
    }
}

impl PaymentAttemptManagement for SqliteDatabase {
    async fn claim_payment_slot(&self, attempt: NewPaymentAttempt) -> Result<PaymentAttempt, StoreError> {
        let mut tx = self.pool.begin().await?;
        let attempt = attempts::claim_payment_slot(attempt, &mut tx).await?;
        tx.commit().await?;
        Ok(attempt)
    }

    async fn update_attempt(&self, id: i64, update: AttemptUpdate) -> Result<PaymentAttempt, StoreError> {
        let mut conn = self.pool.acquire().await?;
        attempts::update_attempt(id, update, &mut conn).await
    }

    async fn increment_cancel_attempts(&self, id: i64) -> Result<i64, StoreError> {
        let mut conn = self.pool.acquire().await?;
        attempts::increment_cancel_attempts(id, &mut conn).await
    }

    async fn close_attempt_for_intent(
        &self,
        intent_id: &str,
        status: AttemptStatus,
    ) -> Result<Option<PaymentAttempt>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let attempt = attempts::close_attempt_for_intent(intent_id, status, &mut conn).await?;
        Ok(attempt)
    }

    async fn fetch_attempts_for_invoice(&self, invoice_id: &InvoiceId) -> Result<Vec<PaymentAttempt>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let attempts = attempts::fetch_attempts_for_invoice(invoice_id, &mut conn).await?;
        Ok(attempts)
    }

    async fn fetch_attempts_by_status(&self, status: AttemptStatus) -> Result<Vec<PaymentAttempt>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let attempts = attempts::fetch_attempts_by_status(status, &mut conn).await?;
        Ok(attempts)
    }

    async fn abandon_stale_attempts(&self, age: Duration) -> Result<Vec<PaymentAttempt>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let attempts = attempts::abandon_stale_attempts(age, &mut conn).await?;
        Ok(attempts)
    }

    async fn fetch_expired_dispatches(&self, age: Duration) -> Result<Vec<PaymentAttempt>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let attempts = attempts::fetch_expired_dispatches(age, &mut conn).await?;
        Ok(attempts)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Brings the schema up to date. Migrations are embedded in the binary.
    pub async fn run_migrations(&self) -> Result<(), MigrateError> {
        sqlx::migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
