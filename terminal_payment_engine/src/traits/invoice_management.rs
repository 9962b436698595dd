use crate::{
    db_types::{Invoice, InvoiceId, NewInvoice, ShopId},
    traits::StoreError,
};

/// Persistence for invoices.
///
/// Invoices are authored by other parts of the business; the engine reads them and advances them to `paid`.
#[allow(async_fn_in_trait)]
pub trait InvoiceManagement {
    /// Stores a new invoice with its line items. Fails with [`StoreError::InvoiceAlreadyExists`] if the id is taken.
    async fn insert_invoice(&self, invoice: NewInvoice) -> Result<Invoice, StoreError>;

    async fn fetch_invoice(&self, invoice_id: &InvoiceId) -> Result<Option<Invoice>, StoreError>;

    /// Fetches the invoice only if it belongs to `shop_id`.
    async fn fetch_invoice_for_shop(
        &self,
        invoice_id: &InvoiceId,
        shop_id: &ShopId,
    ) -> Result<Option<Invoice>, StoreError>;

    /// The guarded transition to `paid`. Sets the status, `paid_date` and `payment_intent_id`, and closes the matching
    /// payment attempt as succeeded, all in one transaction.
    ///
    /// The update is only applied if the invoice is not already paid. Returns the updated invoice if the transition
    /// happened, and `None` if the invoice was already paid or does not exist.
    async fn mark_invoice_paid(&self, invoice_id: &InvoiceId, intent_id: &str) -> Result<Option<Invoice>, StoreError>;
}
