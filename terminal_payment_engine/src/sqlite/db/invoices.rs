use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::{FromRow, SqliteConnection};

use crate::{
    db_types::{Invoice, InvoiceId, InvoiceStatus, LineItem, NewInvoice, ShopId},
    traits::StoreError,
};

#[derive(Debug, FromRow)]
struct InvoiceRow {
    id: InvoiceId,
    shop_id: ShopId,
    tax_rate: f64,
    discount_rate: f64,
    status: InvoiceStatus,
    paid_date: Option<DateTime<Utc>>,
    payment_intent_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl InvoiceRow {
    fn into_invoice(self, items: Vec<LineItem>) -> Invoice {
        Invoice {
            id: self.id,
            shop_id: self.shop_id,
            items,
            tax_rate: self.tax_rate,
            discount_rate: self.discount_rate,
            status: self.status,
            paid_date: self.paid_date,
            payment_intent_id: self.payment_intent_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct LineItemRow {
    description: Option<String>,
    qty: f64,
    unit_price: f64,
}

/// Inserts the invoice and its line items. This is not atomic; embed the call in a transaction and pass `&mut *tx` as
/// the connection if you need it to be.
pub async fn insert_invoice(invoice: NewInvoice, conn: &mut SqliteConnection) -> Result<Invoice, StoreError> {
    let invoice_id = invoice.id.clone();
    let row: InvoiceRow = sqlx::query_as(
        r#"
            INSERT INTO invoices (id, shop_id, tax_rate, discount_rate, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *;
        "#,
    )
    .bind(&invoice.id)
    .bind(&invoice.shop_id)
    .bind(invoice.tax_rate)
    .bind(invoice.discount_rate)
    .bind(invoice.status)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(de) if de.is_unique_violation() => StoreError::InvoiceAlreadyExists(invoice_id.clone()),
        e => StoreError::from(e),
    })?;
    for (position, item) in invoice.items.iter().enumerate() {
        sqlx::query(
            "INSERT INTO invoice_items (invoice_id, position, description, qty, unit_price) VALUES ($1, $2, $3, $4, \
             $5)",
        )
        .bind(&invoice.id)
        .bind(position as i64)
        .bind(&item.description)
        .bind(item.qty)
        .bind(item.unit_price)
        .execute(&mut *conn)
        .await?;
    }
    debug!("🧾️ Invoice {invoice_id} saved with {} line items", invoice.items.len());
    Ok(row.into_invoice(invoice.items))
}

async fn fetch_items(invoice_id: &InvoiceId, conn: &mut SqliteConnection) -> Result<Vec<LineItem>, sqlx::Error> {
    let rows: Vec<LineItemRow> = sqlx::query_as(
        "SELECT description, qty, unit_price FROM invoice_items WHERE invoice_id = $1 ORDER BY position ASC",
    )
    .bind(invoice_id)
    .fetch_all(conn)
    .await?;
    let items = rows
        .into_iter()
        .map(|r| LineItem { description: r.description, qty: r.qty, unit_price: r.unit_price })
        .collect();
    Ok(items)
}

async fn complete(row: Option<InvoiceRow>, conn: &mut SqliteConnection) -> Result<Option<Invoice>, sqlx::Error> {
    match row {
        Some(row) => {
            let items = fetch_items(&row.id, conn).await?;
            Ok(Some(row.into_invoice(items)))
        },
        None => Ok(None),
    }
}

pub async fn fetch_invoice(invoice_id: &InvoiceId, conn: &mut SqliteConnection) -> Result<Option<Invoice>, sqlx::Error> {
    let row = sqlx::query_as("SELECT * FROM invoices WHERE id = $1").bind(invoice_id).fetch_optional(&mut *conn).await?;
    complete(row, conn).await
}

pub async fn fetch_invoice_for_shop(
    invoice_id: &InvoiceId,
    shop_id: &ShopId,
    conn: &mut SqliteConnection,
) -> Result<Option<Invoice>, sqlx::Error> {
    let row = sqlx::query_as("SELECT * FROM invoices WHERE id = $1 AND shop_id = $2")
        .bind(invoice_id)
        .bind(shop_id)
        .fetch_optional(&mut *conn)
        .await?;
    complete(row, conn).await
}

/// The guarded `paid` transition. Only applies if the invoice is not paid yet; returns `None` otherwise.
pub async fn mark_invoice_paid(
    invoice_id: &InvoiceId,
    intent_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Invoice>, sqlx::Error> {
    let row: Option<InvoiceRow> = sqlx::query_as(
        r#"
            UPDATE invoices SET
                status = 'paid',
                paid_date = CURRENT_TIMESTAMP,
                payment_intent_id = $1,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $2 AND status != 'paid'
            RETURNING *;
        "#,
    )
    .bind(intent_id)
    .bind(invoice_id)
    .fetch_optional(&mut *conn)
    .await?;
    if row.is_none() {
        trace!("🧾️ Invoice {invoice_id} was not moved to paid. It is either paid already, or does not exist");
    }
    complete(row, conn).await
}
