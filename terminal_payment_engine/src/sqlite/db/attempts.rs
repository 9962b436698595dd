use std::time::Duration;

use log::{debug, trace, warn};
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{AttemptStatus, InvoiceId, NewPaymentAttempt, PaymentAttempt},
    sqlite::db::invoices,
    traits::{AttemptUpdate, StoreError},
};

/// Claims the invoice's payment slot.
///
/// The insert only selects a row if the invoice is payable, and the partial unique index on `invoice_id` rejects it if
/// another attempt is still active. Both checks happen in the one statement, so two concurrent claims cannot both win.
pub async fn claim_payment_slot(
    attempt: NewPaymentAttempt,
    conn: &mut SqliteConnection,
) -> Result<PaymentAttempt, StoreError> {
    let invoice_id = attempt.invoice_id.clone();
    let claimed: Option<PaymentAttempt> = sqlx::query_as(
        r#"
            INSERT INTO payment_attempts (invoice_id, shop_id, amount_cents, application_fee_cents, reader_id, status)
            SELECT id, shop_id, $1, $2, $3, 'pending' FROM invoices
            WHERE id = $4 AND shop_id = $5 AND status IN ('draft', 'sent')
            RETURNING *;
        "#,
    )
    .bind(attempt.amount)
    .bind(attempt.application_fee)
    .bind(&attempt.reader_id)
    .bind(&attempt.invoice_id)
    .bind(&attempt.shop_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(de) if de.is_unique_violation() => StoreError::PaymentInProgress(invoice_id.clone()),
        e => StoreError::from(e),
    })?;
    match claimed {
        Some(attempt) => {
            debug!("💳️ Payment slot for invoice {invoice_id} claimed by attempt #{}", attempt.id);
            Ok(attempt)
        },
        None => {
            let invoice = invoices::fetch_invoice_for_shop(&invoice_id, &attempt.shop_id, conn)
                .await?
                .ok_or_else(|| StoreError::InvoiceNotFound(invoice_id.clone()))?;
            warn!("💳️ Invoice {invoice_id} is {} and cannot be paid", invoice.status);
            Err(StoreError::InvoiceNotPayable { invoice_id, status: invoice.status })
        },
    }
}

pub async fn update_attempt(
    id: i64,
    update: AttemptUpdate,
    conn: &mut SqliteConnection,
) -> Result<PaymentAttempt, StoreError> {
    let mut builder = QueryBuilder::new("UPDATE payment_attempts SET updated_at = CURRENT_TIMESTAMP");
    if let Some(status) = update.status {
        builder.push(", status = ");
        builder.push_bind(status);
    }
    if let Some(intent_id) = update.intent_id {
        builder.push(", intent_id = ");
        builder.push_bind(intent_id);
    }
    if let Some(last_error) = update.last_error {
        builder.push(", last_error = ");
        builder.push_bind(last_error);
    }
    builder.push(" WHERE id = ");
    builder.push_bind(id);
    if update.open_only {
        builder.push(" AND status IN ('pending', 'dispatched', 'orphaned')");
    }
    builder.push(" RETURNING *;");
    trace!("💳️ Executing query: {}", builder.sql());
    let attempt: Option<PaymentAttempt> = builder.build_query_as().fetch_optional(conn).await?;
    attempt.ok_or(StoreError::AttemptNotFound(id))
}

pub async fn increment_cancel_attempts(id: i64, conn: &mut SqliteConnection) -> Result<i64, StoreError> {
    let count: Option<i64> = sqlx::query_scalar(
        "UPDATE payment_attempts SET cancel_attempts = cancel_attempts + 1, updated_at = CURRENT_TIMESTAMP WHERE id = \
         $1 RETURNING cancel_attempts",
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;
    count.ok_or(StoreError::AttemptNotFound(id))
}

/// Closes the open attempt (active or orphaned) for the intent.
pub async fn close_attempt_for_intent(
    intent_id: &str,
    status: AttemptStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentAttempt>, sqlx::Error> {
    let attempt = sqlx::query_as(
        r#"
            UPDATE payment_attempts SET status = $1, updated_at = CURRENT_TIMESTAMP
            WHERE intent_id = $2 AND status IN ('pending', 'dispatched', 'orphaned')
            RETURNING *;
        "#,
    )
    .bind(status)
    .bind(intent_id)
    .fetch_optional(conn)
    .await?;
    Ok(attempt)
}

pub async fn fetch_attempts_for_invoice(
    invoice_id: &InvoiceId,
    conn: &mut SqliteConnection,
) -> Result<Vec<PaymentAttempt>, sqlx::Error> {
    let attempts = sqlx::query_as("SELECT * FROM payment_attempts WHERE invoice_id = $1 ORDER BY id ASC")
        .bind(invoice_id)
        .fetch_all(conn)
        .await?;
    Ok(attempts)
}

pub async fn fetch_attempts_by_status(
    status: AttemptStatus,
    conn: &mut SqliteConnection,
) -> Result<Vec<PaymentAttempt>, sqlx::Error> {
    let attempts = sqlx::query_as("SELECT * FROM payment_attempts WHERE status = $1 ORDER BY id ASC")
        .bind(status)
        .fetch_all(conn)
        .await?;
    Ok(attempts)
}

pub async fn abandon_stale_attempts(
    age: Duration,
    conn: &mut SqliteConnection,
) -> Result<Vec<PaymentAttempt>, sqlx::Error> {
    let attempts = sqlx::query_as(
        r#"
            UPDATE payment_attempts SET
                status = 'abandoned',
                last_error = 'No payment intent was created before the claim went stale',
                updated_at = CURRENT_TIMESTAMP
            WHERE status = 'pending' AND intent_id IS NULL
                AND (unixepoch(CURRENT_TIMESTAMP) - unixepoch(created_at)) >= $1
            RETURNING *;
        "#,
    )
    .bind(age.as_secs() as i64)
    .fetch_all(conn)
    .await?;
    Ok(attempts)
}

pub async fn fetch_expired_dispatches(
    age: Duration,
    conn: &mut SqliteConnection,
) -> Result<Vec<PaymentAttempt>, sqlx::Error> {
    let attempts = sqlx::query_as(
        r#"
            SELECT * FROM payment_attempts
            WHERE status = 'dispatched' AND intent_id IS NOT NULL
                AND (unixepoch(CURRENT_TIMESTAMP) - unixepoch(updated_at)) >= $1
            ORDER BY id ASC;
        "#,
    )
    .bind(age.as_secs() as i64)
    .fetch_all(conn)
    .await?;
    Ok(attempts)
}
