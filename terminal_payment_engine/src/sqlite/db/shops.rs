use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{
    db_types::{BindResult, NewShop, ShopAccount, ShopId, TerminalBinding, TerminalStatus},
    traits::StoreError,
};

pub async fn fetch_shop(shop_id: &ShopId, conn: &mut SqliteConnection) -> Result<Option<ShopAccount>, sqlx::Error> {
    let shop = sqlx::query_as("SELECT * FROM shops WHERE shop_id = $1").bind(shop_id).fetch_optional(conn).await?;
    Ok(shop)
}

pub async fn fetch_shop_for_terminal(
    terminal_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<ShopAccount>, sqlx::Error> {
    let shop =
        sqlx::query_as("SELECT * FROM shops WHERE terminal_id = $1").bind(terminal_id).fetch_optional(conn).await?;
    Ok(shop)
}

/// Inserts the shop, or refreshes the name and address of an existing one.
pub async fn upsert_shop(shop: NewShop, conn: &mut SqliteConnection) -> Result<ShopAccount, sqlx::Error> {
    let address = shop.address.unwrap_or_default();
    let blank = |s: String| if s.is_empty() { None } else { Some(s) };
    let shop: ShopAccount = sqlx::query_as(
        r#"
            INSERT INTO shops (shop_id, name, address_line1, city, state, postal_code, country)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (shop_id) DO UPDATE SET
                name = excluded.name,
                address_line1 = excluded.address_line1,
                city = excluded.city,
                state = excluded.state,
                postal_code = excluded.postal_code,
                country = excluded.country,
                updated_at = CURRENT_TIMESTAMP
            RETURNING *;
        "#,
    )
    .bind(shop.shop_id)
    .bind(shop.name)
    .bind(blank(address.line1))
    .bind(blank(address.city))
    .bind(blank(address.state))
    .bind(blank(address.postal_code))
    .bind(blank(address.country))
    .fetch_one(conn)
    .await?;
    debug!("🏪️ Shop {} saved", shop.shop_id);
    Ok(shop)
}

/// Writes the connected account id only if the shop does not have one. Returns the id on record afterwards.
pub async fn set_connected_account_if_absent(
    shop_id: &ShopId,
    account_id: &str,
    conn: &mut SqliteConnection,
) -> Result<String, StoreError> {
    let result = sqlx::query(
        "UPDATE shops SET connected_account_id = $1, updated_at = CURRENT_TIMESTAMP WHERE shop_id = $2 AND \
         connected_account_id IS NULL",
    )
    .bind(account_id)
    .bind(shop_id)
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() == 1 {
        trace!("🏪️ Connected account {account_id} stored for shop {shop_id}");
        return Ok(account_id.to_string());
    }
    let shop = fetch_shop(shop_id, conn).await?.ok_or_else(|| StoreError::ShopNotFound(shop_id.clone()))?;
    shop.connected_account_id.ok_or_else(|| {
        StoreError::DatabaseError(format!("Connected account for shop {shop_id} was neither stored nor present"))
    })
}

pub async fn set_payouts_enabled(
    shop_id: &ShopId,
    enabled: bool,
    conn: &mut SqliteConnection,
) -> Result<(), StoreError> {
    let result =
        sqlx::query("UPDATE shops SET payouts_enabled = $1, updated_at = CURRENT_TIMESTAMP WHERE shop_id = $2")
            .bind(enabled)
            .bind(shop_id)
            .execute(conn)
            .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::ShopNotFound(shop_id.clone()));
    }
    Ok(())
}

/// Binds the reader to the shop, if the shop has none yet. The check and the write are a single statement.
pub async fn bind_terminal_if_unbound(
    shop_id: &ShopId,
    binding: &TerminalBinding,
    conn: &mut SqliteConnection,
) -> Result<BindResult, StoreError> {
    let updated: Option<ShopAccount> = sqlx::query_as(
        r#"
            UPDATE shops SET
                terminal_id = $1,
                terminal_serial = $2,
                terminal_model = $3,
                terminal_status = $4,
                location_id = $5,
                updated_at = CURRENT_TIMESTAMP
            WHERE shop_id = $6 AND terminal_id IS NULL
            RETURNING *;
        "#,
    )
    .bind(&binding.terminal_id)
    .bind(&binding.serial)
    .bind(&binding.model)
    .bind(binding.status)
    .bind(&binding.location_id)
    .bind(shop_id)
    .fetch_optional(&mut *conn)
    .await?;
    if let Some(shop) = updated {
        debug!("🏪️ Reader {} bound to shop {shop_id}", binding.terminal_id);
        return Ok(BindResult::Bound(shop));
    }
    let shop = fetch_shop(shop_id, conn).await?.ok_or_else(|| StoreError::ShopNotFound(shop_id.clone()))?;
    let existing = shop.terminal_id.ok_or_else(|| {
        StoreError::DatabaseError(format!("Reader for shop {shop_id} was neither bound nor present"))
    })?;
    Ok(BindResult::AlreadyBound(existing))
}

pub async fn update_terminal_status(
    shop_id: &ShopId,
    status: TerminalStatus,
    conn: &mut SqliteConnection,
) -> Result<(), StoreError> {
    let result = sqlx::query(
        "UPDATE shops SET terminal_status = $1, updated_at = CURRENT_TIMESTAMP WHERE shop_id = $2 AND terminal_id IS \
         NOT NULL",
    )
    .bind(status)
    .bind(shop_id)
    .execute(conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::ShopNotFound(shop_id.clone()));
    }
    Ok(())
}
