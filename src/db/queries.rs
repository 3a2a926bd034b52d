//! # Database Queries
//!
//! This module contains the SQL for the card, order and minted-asset
//! tables. Each function performs a specific database operation.
//!
//! ## Query Organization
//!
//! Queries are grouped by the table they operate on:
//! - `card_*` / `get_card*` - Card table operations
//! - `*_order*` - Exchange order operations
//! - `*_ledger_*` - Ledger entry reads
//! - `*_minted_*` - Minted-asset operations
//!
//! Read-modify-write sequences that need row locks (ledger applies,
//! settlement, pay-in transitions) live with their services and run on
//! explicit transactions; the row mappers here are shared with them.

use deadpool_postgres::Pool;
use tokio_postgres::Row;
use tracing::{debug, info};
use uuid::Uuid;

use super::models::*;
use super::DatabaseError;

// ============================================
// ROW MAPPERS
// ============================================

/// Helper to convert a database row to CardRecord.
pub(crate) fn row_to_card(row: &Row) -> Result<CardRecord, DatabaseError> {
    let kind: String = row.get("currency_kind");
    Ok(CardRecord {
        id: row.get("id"),
        owner_id: row.get("owner_id"),
        currency_kind: CurrencyKind::parse(&kind)
            .ok_or_else(|| DatabaseError::CorruptRow(format!("currency_kind '{}'", kind)))?,
        balance: row.get("balance"),
        receive_address: row.get("receive_address"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

/// Helper to convert a database row to LedgerEntryRecord.
pub(crate) fn row_to_ledger_entry(row: &Row) -> Result<LedgerEntryRecord, DatabaseError> {
    let reason: String = row.get("reason");
    Ok(LedgerEntryRecord {
        id: row.get("id"),
        card_id: row.get("card_id"),
        delta: row.get("delta"),
        reason: LedgerReason::parse(&reason)
            .ok_or_else(|| DatabaseError::CorruptRow(format!("ledger reason '{}'", reason)))?,
        order_id: row.get("order_id"),
        actor_id: row.get("actor_id"),
        created_at: row.get("created_at"),
    })
}

/// Helper to convert a database row to ExchangeOrderRecord.
pub(crate) fn row_to_order(row: &Row) -> Result<ExchangeOrderRecord, DatabaseError> {
    let from: String = row.get("from_currency");
    let to: String = row.get("to_currency");
    let status: String = row.get("status");
    Ok(ExchangeOrderRecord {
        id: row.get("id"),
        owner_id: row.get("owner_id"),
        from_currency: CurrencyKind::parse(&from)
            .ok_or_else(|| DatabaseError::CorruptRow(format!("from_currency '{}'", from)))?,
        to_currency: CurrencyKind::parse(&to)
            .ok_or_else(|| DatabaseError::CorruptRow(format!("to_currency '{}'", to)))?,
        from_amount: row.get("from_amount"),
        quoted_rate: row.get("quoted_rate"),
        expected_to_amount: row.get("expected_to_amount"),
        status: OrderStatus::parse(&status)
            .ok_or_else(|| DatabaseError::CorruptRow(format!("order status '{}'", status)))?,
        payin_address: row.get("payin_address"),
        payout_address: row.get("payout_address"),
        source_card_id: row.get("source_card_id"),
        observed_amount: row.get("observed_amount"),
        settled_amount: row.get("settled_amount"),
        flagged: row.get("flagged"),
        quote_expires_at: row.get("quote_expires_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

/// Helper to convert a database row to MintedAssetRecord.
pub(crate) fn row_to_minted_asset(row: &Row) -> Result<MintedAssetRecord, DatabaseError> {
    Ok(MintedAssetRecord {
        id: row.get("id"),
        token_id: row.get("token_id"),
        owner_id: row.get("owner_id"),
        minted_at: row.get("minted_at"),
    })
}

/// Column list shared by every card query.
pub(crate) const CARD_COLUMNS: &str =
    "id, owner_id, currency_kind, balance, receive_address, created_at, updated_at";

/// Column list shared by every order query.
pub(crate) const ORDER_COLUMNS: &str = "id, owner_id, from_currency, to_currency, from_amount, \
     quoted_rate, expected_to_amount, status, payin_address, payout_address, \
     source_card_id, observed_amount, settled_amount, flagged, \
     quote_expires_at, created_at, updated_at";

// ============================================
// CARD QUERIES
// ============================================

/// Get a card by its ID.
pub async fn get_card(pool: &Pool, id: Uuid) -> Result<Option<CardRecord>, DatabaseError> {
    debug!("Fetching card: {}", id);

    let client = pool
        .get()
        .await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    let sql = format!("SELECT {} FROM cards WHERE id = $1", CARD_COLUMNS);
    let rows = client.query(sql.as_str(), &[&id]).await?;

    match rows.first() {
        Some(row) => Ok(Some(row_to_card(row)?)),
        None => Ok(None),
    }
}

/// Resolve a receive address to the card it belongs to, if any.
///
/// Used at settlement to decide whether a payout is an internal credit
/// or an external release.
pub async fn get_card_by_receive_address(
    pool: &Pool,
    address: &str,
    currency_kind: CurrencyKind,
) -> Result<Option<CardRecord>, DatabaseError> {
    let client = pool
        .get()
        .await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    let sql = format!(
        "SELECT {} FROM cards WHERE receive_address = $1 AND currency_kind = $2",
        CARD_COLUMNS
    );
    let rows = client
        .query(sql.as_str(), &[&address, &currency_kind.as_str()])
        .await?;

    match rows.first() {
        Some(row) => Ok(Some(row_to_card(row)?)),
        None => Ok(None),
    }
}

/// Create a new card record.
pub async fn create_card(pool: &Pool, card: &CardRecord) -> Result<(), DatabaseError> {
    debug!("Creating card {} for owner {}", card.id, card.owner_id);

    let client = pool
        .get()
        .await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    client
        .execute(
            r#"
        INSERT INTO cards (
            id, owner_id, currency_kind, balance, receive_address,
            created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
            &[
                &card.id,
                &card.owner_id,
                &card.currency_kind.as_str(),
                &card.balance,
                &card.receive_address,
                &card.created_at,
                &card.updated_at,
            ],
        )
        .await?;

    info!("Card created: {}", card.id);
    Ok(())
}

/// Persist a derived receive address onto a card.
///
/// Only fills a NULL address; an already-derived address is immutable
/// and the call fails rather than overwriting it.
pub async fn set_receive_address(
    pool: &Pool,
    card_id: Uuid,
    address: &str,
) -> Result<(), DatabaseError> {
    let client = pool
        .get()
        .await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    let rows_affected = client
        .execute(
            r#"
        UPDATE cards
        SET receive_address = $2, updated_at = NOW()
        WHERE id = $1 AND receive_address IS NULL
        "#,
            &[&card_id, &address],
        )
        .await?;

    if rows_affected == 0 {
        return Err(DatabaseError::NotFound(format!(
            "card {} without an address",
            card_id
        )));
    }

    info!("Receive address set for card {}", card_id);
    Ok(())
}

// ============================================
// LEDGER QUERIES
// ============================================

/// Get ledger entries for a card, newest first.
pub async fn get_card_ledger_entries(
    pool: &Pool,
    card_id: Uuid,
    limit: i64,
    offset: i64,
) -> Result<Vec<LedgerEntryRecord>, DatabaseError> {
    debug!("Fetching ledger entries for card: {}", card_id);

    let client = pool
        .get()
        .await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    let rows = client
        .query(
            r#"
        SELECT id, card_id, delta, reason, order_id, actor_id, created_at
        FROM ledger_entries
        WHERE card_id = $1
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
            &[&card_id, &limit, &offset],
        )
        .await?;

    let mut entries = Vec::new();
    for row in rows {
        entries.push(row_to_ledger_entry(&row)?);
    }

    Ok(entries)
}

// ============================================
// ORDER QUERIES
// ============================================

/// Record a new exchange order.
pub async fn create_order(pool: &Pool, order: &ExchangeOrderRecord) -> Result<(), DatabaseError> {
    debug!(
        "Creating order {}: {} {} -> {}",
        order.id, order.from_amount, order.from_currency, order.to_currency
    );

    let client = pool
        .get()
        .await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    client
        .execute(
            r#"
        INSERT INTO exchange_orders (
            id, owner_id, from_currency, to_currency, from_amount,
            quoted_rate, expected_to_amount, status, payin_address,
            payout_address, source_card_id, observed_amount,
            settled_amount, flagged, quote_expires_at, created_at,
            updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13,
                $14, $15, $16, $17)
        "#,
            &[
                &order.id,
                &order.owner_id,
                &order.from_currency.as_str(),
                &order.to_currency.as_str(),
                &order.from_amount,
                &order.quoted_rate,
                &order.expected_to_amount,
                &order.status.as_str(),
                &order.payin_address,
                &order.payout_address,
                &order.source_card_id,
                &order.observed_amount,
                &order.settled_amount,
                &order.flagged,
                &order.quote_expires_at,
                &order.created_at,
                &order.updated_at,
            ],
        )
        .await?;

    info!("Order created: {}", order.id);
    Ok(())
}

/// Get an exchange order by its ID.
pub async fn get_order(
    pool: &Pool,
    id: Uuid,
) -> Result<Option<ExchangeOrderRecord>, DatabaseError> {
    let client = pool
        .get()
        .await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    let sql = format!("SELECT {} FROM exchange_orders WHERE id = $1", ORDER_COLUMNS);
    let rows = client.query(sql.as_str(), &[&id]).await?;

    match rows.first() {
        Some(row) => Ok(Some(row_to_order(row)?)),
        None => Ok(None),
    }
}

/// Expire every quoted order whose quote deadline has passed.
///
/// Returns the number of orders transitioned. No ledger effect.
pub async fn expire_overdue_orders(pool: &Pool) -> Result<u64, DatabaseError> {
    let client = pool
        .get()
        .await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    let expired = client
        .execute(
            r#"
        UPDATE exchange_orders
        SET status = 'expired', updated_at = NOW()
        WHERE status = 'quoted' AND quote_expires_at < NOW()
        "#,
            &[],
        )
        .await?;

    if expired > 0 {
        info!("Expired {} overdue quoted orders", expired);
    }

    Ok(expired)
}

// ============================================
// MINTED ASSET QUERIES
// ============================================

/// Snapshot every minted-asset row.
///
/// The deduplicator scopes its deletes strictly to the ids returned
/// here; rows minted after the snapshot are untouchable for the pass.
pub async fn snapshot_minted_assets(pool: &Pool) -> Result<Vec<MintedAssetRecord>, DatabaseError> {
    let client = pool
        .get()
        .await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    let rows = client
        .query(
            r#"
        SELECT id, token_id, owner_id, minted_at
        FROM minted_assets
        "#,
            &[],
        )
        .await?;

    let mut assets = Vec::new();
    for row in rows {
        assets.push(row_to_minted_asset(&row)?);
    }

    Ok(assets)
}

/// Delete a batch of minted-asset rows by ID.
///
/// Returns the number actually removed; ids already gone are not an
/// error.
pub async fn delete_minted_assets(pool: &Pool, ids: &[Uuid]) -> Result<u64, DatabaseError> {
    if ids.is_empty() {
        return Ok(0);
    }

    let client = pool
        .get()
        .await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    let removed = client
        .execute("DELETE FROM minted_assets WHERE id = ANY($1)", &[&ids])
        .await?;

    Ok(removed)
}
