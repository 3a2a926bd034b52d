//! # API Response Models
//!
//! Structures for outgoing API response bodies.
//! All responses are wrapped in a standard format.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::models::{
    CardRecord, CurrencyKind, ExchangeOrderRecord, LedgerEntryRecord, LedgerReason, OrderStatus,
};
use crate::services::Quote;

/// Standard API response wrapper.
///
/// All API responses follow this format:
///
/// ## Success Response
///
/// ```json
/// {
///     "success": true,
///     "data": { ... },
///     "error": null
/// }
/// ```
///
/// ## Error Response
///
/// ```json
/// {
///     "success": false,
///     "data": null,
///     "error": {
///         "code": "INSUFFICIENT_FUNDS",
///         "message": "Insufficient funds: balance 70.00, requested debit 100.00"
///     }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    /// Whether the request was successful.
    pub success: bool,

    /// Response data (null on error).
    pub data: Option<T>,

    /// Error information (null on success).
    pub error: Option<ApiError>,
}

impl<T> ApiResponse<T> {
    /// Create a successful response with data.
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Create an error response.
    pub fn error(code: &str, message: &str) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError {
                code: code.to_string(),
                message: message.to_string(),
            }),
        }
    }
}

/// API error information.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Error code (e.g., "INSUFFICIENT_FUNDS").
    pub code: String,

    /// Human-readable error message.
    pub message: String,
}

/// Quote response.
///
/// Returned by `POST /exchange/quote`. The client echoes these fields
/// back when creating an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteResponse {
    /// Currency being sold.
    pub from_currency: CurrencyKind,

    /// Currency being bought.
    pub to_currency: CurrencyKind,

    /// Amount the quote was priced for.
    pub from_amount: Decimal,

    /// Oracle rate at quote time.
    pub rate: Decimal,

    /// Advisory payout estimate.
    pub expected_to_amount: Decimal,

    /// When the quote stops being honored.
    pub expires_at: DateTime<Utc>,
}

impl From<Quote> for QuoteResponse {
    fn from(q: Quote) -> Self {
        Self {
            from_currency: q.from_currency,
            to_currency: q.to_currency,
            from_amount: q.from_amount,
            rate: q.rate,
            expected_to_amount: q.expected_to_amount,
            expires_at: q.expires_at,
        }
    }
}

/// Exchange order snapshot.
///
/// Returned by order creation and `GET /exchange/orders/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    /// Order ID.
    pub id: Uuid,

    /// Requesting user's account ID.
    pub owner_id: i64,

    /// Currency being sold.
    pub from_currency: CurrencyKind,

    /// Currency being bought.
    pub to_currency: CurrencyKind,

    /// Quoted amount.
    pub from_amount: Decimal,

    /// Quoted rate.
    pub quoted_rate: Decimal,

    /// Advisory payout estimate at quote time.
    pub expected_to_amount: Decimal,

    /// Current lifecycle state.
    pub status: OrderStatus,

    /// Where to pay in. Frozen for the order's lifetime.
    pub payin_address: String,

    /// Where the proceeds go.
    pub payout_address: String,

    /// The funding card.
    pub source_card_id: Uuid,

    /// Pay-in amount observed on the wire, once reported.
    pub observed_amount: Option<Decimal>,

    /// Amount credited/released at settlement.
    pub settled_amount: Option<Decimal>,

    /// Whether the pay-in breached the slippage tolerance.
    pub flagged: bool,

    /// Quote deadline.
    pub quote_expires_at: DateTime<Utc>,

    /// When the order was created.
    pub created_at: DateTime<Utc>,

    /// When the order was last updated.
    pub updated_at: DateTime<Utc>,
}

impl From<ExchangeOrderRecord> for OrderResponse {
    fn from(o: ExchangeOrderRecord) -> Self {
        Self {
            id: o.id,
            owner_id: o.owner_id,
            from_currency: o.from_currency,
            to_currency: o.to_currency,
            from_amount: o.from_amount,
            quoted_rate: o.quoted_rate,
            expected_to_amount: o.expected_to_amount,
            status: o.status,
            payin_address: o.payin_address,
            payout_address: o.payout_address,
            source_card_id: o.source_card_id,
            observed_amount: o.observed_amount,
            settled_amount: o.settled_amount,
            flagged: o.flagged,
            quote_expires_at: o.quote_expires_at,
            created_at: o.created_at,
            updated_at: o.updated_at,
        }
    }
}

/// A single ledger entry, as exposed in card snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntryResponse {
    /// Entry ID.
    pub id: Uuid,

    /// Signed balance delta.
    pub delta: Decimal,

    /// Why the delta was written.
    pub reason: LedgerReason,

    /// Causing order, for settlement legs.
    pub order_id: Option<Uuid>,

    /// The acting user or regulator.
    pub actor_id: i64,

    /// When the entry was committed.
    pub created_at: DateTime<Utc>,
}

impl From<LedgerEntryRecord> for LedgerEntryResponse {
    fn from(e: LedgerEntryRecord) -> Self {
        Self {
            id: e.id,
            delta: e.delta,
            reason: e.reason,
            order_id: e.order_id,
            actor_id: e.actor_id,
            created_at: e.created_at,
        }
    }
}

/// Card snapshot.
///
/// Returned by card creation, `GET /cards/{id}` and regulator
/// adjustments.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardResponse {
    /// Card ID.
    pub id: Uuid,

    /// Owning user's account ID.
    pub owner_id: i64,

    /// Currency the card is denominated in.
    pub currency_kind: CurrencyKind,

    /// Current balance.
    pub balance: Decimal,

    /// Derived receive address, if any.
    pub receive_address: Option<String>,

    /// Recent ledger entries, newest first. Empty when the caller did
    /// not ask for history.
    pub recent_entries: Vec<LedgerEntryResponse>,

    /// When the card was created.
    pub created_at: DateTime<Utc>,

    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl CardResponse {
    /// Build a response from a card row and its recent entries.
    pub fn from_record(card: CardRecord, entries: Vec<LedgerEntryRecord>) -> Self {
        Self {
            id: card.id,
            owner_id: card.owner_id,
            currency_kind: card.currency_kind,
            balance: card.balance,
            receive_address: card.receive_address,
            recent_entries: entries.into_iter().map(Into::into).collect(),
            created_at: card.created_at,
            updated_at: card.updated_at,
        }
    }
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Overall status: "healthy" or "unhealthy".
    pub status: String,

    /// Database connectivity.
    pub database: bool,

    /// Service version.
    pub version: String,

    /// Server time.
    pub timestamp: DateTime<Utc>,
}
