//! # API Request Models
//!
//! Structures for incoming API request bodies.
//! Each struct represents the expected JSON body for an endpoint.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::models::CurrencyKind;
use crate::services::AdjustOperation;

/// Request to price an exchange.
///
/// ## Example JSON
///
/// ```json
/// {
///     "fromCurrency": "btc",
///     "toCurrency": "eth",
///     "fromAmount": "1.0"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    /// Currency being sold.
    pub from_currency: CurrencyKind,

    /// Currency being bought.
    pub to_currency: CurrencyKind,

    /// Amount of `fromCurrency` to price.
    pub from_amount: Decimal,
}

/// Request to create an exchange order from an accepted quote.
///
/// The client echoes the quote exactly as returned by
/// `POST /exchange/quote`; a lapsed `expiresAt` is rejected.
///
/// ## Example JSON
///
/// ```json
/// {
///     "quote": {
///         "fromCurrency": "btc",
///         "toCurrency": "eth",
///         "fromAmount": "1.0",
///         "rate": "15.0",
///         "expiresAt": "2025-06-01T12:02:00Z"
///     },
///     "ownerId": 42,
///     "sourceCardId": "550e8400-e29b-41d4-a716-446655440000",
///     "destinationAddress": "0x52908400098527886E0F7030069857D2E4169EE7"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    /// The quote being accepted.
    pub quote: SubmittedQuote,

    /// Requesting user's account ID.
    pub owner_id: i64,

    /// The card funding the order.
    pub source_card_id: Uuid,

    /// Where the proceeds go; a local card's receive address or an
    /// external address.
    pub destination_address: String,
}

/// The quote portion of an order-creation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedQuote {
    /// Currency being sold.
    pub from_currency: CurrencyKind,

    /// Currency being bought.
    pub to_currency: CurrencyKind,

    /// Quoted amount.
    pub from_amount: Decimal,

    /// Quoted rate.
    pub rate: Decimal,

    /// Quote deadline as returned by the quote endpoint.
    pub expires_at: DateTime<Utc>,
}

/// Pay-in observation pushed by the payment/chain observer.
///
/// ## Example JSON
///
/// ```json
/// {
///     "observedAmount": "0.998",
///     "confirmations": 3
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayinRequest {
    /// Amount seen on the wire.
    pub observed_amount: Decimal,

    /// Confirmations accrued so far.
    pub confirmations: u32,
}

/// Request for a privileged balance adjustment.
///
/// ## Authorization
///
/// The `actorId` must already carry the regulator capability; the
/// upstream authorization layer verifies that before this endpoint is
/// reached.
///
/// ## Example JSON
///
/// ```json
/// {
///     "actorId": 7,
///     "cardId": "550e8400-e29b-41d4-a716-446655440000",
///     "amount": "30.00",
///     "operation": "subtract"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustBalanceRequest {
    /// The acting regulator's ID (pre-verified upstream).
    pub actor_id: i64,

    /// The card to adjust.
    pub card_id: Uuid,

    /// Positive magnitude of the adjustment.
    pub amount: Decimal,

    /// Whether to add or subtract.
    pub operation: AdjustOperation,
}

/// Request to create a card.
///
/// Crypto-kind cards get their receive address derived and persisted
/// synchronously during creation.
///
/// ## Example JSON
///
/// ```json
/// {
///     "ownerId": 42,
///     "currencyKind": "btc"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCardRequest {
    /// Owning user's account ID.
    pub owner_id: i64,

    /// Currency the card is denominated in.
    pub currency_kind: CurrencyKind,
}
