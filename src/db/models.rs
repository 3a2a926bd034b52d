//! # Database Models
//!
//! This module defines the data structures that map to database tables,
//! and the closed domain enums they carry.
//!
//! ## Table Overview
//!
//! | Table | Description |
//! |-------|-------------|
//! | `cards` | Balance-holding instruments, fiat or crypto |
//! | `ledger_entries` | Append-only balance deltas (source of truth) |
//! | `exchange_orders` | Currency-exchange lifecycle records |
//! | `minted_assets` | Uniquely identified issued tokens |
//!
//! ## Relationship Diagram
//!
//! ```text
//! ┌─────────────┐       ┌──────────────────┐
//! │    cards    │──────<│  ledger_entries  │
//! │             │       │                  │
//! │ id (PK)     │       │ card_id (FK)     │
//! │ balance     │       │ delta            │
//! │ recv addr   │       │ reason, actor    │
//! └─────────────┘       └──────────────────┘
//!        │
//!        │ source_card_id
//!        ▼
//! ┌──────────────────┐
//! │ exchange_orders  │
//! │                  │
//! │ status           │
//! │ payin_address    │
//! └──────────────────┘
//! ```

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The currencies a card can be denominated in.
///
/// `Btc` and `Eth` cards carry a derived receive address; fiat kinds
/// never do.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CurrencyKind {
    /// US dollar (fiat)
    Usd,
    /// Euro (fiat)
    Eur,
    /// Bitcoin
    Btc,
    /// Ethereum
    Eth,
}

impl CurrencyKind {
    /// Text form stored in the database and used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            CurrencyKind::Usd => "usd",
            CurrencyKind::Eur => "eur",
            CurrencyKind::Btc => "btc",
            CurrencyKind::Eth => "eth",
        }
    }

    /// Parse the stored text form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "usd" => Some(CurrencyKind::Usd),
            "eur" => Some(CurrencyKind::Eur),
            "btc" => Some(CurrencyKind::Btc),
            "eth" => Some(CurrencyKind::Eth),
            _ => None,
        }
    }

    /// Whether cards of this kind carry an on-chain receive address.
    pub fn is_crypto(&self) -> bool {
        matches!(self, CurrencyKind::Btc | CurrencyKind::Eth)
    }
}

impl std::fmt::Display for CurrencyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reasons a ledger entry can be written.
///
/// Every balance delta records exactly one of these.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum LedgerReason {
    /// Debit/credit pair written when an exchange order settles
    ExchangeSettlement,
    /// Privileged direct adjustment by a regulator
    RegulatorAdjust,
    /// Balance correction applied during a minted-asset dedup pass
    MintDedupCorrection,
}

impl LedgerReason {
    /// Text form stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerReason::ExchangeSettlement => "exchange-settlement",
            LedgerReason::RegulatorAdjust => "regulator-adjust",
            LedgerReason::MintDedupCorrection => "mint-dedup-correction",
        }
    }

    /// Parse the stored text form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "exchange-settlement" => Some(LedgerReason::ExchangeSettlement),
            "regulator-adjust" => Some(LedgerReason::RegulatorAdjust),
            "mint-dedup-correction" => Some(LedgerReason::MintDedupCorrection),
            _ => None,
        }
    }
}

/// Exchange order lifecycle states.
///
/// Transitions form a closed set; anything outside the table below is
/// rejected at the boundary.
///
/// ```text
/// QUOTED ──▶ PENDING_PAYIN ──▶ CONFIRMING ──▶ SETTLED
///    │              │               │
///    ▼              ▼               ▼
/// EXPIRED         FAILED          FAILED
/// ```
///
/// SETTLED, EXPIRED and FAILED are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Quote accepted, order recorded, no pay-in observed yet
    Quoted,
    /// Pay-in observed on the wire, awaiting confirmations
    PendingPayin,
    /// Pay-in has enough confirmations, eligible for settlement
    Confirming,
    /// Ledger legs written, order complete
    Settled,
    /// Quote lapsed with no pay-in
    Expired,
    /// Pay-in or settlement failed
    Failed,
}

impl OrderStatus {
    /// Text form stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Quoted => "quoted",
            OrderStatus::PendingPayin => "pending_payin",
            OrderStatus::Confirming => "confirming",
            OrderStatus::Settled => "settled",
            OrderStatus::Expired => "expired",
            OrderStatus::Failed => "failed",
        }
    }

    /// Parse the stored text form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "quoted" => Some(OrderStatus::Quoted),
            "pending_payin" => Some(OrderStatus::PendingPayin),
            "confirming" => Some(OrderStatus::Confirming),
            "settled" => Some(OrderStatus::Settled),
            "expired" => Some(OrderStatus::Expired),
            "failed" => Some(OrderStatus::Failed),
            _ => None,
        }
    }

    /// Whether this state admits no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Settled | OrderStatus::Expired | OrderStatus::Failed
        )
    }

    /// The transition table.
    ///
    /// A first pay-in observation may already carry enough
    /// confirmations, so QUOTED → CONFIRMING is admitted as the
    /// composition of its two steps.
    pub fn can_transition(&self, to: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, to),
            (Quoted, PendingPayin)
                | (Quoted, Confirming)
                | (Quoted, Expired)
                | (PendingPayin, Confirming)
                | (PendingPayin, Failed)
                | (Confirming, Settled)
                | (Confirming, Failed)
        )
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Represents a card record in the database.
///
/// `balance` is a cached projection of the card's ledger entries; the
/// two are updated in the same transaction and never diverge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardRecord {
    /// Unique card ID.
    pub id: Uuid,

    /// Owning user's account ID.
    pub owner_id: i64,

    /// Currency the card is denominated in.
    pub currency_kind: CurrencyKind,

    /// Current balance. Never negative.
    pub balance: Decimal,

    /// Derived receive address. NULL until derived for crypto kinds,
    /// always NULL for fiat kinds. Immutable once set.
    pub receive_address: Option<String>,

    /// When the card was created.
    pub created_at: DateTime<Utc>,

    /// When this record was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Represents a ledger entry in the database.
///
/// Entries are append-only: never mutated or deleted after creation.
/// The sum of a card's deltas equals its current balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntryRecord {
    /// Unique entry ID (UUID v4).
    pub id: Uuid,

    /// The card this delta applies to.
    pub card_id: Uuid,

    /// Signed balance delta.
    pub delta: Decimal,

    /// Why this delta was written.
    pub reason: LedgerReason,

    /// For settlement entries: the exchange order that caused it.
    pub order_id: Option<Uuid>,

    /// The acting user or regulator.
    pub actor_id: i64,

    /// When the entry was committed.
    pub created_at: DateTime<Utc>,
}

/// Represents an exchange order in the database.
///
/// ## Example
///
/// A 1.0 BTC → ETH order quoted at 15.0:
/// ```text
/// ExchangeOrderRecord {
///     from_currency: Btc,
///     to_currency: Eth,
///     from_amount: 1.0,
///     quoted_rate: 15.0,
///     expected_to_amount: 15.0,
///     status: Quoted,
///     ...
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeOrderRecord {
    /// Unique order ID (UUID v4).
    pub id: Uuid,

    /// Requesting user's account ID.
    pub owner_id: i64,

    /// Currency being sold.
    pub from_currency: CurrencyKind,

    /// Currency being bought.
    pub to_currency: CurrencyKind,

    /// Amount of `from_currency` the quote was taken for.
    pub from_amount: Decimal,

    /// Rate captured at quote time.
    pub quoted_rate: Decimal,

    /// `from_amount * quoted_rate`, advisory.
    pub expected_to_amount: Decimal,

    /// Current lifecycle state.
    pub status: OrderStatus,

    /// Where the user pays in. Derived once at creation, frozen for
    /// the order's lifetime.
    pub payin_address: String,

    /// Where the proceeds go. May belong to a local card or be
    /// external.
    pub payout_address: String,

    /// The card funding this order.
    pub source_card_id: Uuid,

    /// Amount actually observed on the wire, once reported.
    pub observed_amount: Option<Decimal>,

    /// Amount credited/released at settlement.
    pub settled_amount: Option<Decimal>,

    /// Set when the observed pay-in breached the slippage tolerance.
    pub flagged: bool,

    /// When the captured quote stops being honored.
    pub quote_expires_at: DateTime<Utc>,

    /// When the order was created.
    pub created_at: DateTime<Utc>,

    /// When the order was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Represents a minted-asset record in the database.
///
/// Rows are written by the minting subsystem; the deduplicator keeps
/// `token_id` unique across the table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MintedAssetRecord {
    /// Unique row ID.
    pub id: Uuid,

    /// The token's chain-level identifier.
    pub token_id: String,

    /// Owning user's account ID.
    pub owner_id: i64,

    /// When the token was minted.
    pub minted_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_currency_kind_round_trip() {
        for kind in [
            CurrencyKind::Usd,
            CurrencyKind::Eur,
            CurrencyKind::Btc,
            CurrencyKind::Eth,
        ] {
            assert_eq!(CurrencyKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(CurrencyKind::parse("doge"), None);
    }

    #[test]
    fn test_crypto_kinds() {
        assert!(CurrencyKind::Btc.is_crypto());
        assert!(CurrencyKind::Eth.is_crypto());
        assert!(!CurrencyKind::Usd.is_crypto());
        assert!(!CurrencyKind::Eur.is_crypto());
    }

    #[test]
    fn test_ledger_reason_text_forms() {
        assert_eq!(
            LedgerReason::ExchangeSettlement.as_str(),
            "exchange-settlement"
        );
        assert_eq!(LedgerReason::RegulatorAdjust.as_str(), "regulator-adjust");
        assert_eq!(
            LedgerReason::MintDedupCorrection.as_str(),
            "mint-dedup-correction"
        );
        assert_eq!(
            LedgerReason::parse("mint-dedup-correction"),
            Some(LedgerReason::MintDedupCorrection)
        );
    }

    #[test]
    fn test_order_status_transition_table() {
        use OrderStatus::*;

        assert!(Quoted.can_transition(PendingPayin));
        assert!(Quoted.can_transition(Confirming));
        assert!(Quoted.can_transition(Expired));
        assert!(PendingPayin.can_transition(Confirming));
        assert!(PendingPayin.can_transition(Failed));
        assert!(Confirming.can_transition(Settled));
        assert!(Confirming.can_transition(Failed));

        // No reverse edges
        assert!(!PendingPayin.can_transition(Quoted));
        assert!(!Confirming.can_transition(PendingPayin));
        assert!(!Settled.can_transition(Confirming));

        // No skipping to settlement
        assert!(!Quoted.can_transition(Settled));
        assert!(!PendingPayin.can_transition(Settled));
    }

    #[test]
    fn test_terminal_states_admit_nothing() {
        use OrderStatus::*;

        let all = [Quoted, PendingPayin, Confirming, Settled, Expired, Failed];
        for terminal in [Settled, Expired, Failed] {
            assert!(terminal.is_terminal());
            for target in all {
                assert!(
                    !terminal.can_transition(target),
                    "{} -> {} must be rejected",
                    terminal,
                    target
                );
            }
        }
    }

    #[test]
    fn test_order_status_round_trip() {
        use OrderStatus::*;
        for status in [Quoted, PendingPayin, Confirming, Settled, Expired, Failed] {
            assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(OrderStatus::parse("rejected"), None);
    }
}
