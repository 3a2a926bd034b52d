//! # Balance Ledger Service
//!
//! The authoritative store of card balances. Every mutation appends an
//! immutable [`LedgerEntryRecord`] and updates the card's cached
//! balance in the same transaction; the sum of a card's deltas always
//! equals its balance.
//!
//! ## Apply Flow
//!
//! ```text
//! 1. BEGIN
//!              ↓
//! 2. SELECT balance FROM cards WHERE id = $1 FOR UPDATE
//!              ↓
//! 3. Check balance + delta >= 0   (else roll back, nothing written)
//!              ↓
//! 4. INSERT ledger entry
//!              ↓
//! 5. UPDATE cards SET balance = balance + delta
//!              ↓
//! 6. COMMIT
//! ```
//!
//! The row lock is scoped to the one card being touched; applies on
//! unrelated cards never serialize against each other. Committed order
//! of entries per card is the real-time commit order of `apply` calls.

use chrono::Utc;
use rust_decimal::Decimal;
use tokio_postgres::Transaction;
use tracing::{debug, info};
use uuid::Uuid;

use crate::db::models::{LedgerEntryRecord, LedgerReason};
use crate::db::{queries, Database};
use crate::error::CoreError;

/// The balance ledger.
///
/// ## Usage
///
/// ```rust,ignore
/// let ledger = BalanceLedger::new(db);
///
/// // Credit 50.00 onto a card
/// let entry = ledger
///     .apply(card_id, dec!(50.00), LedgerReason::RegulatorAdjust, actor_id, None)
///     .await?;
///
/// let balance = ledger.get_balance(card_id).await?;
/// ```
#[derive(Clone)]
pub struct BalanceLedger {
    /// Database connection.
    db: Database,
}

impl BalanceLedger {
    /// Create a new BalanceLedger instance.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Apply a single balance delta to a card.
    ///
    /// All-or-nothing: on any failure no entry is written and the
    /// balance is untouched. Two concurrent applies on the same card
    /// serialize on the card's row lock.
    ///
    /// ## Arguments
    ///
    /// * `card_id` - The card to mutate
    /// * `delta` - Signed amount; negative for debits, never zero
    /// * `reason` - Why the delta is being written
    /// * `actor_id` - The acting user or regulator, kept for audit
    /// * `order_id` - The causing exchange order, for settlement legs
    ///
    /// ## Returns
    ///
    /// * `Ok(LedgerEntryRecord)` - The committed entry
    /// * `Err(CoreError::InsufficientFunds)` - Debit would breach zero
    /// * `Err(CoreError::NotFound)` - No such card
    pub async fn apply(
        &self,
        card_id: Uuid,
        delta: Decimal,
        reason: LedgerReason,
        actor_id: i64,
        order_id: Option<Uuid>,
    ) -> Result<LedgerEntryRecord, CoreError> {
        let mut client = self
            .db
            .pool()
            .get()
            .await
            .map_err(|e| CoreError::Database(e.to_string()))?;

        let tx = client.transaction().await?;
        let entry = Self::apply_in(&tx, card_id, delta, reason, actor_id, order_id).await?;
        tx.commit().await?;

        info!(
            "Ledger entry {} committed: card={} delta={} reason={}",
            entry.id,
            card_id,
            delta,
            reason.as_str()
        );

        Ok(entry)
    }

    /// Read a card's current balance.
    ///
    /// Reflects every previously committed `apply` on that card.
    pub async fn get_balance(&self, card_id: Uuid) -> Result<Decimal, CoreError> {
        let card = queries::get_card(self.db.pool(), card_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("card {}", card_id)))?;
        Ok(card.balance)
    }

    /// Apply a delta inside a caller-owned transaction.
    ///
    /// Settlement uses this to put both legs and the order status
    /// change into one atomic commit. The card row is locked for the
    /// remainder of the transaction.
    pub(crate) async fn apply_in(
        tx: &Transaction<'_>,
        card_id: Uuid,
        delta: Decimal,
        reason: LedgerReason,
        actor_id: i64,
        order_id: Option<Uuid>,
    ) -> Result<LedgerEntryRecord, CoreError> {
        debug!("Applying delta {} to card {}", delta, card_id);

        let rows = tx
            .query(
                "SELECT balance FROM cards WHERE id = $1 FOR UPDATE",
                &[&card_id],
            )
            .await?;
        let row = rows
            .first()
            .ok_or_else(|| CoreError::NotFound(format!("card {}", card_id)))?;
        let balance: Decimal = row.get("balance");

        let new_balance = checked_apply(balance, delta)?;

        let entry = LedgerEntryRecord {
            id: Uuid::new_v4(),
            card_id,
            delta,
            reason,
            order_id,
            actor_id,
            created_at: Utc::now(),
        };

        tx.execute(
            r#"
        INSERT INTO ledger_entries (
            id, card_id, delta, reason, order_id, actor_id, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
            &[
                &entry.id,
                &entry.card_id,
                &entry.delta,
                &entry.reason.as_str(),
                &entry.order_id,
                &entry.actor_id,
                &entry.created_at,
            ],
        )
        .await?;

        tx.execute(
            "UPDATE cards SET balance = $2, updated_at = NOW() WHERE id = $1",
            &[&card_id, &new_balance],
        )
        .await?;

        Ok(entry)
    }

    /// Lock a set of card rows in deterministic order.
    ///
    /// Settlement touches up to two cards; taking both locks sorted by
    /// id up front keeps opposite-direction settlements from
    /// deadlocking.
    pub(crate) async fn lock_cards(
        tx: &Transaction<'_>,
        card_ids: &[Uuid],
    ) -> Result<(), CoreError> {
        let mut sorted: Vec<Uuid> = card_ids.to_vec();
        sorted.sort();
        sorted.dedup();

        tx.query(
            "SELECT id FROM cards WHERE id = ANY($1) ORDER BY id FOR UPDATE",
            &[&sorted],
        )
        .await?;

        Ok(())
    }
}

/// Check the non-negative invariant and produce the new balance.
///
/// Zero deltas are rejected: an entry that changes nothing has no
/// reason to exist in an audit trail.
pub(crate) fn checked_apply(balance: Decimal, delta: Decimal) -> Result<Decimal, CoreError> {
    if delta.is_zero() {
        return Err(CoreError::InvalidInput(
            "delta must be non-zero".to_string(),
        ));
    }

    let new_balance = balance + delta;
    if new_balance < Decimal::ZERO {
        return Err(CoreError::InsufficientFunds {
            balance,
            requested: -delta,
        });
    }

    Ok(new_balance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_credit_and_debit_arithmetic() {
        assert_eq!(checked_apply(dec!(100.00), dec!(-30.00)).unwrap(), dec!(70.00));
        assert_eq!(checked_apply(dec!(0), dec!(15.5)).unwrap(), dec!(15.5));
        // Debit down to exactly zero is allowed
        assert_eq!(checked_apply(dec!(70.00), dec!(-70.00)).unwrap(), dec!(0.00));
    }

    #[test]
    fn test_overdraft_is_rejected_without_mutation() {
        let err = checked_apply(dec!(70.00), dec!(-100.00)).unwrap_err();
        match err {
            CoreError::InsufficientFunds { balance, requested } => {
                assert_eq!(balance, dec!(70.00));
                assert_eq!(requested, dec!(100.00));
            }
            other => panic!("expected InsufficientFunds, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_delta_is_rejected() {
        assert!(matches!(
            checked_apply(dec!(10), Decimal::ZERO),
            Err(CoreError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_entry_sums_track_balance() {
        // Folding a sequence of deltas through checked_apply keeps the
        // running balance equal to the sum of applied deltas.
        let deltas = [dec!(100.00), dec!(-30.00), dec!(5.25), dec!(-75.25)];
        let mut balance = Decimal::ZERO;
        let mut applied_sum = Decimal::ZERO;

        for delta in deltas {
            balance = checked_apply(balance, delta).unwrap();
            applied_sum += delta;
            assert!(balance >= Decimal::ZERO);
            assert_eq!(balance, applied_sum);
        }
        assert_eq!(balance, dec!(0.00));
    }

    #[test]
    fn test_rejected_debit_leaves_running_balance_intact() {
        let mut balance = dec!(100.00);
        balance = checked_apply(balance, dec!(-30.00)).unwrap();
        assert_eq!(balance, dec!(70.00));

        // Failed apply must not move the balance
        assert!(checked_apply(balance, dec!(-100.00)).is_err());
        assert_eq!(balance, dec!(70.00));
    }
}
