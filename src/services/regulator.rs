//! # Regulator Adjustment Service
//!
//! The privileged direct-mutation path into the ledger, bypassing the
//! exchange machine. Authorization lives with an external layer; the
//! `actor_id` arriving here is pre-verified to carry the regulator
//! capability, and it is stamped onto the resulting ledger entry for
//! audit.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::db::models::{CardRecord, LedgerReason};
use crate::db::{queries, Database};
use crate::error::CoreError;

use super::BalanceLedger;

/// Direction of a regulator adjustment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AdjustOperation {
    /// Credit the card
    Add,
    /// Debit the card
    Subtract,
}

/// The regulator adjustment service.
///
/// ## Usage
///
/// ```rust,ignore
/// let regulator = RegulatorAdjustment::new(db, ledger);
/// let card = regulator
///     .adjust(regulator_id, card_id, dec!(30.00), AdjustOperation::Subtract)
///     .await?;
/// ```
#[derive(Clone)]
pub struct RegulatorAdjustment {
    /// Database connection, for returning the updated card.
    db: Database,

    /// The ledger every adjustment goes through.
    ledger: BalanceLedger,
}

impl RegulatorAdjustment {
    /// Create a new RegulatorAdjustment instance.
    pub fn new(db: Database, ledger: BalanceLedger) -> Self {
        Self { db, ledger }
    }

    /// Apply a direct balance adjustment.
    ///
    /// Inherits the ledger's atomicity and non-negative guarantee: a
    /// subtract exceeding the balance fails outright with
    /// `InsufficientFunds` and changes nothing. Each adjustment is a
    /// single ledger entry, never batched with other mutations.
    ///
    /// ## Arguments
    ///
    /// * `actor_id` - The acting regulator, pre-verified upstream
    /// * `card_id` - The card to adjust
    /// * `amount` - Positive magnitude of the adjustment
    /// * `operation` - Add or subtract
    ///
    /// ## Returns
    ///
    /// The card with its post-adjustment balance.
    pub async fn adjust(
        &self,
        actor_id: i64,
        card_id: Uuid,
        amount: Decimal,
        operation: AdjustOperation,
    ) -> Result<CardRecord, CoreError> {
        if amount <= Decimal::ZERO {
            return Err(CoreError::InvalidInput(format!(
                "adjustment amount must be positive, got {}",
                amount
            )));
        }

        let delta = signed_delta(amount, operation);

        let entry = self
            .ledger
            .apply(card_id, delta, LedgerReason::RegulatorAdjust, actor_id, None)
            .await?;

        info!(
            "Regulator {} adjusted card {}: {:?} {} (entry {})",
            actor_id, card_id, operation, amount, entry.id
        );

        queries::get_card(self.db.pool(), card_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("card {}", card_id)))
    }
}

/// Turn a positive magnitude and a direction into a signed delta.
fn signed_delta(amount: Decimal, operation: AdjustOperation) -> Decimal {
    match operation {
        AdjustOperation::Add => amount,
        AdjustOperation::Subtract => -amount,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_signed_delta() {
        assert_eq!(signed_delta(dec!(30.00), AdjustOperation::Add), dec!(30.00));
        assert_eq!(
            signed_delta(dec!(30.00), AdjustOperation::Subtract),
            dec!(-30.00)
        );
    }

    #[test]
    fn test_operation_wire_form() {
        assert_eq!(
            serde_json::to_string(&AdjustOperation::Add).unwrap(),
            "\"add\""
        );
        assert_eq!(
            serde_json::from_str::<AdjustOperation>("\"subtract\"").unwrap(),
            AdjustOperation::Subtract
        );
    }
}
