//! # Exchange Order Machine
//!
//! Drives a currency-exchange order from quote through settlement or
//! failure. The lifecycle is the closed state set in
//! [`OrderStatus`](crate::db::models::OrderStatus); any transition
//! outside its table is rejected here rather than trusted to callers.
//!
//! ## Lifecycle
//!
//! ```text
//! quote() ──▶ create_order() ──▶ mark_payin_received() ──▶ settle()
//!   oracle        QUOTED          PENDING_PAYIN/CONFIRMING   SETTLED
//!                   │                     │                     │
//!                   ▼                     ▼                     ▼
//!                EXPIRED                FAILED               FAILED
//!               (sweep)                                  (debit failed)
//! ```
//!
//! Quotes are advisory: no funds move at creation, and a quote that
//! expires before settlement is re-priced from the current oracle
//! rate. Settlement commits the order's terminal state and both ledger
//! legs in one transaction, so retrying a settled order returns the
//! stored result instead of double-crediting.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::time::interval;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::db::models::{CardRecord, CurrencyKind, ExchangeOrderRecord, LedgerReason, OrderStatus};
use crate::db::{queries, Database};
use crate::error::CoreError;
use crate::oracle::RateOracle;

use super::{AddressDeriver, BalanceLedger};

/// A priced quote, valid until `expires_at`.
#[derive(Debug, Clone)]
pub struct Quote {
    /// Currency being sold.
    pub from_currency: CurrencyKind,
    /// Currency being bought.
    pub to_currency: CurrencyKind,
    /// Amount the quote was priced for.
    pub from_amount: Decimal,
    /// Oracle rate at quote time.
    pub rate: Decimal,
    /// `from_amount * rate`, advisory.
    pub expected_to_amount: Decimal,
    /// When this quote stops being honored.
    pub expires_at: DateTime<Utc>,
}

/// A quote as re-submitted by the client when creating an order.
#[derive(Debug, Clone)]
pub struct QuoteSubmission {
    pub from_currency: CurrencyKind,
    pub to_currency: CurrencyKind,
    pub from_amount: Decimal,
    pub rate: Decimal,
    pub expires_at: DateTime<Utc>,
}

/// The exchange order state machine.
///
/// ## Usage
///
/// ```rust,ignore
/// let machine = ExchangeOrderMachine::new(db, oracle, deriver, config);
///
/// let quote = machine.quote(Btc, Eth, dec!(1.0), timeout).await?;
/// let order = machine.create_order(owner, submission, card_id, dest).await?;
/// // ... observer reports the pay-in ...
/// let settled = machine.settle(order.id).await?;
/// ```
#[derive(Clone)]
pub struct ExchangeOrderMachine {
    /// Database connection.
    db: Database,

    /// External rate oracle.
    oracle: Arc<dyn RateOracle>,

    /// Receive/pay-in address derivation.
    deriver: AddressDeriver,

    /// Application configuration.
    config: AppConfig,
}

impl ExchangeOrderMachine {
    /// Create a new ExchangeOrderMachine instance.
    pub fn new(
        db: Database,
        oracle: Arc<dyn RateOracle>,
        deriver: AddressDeriver,
        config: AppConfig,
    ) -> Self {
        Self {
            db,
            oracle,
            deriver,
            config,
        }
    }

    // ==========================================
    // QUOTING
    // ==========================================

    /// Price an exchange against the current oracle rate.
    ///
    /// Creates no order and moves no funds. Any oracle failure or a
    /// round trip exceeding `timeout` surfaces as
    /// `CoreError::RateUnavailable` with no state created.
    pub async fn quote(
        &self,
        from: CurrencyKind,
        to: CurrencyKind,
        from_amount: Decimal,
        timeout: Duration,
    ) -> Result<Quote, CoreError> {
        let quote = build_quote(
            self.oracle.as_ref(),
            from,
            to,
            from_amount,
            timeout,
            self.config.quote_ttl_secs,
        )
        .await?;

        info!(
            "Quoted {} {} -> {} at {} (expires {})",
            from_amount, from, to, quote.rate, quote.expires_at
        );

        Ok(quote)
    }

    // ==========================================
    // ORDER CREATION
    // ==========================================

    /// Create an order in QUOTED from an accepted quote.
    ///
    /// No debit is taken here; the order records intent only. The
    /// pay-in address is derived once and frozen for the order's
    /// lifetime.
    ///
    /// ## Returns
    ///
    /// * `Err(CoreError::QuoteExpired)` - The submitted quote lapsed
    /// * `Err(CoreError::InvalidInput)` - Card/owner/currency mismatch
    pub async fn create_order(
        &self,
        owner_id: i64,
        quote: QuoteSubmission,
        source_card_id: Uuid,
        destination_address: String,
    ) -> Result<ExchangeOrderRecord, CoreError> {
        let now = Utc::now();
        if quote.expires_at <= now {
            return Err(CoreError::QuoteExpired(quote.expires_at));
        }
        validate_pair(quote.from_currency, quote.to_currency, quote.from_amount)?;
        if destination_address.trim().is_empty() {
            return Err(CoreError::InvalidInput(
                "destination address must not be empty".to_string(),
            ));
        }
        // Reject unusable destinations now rather than at settlement.
        self.resolve_destination(&destination_address, quote.to_currency)
            .await?;

        let card = queries::get_card(self.db.pool(), source_card_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("card {}", source_card_id)))?;
        if card.owner_id != owner_id {
            return Err(CoreError::InvalidInput(format!(
                "card {} does not belong to user {}",
                source_card_id, owner_id
            )));
        }
        if card.currency_kind != quote.from_currency {
            return Err(CoreError::InvalidInput(format!(
                "card {} is denominated in {}, quote sells {}",
                source_card_id, card.currency_kind, quote.from_currency
            )));
        }

        // Crypto sales pay in on-chain; fiat sales are funded straight
        // from the card.
        let payin_address = if quote.from_currency.is_crypto() {
            self.deriver.derive(owner_id, quote.from_currency)?
        } else {
            format!("card:{}", source_card_id)
        };

        let order = ExchangeOrderRecord {
            id: Uuid::new_v4(),
            owner_id,
            from_currency: quote.from_currency,
            to_currency: quote.to_currency,
            from_amount: quote.from_amount,
            quoted_rate: quote.rate,
            expected_to_amount: quote.from_amount * quote.rate,
            status: OrderStatus::Quoted,
            payin_address,
            payout_address: destination_address,
            source_card_id,
            observed_amount: None,
            settled_amount: None,
            flagged: false,
            quote_expires_at: quote.expires_at,
            created_at: now,
            updated_at: now,
        };

        queries::create_order(self.db.pool(), &order).await?;

        info!(
            "Order {} created: {} {} -> {} for user {}",
            order.id, order.from_amount, order.from_currency, order.to_currency, owner_id
        );

        Ok(order)
    }

    // ==========================================
    // PAY-IN OBSERVATION
    // ==========================================

    /// Record a pay-in observation from the payment/chain observer.
    ///
    /// Moves QUOTED → PENDING_PAYIN on first sight and on to
    /// CONFIRMING once enough confirmations accrue. An observed amount
    /// outside the slippage tolerance flags the order but does not
    /// fail it; settlement uses the observed amount.
    pub async fn mark_payin_received(
        &self,
        order_id: Uuid,
        observed_amount: Decimal,
        confirmations: u32,
    ) -> Result<ExchangeOrderRecord, CoreError> {
        if observed_amount <= Decimal::ZERO {
            return Err(CoreError::InvalidInput(
                "observed amount must be positive".to_string(),
            ));
        }

        let mut client = self
            .db
            .pool()
            .get()
            .await
            .map_err(|e| CoreError::Database(e.to_string()))?;
        let tx = client.transaction().await?;

        let lock_sql = format!(
            "SELECT {} FROM exchange_orders WHERE id = $1 FOR UPDATE",
            queries::ORDER_COLUMNS
        );
        let rows = tx.query(lock_sql.as_str(), &[&order_id]).await?;
        let row = rows
            .first()
            .ok_or_else(|| CoreError::NotFound(format!("order {}", order_id)))?;
        let order = queries::row_to_order(row)?;

        let target = if confirmations >= self.config.min_payin_confirmations {
            OrderStatus::Confirming
        } else {
            OrderStatus::PendingPayin
        };

        // Same-state signals just refresh the observation; anything
        // else must be a legal transition.
        let new_status = if order.status == target {
            target
        } else if order.status.can_transition(target) {
            target
        } else {
            return Err(CoreError::InvalidTransition {
                from: order.status,
                to: target,
            });
        };

        let flagged = order.flagged
            || slippage_exceeded(
                order.from_amount,
                observed_amount,
                self.config.slippage_tolerance_pct,
            );
        if flagged && !order.flagged {
            warn!(
                "Order {} pay-in {} deviates from quoted {} beyond tolerance; flagged",
                order_id, observed_amount, order.from_amount
            );
        }

        let update_sql = format!(
            r#"
        UPDATE exchange_orders
        SET status = $2, observed_amount = $3, flagged = $4, updated_at = NOW()
        WHERE id = $1
        RETURNING {}
        "#,
            queries::ORDER_COLUMNS
        );
        let updated_rows = tx
            .query(
                update_sql.as_str(),
                &[
                    &order_id,
                    &new_status.as_str(),
                    &observed_amount,
                    &flagged,
                ],
            )
            .await?;
        let updated = queries::row_to_order(&updated_rows[0])?;

        tx.commit().await?;

        info!(
            "Order {} pay-in observed: {} ({} confirmations) -> {}",
            order_id, observed_amount, confirmations, new_status
        );

        Ok(updated)
    }

    // ==========================================
    // SETTLEMENT
    // ==========================================

    /// Settle a confirming order.
    ///
    /// Re-prices from the current oracle rate when the original quote
    /// has expired, then commits in one transaction: the order's
    /// check-and-set to SETTLED, the debit on the source card, and the
    /// credit on the destination card when the payout address belongs
    /// to a local card (external payouts get only the debit leg).
    ///
    /// Idempotent: settling an already-SETTLED order returns the
    /// stored result and writes nothing.
    ///
    /// ## Returns
    ///
    /// * `Err(CoreError::SettlementFailed)` - Debit failed; the order
    ///   is now FAILED, never left in CONFIRMING
    /// * `Err(CoreError::InvalidTransition)` - Called outside
    ///   CONFIRMING/SETTLED
    pub async fn settle(&self, order_id: Uuid) -> Result<ExchangeOrderRecord, CoreError> {
        let order = queries::get_order(self.db.pool(), order_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("order {}", order_id)))?;

        match order.status {
            OrderStatus::Settled => {
                debug!("Order {} already settled; returning stored result", order_id);
                return Ok(order);
            }
            OrderStatus::Confirming => {}
            other => {
                return Err(CoreError::InvalidTransition {
                    from: other,
                    to: OrderStatus::Settled,
                });
            }
        }

        // Honor the quoted rate while it is live; re-price after
        // expiry. The oracle round trip happens before any lock is
        // taken.
        let rate = if Utc::now() > order.quote_expires_at {
            let timeout = Duration::from_millis(self.config.rate_oracle_timeout_ms);
            let fresh = fetch_rate(
                self.oracle.as_ref(),
                order.from_currency,
                order.to_currency,
                timeout,
            )
            .await?;
            info!(
                "Order {} quote expired; re-priced at {} (was {})",
                order_id, fresh, order.quoted_rate
            );
            fresh
        } else {
            order.quoted_rate
        };

        let pay_amount = order.observed_amount.unwrap_or(order.from_amount);
        let payout_amount = pay_amount * rate;

        let destination_card = self
            .resolve_destination(&order.payout_address, order.to_currency)
            .await?;

        let mut client = self
            .db
            .pool()
            .get()
            .await
            .map_err(|e| CoreError::Database(e.to_string()))?;
        let tx = client.transaction().await?;

        // Re-check under the order row lock; a concurrent settle may
        // have won.
        let rows = tx
            .query(
                "SELECT status FROM exchange_orders WHERE id = $1 FOR UPDATE",
                &[&order_id],
            )
            .await?;
        let status_text: String = rows
            .first()
            .ok_or_else(|| CoreError::NotFound(format!("order {}", order_id)))?
            .get("status");
        let locked_status = OrderStatus::parse(&status_text)
            .ok_or_else(|| CoreError::Database(format!("corrupt order status '{}'", status_text)))?;

        match locked_status {
            OrderStatus::Settled => {
                drop(tx);
                let settled = queries::get_order(self.db.pool(), order_id)
                    .await?
                    .ok_or_else(|| CoreError::NotFound(format!("order {}", order_id)))?;
                return Ok(settled);
            }
            OrderStatus::Confirming => {}
            other => {
                return Err(CoreError::InvalidTransition {
                    from: other,
                    to: OrderStatus::Settled,
                });
            }
        }

        let mut card_ids = vec![order.source_card_id];
        if let Some(card) = &destination_card {
            card_ids.push(card.id);
        }
        BalanceLedger::lock_cards(&tx, &card_ids).await?;

        // Debit leg. A shortfall fails the order, not the invariant.
        let debit = BalanceLedger::apply_in(
            &tx,
            order.source_card_id,
            -pay_amount,
            LedgerReason::ExchangeSettlement,
            order.owner_id,
            Some(order_id),
        )
        .await;

        if let Err(err) = debit {
            drop(tx);
            match err {
                CoreError::InsufficientFunds { .. } => {
                    self.mark_failed(order_id).await?;
                    error!("Order {} settlement debit failed: {}", order_id, err);
                    return Err(CoreError::SettlementFailed {
                        order_id,
                        reason: err.to_string(),
                    });
                }
                other => return Err(other),
            }
        }

        // Credit leg, only for internal destinations.
        if let Some(card) = &destination_card {
            BalanceLedger::apply_in(
                &tx,
                card.id,
                payout_amount,
                LedgerReason::ExchangeSettlement,
                order.owner_id,
                Some(order_id),
            )
            .await?;
        }

        let settle_sql = format!(
            r#"
        UPDATE exchange_orders
        SET status = 'settled', settled_amount = $2, updated_at = NOW()
        WHERE id = $1
        RETURNING {}
        "#,
            queries::ORDER_COLUMNS
        );
        let updated_rows = tx
            .query(settle_sql.as_str(), &[&order_id, &payout_amount])
            .await?;
        let settled = queries::row_to_order(&updated_rows[0])?;

        tx.commit().await?;

        info!(
            "Order {} settled: debited {} {}, payout {} {} ({})",
            order_id,
            pay_amount,
            order.from_currency,
            payout_amount,
            order.to_currency,
            if destination_card.is_some() {
                "internal credit"
            } else {
                "external payout"
            }
        );

        Ok(settled)
    }

    /// Resolve a payout destination to a local card, if it is one.
    ///
    /// Three accepted forms:
    /// - `card:<uuid>` referencing a local card in the target currency
    ///   (the only form fiat payouts can take)
    /// - a local card's derived receive address in the target currency
    /// - an external on-chain address of plausible shape, which gets
    ///   no local credit leg
    async fn resolve_destination(
        &self,
        payout_address: &str,
        to_currency: CurrencyKind,
    ) -> Result<Option<CardRecord>, CoreError> {
        if let Some(id_text) = payout_address.strip_prefix("card:") {
            let card_id = Uuid::parse_str(id_text).map_err(|_| {
                CoreError::InvalidInput(format!(
                    "malformed card destination '{}'",
                    payout_address
                ))
            })?;
            let card = queries::get_card(self.db.pool(), card_id)
                .await?
                .ok_or_else(|| CoreError::NotFound(format!("destination card {}", card_id)))?;
            if card.currency_kind != to_currency {
                return Err(CoreError::InvalidInput(format!(
                    "destination card {} is denominated in {}, order pays out {}",
                    card_id, card.currency_kind, to_currency
                )));
            }
            return Ok(Some(card));
        }

        if let Some(card) = queries::get_card_by_receive_address(
            self.db.pool(),
            payout_address,
            to_currency,
        )
        .await?
        {
            return Ok(Some(card));
        }

        if !crate::utils::is_plausible_address(payout_address, to_currency) {
            return Err(CoreError::InvalidInput(format!(
                "'{}' is not a usable {} destination",
                payout_address, to_currency
            )));
        }

        Ok(None)
    }

    /// Move a confirming order to FAILED after a settlement shortfall.
    async fn mark_failed(&self, order_id: Uuid) -> Result<(), CoreError> {
        let client = self
            .db
            .pool()
            .get()
            .await
            .map_err(|e| CoreError::Database(e.to_string()))?;

        client
            .execute(
                r#"
        UPDATE exchange_orders
        SET status = 'failed', updated_at = NOW()
        WHERE id = $1 AND status = 'confirming'
        "#,
                &[&order_id],
            )
            .await?;

        Ok(())
    }

    // ==========================================
    // EXPIRY
    // ==========================================

    /// Expire a quoted order whose deadline has passed.
    ///
    /// No ledger effect. Expiring an already-expired order is a no-op.
    pub async fn expire(&self, order_id: Uuid) -> Result<ExchangeOrderRecord, CoreError> {
        let mut client = self
            .db
            .pool()
            .get()
            .await
            .map_err(|e| CoreError::Database(e.to_string()))?;
        let tx = client.transaction().await?;

        let lock_sql = format!(
            "SELECT {} FROM exchange_orders WHERE id = $1 FOR UPDATE",
            queries::ORDER_COLUMNS
        );
        let rows = tx.query(lock_sql.as_str(), &[&order_id]).await?;
        let row = rows
            .first()
            .ok_or_else(|| CoreError::NotFound(format!("order {}", order_id)))?;
        let order = queries::row_to_order(row)?;

        match order.status {
            OrderStatus::Expired => {
                drop(tx);
                return Ok(order);
            }
            OrderStatus::Quoted => {}
            other => {
                return Err(CoreError::InvalidTransition {
                    from: other,
                    to: OrderStatus::Expired,
                });
            }
        }

        if Utc::now() < order.quote_expires_at {
            return Err(CoreError::InvalidInput(format!(
                "quote is valid until {}",
                order.quote_expires_at
            )));
        }

        let expire_sql = format!(
            r#"
        UPDATE exchange_orders
        SET status = 'expired', updated_at = NOW()
        WHERE id = $1
        RETURNING {}
        "#,
            queries::ORDER_COLUMNS
        );
        let updated_rows = tx.query(expire_sql.as_str(), &[&order_id]).await?;
        let expired = queries::row_to_order(&updated_rows[0])?;

        tx.commit().await?;

        info!("Order {} expired", order_id);
        Ok(expired)
    }

    /// Get an order snapshot by ID.
    pub async fn get_order(&self, order_id: Uuid) -> Result<ExchangeOrderRecord, CoreError> {
        queries::get_order(self.db.pool(), order_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("order {}", order_id)))
    }

    /// Run the background expiry sweep.
    ///
    /// Periodically transitions every overdue QUOTED order to EXPIRED.
    /// Spawn this from startup:
    ///
    /// ```rust,ignore
    /// let machine = machine.clone();
    /// tokio::spawn(async move { machine.start_expiry_sweep().await });
    /// ```
    pub async fn start_expiry_sweep(&self) {
        info!(
            "Starting order expiry sweep (interval: {}s)",
            self.config.expiry_sweep_interval
        );

        let mut ticker = interval(Duration::from_secs(self.config.expiry_sweep_interval));

        loop {
            ticker.tick().await;

            if let Err(e) = queries::expire_overdue_orders(self.db.pool()).await {
                error!("Expiry sweep failed: {}", e);
            }
        }
    }
}

// ============================================
// PURE HELPERS
// ============================================

/// Validate a currency pair and amount for quoting.
fn validate_pair(
    from: CurrencyKind,
    to: CurrencyKind,
    amount: Decimal,
) -> Result<(), CoreError> {
    if from == to {
        return Err(CoreError::InvalidInput(format!(
            "cannot exchange {} for itself",
            from
        )));
    }
    if amount <= Decimal::ZERO {
        return Err(CoreError::InvalidInput(format!(
            "amount must be positive, got {}",
            amount
        )));
    }
    Ok(())
}

/// One oracle round trip under a caller-supplied timeout.
///
/// Timeouts and oracle errors both collapse to rate-unavailable; no
/// state is created either way.
async fn fetch_rate(
    oracle: &dyn RateOracle,
    from: CurrencyKind,
    to: CurrencyKind,
    timeout: Duration,
) -> Result<Decimal, CoreError> {
    match tokio::time::timeout(timeout, oracle.get_rate(from, to)).await {
        Ok(Ok(quote)) => Ok(quote.rate),
        Ok(Err(e)) => Err(CoreError::RateUnavailable {
            from,
            to,
            reason: e.to_string(),
        }),
        Err(_) => Err(CoreError::RateUnavailable {
            from,
            to,
            reason: format!("oracle timed out after {:?}", timeout),
        }),
    }
}

/// Build a quote from a fresh oracle rate.
async fn build_quote(
    oracle: &dyn RateOracle,
    from: CurrencyKind,
    to: CurrencyKind,
    from_amount: Decimal,
    timeout: Duration,
    ttl_secs: i64,
) -> Result<Quote, CoreError> {
    validate_pair(from, to, from_amount)?;

    let rate = fetch_rate(oracle, from, to, timeout).await?;

    Ok(Quote {
        from_currency: from,
        to_currency: to,
        from_amount,
        rate,
        expected_to_amount: from_amount * rate,
        expires_at: Utc::now() + chrono::Duration::seconds(ttl_secs),
    })
}

/// Whether an observed pay-in deviates from the quoted amount by more
/// than `tolerance_pct` percent.
fn slippage_exceeded(quoted: Decimal, observed: Decimal, tolerance_pct: Decimal) -> bool {
    if quoted.is_zero() {
        return true;
    }
    let deviation = (observed - quoted).abs() / quoted * Decimal::ONE_HUNDRED;
    deviation > tolerance_pct
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{OracleError, RateQuote};
    use async_trait::async_trait;
    use rust_decimal_macros::dec;

    /// Oracle stub answering a fixed rate.
    struct StaticOracle {
        rate: Decimal,
    }

    #[async_trait]
    impl RateOracle for StaticOracle {
        async fn get_rate(
            &self,
            _from: CurrencyKind,
            _to: CurrencyKind,
        ) -> Result<RateQuote, OracleError> {
            Ok(RateQuote {
                rate: self.rate,
                timestamp: Utc::now(),
            })
        }
    }

    /// Oracle stub that always fails.
    struct DownOracle;

    #[async_trait]
    impl RateOracle for DownOracle {
        async fn get_rate(
            &self,
            _from: CurrencyKind,
            _to: CurrencyKind,
        ) -> Result<RateQuote, OracleError> {
            Err(OracleError::Status(502))
        }
    }

    /// Oracle stub that never answers in time.
    struct SlowOracle;

    #[async_trait]
    impl RateOracle for SlowOracle {
        async fn get_rate(
            &self,
            _from: CurrencyKind,
            _to: CurrencyKind,
        ) -> Result<RateQuote, OracleError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            unreachable!("the caller's timeout fires first")
        }
    }

    #[tokio::test]
    async fn test_quote_prices_from_oracle_rate() {
        let oracle = StaticOracle { rate: dec!(15.0) };
        let quote = build_quote(
            &oracle,
            CurrencyKind::Btc,
            CurrencyKind::Eth,
            dec!(1.0),
            Duration::from_secs(1),
            120,
        )
        .await
        .unwrap();

        assert_eq!(quote.rate, dec!(15.0));
        assert_eq!(quote.expected_to_amount, dec!(15.0));
        assert!(quote.expires_at > Utc::now());
    }

    #[tokio::test]
    async fn test_oracle_failure_becomes_rate_unavailable() {
        let err = build_quote(
            &DownOracle,
            CurrencyKind::Btc,
            CurrencyKind::Eth,
            dec!(1.0),
            Duration::from_secs(1),
            120,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, CoreError::RateUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_oracle_timeout_becomes_rate_unavailable() {
        let err = build_quote(
            &SlowOracle,
            CurrencyKind::Btc,
            CurrencyKind::Eth,
            dec!(1.0),
            Duration::from_millis(10),
            120,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, CoreError::RateUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_quote_rejects_bad_pairs() {
        let oracle = StaticOracle { rate: dec!(1.0) };

        let same = build_quote(
            &oracle,
            CurrencyKind::Btc,
            CurrencyKind::Btc,
            dec!(1.0),
            Duration::from_secs(1),
            120,
        )
        .await;
        assert!(matches!(same, Err(CoreError::InvalidInput(_))));

        let zero = build_quote(
            &oracle,
            CurrencyKind::Btc,
            CurrencyKind::Eth,
            Decimal::ZERO,
            Duration::from_secs(1),
            120,
        )
        .await;
        assert!(matches!(zero, Err(CoreError::InvalidInput(_))));
    }

    #[test]
    fn test_slippage_tolerance() {
        let tolerance = dec!(1.0);

        // Within 1%
        assert!(!slippage_exceeded(dec!(1.0), dec!(1.0), tolerance));
        assert!(!slippage_exceeded(dec!(1.0), dec!(1.005), tolerance));
        assert!(!slippage_exceeded(dec!(1.0), dec!(0.995), tolerance));

        // Beyond 1%, either direction
        assert!(slippage_exceeded(dec!(1.0), dec!(1.02), tolerance));
        assert!(slippage_exceeded(dec!(1.0), dec!(0.98), tolerance));
    }

    #[test]
    fn test_validate_pair() {
        assert!(validate_pair(CurrencyKind::Usd, CurrencyKind::Btc, dec!(100)).is_ok());
        assert!(validate_pair(CurrencyKind::Eth, CurrencyKind::Eth, dec!(1)).is_err());
        assert!(validate_pair(CurrencyKind::Btc, CurrencyKind::Eth, dec!(-1)).is_err());
    }
}
