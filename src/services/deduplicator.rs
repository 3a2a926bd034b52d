//! # Asset Deduplicator Service
//!
//! Maintenance pass over the minted-asset table: collapses duplicate
//! records sharing a `token_id` down to one canonical row each. Runs
//! on its own schedule, never during request handling.
//!
//! ## Pass Flow
//!
//! ```text
//! 1. Snapshot all rows (plain read, no locks)
//!               ↓
//! 2. Group by token_id in memory
//!               ↓
//! 3. Per group: survivor = latest minted_at (ties: greatest id)
//!               ↓
//! 4. Delete the losers, group by group, retrying with backoff
//! ```
//!
//! Deletes are scoped strictly to ids captured in the snapshot minus
//! each group's survivor. A row minted while the pass runs is either
//! outside the snapshot (untouchable) or inside it and possibly the
//! survivor; either way it cannot be deleted out from under the
//! minting subsystem. Re-running on a clean table removes nothing.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::interval;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::db::models::MintedAssetRecord;
use crate::db::{queries, Database};
use crate::error::CoreError;

/// Initial backoff before retrying a failed group delete.
const RETRY_BASE_DELAY: Duration = Duration::from_millis(100);

/// Outcome of one deduplication pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DedupReport {
    /// Rows in the snapshot.
    pub scanned: u64,
    /// Distinct token ids (one survivor each).
    pub retained: u64,
    /// Duplicate rows deleted.
    pub removed: u64,
}

/// Planned work for one duplicate group.
#[derive(Debug, Clone)]
struct GroupPlan {
    token_id: String,
    losers: Vec<Uuid>,
}

/// The minted-asset deduplicator.
///
/// ## Usage
///
/// ```rust,ignore
/// let deduper = AssetDeduplicator::new(db, config);
///
/// // One-shot pass
/// let report = deduper.run_pass().await?;
///
/// // Or on a schedule
/// tokio::spawn(async move { deduper.start_dedup_loop().await });
/// ```
#[derive(Clone)]
pub struct AssetDeduplicator {
    /// Database connection.
    db: Database,

    /// Application configuration.
    config: AppConfig,
}

impl AssetDeduplicator {
    /// Create a new AssetDeduplicator instance.
    pub fn new(db: Database, config: AppConfig) -> Self {
        Self { db, config }
    }

    /// Run one deduplication pass.
    ///
    /// A single group's delete failing (after retries) is logged and
    /// skipped; the pass continues with the remaining groups.
    pub async fn run_pass(&self) -> Result<DedupReport, CoreError> {
        info!("Starting minted-asset deduplication pass");

        let snapshot = queries::snapshot_minted_assets(self.db.pool()).await?;
        let scanned = snapshot.len() as u64;
        let plans = plan_groups(snapshot);
        let retained = plans.len() as u64;

        let mut removed = 0u64;
        for plan in &plans {
            if plan.losers.is_empty() {
                continue;
            }

            match self.delete_with_retry(plan).await {
                Ok(n) => removed += n,
                Err(e) => {
                    // One group's failure never aborts the pass.
                    warn!(
                        "Giving up on duplicate group '{}' this pass: {}",
                        plan.token_id, e
                    );
                }
            }
        }

        let report = DedupReport {
            scanned,
            retained,
            removed,
        };

        info!(
            "Deduplication pass complete: scanned={} retained={} removed={}",
            report.scanned, report.retained, report.removed
        );

        Ok(report)
    }

    /// Delete one group's losers, retrying with exponential backoff.
    async fn delete_with_retry(&self, plan: &GroupPlan) -> Result<u64, CoreError> {
        let mut delay = RETRY_BASE_DELAY;
        let mut attempt = 0u32;

        loop {
            match queries::delete_minted_assets(self.db.pool(), &plan.losers).await {
                Ok(n) => {
                    debug!(
                        "Removed {} duplicate rows for token '{}'",
                        n, plan.token_id
                    );
                    return Ok(n);
                }
                Err(e) if attempt < self.config.dedup_max_retries => {
                    attempt += 1;
                    warn!(
                        "Delete for token '{}' failed (attempt {}): {}; retrying in {:?}",
                        plan.token_id, attempt, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Run the deduplication pass on a schedule.
    pub async fn start_dedup_loop(&self) {
        info!(
            "Starting deduplication loop (interval: {}s)",
            self.config.dedup_interval
        );

        let mut ticker = interval(Duration::from_secs(self.config.dedup_interval));

        loop {
            ticker.tick().await;

            if let Err(e) = self.run_pass().await {
                error!("Deduplication pass failed: {}", e);
            }
        }
    }
}

/// Group a snapshot by token id and pick each group's survivor.
///
/// Survivor: the row with the latest `minted_at`; ties broken by the
/// greatest id, which is deterministic for any fixed row set. The
/// survivor is excluded from the losers, so it can never be deleted.
fn plan_groups(snapshot: Vec<MintedAssetRecord>) -> Vec<GroupPlan> {
    let mut groups: HashMap<String, Vec<MintedAssetRecord>> = HashMap::new();
    for asset in snapshot {
        groups.entry(asset.token_id.clone()).or_default().push(asset);
    }

    let mut plans = Vec::with_capacity(groups.len());
    for (token_id, mut rows) in groups {
        // Survivor sorts last
        rows.sort_by(|a, b| {
            a.minted_at
                .cmp(&b.minted_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        let survivor = rows.pop().expect("every group has at least one row");

        plans.push(GroupPlan {
            token_id,
            losers: rows.iter().map(|r| r.id).collect(),
        });

        debug_assert!(!plans
            .last()
            .unwrap()
            .losers
            .contains(&survivor.id));
    }

    plans
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};

    fn asset(token_id: &str, minted_offset_secs: i64) -> MintedAssetRecord {
        MintedAssetRecord {
            id: Uuid::new_v4(),
            token_id: token_id.to_string(),
            owner_id: 1,
            minted_at: Utc::now() + ChronoDuration::seconds(minted_offset_secs),
        }
    }

    #[test]
    fn test_latest_mint_survives() {
        let oldest = asset("T", -30);
        let middle = asset("T", -20);
        let latest = asset("T", -10);
        let latest_id = latest.id;

        let plans = plan_groups(vec![middle.clone(), latest, oldest.clone()]);
        assert_eq!(plans.len(), 1);

        let plan = &plans[0];
        assert_eq!(plan.losers.len(), 2);
        assert!(!plan.losers.contains(&latest_id));
        assert!(plan.losers.contains(&oldest.id));
        assert!(plan.losers.contains(&middle.id));
    }

    #[test]
    fn test_timestamp_ties_break_on_greatest_id() {
        let at = Utc::now();
        let mut a = asset("T", 0);
        let mut b = asset("T", 0);
        a.minted_at = at;
        b.minted_at = at;

        let survivor_id = a.id.max(b.id);
        let loser_id = a.id.min(b.id);

        let plans = plan_groups(vec![a, b]);
        assert_eq!(plans[0].losers, vec![loser_id]);
        assert!(!plans[0].losers.contains(&survivor_id));
    }

    #[test]
    fn test_unique_tokens_are_untouched() {
        let plans = plan_groups(vec![asset("A", 0), asset("B", 0), asset("C", 0)]);
        assert_eq!(plans.len(), 3);
        assert!(plans.iter().all(|p| p.losers.is_empty()));
    }

    #[test]
    fn test_second_pass_is_a_no_op() {
        let keep_a = asset("A", 0);
        let keep_b = asset("B", 5);
        let dup_b = asset("B", -5);

        let first = plan_groups(vec![keep_a.clone(), keep_b.clone(), dup_b]);
        let removed: u64 = first.iter().map(|p| p.losers.len() as u64).sum();
        assert_eq!(removed, 1);

        // The table after the first pass: survivors only
        let second = plan_groups(vec![keep_a, keep_b]);
        assert!(second.iter().all(|p| p.losers.is_empty()));
    }

    #[test]
    fn test_empty_snapshot() {
        assert!(plan_groups(Vec::new()).is_empty());
    }

    #[test]
    fn test_losers_are_scoped_to_the_snapshot() {
        let in_snapshot = vec![asset("T", -10), asset("T", 0)];
        let snapshot_ids: Vec<Uuid> = in_snapshot.iter().map(|a| a.id).collect();

        let plans = plan_groups(in_snapshot);
        for plan in plans {
            for loser in plan.losers {
                assert!(snapshot_ids.contains(&loser));
            }
        }
    }
}
