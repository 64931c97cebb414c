use crate::engine::{
    constants::{DECAY_FACTOR, DECAY_INACTIVE_MONTHS},
    error::EngineError,
    history::HistoryLedger,
    positions,
    standings::StandingTracker,
    structures::{batch_result::BatchResult, partition_key::PartitionKey, transition_reason::TransitionReason}
};
use chrono::{DateTime, FixedOffset, Months};
use itertools::Itertools;
use std::collections::HashSet;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy)]
pub struct DecayConfig {
    pub factor: f64,
    pub inactive_months: u32
}

impl Default for DecayConfig {
    fn default() -> Self {
        DecayConfig {
            factor: DECAY_FACTOR,
            inactive_months: DECAY_INACTIVE_MONTHS
        }
    }
}

/// Full report of one decay sweep: per-standing discount outcomes plus the
/// partition recalculations that followed.
pub struct DecaySweepReport {
    pub discounts: BatchResult<(i32, PartitionKey)>,
    pub recalculated: Vec<PartitionKey>,
    pub failed_partitions: Vec<(PartitionKey, EngineError)>
}

impl DecaySweepReport {
    /// Competitors whose points decayed, deduplicated, for inactivity
    /// notifications.
    pub fn affected_competitors(&self) -> Vec<i32> {
        self.discounts
            .succeeded
            .iter()
            .map(|(competitor_id, _)| *competitor_id)
            .unique()
            .collect()
    }
}

/// Discounts every active standing that has seen no tournament since the
/// cutoff (`now` minus the configured months), then recalculates each touched
/// partition once.
///
/// Best-effort: a failing standing is logged and skipped, the sweep
/// continues. This is deliberately weaker than the all-or-nothing fan-out of
/// a single tournament.
pub fn run_decay_sweep(
    tracker: &mut StandingTracker,
    ledger: &mut HistoryLedger,
    now: DateTime<FixedOffset>,
    config: DecayConfig
) -> DecaySweepReport {
    // An incomputable cutoff must skip the sweep; falling back to `now`
    // would make every active standing eligible.
    let Some(cutoff) = now.checked_sub_months(Months::new(config.inactive_months)) else {
        warn!(
            "Cannot compute decay cutoff {} months before {}, skipping sweep",
            config.inactive_months, now
        );
        return DecaySweepReport {
            discounts: BatchResult::new(),
            recalculated: Vec::new(),
            failed_partitions: Vec::new()
        };
    };

    let eligible: Vec<(i32, PartitionKey)> = tracker
        .standings()
        .filter(|s| s.is_active)
        .filter(|s| s.last_tournament_date.map(|d| d < cutoff).unwrap_or(false))
        .map(|s| (s.competitor_id, s.partition))
        .collect();

    info!(
        "Decay sweep: {} standings inactive since {}",
        eligible.len(),
        cutoff.date_naive()
    );

    let mut discounts = BatchResult::new();
    let mut touched: Vec<PartitionKey> = Vec::new();
    let mut touched_set = HashSet::new();

    for (competitor_id, partition) in eligible {
        match tracker.discount(competitor_id, partition, config.factor, now) {
            Ok(delta) => {
                ledger.append(&delta, TransitionReason::Decay, None, now);
                if touched_set.insert(partition) {
                    touched.push(partition);
                }
                discounts.record((competitor_id, partition), Ok(()));
            }
            Err(e) => {
                warn!(
                    "Skipping decay for competitor {} in {}: {}",
                    competitor_id, partition, e
                );
                discounts.record((competitor_id, partition), Err(e));
            }
        }
    }

    // Second phase: one recalculation per distinct partition, after all
    // discounts have been applied.
    let mut recalculated = Vec::new();
    let mut failed_partitions = Vec::new();
    for partition in touched {
        match positions::recalculate(tracker, ledger, &partition, now) {
            Ok(_) => recalculated.push(partition),
            Err(e) => {
                warn!("Recalculation failed for {}: {}", partition, e);
                failed_partitions.push((partition, e));
            }
        }
    }

    DecaySweepReport {
        discounts,
        recalculated,
        failed_partitions
    }
}
