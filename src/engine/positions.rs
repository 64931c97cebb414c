use crate::engine::{
    error::EngineError, history::HistoryLedger, standings::StandingTracker, structures::partition_key::PartitionKey
};
use chrono::{DateTime, FixedOffset};
use tracing::debug;

/// Re-sorts one partition by points and reassigns dense positions 1..N over
/// its active standings.
///
/// Ties break on ascending competitor id, which keeps the ordering
/// deterministic regardless of insertion order. Only rows whose position
/// changed are written; each changed standing's latest history transition is
/// reconciled with the true new position.
///
/// Must run after all points-mutating writes of the current batch.
pub fn recalculate(
    tracker: &mut StandingTracker,
    ledger: &mut HistoryLedger,
    partition: &PartitionKey,
    now: DateTime<FixedOffset>
) -> Result<usize, EngineError> {
    let mut ordered: Vec<(i32, f64, i32)> = tracker
        .active_in_partition(partition)
        .iter()
        .map(|s| (s.competitor_id, s.points, s.position))
        .collect();

    for (competitor_id, points, _) in &ordered {
        if !points.is_finite() {
            return Err(EngineError::computation(format!(
                "standing for competitor {} in {} has non-finite points",
                competitor_id, partition
            )));
        }
    }

    ordered.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });

    let mut changed = 0;
    for (index, (competitor_id, _, old_position)) in ordered.iter().enumerate() {
        let new_position = index as i32 + 1;
        if new_position == *old_position {
            continue;
        }

        tracker.set_position(*competitor_id, partition, new_position, now);
        ledger.reconcile_latest(*competitor_id, partition, new_position);
        changed += 1;
    }

    debug!("Recalculated {}: {} of {} positions changed", partition, changed, ordered.len());
    Ok(changed)
}
