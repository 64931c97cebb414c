use crate::engine::{
    standings::StandingDelta,
    structures::{
        partition_key::PartitionKey, ranking_category::RankingCategory, ranking_type::RankingType,
        transition_reason::TransitionReason
    }
};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Identity of an appended transition, returned so the position recalculator
/// can reconcile the exact row it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransitionId(pub i64);

/// Append-only audit row for one standing mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandingTransition {
    pub id: TransitionId,
    pub competitor_id: i32,
    pub partition: PartitionKey,
    pub old_position: Option<i32>,
    pub new_position: i32,
    pub old_points: f64,
    pub new_points: f64,
    pub points_change: f64,
    pub position_change: i32,
    pub reason: TransitionReason,
    pub tournament_id: Option<i32>,
    pub change_date: DateTime<FixedOffset>
}

/// Restore point for one unsaved batch; see [`HistoryLedger::rollback`].
pub struct LedgerCheckpoint {
    len: usize,
    next_id: i64,
    latest: HashMap<(i32, PartitionKey), TransitionId>
}

/// Append-only ledger of standing transitions.
///
/// Persisted rows are immutable. Within the current unsaved batch, the most
/// recently appended row per standing may be patched with the true new
/// position once recalculation has run; the ledger tracks that row by id, so
/// reconciliation never relies on matching `(old_position, ...)` tuples.
/// `mark_saved` seals the batch, after which its rows can no longer be
/// reconciled.
#[derive(Default)]
pub struct HistoryLedger {
    transitions: Vec<StandingTransition>,
    // Reconciliation targets of the current unsaved batch only.
    latest: HashMap<(i32, PartitionKey), TransitionId>,
    next_id: i64,
    // Everything before this index has been persisted.
    saved_watermark: usize
}

impl HistoryLedger {
    pub fn new() -> HistoryLedger {
        HistoryLedger {
            transitions: Vec::new(),
            latest: HashMap::new(),
            next_id: 1,
            saved_watermark: 0
        }
    }

    /// Transitions appended (or reconciled) since the last `mark_saved`.
    pub fn unsaved(&self) -> &[StandingTransition] {
        &self.transitions[self.saved_watermark..]
    }

    /// Seals the current batch: its rows count as persisted and are no longer
    /// reconciliation targets.
    pub fn mark_saved(&mut self) {
        self.saved_watermark = self.transitions.len();
        self.latest.clear();
    }

    pub fn checkpoint(&self) -> LedgerCheckpoint {
        LedgerCheckpoint {
            len: self.transitions.len(),
            next_id: self.next_id,
            latest: self.latest.clone()
        }
    }

    /// Discards every transition appended since `checkpoint` and restores the
    /// reconciliation targets of that moment. Used when a batch's database
    /// transaction fails after the in-memory writes were applied.
    pub fn rollback(&mut self, checkpoint: LedgerCheckpoint) {
        self.transitions.truncate(checkpoint.len);
        self.next_id = checkpoint.next_id;
        self.latest = checkpoint.latest;
    }

    /// Appends a transition built from a points mutation. The new position is
    /// provisionally the old one (or 1 for a brand-new standing) until
    /// recalculation reconciles it.
    pub fn append(
        &mut self,
        delta: &StandingDelta,
        reason: TransitionReason,
        tournament_id: Option<i32>,
        change_date: DateTime<FixedOffset>
    ) -> TransitionId {
        let id = TransitionId(self.next_id);
        self.next_id += 1;

        let provisional_position = delta.old_position.unwrap_or(1);
        self.transitions.push(StandingTransition {
            id,
            competitor_id: delta.competitor_id,
            partition: delta.partition,
            old_position: delta.old_position,
            new_position: provisional_position,
            old_points: delta.old_points,
            new_points: delta.new_points,
            points_change: delta.new_points - delta.old_points,
            position_change: 0,
            reason,
            tournament_id,
            change_date
        });
        self.latest.insert((delta.competitor_id, delta.partition), id);

        id
    }

    /// Patches the standing's most recent transition of the current unsaved
    /// batch with its true post-recalculation position. No-op when the batch
    /// holds no transition for the standing; in particular, a standing whose
    /// position shifts without a points mutation gets no history patch, and
    /// persisted rows are never rewritten.
    pub fn reconcile_latest(&mut self, competitor_id: i32, partition: &PartitionKey, new_position: i32) {
        let Some(id) = self.latest.get(&(competitor_id, *partition)).copied() else {
            return;
        };

        if let Some(transition) = self.transitions.iter_mut().find(|t| t.id == id) {
            transition.new_position = new_position;
            transition.position_change = match transition.old_position {
                Some(old) => new_position - old,
                None => 0
            };
        }
    }

    /// Newest-first history for a competitor, optionally narrowed to one
    /// ranking type or category.
    pub fn history_for_competitor(
        &self,
        competitor_id: i32,
        ranking_type: Option<RankingType>,
        category: Option<RankingCategory>,
        limit: usize
    ) -> Vec<StandingTransition> {
        self.transitions
            .iter()
            .rev()
            .filter(|t| t.competitor_id == competitor_id)
            .filter(|t| ranking_type.is_none() || Some(t.partition.ranking_type) == ranking_type)
            .filter(|t| category.is_none() || Some(t.partition.category) == category)
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn transitions(&self) -> &[StandingTransition] {
        &self.transitions
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::structures::ranking_type::RankingType;
    use approx::assert_abs_diff_eq;
    use chrono::Utc;

    fn delta(competitor_id: i32, old_points: f64, new_points: f64, old_position: Option<i32>) -> StandingDelta {
        StandingDelta {
            competitor_id,
            partition: PartitionKey::national(RankingType::Overall),
            old_position,
            old_points,
            new_points
        }
    }

    #[test]
    fn test_append_is_monotonic() {
        let mut ledger = HistoryLedger::new();
        let now = Utc::now().fixed_offset();

        let a = ledger.append(&delta(1, 0.0, 100.0, None), TransitionReason::TournamentCompletion, Some(1), now);
        let b = ledger.append(&delta(1, 100.0, 150.0, Some(3)), TransitionReason::TournamentCompletion, Some(2), now);

        assert!(b.0 > a.0);
        assert_eq!(ledger.len(), 2);
        assert_abs_diff_eq!(ledger.transitions()[1].points_change, 50.0);
    }

    #[test]
    fn test_reconcile_patches_only_latest_row() {
        let mut ledger = HistoryLedger::new();
        let now = Utc::now().fixed_offset();
        let partition = PartitionKey::national(RankingType::Overall);

        ledger.append(&delta(1, 0.0, 100.0, None), TransitionReason::TournamentCompletion, Some(1), now);
        ledger.append(&delta(1, 100.0, 150.0, Some(4)), TransitionReason::TournamentCompletion, Some(2), now);

        ledger.reconcile_latest(1, &partition, 2);

        let rows = ledger.transitions();
        // First row untouched
        assert_eq!(rows[0].new_position, 1);
        assert_eq!(rows[0].position_change, 0);
        // Latest row reconciled: moved from 4 to 2
        assert_eq!(rows[1].new_position, 2);
        assert_eq!(rows[1].position_change, -2);
    }

    #[test]
    fn test_reconcile_without_history_is_noop() {
        let mut ledger = HistoryLedger::new();
        ledger.reconcile_latest(1, &PartitionKey::national(RankingType::Overall), 5);
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_reconcile_never_rewrites_saved_rows() {
        let mut ledger = HistoryLedger::new();
        let now = Utc::now().fixed_offset();
        let partition = PartitionKey::national(RankingType::Overall);

        ledger.append(&delta(1, 0.0, 100.0, Some(2)), TransitionReason::TournamentCompletion, Some(1), now);
        ledger.mark_saved();

        // A later sweep re-ranks the standing without a points mutation
        ledger.reconcile_latest(1, &partition, 1);

        assert_eq!(ledger.transitions()[0].new_position, 2);
        assert_eq!(ledger.transitions()[0].position_change, 0);
        assert!(ledger.unsaved().is_empty());
    }

    #[test]
    fn test_rollback_discards_unsaved_batch() {
        let mut ledger = HistoryLedger::new();
        let now = Utc::now().fixed_offset();
        let partition = PartitionKey::national(RankingType::Overall);

        ledger.append(&delta(1, 0.0, 100.0, None), TransitionReason::TournamentCompletion, Some(1), now);
        ledger.mark_saved();

        let checkpoint = ledger.checkpoint();
        ledger.append(&delta(1, 100.0, 150.0, Some(1)), TransitionReason::TournamentCompletion, Some(2), now);
        ledger.rollback(checkpoint);

        assert_eq!(ledger.len(), 1);
        assert!(ledger.unsaved().is_empty());
        // The discarded batch's ids are reclaimed
        let id = ledger.append(&delta(1, 100.0, 150.0, Some(1)), TransitionReason::TournamentCompletion, Some(2), now);
        assert_eq!(id.0, 2);
    }

    #[test]
    fn test_history_newest_first_with_limit() {
        let mut ledger = HistoryLedger::new();
        let now = Utc::now().fixed_offset();

        for i in 0..5 {
            ledger.append(
                &delta(1, i as f64, (i + 1) as f64, Some(1)),
                TransitionReason::TournamentCompletion,
                Some(i),
                now
            );
        }

        let history = ledger.history_for_competitor(1, None, None, 3);
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].tournament_id, Some(4));
        assert_eq!(history[2].tournament_id, Some(2));
    }

    #[test]
    fn test_history_filters_by_ranking_type() {
        let mut ledger = HistoryLedger::new();
        let now = Utc::now().fixed_offset();

        ledger.append(&delta(1, 0.0, 10.0, None), TransitionReason::TournamentCompletion, Some(1), now);
        let mut singles = delta(1, 0.0, 10.0, None);
        singles.partition = PartitionKey::national(RankingType::Singles);
        ledger.append(&singles, TransitionReason::TournamentCompletion, Some(1), now);

        let history = ledger.history_for_competitor(1, Some(RankingType::Singles), None, 10);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].partition.ranking_type, RankingType::Singles);
    }
}
