use crate::{
    database::db_structs::{Competitor, CompetitorResult, Tournament},
    engine::{
        error::EngineError,
        history::{HistoryLedger, LedgerCheckpoint},
        partitions::{derive_partitions, CompetitorProfile},
        points::{self, PointCalculation, PointInputs},
        positions,
        standings::{Standing, StandingTracker},
        structures::{partition_key::PartitionKey, transition_reason::TransitionReason}
    }
};
use chrono::{DateTime, FixedOffset};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// The in-memory ranking engine: point calculations, standings and history
/// for every partition, plus the per-tournament fan-out that ties them
/// together.
#[derive(Default)]
pub struct RankingModel {
    pub tracker: StandingTracker,
    pub ledger: HistoryLedger
}

/// One competitor's fully validated contribution, staged before anything is
/// applied.
struct StagedResult {
    calculation: PointCalculation,
    partitions: Vec<PartitionKey>
}

/// Receipt for one applied tournament batch. Carries the partitions it
/// touched plus everything needed to undo the in-memory writes if the
/// surrounding database transaction fails.
pub struct AppliedTournament {
    pub touched: Vec<PartitionKey>,
    undo: TournamentUndo
}

struct TournamentUndo {
    standings: Vec<((i32, PartitionKey), Option<Standing>)>,
    calculations: Vec<(i32, i32)>,
    ledger: LedgerCheckpoint
}

impl RankingModel {
    pub fn new() -> RankingModel {
        RankingModel {
            tracker: StandingTracker::new(),
            ledger: HistoryLedger::new()
        }
    }

    /// Computes and records the point calculation for one competitor's
    /// result. Idempotent: if the (tournament, competitor) pair is already
    /// recorded the existing calculation is returned unchanged.
    pub fn calculate_and_record(
        &mut self,
        tournament: &Tournament,
        competitor: &Competitor,
        result: &CompetitorResult,
        now: DateTime<FixedOffset>
    ) -> Result<PointCalculation, EngineError> {
        if let Some(existing) = self.tracker.get_calculation(tournament.id, competitor.id) {
            debug!(
                "Tournament {} already recorded for competitor {}, returning existing calculation",
                tournament.id, competitor.id
            );
            return Ok(existing.clone());
        }

        let calculation = self.build_calculation(tournament, competitor, result, now)?;
        self.tracker.record_calculation(calculation.clone());
        Ok(calculation)
    }

    fn build_calculation(
        &self,
        tournament: &Tournament,
        competitor: &Competitor,
        result: &CompetitorResult,
        now: DateTime<FixedOffset>
    ) -> Result<PointCalculation, EngineError> {
        let prior_tournament_count = self
            .tracker
            .standings_for_competitor(competitor.id)
            .iter()
            .map(|s| s.tournaments_played)
            .max()
            .unwrap_or(0);

        let inputs = PointInputs {
            tournament_level: tournament.level,
            skill_level: competitor.skill_level,
            placement: result.placement,
            field_size: result.field_size,
            matches_won: result.matches_won,
            matches_lost: result.matches_lost,
            avg_opponent_rating: result.avg_opponent_rating,
            competitor_rating: competitor.rating,
            prior_tournament_count
        };
        let breakdown = points::calculate(&inputs)?;

        Ok(PointCalculation {
            tournament_id: tournament.id,
            competitor_id: competitor.id,
            inputs,
            breakdown,
            created_at: now
        })
    }

    /// Applies one completed tournament to every affected partition.
    ///
    /// All-or-nothing per tournament: every competitor's calculation and
    /// partition set is validated before anything is written, so a failure
    /// for any competitor leaves the model untouched. Competitors already
    /// recorded for this tournament are skipped (idempotent re-run).
    ///
    /// Returns the distinct partitions touched, each already recalculated,
    /// together with an undo receipt for [`RankingModel::rollback`].
    pub fn process_tournament(
        &mut self,
        tournament: &Tournament,
        results: &[CompetitorResult],
        competitors: &HashMap<i32, Competitor>,
        now: DateTime<FixedOffset>
    ) -> Result<AppliedTournament, EngineError> {
        // Phase 1: validate and stage. Any error aborts the whole tournament.
        let mut staged: Vec<StagedResult> = Vec::new();
        for result in results {
            if self.tracker.has_calculation(tournament.id, result.competitor_id) {
                debug!(
                    "Competitor {} already recorded for tournament {}, skipping",
                    result.competitor_id, tournament.id
                );
                continue;
            }

            let competitor = competitors
                .get(&result.competitor_id)
                .ok_or(EngineError::not_found("competitor", result.competitor_id))?;

            let calculation = self.build_calculation(tournament, competitor, result, now)?;
            let profile = CompetitorProfile {
                competitor_id: competitor.id,
                state_id: competitor.state_id,
                birth_date: competitor.birth_date,
                gender: competitor.gender
            };
            let partitions = derive_partitions(&profile, now.date_naive());

            staged.push(StagedResult { calculation, partitions });
        }

        if staged.is_empty() {
            info!("Tournament {} has no unrecorded results, nothing to apply", tournament.id);
            return Ok(AppliedTournament {
                touched: Vec::new(),
                undo: TournamentUndo {
                    standings: Vec::new(),
                    calculations: Vec::new(),
                    ledger: self.ledger.checkpoint()
                }
            });
        }

        // Snapshot everything the batch can write: the staged standings and
        // every existing row of the partitions about to be re-ranked.
        let staged_partitions: HashSet<PartitionKey> =
            staged.iter().flat_map(|s| s.partitions.iter().copied()).collect();
        let mut keys: HashSet<(i32, PartitionKey)> = staged
            .iter()
            .flat_map(|s| {
                let competitor_id = s.calculation.competitor_id;
                s.partitions.iter().map(move |p| (competitor_id, *p))
            })
            .collect();
        keys.extend(
            self.tracker
                .standings()
                .filter(|s| staged_partitions.contains(&s.partition))
                .map(|s| (s.competitor_id, s.partition))
        );
        let undo = TournamentUndo {
            standings: self.tracker.snapshot(&keys.into_iter().collect::<Vec<_>>()),
            calculations: staged
                .iter()
                .map(|s| (s.calculation.tournament_id, s.calculation.competitor_id))
                .collect(),
            ledger: self.ledger.checkpoint()
        };

        // Phase 2: apply. Infallible by construction.
        let mut touched: Vec<PartitionKey> = Vec::new();
        for stage in &staged {
            let calculation = &stage.calculation;
            for partition in &stage.partitions {
                let delta = self.tracker.accumulate(
                    calculation.competitor_id,
                    *partition,
                    calculation.breakdown.total_points,
                    calculation.breakdown.activity_bonus,
                    tournament.end_date,
                    now
                );
                self.ledger
                    .append(&delta, TransitionReason::TournamentCompletion, Some(tournament.id), now);

                if !touched.contains(partition) {
                    touched.push(*partition);
                }
            }
        }
        for stage in staged {
            self.tracker.record_calculation(stage.calculation);
        }

        // Phase 3: recalculate every touched partition, strictly after all
        // points-mutating writes.
        for partition in &touched {
            positions::recalculate(&mut self.tracker, &mut self.ledger, partition, now)?;
        }

        info!(
            "Tournament {} applied: {} competitors across {} partitions",
            tournament.id,
            results.len(),
            touched.len()
        );
        Ok(AppliedTournament { touched, undo })
    }

    /// Reverts an applied batch whose persistence failed: standings,
    /// recorded calculations, and history return to their pre-batch state,
    /// so a later re-run starts clean instead of hitting stale in-memory
    /// idempotency keys.
    pub fn rollback(&mut self, applied: AppliedTournament) {
        self.tracker.restore(applied.undo.standings);
        for (tournament_id, competitor_id) in applied.undo.calculations {
            self.tracker.remove_calculation(tournament_id, competitor_id);
        }
        self.ledger.rollback(applied.undo.ledger);
    }
}
