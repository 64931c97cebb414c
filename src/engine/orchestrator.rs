use crate::{
    database::db::DbClient,
    engine::{
        decay::{self, DecayConfig, DecaySweepReport},
        error::EngineError,
        history::StandingTransition,
        points::PointCalculation,
        positions,
        ranking_model::RankingModel,
        standings::{CategoryFilters, Page, Standing},
        structures::{
            batch_result::BatchResult, partition_key::PartitionKey, ranking_category::RankingCategory,
            ranking_type::RankingType
        }
    },
    messaging::RabbitMqPublisher,
    utils::progress_utils::progress_bar
};
use chrono::Utc;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("database error: {0}")]
    Db(#[from] tokio_postgres::Error),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("orchestrator not started")]
    NotStarted
}

/// Batch driver over the ranking model. An explicit instance with injected
/// dependencies and a start/stop lifecycle; scheduling (cron or otherwise)
/// lives outside and simply calls the sweep entry points.
pub struct Orchestrator {
    db: DbClient,
    model: RankingModel,
    publisher: Option<RabbitMqPublisher>,
    started: bool
}

impl Orchestrator {
    pub fn new(db: DbClient, publisher: Option<RabbitMqPublisher>) -> Orchestrator {
        Orchestrator {
            db,
            model: RankingModel::new(),
            publisher,
            started: false
        }
    }

    /// Loads the persisted working set (standings, point calculations, state
    /// names) into the in-memory model. Idempotent.
    pub async fn start(&mut self) -> Result<(), OrchestratorError> {
        if self.started {
            return Ok(());
        }

        for standing in self.db.get_standings().await? {
            self.model.tracker.load(standing);
        }
        for calculation in self.db.get_point_calculations().await? {
            self.model.tracker.record_calculation(calculation);
        }
        self.model
            .tracker
            .set_state_mapping(self.db.get_states().await?.into_iter().map(|s| (s.id, s.name)));

        self.started = true;
        info!("Orchestrator started");
        Ok(())
    }

    pub async fn stop(&mut self) {
        if let Some(publisher) = &mut self.publisher {
            if let Err(e) = publisher.close().await {
                warn!("Failed to close publisher cleanly: {}", e);
            }
        }
        self.started = false;
        info!("Orchestrator stopped");
    }

    /// Tournament-completion sweep: applies every completed tournament that
    /// has no point calculations yet. Tournaments are independent; one
    /// failure is logged and skipped while the rest proceed.
    pub async fn run_tournament_sweep(&mut self) -> Result<BatchResult<i32>, OrchestratorError> {
        self.ensure_started()?;

        let tournaments = self.db.get_unprocessed_completed_tournaments().await?;
        let competitors = self.competitor_map().await?;

        info!("Tournament sweep: {} tournaments to process", tournaments.len());
        let bar = progress_bar(tournaments.len() as u64, "Processing completed tournaments".to_string());

        let mut outcome = BatchResult::new();
        for tournament in &tournaments {
            let applied = self.process_one_tournament(tournament.id, &competitors).await;

            if let Err(e) = &applied {
                warn!("Tournament {} failed, skipping: {}", tournament.id, e);
            }
            outcome.record(
                tournament.id,
                applied.map(|_| ()).map_err(|e| match e {
                    OrchestratorError::Engine(engine) => engine,
                    other => EngineError::computation(other.to_string())
                })
            );

            if let Some(bar) = &bar {
                bar.inc(1);
            }
        }
        if let Some(bar) = &bar {
            bar.finish();
        }

        info!(
            "Tournament sweep complete: {} succeeded, {} failed",
            outcome.succeeded.len(),
            outcome.failed.len()
        );
        Ok(outcome)
    }

    /// Operator-triggered re-run for a single tournament. Safe to repeat:
    /// the point-calculation idempotency key makes recorded competitors a
    /// no-op.
    pub async fn reprocess_tournament(&mut self, tournament_id: i32) -> Result<(), OrchestratorError> {
        self.ensure_started()?;

        let competitors = self.competitor_map().await?;
        self.process_one_tournament(tournament_id, &competitors).await
    }

    async fn process_one_tournament(
        &mut self,
        tournament_id: i32,
        competitors: &HashMap<i32, crate::database::db_structs::Competitor>
    ) -> Result<(), OrchestratorError> {
        let tournament = self
            .db
            .get_tournament(tournament_id)
            .await?
            .ok_or(EngineError::not_found("tournament", tournament_id))?;
        let results = self.db.get_competitor_results(tournament_id).await?;
        let now = Utc::now().fixed_offset();

        let applied = self.model.process_tournament(&tournament, &results, competitors, now)?;
        if applied.touched.is_empty() {
            return Ok(());
        }

        // Persist the whole tournament batch in one database transaction. On
        // failure the in-memory writes are rolled back too, so the model never
        // serves points the database refused and a later re-run starts clean.
        let calculations: Vec<PointCalculation> = results
            .iter()
            .filter_map(|r| self.model.tracker.get_calculation(tournament_id, r.competitor_id))
            .cloned()
            .collect();
        let standings = self.standings_in_partitions(&applied.touched);
        let transitions: Vec<StandingTransition> = self.model.ledger.unsaved().to_vec();

        if let Err(e) = self
            .db
            .save_tournament_batch(&calculations, &standings, &transitions)
            .await
        {
            warn!("Persistence failed for tournament {}, reverting in-memory batch", tournament_id);
            self.model.rollback(applied);
            return Err(e.into());
        }
        self.model.ledger.mark_saved();

        if let Some(publisher) = &self.publisher {
            if let Err(e) = publisher.publish_standings_updated(tournament_id).await {
                warn!("Failed to publish standings update for tournament {}: {}", tournament_id, e);
            }
        }

        Ok(())
    }

    /// Weekly full pass: recalculates every distinct partition currently
    /// present. Partition failures are independent.
    pub async fn run_full_recalculation(&mut self) -> Result<BatchResult<PartitionKey>, OrchestratorError> {
        self.ensure_started()?;

        let partitions = self.model.tracker.distinct_partitions();
        let now = Utc::now().fixed_offset();

        info!("Full recalculation over {} partitions", partitions.len());
        let bar = progress_bar(partitions.len() as u64, "Recalculating partitions".to_string());

        let mut outcome = BatchResult::new();
        for partition in partitions {
            let result = positions::recalculate(&mut self.model.tracker, &mut self.model.ledger, &partition, now);
            if let Err(e) = &result {
                warn!("Recalculation failed for {}: {}", partition, e);
            }
            outcome.record(partition, result.map(|_| ()));

            if let Some(bar) = &bar {
                bar.inc(1);
            }
        }
        if let Some(bar) = &bar {
            bar.finish();
        }

        let standings = self.standings_in_partitions(&outcome.succeeded);
        self.db.save_standings(&standings).await?;

        Ok(outcome)
    }

    /// Decay sweep: discounts inactive standings (best-effort), recalculates
    /// touched partitions, persists, and notifies affected competitors.
    pub async fn run_decay_sweep(&mut self) -> Result<DecaySweepReport, OrchestratorError> {
        self.ensure_started()?;

        let now = Utc::now().fixed_offset();
        let report = decay::run_decay_sweep(
            &mut self.model.tracker,
            &mut self.model.ledger,
            now,
            DecayConfig::default()
        );

        let standings = self.standings_in_partitions(&report.recalculated);
        let transitions: Vec<StandingTransition> = self.model.ledger.unsaved().to_vec();
        self.db.save_standings(&standings).await?;
        self.db.save_transitions(&transitions).await?;
        self.model.ledger.mark_saved();

        if let Some(publisher) = &self.publisher {
            for competitor_id in report.affected_competitors() {
                if let Err(e) = publisher.publish_inactivity_decay(competitor_id).await {
                    warn!("Failed to publish inactivity notice for competitor {}: {}", competitor_id, e);
                }
            }
        }

        Ok(report)
    }

    // Read surface. Served from the last-committed in-memory state, so these
    // never fail due to recalculation lag.

    pub fn get_standings_for_competitor(&self, competitor_id: i32) -> Vec<Standing> {
        self.model.tracker.standings_for_competitor(competitor_id)
    }

    pub fn get_standings_by_category(
        &self,
        ranking_type: RankingType,
        category: RankingCategory,
        filters: CategoryFilters,
        page: Page
    ) -> (Vec<Standing>, usize) {
        self.model.tracker.standings_by_category(ranking_type, category, filters, page)
    }

    /// Display name for a state partition key, when known.
    pub fn get_state_name(&self, state_id: i32) -> Option<&str> {
        self.model.tracker.state_name(state_id)
    }

    pub fn get_standing_history(
        &self,
        competitor_id: i32,
        ranking_type: Option<RankingType>,
        category: Option<RankingCategory>,
        limit: usize
    ) -> Vec<StandingTransition> {
        self.model.ledger.history_for_competitor(competitor_id, ranking_type, category, limit)
    }

    pub fn model(&self) -> &RankingModel {
        &self.model
    }

    fn ensure_started(&self) -> Result<(), OrchestratorError> {
        if self.started {
            Ok(())
        } else {
            Err(OrchestratorError::NotStarted)
        }
    }

    async fn competitor_map(
        &self
    ) -> Result<HashMap<i32, crate::database::db_structs::Competitor>, OrchestratorError> {
        Ok(self
            .db
            .get_competitors()
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect())
    }

    fn standings_in_partitions(&self, partitions: &[PartitionKey]) -> Vec<Standing> {
        partitions
            .iter()
            .flat_map(|p| self.model.tracker.active_in_partition(p))
            .cloned()
            .collect()
    }
}
