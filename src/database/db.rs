use super::db_structs::{Competitor, CompetitorResult, State, Tournament};
use crate::engine::{
    history::StandingTransition,
    points::{PointBreakdown, PointCalculation, PointInputs},
    standings::Standing,
    structures::{
        age_bracket::AgeBracket, gender::Gender, partition_key::PartitionKey, ranking_category::RankingCategory,
        ranking_type::RankingType, skill_level::SkillLevel, tournament_level::TournamentLevel
    }
};
use chrono::{DateTime, FixedOffset};
use std::sync::Arc;
use tokio_postgres::{Client, Error, NoTls, Row};
use tracing::{error, info};

#[derive(Clone)]
pub struct DbClient {
    client: Arc<Client>
}

impl DbClient {
    // Connect to the database and return a DbClient instance
    pub async fn connect(connection_str: &str) -> Result<Self, Error> {
        let (client, connection) = tokio_postgres::connect(connection_str, NoTls).await?;

        // Spawn the connection object to run in the background
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!("connection error: {}", e);
            }
        });

        Ok(DbClient {
            client: Arc::new(client)
        })
    }

    /// Completed tournaments that have no point calculation rows yet, oldest
    /// first. These are the tournament-completion sweep's work queue.
    pub async fn get_unprocessed_completed_tournaments(&self) -> Result<Vec<Tournament>, Error> {
        info!("Fetching unprocessed completed tournaments...");
        let rows = self
            .client
            .query(
                "SELECT t.id, t.name, t.level, t.state_id, t.end_date
                 FROM tournaments t
                 WHERE t.status = 2
                   AND NOT EXISTS (
                       SELECT 1 FROM point_calculations pc WHERE pc.tournament_id = t.id
                   )
                 ORDER BY t.end_date",
                &[]
            )
            .await?;

        Ok(rows.iter().map(Self::tournament_from_row).collect())
    }

    pub async fn get_tournament(&self, tournament_id: i32) -> Result<Option<Tournament>, Error> {
        let row = self
            .client
            .query_opt(
                "SELECT t.id, t.name, t.level, t.state_id, t.end_date FROM tournaments t WHERE t.id = $1",
                &[&tournament_id]
            )
            .await?;

        Ok(row.as_ref().map(Self::tournament_from_row))
    }

    pub async fn get_competitor_results(&self, tournament_id: i32) -> Result<Vec<CompetitorResult>, Error> {
        let rows = self
            .client
            .query(
                "SELECT r.tournament_id, r.competitor_id, r.placement, r.field_size,
                        r.matches_won, r.matches_lost, r.avg_opponent_rating
                 FROM tournament_results r
                 WHERE r.tournament_id = $1
                 ORDER BY r.placement",
                &[&tournament_id]
            )
            .await?;

        Ok(rows
            .iter()
            .map(|row| CompetitorResult {
                tournament_id: row.get("tournament_id"),
                competitor_id: row.get("competitor_id"),
                placement: row.get("placement"),
                field_size: row.get("field_size"),
                matches_won: row.get("matches_won"),
                matches_lost: row.get("matches_lost"),
                avg_opponent_rating: row.get("avg_opponent_rating")
            })
            .collect())
    }

    pub async fn get_competitors(&self) -> Result<Vec<Competitor>, Error> {
        info!("Fetching competitors...");
        let rows = self
            .client
            .query(
                "SELECT c.id, c.name, c.state_id, c.birth_date, c.gender, c.skill_level, c.rating
                 FROM competitors c
                 ORDER BY c.id",
                &[]
            )
            .await?;

        let competitors = rows.iter().map(Self::competitor_from_row).collect();
        info!("Competitors fetched");
        Ok(competitors)
    }

    pub async fn get_states(&self) -> Result<Vec<State>, Error> {
        let rows = self
            .client
            .query("SELECT s.id, s.name, s.code FROM states s ORDER BY s.id", &[])
            .await?;

        Ok(rows
            .iter()
            .map(|row| State {
                id: row.get("id"),
                name: row.get("name"),
                code: row.get("code")
            })
            .collect())
    }

    /// Loads every standing row into memory. Called once at startup; the
    /// in-memory tracker is the working set for the rest of the run.
    pub async fn get_standings(&self) -> Result<Vec<Standing>, Error> {
        info!("Fetching standings...");
        let rows = self
            .client
            .query(
                "SELECT s.competitor_id, s.ranking_type, s.category, s.state_id, s.age_group, s.gender,
                        s.position, s.points, s.previous_position, s.previous_points, s.tournaments_played,
                        s.last_tournament_date, s.activity_bonus, s.decay_factor, s.last_calculated, s.is_active
                 FROM standings s",
                &[]
            )
            .await?;

        let standings = rows.iter().filter_map(Self::standing_from_row).collect::<Vec<_>>();
        info!("{} standings fetched", standings.len());
        Ok(standings)
    }

    /// Loads all recorded point calculations; the (tournament, competitor)
    /// pairs are the idempotency guard against double-counting.
    pub async fn get_point_calculations(&self) -> Result<Vec<PointCalculation>, Error> {
        info!("Fetching point calculations...");
        let rows = self
            .client
            .query(
                "SELECT pc.tournament_id, pc.competitor_id, pc.tournament_level, pc.skill_level,
                        pc.placement, pc.field_size, pc.matches_won, pc.matches_lost,
                        pc.avg_opponent_rating, pc.competitor_rating, pc.prior_tournament_count,
                        pc.base_points, pc.placement_multiplier, pc.level_multiplier, pc.opponent_bonus,
                        pc.activity_bonus, pc.participation_bonus, pc.total_points, pc.created_at
                 FROM point_calculations pc",
                &[]
            )
            .await?;

        Ok(rows.iter().map(Self::calculation_from_row).collect())
    }

    /// Persists one tournament's batch atomically: point calculations,
    /// standing upserts and transitions commit together or not at all.
    pub async fn save_tournament_batch(
        &self,
        calculations: &[PointCalculation],
        standings: &[Standing],
        transitions: &[StandingTransition]
    ) -> Result<(), Error> {
        let mut statements = vec!["BEGIN;".to_string()];

        for calculation in calculations {
            statements.push(Self::insert_calculation_sql(calculation));
        }
        for standing in standings {
            statements.push(Self::upsert_standing_sql(standing));
        }
        for transition in transitions {
            statements.push(Self::insert_transition_sql(transition));
        }

        statements.push("COMMIT;".to_string());
        self.client.batch_execute(statements.join("\n").as_str()).await?;

        info!(
            "Saved batch: {} calculations, {} standings, {} transitions",
            calculations.len(),
            standings.len(),
            transitions.len()
        );
        Ok(())
    }

    /// Persists position-only updates (recalculation and decay phases).
    pub async fn save_standings(&self, standings: &[Standing]) -> Result<(), Error> {
        if standings.is_empty() {
            return Ok(());
        }

        let mut statements = vec!["BEGIN;".to_string()];
        for standing in standings {
            statements.push(Self::upsert_standing_sql(standing));
        }
        statements.push("COMMIT;".to_string());

        self.client.batch_execute(statements.join("\n").as_str()).await
    }

    pub async fn save_transitions(&self, transitions: &[StandingTransition]) -> Result<(), Error> {
        if transitions.is_empty() {
            return Ok(());
        }

        let mut statements = vec!["BEGIN;".to_string()];
        for transition in transitions {
            statements.push(Self::insert_transition_sql(transition));
        }
        statements.push("COMMIT;".to_string());

        self.client.batch_execute(statements.join("\n").as_str()).await
    }

    fn tournament_from_row(row: &Row) -> Tournament {
        Tournament {
            id: row.get("id"),
            name: row.get("name"),
            level: TournamentLevel::from_i32_or_local(row.get::<_, i32>("level")),
            state_id: row.get("state_id"),
            end_date: row.get("end_date")
        }
    }

    fn competitor_from_row(row: &Row) -> Competitor {
        Competitor {
            id: row.get("id"),
            name: row.get("name"),
            state_id: row.get("state_id"),
            birth_date: row.get("birth_date"),
            gender: row
                .get::<_, Option<i32>>("gender")
                .and_then(|g| Gender::try_from(g).ok()),
            skill_level: row
                .get::<_, Option<i32>>("skill_level")
                .and_then(|s| SkillLevel::try_from(s).ok()),
            rating: row.get("rating")
        }
    }

    /// Returns None when the row's enum columns no longer parse; such rows
    /// are skipped rather than aborting the load.
    fn standing_from_row(row: &Row) -> Option<Standing> {
        let partition = PartitionKey {
            ranking_type: RankingType::try_from(row.get::<_, i32>("ranking_type")).ok()?,
            category: RankingCategory::try_from(row.get::<_, i32>("category")).ok()?,
            state_id: row.get("state_id"),
            age_group: row
                .get::<_, Option<i32>>("age_group")
                .and_then(|a| AgeBracket::try_from(a).ok()),
            gender: row
                .get::<_, Option<i32>>("gender")
                .and_then(|g| Gender::try_from(g).ok())
        };

        Some(Standing {
            competitor_id: row.get("competitor_id"),
            partition,
            position: row.get("position"),
            points: row.get("points"),
            previous_position: row.get("previous_position"),
            previous_points: row.get("previous_points"),
            tournaments_played: row.get("tournaments_played"),
            last_tournament_date: row.get("last_tournament_date"),
            activity_bonus: row.get("activity_bonus"),
            decay_factor: row.get("decay_factor"),
            last_calculated: row.get("last_calculated"),
            is_active: row.get("is_active")
        })
    }

    fn calculation_from_row(row: &Row) -> PointCalculation {
        PointCalculation {
            tournament_id: row.get("tournament_id"),
            competitor_id: row.get("competitor_id"),
            inputs: PointInputs {
                tournament_level: TournamentLevel::from_i32_or_local(row.get::<_, i32>("tournament_level")),
                skill_level: row
                    .get::<_, Option<i32>>("skill_level")
                    .and_then(|s| SkillLevel::try_from(s).ok()),
                placement: row.get("placement"),
                field_size: row.get("field_size"),
                matches_won: row.get("matches_won"),
                matches_lost: row.get("matches_lost"),
                avg_opponent_rating: row.get("avg_opponent_rating"),
                competitor_rating: row.get("competitor_rating"),
                prior_tournament_count: row.get("prior_tournament_count")
            },
            breakdown: PointBreakdown {
                base_points: row.get("base_points"),
                placement_multiplier: row.get("placement_multiplier"),
                level_multiplier: row.get("level_multiplier"),
                opponent_bonus: row.get("opponent_bonus"),
                activity_bonus: row.get("activity_bonus"),
                participation_bonus: row.get("participation_bonus"),
                total_points: row.get("total_points")
            },
            created_at: row.get("created_at")
        }
    }

    fn insert_calculation_sql(c: &PointCalculation) -> String {
        format!(
            "INSERT INTO point_calculations (tournament_id, competitor_id, tournament_level, skill_level, \
             placement, field_size, matches_won, matches_lost, avg_opponent_rating, competitor_rating, \
             prior_tournament_count, base_points, placement_multiplier, level_multiplier, opponent_bonus, \
             activity_bonus, participation_bonus, total_points, created_at) \
             VALUES ({}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, '{}') \
             ON CONFLICT (tournament_id, competitor_id) DO NOTHING;",
            c.tournament_id,
            c.competitor_id,
            c.inputs.tournament_level as i32,
            opt_i32(c.inputs.skill_level.map(|s| s as i32)),
            c.inputs.placement,
            c.inputs.field_size,
            c.inputs.matches_won,
            c.inputs.matches_lost,
            c.inputs.avg_opponent_rating,
            c.inputs.competitor_rating,
            c.inputs.prior_tournament_count,
            c.breakdown.base_points,
            c.breakdown.placement_multiplier,
            c.breakdown.level_multiplier,
            c.breakdown.opponent_bonus,
            c.breakdown.activity_bonus,
            c.breakdown.participation_bonus,
            c.breakdown.total_points,
            format_ts(c.created_at)
        )
    }

    /// The standings unique index over the partition-key columns must be
    /// declared NULLS NOT DISTINCT: national rows carry NULL in state_id,
    /// age_group and gender, and under default NULL semantics the conflict
    /// target would never match them, inserting a duplicate row per save.
    fn upsert_standing_sql(s: &Standing) -> String {
        format!(
            "INSERT INTO standings (competitor_id, ranking_type, category, state_id, age_group, gender, \
             position, points, previous_position, previous_points, tournaments_played, last_tournament_date, \
             activity_bonus, decay_factor, last_calculated, is_active) \
             VALUES ({}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, '{}', {}) \
             ON CONFLICT (competitor_id, ranking_type, category, state_id, age_group, gender) \
             DO UPDATE SET position = EXCLUDED.position, points = EXCLUDED.points, \
             previous_position = EXCLUDED.previous_position, previous_points = EXCLUDED.previous_points, \
             tournaments_played = EXCLUDED.tournaments_played, last_tournament_date = EXCLUDED.last_tournament_date, \
             activity_bonus = EXCLUDED.activity_bonus, decay_factor = EXCLUDED.decay_factor, \
             last_calculated = EXCLUDED.last_calculated, is_active = EXCLUDED.is_active;",
            s.competitor_id,
            s.partition.ranking_type as i32,
            s.partition.category as i32,
            opt_i32(s.partition.state_id),
            opt_i32(s.partition.age_group.map(|a| a as i32)),
            opt_i32(s.partition.gender.map(|g| g as i32)),
            s.position,
            s.points,
            opt_i32(s.previous_position),
            s.previous_points,
            s.tournaments_played,
            opt_ts(s.last_tournament_date),
            s.activity_bonus,
            s.decay_factor,
            format_ts(s.last_calculated),
            s.is_active
        )
    }

    fn insert_transition_sql(t: &StandingTransition) -> String {
        format!(
            "INSERT INTO standing_transitions (competitor_id, ranking_type, category, state_id, age_group, \
             gender, old_position, new_position, old_points, new_points, points_change, position_change, \
             reason, tournament_id, change_date) \
             VALUES ({}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, '{}');",
            t.competitor_id,
            t.partition.ranking_type as i32,
            t.partition.category as i32,
            opt_i32(t.partition.state_id),
            opt_i32(t.partition.age_group.map(|a| a as i32)),
            opt_i32(t.partition.gender.map(|g| g as i32)),
            opt_i32(t.old_position),
            t.new_position,
            t.old_points,
            t.new_points,
            t.points_change,
            t.position_change,
            t.reason as i32,
            opt_i32(t.tournament_id),
            format_ts(t.change_date)
        )
    }

    // Access the underlying Client
    pub fn client(&self) -> Arc<Client> {
        Arc::clone(&self.client)
    }
}

fn opt_i32(v: Option<i32>) -> String {
    v.map_or("NULL".to_string(), |x| x.to_string())
}

fn format_ts(ts: DateTime<FixedOffset>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S%z").to_string()
}

fn opt_ts(ts: Option<DateTime<FixedOffset>>) -> String {
    ts.map_or("NULL".to_string(), |t| format!("'{}'", format_ts(t)))
}
