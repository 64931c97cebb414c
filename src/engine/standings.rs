use crate::engine::{
    error::EngineError,
    points::PointCalculation,
    structures::{
        age_bracket::AgeBracket, gender::Gender, partition_key::PartitionKey, ranking_category::RankingCategory,
        ranking_type::RankingType
    }
};
use chrono::{DateTime, FixedOffset};
use indexmap::IndexMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One competitor's rank and points within one category partition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Standing {
    pub competitor_id: i32,
    pub partition: PartitionKey,
    pub position: i32,
    pub points: f64,
    pub previous_position: Option<i32>,
    pub previous_points: f64,
    pub tournaments_played: i32,
    pub last_tournament_date: Option<DateTime<FixedOffset>>,
    pub activity_bonus: f64,
    pub decay_factor: f64,
    pub last_calculated: DateTime<FixedOffset>,
    pub is_active: bool
}

/// Snapshot of a single points mutation, handed to the history recorder.
#[derive(Debug, Clone, Copy)]
pub struct StandingDelta {
    pub competitor_id: i32,
    pub partition: PartitionKey,
    pub old_position: Option<i32>,
    pub old_points: f64,
    pub new_points: f64
}

/// Read-side filters for category leaderboards.
#[derive(Debug, Clone, Copy, Default)]
pub struct CategoryFilters {
    pub state_id: Option<i32>,
    pub age_group: Option<AgeBracket>,
    pub gender: Option<Gender>,
    pub include_inactive: bool
}

#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub offset: usize,
    pub limit: usize
}

impl Default for Page {
    fn default() -> Self {
        Page { offset: 0, limit: 50 }
    }
}

type StandingKey = (i32, PartitionKey);

/// In-memory standing store. One entry per (competitor, partition); the only
/// writers of `points` are `accumulate` and `discount`. Loaded from and
/// flushed back to the database around each batch.
#[derive(Default)]
pub struct StandingTracker {
    standings: IndexMap<StandingKey, Standing>,
    // Idempotency guard: one calculation per (tournament_id, competitor_id).
    point_calculations: HashMap<(i32, i32), PointCalculation>,
    state_names: HashMap<i32, String>
}

impl StandingTracker {
    pub fn new() -> StandingTracker {
        StandingTracker {
            standings: IndexMap::new(),
            point_calculations: HashMap::new(),
            state_names: HashMap::new()
        }
    }

    /// Adds `delta_points` to the standing, creating it on first qualifying
    /// result. New rows get a provisional position of 1; the recalculation
    /// phase that ends every batch assigns the true position.
    pub fn accumulate(
        &mut self,
        competitor_id: i32,
        partition: PartitionKey,
        delta_points: f64,
        activity_bonus: f64,
        tournament_date: DateTime<FixedOffset>,
        now: DateTime<FixedOffset>
    ) -> StandingDelta {
        let entry = self.standings.entry((competitor_id, partition));
        let standing = entry.or_insert_with(|| Standing {
            competitor_id,
            partition,
            position: 1,
            points: 0.0,
            previous_position: None,
            previous_points: 0.0,
            tournaments_played: 0,
            last_tournament_date: None,
            activity_bonus: 0.0,
            decay_factor: 1.0,
            last_calculated: now,
            is_active: true
        });

        let old_points = standing.points;
        let old_position = if standing.tournaments_played > 0 {
            Some(standing.position)
        } else {
            None
        };

        standing.previous_points = old_points;
        standing.previous_position = old_position;
        standing.points += delta_points;
        standing.tournaments_played += 1;
        standing.activity_bonus = activity_bonus;
        standing.last_tournament_date = Some(tournament_date);
        standing.last_calculated = now;
        standing.is_active = true;

        StandingDelta {
            competitor_id,
            partition,
            old_position,
            old_points,
            new_points: standing.points
        }
    }

    /// Multiplies the standing's points by `factor` (decay). The factor must
    /// be in (0, 1]; points never increase through this path.
    pub fn discount(
        &mut self,
        competitor_id: i32,
        partition: PartitionKey,
        factor: f64,
        now: DateTime<FixedOffset>
    ) -> Result<StandingDelta, EngineError> {
        if !(factor > 0.0 && factor <= 1.0) {
            return Err(EngineError::validation(format!(
                "decay factor must be in (0, 1], got {}",
                factor
            )));
        }

        let standing = self
            .standings
            .get_mut(&(competitor_id, partition))
            .ok_or(EngineError::not_found("standing", competitor_id))?;

        let old_points = standing.points;
        standing.previous_points = old_points;
        standing.previous_position = Some(standing.position);
        standing.points = crate::engine::points::round2(standing.points * factor);
        standing.decay_factor = factor;
        standing.last_calculated = now;

        Ok(StandingDelta {
            competitor_id,
            partition,
            old_position: Some(standing.position),
            old_points,
            new_points: standing.points
        })
    }

    pub fn get(&self, competitor_id: i32, partition: &PartitionKey) -> Option<&Standing> {
        self.standings.get(&(competitor_id, *partition))
    }

    /// Soft-deactivates a standing; rows are never physically removed.
    pub fn deactivate(&mut self, competitor_id: i32, partition: &PartitionKey) -> Result<(), EngineError> {
        let standing = self
            .standings
            .get_mut(&(competitor_id, *partition))
            .ok_or(EngineError::not_found("standing", competitor_id))?;
        standing.is_active = false;
        Ok(())
    }

    /// Used by the position recalculator, the only writer of `position`.
    pub(crate) fn set_position(
        &mut self,
        competitor_id: i32,
        partition: &PartitionKey,
        position: i32,
        now: DateTime<FixedOffset>
    ) {
        if let Some(standing) = self.standings.get_mut(&(competitor_id, *partition)) {
            standing.position = position;
            standing.last_calculated = now;
        }
    }

    /// Active standings of one partition, unordered.
    pub fn active_in_partition(&self, partition: &PartitionKey) -> Vec<&Standing> {
        self.standings
            .values()
            .filter(|s| s.partition == *partition && s.is_active)
            .collect()
    }

    pub fn standings_for_competitor(&self, competitor_id: i32) -> Vec<Standing> {
        self.standings
            .values()
            .filter(|s| s.competitor_id == competitor_id)
            .cloned()
            .collect()
    }

    /// Category leaderboard read: filtered, ordered by position, paginated.
    /// Serves last-committed positions, so it never fails due to
    /// recalculation lag.
    pub fn standings_by_category(
        &self,
        ranking_type: RankingType,
        category: RankingCategory,
        filters: CategoryFilters,
        page: Page
    ) -> (Vec<Standing>, usize) {
        let mut rows: Vec<&Standing> = self
            .standings
            .values()
            .filter(|s| s.partition.ranking_type == ranking_type && s.partition.category == category)
            .filter(|s| filters.state_id.is_none() || s.partition.state_id == filters.state_id)
            .filter(|s| filters.age_group.is_none() || s.partition.age_group == filters.age_group)
            .filter(|s| filters.gender.is_none() || s.partition.gender == filters.gender)
            .filter(|s| filters.include_inactive || s.is_active)
            .collect();

        rows.sort_by(|a, b| a.position.cmp(&b.position).then(a.competitor_id.cmp(&b.competitor_id)));

        let total = rows.len();
        let standings = rows
            .into_iter()
            .skip(page.offset)
            .take(page.limit)
            .cloned()
            .collect();

        (standings, total)
    }

    /// Every partition key currently present, for full recalculation passes.
    pub fn distinct_partitions(&self) -> Vec<PartitionKey> {
        self.standings.values().map(|s| s.partition).unique().collect()
    }

    pub fn standings(&self) -> impl Iterator<Item = &Standing> {
        self.standings.values()
    }

    /// Hydrates a standing loaded from persistence, as-is.
    pub fn load(&mut self, standing: Standing) {
        self.standings
            .insert((standing.competitor_id, standing.partition), standing);
    }

    /// Replaces the state id -> name mapping used for leaderboard display.
    pub fn set_state_mapping(&mut self, states: impl IntoIterator<Item = (i32, String)>) {
        self.state_names = states.into_iter().collect();
    }

    pub fn state_name(&self, state_id: i32) -> Option<&str> {
        self.state_names.get(&state_id).map(String::as_str)
    }

    /// Clones the current rows (or absence) for `keys`, to be restored with
    /// `restore` if a batch fails to persist.
    pub(crate) fn snapshot(&self, keys: &[StandingKey]) -> Vec<(StandingKey, Option<Standing>)> {
        keys.iter().map(|key| (*key, self.standings.get(key).cloned())).collect()
    }

    pub(crate) fn restore(&mut self, snapshot: Vec<(StandingKey, Option<Standing>)>) {
        for (key, standing) in snapshot {
            match standing {
                Some(standing) => {
                    self.standings.insert(key, standing);
                }
                None => {
                    self.standings.shift_remove(&key);
                }
            }
        }
    }

    pub(crate) fn remove_calculation(&mut self, tournament_id: i32, competitor_id: i32) {
        self.point_calculations.remove(&(tournament_id, competitor_id));
    }

    pub fn record_calculation(&mut self, calculation: PointCalculation) {
        self.point_calculations
            .insert((calculation.tournament_id, calculation.competitor_id), calculation);
    }

    pub fn has_calculation(&self, tournament_id: i32, competitor_id: i32) -> bool {
        self.point_calculations.contains_key(&(tournament_id, competitor_id))
    }

    pub fn get_calculation(&self, tournament_id: i32, competitor_id: i32) -> Option<&PointCalculation> {
        self.point_calculations.get(&(tournament_id, competitor_id))
    }
}
