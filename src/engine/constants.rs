use crate::engine::structures::tournament_level::TournamentLevel;
use lazy_static::lazy_static;
use std::collections::HashMap;

// Scoring constants
pub const OPPONENT_BONUS_RATE: f64 = 0.1;
pub const OPPONENT_BONUS_CAP: f64 = 100.0;
pub const ACTIVITY_BONUS_THRESHOLD: i32 = 5;
pub const ACTIVITY_BONUS_STEP: f64 = 5.0;
pub const ACTIVITY_BONUS_CAP: f64 = 50.0;
pub const PARTICIPATION_BONUS_RATE: f64 = 0.2;

// Placement multipliers for podium finishes; deeper placements fall back to
// the percentile tiers below.
pub const FIRST_PLACE_MULTIPLIER: f64 = 1.0;
pub const SECOND_PLACE_MULTIPLIER: f64 = 0.7;
pub const SEMIFINAL_MULTIPLIER: f64 = 0.5;
pub const PERCENTILE_TIERS: [(f64, f64); 3] = [(0.8, 0.4), (0.6, 0.3), (0.4, 0.2)];
pub const PERCENTILE_FLOOR_MULTIPLIER: f64 = 0.1;

// Decay constants
pub const DECAY_FACTOR: f64 = 0.95;
pub const DECAY_INACTIVE_MONTHS: u32 = 6;

lazy_static! {
    /// Base points awarded per tournament level.
    pub static ref BASE_POINTS: HashMap<TournamentLevel, f64> = {
        let mut m = HashMap::new();
        m.insert(TournamentLevel::National, 1000.0);
        m.insert(TournamentLevel::State, 500.0);
        m.insert(TournamentLevel::Municipal, 250.0);
        m.insert(TournamentLevel::Local, 100.0);
        m
    };
}
