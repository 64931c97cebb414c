use crate::engine::structures::{
    gender::Gender, skill_level::SkillLevel, tournament_level::TournamentLevel
};
use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct Tournament {
    pub id: i32,
    pub name: String,
    pub level: TournamentLevel,
    pub state_id: Option<i32>,
    pub end_date: DateTime<FixedOffset>
}

#[derive(Debug, Clone, Serialize)]
pub struct Competitor {
    pub id: i32,
    pub name: Option<String>,
    pub state_id: Option<i32>,
    pub birth_date: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub skill_level: Option<SkillLevel>,
    pub rating: f64
}

/// One competitor's finalized placement and match tally for a tournament.
/// Bracket progression happens upstream; this is the engine's input shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompetitorResult {
    pub tournament_id: i32,
    pub competitor_id: i32,
    pub placement: i32,
    pub field_size: i32,
    pub matches_won: i32,
    pub matches_lost: i32,
    pub avg_opponent_rating: f64
}

#[derive(Debug, Clone, Serialize)]
pub struct State {
    pub id: i32,
    pub name: String,
    pub code: String
}
