use crate::{
    database::db_structs::{Competitor, CompetitorResult, Tournament},
    engine::structures::{gender::Gender, skill_level::SkillLevel, tournament_level::TournamentLevel}
};
use chrono::{DateTime, Duration, FixedOffset, NaiveDate};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

pub fn generate_tournament(id: i32, level: TournamentLevel, end_date: DateTime<FixedOffset>) -> Tournament {
    Tournament {
        id,
        name: format!("Test Tournament {}", id),
        level,
        state_id: Some(11),
        end_date
    }
}

pub fn generate_competitor(id: i32, state_id: Option<i32>, gender: Option<Gender>) -> Competitor {
    Competitor {
        id,
        name: Some(format!("Competitor {}", id)),
        state_id,
        birth_date: NaiveDate::from_ymd_opt(1990, 5, 20),
        gender,
        skill_level: None,
        rating: 1200.0
    }
}

pub fn generate_skilled_competitor(id: i32, skill_level: SkillLevel, rating: f64) -> Competitor {
    Competitor {
        skill_level: Some(skill_level),
        rating,
        ..generate_competitor(id, Some(11), Some(Gender::Female))
    }
}

/// Result with a 3-1 match record and opponents no stronger than the
/// competitor, so only placement drives the score.
pub fn generate_result(tournament_id: i32, competitor_id: i32, placement: i32, field_size: i32) -> CompetitorResult {
    CompetitorResult {
        tournament_id,
        competitor_id,
        placement,
        field_size,
        matches_won: 3,
        matches_lost: 1,
        avg_opponent_rating: 1000.0
    }
}

/// A full field of results with distinct placements, seeded for
/// reproducibility of the match tallies.
pub fn generate_field(tournament_id: i32, competitor_ids: &[i32]) -> Vec<CompetitorResult> {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let field_size = competitor_ids.len() as i32;

    competitor_ids
        .iter()
        .enumerate()
        .map(|(i, competitor_id)| {
            let placement = i as i32 + 1;
            CompetitorResult {
                tournament_id,
                competitor_id: *competitor_id,
                placement,
                field_size,
                matches_won: rng.random_range(0..=5),
                matches_lost: rng.random_range(0..=5),
                avg_opponent_rating: 1000.0 + rng.random_range(-200.0..=200.0)
            }
        })
        .collect()
}

pub fn days_ago(now: DateTime<FixedOffset>, days: i64) -> DateTime<FixedOffset> {
    now - Duration::days(days)
}
