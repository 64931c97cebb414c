use crate::engine::{
    constants::{
        ACTIVITY_BONUS_CAP, ACTIVITY_BONUS_STEP, ACTIVITY_BONUS_THRESHOLD, BASE_POINTS, FIRST_PLACE_MULTIPLIER,
        OPPONENT_BONUS_CAP, OPPONENT_BONUS_RATE, PARTICIPATION_BONUS_RATE, PERCENTILE_FLOOR_MULTIPLIER,
        PERCENTILE_TIERS, SECOND_PLACE_MULTIPLIER, SEMIFINAL_MULTIPLIER
    },
    error::EngineError,
    structures::{skill_level::SkillLevel, tournament_level::TournamentLevel}
};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Tournament-level inputs for scoring a single competitor's result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PointInputs {
    pub tournament_level: TournamentLevel,
    pub skill_level: Option<SkillLevel>,
    pub placement: i32,
    pub field_size: i32,
    pub matches_won: i32,
    pub matches_lost: i32,
    pub avg_opponent_rating: f64,
    pub competitor_rating: f64,
    pub prior_tournament_count: i32
}

/// Itemized scoring output. `total_points` is the only value that flows into
/// standings; the rest is retained for auditability.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PointBreakdown {
    pub base_points: f64,
    pub placement_multiplier: f64,
    pub level_multiplier: f64,
    pub opponent_bonus: f64,
    pub activity_bonus: f64,
    pub participation_bonus: f64,
    pub total_points: f64
}

/// One immutable record per (tournament, competitor). This is the idempotency
/// guard and the audit source of truth for `total_points`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointCalculation {
    pub tournament_id: i32,
    pub competitor_id: i32,
    pub inputs: PointInputs,
    pub breakdown: PointBreakdown,
    pub created_at: DateTime<FixedOffset>
}

/// Computes the full point breakdown for one competitor's finalized result.
///
/// Deterministic for identical inputs; fails without partial output when the
/// placement or field size is malformed.
pub fn calculate(inputs: &PointInputs) -> Result<PointBreakdown, EngineError> {
    if inputs.placement <= 0 {
        return Err(EngineError::validation(format!(
            "placement must be positive, got {}",
            inputs.placement
        )));
    }
    if inputs.field_size < inputs.placement {
        return Err(EngineError::validation(format!(
            "field size {} is smaller than placement {}",
            inputs.field_size, inputs.placement
        )));
    }

    let base_points = *BASE_POINTS
        .get(&inputs.tournament_level)
        .unwrap_or(&BASE_POINTS[&TournamentLevel::Local]);
    let placement_multiplier = placement_multiplier(inputs.placement, inputs.field_size);
    let level_multiplier = inputs.skill_level.map(|s| s.multiplier()).unwrap_or(1.0);
    let opponent_bonus = opponent_bonus(inputs.avg_opponent_rating, inputs.competitor_rating);
    let activity_bonus = activity_bonus(inputs.prior_tournament_count);
    let participation_bonus = participation_bonus(inputs.matches_won, inputs.matches_lost);

    let total_points = round2(
        base_points * placement_multiplier * level_multiplier * participation_bonus + opponent_bonus + activity_bonus
    );

    if total_points < 0.0 {
        return Err(EngineError::computation(format!(
            "negative total points {}",
            total_points
        )));
    }

    Ok(PointBreakdown {
        base_points,
        placement_multiplier,
        level_multiplier,
        opponent_bonus,
        activity_bonus,
        participation_bonus,
        total_points
    })
}

/// Fixed multipliers for the top 4; percentile tiers beyond that. The podium
/// is rewarded steeply, the long tail is smoothed.
fn placement_multiplier(placement: i32, field_size: i32) -> f64 {
    match placement {
        1 => FIRST_PLACE_MULTIPLIER,
        2 => SECOND_PLACE_MULTIPLIER,
        3 | 4 => SEMIFINAL_MULTIPLIER,
        _ => {
            let percentile = (field_size - placement + 1) as f64 / field_size as f64;
            for (threshold, multiplier) in PERCENTILE_TIERS {
                if percentile >= threshold {
                    return multiplier;
                }
            }
            PERCENTILE_FLOOR_MULTIPLIER
        }
    }
}

/// Rewards upsets; zero against weaker or equal opposition, capped to avoid
/// runaway outliers.
fn opponent_bonus(avg_opponent_rating: f64, competitor_rating: f64) -> f64 {
    ((avg_opponent_rating - competitor_rating) * OPPONENT_BONUS_RATE)
        .max(0.0)
        .min(OPPONENT_BONUS_CAP)
}

/// Kicks in from the fifth tournament onward, capped at 50.
fn activity_bonus(prior_tournament_count: i32) -> f64 {
    ((prior_tournament_count + 1 - ACTIVITY_BONUS_THRESHOLD).max(0) as f64 * ACTIVITY_BONUS_STEP)
        .min(ACTIVITY_BONUS_CAP)
}

fn participation_bonus(matches_won: i32, matches_lost: i32) -> f64 {
    let total = matches_won + matches_lost;
    if total == 0 {
        return 1.0;
    }

    let win_rate = matches_won as f64 / total as f64;
    1.0 + win_rate * PARTICIPATION_BONUS_RATE
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn inputs() -> PointInputs {
        PointInputs {
            tournament_level: TournamentLevel::National,
            skill_level: None,
            placement: 1,
            field_size: 32,
            matches_won: 3,
            matches_lost: 1,
            avg_opponent_rating: 1000.0,
            competitor_rating: 1200.0,
            prior_tournament_count: 0
        }
    }

    #[test]
    fn test_national_winner() {
        // 1000 * 1.00 * 1.00 * 1.15 with no bonuses
        let breakdown = calculate(&inputs()).unwrap();

        assert_abs_diff_eq!(breakdown.base_points, 1000.0);
        assert_abs_diff_eq!(breakdown.placement_multiplier, 1.0);
        assert_abs_diff_eq!(breakdown.level_multiplier, 1.0);
        assert_abs_diff_eq!(breakdown.opponent_bonus, 0.0);
        assert_abs_diff_eq!(breakdown.activity_bonus, 0.0);
        assert_abs_diff_eq!(breakdown.participation_bonus, 1.15);
        assert_abs_diff_eq!(breakdown.total_points, 1150.0, epsilon = 0.01);
    }

    #[test]
    fn test_fifth_of_twenty_hits_top_percentile_tier() {
        // percentile = (20 - 5 + 1) / 20 = 0.8 -> multiplier 0.4
        let mut i = inputs();
        i.placement = 5;
        i.field_size = 20;

        let breakdown = calculate(&i).unwrap();

        assert_abs_diff_eq!(breakdown.placement_multiplier, 0.4);
        assert_abs_diff_eq!(breakdown.total_points, 460.0, epsilon = 0.01);
    }

    #[test]
    fn test_placement_multiplier_podium() {
        assert_abs_diff_eq!(placement_multiplier(1, 32), 1.0);
        assert_abs_diff_eq!(placement_multiplier(2, 32), 0.7);
        assert_abs_diff_eq!(placement_multiplier(3, 32), 0.5);
        assert_abs_diff_eq!(placement_multiplier(4, 32), 0.5);
    }

    #[test]
    fn test_placement_multiplier_tail() {
        // 32-entrant field: 17th is percentile 0.5 -> 0.2, last is 1/32 -> 0.1
        assert_abs_diff_eq!(placement_multiplier(17, 32), 0.2);
        assert_abs_diff_eq!(placement_multiplier(32, 32), 0.1);
    }

    #[test]
    fn test_opponent_bonus_rewards_upsets_only() {
        assert_abs_diff_eq!(opponent_bonus(1500.0, 1000.0), 50.0);
        assert_abs_diff_eq!(opponent_bonus(1000.0, 1500.0), 0.0);
        assert_abs_diff_eq!(opponent_bonus(1000.0, 1000.0), 0.0);
    }

    #[test]
    fn test_opponent_bonus_capped() {
        assert_abs_diff_eq!(opponent_bonus(5000.0, 1000.0), 100.0);
    }

    #[test]
    fn test_activity_bonus_kicks_in_from_fifth_tournament() {
        assert_abs_diff_eq!(activity_bonus(0), 0.0);
        assert_abs_diff_eq!(activity_bonus(3), 0.0);
        // Fifth career tournament
        assert_abs_diff_eq!(activity_bonus(4), 0.0);
        assert_abs_diff_eq!(activity_bonus(5), 5.0);
        assert_abs_diff_eq!(activity_bonus(9), 25.0);
    }

    #[test]
    fn test_activity_bonus_capped() {
        assert_abs_diff_eq!(activity_bonus(100), 50.0);
    }

    #[test]
    fn test_participation_bonus_no_matches() {
        assert_abs_diff_eq!(participation_bonus(0, 0), 1.0);
    }

    #[test]
    fn test_skill_level_multiplier_applied() {
        let mut i = inputs();
        i.skill_level = Some(SkillLevel::Professional);

        let breakdown = calculate(&i).unwrap();
        assert_abs_diff_eq!(breakdown.level_multiplier, 1.5);
        assert_abs_diff_eq!(breakdown.total_points, 1725.0, epsilon = 0.01);
    }

    #[test]
    fn test_unknown_skill_level_defaults_to_one() {
        let breakdown = calculate(&inputs()).unwrap();
        assert_abs_diff_eq!(breakdown.level_multiplier, 1.0);
    }

    #[test]
    fn test_invalid_placement_rejected() {
        let mut i = inputs();
        i.placement = 0;

        assert!(matches!(calculate(&i), Err(EngineError::Validation(_))));
    }

    #[test]
    fn test_field_smaller_than_placement_rejected() {
        let mut i = inputs();
        i.placement = 10;
        i.field_size = 8;

        assert!(matches!(calculate(&i), Err(EngineError::Validation(_))));
    }

    #[test]
    fn test_deterministic() {
        let a = calculate(&inputs()).unwrap();
        let b = calculate(&inputs()).unwrap();
        assert_abs_diff_eq!(a.total_points, b.total_points);
    }
}
