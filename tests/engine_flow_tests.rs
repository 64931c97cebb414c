use approx::assert_abs_diff_eq;
use chrono::{DateTime, Duration, FixedOffset, Utc};
use rankings_processor::{
    engine::{
        decay::{run_decay_sweep, DecayConfig},
        ranking_model::RankingModel,
        standings::{CategoryFilters, Page},
        structures::{
            gender::Gender, partition_key::PartitionKey, ranking_category::RankingCategory,
            ranking_type::RankingType, tournament_level::TournamentLevel, transition_reason::TransitionReason
        }
    },
    utils::test_utils::{generate_competitor, generate_result, generate_tournament}
};
use std::collections::HashMap;

fn now() -> DateTime<FixedOffset> {
    Utc::now().fixed_offset()
}

fn months_ago(n: i64) -> DateTime<FixedOffset> {
    now() - Duration::days(30 * n + 15)
}

/// Three-competitor national event followed by a state event, checked
/// against the overall national leaderboard.
#[test]
fn test_season_flow_builds_category_leaderboards() {
    let mut model = RankingModel::new();
    let competitors: HashMap<_, _> = (1..=3)
        .map(|id| (id, generate_competitor(id, Some(11), Some(Gender::Male))))
        .collect();

    // National event: 1st, 2nd, 3rd by competitor id
    let national = generate_tournament(1, TournamentLevel::National, now());
    let results = vec![
        generate_result(1, 1, 1, 32),
        generate_result(1, 2, 2, 32),
        generate_result(1, 3, 3, 32),
    ];
    model
        .process_tournament(&national, &results, &competitors, now())
        .unwrap();

    let (rows, total) = model.tracker.standings_by_category(
        RankingType::Overall,
        RankingCategory::National,
        CategoryFilters::default(),
        Page::default()
    );

    assert_eq!(total, 3);
    assert_eq!(rows[0].competitor_id, 1);
    assert_abs_diff_eq!(rows[0].points, 1150.0, epsilon = 0.01);
    assert_eq!(rows[1].competitor_id, 2);
    assert_abs_diff_eq!(rows[1].points, 805.0, epsilon = 0.01);
    assert_eq!(rows[2].competitor_id, 3);
    assert_abs_diff_eq!(rows[2].points, 575.0, epsilon = 0.01);

    // State event won by competitor 3 brings them level with competitor 1
    // at 1150; the earlier id keeps the higher position.
    let state = generate_tournament(2, TournamentLevel::State, now());
    model
        .process_tournament(&state, &[generate_result(2, 3, 1, 16)], &competitors, now())
        .unwrap();

    let (rows, _) = model.tracker.standings_by_category(
        RankingType::Overall,
        RankingCategory::National,
        CategoryFilters::default(),
        Page::default()
    );

    assert_abs_diff_eq!(rows[1].points, 1150.0, epsilon = 0.01);
    assert_eq!(rows[0].competitor_id, 1);
    assert_eq!(rows[0].position, 1);
    assert_eq!(rows[1].competitor_id, 3);
    assert_eq!(rows[1].position, 2);
    assert_eq!(rows[2].competitor_id, 2);
    assert_eq!(rows[2].position, 3);
}

#[test]
fn test_gender_partitions_only_hold_matching_competitors() {
    let mut model = RankingModel::new();
    let competitors: HashMap<_, _> = vec![
        generate_competitor(1, Some(11), Some(Gender::Female)),
        generate_competitor(2, Some(11), Some(Gender::Male)),
    ]
    .into_iter()
    .map(|c| (c.id, c))
    .collect();

    let tournament = generate_tournament(1, TournamentLevel::National, now());
    let results = vec![generate_result(1, 1, 1, 16), generate_result(1, 2, 2, 16)];
    model
        .process_tournament(&tournament, &results, &competitors, now())
        .unwrap();

    let filters = CategoryFilters {
        gender: Some(Gender::Female),
        ..Default::default()
    };
    let (rows, total) = model.tracker.standings_by_category(
        RankingType::Overall,
        RankingCategory::Gender,
        filters,
        Page::default()
    );

    assert_eq!(total, 1);
    assert_eq!(rows[0].competitor_id, 1);
    // Alone in her gender partition despite finishing first overall too
    assert_eq!(rows[0].position, 1);
}

#[test]
fn test_history_tracks_each_tournament_newest_first() {
    let mut model = RankingModel::new();
    let competitors: HashMap<_, _> = vec![(1, generate_competitor(1, None, None))].into_iter().collect();

    for tournament_id in 1..=3 {
        let tournament = generate_tournament(tournament_id, TournamentLevel::Local, now());
        model
            .process_tournament(
                &tournament,
                &[generate_result(tournament_id, 1, 1, 8)],
                &competitors,
                now()
            )
            .unwrap();
    }

    let history = model
        .ledger
        .history_for_competitor(1, Some(RankingType::Overall), Some(RankingCategory::National), 10);

    assert_eq!(history.len(), 3);
    assert_eq!(history[0].tournament_id, Some(3));
    assert_eq!(history[2].tournament_id, Some(1));
    for t in &history {
        assert_eq!(t.reason, TransitionReason::TournamentCompletion);
        // A lone competitor always reconciles to position 1
        assert_eq!(t.new_position, 1);
    }
}

#[test]
fn test_decay_sweep_discounts_and_notifies_after_inactivity() {
    let mut model = RankingModel::new();
    let competitors: HashMap<_, _> = vec![(1, generate_competitor(1, None, None))].into_iter().collect();

    // Last played eight months ago
    let tournament = generate_tournament(1, TournamentLevel::National, months_ago(8));
    model
        .process_tournament(&tournament, &[generate_result(1, 1, 1, 32)], &competitors, now())
        .unwrap();

    let report = run_decay_sweep(&mut model.tracker, &mut model.ledger, now(), DecayConfig::default());

    assert!(report.discounts.is_complete_success());
    assert_eq!(report.affected_competitors(), vec![1]);

    let overall = PartitionKey::national(RankingType::Overall);
    let standing = model.tracker.get(1, &overall).unwrap();
    assert_abs_diff_eq!(standing.points, 1092.5, epsilon = 0.01);
    assert_abs_diff_eq!(standing.decay_factor, 0.95);

    let latest = model.ledger.history_for_competitor(1, Some(RankingType::Overall), None, 1);
    assert_eq!(latest[0].reason, TransitionReason::Decay);
}

/// A decay sweep that re-ranks a competitor whose own points did not change
/// must leave that competitor's already-persisted transitions untouched.
#[test]
fn test_decay_rerank_leaves_persisted_history_intact() {
    let mut model = RankingModel::new();
    let competitors: HashMap<_, _> = vec![
        (1, generate_competitor(1, None, None)),
        (2, generate_competitor(2, None, None)),
    ]
    .into_iter()
    .collect();

    // Competitor 1 leads on an old national win; competitor 2 sits close
    // behind on two recent state wins.
    let old_national = generate_tournament(1, TournamentLevel::National, months_ago(8));
    model
        .process_tournament(&old_national, &[generate_result(1, 1, 1, 32)], &competitors, now())
        .unwrap();
    for tournament_id in 2..=3 {
        let state = generate_tournament(tournament_id, TournamentLevel::State, now());
        model
            .process_tournament(&state, &[generate_result(tournament_id, 2, 1, 16)], &competitors, now())
            .unwrap();
    }
    model.ledger.mark_saved();

    let overall = PartitionKey::national(RankingType::Overall);
    assert_eq!(model.tracker.get(1, &overall).unwrap().position, 1);
    let saved = model.ledger.history_for_competitor(2, Some(RankingType::Overall), None, 1);
    assert_eq!(saved[0].new_position, 2);
    assert_eq!(saved[0].tournament_id, Some(3));

    // Decay drops competitor 1 to 1092.5, flipping the lead to competitor 2
    let report = run_decay_sweep(&mut model.tracker, &mut model.ledger, now(), DecayConfig::default());
    assert!(report.discounts.is_complete_success());
    assert_eq!(model.tracker.get(2, &overall).unwrap().position, 1);

    // Competitor 2's persisted transition still reads exactly as saved
    let history = model.ledger.history_for_competitor(2, Some(RankingType::Overall), None, 1);
    assert_eq!(history[0].new_position, 2);
    assert_eq!(history[0].tournament_id, Some(3));
    assert_eq!(history[0].reason, TransitionReason::TournamentCompletion);

    // Only competitor 1's decay rows are pending persistence
    assert!(!model.ledger.unsaved().is_empty());
    for t in model.ledger.unsaved() {
        assert_eq!(t.competitor_id, 1);
        assert_eq!(t.reason, TransitionReason::Decay);
    }
}

#[test]
fn test_ledger_watermark_drains_each_batch_once() {
    let mut model = RankingModel::new();
    let competitors: HashMap<_, _> = vec![(1, generate_competitor(1, None, None))].into_iter().collect();

    let first = generate_tournament(1, TournamentLevel::Local, now());
    model
        .process_tournament(&first, &[generate_result(1, 1, 1, 8)], &competitors, now())
        .unwrap();

    // Minimal profile fans out to the 4 national partitions
    assert_eq!(model.ledger.unsaved().len(), 4);
    model.ledger.mark_saved();
    assert!(model.ledger.unsaved().is_empty());

    let second = generate_tournament(2, TournamentLevel::Local, now());
    model
        .process_tournament(&second, &[generate_result(2, 1, 1, 8)], &competitors, now())
        .unwrap();

    let unsaved = model.ledger.unsaved();
    assert_eq!(unsaved.len(), 4);
    for t in unsaved {
        assert_eq!(t.tournament_id, Some(2));
    }
}
