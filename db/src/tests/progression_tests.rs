use std::sync::Arc;

use sea_orm::{ActiveModelTrait, ConnectionTrait, DatabaseConnection, IntoActiveModel, Set};

use crate::models::{course, enrollment, lesson, lesson_progress, quiz_attempt, user};
use crate::progression::{ProgressionConfig, ProgressionEngine, ProgressionError};
use crate::ranks::RankLadder;
use crate::scoring::ScoringPolicy;
use crate::test_utils::setup_test_db;

/// Engine with the legacy 70 / 0.5 preset most of the scenarios below use.
fn halving_engine(db: DatabaseConnection) -> ProgressionEngine {
    ProgressionEngine::new(
        db,
        ProgressionConfig {
            policy: ScoringPolicy::halving(),
            ladder: RankLadder::default(),
        },
    )
}

async fn seed_user_and_lesson(
    db: &DatabaseConnection,
    base_points: i64,
) -> (user::Model, lesson::Model) {
    let ladder = RankLadder::default();
    let u = user::Model::create(db, "learner", "learner@test.com", "pw", false, ladder.floor())
        .await
        .unwrap();
    let c = course::Model::create(db, "Rust 101", None).await.unwrap();
    let l = lesson::Model::create(db, c.id, "Ownership", base_points)
        .await
        .unwrap();
    (u, l)
}

async fn set_points(db: &DatabaseConnection, u: user::Model, points: i64, rank: &str) -> user::Model {
    let mut active = u.into_active_model();
    active.points = Set(points);
    active.rank = Set(rank.to_owned());
    active.update(db).await.unwrap()
}

#[tokio::test]
async fn passing_first_attempt_awards_full_base_points() {
    let db = setup_test_db().await;
    let (u, l) = seed_user_and_lesson(&db, 100).await;
    let engine = halving_engine(db.clone());

    let result = engine.submit_quiz(u.id, l.id, 85).await.unwrap();
    assert_eq!(result.attempt.attempt_number, 1);
    assert_eq!(result.attempt.score, 85);
    assert_eq!(result.attempt.points_earned, 100);
    assert_eq!(result.total_points, 100);
    // 100 points lands on the Expert tier of the default ladder.
    assert_eq!(result.new_rank.as_deref(), Some("Expert"));

    let result = engine.submit_quiz(u.id, l.id, 90).await.unwrap();
    assert_eq!(result.attempt.attempt_number, 2);
    assert_eq!(result.attempt.points_earned, 50);
    assert_eq!(result.total_points, 150);
    assert_eq!(result.new_rank.as_deref(), Some("Master"));

    let stored = user::Model::find_by_id(&db, u.id).await.unwrap().unwrap();
    assert_eq!(stored.points, 150);
    assert_eq!(stored.rank, "Master");
    assert_eq!(stored.level, 2);
}

#[tokio::test]
async fn failing_submission_records_a_zero_point_attempt_and_changes_nothing_else() {
    let db = setup_test_db().await;
    let (u, l) = seed_user_and_lesson(&db, 100).await;
    let engine = halving_engine(db.clone());

    let result = engine.submit_quiz(u.id, l.id, 50).await.unwrap();
    assert_eq!(result.attempt.attempt_number, 1);
    assert_eq!(result.attempt.points_earned, 0);
    assert_eq!(result.total_points, 0);
    assert!(result.new_rank.is_none());

    // The attempt exists, but nothing else moved.
    assert_eq!(quiz_attempt::Model::count_attempts(&db, u.id, l.id).await.unwrap(), 1);
    let stored = user::Model::find_by_id(&db, u.id).await.unwrap().unwrap();
    assert_eq!(stored.points, 0);
    assert_eq!(stored.rank, "Newbie");
    let progress = lesson_progress::Model::get_by_user_and_lesson(&db, u.id, l.id)
        .await
        .unwrap();
    assert!(progress.is_none());
}

#[tokio::test]
async fn failed_submission_reports_the_stored_total() {
    let db = setup_test_db().await;
    let (u, l) = seed_user_and_lesson(&db, 100).await;
    let u = set_points(&db, u, 50, "Explorer").await;
    let engine = halving_engine(db.clone());

    // No points awarded, but the returned total is the user's current
    // balance, not zero and not a pre-submission snapshot.
    let result = engine.submit_quiz(u.id, l.id, 30).await.unwrap();
    assert_eq!(result.attempt.points_earned, 0);
    assert_eq!(result.total_points, 50);
}

#[tokio::test]
async fn rank_transition_happens_with_the_point_update() {
    let db = setup_test_db().await;
    let (u, l) = seed_user_and_lesson(&db, 10).await;
    let u = set_points(&db, u, 95, "Specialist").await;
    let engine = halving_engine(db.clone());

    // +10 moves 95 -> 105, crossing the Expert threshold at 100.
    let result = engine.submit_quiz(u.id, l.id, 85).await.unwrap();
    assert_eq!(result.total_points, 105);
    assert_eq!(result.new_rank.as_deref(), Some("Expert"));

    let stored = user::Model::find_by_id(&db, u.id).await.unwrap().unwrap();
    assert_eq!(stored.points, 105);
    assert_eq!(stored.rank, "Expert");
    assert_eq!(stored.level, 1);
}

#[tokio::test]
async fn rank_stays_put_when_no_threshold_is_crossed() {
    let db = setup_test_db().await;
    let (u, l) = seed_user_and_lesson(&db, 5).await;
    let engine = halving_engine(db.clone());

    let result = engine.submit_quiz(u.id, l.id, 100).await.unwrap();
    assert_eq!(result.total_points, 5);
    assert!(result.new_rank.is_none());

    let stored = user::Model::find_by_id(&db, u.id).await.unwrap().unwrap();
    assert_eq!(stored.rank, "Newbie");
    assert_eq!(stored.level, 0);
}

#[tokio::test]
async fn sequential_submissions_get_gap_free_ordinals() {
    let db = setup_test_db().await;
    let (u, l) = seed_user_and_lesson(&db, 100).await;
    let engine = halving_engine(db.clone());

    for expected in 1..=5 {
        let result = engine.submit_quiz(u.id, l.id, 60).await.unwrap();
        assert_eq!(result.attempt.attempt_number, expected);
    }

    let attempts = quiz_attempt::Model::get_by_user_and_lesson(&db, u.id, l.id)
        .await
        .unwrap();
    let ordinals: Vec<i64> = attempts.iter().map(|a| a.attempt_number).collect();
    assert_eq!(ordinals, vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn concurrent_submissions_serialize_per_pair() {
    let db = setup_test_db().await;
    let (u, l) = seed_user_and_lesson(&db, 100).await;
    let engine = Arc::new(halving_engine(db.clone()));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let engine = Arc::clone(&engine);
        let (user_id, lesson_id) = (u.id, l.id);
        handles.push(tokio::spawn(async move {
            engine.submit_quiz(user_id, lesson_id, 85).await
        }));
    }
    for outcome in futures::future::join_all(handles).await {
        outcome.unwrap().unwrap();
    }

    let attempts = quiz_attempt::Model::get_by_user_and_lesson(&db, u.id, l.id)
        .await
        .unwrap();
    let ordinals: Vec<i64> = attempts.iter().map(|a| a.attempt_number).collect();
    assert_eq!(ordinals, (1..=8).collect::<Vec<i64>>());

    // Awards follow the ordinals, whatever order the tasks ran in:
    // 100 + 50 + 25 + 12 + 6 + 3 + 1 + 0.
    let stored = user::Model::find_by_id(&db, u.id).await.unwrap().unwrap();
    assert_eq!(stored.points, 197);
}

#[tokio::test]
async fn concurrent_submissions_across_lessons_accumulate_all_points() {
    let db = setup_test_db().await;
    let ladder = RankLadder::default();
    let u = user::Model::create(&db, "learner", "learner@test.com", "pw", false, ladder.floor())
        .await
        .unwrap();
    let c = course::Model::create(&db, "Rust 101", None).await.unwrap();
    let l1 = lesson::Model::create(&db, c.id, "One", 100).await.unwrap();
    let l2 = lesson::Model::create(&db, c.id, "Two", 100).await.unwrap();
    let engine = Arc::new(halving_engine(db.clone()));

    // Different lessons take different pair locks, so these first attempts
    // run unserialized; both awards must land on the user's balance.
    let mut handles = Vec::new();
    for lesson_id in [l1.id, l2.id] {
        let engine = Arc::clone(&engine);
        let user_id = u.id;
        handles.push(tokio::spawn(async move {
            engine.submit_quiz(user_id, lesson_id, 85).await
        }));
    }
    for outcome in futures::future::join_all(handles).await {
        outcome.unwrap().unwrap();
    }

    let stored = user::Model::find_by_id(&db, u.id).await.unwrap().unwrap();
    assert_eq!(stored.points, 200);
}

#[tokio::test]
async fn pair_locks_are_released_once_submissions_drain() {
    let db = setup_test_db().await;
    let (u, l) = seed_user_and_lesson(&db, 100).await;
    let engine = Arc::new(halving_engine(db.clone()));

    let mut handles = Vec::new();
    for _ in 0..4 {
        let engine = Arc::clone(&engine);
        let (user_id, lesson_id) = (u.id, l.id);
        handles.push(tokio::spawn(async move {
            engine.submit_quiz(user_id, lesson_id, 85).await
        }));
    }
    for outcome in futures::future::join_all(handles).await {
        outcome.unwrap().unwrap();
    }
    engine.submit_quiz(u.id, l.id, 10).await.unwrap();

    // The lock registry is bounded by in-flight submissions, not by how
    // many distinct pairs have ever submitted.
    assert_eq!(engine.pair_lock_count().await, 0);
}

#[tokio::test]
async fn points_never_decrease_across_a_submission_sequence() {
    let db = setup_test_db().await;
    let (u, l) = seed_user_and_lesson(&db, 40).await;
    let engine = halving_engine(db.clone());

    let mut last_total = 0;
    for score in [90, 10, 75, 0, 100, 55] {
        engine.submit_quiz(u.id, l.id, score).await.unwrap();
        let stored = user::Model::find_by_id(&db, u.id).await.unwrap().unwrap();
        assert!(stored.points >= last_total);
        last_total = stored.points;
    }
}

#[tokio::test]
async fn passing_marks_the_lesson_and_updates_course_progress() {
    let db = setup_test_db().await;
    let ladder = RankLadder::default();
    let u = user::Model::create(&db, "learner", "learner@test.com", "pw", false, ladder.floor())
        .await
        .unwrap();
    let c = course::Model::create(&db, "Rust 101", None).await.unwrap();
    let l1 = lesson::Model::create(&db, c.id, "One", 10).await.unwrap();
    let l2 = lesson::Model::create(&db, c.id, "Two", 10).await.unwrap();
    enrollment::Model::enroll(&db, u.id, c.id).await.unwrap();
    let engine = halving_engine(db.clone());

    engine.submit_quiz(u.id, l1.id, 90).await.unwrap();
    let e = enrollment::Model::get_by_user_and_course(&db, u.id, c.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(e.progress_percent, 50);
    assert_eq!(e.status, enrollment::EnrollmentStatus::Active);

    // Re-passing the same lesson must not inflate the percentage.
    engine.submit_quiz(u.id, l1.id, 95).await.unwrap();
    let e = enrollment::Model::get_by_user_and_course(&db, u.id, c.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(e.progress_percent, 50);

    engine.submit_quiz(u.id, l2.id, 90).await.unwrap();
    let e = enrollment::Model::get_by_user_and_course(&db, u.id, c.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(e.progress_percent, 100);
    assert_eq!(e.status, enrollment::EnrollmentStatus::Completed);
}

#[tokio::test]
async fn unknown_lesson_or_user_fails_before_any_write() {
    let db = setup_test_db().await;
    let (u, l) = seed_user_and_lesson(&db, 100).await;
    let engine = halving_engine(db.clone());

    assert!(matches!(
        engine.submit_quiz(u.id, 9999, 85).await,
        Err(ProgressionError::LessonNotFound(9999))
    ));
    assert!(matches!(
        engine.submit_quiz(9999, l.id, 85).await,
        Err(ProgressionError::UserNotFound(9999))
    ));
    assert!(matches!(
        engine.submit_quiz(u.id, l.id, 101).await,
        Err(ProgressionError::InvalidArgument(_))
    ));

    assert_eq!(quiz_attempt::Model::count_attempts(&db, u.id, l.id).await.unwrap(), 0);
}

#[tokio::test]
async fn storage_fault_mid_submission_leaves_no_partial_state() {
    let db = setup_test_db().await;
    let (u, l) = seed_user_and_lesson(&db, 100).await;
    let engine = halving_engine(db.clone());

    // Break the completion upsert; the attempt insert and the point
    // increment that already ran inside the transaction must roll back.
    db.execute_unprepared("DROP TABLE lesson_progress").await.unwrap();

    let result = engine.submit_quiz(u.id, l.id, 90).await;
    assert!(matches!(result, Err(ProgressionError::TransactionAborted(_))));

    assert_eq!(quiz_attempt::Model::count_attempts(&db, u.id, l.id).await.unwrap(), 0);
    let stored = user::Model::find_by_id(&db, u.id).await.unwrap().unwrap();
    assert_eq!(stored.points, 0);
    assert_eq!(stored.rank, "Newbie");
}
