//! Quiz progression engine.
//!
//! This module owns the end-to-end quiz submission: it derives the attempt
//! ordinal from the attempt ledger, applies the scoring policy, and commits
//! the attempt row, the user's point/rank update, the lesson completion flag
//! and the course completion percentage as one transaction. It is the only
//! writer of the user's gamification state.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait,
    IntoActiveModel, QueryFilter, Set, TransactionTrait,
};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::models::{enrollment, lesson, lesson_progress, quiz_attempt, user};
use crate::ranks::RankLadder;
use crate::scoring::ScoringPolicy;

/// Result type for progression operations
pub type ProgressionResult<T> = Result<T, ProgressionError>;

/// Errors that can surface from a quiz submission
#[derive(Debug, thiserror::Error)]
pub enum ProgressionError {
    #[error("Lesson {0} not found")]
    LessonNotFound(i64),

    #[error("User {0} not found")]
    UserNotFound(i64),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Storage error: {0}")]
    Storage(#[from] DbErr),

    #[error("Submission aborted, no state was changed: {0}")]
    TransactionAborted(String),
}

/// Tuning for the engine: which scoring preset and which rank ladder this
/// deployment runs.
#[derive(Debug, Clone, Default)]
pub struct ProgressionConfig {
    pub policy: ScoringPolicy,
    pub ladder: RankLadder,
}

impl ProgressionConfig {
    /// Scoring knobs from the environment, default rank ladder.
    pub fn from_config() -> ProgressionResult<Self> {
        Ok(Self {
            policy: ScoringPolicy::from_config()?,
            ladder: RankLadder::default(),
        })
    }
}

/// What a submission produced: the immutable attempt row, the rank the user
/// moved to (when it changed), and their post-submission point total.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionResult {
    pub attempt: quiz_attempt::Model,
    pub new_rank: Option<String>,
    pub total_points: i64,
}

/// The coordinator for quiz submissions.
///
/// The connection is passed in explicitly; the engine is cheap to construct
/// per process and deliberately not a global.
pub struct ProgressionEngine {
    db: DatabaseConnection,
    config: ProgressionConfig,
    /// One guard per (user, lesson) pair. Two concurrent submissions for the
    /// same pair must not observe the same attempt count, so the guard is
    /// held from the count through commit.
    pair_locks: Mutex<HashMap<(i64, i64), Arc<Mutex<()>>>>,
}

impl ProgressionEngine {
    pub fn new(db: DatabaseConnection, config: ProgressionConfig) -> Self {
        Self {
            db,
            config,
            pair_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn new_default(db: DatabaseConnection) -> Self {
        Self::new(db, ProgressionConfig::default())
    }

    pub fn config(&self) -> &ProgressionConfig {
        &self.config
    }

    /// Submits a quiz score for a lesson.
    ///
    /// The score is trusted input from the quiz player (the broader system
    /// grades client-side and posts only the percentage); it is validated for
    /// range, not against an answer key.
    ///
    /// Steps 1-3 (validation, attempt count, scoring) happen before any
    /// write; the attempt insert, point increment, rank recompute, lesson
    /// completion and course percentage then commit atomically. A failed
    /// submission leaves no observable state, including no attempt row.
    pub async fn submit_quiz(
        &self,
        user_id: i64,
        lesson_id: i64,
        score: i32,
    ) -> ProgressionResult<SubmissionResult> {
        if !(0..=100).contains(&score) {
            return Err(ProgressionError::InvalidArgument(format!(
                "score {score} is outside 0-100"
            )));
        }

        let lesson = lesson::Model::find_by_id(&self.db, lesson_id)
            .await?
            .ok_or(ProgressionError::LessonNotFound(lesson_id))?;
        if lesson.base_points < 0 {
            return Err(ProgressionError::InvalidArgument(format!(
                "lesson {lesson_id} has negative base_points"
            )));
        }

        if user::Model::find_by_id(&self.db, user_id).await?.is_none() {
            return Err(ProgressionError::UserNotFound(user_id));
        }

        let lock = self.pair_lock(user_id, lesson_id).await;
        let result = {
            let _guard = lock.lock().await;
            self.submit_locked(&lesson, user_id, score).await
        };
        drop(lock);
        self.evict_pair_lock(user_id, lesson_id).await;
        result
    }

    /// The guarded section of a submission: runs with the (user, lesson)
    /// lock held, from the attempt count through commit.
    async fn submit_locked(
        &self,
        lesson: &lesson::Model,
        user_id: i64,
        score: i32,
    ) -> ProgressionResult<SubmissionResult> {
        let prior_attempts =
            quiz_attempt::Model::count_attempts(&self.db, user_id, lesson.id).await?;
        let attempt_number = prior_attempts + 1;
        let points_awarded =
            self.config
                .policy
                .points_awarded(score, attempt_number, lesson.base_points)?;

        debug!(
            "user {} scored {} on lesson {} (attempt {}): awarding {} points",
            user_id, score, lesson.id, attempt_number, points_awarded
        );

        let txn = self.db.begin().await?;
        let applied = self
            .apply_submission(&txn, lesson, user_id, score, attempt_number, points_awarded)
            .await;

        match applied {
            Ok(result) => {
                txn.commit()
                    .await
                    .map_err(|e| ProgressionError::TransactionAborted(e.to_string()))?;

                if let Some(rank) = &result.new_rank {
                    info!(
                        "user {} reached rank '{}' at {} points",
                        user_id, rank, result.total_points
                    );
                }
                Ok(result)
            }
            Err(e) => {
                let _ = txn.rollback().await;
                Err(ProgressionError::TransactionAborted(e.to_string()))
            }
        }
    }

    /// The transactional body of a submission. Every write goes through the
    /// supplied transaction; any error aborts the whole submission.
    async fn apply_submission(
        &self,
        txn: &DatabaseTransaction,
        lesson: &lesson::Model,
        user_id: i64,
        score: i32,
        attempt_number: i64,
        points_awarded: i64,
    ) -> Result<SubmissionResult, DbErr> {
        // The attempt row is written even for a zero-point submission; a
        // failed attempt still counts toward the ordinal.
        let attempt = quiz_attempt::Model::record(
            txn,
            user_id,
            lesson.id,
            score,
            attempt_number,
            points_awarded,
        )
        .await?;

        if points_awarded == 0 {
            // The total reported back is read inside the transaction, so it
            // reflects any points earned on other lessons in the meantime.
            let user = Self::user_in_txn(txn, user_id).await?;
            return Ok(SubmissionResult {
                attempt,
                new_rank: None,
                total_points: user.points,
            });
        }

        // Increment in place; the pair lock does not cover submissions by
        // the same user on other lessons, so a read-modify-write here could
        // lose their points.
        user::Entity::update_many()
            .col_expr(
                user::Column::Points,
                Expr::col(user::Column::Points).add(points_awarded),
            )
            .col_expr(user::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(user::Column::Id.eq(user_id))
            .exec(txn)
            .await?;

        let user = Self::user_in_txn(txn, user_id).await?;
        let total_points = user.points;
        let new_rank = self.config.ladder.rank_for(total_points).to_string();
        let rank_changed = new_rank != user.rank;
        let level = user.level;

        if rank_changed {
            let mut active = user.into_active_model();
            active.rank = Set(new_rank.clone());
            active.level = Set(level + 1);
            active.update(txn).await?;
        }

        lesson_progress::Model::mark_completed(txn, user_id, lesson.id).await?;
        enrollment::Model::recompute_progress(txn, user_id, lesson.course_id).await?;

        Ok(SubmissionResult {
            attempt,
            new_rank: rank_changed.then_some(new_rank),
            total_points,
        })
    }

    async fn user_in_txn(
        txn: &DatabaseTransaction,
        user_id: i64,
    ) -> Result<user::Model, DbErr> {
        user::Entity::find_by_id(user_id)
            .one(txn)
            .await?
            .ok_or_else(|| {
                DbErr::RecordNotFound(format!("User {user_id} disappeared mid-submission"))
            })
    }

    async fn pair_lock(&self, user_id: i64, lesson_id: i64) -> Arc<Mutex<()>> {
        let mut locks = self.pair_locks.lock().await;
        locks
            .entry((user_id, lesson_id))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drops the pair's lock entry once no submission holds it, so the
    /// registry stays proportional to in-flight submissions.
    async fn evict_pair_lock(&self, user_id: i64, lesson_id: i64) {
        let mut locks = self.pair_locks.lock().await;
        if let Some(entry) = locks.get(&(user_id, lesson_id)) {
            if Arc::strong_count(entry) == 1 {
                locks.remove(&(user_id, lesson_id));
            }
        }
    }

    #[cfg(test)]
    pub(crate) async fn pair_lock_count(&self) -> usize {
        self.pair_locks.lock().await.len()
    }
}
