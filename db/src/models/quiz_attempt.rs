use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};

/// One immutable record of a quiz submission in the `quiz_attempts` table.
///
/// Rows are append-only: an attempt is inserted exactly once per submission
/// and never updated or deleted. `attempt_number` is 1-based per
/// (user, lesson) pair and enforced unique by the schema.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "quiz_attempts")]
pub struct Model {
    /// Primary key of the attempt.
    #[sea_orm(primary_key)]
    pub id: i64,
    /// ID of the user who submitted.
    pub user_id: i64,
    /// ID of the lesson whose quiz was taken.
    pub lesson_id: i64,
    /// Raw score as submitted, 0-100.
    pub score: i32,
    /// 1-based ordinal of this attempt for the (user, lesson) pair.
    pub attempt_number: i64,
    /// Points awarded by the scoring policy for this attempt.
    pub points_earned: i64,
    /// Timestamp when the attempt was recorded.
    pub created_at: DateTime<Utc>,
}

/// Defines relationships between `quiz_attempts` and other tables.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Link to the submitting user.
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,

    /// Link to the lesson.
    #[sea_orm(
        belongs_to = "super::lesson::Entity",
        from = "Column::LessonId",
        to = "super::lesson::Column::Id"
    )]
    Lesson,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::lesson::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Lesson.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Number of attempts already recorded for this (user, lesson) pair.
    ///
    /// Generic over the connection so it can run inside or outside a
    /// transaction. Read-only.
    pub async fn count_attempts<C: ConnectionTrait>(
        conn: &C,
        user_id: i64,
        lesson_id: i64,
    ) -> Result<i64, DbErr> {
        let count = Entity::find()
            .filter(Column::UserId.eq(user_id))
            .filter(Column::LessonId.eq(lesson_id))
            .count(conn)
            .await?;
        Ok(count as i64)
    }

    /// Appends one attempt row. The caller supplies the ordinal it derived
    /// from `count_attempts`; the unique index rejects duplicates.
    pub async fn record<C: ConnectionTrait>(
        conn: &C,
        user_id: i64,
        lesson_id: i64,
        score: i32,
        attempt_number: i64,
        points_earned: i64,
    ) -> Result<Model, DbErr> {
        let active = ActiveModel {
            user_id: Set(user_id),
            lesson_id: Set(lesson_id),
            score: Set(score),
            attempt_number: Set(attempt_number),
            points_earned: Set(points_earned),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        active.insert(conn).await
    }

    /// All attempts for a (user, lesson) pair, oldest first.
    pub async fn get_by_user_and_lesson<C: ConnectionTrait>(
        conn: &C,
        user_id: i64,
        lesson_id: i64,
    ) -> Result<Vec<Model>, DbErr> {
        Entity::find()
            .filter(Column::UserId.eq(user_id))
            .filter(Column::LessonId.eq(lesson_id))
            .order_by_asc(Column::AttemptNumber)
            .all(conn)
            .await
    }
}
