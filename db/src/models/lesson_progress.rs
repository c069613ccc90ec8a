use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, IntoActiveModel,
    PaginatorTrait, QueryFilter, QuerySelect, QueryTrait, Set,
};
use serde::{Deserialize, Serialize};

/// Per-user completion flag for a single lesson, in the `lesson_progress`
/// table. One row per (user, lesson); once `completed` is true it never
/// reverts.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "lesson_progress")]
pub struct Model {
    /// Primary key ID (auto-incremented).
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Foreign key to the user.
    pub user_id: i64,
    /// Foreign key to the lesson.
    pub lesson_id: i64,
    /// Whether the user has completed this lesson.
    pub completed: bool,
    /// When the lesson was first completed, if it has been.
    pub completed_at: Option<DateTime<Utc>>,
    /// Timestamp when this record was created.
    pub created_at: DateTime<Utc>,
}

/// Defines relationships between `lesson_progress` and other tables.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Link to the related user.
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,

    /// Link to the related lesson.
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
    pub async fn get_by_user_and_lesson<C: ConnectionTrait>(
        conn: &C,
        user_id: i64,
        lesson_id: i64,
    ) -> Result<Option<Model>, DbErr> {
        Entity::find()
            .filter(Column::UserId.eq(user_id))
            .filter(Column::LessonId.eq(lesson_id))
            .one(conn)
            .await
    }

    /// Idempotent upsert to `completed = true` for a (user, lesson) pair.
    ///
    /// A row that is already completed is returned unchanged, keeping its
    /// original `completed_at`.
    pub async fn mark_completed<C: ConnectionTrait>(
        conn: &C,
        user_id: i64,
        lesson_id: i64,
    ) -> Result<Model, DbErr> {
        match Self::get_by_user_and_lesson(conn, user_id, lesson_id).await? {
            Some(existing) if existing.completed => Ok(existing),
            Some(existing) => {
                let mut active = existing.into_active_model();
                active.completed = Set(true);
                active.completed_at = Set(Some(Utc::now()));
                active.update(conn).await
            }
            None => {
                let now = Utc::now();
                let active = ActiveModel {
                    user_id: Set(user_id),
                    lesson_id: Set(lesson_id),
                    completed: Set(true),
                    completed_at: Set(Some(now)),
                    created_at: Set(now),
                    ..Default::default()
                };
                active.insert(conn).await
            }
        }
    }

    /// Number of lessons of the given course this user has completed.
    pub async fn count_completed_for_course<C: ConnectionTrait>(
        conn: &C,
        user_id: i64,
        course_id: i64,
    ) -> Result<u64, DbErr> {
        let course_lessons = super::lesson::Entity::find()
            .select_only()
            .column(super::lesson::Column::Id)
            .filter(super::lesson::Column::CourseId.eq(course_id));

        Entity::find()
            .filter(Column::UserId.eq(user_id))
            .filter(Column::Completed.eq(true))
            .filter(Column::LessonId.in_subquery(course_lessons.as_query().to_owned()))
            .count(conn)
            .await
    }
}
