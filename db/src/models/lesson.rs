use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, Set,
};
use serde::{Deserialize, Serialize};

/// Represents a lesson in the `lessons` table.
///
/// `base_points` is the maximum the lesson's quiz can award; the scoring
/// policy decays it per retry.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "lessons")]
pub struct Model {
    /// Primary key ID (auto-incremented).
    #[sea_orm(primary_key)]
    pub id: i64,
    /// ID of the course this lesson belongs to.
    pub course_id: i64,
    /// Lesson title.
    pub title: String,
    /// Maximum quiz points for a first-attempt pass.
    pub base_points: i64,
    /// Timestamp when the lesson was created.
    pub created_at: DateTime<Utc>,
    /// Timestamp when the lesson was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Defines relationships between `lessons` and other tables.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Link to the parent course.
    #[sea_orm(
        belongs_to = "super::course::Entity",
        from = "Column::CourseId",
        to = "super::course::Column::Id"
    )]
    Course,

    /// Quiz attempts recorded against this lesson.
    #[sea_orm(has_many = "super::quiz_attempt::Entity")]
    QuizAttempt,
}

impl Related<super::course::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Course.def()
    }
}

impl Related<super::quiz_attempt::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::QuizAttempt.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub async fn create(
        db: &DatabaseConnection,
        course_id: i64,
        title: &str,
        base_points: i64,
    ) -> Result<Model, DbErr> {
        let now = Utc::now();
        let active = ActiveModel {
            course_id: Set(course_id),
            title: Set(title.to_owned()),
            base_points: Set(base_points),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        active.insert(db).await
    }

    pub async fn find_by_id(
        db: &DatabaseConnection,
        id: i64,
    ) -> Result<Option<Model>, DbErr> {
        Entity::find_by_id(id).one(db).await
    }

    /// Total number of lessons in a course, the denominator for course
    /// completion percentages.
    pub async fn count_for_course<C: ConnectionTrait>(
        conn: &C,
        course_id: i64,
    ) -> Result<u64, DbErr> {
        Entity::find()
            .filter(Column::CourseId.eq(course_id))
            .count(conn)
            .await
    }
}
