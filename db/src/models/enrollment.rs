use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    IntoActiveModel, QueryFilter, Set,
};
use serde::{Deserialize, Serialize};

/// Lifecycle of a course enrollment.
#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "enrollment_status_enum")]
pub enum EnrollmentStatus {
    /// Still working through the course.
    #[sea_orm(string_value = "active")]
    Active,
    /// Every lesson in the course is completed.
    #[sea_orm(string_value = "completed")]
    Completed,
}

impl Default for EnrollmentStatus {
    fn default() -> Self {
        Self::Active
    }
}

impl std::fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status_str = match self {
            EnrollmentStatus::Active => "active",
            EnrollmentStatus::Completed => "completed",
        };
        write!(f, "{}", status_str)
    }
}

/// A user's enrollment in a course, in the `enrollments` table, carrying the
/// derived completion percentage.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "enrollments")]
pub struct Model {
    /// Primary key ID (auto-incremented).
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Foreign key to the user.
    pub user_id: i64,
    /// Foreign key to the course.
    pub course_id: i64,
    /// Rounded percentage of the course's lessons this user has completed.
    pub progress_percent: i32,
    /// `Completed` exactly when `progress_percent` reaches 100.
    pub status: EnrollmentStatus,
    /// Timestamp when the enrollment was created.
    pub created_at: DateTime<Utc>,
    /// Timestamp when the enrollment was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Defines relationships between `enrollments` and other tables.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Link to the related user.
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,

    /// Link to the related course.
    #[sea_orm(
        belongs_to = "super::course::Entity",
        from = "Column::CourseId",
        to = "super::course::Column::Id"
    )]
    Course,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::course::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Course.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Enrolls a user into a course. Enrolling twice is a no-op that returns
    /// the existing row.
    pub async fn enroll(
        db: &DatabaseConnection,
        user_id: i64,
        course_id: i64,
    ) -> Result<Model, DbErr> {
        if let Some(existing) = Self::get_by_user_and_course(db, user_id, course_id).await? {
            return Ok(existing);
        }
        let now = Utc::now();
        let active = ActiveModel {
            user_id: Set(user_id),
            course_id: Set(course_id),
            progress_percent: Set(0),
            status: Set(EnrollmentStatus::Active),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        active.insert(db).await
    }

    pub async fn get_by_user_and_course<C: ConnectionTrait>(
        conn: &C,
        user_id: i64,
        course_id: i64,
    ) -> Result<Option<Model>, DbErr> {
        Entity::find()
            .filter(Column::UserId.eq(user_id))
            .filter(Column::CourseId.eq(course_id))
            .one(conn)
            .await
    }

    /// Recomputes `progress_percent` from the lesson completion flags and
    /// flips the status to `Completed` at 100%.
    ///
    /// Returns `None` when the user is not enrolled in the course; course
    /// progress only exists for enrolled users.
    pub async fn recompute_progress<C: ConnectionTrait>(
        conn: &C,
        user_id: i64,
        course_id: i64,
    ) -> Result<Option<Model>, DbErr> {
        let Some(enrollment) = Self::get_by_user_and_course(conn, user_id, course_id).await?
        else {
            return Ok(None);
        };

        let total = super::lesson::Model::count_for_course(conn, course_id).await?;
        let completed =
            super::lesson_progress::Model::count_completed_for_course(conn, user_id, course_id)
                .await?;

        let percent = if total == 0 {
            0
        } else {
            ((completed as f64 / total as f64) * 100.0).round() as i32
        };

        let mut active = enrollment.into_active_model();
        active.progress_percent = Set(percent);
        active.status = Set(if percent == 100 {
            EnrollmentStatus::Completed
        } else {
            EnrollmentStatus::Active
        });
        active.updated_at = Set(Utc::now());
        active.update(conn).await.map(Some)
    }
}
