use sea_orm_migration::prelude::*;

use crate::migrations;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(migrations::m202608290001_create_users::Migration),
            Box::new(migrations::m202608290002_create_courses::Migration),
            Box::new(migrations::m202608290003_create_lessons::Migration),
            Box::new(migrations::m202608290004_create_quiz_attempts::Migration),
            Box::new(migrations::m202608290005_create_lesson_progress::Migration),
            Box::new(migrations::m202608290006_create_enrollments::Migration),
        ]
    }
}
