pub mod m202608290001_create_users;
pub mod m202608290002_create_courses;
pub mod m202608290003_create_lessons;
pub mod m202608290004_create_quiz_attempts;
pub mod m202608290005_create_lesson_progress;
pub mod m202608290006_create_enrollments;
