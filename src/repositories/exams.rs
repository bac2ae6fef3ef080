use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::Exam;
use crate::db::types::ExamStatus;

pub(crate) const COLUMNS: &str = "\
    id, title, description, created_by, duration_minutes, passing_marks, max_attempts, \
    start_time, end_time, status, is_active, show_results_immediately, shuffle_questions, \
    published_at, created_at, updated_at";

#[allow(clippy::struct_excessive_bools)]
pub(crate) struct CreateExam<'a> {
    pub(crate) id: &'a str,
    pub(crate) title: &'a str,
    pub(crate) description: Option<&'a str>,
    pub(crate) created_by: &'a str,
    pub(crate) duration_minutes: i32,
    pub(crate) passing_marks: f64,
    pub(crate) max_attempts: Option<i32>,
    pub(crate) start_time: PrimitiveDateTime,
    pub(crate) end_time: PrimitiveDateTime,
    pub(crate) status: ExamStatus,
    pub(crate) is_active: bool,
    pub(crate) show_results_immediately: bool,
    pub(crate) shuffle_questions: bool,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Exam>, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!("SELECT {COLUMNS} FROM exams WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn create(pool: &PgPool, exam: CreateExam<'_>) -> Result<Exam, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!(
        "INSERT INTO exams (
            id, title, description, created_by, duration_minutes, passing_marks, max_attempts,
            start_time, end_time, status, is_active, show_results_immediately, shuffle_questions,
            created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15)
        RETURNING {COLUMNS}"
    ))
    .bind(exam.id)
    .bind(exam.title)
    .bind(exam.description)
    .bind(exam.created_by)
    .bind(exam.duration_minutes)
    .bind(exam.passing_marks)
    .bind(exam.max_attempts)
    .bind(exam.start_time)
    .bind(exam.end_time)
    .bind(exam.status)
    .bind(exam.is_active)
    .bind(exam.show_results_immediately)
    .bind(exam.shuffle_questions)
    .bind(exam.created_at)
    .bind(exam.updated_at)
    .fetch_one(pool)
    .await
}
