use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::ExamQuestion;

pub(crate) const COLUMNS: &str = "id, exam_id, order_index, prompt, marks, created_at";

pub(crate) struct CreateQuestion<'a> {
    pub(crate) id: &'a str,
    pub(crate) exam_id: &'a str,
    pub(crate) order_index: i32,
    pub(crate) prompt: &'a str,
    pub(crate) marks: f64,
    pub(crate) created_at: PrimitiveDateTime,
}

pub(crate) async fn list_by_exam(
    pool: &PgPool,
    exam_id: &str,
) -> Result<Vec<ExamQuestion>, sqlx::Error> {
    sqlx::query_as::<_, ExamQuestion>(&format!(
        "SELECT {COLUMNS} FROM exam_questions WHERE exam_id = $1 ORDER BY order_index"
    ))
    .bind(exam_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn create(
    pool: &PgPool,
    question: CreateQuestion<'_>,
) -> Result<ExamQuestion, sqlx::Error> {
    sqlx::query_as::<_, ExamQuestion>(&format!(
        "INSERT INTO exam_questions (id, exam_id, order_index, prompt, marks, created_at)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING {COLUMNS}"
    ))
    .bind(question.id)
    .bind(question.exam_id)
    .bind(question.order_index)
    .bind(question.prompt)
    .bind(question.marks)
    .bind(question.created_at)
    .fetch_one(pool)
    .await
}
