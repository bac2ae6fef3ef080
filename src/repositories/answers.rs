use sqlx::types::Json;
use time::PrimitiveDateTime;

use crate::db::models::Answer;

pub(crate) const COLUMNS: &str = "\
    id, attempt_id, question_id, order_index, selected_options, free_text, is_correct, \
    marks_allocated, marks_obtained, time_spent_seconds, flagged, answered_at, \
    created_at, updated_at";

pub(crate) struct NewAnswer {
    pub(crate) id: String,
    pub(crate) question_id: String,
    pub(crate) order_index: i32,
    pub(crate) marks_allocated: f64,
}

/// Fields the student may merge into an answer; `None` leaves the stored
/// value untouched.
#[derive(Debug, Default, Clone)]
pub(crate) struct AnswerMerge {
    pub(crate) selected_options: Option<Vec<String>>,
    pub(crate) free_text: Option<String>,
    pub(crate) flagged: Option<bool>,
    pub(crate) time_spent_seconds: Option<i64>,
}

impl AnswerMerge {
    pub(crate) fn marks_an_answer(&self) -> bool {
        self.selected_options.is_some() || self.free_text.is_some()
    }
}

/// Eager materialization at attempt start; one row per exam question so that
/// saving an answer is always an UPDATE.
pub(crate) async fn insert_for_attempt(
    executor: impl sqlx::PgExecutor<'_>,
    attempt_id: &str,
    answers: &[NewAnswer],
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    if answers.is_empty() {
        return Ok(());
    }

    let mut builder = sqlx::QueryBuilder::<sqlx::Postgres>::new(
        "INSERT INTO attempt_answers (
            id, attempt_id, question_id, order_index, marks_allocated, created_at, updated_at
        ) ",
    );

    builder.push_values(answers, |mut row, answer| {
        row.push_bind(&answer.id)
            .push_bind(attempt_id)
            .push_bind(&answer.question_id)
            .push_bind(answer.order_index)
            .push_bind(answer.marks_allocated)
            .push_bind(now)
            .push_bind(now);
    });

    builder.build().execute(executor).await?;
    Ok(())
}

pub(crate) async fn list_by_attempt(
    executor: impl sqlx::PgExecutor<'_>,
    attempt_id: &str,
) -> Result<Vec<Answer>, sqlx::Error> {
    sqlx::query_as::<_, Answer>(&format!(
        "SELECT {COLUMNS} FROM attempt_answers WHERE attempt_id = $1 ORDER BY order_index"
    ))
    .bind(attempt_id)
    .fetch_all(executor)
    .await
}

pub(crate) async fn find_by_attempt_and_question(
    executor: impl sqlx::PgExecutor<'_>,
    attempt_id: &str,
    question_id: &str,
) -> Result<Option<Answer>, sqlx::Error> {
    sqlx::query_as::<_, Answer>(&format!(
        "SELECT {COLUMNS} FROM attempt_answers WHERE attempt_id = $1 AND question_id = $2"
    ))
    .bind(attempt_id)
    .bind(question_id)
    .fetch_optional(executor)
    .await
}

/// Merge the provided fields only; omitted fields keep their prior value.
pub(crate) async fn merge_update(
    executor: impl sqlx::PgExecutor<'_>,
    attempt_id: &str,
    question_id: &str,
    merge: &AnswerMerge,
    now: PrimitiveDateTime,
) -> Result<Option<Answer>, sqlx::Error> {
    sqlx::query_as::<_, Answer>(&format!(
        "UPDATE attempt_answers
         SET selected_options = COALESCE($1, selected_options),
             free_text = COALESCE($2, free_text),
             flagged = COALESCE($3, flagged),
             time_spent_seconds = COALESCE($4, time_spent_seconds),
             answered_at = CASE WHEN $5 THEN $6 ELSE answered_at END,
             updated_at = $6
         WHERE attempt_id = $7 AND question_id = $8
         RETURNING {COLUMNS}"
    ))
    .bind(merge.selected_options.as_ref().map(|options| Json(options.clone())))
    .bind(merge.free_text.as_deref())
    .bind(merge.flagged)
    .bind(merge.time_spent_seconds)
    .bind(merge.marks_an_answer())
    .bind(now)
    .bind(attempt_id)
    .bind(question_id)
    .fetch_optional(executor)
    .await
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct DerivedCounters {
    pub(crate) answered_count: i64,
    pub(crate) flagged_count: i64,
}

/// Recomputed from the full answer set on every mutation rather than tracked
/// incrementally; question counts are small and bounded.
pub(crate) async fn derived_counters(
    executor: impl sqlx::PgExecutor<'_>,
    attempt_id: &str,
) -> Result<DerivedCounters, sqlx::Error> {
    sqlx::query_as::<_, DerivedCounters>(
        "SELECT COUNT(*) FILTER (WHERE answered_at IS NOT NULL) AS answered_count,
                COUNT(*) FILTER (WHERE flagged) AS flagged_count
         FROM attempt_answers
         WHERE attempt_id = $1",
    )
    .bind(attempt_id)
    .fetch_one(executor)
    .await
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct MarksSummary {
    pub(crate) obtained_marks: f64,
    pub(crate) ungraded_count: i64,
}

pub(crate) async fn marks_summary(
    executor: impl sqlx::PgExecutor<'_>,
    attempt_id: &str,
) -> Result<MarksSummary, sqlx::Error> {
    sqlx::query_as::<_, MarksSummary>(
        "SELECT COALESCE(SUM(marks_obtained), 0)::float8 AS obtained_marks,
                COUNT(*) FILTER (WHERE marks_obtained IS NULL) AS ungraded_count
         FROM attempt_answers
         WHERE attempt_id = $1",
    )
    .bind(attempt_id)
    .fetch_one(executor)
    .await
}

/// Internal grading hook used by tooling and tests; the lifecycle API never
/// lets a student touch these columns.
pub(crate) async fn set_marks(
    executor: impl sqlx::PgExecutor<'_>,
    attempt_id: &str,
    question_id: &str,
    is_correct: Option<bool>,
    marks_obtained: Option<f64>,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE attempt_answers
         SET is_correct = $1, marks_obtained = $2, updated_at = $3
         WHERE attempt_id = $4 AND question_id = $5",
    )
    .bind(is_correct)
    .bind(marks_obtained)
    .bind(now)
    .bind(attempt_id)
    .bind(question_id)
    .execute(executor)
    .await?;
    Ok(())
}
