use sqlx::PgPool;

use crate::api::errors::ApiError;
pub(crate) use crate::core::time::primitive_now_utc as now_primitive;
use crate::core::config::Settings;
use crate::db::models::{Answer, Attempt};
use crate::repositories;
use crate::schemas::attempt::{format_primitive, AnswerResponse, AttemptResponse};
use crate::services::{exam_content, proctoring};

pub(crate) fn attempt_to_response(attempt: Attempt, settings: &Settings) -> AttemptResponse {
    let suspicious = proctoring::is_suspicious(&attempt, settings);

    AttemptResponse {
        id: attempt.id,
        exam_id: attempt.exam_id,
        student_id: attempt.student_id,
        attempt_number: attempt.attempt_number,
        status: attempt.status,
        total_questions: attempt.total_questions,
        total_marks: attempt.total_marks,
        answered_count: attempt.answered_count,
        flagged_count: attempt.flagged_count,
        started_at: format_primitive(attempt.started_at),
        submitted_at: attempt.submitted_at.map(format_primitive),
        time_taken_seconds: attempt.time_taken_seconds,
        exam_duration_minutes: attempt.exam_duration_minutes,
        tab_switches: attempt.tab_switches,
        webcam_violations: attempt.webcam_violations,
        copy_paste_count: attempt.copy_paste_count,
        auto_submitted: attempt.auto_submitted,
        suspicious,
        notes: attempt.notes,
    }
}

pub(crate) fn answer_to_response(answer: Answer) -> AnswerResponse {
    AnswerResponse {
        id: answer.id,
        question_id: answer.question_id,
        order_index: answer.order_index,
        selected_options: answer.selected_options.0,
        free_text: answer.free_text,
        is_correct: answer.is_correct,
        marks_allocated: answer.marks_allocated,
        marks_obtained: answer.marks_obtained,
        time_spent_seconds: answer.time_spent_seconds,
        flagged: answer.flagged,
        answered_at: answer.answered_at.map(format_primitive),
    }
}

pub(crate) async fn fetch_attempt(pool: &PgPool, attempt_id: &str) -> Result<Attempt, ApiError> {
    repositories::attempts::find_by_id(pool, attempt_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch attempt"))?
        .ok_or_else(|| ApiError::NotFound("Attempt not found".to_string()))
}

pub(crate) fn map_exam_content_error(err: exam_content::ExamContentError) -> ApiError {
    match err {
        exam_content::ExamContentError::NotFound => {
            ApiError::NotFound("Exam not found".to_string())
        }
        exam_content::ExamContentError::Unavailable(inner) => {
            tracing::error!(error = %inner, "Exam content lookup failed");
            ApiError::ServiceUnavailable(
                "Exam content is temporarily unavailable. Try again shortly.".to_string(),
            )
        }
    }
}

/// Re-derives answered/flagged counts from the answer set and persists them;
/// runs inside the caller's transaction so the counters land atomically with
/// the answer merge.
pub(crate) async fn recompute_counters(
    conn: &mut sqlx::PgConnection,
    attempt_id: &str,
    now: time::PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    let counters = repositories::answers::derived_counters(&mut *conn, attempt_id).await?;
    repositories::attempts::update_counters(
        &mut *conn,
        attempt_id,
        counters.answered_count as i32,
        counters.flagged_count as i32,
        now,
    )
    .await
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err.as_database_error().map(|db| db.kind()),
        Some(sqlx::error::ErrorKind::UniqueViolation)
    )
}
