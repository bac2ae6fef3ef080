//! Converts a finalized attempt into its result row. Invoked from the fact
//! worker (at-least-once) and therefore idempotent on attempt_id: the second
//! and every later invocation returns the existing row unchanged.

use anyhow::{bail, Context, Result};
use uuid::Uuid;

use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::{Answer, Attempt, ExamResult};
use crate::db::types::ResultStatus;
use crate::repositories;
use crate::services::{grading, proctoring};

pub(crate) fn top_scorers_cache_key(exam_id: &str) -> String {
    format!("top-scorers:{exam_id}")
}

/// Payload of the finalized-attempt fact: enough for a downstream consumer to
/// act without re-reading the attempt store.
pub(crate) fn finalized_fact_payload(attempt: &Attempt, answers: &[Answer]) -> serde_json::Value {
    let obtained_marks: Option<f64> = if answers.iter().any(|a| a.marks_obtained.is_none()) {
        None
    } else {
        Some(answers.iter().filter_map(|a| a.marks_obtained).sum())
    };

    serde_json::json!({
        "attempt_id": attempt.id,
        "exam_id": attempt.exam_id,
        "student_id": attempt.student_id,
        "total_marks": attempt.total_marks,
        "obtained_marks": obtained_marks,
        "answers": answers
            .iter()
            .map(|answer| {
                serde_json::json!({
                    "question_id": answer.question_id,
                    "is_correct": answer.is_correct,
                    "marks_allocated": answer.marks_allocated,
                    "marks_obtained": answer.marks_obtained,
                })
            })
            .collect::<Vec<_>>(),
        "tab_switches": attempt.tab_switches,
        "webcam_violations": attempt.webcam_violations,
        "copy_paste_count": attempt.copy_paste_count,
        "auto_submitted": attempt.auto_submitted,
    })
}

pub(crate) async fn derive_result(state: &AppState, attempt_id: &str) -> Result<ExamResult> {
    if let Some(existing) = repositories::results::find_by_attempt(state.db(), attempt_id)
        .await
        .context("Failed to check for existing result")?
    {
        return Ok(existing);
    }

    let attempt = repositories::attempts::find_by_id(state.db(), attempt_id)
        .await
        .context("Failed to fetch attempt")?
        .with_context(|| format!("attempt {attempt_id} missing"))?;

    if !attempt.status.is_terminal() {
        bail!("attempt {attempt_id} is not finalized; cannot derive a result");
    }

    let exam = repositories::exams::find_by_id(state.db(), &attempt.exam_id)
        .await
        .context("Failed to fetch exam")?
        .with_context(|| format!("exam {} missing for attempt {attempt_id}", attempt.exam_id))?;

    let marks = repositories::answers::marks_summary(state.db(), attempt_id)
        .await
        .context("Failed to aggregate answer marks")?;

    let requires_manual_grading = marks.ungraded_count > 0;
    let percentage = grading::percentage(marks.obtained_marks, attempt.total_marks);
    let grade = grading::grade_for_percentage(percentage);
    let passed = grading::passed(marks.obtained_marks, exam.passing_marks);
    let suspicious_activity = proctoring::is_suspicious(&attempt, state.settings());

    let now = primitive_now_utc();
    let (status, published_at) = if requires_manual_grading {
        (ResultStatus::PendingGrading, None)
    } else if exam.show_results_immediately {
        (ResultStatus::Published, Some(now))
    } else {
        (ResultStatus::Draft, None)
    };

    let inserted = repositories::results::create_if_absent(
        state.db(),
        repositories::results::CreateResult {
            id: &Uuid::new_v4().to_string(),
            attempt_id,
            exam_id: &attempt.exam_id,
            student_id: &attempt.student_id,
            obtained_marks: marks.obtained_marks,
            total_marks: attempt.total_marks,
            percentage,
            grade,
            passed,
            status,
            requires_manual_grading,
            suspicious_activity,
            auto_submitted: attempt.auto_submitted,
            published_at,
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .context("Failed to insert result")?;

    let result = repositories::results::find_by_attempt(state.db(), attempt_id)
        .await
        .context("Failed to refetch result")?
        .with_context(|| format!("result missing after derivation for attempt {attempt_id}"))?;

    if inserted {
        metrics::counter!("results_derived_total").increment(1);
        tracing::info!(
            attempt_id,
            exam_id = %result.exam_id,
            status = ?result.status,
            requires_manual_grading,
            "Derived result from finalized attempt"
        );

        if result.status == ResultStatus::Published {
            state.redis().cache_invalidate(&top_scorers_cache_key(&result.exam_id)).await;
        }
    }

    Ok(result)
}
