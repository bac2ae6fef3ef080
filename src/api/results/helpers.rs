use sqlx::PgPool;

use crate::api::errors::ApiError;
pub(crate) use crate::core::time::primitive_now_utc as now_primitive;
use crate::core::time::format_primitive;
use crate::db::models::{Exam, ExamResult};
use crate::repositories;
use crate::schemas::result::ResultResponse;

pub(crate) fn result_to_response(result: ExamResult) -> ResultResponse {
    ResultResponse {
        id: result.id,
        attempt_id: result.attempt_id,
        exam_id: result.exam_id,
        student_id: result.student_id,
        obtained_marks: result.obtained_marks,
        total_marks: result.total_marks,
        percentage: result.percentage,
        grade: result.grade,
        passed: result.passed,
        status: result.status,
        requires_manual_grading: result.requires_manual_grading,
        rank: result.rank,
        suspicious_activity: result.suspicious_activity,
        auto_submitted: result.auto_submitted,
        published_at: result.published_at.map(format_primitive),
        published_by: result.published_by,
        publish_comments: result.publish_comments,
        graded_by: result.graded_by,
        graded_at: result.graded_at.map(format_primitive),
        grader_feedback: result.grader_feedback,
    }
}

pub(crate) async fn fetch_result(pool: &PgPool, result_id: &str) -> Result<ExamResult, ApiError> {
    repositories::results::find_by_id(pool, result_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch result"))?
        .ok_or_else(|| ApiError::NotFound("Result not found".to_string()))
}

pub(crate) async fn fetch_exam(pool: &PgPool, exam_id: &str) -> Result<Exam, ApiError> {
    repositories::exams::find_by_id(pool, exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch exam"))?
        .ok_or_else(|| ApiError::NotFound("Exam not found".to_string()))
}
