use serde::{Deserialize, Serialize};
use validator::Validate;

pub(crate) use crate::core::time::format_primitive;
use crate::db::types::{AttemptStatus, ProctoringEventKind};

#[derive(Debug, Serialize)]
pub(crate) struct AttemptResponse {
    pub(crate) id: String,
    pub(crate) exam_id: String,
    pub(crate) student_id: String,
    pub(crate) attempt_number: i32,
    pub(crate) status: AttemptStatus,
    pub(crate) total_questions: i32,
    pub(crate) total_marks: f64,
    pub(crate) answered_count: i32,
    pub(crate) flagged_count: i32,
    pub(crate) started_at: String,
    pub(crate) submitted_at: Option<String>,
    pub(crate) time_taken_seconds: Option<i64>,
    pub(crate) exam_duration_minutes: i32,
    pub(crate) tab_switches: i32,
    pub(crate) webcam_violations: i32,
    pub(crate) copy_paste_count: i32,
    pub(crate) auto_submitted: bool,
    pub(crate) suspicious: bool,
    pub(crate) notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AnswerResponse {
    pub(crate) id: String,
    pub(crate) question_id: String,
    pub(crate) order_index: i32,
    pub(crate) selected_options: Vec<String>,
    pub(crate) free_text: Option<String>,
    pub(crate) is_correct: Option<bool>,
    pub(crate) marks_allocated: f64,
    pub(crate) marks_obtained: Option<f64>,
    pub(crate) time_spent_seconds: i64,
    pub(crate) flagged: bool,
    pub(crate) answered_at: Option<String>,
}

/// Omitted fields keep their stored value; only provided fields merge.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub(crate) struct SaveAnswerRequest {
    #[serde(default)]
    pub(crate) selected_options: Option<Vec<String>>,
    #[serde(default)]
    pub(crate) free_text: Option<String>,
    #[serde(default)]
    pub(crate) flagged: Option<bool>,
    #[serde(default)]
    #[validate(range(min = 0, message = "time_spent_seconds must be non-negative"))]
    pub(crate) time_spent_seconds: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub(crate) struct BulkAnswerItem {
    #[validate(length(min = 1, message = "question_id is required"))]
    pub(crate) question_id: String,
    #[serde(flatten)]
    pub(crate) payload: SaveAnswerRequest,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct BulkSaveRequest {
    #[validate(length(min = 1, message = "answers must not be empty"))]
    pub(crate) answers: Vec<BulkAnswerItem>,
}

#[derive(Debug, Serialize)]
pub(crate) struct BulkSaveFailure {
    pub(crate) question_id: String,
    pub(crate) reason: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct BulkSaveReport {
    pub(crate) attempt_id: String,
    pub(crate) saved: Vec<String>,
    pub(crate) failed: Vec<BulkSaveFailure>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SubmitRequest {
    #[serde(default)]
    pub(crate) notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProctoringEventRequest {
    pub(crate) kind: ProctoringEventKind,
}

#[derive(Debug, Serialize)]
pub(crate) struct ExamAttemptStatsResponse {
    pub(crate) exam_id: String,
    pub(crate) total_attempts: i64,
    pub(crate) in_progress: i64,
    pub(crate) paused: i64,
    pub(crate) submitted: i64,
    pub(crate) auto_submitted: i64,
    pub(crate) avg_time_taken_seconds: Option<f64>,
    pub(crate) avg_answered_count: Option<f64>,
}
