use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use time::PrimitiveDateTime;

use crate::db::types::{AttemptStatus, ExamStatus, FactKind, ResultStatus, UserRole};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct User {
    pub(crate) id: String,
    pub(crate) username: String,
    pub(crate) hashed_password: String,
    pub(crate) full_name: String,
    pub(crate) role: UserRole,
    pub(crate) is_active: bool,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Exam {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) created_by: String,
    pub(crate) duration_minutes: i32,
    pub(crate) passing_marks: f64,
    pub(crate) max_attempts: Option<i32>,
    pub(crate) start_time: PrimitiveDateTime,
    pub(crate) end_time: PrimitiveDateTime,
    pub(crate) status: ExamStatus,
    pub(crate) is_active: bool,
    pub(crate) show_results_immediately: bool,
    pub(crate) shuffle_questions: bool,
    pub(crate) published_at: Option<PrimitiveDateTime>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct ExamQuestion {
    pub(crate) id: String,
    pub(crate) exam_id: String,
    pub(crate) order_index: i32,
    pub(crate) prompt: String,
    pub(crate) marks: f64,
    pub(crate) created_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Attempt {
    pub(crate) id: String,
    pub(crate) exam_id: String,
    pub(crate) student_id: String,
    pub(crate) attempt_number: i32,
    pub(crate) status: AttemptStatus,
    pub(crate) total_questions: i32,
    pub(crate) total_marks: f64,
    pub(crate) answered_count: i32,
    pub(crate) flagged_count: i32,
    pub(crate) started_at: PrimitiveDateTime,
    pub(crate) submitted_at: Option<PrimitiveDateTime>,
    pub(crate) time_taken_seconds: Option<i64>,
    pub(crate) exam_duration_minutes: i32,
    pub(crate) tab_switches: i32,
    pub(crate) webcam_violations: i32,
    pub(crate) copy_paste_count: i32,
    pub(crate) auto_submitted: bool,
    pub(crate) shuffle_seed: i32,
    pub(crate) notes: Option<String>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Answer {
    pub(crate) id: String,
    pub(crate) attempt_id: String,
    pub(crate) question_id: String,
    pub(crate) order_index: i32,
    pub(crate) selected_options: Json<Vec<String>>,
    pub(crate) free_text: Option<String>,
    pub(crate) is_correct: Option<bool>,
    pub(crate) marks_allocated: f64,
    pub(crate) marks_obtained: Option<f64>,
    pub(crate) time_spent_seconds: i64,
    pub(crate) flagged: bool,
    pub(crate) answered_at: Option<PrimitiveDateTime>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct ExamResult {
    pub(crate) id: String,
    pub(crate) attempt_id: String,
    pub(crate) exam_id: String,
    pub(crate) student_id: String,
    pub(crate) obtained_marks: f64,
    pub(crate) total_marks: f64,
    pub(crate) percentage: f64,
    pub(crate) grade: String,
    pub(crate) passed: bool,
    pub(crate) status: ResultStatus,
    pub(crate) requires_manual_grading: bool,
    pub(crate) rank: Option<i32>,
    pub(crate) suspicious_activity: bool,
    pub(crate) auto_submitted: bool,
    pub(crate) published_at: Option<PrimitiveDateTime>,
    pub(crate) published_by: Option<String>,
    pub(crate) publish_comments: Option<String>,
    pub(crate) graded_by: Option<String>,
    pub(crate) graded_at: Option<PrimitiveDateTime>,
    pub(crate) grader_feedback: Option<String>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct AttemptFact {
    pub(crate) id: i64,
    pub(crate) attempt_id: String,
    pub(crate) exam_id: String,
    pub(crate) student_id: String,
    pub(crate) kind: FactKind,
    pub(crate) payload: Json<serde_json::Value>,
    pub(crate) processed_at: Option<PrimitiveDateTime>,
    pub(crate) delivery_attempts: i32,
    pub(crate) last_error: Option<String>,
    pub(crate) created_at: PrimitiveDateTime,
}
