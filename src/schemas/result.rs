use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::db::types::ResultStatus;

#[derive(Debug, Serialize)]
pub(crate) struct ResultResponse {
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
    pub(crate) published_at: Option<String>,
    pub(crate) published_by: Option<String>,
    pub(crate) publish_comments: Option<String>,
    pub(crate) graded_by: Option<String>,
    pub(crate) graded_at: Option<String>,
    pub(crate) grader_feedback: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct GradeRequest {
    #[validate(range(min = 0.0, message = "obtained_marks must be non-negative"))]
    pub(crate) obtained_marks: f64,
    #[serde(default)]
    pub(crate) feedback: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct PublishRequest {
    #[serde(default)]
    pub(crate) comments: Option<String>,
    #[serde(default)]
    pub(crate) calculate_rankings: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct RankingRecalcResponse {
    pub(crate) exam_id: String,
    pub(crate) ranked_count: u64,
}

#[derive(Debug, Serialize)]
pub(crate) struct TopScorerResponse {
    pub(crate) result_id: String,
    pub(crate) student_id: String,
    pub(crate) student_name: String,
    pub(crate) obtained_marks: f64,
    pub(crate) percentage: f64,
    pub(crate) grade: String,
    pub(crate) rank: Option<i32>,
}
