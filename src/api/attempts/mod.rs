pub(crate) mod helpers;

mod answers;
mod proctoring;
mod queries;
mod start;
mod submit;

use axum::{routing::get, routing::patch, routing::post, Router};
use serde::Deserialize;

use crate::core::state::AppState;
use crate::db::types::AttemptStatus;

#[derive(Debug, Deserialize)]
pub(crate) struct ListAttemptsQuery {
    #[serde(default)]
    pub(crate) status: Option<AttemptStatus>,
    #[serde(default)]
    pub(crate) skip: i64,
    #[serde(default = "crate::api::pagination::default_limit")]
    pub(crate) limit: i64,
}

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        // Student endpoints
        .route("/exams/:exam_id/start", post(start::start_attempt))
        .route("/my-attempts", get(queries::my_attempts))
        .route("/:attempt_id/answers/:question_id", patch(answers::save_answer))
        .route("/:attempt_id/answers", post(answers::save_answers_bulk))
        .route("/:attempt_id/pause", post(submit::pause_attempt))
        .route("/:attempt_id/resume", post(submit::resume_attempt))
        .route("/:attempt_id/submit", post(submit::submit_attempt))
        .route("/:attempt_id/events", post(proctoring::record_event))
        // Shared reads (owner or staff)
        .route("/:attempt_id", get(queries::get_attempt))
        .route("/:attempt_id/answers", get(queries::get_attempt_answers))
        // Teacher/admin projections
        .route("/exams/:exam_id", get(queries::exam_attempts))
        .route("/exams/:exam_id/statistics", get(queries::exam_statistics))
}
