pub(crate) mod helpers;

mod manage;
mod queries;

use axum::{routing::get, routing::post, Router};
use serde::Deserialize;

use crate::core::state::AppState;
use crate::db::types::ResultStatus;

#[derive(Debug, Deserialize)]
pub(crate) struct ListResultsQuery {
    #[serde(default)]
    pub(crate) status: Option<ResultStatus>,
    #[serde(default)]
    pub(crate) skip: i64,
    #[serde(default = "crate::api::pagination::default_limit")]
    pub(crate) limit: i64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TopScorersQuery {
    #[serde(default = "default_top_scorers_limit")]
    pub(crate) limit: i64,
}

fn default_top_scorers_limit() -> i64 {
    10
}

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        // Student reads
        .route("/my-results", get(queries::my_results))
        .route("/attempts/:attempt_id", get(queries::result_for_attempt))
        .route("/:result_id", get(queries::get_result))
        // Teacher/admin management
        .route("/:result_id/grade", post(manage::grade_result))
        .route("/:result_id/publish", post(manage::publish_result))
        .route("/:result_id/unpublish", post(manage::unpublish_result))
        .route("/exams/:exam_id/rankings", post(manage::recalculate_rankings))
        // Projections
        .route("/exams/:exam_id", get(queries::exam_results))
        .route("/exams/:exam_id/top-scorers", get(queries::top_scorers))
        .route("/exams/:exam_id/pending-grading", get(queries::pending_grading))
        .route("/exams/:exam_id/suspicious", get(queries::suspicious))
}

#[cfg(test)]
mod tests;
