use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::api::attempts::{helpers, ListAttemptsQuery};
use crate::api::errors::ApiError;
use crate::api::guards::{require_attempt_access, require_staff, CurrentUser};
use crate::api::pagination::PaginatedResponse;
use crate::core::state::AppState;
use crate::repositories;
use crate::schemas::attempt::{AnswerResponse, AttemptResponse, ExamAttemptStatsResponse};
use crate::services::exam_content;

pub(in crate::api::attempts) async fn my_attempts(
    Query(query): Query<ListAttemptsQuery>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<PaginatedResponse<AttemptResponse>>, ApiError> {
    let attempts =
        repositories::attempts::list_by_student(state.db(), &user.id, query.skip, query.limit)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to list attempts"))?;

    let total_count = repositories::attempts::count_by_student(state.db(), &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count attempts"))?;

    let items = attempts
        .into_iter()
        .map(|attempt| helpers::attempt_to_response(attempt, state.settings()))
        .collect();

    Ok(Json(PaginatedResponse { items, total_count, skip: query.skip, limit: query.limit }))
}

pub(in crate::api::attempts) async fn get_attempt(
    Path(attempt_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<AttemptResponse>, ApiError> {
    let attempt = helpers::fetch_attempt(state.db(), &attempt_id).await?;
    require_attempt_access(&user, &attempt)?;

    Ok(Json(helpers::attempt_to_response(attempt, state.settings())))
}

pub(in crate::api::attempts) async fn get_attempt_answers(
    Path(attempt_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<AnswerResponse>>, ApiError> {
    let attempt = helpers::fetch_attempt(state.db(), &attempt_id).await?;
    require_attempt_access(&user, &attempt)?;

    let answers = repositories::answers::list_by_attempt(state.db(), &attempt_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list answers"))?;

    Ok(Json(answers.into_iter().map(helpers::answer_to_response).collect()))
}

pub(in crate::api::attempts) async fn exam_attempts(
    Path(exam_id): Path<String>,
    Query(query): Query<ListAttemptsQuery>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<PaginatedResponse<AttemptResponse>>, ApiError> {
    require_staff(&user)?;

    exam_content::get_exam(state.db(), &exam_id)
        .await
        .map_err(helpers::map_exam_content_error)?;

    let attempts = repositories::attempts::list_by_exam(
        state.db(),
        &exam_id,
        query.status,
        query.skip,
        query.limit,
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to list attempts"))?;

    let total_count = repositories::attempts::count_by_exam(state.db(), &exam_id, query.status)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count attempts"))?;

    let items = attempts
        .into_iter()
        .map(|attempt| helpers::attempt_to_response(attempt, state.settings()))
        .collect();

    Ok(Json(PaginatedResponse { items, total_count, skip: query.skip, limit: query.limit }))
}

pub(in crate::api::attempts) async fn exam_statistics(
    Path(exam_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<ExamAttemptStatsResponse>, ApiError> {
    require_staff(&user)?;

    exam_content::get_exam(state.db(), &exam_id)
        .await
        .map_err(helpers::map_exam_content_error)?;

    let stats = repositories::attempts::statistics_by_exam(state.db(), &exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to compute statistics"))?;

    Ok(Json(ExamAttemptStatsResponse {
        exam_id,
        total_attempts: stats.total_attempts,
        in_progress: stats.in_progress,
        paused: stats.paused,
        submitted: stats.submitted,
        auto_submitted: stats.auto_submitted,
        avg_time_taken_seconds: stats.avg_time_taken_seconds,
        avg_answered_count: stats.avg_answered_count,
    }))
}
