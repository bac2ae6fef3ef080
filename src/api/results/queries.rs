use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::api::errors::ApiError;
use crate::api::guards::{is_staff, require_result_access, require_staff, CurrentUser};
use crate::api::pagination::PaginatedResponse;
use crate::api::results::{helpers, ListResultsQuery, TopScorersQuery};
use crate::core::state::AppState;
use crate::db::types::ResultStatus;
use crate::repositories;
use crate::schemas::result::{ResultResponse, TopScorerResponse};
use crate::services::derivation;

/// Publication is what makes a result visible to its owner; staff see every
/// state.
pub(in crate::api::results) async fn get_result(
    Path(result_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<ResultResponse>, ApiError> {
    let result = helpers::fetch_result(state.db(), &result_id).await?;
    require_result_access(&user, &result)?;

    if !is_staff(&user) && result.status != ResultStatus::Published {
        return Err(ApiError::NotFound("Result not published yet".to_string()));
    }

    Ok(Json(helpers::result_to_response(result)))
}

pub(in crate::api::results) async fn result_for_attempt(
    Path(attempt_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<ResultResponse>, ApiError> {
    let result = repositories::results::find_by_attempt(state.db(), &attempt_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch result"))?
        .ok_or_else(|| ApiError::NotFound("No result for this attempt".to_string()))?;

    require_result_access(&user, &result)?;

    if !is_staff(&user) && result.status != ResultStatus::Published {
        return Err(ApiError::NotFound("Result not published yet".to_string()));
    }

    Ok(Json(helpers::result_to_response(result)))
}

pub(in crate::api::results) async fn my_results(
    Query(query): Query<ListResultsQuery>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<PaginatedResponse<ResultResponse>>, ApiError> {
    let results = repositories::results::list_published_by_student(
        state.db(),
        &user.id,
        query.skip,
        query.limit,
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to list results"))?;

    let total_count = repositories::results::count_published_by_student(state.db(), &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count results"))?;
    let items = results.into_iter().map(helpers::result_to_response).collect();

    Ok(Json(PaginatedResponse { items, total_count, skip: query.skip, limit: query.limit }))
}

pub(in crate::api::results) async fn exam_results(
    Path(exam_id): Path<String>,
    Query(query): Query<ListResultsQuery>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<PaginatedResponse<ResultResponse>>, ApiError> {
    require_staff(&user)?;
    helpers::fetch_exam(state.db(), &exam_id).await?;

    let results = repositories::results::list_by_exam(
        state.db(),
        &exam_id,
        query.status,
        query.skip,
        query.limit,
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to list results"))?;

    let total_count = repositories::results::count_by_exam(state.db(), &exam_id, query.status)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count results"))?;

    let items = results.into_iter().map(helpers::result_to_response).collect();

    Ok(Json(PaginatedResponse { items, total_count, skip: query.skip, limit: query.limit }))
}

/// Cached read projection over published results only; every result mutation
/// invalidates the cache synchronously, so staleness is bounded by the TTL
/// and never by a missed invalidation.
pub(in crate::api::results) async fn top_scorers(
    Path(exam_id): Path<String>,
    Query(query): Query<TopScorersQuery>,
    CurrentUser(_user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    helpers::fetch_exam(state.db(), &exam_id).await?;

    let cache_key = derivation::top_scorers_cache_key(&exam_id);
    if query.limit == 10 {
        if let Some(cached) = state.redis().cache_get_json(&cache_key).await {
            return Ok(Json(cached));
        }
    }

    let rows = repositories::results::top_scorers(state.db(), &exam_id, query.limit)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list top scorers"))?;

    let scorers: Vec<TopScorerResponse> = rows
        .into_iter()
        .map(|row| TopScorerResponse {
            result_id: row.result_id,
            student_id: row.student_id,
            student_name: row.student_name,
            obtained_marks: row.obtained_marks,
            percentage: row.percentage,
            grade: row.grade,
            rank: row.rank,
        })
        .collect();

    let body = serde_json::json!({ "exam_id": exam_id, "top_scorers": scorers });

    if query.limit == 10 {
        let ttl = state.settings().exam().top_scorers_cache_seconds;
        state.redis().cache_put_json(&cache_key, &body, ttl).await;
    }

    Ok(Json(body))
}

pub(in crate::api::results) async fn pending_grading(
    Path(exam_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<ResultResponse>>, ApiError> {
    require_staff(&user)?;
    helpers::fetch_exam(state.db(), &exam_id).await?;

    let results = repositories::results::list_pending_grading(state.db(), &exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list pending results"))?;

    Ok(Json(results.into_iter().map(helpers::result_to_response).collect()))
}

pub(in crate::api::results) async fn suspicious(
    Path(exam_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<ResultResponse>>, ApiError> {
    require_staff(&user)?;
    helpers::fetch_exam(state.db(), &exam_id).await?;

    let results = repositories::results::list_suspicious(state.db(), &exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list suspicious results"))?;

    Ok(Json(results.into_iter().map(helpers::result_to_response).collect()))
}
