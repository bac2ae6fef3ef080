use axum::{
    extract::{Path, State},
    Json,
};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::{require_exam_ownership, CurrentUser};
use crate::api::results::helpers;
use crate::core::state::AppState;
use crate::db::types::ResultStatus;
use crate::repositories;
use crate::schemas::result::{
    GradeRequest, PublishRequest, RankingRecalcResponse, ResultResponse,
};
use crate::services::derivation;

/// GradeResult: percentage, grade and passed are recomputed from the freshly
/// supplied marks; a stale cached percentage is never trusted.
pub(in crate::api::results) async fn grade_result(
    Path(result_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<GradeRequest>,
) -> Result<Json<ResultResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    let result = repositories::results::lock_by_id(&mut *tx, &result_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch result"))?
        .ok_or_else(|| ApiError::NotFound("Result not found".to_string()))?;

    let exam = helpers::fetch_exam(state.db(), &result.exam_id).await?;
    require_exam_ownership(&user, &exam)?;

    if result.status == ResultStatus::Published {
        return Err(ApiError::BadRequest(
            "Result is published; unpublish it before regrading".to_string(),
        ));
    }

    if payload.obtained_marks > result.total_marks {
        return Err(ApiError::BadRequest(format!(
            "obtained_marks cannot exceed total marks ({})",
            result.total_marks
        )));
    }

    let percentage =
        crate::services::grading::percentage(payload.obtained_marks, result.total_marks);
    let grade = crate::services::grading::grade_for_percentage(percentage);
    let passed = crate::services::grading::passed(payload.obtained_marks, exam.passing_marks);

    let now = helpers::now_primitive();
    repositories::results::grade(
        &mut *tx,
        &result_id,
        payload.obtained_marks,
        percentage,
        grade,
        passed,
        &user.id,
        payload.feedback.as_deref(),
        now,
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to grade result"))?;

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    state.redis().cache_invalidate(&derivation::top_scorers_cache_key(&result.exam_id)).await;

    metrics::counter!("results_graded_total").increment(1);
    tracing::info!(
        result_id = %result_id,
        exam_id = %result.exam_id,
        graded_by = %user.id,
        obtained_marks = payload.obtained_marks,
        "Result graded"
    );

    let result = helpers::fetch_result(state.db(), &result_id).await?;
    Ok(Json(helpers::result_to_response(result)))
}

/// PublishResult: grading must precede publication, and publishing twice is a
/// rejection rather than a silent overwrite of the original publication.
pub(in crate::api::results) async fn publish_result(
    Path(result_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    payload: Option<Json<PublishRequest>>,
) -> Result<Json<ResultResponse>, ApiError> {
    let payload = payload.map(|Json(body)| body).unwrap_or_default();

    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    let result = repositories::results::lock_by_id(&mut *tx, &result_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch result"))?
        .ok_or_else(|| ApiError::NotFound("Result not found".to_string()))?;

    let exam = helpers::fetch_exam(state.db(), &result.exam_id).await?;
    require_exam_ownership(&user, &exam)?;

    if result.status == ResultStatus::Published {
        return Err(ApiError::BadRequest("Result is already published".to_string()));
    }

    if result.requires_manual_grading {
        return Err(ApiError::BadRequest(
            "Result requires manual grading before publication".to_string(),
        ));
    }

    let now = helpers::now_primitive();
    repositories::results::publish(
        &mut *tx,
        &result_id,
        &user.id,
        payload.comments.as_deref(),
        now,
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to publish result"))?;

    if payload.calculate_rankings {
        repositories::results::clear_unpublished_ranks(&mut *tx, &result.exam_id, now)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to clear stale ranks"))?;
        repositories::results::recalculate_rankings(&mut *tx, &result.exam_id, now)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to recalculate rankings"))?;
    }

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    state.redis().cache_invalidate(&derivation::top_scorers_cache_key(&result.exam_id)).await;

    metrics::counter!("results_published_total").increment(1);
    tracing::info!(
        result_id = %result_id,
        exam_id = %result.exam_id,
        published_by = %user.id,
        rankings_recalculated = payload.calculate_rankings,
        "Result published"
    );

    let result = helpers::fetch_result(state.db(), &result_id).await?;
    Ok(Json(helpers::result_to_response(result)))
}

/// UnpublishResult: back to PENDING_GRADING or DRAFT; ranks across the exam
/// go stale until the next recalculation.
pub(in crate::api::results) async fn unpublish_result(
    Path(result_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<ResultResponse>, ApiError> {
    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    let result = repositories::results::lock_by_id(&mut *tx, &result_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch result"))?
        .ok_or_else(|| ApiError::NotFound("Result not found".to_string()))?;

    let exam = helpers::fetch_exam(state.db(), &result.exam_id).await?;
    require_exam_ownership(&user, &exam)?;

    if result.status != ResultStatus::Published {
        return Err(ApiError::BadRequest("Result is not published".to_string()));
    }

    let reverted_status = if result.requires_manual_grading {
        ResultStatus::PendingGrading
    } else {
        ResultStatus::Draft
    };

    let now = helpers::now_primitive();
    repositories::results::unpublish(&mut *tx, &result_id, reverted_status, now)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to unpublish result"))?;

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    state.redis().cache_invalidate(&derivation::top_scorers_cache_key(&result.exam_id)).await;

    tracing::info!(
        result_id = %result_id,
        exam_id = %result.exam_id,
        unpublished_by = %user.id,
        "Result unpublished"
    );

    let result = helpers::fetch_result(state.db(), &result_id).await?;
    Ok(Json(helpers::result_to_response(result)))
}

/// CalculateRankings: a full replace over the published set, not an
/// incremental patch; recomputation is order-independent by construction.
pub(in crate::api::results) async fn recalculate_rankings(
    Path(exam_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<RankingRecalcResponse>, ApiError> {
    let exam = helpers::fetch_exam(state.db(), &exam_id).await?;
    require_exam_ownership(&user, &exam)?;

    let now = helpers::now_primitive();

    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    repositories::results::clear_unpublished_ranks(&mut *tx, &exam_id, now)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to clear stale ranks"))?;

    let ranked_count = repositories::results::recalculate_rankings(&mut *tx, &exam_id, now)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to recalculate rankings"))?;

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    state.redis().cache_invalidate(&derivation::top_scorers_cache_key(&exam_id)).await;

    metrics::counter!("rankings_recalculated_total").increment(1);
    tracing::info!(exam_id = %exam_id, ranked_count, "Rankings recalculated");

    Ok(Json(RankingRecalcResponse { exam_id, ranked_count }))
}
