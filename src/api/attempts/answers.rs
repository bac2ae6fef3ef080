use axum::{
    extract::{Path, State},
    Json,
};
use sqlx::Acquire;
use validator::Validate;

use crate::api::attempts::helpers;
use crate::api::errors::ApiError;
use crate::api::guards::{require_attempt_ownership, CurrentUser};
use crate::core::state::AppState;
use crate::db::types::AttemptStatus;
use crate::repositories;
use crate::repositories::answers::AnswerMerge;
use crate::schemas::attempt::{
    AnswerResponse, BulkSaveFailure, BulkSaveReport, BulkSaveRequest, SaveAnswerRequest,
};

fn merge_from_request(payload: &SaveAnswerRequest) -> AnswerMerge {
    AnswerMerge {
        selected_options: payload.selected_options.clone(),
        free_text: payload.free_text.clone(),
        flagged: payload.flagged,
        time_spent_seconds: payload.time_spent_seconds,
    }
}

/// SaveAnswer. A terminal attempt answers with the stored row, unchanged and
/// without error, so a client racing the deadline never sees a spurious
/// failure. A paused attempt is a real rejection.
pub(in crate::api::attempts) async fn save_answer(
    Path((attempt_id, question_id)): Path<(String, String)>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<SaveAnswerRequest>,
) -> Result<Json<AnswerResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    let attempt = repositories::attempts::lock_by_id(&mut *tx, &attempt_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch attempt"))?
        .ok_or_else(|| ApiError::NotFound("Attempt not found".to_string()))?;

    require_attempt_ownership(&user, &attempt)?;

    if attempt.status.is_terminal() {
        let answer =
            repositories::answers::find_by_attempt_and_question(&mut *tx, &attempt_id, &question_id)
                .await
                .map_err(|e| ApiError::internal(e, "Failed to fetch answer"))?
                .ok_or_else(|| ApiError::NotFound("Answer not found".to_string()))?;
        tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;
        return Ok(Json(helpers::answer_to_response(answer)));
    }

    if attempt.status != AttemptStatus::InProgress {
        return Err(ApiError::BadRequest(
            "Attempt is paused; resume it before answering".to_string(),
        ));
    }

    let now = helpers::now_primitive();
    let merge = merge_from_request(&payload);

    let answer =
        repositories::answers::merge_update(&mut *tx, &attempt_id, &question_id, &merge, now)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to save answer"))?
            .ok_or_else(|| {
                ApiError::NotFound("Question does not belong to this attempt".to_string())
            })?;

    helpers::recompute_counters(&mut *tx, &attempt_id, now)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to update attempt counters"))?;

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    Ok(Json(helpers::answer_to_response(answer)))
}

/// Bulk variant: per-item merge that keeps going past individual failures and
/// reports what saved and what did not.
pub(in crate::api::attempts) async fn save_answers_bulk(
    Path(attempt_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<BulkSaveRequest>,
) -> Result<Json<BulkSaveReport>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    let attempt = repositories::attempts::lock_by_id(&mut *tx, &attempt_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch attempt"))?
        .ok_or_else(|| ApiError::NotFound("Attempt not found".to_string()))?;

    require_attempt_ownership(&user, &attempt)?;

    if attempt.status.is_terminal() {
        // Same relaxation as the single save: nothing changes, nothing errors.
        let report = BulkSaveReport {
            attempt_id: attempt_id.clone(),
            saved: Vec::new(),
            failed: payload
                .answers
                .into_iter()
                .map(|item| BulkSaveFailure {
                    question_id: item.question_id,
                    reason: "attempt is already finalized; answer left unchanged".to_string(),
                })
                .collect(),
        };
        tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;
        return Ok(Json(report));
    }

    if attempt.status != AttemptStatus::InProgress {
        return Err(ApiError::BadRequest(
            "Attempt is paused; resume it before answering".to_string(),
        ));
    }

    let now = helpers::now_primitive();
    let mut saved = Vec::new();
    let mut failed = Vec::new();

    for item in payload.answers {
        if let Err(err) = item.payload.validate() {
            failed.push(BulkSaveFailure { question_id: item.question_id, reason: err.to_string() });
            continue;
        }

        // Savepoint per item so one failed merge cannot poison the rest of
        // the batch.
        let mut nested = tx
            .begin()
            .await
            .map_err(|e| ApiError::internal(e, "Failed to start savepoint"))?;

        let merge = merge_from_request(&item.payload);
        match repositories::answers::merge_update(
            &mut *nested,
            &attempt_id,
            &item.question_id,
            &merge,
            now,
        )
        .await
        {
            Ok(Some(_)) => {
                nested
                    .commit()
                    .await
                    .map_err(|e| ApiError::internal(e, "Failed to release savepoint"))?;
                saved.push(item.question_id);
            }
            Ok(None) => {
                nested.rollback().await.ok();
                failed.push(BulkSaveFailure {
                    question_id: item.question_id,
                    reason: "question does not belong to this attempt".to_string(),
                });
            }
            Err(err) => {
                nested.rollback().await.ok();
                tracing::error!(
                    attempt_id = %attempt_id,
                    question_id = %item.question_id,
                    error = %err,
                    "Bulk answer save failed for item"
                );
                failed.push(BulkSaveFailure {
                    question_id: item.question_id,
                    reason: "storage error while saving".to_string(),
                });
            }
        }
    }

    helpers::recompute_counters(&mut *tx, &attempt_id, now)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to update attempt counters"))?;

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    Ok(Json(BulkSaveReport { attempt_id, saved, failed }))
}
