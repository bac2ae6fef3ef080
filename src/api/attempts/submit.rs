use axum::{
    extract::{Path, State},
    Json,
};

use crate::api::attempts::helpers;
use crate::api::errors::ApiError;
use crate::api::guards::{require_attempt_ownership, CurrentUser};
use crate::core::state::AppState;
use crate::core::time::seconds_between;
use crate::db::types::{AttemptStatus, FactKind};
use crate::repositories;
use crate::schemas::attempt::{AttemptResponse, SubmitRequest};
use crate::services::derivation;

/// SubmitAttempt. The row lock closes the window where a duplicate manual
/// submit or a concurrent auto-submit could both win; an already-terminal
/// attempt is returned as-is so submit is safe to retry. The finalized fact
/// is written in the same transaction as the transition, never after it.
pub(in crate::api::attempts) async fn submit_attempt(
    Path(attempt_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    payload: Option<Json<SubmitRequest>>,
) -> Result<Json<AttemptResponse>, ApiError> {
    let notes = payload.and_then(|Json(body)| body.notes);

    match try_submit(&state, &attempt_id, &user.id, notes.as_deref()).await {
        Ok(attempt) => Ok(Json(helpers::attempt_to_response(attempt, state.settings()))),
        Err(SubmitError::Api(err)) => Err(err),
        Err(SubmitError::Storage(err)) if helpers::is_unique_violation(&err) => {
            // A concurrent writer finalized first; the losing request adopts
            // the winner's terminal state instead of surfacing a conflict.
            let attempt = helpers::fetch_attempt(state.db(), &attempt_id).await?;
            if attempt.status.is_terminal() {
                Ok(Json(helpers::attempt_to_response(attempt, state.settings())))
            } else {
                Err(ApiError::internal(err, "Failed to submit attempt"))
            }
        }
        Err(SubmitError::Storage(err)) => Err(ApiError::internal(err, "Failed to submit attempt")),
    }
}

enum SubmitError {
    Api(ApiError),
    Storage(sqlx::Error),
}

impl From<ApiError> for SubmitError {
    fn from(err: ApiError) -> Self {
        Self::Api(err)
    }
}

impl From<sqlx::Error> for SubmitError {
    fn from(err: sqlx::Error) -> Self {
        Self::Storage(err)
    }
}

async fn try_submit(
    state: &AppState,
    attempt_id: &str,
    requester_id: &str,
    notes: Option<&str>,
) -> Result<crate::db::models::Attempt, SubmitError> {
    let mut tx = state.db().begin().await?;

    let attempt = repositories::attempts::lock_by_id(&mut *tx, attempt_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Attempt not found".to_string()))?;

    if attempt.student_id != requester_id {
        return Err(ApiError::Forbidden("This attempt belongs to another student").into());
    }

    if attempt.status.is_terminal() {
        tx.commit().await?;
        return Ok(attempt);
    }

    if attempt.status == AttemptStatus::Paused {
        return Err(ApiError::BadRequest(
            "Attempt is paused; resume it before submitting".to_string(),
        )
        .into());
    }

    let now = helpers::now_primitive();
    let time_taken = seconds_between(attempt.started_at, now).max(0);

    repositories::attempts::finalize(
        &mut *tx,
        attempt_id,
        AttemptStatus::Submitted,
        now,
        time_taken,
        false,
        notes,
    )
    .await?;

    let answers = repositories::answers::list_by_attempt(&mut *tx, attempt_id).await?;
    let finalized = repositories::attempts::lock_by_id(&mut *tx, attempt_id)
        .await?
        .ok_or_else(|| ApiError::Internal("Attempt missing after finalize".to_string()))?;

    repositories::outbox::insert(
        &mut *tx,
        attempt_id,
        &finalized.exam_id,
        &finalized.student_id,
        FactKind::Finalized,
        derivation::finalized_fact_payload(&finalized, &answers),
        now,
    )
    .await?;

    tx.commit().await?;

    metrics::counter!("attempts_submitted_total").increment(1);
    tracing::info!(
        attempt_id = %attempt_id,
        exam_id = %finalized.exam_id,
        student_id = %finalized.student_id,
        time_taken_seconds = time_taken,
        "Attempt submitted"
    );

    Ok(finalized)
}

pub(in crate::api::attempts) async fn pause_attempt(
    Path(attempt_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<AttemptResponse>, ApiError> {
    let attempt =
        transition(&state, &attempt_id, &user, AttemptStatus::InProgress, AttemptStatus::Paused)
            .await?;
    Ok(Json(helpers::attempt_to_response(attempt, state.settings())))
}

pub(in crate::api::attempts) async fn resume_attempt(
    Path(attempt_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<AttemptResponse>, ApiError> {
    let attempt =
        transition(&state, &attempt_id, &user, AttemptStatus::Paused, AttemptStatus::InProgress)
            .await?;
    Ok(Json(helpers::attempt_to_response(attempt, state.settings())))
}

async fn transition(
    state: &AppState,
    attempt_id: &str,
    user: &crate::db::models::User,
    from: AttemptStatus,
    to: AttemptStatus,
) -> Result<crate::db::models::Attempt, ApiError> {
    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    let attempt = repositories::attempts::lock_by_id(&mut *tx, attempt_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch attempt"))?
        .ok_or_else(|| ApiError::NotFound("Attempt not found".to_string()))?;

    require_attempt_ownership(user, &attempt)?;

    if attempt.status.is_terminal() {
        return Err(ApiError::BadRequest("Attempt is already finalized".to_string()));
    }

    if attempt.status != from {
        return Err(ApiError::BadRequest(format!(
            "Attempt is not {}",
            match from {
                AttemptStatus::InProgress => "in progress",
                AttemptStatus::Paused => "paused",
                _ => "in a pausable state",
            }
        )));
    }

    let now = helpers::now_primitive();
    repositories::attempts::update_status(&mut *tx, attempt_id, to, now)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to update attempt status"))?;

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    repositories::attempts::fetch_one_by_id(state.db(), attempt_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch attempt"))
}
