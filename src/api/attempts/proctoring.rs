use axum::{
    extract::{Path, State},
    Json,
};

use crate::api::attempts::helpers;
use crate::api::errors::ApiError;
use crate::api::guards::{require_attempt_ownership, CurrentUser};
use crate::core::state::AppState;
use crate::repositories;
use crate::schemas::attempt::{AttemptResponse, ProctoringEventRequest};

/// Proctoring events are high-frequency client noise: rate-limited per
/// attempt, silently acknowledged once the attempt is terminal, and counted
/// otherwise. The suspicious flag is derived on read, never stored.
pub(in crate::api::attempts) async fn record_event(
    Path(attempt_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<ProctoringEventRequest>,
) -> Result<Json<AttemptResponse>, ApiError> {
    let limits = state.settings().proctoring().clone();
    let rate_key = format!("proctoring:{attempt_id}");
    let allowed = match state
        .redis()
        .rate_limit(&rate_key, limits.event_rate_limit, limits.event_rate_window_seconds)
        .await
    {
        Ok(value) => value,
        Err(err) => {
            tracing::error!(error = %err, "Failed to check proctoring event rate limit");
            true
        }
    };
    if !allowed {
        return Err(ApiError::TooManyRequests("Proctoring event rate limit exceeded"));
    }

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
        tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;
        return Ok(Json(helpers::attempt_to_response(attempt, state.settings())));
    }

    let now = helpers::now_primitive();
    repositories::attempts::increment_proctoring_counter(&mut *tx, &attempt_id, payload.kind, now)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to record proctoring event"))?;

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    metrics::counter!("proctoring_events_total").increment(1);

    let attempt = repositories::attempts::fetch_one_by_id(state.db(), &attempt_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch attempt"))?;

    Ok(Json(helpers::attempt_to_response(attempt, state.settings())))
}
