use anyhow::{Context, Result};
use time::Duration;

use crate::core::state::AppState;
use crate::core::time::{primitive_now_utc as now_primitive, seconds_between};
use crate::db::types::{AttemptStatus, FactKind};
use crate::repositories;
use crate::services::derivation;

/// Safety-net sweep over attempts stuck IN_PROGRESS past the staleness
/// threshold. The threshold is independent of each exam's duration; the
/// primary timer lives client-side. One bad row never blocks the batch.
pub(crate) async fn expire_stale_attempts(state: &AppState) -> Result<()> {
    let threshold_hours = state.settings().exam().stale_attempt_hours;
    let cutoff = now_primitive() - Duration::hours(threshold_hours as i64);

    let candidates = repositories::attempts::list_stale_in_progress(state.db(), cutoff)
        .await
        .context("Failed to list stale attempts")?;

    if candidates.is_empty() {
        return Ok(());
    }

    let mut expired = 0;
    let mut failed = 0;

    for attempt_id in candidates {
        match auto_submit_one(state, &attempt_id, cutoff).await {
            Ok(true) => expired += 1,
            Ok(false) => {}
            Err(err) => {
                failed += 1;
                tracing::error!(
                    attempt_id = %attempt_id,
                    error = %err,
                    "Failed to auto-submit stale attempt"
                );
            }
        }
    }

    tracing::info!(expired, failed, "Expiry sweep completed");
    metrics::counter!("attempts_auto_submitted_total").increment(expired);
    if failed > 0 {
        metrics::counter!("attempt_sweep_failures_total").increment(failed);
    }

    Ok(())
}

/// Same terminal transition and fact emission as a manual submit, performed
/// under the row lock so a racing manual submit cannot double-finalize.
async fn auto_submit_one(
    state: &AppState,
    attempt_id: &str,
    cutoff: time::PrimitiveDateTime,
) -> Result<bool> {
    let mut tx = state.db().begin().await.context("Failed to start transaction")?;

    let Some(attempt) = repositories::attempts::lock_by_id(&mut *tx, attempt_id)
        .await
        .context("Failed to lock attempt")?
    else {
        return Ok(false);
    };

    // A submit may have landed between the scan and the lock.
    if attempt.status != AttemptStatus::InProgress || attempt.started_at >= cutoff {
        return Ok(false);
    }

    let now = now_primitive();
    let time_taken = seconds_between(attempt.started_at, now).max(0);

    repositories::attempts::finalize(
        &mut *tx,
        attempt_id,
        AttemptStatus::AutoSubmitted,
        now,
        time_taken,
        true,
        None,
    )
    .await
    .context("Failed to finalize attempt")?;

    let answers = repositories::answers::list_by_attempt(&mut *tx, attempt_id)
        .await
        .context("Failed to list answers")?;
    let finalized = repositories::attempts::lock_by_id(&mut *tx, attempt_id)
        .await
        .context("Failed to refetch attempt")?
        .context("attempt missing after finalize")?;

    repositories::outbox::insert(
        &mut *tx,
        attempt_id,
        &finalized.exam_id,
        &finalized.student_id,
        FactKind::Finalized,
        derivation::finalized_fact_payload(&finalized, &answers),
        now,
    )
    .await
    .context("Failed to record finalized fact")?;

    tx.commit().await.context("Failed to commit transaction")?;

    tracing::info!(
        attempt_id = %attempt_id,
        exam_id = %finalized.exam_id,
        student_id = %finalized.student_id,
        "Stale attempt auto-submitted"
    );

    Ok(true)
}
