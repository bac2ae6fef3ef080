use anyhow::{Context, Result};

use crate::core::state::AppState;
use crate::core::time::primitive_now_utc as now_primitive;
use crate::repositories;
use crate::services::derivation;

/// Consumes one finalized-attempt fact, if any is pending. Delivery is
/// at-least-once: derivation's idempotency on attempt_id is the only defence
/// against duplicates, and a failed run leaves the fact unprocessed with its
/// error recorded for the next poll.
pub(crate) async fn process_next_fact(state: &AppState) -> Result<Option<String>> {
    let Some(fact) = repositories::outbox::claim_next_finalized(state.db())
        .await
        .context("Failed to claim finalized fact")?
    else {
        return Ok(None);
    };

    match derivation::derive_result(state, &fact.attempt_id).await {
        Ok(result) => {
            repositories::outbox::mark_processed(state.db(), fact.id, now_primitive())
                .await
                .context("Failed to mark fact processed")?;
            tracing::debug!(
                attempt_id = %fact.attempt_id,
                result_id = %result.id,
                delivery_attempts = fact.delivery_attempts,
                "Finalized fact processed"
            );
        }
        Err(err) => {
            tracing::error!(
                attempt_id = %fact.attempt_id,
                delivery_attempts = fact.delivery_attempts,
                error = %err,
                "Result derivation failed; fact left for redelivery"
            );
            if let Err(record_err) =
                repositories::outbox::record_failure(state.db(), fact.id, &err.to_string()).await
            {
                tracing::error!(
                    fact_id = fact.id,
                    error = %record_err,
                    "Failed to record derivation failure"
                );
            }
            metrics::counter!("derivation_failures_total").increment(1);
        }
    }

    Ok(Some(fact.attempt_id))
}
