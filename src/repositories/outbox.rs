use sqlx::types::Json;
use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::AttemptFact;
use crate::db::types::FactKind;

pub(crate) const COLUMNS: &str = "\
    id, attempt_id, exam_id, student_id, kind, payload, processed_at, \
    delivery_attempts, last_error, created_at";

/// Written in the same transaction as the state transition it records, so a
/// committed terminal attempt always has its finalized fact. Duplicate
/// emission attempts collapse on (attempt_id, kind).
pub(crate) async fn insert(
    executor: impl sqlx::PgExecutor<'_>,
    attempt_id: &str,
    exam_id: &str,
    student_id: &str,
    kind: FactKind,
    payload: serde_json::Value,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let inserted = sqlx::query(
        "INSERT INTO attempt_facts (attempt_id, exam_id, student_id, kind, payload, created_at)
         VALUES ($1, $2, $3, $4, $5, $6)
         ON CONFLICT (attempt_id, kind) DO NOTHING",
    )
    .bind(attempt_id)
    .bind(exam_id)
    .bind(student_id)
    .bind(kind)
    .bind(Json(payload))
    .bind(now)
    .execute(executor)
    .await?;

    Ok(inserted.rows_affected() > 0)
}

/// At-least-once claim: the delivery counter is bumped up front, so a worker
/// crash between claim and mark_processed leaves the fact eligible for
/// redelivery on the next poll.
pub(crate) async fn claim_next_finalized(
    pool: &PgPool,
) -> Result<Option<AttemptFact>, sqlx::Error> {
    sqlx::query_as::<_, AttemptFact>(
        "WITH candidate AS (
            SELECT id
            FROM attempt_facts
            WHERE kind = $1 AND processed_at IS NULL
            ORDER BY delivery_attempts, created_at
            FOR UPDATE SKIP LOCKED
            LIMIT 1
        )
        UPDATE attempt_facts
        SET delivery_attempts = delivery_attempts + 1
        FROM candidate
        WHERE attempt_facts.id = candidate.id
        RETURNING attempt_facts.id, attempt_facts.attempt_id, attempt_facts.exam_id,
                  attempt_facts.student_id, attempt_facts.kind, attempt_facts.payload,
                  attempt_facts.processed_at, attempt_facts.delivery_attempts,
                  attempt_facts.last_error, attempt_facts.created_at",
    )
    .bind(FactKind::Finalized)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn mark_processed(
    executor: impl sqlx::PgExecutor<'_>,
    id: i64,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE attempt_facts SET processed_at = $1, last_error = NULL WHERE id = $2")
        .bind(now)
        .bind(id)
        .execute(executor)
        .await?;
    Ok(())
}

pub(crate) async fn record_failure(
    executor: impl sqlx::PgExecutor<'_>,
    id: i64,
    error: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE attempt_facts SET last_error = $1 WHERE id = $2")
        .bind(error)
        .bind(id)
        .execute(executor)
        .await?;
    Ok(())
}

pub(crate) async fn find_by_attempt(
    pool: &PgPool,
    attempt_id: &str,
    kind: FactKind,
) -> Result<Option<AttemptFact>, sqlx::Error> {
    sqlx::query_as::<_, AttemptFact>(&format!(
        "SELECT {COLUMNS} FROM attempt_facts WHERE attempt_id = $1 AND kind = $2"
    ))
    .bind(attempt_id)
    .bind(kind)
    .fetch_optional(pool)
    .await
}
