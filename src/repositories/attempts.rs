use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::Attempt;
use crate::db::types::{AttemptStatus, ProctoringEventKind};

pub(crate) const COLUMNS: &str = "\
    id, exam_id, student_id, attempt_number, status, total_questions, total_marks, \
    answered_count, flagged_count, started_at, submitted_at, time_taken_seconds, \
    exam_duration_minutes, tab_switches, webcam_violations, copy_paste_count, \
    auto_submitted, shuffle_seed, notes, created_at, updated_at";

pub(crate) struct CreateAttempt<'a> {
    pub(crate) id: &'a str,
    pub(crate) exam_id: &'a str,
    pub(crate) student_id: &'a str,
    pub(crate) attempt_number: i32,
    pub(crate) total_questions: i32,
    pub(crate) total_marks: f64,
    pub(crate) started_at: PrimitiveDateTime,
    pub(crate) exam_duration_minutes: i32,
    pub(crate) shuffle_seed: i32,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

/// Serializes concurrent StartAttempt calls for one (exam, student) pair for
/// the lifetime of the surrounding transaction.
pub(crate) async fn acquire_start_lock(
    executor: impl sqlx::PgExecutor<'_>,
    exam_id: &str,
    student_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1 || ':' || $2, 0))")
        .bind(exam_id)
        .bind(student_id)
        .execute(executor)
        .await?;
    Ok(())
}

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Attempt>, sqlx::Error> {
    sqlx::query_as::<_, Attempt>(&format!("SELECT {COLUMNS} FROM attempts WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn fetch_one_by_id(pool: &PgPool, id: &str) -> Result<Attempt, sqlx::Error> {
    sqlx::query_as::<_, Attempt>(&format!("SELECT {COLUMNS} FROM attempts WHERE id = $1"))
        .bind(id)
        .fetch_one(pool)
        .await
}

/// Exclusive row lock for the read-modify-write sections (submit, pause,
/// resume, save-answer, proctoring, auto-submit).
pub(crate) async fn lock_by_id(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
) -> Result<Option<Attempt>, sqlx::Error> {
    sqlx::query_as::<_, Attempt>(&format!(
        "SELECT {COLUMNS} FROM attempts WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn find_active(
    executor: impl sqlx::PgExecutor<'_>,
    exam_id: &str,
    student_id: &str,
) -> Result<Option<Attempt>, sqlx::Error> {
    sqlx::query_as::<_, Attempt>(&format!(
        "SELECT {COLUMNS} FROM attempts \
         WHERE exam_id = $1 AND student_id = $2 AND status IN ($3, $4)"
    ))
    .bind(exam_id)
    .bind(student_id)
    .bind(AttemptStatus::InProgress)
    .bind(AttemptStatus::Paused)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn count_by_exam_and_student(
    executor: impl sqlx::PgExecutor<'_>,
    exam_id: &str,
    student_id: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM attempts WHERE exam_id = $1 AND student_id = $2")
        .bind(exam_id)
        .bind(student_id)
        .fetch_one(executor)
        .await
}

/// Insert guarded by the one-active-attempt partial unique index; a losing
/// racer gets `false` and re-fetches the winner's row.
pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    attempt: CreateAttempt<'_>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO attempts (
            id, exam_id, student_id, attempt_number, status, total_questions, total_marks,
            started_at, exam_duration_minutes, shuffle_seed, created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12)
        ON CONFLICT (exam_id, student_id) WHERE status IN ('in_progress', 'paused') DO NOTHING",
    )
    .bind(attempt.id)
    .bind(attempt.exam_id)
    .bind(attempt.student_id)
    .bind(attempt.attempt_number)
    .bind(AttemptStatus::InProgress)
    .bind(attempt.total_questions)
    .bind(attempt.total_marks)
    .bind(attempt.started_at)
    .bind(attempt.exam_duration_minutes)
    .bind(attempt.shuffle_seed)
    .bind(attempt.created_at)
    .bind(attempt.updated_at)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub(crate) async fn update_status(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    status: AttemptStatus,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE attempts SET status = $1, updated_at = $2 WHERE id = $3")
        .bind(status)
        .bind(now)
        .bind(id)
        .execute(executor)
        .await?;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub(crate) async fn finalize(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    status: AttemptStatus,
    submitted_at: PrimitiveDateTime,
    time_taken_seconds: i64,
    auto_submitted: bool,
    notes: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE attempts
         SET status = $1,
             submitted_at = $2,
             time_taken_seconds = $3,
             auto_submitted = $4,
             notes = COALESCE($5, notes),
             updated_at = $2
         WHERE id = $6",
    )
    .bind(status)
    .bind(submitted_at)
    .bind(time_taken_seconds)
    .bind(auto_submitted)
    .bind(notes)
    .bind(id)
    .execute(executor)
    .await?;
    Ok(())
}

pub(crate) async fn update_counters(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    answered_count: i32,
    flagged_count: i32,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE attempts SET answered_count = $1, flagged_count = $2, updated_at = $3 WHERE id = $4",
    )
    .bind(answered_count)
    .bind(flagged_count)
    .bind(now)
    .bind(id)
    .execute(executor)
    .await?;
    Ok(())
}

pub(crate) async fn increment_proctoring_counter(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    kind: ProctoringEventKind,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    let sql = match kind {
        ProctoringEventKind::TabSwitch => {
            "UPDATE attempts SET tab_switches = tab_switches + 1, updated_at = $1 WHERE id = $2"
        }
        ProctoringEventKind::WebcamViolation => {
            "UPDATE attempts SET webcam_violations = webcam_violations + 1, updated_at = $1 \
             WHERE id = $2"
        }
        ProctoringEventKind::CopyPaste => {
            "UPDATE attempts SET copy_paste_count = copy_paste_count + 1, updated_at = $1 \
             WHERE id = $2"
        }
    };

    sqlx::query(sql).bind(now).bind(id).execute(executor).await?;
    Ok(())
}

pub(crate) async fn list_by_student(
    pool: &PgPool,
    student_id: &str,
    skip: i64,
    limit: i64,
) -> Result<Vec<Attempt>, sqlx::Error> {
    sqlx::query_as::<_, Attempt>(&format!(
        "SELECT {COLUMNS} FROM attempts WHERE student_id = $1 \
         ORDER BY created_at DESC OFFSET $2 LIMIT $3"
    ))
    .bind(student_id)
    .bind(skip.max(0))
    .bind(limit.clamp(1, 1000))
    .fetch_all(pool)
    .await
}

pub(crate) async fn count_by_student(
    pool: &PgPool,
    student_id: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM attempts WHERE student_id = $1")
        .bind(student_id)
        .fetch_one(pool)
        .await
}

pub(crate) async fn list_by_exam(
    pool: &PgPool,
    exam_id: &str,
    status: Option<AttemptStatus>,
    skip: i64,
    limit: i64,
) -> Result<Vec<Attempt>, sqlx::Error> {
    let mut builder = sqlx::QueryBuilder::<sqlx::Postgres>::new(format!(
        "SELECT {COLUMNS} FROM attempts WHERE exam_id = "
    ));
    builder.push_bind(exam_id);

    if let Some(status) = status {
        builder.push(" AND status = ");
        builder.push_bind(status);
    }

    builder.push(" ORDER BY created_at DESC OFFSET ");
    builder.push_bind(skip.max(0));
    builder.push(" LIMIT ");
    builder.push_bind(limit.clamp(1, 1000));

    builder.build_query_as::<Attempt>().fetch_all(pool).await
}

pub(crate) async fn count_by_exam(
    pool: &PgPool,
    exam_id: &str,
    status: Option<AttemptStatus>,
) -> Result<i64, sqlx::Error> {
    let mut builder =
        sqlx::QueryBuilder::<sqlx::Postgres>::new("SELECT COUNT(*) FROM attempts WHERE exam_id = ");
    builder.push_bind(exam_id);

    if let Some(status) = status {
        builder.push(" AND status = ");
        builder.push_bind(status);
    }

    builder.build_query_scalar::<i64>().fetch_one(pool).await
}

/// Candidates for the expiry sweep; the sweep re-checks each row under a lock
/// before transitioning it.
pub(crate) async fn list_stale_in_progress(
    pool: &PgPool,
    started_before: PrimitiveDateTime,
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT id FROM attempts WHERE status = $1 AND started_at < $2 ORDER BY started_at",
    )
    .bind(AttemptStatus::InProgress)
    .bind(started_before)
    .fetch_all(pool)
    .await
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ExamAttemptStats {
    pub(crate) total_attempts: i64,
    pub(crate) in_progress: i64,
    pub(crate) paused: i64,
    pub(crate) submitted: i64,
    pub(crate) auto_submitted: i64,
    pub(crate) avg_time_taken_seconds: Option<f64>,
    pub(crate) avg_answered_count: Option<f64>,
}

pub(crate) async fn statistics_by_exam(
    pool: &PgPool,
    exam_id: &str,
) -> Result<ExamAttemptStats, sqlx::Error> {
    sqlx::query_as::<_, ExamAttemptStats>(
        "SELECT COUNT(*) AS total_attempts,
                COUNT(*) FILTER (WHERE status = $2) AS in_progress,
                COUNT(*) FILTER (WHERE status = $3) AS paused,
                COUNT(*) FILTER (WHERE status = $4) AS submitted,
                COUNT(*) FILTER (WHERE status = $5) AS auto_submitted,
                AVG(time_taken_seconds)::float8 AS avg_time_taken_seconds,
                AVG(answered_count)::float8 AS avg_answered_count
         FROM attempts
         WHERE exam_id = $1",
    )
    .bind(exam_id)
    .bind(AttemptStatus::InProgress)
    .bind(AttemptStatus::Paused)
    .bind(AttemptStatus::Submitted)
    .bind(AttemptStatus::AutoSubmitted)
    .fetch_one(pool)
    .await
}
