use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::ExamResult;
use crate::db::types::ResultStatus;

pub(crate) const COLUMNS: &str = "\
    id, attempt_id, exam_id, student_id, obtained_marks, total_marks, percentage, grade, \
    passed, status, requires_manual_grading, rank, suspicious_activity, auto_submitted, \
    published_at, published_by, publish_comments, graded_by, graded_at, grader_feedback, \
    created_at, updated_at";

#[allow(clippy::struct_excessive_bools)]
pub(crate) struct CreateResult<'a> {
    pub(crate) id: &'a str,
    pub(crate) attempt_id: &'a str,
    pub(crate) exam_id: &'a str,
    pub(crate) student_id: &'a str,
    pub(crate) obtained_marks: f64,
    pub(crate) total_marks: f64,
    pub(crate) percentage: f64,
    pub(crate) grade: &'a str,
    pub(crate) passed: bool,
    pub(crate) status: ResultStatus,
    pub(crate) requires_manual_grading: bool,
    pub(crate) suspicious_activity: bool,
    pub(crate) auto_submitted: bool,
    pub(crate) published_at: Option<PrimitiveDateTime>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

/// Derivation is idempotent on attempt_id: a duplicate insert is a no-op and
/// the caller re-fetches the existing row.
pub(crate) async fn create_if_absent(
    executor: impl sqlx::PgExecutor<'_>,
    result: CreateResult<'_>,
) -> Result<bool, sqlx::Error> {
    let inserted = sqlx::query(
        "INSERT INTO results (
            id, attempt_id, exam_id, student_id, obtained_marks, total_marks, percentage,
            grade, passed, status, requires_manual_grading, suspicious_activity,
            auto_submitted, published_at, created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16)
        ON CONFLICT (attempt_id) DO NOTHING",
    )
    .bind(result.id)
    .bind(result.attempt_id)
    .bind(result.exam_id)
    .bind(result.student_id)
    .bind(result.obtained_marks)
    .bind(result.total_marks)
    .bind(result.percentage)
    .bind(result.grade)
    .bind(result.passed)
    .bind(result.status)
    .bind(result.requires_manual_grading)
    .bind(result.suspicious_activity)
    .bind(result.auto_submitted)
    .bind(result.published_at)
    .bind(result.created_at)
    .bind(result.updated_at)
    .execute(executor)
    .await?;

    Ok(inserted.rows_affected() > 0)
}

pub(crate) async fn find_by_id(
    pool: &PgPool,
    id: &str,
) -> Result<Option<ExamResult>, sqlx::Error> {
    sqlx::query_as::<_, ExamResult>(&format!("SELECT {COLUMNS} FROM results WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn find_by_attempt(
    executor: impl sqlx::PgExecutor<'_>,
    attempt_id: &str,
) -> Result<Option<ExamResult>, sqlx::Error> {
    sqlx::query_as::<_, ExamResult>(&format!(
        "SELECT {COLUMNS} FROM results WHERE attempt_id = $1"
    ))
    .bind(attempt_id)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn lock_by_id(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
) -> Result<Option<ExamResult>, sqlx::Error> {
    sqlx::query_as::<_, ExamResult>(&format!(
        "SELECT {COLUMNS} FROM results WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await
}

#[allow(clippy::too_many_arguments)]
pub(crate) async fn grade(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    obtained_marks: f64,
    percentage: f64,
    grade: &str,
    passed: bool,
    graded_by: &str,
    feedback: Option<&str>,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE results
         SET obtained_marks = $1,
             percentage = $2,
             grade = $3,
             passed = $4,
             status = $5,
             requires_manual_grading = FALSE,
             graded_by = $6,
             graded_at = $7,
             grader_feedback = $8,
             updated_at = $7
         WHERE id = $9",
    )
    .bind(obtained_marks)
    .bind(percentage)
    .bind(grade)
    .bind(passed)
    .bind(ResultStatus::Graded)
    .bind(graded_by)
    .bind(now)
    .bind(feedback)
    .bind(id)
    .execute(executor)
    .await?;
    Ok(())
}

pub(crate) async fn publish(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    published_by: &str,
    comments: Option<&str>,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE results
         SET status = $1,
             published_at = $2,
             published_by = $3,
             publish_comments = $4,
             updated_at = $2
         WHERE id = $5",
    )
    .bind(ResultStatus::Published)
    .bind(now)
    .bind(published_by)
    .bind(comments)
    .bind(id)
    .execute(executor)
    .await?;
    Ok(())
}

pub(crate) async fn unpublish(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    status: ResultStatus,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE results
         SET status = $1,
             published_at = NULL,
             published_by = NULL,
             publish_comments = NULL,
             rank = NULL,
             updated_at = $2
         WHERE id = $3",
    )
    .bind(status)
    .bind(now)
    .bind(id)
    .execute(executor)
    .await?;
    Ok(())
}

/// Full-replace competition ranking over the published set: equal marks share
/// a rank, the next distinct score skips by the size of the tie group.
pub(crate) async fn recalculate_rankings(
    executor: impl sqlx::PgExecutor<'_>,
    exam_id: &str,
    now: PrimitiveDateTime,
) -> Result<u64, sqlx::Error> {
    let updated = sqlx::query(
        "UPDATE results r
         SET rank = ranked.new_rank, updated_at = $2
         FROM (
             SELECT id, RANK() OVER (ORDER BY obtained_marks DESC)::int AS new_rank
             FROM results
             WHERE exam_id = $1 AND status = $3
         ) ranked
         WHERE r.id = ranked.id",
    )
    .bind(exam_id)
    .bind(now)
    .bind(ResultStatus::Published)
    .execute(executor)
    .await?;

    Ok(updated.rows_affected())
}

pub(crate) async fn clear_unpublished_ranks(
    executor: impl sqlx::PgExecutor<'_>,
    exam_id: &str,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE results
         SET rank = NULL, updated_at = $2
         WHERE exam_id = $1 AND status <> $3 AND rank IS NOT NULL",
    )
    .bind(exam_id)
    .bind(now)
    .bind(ResultStatus::Published)
    .execute(executor)
    .await?;
    Ok(())
}

pub(crate) async fn list_by_exam(
    pool: &PgPool,
    exam_id: &str,
    status: Option<ResultStatus>,
    skip: i64,
    limit: i64,
) -> Result<Vec<ExamResult>, sqlx::Error> {
    let mut builder = sqlx::QueryBuilder::<sqlx::Postgres>::new(format!(
        "SELECT {COLUMNS} FROM results WHERE exam_id = "
    ));
    builder.push_bind(exam_id);

    if let Some(status) = status {
        builder.push(" AND status = ");
        builder.push_bind(status);
    }

    builder.push(" ORDER BY obtained_marks DESC, created_at OFFSET ");
    builder.push_bind(skip.max(0));
    builder.push(" LIMIT ");
    builder.push_bind(limit.clamp(1, 1000));

    builder.build_query_as::<ExamResult>().fetch_all(pool).await
}

pub(crate) async fn count_by_exam(
    pool: &PgPool,
    exam_id: &str,
    status: Option<ResultStatus>,
) -> Result<i64, sqlx::Error> {
    let mut builder =
        sqlx::QueryBuilder::<sqlx::Postgres>::new("SELECT COUNT(*) FROM results WHERE exam_id = ");
    builder.push_bind(exam_id);

    if let Some(status) = status {
        builder.push(" AND status = ");
        builder.push_bind(status);
    }

    builder.build_query_scalar::<i64>().fetch_one(pool).await
}

pub(crate) async fn list_published_by_student(
    pool: &PgPool,
    student_id: &str,
    skip: i64,
    limit: i64,
) -> Result<Vec<ExamResult>, sqlx::Error> {
    sqlx::query_as::<_, ExamResult>(&format!(
        "SELECT {COLUMNS} FROM results WHERE student_id = $1 AND status = $2 \
         ORDER BY published_at DESC OFFSET $3 LIMIT $4"
    ))
    .bind(student_id)
    .bind(ResultStatus::Published)
    .bind(skip.max(0))
    .bind(limit.clamp(1, 1000))
    .fetch_all(pool)
    .await
}

pub(crate) async fn count_published_by_student(
    pool: &PgPool,
    student_id: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM results WHERE student_id = $1 AND status = $2")
        .bind(student_id)
        .bind(ResultStatus::Published)
        .fetch_one(pool)
        .await
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct TopScorerRow {
    pub(crate) result_id: String,
    pub(crate) student_id: String,
    pub(crate) student_name: String,
    pub(crate) obtained_marks: f64,
    pub(crate) percentage: f64,
    pub(crate) grade: String,
    pub(crate) rank: Option<i32>,
}

pub(crate) async fn top_scorers(
    pool: &PgPool,
    exam_id: &str,
    limit: i64,
) -> Result<Vec<TopScorerRow>, sqlx::Error> {
    sqlx::query_as::<_, TopScorerRow>(
        "SELECT r.id AS result_id,
                r.student_id,
                u.full_name AS student_name,
                r.obtained_marks,
                r.percentage,
                r.grade,
                r.rank
         FROM results r
         JOIN users u ON u.id = r.student_id
         WHERE r.exam_id = $1 AND r.status = $2
         ORDER BY r.obtained_marks DESC, r.published_at
         LIMIT $3",
    )
    .bind(exam_id)
    .bind(ResultStatus::Published)
    .bind(limit.clamp(1, 100))
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_pending_grading(
    pool: &PgPool,
    exam_id: &str,
) -> Result<Vec<ExamResult>, sqlx::Error> {
    sqlx::query_as::<_, ExamResult>(&format!(
        "SELECT {COLUMNS} FROM results \
         WHERE exam_id = $1 AND status = $2 \
         ORDER BY created_at"
    ))
    .bind(exam_id)
    .bind(ResultStatus::PendingGrading)
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_suspicious(
    pool: &PgPool,
    exam_id: &str,
) -> Result<Vec<ExamResult>, sqlx::Error> {
    sqlx::query_as::<_, ExamResult>(&format!(
        "SELECT {COLUMNS} FROM results \
         WHERE exam_id = $1 AND suspicious_activity \
         ORDER BY created_at"
    ))
    .bind(exam_id)
    .fetch_all(pool)
    .await
}
