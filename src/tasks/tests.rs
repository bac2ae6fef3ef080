use axum::http::{Method, StatusCode};
use tower::ServiceExt;

use crate::db::types::{AttemptStatus, FactKind, ResultStatus};
use crate::repositories;
use crate::tasks::{derivation, sweeper};
use crate::test_support::{self, ExamFixture, TestContext};

async fn started_attempt(ctx: &TestContext) -> String {
    let teacher = test_support::insert_teacher(ctx.state.db(), "teacher01").await;
    let student = test_support::insert_student(ctx.state.db(), "student01").await;
    let exam = test_support::insert_exam(ctx.state.db(), &teacher.id, ExamFixture::default()).await;
    test_support::insert_question(ctx.state.db(), &exam.id, 0, 100.0).await;

    let token = test_support::bearer_token(&student.id, ctx.state.settings());
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/attempts/exams/{}/start", exam.id),
            Some(&token),
            None,
        ))
        .await
        .expect("start attempt");
    let status = response.status();
    let attempt = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {attempt}");
    attempt["id"].as_str().expect("attempt id").to_string()
}

async fn age_attempt(ctx: &TestContext, attempt_id: &str, hours: i32) {
    sqlx::query(
        "UPDATE attempts SET started_at = started_at - make_interval(hours => $1) WHERE id = $2",
    )
    .bind(hours)
    .bind(attempt_id)
    .execute(ctx.state.db())
    .await
    .expect("age attempt");
}

#[tokio::test]
async fn sweep_auto_submits_stale_attempts_and_derivation_follows() {
    let ctx = test_support::setup_test_context().await;
    let attempt_id = started_attempt(&ctx).await;

    // 25 hours old against the default 24-hour staleness threshold.
    age_attempt(&ctx, &attempt_id, 25).await;

    sweeper::expire_stale_attempts(&ctx.state).await.expect("sweep");

    let attempt = repositories::attempts::fetch_one_by_id(ctx.state.db(), &attempt_id)
        .await
        .expect("attempt");
    assert_eq!(attempt.status, AttemptStatus::AutoSubmitted);
    assert!(attempt.auto_submitted);
    assert!(attempt.submitted_at.is_some());
    assert!(attempt.time_taken_seconds.unwrap_or(0) >= 25 * 3600_i64);

    let fact =
        repositories::outbox::find_by_attempt(ctx.state.db(), &attempt_id, FactKind::Finalized)
            .await
            .expect("fact query")
            .expect("finalized fact");
    assert_eq!(fact.payload.0["auto_submitted"], serde_json::Value::Bool(true));

    // The fact worker picks it up and derives exactly one result.
    let processed = derivation::process_next_fact(&ctx.state).await.expect("process fact");
    assert_eq!(processed.as_deref(), Some(attempt_id.as_str()));

    let result = repositories::results::find_by_attempt(ctx.state.db(), &attempt_id)
        .await
        .expect("result query")
        .expect("result");
    assert_eq!(result.status, ResultStatus::PendingGrading);
    assert!(result.auto_submitted);

    // Queue drained; nothing left to claim.
    let drained = derivation::process_next_fact(&ctx.state).await.expect("drained");
    assert!(drained.is_none());

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM results WHERE attempt_id = $1")
        .bind(&attempt_id)
        .fetch_one(ctx.state.db())
        .await
        .expect("count");
    assert_eq!(rows, 1);
}

#[tokio::test]
async fn sweep_leaves_fresh_attempts_alone() {
    let ctx = test_support::setup_test_context().await;
    let attempt_id = started_attempt(&ctx).await;

    age_attempt(&ctx, &attempt_id, 23).await;

    sweeper::expire_stale_attempts(&ctx.state).await.expect("sweep");

    let attempt = repositories::attempts::fetch_one_by_id(ctx.state.db(), &attempt_id)
        .await
        .expect("attempt");
    assert_eq!(attempt.status, AttemptStatus::InProgress);
}

#[tokio::test]
async fn sweep_is_idempotent_across_runs() {
    let ctx = test_support::setup_test_context().await;
    let attempt_id = started_attempt(&ctx).await;
    age_attempt(&ctx, &attempt_id, 30).await;

    sweeper::expire_stale_attempts(&ctx.state).await.expect("first sweep");
    let first = repositories::attempts::fetch_one_by_id(ctx.state.db(), &attempt_id)
        .await
        .expect("attempt");

    sweeper::expire_stale_attempts(&ctx.state).await.expect("second sweep");
    let second = repositories::attempts::fetch_one_by_id(ctx.state.db(), &attempt_id)
        .await
        .expect("attempt");

    assert_eq!(first.submitted_at, second.submitted_at);
    assert_eq!(second.status, AttemptStatus::AutoSubmitted);

    let facts: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM attempt_facts WHERE attempt_id = $1 AND kind = $2",
    )
    .bind(&attempt_id)
    .bind(FactKind::Finalized)
    .fetch_one(ctx.state.db())
    .await
    .expect("fact count");
    assert_eq!(facts, 1);
}

#[tokio::test]
async fn redelivered_fact_reuses_existing_result() {
    let ctx = test_support::setup_test_context().await;
    let attempt_id = started_attempt(&ctx).await;
    age_attempt(&ctx, &attempt_id, 25).await;
    sweeper::expire_stale_attempts(&ctx.state).await.expect("sweep");

    derivation::process_next_fact(&ctx.state).await.expect("first delivery");

    // Simulate at-least-once redelivery by reopening the processed fact.
    sqlx::query("UPDATE attempt_facts SET processed_at = NULL WHERE attempt_id = $1")
        .bind(&attempt_id)
        .execute(ctx.state.db())
        .await
        .expect("reopen fact");

    derivation::process_next_fact(&ctx.state).await.expect("second delivery");

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM results WHERE attempt_id = $1")
        .bind(&attempt_id)
        .fetch_one(ctx.state.db())
        .await
        .expect("count");
    assert_eq!(rows, 1, "duplicate delivery must not create a second result");
}
