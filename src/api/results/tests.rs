use axum::http::{Method, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use crate::core::time::primitive_now_utc;
use crate::db::models::{Exam, User};
use crate::db::types::ResultStatus;
use crate::repositories;
use crate::services::derivation;
use crate::test_support::{self, ExamFixture, TestContext};

async fn setup_exam(ctx: &TestContext, fixture: ExamFixture, marks: f64) -> (User, Exam) {
    let teacher = test_support::insert_teacher(ctx.state.db(), "teacher01").await;
    let exam = test_support::insert_exam(ctx.state.db(), &teacher.id, fixture).await;
    test_support::insert_question(ctx.state.db(), &exam.id, 0, marks).await;
    (teacher, exam)
}

/// Start and submit one attempt for the student, returning the attempt id.
async fn finalized_attempt(ctx: &TestContext, student: &User, exam_id: &str) -> String {
    let token = test_support::bearer_token(&student.id, ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/attempts/exams/{exam_id}/start"),
            Some(&token),
            None,
        ))
        .await
        .expect("start attempt");
    let status = response.status();
    let attempt = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {attempt}");
    let attempt_id = attempt["id"].as_str().expect("attempt id").to_string();

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/attempts/{attempt_id}/submit"),
            Some(&token),
            None,
        ))
        .await
        .expect("submit attempt");
    assert_eq!(response.status(), StatusCode::OK);

    attempt_id
}

async fn grade_all_answers(ctx: &TestContext, attempt_id: &str, marks_each: f64) {
    let answers = repositories::answers::list_by_attempt(ctx.state.db(), attempt_id)
        .await
        .expect("answers");
    for answer in answers {
        repositories::answers::set_marks(
            ctx.state.db(),
            attempt_id,
            &answer.question_id,
            Some(marks_each > 0.0),
            Some(marks_each),
            primitive_now_utc(),
        )
        .await
        .expect("set marks");
    }
}

#[tokio::test]
async fn derive_result_is_idempotent() {
    let ctx = test_support::setup_test_context().await;
    let (_, exam) = setup_exam(&ctx, ExamFixture::default(), 100.0).await;
    let student = test_support::insert_student(ctx.state.db(), "student01").await;
    let attempt_id = finalized_attempt(&ctx, &student, &exam.id).await;

    let first = derivation::derive_result(&ctx.state, &attempt_id).await.expect("first derive");
    let second = derivation::derive_result(&ctx.state, &attempt_id).await.expect("second derive");

    assert_eq!(first.id, second.id);
    assert_eq!(first.status, second.status);
    assert_eq!(first.obtained_marks, second.obtained_marks);

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM results WHERE attempt_id = $1")
        .bind(&attempt_id)
        .fetch_one(ctx.state.db())
        .await
        .expect("count");
    assert_eq!(rows, 1);
}

#[tokio::test]
async fn derive_requires_grading_when_answers_are_unmarked() {
    let ctx = test_support::setup_test_context().await;
    let (_, exam) = setup_exam(&ctx, ExamFixture::default(), 100.0).await;
    let student = test_support::insert_student(ctx.state.db(), "student01").await;
    let attempt_id = finalized_attempt(&ctx, &student, &exam.id).await;

    let result = derivation::derive_result(&ctx.state, &attempt_id).await.expect("derive");

    assert_eq!(result.status, ResultStatus::PendingGrading);
    assert!(result.requires_manual_grading);
    assert_eq!(result.obtained_marks, 0.0);
}

#[tokio::test]
async fn derive_publishes_immediately_when_exam_allows() {
    let ctx = test_support::setup_test_context().await;
    let (_, exam) = setup_exam(
        &ctx,
        ExamFixture { show_results_immediately: true, ..ExamFixture::default() },
        100.0,
    )
    .await;
    let student = test_support::insert_student(ctx.state.db(), "student01").await;
    let attempt_id = finalized_attempt(&ctx, &student, &exam.id).await;
    grade_all_answers(&ctx, &attempt_id, 55.0).await;

    let result = derivation::derive_result(&ctx.state, &attempt_id).await.expect("derive");

    assert_eq!(result.status, ResultStatus::Published);
    assert!(result.published_at.is_some());
    assert_eq!(result.obtained_marks, 55.0);
    assert_eq!(result.percentage, 55.0);
    assert_eq!(result.grade, "D");
    assert!(result.passed, "55 obtained against passing marks of 50");
}

#[tokio::test]
async fn grade_then_publish_flow() {
    let ctx = test_support::setup_test_context().await;
    let (teacher, exam) = setup_exam(&ctx, ExamFixture::default(), 100.0).await;
    let student = test_support::insert_student(ctx.state.db(), "student01").await;
    let attempt_id = finalized_attempt(&ctx, &student, &exam.id).await;

    let result = derivation::derive_result(&ctx.state, &attempt_id).await.expect("derive");
    assert_eq!(result.status, ResultStatus::PendingGrading);

    let teacher_token = test_support::bearer_token(&teacher.id, ctx.state.settings());

    // Publication before grading is a precondition failure.
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/results/{}/publish", result.id),
            Some(&teacher_token),
            None,
        ))
        .await
        .expect("early publish");
    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "response: {body}");
    assert_eq!(body["detail"], "Result requires manual grading before publication");

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/results/{}/grade", result.id),
            Some(&teacher_token),
            Some(json!({ "obtained_marks": 55.0, "feedback": "solid work" })),
        ))
        .await
        .expect("grade");
    let status = response.status();
    let graded = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {graded}");
    assert_eq!(graded["status"], "graded");
    assert_eq!(graded["grade"], "D");
    assert_eq!(graded["percentage"], 55.0);
    assert_eq!(graded["passed"], true);
    assert_eq!(graded["requires_manual_grading"], false);
    assert_eq!(graded["graded_by"], teacher.id);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/results/{}/publish", result.id),
            Some(&teacher_token),
            Some(json!({ "comments": "released", "calculate_rankings": true })),
        ))
        .await
        .expect("publish");
    let status = response.status();
    let published = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {published}");
    assert_eq!(published["status"], "published");
    assert_eq!(published["published_by"], teacher.id);
    assert_eq!(published["rank"], 1);

    // Publishing twice is a real rejection, not a silent overwrite.
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/results/{}/publish", result.id),
            Some(&teacher_token),
            None,
        ))
        .await
        .expect("double publish");
    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "response: {body}");
    assert_eq!(body["detail"], "Result is already published");
}

#[tokio::test]
async fn grading_requires_exam_ownership() {
    let ctx = test_support::setup_test_context().await;
    let (_, exam) = setup_exam(&ctx, ExamFixture::default(), 100.0).await;
    let student = test_support::insert_student(ctx.state.db(), "student01").await;
    let attempt_id = finalized_attempt(&ctx, &student, &exam.id).await;
    let result = derivation::derive_result(&ctx.state, &attempt_id).await.expect("derive");

    let interloper = test_support::insert_teacher(ctx.state.db(), "teacher99").await;
    let interloper_token = test_support::bearer_token(&interloper.id, ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/results/{}/grade", result.id),
            Some(&interloper_token),
            Some(json!({ "obtained_marks": 100.0 })),
        ))
        .await
        .expect("foreign grade");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let admin = test_support::insert_admin(ctx.state.db(), "admin01").await;
    let admin_token = test_support::bearer_token(&admin.id, ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/results/{}/grade", result.id),
            Some(&admin_token),
            Some(json!({ "obtained_marks": 60.0 })),
        ))
        .await
        .expect("admin grade");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn unpublish_reverts_and_clears_publication_fields() {
    let ctx = test_support::setup_test_context().await;
    let (teacher, exam) = setup_exam(&ctx, ExamFixture::default(), 100.0).await;
    let student = test_support::insert_student(ctx.state.db(), "student01").await;
    let attempt_id = finalized_attempt(&ctx, &student, &exam.id).await;
    grade_all_answers(&ctx, &attempt_id, 70.0).await;

    let result = derivation::derive_result(&ctx.state, &attempt_id).await.expect("derive");
    assert_eq!(result.status, ResultStatus::Draft);

    let teacher_token = test_support::bearer_token(&teacher.id, ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/results/{}/publish", result.id),
            Some(&teacher_token),
            None,
        ))
        .await
        .expect("publish");
    assert_eq!(response.status(), StatusCode::OK);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/results/{}/unpublish", result.id),
            Some(&teacher_token),
            None,
        ))
        .await
        .expect("unpublish");
    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["status"], "draft");
    assert_eq!(body["published_at"], serde_json::Value::Null);
    assert_eq!(body["published_by"], serde_json::Value::Null);
    assert_eq!(body["rank"], serde_json::Value::Null);
}

#[tokio::test]
async fn rankings_use_competition_scheme() {
    let ctx = test_support::setup_test_context().await;
    let (teacher, exam) = setup_exam(&ctx, ExamFixture::default(), 100.0).await;
    let teacher_token = test_support::bearer_token(&teacher.id, ctx.state.settings());

    // marks [90, 90, 80, 70] must rank [1, 1, 3, 4]
    let scores = [90.0, 90.0, 80.0, 70.0];
    let mut result_ids = Vec::new();

    for (index, score) in scores.iter().enumerate() {
        let student =
            test_support::insert_student(ctx.state.db(), &format!("student{index:02}")).await;
        let attempt_id = finalized_attempt(&ctx, &student, &exam.id).await;
        grade_all_answers(&ctx, &attempt_id, *score).await;
        let result = derivation::derive_result(&ctx.state, &attempt_id).await.expect("derive");

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                &format!("/api/v1/results/{}/publish", result.id),
                Some(&teacher_token),
                None,
            ))
            .await
            .expect("publish");
        assert_eq!(response.status(), StatusCode::OK);
        result_ids.push(result.id);
    }

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/results/exams/{}/rankings", exam.id),
            Some(&teacher_token),
            None,
        ))
        .await
        .expect("recalculate");
    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["ranked_count"], 4);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            &format!("/api/v1/results/exams/{}?status=published", exam.id),
            Some(&teacher_token),
            None,
        ))
        .await
        .expect("list results");
    let listed = test_support::read_json(response).await;
    let items = listed["items"].as_array().expect("items");
    assert_eq!(items.len(), 4);

    let observed: Vec<(f64, i64)> = items
        .iter()
        .map(|item| {
            (item["obtained_marks"].as_f64().unwrap(), item["rank"].as_i64().unwrap())
        })
        .collect();
    assert_eq!(observed, vec![(90.0, 1), (90.0, 1), (80.0, 3), (70.0, 4)]);
}

#[tokio::test]
async fn students_see_results_only_after_publication() {
    let ctx = test_support::setup_test_context().await;
    let (teacher, exam) = setup_exam(&ctx, ExamFixture::default(), 100.0).await;
    let student = test_support::insert_student(ctx.state.db(), "student01").await;
    let attempt_id = finalized_attempt(&ctx, &student, &exam.id).await;
    grade_all_answers(&ctx, &attempt_id, 80.0).await;

    let result = derivation::derive_result(&ctx.state, &attempt_id).await.expect("derive");
    let student_token = test_support::bearer_token(&student.id, ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            &format!("/api/v1/results/{}", result.id),
            Some(&student_token),
            None,
        ))
        .await
        .expect("unpublished read");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let teacher_token = test_support::bearer_token(&teacher.id, ctx.state.settings());
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/results/{}/publish", result.id),
            Some(&teacher_token),
            None,
        ))
        .await
        .expect("publish");
    assert_eq!(response.status(), StatusCode::OK);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            &format!("/api/v1/results/attempts/{attempt_id}"),
            Some(&student_token),
            None,
        ))
        .await
        .expect("published read");
    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["grade"], "A");
    assert_eq!(body["passed"], true);

    let other = test_support::insert_student(ctx.state.db(), "student99").await;
    let other_token = test_support::bearer_token(&other.id, ctx.state.settings());
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            &format!("/api/v1/results/{}", result.id),
            Some(&other_token),
            None,
        ))
        .await
        .expect("foreign read");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn top_scorers_reflect_published_set() {
    let ctx = test_support::setup_test_context().await;
    let (teacher, exam) = setup_exam(
        &ctx,
        ExamFixture { show_results_immediately: true, ..ExamFixture::default() },
        100.0,
    )
    .await;
    let teacher_token = test_support::bearer_token(&teacher.id, ctx.state.settings());

    for (index, score) in [95.0, 85.0].iter().enumerate() {
        let student =
            test_support::insert_student(ctx.state.db(), &format!("student{index:02}")).await;
        let attempt_id = finalized_attempt(&ctx, &student, &exam.id).await;
        grade_all_answers(&ctx, &attempt_id, *score).await;
        derivation::derive_result(&ctx.state, &attempt_id).await.expect("derive");
    }

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            &format!("/api/v1/results/exams/{}/top-scorers", exam.id),
            Some(&teacher_token),
            None,
        ))
        .await
        .expect("top scorers");
    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {body}");

    let scorers = body["top_scorers"].as_array().expect("scorers");
    assert_eq!(scorers.len(), 2);
    assert_eq!(scorers[0]["obtained_marks"], 95.0);
    assert_eq!(scorers[1]["obtained_marks"], 85.0);
}
