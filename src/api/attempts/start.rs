use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::api::attempts::helpers;
use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::core::state::AppState;
use crate::db::types::{FactKind, UserRole};
use crate::repositories;
use crate::schemas::attempt::AttemptResponse;
use crate::services::exam_content;

/// StartAttempt. Two requests racing to create the first attempt both get the
/// same attempt back: the advisory lock serializes the check-then-insert, and
/// the active-attempt unique index catches anything that slips through, which
/// is then resolved by re-fetch instead of an error.
pub(in crate::api::attempts) async fn start_attempt(
    Path(exam_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<AttemptResponse>, ApiError> {
    if user.role != UserRole::Student {
        return Err(ApiError::Forbidden("Only students may start attempts"));
    }

    let exam = exam_content::get_exam(state.db(), &exam_id)
        .await
        .map_err(helpers::map_exam_content_error)?;

    let now = helpers::now_primitive();

    exam_content::check_available_for_start(&exam, now)
        .map_err(|denied| ApiError::BadRequest(denied.reason().to_string()))?;

    let seed = rand::random::<u32>();
    let shuffle_seed = i32::from_ne_bytes(seed.to_ne_bytes());

    let questions = exam_content::questions_for_student(state.db(), &exam, shuffle_seed)
        .await
        .map_err(helpers::map_exam_content_error)?;

    if questions.is_empty() {
        return Err(ApiError::BadRequest("Exam has no questions configured".to_string()));
    }

    let total_marks: f64 = questions.iter().map(|question| question.marks).sum();

    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    repositories::attempts::acquire_start_lock(&mut *tx, &exam_id, &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to acquire attempt lock"))?;

    let existing = repositories::attempts::find_active(&mut *tx, &exam_id, &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch attempt"))?;

    if let Some(attempt) = existing {
        tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;
        return Ok(Json(helpers::attempt_to_response(attempt, state.settings())));
    }

    let prior_attempts =
        repositories::attempts::count_by_exam_and_student(&mut *tx, &exam_id, &user.id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to count attempts"))?;

    exam_content::check_attempt_quota(&exam, prior_attempts)
        .map_err(|denied| ApiError::BadRequest(denied.reason().to_string()))?;

    let attempt_id = Uuid::new_v4().to_string();
    let inserted = repositories::attempts::create(
        &mut *tx,
        repositories::attempts::CreateAttempt {
            id: &attempt_id,
            exam_id: &exam_id,
            student_id: &user.id,
            attempt_number: (prior_attempts + 1) as i32,
            total_questions: questions.len() as i32,
            total_marks,
            started_at: now,
            exam_duration_minutes: exam.duration_minutes,
            shuffle_seed,
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create attempt"))?;

    if !inserted {
        let existing = repositories::attempts::find_active(&mut *tx, &exam_id, &user.id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to fetch attempt"))?
            .ok_or_else(|| {
                ApiError::Conflict("An active attempt already exists for this exam".to_string())
            })?;
        tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;
        return Ok(Json(helpers::attempt_to_response(existing, state.settings())));
    }

    // One answer row per question, up front; answering is always an update.
    let answer_rows: Vec<repositories::answers::NewAnswer> = questions
        .iter()
        .enumerate()
        .map(|(index, question)| repositories::answers::NewAnswer {
            id: Uuid::new_v4().to_string(),
            question_id: question.id.clone(),
            order_index: index as i32,
            marks_allocated: question.marks,
        })
        .collect();

    repositories::answers::insert_for_attempt(&mut *tx, &attempt_id, &answer_rows, now)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to materialize answers"))?;

    repositories::outbox::insert(
        &mut *tx,
        &attempt_id,
        &exam_id,
        &user.id,
        FactKind::Started,
        serde_json::json!({
            "attempt_number": prior_attempts + 1,
            "total_questions": questions.len(),
            "total_marks": total_marks,
        }),
        now,
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to record attempt-started fact"))?;

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    let attempt = repositories::attempts::fetch_one_by_id(state.db(), &attempt_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch attempt"))?;

    metrics::counter!("attempts_started_total").increment(1);
    tracing::info!(
        attempt_id = %attempt.id,
        exam_id = %exam_id,
        student_id = %user.id,
        attempt_number = attempt.attempt_number,
        "Attempt started"
    );

    Ok(Json(helpers::attempt_to_response(attempt, state.settings())))
}
