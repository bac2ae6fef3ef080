//! Boundary to the exam-content collaborator: exam metadata and the question
//! list the attempt lifecycle needs. A storage failure here is a transient
//! upstream condition the caller may retry, distinct from "exam missing".

use rand::rngs::StdRng;
use rand::{seq::SliceRandom, SeedableRng};
use sqlx::PgPool;
use thiserror::Error;
use time::PrimitiveDateTime;

use crate::db::models::{Exam, ExamQuestion};
use crate::db::types::ExamStatus;
use crate::repositories;

#[derive(Debug, Error)]
pub(crate) enum ExamContentError {
    #[error("exam not found")]
    NotFound,
    #[error("exam content lookup failed: {0}")]
    Unavailable(#[from] sqlx::Error),
}

/// Reasons StartAttempt refuses before touching the attempt store; each maps
/// to its own client-facing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StartDenied {
    NotPublished,
    Inactive,
    NotStartedYet,
    Ended,
    MaxAttemptsReached,
}

impl StartDenied {
    pub(crate) fn reason(self) -> &'static str {
        match self {
            Self::NotPublished => "Exam is not available for attempts",
            Self::Inactive => "Exam is disabled",
            Self::NotStartedYet => "Exam has not started yet",
            Self::Ended => "Exam has ended",
            Self::MaxAttemptsReached => "Maximum attempts reached",
        }
    }
}

pub(crate) async fn get_exam(pool: &PgPool, exam_id: &str) -> Result<Exam, ExamContentError> {
    repositories::exams::find_by_id(pool, exam_id).await?.ok_or(ExamContentError::NotFound)
}

pub(crate) fn check_available_for_start(
    exam: &Exam,
    now: PrimitiveDateTime,
) -> Result<(), StartDenied> {
    if !matches!(exam.status, ExamStatus::Published | ExamStatus::Active) {
        return Err(StartDenied::NotPublished);
    }
    if !exam.is_active {
        return Err(StartDenied::Inactive);
    }
    if now < exam.start_time {
        return Err(StartDenied::NotStartedYet);
    }
    if now > exam.end_time {
        return Err(StartDenied::Ended);
    }

    Ok(())
}

/// NULL max_attempts means unlimited.
pub(crate) fn check_attempt_quota(exam: &Exam, prior_attempts: i64) -> Result<(), StartDenied> {
    match exam.max_attempts {
        Some(max) if prior_attempts >= max as i64 => Err(StartDenied::MaxAttemptsReached),
        _ => Ok(()),
    }
}

/// Question list in delivery order. A shuffling exam gets a per-attempt
/// permutation reproducible from the persisted seed.
pub(crate) async fn questions_for_student(
    pool: &PgPool,
    exam: &Exam,
    shuffle_seed: i32,
) -> Result<Vec<ExamQuestion>, ExamContentError> {
    let mut questions = repositories::questions::list_by_exam(pool, &exam.id).await?;

    if exam.shuffle_questions {
        let seed = u64::from(u32::from_ne_bytes(shuffle_seed.to_ne_bytes()));
        let mut rng = StdRng::seed_from_u64(seed);
        questions.shuffle(&mut rng);
    }

    Ok(questions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::time::primitive_now_utc;
    use time::Duration;

    fn exam_fixture(now: PrimitiveDateTime) -> Exam {
        Exam {
            id: "exam-1".to_string(),
            title: "Midterm".to_string(),
            description: None,
            created_by: "teacher-1".to_string(),
            duration_minutes: 60,
            passing_marks: 50.0,
            max_attempts: Some(2),
            start_time: now - Duration::hours(1),
            end_time: now + Duration::hours(1),
            status: ExamStatus::Published,
            is_active: true,
            show_results_immediately: false,
            shuffle_questions: false,
            published_at: Some(now - Duration::hours(2)),
            created_at: now - Duration::days(1),
            updated_at: now - Duration::days(1),
        }
    }

    #[test]
    fn available_inside_window() {
        let now = primitive_now_utc();
        let exam = exam_fixture(now);
        assert!(check_available_for_start(&exam, now).is_ok());
    }

    #[test]
    fn denied_with_distinct_reasons() {
        let now = primitive_now_utc();

        let mut exam = exam_fixture(now);
        exam.status = ExamStatus::Draft;
        assert_eq!(check_available_for_start(&exam, now), Err(StartDenied::NotPublished));

        let mut exam = exam_fixture(now);
        exam.is_active = false;
        assert_eq!(check_available_for_start(&exam, now), Err(StartDenied::Inactive));

        let mut exam = exam_fixture(now);
        exam.start_time = now + Duration::minutes(5);
        assert_eq!(check_available_for_start(&exam, now), Err(StartDenied::NotStartedYet));

        let mut exam = exam_fixture(now);
        exam.end_time = now - Duration::minutes(5);
        assert_eq!(check_available_for_start(&exam, now), Err(StartDenied::Ended));
    }

    #[test]
    fn quota_unlimited_when_unset() {
        let now = primitive_now_utc();
        let mut exam = exam_fixture(now);
        exam.max_attempts = None;
        assert!(check_attempt_quota(&exam, 1000).is_ok());
    }

    #[test]
    fn quota_enforced_when_set() {
        let now = primitive_now_utc();
        let exam = exam_fixture(now);
        assert!(check_attempt_quota(&exam, 1).is_ok());
        assert_eq!(check_attempt_quota(&exam, 2), Err(StartDenied::MaxAttemptsReached));
    }
}
