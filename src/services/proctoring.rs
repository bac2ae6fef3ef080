use crate::core::config::Settings;
use crate::db::models::Attempt;

/// Derived on read from configurable thresholds; never stored where it could
/// drift from the counters.
pub(crate) fn is_suspicious(attempt: &Attempt, settings: &Settings) -> bool {
    let thresholds = settings.proctoring();

    attempt.tab_switches > thresholds.suspicious_tab_switches
        || attempt.webcam_violations > thresholds.suspicious_webcam_violations
}

#[cfg(test)]
mod tests {
    use super::is_suspicious;
    use crate::core::config::Settings;
    use crate::core::time::primitive_now_utc;
    use crate::db::models::Attempt;
    use crate::db::types::AttemptStatus;
    use crate::test_support;

    fn attempt_with_counters(tab_switches: i32, webcam_violations: i32) -> Attempt {
        let now = primitive_now_utc();
        Attempt {
            id: "attempt-1".to_string(),
            exam_id: "exam-1".to_string(),
            student_id: "student-1".to_string(),
            attempt_number: 1,
            status: AttemptStatus::InProgress,
            total_questions: 1,
            total_marks: 100.0,
            answered_count: 0,
            flagged_count: 0,
            started_at: now,
            submitted_at: None,
            time_taken_seconds: None,
            exam_duration_minutes: 60,
            tab_switches,
            webcam_violations,
            copy_paste_count: 0,
            auto_submitted: false,
            shuffle_seed: 0,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn thresholds_are_exclusive_bounds() {
        let _guard = test_support::env_lock().await;
        test_support::set_test_env();
        let settings = Settings::load().expect("settings");

        // Defaults: 5 tab switches, 3 webcam violations.
        assert!(!is_suspicious(&attempt_with_counters(5, 0), &settings));
        assert!(is_suspicious(&attempt_with_counters(6, 0), &settings));
        assert!(!is_suspicious(&attempt_with_counters(0, 3), &settings));
        assert!(is_suspicious(&attempt_with_counters(0, 4), &settings));
    }
}
