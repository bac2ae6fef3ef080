use serde::{Deserialize, Serialize};
use sqlx::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "userrole", rename_all = "lowercase")]
pub(crate) enum UserRole {
    Student,
    Teacher,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "examstatus", rename_all = "lowercase")]
pub(crate) enum ExamStatus {
    Draft,
    Published,
    Active,
    Completed,
    Archived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "attemptstatus", rename_all = "snake_case")]
pub(crate) enum AttemptStatus {
    InProgress,
    Paused,
    Submitted,
    AutoSubmitted,
}

impl AttemptStatus {
    /// SUBMITTED and AUTO_SUBMITTED are final; nothing transitions out of them.
    pub(crate) fn is_terminal(self) -> bool {
        matches!(self, Self::Submitted | Self::AutoSubmitted)
    }

    pub(crate) fn is_active(self) -> bool {
        matches!(self, Self::InProgress | Self::Paused)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "resultstatus", rename_all = "snake_case")]
pub(crate) enum ResultStatus {
    PendingGrading,
    Draft,
    Graded,
    Published,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "factkind", rename_all = "lowercase")]
pub(crate) enum FactKind {
    Started,
    Finalized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum ProctoringEventKind {
    TabSwitch,
    WebcamViolation,
    CopyPaste,
}

#[cfg(test)]
mod tests {
    use super::AttemptStatus;

    #[test]
    fn terminal_and_active_partition_states() {
        assert!(AttemptStatus::Submitted.is_terminal());
        assert!(AttemptStatus::AutoSubmitted.is_terminal());
        assert!(!AttemptStatus::InProgress.is_terminal());
        assert!(!AttemptStatus::Paused.is_terminal());

        assert!(AttemptStatus::InProgress.is_active());
        assert!(AttemptStatus::Paused.is_active());
        assert!(!AttemptStatus::Submitted.is_active());
        assert!(!AttemptStatus::AutoSubmitted.is_active());
    }
}
