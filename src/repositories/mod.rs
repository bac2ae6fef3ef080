pub(crate) mod answers;
pub(crate) mod attempts;
pub(crate) mod exams;
pub(crate) mod outbox;
pub(crate) mod questions;
pub(crate) mod results;
pub(crate) mod users;
