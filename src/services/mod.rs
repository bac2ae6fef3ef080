pub(crate) mod derivation;
pub(crate) mod exam_content;
pub(crate) mod grading;
pub(crate) mod proctoring;
