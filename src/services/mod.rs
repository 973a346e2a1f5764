pub(crate) mod essay_grading;
pub(crate) mod gamification;
pub(crate) mod llm;
pub(crate) mod mentor;
pub(crate) mod mock_exam;
pub(crate) mod progress;
pub(crate) mod scoring;
pub(crate) mod study_plan;
