pub(crate) mod auth;
pub(crate) mod dashboard;
pub(crate) mod errors;
pub(crate) mod essays;
pub(crate) mod guards;
pub(crate) mod handlers;
pub(crate) mod mentor;
pub(crate) mod mock_exams;
pub(crate) mod pagination;
pub(crate) mod router;
pub(crate) mod study_plans;
pub(crate) mod validation;
pub(crate) mod webhooks;
