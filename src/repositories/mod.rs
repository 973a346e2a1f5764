pub(crate) mod essays;
pub(crate) mod mentor_messages;
pub(crate) mod mock_exams;
pub(crate) mod purchasers;
pub(crate) mod stats;
pub(crate) mod study_plans;
pub(crate) mod users;
