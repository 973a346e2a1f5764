use std::collections::HashMap;

use serde::Serialize;

pub(crate) mod auth;
pub(crate) mod dashboard;
pub(crate) mod essay;
pub(crate) mod mentor;
pub(crate) mod mock_exam;
pub(crate) mod study_plan;
pub(crate) mod user;
pub(crate) mod webhook;

#[derive(Debug, Serialize)]
pub(crate) struct HealthResponse {
    pub(crate) service: String,
    pub(crate) status: String,
    pub(crate) components: HashMap<String, String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct RootResponse {
    pub(crate) message: String,
    pub(crate) version: String,
    pub(crate) api_prefix: String,
}
