use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::{CompetencyResult, Essay};
use crate::db::types::EssayStatus;
use crate::schemas::dashboard::ProgressResponse;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct EssayCreate {
    #[validate(length(min = 3, max = 200, message = "theme must have 3 to 200 characters"))]
    pub(crate) theme: String,
    pub(crate) text: String,
    #[serde(default, alias = "timeSpentMinutes")]
    #[validate(range(max = 600, message = "time_spent_minutes must be at most 600"))]
    pub(crate) time_spent_minutes: Option<u32>,
}

#[derive(Debug, Serialize)]
pub(crate) struct EssayResponse {
    pub(crate) id: String,
    pub(crate) theme: String,
    pub(crate) text: String,
    pub(crate) status: EssayStatus,
    pub(crate) competencies: Vec<CompetencyResult>,
    pub(crate) total_score: Option<i32>,
    pub(crate) strengths: Vec<String>,
    pub(crate) improvements: Vec<String>,
    pub(crate) general_comment: Option<String>,
    pub(crate) corrected_text: Option<String>,
    pub(crate) graded_by: Option<String>,
    pub(crate) time_spent_minutes: Option<i32>,
    pub(crate) created_at: String,
    pub(crate) graded_at: Option<String>,
}

impl EssayResponse {
    pub(crate) fn from_db(essay: Essay) -> Self {
        Self {
            id: essay.id,
            theme: essay.theme,
            text: essay.text,
            status: essay.status,
            competencies: essay.competencies.0,
            total_score: essay.total_score,
            strengths: essay.strengths.0,
            improvements: essay.improvements.0,
            general_comment: essay.general_comment,
            corrected_text: essay.corrected_text,
            graded_by: essay.graded_by,
            time_spent_minutes: essay.time_spent_minutes,
            created_at: format_primitive(essay.created_at),
            graded_at: essay.graded_at.map(format_primitive),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct EssaySummary {
    pub(crate) id: String,
    pub(crate) theme: String,
    pub(crate) status: EssayStatus,
    pub(crate) total_score: Option<i32>,
    pub(crate) created_at: String,
}

impl EssaySummary {
    pub(crate) fn from_db(essay: &Essay) -> Self {
        Self {
            id: essay.id.clone(),
            theme: essay.theme.clone(),
            status: essay.status,
            total_score: essay.total_score,
            created_at: format_primitive(essay.created_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct EssaySubmitResponse {
    pub(crate) essay: EssayResponse,
    /// `None` when an identical essay had already been graded.
    pub(crate) progress: Option<ProgressResponse>,
}
