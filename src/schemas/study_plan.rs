use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::{format_date, format_primitive};
use crate::db::models::{PlanActivity, StudyPlan};
use crate::schemas::dashboard::ProgressResponse;
use crate::services::gamification::completion_percent;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct StudyPlanCreate {
    /// `YYYY-MM-DD`; today when absent.
    #[serde(default, alias = "startDate")]
    pub(crate) start_date: Option<String>,
    #[serde(alias = "examDate")]
    pub(crate) exam_date: String,
    #[serde(alias = "hoursPerDay")]
    #[validate(range(min = 1, max = 12, message = "hours_per_day must be between 1 and 12"))]
    pub(crate) hours_per_day: u32,
    #[serde(default, alias = "weakSubjects")]
    #[validate(length(max = 20, message = "at most 20 weak subjects"))]
    pub(crate) weak_subjects: Vec<String>,
    #[serde(default, alias = "strongSubjects")]
    #[validate(length(max = 20, message = "at most 20 strong subjects"))]
    pub(crate) strong_subjects: Vec<String>,
    #[serde(default, alias = "targetScore")]
    #[validate(range(min = 0, max = 1000, message = "target_score must be between 0 and 1000"))]
    pub(crate) target_score: Option<i32>,
}

#[derive(Debug, Serialize)]
pub(crate) struct PlanActivityResponse {
    pub(crate) index: usize,
    #[serde(flatten)]
    pub(crate) activity: PlanActivity,
}

#[derive(Debug, Serialize)]
pub(crate) struct StudyPlanResponse {
    pub(crate) id: String,
    pub(crate) start_date: String,
    pub(crate) end_date: String,
    pub(crate) profile: serde_json::Value,
    pub(crate) activities: Vec<PlanActivityResponse>,
    pub(crate) completed_count: i32,
    pub(crate) total_count: i32,
    pub(crate) completion_percent: f64,
    pub(crate) xp_earned: i64,
    pub(crate) source: String,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
}

impl StudyPlanResponse {
    pub(crate) fn from_db(plan: StudyPlan) -> Self {
        Self {
            id: plan.id,
            start_date: format_date(plan.start_date),
            end_date: format_date(plan.end_date),
            profile: plan.profile.0,
            activities: plan
                .activities
                .0
                .into_iter()
                .enumerate()
                .map(|(index, activity)| PlanActivityResponse { index, activity })
                .collect(),
            completion_percent: completion_percent(
                plan.completed_count.max(0) as u32,
                plan.total_count.max(0) as u32,
            ),
            completed_count: plan.completed_count,
            total_count: plan.total_count,
            xp_earned: plan.xp_earned,
            source: plan.source,
            created_at: format_primitive(plan.created_at),
            updated_at: format_primitive(plan.updated_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ActivityCompleteResponse {
    pub(crate) plan: StudyPlanResponse,
    pub(crate) progress: ProgressResponse,
}
