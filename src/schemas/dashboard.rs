use serde::Serialize;

use crate::core::time::format_date;
use crate::db::models::{StudyPlan, UserStats};
use crate::schemas::essay::EssaySummary;
use crate::schemas::mock_exam::MockExamSummary;
use crate::schemas::study_plan::PlanActivityResponse;
use crate::schemas::user::UserResponse;
use crate::services::gamification::{completion_percent, xp_to_next_level, ActivityOutcome, Badge};

#[derive(Debug, Serialize)]
pub(crate) struct BadgeResponse {
    pub(crate) code: String,
    pub(crate) title: String,
}

impl BadgeResponse {
    /// Unknown codes are kept with the code as title.
    pub(crate) fn from_code(code: &str) -> Self {
        let title =
            Badge::from_code(code).map_or_else(|| code.to_string(), |badge| badge.title().to_string());
        Self { code: code.to_string(), title }
    }
}

/// What an activity changed, returned by every endpoint that awards XP.
#[derive(Debug, Serialize)]
pub(crate) struct ProgressResponse {
    pub(crate) xp_gained: i64,
    pub(crate) xp_total: i64,
    pub(crate) level: i32,
    pub(crate) leveled_up: bool,
    pub(crate) streak_days: i32,
    pub(crate) new_badges: Vec<BadgeResponse>,
}

impl ProgressResponse {
    pub(crate) fn from_outcome(outcome: &ActivityOutcome) -> Self {
        Self {
            xp_gained: outcome.xp_gained,
            xp_total: outcome.xp_total,
            level: outcome.level,
            leveled_up: outcome.leveled_up,
            streak_days: outcome.streak_days,
            new_badges: outcome.new_badges.iter().map(|code| BadgeResponse::from_code(code)).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct StatsResponse {
    pub(crate) average_score: f64,
    pub(crate) essays_completed: i32,
    pub(crate) exams_completed: i32,
    pub(crate) study_hours: f64,
    pub(crate) streak_days: i32,
    pub(crate) last_study_date: Option<String>,
    pub(crate) xp: i64,
    pub(crate) level: i32,
    pub(crate) xp_to_next_level: i64,
    pub(crate) completion_percent: f64,
    pub(crate) badges: Vec<BadgeResponse>,
}

impl StatsResponse {
    pub(crate) fn from_db(stats: &UserStats) -> Self {
        Self {
            average_score: (stats.average_score * 10.0).round() / 10.0,
            essays_completed: stats.essays_completed,
            exams_completed: stats.exams_completed,
            study_hours: (stats.study_minutes as f64 / 60.0 * 10.0).round() / 10.0,
            streak_days: stats.streak_days,
            last_study_date: stats.last_study_date.map(format_date),
            xp: stats.xp,
            level: stats.level,
            xp_to_next_level: xp_to_next_level(stats.xp),
            completion_percent: stats.completion_percent,
            badges: stats.badges.0.iter().map(|code| BadgeResponse::from_code(code)).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct PlanProgressResponse {
    pub(crate) start_date: String,
    pub(crate) end_date: String,
    pub(crate) completed_count: i32,
    pub(crate) total_count: i32,
    pub(crate) completion_percent: f64,
    pub(crate) xp_earned: i64,
    pub(crate) next_activity: Option<PlanActivityResponse>,
}

impl PlanProgressResponse {
    pub(crate) fn from_db(plan: StudyPlan) -> Self {
        let next_activity = plan
            .activities
            .0
            .into_iter()
            .enumerate()
            .find(|(_, activity)| !activity.completed)
            .map(|(index, activity)| PlanActivityResponse { index, activity });

        Self {
            start_date: format_date(plan.start_date),
            end_date: format_date(plan.end_date),
            completion_percent: completion_percent(
                plan.completed_count.max(0) as u32,
                plan.total_count.max(0) as u32,
            ),
            completed_count: plan.completed_count,
            total_count: plan.total_count,
            xp_earned: plan.xp_earned,
            next_activity,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct DashboardResponse {
    pub(crate) user: UserResponse,
    pub(crate) stats: StatsResponse,
    pub(crate) recent_essays: Vec<EssaySummary>,
    pub(crate) recent_mock_exams: Vec<MockExamSummary>,
    pub(crate) study_plan: Option<PlanProgressResponse>,
}
