use axum::{extract::State, routing::get, Json, Router};

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::UserStats;
use crate::repositories;
use crate::schemas::dashboard::{DashboardResponse, PlanProgressResponse, StatsResponse};
use crate::schemas::essay::EssaySummary;
use crate::schemas::mock_exam::MockExamSummary;
use crate::schemas::user::UserResponse;

const RECENT_ITEMS: i64 = 5;

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/", get(get_dashboard))
}

fn empty_stats(user_id: &str) -> UserStats {
    UserStats {
        user_id: user_id.to_string(),
        average_score: 0.0,
        scored_count: 0,
        essays_completed: 0,
        exams_completed: 0,
        study_minutes: 0,
        streak_days: 0,
        last_study_date: None,
        xp: 0,
        level: 1,
        completion_percent: 0.0,
        badges: sqlx::types::Json(Vec::new()),
        updated_at: primitive_now_utc(),
    }
}

async fn get_dashboard(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<DashboardResponse>, ApiError> {
    let stats = repositories::stats::find(state.db(), &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load stats"))?
        .unwrap_or_else(|| empty_stats(&user.id));

    let essays = repositories::essays::list_for_user(state.db(), &user.id, 0, RECENT_ITEMS)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load recent essays"))?;
    let exams = repositories::mock_exams::list_for_user(state.db(), &user.id, 0, RECENT_ITEMS)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load recent mock exams"))?;
    let plan = repositories::study_plans::find_for_user(state.db(), &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load study plan"))?;

    Ok(Json(DashboardResponse {
        stats: StatsResponse::from_db(&stats),
        user: UserResponse::from_db(user),
        recent_essays: essays.iter().map(EssaySummary::from_db).collect(),
        recent_mock_exams: exams.iter().map(MockExamSummary::from_db).collect(),
        study_plan: plan.map(PlanProgressResponse::from_db),
    }))
}
