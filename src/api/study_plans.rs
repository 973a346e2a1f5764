use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::api::validation;
use crate::core::redis::RateLimit;
use crate::core::state::AppState;
use crate::core::time::{format_primitive, primitive_now_utc, today_utc};
use crate::repositories;
use crate::schemas::dashboard::ProgressResponse;
use crate::schemas::study_plan::{ActivityCompleteResponse, StudyPlanCreate, StudyPlanResponse};
use crate::services::gamification::{ActivityEvent, ActivityKind};
use crate::services::progress;
use crate::services::study_plan::{self, PlanProfile, PlanRange};

const GENERATION_RATE_LIMIT: RateLimit = RateLimit::new("study_plan", 10, 3600);

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_plan))
        .route("/current", get(get_current_plan))
        .route("/current/activities/:index/complete", post(complete_activity))
}

/// Trims, drops blanks and removes case-insensitive duplicates.
fn clean_subjects(subjects: &[String]) -> Vec<String> {
    let mut cleaned: Vec<String> = Vec::with_capacity(subjects.len());
    for subject in subjects {
        let subject = subject.trim();
        if subject.is_empty() || cleaned.iter().any(|seen| seen.eq_ignore_ascii_case(subject)) {
            continue;
        }
        cleaned.push(subject.to_string());
    }
    cleaned
}

async fn create_plan(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<StudyPlanCreate>,
) -> Result<(StatusCode, Json<StudyPlanResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let start = match payload.start_date.as_deref() {
        Some(raw) => validation::date_field(raw, "start_date")?,
        None => today_utc(),
    };
    let exam_date = validation::date_field(&payload.exam_date, "exam_date")?;
    let range = PlanRange::new(start, exam_date).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let profile = PlanProfile {
        exam_date,
        hours_per_day: payload.hours_per_day,
        weak_subjects: clean_subjects(&payload.weak_subjects),
        strong_subjects: clean_subjects(&payload.strong_subjects),
        target_score: payload.target_score,
    };

    if !state.redis().allow(GENERATION_RATE_LIMIT, &user.id).await {
        return Err(ApiError::TooManyRequests("Too many study plans requested, try again later"));
    }

    let generated = study_plan::generate_plan(state.llm(), &profile, range).await;
    let now = primitive_now_utc();

    // Same lock order as activity completion: plan row, then stats row.
    let mut tx =
        state.db().begin().await.map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;
    repositories::study_plans::lock_for_user(&mut tx, &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load study plan"))?;
    repositories::stats::lock_for_update(&mut tx, &user.id, now)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load progress"))?;

    let plan = repositories::study_plans::replace(
        &mut tx,
        repositories::study_plans::ReplacePlan {
            id: &Uuid::new_v4().to_string(),
            user_id: &user.id,
            start_date: range.start,
            end_date: range.end,
            profile: profile.to_document(),
            activities: &generated.activities,
            source: &generated.source,
            now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to store study plan"))?;

    repositories::stats::set_completion_percent(&mut tx, &user.id, 0.0, now)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to reset plan completion"))?;

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit study plan"))?;

    metrics::counter!(
        "study_plans_total",
        "source" => if generated.source == study_plan::FALLBACK_SOURCE { "fallback" } else { "model" }
    )
    .increment(1);
    tracing::info!(
        plan_id = %plan.id,
        days = range.days(),
        activities = generated.activities.len(),
        source = %generated.source,
        "Study plan generated"
    );

    Ok((StatusCode::CREATED, Json(StudyPlanResponse::from_db(plan))))
}

async fn get_current_plan(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<StudyPlanResponse>, ApiError> {
    let plan = repositories::study_plans::find_for_user(state.db(), &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load study plan"))?
        .ok_or(ApiError::NotFound("Study plan not found"))?;

    Ok(Json(StudyPlanResponse::from_db(plan)))
}

async fn complete_activity(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(index): Path<usize>,
) -> Result<Json<ActivityCompleteResponse>, ApiError> {
    let mut tx =
        state.db().begin().await.map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    let mut plan = repositories::study_plans::lock_for_user(&mut tx, &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load study plan"))?
        .ok_or(ApiError::NotFound("Study plan not found"))?;

    let now = primitive_now_utc();
    let minutes = {
        let activity =
            plan.activities.0.get_mut(index).ok_or(ApiError::NotFound("Activity not found"))?;
        if activity.completed {
            return Err(ApiError::Conflict("Activity was already completed".to_string()));
        }
        activity.completed = true;
        activity.completed_at = Some(format_primitive(now));
        activity.duration_minutes
    };

    let completed = plan.activities.0.iter().filter(|activity| activity.completed).count() as u32;
    let total = plan.activities.0.len() as u32;

    let event = ActivityEvent::new(ActivityKind::StudyActivity, minutes)
        .with_plan_progress(completed, total);
    let outcome = progress::record(&mut tx, &user.id, event)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to update progress"))?;

    plan.completed_count = completed as i32;
    plan.total_count = total as i32;
    plan.xp_earned += outcome.xp_gained;
    plan.updated_at = now;
    repositories::study_plans::save_progress(&mut tx, &plan)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to store plan progress"))?;

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit plan progress"))?;

    tracing::info!(plan_id = %plan.id, index, completed, total, "Study activity completed");

    Ok(Json(ActivityCompleteResponse {
        plan: StudyPlanResponse::from_db(plan),
        progress: ProgressResponse::from_outcome(&outcome),
    }))
}
