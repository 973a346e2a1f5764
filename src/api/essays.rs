use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::api::pagination::{PageQuery, PaginatedResponse};
use crate::api::validation;
use crate::core::redis::RateLimit;
use crate::core::security::sha256_hex;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::types::EssayStatus;
use crate::repositories;
use crate::schemas::dashboard::ProgressResponse;
use crate::schemas::essay::{EssayCreate, EssayResponse, EssaySubmitResponse, EssaySummary};
use crate::services::essay_grading;
use crate::services::gamification::{ActivityEvent, ActivityKind};
use crate::services::progress;

const GRADING_RATE_LIMIT: RateLimit = RateLimit::new("essay", 20, 3600);

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/", post(submit_essay).get(list_essays)).route("/:essay_id", get(get_essay))
}

async fn submit_essay(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<EssayCreate>,
) -> Result<(StatusCode, Json<EssaySubmitResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let theme = validation::non_blank(&payload.theme, "theme")?;
    let text = validation::essay_text(&payload.text)?;
    let text_hash = sha256_hex(text);

    let existing = repositories::essays::find_by_hash(state.db(), &user.id, &text_hash)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to look up previous essays"))?;
    if let Some(essay) = existing {
        tracing::info!(essay_id = %essay.id, "Returning previously graded essay");
        return Ok((
            StatusCode::OK,
            Json(EssaySubmitResponse { essay: EssayResponse::from_db(essay), progress: None }),
        ));
    }

    if !state.redis().allow(GRADING_RATE_LIMIT, &user.id).await {
        return Err(ApiError::TooManyRequests("Too many essays submitted, try again later"));
    }

    let created_at = primitive_now_utc();
    let grade = essay_grading::grade_essay(state.llm(), theme, text).await;
    let (status, status_label) = if grade.is_fallback() {
        (EssayStatus::Fallback, "fallback")
    } else {
        (EssayStatus::Graded, "graded")
    };
    metrics::counter!("essay_gradings_total", "status" => status_label).increment(1);

    let mut event =
        ActivityEvent::new(ActivityKind::Essay, payload.time_spent_minutes.unwrap_or(0));
    if !grade.is_fallback() {
        event = event.with_score(grade.total_score);
    }

    // The row only exists once graded.
    let mut tx =
        state.db().begin().await.map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    let essay = repositories::essays::insert_graded(
        &mut tx,
        repositories::essays::CreateEssay {
            id: &Uuid::new_v4().to_string(),
            user_id: &user.id,
            theme,
            text,
            text_hash: &text_hash,
            time_spent_minutes: payload.time_spent_minutes.map(|minutes| minutes as i32),
            created_at,
        },
        repositories::essays::EssayGrade {
            status,
            total_score: grade.total_score,
            competencies: grade.competencies,
            strengths: grade.strengths,
            improvements: grade.improvements,
            general_comment: grade.general_comment,
            corrected_text: grade.corrected_text,
            graded_by: grade.graded_by,
            graded_at: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to store essay"))?;

    let outcome = progress::record(&mut tx, &user.id, event)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to update progress"))?;

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit essay grade"))?;

    tracing::info!(
        essay_id = %essay.id,
        status = status_label,
        total_score = ?essay.total_score,
        "Essay graded"
    );

    Ok((
        StatusCode::CREATED,
        Json(EssaySubmitResponse {
            essay: EssayResponse::from_db(essay),
            progress: Some(ProgressResponse::from_outcome(&outcome)),
        }),
    ))
}

async fn list_essays(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(page): Query<PageQuery>,
) -> Result<Json<PaginatedResponse<EssaySummary>>, ApiError> {
    let essays = repositories::essays::list_for_user(state.db(), &user.id, page.skip(), page.limit())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list essays"))?;
    let total_count = repositories::essays::count_for_user(state.db(), &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count essays"))?;

    Ok(Json(PaginatedResponse {
        items: essays.iter().map(EssaySummary::from_db).collect(),
        total_count,
        skip: page.skip(),
        limit: page.limit(),
    }))
}

async fn get_essay(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(essay_id): Path<String>,
) -> Result<Json<EssayResponse>, ApiError> {
    let essay = repositories::essays::find_for_user(state.db(), &essay_id, &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load essay"))?
        .ok_or(ApiError::NotFound("Essay not found"))?;

    Ok(Json(EssayResponse::from_db(essay)))
}
