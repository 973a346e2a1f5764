use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use time::Duration;
use uuid::Uuid;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::api::pagination::{PageQuery, PaginatedResponse};
use crate::api::validation;
use crate::core::redis::RateLimit;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::types::MentorRole;
use crate::repositories;
use crate::schemas::dashboard::ProgressResponse;
use crate::schemas::mentor::{MentorExchangeResponse, MentorMessageCreate, MentorMessageResponse};
use crate::services::gamification::{ActivityEvent, ActivityKind};
use crate::services::{mentor, progress};

const MESSAGE_RATE_LIMIT: RateLimit = RateLimit::new("mentor", 30, 300);

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/messages", get(list_messages).post(send_message))
}

async fn send_message(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<MentorMessageCreate>,
) -> Result<(StatusCode, Json<MentorExchangeResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let message = validation::non_blank(&payload.message, "message")?;

    if !state.redis().allow(MESSAGE_RATE_LIMIT, &user.id).await {
        return Err(ApiError::TooManyRequests("Too many messages, slow down a little"));
    }

    let stats = repositories::stats::find(state.db(), &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load stats"))?;
    let context = stats.map(|stats| mentor::student_context(&user.full_name, &stats));

    let history = repositories::mentor_messages::recent_for_user(
        state.db(),
        &user.id,
        state.settings().mentor().history_limit,
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to load mentor history"))?;

    let completion = mentor::reply(state.llm(), context.as_deref(), &history, message)
        .await
        .map_err(|err| {
            tracing::warn!(error = %err, "Mentor reply failed");
            ApiError::ServiceUnavailable("Mentor is unavailable right now".to_string())
        })?;

    let asked_at = primitive_now_utc();
    let mut tx =
        state.db().begin().await.map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    let question = repositories::mentor_messages::insert(
        &mut tx,
        &user.id,
        repositories::mentor_messages::NewMessage {
            id: &Uuid::new_v4().to_string(),
            role: MentorRole::User,
            content: message,
            created_at: asked_at,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to store mentor message"))?;

    // The reply sorts after the question even within the same millisecond.
    let reply = repositories::mentor_messages::insert(
        &mut tx,
        &user.id,
        repositories::mentor_messages::NewMessage {
            id: &Uuid::new_v4().to_string(),
            role: MentorRole::Assistant,
            content: &completion.output,
            created_at: asked_at + Duration::milliseconds(1),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to store mentor reply"))?;

    let outcome = progress::record(&mut tx, &user.id, ActivityEvent::new(ActivityKind::MentorSession, 0))
        .await
        .map_err(|e| ApiError::internal(e, "Failed to update progress"))?;

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit mentor exchange"))?;

    tracing::info!(
        model = %completion.model,
        history = history.len(),
        "Mentor replied"
    );

    Ok((
        StatusCode::CREATED,
        Json(MentorExchangeResponse {
            question: MentorMessageResponse::from_db(question),
            reply: MentorMessageResponse::from_db(reply),
            model: completion.model,
            progress: ProgressResponse::from_outcome(&outcome),
        }),
    ))
}

async fn list_messages(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(page): Query<PageQuery>,
) -> Result<Json<PaginatedResponse<MentorMessageResponse>>, ApiError> {
    let messages = repositories::mentor_messages::list_for_user(
        state.db(),
        &user.id,
        page.skip(),
        page.limit(),
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to list mentor messages"))?;
    let total_count = repositories::mentor_messages::count_for_user(state.db(), &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count mentor messages"))?;

    Ok(Json(PaginatedResponse {
        items: messages.into_iter().map(MentorMessageResponse::from_db).collect(),
        total_count,
        skip: page.skip(),
        limit: page.limit(),
    }))
}
