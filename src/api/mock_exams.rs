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
use crate::api::validation::dedup_preserving_order;
use crate::core::redis::RateLimit;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::types::MockExamStatus;
use crate::repositories;
use crate::schemas::dashboard::ProgressResponse;
use crate::schemas::mock_exam::{
    MockExamCreate, MockExamResponse, MockExamSubmit, MockExamSubmitResponse, MockExamSummary,
};
use crate::services::gamification::{ActivityEvent, ActivityKind};
use crate::services::mock_exam::{self, MockExamError};
use crate::services::progress;

const GENERATION_RATE_LIMIT: RateLimit = RateLimit::new("mock_exam", 10, 3600);

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_mock_exam).get(list_mock_exams))
        .route("/:exam_id", get(get_mock_exam))
        .route("/:exam_id/submit", post(submit_mock_exam))
}

async fn create_mock_exam(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<MockExamCreate>,
) -> Result<(StatusCode, Json<MockExamResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let areas = dedup_preserving_order(&payload.areas);

    if !state.redis().allow(GENERATION_RATE_LIMIT, &user.id).await {
        return Err(ApiError::TooManyRequests("Too many mock exams requested, try again later"));
    }

    let generated = mock_exam::generate_exam(
        state.llm(),
        &areas,
        payload.questions_per_area,
        payload.difficulty,
    )
    .await
    .map_err(|err| match err {
        MockExamError::Llm(inner) => {
            ApiError::ServiceUnavailable(format!("Question generation is unavailable: {inner}"))
        }
        MockExamError::NoValidQuestions => {
            ApiError::BadGateway("The model did not return usable questions".to_string())
        }
    })?;

    let title = mock_exam::exam_title(&areas, payload.difficulty);
    let exam = repositories::mock_exams::create(
        state.db(),
        repositories::mock_exams::CreateMockExam {
            id: &Uuid::new_v4().to_string(),
            user_id: &user.id,
            title: &title,
            areas: &areas,
            difficulty: payload.difficulty,
            questions: &generated.questions,
            generated_by: &generated.model,
            created_at: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to store mock exam"))?;

    metrics::counter!("mock_exams_total", "event" => "generated").increment(1);
    tracing::info!(exam_id = %exam.id, questions = generated.questions.len(), "Mock exam created");

    Ok((StatusCode::CREATED, Json(MockExamResponse::from_db(exam))))
}

async fn submit_mock_exam(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(exam_id): Path<String>,
    Json(payload): Json<MockExamSubmit>,
) -> Result<Json<MockExamSubmitResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let exam = repositories::mock_exams::find_for_user(state.db(), &exam_id, &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load mock exam"))?
        .ok_or(ApiError::NotFound("Mock exam not found"))?;
    if exam.status == MockExamStatus::Submitted {
        return Err(ApiError::Conflict("Mock exam was already submitted".to_string()));
    }

    let answers = mock_exam::parse_answers(&payload.answers, &exam.questions.0)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    // The model call happens before the row is locked.
    let mut report = mock_exam::build_report(&exam.areas.0, &exam.questions.0, &answers);
    mock_exam::attach_recommendations(state.llm(), &mut report).await;

    let mut tx =
        state.db().begin().await.map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    let open = repositories::mock_exams::lock_open_for_user(&mut tx, &exam.id, &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to lock mock exam"))?;
    if open.is_none() {
        return Err(ApiError::Conflict("Mock exam was already submitted".to_string()));
    }

    let submitted =
        repositories::mock_exams::submit(&mut tx, &exam.id, &answers, &report, primitive_now_utc())
            .await
            .map_err(|e| ApiError::internal(e, "Failed to store mock exam answers"))?;

    let event =
        ActivityEvent::new(ActivityKind::MockExam, payload.time_spent_minutes.unwrap_or(0))
            .with_score(report.overall_score);
    let outcome = progress::record(&mut tx, &user.id, event)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to update progress"))?;

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit mock exam"))?;

    metrics::counter!("mock_exams_total", "event" => "submitted").increment(1);
    tracing::info!(
        exam_id = %submitted.id,
        overall_score = report.overall_score,
        recommendations_source = %report.recommendations_source,
        "Mock exam submitted"
    );

    Ok(Json(MockExamSubmitResponse {
        exam: MockExamResponse::from_db(submitted),
        progress: ProgressResponse::from_outcome(&outcome),
    }))
}

async fn list_mock_exams(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(page): Query<PageQuery>,
) -> Result<Json<PaginatedResponse<MockExamSummary>>, ApiError> {
    let exams =
        repositories::mock_exams::list_for_user(state.db(), &user.id, page.skip(), page.limit())
            .await
            .map_err(|e| ApiError::internal(e, "Failed to list mock exams"))?;
    let total_count = repositories::mock_exams::count_for_user(state.db(), &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count mock exams"))?;

    Ok(Json(PaginatedResponse {
        items: exams.iter().map(MockExamSummary::from_db).collect(),
        total_count,
        skip: page.skip(),
        limit: page.limit(),
    }))
}

async fn get_mock_exam(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(exam_id): Path<String>,
) -> Result<Json<MockExamResponse>, ApiError> {
    let exam = repositories::mock_exams::find_for_user(state.db(), &exam_id, &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load mock exam"))?
        .ok_or(ApiError::NotFound("Mock exam not found"))?;

    Ok(Json(MockExamResponse::from_db(exam)))
}
