use sqlx::types::Json;
use sqlx::PgPool;

use crate::db::models::{ExamQuestion, ExamReport, MockExam};
use crate::db::types::{DifficultyLevel, KnowledgeArea};

const COLUMNS: &str = "\
    id, user_id, title, areas, difficulty, status, questions, answers, report, \
    overall_score, generated_by, created_at, submitted_at";

pub(crate) async fn find_for_user(
    pool: &PgPool,
    id: &str,
    user_id: &str,
) -> Result<Option<MockExam>, sqlx::Error> {
    sqlx::query_as::<_, MockExam>(&format!(
        "SELECT {COLUMNS} FROM mock_exams WHERE id = $1 AND user_id = $2"
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn list_for_user(
    pool: &PgPool,
    user_id: &str,
    skip: i64,
    limit: i64,
) -> Result<Vec<MockExam>, sqlx::Error> {
    sqlx::query_as::<_, MockExam>(&format!(
        "SELECT {COLUMNS} FROM mock_exams
         WHERE user_id = $1
         ORDER BY created_at DESC
         OFFSET $2 LIMIT $3"
    ))
    .bind(user_id)
    .bind(skip)
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub(crate) struct CreateMockExam<'a> {
    pub(crate) id: &'a str,
    pub(crate) user_id: &'a str,
    pub(crate) title: &'a str,
    pub(crate) areas: &'a [KnowledgeArea],
    pub(crate) difficulty: DifficultyLevel,
    pub(crate) questions: &'a [ExamQuestion],
    pub(crate) generated_by: &'a str,
    pub(crate) created_at: time::PrimitiveDateTime,
}

pub(crate) async fn create(
    pool: &PgPool,
    params: CreateMockExam<'_>,
) -> Result<MockExam, sqlx::Error> {
    sqlx::query_as::<_, MockExam>(&format!(
        "INSERT INTO mock_exams (id, user_id, title, areas, difficulty, status, questions, generated_by, created_at)
         VALUES ($1, $2, $3, $4, $5, 'generated', $6, $7, $8)
         RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.user_id)
    .bind(params.title)
    .bind(Json(params.areas))
    .bind(params.difficulty)
    .bind(Json(params.questions))
    .bind(params.generated_by)
    .bind(params.created_at)
    .fetch_one(pool)
    .await
}

/// Locks an unsubmitted exam; `None` when missing, foreign or already submitted.
pub(crate) async fn lock_open_for_user(
    executor: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    id: &str,
    user_id: &str,
) -> Result<Option<MockExam>, sqlx::Error> {
    sqlx::query_as::<_, MockExam>(&format!(
        "SELECT {COLUMNS} FROM mock_exams
         WHERE id = $1 AND user_id = $2 AND status = 'generated'
         FOR UPDATE"
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(&mut **executor)
    .await
}

pub(crate) async fn submit(
    executor: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    id: &str,
    answers: &[Option<usize>],
    report: &ExamReport,
    submitted_at: time::PrimitiveDateTime,
) -> Result<MockExam, sqlx::Error> {
    sqlx::query_as::<_, MockExam>(&format!(
        "UPDATE mock_exams SET
            status = 'submitted',
            answers = $1,
            report = $2,
            overall_score = $3,
            submitted_at = $4
         WHERE id = $5
         RETURNING {COLUMNS}",
    ))
    .bind(Json(answers))
    .bind(Json(report))
    .bind(report.overall_score)
    .bind(submitted_at)
    .bind(id)
    .fetch_one(&mut **executor)
    .await
}

pub(crate) async fn count_for_user(pool: &PgPool, user_id: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM mock_exams WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await
}
