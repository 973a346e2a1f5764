use sqlx::types::Json;
use sqlx::PgPool;

use crate::db::models::{CompetencyResult, Essay};
use crate::db::types::EssayStatus;

const COLUMNS: &str = "\
    id, user_id, theme, text, text_hash, status, competencies, total_score, \
    strengths, improvements, general_comment, corrected_text, graded_by, \
    time_spent_minutes, created_at, graded_at";

pub(crate) async fn find_for_user(
    pool: &PgPool,
    id: &str,
    user_id: &str,
) -> Result<Option<Essay>, sqlx::Error> {
    sqlx::query_as::<_, Essay>(&format!(
        "SELECT {COLUMNS} FROM essays WHERE id = $1 AND user_id = $2"
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

/// Latest essay of the user with the same text.
pub(crate) async fn find_by_hash(
    pool: &PgPool,
    user_id: &str,
    text_hash: &str,
) -> Result<Option<Essay>, sqlx::Error> {
    sqlx::query_as::<_, Essay>(&format!(
        "SELECT {COLUMNS} FROM essays
         WHERE user_id = $1 AND text_hash = $2
         ORDER BY created_at DESC
         LIMIT 1"
    ))
    .bind(user_id)
    .bind(text_hash)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn list_for_user(
    pool: &PgPool,
    user_id: &str,
    skip: i64,
    limit: i64,
) -> Result<Vec<Essay>, sqlx::Error> {
    sqlx::query_as::<_, Essay>(&format!(
        "SELECT {COLUMNS} FROM essays
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

pub(crate) struct CreateEssay<'a> {
    pub(crate) id: &'a str,
    pub(crate) user_id: &'a str,
    pub(crate) theme: &'a str,
    pub(crate) text: &'a str,
    pub(crate) text_hash: &'a str,
    pub(crate) time_spent_minutes: Option<i32>,
    pub(crate) created_at: time::PrimitiveDateTime,
}

pub(crate) struct EssayGrade {
    pub(crate) status: EssayStatus,
    pub(crate) competencies: Vec<CompetencyResult>,
    pub(crate) total_score: i32,
    pub(crate) strengths: Vec<String>,
    pub(crate) improvements: Vec<String>,
    pub(crate) general_comment: Option<String>,
    pub(crate) corrected_text: Option<String>,
    pub(crate) graded_by: Option<String>,
    pub(crate) graded_at: time::PrimitiveDateTime,
}

/// Essays are written once, already graded, in the caller's transaction.
pub(crate) async fn insert_graded(
    executor: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    essay: CreateEssay<'_>,
    grade: EssayGrade,
) -> Result<Essay, sqlx::Error> {
    sqlx::query_as::<_, Essay>(&format!(
        "INSERT INTO essays (
            id, user_id, theme, text, text_hash, status, competencies, total_score,
            strengths, improvements, general_comment, corrected_text, graded_by,
            time_spent_minutes, created_at, graded_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
        RETURNING {COLUMNS}",
    ))
    .bind(essay.id)
    .bind(essay.user_id)
    .bind(essay.theme)
    .bind(essay.text)
    .bind(essay.text_hash)
    .bind(grade.status)
    .bind(Json(grade.competencies))
    .bind(grade.total_score)
    .bind(Json(grade.strengths))
    .bind(Json(grade.improvements))
    .bind(grade.general_comment)
    .bind(grade.corrected_text)
    .bind(grade.graded_by)
    .bind(essay.time_spent_minutes)
    .bind(essay.created_at)
    .bind(grade.graded_at)
    .fetch_one(&mut **executor)
    .await
}

pub(crate) async fn count_for_user(pool: &PgPool, user_id: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM essays WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await
}
