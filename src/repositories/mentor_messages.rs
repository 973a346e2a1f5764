use sqlx::PgPool;

use crate::db::models::MentorMessage;
use crate::db::types::MentorRole;

const COLUMNS: &str = "id, user_id, role, content, created_at";

/// The `limit` most recent messages, oldest first.
pub(crate) async fn recent_for_user(
    pool: &PgPool,
    user_id: &str,
    limit: i64,
) -> Result<Vec<MentorMessage>, sqlx::Error> {
    sqlx::query_as::<_, MentorMessage>(&format!(
        "SELECT {COLUMNS} FROM (
            SELECT {COLUMNS} FROM mentor_messages
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
         ) recent
         ORDER BY created_at ASC, id ASC"
    ))
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_for_user(
    pool: &PgPool,
    user_id: &str,
    skip: i64,
    limit: i64,
) -> Result<Vec<MentorMessage>, sqlx::Error> {
    sqlx::query_as::<_, MentorMessage>(&format!(
        "SELECT {COLUMNS} FROM mentor_messages
         WHERE user_id = $1
         ORDER BY created_at ASC, id ASC
         OFFSET $2 LIMIT $3"
    ))
    .bind(user_id)
    .bind(skip)
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub(crate) struct NewMessage<'a> {
    pub(crate) id: &'a str,
    pub(crate) role: MentorRole,
    pub(crate) content: &'a str,
    pub(crate) created_at: time::PrimitiveDateTime,
}

pub(crate) async fn insert(
    executor: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: &str,
    message: NewMessage<'_>,
) -> Result<MentorMessage, sqlx::Error> {
    sqlx::query_as::<_, MentorMessage>(&format!(
        "INSERT INTO mentor_messages (id, user_id, role, content, created_at)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING {COLUMNS}"
    ))
    .bind(message.id)
    .bind(user_id)
    .bind(message.role)
    .bind(message.content)
    .bind(message.created_at)
    .fetch_one(&mut **executor)
    .await
}

pub(crate) async fn count_for_user(pool: &PgPool, user_id: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM mentor_messages WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await
}
