use sqlx::PgPool;

use crate::db::models::UserStats;

const COLUMNS: &str = "\
    user_id, average_score, scored_count, essays_completed, exams_completed, \
    study_minutes, streak_days, last_study_date, xp, level, completion_percent, \
    badges, updated_at";

pub(crate) async fn find(pool: &PgPool, user_id: &str) -> Result<Option<UserStats>, sqlx::Error> {
    sqlx::query_as::<_, UserStats>(&format!("SELECT {COLUMNS} FROM user_stats WHERE user_id = $1"))
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

/// Locks the row for the rest of the transaction, creating it when missing.
pub(crate) async fn lock_for_update(
    executor: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: &str,
    now: time::PrimitiveDateTime,
) -> Result<UserStats, sqlx::Error> {
    sqlx::query(
        "INSERT INTO user_stats (user_id, updated_at) VALUES ($1, $2)
         ON CONFLICT (user_id) DO NOTHING",
    )
    .bind(user_id)
    .bind(now)
    .execute(&mut **executor)
    .await?;

    sqlx::query_as::<_, UserStats>(&format!(
        "SELECT {COLUMNS} FROM user_stats WHERE user_id = $1 FOR UPDATE"
    ))
    .bind(user_id)
    .fetch_one(&mut **executor)
    .await
}

pub(crate) async fn save(
    executor: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    stats: &UserStats,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE user_stats SET
            average_score = $1,
            scored_count = $2,
            essays_completed = $3,
            exams_completed = $4,
            study_minutes = $5,
            streak_days = $6,
            last_study_date = $7,
            xp = $8,
            level = $9,
            completion_percent = $10,
            badges = $11,
            updated_at = $12
         WHERE user_id = $13",
    )
    .bind(stats.average_score)
    .bind(stats.scored_count)
    .bind(stats.essays_completed)
    .bind(stats.exams_completed)
    .bind(stats.study_minutes)
    .bind(stats.streak_days)
    .bind(stats.last_study_date)
    .bind(stats.xp)
    .bind(stats.level)
    .bind(stats.completion_percent)
    .bind(&stats.badges)
    .bind(stats.updated_at)
    .bind(&stats.user_id)
    .execute(&mut **executor)
    .await?;
    Ok(())
}

/// Resets plan progress when a new plan replaces the old one.
pub(crate) async fn set_completion_percent(
    executor: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: &str,
    completion_percent: f64,
    now: time::PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE user_stats SET completion_percent = $1, updated_at = $2 WHERE user_id = $3")
        .bind(completion_percent)
        .bind(now)
        .bind(user_id)
        .execute(&mut **executor)
        .await?;
    Ok(())
}
