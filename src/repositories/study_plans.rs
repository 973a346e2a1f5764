use sqlx::types::Json;
use sqlx::PgPool;

use crate::db::models::{PlanActivity, StudyPlan};

const COLUMNS: &str = "\
    id, user_id, start_date, end_date, profile, activities, completed_count, \
    total_count, xp_earned, source, created_at, updated_at";

pub(crate) async fn find_for_user(
    pool: &PgPool,
    user_id: &str,
) -> Result<Option<StudyPlan>, sqlx::Error> {
    sqlx::query_as::<_, StudyPlan>(&format!("SELECT {COLUMNS} FROM study_plans WHERE user_id = $1"))
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

pub(crate) struct ReplacePlan<'a> {
    pub(crate) id: &'a str,
    pub(crate) user_id: &'a str,
    pub(crate) start_date: time::Date,
    pub(crate) end_date: time::Date,
    pub(crate) profile: serde_json::Value,
    pub(crate) activities: &'a [PlanActivity],
    pub(crate) source: &'a str,
    pub(crate) now: time::PrimitiveDateTime,
}

/// One plan per user; a new plan overwrites the previous one wholesale.
pub(crate) async fn replace(
    executor: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    params: ReplacePlan<'_>,
) -> Result<StudyPlan, sqlx::Error> {
    sqlx::query_as::<_, StudyPlan>(&format!(
        "INSERT INTO study_plans (
            id, user_id, start_date, end_date, profile, activities,
            completed_count, total_count, xp_earned, source, created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, 0, $7, 0, $8, $9, $9)
        ON CONFLICT (user_id) DO UPDATE SET
            id = EXCLUDED.id,
            start_date = EXCLUDED.start_date,
            end_date = EXCLUDED.end_date,
            profile = EXCLUDED.profile,
            activities = EXCLUDED.activities,
            completed_count = 0,
            total_count = EXCLUDED.total_count,
            xp_earned = 0,
            source = EXCLUDED.source,
            created_at = EXCLUDED.created_at,
            updated_at = EXCLUDED.updated_at
        RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.user_id)
    .bind(params.start_date)
    .bind(params.end_date)
    .bind(Json(params.profile))
    .bind(Json(params.activities))
    .bind(params.activities.len() as i32)
    .bind(params.source)
    .bind(params.now)
    .fetch_one(&mut **executor)
    .await
}

pub(crate) async fn lock_for_user(
    executor: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: &str,
) -> Result<Option<StudyPlan>, sqlx::Error> {
    sqlx::query_as::<_, StudyPlan>(&format!(
        "SELECT {COLUMNS} FROM study_plans WHERE user_id = $1 FOR UPDATE"
    ))
    .bind(user_id)
    .fetch_optional(&mut **executor)
    .await
}

pub(crate) async fn save_progress(
    executor: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    plan: &StudyPlan,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE study_plans SET
            activities = $1,
            completed_count = $2,
            xp_earned = $3,
            updated_at = $4
         WHERE id = $5",
    )
    .bind(&plan.activities)
    .bind(plan.completed_count)
    .bind(plan.xp_earned)
    .bind(plan.updated_at)
    .bind(&plan.id)
    .execute(&mut **executor)
    .await?;
    Ok(())
}
