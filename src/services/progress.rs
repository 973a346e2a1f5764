//! Applies a gamified activity to the user's stats row inside the caller's
//! transaction.

use crate::core::time::primitive_now_utc;
use crate::repositories;
use crate::services::gamification::{apply_activity, ActivityEvent, ActivityOutcome};

pub(crate) async fn record(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: &str,
    event: ActivityEvent,
) -> Result<ActivityOutcome, sqlx::Error> {
    let now = primitive_now_utc();
    let mut stats = repositories::stats::lock_for_update(tx, user_id, now).await?;

    let outcome = apply_activity(&mut stats, &event, now.date());
    stats.updated_at = now;
    repositories::stats::save(tx, &stats).await?;

    if outcome.leveled_up {
        tracing::info!(user_id, level = outcome.level, "User leveled up");
    }
    if !outcome.new_badges.is_empty() {
        tracing::info!(user_id, badges = ?outcome.new_badges, "Badges awarded");
    }

    Ok(outcome)
}
