use sqlx::PgPool;

use crate::db::models::Purchaser;

const COLUMNS: &str =
    "email, full_name, product, transaction_id, is_active, purchased_at, updated_at";

pub(crate) async fn find_active(pool: &PgPool, email: &str) -> Result<Option<Purchaser>, sqlx::Error> {
    sqlx::query_as::<_, Purchaser>(&format!(
        "SELECT {COLUMNS} FROM purchasers WHERE email = $1 AND is_active = TRUE"
    ))
    .bind(email)
    .fetch_optional(pool)
    .await
}

pub(crate) struct UpsertPurchaser<'a> {
    pub(crate) email: &'a str,
    pub(crate) full_name: Option<&'a str>,
    pub(crate) product: Option<&'a str>,
    pub(crate) transaction_id: Option<&'a str>,
    pub(crate) is_active: bool,
    pub(crate) now: time::PrimitiveDateTime,
}

/// Optional fields keep their stored value when absent.
pub(crate) async fn upsert(
    pool: &PgPool,
    params: UpsertPurchaser<'_>,
) -> Result<Purchaser, sqlx::Error> {
    sqlx::query_as::<_, Purchaser>(&format!(
        "INSERT INTO purchasers (email, full_name, product, transaction_id, is_active, purchased_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $6)
         ON CONFLICT (email) DO UPDATE SET
            full_name = COALESCE(EXCLUDED.full_name, purchasers.full_name),
            product = COALESCE(EXCLUDED.product, purchasers.product),
            transaction_id = COALESCE(EXCLUDED.transaction_id, purchasers.transaction_id),
            is_active = EXCLUDED.is_active,
            updated_at = EXCLUDED.updated_at
         RETURNING {COLUMNS}",
    ))
    .bind(params.email)
    .bind(params.full_name)
    .bind(params.product)
    .bind(params.transaction_id)
    .bind(params.is_active)
    .bind(params.now)
    .fetch_one(pool)
    .await
}
