/*
 * Responsibility
 * - Read-only lookups on the local users table
 * - This service never inserts or updates users: provisioning happens elsewhere
 */
use sqlx::PgPool;

use crate::repos::error::RepoError;

pub async fn exists(db: &PgPool, user_id: i64) -> Result<bool, RepoError> {
    let found: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS (
            SELECT 1
            FROM users
            WHERE "userId" = $1
        )
        "#,
    )
    .bind(user_id)
    .fetch_one(db)
    .await?;

    Ok(found)
}
