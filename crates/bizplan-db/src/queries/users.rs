//! Database query functions for the `users` table.

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::User;

/// Insert a new user. The email must be unique; a duplicate surfaces as a
/// unique violation (see [`super::is_unique_violation`]).
pub async fn insert_user(
    pool: &PgPool,
    name: &str,
    email: &str,
    password_hash: &str,
) -> Result<User> {
    let user = sqlx::query_as::<_, User>(
        "INSERT INTO users (name, email, password_hash) \
         VALUES ($1, $2, $3) \
         RETURNING *",
    )
    .bind(name)
    .bind(email)
    .bind(password_hash)
    .fetch_one(pool)
    .await
    .context("failed to insert user")?;

    Ok(user)
}

/// Fetch a user by ID.
pub async fn get_user(pool: &PgPool, id: Uuid) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch user")?;

    Ok(user)
}

/// Fetch a user by email (exact match on the normalized address).
pub async fn get_user_by_email(pool: &PgPool, email: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await
        .context("failed to fetch user by email")?;

    Ok(user)
}

/// Rename a user. Returns the updated row, or `None` if it does not exist.
pub async fn update_user_name(pool: &PgPool, id: Uuid, name: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>("UPDATE users SET name = $1 WHERE id = $2 RETURNING *")
        .bind(name)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to update user name")?;

    Ok(user)
}

/// Activate or deactivate a user account.
pub async fn set_user_active(pool: &PgPool, id: Uuid, active: bool) -> Result<()> {
    let result = sqlx::query("UPDATE users SET is_active = $1 WHERE id = $2")
        .bind(active)
        .bind(id)
        .execute(pool)
        .await
        .context("failed to update user active flag")?;

    if result.rows_affected() == 0 {
        anyhow::bail!("user {id} not found");
    }

    Ok(())
}

/// Delete a user. Owned projects, plans, answers and consulting requests
/// cascade. Returns `true` if a row was removed.
pub async fn delete_user(pool: &PgPool, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .context("failed to delete user")?;

    Ok(result.rows_affected() > 0)
}

/// Replace a user's password hash if it still equals `current_hash`.
/// Returns `false` if the user is gone or the hash has already changed.
pub async fn update_password_hash(
    pool: &PgPool,
    id: Uuid,
    current_hash: &str,
    new_hash: &str,
) -> Result<bool> {
    let result =
        sqlx::query("UPDATE users SET password_hash = $1 WHERE id = $2 AND password_hash = $3")
            .bind(new_hash)
            .bind(id)
            .bind(current_hash)
            .execute(pool)
            .await
            .context("failed to update password hash")?;

    Ok(result.rows_affected() > 0)
}
