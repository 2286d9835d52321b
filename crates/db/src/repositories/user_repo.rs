//! Repository for the `users` table.

use eventpulse_core::roles::Role;
use eventpulse_core::types::DbId;
use sqlx::PgPool;

use crate::models::user::{CreateUser, User};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, handle, display_name, password_hash, role, event_id, is_active, created_at";

/// Provides CRUD operations for users.
pub struct UserRepo;

impl UserRepo {
    /// Insert a new user, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreateUser) -> Result<User, sqlx::Error> {
        let query = format!(
            "INSERT INTO users (handle, display_name, password_hash, role, event_id)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(&input.handle)
            .bind(&input.display_name)
            .bind(&input.password_hash)
            .bind(input.role)
            .bind(input.event_id)
            .fetch_one(pool)
            .await
    }

    /// Find a user by internal ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a user by login handle (case-sensitive).
    pub async fn find_by_handle(pool: &PgPool, handle: &str) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE handle = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(handle)
            .fetch_optional(pool)
            .await
    }

    /// List the workers bound to an event, by display name.
    pub async fn list_by_event(pool: &PgPool, event_id: DbId) -> Result<Vec<User>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM users WHERE event_id = $1 ORDER BY display_name"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(event_id)
            .fetch_all(pool)
            .await
    }

    /// Create the bootstrap admin unless a user with `handle` already exists.
    ///
    /// Returns `true` when a new admin was inserted.
    pub async fn ensure_admin(
        pool: &PgPool,
        handle: &str,
        display_name: &str,
        password_hash: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO users (handle, display_name, password_hash, role)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT ON CONSTRAINT uq_users_handle DO NOTHING",
        )
        .bind(handle)
        .bind(display_name)
        .bind(password_hash)
        .bind(Role::Admin)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
