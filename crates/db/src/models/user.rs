//! User entity model and DTOs.

use eventpulse_core::roles::Role;
use eventpulse_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// Full user row from the `users` table.
///
/// Contains the password hash -- NEVER serialize this to API responses directly.
/// Use [`UserResponse`] for external-facing output.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: DbId,
    pub handle: String,
    pub display_name: String,
    pub password_hash: String,
    pub role: Role,
    pub event_id: Option<DbId>,
    pub is_active: bool,
    pub created_at: Timestamp,
}

/// Safe user representation for API responses (no password hash).
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: DbId,
    pub handle: String,
    pub name: String,
    pub role: Role,
    pub event_id: Option<DbId>,
    pub is_active: bool,
    pub created_at: Timestamp,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            handle: user.handle,
            name: user.display_name,
            role: user.role,
            event_id: user.event_id,
            is_active: user.is_active,
            created_at: user.created_at,
        }
    }
}

/// DTO for creating a new user. Admins are created with `event_id: None`.
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub handle: String,
    pub display_name: String,
    pub password_hash: String,
    pub role: Role,
    pub event_id: Option<DbId>,
}
