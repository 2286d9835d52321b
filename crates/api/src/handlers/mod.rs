pub mod auth;
pub mod chat;
pub mod events;
pub mod incidents;
pub mod tasks;
pub mod users;
pub mod zones;

use eventpulse_core::error::CoreError;
use eventpulse_core::types::DbId;
use eventpulse_db::repositories::{EventRepo, UserRepo};
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

/// `?evento_id=` selector accepted by admin-facing list endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct EventQuery {
    pub evento_id: Option<DbId>,
}

/// Resolve which event a request operates on.
///
/// Workers always use the event they are bound to. Admins use the explicit
/// `evento_id` if given, otherwise the currently active event.
pub async fn resolve_event(
    state: &AppState,
    user: &AuthUser,
    requested: Option<DbId>,
) -> AppResult<DbId> {
    if !user.is_admin() {
        return user.event_id.ok_or_else(|| {
            AppError::Core(CoreError::Forbidden("User is not bound to an event".into()))
        });
    }
    if let Some(id) = requested {
        return Ok(id);
    }
    EventRepo::find_active(&state.pool)
        .await?
        .map(|e| e.id)
        .ok_or_else(|| AppError::BadRequest("No active event".into()))
}

/// Reject access to a record of another event. Admins see everything.
///
/// Reported as not found so workers cannot probe other events' ids.
pub fn ensure_visible(
    user: &AuthUser,
    record_event_id: DbId,
    entity: &'static str,
    id: impl std::fmt::Display,
) -> AppResult<()> {
    if user.is_admin() || user.event_id == Some(record_event_id) {
        Ok(())
    } else {
        Err(AppError::Core(CoreError::not_found(entity, id)))
    }
}

/// Check that `user_id` is an active worker of `event_id`.
pub async fn ensure_event_member(
    state: &AppState,
    user_id: DbId,
    event_id: DbId,
) -> AppResult<()> {
    match UserRepo::find_by_id(&state.pool, user_id).await? {
        Some(u) if u.is_active && u.event_id == Some(event_id) => Ok(()),
        _ => Err(AppError::BadRequest(format!(
            "User {user_id} is not part of this event"
        ))),
    }
}
