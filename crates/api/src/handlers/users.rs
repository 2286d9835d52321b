//! Handlers for the `/usuarios` resource (worker provisioning).

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use eventpulse_core::roles::Role;
use eventpulse_db::models::user::{CreateUser, UserResponse};
use eventpulse_db::repositories::{EventRepo, UserRepo};
use serde::Deserialize;
use validator::Validate;

use super::{resolve_event, EventQuery};
use crate::auth::password::hash_password;
use crate::error::{AppError, AppResult};
use crate::middleware::rbac::RequireAdmin;
use crate::middleware::validated::ValidatedJson;
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(min = 3, max = 50))]
    pub handle: String,
    #[validate(length(min = 2, max = 100))]
    pub name: String,
    #[validate(length(min = 4))]
    pub password: String,
    pub role: Role,
}

/// POST /api/v1/usuarios
///
/// Creates a worker bound to the currently active event.
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    ValidatedJson(input): ValidatedJson<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<UserResponse>)> {
    if input.role.is_admin() {
        return Err(AppError::BadRequest(
            "Workers cannot be created with the admin role".into(),
        ));
    }

    let event = EventRepo::find_active(&state.pool)
        .await?
        .ok_or_else(|| AppError::BadRequest("No active event".into()))?;

    let password_hash = hash_password(&input.password)
        .map_err(|e| AppError::InternalError(format!("Password hashing error: {e}")))?;

    let user = UserRepo::create(
        &state.pool,
        &CreateUser {
            handle: input.handle.trim().to_string(),
            display_name: input.name.trim().to_string(),
            password_hash,
            role: input.role,
            event_id: Some(event.id),
        },
    )
    .await?;

    tracing::info!(user_id = %user.id, event_id = %event.id, role = %user.role, "Worker created");
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// GET /api/v1/usuarios
pub async fn list(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Query(query): Query<EventQuery>,
) -> AppResult<Json<Vec<UserResponse>>> {
    let event_id = resolve_event(&state, &admin, query.evento_id).await?;
    let users = UserRepo::list_by_event(&state.pool, event_id).await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}
