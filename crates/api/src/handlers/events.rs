//! Handlers for the `/eventos` resource.
//!
//! Creating an event ends the active one; both transitions are announced
//! with `evento_terminado` on the ended event's topic so its clients close.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use eventpulse_core::error::CoreError;
use eventpulse_core::types::DbId;
use eventpulse_db::models::event::{CreateEvent, EndOutcome, Event};
use eventpulse_db::repositories::EventRepo;
use eventpulse_events::EventKind;
use serde::Deserialize;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::RequireAdmin;
use crate::middleware::validated::ValidatedJson;
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateEventRequest {
    #[validate(length(min = 3, max = 200))]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// GET /api/v1/eventos
///
/// Admins see every event; workers only the event they are bound to.
pub async fn list(State(state): State<AppState>, user: AuthUser) -> AppResult<Json<Vec<Event>>> {
    if user.is_admin() {
        return Ok(Json(EventRepo::list(&state.pool).await?));
    }
    let events = match user.event_id {
        Some(id) => EventRepo::find_by_id(&state.pool, id).await?.into_iter().collect(),
        None => Vec::new(),
    };
    Ok(Json(events))
}

/// POST /api/v1/eventos
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ValidatedJson(input): ValidatedJson<CreateEventRequest>,
) -> AppResult<(StatusCode, Json<Event>)> {
    let created = EventRepo::create(
        &state.pool,
        &CreateEvent {
            name: input.name.trim().to_string(),
            description: input.description,
            created_by: admin.user_id,
        },
    )
    .await?;

    if let Some(ended) = &created.ended {
        tracing::info!(event_id = %ended.id, "Active event ended by new event");
        state
            .hub
            .notify(EventKind::EventoTerminado, ended.id, ended)
            .await;
    }
    tracing::info!(event_id = %created.event.id, user_id = %admin.user_id, "Event created");

    Ok((StatusCode::CREATED, Json(created.event)))
}

/// PATCH /api/v1/eventos/{id}/terminar
pub async fn end(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<DbId>,
) -> AppResult<Json<Event>> {
    match EventRepo::end(&state.pool, id).await? {
        EndOutcome::Ended(event) => {
            tracing::info!(event_id = %event.id, "Event ended");
            state
                .hub
                .notify(EventKind::EventoTerminado, event.id, &event)
                .await;
            Ok(Json(event))
        }
        EndOutcome::AlreadyEnded => Err(AppError::Core(CoreError::Conflict(
            "Event has already ended".into(),
        ))),
        EndOutcome::NotFound => Err(AppError::Core(CoreError::not_found("event", id))),
    }
}
