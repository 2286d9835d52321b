//! Handlers for the `/tareas` resource.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use eventpulse_core::error::CoreError;
use eventpulse_core::task::TaskPriority;
use eventpulse_core::types::DbId;
use eventpulse_db::models::task::{CreateTask, Task, TaskEditOutcome, TaskPatch};
use eventpulse_db::repositories::{TaskRepo, ZoneRepo};
use eventpulse_events::EventKind;
use serde::Deserialize;
use validator::Validate;

use super::{ensure_event_member, ensure_visible, resolve_event, EventQuery};
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::RequireAdmin;
use crate::middleware::validated::{AppJson, ValidatedJson};
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTaskRequest {
    #[validate(length(min = 3, max = 200))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub priority: TaskPriority,
    pub zone_id: Option<String>,
    pub assignee_id: Option<DbId>,
}

/// GET /api/v1/tareas
pub async fn list(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<EventQuery>,
) -> AppResult<Json<Vec<Task>>> {
    let event_id = resolve_event(&state, &user, query.evento_id).await?;
    Ok(Json(TaskRepo::list(&state.pool, event_id).await?))
}

/// GET /api/v1/tareas/{id}
pub async fn get(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<Task>> {
    let task = TaskRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::Core(CoreError::not_found("task", id)))?;
    ensure_visible(&user, task.event_id, "task", id)?;
    Ok(Json(task))
}

/// POST /api/v1/tareas
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Query(query): Query<EventQuery>,
    ValidatedJson(input): ValidatedJson<CreateTaskRequest>,
) -> AppResult<(StatusCode, Json<Task>)> {
    let event_id = resolve_event(&state, &admin, query.evento_id).await?;

    if let Some(zone_id) = &input.zone_id {
        if ZoneRepo::find(&state.pool, event_id, zone_id).await?.is_none() {
            return Err(AppError::BadRequest(format!(
                "Zone '{zone_id}' does not exist in this event"
            )));
        }
    }
    if let Some(assignee_id) = input.assignee_id {
        ensure_event_member(&state, assignee_id, event_id).await?;
    }

    let task = TaskRepo::create(
        &state.pool,
        &CreateTask {
            event_id,
            zone_id: input.zone_id,
            title: input.title.trim().to_string(),
            description: input.description,
            priority: input.priority,
            created_by: admin.user_id,
            assignee_id: input.assignee_id,
        },
    )
    .await?;

    state.hub.notify(EventKind::TareaNueva, event_id, &task).await;
    Ok((StatusCode::CREATED, Json(task)))
}

/// PATCH /api/v1/tareas/{id}
pub async fn update(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<DbId>,
    AppJson(patch): AppJson<TaskPatch>,
) -> AppResult<Json<Task>> {
    let task = TaskRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::Core(CoreError::not_found("task", id)))?;
    ensure_visible(&user, task.event_id, "task", id)?;

    match TaskRepo::update(&state.pool, id, &patch, user.user_id, user.role).await? {
        TaskEditOutcome::Updated(updated) => {
            state
                .hub
                .notify(EventKind::TareaActualizada, updated.event_id, &updated)
                .await;
            Ok(Json(updated))
        }
        TaskEditOutcome::Forbidden(reason) => Err(AppError::Core(CoreError::Forbidden(reason))),
        TaskEditOutcome::Invalid(reason) => Err(AppError::BadRequest(reason)),
        TaskEditOutcome::NotFound => Err(AppError::Core(CoreError::not_found("task", id))),
    }
}
