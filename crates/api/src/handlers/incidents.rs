//! Handlers for the `/incidencias` resource, including the claim protocol.
//!
//! Every committed change is published to the incident's event. A lost
//! claim additionally publishes `incidencia_conflicto` so the loser's
//! client can roll back its optimistic update.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use eventpulse_core::error::CoreError;
use eventpulse_core::incident::IncidentType;
use eventpulse_core::types::DbId;
use eventpulse_db::models::incident::{
    ClaimOutcome, CreateIncident, EditOutcome, Incident, IncidentHistoryEntry, IncidentPatch,
    ResolveOutcome,
};
use eventpulse_db::repositories::{IncidentRepo, ZoneRepo};
use eventpulse_events::EventKind;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{ensure_event_member, ensure_visible, resolve_event, EventQuery};
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::RequireAdmin;
use crate::middleware::validated::{AppJson, ValidatedJson};
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateIncidentRequest {
    pub zone_id: String,
    #[serde(rename = "type")]
    pub kind: IncidentType,
    #[validate(length(min = 5, max = 1000))]
    pub description: String,
    pub assignee_id: Option<DbId>,
}

/// Payload of the `incidencia_conflicto` envelope.
#[derive(Debug, Serialize)]
pub struct ConflictPayload {
    pub incidencia_id: DbId,
    pub mensaje: String,
    /// Display name of the winner, when known.
    pub atendida_por: Option<String>,
    /// The user whose claim lost.
    pub usuario_id: DbId,
}

async fn load(state: &AppState, user: &AuthUser, id: DbId) -> AppResult<Incident> {
    let incident = IncidentRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::Core(CoreError::not_found("incident", id)))?;
    ensure_visible(user, incident.event_id, "incident", id)?;
    Ok(incident)
}

/// GET /api/v1/incidencias
pub async fn list(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<EventQuery>,
) -> AppResult<Json<Vec<Incident>>> {
    let event_id = resolve_event(&state, &user, query.evento_id).await?;
    Ok(Json(IncidentRepo::list(&state.pool, event_id).await?))
}

/// GET /api/v1/incidencias/{id}
pub async fn get(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<Incident>> {
    Ok(Json(load(&state, &user, id).await?))
}

/// GET /api/v1/incidencias/{id}/historial
pub async fn history(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<Vec<IncidentHistoryEntry>>> {
    load(&state, &user, id).await?;
    Ok(Json(IncidentRepo::history(&state.pool, id).await?))
}

/// POST /api/v1/incidencias
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Query(query): Query<EventQuery>,
    ValidatedJson(input): ValidatedJson<CreateIncidentRequest>,
) -> AppResult<(StatusCode, Json<Incident>)> {
    let event_id = resolve_event(&state, &admin, query.evento_id).await?;

    if ZoneRepo::find(&state.pool, event_id, &input.zone_id).await?.is_none() {
        return Err(AppError::BadRequest(format!(
            "Zone '{}' does not exist in this event",
            input.zone_id
        )));
    }
    if let Some(assignee_id) = input.assignee_id {
        ensure_event_member(&state, assignee_id, event_id).await?;
    }

    let incident = IncidentRepo::create(
        &state.pool,
        &CreateIncident {
            event_id,
            zone_id: input.zone_id,
            kind: input.kind,
            description: input.description.trim().to_string(),
            created_by: admin.user_id,
            assignee_id: input.assignee_id,
        },
    )
    .await?;

    tracing::info!(incident_id = %incident.id, event_id = %event_id, "Incident created");
    state
        .hub
        .notify(EventKind::IncidenciaNueva, event_id, &incident)
        .await;

    Ok((StatusCode::CREATED, Json(incident)))
}

/// PATCH /api/v1/incidencias/{id}/atender
///
/// Claim a pending incident. Exactly one concurrent claimer wins; the rest
/// get a 409 naming the winner.
pub async fn claim(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<Incident>> {
    let incident = IncidentRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::Core(CoreError::not_found("incident", id)))?;
    if !user.is_admin() && user.event_id != Some(incident.event_id) {
        return Err(AppError::Core(CoreError::Forbidden(
            "Only workers of this event may claim its incidents".into(),
        )));
    }

    match IncidentRepo::claim(&state.pool, id, user.user_id).await? {
        ClaimOutcome::Claimed(claimed) => {
            tracing::info!(incident_id = %id, user_id = %user.user_id, "Incident claimed");
            state
                .hub
                .notify(EventKind::IncidenciaActualizada, claimed.event_id, &claimed)
                .await;
            Ok(Json(claimed))
        }
        ClaimOutcome::Conflict(conflict) => {
            let mensaje = conflict.message();
            tracing::info!(
                incident_id = %id,
                user_id = %user.user_id,
                reason = %mensaje,
                "Claim lost"
            );
            let payload = ConflictPayload {
                incidencia_id: id,
                mensaje: mensaje.clone(),
                atendida_por: conflict.winner_name().map(str::to_string),
                usuario_id: user.user_id,
            };
            state
                .hub
                .notify(EventKind::IncidenciaConflicto, incident.event_id, &payload)
                .await;
            Err(AppError::Core(CoreError::Conflict(mensaje)))
        }
        ClaimOutcome::NotFound => Err(AppError::Core(CoreError::not_found("incident", id))),
    }
}

/// PATCH /api/v1/incidencias/{id}/resolver
pub async fn resolve(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<Incident>> {
    load(&state, &user, id).await?;

    match IncidentRepo::resolve(&state.pool, id, user.user_id, user.role).await? {
        ResolveOutcome::Resolved(resolved) => {
            tracing::info!(incident_id = %id, user_id = %user.user_id, "Incident resolved");
            state
                .hub
                .notify(EventKind::IncidenciaActualizada, resolved.event_id, &resolved)
                .await;
            Ok(Json(resolved))
        }
        ResolveOutcome::NotAllowed => Err(AppError::Core(CoreError::Forbidden(
            "Only the assignee, a supervisor or an admin may resolve this incident".into(),
        ))),
        ResolveOutcome::AlreadyResolved => Err(AppError::Core(CoreError::Conflict(
            "Conflicto: ya está en estado resolved".into(),
        ))),
        ResolveOutcome::NotFound => Err(AppError::Core(CoreError::not_found("incident", id))),
    }
}

/// PATCH /api/v1/incidencias/{id}
///
/// Admin edit of state and/or assignee.
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<DbId>,
    AppJson(patch): AppJson<IncidentPatch>,
) -> AppResult<Json<Incident>> {
    match IncidentRepo::edit(&state.pool, id, &patch, admin.user_id).await? {
        EditOutcome::Updated(updated) => {
            state
                .hub
                .notify(EventKind::IncidenciaActualizada, updated.event_id, &updated)
                .await;
            Ok(Json(updated))
        }
        EditOutcome::Invalid(reason) => Err(AppError::BadRequest(reason)),
        EditOutcome::NotFound => Err(AppError::Core(CoreError::not_found("incident", id))),
    }
}
