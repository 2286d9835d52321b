//! Handlers for the `/zonas` resource.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use eventpulse_core::error::CoreError;
use eventpulse_core::validation::validate_slug;
use eventpulse_db::models::zone::{CreateZone, Zone};
use eventpulse_db::repositories::ZoneRepo;
use serde::Deserialize;
use validator::Validate;

use super::{resolve_event, EventQuery};
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::RequireAdmin;
use crate::middleware::validated::ValidatedJson;
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateZoneRequest {
    /// Slug chosen by the admin, unique within the event.
    pub id: String,
    #[validate(length(min = 2, max = 100))]
    pub name: String,
}

/// GET /api/v1/zonas
pub async fn list(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<EventQuery>,
) -> AppResult<Json<Vec<Zone>>> {
    let event_id = resolve_event(&state, &user, query.evento_id).await?;
    Ok(Json(ZoneRepo::list(&state.pool, event_id).await?))
}

/// GET /api/v1/zonas/{id}
pub async fn get(
    State(state): State<AppState>,
    user: AuthUser,
    Path(slug): Path<String>,
    Query(query): Query<EventQuery>,
) -> AppResult<Json<Zone>> {
    let event_id = resolve_event(&state, &user, query.evento_id).await?;
    ZoneRepo::find(&state.pool, event_id, &slug)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::Core(CoreError::not_found("zone", slug)))
}

/// POST /api/v1/zonas
///
/// A slug already used in the same event is a 409; other events may reuse it.
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Query(query): Query<EventQuery>,
    ValidatedJson(input): ValidatedJson<CreateZoneRequest>,
) -> AppResult<(StatusCode, Json<Zone>)> {
    validate_slug(&input.id)?;
    let event_id = resolve_event(&state, &admin, query.evento_id).await?;

    let zone = ZoneRepo::create(
        &state.pool,
        &CreateZone {
            event_id,
            slug: input.id,
            name: input.name.trim().to_string(),
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(zone)))
}

/// DELETE /api/v1/zonas/{id}
///
/// Refused with 409 while incidents or tasks still reference the zone.
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(slug): Path<String>,
    Query(query): Query<EventQuery>,
) -> AppResult<StatusCode> {
    let event_id = resolve_event(&state, &admin, query.evento_id).await?;
    if ZoneRepo::delete(&state.pool, event_id, &slug).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::Core(CoreError::not_found("zone", slug)))
    }
}
