//! Handlers for the `/chat` resource.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use eventpulse_core::validation::normalize_message;
use eventpulse_db::models::message::Message;
use eventpulse_db::repositories::message_repo::RECENT_LIMIT;
use eventpulse_db::repositories::MessageRepo;
use eventpulse_events::EventKind;
use serde::Deserialize;

use super::{resolve_event, EventQuery};
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::middleware::validated::AppJson;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

/// GET /api/v1/chat/historial
///
/// The latest messages of the caller's event, oldest first.
pub async fn history(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<EventQuery>,
) -> AppResult<Json<Vec<Message>>> {
    let event_id = resolve_event(&state, &user, query.evento_id).await?;
    Ok(Json(
        MessageRepo::list_recent(&state.pool, event_id, RECENT_LIMIT).await?,
    ))
}

/// POST /api/v1/chat/mensaje
pub async fn send(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<EventQuery>,
    AppJson(input): AppJson<SendMessageRequest>,
) -> AppResult<(StatusCode, Json<Message>)> {
    let content = normalize_message(&input.content).map_err(AppError::Core)?;
    let event_id = resolve_event(&state, &user, query.evento_id).await?;

    let message = MessageRepo::create(&state.pool, event_id, user.user_id, &content).await?;

    state
        .hub
        .notify(EventKind::MensajeNuevo, event_id, &message)
        .await;
    Ok((StatusCode::CREATED, Json(message)))
}
