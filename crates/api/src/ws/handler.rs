use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{close_code, CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use eventpulse_core::error::CoreError;
use eventpulse_db::repositories::EventRepo;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::auth::jwt::validate_token;
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::ws::hub::{ClientId, Hub, HubConfig};

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub token: Option<String>,
}

/// GET /ws?token=<jwt>
///
/// The token travels in the query string because many mobile clients
/// cannot set headers on the upgrade request. Workers are attached to
/// their bound event; admins to the active event.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
) -> AppResult<Response> {
    let token = params.token.ok_or_else(|| {
        AppError::Core(CoreError::Unauthorized("Missing token".into()))
    })?;
    let claims = validate_token(&token, &state.config.jwt).map_err(|_| {
        AppError::Core(CoreError::Unauthorized("Invalid or expired token".into()))
    })?;

    let event_id = match claims.event_id {
        Some(id) => id,
        None if claims.role.is_admin() => {
            EventRepo::find_active(&state.pool)
                .await?
                .ok_or_else(|| AppError::BadRequest("No active event".into()))?
                .id
        }
        None => {
            return Err(AppError::Core(CoreError::Forbidden(
                "User is not bound to an event".into(),
            )))
        }
    };

    let hub = Arc::clone(&state.hub);
    let limit = hub.config().max_message_size;
    let user_id = claims.sub;

    Ok(ws
        .max_message_size(limit)
        .max_frame_size(limit)
        .on_upgrade(move |socket| handle_socket(socket, hub, event_id, user_id)))
}

/// Run one connection: a writer task draining the hub queue and a reader
/// loop enforcing the pong deadline. Either side's exit stops the other.
async fn handle_socket(socket: WebSocket, hub: Arc<Hub>, event_id: uuid::Uuid, user_id: uuid::Uuid) {
    let registration = match hub.register(event_id, user_id).await {
        Ok(registration) => registration,
        Err(e) => {
            tracing::warn!(error = %e, event_id = %event_id, "Rejecting WebSocket, hub stopped");
            return;
        }
    };
    let conn_id = registration.client_id;
    tracing::info!(conn_id = %conn_id, event_id = %event_id, user_id = %user_id, "WebSocket connected");

    let config = hub.config().clone();
    let (sink, stream) = socket.split();
    let cancel = CancellationToken::new();

    let writer = tokio::spawn(write_loop(
        sink,
        registration.receiver,
        config.clone(),
        cancel.clone(),
        conn_id,
    ));

    read_loop(stream, &config, cancel.clone(), conn_id).await;

    cancel.cancel();
    hub.deregister(event_id, conn_id);
    let _ = writer.await;
    tracing::info!(conn_id = %conn_id, event_id = %event_id, "WebSocket disconnected");
}

async fn write_loop(
    mut sink: SplitSink<WebSocket, Message>,
    mut queue: mpsc::Receiver<Utf8Bytes>,
    config: HubConfig,
    cancel: CancellationToken,
    conn_id: ClientId,
) {
    let interval = config.ping_interval();
    let mut ping = tokio::time::interval_at(Instant::now() + interval, interval);

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            frame = queue.recv() => match frame {
                Some(text) => {
                    if !send_frame(&mut sink, Message::Text(text), config.write_wait).await {
                        tracing::debug!(conn_id = %conn_id, "WebSocket write failed");
                        break;
                    }
                }
                None => {
                    // Evicted or shutting down.
                    let close = Message::Close(Some(CloseFrame {
                        code: close_code::NORMAL,
                        reason: Utf8Bytes::from_static(""),
                    }));
                    send_frame(&mut sink, close, config.write_wait).await;
                    break;
                }
            },
            _ = ping.tick() => {
                if !send_frame(&mut sink, Message::Ping(Bytes::new()), config.write_wait).await {
                    tracing::debug!(conn_id = %conn_id, "WebSocket ping failed");
                    break;
                }
            }
        }
    }

    cancel.cancel();
}

async fn read_loop(
    mut stream: SplitStream<WebSocket>,
    config: &HubConfig,
    cancel: CancellationToken,
    conn_id: ClientId,
) {
    let deadline = tokio::time::sleep(config.pong_wait);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            () = &mut deadline => {
                tracing::debug!(conn_id = %conn_id, "WebSocket read deadline exceeded");
                break;
            }
            next = stream.next() => match next {
                Some(Ok(Message::Pong(_))) => {
                    deadline.as_mut().reset(Instant::now() + config.pong_wait);
                }
                Some(Ok(Message::Close(_))) | None => break,
                // One-way channel: client payloads are ignored.
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                    break;
                }
            },
        }
    }
}

/// Write one frame within `deadline`. Returns `false` on error or timeout.
async fn send_frame(
    sink: &mut SplitSink<WebSocket, Message>,
    message: Message,
    deadline: Duration,
) -> bool {
    matches!(tokio::time::timeout(deadline, sink.send(message)).await, Ok(Ok(())))
}
