use std::sync::Arc;

use crate::config::ServerConfig;
use crate::ws::Hub;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: the pool is reference-counted internally and the rest
/// sits behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub pool: eventpulse_db::DbPool,
    pub config: Arc<ServerConfig>,
    /// Fan-out hub: publishes domain events and owns local sockets.
    pub hub: Arc<Hub>,
}
