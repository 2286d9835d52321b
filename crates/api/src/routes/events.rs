//! Route definitions for the `/eventos` resource.

use axum::routing::{get, patch};
use axum::Router;

use crate::handlers::events;
use crate::state::AppState;

/// Routes mounted at `/eventos`.
///
/// ```text
/// GET   /                -> list
/// POST  /                -> create (admin)
/// PATCH /{id}/terminar   -> end (admin)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(events::list).post(events::create))
        .route("/{id}/terminar", patch(events::end))
}
