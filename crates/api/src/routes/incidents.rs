//! Route definitions for the `/incidencias` resource.

use axum::routing::{get, patch};
use axum::Router;

use crate::handlers::incidents;
use crate::state::AppState;

/// Routes mounted at `/incidencias`.
///
/// ```text
/// GET   /                 -> list
/// POST  /                 -> create (admin)
/// GET   /{id}             -> get
/// PATCH /{id}             -> update (admin)
/// PATCH /{id}/atender     -> claim
/// PATCH /{id}/resolver    -> resolve
/// GET   /{id}/historial   -> history
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(incidents::list).post(incidents::create))
        .route("/{id}", get(incidents::get).patch(incidents::update))
        .route("/{id}/atender", patch(incidents::claim))
        .route("/{id}/resolver", patch(incidents::resolve))
        .route("/{id}/historial", get(incidents::history))
}
