//! Route definitions for the `/zonas` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::zones;
use crate::state::AppState;

/// Routes mounted at `/zonas`.
///
/// ```text
/// GET    /       -> list
/// POST   /       -> create (admin)
/// GET    /{id}   -> get
/// DELETE /{id}   -> delete (admin)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(zones::list).post(zones::create))
        .route("/{id}", get(zones::get).delete(zones::delete))
}
