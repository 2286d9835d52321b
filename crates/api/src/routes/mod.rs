pub mod auth;
pub mod chat;
pub mod events;
pub mod health;
pub mod incidents;
pub mod tasks;
pub mod users;
pub mod zones;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /auth/login                          login (public)
/// /auth/me                             current user
///
/// /eventos                             list, create (admin)
/// /eventos/{id}/terminar               end event (admin)
///
/// /zonas                               list, create (admin)
/// /zonas/{id}                          get, delete (admin)
///
/// /usuarios                            list, create (admin)
///
/// /incidencias                         list, create (admin)
/// /incidencias/{id}                    get, edit (admin)
/// /incidencias/{id}/atender            claim
/// /incidencias/{id}/resolver           resolve
/// /incidencias/{id}/historial          state history
///
/// /tareas                              list, create (admin)
/// /tareas/{id}                         get, edit
///
/// /chat/historial                      last 50 messages
/// /chat/mensaje                        send
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/eventos", events::router())
        .nest("/zonas", zones::router())
        .nest("/usuarios", users::router())
        .nest("/incidencias", incidents::router())
        .nest("/tareas", tasks::router())
        .nest("/chat", chat::router())
}
