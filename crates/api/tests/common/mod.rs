#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use eventpulse_api::auth::jwt::{generate_token, JwtConfig};
use eventpulse_api::auth::password::hash_password;
use eventpulse_api::config::{BrokerKind, ServerConfig};
use eventpulse_api::router::build_app_router;
use eventpulse_api::state::AppState;
use eventpulse_api::ws::{Hub, HubConfig};
use eventpulse_core::roles::Role;
use eventpulse_core::types::DbId;
use eventpulse_db::models::event::CreateEvent;
use eventpulse_db::models::user::{CreateUser, User};
use eventpulse_db::models::zone::CreateZone;
use eventpulse_db::repositories::{EventRepo, UserRepo, ZoneRepo};
use eventpulse_db::PoolSettings;
use eventpulse_events::{Broker, InMemoryBroker};
use http_body_util::BodyExt;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

pub const TEST_PASSWORD: &str = "secreto123";

/// Build a test `ServerConfig` with safe defaults and the in-memory broker.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        environment: "test".to_string(),
        cors_origins: vec!["*".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        database_url: String::new(),
        pool: PoolSettings::default(),
        broker: BrokerKind::Memory,
        redis_url: String::new(),
        jwt: JwtConfig {
            secret: "test-secret-for-integration-tests".to_string(),
            expiration_hours: 1,
        },
        hub: HubConfig::default(),
        admin: None,
    }
}

/// A running application: router plus the hub behind it.
pub struct TestApp {
    pub router: Router,
    pub hub: Arc<Hub>,
    pub config: ServerConfig,
    pub cancel: CancellationToken,
}

impl TestApp {
    pub fn router(&self) -> Router {
        self.router.clone()
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Build the full application with an in-memory broker and a running hub
/// loop, mirroring `main.rs`.
pub fn build_test_app(pool: PgPool) -> TestApp {
    build_test_app_with_broker(pool, Arc::new(InMemoryBroker::default()))
}

pub fn build_test_app_with_broker(pool: PgPool, broker: Arc<dyn Broker>) -> TestApp {
    let config = test_config();
    let cancel = CancellationToken::new();
    let (hub, hub_loop) = Hub::new(broker, config.hub.clone());
    tokio::spawn(hub_loop.run(cancel.clone()));

    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        hub: Arc::clone(&hub),
    };
    let router = build_app_router(state, &config);

    TestApp {
        router,
        hub,
        config,
        cancel,
    }
}

/// Serve the app on an ephemeral local port, for real WebSocket clients.
pub async fn spawn_test_server(app: &TestApp) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = app.router();
    let cancel = app.cancel.clone();
    tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move { cancel.cancelled().await })
            .await
            .unwrap();
    });
    addr
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub struct Seed {
    pub admin: User,
    pub event: DbId,
}

/// An admin, an active event and one zone `gate-a`.
pub async fn seed(pool: &PgPool) -> Seed {
    let admin = create_user(pool, "admin", "Admin", Role::Admin, None).await;
    let created = EventRepo::create(
        pool,
        &CreateEvent {
            name: "Estadio Nacional".to_string(),
            description: String::new(),
            created_by: admin.id,
        },
    )
    .await
    .unwrap();
    ZoneRepo::create(
        pool,
        &CreateZone {
            event_id: created.event.id,
            slug: "gate-a".to_string(),
            name: "Gate A".to_string(),
        },
    )
    .await
    .unwrap();
    Seed {
        admin,
        event: created.event.id,
    }
}

pub async fn create_user(
    pool: &PgPool,
    handle: &str,
    name: &str,
    role: Role,
    event_id: Option<DbId>,
) -> User {
    UserRepo::create(
        pool,
        &CreateUser {
            handle: handle.to_string(),
            display_name: name.to_string(),
            password_hash: hash_password(TEST_PASSWORD).unwrap(),
            role,
            event_id,
        },
    )
    .await
    .unwrap()
}

pub fn token_for(app: &TestApp, user: &User) -> String {
    generate_token(user.id, user.role, user.event_id, &app.config.jwt).unwrap()
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn send(app: Router, request: Request<Body>) -> Response {
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn post_json_auth(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    token: &str,
) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn patch_json_auth(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    token: &str,
) -> Response {
    let request = Request::builder()
        .method(Method::PATCH)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn delete_auth(app: Router, uri: &str, token: &str) -> Response {
    let request = Request::builder()
        .method(Method::DELETE)
        .uri(uri)
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Wait until the hub has `expected` sockets for `event_id`.
pub async fn wait_for_connections(hub: &Hub, event_id: DbId, expected: usize) {
    for _ in 0..100 {
        if hub.event_connection_count(event_id).await == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("hub never reached {expected} connections for event {event_id}");
}
