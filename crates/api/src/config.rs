use std::time::Duration;

use eventpulse_db::PoolSettings;

use crate::auth::jwt::JwtConfig;
use crate::ws::HubConfig;

/// Which pub/sub backend carries domain events between replicas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerKind {
    /// Shared Redis instance; every replica sees every event.
    Redis,
    /// In-process only; suitable for a single replica.
    Memory,
}

/// Credentials for the admin account created at startup.
#[derive(Debug, Clone)]
pub struct AdminBootstrap {
    pub handle: String,
    pub password: String,
    pub name: String,
}

/// Server configuration loaded from environment variables.
///
/// All fields except `JWT_SECRET` have defaults suitable for local
/// development. In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8080`).
    pub port: u16,
    /// Deployment environment; `production` switches logs to JSON.
    pub environment: String,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    /// A single `*` allows any origin.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Budget for draining in-flight HTTP requests on shutdown (default: `10`).
    pub shutdown_timeout_secs: u64,
    pub database_url: String,
    pub pool: PoolSettings,
    pub broker: BrokerKind,
    pub redis_url: String,
    pub jwt: JwtConfig,
    /// WebSocket limits and per-socket queue sizing.
    pub hub: HubConfig,
    pub admin: Option<AdminBootstrap>,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default                      |
    /// |--------------------------|------------------------------|
    /// | `HOST`                   | `0.0.0.0`                    |
    /// | `PORT`                   | `8080`                       |
    /// | `ENV`                    | `development`                |
    /// | `CORS_ORIGINS`           | `*`                          |
    /// | `REQUEST_TIMEOUT_SECS`   | `30`                         |
    /// | `SHUTDOWN_TIMEOUT_SECS`  | `10`                         |
    /// | `DATABASE_URL`           | built from `DB_*`            |
    /// | `DB_MAX_CONNECTIONS`     | `25`                         |
    /// | `DB_MIN_IDLE`            | `5`                          |
    /// | `DB_MAX_LIFETIME_SECS`   | `300`                        |
    /// | `BROKER`                 | `redis`                      |
    /// | `REDIS_URL`              | built from `REDIS_*`         |
    /// | `WS_MAX_MESSAGE_SIZE`    | `1024`                       |
    /// | `WS_PONG_WAIT_SECONDS`   | `60`                         |
    /// | `WS_WRITE_WAIT_SECONDS`  | `10`                         |
    /// | `WS_SEND_QUEUE_CAPACITY` | `256`                        |
    ///
    /// # Panics
    ///
    /// Panics on unparsable values, an unknown `BROKER`, or a missing
    /// `JWT_SECRET`.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = parse_env("PORT", 8080);
        let environment = std::env::var("ENV").unwrap_or_else(|_| "development".into());

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "*".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let pool = PoolSettings {
            max_connections: parse_env("DB_MAX_CONNECTIONS", 25),
            min_connections: parse_env("DB_MIN_IDLE", 5),
            max_lifetime: Duration::from_secs(parse_env("DB_MAX_LIFETIME_SECS", 300)),
        };

        let broker = match std::env::var("BROKER")
            .unwrap_or_else(|_| "redis".into())
            .to_lowercase()
            .as_str()
        {
            "redis" => BrokerKind::Redis,
            "memory" => BrokerKind::Memory,
            other => panic!("BROKER must be 'redis' or 'memory', got '{other}'"),
        };

        let hub = HubConfig {
            max_message_size: parse_env("WS_MAX_MESSAGE_SIZE", 1024),
            pong_wait: Duration::from_secs(parse_env("WS_PONG_WAIT_SECONDS", 60)),
            write_wait: Duration::from_secs(parse_env("WS_WRITE_WAIT_SECONDS", 10)),
            send_queue_capacity: parse_env("WS_SEND_QUEUE_CAPACITY", 256),
        };

        let admin = match (std::env::var("ADMIN_HANDLE"), std::env::var("ADMIN_PASSWORD")) {
            (Ok(handle), Ok(password)) if !handle.is_empty() && !password.is_empty() => {
                Some(AdminBootstrap {
                    name: std::env::var("ADMIN_NAME").unwrap_or_else(|_| "Administrador".into()),
                    handle,
                    password,
                })
            }
            _ => None,
        };

        Self {
            host,
            port,
            environment,
            cors_origins,
            request_timeout_secs: parse_env("REQUEST_TIMEOUT_SECS", 30),
            shutdown_timeout_secs: parse_env("SHUTDOWN_TIMEOUT_SECS", 10),
            database_url: database_url_from_env(),
            pool,
            broker,
            redis_url: redis_url_from_env(),
            jwt: JwtConfig::from_env(),
            hub,
            admin,
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

/// Read and parse `key`, falling back to `default` when unset.
fn parse_env<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|e| panic!("{key} must be a valid value: {e}")),
        Err(_) => default,
    }
}

fn database_url_from_env() -> String {
    if let Ok(url) = std::env::var("DATABASE_URL") {
        return url;
    }
    let host = std::env::var("DB_HOST").unwrap_or_else(|_| "localhost".into());
    let port = std::env::var("DB_PORT").unwrap_or_else(|_| "5432".into());
    let user = std::env::var("DB_USER").unwrap_or_else(|_| "postgres".into());
    let password = std::env::var("DB_PASSWORD").unwrap_or_default();
    let name = std::env::var("DB_NAME").unwrap_or_else(|_| "eventpulse".into());
    let sslmode = std::env::var("DB_SSLMODE").unwrap_or_else(|_| "disable".into());
    format!("postgres://{user}:{password}@{host}:{port}/{name}?sslmode={sslmode}")
}

fn redis_url_from_env() -> String {
    if let Ok(url) = std::env::var("REDIS_URL") {
        return url;
    }
    let addr = std::env::var("REDIS_ADDR").unwrap_or_else(|_| "localhost:6379".into());
    let db = std::env::var("REDIS_DB").unwrap_or_else(|_| "0".into());
    match std::env::var("REDIS_PASSWORD") {
        Ok(password) if !password.is_empty() => format!("redis://:{password}@{addr}/{db}"),
        _ => format!("redis://{addr}/{db}"),
    }
}
