use std::env;

use thiserror::Error;

/// Fallback signing secret for local development and tests.
const LOCAL_JWT_SECRET: &str = "super-secure-test-secret-value-local";

/// Page size used by the song listing when `SONGS_PER_PAGE` is not set.
pub const DEFAULT_PER_PAGE: u32 = 50;

/// ConfigError
///
/// Raised by `AppConfig::load` when a variable required for the current
/// environment is missing or cannot be parsed.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set in production")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

/// AppConfig
///
/// Holds the application's entire configuration state. Loaded once at startup and
/// immutable afterwards; handlers and extractors pull it out of `AppState` via `FromRef`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // SQLite connection string, e.g. `sqlite://songs.db` or `sqlite::memory:`.
    pub db_url: String,
    pub db_max_connections: u32,
    // Runtime environment marker. Controls the `x-user-id` bypass and log format.
    pub env: Env,
    // Secret used to sign and validate bearer tokens (HS256).
    pub jwt_secret: String,
    // Lifetime of tokens issued at registration, in seconds.
    pub token_ttl_secs: u64,
    // Page size of `GET /api/songs`.
    pub per_page: u32,
    pub allow_registration: bool,
    pub bind_addr: String,
}

/// Env
///
/// Runtime context. `Local` enables development conveniences (pretty logs, the
/// `x-user-id` principal bypass, open registration); `Production` disables them.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

impl Default for AppConfig {
    /// Safe, non-panicking configuration for test state setup. Uses a private
    /// in-memory database and the local signing secret.
    fn default() -> Self {
        Self {
            db_url: "sqlite::memory:".to_string(),
            db_max_connections: 1,
            env: Env::Local,
            jwt_secret: LOCAL_JWT_SECRET.to_string(),
            token_ttl_secs: 60 * 60 * 24,
            per_page: DEFAULT_PER_PAGE,
            allow_registration: true,
            bind_addr: "127.0.0.1:3000".to_string(),
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads every parameter from environment variables. Production demands an
    /// explicit `DATABASE_URL` and `JWT_SECRET`; local falls back to defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };

        let (db_url, jwt_secret) = match env {
            Env::Production => (
                env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?,
                env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?,
            ),
            Env::Local => (
                env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://songs.db".to_string()),
                env::var("JWT_SECRET").unwrap_or_else(|_| LOCAL_JWT_SECRET.to_string()),
            ),
        };

        Ok(Self {
            db_url,
            db_max_connections: parse_var("DB_MAX_CONNECTIONS", 5)?,
            env,
            jwt_secret,
            token_ttl_secs: parse_var("TOKEN_TTL_SECS", 60 * 60 * 24)?,
            per_page: parse_var("SONGS_PER_PAGE", DEFAULT_PER_PAGE)?.max(1),
            // Registration hands out tokens without a password, so it is opt-in in production.
            allow_registration: parse_var("ALLOW_REGISTRATION", env == Env::Local)?,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(default),
    }
}
