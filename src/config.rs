use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub jwt: JwtConfig,
    pub password_min_length: usize,
    pub client_origin: Option<String>,
    pub host: String,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "todo-api".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "todo-api-users".into()),
            // 7 days
            ttl_minutes: env_parse("JWT_TTL_MINUTES", 60 * 24 * 7),
        };
        Ok(Self {
            database_url,
            db_max_connections: env_parse("DB_MAX_CONNECTIONS", 10),
            db_acquire_timeout_secs: env_parse("DB_ACQUIRE_TIMEOUT_SECS", 10),
            jwt,
            password_min_length: env_parse("PASSWORD_MIN_LENGTH", 6),
            client_origin: std::env::var("CLIENT_ORIGIN")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env_parse("APP_PORT", 4000),
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}
