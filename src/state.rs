use std::{sync::Arc, time::Duration};

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use crate::{
    auth::{
        jwt::JwtKeys,
        password,
        repo::{PgUserRepo, UserRepo},
    },
    config::AppConfig,
    todos::repo::{PgTodoRepo, TodoRepo},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub jwt: Arc<JwtKeys>,
    pub users: Arc<dyn UserRepo>,
    pub todos: Arc<dyn TodoRepo>,
}

impl AppState {
    /// Connects to Postgres and applies pending migrations.
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let db = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .acquire_timeout(Duration::from_secs(config.db_acquire_timeout_secs))
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        sqlx::migrate!("./migrations")
            .run(&db)
            .await
            .context("run migrations")?;

        password::warm_up();

        let users = Arc::new(PgUserRepo::new(db.clone())) as Arc<dyn UserRepo>;
        let todos = Arc::new(PgTodoRepo::new(db)) as Arc<dyn TodoRepo>;
        Ok(Self::from_parts(config, users, todos))
    }

    pub fn from_parts(
        config: AppConfig,
        users: Arc<dyn UserRepo>,
        todos: Arc<dyn TodoRepo>,
    ) -> Self {
        let jwt = Arc::new(JwtKeys::new(&config.jwt));
        Self {
            config: Arc::new(config),
            jwt,
            users,
            todos,
        }
    }

    /// State backed by in-memory repositories.
    #[cfg(test)]
    pub fn fake() -> Self {
        use crate::testing::{MemoryTodoRepo, MemoryUserRepo};

        let config = AppConfig {
            database_url: "postgres://unused".into(),
            db_max_connections: 1,
            db_acquire_timeout_secs: 1,
            jwt: crate::config::JwtConfig {
                secret: "test-secret".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 60 * 24 * 7,
            },
            password_min_length: 6,
            client_origin: None,
            host: "127.0.0.1".into(),
            port: 0,
        };

        Self::from_parts(
            config,
            Arc::new(MemoryUserRepo::default()),
            Arc::new(MemoryTodoRepo::default()),
        )
    }
}
