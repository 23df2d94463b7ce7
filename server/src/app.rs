//! Application state and initialization
//!
//! This module manages the central application state and lifecycle.
//! All services are initialized here and made available through AppState.

use crate::config::ServerConfig;
use crate::database::{create_pool, Repository};
use crate::error::Result;
use crate::services::{AttendanceService, AuthService, MarksService, StudentsService};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Central application state holding all services
#[derive(Clone)]
pub struct AppState {
    pub config: ServerConfig,
    pub auth: AuthService,
    pub students: StudentsService,
    pub attendance: AttendanceService,
    pub marks: MarksService,
}

impl AppState {
    pub fn new(config: ServerConfig, pool: SqlitePool) -> Self {
        let repo = Repository::new(pool);

        Self {
            auth: AuthService::new(repo.clone(), config.token_ttl_hours),
            students: StudentsService::new(repo.clone()),
            attendance: AttendanceService::new(repo.clone()),
            marks: MarksService::new(repo),
            config,
        }
    }
}

/// Application setup - called once on startup
pub async fn setup(config: ServerConfig) -> Result<Arc<AppState>> {
    tracing::info!("Initializing application");
    tracing::info!("Database path: {:?}", config.db_path);

    let pool = create_pool(&config.db_path).await?;
    let state = AppState::new(config, pool);

    state
        .auth
        .ensure_admin_user(&state.config.admin_login, &state.config.admin_password)
        .await?;
    state.auth.prune_expired_tokens().await?;

    tracing::info!("Application initialized successfully");

    Ok(Arc::new(state))
}
