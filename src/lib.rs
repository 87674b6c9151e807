pub mod auth;
pub mod config;
pub mod db;
pub mod error;

use std::sync::Arc;
use actix_web::HttpResponse;
use tracing::info;

pub use error::AppError;
pub type Result<T> = std::result::Result<T, AppError>;
pub use config::Settings;

pub use auth::{AuthService, TokenLifetimes, TokenService};
pub use db::{CredentialStore, DbOperations, User, UserPublic};

/// Health check endpoint handler
/// Returns a JSON response with server status and timestamp
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Application state shared across all workers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub auth_service: Arc<AuthService>,
    db: Option<Arc<DbOperations>>,
}

impl AppState {
    /// Connect to Postgres, apply migrations and build the auth service.
    pub async fn new(config: Settings) -> Result<Self> {
        let db = DbOperations::connect(
            &config.database.url,
            config.database.max_connections,
            config.database.acquire_timeout(),
        )
        .await?;
        db.run_migrations().await?;
        let db = Arc::new(db);

        let mut state = Self::with_store(config, db.clone())?;
        state.db = Some(db);
        Ok(state)
    }

    /// Build state over any credential store, e.g. an in-memory one in tests.
    pub fn with_store(config: Settings, store: Arc<dyn CredentialStore>) -> Result<Self> {
        let tokens = TokenService::new(
            &config.auth.jwt_secret,
            TokenLifetimes::from_config(&config.auth)?,
        )?;

        Ok(Self {
            config: Arc::new(config),
            auth_service: Arc::new(AuthService::new(store, tokens)),
            db: None,
        })
    }

    pub async fn shutdown(&self) -> Result<()> {
        if let Some(db) = &self.db {
            db.close().await;
            info!("Database pool closed");
        }
        Ok(())
    }
}
