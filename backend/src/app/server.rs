use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::app;
use crate::auth;
use crate::cfg;
use crate::core;
use crate::services::{HttpFaceOracle, LocalObjectStore};

/// Application-level error type
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    ConfigLoadingFailed(#[from] config::ConfigError),

    #[error("Database error: {0}")]
    DatabaseOperationFailed(#[from] core::DbError),

    #[error("Migration error: {0}")]
    MigrationFailed(#[from] app::MigrationError),

    #[error("CLI error: {0}")]
    CliOperationFailed(#[from] app::CliError),

    #[error("Token secret error: {0}")]
    TokenSecretsUnavailable(#[from] auth::TokenError),

    #[error("Network address parsing error: {0}")]
    AddressParsingFailed(#[from] std::net::AddrParseError),

    #[error("Server error: {0}")]
    ServerStartingFailed(#[from] std::io::Error),

    #[error("HTTP client error: {0}")]
    HttpClientError(#[from] reqwest::Error),
}

pub async fn run() {
    if let Err(e) = run_app().await {
        eprintln!("❌ {e}\n");

        let mut source = e.source();
        while let Some(err) = source {
            eprintln!("Caused by: {err}");
            source = err.source();
        }

        std::process::exit(1);
    }
}

/// Wires the production collaborators into a shared context
pub fn create_context(db: core::Database, settings: cfg::AppSettings) -> Result<core::ArcContext, AppError> {
    let secrets = auth::TokenSecrets::resolve(&settings.jwt, cfg::AppSettings::get_config_path())?;
    let tokens = auth::TokenCodec::new(&settings.jwt, &secrets);

    let http_client = reqwest::Client::builder()
        .timeout(settings.face_oracle.timeout())
        .build()?;
    let face_oracle = Arc::new(HttpFaceOracle::new(http_client, settings.face_oracle.clone()));
    let object_store = Arc::new(LocalObjectStore::new(&settings.storage));

    if settings.face_oracle.endpoint.is_empty() {
        tracing::warn!("Face oracle endpoint is not configured; PAID check-ins will fail verification");
    }

    Ok(core::Context::new(db, tokens, settings, face_oracle, object_store))
}

async fn run_app() -> Result<(), AppError> {
    let cli = app::Cli::parse();
    let settings = cfg::AppSettings::new()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&settings.server.log_directives))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let db = core::Database::connect(&settings.database).await?;
    if let Some(command) = cli.command {
        app::run_command(&db, command).await?;
        return Ok(());
    }

    if settings.database.run_migrations_on_startup {
        app::run_migrations(db.pool()).await?;
    } else if app::check_pending_migrations(db.pool()).await.unwrap_or(true) {
        tracing::warn!("Database has pending migrations; run `geoattend migrate run`");
    }

    let server_address = settings.get_server_address();
    let address = server_address.parse::<SocketAddr>()?;
    let listener = tokio::net::TcpListener::bind(address).await?;

    tracing::info!("🚀 starting server");
    tracing::info!("   app_env: {}", cfg::AppSettings::get_app_run_env());
    tracing::info!("   cfg_dir: {}", cfg::AppSettings::get_config_full_path());
    tracing::info!("   logging: {}", settings.server.log_directives);
    tracing::info!("   address: http://{}", server_address);

    let context = create_context(db, settings)?;
    let router = app::create_router(context);

    axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Tokio signal handler that will wait for a user to press CTRL+C.
/// We use this in our `Server` method `with_graceful_shutdown`.
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received, shutting down gracefully"),
        Err(e) => tracing::error!("Failed to listen for shutdown signal: {}", e),
    }
}
