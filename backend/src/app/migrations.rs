use std::fs::File;
use std::io::Write;
use std::path::Path;

use sqlx::Error as SqlxError;
use sqlx::migrate::MigrateError as SqlxMigrateError;
use thiserror::Error;

use crate::core::DbPool;

#[rustfmt::skip]
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Failed to run embedded migrations")]
    EmbeddedMigrationFailed { source: SqlxMigrateError },

    #[error("No migrations applied yet")]
    NoMigrationsApplied,

    #[error("Failed to fetch applied migrations")]
    FetchAppliedMigrationsFailed { #[from] source: SqlxError },

    #[error("File system error")]
    FileSystemOperationFailed { #[from] source: std::io::Error },
}

/// Descriptions of the migrations embedded in the binary, oldest first
#[must_use]
pub fn list_migrations() -> Vec<String> {
    sqlx::migrate!("../migrations")
        .iter()
        .map(|m| format!("{} {}", m.version, m.description))
        .collect::<Vec<_>>()
}

/// Runs the embedded migrations
pub async fn run_migrations(db: &DbPool) -> Result<(), MigrationError> {
    sqlx::migrate!("../migrations")
        .run(db)
        .await
        .map_err(|e| MigrationError::EmbeddedMigrationFailed { source: e })?;
    tracing::info!("Database migrations completed successfully.");
    Ok(())
}

/// Check if migrations need to be applied
pub async fn check_pending_migrations(db: &DbPool) -> Result<bool, MigrationError> {
    let available = sqlx::migrate!("../migrations").iter().count();
    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
        .fetch_one(db)
        .await
        .map_err(|err| match &err {
            sqlx::Error::Database(e) if e.message().contains("no such table") => MigrationError::NoMigrationsApplied,
            _ => MigrationError::FetchAppliedMigrationsFailed { source: err },
        })?;
    Ok(i64::try_from(available).unwrap_or(i64::MAX) > applied)
}

/// Create a new migration file with the current timestamp
pub fn create_migration(migrations_dir: &Path, name: &str) -> Result<String, MigrationError> {
    if !migrations_dir.exists() {
        std::fs::create_dir_all(migrations_dir)?;
    }

    // the version prefix must be unique, so it carries the full timestamp
    let timestamp = chrono::Utc::now().format("%Y%m%d%H%M%S").to_string();
    let normalized_name = name.trim().replace(' ', "_").to_lowercase();
    let filename = format!("{timestamp}_{normalized_name}.sql");
    let filepath = migrations_dir.join(&filename);

    let mut file = File::create(&filepath)?;
    writeln!(file, "-- Migration: {name}")?;
    writeln!(file, "--")?;
    writeln!(file, "-- Add migration script here")?;

    tracing::info!("Created new migration file: {}.", filepath.display());
    Ok(filename)
}

#[cfg(test)]
mod tests {
    use sqlx::sqlite::SqlitePoolOptions;

    use super::*;

    async fn memory_pool() -> DbPool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    #[test]
    fn test_embedded_migrations_are_listed() {
        let migrations = list_migrations();
        assert!(!migrations.is_empty());
        assert!(migrations[0].contains("initial schema"));
    }

    #[tokio::test]
    async fn test_status_before_and_after_running() {
        let db = memory_pool().await;
        assert!(matches!(check_pending_migrations(&db).await, Err(MigrationError::NoMigrationsApplied)));

        run_migrations(&db).await.unwrap();
        assert!(!check_pending_migrations(&db).await.unwrap());
    }

    #[test]
    fn test_create_migration_writes_template() {
        let dir = tempfile::tempdir().unwrap();
        let filename = create_migration(dir.path(), "Add Shift Table").unwrap();

        assert!(filename.ends_with("_add_shift_table.sql"));
        let content = std::fs::read_to_string(dir.path().join(&filename)).unwrap();
        assert!(content.starts_with("-- Migration: Add Shift Table"));
    }
}
