use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use thiserror::Error;

use crate::cfg;
use crate::store;

pub type DbPool = sqlx::SqlitePool;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Database connection error: {0}")]
    ConnectionFailed(sqlx::Error),

    #[error("Database operation failed: {0}")]
    OperationFailed(#[from] sqlx::Error),

    #[error("Tenant not found")]
    TenantNotFound,

    #[error("Employee not found")]
    EmployeeNotFound,

    #[error("Attendance record not found")]
    AttendanceNotFound,

    #[error("Username is already registered")]
    UsernameTaken,

    #[error("Tax id is already registered")]
    TaxIdTaken,

    #[error("Employee has already checked in today")]
    AlreadyCheckedInToday,
}

/// One store per table, all sharing a single pool
#[derive(Clone, Debug)]
pub struct Database {
    pub tenants: store::Tenants,
    pub employees: store::Employees,
    pub attendance: store::AttendanceRecords,
    pub refresh_sessions: store::RefreshSessions,

    pool: DbPool,
}

impl Database {
    pub async fn connect(settings: &cfg::DatabaseSettings) -> Result<Self, DbError> {
        let options = SqliteConnectOptions::from_str(&settings.url)
            .map_err(DbError::ConnectionFailed)?
            .create_if_missing(true)
            .foreign_keys(true)
            // Increase SQLite busy timeout to handle concurrent connections better
            .busy_timeout(std::time::Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(settings.max_connections)
            .connect_with(options)
            .await
            .map_err(DbError::ConnectionFailed)?;

        tracing::info!("Database initialized successfully");
        Ok(Self::from_pool(pool))
    }

    #[must_use]
    pub fn from_pool(pool: DbPool) -> Self {
        Self {
            tenants: store::Tenants::new(pool.clone()),
            employees: store::Employees::new(pool.clone()),
            attendance: store::AttendanceRecords::new(pool.clone()),
            refresh_sessions: store::RefreshSessions::new(pool.clone()),
            pool,
        }
    }

    #[must_use]
    pub const fn pool(&self) -> &DbPool {
        &self.pool
    }
}
