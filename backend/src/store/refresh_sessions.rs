use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection};
use thiserror::Error;

use crate::core::DbPool;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Refresh session not found")]
    NotFound,

    #[error("Refresh session has been revoked")]
    Revoked,

    #[error("Refresh session has expired")]
    Expired,

    #[error("Database operation failed: {0}")]
    Database(#[from] sqlx::Error),
}

/// One issued refresh token. Only the token hash is ever stored.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RefreshSession {
    pub id: i64,
    pub tenant_id: i64,
    pub token_hash: String,
    pub expires_at: NaiveDateTime,
    pub revoked: bool,
    pub revoked_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct NewRefreshSession {
    pub tenant_id: i64,
    pub token_hash: String,
    pub expires_at: NaiveDateTime,
}

impl RefreshSession {
    /// Expired-but-unrevoked rows are treated as invalid on access
    pub fn ensure_active(&self, now: NaiveDateTime) -> Result<(), SessionError> {
        if self.revoked {
            return Err(SessionError::Revoked);
        }
        if now >= self.expires_at {
            return Err(SessionError::Expired);
        }
        Ok(())
    }
}

const SESSION_COLUMNS: &str = "id, tenant_id, token_hash, expires_at, revoked, revoked_at, created_at";

#[derive(Clone, Debug)]
pub struct RefreshSessions {
    db: DbPool,
}

impl RefreshSessions {
    #[must_use]
    pub const fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub async fn create(&self, new_session: &NewRefreshSession) -> Result<RefreshSession, SessionError> {
        let mut conn = self.db.acquire().await?;
        Self::insert(&mut *conn, new_session).await
    }

    /// Same as `create`, on a caller-held connection or transaction
    pub async fn insert(conn: &mut SqliteConnection, new_session: &NewRefreshSession) -> Result<RefreshSession, SessionError> {
        let sql = format!(
            r"
            INSERT INTO refresh_sessions (tenant_id, token_hash, expires_at, revoked, created_at)
            VALUES (?, ?, ?, 0, CURRENT_TIMESTAMP)
            RETURNING {SESSION_COLUMNS}
            "
        );
        let session = sqlx::query_as::<_, RefreshSession>(&sql)
            .bind(new_session.tenant_id)
            .bind(&new_session.token_hash)
            .bind(new_session.expires_at)
            .fetch_one(conn)
            .await?;
        Ok(session)
    }

    /// Looks up the session for a token hash and checks it is still usable
    pub async fn validate(&self, token_hash: &str) -> Result<RefreshSession, SessionError> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM refresh_sessions WHERE token_hash = ?");
        let session = sqlx::query_as::<_, RefreshSession>(&sql)
            .bind(token_hash)
            .fetch_optional(&self.db)
            .await?
            .ok_or(SessionError::NotFound)?;
        session.ensure_active(Utc::now().naive_utc())?;
        Ok(session)
    }

    /// Marks the session revoked; revoking twice keeps the first revocation time
    pub async fn revoke(&self, id: i64) -> Result<(), SessionError> {
        let now = Utc::now().naive_utc();
        sqlx::query(
            r"
            UPDATE refresh_sessions
            SET revoked = 1, revoked_at = COALESCE(revoked_at, ?)
            WHERE id = ?
            ",
        )
        .bind(now)
        .bind(id)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    /// Revokes the tenant's session for this token hash; returns whether one was active
    pub async fn revoke_by_tenant_and_hash(&self, tenant_id: i64, token_hash: &str) -> Result<bool, SessionError> {
        let now = Utc::now().naive_utc();
        let result = sqlx::query(
            r"
            UPDATE refresh_sessions
            SET revoked = 1, revoked_at = ?
            WHERE tenant_id = ? AND token_hash = ? AND revoked = 0
            ",
        )
        .bind(now)
        .bind(tenant_id)
        .bind(token_hash)
        .execute(&self.db)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn revoke_all_for_tenant(&self, tenant_id: i64) -> Result<u64, SessionError> {
        let now = Utc::now().naive_utc();
        let result = sqlx::query(
            r"
            UPDATE refresh_sessions
            SET revoked = 1, revoked_at = ?
            WHERE tenant_id = ? AND revoked = 0
            ",
        )
        .bind(now)
        .bind(tenant_id)
        .execute(&self.db)
        .await?;
        Ok(result.rows_affected())
    }

    /// Revokes `old_session_id` and inserts its replacement as one transaction.
    ///
    /// The revoke only matches a still-active row, so a concurrent rotation of
    /// the same session fails with `Revoked` and nothing is written.
    pub async fn rotate(&self, old_session_id: i64, replacement: &NewRefreshSession) -> Result<RefreshSession, SessionError> {
        let now = Utc::now().naive_utc();
        let mut tx = self.db.begin().await?;

        let revoked = sqlx::query(
            r"
            UPDATE refresh_sessions
            SET revoked = 1, revoked_at = ?
            WHERE id = ? AND revoked = 0
            ",
        )
        .bind(now)
        .bind(old_session_id)
        .execute(&mut *tx)
        .await?;
        if revoked.rows_affected() == 0 {
            return Err(SessionError::Revoked);
        }

        let session = Self::insert(&mut *tx, replacement).await?;

        tx.commit().await?;
        Ok(session)
    }
}
