//! Session pairs: a short-lived access token plus a refresh token whose hash is
//! tracked in `refresh_sessions` so it can be rotated and revoked.

use chrono::DateTime;
use thiserror::Error;

use crate::auth::{TokenCodec, TokenError, TokenResponse, hash_refresh_token};
use crate::core;
use crate::core::DbError;
use crate::store::{NewRefreshSession, NewTenant, RefreshSessions, SessionError, Tenant, Tenants};

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("Refresh token is invalid or has been revoked")]
    InvalidOrRevokedRefreshToken,

    #[error("Refresh token has expired")]
    ExpiredRefreshToken,

    #[error("Token error: {0}")]
    TokenIssueFailed(#[from] TokenError),

    #[error("Session store error: {0}")]
    SessionStoreFailed(SessionError),

    #[error("Database error: {0}")]
    DatabaseOperationFailed(#[from] DbError),
}

impl From<SessionError> for RefreshError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::NotFound | SessionError::Revoked => Self::InvalidOrRevokedRefreshToken,
            SessionError::Expired => Self::ExpiredRefreshToken,
            SessionError::Database(_) => Self::SessionStoreFailed(e),
        }
    }
}

/// A signed access/refresh pair whose session row has not been written yet
#[derive(Debug)]
pub struct PreparedSession {
    pub access_token: String,
    pub refresh_token: String,
    pub session: NewRefreshSession,
}

impl PreparedSession {
    fn into_response(self, tokens: &TokenCodec) -> TokenResponse {
        TokenResponse::new(tokens, self.access_token, self.refresh_token)
    }
}

/// Signs both tokens for `tenant` and describes the session row that will track
/// the refresh token. Nothing is stored, so callers write the row last.
pub fn prepare_session_pair(tokens: &TokenCodec, tenant: &Tenant) -> Result<PreparedSession, RefreshError> {
    let access_token = tokens.issue_access_token(tenant.id, &tenant.username, tenant.plan_type)?;
    let issued = tokens.issue_refresh_token(tenant.id)?;
    let expires_at = DateTime::from_timestamp(issued.claims.exp, 0)
        .ok_or(TokenError::InvalidToken)?
        .naive_utc();
    let session = NewRefreshSession {
        tenant_id: tenant.id,
        token_hash: hash_refresh_token(&issued.token),
        expires_at,
    };
    Ok(PreparedSession {
        access_token,
        refresh_token: issued.token,
        session,
    })
}

/// Issues a fresh access/refresh pair and records the refresh session
pub async fn issue_session_pair(db: &core::Database, tokens: &TokenCodec, tenant: &Tenant) -> Result<TokenResponse, RefreshError> {
    let prepared = prepare_session_pair(tokens, tenant)?;
    db.refresh_sessions.create(&prepared.session).await?;
    Ok(prepared.into_response(tokens))
}

/// Creates the tenant and its first session in one transaction; a failure at
/// any step leaves neither row behind.
pub async fn register_tenant(
    db: &core::Database,
    tokens: &TokenCodec,
    new_tenant: &NewTenant,
) -> Result<(Tenant, TokenResponse), RefreshError> {
    let mut tx = db.pool().begin().await.map_err(DbError::from)?;

    let tenant = Tenants::insert(&mut *tx, new_tenant).await?;
    let prepared = prepare_session_pair(tokens, &tenant)?;
    RefreshSessions::insert(&mut *tx, &prepared.session).await?;

    tx.commit().await.map_err(DbError::from)?;
    Ok((tenant, prepared.into_response(tokens)))
}

/// Exchanges a refresh token for a new pair; the presented token is revoked.
pub async fn rotate_session(
    db: &core::Database,
    tokens: &TokenCodec,
    refresh_token: &str,
) -> Result<(Tenant, TokenResponse), RefreshError> {
    let claims = tokens.decode_refresh_token(refresh_token).map_err(|e| match e {
        TokenError::TokenExpired => RefreshError::ExpiredRefreshToken,
        _ => RefreshError::InvalidOrRevokedRefreshToken,
    })?;

    let session = db.refresh_sessions.validate(&hash_refresh_token(refresh_token)).await?;
    if session.tenant_id != claims.tenant_id {
        tracing::warn!(session_id = session.id, claims_tenant_id = claims.tenant_id, "Refresh token tenant does not match session");
        return Err(RefreshError::InvalidOrRevokedRefreshToken);
    }

    let tenant = db.tenants.get_by_id(session.tenant_id).await.map_err(|e| match e {
        DbError::TenantNotFound => RefreshError::InvalidOrRevokedRefreshToken,
        _ => RefreshError::DatabaseOperationFailed(e),
    })?;

    let prepared = prepare_session_pair(tokens, &tenant)?;
    db.refresh_sessions.rotate(session.id, &prepared.session).await?;
    tracing::info!(tenant_id = tenant.id, old_session_id = session.id, "Rotated refresh session");

    let response = prepared.into_response(tokens);
    Ok((tenant, response))
}

/// Revokes the caller's own session for `refresh_token`; returns whether one was active
pub async fn revoke_session(db: &core::Database, tenant_id: i64, refresh_token: &str) -> Result<bool, RefreshError> {
    let revoked = db
        .refresh_sessions
        .revoke_by_tenant_and_hash(tenant_id, &hash_refresh_token(refresh_token))
        .await?;
    Ok(revoked)
}
