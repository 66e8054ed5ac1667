use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use crate::auth;
use crate::auth::{AccessTokenClaims, RefreshError, TokenError};
use crate::checkin::GeoPoint;
use crate::core;
use crate::core::DbError;
use crate::store::{NewTenant, PlanType, Tenant};

#[derive(Deserialize)]
pub struct Register {
    pub name: String,
    pub tax_id: String,
    #[serde(default)]
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub username: String,
    pub password: String,
    #[serde(default = "default_plan_type")]
    pub plan_type: PlanType,
}

const fn default_plan_type() -> PlanType {
    PlanType::Free
}

#[derive(Deserialize)]
pub struct Login {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RefreshTokenRequest {
    refresh_token: String,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("Username is already registered")]
    UsernameTaken,

    #[error("Tax id is already registered")]
    TaxIdTaken,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Refresh token is invalid or has been revoked")]
    InvalidOrRevokedRefreshToken,

    #[error("Refresh token has expired")]
    ExpiredRefreshToken,

    #[error("Token error: {0}")]
    TokenError(#[from] TokenError),

    #[error("Password error: {0}")]
    PasswordHashingError(argon2::password_hash::Error),

    #[error("Database error: {0}")]
    DatabaseError(DbError),

    #[error("Session store error: {0}")]
    SessionStoreError(RefreshError),
}

impl From<DbError> for AuthError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::UsernameTaken => Self::UsernameTaken,
            DbError::TaxIdTaken => Self::TaxIdTaken,
            _ => Self::DatabaseError(e),
        }
    }
}

impl From<RefreshError> for AuthError {
    fn from(e: RefreshError) -> Self {
        match e {
            RefreshError::InvalidOrRevokedRefreshToken => Self::InvalidOrRevokedRefreshToken,
            RefreshError::ExpiredRefreshToken => Self::ExpiredRefreshToken,
            RefreshError::TokenIssueFailed(e) => Self::TokenError(e),
            RefreshError::DatabaseOperationFailed(e) => Self::from(e),
            RefreshError::SessionStoreFailed(_) => Self::SessionStoreError(e),
        }
    }
}

impl From<argon2::password_hash::Error> for AuthError {
    fn from(e: argon2::password_hash::Error) -> Self {
        Self::PasswordHashingError(e)
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> axum::response::Response {
        tracing::error!(
            error_type = %std::any::type_name::<Self>(),
            error_subtype = %std::any::type_name_of_val(&self),
            error_message = %self);

        #[rustfmt::skip]
        #[allow(clippy::match_same_arms)]
        let (status, error_message) = match self {
            Self::InvalidInput(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            Self::UsernameTaken => (StatusCode::CONFLICT, self.to_string()),
            Self::TaxIdTaken => (StatusCode::CONFLICT, self.to_string()),
            Self::InvalidCredentials => (StatusCode::UNAUTHORIZED, self.to_string()),
            Self::InvalidOrRevokedRefreshToken => (StatusCode::UNAUTHORIZED, self.to_string()),
            Self::ExpiredRefreshToken => (StatusCode::UNAUTHORIZED, self.to_string()),
            Self::TokenError(TokenError::TokenExpired | TokenError::InvalidToken | TokenError::InvalidAuthorizationHeader) => (StatusCode::UNAUTHORIZED, self.to_string()),
            Self::TokenError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string()),
            Self::PasswordHashingError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string()),
            Self::DatabaseError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string()),
            Self::SessionStoreError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string()),
        };

        let body = Json(json!({
            "result": "error",
            "message": error_message
        }));

        (status, body).into_response()
    }
}

fn tenant_json(tenant: &Tenant) -> serde_json::Value {
    json!({
        "id": tenant.id,
        "name": tenant.name,
        "username": tenant.username,
        "plan_type": tenant.plan_type,
    })
}

impl Register {
    fn validate(&self) -> Result<(), AuthError> {
        let required = [
            ("name", &self.name),
            ("tax_id", &self.tax_id),
            ("username", &self.username),
        ];
        if let Some((field, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(AuthError::InvalidInput(format!("{field} is required")));
        }
        auth::check_password_policy(&self.password).map_err(|e| AuthError::InvalidInput(e.to_string()))?;
        GeoPoint::new(self.latitude, self.longitude)
            .map_err(|e| AuthError::InvalidInput(e.to_string()))?;
        Ok(())
    }
}

/// Registers a tenant and signs it in
pub async fn register(
    State(context): State<core::ArcContext>,
    Json(request): Json<Register>,
) -> Result<impl IntoResponse, AuthError> {
    request.validate()?;
    tracing::info!("Registering tenant: {}", request.username);

    // pre-checks give a precise conflict; the unique indexes still catch races
    if context.db.tenants.username_exists(&request.username).await? {
        return Err(AuthError::UsernameTaken);
    }
    if context.db.tenants.tax_id_exists(&request.tax_id).await? {
        return Err(AuthError::TaxIdTaken);
    }

    let new_tenant = NewTenant {
        name: request.name.trim().to_string(),
        tax_id: request.tax_id.trim().to_string(),
        address: request.address,
        latitude: request.latitude,
        longitude: request.longitude,
        username: request.username,
        password_hash: auth::hash_password(&request.password)?,
        plan_type: request.plan_type,
    };
    let (tenant, tokens) = auth::register_tenant(&context.db, &context.tokens, &new_tenant).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "result": "ok",
            "tokens": tokens,
            "tenant": tenant,
        })),
    ))
}

/// Login route
pub async fn login(
    State(context): State<core::ArcContext>,
    Json(login): Json<Login>,
) -> Result<impl IntoResponse, AuthError> {
    tracing::info!("Logging in tenant: {}", login.username);

    let tenant = match context.db.tenants.get_by_username(&login.username).await {
        Ok(tenant) => tenant,
        Err(DbError::TenantNotFound) => {
            auth::verify_against_unknown_tenant(&login.password);
            return Err(AuthError::InvalidCredentials);
        }
        Err(e) => return Err(e.into()),
    };

    if !auth::verify_password(&login.password, &tenant.password_hash)? {
        tracing::warn!("Invalid password for tenant: {}", login.username);
        return Err(AuthError::InvalidCredentials);
    }

    let tokens = auth::issue_session_pair(&context.db, &context.tokens, &tenant).await?;
    Ok(Json(json!({
        "result": "ok",
        "tokens": tokens,
        "tenant": tenant_json(&tenant),
    })))
}

/// Rotates the presented refresh token into a new session pair
pub async fn refresh(
    State(context): State<core::ArcContext>,
    Json(request): Json<RefreshTokenRequest>,
) -> Result<impl IntoResponse, AuthError> {
    tracing::info!("Refreshing session");

    let (tenant, tokens) = auth::rotate_session(&context.db, &context.tokens, &request.refresh_token).await?;
    Ok(Json(json!({
        "result": "ok",
        "tokens": tokens,
        "tenant": tenant_json(&tenant),
    })))
}

/// Revokes the named refresh session of the authenticated tenant
pub async fn logout(
    State(context): State<core::ArcContext>,
    Extension(claims): Extension<AccessTokenClaims>,
    Json(request): Json<RefreshTokenRequest>,
) -> Result<impl IntoResponse, AuthError> {
    let revoked = auth::revoke_session(&context.db, claims.tenant_id, &request.refresh_token).await?;
    tracing::info!(tenant_id = claims.tenant_id, revoked, "Logout");

    Ok(Json(json!({"result": "ok", "revoked": revoked})))
}
