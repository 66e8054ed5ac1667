use std::fs;
use std::path::Path;

use axum::Json;
use axum::http;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use chrono::Utc;
use jsonwebtoken as jwt;
use rand::TryRngCore;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::Digest;
use thiserror::Error;
use uuid::Uuid;

use crate::cfg;
use crate::store::PlanType;

type TryRngError = <rand::rngs::OsRng as rand::TryRngCore>::Error;

const MIN_SECRET_LEN: usize = 32;

#[rustfmt::skip]
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Failed to encode token")]
    EncodingFailed(jwt::errors::Error),

    #[error("File system operation failed")]
    FileSystemOperationFailed { #[from] source: std::io::Error },

    #[error("Random number generation operation failed")]
    RngOperationFailed { source: TryRngError },

    #[error("Token has expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Invalid authorization header")]
    InvalidAuthorizationHeader,
}

impl IntoResponse for TokenError {
    fn into_response(self) -> axum::response::Response {
        tracing::error!(
            error_type = %std::any::type_name::<Self>(),
            error_subtype = %std::any::type_name_of_val(&self),
            error_message = %self);

        #[rustfmt::skip]
        #[allow(clippy::match_same_arms)]
        let (status, error_message) = match self {
            Self::RngOperationFailed { source: _ } => (http::StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string()),
            Self::FileSystemOperationFailed { source: _ } => (http::StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string()),
            Self::EncodingFailed(_) => (http::StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string()),
            Self::TokenExpired => (http::StatusCode::UNAUTHORIZED, "Authentication token has expired".to_string()),
            Self::InvalidToken => (http::StatusCode::UNAUTHORIZED, "Invalid authentication token".to_string()),
            Self::InvalidAuthorizationHeader => (http::StatusCode::UNAUTHORIZED, "Invalid or missing authorization header".to_string()),
        };

        let body = Json(json!({
            "result": "error",
            "message": error_message
        }));

        (status, body).into_response()
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
    Location,
}

impl TokenType {
    const fn secret_file_name(self) -> &'static str {
        match self {
            Self::Access => ".access_token_secret",
            Self::Refresh => ".refresh_token_secret",
            Self::Location => ".location_token_secret",
        }
    }
}

/// Claims that carry their own kind tag, checked after the signature.
pub trait TypedClaims {
    fn token_type(&self) -> TokenType;
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccessTokenClaims {
    pub tenant_id: i64,
    pub username: String,
    pub plan_type: PlanType,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
    pub token_type: TokenType,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RefreshTokenClaims {
    pub tenant_id: i64,
    pub sid: String, // random session identifier, makes every refresh token unique
    pub exp: i64,
    pub iat: i64,
    pub token_type: TokenType,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LocationTokenClaims {
    pub tenant_id: i64,
    pub employee_id: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
    pub token_type: TokenType,
}

impl TypedClaims for AccessTokenClaims {
    fn token_type(&self) -> TokenType {
        self.token_type
    }
}

impl TypedClaims for RefreshTokenClaims {
    fn token_type(&self) -> TokenType {
        self.token_type
    }
}

impl TypedClaims for LocationTokenClaims {
    fn token_type(&self) -> TokenType {
        self.token_type
    }
}

/// A freshly signed token together with the claims it carries.
#[derive(Debug, Clone)]
pub struct IssuedToken<C> {
    pub token: String,
    pub claims: C,
}

/// Response structure for token endpoints
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub access_token_expires_in: i64,  // Seconds until access token expires
    pub refresh_token_expires_in: i64, // Seconds until refresh token expires
}

impl TokenResponse {
    #[must_use]
    pub const fn new(codec: &TokenCodec, access_token: String, refresh_token: String) -> Self {
        Self {
            access_token,
            refresh_token,
            access_token_expires_in: codec.access.expiry,
            refresh_token_expires_in: codec.refresh.expiry,
        }
    }
}

/// One HS256 key pair bound to a single token kind.
#[derive(Clone)]
pub struct TokenSigner {
    pub encoding_key: jwt::EncodingKey,
    pub decoding_key: jwt::DecodingKey,
    pub validation: jwt::Validation,
    pub expiry: i64,
    token_type: TokenType,
}

impl TokenSigner {
    #[must_use]
    pub fn new(token_type: TokenType, secret: &str, expiry: i64) -> Self {
        let encoding_key = jwt::EncodingKey::from_secret(secret.as_ref());
        let decoding_key = jwt::DecodingKey::from_secret(secret.as_ref());
        let mut validation = jwt::Validation::new(jwt::Algorithm::HS256);
        validation.leeway = 0;

        Self {
            encoding_key,
            decoding_key,
            validation,
            expiry,
            token_type,
        }
    }

    pub fn sign<C: Serialize>(&self, claims: &C) -> Result<String, TokenError> {
        let header = jwt::Header::new(jwt::Algorithm::HS256);
        jwt::encode(&header, claims, &self.encoding_key).map_err(TokenError::EncodingFailed)
    }

    pub fn verify<C: DeserializeOwned + TypedClaims>(&self, token: &str) -> Result<C, TokenError> {
        let token_data = jwt::decode::<C>(token, &self.decoding_key, &self.validation)?;
        let valid = token_data.claims.token_type() == self.token_type;
        valid.then_some(token_data.claims).ok_or(TokenError::InvalidToken)
    }
}

/// The three independently keyed signers used by the service.
#[derive(Clone)]
pub struct TokenCodec {
    pub access: TokenSigner,
    pub refresh: TokenSigner,
    pub location: TokenSigner,
}

/// Raw secret material for the three signers.
#[derive(Clone)]
pub struct TokenSecrets {
    pub access: String,
    pub refresh: String,
    pub location: String,
}

impl TokenSecrets {
    /// Uses configured secrets where they are long enough, otherwise loads or
    /// creates a persisted secret per token kind under `config_dir`.
    pub fn resolve(settings: &cfg::JwtSettings, config_dir: &Path) -> Result<Self, TokenError> {
        let secrets = Self {
            access: resolve_secret(&settings.access_token_secret, config_dir, TokenType::Access)?,
            refresh: resolve_secret(&settings.refresh_token_secret, config_dir, TokenType::Refresh)?,
            location: resolve_secret(&settings.location_token_secret, config_dir, TokenType::Location)?,
        };
        if secrets.access == secrets.refresh || secrets.access == secrets.location || secrets.refresh == secrets.location {
            tracing::warn!("Token secrets are shared between token kinds; configure a distinct secret per kind");
        }
        Ok(secrets)
    }
}

impl TokenCodec {
    #[must_use]
    pub fn new(settings: &cfg::JwtSettings, secrets: &TokenSecrets) -> Self {
        Self {
            access: TokenSigner::new(TokenType::Access, &secrets.access, settings.access_token_expiry),
            refresh: TokenSigner::new(TokenType::Refresh, &secrets.refresh, settings.refresh_token_expiry),
            location: TokenSigner::new(TokenType::Location, &secrets.location, settings.location_token_expiry),
        }
    }

    /// Generate a new access token
    pub fn issue_access_token(&self, tenant_id: i64, username: &str, plan_type: PlanType) -> Result<String, TokenError> {
        let now = Utc::now().timestamp();
        let claims = AccessTokenClaims {
            tenant_id,
            username: username.to_string(),
            plan_type,
            exp: now + self.access.expiry,
            iat: now,
            jti: Uuid::new_v4().to_string(),
            token_type: TokenType::Access,
        };
        self.access.sign(&claims)
    }

    /// Generate a new refresh token with a fresh random session identifier
    pub fn issue_refresh_token(&self, tenant_id: i64) -> Result<IssuedToken<RefreshTokenClaims>, TokenError> {
        let now = Utc::now().timestamp();
        let claims = RefreshTokenClaims {
            tenant_id,
            sid: generate_secure_secret()?,
            exp: now + self.refresh.expiry,
            iat: now,
            token_type: TokenType::Refresh,
        };
        let token = self.refresh.sign(&claims)?;
        Ok(IssuedToken { token, claims })
    }

    /// Generate a location proof bound to an employee and the coordinates that triggered it
    pub fn issue_location_token(
        &self,
        tenant_id: i64,
        employee_id: i64,
        latitude: f64,
        longitude: f64,
    ) -> Result<IssuedToken<LocationTokenClaims>, TokenError> {
        let now = Utc::now().timestamp();
        let claims = LocationTokenClaims {
            tenant_id,
            employee_id,
            latitude,
            longitude,
            exp: now + self.location.expiry,
            iat: now,
            jti: Uuid::new_v4().to_string(),
            token_type: TokenType::Location,
        };
        let token = self.location.sign(&claims)?;
        Ok(IssuedToken { token, claims })
    }

    pub fn decode_access_token(&self, token: &str) -> Result<AccessTokenClaims, TokenError> {
        self.access.verify(token)
    }

    pub fn decode_refresh_token(&self, token: &str) -> Result<RefreshTokenClaims, TokenError> {
        self.refresh.verify(token)
    }

    pub fn decode_location_token(&self, token: &str) -> Result<LocationTokenClaims, TokenError> {
        self.location.verify(token)
    }

    pub fn decode_access_token_from_headers(&self, headers: &HeaderMap) -> Result<AccessTokenClaims, TokenError> {
        self.decode_access_token(bearer_token(headers)?)
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, TokenError> {
    headers
        .get(http::header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
        .ok_or(TokenError::InvalidAuthorizationHeader)
}

/// One-way storable form of a raw refresh token
#[must_use]
pub fn hash_refresh_token(token: &str) -> String {
    let mut hasher = sha2::Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn resolve_secret(configured: &str, config_dir: &Path, token_type: TokenType) -> Result<String, TokenError> {
    let configured = configured.trim();
    if configured.len() >= MIN_SECRET_LEN {
        return Ok(configured.to_string());
    }
    load_or_create_secret(&config_dir.join(token_type.secret_file_name()))
}

/// Loads a persisted secret, or creates one with owner-only permissions
fn load_or_create_secret(secret_file_path: &Path) -> Result<String, TokenError> {
    if let Ok(file_secret) = fs::read_to_string(secret_file_path) {
        let trimmed_secret = file_secret.trim();
        if trimmed_secret.len() >= MIN_SECRET_LEN {
            return Ok(trimmed_secret.to_string());
        }
    }

    if let Some(parent) = secret_file_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let new_secret = generate_secure_secret()?;
    fs::write(secret_file_path, &new_secret)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(secret_file_path)?.permissions();
        perms.set_mode(0o600); // rw-------
        fs::set_permissions(secret_file_path, perms)?;
    }

    tracing::info!("Generated new token secret in {}", secret_file_path.to_string_lossy());
    Ok(new_secret)
}

/// Generates a cryptographically secure random secret
fn generate_secure_secret() -> Result<String, TokenError> {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| TokenError::RngOperationFailed { source: e })?;
    Ok(hex::encode(bytes))
}

/// Every decode failure other than expiry is reported as an invalid token,
/// including a signature made with another kind's key.
impl From<jwt::errors::Error> for TokenError {
    fn from(e: jwt::errors::Error) -> Self {
        match e.kind() {
            jwt::errors::ErrorKind::ExpiredSignature => Self::TokenExpired,
            _ => Self::InvalidToken,
        }
    }
}
