//! Shared plumbing for the authenticated `/api` routes.

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use crate::auth::TenantAccessDenied;
use crate::core::DbError;
use crate::services::StorageError;

const DEFAULT_PER_PAGE: i64 = 20;
const MAX_PER_PAGE: i64 = 100;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Access denied: {0}")]
    AccessDenied(#[from] TenantAccessDenied),

    #[error("No photo was uploaded")]
    MissingPhoto,

    #[error("Photo exceeds the {0} byte upload limit")]
    PhotoTooLarge(usize),

    #[error("Malformed multipart request: {0}")]
    MalformedMultipart(#[from] axum::extract::multipart::MultipartError),

    #[error("Storage failure: {0}")]
    StorageFailure(StorageError),

    #[error("Database error: {0}")]
    DatabaseOperationFailed(DbError),
}

impl From<DbError> for ApiError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::TenantNotFound | DbError::EmployeeNotFound | DbError::AttendanceNotFound => {
                Self::NotFound(e.to_string())
            }
            _ => Self::DatabaseOperationFailed(e),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::UnsupportedContentType(content_type) => {
                Self::InvalidInput(format!("Unsupported photo content type: {content_type}"))
            }
            _ => Self::StorageFailure(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        tracing::error!(
            error_type = %std::any::type_name::<Self>(),
            error_subtype = %std::any::type_name_of_val(&self),
            error_message = %self);

        #[rustfmt::skip]
        #[allow(clippy::match_same_arms)]
        let (status, error_message) = match self {
            Self::InvalidInput(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            Self::MissingPhoto => (StatusCode::BAD_REQUEST, self.to_string()),
            Self::MalformedMultipart(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            Self::PhotoTooLarge(_) => (StatusCode::PAYLOAD_TOO_LARGE, self.to_string()),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            Self::AccessDenied(_) => (StatusCode::FORBIDDEN, "Access denied".to_string()),
            Self::StorageFailure(_) => (StatusCode::BAD_GATEWAY, "Photo storage is unavailable, please retry".to_string()),
            Self::DatabaseOperationFailed(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string()),
        };

        let body = Json(json!({
            "result": "error",
            "message": error_message
        }));

        (status, body).into_response()
    }
}

/// `?page=&per_page=` query parameters; pages start at 1
#[derive(Clone, Copy, Debug, Default, Deserialize)]
pub struct Pagination {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl Pagination {
    pub fn validate(self) -> Result<PageRequest, ApiError> {
        let page = self.page.unwrap_or(1);
        let per_page = self.per_page.unwrap_or(DEFAULT_PER_PAGE);
        if page < 1 {
            return Err(ApiError::InvalidInput("page must be at least 1".to_string()));
        }
        if !(1..=MAX_PER_PAGE).contains(&per_page) {
            return Err(ApiError::InvalidInput(format!("per_page must be between 1 and {MAX_PER_PAGE}")));
        }
        Ok(PageRequest { page, per_page })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub per_page: i64,
}

impl PageRequest {
    #[must_use]
    pub const fn limit(&self) -> i64 {
        self.per_page
    }

    #[must_use]
    pub const fn offset(&self) -> i64 {
        (self.page - 1) * self.per_page
    }
}

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub result: &'static str,
    pub items: Vec<T>,
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
}

impl<T> Page<T> {
    #[must_use]
    pub fn new(items: Vec<T>, request: PageRequest, total: i64) -> Self {
        Self {
            result: "ok",
            items,
            page: request.page,
            per_page: request.per_page,
            total,
        }
    }
}
