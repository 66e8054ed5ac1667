//! Two-phase check-in: a location check that hands out a short-lived proof, and
//! the redemption of that proof into one attendance record per employee per day.
//!
//! The proof is a signed token with no server-side state, so it can be
//! presented again until it expires. Duplicate attendance is prevented by the
//! per-day uniqueness of the attendance write, not by consuming the proof.

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use crate::auth::{LocationTokenClaims, TokenError};
use crate::checkin::{GeoPoint, InvalidCoordinates, VerificationInput, VerificationStrategy, is_within_radius};
use crate::core;
use crate::core::DbError;
use crate::services::{CheckInAuditEvent, log_checkin_event};
use crate::store::{Attendance, NewAttendance};

#[derive(Debug, Error)]
pub enum CheckInError {
    #[error("Invalid coordinates")]
    InvalidCoordinates(#[from] InvalidCoordinates),

    #[error("Employee not found")]
    EmployeeNotFound,

    #[error("Tenant not found")]
    TenantNotFound,

    #[error("Location token is invalid or has expired")]
    InvalidOrExpiredLocationToken,

    #[error("Location token was issued for another employee")]
    EmployeeMismatch,

    #[error("Location token was issued by another tenant")]
    TenantMismatch,

    #[error("Embedding must be a non-empty array of numbers")]
    InvalidEmbedding,

    #[error("Photo URL is required")]
    MissingPhotoUrl,

    #[error("Face verification failed, please retake the photo")]
    FaceVerificationFailed,

    #[error("Employee has already checked in today")]
    AlreadyCheckedInToday,

    #[error("Token error: {0}")]
    TokenIssueFailed(TokenError),

    #[error("Database error: {0}")]
    DatabaseOperationFailed(DbError),
}

impl From<DbError> for CheckInError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::EmployeeNotFound => Self::EmployeeNotFound,
            DbError::TenantNotFound => Self::TenantNotFound,
            DbError::AlreadyCheckedInToday => Self::AlreadyCheckedInToday,
            _ => Self::DatabaseOperationFailed(e),
        }
    }
}

impl IntoResponse for CheckInError {
    fn into_response(self) -> axum::response::Response {
        tracing::error!(
            error_type = %std::any::type_name::<Self>(),
            error_subtype = %std::any::type_name_of_val(&self),
            error_message = %self);

        #[rustfmt::skip]
        #[allow(clippy::match_same_arms)]
        let (status, error_message) = match self {
            Self::InvalidCoordinates(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            Self::InvalidEmbedding => (StatusCode::BAD_REQUEST, self.to_string()),
            Self::MissingPhotoUrl => (StatusCode::BAD_REQUEST, self.to_string()),
            Self::FaceVerificationFailed => (StatusCode::UNPROCESSABLE_ENTITY, self.to_string()),
            Self::EmployeeNotFound => (StatusCode::NOT_FOUND, self.to_string()),
            Self::TenantNotFound => (StatusCode::NOT_FOUND, self.to_string()),
            Self::InvalidOrExpiredLocationToken => (StatusCode::UNAUTHORIZED, self.to_string()),
            Self::EmployeeMismatch => (StatusCode::FORBIDDEN, self.to_string()),
            Self::TenantMismatch => (StatusCode::FORBIDDEN, self.to_string()),
            Self::AlreadyCheckedInToday => (StatusCode::CONFLICT, self.to_string()),
            Self::TokenIssueFailed(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string()),
            Self::DatabaseOperationFailed(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string()),
        };

        let body = Json(json!({
            "result": "error",
            "message": error_message
        }));

        (status, body).into_response()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocationCheckRequest {
    pub employee_id: i64,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TenantSummary {
    pub id: i64,
    pub name: String,
    pub address: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum LocationDecision {
    /// Inside the office radius; no proof is issued
    Denied { distance_meters: f64 },
    Granted {
        location_token: String,
        expires_in: i64,
        distance_meters: f64,
        tenant: TenantSummary,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckInRequest {
    pub employee_id: i64,
    pub photo_url: String,
    pub embedding: serde_json::Value,
}

/// Phase 1: issues a location proof when the employee is away from the office.
pub async fn check_location(
    context: &core::Context,
    request: &LocationCheckRequest,
) -> Result<LocationDecision, CheckInError> {
    let position = GeoPoint::new(request.latitude, request.longitude)?;
    let employee = context.db.employees.get_by_id(request.employee_id).await?;
    let tenant = context.db.tenants.get_by_id(employee.tenant_id).await?;

    let office = GeoPoint::new(tenant.latitude, tenant.longitude)?;
    let distance_meters = position.distance_to(&office);

    if is_within_radius(&position, &office, context.settings.checkin.office_radius_meters) {
        log_checkin_event(&CheckInAuditEvent::ProofDenied {
            tenant_id: tenant.id,
            employee_id: employee.id,
            distance_meters,
        });
        return Ok(LocationDecision::Denied { distance_meters });
    }

    let issued = context
        .tokens
        .issue_location_token(tenant.id, employee.id, position.latitude, position.longitude)
        .map_err(CheckInError::TokenIssueFailed)?;

    log_checkin_event(&CheckInAuditEvent::ProofIssued {
        tenant_id: tenant.id,
        employee_id: employee.id,
        distance_meters,
    });

    Ok(LocationDecision::Granted {
        location_token: issued.token,
        expires_in: context.tokens.location.expiry,
        distance_meters,
        tenant: TenantSummary {
            id: tenant.id,
            name: tenant.name,
            address: tenant.address,
        },
    })
}

/// Verifies a presented location proof; every failure collapses into one kind.
pub fn verify_location_proof(context: &core::Context, token: &str) -> Result<LocationTokenClaims, CheckInError> {
    context.tokens.decode_location_token(token).map_err(|e| {
        tracing::debug!("Rejected location token: {e}");
        CheckInError::InvalidOrExpiredLocationToken
    })
}

/// Phase 2: redeems a location proof into an attendance record.
pub async fn check_in(
    context: &core::Context,
    proof_token: &str,
    request: &CheckInRequest,
) -> Result<Attendance, CheckInError> {
    let proof = verify_location_proof(context, proof_token)?;

    if proof.employee_id != request.employee_id {
        log_checkin_event(&CheckInAuditEvent::EmployeeMismatch {
            token_employee_id: proof.employee_id,
            requested_employee_id: request.employee_id,
            token_tenant_id: proof.tenant_id,
        });
        return Err(CheckInError::EmployeeMismatch);
    }

    let embedding = parse_embedding(&request.embedding)?;
    if request.photo_url.trim().is_empty() {
        return Err(CheckInError::MissingPhotoUrl);
    }

    let employee = context.db.employees.get_by_id(request.employee_id).await?;
    let tenant = context.db.tenants.get_by_id(employee.tenant_id).await?;

    if employee.tenant_id != proof.tenant_id {
        log_checkin_event(&CheckInAuditEvent::TenantMismatch {
            token_tenant_id: proof.tenant_id,
            employee_tenant_id: employee.tenant_id,
            employee_id: employee.id,
        });
        return Err(CheckInError::TenantMismatch);
    }

    let strategy = VerificationStrategy::for_plan(
        tenant.plan_type,
        context.face_oracle.clone(),
        context.settings.checkin.face_similarity_threshold,
        context.settings.face_oracle.timeout(),
    );
    let outcome = strategy
        .verify(&VerificationInput {
            reference_photo_url: &employee.photo_url,
            reference_embedding: &employee.embedding,
            submitted_photo_url: &request.photo_url,
            submitted_embedding: &embedding,
        })
        .await;
    if !outcome.accepted {
        log_checkin_event(&CheckInAuditEvent::VerificationFailed {
            tenant_id: tenant.id,
            employee_id: employee.id,
            reason: format!("{strategy:?} rejected the photo"),
        });
        return Err(CheckInError::FaceVerificationFailed);
    }

    let new_attendance = NewAttendance {
        tenant_id: tenant.id,
        employee_id: employee.id,
        photo_url: request.photo_url.clone(),
        embedding,
        check_in_time: Utc::now().naive_utc(),
        confidence: outcome.confidence,
    };
    let attendance = match context.db.attendance.create_once_per_day(&new_attendance).await {
        Ok(attendance) => attendance,
        Err(DbError::AlreadyCheckedInToday) => {
            log_checkin_event(&CheckInAuditEvent::DuplicateCheckIn {
                tenant_id: tenant.id,
                employee_id: employee.id,
            });
            return Err(CheckInError::AlreadyCheckedInToday);
        }
        Err(e) => return Err(e.into()),
    };

    log_checkin_event(&CheckInAuditEvent::CheckedIn {
        tenant_id: tenant.id,
        employee_id: employee.id,
        attendance_id: attendance.id,
        confidence: attendance.confidence,
    });
    Ok(attendance)
}

/// Accepts a non-empty JSON array whose elements are all finite numbers
pub fn parse_embedding(value: &serde_json::Value) -> Result<Vec<f64>, CheckInError> {
    let items = value.as_array().ok_or(CheckInError::InvalidEmbedding)?;
    if items.is_empty() {
        return Err(CheckInError::InvalidEmbedding);
    }
    items
        .iter()
        .map(|item| item.as_f64().filter(|n| n.is_finite()).ok_or(CheckInError::InvalidEmbedding))
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_parse_embedding_accepts_integers_and_floats() {
        let embedding = parse_embedding(&json!([1, -0.5, 2.25])).unwrap();
        assert_eq!(embedding, vec![1.0, -0.5, 2.25]);
    }

    #[test]
    fn test_parse_embedding_rejects_malformed_vectors() {
        for value in [json!([]), json!(null), json!("0.1,0.2"), json!([0.1, "0.2"]), json!([[0.1]]), json!({"0": 0.1})] {
            assert!(matches!(parse_embedding(&value), Err(CheckInError::InvalidEmbedding)), "{value}");
        }
    }

    #[test]
    fn test_db_errors_keep_their_kind() {
        assert!(matches!(CheckInError::from(DbError::EmployeeNotFound), CheckInError::EmployeeNotFound));
        assert!(matches!(CheckInError::from(DbError::AlreadyCheckedInToday), CheckInError::AlreadyCheckedInToday));
        assert!(matches!(
            CheckInError::from(DbError::AttendanceNotFound),
            CheckInError::DatabaseOperationFailed(_)
        ));
    }
}
