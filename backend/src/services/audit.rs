use serde::Serialize;
use std::fmt;

/// Check-in audit events for security monitoring
#[derive(Debug, Clone, Serialize)]
pub enum CheckInAuditEvent {
    /// Employee was outside the geofence and received a location proof
    ProofIssued {
        tenant_id: i64,
        employee_id: i64,
        distance_meters: f64,
    },
    /// Employee was inside the geofence; no proof issued
    ProofDenied {
        tenant_id: i64,
        employee_id: i64,
        distance_meters: f64,
    },
    /// A proof issued for one employee was presented for another
    EmployeeMismatch {
        token_employee_id: i64,
        requested_employee_id: i64,
        token_tenant_id: i64,
    },
    /// The proof's tenant does not own the employee
    TenantMismatch {
        token_tenant_id: i64,
        employee_tenant_id: i64,
        employee_id: i64,
    },
    /// Identity verification rejected the submitted photo
    VerificationFailed {
        tenant_id: i64,
        employee_id: i64,
        reason: String,
    },
    /// A second check-in on the same day was refused
    DuplicateCheckIn {
        tenant_id: i64,
        employee_id: i64,
    },
    /// Attendance was recorded
    CheckedIn {
        tenant_id: i64,
        employee_id: i64,
        attendance_id: i64,
        confidence: Option<f64>,
    },
}

impl fmt::Display for CheckInAuditEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProofIssued { employee_id, distance_meters, .. } => {
                write!(f, "Location proof issued for employee {employee_id} at {distance_meters:.0}m from office")
            }
            Self::ProofDenied { employee_id, distance_meters, .. } => {
                write!(f, "Location proof denied for employee {employee_id} at {distance_meters:.0}m from office")
            }
            Self::EmployeeMismatch { token_employee_id, requested_employee_id, .. } => {
                write!(f, "Location proof for employee {token_employee_id} presented for employee {requested_employee_id}")
            }
            Self::TenantMismatch { token_tenant_id, employee_tenant_id, employee_id } => {
                write!(f, "Location proof of tenant {token_tenant_id} presented for employee {employee_id} of tenant {employee_tenant_id}")
            }
            Self::VerificationFailed { employee_id, reason, .. } => {
                write!(f, "Identity verification failed for employee {employee_id}: {reason}")
            }
            Self::DuplicateCheckIn { employee_id, .. } => {
                write!(f, "Employee {employee_id} already checked in today")
            }
            Self::CheckedIn { employee_id, attendance_id, .. } => {
                write!(f, "Employee {employee_id} checked in (attendance {attendance_id})")
            }
        }
    }
}

/// Log check-in audit event with structured data
pub fn log_checkin_event(event: &CheckInAuditEvent) {
    match event {
        CheckInAuditEvent::EmployeeMismatch { .. } | CheckInAuditEvent::TenantMismatch { .. } => {
            tracing::warn!(
                event_type = "checkin_audit",
                event = ?event,
                message = %event,
                "Possible location proof misuse"
            );
        }
        CheckInAuditEvent::VerificationFailed { .. } => {
            tracing::warn!(
                event_type = "checkin_audit",
                event = ?event,
                message = %event,
                "Check-in verification failed"
            );
        }
        _ => {
            tracing::info!(
                event_type = "checkin_audit",
                event = ?event,
                message = %event,
                "Check-in event"
            );
        }
    }
}

/// Extract client IP from request headers (considering proxies)
pub fn extract_client_ip(headers: &axum::http::HeaderMap) -> Option<String> {
    if let Some(ip) = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
    {
        return Some(ip.trim().to_string());
    }

    headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(ToString::to_string)
}
