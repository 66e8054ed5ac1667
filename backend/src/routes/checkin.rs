use axum::Json;
use axum::extract::{Multipart, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::auth::bearer_token;
use crate::checkin;
use crate::checkin::{CheckInError, CheckInRequest, LocationCheckRequest, LocationDecision};
use crate::core;
use crate::routes::uploads;

fn proof_token(headers: &HeaderMap) -> Result<&str, CheckInError> {
    bearer_token(headers).map_err(|_| CheckInError::InvalidOrExpiredLocationToken)
}

/// Phase 1: returns a location token when the employee is outside the office radius
pub async fn check_location(
    State(context): State<core::ArcContext>,
    Json(request): Json<LocationCheckRequest>,
) -> Result<impl IntoResponse, CheckInError> {
    tracing::info!(employee_id = request.employee_id, "Location check");

    let decision = checkin::check_location(&context, &request).await?;
    let granted = matches!(decision, LocationDecision::Granted { .. });
    Ok(Json(json!({
        "result": "ok",
        "granted": granted,
        "decision": decision,
    })))
}

/// Uploads the check-in photo; only callers holding a valid location token may upload
pub async fn upload_photo(
    State(context): State<core::ArcContext>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<impl IntoResponse, Response> {
    let proof = proof_token(&headers)
        .and_then(|token| checkin::verify_location_proof(&context, token))
        .map_err(IntoResponse::into_response)?;

    let url = uploads::receive_photo(&context, multipart)
        .await
        .map_err(IntoResponse::into_response)?;
    tracing::debug!(employee_id = proof.employee_id, url = %url, "Check-in photo uploaded");

    Ok((StatusCode::CREATED, Json(json!({"result": "ok", "url": url}))))
}

/// Phase 2: redeems the location token into an attendance record
pub async fn check_in(
    State(context): State<core::ArcContext>,
    headers: HeaderMap,
    Json(request): Json<CheckInRequest>,
) -> Result<impl IntoResponse, CheckInError> {
    let token = proof_token(&headers)?;
    let attendance = checkin::check_in(&context, token, &request).await?;
    Ok((StatusCode::CREATED, Json(json!({"result": "ok", "attendance": attendance}))))
}
