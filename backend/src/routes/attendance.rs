use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::{Extension, Json};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;

use crate::auth::{AccessTokenClaims, ensure_tenant_access};
use crate::core;
use crate::routes::api::{ApiError, Page, Pagination};
use crate::store::AttendanceFilter;

/// Report query: optional employee and inclusive date range, plus paging
#[derive(Debug, Default, Deserialize)]
pub struct AttendanceQuery {
    pub employee_id: Option<i64>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

pub async fn list(
    State(context): State<core::ArcContext>,
    Extension(claims): Extension<AccessTokenClaims>,
    Query(query): Query<AttendanceQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = Pagination {
        page: query.page,
        per_page: query.per_page,
    }
    .validate()?;
    if matches!((query.from, query.to), (Some(from), Some(to)) if from > to) {
        return Err(ApiError::InvalidInput("from must not be after to".to_string()));
    }
    if let Some(employee_id) = query.employee_id {
        let employee = context.db.employees.get_by_id(employee_id).await?;
        ensure_tenant_access(claims.tenant_id, employee.tenant_id)?;
    }

    let filter = AttendanceFilter {
        employee_id: query.employee_id,
        from: query.from,
        to: query.to,
    };
    let records = context
        .db
        .attendance
        .list(claims.tenant_id, &filter, page.limit(), page.offset())
        .await?;
    let total = context.db.attendance.count(claims.tenant_id, &filter).await?;
    Ok(Json(Page::new(records, page, total)))
}

pub async fn get(
    State(context): State<core::ArcContext>,
    Extension(claims): Extension<AccessTokenClaims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let record = context.db.attendance.get_by_id(id).await?;
    ensure_tenant_access(claims.tenant_id, record.tenant_id)?;
    Ok(Json(json!({"result": "ok", "attendance": record})))
}
