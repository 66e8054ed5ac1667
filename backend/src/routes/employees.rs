use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::json;

use crate::auth::{AccessTokenClaims, ensure_tenant_access};
use crate::checkin::parse_embedding;
use crate::core;
use crate::routes::api::{ApiError, Page, Pagination};
use crate::store::{Employee, EmployeeUpdate, NewEmployee};

#[derive(Debug, Deserialize)]
pub struct CreateEmployee {
    pub name: String,
    pub photo_url: String,
    pub embedding: serde_json::Value,
    #[serde(default)]
    pub salary: f64,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub alternate_phone: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateEmployee {
    pub name: Option<String>,
    pub photo_url: Option<String>,
    pub embedding: Option<serde_json::Value>,
    pub salary: Option<f64>,
    pub phone: Option<String>,
    pub alternate_phone: Option<String>,
}

fn validate_embedding(value: &serde_json::Value) -> Result<Vec<f64>, ApiError> {
    parse_embedding(value).map_err(|e| ApiError::InvalidInput(e.to_string()))
}

fn validate_salary(salary: f64) -> Result<f64, ApiError> {
    if !salary.is_finite() || salary < 0.0 {
        return Err(ApiError::InvalidInput("salary must be a non-negative number".to_string()));
    }
    Ok(salary)
}

fn validate_required(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::InvalidInput(format!("{field} is required")));
    }
    Ok(())
}

/// Loads an employee and checks it belongs to the caller
async fn owned_employee(context: &core::Context, tenant_id: i64, id: i64) -> Result<Employee, ApiError> {
    let employee = context.db.employees.get_by_id(id).await?;
    ensure_tenant_access(tenant_id, employee.tenant_id)?;
    Ok(employee)
}

pub async fn create(
    State(context): State<core::ArcContext>,
    Extension(claims): Extension<AccessTokenClaims>,
    Json(request): Json<CreateEmployee>,
) -> Result<impl IntoResponse, ApiError> {
    validate_required("name", &request.name)?;
    validate_required("photo_url", &request.photo_url)?;
    let new_employee = NewEmployee {
        tenant_id: claims.tenant_id,
        name: request.name.trim().to_string(),
        photo_url: request.photo_url,
        embedding: validate_embedding(&request.embedding)?,
        salary: validate_salary(request.salary)?,
        phone: request.phone,
        alternate_phone: request.alternate_phone,
    };

    let employee = context.db.employees.create(&new_employee).await?;
    tracing::info!(tenant_id = claims.tenant_id, employee_id = employee.id, "Employee created");
    Ok((StatusCode::CREATED, Json(json!({"result": "ok", "employee": employee}))))
}

pub async fn list(
    State(context): State<core::ArcContext>,
    Extension(claims): Extension<AccessTokenClaims>,
    Query(pagination): Query<Pagination>,
) -> Result<impl IntoResponse, ApiError> {
    let page = pagination.validate()?;
    let employees = context
        .db
        .employees
        .list_by_tenant(claims.tenant_id, page.limit(), page.offset())
        .await?;
    let total = context.db.employees.count_by_tenant(claims.tenant_id).await?;
    Ok(Json(Page::new(employees, page, total)))
}

pub async fn get(
    State(context): State<core::ArcContext>,
    Extension(claims): Extension<AccessTokenClaims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let employee = owned_employee(&context, claims.tenant_id, id).await?;
    Ok(Json(json!({"result": "ok", "employee": employee})))
}

pub async fn update(
    State(context): State<core::ArcContext>,
    Extension(claims): Extension<AccessTokenClaims>,
    Path(id): Path<i64>,
    Json(request): Json<UpdateEmployee>,
) -> Result<impl IntoResponse, ApiError> {
    owned_employee(&context, claims.tenant_id, id).await?;

    if let Some(name) = &request.name {
        validate_required("name", name)?;
    }
    if let Some(photo_url) = &request.photo_url {
        validate_required("photo_url", photo_url)?;
    }
    let update = EmployeeUpdate {
        name: request.name.map(|name| name.trim().to_string()),
        photo_url: request.photo_url,
        embedding: request.embedding.as_ref().map(validate_embedding).transpose()?,
        salary: request.salary.map(validate_salary).transpose()?,
        phone: request.phone,
        alternate_phone: request.alternate_phone,
    };

    let employee = context.db.employees.update(id, &update).await?;
    tracing::info!(tenant_id = claims.tenant_id, employee_id = id, "Employee updated");
    Ok(Json(json!({"result": "ok", "employee": employee})))
}

pub async fn delete(
    State(context): State<core::ArcContext>,
    Extension(claims): Extension<AccessTokenClaims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    owned_employee(&context, claims.tenant_id, id).await?;
    context.db.employees.delete(id).await?;
    tracing::info!(tenant_id = claims.tenant_id, employee_id = id, "Employee deleted");
    Ok(Json(json!({"result": "ok"})))
}
