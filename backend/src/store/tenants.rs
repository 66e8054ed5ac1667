use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection};

use crate::core::{DbError, DbPool};

/// Subscription tier; selects how check-ins are identity-verified.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(rename_all = "UPPERCASE")]
pub enum PlanType {
    Free,
    Paid,
}

impl fmt::Display for PlanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Free => write!(f, "FREE"),
            Self::Paid => write!(f, "PAID"),
        }
    }
}

impl FromStr for PlanType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "FREE" => Ok(Self::Free),
            "PAID" => Ok(Self::Paid),
            other => Err(format!("unknown plan type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Tenant {
    pub id: i64,
    pub name: String,
    pub tax_id: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub plan_type: PlanType,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTenant {
    pub name: String,
    pub tax_id: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub username: String,
    pub password_hash: String,
    pub plan_type: PlanType,
}

/// Profile fields a tenant may change about itself
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TenantUpdate {
    pub name: Option<String>,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

const TENANT_COLUMNS: &str = "id, name, tax_id, address, latitude, longitude, username, password_hash, plan_type, created_at, updated_at";

#[derive(Clone, Debug)]
pub struct Tenants {
    db: DbPool,
}

impl Tenants {
    #[must_use]
    pub const fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Inserts a tenant; username and tax id collisions surface as their own conflict kinds
    pub async fn create(&self, new_tenant: &NewTenant) -> Result<Tenant, DbError> {
        let mut conn = self.db.acquire().await?;
        Self::insert(&mut *conn, new_tenant).await
    }

    /// Same as `create`, on a caller-held connection or transaction
    pub async fn insert(conn: &mut SqliteConnection, new_tenant: &NewTenant) -> Result<Tenant, DbError> {
        let sql = format!(
            r"
            INSERT INTO tenants (name, tax_id, address, latitude, longitude, username, password_hash, plan_type, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)
            RETURNING {TENANT_COLUMNS}
            "
        );
        sqlx::query_as::<_, Tenant>(&sql)
            .bind(&new_tenant.name)
            .bind(&new_tenant.tax_id)
            .bind(&new_tenant.address)
            .bind(new_tenant.latitude)
            .bind(new_tenant.longitude)
            .bind(&new_tenant.username)
            .bind(&new_tenant.password_hash)
            .bind(new_tenant.plan_type)
            .fetch_one(conn)
            .await
            .map_err(|e| {
                let violated = match &e {
                    sqlx::Error::Database(db_err) if db_err.is_unique_violation() => Some(db_err.message().to_string()),
                    _ => None,
                };
                match violated {
                    Some(message) if message.contains("tenants.username") => DbError::UsernameTaken,
                    Some(message) if message.contains("tenants.tax_id") => DbError::TaxIdTaken,
                    _ => DbError::OperationFailed(e),
                }
            })
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Tenant, DbError> {
        let sql = format!("SELECT {TENANT_COLUMNS} FROM tenants WHERE id = ?");
        sqlx::query_as::<_, Tenant>(&sql)
            .bind(id)
            .fetch_one(&self.db)
            .await
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => DbError::TenantNotFound,
                _ => DbError::OperationFailed(e),
            })
    }

    pub async fn get_by_username(&self, username: &str) -> Result<Tenant, DbError> {
        let sql = format!("SELECT {TENANT_COLUMNS} FROM tenants WHERE username = ?");
        sqlx::query_as::<_, Tenant>(&sql)
            .bind(username)
            .fetch_one(&self.db)
            .await
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => DbError::TenantNotFound,
                _ => DbError::OperationFailed(e),
            })
    }

    pub async fn username_exists(&self, username: &str) -> Result<bool, DbError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tenants WHERE username = ?")
            .bind(username)
            .fetch_one(&self.db)
            .await?;
        Ok(count > 0)
    }

    pub async fn tax_id_exists(&self, tax_id: &str) -> Result<bool, DbError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tenants WHERE tax_id = ?")
            .bind(tax_id)
            .fetch_one(&self.db)
            .await?;
        Ok(count > 0)
    }

    /// Applies the provided fields and leaves the others untouched
    pub async fn update_profile(&self, id: i64, update: &TenantUpdate) -> Result<Tenant, DbError> {
        let sql = format!(
            r"
            UPDATE tenants
            SET name = COALESCE(?, name),
                address = COALESCE(?, address),
                latitude = COALESCE(?, latitude),
                longitude = COALESCE(?, longitude),
                updated_at = CURRENT_TIMESTAMP
            WHERE id = ?
            RETURNING {TENANT_COLUMNS}
            "
        );
        sqlx::query_as::<_, Tenant>(&sql)
            .bind(&update.name)
            .bind(&update.address)
            .bind(update.latitude)
            .bind(update.longitude)
            .bind(id)
            .fetch_one(&self.db)
            .await
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => DbError::TenantNotFound,
                _ => DbError::OperationFailed(e),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_type_parsing_is_case_insensitive() {
        assert_eq!("free".parse::<PlanType>().unwrap(), PlanType::Free);
        assert_eq!("PAID".parse::<PlanType>().unwrap(), PlanType::Paid);
        assert!("gold".parse::<PlanType>().is_err());
    }

    #[test]
    fn test_plan_type_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&PlanType::Paid).unwrap(), "\"PAID\"");
        assert_eq!(PlanType::Free.to_string(), "FREE");
    }
}
