use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;

use crate::core::{DbError, DbPool};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Employee {
    pub id: i64,
    pub tenant_id: i64,
    pub name: String,
    pub photo_url: String,
    #[sqlx(json)]
    pub embedding: Vec<f64>,
    pub salary: f64,
    pub phone: String,
    pub alternate_phone: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEmployee {
    pub tenant_id: i64,
    pub name: String,
    pub photo_url: String,
    pub embedding: Vec<f64>,
    pub salary: f64,
    pub phone: String,
    pub alternate_phone: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmployeeUpdate {
    pub name: Option<String>,
    pub photo_url: Option<String>,
    pub embedding: Option<Vec<f64>>,
    pub salary: Option<f64>,
    pub phone: Option<String>,
    pub alternate_phone: Option<String>,
}

const EMPLOYEE_COLUMNS: &str = "id, tenant_id, name, photo_url, embedding, salary, phone, alternate_phone, created_at, updated_at";

#[derive(Clone, Debug)]
pub struct Employees {
    db: DbPool,
}

impl Employees {
    #[must_use]
    pub const fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub async fn create(&self, new_employee: &NewEmployee) -> Result<Employee, DbError> {
        let sql = format!(
            r"
            INSERT INTO employees (tenant_id, name, photo_url, embedding, salary, phone, alternate_phone, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)
            RETURNING {EMPLOYEE_COLUMNS}
            "
        );
        let employee = sqlx::query_as::<_, Employee>(&sql)
            .bind(new_employee.tenant_id)
            .bind(&new_employee.name)
            .bind(&new_employee.photo_url)
            .bind(Json(&new_employee.embedding))
            .bind(new_employee.salary)
            .bind(&new_employee.phone)
            .bind(&new_employee.alternate_phone)
            .fetch_one(&self.db)
            .await?;
        Ok(employee)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Employee, DbError> {
        let sql = format!("SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE id = ?");
        sqlx::query_as::<_, Employee>(&sql)
            .bind(id)
            .fetch_one(&self.db)
            .await
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => DbError::EmployeeNotFound,
                _ => DbError::OperationFailed(e),
            })
    }

    pub async fn list_by_tenant(&self, tenant_id: i64, limit: i64, offset: i64) -> Result<Vec<Employee>, DbError> {
        let sql = format!(
            "SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE tenant_id = ? ORDER BY id LIMIT ? OFFSET ?"
        );
        let employees = sqlx::query_as::<_, Employee>(&sql)
            .bind(tenant_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.db)
            .await?;
        Ok(employees)
    }

    pub async fn count_by_tenant(&self, tenant_id: i64) -> Result<i64, DbError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM employees WHERE tenant_id = ?")
            .bind(tenant_id)
            .fetch_one(&self.db)
            .await?;
        Ok(count)
    }

    pub async fn update(&self, id: i64, update: &EmployeeUpdate) -> Result<Employee, DbError> {
        let sql = format!(
            r"
            UPDATE employees
            SET name = COALESCE(?, name),
                photo_url = COALESCE(?, photo_url),
                embedding = COALESCE(?, embedding),
                salary = COALESCE(?, salary),
                phone = COALESCE(?, phone),
                alternate_phone = COALESCE(?, alternate_phone),
                updated_at = CURRENT_TIMESTAMP
            WHERE id = ?
            RETURNING {EMPLOYEE_COLUMNS}
            "
        );
        sqlx::query_as::<_, Employee>(&sql)
            .bind(&update.name)
            .bind(&update.photo_url)
            .bind(update.embedding.as_ref().map(Json))
            .bind(update.salary)
            .bind(&update.phone)
            .bind(&update.alternate_phone)
            .bind(id)
            .fetch_one(&self.db)
            .await
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => DbError::EmployeeNotFound,
                _ => DbError::OperationFailed(e),
            })
    }

    /// Deletes the employee; attendance rows go with it through the cascade
    pub async fn delete(&self, id: i64) -> Result<(), DbError> {
        let result = sqlx::query("DELETE FROM employees WHERE id = ?")
            .bind(id)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::EmployeeNotFound);
        }
        Ok(())
    }
}
