use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{FromRow, QueryBuilder, Sqlite};

use crate::core::{DbError, DbPool};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Attendance {
    pub id: i64,
    pub tenant_id: i64,
    pub employee_id: i64,
    pub photo_url: String,
    #[sqlx(json)]
    pub embedding: Vec<f64>,
    pub check_in_time: NaiveDateTime,
    pub check_in_date: NaiveDate,
    pub confidence: Option<f64>, // only populated for PAID tenants
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct NewAttendance {
    pub tenant_id: i64,
    pub employee_id: i64,
    pub photo_url: String,
    pub embedding: Vec<f64>,
    pub check_in_time: NaiveDateTime, // UTC; its date is the idempotency day
    pub confidence: Option<f64>,
}

/// Optional report filters; dates are inclusive UTC calendar days
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AttendanceFilter {
    pub employee_id: Option<i64>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

const ATTENDANCE_COLUMNS: &str = "id, tenant_id, employee_id, photo_url, embedding, check_in_time, check_in_date, confidence, created_at";

#[derive(Clone, Debug)]
pub struct AttendanceRecords {
    db: DbPool,
}

impl AttendanceRecords {
    #[must_use]
    pub const fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Records a check-in unless the employee already has one on the same day.
    ///
    /// The lookup answers the common case. Concurrent check-ins that both pass
    /// it meet at the `(employee_id, check_in_date)` unique constraint: the
    /// insert is a single statement that waits on the write lock, and the loser
    /// inserts nothing and gets `AlreadyCheckedInToday`.
    pub async fn create_once_per_day(&self, new_attendance: &NewAttendance) -> Result<Attendance, DbError> {
        let check_in_date = new_attendance.check_in_time.date();
        let day_start = check_in_date.and_time(NaiveTime::MIN);

        let existing: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM attendance WHERE employee_id = ? AND check_in_time >= ?",
        )
        .bind(new_attendance.employee_id)
        .bind(day_start)
        .fetch_one(&self.db)
        .await?;
        if existing > 0 {
            return Err(DbError::AlreadyCheckedInToday);
        }

        let sql = format!(
            r"
            INSERT INTO attendance (tenant_id, employee_id, photo_url, embedding, check_in_time, check_in_date, confidence, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT (employee_id, check_in_date) DO NOTHING
            RETURNING {ATTENDANCE_COLUMNS}
            "
        );
        sqlx::query_as::<_, Attendance>(&sql)
            .bind(new_attendance.tenant_id)
            .bind(new_attendance.employee_id)
            .bind(&new_attendance.photo_url)
            .bind(Json(&new_attendance.embedding))
            .bind(new_attendance.check_in_time)
            .bind(check_in_date)
            .bind(new_attendance.confidence)
            .fetch_optional(&self.db)
            .await
            .map_err(|e| {
                if matches!(&e, sqlx::Error::Database(db_err) if db_err.is_unique_violation()) {
                    DbError::AlreadyCheckedInToday
                } else {
                    DbError::OperationFailed(e)
                }
            })?
            .ok_or(DbError::AlreadyCheckedInToday)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Attendance, DbError> {
        let sql = format!("SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE id = ?");
        sqlx::query_as::<_, Attendance>(&sql)
            .bind(id)
            .fetch_one(&self.db)
            .await
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => DbError::AttendanceNotFound,
                _ => DbError::OperationFailed(e),
            })
    }

    /// Newest first
    pub async fn list(
        &self,
        tenant_id: i64,
        filter: &AttendanceFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Attendance>, DbError> {
        let mut builder = QueryBuilder::<Sqlite>::new(format!("SELECT {ATTENDANCE_COLUMNS} FROM attendance"));
        push_filter(&mut builder, tenant_id, filter);
        builder
            .push(" ORDER BY check_in_time DESC, id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);
        let records = builder.build_query_as::<Attendance>().fetch_all(&self.db).await?;
        Ok(records)
    }

    pub async fn count(&self, tenant_id: i64, filter: &AttendanceFilter) -> Result<i64, DbError> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM attendance");
        push_filter(&mut builder, tenant_id, filter);
        let count = builder.build_query_scalar::<i64>().fetch_one(&self.db).await?;
        Ok(count)
    }
}

fn push_filter(builder: &mut QueryBuilder<'_, Sqlite>, tenant_id: i64, filter: &AttendanceFilter) {
    builder.push(" WHERE tenant_id = ").push_bind(tenant_id);
    if let Some(employee_id) = filter.employee_id {
        builder.push(" AND employee_id = ").push_bind(employee_id);
    }
    if let Some(from) = filter.from {
        builder.push(" AND check_in_date >= ").push_bind(from);
    }
    if let Some(to) = filter.to {
        builder.push(" AND check_in_date <= ").push_bind(to);
    }
}
