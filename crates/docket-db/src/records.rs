//! Compliance record repository.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use docket_core::{
    ComplianceRecord, CreateRecordRequest, Error, RecordRepository, RecurrenceFrequency, Result,
};

/// PostgreSQL compliance record repository.
pub struct PgRecordRepository {
    pool: Pool<Postgres>,
}

impl PgRecordRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub(crate) fn parse_row(r: &sqlx::postgres::PgRow) -> Result<ComplianceRecord> {
        let frequency: String = r.get("frequency");
        Ok(ComplianceRecord {
            id: r.get("id"),
            name: r.get("name"),
            description: r.get("description"),
            due_date: r.get("due_date"),
            frequency: RecurrenceFrequency::parse(&frequency).ok_or_else(|| {
                Error::Internal(format!("unknown recurrence frequency: {}", frequency))
            })?,
            last_confirmed_at: r.get("last_confirmed_at"),
            created_at: r.get("created_at"),
            updated_at: r.get("updated_at"),
        })
    }
}

const RECORD_COLUMNS: &str =
    "id, name, description, due_date, frequency, last_confirmed_at, created_at, updated_at";

#[async_trait]
impl RecordRepository for PgRecordRepository {
    async fn create(&self, req: CreateRecordRequest) -> Result<Uuid> {
        req.validate()?;
        let id = Uuid::new_v4();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO compliance_record (id, name, description, due_date, frequency, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $6)",
        )
        .bind(id)
        .bind(req.name.trim())
        .bind(&req.description)
        .bind(req.due_date)
        .bind(req.frequency.as_str())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(id)
    }

    async fn get(&self, id: Uuid) -> Result<Option<ComplianceRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM compliance_record WHERE id = $1",
            RECORD_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.as_ref().map(Self::parse_row).transpose()
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<ComplianceRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM compliance_record ORDER BY created_at DESC LIMIT $1 OFFSET $2",
            RECORD_COLUMNS
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(Self::parse_row).collect()
    }

    async fn count(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM compliance_record")
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(row.get("count"))
    }

    async fn exists(&self, id: Uuid) -> Result<bool> {
        let row = sqlx::query("SELECT EXISTS(SELECT 1 FROM compliance_record WHERE id = $1) AS found")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(row.get("found"))
    }
}
