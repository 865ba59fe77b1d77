//! Recipient registry repository.
//!
//! Removal is a soft delete: the tombstone keeps recipient context
//! resolvable for reminders that were already sent or confirmed, and makes
//! the remove operation idempotent at the contract level.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use docket_core::{
    CreateRecipientRequest, Error, Recipient, RecipientProvenance, RecipientRepository, Result,
};

/// PostgreSQL recipient repository.
pub struct PgRecipientRepository {
    pool: Pool<Postgres>,
}

impl PgRecipientRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub(crate) fn parse_row(r: &sqlx::postgres::PgRow) -> Recipient {
        let user_id: Option<Uuid> = r.get("user_id");
        let external_user_id: Option<Uuid> = r.get("external_user_id");
        Recipient {
            id: r.get("id"),
            record_id: r.get("record_id"),
            user_id,
            external_user_id,
            email: r.get("email"),
            name: r.get("name"),
            role: r.get("role"),
            provenance: RecipientProvenance::classify(user_id, external_user_id),
            created_at: r.get("created_at"),
        }
    }

    async fn record_exists(&self, record_id: Uuid) -> Result<bool> {
        let row = sqlx::query("SELECT EXISTS(SELECT 1 FROM compliance_record WHERE id = $1) AS found")
            .bind(record_id)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(row.get("found"))
    }
}

const RECIPIENT_COLUMNS: &str =
    "id, record_id, user_id, external_user_id, email, name, role, created_at";

#[async_trait]
impl RecipientRepository for PgRecipientRepository {
    async fn add(&self, record_id: Uuid, req: CreateRecipientRequest) -> Result<Uuid> {
        req.validate()?;
        if !self.record_exists(record_id).await? {
            return Err(Error::NotFound(format!(
                "compliance record {} not found",
                record_id
            )));
        }

        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO compliance_recipient
                (id, record_id, user_id, external_user_id, email, name, role, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(id)
        .bind(record_id)
        .bind(req.user_id)
        .bind(req.external_user_id)
        .bind(req.email.trim())
        .bind(req.name.trim())
        .bind(req.role.trim())
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(id)
    }

    async fn list_for_record(&self, record_id: Uuid) -> Result<Vec<Recipient>> {
        if !self.record_exists(record_id).await? {
            return Err(Error::NotFound(format!(
                "compliance record {} not found",
                record_id
            )));
        }

        let rows = sqlx::query(&format!(
            "SELECT {} FROM compliance_recipient
             WHERE record_id = $1 AND deleted_at IS NULL
             ORDER BY created_at ASC",
            RECIPIENT_COLUMNS
        ))
        .bind(record_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.iter().map(Self::parse_row).collect())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Recipient>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM compliance_recipient WHERE id = $1",
            RECIPIENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.as_ref().map(Self::parse_row))
    }

    async fn remove(&self, id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        // Tombstone the recipient; a second remove matches zero rows and
        // that is fine.
        sqlx::query(
            "UPDATE compliance_recipient SET deleted_at = now()
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        // Orphaned reminders must never be dispatched.
        sqlx::query(
            "UPDATE compliance_reminder
             SET status = 'cancelled', updated_at = now()
             WHERE recipient_id = $1 AND status = 'pending'",
        )
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    }
}
