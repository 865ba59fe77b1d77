//! Reminder scheduling and dispatch-side state transitions.

use async_trait::async_trait;
use rand::Rng;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use docket_core::defaults::{DISPATCH_LEASE_SECS, TOKEN_LENGTH};
use docket_core::{
    Error, Reminder, ReminderRepository, ReminderStatus, ReminderType, Result,
};

/// PostgreSQL reminder repository.
pub struct PgReminderRepository {
    pool: Pool<Postgres>,
}

pub(crate) const REMINDER_COLUMNS: &str =
    "id, record_id, recipient_id, reminder_type, cycle_due_date, scheduled_date, token,
     sent_at, confirmed_at, confirmed_by, retry_count, last_error, status,
     created_at, updated_at";

impl PgReminderRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Generate an unguessable confirmation token.
    pub(crate) fn generate_token() -> String {
        const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
        let mut rng = rand::thread_rng();
        (0..TOKEN_LENGTH)
            .map(|_| {
                let idx = rng.gen_range(0..CHARSET.len());
                CHARSET[idx] as char
            })
            .collect()
    }

    pub(crate) fn parse_row(r: &sqlx::postgres::PgRow) -> Result<Reminder> {
        let reminder_type: String = r.get("reminder_type");
        let status: String = r.get("status");
        Ok(Reminder {
            id: r.get("id"),
            record_id: r.get("record_id"),
            recipient_id: r.get("recipient_id"),
            reminder_type: ReminderType::parse(&reminder_type).ok_or_else(|| {
                Error::Internal(format!("unknown reminder type: {}", reminder_type))
            })?,
            cycle_due_date: r.get("cycle_due_date"),
            scheduled_date: r.get("scheduled_date"),
            token: r.get("token"),
            sent_at: r.get("sent_at"),
            confirmed_at: r.get("confirmed_at"),
            confirmed_by: r.get("confirmed_by"),
            retry_count: r.get("retry_count"),
            last_error: r.get("last_error"),
            status: ReminderStatus::parse(&status)
                .ok_or_else(|| Error::Internal(format!("unknown reminder status: {}", status)))?,
            created_at: r.get("created_at"),
            updated_at: r.get("updated_at"),
        })
    }
}

#[async_trait]
impl ReminderRepository for PgReminderRepository {
    async fn schedule_for_record(&self, record_id: Uuid) -> Result<usize> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let record = sqlx::query("SELECT due_date FROM compliance_record WHERE id = $1")
            .bind(record_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(Error::Database)?;
        let due_date: chrono::NaiveDate = match record {
            Some(r) => r.get("due_date"),
            None => {
                return Err(Error::NotFound(format!(
                    "compliance record {} not found",
                    record_id
                )))
            }
        };

        let recipient_rows = sqlx::query(
            "SELECT id FROM compliance_recipient
             WHERE record_id = $1 AND deleted_at IS NULL
             ORDER BY created_at ASC",
        )
        .bind(record_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(Error::Database)?;

        if recipient_rows.is_empty() {
            return Err(Error::NotFound(format!(
                "compliance record {} has no recipients to schedule",
                record_id
            )));
        }

        // One row per (recipient, milestone); the unique cycle index makes
        // re-scheduling a no-op for combinations that already exist.
        let mut created = 0usize;
        for recipient_row in &recipient_rows {
            let recipient_id: Uuid = recipient_row.get("id");
            for reminder_type in ReminderType::ALL {
                let result = sqlx::query(
                    "INSERT INTO compliance_reminder
                        (id, record_id, recipient_id, reminder_type, cycle_due_date,
                         scheduled_date, token, status)
                     VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending')
                     ON CONFLICT (record_id, recipient_id, reminder_type, cycle_due_date)
                     DO NOTHING",
                )
                .bind(Uuid::new_v4())
                .bind(record_id)
                .bind(recipient_id)
                .bind(reminder_type.as_str())
                .bind(due_date)
                .bind(reminder_type.scheduled_for(due_date))
                .bind(Self::generate_token())
                .execute(&mut *tx)
                .await
                .map_err(Error::Database)?;
                created += result.rows_affected() as usize;
            }
        }

        tx.commit().await.map_err(Error::Database)?;
        Ok(created)
    }

    async fn list_for_record(&self, record_id: Uuid) -> Result<Vec<Reminder>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM compliance_reminder
             WHERE record_id = $1
             ORDER BY scheduled_date ASC, created_at ASC",
            REMINDER_COLUMNS
        ))
        .bind(record_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(Self::parse_row).collect()
    }

    async fn get(&self, id: Uuid) -> Result<Option<Reminder>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM compliance_reminder WHERE id = $1",
            REMINDER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.as_ref().map(Self::parse_row).transpose()
    }

    async fn claim_due(&self, limit: i64) -> Result<Vec<Reminder>> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        // FOR UPDATE SKIP LOCKED keeps concurrent dispatch passes from
        // fighting over the same rows; the claim lease covers a dispatcher
        // that dies between claiming and marking the outcome.
        let rows = sqlx::query(&format!(
            "SELECT {} FROM compliance_reminder
             WHERE status = 'pending'
               AND scheduled_date <= CURRENT_DATE
               AND (claimed_at IS NULL OR claimed_at < now() - make_interval(secs => $2))
             ORDER BY scheduled_date ASC, created_at ASC
             LIMIT $1
             FOR UPDATE SKIP LOCKED",
            REMINDER_COLUMNS
        ))
        .bind(limit)
        .bind(DISPATCH_LEASE_SECS as f64)
        .fetch_all(&mut *tx)
        .await
        .map_err(Error::Database)?;

        let reminders: Vec<Reminder> = rows
            .iter()
            .map(Self::parse_row)
            .collect::<Result<Vec<_>>>()?;

        if !reminders.is_empty() {
            let ids: Vec<Uuid> = reminders.iter().map(|r| r.id).collect();
            sqlx::query(
                "UPDATE compliance_reminder SET claimed_at = now(), updated_at = now()
                 WHERE id = ANY($1)",
            )
            .bind(&ids)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        }

        tx.commit().await.map_err(Error::Database)?;
        Ok(reminders)
    }

    async fn mark_sent(&self, id: Uuid) -> Result<()> {
        // Guarded on pending: a reminder cancelled mid-flight stays cancelled.
        sqlx::query(
            "UPDATE compliance_reminder
             SET status = 'sent', sent_at = now(), claimed_at = NULL, updated_at = now()
             WHERE id = $1 AND status = 'pending'",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn mark_send_failure(
        &self,
        id: Uuid,
        error: &str,
        max_retries: i32,
    ) -> Result<ReminderStatus> {
        // The claim lease is left in place: it doubles as the backoff
        // window before the next attempt.
        let row = sqlx::query(
            "UPDATE compliance_reminder
             SET retry_count = retry_count + 1,
                 last_error = $2,
                 status = CASE WHEN retry_count + 1 >= $3 THEN 'failed' ELSE 'pending' END,
                 updated_at = now()
             WHERE id = $1 AND status = 'pending'
             RETURNING status",
        )
        .bind(id)
        .bind(error)
        .bind(max_retries)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        match row {
            Some(r) => {
                let status: String = r.get("status");
                ReminderStatus::parse(&status)
                    .ok_or_else(|| Error::Internal(format!("unknown reminder status: {}", status)))
            }
            // Cancelled mid-flight; nothing left to retry.
            None => Ok(ReminderStatus::Cancelled),
        }
    }
}
