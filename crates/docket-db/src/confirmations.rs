//! Public confirmation gateway repository.
//!
//! The token is a bearer capability: it grants the confirm-this-reminder
//! action, exactly once, to whoever holds the emailed link. Unknown,
//! not-yet-sent, and already-consumed tokens are indistinguishable through
//! this interface.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use docket_core::{
    Confirmation, ConfirmationContext, ConfirmationRepository, ConfirmationType, ConfirmRequest,
    Error, RecurrenceFrequency, Result,
};

use crate::recipients::PgRecipientRepository;
use crate::records::PgRecordRepository;
use crate::reminders::{PgReminderRepository, REMINDER_COLUMNS};

/// PostgreSQL confirmation repository.
pub struct PgConfirmationRepository {
    pool: Pool<Postgres>,
}

impl PgConfirmationRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_row(r: &sqlx::postgres::PgRow) -> Result<Confirmation> {
        let confirmation_type: String = r.get("confirmation_type");
        Ok(Confirmation {
            id: r.get("id"),
            record_id: r.get("record_id"),
            reminder_id: r.get("reminder_id"),
            confirmed_by: r.get("confirmed_by"),
            confirmed_email: r.get("confirmed_email"),
            confirmation_type: ConfirmationType::parse(&confirmation_type).ok_or_else(|| {
                Error::Internal(format!("unknown confirmation type: {}", confirmation_type))
            })?,
            notes: r.get("notes"),
            confirmed_at: r.get("confirmed_at"),
        })
    }

    fn invalid_token() -> Error {
        // One message for every failure mode; the caller learns nothing
        // about which it was.
        Error::NotFound("confirmation link is invalid or expired".to_string())
    }
}

const CONFIRMATION_COLUMNS: &str =
    "id, record_id, reminder_id, confirmed_by, confirmed_email, confirmation_type, notes, confirmed_at";

#[async_trait]
impl ConfirmationRepository for PgConfirmationRepository {
    async fn resolve_token(&self, token: &str) -> Result<Option<ConfirmationContext>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM compliance_reminder WHERE token = $1 AND status = 'sent'",
            REMINDER_COLUMNS
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        let reminder = match row {
            Some(ref r) => PgReminderRepository::parse_row(r)?,
            None => return Ok(None),
        };

        let record_row = sqlx::query(
            "SELECT id, name, description, due_date, frequency, last_confirmed_at,
                    created_at, updated_at
             FROM compliance_record WHERE id = $1",
        )
        .bind(reminder.record_id)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;
        let record = PgRecordRepository::parse_row(&record_row)?;

        let recipient_row = sqlx::query(
            "SELECT id, record_id, user_id, external_user_id, email, name, role, created_at
             FROM compliance_recipient WHERE id = $1",
        )
        .bind(reminder.recipient_id)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;
        let recipient = PgRecipientRepository::parse_row(&recipient_row);

        Ok(Some(ConfirmationContext {
            reminder,
            record,
            recipient,
        }))
    }

    async fn confirm(&self, token: &str, req: ConfirmRequest) -> Result<Confirmation> {
        req.validate()?;

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        // The guard on status = 'sent' makes consumption atomic: a second
        // submission against the same token matches zero rows.
        let claimed = sqlx::query(
            "UPDATE compliance_reminder
             SET status = 'confirmed', confirmed_at = now(), confirmed_by = $2,
                 claimed_at = NULL, updated_at = now()
             WHERE token = $1 AND status = 'sent'
             RETURNING id, record_id, cycle_due_date, confirmed_at",
        )
        .bind(token)
        .bind(req.confirmed_by.trim())
        .fetch_optional(&mut *tx)
        .await
        .map_err(Error::Database)?;

        let claimed = claimed.ok_or_else(Self::invalid_token)?;
        let reminder_id: Uuid = claimed.get("id");
        let record_id: Uuid = claimed.get("record_id");
        let cycle_due_date: NaiveDate = claimed.get("cycle_due_date");
        let confirmed_at: DateTime<Utc> = claimed.get("confirmed_at");

        let confirmation_id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO compliance_confirmation
                (id, record_id, reminder_id, confirmed_by, confirmed_email,
                 confirmation_type, notes, confirmed_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(confirmation_id)
        .bind(record_id)
        .bind(reminder_id)
        .bind(req.confirmed_by.trim())
        .bind(req.confirmed_email.trim())
        .bind(req.confirmation_type.as_str())
        .bind(&req.notes)
        .bind(confirmed_at)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        // The cycle is settled; stop nagging its other recipients.
        sqlx::query(
            "UPDATE compliance_reminder
             SET status = 'cancelled', updated_at = now()
             WHERE record_id = $1 AND cycle_due_date = $2 AND id != $3
               AND status IN ('pending', 'sent')",
        )
        .bind(record_id)
        .bind(cycle_due_date)
        .bind(reminder_id)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        let record_row = sqlx::query(
            "SELECT due_date, frequency FROM compliance_record WHERE id = $1 FOR UPDATE",
        )
        .bind(record_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(Error::Database)?;
        let due_date: NaiveDate = record_row.get("due_date");
        let frequency_tag: String = record_row.get("frequency");
        let frequency = RecurrenceFrequency::parse(&frequency_tag).ok_or_else(|| {
            Error::Internal(format!("unknown recurrence frequency: {}", frequency_tag))
        })?;

        // Advance only when this confirmation settles the record's current
        // cycle; a late confirmation of a stale cycle must not push the
        // already-advanced due date further out.
        if req.confirmation_type.advances_due_date() && due_date == cycle_due_date {
            sqlx::query(
                "UPDATE compliance_record
                 SET due_date = $2, last_confirmed_at = $3, updated_at = now()
                 WHERE id = $1",
            )
            .bind(record_id)
            .bind(frequency.advance(due_date))
            .bind(confirmed_at)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        } else {
            sqlx::query(
                "UPDATE compliance_record
                 SET last_confirmed_at = $2, updated_at = now()
                 WHERE id = $1",
            )
            .bind(record_id)
            .bind(confirmed_at)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        }

        tx.commit().await.map_err(Error::Database)?;

        Ok(Confirmation {
            id: confirmation_id,
            record_id,
            reminder_id,
            confirmed_by: req.confirmed_by.trim().to_string(),
            confirmed_email: req.confirmed_email.trim().to_string(),
            confirmation_type: req.confirmation_type,
            notes: req.notes,
            confirmed_at,
        })
    }

    async fn list_for_record(&self, record_id: Uuid) -> Result<Vec<Confirmation>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM compliance_confirmation
             WHERE record_id = $1
             ORDER BY confirmed_at DESC",
            CONFIRMATION_COLUMNS
        ))
        .bind(record_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(Self::parse_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{
        connect_test_db, create_record_due_in, sent_reminder_token, test_confirm_request,
        test_recipient_request,
    };
    use docket_core::{
        RecipientRepository, RecordRepository, ReminderRepository, ReminderStatus,
    };

    #[tokio::test]
    async fn test_resolve_unknown_token_is_none() {
        let db = connect_test_db().await;
        let resolved = db
            .confirmations
            .resolve_token("definitely-not-a-real-token-000000000000000000")
            .await
            .unwrap();
        assert!(resolved.is_none());
    }

    #[tokio::test]
    async fn test_unsent_token_does_not_resolve() {
        let db = connect_test_db().await;
        let record_id = create_record_due_in(&db, 30).await;
        db.recipients
            .add(record_id, test_recipient_request("Jane Doe", "jane@example.com"))
            .await
            .unwrap();
        db.reminders.schedule_for_record(record_id).await.unwrap();

        // Token exists but the reminder was never dispatched.
        let reminder = &db.reminders.list_for_record(record_id).await.unwrap()[0];
        let resolved = db.confirmations.resolve_token(&reminder.token).await.unwrap();
        assert!(resolved.is_none());
    }

    #[tokio::test]
    async fn test_sent_token_resolves_full_context() {
        let db = connect_test_db().await;
        let record_id = create_record_due_in(&db, 30).await;
        let recipient_id = db
            .recipients
            .add(record_id, test_recipient_request("Jane Doe", "jane@example.com"))
            .await
            .unwrap();
        let token = sent_reminder_token(&db, record_id).await;

        let ctx = db
            .confirmations
            .resolve_token(&token)
            .await
            .unwrap()
            .expect("sent token should resolve");
        assert_eq!(ctx.record.id, record_id);
        assert_eq!(ctx.recipient.id, recipient_id);
        assert_eq!(ctx.reminder.status, ReminderStatus::Sent);
    }

    #[tokio::test]
    async fn test_confirm_is_exactly_once() {
        let db = connect_test_db().await;
        let record_id = create_record_due_in(&db, 30).await;
        db.recipients
            .add(record_id, test_recipient_request("Jane Doe", "jane@example.com"))
            .await
            .unwrap();
        let token = sent_reminder_token(&db, record_id).await;

        let confirmation = db
            .confirmations
            .confirm(&token, test_confirm_request(ConfirmationType::Renewed))
            .await
            .unwrap();
        assert_eq!(confirmation.record_id, record_id);
        assert_eq!(confirmation.confirmation_type, ConfirmationType::Renewed);

        // Second submission against the same token is rejected, and no
        // duplicate confirmation row appears.
        let err = db
            .confirmations
            .confirm(&token, test_confirm_request(ConfirmationType::Renewed))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        let confirmations = db.confirmations.list_for_record(record_id).await.unwrap();
        assert_eq!(confirmations.len(), 1);
    }

    #[tokio::test]
    async fn test_consumed_token_no_longer_resolves() {
        let db = connect_test_db().await;
        let record_id = create_record_due_in(&db, 30).await;
        db.recipients
            .add(record_id, test_recipient_request("Jane Doe", "jane@example.com"))
            .await
            .unwrap();
        let token = sent_reminder_token(&db, record_id).await;

        db.confirmations
            .confirm(&token, test_confirm_request(ConfirmationType::Completed))
            .await
            .unwrap();

        // Consumed and unknown tokens answer identically.
        assert!(db.confirmations.resolve_token(&token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_confirm_supersedes_cycle_siblings() {
        let db = connect_test_db().await;
        let record_id = create_record_due_in(&db, 30).await;
        db.recipients
            .add(record_id, test_recipient_request("Jane Doe", "jane@example.com"))
            .await
            .unwrap();
        db.recipients
            .add(record_id, test_recipient_request("Sam Roe", "sam@example.com"))
            .await
            .unwrap();
        let token = sent_reminder_token(&db, record_id).await;

        db.confirmations
            .confirm(&token, test_confirm_request(ConfirmationType::Renewed))
            .await
            .unwrap();

        let reminders = db.reminders.list_for_record(record_id).await.unwrap();
        let confirmed = reminders
            .iter()
            .filter(|r| r.status == ReminderStatus::Confirmed)
            .count();
        assert_eq!(confirmed, 1);
        assert!(reminders
            .iter()
            .filter(|r| r.status != ReminderStatus::Confirmed)
            .all(|r| r.status == ReminderStatus::Cancelled));
    }

    #[tokio::test]
    async fn test_advancing_confirmation_moves_due_date() {
        let db = connect_test_db().await;
        let record_id = create_record_due_in(&db, 30).await;
        db.recipients
            .add(record_id, test_recipient_request("Jane Doe", "jane@example.com"))
            .await
            .unwrap();
        let before = db.records.get(record_id).await.unwrap().unwrap();
        let token = sent_reminder_token(&db, record_id).await;

        db.confirmations
            .confirm(&token, test_confirm_request(ConfirmationType::Renewed))
            .await
            .unwrap();

        let after = db.records.get(record_id).await.unwrap().unwrap();
        assert_eq!(after.due_date, before.frequency.advance(before.due_date));
        assert!(after.last_confirmed_at.is_some());
    }

    #[tokio::test]
    async fn test_submitted_confirmation_keeps_due_date() {
        let db = connect_test_db().await;
        let record_id = create_record_due_in(&db, 30).await;
        db.recipients
            .add(record_id, test_recipient_request("Jane Doe", "jane@example.com"))
            .await
            .unwrap();
        let before = db.records.get(record_id).await.unwrap().unwrap();
        let token = sent_reminder_token(&db, record_id).await;

        db.confirmations
            .confirm(&token, test_confirm_request(ConfirmationType::Submitted))
            .await
            .unwrap();

        let after = db.records.get(record_id).await.unwrap().unwrap();
        assert_eq!(after.due_date, before.due_date);
        assert!(after.last_confirmed_at.is_some());
    }

    #[tokio::test]
    async fn test_confirm_rejects_empty_fields_before_touching_state() {
        let db = connect_test_db().await;
        let record_id = create_record_due_in(&db, 30).await;
        db.recipients
            .add(record_id, test_recipient_request("Jane Doe", "jane@example.com"))
            .await
            .unwrap();
        let token = sent_reminder_token(&db, record_id).await;

        let mut req = test_confirm_request(ConfirmationType::Renewed);
        req.confirmed_by = "".to_string();
        let err = db.confirmations.confirm(&token, req).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        // The token survived the rejected submission.
        assert!(db.confirmations.resolve_token(&token).await.unwrap().is_some());
    }
}
