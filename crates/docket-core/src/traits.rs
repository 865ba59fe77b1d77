//! Repository and collaborator trait definitions.
//!
//! The database layer provides PostgreSQL implementations of the repository
//! traits; the dispatcher provides mailer implementations. Keeping the
//! traits here lets tests substitute mocks at every seam.

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{
    ComplianceRecord, Confirmation, ConfirmationContext, ConfirmRequest, CreateRecipientRequest,
    CreateRecordRequest, Recipient, Reminder, ReminderStatus,
};
use crate::Result;

/// Compliance record persistence.
#[async_trait]
pub trait RecordRepository: Send + Sync {
    /// Create a record and return its id.
    async fn create(&self, req: CreateRecordRequest) -> Result<Uuid>;

    /// Fetch a record by id.
    async fn get(&self, id: Uuid) -> Result<Option<ComplianceRecord>>;

    /// List records, newest first.
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<ComplianceRecord>>;

    /// Total record count (for pagination metadata).
    async fn count(&self) -> Result<i64>;

    /// Cheap existence check.
    async fn exists(&self, id: Uuid) -> Result<bool>;
}

/// Recipient registry persistence.
#[async_trait]
pub trait RecipientRepository: Send + Sync {
    /// Add a recipient to a record. Fails with `NotFound` if the record
    /// does not exist.
    async fn add(&self, record_id: Uuid, req: CreateRecipientRequest) -> Result<Uuid>;

    /// List a record's current recipients, ordered by creation. Fails with
    /// `NotFound` if the record does not exist.
    async fn list_for_record(&self, record_id: Uuid) -> Result<Vec<Recipient>>;

    /// Fetch a single recipient, removed or not.
    async fn get(&self, id: Uuid) -> Result<Option<Recipient>>;

    /// Remove a recipient. Idempotent: removing an already-removed or
    /// unknown recipient succeeds. Still-pending reminders for the
    /// recipient are cancelled.
    async fn remove(&self, id: Uuid) -> Result<()>;
}

/// Reminder scheduling and dispatch-side state transitions.
#[async_trait]
pub trait ReminderRepository: Send + Sync {
    /// Materialize pending reminders for every current recipient of the
    /// record, one per milestone against the record's current due date.
    /// Idempotent per (record, recipient, milestone, cycle due date).
    /// Returns the number of newly created reminders. Fails with `NotFound`
    /// if the record does not exist or has no recipients.
    async fn schedule_for_record(&self, record_id: Uuid) -> Result<usize>;

    /// List a record's reminders, oldest milestone first.
    async fn list_for_record(&self, record_id: Uuid) -> Result<Vec<Reminder>>;

    /// Fetch a single reminder.
    async fn get(&self, id: Uuid) -> Result<Option<Reminder>>;

    /// Atomically claim up to `limit` due pending reminders for dispatch.
    /// Claimed rows are locked against concurrent dispatchers.
    async fn claim_due(&self, limit: i64) -> Result<Vec<Reminder>>;

    /// Mark a pending reminder sent; its token becomes live.
    async fn mark_sent(&self, id: Uuid) -> Result<()>;

    /// Record a failed send attempt. The reminder stays pending until
    /// `max_retries` attempts are exhausted, then becomes failed.
    /// Returns the resulting status.
    async fn mark_send_failure(
        &self,
        id: Uuid,
        error: &str,
        max_retries: i32,
    ) -> Result<ReminderStatus>;
}

/// Public confirmation gateway persistence.
#[async_trait]
pub trait ConfirmationRepository: Send + Sync {
    /// Exchange a token for its reminder, record, and recipient context.
    /// Only resolves while the reminder is sent; unknown, unsent, and
    /// consumed tokens all return `None`.
    async fn resolve_token(&self, token: &str) -> Result<Option<ConfirmationContext>>;

    /// Consume a token: exactly-once confirmation of its reminder, sibling
    /// supersession for the cycle, and due-date advancement when the
    /// confirmation type calls for it. Fails with `NotFound` for unknown
    /// or already-consumed tokens.
    async fn confirm(&self, token: &str, req: ConfirmRequest) -> Result<Confirmation>;

    /// List confirmations recorded for a record, newest first.
    async fn list_for_record(&self, record_id: Uuid) -> Result<Vec<Confirmation>>;
}

/// An email ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub to_name: String,
    pub subject: String,
    pub text_body: String,
}

/// Outbound mail delivery.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver one message. An `Err` counts as a failed send attempt
    /// against the reminder's retry budget.
    async fn send(&self, message: &EmailMessage) -> Result<()>;
}
