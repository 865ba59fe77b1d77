//! Core data models for docket.
//!
//! Entities follow the ownership chain: a [`ComplianceRecord`] owns its
//! [`Recipient`]s and [`Reminder`]s; each reminder owns at most one
//! [`Confirmation`].

use chrono::{DateTime, Duration, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::validate;
use crate::{Error, Result};

// =============================================================================
// COMPLIANCE RECORDS
// =============================================================================

/// How often a compliance obligation recurs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecurrenceFrequency {
    Monthly,
    Quarterly,
    Annual,
}

impl RecurrenceFrequency {
    /// String tag stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecurrenceFrequency::Monthly => "monthly",
            RecurrenceFrequency::Quarterly => "quarterly",
            RecurrenceFrequency::Annual => "annual",
        }
    }

    /// Parse a database tag back into a frequency.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "monthly" => Some(RecurrenceFrequency::Monthly),
            "quarterly" => Some(RecurrenceFrequency::Quarterly),
            "annual" => Some(RecurrenceFrequency::Annual),
            _ => None,
        }
    }

    /// Advance a due date by one recurrence interval.
    ///
    /// Month-end dates clamp the way calendars do (Jan 31 + 1 month = Feb 28/29).
    pub fn advance(&self, due: NaiveDate) -> NaiveDate {
        let months = match self {
            RecurrenceFrequency::Monthly => 1,
            RecurrenceFrequency::Quarterly => 3,
            RecurrenceFrequency::Annual => 12,
        };
        due.checked_add_months(Months::new(months)).unwrap_or(due)
    }
}

/// A named compliance obligation with a recurring due date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceRecord {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// Due date of the current cycle. Advances when a confirmation of an
    /// advancing type is recorded.
    pub due_date: NaiveDate,
    pub frequency: RecurrenceFrequency,
    pub last_confirmed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for creating a compliance record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRecordRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub due_date: NaiveDate,
    pub frequency: RecurrenceFrequency,
}

impl CreateRecordRequest {
    /// Validate before any database work.
    pub fn validate(&self) -> Result<()> {
        validate::require_non_empty("name", &self.name)
    }
}

// =============================================================================
// RECIPIENTS
// =============================================================================

/// Where a recipient's contact details came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecipientProvenance {
    /// References an internal user account.
    Internal,
    /// References an external contact.
    External,
    /// Entered by hand, no user reference.
    #[default]
    Manual,
}

impl RecipientProvenance {
    /// Classify provenance from the user references present.
    ///
    /// Both references set is rejected at validation time, so the internal
    /// reference winning here is unreachable through the public contract.
    pub fn classify(user_id: Option<Uuid>, external_user_id: Option<Uuid>) -> Self {
        match (user_id, external_user_id) {
            (Some(_), _) => RecipientProvenance::Internal,
            (None, Some(_)) => RecipientProvenance::External,
            (None, None) => RecipientProvenance::Manual,
        }
    }
}

/// A notification target for one compliance record.
///
/// Email and name are always populated regardless of provenance; for
/// referenced users they are copied at add time rather than joined live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipient {
    pub id: Uuid,
    pub record_id: Uuid,
    pub user_id: Option<Uuid>,
    pub external_user_id: Option<Uuid>,
    pub email: String,
    pub name: String,
    /// Free-form role tag; "primary" | "secondary" | "cc" by convention.
    pub role: String,
    #[serde(default)]
    pub provenance: RecipientProvenance,
    pub created_at: DateTime<Utc>,
}

fn default_role() -> String {
    "primary".to_string()
}

/// Request body for adding a recipient to a compliance record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRecipientRequest {
    pub email: String,
    pub name: String,
    #[serde(default = "default_role")]
    pub role: String,
    #[serde(default)]
    pub user_id: Option<Uuid>,
    #[serde(default)]
    pub external_user_id: Option<Uuid>,
}

impl CreateRecipientRequest {
    /// Validate before any database work.
    ///
    /// Supplying both user references makes provenance ambiguous and is
    /// rejected outright.
    pub fn validate(&self) -> Result<()> {
        validate::require_non_empty("name", &self.name)?;
        validate::validate_email(&self.email)?;
        if self.user_id.is_some() && self.external_user_id.is_some() {
            return Err(Error::Validation(
                "at most one of user_id and external_user_id may be set".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// REMINDERS
// =============================================================================

/// Milestone a reminder fires at, relative to the cycle due date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderType {
    TwoWeeks,
    OneWeek,
    DueDate,
    Overdue,
}

impl ReminderType {
    /// Every milestone, in firing order.
    pub const ALL: [ReminderType; 4] = [
        ReminderType::TwoWeeks,
        ReminderType::OneWeek,
        ReminderType::DueDate,
        ReminderType::Overdue,
    ];

    /// String tag stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderType::TwoWeeks => "two_weeks",
            ReminderType::OneWeek => "one_week",
            ReminderType::DueDate => "due_date",
            ReminderType::Overdue => "overdue",
        }
    }

    /// Parse a database tag back into a milestone.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "two_weeks" => Some(ReminderType::TwoWeeks),
            "one_week" => Some(ReminderType::OneWeek),
            "due_date" => Some(ReminderType::DueDate),
            "overdue" => Some(ReminderType::Overdue),
            _ => None,
        }
    }

    /// The calendar date this milestone fires for a given cycle due date.
    pub fn scheduled_for(&self, due: NaiveDate) -> NaiveDate {
        match self {
            ReminderType::TwoWeeks => due - Duration::days(14),
            ReminderType::OneWeek => due - Duration::days(7),
            ReminderType::DueDate => due,
            ReminderType::Overdue => due + Duration::days(crate::defaults::OVERDUE_GRACE_DAYS),
        }
    }
}

/// Lifecycle state of a scheduled reminder.
///
/// `pending → sent → confirmed` is the happy path. `failed` is reached when
/// dispatch retries are exhausted. `cancelled` covers the two invalidation
/// paths: orphaned by recipient removal, or superseded because the cycle was
/// confirmed through a sibling reminder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderStatus {
    Pending,
    Sent,
    Confirmed,
    Failed,
    Cancelled,
}

impl ReminderStatus {
    /// String tag stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderStatus::Pending => "pending",
            ReminderStatus::Sent => "sent",
            ReminderStatus::Confirmed => "confirmed",
            ReminderStatus::Failed => "failed",
            ReminderStatus::Cancelled => "cancelled",
        }
    }

    /// Parse a database tag back into a status.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ReminderStatus::Pending),
            "sent" => Some(ReminderStatus::Sent),
            "confirmed" => Some(ReminderStatus::Confirmed),
            "failed" => Some(ReminderStatus::Failed),
            "cancelled" => Some(ReminderStatus::Cancelled),
            _ => None,
        }
    }

    /// Whether no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReminderStatus::Confirmed | ReminderStatus::Failed | ReminderStatus::Cancelled
        )
    }
}

/// One scheduled notification instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reminder {
    pub id: Uuid,
    pub record_id: Uuid,
    pub recipient_id: Uuid,
    pub reminder_type: ReminderType,
    /// The record's due date when this reminder was scheduled. Idempotence
    /// and sibling supersession are scoped to this value.
    pub cycle_due_date: NaiveDate,
    pub scheduled_date: NaiveDate,
    /// Bearer capability for the public confirmation link. Never serialized;
    /// only the emailed link carries it.
    #[serde(skip_serializing, default)]
    pub token: String,
    pub sent_at: Option<DateTime<Utc>>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub confirmed_by: Option<String>,
    pub retry_count: i32,
    pub last_error: Option<String>,
    pub status: ReminderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// CONFIRMATIONS
// =============================================================================

/// What kind of completion a confirmation records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfirmationType {
    Submitted,
    Renewed,
    Extended,
    Completed,
}

impl ConfirmationType {
    /// String tag stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfirmationType::Submitted => "submitted",
            ConfirmationType::Renewed => "renewed",
            ConfirmationType::Extended => "extended",
            ConfirmationType::Completed => "completed",
        }
    }

    /// Parse a database tag back into a confirmation type.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "submitted" => Some(ConfirmationType::Submitted),
            "renewed" => Some(ConfirmationType::Renewed),
            "extended" => Some(ConfirmationType::Extended),
            "completed" => Some(ConfirmationType::Completed),
            _ => None,
        }
    }

    /// Whether recording this confirmation advances the record's due date
    /// into the next cycle.
    pub fn advances_due_date(&self) -> bool {
        !matches!(self, ConfirmationType::Submitted)
    }
}

/// Immutable record of a completed confirmation action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Confirmation {
    pub id: Uuid,
    pub record_id: Uuid,
    pub reminder_id: Uuid,
    pub confirmed_by: String,
    pub confirmed_email: String,
    pub confirmation_type: ConfirmationType,
    pub notes: Option<String>,
    pub confirmed_at: DateTime<Utc>,
}

/// Request body for submitting a confirmation against a token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmRequest {
    pub confirmed_by: String,
    pub confirmed_email: String,
    pub confirmation_type: ConfirmationType,
    #[serde(default)]
    pub notes: Option<String>,
}

impl ConfirmRequest {
    /// Validate before any database work.
    pub fn validate(&self) -> Result<()> {
        validate::require_non_empty("confirmed_by", &self.confirmed_by)?;
        validate::validate_email(&self.confirmed_email)
    }
}

/// Everything a recipient sees when their token resolves: the reminder,
/// the obligation it nags about, and who it was addressed to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmationContext {
    pub reminder: Reminder,
    pub record: ComplianceRecord,
    pub recipient: Recipient,
}

// =============================================================================
// DISPATCH
// =============================================================================

/// Outcome of one dispatcher pass over due reminders.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DispatchSummary {
    /// Reminders claimed as due this pass.
    pub claimed: usize,
    /// Emails handed to the mailer successfully.
    pub sent: usize,
    /// Send attempts that failed (reminder retried or marked failed).
    pub failed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_milestone_offsets() {
        let due = date(2026, 9, 30);
        assert_eq!(ReminderType::TwoWeeks.scheduled_for(due), date(2026, 9, 16));
        assert_eq!(ReminderType::OneWeek.scheduled_for(due), date(2026, 9, 23));
        assert_eq!(ReminderType::DueDate.scheduled_for(due), due);
        assert_eq!(ReminderType::Overdue.scheduled_for(due), date(2026, 10, 7));
    }

    #[test]
    fn test_milestone_order_matches_firing_order() {
        let due = date(2026, 3, 15);
        let dates: Vec<NaiveDate> = ReminderType::ALL
            .iter()
            .map(|t| t.scheduled_for(due))
            .collect();
        let mut sorted = dates.clone();
        sorted.sort();
        assert_eq!(dates, sorted);
    }

    #[test]
    fn test_frequency_advance() {
        let due = date(2026, 1, 15);
        assert_eq!(
            RecurrenceFrequency::Monthly.advance(due),
            date(2026, 2, 15)
        );
        assert_eq!(
            RecurrenceFrequency::Quarterly.advance(due),
            date(2026, 4, 15)
        );
        assert_eq!(RecurrenceFrequency::Annual.advance(due), date(2027, 1, 15));
    }

    #[test]
    fn test_frequency_advance_clamps_month_end() {
        // Jan 31 + 1 month lands on the last day of February
        assert_eq!(
            RecurrenceFrequency::Monthly.advance(date(2026, 1, 31)),
            date(2026, 2, 28)
        );
        assert_eq!(
            RecurrenceFrequency::Monthly.advance(date(2028, 1, 31)),
            date(2028, 2, 29)
        );
    }

    #[test]
    fn test_provenance_classification() {
        let uid = Uuid::new_v4();
        assert_eq!(
            RecipientProvenance::classify(Some(uid), None),
            RecipientProvenance::Internal
        );
        assert_eq!(
            RecipientProvenance::classify(None, Some(uid)),
            RecipientProvenance::External
        );
        assert_eq!(
            RecipientProvenance::classify(None, None),
            RecipientProvenance::Manual
        );
    }

    #[test]
    fn test_recipient_request_rejects_both_user_refs() {
        let req = CreateRecipientRequest {
            email: "jane@example.com".to_string(),
            name: "Jane Doe".to_string(),
            role: "primary".to_string(),
            user_id: Some(Uuid::new_v4()),
            external_user_id: Some(Uuid::new_v4()),
        };
        assert!(matches!(req.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn test_recipient_request_rejects_empty_fields() {
        let req = CreateRecipientRequest {
            email: "".to_string(),
            name: "Jane Doe".to_string(),
            role: "primary".to_string(),
            user_id: None,
            external_user_id: None,
        };
        assert!(req.validate().is_err());

        let req = CreateRecipientRequest {
            email: "jane@example.com".to_string(),
            name: "  ".to_string(),
            role: "primary".to_string(),
            user_id: None,
            external_user_id: None,
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_confirm_request_validation() {
        let req = ConfirmRequest {
            confirmed_by: "Jane Doe".to_string(),
            confirmed_email: "jane@example.com".to_string(),
            confirmation_type: ConfirmationType::Renewed,
            notes: None,
        };
        assert!(req.validate().is_ok());

        let req = ConfirmRequest {
            confirmed_by: "".to_string(),
            confirmed_email: "jane@example.com".to_string(),
            confirmation_type: ConfirmationType::Renewed,
            notes: None,
        };
        assert!(matches!(req.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn test_confirmation_type_due_date_advancement() {
        assert!(!ConfirmationType::Submitted.advances_due_date());
        assert!(ConfirmationType::Renewed.advances_due_date());
        assert!(ConfirmationType::Extended.advances_due_date());
        assert!(ConfirmationType::Completed.advances_due_date());
    }

    #[test]
    fn test_status_terminality() {
        assert!(!ReminderStatus::Pending.is_terminal());
        assert!(!ReminderStatus::Sent.is_terminal());
        assert!(ReminderStatus::Confirmed.is_terminal());
        assert!(ReminderStatus::Failed.is_terminal());
        assert!(ReminderStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_enum_tags_round_trip() {
        for t in ReminderType::ALL {
            assert_eq!(ReminderType::parse(t.as_str()), Some(t));
        }
        for s in [
            ReminderStatus::Pending,
            ReminderStatus::Sent,
            ReminderStatus::Confirmed,
            ReminderStatus::Failed,
            ReminderStatus::Cancelled,
        ] {
            assert_eq!(ReminderStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(ReminderStatus::parse("bogus"), None);
    }

    #[test]
    fn test_serde_tags_match_db_tags() {
        let json = serde_json::to_string(&ReminderType::TwoWeeks).unwrap();
        assert_eq!(json, "\"two_weeks\"");
        let json = serde_json::to_string(&ConfirmationType::Renewed).unwrap();
        assert_eq!(json, "\"renewed\"");
        let json = serde_json::to_string(&ReminderStatus::Cancelled).unwrap();
        assert_eq!(json, "\"cancelled\"");
    }

    #[test]
    fn test_reminder_serialization_redacts_token() {
        let reminder = Reminder {
            id: Uuid::new_v4(),
            record_id: Uuid::new_v4(),
            recipient_id: Uuid::new_v4(),
            reminder_type: ReminderType::DueDate,
            cycle_due_date: date(2026, 6, 1),
            scheduled_date: date(2026, 6, 1),
            token: "super-secret-token".to_string(),
            sent_at: None,
            confirmed_at: None,
            confirmed_by: None,
            retry_count: 0,
            last_error: None,
            status: ReminderStatus::Pending,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_string(&reminder).unwrap();
        assert!(!json.contains("super-secret-token"));
        assert!(!json.contains("\"token\""));
    }
}
