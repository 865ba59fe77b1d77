//! Reminder email rendering.

use chrono::NaiveDate;

use docket_core::{ComplianceRecord, EmailMessage, Recipient, Reminder, ReminderType};

/// Build the public confirmation URL embedded in a reminder email.
pub fn confirm_url(public_base_url: &str, token: &str) -> String {
    format!(
        "{}/compliance-confirm/{}",
        public_base_url.trim_end_matches('/'),
        token
    )
}

fn subject(reminder_type: ReminderType, record_name: &str) -> String {
    match reminder_type {
        ReminderType::TwoWeeks => format!("Upcoming compliance deadline: {}", record_name),
        ReminderType::OneWeek => format!("One week left: {}", record_name),
        ReminderType::DueDate => format!("Due today: {}", record_name),
        ReminderType::Overdue => format!("OVERDUE: {}", record_name),
    }
}

fn lead_line(reminder_type: ReminderType, due: NaiveDate) -> String {
    match reminder_type {
        ReminderType::TwoWeeks => format!("is due in two weeks, on {}.", due),
        ReminderType::OneWeek => format!("is due in one week, on {}.", due),
        ReminderType::DueDate => format!("is due today, {}.", due),
        ReminderType::Overdue => format!("was due on {} and has not been confirmed.", due),
    }
}

/// Render the reminder email for one recipient.
pub fn render(
    reminder: &Reminder,
    record: &ComplianceRecord,
    recipient: &Recipient,
    public_base_url: &str,
) -> EmailMessage {
    let link = confirm_url(public_base_url, &reminder.token);
    let description = record
        .description
        .as_deref()
        .map(|d| format!("\n{}\n", d))
        .unwrap_or_default();

    let text_body = format!(
        "Hello {name},\n\n\
         The compliance obligation \"{record}\" {lead}\n\
         {description}\n\
         Once it has been taken care of, please confirm here:\n\n\
         {link}\n\n\
         The link is personal to you and works once.\n",
        name = recipient.name,
        record = record.name,
        lead = lead_line(reminder.reminder_type, reminder.cycle_due_date),
        description = description,
        link = link,
    );

    EmailMessage {
        to: recipient.email.clone(),
        to_name: recipient.name.clone(),
        subject: subject(reminder.reminder_type, &record.name),
        text_body,
    }
}
