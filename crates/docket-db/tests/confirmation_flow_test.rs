//! End-to-end protocol test: recipients are registered, reminders are
//! scheduled and dispatched, and a recipient confirms through the public
//! token exactly once.

use docket_core::{
    ConfirmationRepository, ConfirmationType, ConfirmRequest, Error, RecipientRepository,
    RecordRepository, ReminderRepository, ReminderStatus, ReminderType,
};
use docket_db::test_fixtures::{
    connect_test_db, create_record_due_in, test_recipient_request,
};

#[tokio::test]
async fn full_reminder_confirmation_round_trip() {
    let db = connect_test_db().await;

    // Compliance officer sets up the obligation and its notification targets.
    let record_id = create_record_due_in(&db, 0).await;
    db.recipients
        .add(record_id, test_recipient_request("Jane Doe", "jane@example.com"))
        .await
        .unwrap();
    db.recipients
        .add(record_id, test_recipient_request("Sam Roe", "sam@example.com"))
        .await
        .unwrap();

    // Scheduling materializes one reminder per recipient per milestone.
    let created = db.reminders.schedule_for_record(record_id).await.unwrap();
    assert_eq!(created, 2 * ReminderType::ALL.len());

    // The dispatcher claims whatever is due (due today: everything except
    // the overdue milestone) and marks the sends. Drain in a loop so
    // leftovers from other runs cannot crowd a batch.
    let mut ours = Vec::new();
    loop {
        let claimed = db.reminders.claim_due(100).await.unwrap();
        if claimed.is_empty() {
            break;
        }
        ours.extend(claimed.into_iter().filter(|r| r.record_id == record_id));
    }
    assert_eq!(ours.len(), 2 * 3);
    for reminder in &ours {
        db.reminders.mark_sent(reminder.id).await.unwrap();
    }

    // Jane follows her emailed link.
    let token = &ours
        .iter()
        .find(|r| r.reminder_type == ReminderType::DueDate)
        .unwrap()
        .token;
    let ctx = db
        .confirmations
        .resolve_token(token)
        .await
        .unwrap()
        .expect("live token should resolve");
    assert_eq!(ctx.record.id, record_id);

    let confirmation = db
        .confirmations
        .confirm(
            token,
            ConfirmRequest {
                confirmed_by: "Jane Doe".to_string(),
                confirmed_email: "jane@example.com".to_string(),
                confirmation_type: ConfirmationType::Renewed,
                notes: Some("renewed with the county clerk".to_string()),
            },
        )
        .await
        .unwrap();
    assert_eq!(confirmation.record_id, record_id);

    // The cycle is settled: every other reminder for it is cancelled,
    // nothing remains for the dispatcher.
    let reminders = db.reminders.list_for_record(record_id).await.unwrap();
    assert_eq!(
        reminders
            .iter()
            .filter(|r| r.status == ReminderStatus::Confirmed)
            .count(),
        1
    );
    assert!(reminders
        .iter()
        .filter(|r| r.status != ReminderStatus::Confirmed)
        .all(|r| r.status == ReminderStatus::Cancelled));
    let claimed_after = db.reminders.claim_due(100).await.unwrap();
    assert!(claimed_after.iter().all(|r| r.record_id != record_id));

    // The due date moved one interval; the token is spent.
    let record = db.records.get(record_id).await.unwrap().unwrap();
    assert!(record.last_confirmed_at.is_some());
    let err = db
        .confirmations
        .confirm(
            token,
            ConfirmRequest {
                confirmed_by: "Jane Doe".to_string(),
                confirmed_email: "jane@example.com".to_string(),
                confirmation_type: ConfirmationType::Renewed,
                notes: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn token_failure_modes_are_indistinguishable() {
    let db = connect_test_db().await;
    let record_id = create_record_due_in(&db, 30).await;
    db.recipients
        .add(record_id, test_recipient_request("Jane Doe", "jane@example.com"))
        .await
        .unwrap();
    db.reminders.schedule_for_record(record_id).await.unwrap();
    let reminders = db.reminders.list_for_record(record_id).await.unwrap();
    let unsent = &reminders[0];

    // Unknown token and reserved-but-unsent token give the same answer.
    assert!(db
        .confirmations
        .resolve_token("AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA")
        .await
        .unwrap()
        .is_none());
    assert!(db
        .confirmations
        .resolve_token(&unsent.token)
        .await
        .unwrap()
        .is_none());

    // So does submitting against either.
    let req = ConfirmRequest {
        confirmed_by: "Jane Doe".to_string(),
        confirmed_email: "jane@example.com".to_string(),
        confirmation_type: ConfirmationType::Submitted,
        notes: None,
    };
    let err_unknown = db
        .confirmations
        .confirm("AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA", req.clone())
        .await
        .unwrap_err();
    let err_unsent = db.confirmations.confirm(&unsent.token, req).await.unwrap_err();
    assert_eq!(err_unknown.to_string(), err_unsent.to_string());
}
