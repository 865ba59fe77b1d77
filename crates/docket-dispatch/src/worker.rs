//! Reminder dispatcher: claims due reminders and emails them.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc};
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use docket_core::defaults::{
    DISPATCH_BATCH_SIZE, DISPATCH_POLL_INTERVAL_MS, EVENT_CHANNEL_CAPACITY, REMINDER_MAX_RETRIES,
};
use docket_core::{
    DispatchSummary, Error, Mailer, RecipientRepository, RecordRepository, Reminder,
    ReminderRepository, ReminderStatus, Result,
};
use docket_db::Database;

use crate::email;

/// Configuration for the reminder dispatcher.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Polling interval in milliseconds when nothing is due.
    pub poll_interval_ms: u64,
    /// Maximum reminders claimed per pass.
    pub batch_size: i64,
    /// Send attempts before a reminder is marked failed.
    pub max_retries: i32,
    /// Whether to run the dispatch loop at all.
    pub enabled: bool,
    /// Base URL the emailed confirmation links point at.
    pub public_base_url: String,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DISPATCH_POLL_INTERVAL_MS,
            batch_size: DISPATCH_BATCH_SIZE,
            max_retries: REMINDER_MAX_RETRIES,
            enabled: true,
            public_base_url: "http://localhost:3000".to_string(),
        }
    }
}

impl DispatcherConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `DISPATCH_ENABLED` | `true` | Enable/disable the dispatch loop |
    /// | `DISPATCH_POLL_INTERVAL_MS` | `30000` | Polling interval when idle |
    /// | `DISPATCH_BATCH_SIZE` | `16` | Max reminders claimed per pass |
    /// | `REMINDER_MAX_RETRIES` | `3` | Send attempts before failed |
    /// | `PUBLIC_BASE_URL` | `http://localhost:3000` | Confirmation link base |
    pub fn from_env() -> Self {
        let enabled = std::env::var("DISPATCH_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let poll_interval_ms = std::env::var("DISPATCH_POLL_INTERVAL_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DISPATCH_POLL_INTERVAL_MS);

        let batch_size = std::env::var("DISPATCH_BATCH_SIZE")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(DISPATCH_BATCH_SIZE)
            .max(1);

        let max_retries = std::env::var("REMINDER_MAX_RETRIES")
            .ok()
            .and_then(|v| v.parse::<i32>().ok())
            .unwrap_or(REMINDER_MAX_RETRIES)
            .max(1);

        let public_base_url = std::env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:3000".to_string());

        Self {
            poll_interval_ms,
            batch_size,
            max_retries,
            enabled,
            public_base_url,
        }
    }

    /// Set the polling interval.
    pub fn with_poll_interval(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    /// Set the claim batch size.
    pub fn with_batch_size(mut self, n: i64) -> Self {
        self.batch_size = n;
        self
    }

    /// Set the retry limit.
    pub fn with_max_retries(mut self, n: i32) -> Self {
        self.max_retries = n;
        self
    }

    /// Enable or disable the dispatch loop.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the public base URL for confirmation links.
    pub fn with_public_base_url(mut self, url: impl Into<String>) -> Self {
        self.public_base_url = url.into();
        self
    }
}

/// Event emitted by the dispatcher.
#[derive(Debug, Clone)]
pub enum DispatcherEvent {
    /// Dispatcher loop started.
    DispatcherStarted,
    /// A reminder email was handed to the mailer.
    ReminderSent { reminder_id: Uuid, record_id: Uuid },
    /// A send attempt failed.
    ReminderFailed {
        reminder_id: Uuid,
        record_id: Uuid,
        error: String,
        /// True once retries are exhausted and the reminder is failed.
        terminal: bool,
    },
    /// Dispatcher loop stopped.
    DispatcherStopped,
}

/// Handle for controlling a running dispatcher.
pub struct DispatcherHandle {
    shutdown_tx: mpsc::Sender<()>,
    event_rx: broadcast::Receiver<DispatcherEvent>,
}

impl DispatcherHandle {
    /// Signal the dispatcher to shut down gracefully.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| Error::Internal("Failed to send shutdown signal".into()))?;
        Ok(())
    }

    /// Get a receiver for dispatcher events.
    pub fn events(&self) -> broadcast::Receiver<DispatcherEvent> {
        self.event_rx.resubscribe()
    }
}

/// Dispatcher that emails due reminders from the queue.
pub struct ReminderDispatcher {
    db: Database,
    mailer: Arc<dyn Mailer>,
    config: DispatcherConfig,
    event_tx: broadcast::Sender<DispatcherEvent>,
}

impl ReminderDispatcher {
    /// Create a new dispatcher.
    pub fn new(db: Database, mailer: Arc<dyn Mailer>, config: DispatcherConfig) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            db,
            mailer,
            config,
            event_tx,
        }
    }

    /// Get a receiver for dispatcher events.
    pub fn events(&self) -> broadcast::Receiver<DispatcherEvent> {
        self.event_tx.subscribe()
    }

    /// Start the dispatch loop and return a handle for control.
    pub fn start(self: Arc<Self>) -> DispatcherHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let event_rx = self.event_tx.subscribe();

        let dispatcher = self.clone();
        tokio::spawn(async move {
            dispatcher.run(&mut shutdown_rx).await;
        });

        DispatcherHandle {
            shutdown_tx,
            event_rx,
        }
    }

    /// Run the dispatch loop. Sleeps only when a pass claims nothing
    /// (backpressure-aware polling).
    #[instrument(skip(self, shutdown_rx))]
    async fn run(&self, shutdown_rx: &mut mpsc::Receiver<()>) {
        if !self.config.enabled {
            info!("Reminder dispatcher is disabled, not starting");
            return;
        }

        info!(
            poll_interval_ms = self.config.poll_interval_ms,
            batch_size = self.config.batch_size,
            max_retries = self.config.max_retries,
            "Reminder dispatcher started"
        );
        let _ = self.event_tx.send(DispatcherEvent::DispatcherStarted);

        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);

        loop {
            if shutdown_rx.try_recv().is_ok() {
                info!("Reminder dispatcher received shutdown signal");
                break;
            }

            let summary = match self.run_once().await {
                Ok(summary) => summary,
                Err(e) => {
                    error!(error = ?e, "Dispatch pass failed");
                    DispatchSummary::default()
                }
            };

            if summary.claimed == 0 {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Reminder dispatcher received shutdown signal");
                        break;
                    }
                    _ = sleep(poll_interval) => {}
                }
            } else {
                debug!(
                    claimed = summary.claimed,
                    sent = summary.sent,
                    failed = summary.failed,
                    "Dispatch pass completed"
                );
                // More may be due; claim again immediately.
            }
        }

        let _ = self.event_tx.send(DispatcherEvent::DispatcherStopped);
        info!("Reminder dispatcher stopped");
    }

    /// Claim and dispatch one batch of due reminders.
    ///
    /// Also backs the operational manual-send trigger.
    pub async fn run_once(&self) -> Result<DispatchSummary> {
        let start = Instant::now();
        let due = self.db.reminders.claim_due(self.config.batch_size).await?;

        let mut summary = DispatchSummary {
            claimed: due.len(),
            ..Default::default()
        };

        for reminder in due {
            match self.dispatch_one(&reminder).await {
                Ok(()) => summary.sent += 1,
                Err(e) => {
                    summary.failed += 1;
                    self.record_failure(&reminder, &e).await;
                }
            }
        }

        if summary.claimed > 0 {
            info!(
                subsystem = "dispatch",
                component = "worker",
                op = "pass",
                result_count = summary.claimed,
                sent = summary.sent,
                failed = summary.failed,
                duration_ms = start.elapsed().as_millis() as u64,
                "Dispatched due reminders"
            );
        }
        Ok(summary)
    }

    /// Render and send one reminder, then mark it sent.
    async fn dispatch_one(&self, reminder: &Reminder) -> Result<()> {
        let record = self
            .db
            .records
            .get(reminder.record_id)
            .await?
            .ok_or_else(|| {
                Error::Internal(format!(
                    "reminder {} references missing record {}",
                    reminder.id, reminder.record_id
                ))
            })?;
        let recipient = self
            .db
            .recipients
            .get(reminder.recipient_id)
            .await?
            .ok_or_else(|| {
                Error::Internal(format!(
                    "reminder {} references missing recipient {}",
                    reminder.id, reminder.recipient_id
                ))
            })?;

        let message = email::render(reminder, &record, &recipient, &self.config.public_base_url);
        self.mailer.send(&message).await?;

        self.db.reminders.mark_sent(reminder.id).await?;
        debug!(
            subsystem = "dispatch",
            component = "worker",
            op = "send",
            reminder_id = %reminder.id,
            record_id = %reminder.record_id,
            reminder_type = reminder.reminder_type.as_str(),
            "Reminder email sent"
        );
        let _ = self.event_tx.send(DispatcherEvent::ReminderSent {
            reminder_id: reminder.id,
            record_id: reminder.record_id,
        });
        Ok(())
    }

    /// Record a failed send attempt against the reminder's retry budget.
    async fn record_failure(&self, reminder: &Reminder, error: &Error) {
        let error_text = error.to_string();
        match self
            .db
            .reminders
            .mark_send_failure(reminder.id, &error_text, self.config.max_retries)
            .await
        {
            Ok(status) => {
                let terminal = status == ReminderStatus::Failed;
                warn!(
                    subsystem = "dispatch",
                    component = "worker",
                    op = "send",
                    reminder_id = %reminder.id,
                    record_id = %reminder.record_id,
                    error = %error_text,
                    terminal,
                    "Reminder send failed"
                );
                let _ = self.event_tx.send(DispatcherEvent::ReminderFailed {
                    reminder_id: reminder.id,
                    record_id: reminder.record_id,
                    error: error_text,
                    terminal,
                });
            }
            Err(e) => {
                error!(
                    error = ?e,
                    reminder_id = %reminder.id,
                    "Failed to record send failure"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatcher_config_builder() {
        let config = DispatcherConfig::default()
            .with_poll_interval(500)
            .with_batch_size(4)
            .with_max_retries(5)
            .with_enabled(false)
            .with_public_base_url("https://docket.example");

        assert_eq!(config.poll_interval_ms, 500);
        assert_eq!(config.batch_size, 4);
        assert_eq!(config.max_retries, 5);
        assert!(!config.enabled);
        assert_eq!(config.public_base_url, "https://docket.example");
    }

    #[test]
    fn test_dispatcher_config_defaults() {
        let config = DispatcherConfig::default();
        assert_eq!(config.poll_interval_ms, DISPATCH_POLL_INTERVAL_MS);
        assert_eq!(config.batch_size, DISPATCH_BATCH_SIZE);
        assert_eq!(config.max_retries, REMINDER_MAX_RETRIES);
        assert!(config.enabled);
    }
}
