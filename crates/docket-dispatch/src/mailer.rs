//! Mailer implementations.
//!
//! Delivery goes through an HTTP mail-provider API rather than raw SMTP;
//! the provider owns queuing, DKIM, and bounce handling.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use docket_core::{EmailMessage, Error, Mailer, Result};

/// Request body for the provider's send endpoint.
#[derive(Debug, Serialize)]
struct SendEmailBody<'a> {
    from: &'a str,
    to: &'a str,
    to_name: &'a str,
    subject: &'a str,
    text_body: &'a str,
}

/// Mailer that posts JSON to an HTTP mail-provider API.
pub struct HttpMailer {
    client: reqwest::Client,
    base_url: String,
    auth_token: String,
    sender: String,
}

impl HttpMailer {
    /// Create a mailer against the given provider.
    pub fn new(base_url: impl Into<String>, auth_token: impl Into<String>, sender: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            base_url: base_url.into(),
            auth_token: auth_token.into(),
            sender: sender.into(),
        }
    }

    /// Build a mailer from environment variables.
    ///
    /// | Variable | Description |
    /// |----------|-------------|
    /// | `MAILER_BASE_URL` | provider API base URL (required) |
    /// | `MAILER_AUTH_TOKEN` | provider API token (required) |
    /// | `MAILER_SENDER` | from-address for reminder mail (required) |
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("MAILER_BASE_URL")
            .map_err(|_| Error::Config("MAILER_BASE_URL is not set".to_string()))?;
        let auth_token = std::env::var("MAILER_AUTH_TOKEN")
            .map_err(|_| Error::Config("MAILER_AUTH_TOKEN is not set".to_string()))?;
        let sender = std::env::var("MAILER_SENDER")
            .map_err(|_| Error::Config("MAILER_SENDER is not set".to_string()))?;
        Ok(Self::new(base_url, auth_token, sender))
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        let url = format!("{}/email", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.auth_token)
            .json(&SendEmailBody {
                from: &self.sender,
                to: &message.to,
                to_name: &message.to_name,
                subject: &message.subject,
                text_body: &message.text_body,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Mailer(format!(
                "mail provider returned {}: {}",
                status, body
            )));
        }
        Ok(())
    }
}

/// Mailer that only logs. Used when no provider is configured, so a dev
/// instance can exercise the full dispatch path without sending mail.
#[derive(Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        tracing::info!(
            subsystem = "dispatch",
            component = "mailer",
            op = "send",
            to = %message.to,
            subject = %message.subject,
            "Log-only mailer: message not delivered"
        );
        Ok(())
    }
}

/// In-memory mailer for tests: records every message and can be told to
/// fail a number of sends first.
#[derive(Default)]
pub struct MockMailer {
    sent: Mutex<Vec<EmailMessage>>,
    fail_remaining: Mutex<u32>,
}

impl MockMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` send attempts before succeeding again.
    pub fn fail_next(&self, n: u32) {
        *self.fail_remaining.lock().unwrap() = n;
    }

    /// Messages delivered so far.
    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Mailer for MockMailer {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        {
            let mut remaining = self.fail_remaining.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(Error::Mailer("simulated delivery failure".to_string()));
            }
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> EmailMessage {
        EmailMessage {
            to: "jane@example.com".to_string(),
            to_name: "Jane Doe".to_string(),
            subject: "subject".to_string(),
            text_body: "body".to_string(),
        }
    }

    #[tokio::test]
    async fn test_mock_mailer_records_messages() {
        let mailer = MockMailer::new();
        mailer.send(&message()).await.unwrap();
        mailer.send(&message()).await.unwrap();
        assert_eq!(mailer.sent_count(), 2);
        assert_eq!(mailer.sent()[0].to, "jane@example.com");
    }

    #[tokio::test]
    async fn test_mock_mailer_fails_then_recovers() {
        let mailer = MockMailer::new();
        mailer.fail_next(2);
        assert!(mailer.send(&message()).await.is_err());
        assert!(mailer.send(&message()).await.is_err());
        assert!(mailer.send(&message()).await.is_ok());
        assert_eq!(mailer.sent_count(), 1);
    }
}
