//! Outbound mail abstraction.
//!
//! The core hands finished messages to a [`Mailer`]; the SMTP transport lives
//! in the api crate.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;

/// A plain-text message addressed to one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub to_email: String,
    pub to_name: Option<String>,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid address: {0}")]
    Address(String),

    #[error("failed to build message: {0}")]
    Build(String),

    #[error("transport error: {0}")]
    Transport(String),
}

/// Mail-sending collaborator.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: MailMessage) -> Result<(), MailError>;
}

/// Mailer used when no transport is configured. Accepts and drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMailer;

#[async_trait]
impl Mailer for NoopMailer {
    async fn send(&self, message: MailMessage) -> Result<(), MailError> {
        tracing::debug!(
            to = %message.to_email,
            subject = %message.subject,
            "Mail transport not configured, dropping message"
        );
        Ok(())
    }
}

/// Mailer that records messages instead of sending them.
#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<MailMessage>>,
    /// Whether to simulate failures for testing.
    pub simulate_failure: bool,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mailer whose every send fails.
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            simulate_failure: true,
        }
    }

    pub async fn sent(&self) -> Vec<MailMessage> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: MailMessage) -> Result<(), MailError> {
        if self.simulate_failure {
            return Err(MailError::Transport("Simulated failure".to_string()));
        }
        self.sent.lock().await.push(message);
        Ok(())
    }
}
