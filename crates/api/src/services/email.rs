//! SMTP transport for notification mail.
//!
//! [`SmtpMailer`] wraps the `lettre` async SMTP transport behind the domain
//! [`Mailer`] trait. When email is disabled the core gets a [`NoopMailer`].

use std::sync::Arc;

use async_trait::async_trait;
use domain::services::{MailError, MailMessage, Mailer, NoopMailer};
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{debug, info};

use crate::config::EmailConfig;

/// Sends plain-text mail through an SMTP relay (STARTTLS).
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &EmailConfig) -> Result<Self, MailError> {
        let from = sender_mailbox(config)?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e| MailError::Transport(e.to_string()))?
            .port(config.smtp_port);

        if !config.smtp_username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.smtp_username.clone(),
                config.smtp_password.clone(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

fn sender_mailbox(config: &EmailConfig) -> Result<Mailbox, MailError> {
    let address = config
        .sender_email
        .parse()
        .map_err(|e: lettre::address::AddressError| MailError::Address(e.to_string()))?;
    Ok(Mailbox::new(Some(config.sender_name.clone()), address))
}

fn build_message(from: &Mailbox, message: &MailMessage) -> Result<Message, MailError> {
    let address = message
        .to_email
        .parse()
        .map_err(|e: lettre::address::AddressError| MailError::Address(e.to_string()))?;
    let to = Mailbox::new(message.to_name.clone(), address);

    Message::builder()
        .from(from.clone())
        .to(to)
        .subject(message.subject.clone())
        .header(ContentType::TEXT_PLAIN)
        .body(message.body.clone())
        .map_err(|e| MailError::Build(e.to_string()))
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: MailMessage) -> Result<(), MailError> {
        let email = build_message(&self.from, &message)?;

        self.transport
            .send(email)
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;

        info!(to = %message.to_email, subject = %message.subject, "Notification email sent");
        Ok(())
    }
}

/// Picks the mailer for the configuration.
pub fn mailer_from_config(config: &EmailConfig) -> Result<Arc<dyn Mailer>, MailError> {
    if !config.enabled {
        debug!("Email disabled, notifications are stored only");
        return Ok(Arc::new(NoopMailer));
    }
    Ok(Arc::new(SmtpMailer::new(config)?))
}
