// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Outgoing mail for one-time codes.

use crate::config::SmtpConfig;
use anyhow::Context;
use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

/// Something that can deliver a plain-text email.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()>;
}

/// Mailer used when SMTP is not configured: the message is only logged.
#[derive(Debug, Default, Clone)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        tracing::info!(to, subject, "SMTP not configured, email not delivered");
        tracing::debug!(to, body, "Undelivered email body");
        Ok(())
    }
}

/// SMTP mailer backed by lettre.
#[derive(Clone)]
pub struct SmtpMailer {
    transport: SmtpTransport,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> anyhow::Result<Self> {
        let transport = if config.username.is_empty() || config.password.is_empty() {
            tracing::info!(
                smtp_host = %config.host,
                smtp_port = config.port,
                "SMTP credentials not configured, using unauthenticated connection"
            );
            SmtpTransport::builder_dangerous(&config.host)
                .port(config.port)
                .build()
        } else {
            let creds = Credentials::new(config.username.clone(), config.password.clone());
            SmtpTransport::relay(&config.host)
                .context("invalid SMTP relay host")?
                .port(config.port)
                .credentials(creds)
                .build()
        };

        let from = config
            .from_address
            .parse()
            .context("invalid SMTP_FROM address")?;

        tracing::info!(smtp_host = %config.host, "Email service initialized");
        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(to.parse().context("invalid recipient address")?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .context("failed to build email")?;

        // SmtpTransport is blocking; keep it off the async workers.
        let transport = self.transport.clone();
        tokio::task::spawn_blocking(move || transport.send(&message))
            .await
            .context("email task panicked")?
            .context("SMTP send failed")?;

        tracing::info!(to, subject, "Email sent");
        Ok(())
    }
}
