//! Campaign-manager digest delivery via SMTP.
//!
//! [`EmailDelivery`] wraps the `lettre` async SMTP transport. Configuration
//! is loaded from environment variables; without `SMTP_HOST`,
//! [`EmailConfig::from_env`] returns `None` and no mailer is built.

use lettre::message::header::ContentType;
use lettre::message::{Attachment, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    /// SMTP transport-level failure (authentication, connection, etc.).
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    /// The recipient or sender address could not be parsed.
    #[error("Email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// The MIME message could not be assembled.
    #[error("Email build error: {0}")]
    Build(String),
}

// ---------------------------------------------------------------------------
// EmailConfig
// ---------------------------------------------------------------------------

/// Default SMTP port (STARTTLS).
const DEFAULT_SMTP_PORT: u16 = 587;

/// Default sender address when `SMTP_FROM` is not set.
const DEFAULT_FROM_ADDRESS: &str = "procurations@procura.local";

#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    /// RFC 5322 "From" address.
    pub from_address: String,
    /// Where campaign managers' replies should go.
    pub reply_to: Option<String>,
    pub smtp_user: Option<String>,
    pub smtp_password: Option<String>,
}

impl EmailConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable        | Required | Default                       |
    /// |-----------------|----------|-------------------------------|
    /// | `SMTP_HOST`     | yes      |                               |
    /// | `SMTP_PORT`     | no       | `587`                         |
    /// | `SMTP_FROM`     | no       | `procurations@procura.local`  |
    /// | `SMTP_REPLY_TO` | no       |                               |
    /// | `SMTP_USER`     | no       |                               |
    /// | `SMTP_PASSWORD` | no       |                               |
    pub fn from_env() -> Option<Self> {
        let smtp_host = std::env::var("SMTP_HOST").ok()?;
        Some(Self {
            smtp_host,
            smtp_port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_SMTP_PORT),
            from_address: std::env::var("SMTP_FROM")
                .unwrap_or_else(|_| DEFAULT_FROM_ADDRESS.to_string()),
            reply_to: std::env::var("SMTP_REPLY_TO").ok().filter(|v| !v.is_empty()),
            smtp_user: std::env::var("SMTP_USER").ok(),
            smtp_password: std::env::var("SMTP_PASSWORD").ok(),
        })
    }
}

// ---------------------------------------------------------------------------
// DigestEmail
// ---------------------------------------------------------------------------

/// A plain-text email with one CSV attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub attachment_name: String,
    pub csv: String,
}

// ---------------------------------------------------------------------------
// EmailDelivery
// ---------------------------------------------------------------------------

pub struct EmailDelivery {
    config: EmailConfig,
}

impl EmailDelivery {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    /// Assemble the MIME message for a digest.
    pub fn build_message(&self, digest: &DigestEmail) -> Result<Message, EmailError> {
        let csv_type =
            ContentType::parse("text/csv; charset=utf-8").map_err(|e| EmailError::Build(e.to_string()))?;
        let attachment =
            Attachment::new(digest.attachment_name.clone()).body(digest.csv.clone().into_bytes(), csv_type);

        let mut builder = Message::builder()
            .from(self.config.from_address.parse()?)
            .to(digest.to.parse()?)
            .subject(digest.subject.clone());
        if let Some(reply_to) = &self.config.reply_to {
            builder = builder.reply_to(reply_to.parse()?);
        }

        builder
            .multipart(
                MultiPart::mixed()
                    .singlepart(SinglePart::plain(digest.body.clone()))
                    .singlepart(attachment),
            )
            .map_err(|e| EmailError::Build(e.to_string()))
    }

    /// Send a digest to its recipient.
    pub async fn send_digest(&self, digest: &DigestEmail) -> Result<(), EmailError> {
        let email = self.build_message(digest)?;

        let mut transport_builder =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.smtp_host)?
                .port(self.config.smtp_port);

        if let (Some(user), Some(pass)) = (&self.config.smtp_user, &self.config.smtp_password) {
            transport_builder =
                transport_builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        let mailer = transport_builder.build();
        mailer.send(email).await?;

        tracing::info!(
            to = %digest.to,
            attachment = %digest.attachment_name,
            "Digest email sent"
        );
        Ok(())
    }
}
