//! Report delivery over SMTP
//!
//! Messages are multipart/alternative (plain text plus HTML) with an optional
//! attachment wrapped in multipart/mixed. Building a message is separate from
//! sending it so the MIME structure can be checked without a relay.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;
use tracing::{debug, error, info, instrument};

use crate::config::MailConfig;

/// Errors raised while building or sending a message
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("invalid address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("cannot read attachment {path}: {source}")]
    Attachment {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to build message: {0}")]
    Build(String),

    #[error("SMTP delivery failed: {0}")]
    Transport(String),
}

/// A file to attach
#[derive(Debug, Clone, PartialEq)]
pub enum ReportAttachment {
    /// Read from disk at send time; the attachment is named after the file
    File(PathBuf),
    /// Already in memory
    Inline { filename: String, content: Vec<u8> },
}

/// One outgoing notification
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingMail {
    pub subject: String,
    pub text: String,
    pub html: String,
    pub attachment: Option<ReportAttachment>,
}

/// What the relay said about an accepted message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub message_id: String,
    pub response: String,
}

/// Sends notifications to the configured recipients
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, mail: &OutgoingMail) -> Result<Confirmation, DeliveryError>;
}

/// SMTP delivery through a relay
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Vec<Mailbox>,
}

impl std::fmt::Debug for SmtpNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpNotifier")
            .field("from", &self.from.to_string())
            .field("to", &self.to.len())
            .finish_non_exhaustive()
    }
}

impl SmtpNotifier {
    /// Build a notifier; no connection is made until the first send
    pub fn new(config: &MailConfig) -> Result<Self, DeliveryError> {
        let from = parse_mailbox(&config.from)?;
        let to = config
            .recipients
            .iter()
            .map(|address| parse_mailbox(address))
            .collect::<Result<Vec<_>, _>>()?;

        let tls = TlsParameters::new(config.host.clone())
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
            .port(config.port)
            .tls(if config.secure {
                Tls::Wrapper(tls)
            } else {
                Tls::Opportunistic(tls)
            });

        if let Some(password) = &config.password {
            builder = builder.credentials(Credentials::new(
                config.user.clone(),
                password.expose().to_string(),
            ));
        }

        debug!(
            "SMTP relay {}:{} ({}), {} recipients",
            config.host,
            config.port,
            if config.secure { "implicit TLS" } else { "STARTTLS" },
            to.len()
        );

        Ok(Self {
            transport: builder.build(),
            from,
            to,
        })
    }

    /// Resolve the attachment and assemble the MIME message
    pub async fn build_message(
        &self,
        mail: &OutgoingMail,
    ) -> Result<(Message, String), DeliveryError> {
        let attachment = match &mail.attachment {
            None => None,
            Some(ReportAttachment::Inline { filename, content }) => {
                Some((filename.clone(), content.clone()))
            }
            Some(ReportAttachment::File(path)) => {
                let content = tokio::fs::read(path)
                    .await
                    .map_err(|source| DeliveryError::Attachment {
                        path: path.clone(),
                        source,
                    })?;
                Some((attachment_name(path), content))
            }
        };

        let message_id = new_message_id(&self.from);
        let message = compose(&self.from, &self.to, mail, attachment, &message_id)?;
        Ok((message, message_id))
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    #[instrument(skip_all, fields(subject = %mail.subject))]
    async fn send(&self, mail: &OutgoingMail) -> Result<Confirmation, DeliveryError> {
        let (message, message_id) = self.build_message(mail).await?;

        let response = self.transport.send(message).await.map_err(|e| {
            error!("SMTP delivery failed: {e}");
            DeliveryError::Transport(e.to_string())
        })?;

        let response = format!(
            "{} {}",
            response.code(),
            response
                .message()
                .map(|line| line.to_string())
                .collect::<Vec<_>>()
                .join(" ")
        );
        info!("Email sent: {message_id} ({response})");

        Ok(Confirmation {
            message_id,
            response,
        })
    }
}

/// Assemble a message from already-loaded parts
pub fn compose(
    from: &Mailbox,
    to: &[Mailbox],
    mail: &OutgoingMail,
    attachment: Option<(String, Vec<u8>)>,
    message_id: &str,
) -> Result<Message, DeliveryError> {
    let mut builder = Message::builder()
        .from(from.clone())
        .subject(mail.subject.clone())
        .message_id(Some(message_id.to_string()));
    for recipient in to {
        builder = builder.to(recipient.clone());
    }

    let body = MultiPart::alternative_plain_html(mail.text.clone(), mail.html.clone());

    let result = match attachment {
        None => builder.multipart(body),
        Some((filename, content)) => {
            let content_type = ContentType::parse(content_type_for(&filename))
                .map_err(|e| DeliveryError::Build(e.to_string()))?;
            builder.multipart(
                MultiPart::mixed()
                    .multipart(body)
                    .singlepart(Attachment::new(filename).body(content, content_type)),
            )
        }
    };

    result.map_err(|e| DeliveryError::Build(e.to_string()))
}

fn parse_mailbox(address: &str) -> Result<Mailbox, DeliveryError> {
    address
        .parse()
        .map_err(|e: lettre::address::AddressError| DeliveryError::InvalidAddress {
            address: address.to_string(),
            reason: e.to_string(),
        })
}

fn attachment_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "report".to_string())
}

fn content_type_for(filename: &str) -> &'static str {
    match Path::new(filename).extension().and_then(|e| e.to_str()) {
        Some("pdf") => "application/pdf",
        Some("html") | Some("htm") => "text/html; charset=utf-8",
        _ => "application/octet-stream",
    }
}

fn new_message_id(from: &Mailbox) -> String {
    let now = Utc::now();
    format!(
        "<{}.{}@{}>",
        now.timestamp_millis(),
        now.timestamp_subsec_nanos(),
        from.email.domain()
    )
}
