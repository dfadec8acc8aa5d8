//! Mail delivery backends.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tokio::sync::Mutex;

use super::{MailBody, OutgoingMail};
use crate::error::{Error, Result};

/// SMTP account stored in the `smtp` settings document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpAccount {
    pub client: String,
    pub secret: String,
}

#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn deliver(&self, account: &SmtpAccount, mail: &OutgoingMail) -> Result<()>;
}

/// STARTTLS relay through the configured SMTP host.
#[derive(Debug, Clone)]
pub struct SmtpTransport {
    host: String,
    port: u16,
}

impl SmtpTransport {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

fn mailbox(raw: &str) -> Result<Mailbox> {
    raw.parse::<Mailbox>()
        .map_err(|source| Error::MailAddress {
            raw: raw.to_string(),
            source,
        })
}

fn build_message(mail: &OutgoingMail) -> Result<Message> {
    let mut builder = Message::builder()
        .from(mailbox(&mail.from)?)
        .subject(mail.subject.clone());
    for to in &mail.to {
        builder = builder.to(mailbox(to)?);
    }
    let (content_type, body) = match &mail.body {
        MailBody::Html(html) => (ContentType::TEXT_HTML, html.clone()),
        MailBody::Text(text) => (ContentType::TEXT_PLAIN, text.clone()),
    };
    builder
        .header(content_type)
        .body(body)
        .map_err(Error::from)
}

#[async_trait]
impl MailTransport for SmtpTransport {
    async fn deliver(&self, account: &SmtpAccount, mail: &OutgoingMail) -> Result<()> {
        let message = build_message(mail)?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.host)?
            .port(self.port)
            .credentials(Credentials::new(
                account.client.clone(),
                account.secret.clone(),
            ))
            .build();
        transport.send(message).await?;
        tracing::debug!(to = ?mail.to, subject = %mail.subject, "Mail delivered");
        Ok(())
    }
}

/// Keeps every mail in memory instead of sending it. Used by tests and by
/// `serve --in-memory`.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<OutgoingMail>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl MailTransport for RecordingTransport {
    async fn deliver(&self, _account: &SmtpAccount, mail: &OutgoingMail) -> Result<()> {
        // Same validation the SMTP path applies.
        build_message(mail)?;
        tracing::info!(to = ?mail.to, subject = %mail.subject, "Mail recorded");
        self.sent.lock().await.push(mail.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mail(from: &str) -> OutgoingMail {
        OutgoingMail {
            from: from.into(),
            to: vec!["ada@acme.test".into()],
            subject: "Hello".into(),
            body: MailBody::Text("hi".into()),
        }
    }

    #[test]
    fn builds_named_sender() {
        assert!(build_message(&mail("Acme Team <no-reply@acme.test>")).is_ok());
    }

    #[test]
    fn rejects_bad_sender() {
        match build_message(&mail("not an address")) {
            Err(Error::MailAddress { raw, .. }) => assert_eq!(raw, "not an address"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn message_without_recipients_keeps_the_lettre_error() {
        let mut no_one = mail("no-reply@acme.test");
        no_one.to.clear();
        assert!(matches!(build_message(&no_one), Err(Error::MailMessage(_))));
    }

    #[tokio::test]
    async fn recording_transport_keeps_mail() {
        let transport = RecordingTransport::new();
        let account = SmtpAccount {
            client: "c".into(),
            secret: "s".into(),
        };
        transport
            .deliver(&account, &mail("notify@acme.test"))
            .await
            .unwrap();
        let sent = transport.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "Hello");
    }
}
