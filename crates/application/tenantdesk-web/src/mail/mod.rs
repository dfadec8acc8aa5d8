//! Outgoing mail: stored templates rendered into HTML mail, plus plain
//! text notifications to the operations inbox.
//!
//! Delivery is switched by the `smtp` settings document. Until an operator
//! sets `mode` to 1 nothing leaves the server and every send reports
//! `Ok(false)`.

pub mod compose;
pub mod transport;

use std::sync::Arc;

use bson::{doc, Document};
use tenantdesk_config::MailConfig;
use tenantdesk_core::Collection;
use tenantdesk_mongodb::DocumentStore;

use crate::error::Result;
use crate::record;

pub use compose::{compose, Recipients};
pub use transport::{MailTransport, RecordingTransport, SmtpAccount, SmtpTransport};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MailBody {
    Html(String),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub body: MailBody,
}

pub struct Mailer {
    store: Arc<dyn DocumentStore>,
    transport: Arc<dyn MailTransport>,
    notify_from: String,
    notify_to: Vec<String>,
}

impl std::fmt::Debug for Mailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mailer")
            .field("notify_from", &self.notify_from)
            .field("notify_to", &self.notify_to)
            .finish_non_exhaustive()
    }
}

/// Credentials from the `smtp` document when delivery is switched on.
pub fn smtp_account(settings: &Document) -> Option<SmtpAccount> {
    if record::int(settings.get("mode")) != Some(1) {
        return None;
    }
    Some(SmtpAccount {
        client: settings.get_str("client").unwrap_or_default().to_string(),
        secret: settings.get_str("secret").unwrap_or_default().to_string(),
    })
}

impl Mailer {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        transport: Arc<dyn MailTransport>,
        config: &MailConfig,
    ) -> Self {
        Self {
            store,
            transport,
            notify_from: config.notify_from.clone(),
            notify_to: config.notify_to.clone(),
        }
    }

    async fn account(&self) -> Result<Option<SmtpAccount>> {
        let settings = self.store.find_one(Collection::Smtp, doc! {}, None).await?;
        Ok(settings.as_ref().and_then(smtp_account))
    }

    /// Render the named template and send it. `Ok(false)` when delivery is
    /// off or the template does not exist.
    pub async fn send_template(
        &self,
        name: &str,
        to: Recipients,
        vars: &[(&str, &str)],
    ) -> Result<bool> {
        let Some(account) = self.account().await? else {
            tracing::debug!(template = name, "SMTP disabled, skipping mail");
            return Ok(false);
        };
        let Some(template) = self
            .store
            .find_one(Collection::EmailTemplate, doc! { "name": name }, None)
            .await?
        else {
            tracing::warn!(template = name, "Email template not found");
            return Ok(false);
        };
        let general = self.store.find_one(Collection::General, doc! {}, None).await?;
        let mail = compose(general.as_ref(), &template, &to, vars);
        self.transport.deliver(&account, &mail).await?;
        Ok(true)
    }

    /// Plain text mail to the operations inbox.
    pub async fn notify(&self, subject: &str, text: String) -> Result<bool> {
        if self.notify_from.is_empty() || self.notify_to.is_empty() {
            tracing::debug!(subject, "No notification recipients configured");
            return Ok(false);
        }
        let Some(account) = self.account().await? else {
            return Ok(false);
        };
        let mail = OutgoingMail {
            from: self.notify_from.clone(),
            to: self.notify_to.clone(),
            subject: subject.to_string(),
            body: MailBody::Text(text),
        };
        self.transport.deliver(&account, &mail).await?;
        Ok(true)
    }
}

/// Mail never fails a request; a failed send is logged and dropped.
pub fn log_failure(outcome: Result<bool>, what: &str) -> bool {
    match outcome {
        Ok(sent) => sent,
        Err(e) => {
            tracing::warn!(error = %e, what, "Mail not sent");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tenantdesk_mongodb::MemoryStore;

    async fn mailer(mode: i32) -> (Mailer, Arc<RecordingTransport>) {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_one(
                Collection::Smtp,
                doc! { "client": "user", "secret": "pw", "mode": mode },
            )
            .await
            .unwrap();
        store
            .insert_one(
                Collection::EmailTemplate,
                doc! {
                    "name": "LeadInvite",
                    "sender_name": "Acme",
                    "sender": "no-reply@acme.test",
                    "subject": "Hi {{lead_name}}",
                    "content": "<a href=\"{{link}}\">go</a>",
                },
            )
            .await
            .unwrap();
        let transport = Arc::new(RecordingTransport::new());
        let config = MailConfig {
            notify_from: "notify@acme.test".into(),
            notify_to: vec!["ops@acme.test".into()],
            ..MailConfig::default()
        };
        (Mailer::new(store, transport.clone(), &config), transport)
    }

    #[test]
    fn mode_string_enables_delivery() {
        assert!(smtp_account(&doc! { "mode": "1", "client": "a", "secret": "b" }).is_some());
        assert!(smtp_account(&doc! { "mode": 0 }).is_none());
        assert!(smtp_account(&doc! {}).is_none());
    }

    #[tokio::test]
    async fn sends_template_when_enabled() {
        let (mailer, transport) = mailer(1).await;
        let sent = mailer
            .send_template("LeadInvite", "ada@acme.test".into(), &[("lead_name", "Ada")])
            .await
            .unwrap();
        assert!(sent);
        let mails = transport.sent().await;
        assert_eq!(mails[0].subject, "Hi Ada");
        assert_eq!(mails[0].from, "Acme <no-reply@acme.test>");
    }

    #[tokio::test]
    async fn disabled_smtp_sends_nothing() {
        let (mailer, transport) = mailer(0).await;
        let sent = mailer
            .send_template("LeadInvite", "ada@acme.test".into(), &[])
            .await
            .unwrap();
        assert!(!sent);
        assert!(!mailer.notify("x", "y".into()).await.unwrap());
        assert!(transport.sent().await.is_empty());
    }

    #[tokio::test]
    async fn missing_template_is_skipped() {
        let (mailer, transport) = mailer(1).await;
        let sent = mailer
            .send_template("Nope", "ada@acme.test".into(), &[])
            .await
            .unwrap();
        assert!(!sent);
        assert!(transport.sent().await.is_empty());
    }

    #[tokio::test]
    async fn notify_goes_to_operations() {
        let (mailer, transport) = mailer(1).await;
        assert!(mailer.notify("New Lead signup", "Name: Ada".into()).await.unwrap());
        let mails = transport.sent().await;
        assert_eq!(mails[0].to, vec!["ops@acme.test".to_string()]);
        assert_eq!(mails[0].body, MailBody::Text("Name: Ada".into()));
    }
}
