//! First-run data.
//!
//! Each block only runs when its collection has no active record, so the
//! seed is safe to call on every start.

use bson::{doc, oid::ObjectId, Document};
use tenantdesk_config::Config;
use tenantdesk_core::crypto::{generate_password, hash_password};
use tenantdesk_core::{Collection, PlanTypeName};

use crate::{now_millis, DocumentStore, Result};

const INDUSTRY_TYPES: [&str; 2] = ["IT1", "IT2"];

pub const LEAD_STATUSES: [&str; 8] = [
    "New Request",
    "Assigned",
    "In Progress",
    "Demo Scheduled/Contacted",
    "Demo Completed",
    "Onboarded",
    "Not Interested",
    "Others",
];

/// Template names the server mails with.
pub const TEMPLATE_NEW_DZITRA_USER: &str = "NewDzitraUser";
pub const TEMPLATE_ADMIN_RESET: &str = "AdminResetForgotPassword";
pub const TEMPLATE_LEAD_INVITE: &str = "LeadInvite";

const DEFAULT_TEMPLATES: [(&str, &str, &str); 3] = [
    (
        TEMPLATE_NEW_DZITRA_USER,
        "Welcome to {{title}}",
        "<p>Hi {{name}},</p>\
         <p>An administrator account has been created for you on <a href=\"{{site_url}}\">{{title}}</a>.</p>\
         <p>Username: <b>{{username}}</b><br/>Password: <b>{{pass}}</b></p>\
         <p>Please change your password after signing in.</p>",
    ),
    (
        TEMPLATE_ADMIN_RESET,
        "{{title}} - Reset your password",
        "<p>Hi {{name}},</p>\
         <p>We received a request to reset your password. Use the link below to choose a new one.</p>\
         <p><a href=\"{{site_url}}{{link}}\">Reset password</a></p>\
         <p>If you did not request this, you can ignore this mail.</p>",
    ),
    (
        TEMPLATE_LEAD_INVITE,
        "You're invited to {{title}}",
        "<p>Hi {{lead_name}},</p>\
         <p>Your {{title}} account is ready. Create your password to get started.</p>\
         <p><a href=\"{{site_url}}{{link}}\">Create password</a></p>",
    ),
];

/// What the seed created. A generated superadmin password is returned so
/// the caller can mail it.
#[derive(Debug, Default)]
pub struct SeedReport {
    pub inserted: Vec<(Collection, u64)>,
    pub admin: Option<SeededAdmin>,
}

#[derive(Debug, Clone)]
pub struct SeededAdmin {
    pub id: ObjectId,
    pub email: String,
    pub name: String,
    /// Set when no password was configured.
    pub generated_password: Option<String>,
}

fn audit_fields() -> Document {
    let now = now_millis();
    doc! {
        "internalstatus": 1,
        "externalstatus": 1,
        "recordstatus": 1,
        "createdon": now,
        "createdby": 0,
        "modifiedon": now,
        "modifiedby": 0,
    }
}

fn with_audit(mut doc: Document) -> Document {
    for (k, v) in audit_fields() {
        doc.insert(k, v);
    }
    doc
}

async fn has_active(store: &dyn DocumentStore, collection: Collection) -> Result<bool> {
    let n = store
        .count(collection, doc! { "internalstatus": 1, "externalstatus": 1 })
        .await?;
    Ok(n > 0)
}

pub async fn seed(store: &dyn DocumentStore, config: &Config) -> Result<SeedReport> {
    let mut report = SeedReport::default();

    if !has_active(store, Collection::DzitraUser).await? && !config.seed.email.is_empty() {
        let (password, generated) = match &config.seed.admin_password {
            Some(p) => (p.clone(), None),
            None => {
                let p = generate_password(10, true, true);
                (p.clone(), Some(p))
            }
        };
        let id = ObjectId::new();
        store
            .insert_one(
                Collection::DzitraUser,
                with_audit(doc! {
                    "_id": id,
                    "name": "superadmin",
                    "display_name": "Super Admin",
                    "email": config.seed.email.as_str(),
                    "hash": hash_password(&password)?,
                    "uq_id": format!("{}_{}", Collection::DzitraUser, id.to_hex()),
                }),
            )
            .await?;
        tracing::info!(email = %config.seed.email, "Seeded superadmin");
        report.inserted.push((Collection::DzitraUser, 1));
        report.admin = Some(SeededAdmin {
            id,
            email: config.seed.email.clone(),
            name: "superadmin".into(),
            generated_password: generated,
        });
    }

    if !has_active(store, Collection::PlanType).await? {
        let docs = [PlanTypeName::Trial, PlanTypeName::Paid]
            .iter()
            .map(|t| {
                with_audit(doc! {
                    "name": t.as_str(),
                    "description": format!("Initial insert plan type: {}", t.as_str()),
                })
            })
            .collect();
        let n = store.insert_many(Collection::PlanType, docs).await?;
        report.inserted.push((Collection::PlanType, n));
    }

    if !has_active(store, Collection::IndustryType).await? {
        let docs = INDUSTRY_TYPES
            .iter()
            .map(|t| with_audit(doc! { "industrytype": *t }))
            .collect();
        let n = store.insert_many(Collection::IndustryType, docs).await?;
        report.inserted.push((Collection::IndustryType, n));
    }

    if !has_active(store, Collection::LeadStatus).await? {
        let docs = LEAD_STATUSES
            .iter()
            .map(|s| {
                with_audit(doc! {
                    "name": *s,
                    "description": format!("Initial insert lead status: {s}"),
                })
            })
            .collect();
        let n = store.insert_many(Collection::LeadStatus, docs).await?;
        report.inserted.push((Collection::LeadStatus, n));
    }

    if !has_active(store, Collection::General).await? {
        store
            .insert_one(
                Collection::General,
                with_audit(doc! {
                    "title": config.site.title.as_str(),
                    "site_url": config.site_url(),
                }),
            )
            .await?;
        report.inserted.push((Collection::General, 1));
    }

    // Delivery stays off until an operator sets real credentials.
    if !has_active(store, Collection::Smtp).await? {
        store
            .insert_one(
                Collection::Smtp,
                with_audit(doc! { "client": "", "secret": "", "mode": 0 }),
            )
            .await?;
        report.inserted.push((Collection::Smtp, 1));
    }

    if !has_active(store, Collection::EmailTemplate).await? {
        let sender = template_sender(config);
        let docs = DEFAULT_TEMPLATES
            .iter()
            .map(|(name, subject, content)| {
                with_audit(doc! {
                    "name": *name,
                    "sender_name": "{{title}}",
                    "sender": sender.as_str(),
                    "subject": *subject,
                    "content": *content,
                })
            })
            .collect();
        let n = store.insert_many(Collection::EmailTemplate, docs).await?;
        report.inserted.push((Collection::EmailTemplate, n));
    }

    for (collection, n) in &report.inserted {
        tracing::debug!(collection = %collection, count = n, "Seeded");
    }
    Ok(report)
}

fn template_sender(config: &Config) -> String {
    if config.mail.notify_from.is_empty() {
        format!("no-reply@{}", config.site.fe_host)
    } else {
        config.mail.notify_from.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;
    use tenantdesk_core::crypto::verify_password;

    #[tokio::test]
    async fn seeds_everything_once() {
        let store = MemoryStore::new();
        let mut config = Config::local();
        config.seed.admin_password = Some("Adm1n!pass".into());

        let report = seed(&store, &config).await.unwrap();
        let admin = report.admin.unwrap();
        assert!(admin.generated_password.is_none());
        assert_eq!(store.dump(Collection::LeadStatus).await.len(), 8);
        assert_eq!(store.dump(Collection::PlanType).await.len(), 2);
        assert_eq!(store.dump(Collection::EmailTemplate).await.len(), 3);

        let users = store.dump(Collection::DzitraUser).await;
        assert_eq!(users[0].get_str("display_name").unwrap(), "Super Admin");
        assert!(verify_password("Adm1n!pass", users[0].get_str("hash").unwrap()));

        let smtp = store.dump(Collection::Smtp).await;
        assert_eq!(smtp[0].get_i32("mode").unwrap(), 0);

        let again = seed(&store, &config).await.unwrap();
        assert!(again.inserted.is_empty());
        assert!(again.admin.is_none());
        assert_eq!(store.dump(Collection::LeadStatus).await.len(), 8);
    }

    #[tokio::test]
    async fn generates_admin_password_when_unset() {
        let store = MemoryStore::new();
        let config = Config::local();
        let report = seed(&store, &config).await.unwrap();
        let generated = report.admin.unwrap().generated_password.unwrap();
        assert_eq!(generated.len(), 10);
    }

    #[tokio::test]
    async fn skips_admin_without_email() {
        let store = MemoryStore::new();
        let mut config = Config::local();
        config.seed.email.clear();
        let report = seed(&store, &config).await.unwrap();
        assert!(report.admin.is_none());
        assert!(store.dump(Collection::DzitraUser).await.is_empty());
    }
}
