//! Template rendering for outgoing mail.

use bson::Document;

use super::{MailBody, OutgoingMail};

/// Who a templated mail goes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipients {
    /// One address, as passed by most callers.
    Single(String),
    /// Several addresses; the template's own `receiver` list is prepended.
    List(Vec<String>),
}

impl From<&str> for Recipients {
    fn from(address: &str) -> Self {
        Recipients::Single(address.to_string())
    }
}

fn text<'a>(doc: &'a Document, key: &str) -> &'a str {
    doc.get_str(key).unwrap_or_default()
}

fn substitute(mut text: String, vars: &[(&str, &str)]) -> String {
    for (name, value) in vars {
        text = text.replace(&format!("{{{{{name}}}}}"), value);
    }
    text
}

fn split_addresses(raw: &str) -> impl Iterator<Item = String> + '_ {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Resolve the final recipient list for a template.
pub fn recipients(template: &Document, to: &Recipients) -> Vec<String> {
    match to {
        Recipients::List(list) => {
            let mut all: Vec<String> = split_addresses(text(template, "receiver")).collect();
            all.extend(list.iter().cloned());
            all
        }
        Recipients::Single(address) if !address.trim().is_empty() => vec![address.clone()],
        Recipients::Single(_) => vec![text(template, "sender").to_string()],
    }
}

/// Render a stored template with `vars`, then the site-wide `site_url` and
/// `title` from the general settings document.
pub fn compose(
    general: Option<&Document>,
    template: &Document,
    to: &Recipients,
    vars: &[(&str, &str)],
) -> OutgoingMail {
    let title = general.map(|g| text(g, "title")).unwrap_or_default();
    let site_url = general.map(|g| text(g, "site_url")).unwrap_or_default();
    let site = [("site_url", site_url), ("title", title)];

    let content = substitute(text(template, "content").to_string(), vars);
    let content = substitute(content, &site);
    let subject = substitute(text(template, "subject").to_string(), &[("title", title)]);
    let subject = substitute(subject, vars);
    let sender_name = substitute(text(template, "sender_name").to_string(), &[("title", title)]);

    OutgoingMail {
        from: format!("{} <{}>", sender_name, text(template, "sender")),
        to: recipients(template, to),
        subject,
        body: MailBody::Html(content),
    }
}
