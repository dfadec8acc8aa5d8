//! Marketing site forms and the lead invite link.

use std::sync::Arc;

use axum::extract::State;
use axum::Extension;
use bson::{doc, oid::ObjectId, Bson, Document};
use serde_json::Value;
use tenantdesk_core::crypto::hash_password;
use tenantdesk_core::{Claims, Collection, RuleSet};

use crate::error::Result;
use crate::extract::{Actor, JsonBody};
use crate::mail::log_failure;
use crate::record::{self, active, created, modified};
use crate::reply::Reply;
use crate::routes::admin::lead::capture;
use crate::state::AppState;

const AUTO_GENERATED: &str = "Note:\nThis is an auto-generated mail.";

/// Capture the lead, then tell sales about it.
async fn capture_and_notify(
    state: &AppState,
    actor: &Bson,
    body: &JsonBody,
    extra: Document,
    thanks: String,
    subject: &str,
    text: String,
) -> Result<Reply> {
    let reply = capture(state, actor, body, extra, thanks).await?;
    if reply.is_success() {
        log_failure(state.mailer.notify(subject, text).await, subject);
    }
    Ok(reply)
}

fn field(body: &JsonBody, key: &str) -> String {
    match body.get(key) {
        Some(Value::String(s)) => s.clone(),
        None | Some(Value::Null) => String::new(),
        Some(other) => other.to_string(),
    }
}

pub async fn signup(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    body: JsonBody,
) -> Result<Reply> {
    body.check(
        &RuleSet::new()
            .required("name", "Name is required")
            .email("business_email", "Email is required")
            .required("mobile", "Mobile Number is required")
            .required("company_name", "Company Name is required"),
    )?;
    let source = body.str("source").unwrap_or("Get Started").to_string();
    let text = format!(
        "Hi,\nNew Lead signup from {source}.\nName: {}\nEmail: {}\nMobile: {}\nCompany Name: {}\n\n{AUTO_GENERATED}",
        field(&body, "name"),
        field(&body, "business_email"),
        field(&body, "mobile"),
        field(&body, "company_name"),
    );
    capture_and_notify(
        &state,
        &actor,
        &body,
        doc! { "source": source },
        "Thanks for signing up. Email will be sent to proceed further.".into(),
        "New Lead signup",
        text,
    )
    .await
}

pub async fn pricing(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    body: JsonBody,
) -> Result<Reply> {
    body.check(
        &RuleSet::new()
            .required("name", "Name is required")
            .email("business_email", "Email is required and must be valid")
            .required("mobile", "Mobile Number is required")
            .required("company_name", "Company Name is required")
            .required("plan", "Plan is required"),
    )?;
    let plan = field(&body, "plan");
    let text = format!(
        "New lead generation via pricing.\nName: {}\nEmail: {}\nMobile: {}\nCompany Name: {}\nPlan: {plan}\n\n{AUTO_GENERATED}",
        field(&body, "name"),
        field(&body, "business_email"),
        field(&body, "mobile"),
        field(&body, "company_name"),
    );
    capture_and_notify(
        &state,
        &actor,
        &body,
        doc! { "source": "Pricing", "plan": body.text("plan") },
        format!("Thanks for signing up with our {plan}. Email will be sent to proceed further."),
        "New Lead - Plan",
        text,
    )
    .await
}

pub async fn schedule_demo(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    body: JsonBody,
) -> Result<Reply> {
    body.check(
        &RuleSet::new().email("business_email", "Email is required and must be valid"),
    )?;
    let text = format!(
        "New lead generation. Email: {}.\n\n{AUTO_GENERATED}",
        field(&body, "business_email"),
    );
    capture_and_notify(
        &state,
        &actor,
        &body,
        doc! { "source": "Schedule Demo" },
        "Thanks for scheduling a demo with us. Email will be sent to proceed further.".into(),
        "New Lead requested via Schedule demo",
        text,
    )
    .await
}

pub async fn contact_us(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    body: JsonBody,
) -> Result<Reply> {
    body.check(
        &RuleSet::new()
            .required("name", "Name is required")
            .email("business_email", "Email is required and must be valid")
            .required("mobile", "Mobile Number is required")
            .required("country", "Country is required")
            .required("company_name", "Company Name is required")
            .required(
                "brief_business_requirement",
                "Brief business requirement is required",
            ),
    )?;
    let text = format!(
        "New lead generation:\nName: {}\nEmail: {}\nMobile: {}\nCountry: {}\nCompany Name: {}\nBusiness Requirement: {}\n\n{AUTO_GENERATED}",
        field(&body, "name"),
        field(&body, "business_email"),
        field(&body, "mobile"),
        field(&body, "country"),
        field(&body, "company_name"),
        field(&body, "brief_business_requirement"),
    );
    capture_and_notify(
        &state,
        &actor,
        &body,
        doc! { "source": "Contact Us" },
        "Thanks for contacting us. Email will be sent to proceed further.".into(),
        "New Lead requested via Contact Us",
        text,
    )
    .await
}

/// The invited user, when both the lead and the user named by the link are
/// still active and agree on the email.
async fn invited_user(state: &AppState, claims: &Claims) -> Result<Option<Document>> {
    let (Some(email), Ok(user_id)) = (claims.email.as_deref(), ObjectId::parse_str(&claims.id))
    else {
        return Ok(None);
    };
    let mut filter = active();
    filter.insert("business_email", email);
    let lead = state
        .store
        .find_one(Collection::Lead, filter, Some(doc! { "business_email": 1 }))
        .await?;
    if lead.is_none() {
        return Ok(None);
    }
    let mut filter = active();
    filter.insert("_id", user_id);
    let user = state
        .store
        .find_one(
            Collection::User,
            filter,
            Some(doc! { "_id": 1, "email": 1, "mobile": 1, "lead_id": 1, "customer_id": 1 }),
        )
        .await?;
    Ok(user.filter(|u| record::text(u, "email") == email))
}

pub async fn check_link(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
) -> Result<Reply> {
    match invited_user(&state, &claims).await? {
        Some(_) => Ok(Reply::ok("Valid Link")),
        None => Ok(Reply::unauthorized()),
    }
}

/// Set the first password. The credential is removed again when the user
/// record cannot be marked as having accepted the invite.
pub async fn submit_link(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    body: JsonBody,
) -> Result<Reply> {
    let Some(user) = invited_user(&state, &claims).await? else {
        return Ok(Reply::unauthorized());
    };
    body.check(&RuleSet::new().required("password", "Password is required"))?;
    let Some(user_id) = record::oid(&user, "_id") else {
        return Ok(Reply::unauthorized());
    };

    let system = Bson::Int32(0);
    let mut credential = doc! {
        "email": user.get("email").cloned().unwrap_or(Bson::Null),
        "mobile": user.get("mobile").cloned().unwrap_or(Bson::Null),
        "hash": hash_password(&body.string("password"))?,
        "userid": user_id,
        "leadid": user.get("lead_id").cloned().unwrap_or(Bson::Null),
        "changepasswordflag": true,
    };
    if let Some(customer_id) = record::oid(&user, "customer_id") {
        credential.insert("customerid", customer_id);
    }
    credential.extend(created(&system));
    credential.remove("recordstatus");
    state
        .store
        .update_one(
            Collection::UserCredential,
            doc! { "userid": user_id },
            doc! { "$set": credential },
            true,
        )
        .await?;

    let mut accepted = modified(&system);
    accepted.insert("emailinvite", true);
    let outcome = state
        .store
        .update_one(
            Collection::User,
            doc! { "_id": user_id },
            doc! { "$set": accepted },
            false,
        )
        .await?;
    if outcome.matched == 0 {
        state
            .store
            .delete_one(Collection::UserCredential, doc! { "userid": user_id })
            .await?;
        return Ok(Reply::bad_request("Error in updating"));
    }
    tracing::info!(user_id = %user_id, "Invite accepted");
    Ok(Reply::ok("Registered Successfully"))
}
