use std::sync::Arc;

use axum::extract::State;
use bson::{doc, Bson};
use tenantdesk_core::{Collection, RuleSet};

use crate::error::Result;
use crate::extract::JsonBody;
use crate::mail::log_failure;
use crate::record::created;
use crate::reply::Reply;
use crate::state::AppState;

/// Public opt-in. Subscribing again resets the entry to a fresh subscriber.
pub async fn subscribe(State(state): State<Arc<AppState>>, body: JsonBody) -> Result<Reply> {
    body.check(&RuleSet::new().email("email", "Email is required"))?;
    let email = body.string("email");
    let mut set = doc! {
        "email": email.as_str(),
        "emailvalidated": false,
        "optedout": false,
        "is_lead": false,
        "is_customer": false,
    };
    set.extend(created(&Bson::Int32(0)));
    set.remove("recordstatus");

    let outcome = state
        .store
        .update_one(
            Collection::Newsletter,
            doc! { "email": email.as_str() },
            doc! { "$set": set },
            true,
        )
        .await?;
    if !outcome.applied() {
        return Ok(Reply::failure("Error in subscribe"));
    }
    let text = format!(
        "New lead generation from Newsletter. Email: {email}.\n\nNote:\nThis is an auto-generated mail."
    );
    log_failure(
        state.mailer.notify("New Newsletter subscriber", text).await,
        "newsletter notification",
    );
    Ok(Reply::ok("Subscribed successfully"))
}
