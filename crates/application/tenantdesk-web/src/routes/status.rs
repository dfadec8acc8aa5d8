//! Bulk status changes: `PATCH /:status` sets `internalstatus`,
//! `PATCH /:status/ext` sets `externalstatus`, for every id in `ids`.

use std::sync::Arc;

use axum::extract::{Path, State};
use bson::{doc, Bson, Document};
use tenantdesk_core::{Collection, RecordStatus, RuleSet, StatusTarget};

use crate::error::Result;
use crate::extract::{Actor, CapContext, JsonBody};
use crate::record::modified;
use crate::reply::Reply;
use crate::state::AppState;

/// Collections an admin may change in bulk.
pub const ADMIN_COLLECTIONS: &[&str] = &[
    "role",
    "user",
    "dzitrarole",
    "dzitrauser",
    "newsletter",
    "lead",
    "leadtype",
    "leadstatus",
    "region",
    "usertype",
    "plan",
    "emailtemplate",
];

/// Collections a tenant admin may change in bulk.
pub const CAP_COLLECTIONS: &[&str] = &["companyholiday"];

async fn change_status(
    state: &AppState,
    actor: &Bson,
    status: &str,
    target: Option<&str>,
    body: &JsonBody,
    allowed: &'static [&'static str],
    scope: Document,
) -> Result<Reply> {
    let (Some(status), Some(target)) = (RecordStatus::parse(status), StatusTarget::parse(target))
    else {
        return Ok(Reply::not_found());
    };
    body.check(
        &RuleSet::new()
            .array("ids", 1, "id is required")
            .one_of("collection", allowed, "Collection is required"),
    )?;
    let collection = body
        .str("collection")
        .and_then(Collection::from_name)
        .ok_or(Reply::unprocessable("Collection is required"))?;
    let ids: Vec<Bson> = body.oids("ids").into_iter().map(Bson::ObjectId).collect();

    let mut set = doc! { target.field(): status.value() };
    set.extend(modified(actor));
    let update = doc! { "$set": set };

    if collection == Collection::User {
        let creds = state
            .store
            .update_many(
                Collection::UserCredential,
                doc! { "userid": { "$in": ids.clone() } },
                update.clone(),
            )
            .await?;
        tracing::debug!(modified = creds.modified, "Credential statuses changed");
    }
    let mut filter = scope;
    filter.insert("_id", doc! { "$in": ids });
    let outcome = state.store.update_many(collection, filter, update).await?;
    if outcome.matched == 0 {
        return Ok(Reply::bad_request("Error in updating"));
    }
    tracing::info!(
        collection = collection.name(),
        status = status.as_str(),
        field = target.field(),
        count = outcome.modified,
        "Status changed"
    );
    Ok(Reply::ok("Updated successfully"))
}

pub async fn admin_status(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    Path(status): Path<String>,
    body: JsonBody,
) -> Result<Reply> {
    change_status(&state, &actor, &status, None, &body, ADMIN_COLLECTIONS, doc! {}).await
}

pub async fn admin_status_for(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    Path((status, target)): Path<(String, String)>,
    body: JsonBody,
) -> Result<Reply> {
    change_status(&state, &actor, &status, Some(&target), &body, ADMIN_COLLECTIONS, doc! {}).await
}

/// Limited to the tenant's own records.
pub async fn cap_status(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    ctx: CapContext,
    Path(status): Path<String>,
    body: JsonBody,
) -> Result<Reply> {
    let scope = doc! { "leadid": ctx.lead_id };
    change_status(&state, &actor, &status, None, &body, CAP_COLLECTIONS, scope).await
}

pub async fn cap_status_for(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    ctx: CapContext,
    Path((status, target)): Path<(String, String)>,
    body: JsonBody,
) -> Result<Reply> {
    let scope = doc! { "leadid": ctx.lead_id };
    change_status(&state, &actor, &status, Some(&target), &body, CAP_COLLECTIONS, scope).await
}
