//! Tenant users as seen from the admin console.

use std::sync::Arc;

use axum::extract::{Path, State};
use bson::{doc, oid::ObjectId, Bson, Document};
use tenantdesk_core::{Collection, RuleSet};

use crate::error::Result;
use crate::extract::{path_id, Actor, JsonBody, ListPath};
use crate::listing::{fetch_by_id, find_page, hide_audit, status_filter};
use crate::provisioning::find_lead;
use crate::record::{self, active, with_created, with_modified};
use crate::reply::Reply;
use crate::state::AppState;

/// Profile fields an admin may set on create and update.
fn profile(body: &JsonBody) -> Document {
    doc! {
        "middlename": body.text("middlename"),
        "lastname": body.text("lastname"),
        "displayname": body.text("displayname"),
        "internalid": body.oid_or_null("internalid"),
        "managerid": body.oid_or_null("managerid"),
        "usertypeid": body.oid_or_null("usertypeid"),
        "emailinvite": body.flag("emailinvite"),
        "twofaenrollment": body.flag("twofaenrollment"),
    }
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    body: JsonBody,
) -> Result<Reply> {
    body.check(&RuleSet::new().object_id("lead_id", "Lead is required"))?;
    let lead_id = body.oid("lead_id").ok_or(Reply::unprocessable("Lead is required"))?;
    let Some(lead) = find_lead(&state, lead_id).await? else {
        return Ok(Reply::bad_request("Invalid Lead"));
    };
    let email = record::text(&lead, "business_email");

    let elsewhere = state
        .store
        .count(
            Collection::User,
            doc! { "email": email, "lead_id": { "$ne": lead_id } },
        )
        .await?;
    if elsewhere > 0 {
        return Ok(Reply::bad_request("Lead with email already exists in user."));
    }
    let mut existing = active();
    existing.insert("lead_id", lead_id);
    if state.store.count(Collection::User, existing).await? > 0 {
        return Ok(Reply::ok("User already exists for this lead").status(2));
    }

    let customer = state
        .store
        .find_one(
            Collection::Customer,
            doc! { "lead_id": lead_id },
            Some(doc! { "_id": 1 }),
        )
        .await?;
    let mut fields = doc! {
        "_id": ObjectId::new(),
        "firstname": lead.get("name").cloned().unwrap_or(Bson::Null),
        "email": email,
        "mobile": lead.get("mobile").cloned().unwrap_or(Bson::Null),
        "lead_id": lead_id,
    };
    if let Some(customer_id) = customer.as_ref().and_then(|c| record::oid(c, "_id")) {
        fields.insert("customer_id", customer_id);
    }
    fields.extend(profile(&body));
    match state
        .store
        .insert_one(Collection::User, with_created(fields, &actor))
        .await
    {
        Ok(_) => Ok(Reply::ok("User created successfully")),
        Err(e) => {
            tracing::error!(error = %e, lead_id = %lead_id, "User insert failed");
            Ok(Reply::failure("Error in creating user"))
        }
    }
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    body: JsonBody,
) -> Result<Reply> {
    body.check(&RuleSet::new().object_id("_id", "Id is required"))?;
    let id = body.oid("_id").ok_or(Reply::unprocessable("Id is required"))?;
    let lead = match body.oid("lead_id") {
        Some(lead_id) => find_lead(&state, lead_id).await?,
        None => None,
    };
    if lead.is_none() {
        return Ok(Reply::bad_request("Invalid Lead"));
    }

    let outcome = state
        .store
        .update_one(
            Collection::User,
            doc! { "_id": id },
            doc! { "$set": with_modified(profile(&body), &actor) },
            false,
        )
        .await?;
    if outcome.matched == 0 {
        return Ok(Reply::bad_request("Error in updating"));
    }
    Ok(Reply::ok("Updated successfully"))
}

pub async fn fetch(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<Reply> {
    let id = path_id(&id, "Id is required")?;
    fetch_by_id(state.store.as_ref(), Collection::User, id, None).await
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    ListPath(params): ListPath,
) -> Result<Reply> {
    find_page(
        state.store.as_ref(),
        Collection::User,
        status_filter(&params),
        hide_audit(),
        &params,
    )
    .await
}

#[cfg(test)]
mod tests {
    use crate::testing::Harness;
    use axum::http::{Method, StatusCode};
    use bson::doc;
    use serde_json::json;
    use tenantdesk_core::Collection;

    #[tokio::test]
    async fn user_is_created_from_the_lead() {
        let h = Harness::new().await;
        let (id, token) = h.admin().await;
        let auth = Some((&id, token.as_str()));
        let lead = h
            .insert(
                Collection::Lead,
                doc! { "name": "Bo", "business_email": "bo@acme.test", "mobile": "1" },
            )
            .await;

        let body =
            json!({ "lead_id": lead.to_hex(), "lastname": "Diddley", "emailinvite": "true" });
        let (status, reply) = h.call(Method::POST, "/user", auth, Some(body.clone())).await;
        assert_eq!(status, StatusCode::OK, "{reply}");

        let user = h.find(Collection::User, doc! { "lead_id": lead }).await.unwrap();
        assert_eq!(user.get_str("firstname").unwrap(), "Bo");
        assert_eq!(user.get_str("email").unwrap(), "bo@acme.test");
        assert!(user.get_bool("emailinvite").unwrap());

        let (status, reply) = h.call(Method::POST, "/user", auth, Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reply["status"], 2);
        assert_eq!(reply["message"], "User already exists for this lead");
    }

    #[tokio::test]
    async fn update_needs_a_real_lead() {
        let h = Harness::new().await;
        let (id, token) = h.admin().await;
        let auth = Some((&id, token.as_str()));
        let user = h.insert(Collection::User, doc! { "email": "x@acme.test" }).await;

        let (status, body) = h
            .call(Method::PATCH, "/user", auth, Some(json!({ "_id": user.to_hex() })))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid Lead");
    }
}
