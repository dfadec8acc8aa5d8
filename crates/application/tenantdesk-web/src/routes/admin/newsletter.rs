use std::sync::Arc;

use axum::extract::{Path, State};
use bson::doc;
use tenantdesk_core::{Collection, RuleSet};

use crate::error::Result;
use crate::extract::{path_id, Actor, JsonBody, ListPath};
use crate::listing::{fetch_by_id, find_page, hide_audit, status_filter};
use crate::record::{created, with_modified};
use crate::reply::Reply;
use crate::state::AppState;

fn flags(body: &JsonBody) -> bson::Document {
    doc! {
        "email": body.text("email"),
        "emailvalidated": body.flag("emailvalidated"),
        "optedout": body.flag("optedout"),
        "is_lead": body.flag("is_lead"),
        "is_customer": body.flag("is_customer"),
    }
}

/// Keyed by email: a second create for the same address overwrites it.
pub async fn create(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    body: JsonBody,
) -> Result<Reply> {
    body.check(
        &RuleSet::new()
            .email("email", "Email is required")
            .required("is_lead", "Type lead is required")
            .required("is_customer", "Type customer is required"),
    )?;
    let email = body.string("email");
    let mut set = flags(&body);
    set.extend(created(&actor));
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
    if outcome.applied() {
        Ok(Reply::ok("Created successfully"))
    } else {
        Ok(Reply::failure("Error in creating"))
    }
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    body: JsonBody,
) -> Result<Reply> {
    body.check(
        &RuleSet::new()
            .object_id("_id", "Id is required")
            .email("email", "Email is required"),
    )?;
    let id = body.oid_or_null("_id");
    let outcome = state
        .store
        .update_one(
            Collection::Newsletter,
            doc! { "_id": id },
            doc! { "$set": with_modified(flags(&body), &actor) },
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
    fetch_by_id(state.store.as_ref(), Collection::Newsletter, id, None).await
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    ListPath(params): ListPath,
) -> Result<Reply> {
    find_page(
        state.store.as_ref(),
        Collection::Newsletter,
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
    use serde_json::json;
    use tenantdesk_core::Collection;

    #[tokio::test]
    async fn create_is_an_upsert_by_email() {
        let h = Harness::new().await;
        let (id, token) = h.admin().await;
        let auth = Some((&id, token.as_str()));
        let entry = json!({ "email": "ada@acme.test", "is_lead": "true", "is_customer": "false" });

        let (status, body) = h.call(Method::POST, "/newsletter", auth, Some(entry)).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        let (status, _) = h
            .call(
                Method::POST,
                "/newsletter",
                auth,
                Some(json!({ "email": "ada@acme.test", "is_lead": true, "is_customer": true })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let rows = h.all(Collection::Newsletter).await;
        assert_eq!(rows.len(), 1);
        assert!(rows[0].get_bool("is_customer").unwrap());
        assert!(!rows[0].get_bool("optedout").unwrap());

        let (status, body) = h
            .call(Method::POST, "/newsletter", auth, Some(json!({ "email": "ada@acme.test" })))
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["message"], "Type lead is required");
    }
}
