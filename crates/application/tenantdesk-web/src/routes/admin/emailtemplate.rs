//! Mail templates. `{{name}}` placeholders are filled at send time.

use std::sync::Arc;

use axum::extract::{Path, State};
use bson::{doc, Document};
use tenantdesk_core::{Collection, RuleSet};

use crate::error::Result;
use crate::extract::{path_id, Actor, JsonBody, ListPath};
use crate::listing::{fetch_by_id, find_page, hide_audit, status_filter};
use crate::record::{with_created, with_modified};
use crate::reply::Reply;
use crate::state::AppState;

fn rules(update: bool) -> RuleSet {
    let rules = if update {
        RuleSet::new().object_id("_id", "Id is required")
    } else {
        RuleSet::new()
    };
    rules
        .required("name", "Name is required")
        .required("sender_name", "Sender Name is required")
        .email("sender", "Sender is required")
        .required("subject", "Please enter email subject")
        .required("content", "Please enter email content")
}

fn template(body: &JsonBody) -> Document {
    let mut fields = doc! {
        "name": body.text("name"),
        "sender_name": body.text("sender_name"),
        "sender": body.text("sender"),
        "subject": body.text("subject"),
        "content": body.text("content"),
    };
    if let Some(receiver) = body.str("receiver") {
        fields.insert("receiver", receiver);
    }
    fields
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    body: JsonBody,
) -> Result<Reply> {
    body.check(&rules(false))?;
    let name = body.string("name");
    if state
        .store
        .count(Collection::EmailTemplate, doc! { "name": name.as_str() })
        .await?
        > 0
    {
        return Ok(Reply::bad_request("Name already exists"));
    }
    let mut fields = with_created(template(&body), &actor);
    fields.remove("recordstatus");
    match state.store.insert_one(Collection::EmailTemplate, fields).await {
        Ok(_) => Ok(Reply::ok("Template created successfully")),
        Err(e) => {
            tracing::error!(error = %e, template = %name, "Template insert failed");
            Ok(Reply::failure("Error in creating template"))
        }
    }
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    body: JsonBody,
) -> Result<Reply> {
    body.check(&rules(true))?;
    let id = body.oid("_id").ok_or(Reply::unprocessable("Id is required"))?;
    let name = body.string("name");
    let clash = state
        .store
        .count(
            Collection::EmailTemplate,
            doc! { "name": name.as_str(), "_id": { "$ne": id } },
        )
        .await?;
    if clash > 0 {
        return Ok(Reply::bad_request("Name already exists"));
    }
    let outcome = state
        .store
        .update_one(
            Collection::EmailTemplate,
            doc! { "_id": id },
            doc! { "$set": with_modified(template(&body), &actor) },
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
    fetch_by_id(state.store.as_ref(), Collection::EmailTemplate, id, None).await
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    ListPath(params): ListPath,
) -> Result<Reply> {
    find_page(
        state.store.as_ref(),
        Collection::EmailTemplate,
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
    async fn template_names_are_unique() {
        let h = Harness::new().await;
        let (id, token) = h.admin().await;
        let auth = Some((&id, token.as_str()));
        let body = json!({
            "name": "LeadInvite",
            "sender_name": "{{title}}",
            "sender": "no-reply@acme.test",
            "subject": "Welcome",
            "content": "<p>Hi {{lead_name}}</p>",
        });

        let (status, reply) = h
            .call(Method::POST, "/emailtemplate", auth, Some(body.clone()))
            .await;
        assert_eq!(status, StatusCode::OK, "{reply}");
        let (status, reply) = h.call(Method::POST, "/emailtemplate", auth, Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(reply["message"], "Name already exists");

        let stored = h
            .find(Collection::EmailTemplate, doc! { "name": "LeadInvite" })
            .await
            .unwrap();
        let (_, reply) = h
            .call(
                Method::GET,
                &format!("/emailtemplate/{}", stored.get_object_id("_id").unwrap().to_hex()),
                auth,
                None,
            )
            .await;
        assert_eq!(reply["data"]["subject"], "Welcome");
    }

    #[tokio::test]
    async fn sender_must_be_an_email() {
        let h = Harness::new().await;
        let (id, token) = h.admin().await;
        let (status, reply) = h
            .call(
                Method::POST,
                "/emailtemplate",
                Some((&id, token.as_str())),
                Some(json!({
                    "name": "x",
                    "sender_name": "x",
                    "sender": "not-mail",
                    "subject": "s",
                    "content": "c",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(reply["message"], "Sender is required");
    }
}
