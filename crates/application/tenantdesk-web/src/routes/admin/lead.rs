//! Leads: capture, edit, invite and the status history kept by sales.

use std::sync::Arc;

use axum::extract::{Path, State};
use bson::{doc, oid::ObjectId, Bson, Document};
use tenantdesk_core::{Collection, RuleSet};
use tenantdesk_mongodb::FindOptions;

use crate::error::Result;
use crate::extract::{path_id, Actor, JsonBody, ListPath};
use crate::listing::{
    aggregate_page, all_active, fetch_by_id, hide_audit, lookup_one, status_filter,
};
use crate::mail::log_failure;
use crate::provisioning;
use crate::record::{self, uq_id, with_created, with_modified};
use crate::reply::{documents_to_json, Reply};
use crate::state::AppState;

/// Status shown for leads nobody has picked up yet.
pub const DEFAULT_STATUS: &str = "New Request";

const SUBMIT_FAILED: &str = "Error in submitting the request. Please try again later.";

fn lead_rules(update: bool) -> RuleSet {
    let rules = if update {
        RuleSet::new().object_id("_id", "Id is required")
    } else {
        RuleSet::new()
    };
    rules
        .required("name", "Name is required")
        .email("business_email", "Email is required")
        .required("mobile", "Mobile Number is required")
        .required("country", "Country is required")
}

/// Contact and company fields shared by every capture form.
fn profile(body: &JsonBody) -> Document {
    doc! {
        "name": body.text("name"),
        "business_email": body.text("business_email"),
        "mobile": body.text("mobile"),
        "country": body.text("country"),
        "industry_id": body.oid_or_null("industry_id"),
        "company_name": body.text("company_name"),
        "company_size": body.text("company_size"),
        "brief_business_requirement": body.text("brief_business_requirement"),
    }
}

/// Insert one lead built from a capture form. `extra` overrides the
/// profile fields; `thanks` is the success message.
pub(crate) async fn capture(
    state: &AppState,
    actor: &Bson,
    body: &JsonBody,
    extra: Document,
    thanks: String,
) -> Result<Reply> {
    let id = ObjectId::new();
    let mut fields = doc! { "_id": id, "uq_id": uq_id(Collection::Lead, &id) };
    fields.extend(profile(body));
    fields.extend(extra);

    match state
        .store
        .insert_one(Collection::Lead, with_created(fields, actor))
        .await
    {
        Ok(outcome) => {
            tracing::info!(lead_id = %id, "Lead captured");
            Ok(Reply::ok(thanks).debug_data(state.is_dev(), || {
                crate::reply::bson_to_json(&outcome.inserted_id)
            }))
        }
        Err(e) => {
            tracing::error!(error = %e, "Lead insert failed");
            Ok(Reply::failure(SUBMIT_FAILED))
        }
    }
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    body: JsonBody,
) -> Result<Reply> {
    body.check(&lead_rules(false))?;
    capture(
        &state,
        &actor,
        &body,
        doc! { "source": body.text("source") },
        "Thanks for submitting the request. Email will be send to proceed further.".into(),
    )
    .await
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    body: JsonBody,
) -> Result<Reply> {
    body.check(&lead_rules(true))?;
    let id = body.oid_or_null("_id");
    let mut set = profile(&body);
    set.insert("source", body.text("source"));
    let outcome = state
        .store
        .update_one(
            Collection::Lead,
            doc! { "_id": id },
            doc! { "$set": with_modified(set, &actor) },
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
    fetch_by_id(state.store.as_ref(), Collection::Lead, id, None).await
}

/// Leads with their current status name.
pub async fn list(
    State(state): State<Arc<AppState>>,
    ListPath(params): ListPath,
) -> Result<Reply> {
    let mut stages: Vec<Document> =
        lookup_one(Collection::LeadStatus, "leadstatus_id", "_id", "lead_status").into();
    stages.push(doc! { "$project": {
        "_id": 1,
        "name": 1,
        "business_email": 1,
        "mobile": 1,
        "source": 1,
        "status": { "$ifNull": ["$lead_status.name", DEFAULT_STATUS] },
        "createdon": 1,
        "externalstatus": 1,
        "internalstatus": 1,
        "modifiedon": 1,
        "recordstatus": 1,
    } });
    aggregate_page(
        state.store.as_ref(),
        Collection::Lead,
        status_filter(&params),
        stages,
        &params,
    )
    .await
}

pub async fn invite(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    body: JsonBody,
) -> Result<Reply> {
    body.check(&RuleSet::new().object_id("id", "Id is required"))?;
    let lead_id = body.oid("id").ok_or(Reply::unprocessable("Id is required"))?;
    provisioning::invite_lead(&state, &actor, lead_id).await
}

fn status_rules() -> RuleSet {
    RuleSet::new()
        .object_id("oldleadstatus_id", "Lead is required")
        .object_id("lead_id", "Lead is required")
        .object_id("dzitrauser_id", "User is required")
        .object_id("leadstatus_id", "Status is required")
        .required("comments", "Comments is required")
        .required("updateddate", "Date is required")
}

async fn status_name(state: &AppState, id: ObjectId) -> Result<String> {
    Ok(state
        .store
        .find_one(Collection::LeadStatus, doc! { "_id": id }, Some(doc! { "name": 1 }))
        .await?
        .map(|s| record::text(&s, "name").to_string())
        .unwrap_or_default())
}

fn day_month_year(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .map(|d| d.format("%d/%m/%Y").to_string())
        .unwrap_or_default()
}

/// Move a lead to a new status, record who did it and tell sales.
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    body: JsonBody,
) -> Result<Reply> {
    body.check(&status_rules())?;
    let missing = || Reply::unprocessable("Lead is required");
    let lead_id = body.oid("lead_id").ok_or_else(missing)?;
    let old_status = body.oid("oldleadstatus_id").ok_or_else(missing)?;
    let new_status = body
        .oid("leadstatus_id")
        .ok_or(Reply::unprocessable("Status is required"))?;
    let owner = body
        .oid("dzitrauser_id")
        .ok_or(Reply::unprocessable("User is required"))?;
    let updated = body
        .millis("updateddate")
        .ok_or(Reply::unprocessable("Date is required"))?;

    let outcome = state
        .store
        .update_one(
            Collection::Lead,
            doc! { "_id": lead_id },
            doc! { "$set": { "leadstatus_id": new_status } },
            false,
        )
        .await?;
    if outcome.matched == 0 {
        return Ok(Reply::failure("Error in Updating."));
    }

    let history = doc! {
        "lead_id": lead_id,
        "dzitrauser_id": owner,
        "leadstatus_id": new_status,
        "comments": body.text("comments"),
        "updateddate": updated,
    };
    if let Err(e) = state
        .store
        .insert_one(Collection::LeadOwner, with_created(history, &actor))
        .await
    {
        tracing::error!(error = %e, lead_id = %lead_id, "Lead owner insert failed");
        return Ok(Reply::failure("Error in Updating."));
    }
    tracing::info!(lead_id = %lead_id, status = %new_status, "Lead status changed");

    let changed_by = state
        .store
        .find_one(Collection::DzitraUser, doc! { "_id": owner }, Some(doc! { "email": 1 }))
        .await?
        .map(|u| record::text(&u, "email").to_string())
        .unwrap_or_default();
    let text = format!(
        "Hi,\n\n\
         We are pleased to inform you that the status of your lead has been changed.\n\n\
         Status:          {}\n\
         Updated Status:  {}\n\
         Date:            {}\n\
         Changed By:      {}\n\
         Comments:        {}\n\n\
         Note:\n\
         This is an auto-generated mail.\n",
        status_name(&state, old_status).await?,
        status_name(&state, new_status).await?,
        day_month_year(updated),
        changed_by,
        body.str("comments").unwrap_or_default(),
    );
    log_failure(
        state.mailer.notify("Lead Status Updated", text).await,
        "lead status notification",
    );
    Ok(Reply::ok("Status Updated Successfully"))
}

/// Status history of one lead.
pub async fn status_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Reply> {
    let id = path_id(&id, "Id is required")?;
    let history = state
        .store
        .find(
            Collection::LeadOwner,
            doc! { "lead_id": id, "internalstatus": { "$in": [1] } },
            FindOptions::default().projection(hide_audit()),
        )
        .await?;
    Ok(Reply::success(documents_to_json(&history)))
}

pub async fn active_leads(State(state): State<Arc<AppState>>) -> Result<Reply> {
    all_active(state.store.as_ref(), Collection::Lead, doc! {}).await
}

#[cfg(test)]
mod tests {
    use crate::mail::MailBody;
    use crate::testing::Harness;
    use axum::http::{Method, StatusCode};
    use bson::doc;
    use serde_json::json;
    use tenantdesk_core::Collection;

    fn lead() -> serde_json::Value {
        json!({
            "name": "Ada",
            "business_email": "ada@acme.test",
            "mobile": "555",
            "country": "UK",
            "company_name": "Engines",
        })
    }

    #[tokio::test]
    async fn public_capture_then_admin_list() {
        let h = Harness::new().await;
        let (status, body) = h.call(Method::POST, "/lead", None, Some(lead())).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert!(body["data"].is_string());

        let stored = h.find(Collection::Lead, doc! { "name": "Ada" }).await.unwrap();
        assert_eq!(stored.get_i32("createdby").unwrap(), 0);
        assert!(stored.get_str("uq_id").unwrap().starts_with("lead_"));

        let (status, _) = h.call(Method::GET, "/lead/list/createdon/-1/1/10", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (id, token) = h.admin().await;
        let (_, body) = h
            .call(Method::GET, "/lead/list/createdon/-1/1/10", Some((&id, token.as_str())), None)
            .await;
        assert_eq!(body["data"]["list"][0]["status"], "New Request");
    }

    #[tokio::test]
    async fn capture_validates_email() {
        let h = Harness::new().await;
        let mut body = lead();
        body["business_email"] = json!("nope");
        let (status, reply) = h.call(Method::POST, "/lead", None, Some(body)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(reply["message"], "Email is required");
    }

    #[tokio::test]
    async fn status_change_records_history_and_notifies() {
        let h = Harness::new().await;
        h.enable_mail().await;
        let (id, token) = h.admin().await;
        let auth = Some((&id, token.as_str()));
        let fresh = h.insert(Collection::LeadStatus, doc! { "name": "New Request" }).await;
        let demo = h.insert(Collection::LeadStatus, doc! { "name": "Demo Scheduled" }).await;
        let lead = h
            .insert(Collection::Lead, doc! { "name": "Ada", "leadstatus_id": fresh })
            .await;

        let change = json!({
            "oldleadstatus_id": fresh.to_hex(),
            "lead_id": lead.to_hex(),
            "dzitrauser_id": id.to_hex(),
            "leadstatus_id": demo.to_hex(),
            "comments": "call booked",
            "updateddate": "2024-03-05T10:00:00Z",
        });
        let (status, body) = h
            .call(Method::POST, "/lead/updatestatus", auth, Some(change.clone()))
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["message"], "Status Updated Successfully");

        let sent = h.mail.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "Lead Status Updated");
        match &sent[0].body {
            MailBody::Text(text) => {
                assert!(text.contains("Demo Scheduled"));
                assert!(text.contains("05/03/2024"));
                assert!(text.contains("root@acme.test"));
            }
            other => panic!("unexpected body {other:?}"),
        }

        let (_, body) = h
            .call(Method::GET, &format!("/lead/status/{}", lead.to_hex()), auth, None)
            .await;
        assert_eq!(body["data"][0]["comments"], "call booked");

        // Repeating the change is accepted and logged again.
        let (status, body) = h.call(Method::POST, "/lead/updatestatus", auth, Some(change)).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(h.all(Collection::LeadOwner).await.len(), 2);
    }
}
