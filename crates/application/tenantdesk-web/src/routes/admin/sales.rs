//! Subscriptions and customers: the admin entry points into provisioning
//! plus their read views.

use std::sync::Arc;

use axum::extract::{Path, State};
use bson::{doc, Document};
use tenantdesk_core::Collection;

use crate::error::Result;
use crate::extract::{path_id, Actor, JsonBody, ListPath};
use crate::listing::{aggregate_page, fetch_by_id, lookup_one, status_filter};
use crate::mail::log_failure;
use crate::provisioning;
use crate::reply::Reply;
use crate::state::AppState;

const WELCOME: &str = "Hi,\n\n\
    We are pleased to inform you that the status of your lead has been changed.\n\n\
    Note:\n\
    This is an auto-generated mail.\n";

fn lookups(joins: &[(Collection, &str, &str)]) -> Vec<Document> {
    joins
        .iter()
        .flat_map(|(from, local, alias)| lookup_one(*from, local, "_id", alias))
        .collect()
}

pub async fn create_subscription(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    body: JsonBody,
) -> Result<Reply> {
    provisioning::new_subscription(&state, &actor, &body).await
}

pub async fn fetch_subscription(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Reply> {
    let id = path_id(&id, "Id is required")?;
    fetch_by_id(state.store.as_ref(), Collection::Subscription, id, None).await
}

/// Subscriptions with plan and lead names resolved.
pub async fn list_subscriptions(
    State(state): State<Arc<AppState>>,
    ListPath(params): ListPath,
) -> Result<Reply> {
    let mut stages = lookups(&[
        (Collection::Plan, "planid", "plan"),
        (Collection::Lead, "lead_id", "lead"),
    ]);
    stages.push(doc! { "$project": {
        "_id": 1,
        "planid": "$plan._id",
        "plan_name": "$plan.planname",
        "plan_internal_name": "$plan.internal_name",
        "lead_id": "$lead._id",
        "lead_name": "$lead.name",
        "customer_id": 1,
        "startdate": 1,
        "enddate": 1,
        "maxenddate": 1,
        "recordstatus": 1,
        "internalstatus": 1,
        "externalstatus": 1,
        "createdon": 1,
        "modifiedon": 1,
        "createdAt": 1,
        "updatedAt": 1,
    } });
    aggregate_page(
        state.store.as_ref(),
        Collection::Subscription,
        status_filter(&params),
        stages,
        &params,
    )
    .await
}

/// Paid onboarding; sales hears about every customer that lands.
pub async fn create_customer(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    body: JsonBody,
) -> Result<Reply> {
    let reply = provisioning::new_customer(&state, &actor, &body).await?;
    if reply.is_success() {
        log_failure(
            state
                .mailer
                .notify("Welcome to Our Service!", WELCOME.to_string())
                .await,
            "customer notification",
        );
    }
    Ok(reply)
}

pub async fn fetch_customer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Reply> {
    let id = path_id(&id, "Id is required")?;
    fetch_by_id(state.store.as_ref(), Collection::Customer, id, None).await
}

/// Customers with lead, plan and account manager resolved.
pub async fn list_customers(
    State(state): State<Arc<AppState>>,
    ListPath(params): ListPath,
) -> Result<Reply> {
    let mut stages = lookups(&[
        (Collection::Lead, "lead_id", "lead"),
        (Collection::Plan, "planid", "plan"),
        (Collection::DzitraUser, "dzitrauser_id", "duser"),
    ]);
    stages.push(doc! { "$project": {
        "_id": 1,
        "externalstatus": 1,
        "internalstatus": 1,
        "lead_id": "$lead._id",
        "lead_name": "$lead.name",
        "dzitrauser_id": "$duser._id",
        "dzitrauser_name": "$duser.name",
        "dzitrauser_display_name": "$duser.display_name",
        "onboarded_date": 1,
        "planid": "$plan._id",
        "plan_name": "$plan.planname",
        "plan_internal_name": "$plan.internal_name",
        "purchase_id": 1,
        "remind_before": 1,
        "subscription_validity": 1,
        "modifiedon": 1,
        "updatedAt": 1,
    } });
    aggregate_page(
        state.store.as_ref(),
        Collection::Customer,
        status_filter(&params),
        stages,
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
    async fn lists_resolve_names() {
        let h = Harness::new().await;
        let (id, token) = h.admin().await;
        let auth = Some((&id, token.as_str()));
        let plan = h
            .insert(Collection::Plan, doc! { "planname": "Gold", "internal_name": "gold" })
            .await;
        let lead = h.insert(Collection::Lead, doc! { "name": "Ada" }).await;
        h.insert(
            Collection::Subscription,
            doc! { "planid": plan, "lead_id": lead, "startdate": 1_i64 },
        )
        .await;
        h.insert(
            Collection::Customer,
            doc! { "planid": plan, "lead_id": lead, "dzitrauser_id": id },
        )
        .await;

        let (status, body) = h
            .call(Method::GET, "/subscription/list/createdon/-1/1/10", auth, None)
            .await;
        assert_eq!(status, StatusCode::OK);
        let row = &body["data"]["list"][0];
        assert_eq!(row["plan_name"], "Gold");
        assert_eq!(row["lead_name"], "Ada");

        let (_, body) = h
            .call(Method::GET, "/customer/list/createdon/-1/1/10", auth, None)
            .await;
        let row = &body["data"]["list"][0];
        assert_eq!(row["dzitrauser_display_name"], "Root");
        assert_eq!(row["plan_internal_name"], "gold");
    }

    #[tokio::test]
    async fn customer_creation_notifies_sales() {
        let h = Harness::new().await;
        h.enable_mail().await;
        let (id, token) = h.admin().await;
        let paid = h.insert(Collection::PlanType, doc! { "name": "Paid" }).await;
        let plan = h
            .insert(Collection::Plan, doc! { "planname": "Gold", "plantypeid": paid })
            .await;
        let lead = h
            .insert(
                Collection::Lead,
                doc! { "name": "Ada", "business_email": "ada@acme.test", "mobile": "1" },
            )
            .await;

        let (status, body) = h
            .call(
                Method::POST,
                "/customer",
                Some((&id, token.as_str())),
                Some(json!({
                    "planid": plan.to_hex(),
                    "lead_id": lead.to_hex(),
                    "dzitrauser_id": id.to_hex(),
                    "onboarded_date": "2024-01-01",
                    "subscription_validity": "2025-01-01",
                    "remind_before": "7",
                    "purchase_id": "PO-1",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        let subjects: Vec<String> = h.mail.sent().await.into_iter().map(|m| m.subject).collect();
        assert!(subjects.iter().any(|s| s == "Welcome to Our Service!"));
    }
}
