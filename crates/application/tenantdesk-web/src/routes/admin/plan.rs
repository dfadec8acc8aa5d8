//! Plans and the read-only type lists behind them.

use std::sync::Arc;

use axum::extract::{Path, State};
use bson::{doc, oid::ObjectId, Bson, Document};
use tenantdesk_core::{Collection, PlanTypeName, RuleSet};

use crate::error::Result;
use crate::extract::{path_id, Actor, JsonBody, ListPath};
use crate::listing::{aggregate_page, all_active, fetch_by_id, lookup_one, status_filter};
use crate::record::{active, uq_id, with_created, with_modified};
use crate::reply::Reply;
use crate::state::AppState;

fn rules(update: bool) -> RuleSet {
    let rules = if update {
        RuleSet::new().object_id("_id", "Id is required")
    } else {
        RuleSet::new()
    };
    rules
        .required("planname", "Name is required")
        .required("internal_name", "Internal Name is required")
        .numeric("usercount", "User Count is required")
        .numeric("dayscount", "Days Count is required")
        .numeric("price", "Price is required")
}

const OPTIONAL_NUMBERS: [&str; 4] = ["remainder1", "remainder2", "days", "grace_period"];

async fn plan_type_is_active(state: &AppState, body: &JsonBody) -> Result<bool> {
    let Some(id) = body.oid("plantypeid") else {
        return Ok(false);
    };
    let mut filter = active();
    filter.insert("_id", id);
    Ok(state.store.count(Collection::PlanType, filter).await? > 0)
}

fn number(body: &JsonBody, key: &str) -> Bson {
    body.number(key).unwrap_or(Bson::Null)
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    body: JsonBody,
) -> Result<Reply> {
    body.check(&rules(false))?;
    if !plan_type_is_active(&state, &body).await? {
        return Ok(Reply::bad_request("Invalid Plan Type"));
    }
    let name = body.string("planname");
    if state
        .store
        .count(Collection::Plan, doc! { "planname": name.as_str() })
        .await?
        > 0
    {
        return Ok(Reply::bad_request("Name already exists"));
    }

    let id = ObjectId::new();
    let mut fields = doc! {
        "_id": id,
        "planname": name,
        "internal_name": body.text("internal_name"),
        "usercount": number(&body, "usercount"),
        "dayscount": number(&body, "dayscount"),
        "price": number(&body, "price"),
        "plantypeid": body.oid_or_null("plantypeid"),
        "uq_id": uq_id(Collection::Plan, &id),
    };
    for key in OPTIONAL_NUMBERS {
        if body.flag(key) {
            if let Some(n) = body.number(key) {
                fields.insert(key, n);
            }
        }
    }
    match state
        .store
        .insert_one(Collection::Plan, with_created(fields, &actor))
        .await
    {
        Ok(_) => Ok(Reply::ok("Plan created successfully")),
        Err(e) => {
            tracing::error!(error = %e, "Plan insert failed");
            Ok(Reply::failure("Error in creating plan"))
        }
    }
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    body: JsonBody,
) -> Result<Reply> {
    body.check(&rules(true))?;
    if !plan_type_is_active(&state, &body).await? {
        return Ok(Reply::bad_request("Invalid Plan Type"));
    }
    let id = body.oid_or_null("_id");
    let name = body.string("planname");
    let clash = state
        .store
        .count(
            Collection::Plan,
            doc! { "planname": name.as_str(), "_id": { "$ne": id.clone() } },
        )
        .await?;
    if clash > 0 {
        return Ok(Reply::bad_request("Name already exists"));
    }

    let mut set = doc! {
        "planname": name,
        "internal_name": body.text("internal_name"),
        "usercount": number(&body, "usercount"),
        "dayscount": number(&body, "dayscount"),
        "price": number(&body, "price"),
        "plantypeid": body.oid_or_null("plantypeid"),
    };
    for key in OPTIONAL_NUMBERS {
        set.insert(key, number(&body, key));
    }
    let outcome = state
        .store
        .update_one(
            Collection::Plan,
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
    fetch_by_id(state.store.as_ref(), Collection::Plan, id, None).await
}

/// Plans with their type name resolved.
pub async fn list(
    State(state): State<Arc<AppState>>,
    ListPath(params): ListPath,
) -> Result<Reply> {
    let mut stages: Vec<Document> =
        lookup_one(Collection::PlanType, "plantypeid", "_id", "plantype").into();
    stages.push(doc! { "$project": {
        "_id": 1,
        "planname": 1,
        "internal_name": 1,
        "usercount": 1,
        "dayscount": 1,
        "remainder1": 1,
        "remainder2": 1,
        "plantypeid": "$plantype._id",
        "plantypename": "$plantype.name",
        "price": 1,
        "internalstatus": 1,
        "externalstatus": 1,
        "createdon": 1,
        "modifiedon": 1,
        "createdAt": 1,
        "updatedAt": 1,
    } });
    aggregate_page(
        state.store.as_ref(),
        Collection::Plan,
        status_filter(&params),
        stages,
        &params,
    )
    .await
}

pub async fn active_plans(State(state): State<Arc<AppState>>) -> Result<Reply> {
    all_active(state.store.as_ref(), Collection::Plan, doc! {}).await
}

async fn active_of_type(state: &AppState, kind: PlanTypeName) -> Result<Reply> {
    let plan_type = state
        .store
        .find_one(
            Collection::PlanType,
            doc! { "name": kind.as_str() },
            Some(doc! { "_id": 1 }),
        )
        .await?
        .and_then(|t| t.get_object_id("_id").ok());
    let Some(plan_type) = plan_type else {
        tracing::warn!(plan_type = kind.as_str(), "Plan type not seeded");
        return Ok(Reply::success(serde_json::Value::Array(vec![])));
    };
    all_active(
        state.store.as_ref(),
        Collection::Plan,
        doc! { "plantypeid": plan_type },
    )
    .await
}

pub async fn active_trial_plans(State(state): State<Arc<AppState>>) -> Result<Reply> {
    active_of_type(&state, PlanTypeName::Trial).await
}

pub async fn active_paid_plans(State(state): State<Arc<AppState>>) -> Result<Reply> {
    active_of_type(&state, PlanTypeName::Paid).await
}

pub async fn active_plan_types(State(state): State<Arc<AppState>>) -> Result<Reply> {
    all_active(state.store.as_ref(), Collection::PlanType, doc! {}).await
}

pub async fn active_industry_types(State(state): State<Arc<AppState>>) -> Result<Reply> {
    all_active(state.store.as_ref(), Collection::IndustryType, doc! {}).await
}

#[cfg(test)]
mod tests {
    use crate::testing::Harness;
    use axum::http::{Method, StatusCode};
    use bson::doc;
    use serde_json::json;
    use tenantdesk_core::Collection;

    #[tokio::test]
    async fn plan_lifecycle() {
        let h = Harness::new().await;
        let (id, token) = h.admin().await;
        let auth = Some((&id, token.as_str()));
        let trial = h.insert(Collection::PlanType, doc! { "name": "Trial" }).await;
        let paid = h.insert(Collection::PlanType, doc! { "name": "Paid" }).await;

        let plan = json!({
            "planname": "Starter",
            "internal_name": "starter",
            "usercount": "5",
            "dayscount": 30,
            "price": 0,
            "remainder1": 3,
            "plantypeid": trial.to_hex(),
        });
        let (status, body) = h.call(Method::POST, "/plan", auth, Some(plan.clone())).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["message"], "Plan created successfully");

        let stored = h.find(Collection::Plan, doc! { "planname": "Starter" }).await.unwrap();
        assert_eq!(stored.get_i64("usercount").unwrap(), 5);
        assert_eq!(stored.get_i64("remainder1").unwrap(), 3);
        assert!(!stored.contains_key("remainder2"));

        let (status, body) = h.call(Method::POST, "/plan", auth, Some(plan)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Name already exists");

        let (_, body) = h.call(Method::GET, "/plan/list/planname/1/1/10", auth, None).await;
        assert_eq!(body["data"]["list"][0]["plantypename"], "Trial");
        assert_eq!(body["data"]["pagination"]["total"], 1);

        let (_, body) = h.call(Method::GET, "/plan/all/active/trial", auth, None).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
        let (_, body) = h.call(Method::GET, "/plan/all/active/paid", auth, None).await;
        assert!(body["data"].as_array().unwrap().is_empty());

        let (_, body) = h.call(Method::GET, "/plantype/all/active", auth, None).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 2);
        let _ = paid;
    }

    #[tokio::test]
    async fn huge_page_numbers_are_rejected() {
        let h = Harness::new().await;
        let (id, token) = h.admin().await;
        let auth = Some((&id, token.as_str()));

        let (status, body) = h
            .call(Method::GET, "/plan/list/planname/1/9223372036854775807/4", auth, None)
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{body}");
        assert_eq!(body["message"], "Page is required");

        let (status, body) = h
            .call(Method::GET, "/plan/list/planname/1/1/99999999999999999999", auth, None)
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["message"], "Size is required");
    }

    #[tokio::test]
    async fn plan_needs_an_active_type() {
        let h = Harness::new().await;
        let (id, token) = h.admin().await;
        let (status, body) = h
            .call(
                Method::POST,
                "/plan",
                Some((&id, token.as_str())),
                Some(json!({
                    "planname": "Ghost",
                    "internal_name": "ghost",
                    "usercount": 1,
                    "dayscount": 1,
                    "price": 1,
                    "plantypeid": bson::oid::ObjectId::new().to_hex(),
                })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid Plan Type");
    }
}
