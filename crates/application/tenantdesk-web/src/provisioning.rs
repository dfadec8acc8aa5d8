//! Turning a lead into a tenant.
//!
//! A trial goes through [`new_subscription`]: one subscription row and a
//! first user. A paid plan goes through [`new_customer`]: the customer row
//! is upserted, earlier subscriptions are closed and either the existing
//! user is attached to the customer (`sync`) or the lead's accounts are
//! reset and a fresh owner is invited.
//!
//! Newsletter and role seeding are side effects; their failures are logged
//! and never change the reply.

use bson::{doc, oid::ObjectId, Bson, Document};
use serde_json::Value;
use tenantdesk_core::{Audience, Claims, Collection, PlanTypeName, RuleSet, TenantRole};
use tenantdesk_mongodb::seed::TEMPLATE_LEAD_INVITE;

use crate::error::Result;
use crate::extract::JsonBody;
use crate::mail::{log_failure, Recipients};
use crate::record::{self, active, uq_id, with_created, with_modified};
use crate::reply::Reply;
use crate::state::AppState;

pub fn subscription_rules() -> RuleSet {
    RuleSet::new()
        .object_id("planid", "Plan is required")
        .object_id("lead_id", "Lead is required")
        .required("startdate", "Start date is required")
        .required("enddate", "End date is required")
        .required("maxenddate", "Maximum End Date is required")
}

pub fn customer_rules() -> RuleSet {
    RuleSet::new()
        .object_id("planid", "Plan is required")
        .object_id("lead_id", "Lead is required")
        .object_id("dzitrauser_id", "User is required")
        .required("onboarded_date", "Onboard date is required")
        .required("subscription_validity", "Validity date is required")
        .required("remind_before", "Remind before is required")
        .required("purchase_id", "Remind before is required")
}

fn date(body: &JsonBody, key: &str, message: &'static str) -> Result<i64> {
    Ok(body.millis(key).ok_or(Reply::unprocessable(message))?)
}

fn id(body: &JsonBody, key: &str, message: &'static str) -> Result<ObjectId> {
    Ok(body.oid(key).ok_or(Reply::unprocessable(message))?)
}

/// The plan must be active and of the given type.
async fn check_plan(state: &AppState, plan_id: ObjectId, kind: PlanTypeName) -> Result<()> {
    let mut filter = active();
    filter.insert("_id", plan_id);
    let plan_type = state
        .store
        .find_one(Collection::Plan, filter, Some(doc! { "plantypeid": 1 }))
        .await?
        .and_then(|plan| record::oid(&plan, "plantypeid"))
        .ok_or(Reply::bad_request("Invalid Plan"))?;

    let matching = state
        .store
        .count(
            Collection::PlanType,
            doc! { "_id": plan_type, "name": kind.as_str() },
        )
        .await?;
    if matching == 0 {
        let message = match kind {
            PlanTypeName::Trial => "Invalid Trial Plan Type",
            PlanTypeName::Paid => "Invalid Paid Plan Type",
        };
        return Err(Reply::bad_request(message).into());
    }
    Ok(())
}

pub async fn find_lead(state: &AppState, lead_id: ObjectId) -> Result<Option<Document>> {
    Ok(state
        .store
        .find_one(
            Collection::Lead,
            doc! { "_id": lead_id },
            Some(doc! { "name": 1, "business_email": 1, "mobile": 1 }),
        )
        .await?)
}

/// Lead plus the rule that its email is not used by another lead's user.
async fn claimable_lead(state: &AppState, lead_id: ObjectId) -> Result<Document> {
    let lead = find_lead(state, lead_id)
        .await?
        .ok_or(Reply::bad_request("Invalid Lead"))?;
    let taken = state
        .store
        .count(
            Collection::User,
            doc! {
                "email": record::text(&lead, "business_email"),
                "lead_id": { "$ne": lead_id },
            },
        )
        .await?;
    if taken > 0 {
        return Err(Reply::bad_request("Lead with email already exists in user.").into());
    }
    Ok(lead)
}

/// Trial sign-up for a lead with no account history.
pub async fn new_subscription(state: &AppState, actor: &Bson, body: &JsonBody) -> Result<Reply> {
    body.check(&subscription_rules())?;
    let plan_id = id(body, "planid", "Plan is required")?;
    let lead_id = id(body, "lead_id", "Lead is required")?;
    let startdate = date(body, "startdate", "Start date is required")?;
    let enddate = date(body, "enddate", "End date is required")?;
    let maxenddate = date(body, "maxenddate", "Maximum End Date is required")?;

    check_plan(state, plan_id, PlanTypeName::Trial).await?;
    let lead = claimable_lead(state, lead_id).await?;

    let users = state
        .store
        .count(Collection::User, doc! { "lead_id": lead_id })
        .await?;
    let customers = state
        .store
        .count(Collection::Customer, doc! { "lead_id": lead_id })
        .await?;
    if users > 0 || customers > 0 {
        return Ok(Reply::failure("Lead already have subscription history."));
    }

    let id = ObjectId::new();
    let subscription = with_created(
        doc! {
            "_id": id,
            "planid": plan_id,
            "lead_id": lead_id,
            "uq_id": uq_id(Collection::Subscription, &id),
            "startdate": startdate,
            "enddate": enddate,
            "maxenddate": maxenddate,
        },
        actor,
    );
    state
        .store
        .insert_one(Collection::Subscription, subscription)
        .await?;
    tracing::info!(lead_id = %lead_id, subscription_id = %id, "Trial subscription created");
    create_user(state, actor, &lead, None, false).await
}

fn sync_requested(body: &JsonBody) -> bool {
    matches!(body.get("sync"), Some(Value::Bool(true)))
        || body.str("sync") == Some("true")
}

/// Paid plan: upsert the customer row, then subscription and user.
pub async fn new_customer(state: &AppState, actor: &Bson, body: &JsonBody) -> Result<Reply> {
    body.check(&customer_rules())?;
    let plan_id = id(body, "planid", "Plan is required")?;
    let lead_id = id(body, "lead_id", "Lead is required")?;
    let dzitrauser_id = id(body, "dzitrauser_id", "User is required")?;
    let onboarded = date(body, "onboarded_date", "Onboard date is required")?;
    let validity = date(body, "subscription_validity", "Validity date is required")?;

    check_plan(state, plan_id, PlanTypeName::Paid).await?;
    let lead = claimable_lead(state, lead_id).await?;

    let sync_absent = matches!(body.get("sync"), None | Some(Value::Null));
    if sync_absent {
        let mut filter = active();
        filter.insert("lead_id", lead_id);
        filter.insert("customer_id", doc! { "$exists": false });
        if state.store.count(Collection::User, filter).await? > 0 {
            return Ok(Reply::ok("Account Exists").status(2));
        }
    }

    let mut filter = active();
    filter.insert("lead_id", lead_id);
    let set = with_modified(
        doc! {
            "planid": plan_id,
            "lead_id": lead_id,
            "dzitrauser_id": dzitrauser_id,
            "onboarded_date": onboarded,
            "subscription_validity": validity,
            "remind_before": body.text("remind_before"),
            "purchase_id": body.text("purchase_id"),
            "internalstatus": 1,
            "externalstatus": 1,
        },
        actor,
    );
    let update = doc! {
        "$set": set,
        "$setOnInsert": {
            "recordstatus": 1,
            "createdon": tenantdesk_mongodb::now_millis(),
            "createdby": actor.clone(),
        },
    };
    let outcome = state
        .store
        .update_one(Collection::Customer, filter, update, true)
        .await?;
    if !outcome.applied() {
        return Ok(Reply::bad_request("Error in creating customer"));
    }
    if let Some(Bson::ObjectId(customer_id)) = outcome.upserted_id {
        let stamp = state
            .store
            .update_one(
                Collection::Customer,
                doc! { "_id": customer_id },
                doc! { "$set": { "uq_id": uq_id(Collection::Customer, &customer_id) } },
                false,
            )
            .await;
        if let Err(e) = stamp {
            tracing::warn!(error = %e, customer_id = %customer_id, "Customer uq_id not set");
        }
    }

    create_subscription(state, actor, &lead, sync_requested(body)).await
}

/// Close the lead's earlier subscriptions and open one from the customer row.
pub async fn create_subscription(
    state: &AppState,
    actor: &Bson,
    lead: &Document,
    sync: bool,
) -> Result<Reply> {
    let lead_id = record::oid(lead, "_id").ok_or(Reply::bad_request("Invalid Lead"))?;
    let mut filter = active();
    filter.insert("lead_id", lead_id);
    let Some(customer) = state.store.find_one(Collection::Customer, filter, None).await? else {
        return Ok(Reply::failure("Error in fetching customer"));
    };

    let closed = state
        .store
        .update_many(
            Collection::Subscription,
            doc! { "lead_id": lead_id },
            doc! { "$set": deactivated(actor) },
        )
        .await?;
    if closed.matched > 0 && closed.modified == 0 {
        return Ok(Reply::failure("Error in processing subscription"));
    }

    let id = ObjectId::new();
    let validity = customer
        .get("subscription_validity")
        .cloned()
        .unwrap_or(Bson::Null);
    let subscription = with_created(
        doc! {
            "_id": id,
            "planid": customer.get("planid").cloned().unwrap_or(Bson::Null),
            "lead_id": lead_id,
            "customer_id": customer.get("_id").cloned().unwrap_or(Bson::Null),
            "uq_id": uq_id(Collection::Subscription, &id),
            "startdate": customer.get("onboarded_date").cloned().unwrap_or(Bson::Null),
            "enddate": validity.clone(),
            "maxenddate": validity,
        },
        actor,
    );
    state
        .store
        .insert_one(Collection::Subscription, subscription)
        .await?;
    tracing::info!(lead_id = %lead_id, subscription_id = %id, "Paid subscription created");
    create_user(state, actor, lead, Some(&customer), sync).await
}

fn deactivated(actor: &Bson) -> Document {
    with_modified(doc! { "internalstatus": 0, "externalstatus": 0 }, actor)
}

/// First account of a tenant.
///
/// With `sync` the lead's active user is attached to the customer. Without
/// it, a customer's earlier users, credentials and role links are switched
/// off before a new owner is created and invited.
pub async fn create_user(
    state: &AppState,
    actor: &Bson,
    lead: &Document,
    customer: Option<&Document>,
    sync: bool,
) -> Result<Reply> {
    let lead_id = record::oid(lead, "_id").ok_or(Reply::bad_request("Invalid Lead"))?;
    let email = record::text(lead, "business_email");
    let customer_id = customer.and_then(|c| record::oid(c, "_id"));

    if sync {
        let mut filter = active();
        filter.insert("lead_id", lead_id);
        let attached = state
            .store
            .update_one(
                Collection::User,
                filter,
                doc! { "$set": {
                    "customer_id": customer_id.map(Bson::ObjectId).unwrap_or(Bson::Null),
                } },
                false,
            )
            .await?;
        if attached.matched == 0 {
            return Ok(Reply::failure("Error while syncing the account."));
        }
        upsert_newsletter(state, actor, email, true, true).await;
        return Ok(Reply::ok("Customer created successfully."));
    }

    if customer_id.is_some() {
        let resets = [
            (Collection::User, "lead_id"),
            (Collection::UserCredential, "leadid"),
            (Collection::UserRole, "leadid"),
        ];
        for (collection, field) in resets {
            let outcome = state
                .store
                .update_many(
                    collection,
                    doc! { field: lead_id },
                    doc! { "$set": deactivated(actor) },
                )
                .await?;
            if outcome.matched > 0 && outcome.modified == 0 {
                return Ok(Reply::failure("Error while unsyncing the account."));
            }
        }
    }

    let user_id = ObjectId::new();
    let mut user = doc! {
        "_id": user_id,
        "firstname": lead.get("name").cloned().unwrap_or(Bson::Null),
        "email": email,
        "mobile": lead.get("mobile").cloned().unwrap_or(Bson::Null),
        "emailinvite": false,
        "twofaenrollment": false,
        "lead_id": lead_id,
    };
    if let Some(customer_id) = customer_id {
        user.insert("customer_id", customer_id);
    }
    state
        .store
        .insert_one(Collection::User, with_created(user, actor))
        .await?;
    tracing::info!(lead_id = %lead_id, user_id = %user_id, "Tenant owner created");

    upsert_newsletter(state, actor, email, true, customer_id.is_some()).await;
    seed_tenant_roles(state, actor, lead_id, user_id).await;

    let reply = send_invite_link(state, user_id, lead).await?;
    if !reply.is_success() {
        return Ok(reply);
    }
    let message = if customer_id.is_some() {
        "Customer created successfully"
    } else {
        "Subscription created successfully"
    };
    Ok(Reply {
        message: message.into(),
        ..reply
    })
}

/// Newsletter row for a lead or customer, keyed by email.
pub async fn upsert_newsletter(
    state: &AppState,
    actor: &Bson,
    email: &str,
    is_lead: bool,
    is_customer: bool,
) {
    let set = with_modified(
        doc! {
            "email": email,
            "emailvalidated": false,
            "optedout": false,
            "is_lead": is_lead,
            "is_customer": is_customer,
            "internalstatus": 1,
            "externalstatus": 1,
        },
        actor,
    );
    let update = doc! {
        "$set": set,
        "$setOnInsert": {
            "recordstatus": 1,
            "createdon": tenantdesk_mongodb::now_millis(),
            "createdby": actor.clone(),
        },
    };
    if let Err(e) = state
        .store
        .update_one(Collection::Newsletter, doc! { "email": email }, update, true)
        .await
    {
        tracing::warn!(error = %e, email, "Newsletter upsert failed");
    }
}

async fn upsert_role(
    state: &AppState,
    actor: &Bson,
    lead_id: ObjectId,
    role: TenantRole,
) -> Result<Option<ObjectId>> {
    let filter = doc! { "name": role.as_str(), "leadid": lead_id };
    let update = doc! {
        "$set": with_modified(
            doc! {
                "name": role.as_str(),
                "leadid": lead_id,
                "internalstatus": 1,
                "externalstatus": 1,
            },
            actor,
        ),
        "$setOnInsert": {
            "recordstatus": 1,
            "createdon": tenantdesk_mongodb::now_millis(),
            "createdby": actor.clone(),
        },
    };
    let outcome = state
        .store
        .update_one(Collection::Role, filter.clone(), update, true)
        .await?;
    if let Some(Bson::ObjectId(id)) = outcome.upserted_id {
        return Ok(Some(id));
    }
    let existing = state
        .store
        .find_one(Collection::Role, filter, Some(doc! { "_id": 1 }))
        .await?;
    Ok(existing.and_then(|r| record::oid(&r, "_id")))
}

async fn link_owner(
    state: &AppState,
    actor: &Bson,
    lead_id: ObjectId,
    user_id: ObjectId,
) -> Result<()> {
    let Some(role_id) = upsert_role(state, actor, lead_id, TenantRole::AccountOwner).await? else {
        tracing::warn!(lead_id = %lead_id, "Account Owner role missing after upsert");
        return Ok(());
    };
    let link = with_created(
        doc! { "userid": user_id, "leadid": lead_id, "roleid": role_id },
        actor,
    );
    state.store.insert_one(Collection::UserRole, link).await?;
    Ok(())
}

/// Tenant role catalogue, with the new user linked as account owner.
pub async fn seed_tenant_roles(
    state: &AppState,
    actor: &Bson,
    lead_id: ObjectId,
    user_id: ObjectId,
) {
    if let Err(e) = link_owner(state, actor, lead_id, user_id).await {
        tracing::warn!(error = %e, lead_id = %lead_id, "Account owner link failed");
    }
    for role in TenantRole::ALL
        .into_iter()
        .filter(|r| *r != TenantRole::AccountOwner)
    {
        if let Err(e) = upsert_role(state, actor, lead_id, role).await {
            tracing::warn!(error = %e, role = role.as_str(), "Role seed failed");
        }
    }
}

/// Mail the lead a link to set their password.
pub async fn send_invite_link(
    state: &AppState,
    user_id: ObjectId,
    lead: &Document,
) -> Result<Reply> {
    let email = record::text(lead, "business_email");
    let token = state
        .invite_tokens
        .sign(Claims::new(user_id.to_hex(), Audience::Customer).email(email))?;
    let link = format!("/create-password?tk={token}");

    let outcome = state
        .mailer
        .send_template(
            TEMPLATE_LEAD_INVITE,
            Recipients::Single(email.to_string()),
            &[("lead_name", record::text(lead, "name")), ("link", link.as_str())],
        )
        .await;
    log_failure(outcome, "lead invite");

    Ok(Reply::ok("Invite sent successfully").debug_data(state.is_dev(), || Value::from(link)))
}

/// Create the lead's user when missing, then send the invite.
pub async fn invite_lead(state: &AppState, actor: &Bson, lead_id: ObjectId) -> Result<Reply> {
    let lead = find_lead(state, lead_id)
        .await?
        .ok_or(Reply::bad_request("Invalid Lead"))?;
    let email = record::text(&lead, "business_email");

    let user = state
        .store
        .find_one(Collection::User, doc! { "email": email }, None)
        .await?;
    if user
        .as_ref()
        .is_some_and(|u| u.get_bool("emailinvite").unwrap_or(false))
    {
        return Ok(Reply::bad_request("Lead with email already exists in user."));
    }

    let user_id = match user.as_ref().and_then(|u| record::oid(u, "_id")) {
        Some(id) => id,
        None => {
            let customer = state
                .store
                .find_one(
                    Collection::Customer,
                    doc! { "lead_id": lead_id },
                    Some(doc! { "_id": 1 }),
                )
                .await?;
            let id = ObjectId::new();
            let mut fields = doc! {
                "_id": id,
                "firstname": lead.get("name").cloned().unwrap_or(Bson::Null),
                "email": email,
                "mobile": lead.get("mobile").cloned().unwrap_or(Bson::Null),
                "lead_id": lead_id,
                "emailinvite": false,
                "twofaenrollment": false,
            };
            if let Some(customer_id) = customer.as_ref().and_then(|c| record::oid(c, "_id")) {
                fields.insert("customer_id", customer_id);
            }
            if let Err(e) = state
                .store
                .insert_one(Collection::User, with_created(fields, actor))
                .await
            {
                tracing::error!(error = %e, lead_id = %lead_id, "Invite user insert failed");
                return Ok(Reply::failure("Error in creating user"));
            }
            id
        }
    };
    send_invite_link(state, user_id, &lead).await
}
