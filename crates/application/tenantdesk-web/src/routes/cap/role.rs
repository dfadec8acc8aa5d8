//! Tenant roles and who holds them.

use std::collections::HashSet;
use std::sync::Arc;

use axum::extract::{Path, State};
use bson::{doc, oid::ObjectId, Bson, Document};
use serde_json::Value;
use tenantdesk_core::{Collection, RuleSet};
use tenantdesk_mongodb::FindOptions;

use crate::error::Result;
use crate::extract::{list_params, path_id, CapContext, JsonBody};
use crate::listing::sort_doc;
use crate::record::{self, with_created};
use crate::reply::{documents_to_json, Reply};
use crate::state::AppState;

fn user_fields() -> Document {
    doc! { "email": 1, "firstname": 1, "middlename": 1, "lastname": 1, "displayname": 1 }
}

/// Active users holding `role_id`.
async fn holders(state: &AppState, role_id: ObjectId) -> Result<Vec<Document>> {
    let links = state
        .store
        .find(
            Collection::UserRole,
            doc! { "roleid": role_id, "internalstatus": 1 },
            FindOptions::default().projection(doc! { "userid": 1 }),
        )
        .await?;
    let ids: Vec<Bson> = links
        .iter()
        .filter_map(|l| record::oid(l, "userid"))
        .map(Bson::ObjectId)
        .collect();
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    Ok(state
        .store
        .find(
            Collection::User,
            doc! { "_id": { "$in": ids }, "internalstatus": 1 },
            FindOptions::default().projection(user_fields()),
        )
        .await?)
}

/// Page of the tenant's active roles, each with its users and their count.
pub async fn list(
    State(state): State<Arc<AppState>>,
    ctx: CapContext,
    Path((sort, order, page, size)): Path<(String, String, String, String)>,
) -> Result<Reply> {
    let params = list_params("active", &sort, &order, &page, &size)?;
    let filter = doc! { "leadid": ctx.lead_id, "internalstatus": { "$in": [1] } };
    let total = state.store.count(Collection::Role, filter.clone()).await?;
    let roles = state
        .store
        .find(
            Collection::Role,
            filter,
            FindOptions::default()
                .projection(doc! {
                    "name": 1,
                    "createdon": 1,
                    "externalstatus": 1,
                    "modifiedon": 1,
                    "recordstatus": 1,
                })
                .sort(sort_doc(&params))
                .skip(params.skip())
                .limit(params.limit()),
        )
        .await?;

    let mut list = Vec::with_capacity(roles.len());
    for mut role in roles {
        let users = match record::oid(&role, "_id") {
            Some(id) => holders(&state, id).await?,
            None => Vec::new(),
        };
        role.insert("usercount", users.len() as i64);
        role.insert(
            "users",
            users.into_iter().map(Bson::Document).collect::<Vec<_>>(),
        );
        list.push(role);
    }
    let pagination = params.page_data(total).with_current_size(list.len());
    Ok(Reply::page(list, pagination))
}

/// Tenant users free to take the role: those without another active role.
/// `hasrole` marks the ones already holding it.
pub async fn users_for_role(
    State(state): State<Arc<AppState>>,
    ctx: CapContext,
    Path(id): Path<String>,
) -> Result<Reply> {
    let role_id = path_id(&id, "Role is required")?;
    let elsewhere = state
        .store
        .find(
            Collection::UserRole,
            doc! {
                "roleid": { "$ne": role_id },
                "leadid": ctx.lead_id,
                "internalstatus": { "$in": [1] },
            },
            FindOptions::default().projection(doc! { "userid": 1 }),
        )
        .await?;
    let taken: Vec<Bson> = elsewhere
        .iter()
        .filter_map(|l| record::oid(l, "userid"))
        .map(Bson::ObjectId)
        .collect();

    let users = state
        .store
        .find(
            Collection::User,
            doc! {
                "lead_id": ctx.lead_id,
                "internalstatus": { "$in": [1] },
                "_id": { "$nin": taken },
            },
            FindOptions::default().projection(user_fields()),
        )
        .await?;
    let holding: HashSet<ObjectId> = holders(&state, role_id)
        .await?
        .iter()
        .filter_map(|u| record::oid(u, "_id"))
        .collect();

    let users: Vec<Document> = users
        .into_iter()
        .map(|mut user| {
            let has = record::oid(&user, "_id").is_some_and(|id| holding.contains(&id));
            user.insert("hasrole", has);
            user
        })
        .collect();
    Ok(Reply::success(documents_to_json(&users)))
}

/// Replace the holders of `roleid` with `userids`.
pub async fn assign_users(
    State(state): State<Arc<AppState>>,
    ctx: CapContext,
    body: JsonBody,
) -> Result<Reply> {
    if !body.get("userids").is_some_and(Value::is_array) {
        return Ok(Reply::unprocessable("User is required"));
    }
    body.check(&RuleSet::new().object_id("roleid", "Role is required"))?;
    let role_id = body.oid("roleid").ok_or(Reply::unprocessable("Role is required"))?;
    let owned = state
        .store
        .count(Collection::Role, doc! { "_id": role_id, "leadid": ctx.lead_id })
        .await?;
    if owned == 0 {
        return Ok(Reply::bad_request("Invalid Role"));
    }

    let actor = Bson::ObjectId(ctx.user_id);
    let mut retire = record::modified(&actor);
    retire.extend(doc! { "internalstatus": 0, "externalstatus": 0 });
    let retired = state
        .store
        .update_many(
            Collection::UserRole,
            doc! { "leadid": ctx.lead_id, "roleid": role_id, "internalstatus": 1 },
            doc! { "$set": retire },
        )
        .await?;
    if retired.matched > 0 && retired.modified == 0 {
        return Ok(Reply::failure("Error in updating user role"));
    }

    for user_id in body.oids("userids") {
        let link = with_created(
            doc! { "userid": user_id, "roleid": role_id, "leadid": ctx.lead_id },
            &actor,
        );
        state
            .store
            .update_one(
                Collection::UserRole,
                doc! { "leadid": ctx.lead_id, "roleid": role_id, "userid": user_id },
                doc! { "$set": link },
                true,
            )
            .await?;
    }
    tracing::info!(role_id = %role_id, lead_id = %ctx.lead_id, "Role holders replaced");
    Ok(Reply::ok("User role updated successfully"))
}
