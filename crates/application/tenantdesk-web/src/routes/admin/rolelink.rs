//! User to role assignments, for admin accounts and for tenant users.

use std::sync::Arc;

use axum::extract::{Path, State};
use bson::{doc, Bson};
use serde_json::Value;
use tenantdesk_core::{Collection, RuleSet};
use tenantdesk_mongodb::FindOptions;

use crate::error::Result;
use crate::extract::{path_id, Actor, JsonBody};
use crate::listing::hide_audit;
use crate::record::{self, with_created, with_modified};
use crate::reply::{document_to_json, documents_to_json, Reply};
use crate::state::AppState;

fn no_role() -> Reply {
    Reply::ok("No role found for the user").data(Value::Array(vec![]))
}

fn admin_rules(update: bool) -> RuleSet {
    let rules = if update {
        RuleSet::new().object_id("_id", "Id is required")
    } else {
        RuleSet::new()
    };
    rules
        .object_id("dzitrauser_id", "User is required")
        .object_id("dzitrarole_id", "Role is required")
}

/// Admin accounts may hold several roles, each pair once.
pub async fn create_admin_link(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    body: JsonBody,
) -> Result<Reply> {
    body.check(&admin_rules(false))?;
    let pair = doc! {
        "dzitrauser_id": body.oid_or_null("dzitrauser_id"),
        "dzitrarole_id": body.oid_or_null("dzitrarole_id"),
    };
    if state.store.count(Collection::DzitraUserRole, pair.clone()).await? > 0 {
        return Ok(Reply::bad_request("role already exists for the user"));
    }
    match state
        .store
        .insert_one(Collection::DzitraUserRole, with_created(pair, &actor))
        .await
    {
        Ok(_) => Ok(Reply::ok("User Role created successfully")),
        Err(e) => {
            tracing::error!(error = %e, "Admin role link insert failed");
            Ok(Reply::failure("Error in creating userrole"))
        }
    }
}

pub async fn update_admin_link(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    body: JsonBody,
) -> Result<Reply> {
    body.check(&admin_rules(true))?;
    let id = body.oid_or_null("_id");
    let pair = doc! {
        "dzitrauser_id": body.oid_or_null("dzitrauser_id"),
        "dzitrarole_id": body.oid_or_null("dzitrarole_id"),
    };
    let mut clash = pair.clone();
    clash.insert("_id", doc! { "$ne": id.clone() });
    if state.store.count(Collection::DzitraUserRole, clash).await? > 0 {
        return Ok(Reply::bad_request("role already exists for the user"));
    }
    let outcome = state
        .store
        .update_one(
            Collection::DzitraUserRole,
            doc! { "_id": id },
            doc! { "$set": with_modified(pair, &actor) },
            false,
        )
        .await?;
    if outcome.matched == 0 {
        return Ok(Reply::bad_request("Error in updating"));
    }
    Ok(Reply::ok("Updated successfully"))
}

/// Every admin role linked to the account.
pub async fn admin_roles(
    State(state): State<Arc<AppState>>,
    Path(user): Path<String>,
) -> Result<Reply> {
    let user = path_id(&user, "Id is required")?;
    let links = state
        .store
        .find(
            Collection::DzitraUserRole,
            doc! { "dzitrauser_id": user },
            FindOptions::default().projection(doc! { "dzitrarole_id": 1 }),
        )
        .await?;
    let ids: Vec<Bson> = links
        .iter()
        .filter_map(|l| record::oid(l, "dzitrarole_id"))
        .map(Bson::ObjectId)
        .collect();
    if ids.is_empty() {
        return Ok(no_role());
    }
    let roles = state
        .store
        .find(
            Collection::DzitraRole,
            doc! { "_id": { "$in": ids } },
            FindOptions::default().projection(hide_audit()),
        )
        .await?;
    Ok(Reply::success(documents_to_json(&roles)))
}

fn tenant_rules(update: bool) -> RuleSet {
    let rules = if update {
        RuleSet::new().object_id("_id", "Id is required")
    } else {
        RuleSet::new()
    };
    rules
        .object_id("userid", "User is required")
        .object_id("roleid", "Role is required")
}

/// A tenant user holds one active role at a time.
pub async fn create_tenant_link(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    body: JsonBody,
) -> Result<Reply> {
    body.check(&tenant_rules(false))?;
    let user = body.oid_or_null("userid");
    let held = state
        .store
        .count(
            Collection::UserRole,
            doc! { "userid": user.clone(), "internalstatus": 1 },
        )
        .await?;
    if held > 0 {
        return Ok(Reply::bad_request("role already exists for the user"));
    }
    let link = doc! {
        "userid": user,
        "leadid": body.oid_or_null("leadid"),
        "roleid": body.oid_or_null("roleid"),
    };
    match state
        .store
        .insert_one(Collection::UserRole, with_created(link, &actor))
        .await
    {
        Ok(_) => Ok(Reply::ok("UserRole created successfully")),
        Err(e) => {
            tracing::error!(error = %e, "Tenant role link insert failed");
            Ok(Reply::failure("Error in creating userrole"))
        }
    }
}

pub async fn update_tenant_link(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    body: JsonBody,
) -> Result<Reply> {
    body.check(&tenant_rules(true))?;
    let id = body.oid_or_null("_id");
    let user = body.oid_or_null("userid");
    let held = state
        .store
        .count(
            Collection::UserRole,
            doc! { "userid": user.clone(), "internalstatus": 1, "_id": { "$ne": id.clone() } },
        )
        .await?;
    if held > 0 {
        return Ok(Reply::bad_request("role already exists for the user"));
    }
    let set = with_modified(
        doc! {
            "userid": user,
            "leadid": body.oid_or_null("leadid"),
            "roleid": body.oid_or_null("roleid"),
        },
        &actor,
    );
    let outcome = state
        .store
        .update_one(Collection::UserRole, doc! { "_id": id }, doc! { "$set": set }, false)
        .await?;
    if outcome.matched == 0 {
        return Ok(Reply::bad_request("Error in updating"));
    }
    Ok(Reply::ok("Updated successfully"))
}

/// The tenant user's active role.
pub async fn tenant_role(
    State(state): State<Arc<AppState>>,
    Path(user): Path<String>,
) -> Result<Reply> {
    let user = path_id(&user, "Id is required")?;
    let Some(role_id) = state
        .store
        .find_one(
            Collection::UserRole,
            doc! { "userid": user, "internalstatus": 1 },
            Some(doc! { "roleid": 1 }),
        )
        .await?
        .and_then(|link| record::oid(&link, "roleid"))
    else {
        return Ok(no_role());
    };
    match state
        .store
        .find_one(Collection::Role, doc! { "_id": role_id }, Some(hide_audit()))
        .await?
    {
        Some(role) => Ok(Reply::success(document_to_json(&role))),
        None => Ok(no_role()),
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::Harness;
    use axum::http::{Method, StatusCode};
    use bson::{doc, oid::ObjectId};
    use serde_json::json;
    use tenantdesk_core::Collection;

    #[tokio::test]
    async fn admin_links_are_unique_per_pair() {
        let h = Harness::new().await;
        let (id, token) = h.admin().await;
        let auth = Some((&id, token.as_str()));
        let role = h
            .insert(Collection::DzitraRole, doc! { "name": "Ops", "description": "d" })
            .await;
        let link = json!({ "dzitrauser_id": id.to_hex(), "dzitrarole_id": role.to_hex() });

        let (status, _) = h.call(Method::POST, "/dzitrauserrole", auth, Some(link.clone())).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = h.call(Method::POST, "/dzitrauserrole", auth, Some(link)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "role already exists for the user");

        let (_, body) = h
            .call(Method::GET, &format!("/dzitrauserrole/{}", id.to_hex()), auth, None)
            .await;
        assert_eq!(body["data"][0]["name"], "Ops");

        let (_, body) = h
            .call(
                Method::GET,
                &format!("/dzitrauserrole/{}", ObjectId::new().to_hex()),
                auth,
                None,
            )
            .await;
        assert_eq!(body["message"], "No role found for the user");
        assert_eq!(body["data"], json!([]));
    }

    #[tokio::test]
    async fn tenant_user_holds_one_role() {
        let h = Harness::new().await;
        let (id, token) = h.admin().await;
        let auth = Some((&id, token.as_str()));
        let user = ObjectId::new();
        let owner = h.insert(Collection::Role, doc! { "name": "Account Owner" }).await;
        let other = h.insert(Collection::Role, doc! { "name": "User" }).await;

        let (status, body) = h
            .call(
                Method::POST,
                "/userrole",
                auth,
                Some(json!({ "userid": user.to_hex(), "roleid": owner.to_hex() })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        let (status, _) = h
            .call(
                Method::POST,
                "/userrole",
                auth,
                Some(json!({ "userid": user.to_hex(), "roleid": other.to_hex() })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, body) = h
            .call(Method::GET, &format!("/userrole/{}", user.to_hex()), auth, None)
            .await;
        assert_eq!(body["data"]["name"], "Account Owner");
    }
}
