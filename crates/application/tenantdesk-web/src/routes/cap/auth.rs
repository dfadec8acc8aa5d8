//! Tenant console sign-in.
//!
//! A successful sign-in rotates the user's epoch, so every token issued
//! before it stops unsealing in the auth layer.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use bson::{doc, oid::ObjectId, Document};
use serde_json::json;
use tenantdesk_core::crypto::verify_password;
use tenantdesk_core::{Audience, Claims, Collection, Epoch, RuleSet, TenantRole};
use tenantdesk_mongodb::now_millis;

use crate::error::Result;
use crate::extract::JsonBody;
use crate::record::{self, active};
use crate::reply::Reply;
use crate::state::AppState;

fn signin_rules() -> RuleSet {
    RuleSet::new()
        .required("username", "Username is required!")
        .required("password", "Password is required")
}

/// The user's active role when it may open the tenant console.
async fn console_role(state: &AppState, user_id: ObjectId) -> Result<Option<TenantRole>> {
    let mut filter = active();
    filter.insert("userid", user_id);
    let Some(role_id) = state
        .store
        .find_one(Collection::UserRole, filter, Some(doc! { "roleid": 1 }))
        .await?
        .and_then(|link| record::oid(&link, "roleid"))
    else {
        return Ok(None);
    };
    let role = state
        .store
        .find_one(Collection::Role, doc! { "_id": role_id }, Some(doc! { "name": 1 }))
        .await?;
    Ok(role
        .and_then(|r| TenantRole::from_name(record::text(&r, "name")))
        .filter(|r| r.can_sign_in_cap()))
}

/// Subscription of the lead running right now.
async fn running_subscription(state: &AppState, lead_id: ObjectId) -> Result<Option<Document>> {
    let now = now_millis();
    let mut filter = active();
    filter.extend(doc! {
        "lead_id": lead_id,
        "startdate": { "$lte": now },
        "enddate": { "$gte": now },
    });
    Ok(state
        .store
        .find_one(
            Collection::Subscription,
            filter,
            Some(doc! { "_id": 1, "enddate": 1, "maxenddate": 1 }),
        )
        .await?)
}

/// Answers with the bare `{username, id, token}` object on success.
pub async fn signin(State(state): State<Arc<AppState>>, body: JsonBody) -> Result<Response> {
    body.check(&signin_rules())?;
    let username = body.string("username");
    let mut filter = active();
    filter.insert("email", username.as_str());
    let user = state
        .store
        .find_one(
            Collection::User,
            filter,
            Some(doc! { "_id": 1, "email": 1, "firstname": 1, "lead_id": 1, "iv": 1 }),
        )
        .await?;
    let user = user.and_then(|u| record::oid(&u, "_id").map(|id| (id, u)));

    // Unknown accounts fail the role check too, before any credential lookup.
    let role = match &user {
        Some((id, _)) => console_role(&state, *id).await?,
        None => None,
    };
    let Some(role) = role else {
        return Ok(Reply::new(StatusCode::UNAUTHORIZED, 0, "Account has no access to sign-in")
            .into_response());
    };
    let Some((id, user)) = user else {
        return Ok(Reply::bad_request("Invalid Account Details").into_response());
    };

    let mut filter = active();
    filter.insert("userid", id);
    let credential = state
        .store
        .find_one(Collection::UserCredential, filter, Some(doc! { "_id": 1, "hash": 1 }))
        .await?;
    let Some(credential) = credential.filter(|c| record::oid(c, "_id").is_some()) else {
        return Ok(Reply::bad_request("Invalid Account Details").into_response());
    };
    if !verify_password(&body.string("password"), record::text(&credential, "hash")) {
        return Ok(Reply::bad_request(
            "You are not authorized to sign in. Verify that you are using valid credentials.",
        )
        .into_response());
    }

    let subscription = match record::oid(&user, "lead_id") {
        Some(lead_id) => running_subscription(&state, lead_id).await?,
        None => None,
    };
    let Some(until) = subscription.and_then(|s| record::int(s.get("enddate"))) else {
        return Ok(Reply::bad_request(
            "You are not authorized to sign in. Verify that you have an active plan.",
        )
        .into_response());
    };

    let epoch = Epoch::generate();
    let sealed_time = state.cipher.seal_time(&epoch, until)?;
    let sealed_role = state.cipher.seal_role(&epoch, role.as_str())?;
    let outcome = state
        .store
        .update_one(
            Collection::User,
            doc! { "_id": id },
            doc! { "$set": { "iv": epoch.encode() } },
            false,
        )
        .await?;
    if outcome.matched == 0 {
        return Ok(Reply::failure("Something went wrong, try again later...!").into_response());
    }

    let email = record::text(&user, "email");
    let token = state.cap_tokens.sign(
        Claims::new(id.to_hex(), Audience::Cap)
            .username(email)
            .time(sealed_time)
            .role(sealed_role),
    )?;
    tracing::info!(user_id = %id, role = role.as_str(), "Tenant user signed in");
    Ok(Json(json!({ "username": email, "id": id.to_hex(), "token": token })).into_response())
}

#[cfg(test)]
pub(crate) mod tests {
    use crate::testing::Harness;
    use axum::http::{Method, StatusCode};
    use bson::{doc, oid::ObjectId};
    use serde_json::json;
    use tenantdesk_core::crypto::hash_password;
    use tenantdesk_core::Collection;
    use tenantdesk_mongodb::now_millis;

    pub const DAY: i64 = 86_400_000;

    /// Tenant with an owner account, a credential and a plan ending in
    /// `days`. Returns `(lead_id, user_id)`.
    pub async fn tenant(h: &Harness, email: &str, role: &str, days: i64) -> (ObjectId, ObjectId) {
        let lead = h
            .insert(Collection::Lead, doc! { "name": "Ada", "business_email": email })
            .await;
        let user = h
            .insert(
                Collection::User,
                doc! { "email": email, "firstname": "Ada", "lead_id": lead },
            )
            .await;
        h.insert(
            Collection::UserCredential,
            doc! { "userid": user, "hash": hash_password("s3cret!").unwrap() },
        )
        .await;
        let role = h
            .insert(Collection::Role, doc! { "name": role, "leadid": lead })
            .await;
        h.insert(
            Collection::UserRole,
            doc! { "userid": user, "roleid": role, "leadid": lead },
        )
        .await;
        let now = now_millis();
        h.insert(
            Collection::Subscription,
            doc! { "lead_id": lead, "startdate": now - DAY, "enddate": now + days * DAY },
        )
        .await;
        (lead, user)
    }

    /// Sign in and return `(user_id, token)`.
    pub async fn sign_in(h: &Harness, email: &str) -> (ObjectId, String) {
        let (status, body) = h
            .call(
                Method::POST,
                "/cap/signin",
                None,
                Some(json!({ "username": email, "password": "s3cret!" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        let id = ObjectId::parse_str(body["id"].as_str().unwrap()).unwrap();
        (id, body["token"].as_str().unwrap().to_string())
    }

    #[tokio::test]
    async fn owner_signs_in_and_reaches_the_console() {
        let h = Harness::new().await;
        let (_, user) = tenant(&h, "ada@acme.test", "Account Owner", 30).await;

        let (id, token) = sign_in(&h, "ada@acme.test").await;
        assert_eq!(id, user);
        let stored = h.find(Collection::User, doc! { "_id": user }).await.unwrap();
        assert!(!stored.get_str("iv").unwrap().is_empty());

        let (status, body) = h
            .call(Method::GET, "/cap/settings/setting", Some((&id, token.as_str())), None)
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
    }

    #[tokio::test]
    async fn signing_in_again_retires_the_old_token() {
        let h = Harness::new().await;
        tenant(&h, "ada@acme.test", "Super Admin", 30).await;
        let (id, first) = sign_in(&h, "ada@acme.test").await;
        let (_, second) = sign_in(&h, "ada@acme.test").await;

        let (status, _) = h
            .call(Method::GET, "/cap/settings/setting", Some((&id, first.as_str())), None)
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = h
            .call(Method::GET, "/cap/settings/setting", Some((&id, second.as_str())), None)
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn plain_users_have_no_console_access() {
        let h = Harness::new().await;
        tenant(&h, "bob@acme.test", "User", 30).await;
        let (status, body) = h
            .call(
                Method::POST,
                "/cap/signin",
                None,
                Some(json!({ "username": "bob@acme.test", "password": "s3cret!" })),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Account has no access to sign-in");
    }

    #[tokio::test]
    async fn wrong_password_and_lapsed_plan_are_rejected() {
        let h = Harness::new().await;
        tenant(&h, "ada@acme.test", "Account Owner", 30).await;
        let (status, body) = h
            .call(
                Method::POST,
                "/cap/signin",
                None,
                Some(json!({ "username": "ada@acme.test", "password": "nope" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["message"],
            "You are not authorized to sign in. Verify that you are using valid credentials."
        );

        tenant(&h, "old@acme.test", "Account Owner", -2).await;
        let (status, body) = h
            .call(
                Method::POST,
                "/cap/signin",
                None,
                Some(json!({ "username": "old@acme.test", "password": "s3cret!" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["message"],
            "You are not authorized to sign in. Verify that you have an active plan."
        );

        let (status, body) = h
            .call(Method::POST, "/cap/signin", None, Some(json!({ "username": "ada@acme.test" })))
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["message"], "Password is required");
    }
}
