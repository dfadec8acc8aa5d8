//! Admin console accounts: sign-in, account CRUD and both password flows.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use bson::{doc, oid::ObjectId, Document};
use serde_json::{json, Value};
use tenantdesk_core::crypto::{generate_password, hash_password, verify_password, DEV_PASSWORD};
use tenantdesk_core::{Audience, Claims, Collection, RuleSet};
use tenantdesk_mongodb::seed::{TEMPLATE_ADMIN_RESET, TEMPLATE_NEW_DZITRA_USER};

use crate::error::Result;
use crate::extract::{path_id, Actor, AdminSession, JsonBody, ListPath};
use crate::listing::{all_active, fetch_by_id, find_page, status_filter};
use crate::mail::{log_failure, Recipients};
use crate::record::{self, active, uq_id, with_created, with_modified};
use crate::reply::Reply;
use crate::state::AppState;

fn signin_rules() -> RuleSet {
    RuleSet::new()
        .required("username", "Username is required!")
        .required("password", "Password is required!")
}

fn account_rules(update: bool) -> RuleSet {
    let rules = if update {
        RuleSet::new().object_id("_id", "Id is required")
    } else {
        RuleSet::new()
    };
    rules
        .required("name", "Name is required")
        .email("email", "Email is required")
        .required("display_name", "Display name is required")
}

/// Projection for account reads; the hash never leaves the server.
fn without_secrets() -> Document {
    doc! { "createdby": 0, "modifiedby": 0, "hash": 0 }
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
            Collection::DzitraUser,
            filter,
            Some(doc! { "_id": 1, "email": 1, "name": 1, "hash": 1 }),
        )
        .await?;
    let Some((user, id)) = user.and_then(|u| record::oid(&u, "_id").map(|id| (u, id))) else {
        return Ok(Reply::bad_request("Invalid Account Details").into_response());
    };
    if !verify_password(&body.string("password"), record::text(&user, "hash")) {
        return Ok(Reply::bad_request(
            "You are not authorized to sign in. Verify that you are using valid credentials",
        )
        .into_response());
    }

    let email = record::text(&user, "email");
    let token = state
        .admin_tokens
        .sign(Claims::new(id.to_hex(), Audience::Admin).username(email))?;
    tracing::info!(user_id = %id, "Admin signed in");
    Ok(Json(json!({ "username": email, "id": id.to_hex(), "token": token })).into_response())
}

/// Tokens are stateless; sign-out only acknowledges.
pub async fn signout() -> Reply {
    Reply::ok("success")
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    body: JsonBody,
) -> Result<Reply> {
    body.check(&account_rules(false))?;
    let email = body.string("email");
    if state
        .store
        .count(Collection::DzitraUser, doc! { "email": email.as_str() })
        .await?
        > 0
    {
        return Ok(Reply::bad_request("Email already exists"));
    }

    let password = if state.is_dev() {
        DEV_PASSWORD.to_string()
    } else {
        generate_password(10, true, true)
    };
    let id = ObjectId::new();
    let fields = doc! {
        "_id": id,
        "name": body.text("name"),
        "display_name": body.text("display_name"),
        "email": email.as_str(),
        "hash": hash_password(&password)?,
        "uq_id": uq_id(Collection::DzitraUser, &id),
    };
    if let Err(e) = state
        .store
        .insert_one(Collection::DzitraUser, with_created(fields, &actor))
        .await
    {
        tracing::error!(error = %e, "Admin account insert failed");
        return Ok(Reply::failure("Error in creating user"));
    }

    let name = body.string("name");
    let outcome = state
        .mailer
        .send_template(
            TEMPLATE_NEW_DZITRA_USER,
            Recipients::Single(email.clone()),
            &[
                ("name", name.as_str()),
                ("username", email.as_str()),
                ("pass", password.as_str()),
            ],
        )
        .await;
    log_failure(outcome, "new admin account");
    Ok(Reply::ok("User created successfully"))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    body: JsonBody,
) -> Result<Reply> {
    body.check(&account_rules(true))?;
    let id = body.oid("_id").ok_or(Reply::unprocessable("Id is required"))?;
    let email = body.string("email");
    let clash = state
        .store
        .count(
            Collection::DzitraUser,
            doc! { "email": email.as_str(), "_id": { "$ne": id } },
        )
        .await?;
    if clash > 0 {
        return Ok(Reply::bad_request("Email already exists"));
    }

    let set = with_modified(
        doc! {
            "name": body.text("name"),
            "display_name": body.text("display_name"),
            "email": email,
        },
        &actor,
    );
    let outcome = state
        .store
        .update_one(Collection::DzitraUser, doc! { "_id": id }, doc! { "$set": set }, false)
        .await?;
    if outcome.matched == 0 {
        return Ok(Reply::bad_request("Error in updating"));
    }
    Ok(Reply::ok("Updated successfully"))
}

pub async fn fetch(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<Reply> {
    let id = path_id(&id, "Id is required")?;
    fetch_by_id(
        state.store.as_ref(),
        Collection::DzitraUser,
        id,
        Some(doc! { "hash": 0 }),
    )
    .await
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    ListPath(params): ListPath,
) -> Result<Reply> {
    find_page(
        state.store.as_ref(),
        Collection::DzitraUser,
        status_filter(&params),
        without_secrets(),
        &params,
    )
    .await
}

pub async fn active_accounts(State(state): State<Arc<AppState>>) -> Result<Reply> {
    let mut reply = all_active(state.store.as_ref(), Collection::DzitraUser, doc! {}).await?;
    if let Some(Value::Array(items)) = reply.data.as_mut() {
        for item in items.iter_mut().filter_map(Value::as_object_mut) {
            item.remove("hash");
        }
    }
    Ok(reply)
}

pub async fn forgot_password(
    State(state): State<Arc<AppState>>,
    body: JsonBody,
) -> Result<Reply> {
    body.check(&RuleSet::new().email("email", "Email is required!"))?;
    let user = state
        .store
        .find_one(
            Collection::DzitraUser,
            doc! { "email": body.string("email"), "internalstatus": { "$in": [1] } },
            Some(doc! { "_id": 1, "email": 1, "name": 1 }),
        )
        .await?;
    let Some((user, id)) = user.and_then(|u| record::oid(&u, "_id").map(|id| (u, id))) else {
        return Ok(Reply::bad_request("Invalid user email"));
    };

    let email = record::text(&user, "email");
    let token = state
        .reset_tokens
        .sign(Claims::new(id.to_hex(), Audience::AdminReset).email(email))?;
    let link = format!("/admin-forgot-password?tk={token}");
    let outcome = state
        .mailer
        .send_template(
            TEMPLATE_ADMIN_RESET,
            Recipients::Single(email.to_string()),
            &[("name", record::text(&user, "name")), ("link", link.as_str())],
        )
        .await;
    log_failure(outcome, "admin reset link");

    Ok(
        Reply::ok("Link to reset forgot password sent to the mail successfully")
            .debug_data(state.is_dev(), || Value::from(link)),
    )
}

/// Account behind a reset link: active, and still on the linked address.
async fn linked_account(state: &AppState, claims: &Claims) -> Result<Option<ObjectId>> {
    let Some(email) = claims.email.as_deref() else {
        return Ok(None);
    };
    let Ok(id) = ObjectId::parse_str(&claims.id) else {
        return Ok(None);
    };
    let mut filter = active();
    filter.insert("_id", id);
    let user = state
        .store
        .find_one(Collection::DzitraUser, filter, Some(doc! { "_id": 1, "email": 1 }))
        .await?;
    Ok(user
        .filter(|u| record::text(u, "email") == email)
        .map(|_| id))
}

pub async fn check_reset_link(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
) -> Result<Reply> {
    match linked_account(&state, &claims).await? {
        Some(_) => Ok(Reply::ok("Valid Link")),
        None => Ok(Reply::unauthorized()),
    }
}

async fn store_password(state: &AppState, id: ObjectId, password: &str) -> Result<Reply> {
    let outcome = state
        .store
        .update_one(
            Collection::DzitraUser,
            doc! { "_id": id },
            doc! { "$set": { "hash": hash_password(password)? } },
            false,
        )
        .await?;
    if outcome.matched == 0 {
        return Ok(Reply::bad_request("Error in updating"));
    }
    tracing::info!(user_id = %id, "Admin password changed");
    Ok(Reply::ok("Password reset successfully."))
}

pub async fn submit_forgot_password(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    body: JsonBody,
) -> Result<Reply> {
    let Some(id) = linked_account(&state, &claims).await? else {
        return Ok(Reply::unauthorized());
    };
    body.check(&RuleSet::new().required("password", "Password is required"))?;
    store_password(&state, id, &body.string("password")).await
}

pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    session: AdminSession,
    body: JsonBody,
) -> Result<Reply> {
    body.check(
        &RuleSet::new()
            .required("password", "Password is required")
            .required("newpassword", "New password is required"),
    )?;
    let Some(user) = state
        .store
        .find_one(
            Collection::DzitraUser,
            doc! { "_id": session.id },
            Some(doc! { "_id": 1, "hash": 1 }),
        )
        .await?
    else {
        return Ok(Reply::bad_request("Invalid Account Details"));
    };
    if !verify_password(&body.string("password"), record::text(&user, "hash")) {
        return Ok(Reply::bad_request(
            "You are not authorized to reset the password. Verify that you are using valid credentials",
        ));
    }
    store_password(&state, session.id, &body.string("newpassword")).await
}
