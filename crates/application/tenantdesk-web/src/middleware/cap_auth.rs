use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use bson::{doc, oid::ObjectId, Document};
use tenantdesk_core::{Audience, Claims, Collection, Epoch, TenantRole};
use tenantdesk_mongodb::now_millis;

use super::claims_for;
use crate::extract::CapContext;
use crate::record;
use crate::reply::Reply;
use crate::state::AppState;

fn no_access(message: &'static str) -> Reply {
    Reply::new(StatusCode::UNAUTHORIZED, 3, message)
}

/// Decide access from the stored user and the sealed claims.
fn context(state: &AppState, claims: &Claims, user: &Document) -> Result<CapContext, Reply> {
    let (Some(user_id), Some(lead_id)) = (record::oid(user, "_id"), record::oid(user, "lead_id"))
    else {
        return Err(Reply::unauthorized());
    };
    let epoch = Epoch::decode(record::text(user, "iv")).map_err(|_| Reply::unauthorized())?;
    let sealed_role = claims.role.as_deref().ok_or_else(Reply::unauthorized)?;
    let sealed_time = claims.time.as_deref().ok_or_else(Reply::unauthorized)?;

    let role = state
        .cipher
        .open_role(&epoch, sealed_role)
        .map_err(|_| Reply::unauthorized())?;
    if !TenantRole::from_name(&role).is_some_and(TenantRole::can_sign_in_cap) {
        return Err(no_access("Account has no access."));
    }
    let until = state
        .cipher
        .open_time(&epoch, sealed_time)
        .map_err(|_| Reply::unauthorized())?;
    if until <= now_millis() {
        return Err(no_access("Account plan expired."));
    }
    Ok(CapContext { user_id, lead_id })
}

/// Tenant console session. The epoch stored on the user unseals the plan
/// end date and role carried by the token; signing in again rotates it.
pub async fn require_cap(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(claims) = claims_for(&state.cap_tokens, request.headers(), Audience::Cap)
        .filter(|c| c.time.is_some())
    else {
        return Reply::unauthorized().into_response();
    };
    let Ok(id) = ObjectId::parse_str(&claims.id) else {
        return Reply::unauthorized().into_response();
    };

    let mut filter = record::active();
    filter.insert("_id", id);
    let projection = doc! { "_id": 1, "iv": 1, "lead_id": 1 };
    let user = match state.store.find_one(Collection::User, filter, Some(projection)).await {
        Ok(Some(user)) if user.get_str("iv").is_ok_and(|iv| !iv.is_empty()) => user,
        Ok(_) => return Reply::unauthorized().into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "Tenant user lookup failed");
            return Reply::unauthorized().into_response();
        }
    };

    match context(&state, &claims, &user) {
        Ok(ctx) => {
            request.extensions_mut().insert(ctx);
            next.run(request).await
        }
        Err(reply) => reply.into_response(),
    }
}
