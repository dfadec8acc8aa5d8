use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use bson::{doc, oid::ObjectId};
use tenantdesk_core::{Audience, Collection};

use super::{bearer, claims_for};
use crate::extract::AdminSession;
use crate::record;
use crate::reply::Reply;
use crate::state::AppState;

/// Admin console session: valid token plus an active admin account.
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(claims) = claims_for(&state.admin_tokens, request.headers(), Audience::Admin)
        .filter(|c| c.email.is_none())
    else {
        return Reply::unauthorized().into_response();
    };
    let Ok(id) = ObjectId::parse_str(&claims.id) else {
        return Reply::unauthorized().into_response();
    };

    let mut filter = record::active();
    filter.insert("_id", id);
    match state
        .store
        .find_one(Collection::DzitraUser, filter, Some(doc! { "_id": 1, "email": 1 }))
        .await
    {
        Ok(Some(user)) => {
            request.extensions_mut().insert(AdminSession {
                id,
                email: record::text(&user, "email").to_string(),
            });
            next.run(request).await
        }
        Ok(None) => Reply::unauthorized().into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "Admin lookup failed");
            Reply::unauthorized().into_response()
        }
    }
}

/// Password reset links only. The handler resolves the account from the
/// claims.
pub async fn require_admin_token(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let claims = bearer(request.headers())
        .and_then(|t| state.reset_tokens.verify(t).ok())
        .filter(|c| c.is_for(Audience::AdminReset) && c.email.is_some());
    match claims {
        Some(claims) => {
            request.extensions_mut().insert(claims);
            next.run(request).await
        }
        None => Reply::unauthorized().into_response(),
    }
}
