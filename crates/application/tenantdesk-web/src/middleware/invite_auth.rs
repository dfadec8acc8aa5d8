use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tenantdesk_core::Audience;

use super::claims_for;
use crate::reply::Reply;
use crate::state::AppState;

/// Invite links mailed to leads. The handler re-checks the lead and user.
pub async fn require_invite(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    match claims_for(&state.invite_tokens, request.headers(), Audience::Customer) {
        Some(claims) => {
            request.extensions_mut().insert(claims);
            next.run(request).await
        }
        None => Reply::unauthorized().into_response(),
    }
}
