//! Public marketing site, mounted under `/site`.

pub mod lead;
pub mod newsletter;

use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;

use crate::middleware::require_invite;
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let invite = Router::new()
        .route("/lead/check/link", get(lead::check_link))
        .route("/lead/submit/link", post(lead::submit_link))
        .route_layer(middleware::from_fn_with_state(state, require_invite));

    let forms = Router::new()
        .route("/leadsignup", post(lead::signup))
        .route("/lead/plans", post(lead::pricing))
        .route("/lead/scheduledemo", post(lead::schedule_demo))
        .route("/lead/contactus", post(lead::contact_us))
        .route("/newsletter/subscribe", post(newsletter::subscribe));

    Router::new().merge(invite).merge(forms)
}
