//! Customer admin panel, mounted under `/cap`.

pub mod auth;
pub mod role;
pub mod settings;

use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, patch, post};
use axum::Router;

use super::status;
use crate::middleware::require_cap;
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let public = Router::new().route("/signin", post(auth::signin));

    let protected = Router::new()
        .route(
            "/settings/setting",
            get(settings::get_setting).patch(settings::update_setting),
        )
        .route(
            "/settings/formatsetting",
            get(settings::get_format_setting).patch(settings::update_format_setting),
        )
        .route("/settings/worksetting/:year", get(settings::get_work_setting))
        .route("/settings/worksetting", patch(settings::update_work_setting))
        .route("/settings/holidaysetting/:year", get(settings::get_holidays))
        .route("/settings/holidaysetting", patch(settings::update_holiday))
        .route("/settings/cloneholiday", post(settings::clone_holidays))
        .route("/common/:status", patch(status::cap_status))
        .route("/common/:status/:for", patch(status::cap_status_for))
        .route("/role/list/:sort/:order/:page/:size", get(role::list))
        .route("/role/user-by-role/:id", get(role::users_for_role))
        .route("/role/user", post(role::assign_users).patch(role::assign_users))
        .route_layer(middleware::from_fn_with_state(state, require_cap));

    Router::new().merge(public).merge(protected)
}
