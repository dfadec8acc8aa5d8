//! Operator console, mounted at the root.

pub mod catalog;
pub mod dzitrauser;
pub mod emailtemplate;
pub mod lead;
pub mod newsletter;
pub mod plan;
pub mod rolelink;
pub mod sales;
pub mod settings;
pub mod user;

use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, patch, post};
use axum::Router;

use self::catalog::{DzitraRoles, LeadStatuses, LeadTypes, Regions, Roles, UserTypes};
use super::{status, LIST};
use crate::middleware::{require_admin, require_admin_token};
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let public = Router::new()
        .route("/dzitrauser/signin", post(dzitrauser::signin))
        .route("/dzitrauser/forgot/password", post(dzitrauser::forgot_password))
        .route("/lead", post(lead::create));

    let reset_link = Router::new()
        .route("/dzitrauser/check/reset/link", get(dzitrauser::check_reset_link))
        .route(
            "/dzitrauser/submit/reset/forgot-password",
            post(dzitrauser::submit_forgot_password),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin_token));

    let protected = Router::new()
        // Admin accounts
        .route("/dzitrauser/signout", get(dzitrauser::signout))
        .route("/dzitrauser", post(dzitrauser::create).patch(dzitrauser::update))
        .route("/dzitrauser/:id", get(dzitrauser::fetch))
        .route(&format!("/dzitrauser{LIST}"), get(dzitrauser::list))
        .route("/dzitrauser/all/active", get(dzitrauser::active_accounts))
        .route("/dzitrauser/submit/reset/password", post(dzitrauser::reset_password))
        // Lookup tables
        .nest("/dzitrarole", catalog::router::<DzitraRoles>())
        .nest("/role", catalog::router::<Roles>())
        .nest("/leadstatus", catalog::router::<LeadStatuses>())
        .nest("/leadtype", catalog::router::<LeadTypes>())
        .nest("/usertype", catalog::router::<UserTypes>())
        .nest("/region", catalog::router::<Regions>())
        .route("/industrytype/all/active", get(plan::active_industry_types))
        .route("/plantype/all/active", get(plan::active_plan_types))
        // Role links
        .route(
            "/dzitrauserrole",
            post(rolelink::create_admin_link).patch(rolelink::update_admin_link),
        )
        .route("/dzitrauserrole/:id", get(rolelink::admin_roles))
        .route(
            "/userrole",
            post(rolelink::create_tenant_link).patch(rolelink::update_tenant_link),
        )
        .route("/userrole/:id", get(rolelink::tenant_role))
        // Plans
        .route("/plan", post(plan::create).patch(plan::update))
        .route("/plan/:id", get(plan::fetch))
        .route(&format!("/plan{LIST}"), get(plan::list))
        .route("/plan/all/active", get(plan::active_plans))
        .route("/plan/all/active/trial", get(plan::active_trial_plans))
        .route("/plan/all/active/paid", get(plan::active_paid_plans))
        // Leads
        .route("/lead", patch(lead::update))
        .route("/lead/:id", get(lead::fetch))
        .route(&format!("/lead{LIST}"), get(lead::list))
        .route("/lead/invite", post(lead::invite))
        .route("/lead/updatestatus", post(lead::update_status))
        .route("/lead/status/:id", get(lead::status_history))
        .route("/lead/all/active", get(lead::active_leads))
        // Sales
        .route("/subscription", post(sales::create_subscription))
        .route("/subscription/:id", get(sales::fetch_subscription))
        .route(&format!("/subscription{LIST}"), get(sales::list_subscriptions))
        .route("/customer", post(sales::create_customer))
        .route("/customer/:id", get(sales::fetch_customer))
        .route(&format!("/customer{LIST}"), get(sales::list_customers))
        // Tenant users
        .route("/user", post(user::create).patch(user::update))
        .route("/user/:id", get(user::fetch))
        .route(&format!("/user{LIST}"), get(user::list))
        // Newsletter
        .route("/newsletter", post(newsletter::create).patch(newsletter::update))
        .route("/newsletter/:id", get(newsletter::fetch))
        .route(&format!("/newsletter{LIST}"), get(newsletter::list))
        // Settings
        .route("/settings/general", patch(settings::update_general))
        .route("/settings/smtp", patch(settings::update_smtp))
        .route(
            "/emailtemplate",
            post(emailtemplate::create).patch(emailtemplate::update),
        )
        .route("/emailtemplate/:id", get(emailtemplate::fetch))
        .route(&format!("/emailtemplate{LIST}"), get(emailtemplate::list))
        // Bulk status
        .route("/common/:status", patch(status::admin_status))
        .route("/common/:status/:for", patch(status::admin_status_for))
        .route_layer(middleware::from_fn_with_state(state, require_admin));

    Router::new().merge(public).merge(reset_link).merge(protected)
}
