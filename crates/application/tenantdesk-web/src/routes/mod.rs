//! Route tables for the three consoles.

pub mod admin;
pub mod cap;
pub mod site;
pub mod status;

use axum::Json;
use serde_json::{json, Value};

/// Paginated list suffix. The first segment is named like the `/:id`
/// fetch routes it shares a position with.
pub const LIST: &str = "/:id/:sort/:order/:page/:size";

/// `(method, path, description)` for every mounted endpoint.
pub const ROUTES: &[(&str, &str, &str)] = &[
    ("GET", "/health", "Liveness check"),
    // Admin console
    ("POST", "/dzitrauser/signin", "Admin sign-in"),
    ("GET", "/dzitrauser/signout", "Admin sign-out"),
    ("POST", "/dzitrauser", "Create admin account"),
    ("PATCH", "/dzitrauser", "Update admin account"),
    ("GET", "/dzitrauser/:id", "Admin account"),
    ("GET", "/dzitrauser/:list/:sort/:order/:page/:size", "Admin accounts"),
    ("GET", "/dzitrauser/all/active", "Active admin accounts"),
    ("POST", "/dzitrauser/forgot/password", "Mail a reset link"),
    ("GET", "/dzitrauser/check/reset/link", "Validate a reset link"),
    ("POST", "/dzitrauser/submit/reset/forgot-password", "Reset via link"),
    ("POST", "/dzitrauser/submit/reset/password", "Change own password"),
    ("*", "/dzitrarole", "Admin role catalogue"),
    ("*", "/role", "Tenant role catalogue"),
    ("*", "/leadstatus", "Lead status catalogue"),
    ("*", "/leadtype", "Lead type catalogue"),
    ("*", "/usertype", "User type catalogue"),
    ("*", "/region", "Region catalogue"),
    ("GET", "/industrytype/all/active", "Active industry types"),
    ("GET", "/plantype/all/active", "Active plan types"),
    ("POST", "/dzitrauserrole", "Link admin to role"),
    ("PATCH", "/dzitrauserrole", "Relink admin role"),
    ("GET", "/dzitrauserrole/:id", "Roles of an admin"),
    ("POST", "/userrole", "Link tenant user to role"),
    ("PATCH", "/userrole", "Relink tenant user role"),
    ("GET", "/userrole/:id", "Role of a tenant user"),
    ("POST", "/plan", "Create plan"),
    ("PATCH", "/plan", "Update plan"),
    ("GET", "/plan/:id", "Plan"),
    ("GET", "/plan/:list/:sort/:order/:page/:size", "Plans"),
    ("GET", "/plan/all/active", "Active plans"),
    ("GET", "/plan/all/active/trial", "Active trial plans"),
    ("GET", "/plan/all/active/paid", "Active paid plans"),
    ("POST", "/lead", "Capture lead (public)"),
    ("PATCH", "/lead", "Update lead"),
    ("GET", "/lead/:id", "Lead"),
    ("GET", "/lead/:list/:sort/:order/:page/:size", "Leads"),
    ("POST", "/lead/invite", "Invite lead"),
    ("POST", "/lead/updatestatus", "Change lead status"),
    ("GET", "/lead/status/:id", "Lead status history"),
    ("GET", "/lead/all/active", "Active leads"),
    ("POST", "/subscription", "Trial subscription"),
    ("GET", "/subscription/:id", "Subscription"),
    ("GET", "/subscription/:list/:sort/:order/:page/:size", "Subscriptions"),
    ("POST", "/customer", "Paid customer"),
    ("GET", "/customer/:id", "Customer"),
    ("GET", "/customer/:list/:sort/:order/:page/:size", "Customers"),
    ("POST", "/user", "Create tenant user"),
    ("PATCH", "/user", "Update tenant user"),
    ("GET", "/user/:id", "Tenant user"),
    ("GET", "/user/:list/:sort/:order/:page/:size", "Tenant users"),
    ("POST", "/newsletter", "Add subscriber"),
    ("PATCH", "/newsletter", "Update subscriber"),
    ("GET", "/newsletter/:id", "Subscriber"),
    ("GET", "/newsletter/:list/:sort/:order/:page/:size", "Subscribers"),
    ("PATCH", "/settings/general", "General settings"),
    ("PATCH", "/settings/smtp", "SMTP settings"),
    ("POST", "/emailtemplate", "Create mail template"),
    ("PATCH", "/emailtemplate", "Update mail template"),
    ("GET", "/emailtemplate/:id", "Mail template"),
    ("GET", "/emailtemplate/:list/:sort/:order/:page/:size", "Mail templates"),
    ("PATCH", "/common/:status[/ext]", "Bulk status change"),
    // Customer admin panel
    ("POST", "/cap/signin", "Tenant sign-in"),
    ("GET", "/cap/settings/setting", "Company settings"),
    ("PATCH", "/cap/settings/setting", "Save company settings"),
    ("GET", "/cap/settings/formatsetting", "Format settings"),
    ("PATCH", "/cap/settings/formatsetting", "Save format settings"),
    ("GET", "/cap/settings/worksetting/:year", "Working week"),
    ("PATCH", "/cap/settings/worksetting", "Save a working day"),
    ("GET", "/cap/settings/holidaysetting/:year", "Holidays"),
    ("PATCH", "/cap/settings/holidaysetting", "Save a holiday"),
    ("POST", "/cap/settings/cloneholiday", "Copy a holiday calendar"),
    ("PATCH", "/cap/common/:status[/ext]", "Holiday status change"),
    ("GET", "/cap/role/list/:sort/:order/:page/:size", "Roles with holders"),
    ("GET", "/cap/role/user-by-role/:id", "Users free for a role"),
    ("POST", "/cap/role/user", "Replace role holders"),
    // Marketing site
    ("GET", "/site/lead/check/link", "Validate an invite link"),
    ("POST", "/site/lead/submit/link", "Accept an invite"),
    ("POST", "/site/leadsignup", "Get Started form"),
    ("POST", "/site/lead/plans", "Pricing form"),
    ("POST", "/site/lead/scheduledemo", "Schedule Demo form"),
    ("POST", "/site/lead/contactus", "Contact Us form"),
    ("POST", "/site/newsletter/subscribe", "Newsletter opt-in"),
];

pub fn print_routes() {
    println!("\ntenantdesk routes:");
    println!("{:-<60}", "");
    for (method, path, desc) in ROUTES {
        println!("{:6} {:45} {}", method, path, desc);
    }
    println!();
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "service": "tenantdesk" }))
}
