//! tenantdesk HTTP surfaces.
//!
//! Three consoles share one router and one document store:
//!
//! - **admin** (mounted at `/`): operators manage leads, plans, tenants and
//!   site settings.
//! - **cap** (`/cap`): the customer admin panel each tenant's owner uses.
//! - **site** (`/site`): public marketing forms and invite links.
//!
//! Every reply uses the `{status, message, data?}` envelope from [`reply`].

pub mod error;
pub mod extract;
pub mod listing;
pub mod mail;
pub mod middleware;
pub mod provisioning;
pub mod record;
pub mod reply;
pub mod routes;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use error::{Error, Result};
pub use reply::Reply;
pub use routes::print_routes;
pub use state::AppState;

/// Create the main router with all three consoles.
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(routes::health))
        .merge(routes::admin::router(state.clone()))
        .nest("/cap", routes::cap::router(state.clone()))
        .nest("/site", routes::site::router(state.clone()))
        .fallback(|| async { Reply::not_found() })
        .layer(DefaultBodyLimit::max(state.body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the web server
pub async fn serve(state: Arc<AppState>, addr: &str) -> std::io::Result<()> {
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("tenantdesk listening on http://{}", addr);

    axum::serve(listener, app).await
}

#[cfg(test)]
mod tests {
    use crate::testing::Harness;
    use axum::http::{Method, StatusCode};

    #[tokio::test]
    async fn health_and_unknown_paths() {
        let h = Harness::new().await;
        let (status, body) = h.call(Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        let (status, body) = h.call(Method::GET, "/nowhere/at/all", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "URL not found");
    }

    #[test]
    fn route_table_lists_every_console() {
        let paths: Vec<&str> = crate::routes::ROUTES.iter().map(|(_, p, _)| *p).collect();
        assert!(paths.contains(&"/dzitrauser/signin"));
        assert!(paths.contains(&"/cap/signin"));
        assert!(paths.contains(&"/site/newsletter/subscribe"));
    }
}
