//! Site wide singletons: `general` (title, site url) and `smtp` (delivery
//! switch and credentials). Each is one document upserted in place.

use std::sync::Arc;

use axum::extract::State;
use bson::{doc, Document};
use tenantdesk_core::{Collection, RuleSet};

use crate::error::Result;
use crate::extract::{Actor, JsonBody};
use crate::record::with_modified;
use crate::reply::Reply;
use crate::state::AppState;

async fn upsert_singleton(
    state: &AppState,
    collection: Collection,
    fields: Document,
    actor: &bson::Bson,
) -> Result<Reply> {
    let outcome = state
        .store
        .update_one(
            collection,
            doc! {},
            doc! { "$set": with_modified(fields, actor) },
            true,
        )
        .await?;
    if outcome.applied() {
        tracing::info!(collection = collection.name(), "Settings updated");
        Ok(Reply::ok("Updated successfully"))
    } else {
        Ok(Reply::bad_request("Error in updating"))
    }
}

pub async fn update_general(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    body: JsonBody,
) -> Result<Reply> {
    body.check(
        &RuleSet::new()
            .required("title", "Title is required")
            .required("site_url", "Site URL is required"),
    )?;
    let fields = doc! { "title": body.text("title"), "site_url": body.text("site_url") };
    upsert_singleton(&state, Collection::General, fields, &actor).await
}

/// `mode == 1` switches delivery on.
pub async fn update_smtp(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    body: JsonBody,
) -> Result<Reply> {
    body.check(
        &RuleSet::new()
            .numeric("mode", "Mode is required")
            .required("client", "Client is required")
            .required("secret", "Secret is required"),
    )?;
    let fields = doc! {
        "mode": body.number("mode").unwrap_or(bson::Bson::Int32(0)),
        "client": body.text("client"),
        "secret": body.text("secret"),
    };
    upsert_singleton(&state, Collection::Smtp, fields, &actor).await
}

#[cfg(test)]
mod tests {
    use crate::testing::Harness;
    use axum::http::{Method, StatusCode};
    use serde_json::json;
    use tenantdesk_core::Collection;

    #[tokio::test]
    async fn singletons_stay_single() {
        let h = Harness::new().await;
        let (id, token) = h.admin().await;
        let auth = Some((&id, token.as_str()));

        for title in ["Acme", "Acme Cloud"] {
            let (status, body) = h
                .call(
                    Method::PATCH,
                    "/settings/general",
                    auth,
                    Some(json!({ "title": title, "site_url": "https://acme.test" })),
                )
                .await;
            assert_eq!(status, StatusCode::OK, "{body}");
        }
        let general = h.all(Collection::General).await;
        assert_eq!(general.len(), 1);
        assert_eq!(general[0].get_str("title").unwrap(), "Acme Cloud");

        let (status, _) = h
            .call(
                Method::PATCH,
                "/settings/smtp",
                auth,
                Some(json!({ "mode": "1", "client": "user", "secret": "pw" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let smtp = h.all(Collection::Smtp).await;
        assert_eq!(smtp[0].get_i64("mode").unwrap(), 1);
    }
}
