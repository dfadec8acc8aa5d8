//! Name + description lookup tables: lead statuses, lead types, user types,
//! regions and both role catalogues.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::Router;
use bson::doc;
use tenantdesk_core::{Collection, RuleSet};

use crate::error::Result;
use crate::extract::{path_id, Actor, JsonBody, ListPath};
use crate::listing::{all_active, fetch_by_id, find_page, hide_audit, status_filter};
use crate::record::{uq_id, with_created, with_modified};
use crate::reply::Reply;
use crate::routes::LIST;
use crate::state::AppState;

/// One lookup table and the replies it answers with.
pub trait Catalog: Send + Sync + 'static {
    const COLLECTION: Collection;
    const CREATED: &'static str;
    const CREATE_FAILED: &'static str;
    const NEEDS_DESCRIPTION: bool = false;
    const STAMPS_UQ_ID: bool = false;
}

pub struct LeadStatuses;
pub struct LeadTypes;
pub struct UserTypes;
pub struct Regions;
pub struct DzitraRoles;
pub struct Roles;

impl Catalog for LeadStatuses {
    const COLLECTION: Collection = Collection::LeadStatus;
    const CREATED: &'static str = "Lead Status created successfully";
    const CREATE_FAILED: &'static str = "Error in creating lead status";
}

impl Catalog for LeadTypes {
    const COLLECTION: Collection = Collection::LeadType;
    const CREATED: &'static str = "Lead Type created successfully";
    const CREATE_FAILED: &'static str = "Error in creating lead type";
}

impl Catalog for UserTypes {
    const COLLECTION: Collection = Collection::UserType;
    const CREATED: &'static str = "Created successfully";
    const CREATE_FAILED: &'static str = "Error in creating";
}

impl Catalog for Regions {
    const COLLECTION: Collection = Collection::Region;
    const CREATED: &'static str = "Region created successfully";
    const CREATE_FAILED: &'static str = "Error in creating region";
}

impl Catalog for DzitraRoles {
    const COLLECTION: Collection = Collection::DzitraRole;
    const CREATED: &'static str = "Role created successfully";
    const CREATE_FAILED: &'static str = "Error in creating role";
    const NEEDS_DESCRIPTION: bool = true;
    const STAMPS_UQ_ID: bool = true;
}

impl Catalog for Roles {
    const COLLECTION: Collection = Collection::Role;
    const CREATED: &'static str = "Role created successfully";
    const CREATE_FAILED: &'static str = "Error in creating role";
    const NEEDS_DESCRIPTION: bool = true;
    const STAMPS_UQ_ID: bool = true;
}

fn rules<C: Catalog>(update: bool) -> RuleSet {
    let mut rules = RuleSet::new();
    if update {
        rules = rules.object_id("_id", "Id is required");
    }
    rules = rules.required("name", "Name is required");
    if C::NEEDS_DESCRIPTION {
        rules = rules.required("description", "Description is required");
    }
    rules
}

pub async fn create<C: Catalog>(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    body: JsonBody,
) -> Result<Reply> {
    body.check(&rules::<C>(false))?;
    let name = body.string("name");
    if state
        .store
        .count(C::COLLECTION, doc! { "name": name.as_str() })
        .await?
        > 0
    {
        return Ok(Reply::bad_request("Name already exists"));
    }

    let id = bson::oid::ObjectId::new();
    let mut fields = doc! { "_id": id, "name": name, "description": body.text("description") };
    if C::STAMPS_UQ_ID {
        fields.insert("uq_id", uq_id(C::COLLECTION, &id));
    }
    match state
        .store
        .insert_one(C::COLLECTION, with_created(fields, &actor))
        .await
    {
        Ok(_) => Ok(Reply::ok(C::CREATED)),
        Err(e) => {
            tracing::error!(error = %e, collection = C::COLLECTION.name(), "Insert failed");
            Ok(Reply::failure(C::CREATE_FAILED))
        }
    }
}

pub async fn update<C: Catalog>(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    body: JsonBody,
) -> Result<Reply> {
    body.check(&rules::<C>(true))?;
    let id = body.oid("_id").ok_or(Reply::unprocessable("Id is required"))?;
    let name = body.string("name");
    let clash = state
        .store
        .count(C::COLLECTION, doc! { "name": name.as_str(), "_id": { "$ne": id } })
        .await?;
    if clash > 0 {
        return Ok(Reply::bad_request("Name already exists"));
    }

    let set = with_modified(
        doc! { "name": name, "description": body.text("description") },
        &actor,
    );
    let outcome = state
        .store
        .update_one(C::COLLECTION, doc! { "_id": id }, doc! { "$set": set }, false)
        .await?;
    if outcome.matched == 0 {
        return Ok(Reply::bad_request("Error in updating"));
    }
    Ok(Reply::ok("Updated successfully"))
}

pub async fn fetch<C: Catalog>(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Reply> {
    let id = path_id(&id, "Id is required")?;
    fetch_by_id(state.store.as_ref(), C::COLLECTION, id, None).await
}

pub async fn list<C: Catalog>(
    State(state): State<Arc<AppState>>,
    ListPath(params): ListPath,
) -> Result<Reply> {
    find_page(
        state.store.as_ref(),
        C::COLLECTION,
        status_filter(&params),
        hide_audit(),
        &params,
    )
    .await
}

pub async fn active<C: Catalog>(State(state): State<Arc<AppState>>) -> Result<Reply> {
    all_active(state.store.as_ref(), C::COLLECTION, doc! {}).await
}

/// CRUD routes for one catalogue, to be nested under its prefix.
pub fn router<C: Catalog>() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", axum::routing::post(create::<C>).patch(update::<C>))
        .route("/:id", get(fetch::<C>))
        .route(LIST, get(list::<C>))
        .route("/all/active", get(active::<C>))
}

#[cfg(test)]
mod tests {
    use crate::testing::Harness;
    use axum::http::{Method, StatusCode};
    use bson::doc;
    use serde_json::json;
    use tenantdesk_core::Collection;

    #[tokio::test]
    async fn region_crud_with_unique_names() {
        let h = Harness::new().await;
        let (id, token) = h.admin().await;
        let auth = Some((&id, token.as_str()));

        let (status, body) = h
            .call(Method::POST, "/region", auth, Some(json!({ "name": "EMEA" })))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Region created successfully");

        let (status, body) = h
            .call(Method::POST, "/region", auth, Some(json!({ "name": "EMEA" })))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Name already exists");

        let region = h.find(Collection::Region, doc! { "name": "EMEA" }).await.unwrap();
        let region_id = region.get_object_id("_id").unwrap().to_hex();
        let (status, body) = h
            .call(
                Method::PATCH,
                "/region",
                auth,
                Some(json!({ "_id": region_id, "name": "Europe" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");

        let (_, body) = h
            .call(Method::GET, &format!("/region/{region_id}"), auth, None)
            .await;
        assert_eq!(body["data"]["name"], "Europe");

        let (_, body) = h
            .call(Method::GET, "/region/list/name/1/1/10", auth, None)
            .await;
        assert_eq!(body["data"]["pagination"]["total"], 1);
        assert!(body["data"]["list"][0].get("createdby").is_none());

        let (_, body) = h.call(Method::GET, "/region/all/active", auth, None).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn roles_need_a_description_and_get_uq_id() {
        let h = Harness::new().await;
        let (id, token) = h.admin().await;
        let auth = Some((&id, token.as_str()));

        let (status, body) = h
            .call(Method::POST, "/dzitrarole", auth, Some(json!({ "name": "Ops" })))
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["message"], "Description is required");

        h.call(
            Method::POST,
            "/dzitrarole",
            auth,
            Some(json!({ "name": "Ops", "description": "Operations" })),
        )
        .await;
        let role = h.find(Collection::DzitraRole, doc! {}).await.unwrap();
        assert!(role.get_str("uq_id").unwrap().starts_with("dzitrarole_"));
    }

    #[tokio::test]
    async fn catalogue_routes_need_admin() {
        let h = Harness::new().await;
        let (status, body) = h.call(Method::GET, "/leadstatus/all/active", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Unauthorized Access");

        let (id, token) = h.admin().await;
        let (status, _) = h
            .call(Method::GET, "/leadstatus/bogus/name/1/1/10", Some((&id, token.as_str())), None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
