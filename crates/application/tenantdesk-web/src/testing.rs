//! Shared fixtures for router tests.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use bson::{doc, oid::ObjectId, Document};
use serde_json::Value;
use tenantdesk_config::Config;
use tenantdesk_core::crypto::hash_password;
use tenantdesk_core::{Audience, Claims, Collection};
use tenantdesk_mongodb::{DocumentStore, MemoryStore};
use tower::ServiceExt;

use crate::mail::RecordingTransport;
use crate::record;
use crate::state::AppState;

pub struct Harness {
    pub state: Arc<AppState>,
    pub store: Arc<MemoryStore>,
    pub mail: Arc<RecordingTransport>,
    pub router: Router,
}

pub const ADMIN_EMAIL: &str = "root@acme.test";
pub const ADMIN_PASSWORD: &str = "Adm1n!pass";

impl Harness {
    pub async fn new() -> Self {
        let mut config = Config::local();
        config.env = tenantdesk_config::AppEnv::Dev;
        Self::with_config(config).await
    }

    pub async fn with_config(config: Config) -> Self {
        let store = Arc::new(MemoryStore::new());
        let mail = Arc::new(RecordingTransport::new());
        let state = Arc::new(AppState::new(config, store.clone(), mail.clone()).unwrap());
        let router = crate::create_router(state.clone());
        Self {
            state,
            store,
            mail,
            router,
        }
    }

    pub async fn insert(&self, collection: Collection, fields: Document) -> ObjectId {
        let id = ObjectId::new();
        let mut doc = record::with_created(fields, &bson::Bson::Int32(0));
        doc.insert("_id", id);
        self.store.insert_one(collection, doc).await.unwrap();
        id
    }

    pub async fn find(&self, collection: Collection, filter: Document) -> Option<Document> {
        self.store.find_one(collection, filter, None).await.unwrap()
    }

    pub async fn all(&self, collection: Collection) -> Vec<Document> {
        self.store.dump(collection).await
    }

    /// Switch on mail delivery and add the general settings.
    pub async fn enable_mail(&self) {
        self.insert(Collection::Smtp, doc! { "client": "c", "secret": "s", "mode": 1 })
            .await;
        self.insert(
            Collection::General,
            doc! { "title": "Acme", "site_url": "https://app.acme.test" },
        )
        .await;
    }

    pub async fn template(&self, name: &str, subject: &str, content: &str) {
        self.insert(
            Collection::EmailTemplate,
            doc! {
                "name": name,
                "sender_name": "{{title}}",
                "sender": "no-reply@acme.test",
                "subject": subject,
                "content": content,
            },
        )
        .await;
    }

    /// Active admin account plus its `(userid, token)` headers.
    pub async fn admin(&self) -> (ObjectId, String) {
        let id = self
            .insert(
                Collection::DzitraUser,
                doc! {
                    "name": "root",
                    "display_name": "Root",
                    "email": ADMIN_EMAIL,
                    "hash": hash_password(ADMIN_PASSWORD).unwrap(),
                },
            )
            .await;
        let token = self
            .state
            .admin_tokens
            .sign(Claims::new(id.to_hex(), Audience::Admin).username(ADMIN_EMAIL))
            .unwrap();
        (id, token)
    }

    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        auth: Option<(&ObjectId, &str)>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some((id, token)) = auth {
            builder = builder
                .header("authorization", token)
                .header("userid", id.to_hex());
        }
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }
}
