//! # tenantdesk-mongodb
//!
//! Thin document-store layer. Controllers talk to a [`DocumentStore`]; the
//! production server uses [`MongoStore`], tests and `serve --in-memory` use
//! [`MemoryStore`].
//!
//! Every insert is stamped with `createdAt`/`updatedAt` (epoch millis) and
//! every update gets `$set.updatedAt`, whichever backend runs it.

pub mod memory;
pub mod mongo;
pub mod seed;

use async_trait::async_trait;
use bson::{doc, Bson, Document};
use tenantdesk_core::Collection;

pub use memory::MemoryStore;
pub use mongo::MongoStore;
pub use seed::{seed, SeedReport};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Password hashing failed: {0}")]
    Hash(#[from] tenantdesk_core::Error),
}

/// Options for [`DocumentStore::find`].
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    pub projection: Option<Document>,
    pub sort: Option<Document>,
    pub skip: Option<u64>,
    pub limit: Option<i64>,
}

impl FindOptions {
    pub fn projection(mut self, projection: Document) -> Self {
        self.projection = Some(projection);
        self
    }

    pub fn sort(mut self, sort: Document) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertOutcome {
    pub inserted_id: Bson,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateOutcome {
    pub matched: u64,
    pub modified: u64,
    pub upserted_id: Option<Bson>,
}

impl UpdateOutcome {
    /// True when the write reached an existing document or created one.
    /// Rewriting identical values within the same millisecond leaves
    /// `modified` at zero, so it is not a success signal.
    pub fn applied(&self) -> bool {
        self.matched > 0 || self.upserted_id.is_some()
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find_one(
        &self,
        collection: Collection,
        filter: Document,
        projection: Option<Document>,
    ) -> Result<Option<Document>>;

    async fn find(
        &self,
        collection: Collection,
        filter: Document,
        options: FindOptions,
    ) -> Result<Vec<Document>>;

    async fn count(&self, collection: Collection, filter: Document) -> Result<u64>;

    async fn insert_one(&self, collection: Collection, doc: Document) -> Result<InsertOutcome>;

    async fn insert_many(&self, collection: Collection, docs: Vec<Document>) -> Result<u64>;

    async fn update_one(
        &self,
        collection: Collection,
        filter: Document,
        update: Document,
        upsert: bool,
    ) -> Result<UpdateOutcome>;

    async fn update_many(
        &self,
        collection: Collection,
        filter: Document,
        update: Document,
    ) -> Result<UpdateOutcome>;

    async fn aggregate(&self, collection: Collection, pipeline: Vec<Document>)
        -> Result<Vec<Document>>;

    async fn delete_one(&self, collection: Collection, filter: Document) -> Result<u64>;
}

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub(crate) fn stamp_insert(doc: &mut Document) {
    let now = now_millis();
    doc.insert("createdAt", now);
    doc.insert("updatedAt", now);
}

pub(crate) fn stamp_update(update: &mut Document) {
    let now = now_millis();
    match update.get_document_mut("$set") {
        Ok(set) => {
            set.insert("updatedAt", now);
        }
        Err(_) => {
            update.insert("$set", doc! { "updatedAt": now });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamp_update_adds_set() {
        let mut update = doc! { "$unset": { "x": "" } };
        stamp_update(&mut update);
        assert!(update.get_document("$set").unwrap().contains_key("updatedAt"));

        let mut update = doc! { "$set": { "name": "a" } };
        stamp_update(&mut update);
        let set = update.get_document("$set").unwrap();
        assert_eq!(set.get_str("name").unwrap(), "a");
        assert!(set.contains_key("updatedAt"));
    }

    #[test]
    fn outcome_applied() {
        assert!(!UpdateOutcome::default().applied());
        assert!(UpdateOutcome {
            upserted_id: Some(Bson::Int32(1)),
            ..Default::default()
        }
        .applied());
        assert!(UpdateOutcome {
            matched: 1,
            modified: 0,
            upserted_id: None,
        }
        .applied());
    }
}
