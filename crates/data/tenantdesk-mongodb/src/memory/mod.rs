//! In-process document store used by tests and `serve --in-memory`.

mod filter;
mod pipeline;

use std::collections::HashMap;

use async_trait::async_trait;
use bson::{oid::ObjectId, Bson, Document};
use tenantdesk_core::Collection;
use tokio::sync::RwLock;

use crate::{
    stamp_insert, stamp_update, DocumentStore, FindOptions, InsertOutcome, Result, UpdateOutcome,
};

#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<Collection, Vec<Document>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every document currently stored in a collection, in insertion order.
    pub async fn dump(&self, collection: Collection) -> Vec<Document> {
        self.collections
            .read()
            .await
            .get(&collection)
            .cloned()
            .unwrap_or_default()
    }
}

fn ensure_id(doc: &mut Document) -> Bson {
    match doc.get("_id") {
        Some(id) => id.clone(),
        None => {
            let id = Bson::ObjectId(ObjectId::new());
            doc.insert("_id", id.clone());
            id
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find_one(
        &self,
        collection: Collection,
        filter: Document,
        projection: Option<Document>,
    ) -> Result<Option<Document>> {
        let data = self.collections.read().await;
        let found = data
            .get(&collection)
            .and_then(|docs| docs.iter().find(|d| filter::matches(d, &filter)));
        Ok(found.map(|d| match &projection {
            Some(p) => filter::project(d, p),
            None => d.clone(),
        }))
    }

    async fn find(
        &self,
        collection: Collection,
        filter: Document,
        options: FindOptions,
    ) -> Result<Vec<Document>> {
        let data = self.collections.read().await;
        let mut docs: Vec<Document> = data
            .get(&collection)
            .map(|docs| {
                docs.iter()
                    .filter(|d| filter::matches(d, &filter))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        drop(data);

        if let Some(sort) = &options.sort {
            filter::sort_docs(&mut docs, sort);
        }
        let skip = options.skip.unwrap_or(0) as usize;
        let limit = match options.limit {
            Some(n) if n > 0 => n as usize,
            _ => usize::MAX,
        };
        Ok(docs
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|d| match &options.projection {
                Some(p) => filter::project(&d, p),
                None => d,
            })
            .collect())
    }

    async fn count(&self, collection: Collection, filter: Document) -> Result<u64> {
        let data = self.collections.read().await;
        Ok(data
            .get(&collection)
            .map(|docs| docs.iter().filter(|d| filter::matches(d, &filter)).count() as u64)
            .unwrap_or(0))
    }

    async fn insert_one(&self, collection: Collection, mut doc: Document) -> Result<InsertOutcome> {
        stamp_insert(&mut doc);
        let inserted_id = ensure_id(&mut doc);
        self.collections
            .write()
            .await
            .entry(collection)
            .or_default()
            .push(doc);
        Ok(InsertOutcome { inserted_id })
    }

    async fn insert_many(&self, collection: Collection, docs: Vec<Document>) -> Result<u64> {
        let mut data = self.collections.write().await;
        let target = data.entry(collection).or_default();
        let count = docs.len() as u64;
        for mut doc in docs {
            stamp_insert(&mut doc);
            ensure_id(&mut doc);
            target.push(doc);
        }
        Ok(count)
    }

    async fn update_one(
        &self,
        collection: Collection,
        filter: Document,
        mut update: Document,
        upsert: bool,
    ) -> Result<UpdateOutcome> {
        stamp_update(&mut update);
        let mut data = self.collections.write().await;
        let docs = data.entry(collection).or_default();
        if let Some(doc) = docs.iter_mut().find(|d| filter::matches(d, &filter)) {
            let modified = filter::apply_update(doc, &update, false);
            return Ok(UpdateOutcome {
                matched: 1,
                modified: u64::from(modified),
                upserted_id: None,
            });
        }
        if !upsert {
            return Ok(UpdateOutcome::default());
        }
        let mut doc = filter::upsert_base(&filter);
        filter::apply_update(&mut doc, &update, true);
        if !doc.contains_key("createdAt") {
            if let Ok(updated) = doc.get_i64("updatedAt") {
                doc.insert("createdAt", updated);
            }
        }
        let id = ensure_id(&mut doc);
        docs.push(doc);
        Ok(UpdateOutcome {
            matched: 0,
            modified: 0,
            upserted_id: Some(id),
        })
    }

    async fn update_many(
        &self,
        collection: Collection,
        filter: Document,
        mut update: Document,
    ) -> Result<UpdateOutcome> {
        stamp_update(&mut update);
        let mut data = self.collections.write().await;
        let mut outcome = UpdateOutcome::default();
        if let Some(docs) = data.get_mut(&collection) {
            for doc in docs.iter_mut().filter(|d| filter::matches(d, &filter)) {
                outcome.matched += 1;
                if filter::apply_update(doc, &update, false) {
                    outcome.modified += 1;
                }
            }
        }
        Ok(outcome)
    }

    async fn aggregate(
        &self,
        collection: Collection,
        pipeline: Vec<Document>,
    ) -> Result<Vec<Document>> {
        let data = self.collections.read().await;
        let base = data.get(&collection).cloned().unwrap_or_default();
        pipeline::run(&data, base, &pipeline)
    }

    async fn delete_one(&self, collection: Collection, filter: Document) -> Result<u64> {
        let mut data = self.collections.write().await;
        let Some(docs) = data.get_mut(&collection) else {
            return Ok(0);
        };
        match docs.iter().position(|d| filter::matches(d, &filter)) {
            Some(idx) => {
                docs.remove(idx);
                Ok(1)
            }
            None => Ok(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[tokio::test]
    async fn insert_stamps_and_assigns_id() {
        let store = MemoryStore::new();
        let out = store
            .insert_one(Collection::Lead, doc! { "name": "Ada" })
            .await
            .unwrap();
        assert!(matches!(out.inserted_id, Bson::ObjectId(_)));
        let stored = store.dump(Collection::Lead).await;
        assert!(stored[0].contains_key("createdAt"));
        assert!(stored[0].contains_key("updatedAt"));
    }

    #[tokio::test]
    async fn find_with_sort_skip_limit_projection() {
        let store = MemoryStore::new();
        for (i, name) in ["c", "a", "b", "d"].iter().enumerate() {
            store
                .insert_one(
                    Collection::Region,
                    doc! { "name": *name, "n": i as i32, "internalstatus": 1, "createdby": 0 },
                )
                .await
                .unwrap();
        }
        let docs = store
            .find(
                Collection::Region,
                doc! { "internalstatus": { "$in": [1] } },
                FindOptions::default()
                    .sort(doc! { "name": 1 })
                    .skip(1)
                    .limit(2)
                    .projection(doc! { "createdby": 0 }),
            )
            .await
            .unwrap();
        let names: Vec<&str> = docs.iter().map(|d| d.get_str("name").unwrap()).collect();
        assert_eq!(names, vec!["b", "c"]);
        assert!(!docs[0].contains_key("createdby"));
        assert_eq!(
            store.count(Collection::Region, doc! { "n": { "$gte": 2 } }).await.unwrap(),
            2
        );
    }

    #[tokio::test]
    async fn update_one_reports_matched_and_modified() {
        let store = MemoryStore::new();
        store
            .insert_one(Collection::Plan, doc! { "planname": "Basic" })
            .await
            .unwrap();
        let out = store
            .update_one(
                Collection::Plan,
                doc! { "planname": "Basic" },
                doc! { "$set": { "price": 10 } },
                false,
            )
            .await
            .unwrap();
        assert_eq!((out.matched, out.modified), (1, 1));

        let miss = store
            .update_one(
                Collection::Plan,
                doc! { "planname": "Pro" },
                doc! { "$set": { "price": 10 } },
                false,
            )
            .await
            .unwrap();
        assert_eq!(miss, UpdateOutcome::default());
    }

    #[tokio::test]
    async fn upsert_inserts_from_filter_and_set_on_insert() {
        let store = MemoryStore::new();
        let out = store
            .update_one(
                Collection::Newsletter,
                doc! { "email": { "$eq": "a@b.io" } },
                doc! { "$set": { "subscribed": true }, "$setOnInsert": { "createdby": 0 } },
                true,
            )
            .await
            .unwrap();
        assert!(out.upserted_id.is_some());
        let again = store
            .update_one(
                Collection::Newsletter,
                doc! { "email": { "$eq": "a@b.io" } },
                doc! { "$set": { "subscribed": false }, "$setOnInsert": { "createdby": 9 } },
                true,
            )
            .await
            .unwrap();
        assert_eq!(again.matched, 1);
        let stored = store.dump(Collection::Newsletter).await;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].get_str("email").unwrap(), "a@b.io");
        assert_eq!(stored[0].get_i32("createdby").unwrap(), 0);
        assert!(!stored[0].get_bool("subscribed").unwrap());
    }

    #[tokio::test]
    async fn update_many_and_delete() {
        let store = MemoryStore::new();
        store
            .insert_many(
                Collection::UserRole,
                vec![
                    doc! { "userid": 1, "internalstatus": 1 },
                    doc! { "userid": 1, "internalstatus": 1 },
                    doc! { "userid": 2, "internalstatus": 1 },
                ],
            )
            .await
            .unwrap();
        let out = store
            .update_many(
                Collection::UserRole,
                doc! { "userid": 1 },
                doc! { "$set": { "internalstatus": 0 } },
            )
            .await
            .unwrap();
        assert_eq!((out.matched, out.modified), (2, 2));
        assert_eq!(
            store.delete_one(Collection::UserRole, doc! { "userid": 2 }).await.unwrap(),
            1
        );
        assert_eq!(store.count(Collection::UserRole, doc! {}).await.unwrap(), 2);
    }

    #[test]
    fn aggregate_runs_on_snapshot() {
        tokio_test::block_on(async {
            let store = MemoryStore::new();
            store
                .insert_one(Collection::Lead, doc! { "name": "x", "internalstatus": 1 })
                .await
                .unwrap();
            let out = store
                .aggregate(
                    Collection::Lead,
                    vec![doc! { "$match": { "internalstatus": 1 } }, doc! { "$count": "n" }],
                )
                .await
                .unwrap();
            assert_eq!(out[0].get_i64("n").unwrap(), 1);
        });
    }
}
