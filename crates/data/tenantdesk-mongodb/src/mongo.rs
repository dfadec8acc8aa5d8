//! MongoDB-backed store.

use async_trait::async_trait;
use bson::Document;
use futures::TryStreamExt;
use mongodb::options::ClientOptions;
use mongodb::{Client, Database};
use tenantdesk_config::DatabaseConfig;
use tenantdesk_core::Collection;

use crate::{
    stamp_insert, stamp_update, DocumentStore, FindOptions, InsertOutcome, Result, UpdateOutcome,
};

#[derive(Clone, Debug)]
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let mut options = ClientOptions::parse(&config.url).await?;
        options.max_pool_size = Some(config.pool_size);
        options.app_name = Some("tenantdesk".to_string());
        let client = Client::with_options(options)?;
        let db = client.database(&config.name);
        tracing::info!(db = %config.name, pool = config.pool_size, "Connected to MongoDB");
        Ok(Self { db })
    }

    fn coll(&self, collection: Collection) -> mongodb::Collection<Document> {
        self.db.collection::<Document>(collection.name())
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn find_one(
        &self,
        collection: Collection,
        filter: Document,
        projection: Option<Document>,
    ) -> Result<Option<Document>> {
        Ok(self
            .coll(collection)
            .find_one(filter)
            .with_options(
                mongodb::options::FindOneOptions::builder()
                    .projection(projection)
                    .build(),
            )
            .await?)
    }

    async fn find(
        &self,
        collection: Collection,
        filter: Document,
        options: FindOptions,
    ) -> Result<Vec<Document>> {
        let opts = mongodb::options::FindOptions::builder()
            .projection(options.projection)
            .sort(options.sort)
            .skip(options.skip)
            .limit(options.limit)
            .build();
        let cursor = self.coll(collection).find(filter).with_options(opts).await?;
        let docs: Vec<Document> = cursor.try_collect().await?;
        Ok(docs)
    }

    async fn count(&self, collection: Collection, filter: Document) -> Result<u64> {
        Ok(self.coll(collection).count_documents(filter).await?)
    }

    async fn insert_one(&self, collection: Collection, mut doc: Document) -> Result<InsertOutcome> {
        stamp_insert(&mut doc);
        let result = self.coll(collection).insert_one(doc).await?;
        Ok(InsertOutcome {
            inserted_id: result.inserted_id,
        })
    }

    async fn insert_many(&self, collection: Collection, mut docs: Vec<Document>) -> Result<u64> {
        if docs.is_empty() {
            return Ok(0);
        }
        docs.iter_mut().for_each(stamp_insert);
        let result = self.coll(collection).insert_many(docs).await?;
        Ok(result.inserted_ids.len() as u64)
    }

    async fn update_one(
        &self,
        collection: Collection,
        filter: Document,
        mut update: Document,
        upsert: bool,
    ) -> Result<UpdateOutcome> {
        stamp_update(&mut update);
        let result = self
            .coll(collection)
            .update_one(filter, update)
            .upsert(upsert)
            .await?;
        Ok(UpdateOutcome {
            matched: result.matched_count,
            modified: result.modified_count,
            upserted_id: result.upserted_id,
        })
    }

    async fn update_many(
        &self,
        collection: Collection,
        filter: Document,
        mut update: Document,
    ) -> Result<UpdateOutcome> {
        stamp_update(&mut update);
        let result = self.coll(collection).update_many(filter, update).await?;
        Ok(UpdateOutcome {
            matched: result.matched_count,
            modified: result.modified_count,
            upserted_id: result.upserted_id,
        })
    }

    async fn aggregate(
        &self,
        collection: Collection,
        pipeline: Vec<Document>,
    ) -> Result<Vec<Document>> {
        let cursor = self
            .coll(collection)
            .aggregate(pipeline)
            .allow_disk_use(true)
            .await?;
        let docs: Vec<Document> = cursor.try_collect().await?;
        Ok(docs)
    }

    async fn delete_one(&self, collection: Collection, filter: Document) -> Result<u64> {
        Ok(self.coll(collection).delete_one(filter).await?.deleted_count)
    }
}
