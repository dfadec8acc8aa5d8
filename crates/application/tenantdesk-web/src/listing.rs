//! Paginated list queries shared by every `/:list/:sort/:order/:page/:size`
//! route.

use bson::{doc, Bson, Document};
use tenantdesk_core::{Collection, ListParams};
use tenantdesk_mongodb::{DocumentStore, FindOptions};

use crate::error::Result;
use crate::record;
use crate::reply::Reply;

/// Projection hiding the audit actor fields.
pub fn hide_audit() -> Document {
    doc! { "createdby": 0, "modifiedby": 0 }
}

pub fn sort_doc(params: &ListParams) -> Document {
    let order = if params.order < 0 { -1 } else { 1 };
    doc! { params.sort.as_str(): order }
}

/// Filter on `internalstatus` for the requested list.
pub fn status_filter(params: &ListParams) -> Document {
    doc! { "internalstatus": { "$in": params.statuses() } }
}

/// `count` + `find` over one collection.
pub async fn find_page(
    store: &dyn DocumentStore,
    collection: Collection,
    filter: Document,
    projection: Document,
    params: &ListParams,
) -> Result<Reply> {
    let total = store.count(collection, filter.clone()).await?;
    let options = FindOptions::default()
        .projection(projection)
        .sort(sort_doc(params))
        .skip(params.skip())
        .limit(params.limit());
    let list = store.find(collection, filter, options).await?;
    let pagination = params.page_data(total).with_current_size(list.len());
    Ok(Reply::page(list, pagination))
}

/// `$match` then a `$facet` running `stages` and the page window next to a
/// total count. Sorting happens after `stages` so projected fields sort.
pub async fn aggregate_page(
    store: &dyn DocumentStore,
    collection: Collection,
    filter: Document,
    stages: Vec<Document>,
    params: &ListParams,
) -> Result<Reply> {
    let skip = i64::try_from(params.skip()).map_err(|_| Reply::unprocessable("Page is required"))?;
    let mut list_stages: Vec<Bson> = stages.into_iter().map(Bson::Document).collect();
    list_stages.push(Bson::Document(doc! { "$sort": sort_doc(params) }));
    list_stages.push(Bson::Document(doc! { "$skip": skip }));
    list_stages.push(Bson::Document(doc! { "$limit": params.limit() }));

    let pipeline = vec![
        doc! { "$match": filter },
        doc! { "$facet": {
            "list": list_stages,
            "total": [ { "$count": "count" } ],
        } },
    ];
    let out = store.aggregate(collection, pipeline).await?;
    let facet = out.into_iter().next().unwrap_or_default();
    let list: Vec<Document> = facet
        .get_array("list")
        .map(|items| {
            items
                .iter()
                .filter_map(|b| b.as_document().cloned())
                .collect()
        })
        .unwrap_or_default();
    let total = facet
        .get_array("total")
        .ok()
        .and_then(|t| t.first())
        .and_then(Bson::as_document)
        .and_then(|d| record::int(d.get("count")))
        .unwrap_or(0);
    let pagination = params
        .page_data(total.max(0) as u64)
        .with_current_size(list.len());
    Ok(Reply::page(list, pagination))
}

/// One record by id; a miss is `400 Error in fetching`.
pub async fn fetch_by_id(
    store: &dyn DocumentStore,
    collection: Collection,
    id: bson::oid::ObjectId,
    projection: Option<Document>,
) -> Result<Reply> {
    match store
        .find_one(collection, doc! { "_id": id }, projection)
        .await?
    {
        Some(found) => Ok(Reply::success(crate::reply::document_to_json(&found))),
        None => Ok(Reply::bad_request("Error in fetching")),
    }
}

/// Every record with `internalstatus` 1, audit actors hidden.
pub async fn all_active(
    store: &dyn DocumentStore,
    collection: Collection,
    mut filter: Document,
) -> Result<Reply> {
    filter.insert("internalstatus", doc! { "$in": [1] });
    let options = FindOptions::default().projection(hide_audit());
    let list = store.find(collection, filter, options).await?;
    Ok(Reply::success(crate::reply::documents_to_json(&list)))
}

/// `$lookup` + `$unwind` keeping unmatched rows.
pub fn lookup_one(from: Collection, local: &str, foreign: &str, alias: &str) -> [Document; 2] {
    [
        doc! { "$lookup": {
            "from": from.name(),
            "localField": local,
            "foreignField": foreign,
            "as": alias,
        } },
        doc! { "$unwind": {
            "path": format!("${alias}"),
            "preserveNullAndEmptyArrays": true,
        } },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use tenantdesk_mongodb::MemoryStore;

    async fn store_with(names: &[(&str, i32)]) -> MemoryStore {
        let store = MemoryStore::new();
        for (name, status) in names {
            store
                .insert_one(
                    Collection::Region,
                    doc! { "name": *name, "internalstatus": *status, "createdby": 0 },
                )
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn find_page_windows_and_counts() {
        let store = store_with(&[("a", 1), ("b", 1), ("c", 0), ("d", -2)]).await;
        let params = ListParams::parse("list", "name", "-1", "1", "2").unwrap();
        let reply = find_page(
            &store,
            Collection::Region,
            status_filter(&params),
            hide_audit(),
            &params,
        )
        .await
        .unwrap();
        let data = reply.data.unwrap();
        let names: Vec<&str> = data["list"]
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["c", "b"]);
        assert!(data["list"][0].get("createdby").is_none());
        assert_eq!(data["pagination"]["total"], 3);
        assert_eq!(data["pagination"]["totalPage"], 2);
        assert_eq!(data["pagination"]["currentSize"], 2);
    }

    #[tokio::test]
    async fn aggregate_page_counts_all_matches() {
        let store = store_with(&[("a", 1), ("b", 1), ("c", 1)]).await;
        let params = ListParams::parse("active", "name", "1", "2", "2").unwrap();
        let reply = aggregate_page(
            &store,
            Collection::Region,
            status_filter(&params),
            vec![doc! { "$project": { "name": 1 } }],
            &params,
        )
        .await
        .unwrap();
        let data = reply.data.unwrap();
        assert_eq!(data["list"].as_array().unwrap().len(), 1);
        assert_eq!(data["list"][0]["name"], "c");
        assert_eq!(data["pagination"]["total"], 3);
        assert_eq!(data["pagination"]["currentSize"], 1);
    }

    #[tokio::test]
    async fn empty_aggregate_is_zero() {
        let store = MemoryStore::new();
        let params = ListParams::parse("all", "name", "1", "1", "10").unwrap();
        let reply = aggregate_page(&store, Collection::Region, doc! {}, vec![], &params)
            .await
            .unwrap();
        let data = reply.data.unwrap();
        assert_eq!(data["pagination"]["total"], 0);
        assert!(data["list"].as_array().unwrap().is_empty());
    }
}
