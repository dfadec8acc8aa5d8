//! Aggregation stages for the in-memory store.
//!
//! Supported: `$match`, `$lookup` (localField/foreignField form), `$unwind`,
//! `$project`, `$addFields`/`$set`, `$sort`, `$skip`, `$limit`, `$count` and
//! `$facet`. Expressions are field paths (`"$a.b"`), literals, nested
//! documents, `$size`, `$arrayElemAt`, `$ifNull` and `$first`.

use std::collections::HashMap;

use bson::{Bson, Document};
use tenantdesk_core::Collection;

use super::filter::{as_i64, bson_eq, get_path, matches, sort_docs, truthy};
use crate::{Error, Result};

pub(crate) fn run(
    data: &HashMap<Collection, Vec<Document>>,
    mut docs: Vec<Document>,
    pipeline: &[Document],
) -> Result<Vec<Document>> {
    for stage in pipeline {
        let (name, spec) = stage
            .iter()
            .next()
            .ok_or_else(|| Error::InvalidDocument("empty pipeline stage".into()))?;
        docs = match name.as_str() {
            "$match" => {
                let filter = expect_doc(name, spec)?;
                docs.into_iter().filter(|d| matches(d, filter)).collect()
            }
            "$lookup" => lookup(data, docs, expect_doc(name, spec)?)?,
            "$unwind" => unwind(docs, spec)?,
            "$project" => {
                let spec = expect_doc(name, spec)?;
                docs.iter().map(|d| project_stage(d, spec)).collect()
            }
            "$addFields" | "$set" => {
                let spec = expect_doc(name, spec)?;
                docs.into_iter()
                    .map(|mut d| {
                        for (field, expr) in spec {
                            let value = eval(&d, expr).unwrap_or(Bson::Null);
                            d.insert(field.as_str(), value);
                        }
                        d
                    })
                    .collect()
            }
            "$sort" => {
                sort_docs(&mut docs, expect_doc(name, spec)?);
                docs
            }
            "$skip" => {
                let n = expect_count(name, spec)?;
                docs.into_iter().skip(n).collect()
            }
            "$limit" => {
                let n = expect_count(name, spec)?;
                docs.into_iter().take(n).collect()
            }
            "$count" => {
                let field = spec
                    .as_str()
                    .ok_or_else(|| Error::InvalidDocument("$count expects a field name".into()))?;
                if docs.is_empty() {
                    Vec::new()
                } else {
                    let mut out = Document::new();
                    out.insert(field, docs.len() as i64);
                    vec![out]
                }
            }
            "$facet" => {
                let spec = expect_doc(name, spec)?;
                let mut out = Document::new();
                for (facet, stages) in spec {
                    let stages: Vec<Document> = match stages {
                        Bson::Array(items) => items
                            .iter()
                            .filter_map(|s| s.as_document().cloned())
                            .collect(),
                        _ => {
                            return Err(Error::InvalidDocument(format!(
                                "$facet.{facet} must be an array"
                            )))
                        }
                    };
                    let result = run(data, docs.clone(), &stages)?;
                    out.insert(
                        facet.as_str(),
                        Bson::Array(result.into_iter().map(Bson::Document).collect()),
                    );
                }
                vec![out]
            }
            other => return Err(Error::Unsupported(format!("aggregation stage {other}"))),
        };
    }
    Ok(docs)
}

fn expect_doc<'a>(stage: &str, spec: &'a Bson) -> Result<&'a Document> {
    spec.as_document()
        .ok_or_else(|| Error::InvalidDocument(format!("{stage} expects a document")))
}

fn expect_count(stage: &str, spec: &Bson) -> Result<usize> {
    as_i64(spec)
        .filter(|n| *n >= 0)
        .map(|n| n as usize)
        .ok_or_else(|| Error::InvalidDocument(format!("{stage} expects a non-negative number")))
}

fn lookup(
    data: &HashMap<Collection, Vec<Document>>,
    docs: Vec<Document>,
    spec: &Document,
) -> Result<Vec<Document>> {
    if spec.contains_key("pipeline") {
        return Err(Error::Unsupported("$lookup with pipeline".into()));
    }
    let field = |key: &str| {
        spec.get_str(key)
            .map_err(|_| Error::InvalidDocument(format!("$lookup.{key} is required")))
    };
    let from = field("from")?;
    let local = field("localField")?;
    let foreign = field("foreignField")?;
    let as_field = field("as")?;
    let collection = Collection::from_name(from)
        .ok_or_else(|| Error::InvalidDocument(format!("unknown collection {from}")))?;
    let empty = Vec::new();
    let foreign_docs = data.get(&collection).unwrap_or(&empty);

    Ok(docs
        .into_iter()
        .map(|mut d| {
            let local_value = get_path(&d, local).cloned().unwrap_or(Bson::Null);
            let candidates: Vec<Bson> = match &local_value {
                Bson::Array(items) => items.clone(),
                other => vec![other.clone()],
            };
            let joined: Vec<Bson> = foreign_docs
                .iter()
                .filter(|f| {
                    let fv = get_path(f, foreign).unwrap_or(&Bson::Null);
                    candidates.iter().any(|c| bson_eq(c, fv))
                })
                .cloned()
                .map(Bson::Document)
                .collect();
            d.insert(as_field, Bson::Array(joined));
            d
        })
        .collect())
}

fn unwind(docs: Vec<Document>, spec: &Bson) -> Result<Vec<Document>> {
    let (path, preserve) = match spec {
        Bson::String(p) => (p.as_str(), false),
        Bson::Document(d) => (
            d.get_str("path")
                .map_err(|_| Error::InvalidDocument("$unwind.path is required".into()))?,
            d.get("preserveNullAndEmptyArrays").map(truthy).unwrap_or(false),
        ),
        _ => return Err(Error::InvalidDocument("$unwind expects a path".into())),
    };
    let field = path.trim_start_matches('$');
    let mut out = Vec::new();
    for d in docs {
        match d.get(field).cloned() {
            Some(Bson::Array(items)) if !items.is_empty() => {
                for item in items {
                    let mut copy = d.clone();
                    copy.insert(field, item);
                    out.push(copy);
                }
            }
            Some(Bson::Array(_)) | Some(Bson::Null) | None => {
                if preserve {
                    let mut copy = d.clone();
                    copy.remove(field);
                    out.push(copy);
                }
            }
            Some(_) => out.push(d),
        }
    }
    Ok(out)
}

fn is_flag(value: &Bson) -> bool {
    matches!(value, Bson::Boolean(_) | Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_))
}

fn project_stage(doc: &Document, spec: &Document) -> Document {
    let exclusion = spec
        .iter()
        .filter(|(k, _)| k.as_str() != "_id")
        .all(|(_, v)| is_flag(v) && !truthy(v))
        && spec.keys().any(|k| k != "_id");

    if exclusion {
        let mut out = doc.clone();
        for (k, _) in spec {
            out.remove(k);
        }
        return out;
    }

    let mut out = Document::new();
    let keep_id = spec.get("_id").map(|v| !is_flag(v) || truthy(v)).unwrap_or(true);
    if keep_id {
        match spec.get("_id") {
            Some(expr) if !is_flag(expr) => {
                if let Some(v) = eval(doc, expr) {
                    out.insert("_id", v);
                }
            }
            _ => {
                if let Some(id) = doc.get("_id") {
                    out.insert("_id", id.clone());
                }
            }
        }
    }
    for (field, expr) in spec.iter().filter(|(k, _)| k.as_str() != "_id") {
        if is_flag(expr) {
            if truthy(expr) {
                if let Some(v) = get_path(doc, field) {
                    out.insert(field.as_str(), v.clone());
                }
            }
        } else if let Some(v) = eval(doc, expr) {
            out.insert(field.as_str(), v);
        }
    }
    out
}

/// Evaluate an expression against a document. `None` means "missing".
fn eval(doc: &Document, expr: &Bson) -> Option<Bson> {
    match expr {
        Bson::String(s) if s.starts_with('$') && !s.starts_with("$$") => {
            get_path(doc, &s[1..]).cloned()
        }
        Bson::Document(d) => {
            let mut keys = d.keys();
            match (keys.next(), keys.next()) {
                (Some(op), None) if op.starts_with('$') => eval_operator(doc, op, d.get(op)?),
                _ => {
                    let mut out = Document::new();
                    for (k, v) in d {
                        if let Some(value) = eval(doc, v) {
                            out.insert(k.as_str(), value);
                        }
                    }
                    Some(Bson::Document(out))
                }
            }
        }
        Bson::Array(items) => Some(Bson::Array(
            items
                .iter()
                .map(|i| eval(doc, i).unwrap_or(Bson::Null))
                .collect(),
        )),
        literal => Some(literal.clone()),
    }
}

fn eval_operator(doc: &Document, op: &str, arg: &Bson) -> Option<Bson> {
    match op {
        "$size" => match eval(doc, arg)? {
            Bson::Array(items) => Some(Bson::Int32(items.len() as i32)),
            _ => None,
        },
        "$first" => match eval(doc, arg)? {
            Bson::Array(items) => items.into_iter().next(),
            _ => None,
        },
        "$arrayElemAt" => {
            let args = arg.as_array()?;
            let items = match eval(doc, args.first()?)? {
                Bson::Array(items) => items,
                _ => return None,
            };
            let idx = as_i64(&eval(doc, args.get(1)?)?)?;
            let idx = if idx < 0 { items.len() as i64 + idx } else { idx };
            usize::try_from(idx).ok().and_then(|i| items.get(i).cloned())
        }
        "$ifNull" => {
            let args = arg.as_array()?;
            match eval(doc, args.first()?) {
                Some(Bson::Null) | None => eval(doc, args.get(1)?),
                some => some,
            }
        }
        "$literal" => Some(arg.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::{doc, oid::ObjectId};

    fn fixture() -> (HashMap<Collection, Vec<Document>>, ObjectId) {
        let type_id = ObjectId::new();
        let mut data = HashMap::new();
        data.insert(
            Collection::PlanType,
            vec![doc! { "_id": type_id, "name": "Trial" }],
        );
        data.insert(
            Collection::Plan,
            vec![
                doc! { "planname": "Starter", "plantypeid": type_id, "internalstatus": 1 },
                doc! { "planname": "Legacy", "plantypeid": type_id, "internalstatus": 0 },
                doc! { "planname": "Orphan", "plantypeid": ObjectId::new(), "internalstatus": 1 },
            ],
        );
        (data, type_id)
    }

    #[test]
    fn lookup_unwind_project() {
        let (data, _) = fixture();
        let pipeline = vec![
            doc! { "$match": { "internalstatus": 1 } },
            doc! { "$lookup": {
                "from": "plantype", "localField": "plantypeid",
                "foreignField": "_id", "as": "plantype"
            } },
            doc! { "$unwind": { "path": "$plantype", "preserveNullAndEmptyArrays": true } },
            doc! { "$project": { "_id": 0, "planname": 1, "plantypename": "$plantype.name" } },
            doc! { "$sort": { "planname": 1 } },
        ];
        let out = run(&data, data[&Collection::Plan].clone(), &pipeline).unwrap();
        assert_eq!(
            out,
            vec![
                doc! { "planname": "Orphan" },
                doc! { "planname": "Starter", "plantypename": "Trial" },
            ]
        );
    }

    #[test]
    fn facet_with_count_and_page() {
        let (data, _) = fixture();
        let pipeline = vec![doc! { "$facet": {
            "total": [ { "$count": "count" } ],
            "list": [ { "$sort": { "planname": -1 } }, { "$skip": 1 }, { "$limit": 1 } ],
        } }];
        let out = run(&data, data[&Collection::Plan].clone(), &pipeline).unwrap();
        assert_eq!(out.len(), 1);
        let total = out[0].get_array("total").unwrap();
        assert_eq!(total[0].as_document().unwrap().get_i64("count").unwrap(), 3);
        let list = out[0].get_array("list").unwrap();
        assert_eq!(
            list[0].as_document().unwrap().get_str("planname").unwrap(),
            "Orphan"
        );
    }

    #[test]
    fn exclusion_project_and_size() {
        let (data, _) = fixture();
        let pipeline = vec![
            doc! { "$limit": 1 },
            doc! { "$lookup": {
                "from": "plantype", "localField": "plantypeid",
                "foreignField": "_id", "as": "types"
            } },
            doc! { "$addFields": { "typecount": { "$size": "$types" } } },
            doc! { "$project": { "types": 0, "plantypeid": 0 } },
        ];
        let out = run(&data, data[&Collection::Plan].clone(), &pipeline).unwrap();
        assert_eq!(out[0].get_i32("typecount").unwrap(), 1);
        assert!(!out[0].contains_key("types"));
    }

    #[test]
    fn unsupported_stage() {
        let (data, _) = fixture();
        let err = run(&data, Vec::new(), &[doc! { "$group": { "_id": "$x" } }]).unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));
    }
}
