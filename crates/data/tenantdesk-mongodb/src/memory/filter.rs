//! Query matching, projection, sorting and update application over plain
//! BSON documents. Covers the operator subset the controllers use.

use std::cmp::Ordering;

use bson::{Bson, Document};

/// Resolve a dotted path through nested documents.
pub(crate) fn get_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut parts = path.split('.');
    let first = parts.next()?;
    let mut current = doc.get(first)?;
    for part in parts {
        current = match current {
            Bson::Document(inner) => inner.get(part)?,
            Bson::Array(items) => {
                let idx: usize = part.parse().ok()?;
                items.get(idx)?
            }
            _ => return None,
        };
    }
    Some(current)
}

fn is_operator_doc(cond: &Document) -> bool {
    !cond.is_empty() && cond.keys().all(|k| k.starts_with('$'))
}

pub(crate) fn matches(doc: &Document, filter: &Document) -> bool {
    filter.iter().all(|(key, cond)| match key.as_str() {
        "$or" => match cond {
            Bson::Array(branches) => branches.iter().any(|b| match b {
                Bson::Document(f) => matches(doc, f),
                _ => false,
            }),
            _ => false,
        },
        "$and" => match cond {
            Bson::Array(branches) => branches.iter().all(|b| match b {
                Bson::Document(f) => matches(doc, f),
                _ => false,
            }),
            _ => false,
        },
        "$nor" => match cond {
            Bson::Array(branches) => !branches.iter().any(|b| match b {
                Bson::Document(f) => matches(doc, f),
                _ => false,
            }),
            _ => false,
        },
        path => match_condition(get_path(doc, path), cond),
    })
}

fn match_condition(value: Option<&Bson>, cond: &Bson) -> bool {
    match cond {
        Bson::Document(ops) if is_operator_doc(ops) => {
            ops.iter().all(|(op, arg)| match_operator(value, op, arg))
        }
        _ => equals_or_contains(value, cond),
    }
}

fn match_operator(value: Option<&Bson>, op: &str, arg: &Bson) -> bool {
    match op {
        "$eq" => equals_or_contains(value, arg),
        "$ne" => !equals_or_contains(value, arg),
        "$in" => match arg {
            Bson::Array(options) => options.iter().any(|o| equals_or_contains(value, o)),
            _ => false,
        },
        "$nin" => match arg {
            Bson::Array(options) => !options.iter().any(|o| equals_or_contains(value, o)),
            _ => false,
        },
        "$exists" => {
            let wanted = truthy(arg);
            value.is_some() == wanted
        }
        "$gt" => compare_present(value, arg, |o| o == Ordering::Greater),
        "$gte" => compare_present(value, arg, |o| o != Ordering::Less),
        "$lt" => compare_present(value, arg, |o| o == Ordering::Less),
        "$lte" => compare_present(value, arg, |o| o != Ordering::Greater),
        "$not" => !match_condition(value, arg),
        _ => false,
    }
}

fn compare_present(value: Option<&Bson>, arg: &Bson, pred: impl Fn(Ordering) -> bool) -> bool {
    match value {
        Some(v) if same_class(v, arg) => pred(cmp_bson(v, arg)),
        _ => false,
    }
}

fn equals_or_contains(value: Option<&Bson>, target: &Bson) -> bool {
    match value {
        None => matches!(target, Bson::Null),
        Some(Bson::Array(items)) => {
            bson_eq(&Bson::Array(items.clone()), target) || items.iter().any(|i| bson_eq(i, target))
        }
        Some(v) => bson_eq(v, target),
    }
}

pub(crate) fn truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(b) => *b,
        Bson::Null => false,
        other => as_f64(other).map(|n| n != 0.0).unwrap_or(true),
    }
}

pub(crate) fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(n) => Some(*n as f64),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(n) => Some(*n),
        _ => None,
    }
}

pub(crate) fn as_i64(value: &Bson) -> Option<i64> {
    as_f64(value).map(|n| n as i64)
}

fn type_rank(value: &Bson) -> u8 {
    match value {
        Bson::MinKey => 0,
        Bson::Null | Bson::Undefined => 1,
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_) => 2,
        Bson::String(_) | Bson::Symbol(_) => 3,
        Bson::Document(_) => 4,
        Bson::Array(_) => 5,
        Bson::Binary(_) => 6,
        Bson::ObjectId(_) => 7,
        Bson::Boolean(_) => 8,
        Bson::DateTime(_) => 9,
        Bson::Timestamp(_) => 10,
        Bson::RegularExpression(_) => 11,
        Bson::MaxKey => 13,
        _ => 12,
    }
}

fn same_class(a: &Bson, b: &Bson) -> bool {
    type_rank(a) == type_rank(b)
}

pub(crate) fn bson_eq(a: &Bson, b: &Bson) -> bool {
    match (as_f64(a), as_f64(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// Total order across BSON values, by type class first.
pub(crate) fn cmp_bson(a: &Bson, b: &Bson) -> Ordering {
    let rank = type_rank(a).cmp(&type_rank(b));
    if rank != Ordering::Equal {
        return rank;
    }
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => x.cmp(y),
        (Bson::ObjectId(x), Bson::ObjectId(y)) => x.bytes().cmp(&y.bytes()),
        (Bson::Boolean(x), Bson::Boolean(y)) => x.cmp(y),
        (Bson::DateTime(x), Bson::DateTime(y)) => x.cmp(y),
        (Bson::Array(x), Bson::Array(y)) => {
            for (l, r) in x.iter().zip(y.iter()) {
                let o = cmp_bson(l, r);
                if o != Ordering::Equal {
                    return o;
                }
            }
            x.len().cmp(&y.len())
        }
        _ => match (as_f64(a), as_f64(b)) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        },
    }
}

pub(crate) fn sort_docs(docs: &mut [Document], sort: &Document) {
    docs.sort_by(|a, b| {
        for (field, dir) in sort {
            let desc = as_f64(dir).map(|d| d < 0.0).unwrap_or(false);
            let left = get_path(a, field).unwrap_or(&Bson::Null);
            let right = get_path(b, field).unwrap_or(&Bson::Null);
            let o = cmp_bson(left, right);
            if o != Ordering::Equal {
                return if desc { o.reverse() } else { o };
            }
        }
        Ordering::Equal
    });
}

/// Apply a find-style projection of `0`/`1` flags.
pub(crate) fn project(doc: &Document, projection: &Document) -> Document {
    let fields: Vec<(&String, bool)> = projection
        .iter()
        .filter(|(k, _)| k.as_str() != "_id")
        .map(|(k, v)| (k, truthy(v)))
        .collect();
    let keep_id = projection.get("_id").map(truthy).unwrap_or(true);
    let inclusive = fields.iter().any(|(_, include)| *include);

    if inclusive {
        let mut out = Document::new();
        if keep_id {
            if let Some(id) = doc.get("_id") {
                out.insert("_id", id.clone());
            }
        }
        for (field, _) in fields.iter().filter(|(_, include)| *include) {
            if let Some(v) = doc.get(field.as_str()) {
                out.insert(field.as_str(), v.clone());
            }
        }
        out
    } else {
        let mut out = doc.clone();
        for (field, _) in &fields {
            out.remove(field.as_str());
        }
        if !keep_id {
            out.remove("_id");
        }
        out
    }
}

/// Apply `$set` / `$unset` (and `$setOnInsert` when `inserting`). Returns
/// whether the document changed.
pub(crate) fn apply_update(doc: &mut Document, update: &Document, inserting: bool) -> bool {
    let before = doc.clone();
    if let Ok(set) = update.get_document("$set") {
        for (k, v) in set {
            set_path(doc, k, v.clone());
        }
    }
    if inserting {
        if let Ok(set) = update.get_document("$setOnInsert") {
            for (k, v) in set {
                set_path(doc, k, v.clone());
            }
        }
    }
    if let Ok(unset) = update.get_document("$unset") {
        for (k, _) in unset {
            doc.remove(k);
        }
    }
    *doc != before
}

fn set_path(doc: &mut Document, path: &str, value: Bson) {
    match path.split_once('.') {
        None => {
            doc.insert(path, value);
        }
        Some((head, rest)) => {
            if !matches!(doc.get(head), Some(Bson::Document(_))) {
                doc.insert(head, Document::new());
            }
            if let Ok(inner) = doc.get_document_mut(head) {
                set_path(inner, rest, value);
            }
        }
    }
}

/// Seed document for an upsert: plain equality fields and `$eq` values of
/// the filter.
pub(crate) fn upsert_base(filter: &Document) -> Document {
    let mut base = Document::new();
    for (k, v) in filter {
        if k.starts_with('$') {
            continue;
        }
        match v {
            Bson::Document(ops) if is_operator_doc(ops) => {
                if let Some(eq) = ops.get("$eq") {
                    set_path(&mut base, k, eq.clone());
                }
            }
            other => set_path(&mut base, k, other.clone()),
        }
    }
    base
}
