//! Audit and status fields every stored record carries.

use bson::{doc, oid::ObjectId, Bson, Document};
use tenantdesk_core::Collection;
use tenantdesk_mongodb::now_millis;

/// Filter for records that are live on both consoles.
pub fn active() -> Document {
    doc! { "internalstatus": 1, "externalstatus": 1 }
}

/// Fields stamped on a new record.
pub fn created(actor: &Bson) -> Document {
    let now = now_millis();
    doc! {
        "recordstatus": 1,
        "internalstatus": 1,
        "externalstatus": 1,
        "createdon": now,
        "createdby": actor.clone(),
        "modifiedon": now,
        "modifiedby": actor.clone(),
    }
}

/// Fields stamped on every update.
pub fn modified(actor: &Bson) -> Document {
    doc! { "modifiedon": now_millis(), "modifiedby": actor.clone() }
}

/// `fields` plus the insert stamps.
pub fn with_created(mut fields: Document, actor: &Bson) -> Document {
    fields.extend(created(actor));
    fields
}

/// `fields` plus the update stamps, ready for `$set`.
pub fn with_modified(mut fields: Document, actor: &Bson) -> Document {
    fields.extend(modified(actor));
    fields
}

/// `<collection>_<hex id>`, the human readable unique key.
pub fn uq_id(collection: Collection, id: &ObjectId) -> String {
    format!("{}_{}", collection.name(), id.to_hex())
}

pub fn int(value: Option<&Bson>) -> Option<i64> {
    match value? {
        Bson::Int32(n) => Some(i64::from(*n)),
        Bson::Int64(n) => Some(*n),
        Bson::Double(n) if n.fract() == 0.0 => Some(*n as i64),
        Bson::String(s) => s.trim().parse().ok(),
        Bson::DateTime(dt) => Some(dt.timestamp_millis()),
        _ => None,
    }
}

pub fn oid(doc: &Document, key: &str) -> Option<ObjectId> {
    doc.get_object_id(key).ok()
}

pub fn text<'a>(doc: &'a Document, key: &str) -> &'a str {
    doc.get_str(key).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn created_stamps_actor_and_statuses() {
        let actor = Bson::ObjectId(ObjectId::new());
        let d = with_created(doc! { "name": "x" }, &actor);
        assert_eq!(d.get("createdby"), Some(&actor));
        assert_eq!(d.get_i32("internalstatus").unwrap(), 1);
        assert_eq!(d.get_i32("recordstatus").unwrap(), 1);
        assert_eq!(d.get_str("name").unwrap(), "x");
    }

    #[test]
    fn int_reads_any_numeric() {
        assert_eq!(int(Some(&Bson::Int32(3))), Some(3));
        assert_eq!(int(Some(&Bson::Double(4.0))), Some(4));
        assert_eq!(int(Some(&Bson::String("5".into()))), Some(5));
        assert_eq!(int(Some(&Bson::Double(4.5))), None);
        assert_eq!(int(None), None);
    }

    #[test]
    fn uq_id_prefixes_collection() {
        let id = ObjectId::new();
        assert_eq!(uq_id(Collection::Lead, &id), format!("lead_{}", id.to_hex()));
    }
}
