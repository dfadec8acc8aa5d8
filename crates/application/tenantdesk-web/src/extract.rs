//! Request extractors and body field helpers.

use axum::async_trait;
use axum::body::Bytes;
use axum::extract::{FromRequest, FromRequestParts, Path, Request};
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use bson::{oid::ObjectId, Bson, Document};
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{json, Value};
use tenantdesk_core::paging::ListRejection;
use tenantdesk_core::validate::{as_bool, as_number};
use tenantdesk_core::{ListParams, RuleSet};

use crate::reply::Reply;

/// Header carrying the caller's user id next to the bearer token.
pub const USER_ID_HEADER: &str = "userid";

/// JSON request body. An empty body reads as `{}`.
#[derive(Debug, Clone)]
pub struct JsonBody(pub Value);

#[async_trait]
impl<S: Send + Sync> FromRequest<S> for JsonBody {
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(IntoResponse::into_response)?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self(json!({})));
        }
        serde_json::from_slice(&bytes)
            .map(Self)
            .map_err(|_| Reply::bad_request("Invalid request body").into_response())
    }
}

/// JSON to BSON with integers kept as `Int64` and ids left as strings.
pub fn json_to_bson(value: &Value) -> Bson {
    match value {
        Value::Null => Bson::Null,
        Value::Bool(b) => Bson::Boolean(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Bson::Int64(i),
            None => Bson::Double(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => Bson::String(s.clone()),
        Value::Array(items) => Bson::Array(items.iter().map(json_to_bson).collect()),
        Value::Object(map) => Bson::Document(
            map.iter()
                .map(|(k, v)| (k.clone(), json_to_bson(v)))
                .collect::<Document>(),
        ),
    }
}

/// Epoch millis from a number, a numeric string, an RFC 3339 timestamp or
/// a `YYYY-MM-DD` date (midnight UTC).
pub fn parse_millis(value: &Value) -> Option<i64> {
    if let Some(n) = as_number(value) {
        return Some(n as i64);
    }
    let raw = value.as_str()?.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc).timestamp_millis());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis())
}

fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !matches!(s.as_str(), "" | "0" | "false"),
        Some(_) => true,
    }
}

impl JsonBody {
    /// First failing rule becomes a 422.
    pub fn check(&self, rules: &RuleSet) -> Result<(), Reply> {
        rules.check(&self.0).map_err(Reply::unprocessable)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Owned string, empty when missing.
    pub fn string(&self, key: &str) -> String {
        self.str(key).unwrap_or_default().to_string()
    }

    /// Stored as sent; missing fields become `null`.
    pub fn text(&self, key: &str) -> Bson {
        self.0.get(key).map(json_to_bson).unwrap_or(Bson::Null)
    }

    pub fn oid(&self, key: &str) -> Option<ObjectId> {
        self.str(key).and_then(|s| ObjectId::parse_str(s.trim()).ok())
    }

    /// Id field as stored: an `ObjectId` when valid, else `null`.
    pub fn oid_or_null(&self, key: &str) -> Bson {
        self.oid(key).map(Bson::ObjectId).unwrap_or(Bson::Null)
    }

    pub fn number(&self, key: &str) -> Option<Bson> {
        let n = as_number(self.0.get(key)?)?;
        Some(if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
            Bson::Int64(n as i64)
        } else {
            Bson::Double(n)
        })
    }

    pub fn int(&self, key: &str) -> Option<i64> {
        as_number(self.0.get(key)?).map(|n| n as i64)
    }

    /// Loose boolean: `null`, `""`, `"0"`, `"false"`, `0` and missing are false.
    pub fn flag(&self, key: &str) -> bool {
        truthy(self.0.get(key))
    }

    /// Strict boolean (`true`/`false` or their strings).
    pub fn bool(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(as_bool)
    }

    pub fn millis(&self, key: &str) -> Option<i64> {
        self.0.get(key).and_then(parse_millis)
    }

    /// Ids from a JSON array, skipping invalid entries.
    pub fn oids(&self, key: &str) -> Vec<ObjectId> {
        self.0
            .get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .filter_map(|s| ObjectId::parse_str(s.trim()).ok())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Signed-in admin, set by the admin auth layer.
#[derive(Debug, Clone)]
pub struct AdminSession {
    pub id: ObjectId,
    pub email: String,
}

/// Signed-in tenant user, set by the CAP auth layer.
#[derive(Debug, Clone)]
pub struct CapContext {
    pub user_id: ObjectId,
    pub lead_id: ObjectId,
}

/// Who is writing: the signed-in user, else a valid `userid` header, else 0.
#[derive(Debug, Clone, PartialEq)]
pub struct Actor(pub Bson);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Actor {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(session) = parts.extensions.get::<AdminSession>() {
            return Ok(Self(Bson::ObjectId(session.id)));
        }
        if let Some(ctx) = parts.extensions.get::<CapContext>() {
            return Ok(Self(Bson::ObjectId(ctx.user_id)));
        }
        let header = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| ObjectId::parse_str(v.trim()).ok());
        Ok(Self(header.map(Bson::ObjectId).unwrap_or(Bson::Int32(0))))
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CapContext {
    type Rejection = Reply;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CapContext>()
            .cloned()
            .ok_or_else(Reply::unauthorized)
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AdminSession {
    type Rejection = Reply;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AdminSession>()
            .cloned()
            .ok_or_else(Reply::unauthorized)
    }
}

/// `/:list/:sort/:order/:page/:size` segments.
#[derive(Debug, Clone)]
pub struct ListPath(pub ListParams);

pub fn list_params(
    list: &str,
    sort: &str,
    order: &str,
    page: &str,
    size: &str,
) -> Result<ListParams, Reply> {
    ListParams::parse(list, sort, order, page, size).map_err(|rejection| match rejection {
        ListRejection::NotFound => Reply::not_found(),
        ListRejection::Invalid(message) => Reply::unprocessable(message),
    })
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for ListPath {
    type Rejection = Reply;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path((list, sort, order, page, size)) =
            Path::<(String, String, String, String, String)>::from_request_parts(parts, state)
                .await
                .map_err(|_| Reply::not_found())?;
        list_params(&list, &sort, &order, &page, &size).map(Self)
    }
}

/// Path id that must be an `ObjectId`; anything else is a 422.
pub fn path_id(raw: &str, message: &'static str) -> Result<ObjectId, Reply> {
    ObjectId::parse_str(raw.trim()).map_err(|_| Reply::unprocessable(message))
}
