//! The `{status, message, data?}` envelope every endpoint answers with.

use std::borrow::Cow;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use bson::{Bson, Document};
use serde_json::{json, Map, Value};
use tenantdesk_core::PageData;

#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub code: StatusCode,
    pub status: u8,
    pub message: Cow<'static, str>,
    pub data: Option<Value>,
}

impl Reply {
    pub fn new(code: StatusCode, status: u8, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            code,
            status,
            message: message.into(),
            data: None,
        }
    }

    pub fn ok(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(StatusCode::OK, 1, message)
    }

    /// `200 success` carrying a payload.
    pub fn success(data: Value) -> Self {
        Self::ok("success").data(data)
    }

    pub fn bad_request(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, 0, message)
    }

    pub fn unprocessable(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, 0, message)
    }

    pub fn failure(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, 0, message)
    }

    pub fn server_error() -> Self {
        Self::failure("Server error")
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, 0, "Unauthorized Access")
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, 0, "URL not found")
    }

    pub fn status(mut self, status: u8) -> Self {
        self.status = status;
        self
    }

    pub fn data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Attach `data` only when `enabled`; used for dev-only debug payloads.
    pub fn debug_data(self, enabled: bool, data: impl FnOnce() -> Value) -> Self {
        if enabled {
            self.data(data())
        } else {
            self
        }
    }

    /// `data: {list, pagination}` for paginated views.
    pub fn page(list: Vec<Document>, pagination: PageData) -> Self {
        let pagination = serde_json::to_value(pagination).unwrap_or(Value::Null);
        Self::success(json!({ "list": documents_to_json(&list), "pagination": pagination }))
    }

    pub fn is_success(&self) -> bool {
        self.code == StatusCode::OK && self.status == 1
    }
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        let mut body = Map::new();
        body.insert("status".into(), Value::from(self.status));
        body.insert("message".into(), Value::from(self.message.into_owned()));
        if let Some(data) = self.data {
            body.insert("data".into(), data);
        }
        (self.code, Json(Value::Object(body))).into_response()
    }
}

/// Render a stored document the way clients expect it: ids as hex strings,
/// numbers as plain JSON numbers.
pub fn document_to_json(doc: &Document) -> Value {
    Value::Object(
        doc.iter()
            .map(|(k, v)| (k.clone(), bson_to_json(v)))
            .collect(),
    )
}

pub fn documents_to_json(docs: &[Document]) -> Value {
    Value::Array(docs.iter().map(document_to_json).collect())
}

pub fn bson_to_json(value: &Bson) -> Value {
    match value {
        Bson::ObjectId(id) => Value::String(id.to_hex()),
        Bson::Int32(n) => Value::from(*n),
        Bson::Int64(n) => Value::from(*n),
        Bson::Double(n) => serde_json::Number::from_f64(*n)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Bson::String(s) => Value::String(s.clone()),
        Bson::Boolean(b) => Value::Bool(*b),
        Bson::Null | Bson::Undefined => Value::Null,
        Bson::DateTime(dt) => Value::from(dt.timestamp_millis()),
        Bson::Array(items) => Value::Array(items.iter().map(bson_to_json).collect()),
        Bson::Document(doc) => document_to_json(doc),
        other => other.clone().into_relaxed_extjson(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use bson::{doc, oid::ObjectId};

    #[test]
    fn ids_render_as_hex() {
        let id = ObjectId::new();
        let out = document_to_json(&doc! { "_id": id, "n": 3_i64, "nested": { "x": 1 } });
        assert_eq!(out["_id"], Value::String(id.to_hex()));
        assert_eq!(out["n"], json!(3));
        assert_eq!(out["nested"]["x"], json!(1));
    }

    #[tokio::test]
    async fn envelope_omits_missing_data() {
        let response = Reply::unauthorized().into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, json!({ "status": 0, "message": "Unauthorized Access" }));
    }

    #[test]
    fn debug_data_respects_flag() {
        let hidden = Reply::ok("done").debug_data(false, || json!("link"));
        assert!(hidden.data.is_none());
        let shown = Reply::ok("done").debug_data(true, || json!("link"));
        assert_eq!(shown.data, Some(json!("link")));
    }
}
