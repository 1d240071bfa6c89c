//! Request/response wire envelopes (§6): `{id, method, params}` and
//! `{id, result, error:{code,message}|null}`. `id` is an opaque,
//! caller-chosen string the dispatcher echoes back verbatim.

use serde::{Deserialize, Serialize};

use lbm_types::{ErrorCode, LbmError};

/// One P2P request record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Caller-chosen opaque id, echoed verbatim in the response.
    pub id: String,
    /// Method name, matched against the dispatch table in [`crate::dispatch`].
    pub method: String,
    /// Method-specific parameters, decoded by the handler.
    #[serde(default)]
    pub params: serde_json::Value,
}

/// The `error` half of a response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseError {
    /// One of the six stable wire codes from [`ErrorCode::as_str`].
    pub code: String,
    /// Human-readable message. Never carries a stack trace.
    pub message: String,
}

/// One P2P response record. Exactly one of `result`/`error` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Echoes the request's `id`.
    pub id: String,
    /// Present on success.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub result: Option<serde_json::Value>,
    /// Present on failure.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<ResponseError>,
}

impl Response {
    /// Build a successful response.
    pub fn ok(id: impl Into<String>, result: serde_json::Value) -> Self {
        Self { id: id.into(), result: Some(result), error: None }
    }

    /// Build a failure response with an explicit code.
    pub fn err(id: impl Into<String>, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            result: None,
            error: Some(ResponseError { code: code.as_str().to_string(), message: message.into() }),
        }
    }

    /// Map an [`LbmError`] to its stable wire code.
    pub fn from_error(id: impl Into<String>, e: &LbmError) -> Self {
        Self::err(id, e.code(), e.to_string())
    }
}
