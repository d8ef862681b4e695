//! The cassette entry model: one recorded request/response exchange,
//! serialized as exactly one JSON object per cassette line.

use crate::error::{CodecError, TapeError};
use base64::{engine::general_purpose, Engine as _};
use http_types::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    pub req: RecordedRequest,
    pub resp: RecordedResponse,
}

/// The on-disk form of a request: canonical URL, redacted headers, and the
/// body reduced to its hash. Never contains secrets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedRequest {
    pub method: String,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    /// `"-"` or 64-char lowercase hex sha256 of the raw body bytes.
    pub body_hash: String,
}

/// The on-disk form of a response. `body_b64` decodes to the literal body
/// bytes; bodies are never re-encoded on replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedResponse {
    pub status: u16,
    pub headers: BTreeMap<String, HeaderValue>,
    pub body_b64: String,
}

/// A response header value: most are single strings, multi-valued headers
/// are stored as a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HeaderValue {
    One(String),
    Many(Vec<String>),
}

impl HeaderValue {
    pub fn values(&self) -> impl Iterator<Item = &str> {
        match self {
            HeaderValue::One(value) => std::slice::from_ref(value).iter(),
            HeaderValue::Many(values) => values.iter(),
        }
        .map(String::as_str)
    }

    /// Collapse a value list into the stored form.
    pub fn from_values(mut values: Vec<String>) -> Self {
        if values.len() == 1 {
            HeaderValue::One(values.remove(0))
        } else {
            HeaderValue::Many(values)
        }
    }
}

impl RecordedResponse {
    /// Build the stored form of a response from its raw body bytes.
    pub fn from_bytes(status: u16, headers: BTreeMap<String, HeaderValue>, body: &[u8]) -> Self {
        Self {
            status,
            headers,
            body_b64: general_purpose::STANDARD.encode(body),
        }
    }

    /// Reconstruct the response exactly as recorded: status, headers, and
    /// the literal body bytes. Content-type decoding is the host client's
    /// concern, not ours.
    pub fn to_response(&self) -> Result<Response, TapeError> {
        let status = StatusCode::try_from(self.status).map_err(|_| {
            TapeError::Codec(CodecError::new(format!(
                "recorded status {} is not a valid HTTP status",
                self.status
            )))
        })?;

        let mut resp = Response::new(status);
        for (name, value) in &self.headers {
            for v in value.values() {
                let _ = resp.append_header(name.as_str(), v);
            }
        }

        let body = general_purpose::STANDARD.decode(&self.body_b64).map_err(|e| {
            TapeError::Codec(CodecError::new(format!("invalid body_b64: {e}")))
        })?;
        resp.set_body(body);

        Ok(resp)
    }
}
