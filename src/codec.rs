//! Uniform JSON encode/decode over a pluggable backend.
//!
//! The backend is resolved per call: a process-installed custom backend wins,
//! otherwise the configured built-in. Cassette lines never depend on which
//! backend produced them; built-ins are interchangeable.

use crate::config;
use crate::error::{CodecError, TapeError};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt::Debug;
use std::sync::Arc;

pub trait JsonBackend: Debug + Send + Sync {
    fn name(&self) -> &str;
    fn encode(&self, value: &Value) -> Result<String, CodecError>;
    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError>;
}

/// The built-in default backend.
#[derive(Debug)]
pub struct SerdeJsonBackend;

impl JsonBackend for SerdeJsonBackend {
    fn name(&self) -> &str {
        "serde_json"
    }

    fn encode(&self, value: &Value) -> Result<String, CodecError> {
        serde_json::to_string(value).map_err(CodecError::from)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        serde_json::from_slice(bytes).map_err(CodecError::from)
    }
}

static CUSTOM_BACKEND: Lazy<RwLock<Option<Arc<dyn JsonBackend>>>> =
    Lazy::new(|| RwLock::new(None));

/// Install a custom backend for the whole process.
pub fn set_backend(backend: Arc<dyn JsonBackend>) {
    log::debug!("json codec backend set to '{}'", backend.name());
    *CUSTOM_BACKEND.write() = Some(backend);
}

/// Drop a custom backend, returning to the configured built-in.
pub fn reset_backend() {
    *CUSTOM_BACKEND.write() = None;
}

fn backend() -> Result<Arc<dyn JsonBackend>, TapeError> {
    if let Some(custom) = CUSTOM_BACKEND.read().clone() {
        return Ok(custom);
    }
    match config::codec_backend().as_str() {
        "serde_json" => Ok(Arc::new(SerdeJsonBackend)),
        other => Err(TapeError::Config(format!(
            "no JSON backend available for '{other}'; configure 'serde_json' \
             or install one with codec::set_backend"
        ))),
    }
}

pub fn encode<T: Serialize>(value: &T) -> Result<String, TapeError> {
    let backend = backend()?;
    let value = serde_json::to_value(value).map_err(|e| TapeError::Codec(CodecError::from(e)))?;
    backend.encode(&value).map_err(TapeError::Codec)
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, TapeError> {
    let backend = backend()?;
    let value = backend.decode(bytes).map_err(TapeError::Codec)?;
    serde_json::from_value(value).map_err(|e| TapeError::Codec(CodecError::from(e)))
}
