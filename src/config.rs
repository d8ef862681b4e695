//! Process-wide configuration: the cassette root directory, the JSON codec
//! backend key, and the environment override for the record mode.

use crate::error::TapeError;
use crate::RecordMode;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};

/// When set, this environment variable overrides the mode passed at install
/// time (e.g. `VCR_MODE=all` to force a re-recording session).
pub const MODE_ENV: &str = "VCR_MODE";

const DEFAULT_CASSETTE_ROOT: &str = "test/support/cassettes";
const DEFAULT_CODEC_BACKEND: &str = "serde_json";

#[derive(Debug, Clone)]
struct Settings {
    cassette_root: PathBuf,
    codec_backend: String,
}

static SETTINGS: Lazy<RwLock<Settings>> = Lazy::new(|| {
    RwLock::new(Settings {
        cassette_root: PathBuf::from(DEFAULT_CASSETTE_ROOT),
        codec_backend: DEFAULT_CODEC_BACKEND.to_string(),
    })
});

pub fn cassette_root() -> PathBuf {
    SETTINGS.read().cassette_root.clone()
}

pub fn set_cassette_root(root: impl AsRef<Path>) {
    SETTINGS.write().cassette_root = root.as_ref().to_path_buf();
}

pub fn codec_backend() -> String {
    SETTINGS.read().codec_backend.clone()
}

pub fn set_codec_backend(name: impl Into<String>) {
    SETTINGS.write().codec_backend = name.into();
}

/// Read the mode override from the environment. An unset or empty variable
/// is no override; an unparseable value is a configuration error.
pub(crate) fn mode_override() -> Result<Option<RecordMode>, TapeError> {
    match std::env::var(MODE_ENV) {
        Ok(raw) if !raw.trim().is_empty() => raw.trim().parse().map(Some),
        _ => Ok(None),
    }
}
