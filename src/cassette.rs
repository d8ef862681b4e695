//! The cassette store: line-delimited JSON files of recorded exchanges.
//!
//! The store exclusively owns file I/O. Reads are unrestricted; appends to
//! the same path are serialized through a process-wide lock keyed on the
//! absolute path, so concurrent stubs interleave at line boundaries only.

use crate::codec;
use crate::config;
use crate::entry::Entry;
use crate::error::TapeError;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

static PATH_LOCKS: Lazy<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

fn path_lock(path: &Path) -> Arc<Mutex<()>> {
    PATH_LOCKS.lock().entry(absolute(path)).or_default().clone()
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

/// Resolve a cassette name to `<root>/<name>.jsonl`. Forward slashes in the
/// name are preserved as subdirectories.
pub fn resolve_path(name: &str) -> PathBuf {
    config::cassette_root().join(format!("{name}.jsonl"))
}

/// Load every entry of a cassette, preserving file order. A missing file is
/// an empty cassette; whitespace-only lines are skipped; anything else must
/// decode as exactly one entry or the load fails.
pub fn load(path: &Path) -> Result<Vec<Entry>, TapeError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(TapeError::Io {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };

    let mut entries = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let entry = codec::decode::<Entry>(line.as_bytes()).map_err(|e| match e {
            TapeError::Codec(source) => TapeError::CassetteLoad {
                path: path.to_path_buf(),
                line: idx + 1,
                source,
            },
            other => other,
        })?;
        entries.push(entry);
    }

    log::debug!("loaded {} entries from {}", entries.len(), path.display());
    Ok(entries)
}

/// Append one entry as a single `\n`-terminated JSONL line, creating parent
/// directories on demand. The whole line goes out in one write under the
/// per-path lock.
pub fn append(path: &Path, entry: &Entry) -> Result<(), TapeError> {
    let line = codec::encode(entry)?;

    let lock = path_lock(path);
    let _guard = lock.lock();

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| TapeError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| TapeError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
    file.write_all(format!("{line}\n").as_bytes())
        .map_err(|e| TapeError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

    Ok(())
}
