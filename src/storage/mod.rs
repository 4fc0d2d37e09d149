//! Whole-file JSON persistence.
//!
//! A [`JsonStore`] reads and writes one JSON value per path. Every write
//! replaces the file completely; there is no append path and no partial-write
//! recovery. Reads never fail: a missing file is [`LoadOutcome::Absent`] and
//! anything unreadable is [`LoadOutcome::Corrupt`], so callers branch instead
//! of handling errors.

pub mod encrypted;
pub mod plain;

pub use encrypted::EncryptedStore;
pub use plain::PlainJsonStore;

use crate::errors::Result;
use serde_json::Value;
use std::path::Path;

/// Result of reading a store file.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// The file existed and held a JSON value.
    Loaded(Value),
    /// No file at the path.
    Absent,
    /// The file exists but could not be turned into JSON.
    Corrupt(String),
}

/// Key-value JSON store: one JSON document per path.
pub trait JsonStore {
    fn read(&self, path: &Path) -> LoadOutcome;

    /// Serialises `value` and replaces whatever is at `path`, creating parent
    /// directories as needed.
    fn write(&self, path: &Path, value: &Value) -> Result<()>;

    /// Reads `path`, returning `default` when it is absent or corrupt.
    fn read_or(&self, path: &Path, default: Value) -> Value {
        match self.read(path) {
            LoadOutcome::Loaded(value) => value,
            LoadOutcome::Absent | LoadOutcome::Corrupt(_) => default,
        }
    }
}

/// Creates the parent directory of `path` if it has one.
pub(crate) fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Parses raw bytes as UTF-8 JSON, naming what went wrong on failure.
pub(crate) fn parse_plain(raw: &[u8]) -> std::result::Result<Value, String> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Err("file is empty".to_string());
    }
    let text = std::str::from_utf8(raw).map_err(|e| format!("not UTF-8: {e}"))?;
    serde_json::from_str(text).map_err(|e| format!("invalid JSON: {e}"))
}
