//! Plaintext JSON store, used when encryption is switched off and for reading
//! legacy plaintext files during migration.

use super::{JsonStore, LoadOutcome, ensure_parent_dir, parse_plain};
use crate::errors::Result;
use serde_json::Value;
use std::path::Path;
use tracing::{debug, instrument};

#[derive(Debug, Clone, Copy, Default)]
pub struct PlainJsonStore;

impl JsonStore for PlainJsonStore {
    #[instrument(skip(self))]
    fn read(&self, path: &Path) -> LoadOutcome {
        if !path.exists() {
            return LoadOutcome::Absent;
        }
        match std::fs::read(path) {
            Ok(raw) => match parse_plain(&raw) {
                Ok(value) => LoadOutcome::Loaded(value),
                Err(reason) => LoadOutcome::Corrupt(reason),
            },
            Err(e) => LoadOutcome::Corrupt(format!("read failed: {e}")),
        }
    }

    #[instrument(skip(self, value))]
    fn write(&self, path: &Path, value: &Value) -> Result<()> {
        ensure_parent_dir(path)?;
        let payload = serde_json::to_string_pretty(value)?;
        std::fs::write(path, payload)?;
        debug!("Wrote plaintext store {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::errors::Result;
    use serde_json::json;

    #[test]
    fn test_round_trip_creates_parent_dirs() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested/deeper/msms.json");
        let store = PlainJsonStore;

        assert_eq!(store.read(&path), LoadOutcome::Absent);
        store.write(&path, &json!({"students": []}))?;
        assert_eq!(store.read(&path), LoadOutcome::Loaded(json!({"students": []})));
        Ok(())
    }

    #[test]
    fn test_empty_and_garbage_files_are_corrupt() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("msms.json");
        let store = PlainJsonStore;

        std::fs::write(&path, "")?;
        assert!(matches!(store.read(&path), LoadOutcome::Corrupt(_)));

        std::fs::write(&path, "{\"students\": [")?;
        assert!(matches!(store.read(&path), LoadOutcome::Corrupt(_)));
        assert_eq!(store.read_or(&path, json!({})), json!({}));
        Ok(())
    }
}
