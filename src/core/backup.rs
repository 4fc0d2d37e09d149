//! Timestamped copies of the data file, taken before a session starts.

use crate::errors::Result;
use chrono::Local;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

/// Copies `data_path` to `<backup_dir>/<file name>_backup_<YYYY-MM-DD_HH-MM-SS>`.
///
/// Returns `Ok(None)` if there is no data file yet.
///
/// # Errors
/// Returns [`crate::errors::Error::Io`] if the backup directory cannot be
/// created or the copy fails.
#[instrument]
pub fn backup_data(data_path: &Path, backup_dir: &Path) -> Result<Option<PathBuf>> {
    if !data_path.is_file() {
        info!("No data file at {:?}; nothing to back up", data_path);
        return Ok(None);
    }
    std::fs::create_dir_all(backup_dir)?;

    let base = data_path
        .file_name()
        .map_or_else(|| "data".into(), |n| n.to_string_lossy().into_owned());
    let stamp = Local::now().format("%Y-%m-%d_%H-%M-%S");
    let target = backup_dir.join(format!("{base}_backup_{stamp}"));

    std::fs::copy(data_path, &target)?;
    info!("Data successfully backed up to {:?}", target);
    Ok(Some(target))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_backup_copies_bytes() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let data = dir.path().join("msms.json.enc");
        std::fs::write(&data, b"payload")?;

        let target = backup_data(&data, &dir.path().join("backups"))?.unwrap();
        let name = target.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("msms.json.enc_backup_"));
        assert_eq!(std::fs::read(&target)?, b"payload");
        Ok(())
    }

    #[test]
    fn test_backup_without_data_file_is_noop() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let backups = dir.path().join("backups");
        assert!(backup_data(&dir.path().join("missing.json"), &backups)?.is_none());
        assert!(!backups.exists());
        Ok(())
    }
}
