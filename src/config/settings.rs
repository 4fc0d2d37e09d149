//! Application settings loaded from `msms.toml` and the environment.
//!
//! Every field has a default, so a missing file or a file that only sets a few
//! keys is fine. Environment variables override whatever the file says.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::env::VarError;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Config file read when `MSMS_CONFIG` is not set.
pub const DEFAULT_CONFIG_PATH: &str = "msms.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Where schedule data, users and the key live
    pub storage: StorageConfig,
    /// Log destination and level
    pub logging: LoggingConfig,
}

/// File locations and the encryption switch.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Schedule snapshot file
    pub data_path: PathBuf,
    /// Plaintext predecessor of `data_path`, migrated once if `data_path` is absent
    pub legacy_plain_path: Option<PathBuf>,
    /// User credential file
    pub users_path: PathBuf,
    /// Symmetric key file, created on first use
    pub key_path: PathBuf,
    /// Encrypt data at rest
    pub encrypt: bool,
    /// Destination of start-up backups
    pub backup_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("data/msms.json.enc"),
            legacy_plain_path: Some(PathBuf::from("data/msms.json")),
            users_path: PathBuf::from("data/users.json.enc"),
            key_path: PathBuf::from("secrets/msms.key"),
            encrypt: true,
            backup_dir: PathBuf::from("data/backups"),
        }
    }
}

/// Logging destination and verbosity.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Append logs here; `None` logs to stderr
    pub log_file: Option<PathBuf>,
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_file: Some(PathBuf::from("msms.log")),
            level: "info".to_string(),
        }
    }
}

/// Loads configuration from a TOML file.
///
/// # Errors
/// Returns [`Error::Config`] if the file cannot be read or is not valid TOML
/// for [`AppConfig`].
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path = path.as_ref();
    debug!("Attempting to load configuration from: {:?}", path);
    let contents = std::fs::read_to_string(path).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path.display()),
    })?;
    toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse {}: {e}", path.display()),
    })
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => Err(Error::Config {
            message: format!("{key} must be true/false/1/0/yes/no, got '{other}'"),
        }),
    }
}

impl AppConfig {
    /// Applies `MSMS_*` overrides looked up through `lookup`.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if `MSMS_ENCRYPT` is not a recognised boolean.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = |key: &str| lookup(key).map(PathBuf::from);

        if let Some(p) = path("MSMS_DATA_PATH") {
            self.storage.data_path = p;
        }
        if let Some(p) = path("MSMS_LEGACY_PLAIN_PATH") {
            self.storage.legacy_plain_path = (!p.as_os_str().is_empty()).then_some(p);
        }
        if let Some(p) = path("MSMS_USERS_PATH") {
            self.storage.users_path = p;
        }
        if let Some(p) = path("MSMS_KEY_PATH") {
            self.storage.key_path = p;
        }
        if let Some(raw) = lookup("MSMS_ENCRYPT") {
            self.storage.encrypt = parse_bool("MSMS_ENCRYPT", &raw)?;
        }
        if let Some(p) = path("MSMS_BACKUP_DIR") {
            self.storage.backup_dir = p;
        }
        if let Some(p) = path("MSMS_LOG_FILE") {
            self.logging.log_file = (!p.as_os_str().is_empty()).then_some(p);
        }
        if let Some(level) = lookup("MSMS_LOG_LEVEL") {
            self.logging.level = level;
        }
        Ok(())
    }
}

/// Loads the configuration the binary runs with: `MSMS_CONFIG` (or
/// `msms.toml`) if it exists, otherwise defaults, then environment overrides.
///
/// # Errors
/// Returns [`Error::Config`] for an unreadable or invalid config file or a bad
/// override value, and [`Error::EnvVar`] if `MSMS_CONFIG` is not valid Unicode.
pub fn load_app_configuration() -> Result<AppConfig> {
    let path = match std::env::var("MSMS_CONFIG") {
        Ok(path) => path,
        Err(VarError::NotPresent) => DEFAULT_CONFIG_PATH.to_string(),
        Err(e) => return Err(e.into()),
    };
    let mut config = if Path::new(&path).is_file() {
        load_config(&path)?
    } else {
        info!("No config file at {}; using defaults", path);
        AppConfig::default()
    };
    config.apply_overrides(|key| std::env::var(key).ok())?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.storage.data_path, PathBuf::from("data/msms.json.enc"));
        assert_eq!(config.storage.key_path, PathBuf::from("secrets/msms.key"));
        assert!(config.storage.encrypt);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_toml_back_fills_defaults() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("msms.toml");
        std::fs::write(
            &path,
            r#"
                [storage]
                data_path = "school.json"
                encrypt = false

                [logging]
                level = "debug"
            "#,
        )?;

        let config = load_config(&path)?;
        assert_eq!(config.storage.data_path, PathBuf::from("school.json"));
        assert!(!config.storage.encrypt);
        assert_eq!(config.storage.users_path, PathBuf::from("data/users.json.enc"));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.log_file, Some(PathBuf::from("msms.log")));
        Ok(())
    }

    #[test]
    fn test_invalid_toml_is_config_error() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("msms.toml");
        std::fs::write(&path, "[storage]\nencrypt = \"maybe\"")?;
        assert!(matches!(load_config(&path), Err(Error::Config { .. })));
        assert!(matches!(
            load_config(dir.path().join("missing.toml")),
            Err(Error::Config { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_environment_overrides() -> Result<()> {
        let env: HashMap<&str, &str> = [
            ("MSMS_DATA_PATH", "/tmp/school.json"),
            ("MSMS_ENCRYPT", "no"),
            ("MSMS_LOG_FILE", ""),
            ("MSMS_LOG_LEVEL", "warn"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_overrides(|key| env.get(key).map(ToString::to_string))?;

        assert_eq!(config.storage.data_path, PathBuf::from("/tmp/school.json"));
        assert!(!config.storage.encrypt);
        assert_eq!(config.logging.log_file, None);
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.storage.backup_dir, PathBuf::from("data/backups"));
        Ok(())
    }

    #[test]
    fn test_bad_encrypt_override_is_rejected() {
        let mut config = AppConfig::default();
        let result = config.apply_overrides(|key| (key == "MSMS_ENCRYPT").then(|| "sometimes".to_string()));
        assert!(matches!(result, Err(Error::Config { .. })));
    }
}
