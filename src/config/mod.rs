/// Settings file and environment overrides
pub mod settings;

/// Tracing subscriber setup for the binary
pub mod logging;

pub use logging::init_tracing;
pub use settings::{AppConfig, LoggingConfig, StorageConfig, load_app_configuration, load_config};
