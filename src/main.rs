use dotenvy::dotenv;
use msms::config::{self, init_tracing};
use msms::core::{ScheduleManager, UserAuth, backup_data};
use msms::errors::Result;
use msms::storage::{EncryptedStore, JsonStore, PlainJsonStore};
use tracing::{error, info, warn};

fn main() -> Result<()> {
    // 1. Load .env file (non-fatal, env vars can be set externally)
    let dotenv_loaded = dotenv().is_ok();

    // 2. Load the application configuration (file + MSMS_* overrides)
    let app_config = config::load_app_configuration()
        .inspect_err(|e| eprintln!("Critical error loading application configuration: {e}"))?;

    // 3. Initialize tracing as soon as we know where logs go
    init_tracing(&app_config.logging)?;
    info!(dotenv_loaded, "Configuration loaded: {:?}", app_config);

    // 4. Back up the data file before anything touches it
    match backup_data(&app_config.storage.data_path, &app_config.storage.backup_dir) {
        Ok(Some(path)) => info!("Backup written to {:?}", path),
        Ok(None) => {}
        Err(e) => error!("Backup failed: {}", e),
    }

    // 5. Open the schedule and the user store
    let manager = ScheduleManager::from_config(&app_config.storage)
        .inspect_err(|e| error!("Failed to open schedule data: {}", e))?;

    let user_store: Box<dyn JsonStore> = if app_config.storage.encrypt {
        Box::new(EncryptedStore::open(&app_config.storage.key_path)?)
    } else {
        Box::new(PlainJsonStore)
    };
    let auth = UserAuth::new(&app_config.storage.users_path, user_store);

    info!(
        "MSMS ready: {} students, {} teachers, {} courses, {} attendance records, {} payments",
        manager.students().len(),
        manager.teachers().len(),
        manager.courses().len(),
        manager.attendance().len(),
        manager.finance().len()
    );
    if !auth.has_any_user() {
        warn!("No users registered yet; the first account registered becomes admin");
    }

    Ok(())
}
