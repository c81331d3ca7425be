use crate::models::settings::{AppState, Settings};
use crate::services::data_dir_service::settings_path;
use crate::services::diagnostic_logger;
use log::{debug, warn};
use std::fs;
use std::path::Path;

/// Settings from `<data dir>/settings.json`; defaults when missing or unreadable
pub fn load_settings_from_file(data_dir: &Path) -> Settings {
    let path = settings_path(data_dir);
    if !path.exists() {
        return Settings::default();
    }

    let parsed = fs::read_to_string(&path)
        .map_err(|e| e.to_string())
        .and_then(|json| serde_json::from_str::<Settings>(&json).map_err(|e| e.to_string()));

    match parsed {
        Ok(settings) => settings,
        Err(e) => {
            warn!("[Settings] Ignoring unreadable {}: {}", path.display(), e);
            Settings::default()
        }
    }
}

pub fn load_settings(state: &AppState) -> Settings {
    state.settings_snapshot()
}

pub fn save_settings(settings: Settings, state: &AppState) -> Result<(), String> {
    {
        let mut current = state
            .settings
            .lock()
            .map_err(|_| "Settings lock poisoned".to_string())?;
        *current = settings.clone();
    }

    if settings.diagnostics_enabled != diagnostic_logger::is_diagnostics_enabled() {
        diagnostic_logger::set_diagnostics_enabled(settings.diagnostics_enabled);
    }

    let json = serde_json::to_string_pretty(&settings)
        .map_err(|e| format!("Failed to serialize settings: {}", e))?;
    fs::write(settings_path(&state.data_dir), json)
        .map_err(|e| format!("Failed to write settings file: {}", e))?;

    debug!("[Settings] Saved settings");
    Ok(())
}

/// Remember the last channel that was joined successfully
pub fn remember_username(username: &str, state: &AppState) -> Result<(), String> {
    let mut settings = load_settings(state);
    if settings.last_username.as_deref() == Some(username) {
        return Ok(());
    }
    settings.last_username = Some(username.to_string());
    save_settings(settings, state)
}
