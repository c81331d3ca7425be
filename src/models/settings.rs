use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct KickSettings {
    pub api_base_url: String,
    pub pusher_key: String,
    pub pusher_cluster: String,
    pub reconnect_delay_secs: u64, // Delay before the websocket reconnects
}

impl Default for KickSettings {
    fn default() -> Self {
        Self {
            api_base_url: "https://kick.com/api/v1".to_string(),
            pusher_key: "32cbd69e4b950bf97679".to_string(),
            pusher_cluster: "us2".to_string(),
            reconnect_delay_secs: 5,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Settings {
    #[serde(default)]
    pub last_username: Option<String>,
    /// Keep the last links of each channel across sessions
    #[serde(default = "default_true")]
    pub persistence_enabled: bool,
    #[serde(default)]
    pub diagnostics_enabled: bool,
    #[serde(default)]
    pub kick: KickSettings,
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            last_username: None,
            persistence_enabled: true,
            diagnostics_enabled: false,
            kick: KickSettings::default(),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Mutex<Settings>>,
    pub data_dir: PathBuf,
}

impl AppState {
    pub fn new(settings: Settings, data_dir: PathBuf) -> Self {
        Self {
            settings: Arc::new(Mutex::new(settings)),
            data_dir,
        }
    }

    /// Copy of the current settings; falls back to defaults if the lock is poisoned
    pub fn settings_snapshot(&self) -> Settings {
        self.settings
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }
}
