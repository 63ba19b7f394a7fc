use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;

pub(crate) const DEFAULT_REL_ALTITUDE: f64 = 20.0;

/// Persisted user settings. One scalar today; the namespaced key keeps the
/// file compatible with the historical settings layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct StoredSettings {
    #[serde(
        rename = "WAYPOINT_MANAGER/defaultRelAltitude",
        default = "default_rel_altitude"
    )]
    pub default_rel_altitude: f64,
}

impl Default for StoredSettings {
    fn default() -> Self {
        Self {
            default_rel_altitude: DEFAULT_REL_ALTITUDE,
        }
    }
}

fn default_rel_altitude() -> f64 {
    DEFAULT_REL_ALTITUDE
}

#[derive(Debug, Clone)]
pub(crate) struct SettingsStore {
    path: Option<PathBuf>,
}

impl SettingsStore {
    pub(crate) fn new(override_path: Option<PathBuf>) -> Self {
        Self {
            path: override_path.or_else(default_path),
        }
    }

    /// Read settings, falling back to defaults on any failure.
    pub(crate) fn load(&self) -> StoredSettings {
        self.path
            .as_ref()
            .and_then(|path| std::fs::read_to_string(path).ok())
            .and_then(|contents| serde_json::from_str(&contents).ok())
            .unwrap_or_default()
    }

    pub(crate) fn save(&self, settings: &StoredSettings) {
        let Some(path) = self.path.as_ref() else {
            warn!("no settings path available; not persisting settings");
            return;
        };
        if let Some(parent) = path.parent() {
            if let Err(err) = std::fs::create_dir_all(parent) {
                warn!(%err, "failed to create settings directory");
                return;
            }
        }
        match serde_json::to_string_pretty(settings) {
            Ok(json) => {
                if let Err(err) = std::fs::write(path, json) {
                    warn!(%err, "failed to write settings");
                }
            }
            Err(err) => warn!(%err, "failed to serialize settings"),
        }
    }
}

fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("missionkit").join("settings.json"))
}
