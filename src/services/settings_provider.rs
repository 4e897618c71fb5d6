use crate::error::SyncResult;
use crate::models::SyncSettings;
use std::path::Path;
use std::sync::RwLock;

/// Read-only view of the sync configuration owned by the settings subsystem
pub trait SettingsProvider: Send + Sync {
    /// Current settings; read again at the start of every cycle
    fn current(&self) -> SyncSettings;
}

/// Holds a settings value that the host can replace at runtime
pub struct StaticSettings {
    settings: RwLock<SyncSettings>,
}

impl StaticSettings {
    pub fn new(settings: SyncSettings) -> Self {
        Self {
            settings: RwLock::new(settings),
        }
    }

    /// Loads and validates a TOML settings file
    pub fn from_file(path: &Path) -> SyncResult<Self> {
        let settings = SyncSettings::load_file(path)?;
        log::info!(
            "[Sync] Loaded settings from {} (enabled: {})",
            path.display(),
            settings.enabled
        );
        Ok(Self::new(settings))
    }

    pub fn update(&self, settings: SyncSettings) {
        match self.settings.write() {
            Ok(mut guard) => *guard = settings,
            Err(poisoned) => *poisoned.into_inner() = settings,
        }
    }
}

impl SettingsProvider for StaticSettings {
    fn current(&self) -> SyncSettings {
        match self.settings.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}
