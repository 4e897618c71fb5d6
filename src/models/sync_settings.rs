use crate::error::{SyncError, SyncResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default sync folder on the WebDAV host
pub const DEFAULT_REMOTE_PATH: &str = "/LX_Music/";
/// Default quiet period before an automatic list sync fires
pub const DEFAULT_DEBOUNCE_MS: u64 = 3000;

/// What to do when the pending log cannot be folded onto the remote lists
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Ask the user through the conflict resolver
    #[default]
    Ask,
    /// Keep the local lists without asking
    PreferLocal,
    /// Keep the remote lists without asking
    PreferRemote,
}

/// Synchronization settings for the WebDAV host
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SyncSettings {
    pub server_url: String,
    pub username: String,
    pub password: String,
    pub remote_path: String,
    pub enabled: bool,
    /// Sync lists automatically after local edits
    pub sync_lists: bool,
    pub debounce_ms: u64,
    pub conflict_policy: ConflictPolicy,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            server_url: String::new(),
            username: String::new(),
            password: String::new(),
            remote_path: DEFAULT_REMOTE_PATH.to_string(),
            enabled: false,
            sync_lists: true,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            conflict_policy: ConflictPolicy::Ask,
        }
    }
}

impl SyncSettings {
    pub fn new(server_url: String, username: String, password: String) -> Self {
        Self {
            server_url,
            username,
            password,
            enabled: true,
            ..Default::default()
        }
    }

    /// Enabled and pointing at a server
    pub fn is_configured(&self) -> bool {
        self.enabled && !self.server_url.trim().is_empty()
    }

    pub fn validate(&self) -> SyncResult<()> {
        if !self.enabled {
            return Ok(());
        }
        if self.server_url.trim().is_empty() {
            return Err(SyncError::Config("server_url must not be empty".to_string()));
        }
        if !self.server_url.starts_with("http://") && !self.server_url.starts_with("https://") {
            return Err(SyncError::Config(format!(
                "server_url must start with http:// or https://, got {}",
                self.server_url
            )));
        }
        if self.username.trim().is_empty() {
            return Err(SyncError::Config("username must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    pub fn from_toml(s: &str) -> SyncResult<Self> {
        let settings: SyncSettings =
            toml::from_str(s).map_err(|e| SyncError::Config(format!("Invalid TOML: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reads settings from a TOML file
    pub fn load_file(path: &Path) -> SyncResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }
}
