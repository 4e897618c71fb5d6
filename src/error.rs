use std::fmt;

/// Central error type for the playlist sync engine
#[derive(Debug)]
pub enum SyncError {
    /// Sync disabled or not configured (missing URL, invalid settings)
    Config(String),
    /// Network, authentication or timeout failure talking to the remote host
    Transport(String),
    /// Malformed remote blob or unreadable local data
    Serialization(serde_json::Error),
    /// Local key-value persistence failed (rusqlite)
    Storage(rusqlite::Error),
    /// A sync round-trip is already in flight
    AlreadySyncing,
    /// General error
    Other(String),
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SyncError::Config(msg) => write!(f, "Configuration error: {}", msg),
            SyncError::Transport(msg) => write!(f, "Transport error: {}", msg),
            SyncError::Serialization(e) => write!(f, "Serialization error: {}", e),
            SyncError::Storage(e) => write!(f, "Storage error: {}", e),
            SyncError::AlreadySyncing => write!(f, "A sync is already in progress"),
            SyncError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for SyncError {}

impl From<rusqlite::Error> for SyncError {
    fn from(e: rusqlite::Error) -> Self {
        SyncError::Storage(e)
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        SyncError::Serialization(e)
    }
}

impl From<webdav_store::WebDavError> for SyncError {
    fn from(e: webdav_store::WebDavError) -> Self {
        SyncError::Transport(e.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(e: std::io::Error) -> Self {
        SyncError::Other(format!("IO error: {}", e))
    }
}

impl SyncError {
    /// Errors of this kind abort the cycle and leave local state untouched;
    /// serialization failures count as transport-class.
    pub fn is_transport_class(&self) -> bool {
        matches!(self, SyncError::Transport(_) | SyncError::Serialization(_))
    }

    /// Short message suitable for the notification sink
    pub fn user_message(&self) -> String {
        match self {
            SyncError::Config(_) => "Please enable and configure WebDAV sync first".to_string(),
            SyncError::Transport(msg) => format!("Sync failed: {}", msg),
            SyncError::Serialization(_) => {
                "Sync failed: the remote file could not be read".to_string()
            }
            SyncError::Storage(_) => "Sync failed: local data could not be saved".to_string(),
            SyncError::AlreadySyncing => "Sync in progress, please wait...".to_string(),
            SyncError::Other(msg) => format!("Sync failed: {}", msg),
        }
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
