//! Remote file layout
//!
//! ```text
//! <remote_path>/
//! ├── playlists.json   # list document snapshot
//! ├── settings.json    # app settings snapshot
//! └── user_apis.json   # user-defined sources and their scripts
//! ```

/// File name of the playlist snapshot
pub const PLAYLISTS_FILE: &str = "playlists.json";

/// File name of the settings snapshot
pub const SETTINGS_FILE: &str = "settings.json";

/// File name of the user-defined source snapshot
pub const USER_APIS_FILE: &str = "user_apis.json";

/// Normalizes a configured root to `/segment/.../`
pub fn normalize_root(remote_path: &str) -> String {
    let trimmed = remote_path.trim().trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{}/", trimmed)
    }
}

fn join(remote_path: &str, file: &str) -> String {
    format!("{}{}", normalize_root(remote_path), file)
}

/// Build playlist snapshot path
pub fn playlists_path(remote_path: &str) -> String {
    join(remote_path, PLAYLISTS_FILE)
}

/// Build settings snapshot path
pub fn settings_path(remote_path: &str) -> String {
    join(remote_path, SETTINGS_FILE)
}

/// Build user source snapshot path
pub fn user_apis_path(remote_path: &str) -> String {
    join(remote_path, USER_APIS_FILE)
}
