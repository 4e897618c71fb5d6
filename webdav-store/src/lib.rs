//! # WebDAV Store
//!
//! A small WebDAV file client used as a dumb remote file host.
//!
//! This crate provides:
//! - Text download that distinguishes "file does not exist" from failures
//! - Upload with segment-by-segment creation of missing parent collections
//! - Existence checks and connection tests
//!
//! It knows nothing about the documents stored in the files; callers decide
//! what the blobs mean.
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use webdav_store::{WebDavConfig, WebDavStore};
//!
//! let store = WebDavStore::new(WebDavConfig {
//!     url: "https://cloud.example.com/remote.php/dav/files/alice".to_string(),
//!     username: "alice".to_string(),
//!     password: "app-password".to_string(),
//! })?;
//!
//! if store.download("/LX_Music/playlists.json").await?.is_none() {
//!     store.upload("/LX_Music/playlists.json", "{}".to_string()).await?;
//! }
//! ```

/// Connection settings for a WebDAV host
#[derive(Debug, Clone, PartialEq)]
pub struct WebDavConfig {
    /// Base URL of the DAV root (e.g. `https://host/remote.php/dav/files/<user>`)
    pub url: String,
    pub username: String,
    pub password: String,
}

/// Errors returned by the WebDAV client
#[derive(Debug)]
pub enum WebDavError {
    /// Client could not be constructed (bad URL, TLS setup)
    Client(String),
    /// Server answered with an unexpected HTTP status
    Http { status: u16, path: String },
    /// Request failed before a status was available (DNS, refused, timeout)
    Request(String),
}

impl std::fmt::Display for WebDavError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WebDavError::Client(msg) => write!(f, "WebDAV client error: {}", msg),
            WebDavError::Http { status, path } => {
                write!(f, "WebDAV server returned {} for {}", status, path)
            }
            WebDavError::Request(msg) => write!(f, "WebDAV request failed: {}", msg),
        }
    }
}

impl std::error::Error for WebDavError {}

impl WebDavError {
    /// HTTP status code, if the server produced one
    pub fn status(&self) -> Option<u16> {
        match self {
            WebDavError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type WebDavResult<T> = Result<T, WebDavError>;

/// Returns true for the statuses a WebDAV server uses when a file or one of
/// its parent collections is missing.
pub fn is_not_found_status(status: u16) -> bool {
    status == 404 || status == 409
}

/// Splits a directory path into the cumulative prefixes that have to exist,
/// e.g. `/a/b/c` -> `["/a", "/a/b", "/a/b/c"]`.
pub fn directory_prefixes(dir_path: &str) -> Vec<String> {
    let mut prefixes = Vec::new();
    let mut current = String::new();
    for segment in dir_path.split('/').filter(|s| !s.is_empty()) {
        current.push('/');
        current.push_str(segment);
        prefixes.push(current.clone());
    }
    prefixes
}

/// Directory part of a file path (`/a/b/file.json` -> `/a/b`)
pub fn parent_directory(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

/// WebDAV file client
pub struct WebDavStore {
    client: reqwest_dav::Client,
}

impl WebDavStore {
    /// Create a client for the given host
    pub fn new(config: WebDavConfig) -> WebDavResult<Self> {
        let client = reqwest_dav::ClientBuilder::new()
            .set_host(config.url.trim_end_matches('/').to_string())
            .set_auth(reqwest_dav::Auth::Basic(config.username, config.password))
            .build()
            .map_err(|e| WebDavError::Client(format!("{:?}", e)))?;

        Ok(Self { client })
    }

    /// Checks that the DAV root can be listed with the configured credentials
    pub async fn test_connection(&self) -> WebDavResult<()> {
        self.client
            .list("/", reqwest_dav::Depth::Number(0))
            .await
            .map_err(|e| map_dav_error(e, "/"))?;
        Ok(())
    }

    /// Downloads a text file. `Ok(None)` means the file does not exist.
    pub async fn download(&self, path: &str) -> WebDavResult<Option<String>> {
        log::info!("[WebDAV] Attempting to download file: {}", path);

        let response = match self.client.get(path).await {
            Ok(response) => response,
            Err(e) => {
                let err = map_dav_error(e, path);
                if err.status().is_some_and(is_not_found_status) {
                    log::info!("[WebDAV] File not found on server: {}", path);
                    return Ok(None);
                }
                log::error!("[WebDAV] Unexpected download error for {}: {}", path, err);
                return Err(err);
            }
        };

        let status = response.status().as_u16();
        if is_not_found_status(status) {
            log::info!("[WebDAV] File not found on server: {}", path);
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(WebDavError::Http {
                status,
                path: path.to_string(),
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| WebDavError::Request(format!("Read response failed: {}", e)))?;
        Ok(Some(text))
    }

    /// Checks whether a file or collection exists
    pub async fn exists(&self, path: &str) -> WebDavResult<bool> {
        match self.client.list(path, reqwest_dav::Depth::Number(0)).await {
            Ok(_) => Ok(true),
            Err(e) => {
                let err = map_dav_error(e, path);
                if err.status().is_some_and(is_not_found_status) {
                    Ok(false)
                } else {
                    Err(err)
                }
            }
        }
    }

    /// Creates a single collection
    pub async fn create_directory(&self, path: &str) -> WebDavResult<()> {
        self.client
            .mkcol(path)
            .await
            .map_err(|e| map_dav_error(e, path))
    }

    /// Creates every missing collection of `dir_path`, one segment at a time.
    /// Existence is re-checked before each segment, so repeated calls are safe.
    pub async fn ensure_directory(&self, dir_path: &str) -> WebDavResult<()> {
        for current in directory_prefixes(dir_path) {
            if !self.exists(&current).await? {
                log::info!("[WebDAV] Directory {} not found, creating it...", current);
                self.create_directory(&current).await?;
            }
        }
        Ok(())
    }

    /// Uploads a text file, creating missing parent collections first.
    /// The PUT itself replaces the previous file atomically on the server.
    pub async fn upload(&self, path: &str, content: String) -> WebDavResult<()> {
        self.ensure_directory(parent_directory(path)).await?;

        log::info!("[WebDAV] All directories exist. Uploading file to {}...", path);
        self.client
            .put(path, content.into_bytes())
            .await
            .map_err(|e| map_dav_error(e, path))
    }
}

/// Flattens the reqwest_dav error tree into our own error, keeping the HTTP
/// status whenever one is known.
fn map_dav_error(err: reqwest_dav::Error, path: &str) -> WebDavError {
    let status = match &err {
        reqwest_dav::Error::Reqwest(e) => e.status().map(|s| s.as_u16()),
        reqwest_dav::Error::Decode(reqwest_dav::DecodeError::StatusMismatched(s)) => {
            Some(s.response_code)
        }
        reqwest_dav::Error::Decode(reqwest_dav::DecodeError::Server(s)) => Some(s.response_code),
        _ => None,
    };

    match status {
        Some(status) => WebDavError::Http {
            status,
            path: path.to_string(),
        },
        None => WebDavError::Request(format!("{:?}", err)),
    }
}
