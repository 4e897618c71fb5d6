//! Remote snapshot storage seam
//!
//! The engine only ever reads and writes whole text blobs by path. A missing
//! file is `Ok(None)`, never an error.

use crate::error::{SyncError, SyncResult};
use crate::models::RemoteSnapshot;
use crate::services::settings_provider::SettingsProvider;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use webdav_store::{WebDavConfig, WebDavStore};

/// Boxed future returned by the async collaborator traits
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Blob storage holding the remote snapshots
pub trait RemoteStore: Send + Sync {
    /// Downloads a file; `Ok(None)` when it does not exist
    fn download<'a>(&'a self, path: &'a str) -> BoxFuture<'a, SyncResult<Option<String>>>;

    /// Uploads a file, creating missing parent directories
    fn upload<'a>(&'a self, path: &'a str, content: String) -> BoxFuture<'a, SyncResult<()>>;
}

/// Downloads and parses a snapshot envelope
pub async fn download_snapshot<T: DeserializeOwned>(
    remote: &dyn RemoteStore,
    path: &str,
) -> SyncResult<Option<RemoteSnapshot<T>>> {
    match remote.download(path).await? {
        Some(content) => Ok(Some(RemoteSnapshot::from_json(&content)?)),
        None => Ok(None),
    }
}

/// Serializes and uploads a snapshot envelope
pub async fn upload_snapshot<T: Serialize>(
    remote: &dyn RemoteStore,
    path: &str,
    snapshot: &RemoteSnapshot<T>,
) -> SyncResult<()> {
    let content = snapshot.to_json()?;
    remote.upload(path, content).await
}

/// WebDAV remote that connects with the current settings on every call,
/// so credential changes apply to the next cycle without a restart
pub struct WebDavRemote {
    settings: Arc<dyn SettingsProvider>,
}

impl WebDavRemote {
    pub fn new(settings: Arc<dyn SettingsProvider>) -> Self {
        Self { settings }
    }

    fn connect(&self) -> SyncResult<WebDavStore> {
        let settings = self.settings.current();
        if settings.server_url.trim().is_empty() {
            return Err(SyncError::Config("WebDAV server URL is not set".to_string()));
        }
        Ok(WebDavStore::new(WebDavConfig {
            url: settings.server_url,
            username: settings.username,
            password: settings.password,
        })?)
    }

    /// Checks the current credentials against the server
    pub async fn test_connection(&self) -> SyncResult<()> {
        let store = self.connect()?;
        store.test_connection().await?;
        log::info!("[WebDAV] Connection test succeeded");
        Ok(())
    }
}

impl RemoteStore for WebDavRemote {
    fn download<'a>(&'a self, path: &'a str) -> BoxFuture<'a, SyncResult<Option<String>>> {
        Box::pin(async move {
            let store = self.connect()?;
            Ok(store.download(path).await?)
        })
    }

    fn upload<'a>(&'a self, path: &'a str, content: String) -> BoxFuture<'a, SyncResult<()>> {
        Box::pin(async move {
            let store = self.connect()?;
            Ok(store.upload(path, content).await?)
        })
    }
}

/// In-memory remote, used by tests and offline setups
#[derive(Default)]
pub struct MemoryRemote {
    files: Mutex<HashMap<String, String>>,
    failing: AtomicBool,
    latency: Mutex<Duration>,
    downloads: AtomicUsize,
    uploads: AtomicUsize,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following call fail with a transport error
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Delay applied before each call completes
    pub fn set_latency(&self, latency: Duration) {
        if let Ok(mut guard) = self.latency.lock() {
            *guard = latency;
        }
    }

    pub fn put(&self, path: &str, content: impl Into<String>) {
        if let Ok(mut files) = self.files.lock() {
            files.insert(path.to_string(), content.into());
        }
    }

    pub fn get(&self, path: &str) -> Option<String> {
        let files = self.files.lock().ok()?;
        files.get(path).cloned()
    }

    pub fn download_count(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    async fn round_trip(&self) -> SyncResult<()> {
        let latency = self
            .latency
            .lock()
            .map(|d| *d)
            .unwrap_or(Duration::ZERO);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(SyncError::Transport("connection refused".to_string()));
        }
        Ok(())
    }
}

impl RemoteStore for MemoryRemote {
    fn download<'a>(&'a self, path: &'a str) -> BoxFuture<'a, SyncResult<Option<String>>> {
        Box::pin(async move {
            self.downloads.fetch_add(1, Ordering::SeqCst);
            self.round_trip().await?;
            Ok(self.get(path))
        })
    }

    fn upload<'a>(&'a self, path: &'a str, content: String) -> BoxFuture<'a, SyncResult<()>> {
        Box::pin(async move {
            self.uploads.fetch_add(1, Ordering::SeqCst);
            self.round_trip().await?;
            self.put(path, content);
            Ok(())
        })
    }
}
