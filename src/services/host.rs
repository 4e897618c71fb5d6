//! Seams to the host application: the live list store, app settings and
//! user sources, and the user-visible notification channel.

use crate::error::{SyncError, SyncResult};
use crate::models::{ListDataFull, SettingsMap, UserApisData};
use std::sync::Mutex;

/// Live playlist store observed by the UI
pub trait ListStore: Send + Sync {
    fn read_all_lists(&self) -> SyncResult<ListDataFull>;
    /// Replaces every list with `data`
    fn overwrite_all_lists(&self, data: ListDataFull) -> SyncResult<()>;
}

/// App settings and user-defined sources, synced by the manual actions
pub trait AppDataStore: Send + Sync {
    fn read_settings(&self) -> SyncResult<SettingsMap>;
    fn overwrite_settings(&self, settings: SettingsMap) -> SyncResult<()>;
    fn read_user_apis(&self) -> SyncResult<UserApisData>;
    fn overwrite_user_apis(&self, data: UserApisData) -> SyncResult<()>;
}

/// One-way channel for user-visible status messages
pub trait Notifier: Send + Sync {
    fn show(&self, message: &str);
}

/// Writes notifications to the log
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn show(&self, message: &str) {
        log::info!("[Sync] Notice: {}", message);
    }
}

/// Keeps every notification, for status screens and tests
#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .map(|m| m.clone())
            .unwrap_or_default()
    }
}

impl Notifier for RecordingNotifier {
    fn show(&self, message: &str) {
        log::info!("[Sync] Notice: {}", message);
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(message.to_string());
        }
    }
}

fn poisoned(what: &str) -> SyncError {
    SyncError::Other(format!("{} lock poisoned", what))
}

/// In-memory list store
#[derive(Default)]
pub struct MemoryListStore {
    lists: Mutex<ListDataFull>,
}

impl MemoryListStore {
    pub fn new(lists: ListDataFull) -> Self {
        Self {
            lists: Mutex::new(lists),
        }
    }
}

impl ListStore for MemoryListStore {
    fn read_all_lists(&self) -> SyncResult<ListDataFull> {
        Ok(self.lists.lock().map_err(|_| poisoned("List store"))?.clone())
    }

    fn overwrite_all_lists(&self, data: ListDataFull) -> SyncResult<()> {
        *self.lists.lock().map_err(|_| poisoned("List store"))? = data;
        Ok(())
    }
}

/// In-memory settings and user source store
#[derive(Default)]
pub struct MemoryAppData {
    settings: Mutex<SettingsMap>,
    user_apis: Mutex<UserApisData>,
}

impl MemoryAppData {
    pub fn new(settings: SettingsMap, user_apis: UserApisData) -> Self {
        Self {
            settings: Mutex::new(settings),
            user_apis: Mutex::new(user_apis),
        }
    }
}

impl AppDataStore for MemoryAppData {
    fn read_settings(&self) -> SyncResult<SettingsMap> {
        Ok(self.settings.lock().map_err(|_| poisoned("Settings"))?.clone())
    }

    fn overwrite_settings(&self, settings: SettingsMap) -> SyncResult<()> {
        *self.settings.lock().map_err(|_| poisoned("Settings"))? = settings;
        Ok(())
    }

    fn read_user_apis(&self) -> SyncResult<UserApisData> {
        Ok(self.user_apis.lock().map_err(|_| poisoned("User sources"))?.clone())
    }

    fn overwrite_user_apis(&self, data: UserApisData) -> SyncResult<()> {
        *self.user_apis.lock().map_err(|_| poisoned("User sources"))? = data;
        Ok(())
    }
}
