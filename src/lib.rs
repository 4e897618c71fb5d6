//! # Playlist Sync
//!
//! Offline-first synchronization of a music player's playlists through a
//! plain WebDAV file host.
//!
//! This crate provides:
//! - A durable log of local list mutations (SQLite key-value store)
//! - A deterministic merge engine that replays the log onto a remote snapshot
//! - Conflict routing to a pluggable resolver (user dialog or fixed policy)
//! - A single-flight, debounced sync orchestrator
//! - Manual transfer of app settings and user-defined sources
//!
//! The remote holds one JSON snapshot per document kind; the newest
//! `lastModified` wins and is the only clock.
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use playlist_sync::{
//!     MemoryListStore, SqliteStore, StaticSettings, SyncEngine, SyncSettings, WebDavRemote,
//! };
//! use std::sync::Arc;
//!
//! let settings = Arc::new(StaticSettings::new(SyncSettings::load_file("sync.toml".as_ref())?));
//! let engine = Arc::new(SyncEngine::new(
//!     settings.clone(),
//!     Arc::new(WebDavRemote::new(settings)),
//!     Arc::new(MemoryListStore::default()),
//!     Arc::new(SqliteStore::open("state.db".as_ref())?),
//! )?);
//!
//! engine.init().await?;
//! engine.record_operation(op)?; // synced after the debounce window
//! ```

pub mod database;
pub mod error;
pub mod models;
pub mod services;

pub use database::{KeyValueStore, SqliteStore};
pub use error::{SyncError, SyncResult};
pub use models::*;
pub use services::*;
