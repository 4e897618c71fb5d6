//! Sync orchestrator
//!
//! Owns the operation log, the list watermark and the in-flight flag. A
//! cycle downloads the remote playlist snapshot, compares its timestamp to
//! the watermark and then uploads, adopts or folds pending operations onto
//! it. Only one cycle (list sync or manual settings transfer) runs at a time.

use crate::database::{self, KeyValueStore};
use crate::error::{SyncError, SyncResult};
use crate::models::{
    ListDataFull, ListOperation, QueuedOperation, RemoteSnapshot, SettingsMap, SyncSettings,
    UserApisData,
};
use crate::services::clock::{next_upload_timestamp, Clock, SystemClock};
use crate::services::conflict::{policy_choice, ConflictChoice, ConflictResolver, FixedResolver};
use crate::services::host::{AppDataStore, ListStore, LogNotifier, MemoryAppData, Notifier};
use crate::services::list_merge::{fold_operations, FoldOutcome};
use crate::services::op_queue::OperationLog;
use crate::services::remote_store::{download_snapshot, upload_snapshot, RemoteStore};
use crate::services::settings_provider::SettingsProvider;
use crate::services::sync_paths;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Session log entries kept in memory
const SYNC_LOG_CAPACITY: usize = 500;

/// What a list sync cycle did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Sync disabled or unconfigured (automatic trigger)
    NotConfigured,
    /// Automatic list sync is switched off in the settings
    AutoSyncOff,
    /// Another cycle was running (automatic trigger)
    InFlight,
    /// No remote snapshot existed; local lists were uploaded
    InitialUpload,
    /// Nothing to do
    UpToDate,
    /// Remote unchanged since last sync; local lists were uploaded
    UploadedLocal,
    /// Pending operations were folded onto newer remote lists and uploaded
    Merged,
    /// Newer remote lists were adopted; nothing was pending
    AdoptedRemote,
    /// A structural conflict was resolved (or cancelled)
    Conflict(ConflictChoice),
}

/// In-memory session log entry (lost on restart)
#[derive(Debug, Clone, PartialEq)]
pub struct SyncLogEntry {
    pub ts_ms: i64,
    pub outcome: SyncOutcome,
    /// Pending operations reconciled by the cycle
    pub operations_applied: usize,
}

/// Clears the in-flight flag when the cycle ends, however it ends
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        if flag.swap(true, Ordering::SeqCst) {
            None
        } else {
            Some(Self(flag))
        }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct SyncEngine {
    settings: Arc<dyn SettingsProvider>,
    remote: Arc<dyn RemoteStore>,
    lists: Arc<dyn ListStore>,
    kv: Arc<dyn KeyValueStore>,
    app_data: Arc<dyn AppDataStore>,
    resolver: Arc<dyn ConflictResolver>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    op_log: OperationLog,
    syncing: AtomicBool,
    running: AtomicBool,
    debounce_ticket: AtomicU64,
    session_log: Mutex<Vec<SyncLogEntry>>,
}

impl SyncEngine {
    /// Builds the engine and hydrates the operation log from `kv`.
    ///
    /// Conflicts are cancelled and confirmations declined until a resolver
    /// is attached with [`SyncEngine::with_resolver`].
    pub fn new(
        settings: Arc<dyn SettingsProvider>,
        remote: Arc<dyn RemoteStore>,
        lists: Arc<dyn ListStore>,
        kv: Arc<dyn KeyValueStore>,
    ) -> SyncResult<Self> {
        let op_log = OperationLog::new(kv.clone());
        op_log.load()?;

        Ok(Self {
            settings,
            remote,
            lists,
            kv,
            app_data: Arc::new(MemoryAppData::default()),
            resolver: Arc::new(FixedResolver::new(ConflictChoice::Cancelled, false)),
            notifier: Arc::new(LogNotifier),
            clock: Arc::new(SystemClock),
            op_log,
            syncing: AtomicBool::new(false),
            running: AtomicBool::new(false),
            debounce_ticket: AtomicU64::new(0),
            session_log: Mutex::new(Vec::new()),
        })
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn ConflictResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_app_data(mut self, app_data: Arc<dyn AppDataStore>) -> Self {
        self.app_data = app_data;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Enables automatic triggers and runs the start-up list sync
    pub async fn init(&self) -> SyncResult<SyncOutcome> {
        self.running.store(true, Ordering::SeqCst);
        log::info!(
            "[Sync] Engine started with {} pending operations",
            self.op_log.len()
        );

        if !self.settings.current().sync_lists {
            log::info!("[Sync] Automatic list sync is off, skipping start-up sync");
            return Ok(SyncOutcome::AutoSyncOff);
        }
        self.sync_lists(false).await
    }

    /// Cancels any pending debounced sync and disables automatic triggers
    pub fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.debounce_ticket.fetch_add(1, Ordering::SeqCst);
        log::info!("[Sync] Engine stopped");
    }

    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::SeqCst)
    }

    pub fn pending_operations(&self) -> usize {
        self.op_log.len()
    }

    /// Copy of the session log, oldest first
    pub fn sync_log(&self) -> Vec<SyncLogEntry> {
        self.session_log
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }

    /// Records a local list mutation and schedules a debounced sync.
    ///
    /// The operation is queued before this returns. A burst of calls within
    /// the debounce window collapses into one automatic cycle.
    pub fn record_operation(self: &Arc<Self>, op: ListOperation) -> SyncResult<QueuedOperation> {
        let entry = self.op_log.append(op)?;
        self.schedule_list_sync();
        Ok(entry)
    }

    fn schedule_list_sync(self: &Arc<Self>) {
        if !self.running.load(Ordering::SeqCst) {
            return;
        }
        let settings = self.settings.current();
        if !settings.is_configured() || !settings.sync_lists {
            return;
        }

        let ticket = self.debounce_ticket.fetch_add(1, Ordering::SeqCst) + 1;
        let delay = Duration::from_millis(settings.debounce_ms);
        let engine = Arc::clone(self);

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    if engine.debounce_ticket.load(Ordering::SeqCst) != ticket
                        || !engine.running.load(Ordering::SeqCst)
                    {
                        return;
                    }
                    // failures are logged inside
                    let _ = engine.sync_lists(false).await;
                });
            }
            Err(_) => log::warn!("[Sync] No async runtime, automatic sync not scheduled"),
        }
    }

    fn notify_if(&self, manual: bool, message: &str) {
        if manual {
            self.notifier.show(message);
        }
    }

    /// Runs one list sync cycle.
    ///
    /// Manual triggers report a busy or unconfigured engine as an error and
    /// show every outcome through the notifier; automatic triggers no-op in
    /// those cases and only log failures.
    pub async fn sync_lists(&self, manual: bool) -> SyncResult<SyncOutcome> {
        let settings = self.settings.current();
        if !settings.is_configured() {
            if manual {
                let err = SyncError::Config("WebDAV sync is disabled or not configured".into());
                self.notifier.show(&err.user_message());
                return Err(err);
            }
            return Ok(SyncOutcome::NotConfigured);
        }

        let Some(_guard) = InFlightGuard::acquire(&self.syncing) else {
            if manual {
                self.notifier.show(&SyncError::AlreadySyncing.user_message());
                return Err(SyncError::AlreadySyncing);
            }
            log::debug!("[Sync] Cycle already running, automatic trigger dropped");
            return Ok(SyncOutcome::InFlight);
        };

        self.notify_if(manual, "Syncing lists...");
        match self.run_list_cycle(&settings, manual).await {
            Ok((outcome, applied)) => {
                log::info!("[Sync] List sync finished: {:?} ({} operations)", outcome, applied);
                self.push_log(SyncLogEntry {
                    ts_ms: self.clock.now_ms(),
                    outcome,
                    operations_applied: applied,
                });
                Ok(outcome)
            }
            Err(e) => {
                log::error!("[Sync] List sync failed: {}", e);
                self.notify_if(manual, &e.user_message());
                Err(e)
            }
        }
    }

    async fn run_list_cycle(
        &self,
        settings: &SyncSettings,
        manual: bool,
    ) -> SyncResult<(SyncOutcome, usize)> {
        let path = sync_paths::playlists_path(&settings.remote_path);
        let pending = self.op_log.snapshot()?;

        let Some(remote) = download_snapshot::<ListDataFull>(&*self.remote, &path).await? else {
            log::info!("[Sync] Remote lists not found, uploading local state");
            let local = self.lists.read_all_lists()?;
            self.upload_lists(&path, local, None).await?;
            self.op_log.clear_through(&pending)?;
            self.notify_if(manual, "Lists uploaded");
            return Ok((SyncOutcome::InitialUpload, pending.len()));
        };

        let watermark = database::load_last_sync_time_lists(&*self.kv)?;
        if remote.last_modified <= watermark {
            if pending.is_empty() {
                log::info!("[Sync] Lists are up to date");
                self.notify_if(manual, "Lists are already up to date");
                return Ok((SyncOutcome::UpToDate, 0));
            }
            log::info!(
                "[Sync] Local has {} unsynced operations, uploading",
                pending.len()
            );
            let local = self.lists.read_all_lists()?;
            self.upload_lists(&path, local, Some(remote.last_modified))
                .await?;
            self.op_log.clear_through(&pending)?;
            self.notify_if(manual, "Local lists uploaded");
            return Ok((SyncOutcome::UploadedLocal, pending.len()));
        }

        log::info!(
            "[Sync] Remote is newer ({} > {}), folding {} local operations",
            remote.last_modified,
            watermark,
            pending.len()
        );
        let ops: Vec<ListOperation> = pending.iter().map(|e| e.op.clone()).collect();
        match fold_operations(&remote.data, &ops) {
            FoldOutcome::Merged(merged) if pending.is_empty() => {
                // a rejected adoption keeps the old watermark so the next
                // cycle folds the late operations and meets their conflict
                if self.adopt(merged, &pending)? {
                    database::save_last_sync_time_lists(&*self.kv, remote.last_modified)?;
                }
                self.notify_if(manual, "Lists updated from the server");
                Ok((SyncOutcome::AdoptedRemote, 0))
            }
            FoldOutcome::Merged(merged) => {
                self.upload_lists(&path, merged.clone(), Some(remote.last_modified))
                    .await?;
                if !self.adopt(merged, &pending)? {
                    database::save_last_sync_time_lists(&*self.kv, remote.last_modified)?;
                }
                self.op_log.clear_through(&pending)?;
                self.notify_if(manual, "Lists merged and synced");
                Ok((SyncOutcome::Merged, pending.len()))
            }
            FoldOutcome::Conflict(conflict) => {
                log::warn!("[Sync] Structural conflict: {}", conflict);
                let choice = match policy_choice(settings.conflict_policy) {
                    Some(choice) => choice,
                    None => {
                        self.notifier
                            .show("Local and remote list changes cannot be merged, choose a side");
                        self.resolver.resolve(&conflict).await
                    }
                };
                self.apply_conflict_choice(choice, &path, remote, &pending)
                    .await?;
                Ok((SyncOutcome::Conflict(choice), pending.len()))
            }
        }
    }

    async fn apply_conflict_choice(
        &self,
        choice: ConflictChoice,
        path: &str,
        remote: RemoteSnapshot<ListDataFull>,
        pending: &[QueuedOperation],
    ) -> SyncResult<()> {
        match choice {
            ConflictChoice::Local => {
                log::info!("[Sync] Conflict resolved: pushing local lists");
                let local = self.lists.read_all_lists()?;
                self.upload_lists(path, local, Some(remote.last_modified))
                    .await?;
                self.op_log.clear_through(pending)?;
                self.notifier.show("Local lists now replace the server copy");
            }
            ConflictChoice::Remote => {
                log::info!("[Sync] Conflict resolved: adopting remote lists");
                self.lists.overwrite_all_lists(remote.data)?;
                self.op_log.clear()?;
                database::save_last_sync_time_lists(&*self.kv, remote.last_modified)?;
                self.notifier
                    .show("Lists replaced from the server, local changes discarded");
            }
            ConflictChoice::Cancelled => {
                log::info!("[Sync] Conflict resolution cancelled");
                self.notifier.show("Sync cancelled");
            }
        }
        Ok(())
    }

    /// Writes a new list snapshot and advances the watermark to its timestamp
    async fn upload_lists(
        &self,
        path: &str,
        data: ListDataFull,
        observed_remote: Option<i64>,
    ) -> SyncResult<i64> {
        let timestamp = next_upload_timestamp(self.clock.now_ms(), observed_remote);
        upload_snapshot(&*self.remote, path, &RemoteSnapshot::new(data, timestamp)).await?;
        database::save_last_sync_time_lists(&*self.kv, timestamp)?;
        log::info!("[Sync] Uploaded lists at {}", timestamp);
        Ok(timestamp)
    }

    /// Replaces the live lists with `doc`, replaying operations queued after
    /// `folded` so edits made during the cycle stay visible.
    ///
    /// Returns false, leaving the live lists alone, when one of those
    /// operations conflicts with `doc`.
    fn adopt(&self, doc: ListDataFull, folded: &[QueuedOperation]) -> SyncResult<bool> {
        let current = self.op_log.snapshot()?;
        let late: Vec<ListOperation> = current
            .iter()
            .skip(folded.len())
            .map(|e| e.op.clone())
            .collect();

        let doc = if late.is_empty() {
            doc
        } else {
            match fold_operations(&doc, &late) {
                FoldOutcome::Merged(with_late) => with_late,
                FoldOutcome::Conflict(conflict) => {
                    log::warn!(
                        "[Sync] Operation queued during sync conflicts, deferring to next cycle: {}",
                        conflict
                    );
                    return Ok(false);
                }
            }
        };
        self.lists.overwrite_all_lists(doc)?;
        Ok(true)
    }

    fn push_log(&self, entry: SyncLogEntry) {
        if let Ok(mut guard) = self.session_log.lock() {
            guard.push(entry);
            let len = guard.len();
            if len > SYNC_LOG_CAPACITY {
                guard.drain(0..len - SYNC_LOG_CAPACITY);
            }
        }
    }

    /// Checks configuration, asks for confirmation and takes the in-flight
    /// flag for a manual settings transfer. `None` = user declined.
    async fn begin_manual_transfer(
        &self,
        title: &str,
        message: &str,
    ) -> SyncResult<Option<(InFlightGuard<'_>, SyncSettings)>> {
        if self.is_syncing() {
            self.notifier.show(&SyncError::AlreadySyncing.user_message());
            return Err(SyncError::AlreadySyncing);
        }
        let settings = self.settings.current();
        if !settings.is_configured() {
            let err = SyncError::Config("WebDAV sync is disabled or not configured".into());
            self.notifier.show(&err.user_message());
            return Err(err);
        }

        if !self.resolver.confirm(title, message).await {
            log::info!("[Sync] {} declined", title);
            return Ok(None);
        }

        let Some(guard) = InFlightGuard::acquire(&self.syncing) else {
            self.notifier.show(&SyncError::AlreadySyncing.user_message());
            return Err(SyncError::AlreadySyncing);
        };
        Ok(Some((guard, settings)))
    }

    /// Overwrites the remote settings and user sources with the local ones.
    /// Returns false when the user declined.
    pub async fn manual_upload_settings_and_apis(&self) -> SyncResult<bool> {
        let Some((_guard, settings)) = self
            .begin_manual_transfer(
                "Upload settings",
                "This replaces the settings and custom sources stored on the server. Continue?",
            )
            .await?
        else {
            return Ok(false);
        };

        self.notifier.show("Uploading...");
        match self.upload_app_data(&settings).await {
            Ok(()) => {
                self.notifier.show("Upload complete");
                Ok(true)
            }
            Err(e) => {
                log::error!("[Sync] Manual upload failed: {}", e);
                self.notifier.show(&e.user_message());
                Err(e)
            }
        }
    }

    async fn upload_app_data(&self, settings: &SyncSettings) -> SyncResult<()> {
        let now = self.clock.now_ms();

        let app_settings = self.app_data.read_settings()?;
        upload_snapshot(
            &*self.remote,
            &sync_paths::settings_path(&settings.remote_path),
            &RemoteSnapshot::new(app_settings, now),
        )
        .await?;

        let user_apis = self.app_data.read_user_apis()?;
        upload_snapshot(
            &*self.remote,
            &sync_paths::user_apis_path(&settings.remote_path),
            &RemoteSnapshot::new(user_apis, now),
        )
        .await?;
        Ok(())
    }

    /// Overwrites the local settings and user sources with the remote ones.
    /// A missing remote file is skipped with a notice. Returns false when
    /// the user declined.
    pub async fn manual_download_settings_and_apis(&self) -> SyncResult<bool> {
        let Some((_guard, settings)) = self
            .begin_manual_transfer(
                "Download settings",
                "This replaces the local settings and custom sources with the server copy. Continue?",
            )
            .await?
        else {
            return Ok(false);
        };

        self.notifier.show("Downloading...");
        match self.download_app_data(&settings).await {
            Ok(()) => {
                self.notifier.show("Download complete");
                Ok(true)
            }
            Err(e) => {
                log::error!("[Sync] Manual download failed: {}", e);
                self.notifier.show(&e.user_message());
                Err(e)
            }
        }
    }

    async fn download_app_data(&self, settings: &SyncSettings) -> SyncResult<()> {
        let settings_path = sync_paths::settings_path(&settings.remote_path);
        match download_snapshot::<SettingsMap>(&*self.remote, &settings_path).await? {
            Some(snapshot) => self.app_data.overwrite_settings(snapshot.data)?,
            None => self
                .notifier
                .show("No settings file on the server, settings skipped"),
        }

        let apis_path = sync_paths::user_apis_path(&settings.remote_path);
        match download_snapshot::<UserApisData>(&*self.remote, &apis_path).await? {
            Some(snapshot) => self.app_data.overwrite_user_apis(snapshot.data)?,
            None => self
                .notifier
                .show("No custom source file on the server, sources skipped"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::SqliteStore;
    use crate::models::{
        AddLocation, ConflictPolicy, ListInfoPatch, MusicInfo, UserApiInfo, UserListInfo,
        UserListInfoFull,
    };
    use crate::services::clock::FixedClock;
    use crate::services::host::{MemoryListStore, RecordingNotifier};
    use crate::services::remote_store::MemoryRemote;
    use crate::services::settings_provider::StaticSettings;
    use serde_json::json;

    const PATH: &str = "/LX_Music/playlists.json";

    struct Harness {
        engine: Arc<SyncEngine>,
        remote: Arc<MemoryRemote>,
        lists: Arc<MemoryListStore>,
        kv: Arc<SqliteStore>,
        notifier: Arc<RecordingNotifier>,
        clock: Arc<FixedClock>,
        settings: Arc<StaticSettings>,
        app_data: Arc<MemoryAppData>,
        resolver: Arc<FixedResolver>,
    }

    fn configured() -> SyncSettings {
        SyncSettings::new(
            "https://dav.example.com".to_string(),
            "alice".to_string(),
            "secret".to_string(),
        )
    }

    fn harness(local: ListDataFull, choice: ConflictChoice) -> Harness {
        let _ = env_logger::builder().is_test(true).try_init();
        let remote = Arc::new(MemoryRemote::new());
        let lists = Arc::new(MemoryListStore::new(local));
        let kv = Arc::new(SqliteStore::open_in_memory().unwrap());
        let notifier = Arc::new(RecordingNotifier::new());
        let clock = Arc::new(FixedClock::new(1_000));
        let settings = Arc::new(StaticSettings::new(configured()));
        let app_data = Arc::new(MemoryAppData::default());
        let resolver = Arc::new(FixedResolver::new(choice, true));

        let engine = SyncEngine::new(settings.clone(), remote.clone(), lists.clone(), kv.clone())
            .unwrap()
            .with_resolver(resolver.clone())
            .with_notifier(notifier.clone())
            .with_app_data(app_data.clone())
            .with_clock(clock.clone());

        Harness {
            engine: Arc::new(engine),
            remote,
            lists,
            kv,
            notifier,
            clock,
            settings,
            app_data,
            resolver,
        }
    }

    fn track(id: &str) -> MusicInfo {
        MusicInfo::new(id, id.to_uppercase())
    }

    fn doc_with(lists: &[(&str, &str, &[&str])]) -> ListDataFull {
        let mut doc = ListDataFull::default();
        for (id, name, ids) in lists {
            doc.user_list.push(UserListInfoFull::new(
                UserListInfo::with_id(*id, *name),
                ids.iter().map(|t| track(t)).collect(),
            ));
        }
        doc
    }

    fn put_remote(h: &Harness, doc: &ListDataFull, last_modified: i64) {
        let content = RemoteSnapshot::new(doc.clone(), last_modified)
            .to_json()
            .unwrap();
        h.remote.put(PATH, content);
    }

    fn remote_snapshot(h: &Harness) -> RemoteSnapshot<ListDataFull> {
        RemoteSnapshot::from_json(&h.remote.get(PATH).unwrap()).unwrap()
    }

    fn watermark(h: &Harness) -> i64 {
        database::load_last_sync_time_lists(&*h.kv).unwrap()
    }

    fn add_c() -> ListOperation {
        ListOperation::add_tracks("L1", vec![track("c")], AddLocation::Bottom)
    }

    #[tokio::test]
    async fn test_first_sync_uploads_local_lists() {
        let local = doc_with(&[("L1", "One", &["a", "b"])]);
        let h = harness(local.clone(), ConflictChoice::Cancelled);
        h.engine.record_operation(add_c()).unwrap();

        let outcome = h.engine.sync_lists(true).await.unwrap();

        assert_eq!(outcome, SyncOutcome::InitialUpload);
        let uploaded = remote_snapshot(&h);
        assert_eq!(uploaded.last_modified, 1_000);
        assert_eq!(uploaded.data, local);
        assert_eq!(watermark(&h), 1_000);
        assert_eq!(h.engine.pending_operations(), 0);
    }

    #[tokio::test]
    async fn test_newer_remote_is_adopted_without_upload() {
        let h = harness(doc_with(&[("L1", "One", &["a"])]), ConflictChoice::Cancelled);
        database::save_last_sync_time_lists(&*h.kv, 500).unwrap();
        let remote_doc = doc_with(&[("L1", "One", &["a", "b"]), ("L2", "Two", &[])]);
        put_remote(&h, &remote_doc, 900);

        let outcome = h.engine.sync_lists(false).await.unwrap();

        assert_eq!(outcome, SyncOutcome::AdoptedRemote);
        assert_eq!(h.lists.read_all_lists().unwrap(), remote_doc);
        assert_eq!(watermark(&h), 900);
        assert_eq!(h.remote.upload_count(), 0);
    }

    #[tokio::test]
    async fn test_pending_add_is_folded_onto_newer_remote() {
        let h = harness(doc_with(&[("L1", "One", &["a", "c"])]), ConflictChoice::Cancelled);
        database::save_last_sync_time_lists(&*h.kv, 500).unwrap();
        put_remote(&h, &doc_with(&[("L1", "One", &["a", "b"])]), 900);
        h.engine.record_operation(add_c()).unwrap();
        h.clock.set(2_000);

        let outcome = h.engine.sync_lists(false).await.unwrap();

        assert_eq!(outcome, SyncOutcome::Merged);
        let uploaded = remote_snapshot(&h);
        assert_eq!(uploaded.data.track_ids("L1"), vec!["a", "b", "c"]);
        assert_eq!(uploaded.last_modified, 2_000);
        assert_eq!(watermark(&h), 2_000);
        assert_eq!(h.lists.read_all_lists().unwrap(), uploaded.data);
        assert_eq!(h.engine.pending_operations(), 0);
    }

    #[tokio::test]
    async fn test_add_to_remotely_deleted_list_is_not_a_conflict() {
        let h = harness(doc_with(&[("L1", "One", &["a"])]), ConflictChoice::Local);
        database::save_last_sync_time_lists(&*h.kv, 500).unwrap();
        put_remote(&h, &doc_with(&[("L2", "Two", &["z"])]), 900);
        h.engine.record_operation(add_c()).unwrap();

        let outcome = h.engine.sync_lists(false).await.unwrap();

        assert_eq!(outcome, SyncOutcome::Merged);
        let uploaded = remote_snapshot(&h);
        assert!(uploaded.data.user_list("L1").is_none());
        assert_eq!(uploaded.data.track_ids("L2"), vec!["z"]);
    }

    #[tokio::test]
    async fn test_local_rename_wins_over_remote_rename() {
        let h = harness(doc_with(&[("L1", "X", &["a"])]), ConflictChoice::Cancelled);
        database::save_last_sync_time_lists(&*h.kv, 500).unwrap();
        put_remote(&h, &doc_with(&[("L1", "Y", &["a"])]), 900);
        h.engine
            .record_operation(ListOperation::ListUpdate(vec![ListInfoPatch::rename(
                "L1", "X",
            )]))
            .unwrap();

        let outcome = h.engine.sync_lists(false).await.unwrap();

        assert_eq!(outcome, SyncOutcome::Merged);
        assert_eq!(remote_snapshot(&h).data.user_list("L1").unwrap().info.name, "X");
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_sync_while_in_flight_reports_busy() {
        let h = harness(doc_with(&[("L1", "One", &["a"])]), ConflictChoice::Cancelled);
        h.remote.set_latency(Duration::from_millis(200));

        let engine = h.engine.clone();
        let first = tokio::spawn(async move { engine.sync_lists(true).await });
        tokio::task::yield_now().await;
        assert!(h.engine.is_syncing());

        let second = h.engine.sync_lists(true).await;
        assert!(matches!(second, Err(SyncError::AlreadySyncing)));
        assert_eq!(
            h.engine.sync_lists(false).await.unwrap(),
            SyncOutcome::InFlight
        );

        let first = first.await.unwrap().unwrap();
        assert_eq!(first, SyncOutcome::InitialUpload);
        assert!(!h.engine.is_syncing());
        assert!(h
            .notifier
            .messages()
            .contains(&SyncError::AlreadySyncing.user_message()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_edit_during_cycle_is_replayed_and_uploaded_next() {
        let h = harness(doc_with(&[("L1", "One", &["a"])]), ConflictChoice::Cancelled);
        database::save_last_sync_time_lists(&*h.kv, 500).unwrap();
        put_remote(&h, &doc_with(&[("L1", "One", &["a"])]), 900);
        h.engine.record_operation(add_c()).unwrap();
        h.remote.set_latency(Duration::from_millis(200));

        let engine = h.engine.clone();
        let cycle = tokio::spawn(async move { engine.sync_lists(false).await });
        tokio::task::yield_now().await;
        h.engine
            .record_operation(ListOperation::add_tracks(
                "L1",
                vec![track("d")],
                AddLocation::Bottom,
            ))
            .unwrap();

        assert_eq!(cycle.await.unwrap().unwrap(), SyncOutcome::Merged);
        assert_eq!(remote_snapshot(&h).data.track_ids("L1"), vec!["a", "c"]);
        assert_eq!(
            h.lists.read_all_lists().unwrap().track_ids("L1"),
            vec!["a", "c", "d"]
        );
        assert_eq!(h.engine.pending_operations(), 1);

        let next = h.engine.sync_lists(false).await.unwrap();
        assert_eq!(next, SyncOutcome::UploadedLocal);
        assert_eq!(remote_snapshot(&h).data.track_ids("L1"), vec!["a", "c", "d"]);
        assert_eq!(h.engine.pending_operations(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_conflicting_edit_during_cycle_reaches_resolver() {
        let local = doc_with(&[("L1", "One", &["a"]), ("L9", "Nine", &["n"])]);
        let h = harness(local.clone(), ConflictChoice::Cancelled);
        database::save_last_sync_time_lists(&*h.kv, 500).unwrap();
        put_remote(&h, &doc_with(&[("L1", "One", &["a"])]), 900);
        h.engine.record_operation(add_c()).unwrap();
        h.remote.set_latency(Duration::from_millis(200));

        let engine = h.engine.clone();
        let cycle = tokio::spawn(async move { engine.sync_lists(false).await });
        tokio::task::yield_now().await;
        h.engine
            .record_operation(ListOperation::ListUpdate(vec![ListInfoPatch::rename(
                "L9", "Renamed",
            )]))
            .unwrap();

        assert_eq!(cycle.await.unwrap().unwrap(), SyncOutcome::Merged);
        // the merged lists lack L9, so they are not adopted yet
        assert_eq!(h.lists.read_all_lists().unwrap(), local);
        assert_eq!(watermark(&h), 900);
        assert_eq!(h.engine.pending_operations(), 1);

        let next = h.engine.sync_lists(false).await.unwrap();
        assert_eq!(next, SyncOutcome::Conflict(ConflictChoice::Cancelled));
        assert_eq!(h.resolver.asked(), 1);
        assert_eq!(h.engine.pending_operations(), 1);
        assert!(h.lists.read_all_lists().unwrap().user_list("L9").is_some());
    }

    #[tokio::test]
    async fn test_remote_timestamp_at_max_does_not_overflow() {
        let h = harness(doc_with(&[("L1", "One", &["a"])]), ConflictChoice::Cancelled);
        database::save_last_sync_time_lists(&*h.kv, 500).unwrap();
        put_remote(&h, &doc_with(&[("L1", "One", &["a"])]), i64::MAX);
        h.engine.record_operation(add_c()).unwrap();

        assert_eq!(h.engine.sync_lists(false).await.unwrap(), SyncOutcome::Merged);
        assert_eq!(remote_snapshot(&h).last_modified, i64::MAX);
        assert_eq!(watermark(&h), i64::MAX);
    }

    #[tokio::test]
    async fn test_init_with_auto_sync_off() {
        let h = harness(ListDataFull::default(), ConflictChoice::Cancelled);
        let mut settings = configured();
        settings.sync_lists = false;
        h.settings.update(settings);

        assert_eq!(h.engine.init().await.unwrap(), SyncOutcome::AutoSyncOff);
        assert_eq!(h.remote.download_count(), 0);
    }

    #[tokio::test]
    async fn test_unsynced_local_changes_upload_without_fold() {
        let local = doc_with(&[("L1", "One", &["a", "b"])]);
        let h = harness(local.clone(), ConflictChoice::Cancelled);
        database::save_last_sync_time_lists(&*h.kv, 900).unwrap();
        put_remote(&h, &doc_with(&[("L1", "One", &["a"])]), 900);
        h.engine
            .record_operation(ListOperation::add_tracks(
                "L1",
                vec![track("b")],
                AddLocation::Bottom,
            ))
            .unwrap();

        let outcome = h.engine.sync_lists(false).await.unwrap();

        assert_eq!(outcome, SyncOutcome::UploadedLocal);
        assert_eq!(remote_snapshot(&h).data, local);
        assert_eq!(h.engine.pending_operations(), 0);
    }

    #[tokio::test]
    async fn test_up_to_date_does_nothing() {
        let h = harness(ListDataFull::default(), ConflictChoice::Cancelled);
        database::save_last_sync_time_lists(&*h.kv, 900).unwrap();
        put_remote(&h, &ListDataFull::default(), 900);

        assert_eq!(h.engine.sync_lists(true).await.unwrap(), SyncOutcome::UpToDate);
        assert_eq!(h.remote.upload_count(), 0);
    }

    #[tokio::test]
    async fn test_upload_timestamp_outruns_skewed_remote() {
        let h = harness(doc_with(&[("L1", "One", &["a"])]), ConflictChoice::Cancelled);
        database::save_last_sync_time_lists(&*h.kv, 500).unwrap();
        put_remote(&h, &doc_with(&[("L1", "One", &[])]), 5_000);
        h.engine.record_operation(add_c()).unwrap();

        h.engine.sync_lists(false).await.unwrap();

        assert_eq!(remote_snapshot(&h).last_modified, 5_001);
        assert_eq!(watermark(&h), 5_001);
    }

    fn conflict_harness(choice: ConflictChoice) -> (Harness, ListDataFull, ListDataFull) {
        let local = doc_with(&[("L1", "X", &["a"])]);
        let remote_doc = doc_with(&[("L2", "Two", &["z"])]);
        let h = harness(local.clone(), choice);
        database::save_last_sync_time_lists(&*h.kv, 500).unwrap();
        put_remote(&h, &remote_doc, 900);
        h.engine
            .record_operation(ListOperation::ListUpdate(vec![ListInfoPatch::rename(
                "L1", "X",
            )]))
            .unwrap();
        (h, local, remote_doc)
    }

    #[tokio::test]
    async fn test_conflict_resolved_with_local() {
        let (h, local, _) = conflict_harness(ConflictChoice::Local);

        let outcome = h.engine.sync_lists(false).await.unwrap();

        assert_eq!(outcome, SyncOutcome::Conflict(ConflictChoice::Local));
        assert_eq!(remote_snapshot(&h).data, local);
        assert_eq!(h.engine.pending_operations(), 0);
        assert_eq!(watermark(&h), 1_000);
    }

    #[tokio::test]
    async fn test_conflict_resolved_with_remote() {
        let (h, _, remote_doc) = conflict_harness(ConflictChoice::Remote);

        let outcome = h.engine.sync_lists(false).await.unwrap();

        assert_eq!(outcome, SyncOutcome::Conflict(ConflictChoice::Remote));
        assert_eq!(h.lists.read_all_lists().unwrap(), remote_doc);
        assert_eq!(h.engine.pending_operations(), 0);
        assert_eq!(watermark(&h), 900);
        assert_eq!(h.remote.upload_count(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_conflict_changes_nothing() {
        let (h, local, remote_doc) = conflict_harness(ConflictChoice::Cancelled);

        let outcome = h.engine.sync_lists(false).await.unwrap();

        assert_eq!(outcome, SyncOutcome::Conflict(ConflictChoice::Cancelled));
        assert_eq!(h.lists.read_all_lists().unwrap(), local);
        assert_eq!(remote_snapshot(&h).data, remote_doc);
        assert_eq!(h.engine.pending_operations(), 1);
        assert_eq!(watermark(&h), 500);
    }

    #[tokio::test]
    async fn test_conflict_policy_skips_resolver() {
        let (h, _, remote_doc) = conflict_harness(ConflictChoice::Local);
        let mut settings = configured();
        settings.conflict_policy = ConflictPolicy::PreferRemote;
        h.settings.update(settings);

        let outcome = h.engine.sync_lists(false).await.unwrap();

        assert_eq!(outcome, SyncOutcome::Conflict(ConflictChoice::Remote));
        assert_eq!(h.lists.read_all_lists().unwrap(), remote_doc);
    }

    #[tokio::test]
    async fn test_transport_failure_leaves_state_untouched() {
        let h = harness(doc_with(&[("L1", "One", &["a"])]), ConflictChoice::Cancelled);
        database::save_last_sync_time_lists(&*h.kv, 500).unwrap();
        h.engine.record_operation(add_c()).unwrap();
        h.remote.set_failing(true);

        let err = h.engine.sync_lists(true).await.unwrap_err();

        assert!(err.is_transport_class());
        assert_eq!(h.engine.pending_operations(), 1);
        assert_eq!(watermark(&h), 500);
        assert!(!h.engine.is_syncing());
        assert!(h.engine.sync_log().is_empty());
        assert!(h.notifier.messages().contains(&err.user_message()));
    }

    #[tokio::test]
    async fn test_automatic_failure_is_not_shown() {
        let h = harness(ListDataFull::default(), ConflictChoice::Cancelled);
        h.remote.set_failing(true);

        assert!(h.engine.sync_lists(false).await.is_err());
        assert!(h.notifier.messages().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_remote_aborts_cycle() {
        let h = harness(ListDataFull::default(), ConflictChoice::Cancelled);
        h.remote.put(PATH, "{\"version\":\"2\",\"lastModified\":");
        h.engine.record_operation(add_c()).unwrap();

        let err = h.engine.sync_lists(false).await.unwrap_err();
        assert!(matches!(err, SyncError::Serialization(_)));
        assert_eq!(h.engine.pending_operations(), 1);
    }

    #[tokio::test]
    async fn test_unconfigured_sync() {
        let h = harness(ListDataFull::default(), ConflictChoice::Cancelled);
        h.settings.update(SyncSettings::default());

        assert_eq!(
            h.engine.sync_lists(false).await.unwrap(),
            SyncOutcome::NotConfigured
        );
        assert!(matches!(
            h.engine.sync_lists(true).await,
            Err(SyncError::Config(_))
        ));
        assert_eq!(h.remote.download_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_of_edits_collapses_into_one_cycle() {
        let h = harness(doc_with(&[("L1", "One", &[])]), ConflictChoice::Cancelled);
        h.engine.init().await.unwrap();
        let downloads_after_init = h.remote.download_count();

        for id in ["a", "b", "c"] {
            h.engine
                .record_operation(ListOperation::add_tracks(
                    "L1",
                    vec![track(id)],
                    AddLocation::Bottom,
                ))
                .unwrap();
            tokio::time::sleep(Duration::from_millis(1_000)).await;
        }
        assert_eq!(h.remote.download_count(), downloads_after_init);

        tokio::time::sleep(Duration::from_millis(3_500)).await;
        assert_eq!(h.remote.download_count(), downloads_after_init + 1);
        assert_eq!(h.engine.pending_operations(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_pending_sync() {
        let h = harness(ListDataFull::default(), ConflictChoice::Cancelled);
        h.engine.init().await.unwrap();
        let downloads = h.remote.download_count();

        h.engine
            .record_operation(ListOperation::ListMusicClear(vec!["temp".to_string()]))
            .unwrap();
        h.engine.shutdown();
        tokio::time::sleep(Duration::from_millis(10_000)).await;

        assert_eq!(h.remote.download_count(), downloads);
        assert_eq!(h.engine.pending_operations(), 1);
    }

    #[tokio::test]
    async fn test_log_survives_restart() {
        let h = harness(ListDataFull::default(), ConflictChoice::Cancelled);
        h.engine.record_operation(add_c()).unwrap();

        let restarted = SyncEngine::new(
            h.settings.clone(),
            h.remote.clone(),
            h.lists.clone(),
            h.kv.clone(),
        )
        .unwrap();
        assert_eq!(restarted.pending_operations(), 1);
    }

    #[tokio::test]
    async fn test_session_log_records_cycles() {
        let h = harness(ListDataFull::default(), ConflictChoice::Cancelled);
        h.engine.sync_lists(false).await.unwrap();
        h.engine.sync_lists(false).await.unwrap();

        let log = h.engine.sync_log();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].outcome, SyncOutcome::InitialUpload);
        assert_eq!(log[1].outcome, SyncOutcome::UpToDate);
    }

    #[tokio::test]
    async fn test_settings_upload_then_download() {
        let h = harness(ListDataFull::default(), ConflictChoice::Cancelled);
        let mut app_settings = SettingsMap::new();
        app_settings.insert("theme.id".to_string(), json!("blue"));
        let apis = UserApisData {
            list: vec![UserApiInfo {
                id: "api1".to_string(),
                name: "Custom".to_string(),
                extra: Default::default(),
            }],
            scripts: [("api1".to_string(), "console.log(1)".to_string())]
                .into_iter()
                .collect(),
        };
        h.app_data.overwrite_settings(app_settings.clone()).unwrap();
        h.app_data.overwrite_user_apis(apis.clone()).unwrap();

        assert!(h.engine.manual_upload_settings_and_apis().await.unwrap());
        assert!(h.remote.get("/LX_Music/settings.json").is_some());

        h.app_data.overwrite_settings(SettingsMap::new()).unwrap();
        h.app_data
            .overwrite_user_apis(UserApisData::default())
            .unwrap();

        assert!(h.engine.manual_download_settings_and_apis().await.unwrap());
        assert_eq!(h.app_data.read_settings().unwrap(), app_settings);
        assert_eq!(h.app_data.read_user_apis().unwrap(), apis);
    }

    #[tokio::test]
    async fn test_settings_download_skips_missing_files() {
        let h = harness(ListDataFull::default(), ConflictChoice::Cancelled);
        let mut app_settings = SettingsMap::new();
        app_settings.insert("player.volume".to_string(), json!(0.5));
        h.app_data.overwrite_settings(app_settings.clone()).unwrap();

        assert!(h.engine.manual_download_settings_and_apis().await.unwrap());
        assert_eq!(h.app_data.read_settings().unwrap(), app_settings);
        assert!(h
            .notifier
            .messages()
            .iter()
            .any(|m| m.contains("No settings file")));
    }

    #[tokio::test]
    async fn test_declined_upload_does_nothing() {
        let h = harness(ListDataFull::default(), ConflictChoice::Cancelled);
        let engine = SyncEngine::new(
            h.settings.clone(),
            h.remote.clone(),
            h.lists.clone(),
            h.kv.clone(),
        )
        .unwrap();

        assert!(!engine.manual_upload_settings_and_apis().await.unwrap());
        assert_eq!(h.remote.upload_count(), 0);
    }
}
