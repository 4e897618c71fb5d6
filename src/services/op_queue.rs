//! Durable queue of local list mutations awaiting synchronization
//!
//! Physical append order is replay order. The in-memory copy is
//! authoritative; every change is written through to the key-value store.

use crate::database::{KeyValueStore, KEY_OP_QUEUE};
use crate::error::{SyncError, SyncResult};
use crate::models::{ListOperation, QueuedOperation};
use std::sync::{Arc, Mutex};

pub struct OperationLog {
    store: Arc<dyn KeyValueStore>,
    queue: Mutex<Vec<QueuedOperation>>,
}

impl OperationLog {
    /// Creates an empty log; call [`OperationLog::load`] to hydrate it
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            queue: Mutex::new(Vec::new()),
        }
    }

    fn lock(&self) -> SyncResult<std::sync::MutexGuard<'_, Vec<QueuedOperation>>> {
        self.queue
            .lock()
            .map_err(|_| SyncError::Other("Operation log lock poisoned".to_string()))
    }

    /// Hydrates the in-memory queue from durable storage; absent key = empty
    pub fn load(&self) -> SyncResult<usize> {
        let stored = match self.store.get(KEY_OP_QUEUE)? {
            Some(raw) => serde_json::from_str::<Vec<QueuedOperation>>(&raw)?,
            None => Vec::new(),
        };
        let count = stored.len();
        *self.lock()? = stored;
        log::info!("[Sync OpQueue] Loaded operations: {}", count);
        Ok(count)
    }

    /// Queues an operation. The in-memory queue is updated before this
    /// returns even if the durable write fails; the write error is logged
    /// and the next append or clear rewrites the whole queue.
    pub fn append(&self, op: ListOperation) -> SyncResult<QueuedOperation> {
        let entry = QueuedOperation::new(op);
        let serialized = {
            let mut queue = self.lock()?;
            queue.push(entry.clone());
            serde_json::to_string(&*queue)?
        };

        log::debug!(
            "[Sync OpQueue] Queued {} ({})",
            entry.op.kind(),
            entry.op_id
        );

        if let Err(e) = self.store.save(KEY_OP_QUEUE, &serialized) {
            log::error!("[Sync OpQueue] Failed to persist queue: {}", e);
        }
        Ok(entry)
    }

    /// Copy of the pending entries
    pub fn snapshot(&self) -> SyncResult<Vec<QueuedOperation>> {
        Ok(self.lock()?.clone())
    }

    /// Copy of the pending operations without their queue metadata
    pub fn operations(&self) -> SyncResult<Vec<ListOperation>> {
        Ok(self.lock()?.iter().map(|e| e.op.clone()).collect())
    }

    pub fn len(&self) -> usize {
        self.lock().map(|q| q.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Empties the in-memory and the durable queue
    pub fn clear(&self) -> SyncResult<()> {
        self.lock()?.clear();
        self.store.save(KEY_OP_QUEUE, "[]")?;
        log::info!("[Sync OpQueue] Cleared");
        Ok(())
    }

    /// Drops exactly the entries that were folded into a sync cycle,
    /// keeping operations appended while the cycle was running.
    pub fn clear_through(&self, folded: &[QueuedOperation]) -> SyncResult<()> {
        let serialized = {
            let mut queue = self.lock()?;
            let keep_from = queue
                .iter()
                .zip(folded.iter())
                .take_while(|(a, b)| a.op_id == b.op_id)
                .count();
            queue.drain(..keep_from);
            serde_json::to_string(&*queue)?
        };
        self.store.save(KEY_OP_QUEUE, &serialized)?;
        log::info!(
            "[Sync OpQueue] Cleared {} synced operations, {} remain",
            folded.len(),
            self.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::SqliteStore;
    use crate::models::{AddLocation, MusicInfo};

    fn store() -> Arc<dyn KeyValueStore> {
        Arc::new(SqliteStore::open_in_memory().unwrap())
    }

    fn add(list: &str, track: &str) -> ListOperation {
        ListOperation::add_tracks(list, vec![MusicInfo::new(track, track)], AddLocation::Bottom)
    }

    #[test]
    fn test_append_preserves_order_and_persists() {
        let kv = store();
        let log = OperationLog::new(kv.clone());
        log.append(add("L1", "a")).unwrap();
        log.append(ListOperation::ListRemove(vec!["L2".to_string()]))
            .unwrap();
        log.append(add("L1", "b")).unwrap();

        let reloaded = OperationLog::new(kv);
        assert_eq!(reloaded.load().unwrap(), 3);
        let ops = reloaded.operations().unwrap();
        assert_eq!(ops[0], add("L1", "a"));
        assert_eq!(ops[1].kind(), "list_remove");
        assert_eq!(ops[2], add("L1", "b"));
    }

    #[test]
    fn test_load_without_stored_queue_is_empty() {
        let log = OperationLog::new(store());
        assert_eq!(log.load().unwrap(), 0);
        assert!(log.is_empty());
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let log = OperationLog::new(store());
        log.append(add("L1", "a")).unwrap();
        let mut copy = log.snapshot().unwrap();
        copy.clear();
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_clear_empties_both_copies() {
        let kv = store();
        let log = OperationLog::new(kv.clone());
        log.append(add("L1", "a")).unwrap();
        log.clear().unwrap();
        assert!(log.is_empty());

        let reloaded = OperationLog::new(kv);
        assert_eq!(reloaded.load().unwrap(), 0);
    }

    #[test]
    fn test_remove_does_not_prune_unrelated_ops() {
        let log = OperationLog::new(store());
        log.append(add("L1", "a")).unwrap();
        log.append(add("L2", "b")).unwrap();
        log.append(ListOperation::ListRemove(vec!["L1".to_string()]))
            .unwrap();
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn test_clear_through_keeps_later_appends() {
        let kv = store();
        let log = OperationLog::new(kv.clone());
        log.append(add("L1", "a")).unwrap();
        let folded = log.snapshot().unwrap();
        log.append(add("L1", "b")).unwrap();

        log.clear_through(&folded).unwrap();
        assert_eq!(log.operations().unwrap(), vec![add("L1", "b")]);

        let reloaded = OperationLog::new(kv);
        reloaded.load().unwrap();
        assert_eq!(reloaded.len(), 1);
    }

    #[test]
    fn test_corrupt_queue_is_serialization_error() {
        let kv = store();
        kv.save(KEY_OP_QUEUE, "not json").unwrap();
        let log = OperationLog::new(kv);
        assert!(matches!(log.load(), Err(SyncError::Serialization(_))));
    }
}
