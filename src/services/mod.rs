pub mod clock;
pub mod conflict;
pub mod host;
pub mod list_merge;
pub mod op_queue;
pub mod remote_store;
pub mod settings_provider;
pub mod sync_engine;
pub mod sync_paths;

pub use clock::{Clock, FixedClock, SystemClock};
pub use conflict::{ConflictChoice, ConflictResolver, FixedResolver};
pub use host::{
    AppDataStore, ListStore, LogNotifier, MemoryAppData, MemoryListStore, Notifier,
    RecordingNotifier,
};
pub use list_merge::{apply_operation, fold_operations, FoldOutcome, StructuralConflict};
pub use op_queue::OperationLog;
pub use remote_store::{BoxFuture, MemoryRemote, RemoteStore, WebDavRemote};
pub use settings_provider::{SettingsProvider, StaticSettings};
pub use sync_engine::{SyncEngine, SyncLogEntry, SyncOutcome};
