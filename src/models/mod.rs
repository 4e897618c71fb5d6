pub mod list;
pub mod music_info;
pub mod operation;
pub mod snapshot;
pub mod sync_settings;

pub use list::{
    is_builtin_list, ListDataFull, ListInfoPatch, UserListInfo, UserListInfoFull,
    LIST_ID_DEFAULT, LIST_ID_LOVE, LIST_ID_TEMP,
};
pub use music_info::{MusicInfo, MusicInfoPatch};
pub use operation::{AddLocation, ListOperation, MusicUpdate, QueuedOperation};
pub use snapshot::{RemoteSnapshot, SettingsMap, UserApiInfo, UserApisData, SNAPSHOT_VERSION};
pub use sync_settings::{ConflictPolicy, SyncSettings, DEFAULT_DEBOUNCE_MS, DEFAULT_REMOTE_PATH};
