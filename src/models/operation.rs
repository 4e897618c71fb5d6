use crate::models::{ListDataFull, ListInfoPatch, MusicInfo, MusicInfoPatch, UserListInfo};
use serde::{Deserialize, Serialize};

/// Where added tracks are placed in the target list
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AddLocation {
    Top,
    #[default]
    Bottom,
}

/// One track metadata update, addressed by list id
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MusicUpdate {
    /// Id of the list holding the track
    pub id: String,
    pub music_info: MusicInfoPatch,
}

/// One local playlist mutation, replayable against any document
///
/// Wire format is `{ "action": "<kind>", "data": <payload> }`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(
    tag = "action",
    content = "data",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ListOperation {
    /// Replace the whole document
    ListDataOverwrite(ListDataFull),
    /// Create user lists, inserted consecutively starting at `position`
    ListCreate {
        position: usize,
        list_infos: Vec<UserListInfo>,
    },
    /// Remove user lists by id
    ListRemove(Vec<String>),
    /// Update user list metadata
    ListUpdate(Vec<ListInfoPatch>),
    /// Move user lists as one block to `position`
    ListUpdatePosition { position: usize, ids: Vec<String> },
    /// Replace one list's tracks
    ListMusicOverwrite {
        list_id: String,
        music_infos: Vec<MusicInfo>,
    },
    /// Add tracks to a list, skipping ids already present
    ListMusicAdd {
        id: String,
        music_infos: Vec<MusicInfo>,
        #[serde(default)]
        add_music_location_type: AddLocation,
    },
    /// Move tracks from one list to another
    ListMusicMove {
        from_id: String,
        to_id: String,
        music_infos: Vec<MusicInfo>,
        #[serde(default)]
        add_music_location_type: AddLocation,
    },
    /// Remove tracks by id
    ListMusicRemove { list_id: String, ids: Vec<String> },
    /// Update track metadata
    ListMusicUpdate(Vec<MusicUpdate>),
    /// Move tracks as one block to `position` within a list
    ListMusicUpdatePosition {
        list_id: String,
        position: usize,
        ids: Vec<String>,
    },
    /// Empty the named lists
    ListMusicClear(Vec<String>),
}

impl ListOperation {
    /// Wire name of the variant, used in log lines
    pub fn kind(&self) -> &'static str {
        match self {
            ListOperation::ListDataOverwrite(_) => "list_data_overwrite",
            ListOperation::ListCreate { .. } => "list_create",
            ListOperation::ListRemove(_) => "list_remove",
            ListOperation::ListUpdate(_) => "list_update",
            ListOperation::ListUpdatePosition { .. } => "list_update_position",
            ListOperation::ListMusicOverwrite { .. } => "list_music_overwrite",
            ListOperation::ListMusicAdd { .. } => "list_music_add",
            ListOperation::ListMusicMove { .. } => "list_music_move",
            ListOperation::ListMusicRemove { .. } => "list_music_remove",
            ListOperation::ListMusicUpdate(_) => "list_music_update",
            ListOperation::ListMusicUpdatePosition { .. } => "list_music_update_position",
            ListOperation::ListMusicClear(_) => "list_music_clear",
        }
    }

    /// Shorthand for a single-list create at `position`
    pub fn create_list(info: UserListInfo, position: usize) -> Self {
        ListOperation::ListCreate {
            position,
            list_infos: vec![info],
        }
    }

    /// Shorthand for adding tracks to a list
    pub fn add_tracks(
        list_id: impl Into<String>,
        music_infos: Vec<MusicInfo>,
        location: AddLocation,
    ) -> Self {
        ListOperation::ListMusicAdd {
            id: list_id.into(),
            music_infos,
            add_music_location_type: location,
        }
    }
}

/// An operation as it sits in the pending log
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueuedOperation {
    /// ULID assigned when the operation was queued
    pub op_id: String,
    /// Epoch milliseconds at queue time (informational only, never used for ordering)
    pub queued_at: i64,
    pub op: ListOperation,
}

impl QueuedOperation {
    pub fn new(op: ListOperation) -> Self {
        Self {
            op_id: ulid::Ulid::new().to_string(),
            queued_at: chrono::Utc::now().timestamp_millis(),
            op,
        }
    }
}
