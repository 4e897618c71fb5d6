use crate::models::MusicInfo;
use serde::{Deserialize, Serialize};

/// Id of the built-in default list
pub const LIST_ID_DEFAULT: &str = "default";
/// Id of the built-in favorites list
pub const LIST_ID_LOVE: &str = "love";
/// Id of the built-in temporary list
pub const LIST_ID_TEMP: &str = "temp";

/// Returns true for the three lists that always exist
pub fn is_builtin_list(id: &str) -> bool {
    id == LIST_ID_DEFAULT || id == LIST_ID_LOVE || id == LIST_ID_TEMP
}

/// Identity metadata of a user-created list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserListInfo {
    pub id: String,
    pub name: String,
    /// Online source the list was imported from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_list_id: Option<String>,
    #[serde(default)]
    pub location_update_time: Option<i64>,
}

impl UserListInfo {
    /// New local list with a fresh id
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: format!("userlist_{}", uuid::Uuid::new_v4().simple()),
            name: name.into(),
            source: None,
            source_list_id: None,
            location_update_time: None,
        }
    }

    pub fn with_id(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            source: None,
            source_list_id: None,
            location_update_time: None,
        }
    }

    /// Applies the fields a patch sets; last writer wins per field
    pub fn apply_patch(&mut self, patch: &ListInfoPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(source) = &patch.source {
            self.source = Some(source.clone());
        }
        if let Some(source_list_id) = &patch.source_list_id {
            self.source_list_id = Some(source_list_id.clone());
        }
        if let Some(time) = patch.location_update_time {
            self.location_update_time = Some(time);
        }
    }
}

/// Partial list metadata update, identified by list id
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ListInfoPatch {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_list_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_update_time: Option<i64>,
}

impl ListInfoPatch {
    pub fn rename(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: Some(name.into()),
            ..Default::default()
        }
    }
}

/// A user list together with its tracks
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserListInfoFull {
    #[serde(flatten)]
    pub info: UserListInfo,
    #[serde(default)]
    pub list: Vec<MusicInfo>,
}

impl UserListInfoFull {
    pub fn new(info: UserListInfo, list: Vec<MusicInfo>) -> Self {
        Self { info, list }
    }

    pub fn id(&self) -> &str {
        &self.info.id
    }
}

/// The whole playlist collection, snapshotted and merged as one unit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ListDataFull {
    #[serde(default)]
    pub default_list: Vec<MusicInfo>,
    #[serde(default)]
    pub love_list: Vec<MusicInfo>,
    #[serde(default)]
    pub user_list: Vec<UserListInfoFull>,
    #[serde(default)]
    pub temp_list: Vec<MusicInfo>,
}

impl ListDataFull {
    /// Position of a user list, if present
    pub fn user_list_index(&self, id: &str) -> Option<usize> {
        self.user_list.iter().position(|l| l.info.id == id)
    }

    pub fn user_list(&self, id: &str) -> Option<&UserListInfoFull> {
        self.user_list.iter().find(|l| l.info.id == id)
    }

    pub fn user_list_mut(&mut self, id: &str) -> Option<&mut UserListInfoFull> {
        self.user_list.iter_mut().find(|l| l.info.id == id)
    }

    /// Track sequence of any list, built-in or user
    pub fn tracks(&self, list_id: &str) -> Option<&Vec<MusicInfo>> {
        match list_id {
            LIST_ID_DEFAULT => Some(&self.default_list),
            LIST_ID_LOVE => Some(&self.love_list),
            LIST_ID_TEMP => Some(&self.temp_list),
            _ => self.user_list(list_id).map(|l| &l.list),
        }
    }

    pub fn tracks_mut(&mut self, list_id: &str) -> Option<&mut Vec<MusicInfo>> {
        match list_id {
            LIST_ID_DEFAULT => Some(&mut self.default_list),
            LIST_ID_LOVE => Some(&mut self.love_list),
            LIST_ID_TEMP => Some(&mut self.temp_list),
            _ => self.user_list_mut(list_id).map(|l| &mut l.list),
        }
    }

    pub fn has_list(&self, list_id: &str) -> bool {
        is_builtin_list(list_id) || self.user_list_index(list_id).is_some()
    }

    /// Track ids of a list in order (empty when the list is absent)
    pub fn track_ids(&self, list_id: &str) -> Vec<&str> {
        self.tracks(list_id)
            .map(|tracks| tracks.iter().map(|t| t.id.as_str()).collect())
            .unwrap_or_default()
    }

    /// Total number of tracks over every list
    pub fn track_count(&self) -> usize {
        self.default_list.len()
            + self.love_list.len()
            + self.temp_list.len()
            + self.user_list.iter().map(|l| l.list.len()).sum::<usize>()
    }
}
