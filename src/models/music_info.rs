use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A track reference as stored inside a list
///
/// Merge logic only ever compares `id`; the other fields are carried along
/// for rendering and playback. Unknown fields survive a round-trip through
/// `extra`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MusicInfo {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub singer: String,
    #[serde(default)]
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
    /// Source specific metadata (album, quality list, picture url, ...)
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub meta: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MusicInfo {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            singer: String::new(),
            source: String::new(),
            interval: None,
            meta: Map::new(),
            extra: Map::new(),
        }
    }

    /// Applies a partial update. Fields the patch leaves unset keep their
    /// current value; `meta` is merged key by key.
    pub fn apply_patch(&mut self, patch: &MusicInfoPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(singer) = &patch.singer {
            self.singer = singer.clone();
        }
        if let Some(source) = &patch.source {
            self.source = source.clone();
        }
        if let Some(interval) = &patch.interval {
            self.interval = Some(interval.clone());
        }
        for (key, value) in &patch.meta {
            self.meta.insert(key.clone(), value.clone());
        }
    }
}

/// Partial track update, identified by track id
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct MusicInfoPatch {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub singer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub meta: Map<String, Value>,
}
