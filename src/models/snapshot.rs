use crate::error::{SyncError, SyncResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Schema version written into every remote file
pub const SNAPSHOT_VERSION: &str = "2";

/// Versioned envelope around a remote document
///
/// A new envelope is built for every upload; a downloaded one is never
/// written back modified.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteSnapshot<T> {
    pub version: String,
    /// Epoch milliseconds of the upload that produced this snapshot
    pub last_modified: i64,
    pub data: T,
}

impl<T> RemoteSnapshot<T> {
    pub fn new(data: T, last_modified: i64) -> Self {
        Self {
            version: SNAPSHOT_VERSION.to_string(),
            last_modified,
            data,
        }
    }
}

impl<T: Serialize> RemoteSnapshot<T> {
    pub fn to_json(&self) -> SyncResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl<T: DeserializeOwned> RemoteSnapshot<T> {
    /// Parses a downloaded blob; an unknown schema version is a
    /// serialization error.
    pub fn from_json(content: &str) -> SyncResult<Self> {
        let snapshot: RemoteSnapshot<T> = serde_json::from_str(content)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(SyncError::Serialization(serde::de::Error::custom(format!(
                "unsupported snapshot version {:?}",
                snapshot.version
            ))));
        }
        Ok(snapshot)
    }
}

/// Application settings as synced to `settings.json`
pub type SettingsMap = Map<String, Value>;

/// A user-defined music source entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserApiInfo {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Payload of `user_apis.json`: source entries plus their script text
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct UserApisData {
    #[serde(default)]
    pub list: Vec<UserApiInfo>,
    #[serde(default)]
    pub scripts: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ListDataFull;

    #[test]
    fn test_snapshot_envelope() {
        let snapshot = RemoteSnapshot::new(ListDataFull::default(), 1_700_000_000_000);
        let json = snapshot.to_json().unwrap();
        assert!(json.contains("\"version\":\"2\""));
        assert!(json.contains("\"lastModified\":1700000000000"));

        let back = RemoteSnapshot::<ListDataFull>::from_json(&json).unwrap();
        assert_eq!(back, snapshot);
    }

    #[test]
    fn test_wrong_version_is_rejected() {
        let json = r#"{"version":"1","lastModified":5,"data":{}}"#;
        let err = RemoteSnapshot::<ListDataFull>::from_json(json).unwrap_err();
        assert!(matches!(err, SyncError::Serialization(_)));
    }

    #[test]
    fn test_malformed_blob_is_serialization_error() {
        let err = RemoteSnapshot::<ListDataFull>::from_json("<html>").unwrap_err();
        assert!(err.is_transport_class());
    }

    #[test]
    fn test_user_apis_payload() {
        let json = r#"{"list":[{"id":"api_1","name":"Mine","version":"1.0"}],"scripts":{"api_1":"console.log(1)"}}"#;
        let data: UserApisData = serde_json::from_str(json).unwrap();
        assert_eq!(data.list[0].extra["version"], serde_json::json!("1.0"));
        assert_eq!(data.scripts["api_1"], "console.log(1)");
    }
}
