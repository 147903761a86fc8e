//! Per-object metadata.

use crate::expiry::Expiry;
use serde::{Deserialize, Serialize};

/// Everything known about a stored object besides its bytes.
///
/// The JSON form of this struct is the local sidecar format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub delete_key: String,
    #[serde(default)]
    pub access_key: String,
    pub sha256sum: String,
    pub mimetype: String,
    pub size: u64,
    pub expiry: Expiry,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub archive_files: Vec<String>,
}

impl Metadata {
    pub fn is_expired(&self) -> bool {
        self.expiry.is_expired()
    }

    pub fn requires_access_key(&self) -> bool {
        !self.access_key.is_empty()
    }
}

/// Result of a successful upload: the final filename and what was stored under it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub filename: String,
    pub metadata: Metadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Metadata {
        Metadata {
            delete_key: "deletekey".to_string(),
            access_key: String::new(),
            sha256sum: "abc".to_string(),
            mimetype: "text/plain".to_string(),
            size: 5,
            expiry: Expiry::Never,
            archive_files: Vec::new(),
        }
    }

    #[test]
    fn sidecar_json_shape() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["delete_key"], "deletekey");
        assert_eq!(json["access_key"], "");
        assert_eq!(json["expiry"], 0);
        assert_eq!(json["size"], 5);
        assert!(json.get("archive_files").is_none());
    }

    #[test]
    fn sidecar_without_optional_fields_parses() {
        let raw = r#"{"delete_key":"k","sha256sum":"s","mimetype":"text/plain","size":1,"expiry":0}"#;
        let meta: Metadata = serde_json::from_str(raw).unwrap();
        assert!(meta.access_key.is_empty());
        assert!(meta.archive_files.is_empty());
        assert!(!meta.requires_access_key());
    }

    #[test]
    fn sidecar_with_unknown_fields_parses() {
        let raw = r#"{"delete_key":"k","sha256sum":"s","mimetype":"text/plain","size":1,"expiry":0,"short_url":"https://sho.rt/x"}"#;
        let meta: Metadata = serde_json::from_str(raw).unwrap();
        assert_eq!(meta.delete_key, "k");
        assert_eq!(serde_json::to_value(&meta).unwrap().get("short_url"), None);
    }
}
