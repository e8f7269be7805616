//! Protocol value types shared by the engine, the XML codec, and the HTTP layer.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The only storage class the gateway reports.
pub const STANDARD_STORAGE_CLASS: &str = "STANDARD";

/// Version id reported for objects written while versioning is not enabled.
pub const NULL_VERSION_ID: &str = "null";

/// User metadata attached to an object (`x-amz-*` headers, `Content-Type`, ...).
pub type Metadata = BTreeMap<String, String>;

/// Per-bucket versioning status.
///
/// Transitions are `None -> Enabled <-> Suspended`; a bucket never returns to `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum VersioningStatus {
    /// Versioning was never enabled.
    #[default]
    None,
    /// New writes get fresh version ids; deletes write delete markers.
    Enabled,
    /// Versioning was enabled and is now paused.
    Suspended,
}

impl VersioningStatus {
    /// Wire representation (empty for `None`).
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "",
            Self::Enabled => "Enabled",
            Self::Suspended => "Suspended",
        }
    }

    /// Parse the `<Status>` value of a versioning configuration.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Enabled" => Some(Self::Enabled),
            "Suspended" => Some(Self::Suspended),
            _ => None,
        }
    }

    /// Whether writes currently produce distinct versions.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Enabled)
    }
}

/// Owner or initiator of a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    /// Canonical id.
    pub id: String,
    /// Display name.
    pub display_name: String,
}

impl Owner {
    /// Create an owner whose display name equals its id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            display_name: id.clone(),
            id,
        }
    }
}

/// A bucket as reported by `ListBuckets`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketInfo {
    /// Bucket name.
    pub name: String,
    /// Creation timestamp.
    pub creation_date: DateTime<Utc>,
}

/// One `<Contents>` entry of an object listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSummary {
    /// Object key.
    pub key: String,
    /// Last modification time.
    pub last_modified: DateTime<Utc>,
    /// Quoted ETag.
    pub etag: String,
    /// Size in bytes.
    pub size: u64,
    /// Owner, when requested.
    pub owner: Option<Owner>,
}

/// One `<Version>` or `<DeleteMarker>` entry of a version listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionSummary {
    /// Object key.
    pub key: String,
    /// Version id.
    pub version_id: String,
    /// Whether this is the newest version of the key.
    pub is_latest: bool,
    /// Whether this entry is a delete marker.
    pub is_delete_marker: bool,
    /// Last modification time.
    pub last_modified: DateTime<Utc>,
    /// Quoted ETag (empty for delete markers).
    pub etag: String,
    /// Size in bytes (zero for delete markers).
    pub size: u64,
    /// Owner.
    pub owner: Option<Owner>,
}

/// A key, optionally pinned to a version.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ObjectIdentifier {
    /// Object key.
    pub key: String,
    /// Version id.
    pub version_id: Option<String>,
}

/// A `(part number, claimed ETag)` pair from a completion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedPart {
    /// Part number.
    pub part_number: u32,
    /// ETag the client received when uploading the part.
    pub etag: String,
}

/// One `<Part>` entry of `ListParts`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartSummary {
    /// Part number.
    pub part_number: u32,
    /// Upload time.
    pub last_modified: DateTime<Utc>,
    /// Quoted ETag.
    pub etag: String,
    /// Size in bytes.
    pub size: u64,
}

/// One `<Upload>` entry of `ListMultipartUploads`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSummary {
    /// Object key.
    pub key: String,
    /// Upload id.
    pub upload_id: String,
    /// Initiation time.
    pub initiated: DateTime<Utc>,
    /// Initiator.
    pub owner: Option<Owner>,
}

/// A successful entry of a batch delete.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeletedObject {
    /// Object key.
    pub key: String,
    /// Version id the request targeted.
    pub version_id: Option<String>,
    /// Whether a delete marker was written.
    pub delete_marker: bool,
    /// Version id of the written delete marker.
    pub delete_marker_version_id: Option<String>,
}

/// A failed entry of a batch delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteFailure {
    /// Object key.
    pub key: String,
    /// Error code string.
    pub code: String,
    /// Error message.
    pub message: String,
}

/// Versioning configuration document, used both for reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VersioningConfiguration {
    /// The status.
    pub status: VersioningStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_parse_versioning_status() {
        assert_eq!(
            VersioningStatus::parse("Enabled"),
            Some(VersioningStatus::Enabled)
        );
        assert_eq!(
            VersioningStatus::parse("Suspended"),
            Some(VersioningStatus::Suspended)
        );
        assert_eq!(VersioningStatus::parse("enabled"), None);
        assert_eq!(VersioningStatus::None.as_str(), "");
    }

    #[test]
    fn test_should_default_display_name_to_id() {
        let owner = Owner::new("abc123");
        assert_eq!(owner.display_name, "abc123");
    }

    #[test]
    fn test_should_serialize_bucket_info() {
        let info = BucketInfo {
            name: "photos".to_owned(),
            creation_date: Utc::now(),
        };
        let json = serde_json::to_string(&info).expect("test serialization");
        assert!(json.contains("\"name\":\"photos\""));
    }
}
