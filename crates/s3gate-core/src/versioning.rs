//! Versioning model.
//!
//! Buckets move through `None -> Enabled <-> Suspended` ([`transition`]).
//! Each key owns a [`VersionChain`], newest version first. The chain applies
//! the write and delete rules of the bucket's status:
//!
//! | Status | Put | Delete (no version id) |
//! |--------|-----|------------------------|
//! | `None` | replaces the only version (`null`) | removes the key |
//! | `Enabled` | pushes a version with a fresh id | pushes a delete marker |
//! | `Suspended` | replaces the `null` version | removes the current version |
//!
//! Deleting a key that has no versions is a no-op under every status.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use s3gate_model::types::{Metadata, NULL_VERSION_ID, VersioningStatus};

use crate::error::{GatewayError, GatewayResult};

/// Apply a requested status change to the current status.
///
/// # Errors
///
/// [`GatewayError::InvalidArgument`] when suspending a bucket that was never
/// versioned, or when asking to go back to `None`.
pub fn transition(
    current: VersioningStatus,
    requested: VersioningStatus,
) -> GatewayResult<VersioningStatus> {
    match (current, requested) {
        (_, VersioningStatus::Enabled) => Ok(VersioningStatus::Enabled),
        (VersioningStatus::None, VersioningStatus::Suspended) => Err(
            GatewayError::invalid_argument("versioning can only be suspended once it was enabled"),
        ),
        (_, VersioningStatus::Suspended) => Ok(VersioningStatus::Suspended),
        (_, VersioningStatus::None) => Err(GatewayError::invalid_argument(
            "versioning cannot be turned off once enabled",
        )),
    }
}

/// Allocates version ids.
///
/// Ids are a counter rendered as 16 lowercase hex digits, so lexical order
/// matches creation order. An id is never handed out twice.
#[derive(Debug)]
pub struct VersionIdGenerator {
    next: AtomicU64,
}

impl Default for VersionIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl VersionIdGenerator {
    /// Start a fresh sequence.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Allocate the next id.
    pub fn next_id(&self) -> String {
        format!("{:016x}", self.next.fetch_add(1, Ordering::Relaxed))
    }
}

/// One version of a key, or a delete marker.
#[derive(Debug, Clone)]
pub struct ObjectVersion<P> {
    /// Version id; [`NULL_VERSION_ID`] for unversioned writes.
    pub version_id: String,
    /// Whether this version is a tombstone.
    pub is_delete_marker: bool,
    /// Size in bytes.
    pub size: u64,
    /// Quoted ETag.
    pub etag: String,
    /// Stored metadata.
    pub metadata: Metadata,
    /// Write time.
    pub last_modified: DateTime<Utc>,
    /// Backend-specific content.
    pub payload: P,
}

impl<P: Default> ObjectVersion<P> {
    /// A data version awaiting its id from [`VersionChain::put`].
    pub fn new(size: u64, etag: String, metadata: Metadata, payload: P) -> Self {
        Self {
            version_id: NULL_VERSION_ID.to_owned(),
            is_delete_marker: false,
            size,
            etag,
            metadata,
            last_modified: Utc::now(),
            payload,
        }
    }

    fn delete_marker(version_id: String) -> Self {
        Self {
            version_id,
            is_delete_marker: true,
            size: 0,
            etag: String::new(),
            metadata: Metadata::new(),
            last_modified: Utc::now(),
            payload: P::default(),
        }
    }

    /// The version id to report to clients (`None` for the null version).
    #[must_use]
    pub fn reported_version_id(&self) -> Option<String> {
        (self.version_id != NULL_VERSION_ID).then(|| self.version_id.clone())
    }
}

/// What a delete did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteOutcome {
    /// A delete marker was written or removed.
    pub delete_marker: bool,
    /// The marker's id, or the id of the removed version.
    pub version_id: Option<String>,
}

/// All versions of one key, newest first.
#[derive(Debug, Clone)]
pub struct VersionChain<P> {
    versions: Vec<ObjectVersion<P>>,
}

impl<P> Default for VersionChain<P> {
    fn default() -> Self {
        Self {
            versions: Vec::new(),
        }
    }
}

impl<P: Default> VersionChain<P> {
    /// An empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the key has no versions at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    /// Versions, newest first.
    #[must_use]
    pub fn versions(&self) -> &[ObjectVersion<P>] {
        &self.versions
    }

    /// The newest entry, which may be a delete marker.
    #[must_use]
    pub fn latest(&self) -> Option<&ObjectVersion<P>> {
        self.versions.first()
    }

    /// The newest entry unless it is a delete marker.
    #[must_use]
    pub fn current(&self) -> Option<&ObjectVersion<P>> {
        self.latest().filter(|v| !v.is_delete_marker)
    }

    /// Find a version by id.
    #[must_use]
    pub fn get(&self, version_id: &str) -> Option<&ObjectVersion<P>> {
        self.versions.iter().find(|v| v.version_id == version_id)
    }

    /// Resolve the version a read addresses.
    ///
    /// # Errors
    ///
    /// `NoSuchKey`/`NoSuchVersion` when nothing matches, and
    /// [`GatewayError::DeleteMarker`] when the addressed entry is a marker.
    pub fn resolve(&self, key: &str, version_id: Option<&str>) -> GatewayResult<&ObjectVersion<P>> {
        let found = match version_id {
            None => self.latest().ok_or_else(|| GatewayError::NoSuchKey {
                key: key.to_owned(),
            })?,
            Some(id) => self.get(id).ok_or_else(|| GatewayError::NoSuchVersion {
                key: key.to_owned(),
                version_id: id.to_owned(),
            })?,
        };
        if found.is_delete_marker {
            return Err(GatewayError::DeleteMarker {
                key: key.to_owned(),
                version_id: found.version_id.clone(),
                current: version_id.is_none(),
            });
        }
        Ok(found)
    }

    /// Record a write. Returns the id to report, if any.
    pub fn put(
        &mut self,
        status: VersioningStatus,
        mut version: ObjectVersion<P>,
        ids: &VersionIdGenerator,
    ) -> Option<String> {
        match status {
            VersioningStatus::Enabled => {
                version.version_id = ids.next_id();
            }
            VersioningStatus::Suspended => {
                version.version_id = NULL_VERSION_ID.to_owned();
                self.versions.retain(|v| v.version_id != NULL_VERSION_ID);
            }
            VersioningStatus::None => {
                version.version_id = NULL_VERSION_ID.to_owned();
                self.versions.clear();
            }
        }
        let reported = version.reported_version_id();
        self.versions.insert(0, version);
        reported
    }

    /// Delete the current version according to `status`.
    pub fn delete_current(
        &mut self,
        status: VersioningStatus,
        ids: &VersionIdGenerator,
    ) -> DeleteOutcome {
        if self.versions.is_empty() {
            return DeleteOutcome::default();
        }
        match status {
            VersioningStatus::Enabled => {
                let marker = ObjectVersion::delete_marker(ids.next_id());
                let version_id = Some(marker.version_id.clone());
                self.versions.insert(0, marker);
                DeleteOutcome {
                    delete_marker: true,
                    version_id,
                }
            }
            VersioningStatus::Suspended => {
                self.versions.remove(0);
                DeleteOutcome::default()
            }
            VersioningStatus::None => {
                self.versions.clear();
                DeleteOutcome::default()
            }
        }
    }

    /// Permanently remove one version. Removing an unknown id is a no-op.
    pub fn delete_version(&mut self, version_id: &str) -> DeleteOutcome {
        let removed = self
            .versions
            .iter()
            .position(|v| v.version_id == version_id)
            .map(|idx| self.versions.remove(idx));
        DeleteOutcome {
            delete_marker: removed.is_some_and(|v| v.is_delete_marker),
            version_id: Some(version_id.to_owned()),
        }
    }
}
