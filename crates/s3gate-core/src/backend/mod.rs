//! The storage backend capability interface.
//!
//! The protocol engine never touches object bytes at rest. Everything it
//! needs from storage goes through [`Backend`], and every call carries the
//! [`CallerIdentity`] the request was made under. Bodies cross the boundary
//! as [`ObjectBody`] in both directions.
//!
//! [`MemoryBackend`] is the reference implementation.

mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use s3gate_model::S3Error;
use s3gate_model::types::{
    BucketInfo, DeleteFailure, DeletedObject, Metadata, ObjectIdentifier, VersioningStatus,
};

pub use memory::MemoryBackend;

use crate::body::ObjectBody;
use crate::error::GatewayResult;
use crate::identity::CallerIdentity;
use crate::listing::{ListPage, ObjectListing, VersionListing, VersionPage};
use crate::prefix::Prefix;
use crate::range::{ObjectRange, RangeRequest};
use crate::versioning::DeleteOutcome;

/// An object to write. The engine has already measured and hashed the body.
#[derive(Debug)]
pub struct PutObjectInput {
    /// Stored metadata.
    pub metadata: Metadata,
    /// Quoted ETag to record.
    pub etag: String,
    /// Exact size of `body`.
    pub size: u64,
    /// Content.
    pub body: ObjectBody,
}

/// Result of a write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutObjectOutput {
    /// Version id, when the bucket assigned a real one.
    pub version_id: Option<String>,
    /// Write time.
    pub last_modified: DateTime<Utc>,
}

/// Attributes of one stored object version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    /// Object key.
    pub key: String,
    /// Version id, when the object carries a real one.
    pub version_id: Option<String>,
    /// Size in bytes.
    pub size: u64,
    /// Quoted ETag.
    pub etag: String,
    /// Last modification time.
    pub last_modified: DateTime<Utc>,
    /// Stored metadata.
    pub metadata: Metadata,
}

/// Content of an object read.
#[derive(Debug)]
pub struct ObjectContent {
    /// The resolved version.
    pub info: ObjectInfo,
    /// The served byte range, when one was requested.
    pub range: Option<ObjectRange>,
    /// Bytes of the range, or of the whole object.
    pub body: ObjectBody,
}

/// Per-key outcome of a batch delete.
#[derive(Debug, Clone, Default)]
pub struct BatchDeleteOutcome {
    /// Keys removed or marked.
    pub deleted: Vec<DeletedObject>,
    /// Keys that failed.
    pub errors: Vec<DeleteFailure>,
}

/// Storage operations the gateway depends on.
///
/// Implementations must be safe to call from many requests at once.
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    /// Register a caller with the storage fabric. Called outside the request path.
    async fn register_identity(&self, _caller: &CallerIdentity) -> GatewayResult<()> {
        Ok(())
    }

    /// Buckets visible to the caller, by name.
    async fn list_buckets(&self, caller: &CallerIdentity) -> GatewayResult<Vec<BucketInfo>>;

    /// Create a bucket.
    async fn create_bucket(&self, caller: &CallerIdentity, bucket: &str) -> GatewayResult<()>;

    /// Whether the bucket exists.
    async fn bucket_exists(&self, caller: &CallerIdentity, bucket: &str) -> GatewayResult<bool>;

    /// Delete an empty bucket.
    async fn delete_bucket(&self, caller: &CallerIdentity, bucket: &str) -> GatewayResult<()>;

    /// Current versioning status.
    async fn get_bucket_versioning(
        &self,
        caller: &CallerIdentity,
        bucket: &str,
    ) -> GatewayResult<VersioningStatus>;

    /// Store a new versioning status. The transition has already been validated.
    async fn set_bucket_versioning(
        &self,
        caller: &CallerIdentity,
        bucket: &str,
        status: VersioningStatus,
    ) -> GatewayResult<()>;

    /// One page of current objects.
    async fn list_bucket(
        &self,
        caller: &CallerIdentity,
        bucket: &str,
        prefix: &Prefix,
        page: &ListPage,
    ) -> GatewayResult<ObjectListing>;

    /// One page of versions and delete markers.
    async fn list_versions(
        &self,
        caller: &CallerIdentity,
        bucket: &str,
        prefix: &Prefix,
        page: &VersionPage,
    ) -> GatewayResult<VersionListing>;

    /// Write an object.
    async fn put_object(
        &self,
        caller: &CallerIdentity,
        bucket: &str,
        key: &str,
        input: PutObjectInput,
    ) -> GatewayResult<PutObjectOutput>;

    /// Read an object, optionally one version and one byte range of it.
    async fn get_object(
        &self,
        caller: &CallerIdentity,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
        range: Option<&RangeRequest>,
    ) -> GatewayResult<ObjectContent>;

    /// Attributes of an object or one of its versions.
    async fn head_object(
        &self,
        caller: &CallerIdentity,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
    ) -> GatewayResult<ObjectInfo>;

    /// Delete the current version, following the bucket's versioning status.
    /// Deleting a missing key succeeds.
    async fn delete_object(
        &self,
        caller: &CallerIdentity,
        bucket: &str,
        key: &str,
    ) -> GatewayResult<DeleteOutcome>;

    /// Permanently remove one version. A missing version succeeds.
    async fn delete_object_version(
        &self,
        caller: &CallerIdentity,
        bucket: &str,
        key: &str,
        version_id: &str,
    ) -> GatewayResult<DeleteOutcome>;

    /// Delete many objects; per-key failures do not fail the call.
    async fn delete_multi(
        &self,
        caller: &CallerIdentity,
        bucket: &str,
        objects: &[ObjectIdentifier],
    ) -> GatewayResult<BatchDeleteOutcome> {
        let mut outcome = BatchDeleteOutcome::default();
        for object in objects {
            let result = match object.version_id.as_deref() {
                Some(version_id) => {
                    self.delete_object_version(caller, bucket, &object.key, version_id)
                        .await
                }
                None => self.delete_object(caller, bucket, &object.key).await,
            };
            match result {
                Ok(deleted) => outcome.deleted.push(DeletedObject {
                    key: object.key.clone(),
                    version_id: object.version_id.clone(),
                    delete_marker: deleted.delete_marker,
                    delete_marker_version_id: deleted
                        .delete_marker
                        .then_some(deleted.version_id)
                        .flatten(),
                }),
                Err(e) => {
                    let wire = S3Error::from(e);
                    outcome.errors.push(DeleteFailure {
                        key: object.key.clone(),
                        code: wire.code.as_str().to_owned(),
                        message: wire.message,
                    });
                }
            }
        }
        Ok(outcome)
    }
}
