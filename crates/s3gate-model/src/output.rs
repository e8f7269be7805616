//! Response documents rendered as XML bodies.

use chrono::{DateTime, Utc};

use crate::types::{
    BucketInfo, DeleteFailure, DeletedObject, ObjectSummary, Owner, PartSummary, UploadSummary,
    VersionSummary,
};

/// `ListAllMyBucketsResult`.
#[derive(Debug, Clone, Default)]
pub struct ListAllMyBucketsResult {
    /// The caller.
    pub owner: Option<Owner>,
    /// Buckets visible to the caller.
    pub buckets: Vec<BucketInfo>,
}

/// `ListBucketResult` for the v1 listing.
#[derive(Debug, Clone, Default)]
pub struct ListBucketResult {
    /// Bucket name.
    pub name: String,
    /// Requested prefix.
    pub prefix: String,
    /// Requested delimiter.
    pub delimiter: Option<String>,
    /// Requested marker.
    pub marker: String,
    /// Marker for the next page; only set when a delimiter was supplied.
    pub next_marker: Option<String>,
    /// Page size.
    pub max_keys: usize,
    /// Whether more entries remain.
    pub is_truncated: bool,
    /// Objects.
    pub contents: Vec<ObjectSummary>,
    /// Collapsed common prefixes.
    pub common_prefixes: Vec<String>,
}

/// `ListBucketResult` for the v2 listing.
#[derive(Debug, Clone, Default)]
pub struct ListBucketResultV2 {
    /// Bucket name.
    pub name: String,
    /// Requested prefix.
    pub prefix: String,
    /// Requested delimiter.
    pub delimiter: Option<String>,
    /// Page size.
    pub max_keys: usize,
    /// Whether more entries remain.
    pub is_truncated: bool,
    /// Objects plus common prefixes on this page.
    pub key_count: usize,
    /// Echo of the request token.
    pub continuation_token: Option<String>,
    /// Token for the next page.
    pub next_continuation_token: Option<String>,
    /// Echo of `start-after`.
    pub start_after: Option<String>,
    /// Objects.
    pub contents: Vec<ObjectSummary>,
    /// Collapsed common prefixes.
    pub common_prefixes: Vec<String>,
}

/// `ListVersionsResult`.
#[derive(Debug, Clone, Default)]
pub struct ListVersionsResult {
    /// Bucket name.
    pub name: String,
    /// Requested prefix.
    pub prefix: String,
    /// Requested delimiter.
    pub delimiter: Option<String>,
    /// Requested key marker.
    pub key_marker: String,
    /// Requested version-id marker.
    pub version_id_marker: String,
    /// Key marker for the next page.
    pub next_key_marker: Option<String>,
    /// Version-id marker for the next page.
    pub next_version_id_marker: Option<String>,
    /// Page size.
    pub max_keys: usize,
    /// Whether more entries remain.
    pub is_truncated: bool,
    /// Versions and delete markers, newest first within a key.
    pub versions: Vec<VersionSummary>,
    /// Collapsed common prefixes.
    pub common_prefixes: Vec<String>,
}

/// `LocationConstraint`.
#[derive(Debug, Clone, Default)]
pub struct LocationConstraint {
    /// Region name; always empty for this gateway.
    pub location: String,
}

/// `InitiateMultipartUploadResult`.
#[derive(Debug, Clone, Default)]
pub struct InitiateMultipartUploadResult {
    /// Bucket name.
    pub bucket: String,
    /// Object key.
    pub key: String,
    /// Newly allocated upload id.
    pub upload_id: String,
}

/// `CompleteMultipartUploadResult`.
#[derive(Debug, Clone, Default)]
pub struct CompleteMultipartUploadResult {
    /// Object URL path.
    pub location: String,
    /// Bucket name.
    pub bucket: String,
    /// Object key.
    pub key: String,
    /// Final multipart ETag.
    pub etag: String,
}

/// `ListPartsResult`.
#[derive(Debug, Clone, Default)]
pub struct ListPartsResult {
    /// Bucket name.
    pub bucket: String,
    /// Object key.
    pub key: String,
    /// Upload id.
    pub upload_id: String,
    /// Initiator.
    pub owner: Option<Owner>,
    /// Requested part-number marker.
    pub part_number_marker: u32,
    /// Marker for the next page.
    pub next_part_number_marker: Option<u32>,
    /// Page size.
    pub max_parts: usize,
    /// Whether more parts remain.
    pub is_truncated: bool,
    /// Parts.
    pub parts: Vec<PartSummary>,
}

/// `ListMultipartUploadsResult`.
#[derive(Debug, Clone, Default)]
pub struct ListMultipartUploadsResult {
    /// Bucket name.
    pub bucket: String,
    /// Requested key marker.
    pub key_marker: String,
    /// Requested upload-id marker.
    pub upload_id_marker: String,
    /// Key marker for the next page.
    pub next_key_marker: Option<String>,
    /// Upload-id marker for the next page.
    pub next_upload_id_marker: Option<String>,
    /// Page size.
    pub max_uploads: usize,
    /// Requested delimiter.
    pub delimiter: Option<String>,
    /// Requested prefix.
    pub prefix: String,
    /// Collapsed common prefixes.
    pub common_prefixes: Vec<String>,
    /// Whether more uploads remain.
    pub is_truncated: bool,
    /// Uploads.
    pub uploads: Vec<UploadSummary>,
}

/// `DeleteResult`.
#[derive(Debug, Clone, Default)]
pub struct DeleteResult {
    /// Deleted entries (empty in quiet mode).
    pub deleted: Vec<DeletedObject>,
    /// Failed entries.
    pub errors: Vec<DeleteFailure>,
}

/// `CopyObjectResult`.
#[derive(Debug, Clone)]
pub struct CopyObjectResult {
    /// ETag of the new object.
    pub etag: String,
    /// Time the copy was written.
    pub last_modified: DateTime<Utc>,
}
