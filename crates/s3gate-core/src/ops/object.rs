//! Object operation handlers.
//!
//! Implements `put_object`, `copy_object`, `get_object`, `head_object`,
//! `delete_object`, `delete_objects`, and the browser form upload.
//!
//! Writes are staged before the backend sees them so the length and
//! `Content-MD5` can be verified first. Bodies below `sync_file_min` hold an
//! upload-pool token while they are staged and written; larger bodies skip
//! the pool.

use bytes::Bytes;
use chrono::Utc;
use s3gate_model::input::DeleteRequest;
use s3gate_model::output::{CopyObjectResult, DeleteResult};
use s3gate_model::types::Metadata;
use tracing::{debug, info};

use crate::backend::{Backend, ObjectContent, ObjectInfo, PutObjectInput};
use crate::body::ObjectBody;
use crate::error::{GatewayError, GatewayResult};
use crate::identity::CallerIdentity;
use crate::provider::S3Gateway;
use crate::range::{self, ObjectRange, RangeRequest};
use crate::utils::{merge_copy_metadata, parse_copy_source};
use crate::validation::{
    MAX_DELETE_KEYS, decode_content_md5, validate_metadata, validate_object_key,
};
use crate::versioning::DeleteOutcome;

/// What `HeadObject` reports.
#[derive(Debug, Clone)]
pub struct ObjectHead {
    /// Object attributes.
    pub info: ObjectInfo,
    /// The requested range, resolved; `None` for the whole object.
    pub range: Option<ObjectRange>,
}

/// A `PutObject` request.
#[derive(Debug)]
pub struct PutObjectRequest {
    /// Target bucket.
    pub bucket: String,
    /// Target key.
    pub key: String,
    /// Metadata collected from the request headers.
    pub metadata: Metadata,
    /// `Content-Length`, when sent.
    pub content_length: Option<u64>,
    /// Raw `Content-MD5` header.
    pub content_md5: Option<String>,
    /// Request body.
    pub body: ObjectBody,
}

/// Result of a write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutObjectResponse {
    /// Quoted ETag of the stored object.
    pub etag: String,
    /// Version id, when the bucket assigned one.
    pub version_id: Option<String>,
}

/// A `CopyObject` request.
#[derive(Debug, Clone)]
pub struct CopyObjectRequest {
    /// Target bucket.
    pub bucket: String,
    /// Target key.
    pub key: String,
    /// Metadata from the request headers; wins over the source's.
    pub metadata: Metadata,
    /// Raw `x-amz-copy-source` header.
    pub copy_source: String,
}

/// Result of a copy.
#[derive(Debug, Clone)]
pub struct CopyObjectResponse {
    /// The `CopyObjectResult` document.
    pub result: CopyObjectResult,
    /// Version of the source that was read, when versioned.
    pub source_version_id: Option<String>,
    /// Version of the new object, when versioned.
    pub version_id: Option<String>,
}

/// A `GetObject` or `HeadObject` request.
#[derive(Debug, Clone, Default)]
pub struct GetObjectRequest {
    /// Bucket.
    pub bucket: String,
    /// Key.
    pub key: String,
    /// `?versionId=`.
    pub version_id: Option<String>,
    /// Parsed `Range` header.
    pub range: Option<RangeRequest>,
}

/// A browser form upload, already parsed from `multipart/form-data`.
#[derive(Debug, Clone)]
pub struct PostObjectRequest {
    /// Target bucket.
    pub bucket: String,
    /// The `key` form field.
    pub key: String,
    /// The remaining form fields.
    pub metadata: Metadata,
    /// The `file` form field.
    pub content: Bytes,
}

impl<B: Backend> S3Gateway<B> {
    /// Store an object.
    ///
    /// # Errors
    ///
    /// Validation errors (`KeyTooLong`, `MetadataTooLarge`,
    /// `MissingContentLength`, `InvalidDigest`) come before any backend
    /// call. Staging adds `IncompleteBody` and `BadDigest`; a small upload
    /// that cannot get a pool token fails with `RequestTimeout`.
    pub async fn handle_put_object(
        &self,
        caller: &CallerIdentity,
        request: PutObjectRequest,
    ) -> GatewayResult<PutObjectResponse> {
        validate_object_key(&request.key)?;
        validate_metadata(&request.metadata, self.config.metadata_size_limit)?;
        let content_length = request
            .content_length
            .ok_or(GatewayError::MissingContentLength)?;
        let content_md5 = if self.config.integrity_check {
            decode_content_md5(request.content_md5.as_deref())?
        } else {
            None
        };

        self.ensure_bucket(caller, &request.bucket).await?;
        self.store(
            caller,
            &request.bucket,
            &request.key,
            request.metadata,
            request.body,
            content_length,
            content_md5,
        )
        .await
    }

    /// Copy an object, possibly one version of it.
    ///
    /// Request metadata wins; source metadata fills the gaps, except the ACL.
    /// The new object keeps the source's ETag.
    pub async fn handle_copy_object(
        &self,
        caller: &CallerIdentity,
        request: CopyObjectRequest,
    ) -> GatewayResult<CopyObjectResponse> {
        validate_object_key(&request.key)?;
        let source = parse_copy_source(&request.copy_source)?;
        let mut metadata = request.metadata;
        validate_metadata(&metadata, self.config.metadata_size_limit)?;

        self.ensure_bucket(caller, &request.bucket).await?;
        let content = self
            .backend
            .get_object(
                caller,
                &source.bucket,
                &source.key,
                source.version_id.as_deref(),
                None,
            )
            .await?;
        merge_copy_metadata(&mut metadata, &content.info.metadata);

        let etag = content.info.etag.clone();
        let written = self
            .backend
            .put_object(
                caller,
                &request.bucket,
                &request.key,
                PutObjectInput {
                    metadata,
                    etag: etag.clone(),
                    size: content.info.size,
                    body: content.body,
                },
            )
            .await?;

        info!(
            src_bucket = %source.bucket,
            src_key = %source.key,
            bucket = %request.bucket,
            key = %request.key,
            "object copied"
        );
        Ok(CopyObjectResponse {
            result: CopyObjectResult {
                etag,
                last_modified: written.last_modified,
            },
            source_version_id: content.info.version_id,
            version_id: written.version_id,
        })
    }

    /// Read an object, or a byte range of it.
    pub async fn handle_get_object(
        &self,
        caller: &CallerIdentity,
        request: GetObjectRequest,
    ) -> GatewayResult<ObjectContent> {
        let content = self
            .backend
            .get_object(
                caller,
                &request.bucket,
                &request.key,
                request.version_id.as_deref(),
                request.range.as_ref(),
            )
            .await?;
        debug!(
            bucket = %request.bucket,
            key = %request.key,
            size = content.info.size,
            range = ?content.range,
            "get_object completed"
        );
        Ok(content)
    }

    /// Attributes of an object, with the `Range` resolved against its size.
    pub async fn handle_head_object(
        &self,
        caller: &CallerIdentity,
        request: GetObjectRequest,
    ) -> GatewayResult<ObjectHead> {
        let info = self
            .backend
            .head_object(
                caller,
                &request.bucket,
                &request.key,
                request.version_id.as_deref(),
            )
            .await?;
        let range = range::resolve(request.range.as_ref(), info.size)?;
        Ok(ObjectHead { info, range })
    }

    /// Delete an object, or permanently delete one version of it.
    ///
    /// Deleting a key or version that does not exist succeeds.
    pub async fn handle_delete_object(
        &self,
        caller: &CallerIdentity,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
    ) -> GatewayResult<DeleteOutcome> {
        let outcome = match version_id {
            Some(version_id) => {
                self.backend
                    .delete_object_version(caller, bucket, key, version_id)
                    .await?
            }
            None => self.backend.delete_object(caller, bucket, key).await?,
        };
        info!(
            bucket = %bucket,
            key = %key,
            delete_marker = outcome.delete_marker,
            version_id = ?outcome.version_id,
            "object deleted"
        );
        Ok(outcome)
    }

    /// Delete up to 1000 objects in one call.
    ///
    /// In quiet mode only failures are reported.
    ///
    /// # Errors
    ///
    /// `MalformedXML` for an empty or oversized key list, `NoSuchBucket`
    /// when the bucket is missing. Per-key failures land in the result.
    pub async fn handle_delete_objects(
        &self,
        caller: &CallerIdentity,
        bucket: &str,
        request: DeleteRequest,
    ) -> GatewayResult<DeleteResult> {
        if request.objects.is_empty() {
            return Err(GatewayError::malformed_xml(
                "the Delete document must name at least one object",
            ));
        }
        if request.objects.len() > MAX_DELETE_KEYS {
            return Err(GatewayError::malformed_xml(format!(
                "the Delete document names {} objects, more than {MAX_DELETE_KEYS}",
                request.objects.len()
            )));
        }
        self.ensure_bucket(caller, bucket).await?;

        let outcome = self
            .backend
            .delete_multi(caller, bucket, &request.objects)
            .await?;
        info!(
            bucket = %bucket,
            deleted = outcome.deleted.len(),
            failed = outcome.errors.len(),
            quiet = request.quiet,
            "delete_objects completed"
        );
        Ok(DeleteResult {
            deleted: if request.quiet {
                Vec::new()
            } else {
                outcome.deleted
            },
            errors: outcome.errors,
        })
    }

    /// Store an object sent as a browser form upload.
    pub async fn handle_post_object(
        &self,
        caller: &CallerIdentity,
        request: PostObjectRequest,
    ) -> GatewayResult<PutObjectResponse> {
        validate_object_key(&request.key)?;
        validate_metadata(&request.metadata, self.config.metadata_size_limit)?;
        self.ensure_bucket(caller, &request.bucket).await?;

        let length = request.content.len() as u64;
        self.store(
            caller,
            &request.bucket,
            &request.key,
            request.metadata,
            ObjectBody::from_bytes(request.content),
            length,
            None,
        )
        .await
    }

    /// Stage a validated body and hand it to the backend.
    #[allow(clippy::too_many_arguments)]
    async fn store(
        &self,
        caller: &CallerIdentity,
        bucket: &str,
        key: &str,
        metadata: Metadata,
        body: ObjectBody,
        content_length: u64,
        content_md5: Option<[u8; 16]>,
    ) -> GatewayResult<PutObjectResponse> {
        let small = content_length < self.config.sync_file_min;
        // Held until the backend write returns.
        let _slot = if small {
            Some(self.admission.acquire_upload_slot().await?)
        } else {
            None
        };

        let staged = if small {
            self.staging
                .with_memory_limit(self.config.sync_file_min)
                .stage(body, content_length, content_md5)
                .await?
        } else {
            self.staging.stage(body, content_length, content_md5).await?
        };

        let etag = staged.etag();
        let size = staged.size();
        let written = self
            .backend
            .put_object(
                caller,
                bucket,
                key,
                PutObjectInput {
                    metadata,
                    etag: etag.clone(),
                    size,
                    body: staged.data.into_body(),
                },
            )
            .await?;

        info!(
            bucket = %bucket,
            key = %key,
            size,
            etag = %etag,
            version_id = ?written.version_id,
            pooled = small,
            "object stored"
        );
        Ok(PutObjectResponse {
            etag,
            version_id: written.version_id,
        })
    }
}

/// Metadata for a new object from request headers, stamped with the current time.
pub fn request_metadata<'a, I>(headers: I) -> Metadata
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    crate::utils::extract_metadata(headers, Utc::now())
}
