//! Multipart upload handlers.
//!
//! Implements `create_multipart_upload`, `upload_part`,
//! `complete_multipart_upload`, `abort_multipart_upload`, `list_parts`, and
//! `list_multipart_uploads` on top of the
//! [`MultipartCoordinator`](crate::multipart::MultipartCoordinator).

use s3gate_model::input::CompleteMultipartUploadRequest;
use s3gate_model::output::{
    CompleteMultipartUploadResult, InitiateMultipartUploadResult, ListMultipartUploadsResult,
    ListPartsResult,
};
use s3gate_model::types::Metadata;
use tracing::info;

use crate::backend::{Backend, PutObjectInput};
use crate::body::ObjectBody;
use crate::error::{GatewayError, GatewayResult};
use crate::identity::CallerIdentity;
use crate::prefix::Prefix;
use crate::provider::S3Gateway;
use crate::validation::{
    MAX_LIST_LIMIT, decode_content_md5, validate_metadata, validate_object_key,
};

/// An `UploadPart` request.
#[derive(Debug)]
pub struct UploadPartRequest {
    /// Bucket.
    pub bucket: String,
    /// Key.
    pub key: String,
    /// Upload id.
    pub upload_id: String,
    /// Parsed `partNumber`.
    pub part_number: u32,
    /// `Content-Length`, when sent.
    pub content_length: Option<u64>,
    /// Raw `Content-MD5` header.
    pub content_md5: Option<String>,
    /// Part bytes.
    pub body: ObjectBody,
}

/// Result of a completed upload.
#[derive(Debug, Clone)]
pub struct CompleteMultipartUploadResponse {
    /// The `CompleteMultipartUploadResult` document.
    pub result: CompleteMultipartUploadResult,
    /// Version of the assembled object, when versioned.
    pub version_id: Option<String>,
}

/// Query of `ListParts`.
#[derive(Debug, Clone, Default)]
pub struct ListPartsRequest {
    /// Bucket.
    pub bucket: String,
    /// Key.
    pub key: String,
    /// Upload id.
    pub upload_id: String,
    /// List parts numbered above this.
    pub part_number_marker: u32,
    /// Page size.
    pub max_parts: usize,
}

/// Query of `ListMultipartUploads`.
#[derive(Debug, Clone, Default)]
pub struct ListUploadsRequest {
    /// Only keys starting with this.
    pub prefix: Option<String>,
    /// Collapse keys on this separator.
    pub delimiter: Option<String>,
    /// Resume at this key.
    pub key_marker: Option<String>,
    /// Resume after this upload of `key_marker`.
    pub upload_id_marker: Option<String>,
    /// Page size; zero means the default.
    pub max_uploads: usize,
}

impl<B: Backend> S3Gateway<B> {
    /// Start an upload.
    pub async fn handle_create_multipart_upload(
        &self,
        caller: &CallerIdentity,
        bucket: &str,
        key: &str,
        metadata: Metadata,
    ) -> GatewayResult<InitiateMultipartUploadResult> {
        validate_object_key(key)?;
        validate_metadata(&metadata, self.config.metadata_size_limit)?;
        self.ensure_bucket(caller, bucket).await?;

        let upload_id = self.multipart.initiate(bucket, key, metadata, caller);
        info!(bucket = %bucket, key = %key, upload_id = %upload_id, "multipart upload started");
        Ok(InitiateMultipartUploadResult {
            bucket: bucket.to_owned(),
            key: key.to_owned(),
            upload_id,
        })
    }

    /// Stage one part and return its ETag.
    ///
    /// # Errors
    ///
    /// `MissingContentLength` for an absent or zero length, `InvalidDigest`
    /// for a bad `Content-MD5`, then the coordinator's errors.
    pub async fn handle_upload_part(
        &self,
        _caller: &CallerIdentity,
        request: UploadPartRequest,
    ) -> GatewayResult<String> {
        let content_length = request
            .content_length
            .filter(|len| *len > 0)
            .ok_or(GatewayError::MissingContentLength)?;
        let content_md5 = if self.config.integrity_check {
            decode_content_md5(request.content_md5.as_deref())?
        } else {
            None
        };

        self.multipart
            .add_part(
                &request.bucket,
                &request.key,
                &request.upload_id,
                request.part_number,
                request.body,
                content_length,
                content_md5,
            )
            .await
    }

    /// Assemble the selected parts into the final object.
    ///
    /// A failed validation or write leaves the upload in place so the client
    /// can retry.
    pub async fn handle_complete_multipart_upload(
        &self,
        caller: &CallerIdentity,
        bucket: &str,
        key: &str,
        upload_id: &str,
        request: CompleteMultipartUploadRequest,
    ) -> GatewayResult<CompleteMultipartUploadResponse> {
        if request.parts.is_empty() {
            return Err(GatewayError::malformed_xml(
                "the CompleteMultipartUpload document must name at least one part",
            ));
        }
        let plan = self
            .multipart
            .prepare_complete(bucket, key, upload_id, &request.parts)?;

        let etag = plan.etag.clone();
        let written = self
            .backend
            .put_object(
                caller,
                bucket,
                key,
                PutObjectInput {
                    metadata: plan.metadata,
                    etag: plan.etag,
                    size: plan.size,
                    body: plan.body,
                },
            )
            .await?;
        self.multipart.finish(upload_id);

        info!(
            bucket = %bucket,
            key = %key,
            upload_id = %upload_id,
            parts = request.parts.len(),
            size = plan.size,
            etag = %etag,
            "multipart upload completed"
        );
        Ok(CompleteMultipartUploadResponse {
            result: CompleteMultipartUploadResult {
                location: format!("/{bucket}/{key}"),
                bucket: bucket.to_owned(),
                key: key.to_owned(),
                etag,
            },
            version_id: written.version_id,
        })
    }

    /// Abort an upload and discard its parts.
    pub async fn handle_abort_multipart_upload(
        &self,
        _caller: &CallerIdentity,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> GatewayResult<()> {
        self.multipart.abort(bucket, key, upload_id)?;
        info!(bucket = %bucket, key = %key, upload_id = %upload_id, "multipart upload aborted");
        Ok(())
    }

    /// One page of an upload's parts.
    pub async fn handle_list_parts(
        &self,
        _caller: &CallerIdentity,
        request: ListPartsRequest,
    ) -> GatewayResult<ListPartsResult> {
        let listing = self.multipart.list_parts(
            &request.bucket,
            &request.key,
            &request.upload_id,
            request.part_number_marker,
            request.max_parts,
        )?;
        Ok(ListPartsResult {
            bucket: request.bucket,
            key: request.key,
            upload_id: request.upload_id,
            owner: listing.owner,
            part_number_marker: request.part_number_marker,
            next_part_number_marker: listing.next_part_number_marker,
            max_parts: request.max_parts,
            is_truncated: listing.is_truncated,
            parts: listing.parts,
        })
    }

    /// One page of a bucket's in-progress uploads.
    pub async fn handle_list_multipart_uploads(
        &self,
        caller: &CallerIdentity,
        bucket: &str,
        request: ListUploadsRequest,
    ) -> GatewayResult<ListMultipartUploadsResult> {
        self.ensure_bucket(caller, bucket).await?;
        let max_uploads = match request.max_uploads {
            0 => MAX_LIST_LIMIT,
            n => n.min(MAX_LIST_LIMIT),
        };
        let prefix = Prefix::new(request.prefix, request.delimiter);
        let page = self.multipart.list_uploads(
            bucket,
            &prefix,
            request.key_marker.as_deref(),
            request.upload_id_marker.as_deref(),
            max_uploads,
        );
        Ok(ListMultipartUploadsResult {
            bucket: bucket.to_owned(),
            key_marker: request.key_marker.unwrap_or_default(),
            upload_id_marker: request.upload_id_marker.unwrap_or_default(),
            next_key_marker: page.next_key_marker,
            next_upload_id_marker: page.next_id_marker,
            max_uploads,
            delimiter: prefix.delimiter().map(str::to_owned),
            prefix: prefix.prefix().to_owned(),
            common_prefixes: page.common_prefixes,
            is_truncated: page.is_truncated,
            uploads: page.entries,
        })
    }
}
