//! Listing operation handlers.
//!
//! Implements `ListObjects` (v1), `ListObjectsV2`, and `ListObjectVersions`.
//! Page sizes arrive already clamped to `[0, 1000]`.

use s3gate_model::output::{ListBucketResult, ListBucketResultV2, ListVersionsResult};
use tracing::debug;

use crate::backend::Backend;
use crate::error::GatewayResult;
use crate::identity::CallerIdentity;
use crate::listing::{ListPage, VersionPage};
use crate::prefix::Prefix;
use crate::provider::S3Gateway;
use crate::utils::{decode_continuation_token, encode_continuation_token};

/// Query of a v1 listing.
#[derive(Debug, Clone, Default)]
pub struct ListObjectsRequest {
    /// Only keys starting with this.
    pub prefix: Option<String>,
    /// Collapse keys on this separator.
    pub delimiter: Option<String>,
    /// Resume after this key.
    pub marker: Option<String>,
    /// Page size.
    pub max_keys: usize,
}

/// Query of a v2 listing.
#[derive(Debug, Clone, Default)]
pub struct ListObjectsV2Request {
    /// Only keys starting with this.
    pub prefix: Option<String>,
    /// Collapse keys on this separator.
    pub delimiter: Option<String>,
    /// Opaque token from a previous page; wins over `start_after`.
    pub continuation_token: Option<String>,
    /// Resume after this key on the first page.
    pub start_after: Option<String>,
    /// Page size.
    pub max_keys: usize,
    /// Whether to include object owners.
    pub fetch_owner: bool,
}

/// Query of a version listing.
#[derive(Debug, Clone, Default)]
pub struct ListVersionsRequest {
    /// Only keys starting with this.
    pub prefix: Option<String>,
    /// Collapse keys on this separator.
    pub delimiter: Option<String>,
    /// Resume at this key.
    pub key_marker: Option<String>,
    /// Resume after this version of `key_marker`.
    pub version_id_marker: Option<String>,
    /// Page size.
    pub max_keys: usize,
}

impl<B: Backend> S3Gateway<B> {
    /// One page of a v1 listing.
    pub async fn handle_list_objects(
        &self,
        caller: &CallerIdentity,
        bucket: &str,
        request: ListObjectsRequest,
    ) -> GatewayResult<ListBucketResult> {
        let prefix = Prefix::new(request.prefix, request.delimiter);
        let page = ListPage {
            marker: request.marker.clone(),
            max_keys: request.max_keys,
        };
        let listing = self
            .backend
            .list_bucket(caller, bucket, &prefix, &page)
            .await?;

        debug!(
            bucket = %bucket,
            prefix = %prefix.prefix(),
            count = listing.contents.len(),
            truncated = listing.is_truncated,
            "list_objects completed"
        );

        // NextMarker is only meaningful to clients when a delimiter is used;
        // without one the last key doubles as the marker.
        let next_marker = listing
            .next_marker
            .filter(|_| prefix.delimiter().is_some());
        Ok(ListBucketResult {
            name: bucket.to_owned(),
            prefix: prefix.prefix().to_owned(),
            delimiter: prefix.delimiter().map(str::to_owned),
            marker: request.marker.unwrap_or_default(),
            next_marker,
            max_keys: request.max_keys,
            is_truncated: listing.is_truncated,
            contents: listing.contents,
            common_prefixes: listing.common_prefixes,
        })
    }

    /// One page of a v2 listing.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for an undecodable continuation token, plus any
    /// backend error.
    pub async fn handle_list_objects_v2(
        &self,
        caller: &CallerIdentity,
        bucket: &str,
        request: ListObjectsV2Request,
    ) -> GatewayResult<ListBucketResultV2> {
        let marker = match request.continuation_token.as_deref() {
            Some(token) => Some(decode_continuation_token(token)?),
            None => request.start_after.clone(),
        };
        let prefix = Prefix::new(request.prefix, request.delimiter);
        let page = ListPage {
            marker,
            max_keys: request.max_keys,
        };
        let mut listing = self
            .backend
            .list_bucket(caller, bucket, &prefix, &page)
            .await?;

        if !request.fetch_owner {
            for object in &mut listing.contents {
                object.owner = None;
            }
        }

        debug!(
            bucket = %bucket,
            prefix = %prefix.prefix(),
            count = listing.contents.len(),
            truncated = listing.is_truncated,
            "list_objects_v2 completed"
        );

        Ok(ListBucketResultV2 {
            name: bucket.to_owned(),
            prefix: prefix.prefix().to_owned(),
            delimiter: prefix.delimiter().map(str::to_owned),
            max_keys: request.max_keys,
            is_truncated: listing.is_truncated,
            key_count: listing.contents.len() + listing.common_prefixes.len(),
            continuation_token: request.continuation_token,
            next_continuation_token: listing
                .next_marker
                .as_deref()
                .map(encode_continuation_token),
            start_after: request.start_after,
            contents: listing.contents,
            common_prefixes: listing.common_prefixes,
        })
    }

    /// One page of versions and delete markers.
    pub async fn handle_list_object_versions(
        &self,
        caller: &CallerIdentity,
        bucket: &str,
        request: ListVersionsRequest,
    ) -> GatewayResult<ListVersionsResult> {
        let prefix = Prefix::new(request.prefix, request.delimiter);
        let page = VersionPage {
            key_marker: request.key_marker.clone(),
            version_id_marker: request.version_id_marker.clone(),
            max_keys: request.max_keys,
        };
        let listing = self
            .backend
            .list_versions(caller, bucket, &prefix, &page)
            .await?;

        debug!(
            bucket = %bucket,
            count = listing.versions.len(),
            truncated = listing.is_truncated,
            "list_object_versions completed"
        );

        Ok(ListVersionsResult {
            name: bucket.to_owned(),
            prefix: prefix.prefix().to_owned(),
            delimiter: prefix.delimiter().map(str::to_owned),
            key_marker: request.key_marker.unwrap_or_default(),
            version_id_marker: request.version_id_marker.unwrap_or_default(),
            next_key_marker: listing.next_key_marker,
            next_version_id_marker: listing.next_version_id_marker,
            max_keys: request.max_keys,
            is_truncated: listing.is_truncated,
            versions: listing.versions,
            common_prefixes: listing.common_prefixes,
        })
    }
}
