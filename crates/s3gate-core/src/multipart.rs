//! Multipart upload coordinator.
//!
//! Tracks in-progress uploads and their staged parts. An upload moves
//! `Initiated -> Accumulating -> {Completed | Aborted}`; both terminal
//! transitions drop it from the registry, which in turn releases its staged
//! parts.
//!
//! The registry keeps two indexes under one lock: upload id to upload, and
//! `(bucket, key)` to upload ids in creation order. Part bodies are staged
//! without holding the lock.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use s3gate_model::types::{CompletedPart, Metadata, Owner, PartSummary, UploadSummary};
use tracing::debug;

use crate::body::ObjectBody;
use crate::checksums::{self, Md5Digest};
use crate::error::{GatewayError, GatewayResult};
use crate::identity::CallerIdentity;
use crate::listing::{self, GroupedPage};
use crate::prefix::Prefix;
use crate::staging::{StagedData, StagingArea};
use crate::validation::MAX_UPLOAD_PART_NUMBER;

/// A staged part of an upload.
#[derive(Debug, Clone)]
pub struct UploadPart {
    /// Part number, `1..=10000`.
    pub part_number: u32,
    /// Quoted hex MD5.
    pub etag: String,
    /// Raw MD5.
    pub md5: Md5Digest,
    /// Size in bytes.
    pub size: u64,
    /// Upload time.
    pub last_modified: DateTime<Utc>,
    /// Staged bytes.
    pub data: StagedData,
}

/// An in-progress upload.
#[derive(Debug, Clone)]
pub struct MultipartUpload {
    /// Upload id.
    pub upload_id: String,
    /// Target bucket.
    pub bucket: String,
    /// Target key.
    pub key: String,
    /// Metadata for the final object, captured at initiation.
    pub metadata: Metadata,
    /// Initiation time.
    pub initiated: DateTime<Utc>,
    /// Who started the upload.
    pub initiator: CallerIdentity,
    parts: BTreeMap<u32, UploadPart>,
}

impl MultipartUpload {
    /// Parts uploaded so far, by number.
    #[must_use]
    pub fn parts(&self) -> &BTreeMap<u32, UploadPart> {
        &self.parts
    }

    fn summary(&self) -> UploadSummary {
        UploadSummary {
            key: self.key.clone(),
            upload_id: self.upload_id.clone(),
            initiated: self.initiated,
            owner: Some(self.initiator.owner()),
        }
    }
}

/// One page of `ListParts`.
#[derive(Debug, Clone, Default)]
pub struct PartListing {
    /// Initiator of the upload.
    pub owner: Option<Owner>,
    /// Parts after the marker, by number.
    pub parts: Vec<PartSummary>,
    /// Whether more parts remain.
    pub is_truncated: bool,
    /// Last part number on the page, when truncated.
    pub next_part_number_marker: Option<u32>,
}

/// Everything needed to write the assembled object.
#[derive(Debug)]
pub struct CompletionPlan {
    /// Metadata captured at initiation.
    pub metadata: Metadata,
    /// `"<md5 of part md5s>-<n>"`.
    pub etag: String,
    /// Sum of the selected part sizes.
    pub size: u64,
    /// The selected parts, in order.
    pub body: ObjectBody,
}

#[derive(Debug)]
struct Registry {
    next_id: u64,
    uploads: HashMap<String, MultipartUpload>,
    by_key: BTreeMap<(String, String), Vec<String>>,
}

impl Registry {
    /// Look up an upload and check it targets `bucket`/`key`.
    fn find(&self, bucket: &str, key: &str, upload_id: &str) -> GatewayResult<&MultipartUpload> {
        self.uploads
            .get(upload_id)
            .filter(|u| u.bucket == bucket && u.key == key)
            .ok_or_else(|| no_such_upload(upload_id))
    }

    fn find_mut(
        &mut self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> GatewayResult<&mut MultipartUpload> {
        self.uploads
            .get_mut(upload_id)
            .filter(|u| u.bucket == bucket && u.key == key)
            .ok_or_else(|| no_such_upload(upload_id))
    }

    fn remove(&mut self, upload_id: &str) -> Option<MultipartUpload> {
        let upload = self.uploads.remove(upload_id)?;
        let index_key = (upload.bucket.clone(), upload.key.clone());
        if let Some(ids) = self.by_key.get_mut(&index_key) {
            ids.retain(|id| id != upload_id);
            if ids.is_empty() {
                self.by_key.remove(&index_key);
            }
        }
        Some(upload)
    }
}

fn no_such_upload(upload_id: &str) -> GatewayError {
    GatewayError::NoSuchUpload {
        upload_id: upload_id.to_owned(),
    }
}

/// Process-wide registry of in-progress multipart uploads.
#[derive(Debug)]
pub struct MultipartCoordinator {
    registry: Mutex<Registry>,
    staging: StagingArea,
}

impl MultipartCoordinator {
    /// Create a coordinator staging large parts through `staging`.
    ///
    /// Upload ids continue from the current Unix time in milliseconds, so a
    /// restarted process does not hand out ids it used before.
    #[must_use]
    pub fn new(staging: StagingArea) -> Self {
        let seed = u64::try_from(Utc::now().timestamp()).unwrap_or_default() * 1000;
        Self {
            registry: Mutex::new(Registry {
                next_id: seed,
                uploads: HashMap::new(),
                by_key: BTreeMap::new(),
            }),
            staging,
        }
    }

    /// Number of in-progress uploads.
    #[must_use]
    pub fn upload_count(&self) -> usize {
        self.registry.lock().uploads.len()
    }

    /// Start an upload and return its id.
    pub fn initiate(
        &self,
        bucket: &str,
        key: &str,
        metadata: Metadata,
        initiator: &CallerIdentity,
    ) -> String {
        let mut registry = self.registry.lock();
        registry.next_id += 1;
        let upload_id = registry.next_id.to_string();

        registry.uploads.insert(
            upload_id.clone(),
            MultipartUpload {
                upload_id: upload_id.clone(),
                bucket: bucket.to_owned(),
                key: key.to_owned(),
                metadata,
                initiated: Utc::now(),
                initiator: initiator.clone(),
                parts: BTreeMap::new(),
            },
        );
        registry
            .by_key
            .entry((bucket.to_owned(), key.to_owned()))
            .or_default()
            .push(upload_id.clone());
        drop(registry);

        debug!(bucket = %bucket, key = %key, upload_id = %upload_id, "multipart upload initiated");
        upload_id
    }

    /// A snapshot of one upload.
    ///
    /// # Errors
    ///
    /// [`GatewayError::NoSuchUpload`] when the id is unknown or targets
    /// another bucket or key.
    pub fn get(&self, bucket: &str, key: &str, upload_id: &str) -> GatewayResult<MultipartUpload> {
        self.registry.lock().find(bucket, key, upload_id).cloned()
    }

    /// Stage a part and store it, replacing any earlier part with the same
    /// number. Returns the part's ETag.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::InvalidArgument`] for part numbers outside `1..=10000`.
    /// - [`GatewayError::NoSuchUpload`] when the upload does not exist, before
    ///   or after staging.
    /// - Staging errors: `IncompleteBody`, `BadDigest`, `Internal`.
    #[allow(clippy::too_many_arguments)]
    pub async fn add_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: u32,
        body: ObjectBody,
        content_length: u64,
        content_md5: Option<Md5Digest>,
    ) -> GatewayResult<String> {
        if !(1..=MAX_UPLOAD_PART_NUMBER).contains(&part_number) {
            return Err(GatewayError::invalid_argument(format!(
                "partNumber must be between 1 and {MAX_UPLOAD_PART_NUMBER}"
            )));
        }
        self.registry.lock().find(bucket, key, upload_id)?;

        let staged = self.staging.stage(body, content_length, content_md5).await?;
        let etag = staged.etag();
        let part = UploadPart {
            part_number,
            etag: etag.clone(),
            md5: staged.md5,
            size: staged.size(),
            last_modified: Utc::now(),
            data: staged.data,
        };

        // The upload may have been completed or aborted while staging.
        self.registry
            .lock()
            .find_mut(bucket, key, upload_id)?
            .parts
            .insert(part_number, part);

        debug!(
            bucket = %bucket,
            key = %key,
            upload_id = %upload_id,
            part_number,
            etag = %etag,
            "part stored"
        );
        Ok(etag)
    }

    /// List parts numbered above `marker`.
    ///
    /// # Errors
    ///
    /// [`GatewayError::NoSuchUpload`] when the upload does not exist.
    pub fn list_parts(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        marker: u32,
        max_parts: usize,
    ) -> GatewayResult<PartListing> {
        let registry = self.registry.lock();
        let upload = registry.find(bucket, key, upload_id)?;

        let mut remaining = upload
            .parts
            .range((Bound::Excluded(marker), Bound::Unbounded))
            .map(|(_, part)| PartSummary {
                part_number: part.part_number,
                last_modified: part.last_modified,
                etag: part.etag.clone(),
                size: part.size,
            });
        let parts: Vec<PartSummary> = remaining.by_ref().take(max_parts).collect();
        let is_truncated = remaining.next().is_some();

        Ok(PartListing {
            owner: Some(upload.initiator.owner()),
            next_part_number_marker: if is_truncated {
                parts.last().map(|p| p.part_number)
            } else {
                None
            },
            parts,
            is_truncated,
        })
    }

    /// List the in-progress uploads of a bucket.
    ///
    /// Uploads are ordered by key, then by creation. `key_marker` alone
    /// resumes after that key; with `upload_id_marker` it resumes after that
    /// upload of the key.
    #[must_use]
    pub fn list_uploads(
        &self,
        bucket: &str,
        prefix: &Prefix,
        key_marker: Option<&str>,
        upload_id_marker: Option<&str>,
        max_uploads: usize,
    ) -> GroupedPage<UploadSummary> {
        let registry = self.registry.lock();
        let start = (bucket.to_owned(), key_marker.unwrap_or_default().to_owned());
        let entries = registry
            .by_key
            .range((Bound::Included(start), Bound::Unbounded))
            .take_while(|((b, _), _)| b == bucket)
            .map(|((_, key), ids)| {
                let uploads = ids
                    .iter()
                    .filter_map(|id| registry.uploads.get(id))
                    .map(MultipartUpload::summary)
                    .collect::<Vec<_>>();
                (key.as_str(), uploads)
            });
        listing::paginate_grouped(entries, prefix, key_marker, upload_id_marker, max_uploads)
    }

    /// Validate a completion request and collect the selected parts.
    ///
    /// The upload stays registered; call [`finish`](Self::finish) once the
    /// object has been written.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::NoSuchUpload`] when the upload does not exist.
    /// - [`GatewayError::InvalidPartOrder`] when part numbers are not
    ///   strictly increasing.
    /// - [`GatewayError::InvalidPart`] when no parts are given, a part was
    ///   never uploaded, or its ETag does not match.
    pub fn prepare_complete(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        requested: &[CompletedPart],
    ) -> GatewayResult<CompletionPlan> {
        let registry = self.registry.lock();
        let upload = registry.find(bucket, key, upload_id)?;

        if requested.is_empty() {
            return Err(GatewayError::InvalidPart {
                message: "you must specify at least one part".to_owned(),
            });
        }
        if !requested
            .windows(2)
            .all(|w| w[0].part_number < w[1].part_number)
        {
            return Err(GatewayError::InvalidPartOrder);
        }

        let mut digests = Vec::with_capacity(requested.len());
        let mut payloads = Vec::with_capacity(requested.len());
        let mut size = 0u64;
        for claimed in requested {
            let part = upload.parts.get(&claimed.part_number).ok_or_else(|| {
                GatewayError::InvalidPart {
                    message: format!("part {} was never uploaded", claimed.part_number),
                }
            })?;
            if checksums::strip_etag_quotes(&claimed.etag) != checksums::strip_etag_quotes(&part.etag)
            {
                return Err(GatewayError::InvalidPart {
                    message: format!(
                        "part {} has ETag {}, not {}",
                        part.part_number, part.etag, claimed.etag
                    ),
                });
            }
            digests.push(part.md5);
            payloads.push(part.data.clone());
            size += part.size;
        }

        Ok(CompletionPlan {
            metadata: upload.metadata.clone(),
            etag: checksums::compute_multipart_etag(&digests),
            size,
            body: ObjectBody::from_staged(payloads),
        })
    }

    /// Drop a completed upload.
    pub fn finish(&self, upload_id: &str) {
        if self.registry.lock().remove(upload_id).is_some() {
            debug!(upload_id = %upload_id, "multipart upload completed");
        }
    }

    /// Abort an upload, discarding its parts.
    ///
    /// # Errors
    ///
    /// [`GatewayError::NoSuchUpload`] when the upload does not exist.
    pub fn abort(&self, bucket: &str, key: &str, upload_id: &str) -> GatewayResult<()> {
        let mut registry = self.registry.lock();
        registry.find(bucket, key, upload_id)?;
        registry.remove(upload_id);
        drop(registry);
        debug!(bucket = %bucket, key = %key, upload_id = %upload_id, "multipart upload aborted");
        Ok(())
    }

    /// Abort every upload targeting `bucket`. Returns how many were dropped.
    pub fn abort_bucket(&self, bucket: &str) -> usize {
        let mut registry = self.registry.lock();
        let ids: Vec<String> = registry
            .by_key
            .range((bucket.to_owned(), String::new())..)
            .take_while(|((b, _), _)| b == bucket)
            .flat_map(|(_, ids)| ids.iter().cloned())
            .collect();
        for id in &ids {
            registry.remove(id);
        }
        drop(registry);

        if !ids.is_empty() {
            debug!(bucket = %bucket, count = ids.len(), "multipart uploads of bucket aborted");
        }
        ids.len()
    }
}
