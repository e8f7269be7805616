//! In-memory reference backend.
//!
//! Buckets live in a `BTreeMap` behind one `parking_lot::RwLock`, and each
//! bucket keeps its keys in a `BTreeMap` so listings can seek to the first
//! key after a marker and walk forward in order. Each key holds a
//! [`VersionChain`] of `Bytes` payloads.
//!
//! Lock guards are never held across an `.await`.

use std::collections::BTreeMap;
use std::ops::Bound;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use s3gate_model::types::{
    BucketInfo, ObjectSummary, Owner, VersionSummary, VersioningStatus,
};
use tracing::debug;

use super::{Backend, ObjectContent, ObjectInfo, PutObjectInput, PutObjectOutput};
use crate::body::ObjectBody;
use crate::error::{GatewayError, GatewayResult};
use crate::identity::CallerIdentity;
use crate::listing::{
    self, ListPage, ObjectListing, VersionListing, VersionPage,
};
use crate::prefix::Prefix;
use crate::range::{self, RangeRequest};
use crate::versioning::{DeleteOutcome, ObjectVersion, VersionChain, VersionIdGenerator};

type StoredVersion = ObjectVersion<Bytes>;

#[derive(Debug)]
struct BucketState {
    created: DateTime<Utc>,
    owner: String,
    versioning: VersioningStatus,
    objects: BTreeMap<String, VersionChain<Bytes>>,
}

impl BucketState {
    fn new(owner: &CallerIdentity) -> Self {
        Self {
            created: Utc::now(),
            owner: owner.as_str().to_owned(),
            versioning: VersioningStatus::None,
            objects: BTreeMap::new(),
        }
    }
}

/// A [`Backend`] that keeps everything in process memory.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    buckets: RwLock<BTreeMap<String, BucketState>>,
    version_ids: VersionIdGenerator,
}

impl MemoryBackend {
    /// An empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys with at least one version (markers included).
    #[must_use]
    pub fn key_count(&self, bucket: &str) -> usize {
        self.buckets
            .read()
            .get(bucket)
            .map_or(0, |state| state.objects.len())
    }

    fn with_bucket<T>(
        &self,
        bucket: &str,
        f: impl FnOnce(&BucketState) -> GatewayResult<T>,
    ) -> GatewayResult<T> {
        let buckets = self.buckets.read();
        let state = buckets.get(bucket).ok_or_else(|| no_such_bucket(bucket))?;
        f(state)
    }

    fn with_bucket_mut<T>(
        &self,
        bucket: &str,
        f: impl FnOnce(&mut BucketState) -> GatewayResult<T>,
    ) -> GatewayResult<T> {
        let mut buckets = self.buckets.write();
        let state = buckets
            .get_mut(bucket)
            .ok_or_else(|| no_such_bucket(bucket))?;
        f(state)
    }
}

fn no_such_bucket(bucket: &str) -> GatewayError {
    GatewayError::NoSuchBucket {
        bucket: bucket.to_owned(),
    }
}

fn object_info(key: &str, version: &StoredVersion) -> ObjectInfo {
    ObjectInfo {
        key: key.to_owned(),
        version_id: version.reported_version_id(),
        size: version.size,
        etag: version.etag.clone(),
        last_modified: version.last_modified,
        metadata: version.metadata.clone(),
    }
}

fn version_summaries(key: &str, chain: &VersionChain<Bytes>, owner: &str) -> Vec<VersionSummary> {
    chain
        .versions()
        .iter()
        .enumerate()
        .map(|(idx, v)| VersionSummary {
            key: key.to_owned(),
            version_id: v.version_id.clone(),
            is_latest: idx == 0,
            is_delete_marker: v.is_delete_marker,
            last_modified: v.last_modified,
            etag: v.etag.clone(),
            size: v.size,
            owner: Some(Owner::new(owner)),
        })
        .collect()
}

fn slice(data: &Bytes, start: u64, length: u64) -> GatewayResult<Bytes> {
    let start = usize::try_from(start).map_err(|_| GatewayError::InvalidRange)?;
    let length = usize::try_from(length).map_err(|_| GatewayError::InvalidRange)?;
    data.get(start..start + length)
        .map(|_| data.slice(start..start + length))
        .ok_or_else(|| {
            GatewayError::Internal(anyhow::anyhow!(
                "stored payload shorter than recorded size: {} < {}",
                data.len(),
                start + length
            ))
        })
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn list_buckets(&self, caller: &CallerIdentity) -> GatewayResult<Vec<BucketInfo>> {
        let buckets = self.buckets.read();
        Ok(buckets
            .iter()
            .filter(|(_, state)| state.owner == caller.as_str())
            .map(|(name, state)| BucketInfo {
                name: name.clone(),
                creation_date: state.created,
            })
            .collect())
    }

    async fn create_bucket(&self, caller: &CallerIdentity, bucket: &str) -> GatewayResult<()> {
        let mut buckets = self.buckets.write();
        if buckets.contains_key(bucket) {
            return Err(GatewayError::BucketAlreadyExists {
                bucket: bucket.to_owned(),
            });
        }
        buckets.insert(bucket.to_owned(), BucketState::new(caller));
        debug!(bucket = %bucket, owner = %caller, "bucket created");
        Ok(())
    }

    async fn bucket_exists(&self, _caller: &CallerIdentity, bucket: &str) -> GatewayResult<bool> {
        Ok(self.buckets.read().contains_key(bucket))
    }

    async fn delete_bucket(&self, _caller: &CallerIdentity, bucket: &str) -> GatewayResult<()> {
        let mut buckets = self.buckets.write();
        let state = buckets.get(bucket).ok_or_else(|| no_such_bucket(bucket))?;
        if !state.objects.is_empty() {
            return Err(GatewayError::BucketNotEmpty {
                bucket: bucket.to_owned(),
            });
        }
        buckets.remove(bucket);
        debug!(bucket = %bucket, "bucket deleted");
        Ok(())
    }

    async fn get_bucket_versioning(
        &self,
        _caller: &CallerIdentity,
        bucket: &str,
    ) -> GatewayResult<VersioningStatus> {
        self.with_bucket(bucket, |state| Ok(state.versioning))
    }

    async fn set_bucket_versioning(
        &self,
        _caller: &CallerIdentity,
        bucket: &str,
        status: VersioningStatus,
    ) -> GatewayResult<()> {
        self.with_bucket_mut(bucket, |state| {
            state.versioning = status;
            Ok(())
        })
    }

    async fn list_bucket(
        &self,
        _caller: &CallerIdentity,
        bucket: &str,
        prefix: &Prefix,
        page: &ListPage,
    ) -> GatewayResult<ObjectListing> {
        self.with_bucket(bucket, |state| {
            let start = page
                .marker
                .as_deref()
                .map_or(Bound::Unbounded, Bound::Excluded);
            let entries = state
                .objects
                .range::<str, _>((start, Bound::Unbounded))
                .map(|(key, chain)| (key.as_str(), chain));
            Ok(listing::paginate_objects(entries, prefix, page, |key, chain| {
                chain.current().map(|v| ObjectSummary {
                    key: key.to_owned(),
                    last_modified: v.last_modified,
                    etag: v.etag.clone(),
                    size: v.size,
                    owner: Some(Owner::new(state.owner.clone())),
                })
            }))
        })
    }

    async fn list_versions(
        &self,
        _caller: &CallerIdentity,
        bucket: &str,
        prefix: &Prefix,
        page: &VersionPage,
    ) -> GatewayResult<VersionListing> {
        self.with_bucket(bucket, |state| {
            let start = page
                .key_marker
                .as_deref()
                .map_or(Bound::Unbounded, Bound::Included);
            let entries = state
                .objects
                .range::<str, _>((start, Bound::Unbounded))
                .map(|(key, chain)| (key.as_str(), version_summaries(key, chain, &state.owner)));
            Ok(listing::paginate_versions(entries, prefix, page))
        })
    }

    async fn put_object(
        &self,
        _caller: &CallerIdentity,
        bucket: &str,
        key: &str,
        input: PutObjectInput,
    ) -> GatewayResult<PutObjectOutput> {
        if !self.buckets.read().contains_key(bucket) {
            return Err(no_such_bucket(bucket));
        }
        let data = input.body.collect().await.map_err(|e| {
            GatewayError::Internal(anyhow::Error::new(e).context("failed to read object body"))
        })?;
        if data.len() as u64 != input.size {
            return Err(GatewayError::IncompleteBody {
                expected: input.size,
                received: data.len() as u64,
            });
        }

        let version = ObjectVersion::new(input.size, input.etag, input.metadata, data);
        let last_modified = version.last_modified;
        let version_id = self.with_bucket_mut(bucket, |state| {
            let status = state.versioning;
            let chain = state.objects.entry(key.to_owned()).or_default();
            Ok(chain.put(status, version, &self.version_ids))
        })?;

        debug!(bucket = %bucket, key = %key, version_id = ?version_id, "object stored");
        Ok(PutObjectOutput {
            version_id,
            last_modified,
        })
    }

    async fn get_object(
        &self,
        _caller: &CallerIdentity,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
        range: Option<&RangeRequest>,
    ) -> GatewayResult<ObjectContent> {
        let (info, data) = self.with_bucket(bucket, |state| {
            let chain = state.objects.get(key).ok_or_else(|| match version_id {
                Some(id) => GatewayError::NoSuchVersion {
                    key: key.to_owned(),
                    version_id: id.to_owned(),
                },
                None => GatewayError::NoSuchKey {
                    key: key.to_owned(),
                },
            })?;
            let version = chain.resolve(key, version_id)?;
            Ok((object_info(key, version), version.payload.clone()))
        })?;

        let resolved = range::resolve(range, info.size)?;
        let body = match resolved {
            Some(r) => ObjectBody::from_bytes(slice(&data, r.start, r.length)?),
            None => ObjectBody::from_bytes(data),
        };
        Ok(ObjectContent {
            info,
            range: resolved,
            body,
        })
    }

    async fn head_object(
        &self,
        _caller: &CallerIdentity,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
    ) -> GatewayResult<ObjectInfo> {
        self.with_bucket(bucket, |state| {
            let Some(chain) = state.objects.get(key) else {
                return Err(match version_id {
                    Some(id) => GatewayError::NoSuchVersion {
                        key: key.to_owned(),
                        version_id: id.to_owned(),
                    },
                    None => GatewayError::NoSuchKey {
                        key: key.to_owned(),
                    },
                });
            };
            chain
                .resolve(key, version_id)
                .map(|version| object_info(key, version))
        })
    }

    async fn delete_object(
        &self,
        _caller: &CallerIdentity,
        bucket: &str,
        key: &str,
    ) -> GatewayResult<DeleteOutcome> {
        self.with_bucket_mut(bucket, |state| {
            let status = state.versioning;
            let Some(chain) = state.objects.get_mut(key) else {
                return Ok(DeleteOutcome::default());
            };
            let outcome = chain.delete_current(status, &self.version_ids);
            if chain.is_empty() {
                state.objects.remove(key);
            }
            Ok(outcome)
        })
    }

    async fn delete_object_version(
        &self,
        _caller: &CallerIdentity,
        bucket: &str,
        key: &str,
        version_id: &str,
    ) -> GatewayResult<DeleteOutcome> {
        self.with_bucket_mut(bucket, |state| {
            let Some(chain) = state.objects.get_mut(key) else {
                return Ok(DeleteOutcome {
                    delete_marker: false,
                    version_id: Some(version_id.to_owned()),
                });
            };
            let outcome = chain.delete_version(version_id);
            if chain.is_empty() {
                state.objects.remove(key);
            }
            Ok(outcome)
        })
    }
}
