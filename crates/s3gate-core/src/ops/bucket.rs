//! Bucket operation handlers.
//!
//! Implements `list_buckets`, `create_bucket`, `delete_bucket`,
//! `get_bucket_location`, and the versioning configuration pair.

use s3gate_model::output::{ListAllMyBucketsResult, LocationConstraint};
use s3gate_model::types::VersioningStatus;
use tracing::{debug, info};

use crate::backend::Backend;
use crate::error::{GatewayError, GatewayResult};
use crate::identity::CallerIdentity;
use crate::provider::S3Gateway;
use crate::validation::validate_bucket_name;
use crate::versioning;

impl<B: Backend> S3Gateway<B> {
    /// List the caller's buckets.
    pub async fn handle_list_buckets(
        &self,
        caller: &CallerIdentity,
    ) -> GatewayResult<ListAllMyBucketsResult> {
        let buckets = self.backend.list_buckets(caller).await?;
        debug!(caller = %caller, count = buckets.len(), "list_buckets completed");
        Ok(ListAllMyBucketsResult {
            owner: Some(caller.owner()),
            buckets,
        })
    }

    /// Create a bucket and return its `Location`.
    pub async fn handle_create_bucket(
        &self,
        caller: &CallerIdentity,
        bucket: &str,
    ) -> GatewayResult<String> {
        validate_bucket_name(bucket)?;
        self.backend.create_bucket(caller, bucket).await?;
        info!(bucket = %bucket, caller = %caller, "bucket created");
        Ok(format!("/{bucket}"))
    }

    /// Delete an empty bucket, aborting its in-progress multipart uploads.
    pub async fn handle_delete_bucket(
        &self,
        caller: &CallerIdentity,
        bucket: &str,
    ) -> GatewayResult<()> {
        self.backend.delete_bucket(caller, bucket).await?;
        let aborted = self.multipart.abort_bucket(bucket);
        info!(bucket = %bucket, caller = %caller, aborted_uploads = aborted, "bucket deleted");
        Ok(())
    }

    /// The bucket's region, which is always reported empty.
    pub async fn handle_get_bucket_location(
        &self,
        caller: &CallerIdentity,
        bucket: &str,
    ) -> GatewayResult<LocationConstraint> {
        self.ensure_bucket(caller, bucket).await?;
        Ok(LocationConstraint::default())
    }

    /// Current versioning status.
    pub async fn handle_get_bucket_versioning(
        &self,
        caller: &CallerIdentity,
        bucket: &str,
    ) -> GatewayResult<VersioningStatus> {
        self.backend.get_bucket_versioning(caller, bucket).await
    }

    /// Change the versioning status, following `None -> Enabled <-> Suspended`.
    pub async fn handle_put_bucket_versioning(
        &self,
        caller: &CallerIdentity,
        bucket: &str,
        requested: VersioningStatus,
    ) -> GatewayResult<()> {
        let current = self.backend.get_bucket_versioning(caller, bucket).await?;
        let next = versioning::transition(current, requested)?;
        if next != current {
            self.backend
                .set_bucket_versioning(caller, bucket, next)
                .await?;
        }
        info!(
            bucket = %bucket,
            from = current.as_str(),
            to = next.as_str(),
            "bucket versioning updated"
        );
        Ok(())
    }

    /// Fail with `NoSuchBucket` unless the bucket exists.
    pub(crate) async fn ensure_bucket(
        &self,
        caller: &CallerIdentity,
        bucket: &str,
    ) -> GatewayResult<()> {
        if self.backend.bucket_exists(caller, bucket).await? {
            Ok(())
        } else {
            Err(GatewayError::NoSuchBucket {
                bucket: bucket.to_owned(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use s3gate_model::types::Metadata;

    use super::*;
    use crate::backend::MemoryBackend;
    use crate::config::GatewayConfig;

    fn gateway() -> S3Gateway<MemoryBackend> {
        S3Gateway::new(MemoryBackend::new(), GatewayConfig::default())
    }

    #[tokio::test]
    async fn test_should_create_and_list_buckets() {
        let gw = gateway();
        let alice = CallerIdentity::new("alice");
        assert_eq!(
            gw.handle_create_bucket(&alice, "photos").await.unwrap(),
            "/photos"
        );
        gw.handle_create_bucket(&alice, "archive").await.unwrap();

        let listed = gw.handle_list_buckets(&alice).await.unwrap();
        let names: Vec<_> = listed.buckets.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, ["archive", "photos"]);
        assert_eq!(listed.owner.unwrap().id, "alice");
    }

    #[tokio::test]
    async fn test_should_reject_invalid_bucket_name_before_backend() {
        let gw = gateway();
        let alice = CallerIdentity::new("alice");
        for name in ["ab", "Upper", "192.168.1.1", "bad..dots", "-dash"] {
            let err = gw.handle_create_bucket(&alice, name).await.unwrap_err();
            assert!(
                matches!(err, GatewayError::InvalidBucketName { .. }),
                "{name}: {err:?}"
            );
        }
        assert!(gw.handle_list_buckets(&alice).await.unwrap().buckets.is_empty());
    }

    #[tokio::test]
    async fn test_should_drop_pending_uploads_with_bucket() {
        let gw = gateway();
        let alice = CallerIdentity::new("alice");
        gw.handle_create_bucket(&alice, "photos").await.unwrap();
        let upload = gw
            .handle_create_multipart_upload(&alice, "photos", "k", Metadata::new())
            .await
            .unwrap();

        gw.handle_delete_bucket(&alice, "photos").await.unwrap();
        assert_eq!(gw.multipart().upload_count(), 0);

        gw.handle_create_bucket(&alice, "photos").await.unwrap();
        let err = gw
            .handle_abort_multipart_upload(&alice, "photos", "k", &upload.upload_id)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::NoSuchUpload { .. }));
    }

    #[tokio::test]
    async fn test_should_report_empty_location() {
        let gw = gateway();
        let alice = CallerIdentity::new("alice");
        gw.handle_create_bucket(&alice, "photos").await.unwrap();
        let location = gw
            .handle_get_bucket_location(&alice, "photos")
            .await
            .unwrap();
        assert!(location.location.is_empty());

        let err = gw
            .handle_get_bucket_location(&alice, "missing")
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::NoSuchBucket { .. }));
    }

    #[tokio::test]
    async fn test_should_follow_versioning_state_machine() {
        let gw = gateway();
        let alice = CallerIdentity::new("alice");
        gw.handle_create_bucket(&alice, "photos").await.unwrap();

        let err = gw
            .handle_put_bucket_versioning(&alice, "photos", VersioningStatus::Suspended)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::InvalidArgument { .. }));

        gw.handle_put_bucket_versioning(&alice, "photos", VersioningStatus::Enabled)
            .await
            .unwrap();
        gw.handle_put_bucket_versioning(&alice, "photos", VersioningStatus::Suspended)
            .await
            .unwrap();
        assert_eq!(
            gw.handle_get_bucket_versioning(&alice, "photos")
                .await
                .unwrap(),
            VersioningStatus::Suspended
        );
    }
}
