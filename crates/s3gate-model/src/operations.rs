//! The set of protocol operations the router can resolve.

/// All supported operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum S3Operation {
    /// `GET /`.
    ListBuckets,
    /// `PUT /{bucket}`.
    CreateBucket,
    /// `DELETE /{bucket}`.
    DeleteBucket,
    /// `GET /{bucket}?location`.
    GetBucketLocation,
    /// `GET /{bucket}?versioning`.
    GetBucketVersioning,
    /// `PUT /{bucket}?versioning`.
    PutBucketVersioning,
    /// `GET /{bucket}`.
    ListObjects,
    /// `GET /{bucket}?list-type=2`.
    ListObjectsV2,
    /// `GET /{bucket}?versions`.
    ListObjectVersions,
    /// `POST /{bucket}?delete`.
    DeleteObjects,
    /// `POST /{bucket}` with a multipart/form-data body.
    PostObject,
    /// `GET /{bucket}?uploads`.
    ListMultipartUploads,
    /// `GET /{bucket}/{key}`.
    GetObject,
    /// `HEAD /{bucket}/{key}`.
    HeadObject,
    /// `PUT /{bucket}/{key}`.
    PutObject,
    /// `PUT /{bucket}/{key}` with `x-amz-copy-source`.
    CopyObject,
    /// `DELETE /{bucket}/{key}`.
    DeleteObject,
    /// `POST /{bucket}/{key}?uploads`.
    CreateMultipartUpload,
    /// `PUT /{bucket}/{key}?partNumber&uploadId`.
    UploadPart,
    /// `POST /{bucket}/{key}?uploadId`.
    CompleteMultipartUpload,
    /// `DELETE /{bucket}/{key}?uploadId`.
    AbortMultipartUpload,
    /// `GET /{bucket}/{key}?uploadId`.
    ListParts,
}

/// Admission class an operation is counted against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationClass {
    /// Bucket and upload listings.
    List,
    /// Object reads.
    Read,
    /// Object and part writes.
    Write,
    /// Everything else; only the global ceiling applies.
    Other,
}

impl OperationClass {
    /// Returns the class name used in logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Read => "read",
            Self::Write => "write",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for OperationClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl S3Operation {
    /// Returns the operation name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ListBuckets => "ListBuckets",
            Self::CreateBucket => "CreateBucket",
            Self::DeleteBucket => "DeleteBucket",
            Self::GetBucketLocation => "GetBucketLocation",
            Self::GetBucketVersioning => "GetBucketVersioning",
            Self::PutBucketVersioning => "PutBucketVersioning",
            Self::ListObjects => "ListObjects",
            Self::ListObjectsV2 => "ListObjectsV2",
            Self::ListObjectVersions => "ListObjectVersions",
            Self::DeleteObjects => "DeleteObjects",
            Self::PostObject => "PostObject",
            Self::ListMultipartUploads => "ListMultipartUploads",
            Self::GetObject => "GetObject",
            Self::HeadObject => "HeadObject",
            Self::PutObject => "PutObject",
            Self::CopyObject => "CopyObject",
            Self::DeleteObject => "DeleteObject",
            Self::CreateMultipartUpload => "CreateMultipartUpload",
            Self::UploadPart => "UploadPart",
            Self::CompleteMultipartUpload => "CompleteMultipartUpload",
            Self::AbortMultipartUpload => "AbortMultipartUpload",
            Self::ListParts => "ListParts",
        }
    }

    /// The admission class this operation is throttled under.
    #[must_use]
    pub fn class(&self) -> OperationClass {
        match self {
            Self::ListObjects
            | Self::ListObjectsV2
            | Self::ListObjectVersions
            | Self::ListMultipartUploads
            | Self::ListParts => OperationClass::List,
            Self::GetObject | Self::HeadObject => OperationClass::Read,
            Self::PutObject
            | Self::CopyObject
            | Self::PostObject
            | Self::UploadPart
            | Self::CompleteMultipartUpload => OperationClass::Write,
            Self::ListBuckets
            | Self::CreateBucket
            | Self::DeleteBucket
            | Self::GetBucketLocation
            | Self::GetBucketVersioning
            | Self::PutBucketVersioning
            | Self::DeleteObjects
            | Self::DeleteObject
            | Self::CreateMultipartUpload
            | Self::AbortMultipartUpload => OperationClass::Other,
        }
    }
}

impl std::fmt::Display for S3Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_classify_listings_as_list() {
        assert_eq!(S3Operation::ListObjectsV2.class(), OperationClass::List);
        assert_eq!(S3Operation::ListParts.class(), OperationClass::List);
    }

    #[test]
    fn test_should_classify_uploads_as_write() {
        assert_eq!(S3Operation::PutObject.class(), OperationClass::Write);
        assert_eq!(S3Operation::PostObject.class(), OperationClass::Write);
        assert_eq!(S3Operation::GetObject.class(), OperationClass::Read);
        assert_eq!(S3Operation::DeleteBucket.class(), OperationClass::Other);
    }

    #[test]
    fn test_should_display_operation_name() {
        assert_eq!(
            S3Operation::CompleteMultipartUpload.to_string(),
            "CompleteMultipartUpload"
        );
    }
}
