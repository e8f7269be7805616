//! Engine-level error type.
//!
//! [`GatewayError`] is raised at the point a failure is detected and carries
//! the offending resource. `From<GatewayError> for S3Error` is the single
//! place where engine errors become wire errors; unclassified failures
//! collapse into `InternalError` with a generic message.
//!
//! ```
//! use s3gate_core::error::GatewayError;
//! use s3gate_model::{S3Error, S3ErrorCode};
//!
//! let err = GatewayError::NoSuchBucket {
//!     bucket: "photos".to_owned(),
//! };
//! let wire: S3Error = err.into();
//! assert_eq!(wire.code, S3ErrorCode::NoSuchBucket);
//! ```

use s3gate_model::{S3Error, S3ErrorCode};

/// Result alias used throughout the engine.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// A classified engine failure.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    // -----------------------------------------------------------------------
    // Bucket errors
    // -----------------------------------------------------------------------
    /// The bucket name is already taken.
    #[error("The requested bucket name is not available: {bucket}")]
    BucketAlreadyExists {
        /// Bucket name.
        bucket: String,
    },

    /// The bucket still holds objects.
    #[error("The bucket you tried to delete is not empty: {bucket}")]
    BucketNotEmpty {
        /// Bucket name.
        bucket: String,
    },

    /// The bucket does not exist.
    #[error("The specified bucket does not exist: {bucket}")]
    NoSuchBucket {
        /// Bucket name.
        bucket: String,
    },

    /// The bucket name failed validation.
    #[error("The specified bucket is not valid: {name}: {reason}")]
    InvalidBucketName {
        /// The rejected name.
        name: String,
        /// What rule it broke.
        reason: String,
    },

    // -----------------------------------------------------------------------
    // Object errors
    // -----------------------------------------------------------------------
    /// The key does not exist.
    #[error("The specified key does not exist: {key}")]
    NoSuchKey {
        /// Object key.
        key: String,
    },

    /// The version does not exist.
    #[error("The specified version does not exist: key={key}, version_id={version_id}")]
    NoSuchVersion {
        /// Object key.
        key: String,
        /// Requested version id.
        version_id: String,
    },

    /// The addressed version is a delete marker.
    ///
    /// When `current` is set the key is logically deleted (`NoSuchKey`);
    /// otherwise a specific marker version was requested (`MethodNotAllowed`).
    #[error("The specified object is a delete marker: key={key}, version_id={version_id}")]
    DeleteMarker {
        /// Object key.
        key: String,
        /// Version id of the marker.
        version_id: String,
        /// Whether the marker is the current version.
        current: bool,
    },

    /// The key exceeds the length limit.
    #[error("Your key is too long: {key}")]
    KeyTooLong {
        /// The rejected key.
        key: String,
    },

    /// User metadata exceeds the size limit.
    #[error("Your metadata headers are {size} bytes, exceeding the {limit} byte limit")]
    MetadataTooLarge {
        /// Measured size.
        size: usize,
        /// Configured limit.
        limit: usize,
    },

    /// The body is shorter or longer than `Content-Length`.
    #[error("You did not provide the number of bytes specified by the Content-Length HTTP header: expected {expected}, received {received}")]
    IncompleteBody {
        /// Declared length.
        expected: u64,
        /// Bytes actually read.
        received: u64,
    },

    /// `Content-Length` is missing or not usable.
    #[error("You must provide the Content-Length HTTP header")]
    MissingContentLength,

    /// `Content-MD5` is present but not a valid digest.
    #[error("The Content-MD5 you specified is not valid")]
    InvalidDigest,

    /// `Content-MD5` does not match the body.
    #[error("The Content-MD5 you specified did not match what we received")]
    BadDigest,

    /// The range cannot be satisfied.
    #[error("The requested range is not satisfiable")]
    InvalidRange,

    // -----------------------------------------------------------------------
    // Multipart errors
    // -----------------------------------------------------------------------
    /// The upload id is unknown or belongs to another key.
    #[error("The specified multipart upload does not exist: {upload_id}")]
    NoSuchUpload {
        /// Upload id.
        upload_id: String,
    },

    /// A referenced part is missing or its ETag does not match.
    #[error("One or more of the specified parts could not be found: {message}")]
    InvalidPart {
        /// Which part and why.
        message: String,
    },

    /// Completion parts are not strictly increasing.
    #[error("The list of parts was not in ascending order")]
    InvalidPartOrder,

    // -----------------------------------------------------------------------
    // Request shape errors
    // -----------------------------------------------------------------------
    /// The XML body could not be parsed.
    #[error("The XML you provided was not well-formed: {message}")]
    MalformedXml {
        /// Parser detail.
        message: String,
    },

    /// The form upload body could not be parsed.
    #[error("The body of your POST request is not well-formed multipart/form-data: {message}")]
    MalformedPostRequest {
        /// Parser detail.
        message: String,
    },

    /// The form upload did not carry exactly one key and one file.
    #[error("POST requires exactly one file upload per request")]
    IncorrectNumberOfFilesInPostRequest,

    /// A parameter is invalid.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// What was wrong.
        message: String,
    },

    /// The request uses an unsupported feature.
    #[error("Not implemented: {message}")]
    NotImplemented {
        /// What is unsupported.
        message: String,
    },

    /// The method does not apply to this resource.
    #[error("The specified method is not allowed against this resource")]
    MethodNotAllowed,

    /// The caller could not be identified.
    #[error("Access Denied")]
    AccessDenied,

    // -----------------------------------------------------------------------
    // Admission
    // -----------------------------------------------------------------------
    /// A fail-fast ceiling was exceeded.
    #[error("Please reduce your request rate: {class} requests in flight {count} > {limit}")]
    SlowDown {
        /// The throttled class (or `"global"`).
        class: &'static str,
        /// In-flight count after this request was counted.
        count: usize,
        /// Configured ceiling.
        limit: usize,
    },

    /// The bounded wait for an upload token expired.
    #[error("Timed out after {seconds}s waiting for an upload slot")]
    RequestTimeout {
        /// The configured wait.
        seconds: u64,
    },

    // -----------------------------------------------------------------------
    // Internal / catch-all
    // -----------------------------------------------------------------------
    /// Unclassified failure; its text never reaches the client.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl GatewayError {
    /// The wire error code this failure renders as.
    #[must_use]
    pub fn error_code(&self) -> S3ErrorCode {
        match self {
            Self::BucketAlreadyExists { .. } => S3ErrorCode::BucketAlreadyExists,
            Self::BucketNotEmpty { .. } => S3ErrorCode::BucketNotEmpty,
            Self::NoSuchBucket { .. } => S3ErrorCode::NoSuchBucket,
            Self::InvalidBucketName { .. } => S3ErrorCode::InvalidBucketName,
            Self::NoSuchKey { .. } => S3ErrorCode::NoSuchKey,
            Self::NoSuchVersion { .. } => S3ErrorCode::NoSuchVersion,
            Self::DeleteMarker { current: true, .. } => S3ErrorCode::NoSuchKey,
            Self::DeleteMarker { current: false, .. } | Self::MethodNotAllowed => {
                S3ErrorCode::MethodNotAllowed
            }
            Self::KeyTooLong { .. } => S3ErrorCode::KeyTooLongError,
            Self::MetadataTooLarge { .. } => S3ErrorCode::MetadataTooLarge,
            Self::IncompleteBody { .. } => S3ErrorCode::IncompleteBody,
            Self::MissingContentLength => S3ErrorCode::MissingContentLength,
            Self::InvalidDigest => S3ErrorCode::InvalidDigest,
            Self::BadDigest => S3ErrorCode::BadDigest,
            Self::InvalidRange => S3ErrorCode::InvalidRange,
            Self::NoSuchUpload { .. } => S3ErrorCode::NoSuchUpload,
            Self::InvalidPart { .. } => S3ErrorCode::InvalidPart,
            Self::InvalidPartOrder => S3ErrorCode::InvalidPartOrder,
            Self::MalformedXml { .. } => S3ErrorCode::MalformedXML,
            Self::MalformedPostRequest { .. } => S3ErrorCode::MalformedPOSTRequest,
            Self::IncorrectNumberOfFilesInPostRequest => {
                S3ErrorCode::IncorrectNumberOfFilesInPostRequest
            }
            Self::InvalidArgument { .. } => S3ErrorCode::InvalidArgument,
            Self::NotImplemented { .. } => S3ErrorCode::NotImplemented,
            Self::AccessDenied => S3ErrorCode::AccessDenied,
            Self::SlowDown { .. } => S3ErrorCode::SlowDown,
            Self::RequestTimeout { .. } => S3ErrorCode::RequestTimeout,
            Self::Internal(_) => S3ErrorCode::InternalError,
        }
    }

    /// Whether the client should back off and retry unchanged.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.error_code().is_retryable()
    }

    /// Shorthand for [`GatewayError::InvalidArgument`].
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Shorthand for [`GatewayError::MalformedXml`].
    #[must_use]
    pub fn malformed_xml(message: impl Into<String>) -> Self {
        Self::MalformedXml {
            message: message.into(),
        }
    }

    /// The resource to report in the error body, if the variant names one.
    fn resource(&self) -> Option<&str> {
        match self {
            Self::BucketAlreadyExists { bucket }
            | Self::BucketNotEmpty { bucket }
            | Self::NoSuchBucket { bucket } => Some(bucket),
            Self::InvalidBucketName { name, .. } => Some(name),
            Self::NoSuchKey { key }
            | Self::NoSuchVersion { key, .. }
            | Self::DeleteMarker { key, .. }
            | Self::KeyTooLong { key } => Some(key),
            Self::NoSuchUpload { upload_id } => Some(upload_id),
            _ => None,
        }
    }
}

impl From<GatewayError> for S3Error {
    fn from(err: GatewayError) -> Self {
        let code = err.error_code();

        if let GatewayError::Internal(ref source) = err {
            tracing::error!(error = ?source, "internal error");
            return S3Error::internal_error();
        }

        let mut wire = S3Error::with_message(code, err.to_string());
        if let Some(resource) = err.resource() {
            wire = wire.with_resource(resource);
        }
        if let GatewayError::DeleteMarker { ref version_id, .. } = err {
            wire = wire
                .with_header("x-amz-delete-marker", "true")
                .with_header("x-amz-version-id", version_id.clone());
        }
        if matches!(err, GatewayError::MethodNotAllowed) {
            wire = wire.with_header("Allow", "GET, HEAD, PUT, POST, DELETE");
        }
        wire
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_convert_no_such_bucket_with_resource() {
        let err = GatewayError::NoSuchBucket {
            bucket: "photos".to_owned(),
        };
        let wire = S3Error::from(err);
        assert_eq!(wire.code, S3ErrorCode::NoSuchBucket);
        assert_eq!(wire.status_code.as_u16(), 404);
        assert_eq!(wire.resource.as_deref(), Some("photos"));
        assert!(wire.message.contains("photos"));
    }

    #[test]
    fn test_should_hide_internal_error_text() {
        let err = GatewayError::Internal(anyhow::anyhow!("backend exploded: secret path /srv/x"));
        let wire = S3Error::from(err);
        assert_eq!(wire.code, S3ErrorCode::InternalError);
        assert!(!wire.message.contains("secret"));
        assert_eq!(
            wire.message,
            "We encountered an internal error. Please try again."
        );
    }

    #[test]
    fn test_should_render_current_delete_marker_as_no_such_key() {
        let err = GatewayError::DeleteMarker {
            key: "a.txt".to_owned(),
            version_id: "0000000000000002".to_owned(),
            current: true,
        };
        let wire = S3Error::from(err);
        assert_eq!(wire.code, S3ErrorCode::NoSuchKey);
        assert!(
            wire.headers
                .iter()
                .any(|(k, v)| k == "x-amz-delete-marker" && v == "true")
        );
    }

    #[test]
    fn test_should_render_versioned_delete_marker_as_method_not_allowed() {
        let err = GatewayError::DeleteMarker {
            key: "a.txt".to_owned(),
            version_id: "0000000000000002".to_owned(),
            current: false,
        };
        assert_eq!(err.error_code(), S3ErrorCode::MethodNotAllowed);
    }

    #[test]
    fn test_should_mark_admission_errors_retryable() {
        let shed = GatewayError::SlowDown {
            class: "list",
            count: 3,
            limit: 2,
        };
        assert!(shed.is_retryable());
        assert!(GatewayError::RequestTimeout { seconds: 60 }.is_retryable());
        assert!(!GatewayError::InvalidRange.is_retryable());
        assert!(!GatewayError::Internal(anyhow::anyhow!("boom")).is_retryable());
    }

    #[test]
    fn test_should_map_validation_errors() {
        assert_eq!(
            GatewayError::KeyTooLong { key: "k".into() }.error_code(),
            S3ErrorCode::KeyTooLongError
        );
        assert_eq!(
            GatewayError::IncompleteBody {
                expected: 10,
                received: 4
            }
            .error_code(),
            S3ErrorCode::IncompleteBody
        );
        assert_eq!(
            GatewayError::MalformedPostRequest {
                message: "no boundary".into()
            }
            .error_code(),
            S3ErrorCode::MalformedPOSTRequest
        );
    }
}
