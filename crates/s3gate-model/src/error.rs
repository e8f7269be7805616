//! The closed error taxonomy rendered on the wire.
//!
//! Every failure the gateway can report maps to exactly one [`S3ErrorCode`],
//! which in turn carries one HTTP status and one stable machine-readable code.
//! [`S3Error`] pairs a code with a message, an optional resource, the request
//! correlation id, and any extra response headers the error must carry.

use std::fmt;

/// Error codes the gateway emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum S3ErrorCode {
    /// AccessDenied error.
    AccessDenied,
    /// BadDigest error.
    BadDigest,
    /// BucketAlreadyExists error.
    BucketAlreadyExists,
    /// BucketNotEmpty error.
    BucketNotEmpty,
    /// IncompleteBody error.
    IncompleteBody,
    /// IncorrectNumberOfFilesInPostRequest error.
    IncorrectNumberOfFilesInPostRequest,
    /// InternalError error.
    #[default]
    InternalError,
    /// InvalidArgument error.
    InvalidArgument,
    /// InvalidBucketName error.
    InvalidBucketName,
    /// InvalidDigest error.
    InvalidDigest,
    /// InvalidPart error.
    InvalidPart,
    /// InvalidPartOrder error.
    InvalidPartOrder,
    /// InvalidRange error.
    InvalidRange,
    /// InvalidRequest error.
    InvalidRequest,
    /// InvalidURI error.
    InvalidURI,
    /// KeyTooLongError error.
    KeyTooLongError,
    /// MalformedPOSTRequest error.
    MalformedPOSTRequest,
    /// MalformedXML error.
    MalformedXML,
    /// MetadataTooLarge error.
    MetadataTooLarge,
    /// MethodNotAllowed error.
    MethodNotAllowed,
    /// MissingContentLength error.
    MissingContentLength,
    /// NoSuchBucket error.
    NoSuchBucket,
    /// NoSuchKey error.
    NoSuchKey,
    /// NoSuchUpload error.
    NoSuchUpload,
    /// NoSuchVersion error.
    NoSuchVersion,
    /// NotImplemented error.
    NotImplemented,
    /// RequestTimeout error (retryable).
    RequestTimeout,
    /// SlowDown error (retryable).
    SlowDown,
}

impl S3ErrorCode {
    /// Returns the error code as a string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccessDenied => "AccessDenied",
            Self::BadDigest => "BadDigest",
            Self::BucketAlreadyExists => "BucketAlreadyExists",
            Self::BucketNotEmpty => "BucketNotEmpty",
            Self::IncompleteBody => "IncompleteBody",
            Self::IncorrectNumberOfFilesInPostRequest => "IncorrectNumberOfFilesInPostRequest",
            Self::InternalError => "InternalError",
            Self::InvalidArgument => "InvalidArgument",
            Self::InvalidBucketName => "InvalidBucketName",
            Self::InvalidDigest => "InvalidDigest",
            Self::InvalidPart => "InvalidPart",
            Self::InvalidPartOrder => "InvalidPartOrder",
            Self::InvalidRange => "InvalidRange",
            Self::InvalidRequest => "InvalidRequest",
            Self::InvalidURI => "InvalidURI",
            Self::KeyTooLongError => "KeyTooLongError",
            Self::MalformedPOSTRequest => "MalformedPOSTRequest",
            Self::MalformedXML => "MalformedXML",
            Self::MetadataTooLarge => "MetadataTooLarge",
            Self::MethodNotAllowed => "MethodNotAllowed",
            Self::MissingContentLength => "MissingContentLength",
            Self::NoSuchBucket => "NoSuchBucket",
            Self::NoSuchKey => "NoSuchKey",
            Self::NoSuchUpload => "NoSuchUpload",
            Self::NoSuchVersion => "NoSuchVersion",
            Self::NotImplemented => "NotImplemented",
            Self::RequestTimeout => "RequestTimeout",
            Self::SlowDown => "SlowDown",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    #[allow(clippy::match_same_arms)]
    pub fn status_code(&self) -> http::StatusCode {
        match self {
            Self::BadDigest
            | Self::IncompleteBody
            | Self::IncorrectNumberOfFilesInPostRequest
            | Self::InvalidArgument
            | Self::InvalidBucketName
            | Self::InvalidDigest
            | Self::InvalidPart
            | Self::InvalidPartOrder
            | Self::InvalidRequest
            | Self::InvalidURI
            | Self::KeyTooLongError
            | Self::MalformedPOSTRequest
            | Self::MalformedXML
            | Self::MetadataTooLarge => http::StatusCode::BAD_REQUEST,
            Self::AccessDenied => http::StatusCode::FORBIDDEN,
            Self::NoSuchBucket
            | Self::NoSuchKey
            | Self::NoSuchUpload
            | Self::NoSuchVersion => http::StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => http::StatusCode::METHOD_NOT_ALLOWED,
            Self::BucketAlreadyExists | Self::BucketNotEmpty => http::StatusCode::CONFLICT,
            Self::MissingContentLength => http::StatusCode::LENGTH_REQUIRED,
            Self::InvalidRange => http::StatusCode::RANGE_NOT_SATISFIABLE,
            Self::InternalError => http::StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotImplemented => http::StatusCode::NOT_IMPLEMENTED,
            Self::RequestTimeout | Self::SlowDown => http::StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Returns the default message for this error.
    #[must_use]
    pub fn default_message(&self) -> &'static str {
        match self {
            Self::AccessDenied => "Access Denied",
            Self::BadDigest => "The Content-MD5 you specified did not match what we received",
            Self::BucketAlreadyExists => "The requested bucket name is not available",
            Self::BucketNotEmpty => "The bucket you tried to delete is not empty",
            Self::IncompleteBody => {
                "You did not provide the number of bytes specified by the Content-Length HTTP header"
            }
            Self::IncorrectNumberOfFilesInPostRequest => {
                "POST requires exactly one file upload per request"
            }
            Self::InternalError => "We encountered an internal error. Please try again.",
            Self::InvalidArgument => "Invalid Argument",
            Self::InvalidBucketName => "The specified bucket is not valid",
            Self::InvalidDigest => "The Content-MD5 you specified is not valid",
            Self::InvalidPart => "One or more of the specified parts could not be found",
            Self::InvalidPartOrder => "The list of parts was not in ascending order",
            Self::InvalidRange => "The requested range cannot be satisfied",
            Self::InvalidRequest => "Invalid Request",
            Self::InvalidURI => "Couldn't parse the specified URI",
            Self::KeyTooLongError => "Your key is too long",
            Self::MalformedPOSTRequest => {
                "The body of your POST request is not well-formed multipart/form-data"
            }
            Self::MalformedXML => "The XML you provided was not well-formed",
            Self::MetadataTooLarge => {
                "Your metadata headers exceed the maximum allowed metadata size"
            }
            Self::MethodNotAllowed => "The specified method is not allowed against this resource",
            Self::MissingContentLength => "You must provide the Content-Length HTTP header",
            Self::NoSuchBucket => "The specified bucket does not exist",
            Self::NoSuchKey => "The specified key does not exist",
            Self::NoSuchUpload => "The specified multipart upload does not exist",
            Self::NoSuchVersion => "The specified version does not exist",
            Self::NotImplemented => {
                "A header you provided implies functionality that is not implemented"
            }
            Self::RequestTimeout => {
                "Your socket connection to the server was not read from or written to within the timeout period"
            }
            Self::SlowDown => "Please reduce your request rate",
        }
    }

    /// Whether a client should back off and retry the same request.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::SlowDown | Self::RequestTimeout)
    }
}

impl fmt::Display for S3ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A renderable error response.
#[derive(Debug)]
pub struct S3Error {
    /// The error code.
    pub code: S3ErrorCode,
    /// A human-readable error message.
    pub message: String,
    /// The resource that caused the error.
    pub resource: Option<String>,
    /// The request correlation id.
    pub request_id: Option<String>,
    /// The HTTP status code.
    pub status_code: http::StatusCode,
    /// Extra headers emitted alongside the error (e.g. `x-amz-delete-marker`).
    pub headers: Vec<(String, String)>,
    /// The underlying source error, if any.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for S3Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S3Error({}): {}", self.code, self.message)
    }
}

impl std::error::Error for S3Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl From<S3ErrorCode> for S3Error {
    fn from(code: S3ErrorCode) -> Self {
        Self::new(code)
    }
}

impl S3Error {
    /// Create a new error carrying the code's default message.
    #[must_use]
    pub fn new(code: S3ErrorCode) -> Self {
        Self::with_message(code, code.default_message())
    }

    /// Create a new error with a custom message.
    #[must_use]
    pub fn with_message(code: S3ErrorCode, message: impl Into<String>) -> Self {
        Self {
            status_code: code.status_code(),
            message: message.into(),
            code,
            resource: None,
            request_id: None,
            headers: Vec::new(),
            source: None,
        }
    }

    /// Set the resource that caused this error.
    #[must_use]
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Set the request correlation id.
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Attach an extra response header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the source error.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Create a NoSuchBucket error.
    #[must_use]
    pub fn no_such_bucket(bucket: impl Into<String>) -> Self {
        Self::new(S3ErrorCode::NoSuchBucket).with_resource(bucket)
    }

    /// Create a NoSuchKey error.
    #[must_use]
    pub fn no_such_key(key: impl Into<String>) -> Self {
        Self::new(S3ErrorCode::NoSuchKey).with_resource(key)
    }

    /// Create a NoSuchUpload error.
    #[must_use]
    pub fn no_such_upload(upload_id: impl Into<String>) -> Self {
        Self::new(S3ErrorCode::NoSuchUpload).with_resource(upload_id)
    }

    /// Create a MethodNotAllowed error.
    #[must_use]
    pub fn method_not_allowed(method: &str) -> Self {
        Self::with_message(
            S3ErrorCode::MethodNotAllowed,
            format!("The specified method is not allowed against this resource: {method}"),
        )
    }

    /// Create a NotImplemented error.
    #[must_use]
    pub fn not_implemented(message: impl Into<String>) -> Self {
        Self::with_message(S3ErrorCode::NotImplemented, message)
    }

    /// Create an InternalError with the generic client-facing message.
    #[must_use]
    pub fn internal_error() -> Self {
        Self::new(S3ErrorCode::InternalError)
    }

    /// Create a MalformedXML error.
    #[must_use]
    pub fn malformed_xml(message: impl Into<String>) -> Self {
        Self::with_message(S3ErrorCode::MalformedXML, message)
    }

    /// Create an InvalidArgument error.
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::with_message(S3ErrorCode::InvalidArgument, message)
    }

    /// Create an AccessDenied error.
    #[must_use]
    pub fn access_denied(message: impl Into<String>) -> Self {
        Self::with_message(S3ErrorCode::AccessDenied, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_map_each_code_to_one_status() {
        assert_eq!(
            S3ErrorCode::BucketAlreadyExists.status_code(),
            http::StatusCode::CONFLICT
        );
        assert_eq!(
            S3ErrorCode::BucketNotEmpty.status_code(),
            http::StatusCode::CONFLICT
        );
        assert_eq!(
            S3ErrorCode::InvalidRange.status_code(),
            http::StatusCode::RANGE_NOT_SATISFIABLE
        );
        assert_eq!(
            S3ErrorCode::MissingContentLength.status_code(),
            http::StatusCode::LENGTH_REQUIRED
        );
        assert_eq!(
            S3ErrorCode::NotImplemented.status_code(),
            http::StatusCode::NOT_IMPLEMENTED
        );
        assert_eq!(
            S3ErrorCode::NoSuchVersion.status_code(),
            http::StatusCode::NOT_FOUND
        );
        assert_eq!(
            S3ErrorCode::SlowDown.status_code(),
            http::StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_should_render_stable_code_strings() {
        assert_eq!(S3ErrorCode::KeyTooLongError.as_str(), "KeyTooLongError");
        assert_eq!(S3ErrorCode::MalformedXML.to_string(), "MalformedXML");
        assert_eq!(S3ErrorCode::IncompleteBody.as_str(), "IncompleteBody");
    }

    #[test]
    fn test_should_flag_retryable_codes() {
        assert!(S3ErrorCode::SlowDown.is_retryable());
        assert!(S3ErrorCode::RequestTimeout.is_retryable());
        assert!(!S3ErrorCode::InvalidRange.is_retryable());
        assert!(!S3ErrorCode::InvalidPartOrder.is_retryable());
        assert!(!S3ErrorCode::InternalError.is_retryable());
    }

    #[test]
    fn test_should_build_error_with_resource_and_headers() {
        let err = S3Error::no_such_key("photos/cat.jpg")
            .with_request_id("0000000000000001")
            .with_header("x-amz-delete-marker", "true");
        assert_eq!(err.code, S3ErrorCode::NoSuchKey);
        assert_eq!(err.status_code, http::StatusCode::NOT_FOUND);
        assert_eq!(err.resource.as_deref(), Some("photos/cat.jpg"));
        assert_eq!(err.request_id.as_deref(), Some("0000000000000001"));
        assert_eq!(err.headers.len(), 1);
    }

    #[test]
    fn test_should_keep_generic_internal_message() {
        let err = S3Error::internal_error();
        assert_eq!(err.status_code, http::StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.message.starts_with("We encountered an internal error"));
    }
}
