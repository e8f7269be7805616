//! Request routing: path splitting and operation identification.
//!
//! The [`S3Router`] maps an HTTP request to an [`S3Operation`] by looking at,
//! in priority order:
//!
//! 1. an `uploadId` query parameter (operations on one multipart upload)
//! 2. an `uploads` query parameter (listing or starting multipart uploads)
//! 3. a key in the path (object operations; `x-amz-copy-source` turns a PUT
//!    into a copy)
//! 4. a bucket in the path (bucket operations, selected by sub-resource)
//! 5. the root path (`GET /` lists buckets)
//!
//! Only path-style addressing is supported: the first path segment is the
//! bucket and the remainder, embedded slashes included, is the key.

use http::Method;
use percent_encoding::percent_decode_str;
use s3gate_model::error::{S3Error, S3ErrorCode};
use s3gate_model::operations::S3Operation;

/// Methods accepted on at least one route, advertised in `Allow`.
const ALLOWED_METHODS: &str = "GET, HEAD, PUT, POST, DELETE";

/// Maps requests to operations.
#[derive(Debug, Clone, Copy, Default)]
pub struct S3Router;

/// The result of routing a request.
#[derive(Debug, Clone)]
pub struct RoutingContext {
    /// The bucket from the first path segment, if any.
    pub bucket: Option<String>,
    /// The rest of the path, if non-empty.
    pub key: Option<String>,
    /// The identified operation.
    pub operation: S3Operation,
    /// Decoded query parameters, in request order.
    pub query_params: Vec<(String, String)>,
}

impl RoutingContext {
    /// The bucket, or `InvalidURI` when the route requires one and it is absent.
    ///
    /// # Errors
    ///
    /// `InvalidURI` if the path carried no bucket.
    pub fn require_bucket(&self) -> Result<&str, S3Error> {
        self.bucket
            .as_deref()
            .ok_or_else(|| S3Error::with_message(S3ErrorCode::InvalidURI, "missing bucket"))
    }

    /// The key, or `InvalidURI` when the route requires one and it is absent.
    ///
    /// # Errors
    ///
    /// `InvalidURI` if the path carried no key.
    pub fn require_key(&self) -> Result<&str, S3Error> {
        self.key
            .as_deref()
            .ok_or_else(|| S3Error::with_message(S3ErrorCode::InvalidURI, "missing object key"))
    }

    /// The first value of query parameter `name`.
    #[must_use]
    pub fn query(&self, name: &str) -> Option<&str> {
        query_value(&self.query_params, name)
    }

    /// Whether query parameter `name` is present, with or without a value.
    #[must_use]
    pub fn has_query(&self, name: &str) -> bool {
        query_has_key(&self.query_params, name)
    }
}

impl S3Router {
    /// Create a router.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Resolve a request to its routing context.
    ///
    /// # Errors
    ///
    /// `MethodNotAllowed` (with an `Allow` header) when no route accepts the
    /// method for this path shape.
    pub fn resolve<B>(&self, req: &http::Request<B>) -> Result<RoutingContext, S3Error> {
        let uri = req.uri();
        let query_params = parse_query_params(uri.query().unwrap_or(""));
        let (bucket, key) = parse_path(uri.path());

        let operation = identify_operation(
            req.method(),
            bucket.as_deref(),
            key.as_deref(),
            &query_params,
            req.headers(),
        )?;

        Ok(RoutingContext {
            bucket,
            key,
            operation,
            query_params,
        })
    }
}

/// Split `/{bucket}/{key...}` into its parts.
fn parse_path(path: &str) -> (Option<String>, Option<String>) {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    if trimmed.is_empty() {
        return (None, None);
    }

    match trimmed.split_once('/') {
        Some((bucket, key)) => {
            let key = (!key.is_empty()).then(|| decode_uri_component(key));
            (Some(decode_uri_component(bucket)), key)
        }
        None => (Some(decode_uri_component(trimmed)), None),
    }
}

fn decode_uri_component(s: &str) -> String {
    percent_decode_str(s).decode_utf8_lossy().into_owned()
}

/// Parse a query string into decoded key-value pairs. `+` is a space.
fn parse_query_params(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|s| !s.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (
                decode_uri_component(&key.replace('+', " ")),
                decode_uri_component(&value.replace('+', " ")),
            )
        })
        .collect()
}

fn query_has_key(params: &[(String, String)], key: &str) -> bool {
    params.iter().any(|(k, _)| k == key)
}

fn query_value<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

fn method_not_allowed(method: &Method) -> S3Error {
    S3Error::method_not_allowed(method.as_str()).with_header("Allow", ALLOWED_METHODS)
}

fn identify_operation(
    method: &Method,
    bucket: Option<&str>,
    key: Option<&str>,
    params: &[(String, String)],
    headers: &http::HeaderMap,
) -> Result<S3Operation, S3Error> {
    if bucket.is_some() && query_has_key(params, "uploadId") {
        return identify_upload_operation(method);
    }
    if bucket.is_some() && query_has_key(params, "uploads") {
        return match (method, key.is_some()) {
            (&Method::GET, false) => Ok(S3Operation::ListMultipartUploads),
            (&Method::POST, true) => Ok(S3Operation::CreateMultipartUpload),
            _ => Err(method_not_allowed(method)),
        };
    }

    match (bucket, key) {
        (Some(_), Some(_)) => identify_object_operation(method, headers),
        (Some(_), None) => identify_bucket_operation(method, params),
        (None, _) if *method == Method::GET => Ok(S3Operation::ListBuckets),
        (None, _) => Err(method_not_allowed(method)),
    }
}

/// Operations addressing one upload by id.
fn identify_upload_operation(method: &Method) -> Result<S3Operation, S3Error> {
    match *method {
        Method::GET => Ok(S3Operation::ListParts),
        Method::PUT => Ok(S3Operation::UploadPart),
        Method::DELETE => Ok(S3Operation::AbortMultipartUpload),
        Method::POST => Ok(S3Operation::CompleteMultipartUpload),
        _ => Err(method_not_allowed(method)),
    }
}

fn identify_object_operation(
    method: &Method,
    headers: &http::HeaderMap,
) -> Result<S3Operation, S3Error> {
    match *method {
        Method::GET => Ok(S3Operation::GetObject),
        Method::HEAD => Ok(S3Operation::HeadObject),
        Method::PUT if headers.contains_key("x-amz-copy-source") => Ok(S3Operation::CopyObject),
        Method::PUT => Ok(S3Operation::PutObject),
        Method::DELETE => Ok(S3Operation::DeleteObject),
        _ => Err(method_not_allowed(method)),
    }
}

fn identify_bucket_operation(
    method: &Method,
    params: &[(String, String)],
) -> Result<S3Operation, S3Error> {
    match *method {
        Method::GET => Ok(identify_bucket_get(params)),
        Method::PUT if query_has_key(params, "versioning") => {
            Ok(S3Operation::PutBucketVersioning)
        }
        Method::PUT => Ok(S3Operation::CreateBucket),
        Method::DELETE => Ok(S3Operation::DeleteBucket),
        Method::POST if query_has_key(params, "delete") => Ok(S3Operation::DeleteObjects),
        Method::POST => Ok(S3Operation::PostObject),
        _ => Err(method_not_allowed(method)),
    }
}

fn identify_bucket_get(params: &[(String, String)]) -> S3Operation {
    if query_has_key(params, "location") {
        S3Operation::GetBucketLocation
    } else if query_has_key(params, "versioning") {
        S3Operation::GetBucketVersioning
    } else if query_has_key(params, "versions") {
        S3Operation::ListObjectVersions
    } else if query_value(params, "list-type") == Some("2") {
        S3Operation::ListObjectsV2
    } else {
        S3Operation::ListObjects
    }
}

#[cfg(test)]
mod tests {
    use http::Request;

    use super::*;

    fn request(method: Method, uri: &str) -> Request<()> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(())
            .expect("valid request")
    }

    fn route(method: Method, uri: &str) -> S3Operation {
        S3Router::new()
            .resolve(&request(method, uri))
            .expect("routable request")
            .operation
    }

    #[test]
    fn test_should_route_list_buckets() {
        let ctx = S3Router::new().resolve(&request(Method::GET, "/")).unwrap();
        assert_eq!(ctx.operation, S3Operation::ListBuckets);
        assert!(ctx.bucket.is_none());
        assert!(ctx.key.is_none());
    }

    #[test]
    fn test_should_reject_non_get_on_root() {
        let err = S3Router::new()
            .resolve(&request(Method::PUT, "/"))
            .unwrap_err();
        assert_eq!(err.code, S3ErrorCode::MethodNotAllowed);
        assert!(err.headers.iter().any(|(n, _)| n == "Allow"));
    }

    #[test]
    fn test_should_keep_embedded_slashes_in_key() {
        let ctx = S3Router::new()
            .resolve(&request(Method::GET, "/photos/2024/01/a%20b.jpg"))
            .unwrap();
        assert_eq!(ctx.bucket.as_deref(), Some("photos"));
        assert_eq!(ctx.key.as_deref(), Some("2024/01/a b.jpg"));
        assert_eq!(ctx.operation, S3Operation::GetObject);
    }

    #[test]
    fn test_should_treat_trailing_slash_as_bucket_route() {
        let ctx = S3Router::new()
            .resolve(&request(Method::GET, "/photos/"))
            .unwrap();
        assert_eq!(ctx.bucket.as_deref(), Some("photos"));
        assert!(ctx.key.is_none());
        assert_eq!(ctx.operation, S3Operation::ListObjects);
    }

    #[test]
    fn test_should_route_bucket_sub_resources() {
        assert_eq!(route(Method::GET, "/b?location"), S3Operation::GetBucketLocation);
        assert_eq!(
            route(Method::GET, "/b?versioning"),
            S3Operation::GetBucketVersioning
        );
        assert_eq!(route(Method::GET, "/b?versions"), S3Operation::ListObjectVersions);
        assert_eq!(route(Method::GET, "/b?list-type=2"), S3Operation::ListObjectsV2);
        assert_eq!(route(Method::GET, "/b?list-type=1"), S3Operation::ListObjects);
        assert_eq!(
            route(Method::PUT, "/b?versioning"),
            S3Operation::PutBucketVersioning
        );
        assert_eq!(route(Method::PUT, "/b"), S3Operation::CreateBucket);
        assert_eq!(route(Method::DELETE, "/b"), S3Operation::DeleteBucket);
        assert_eq!(route(Method::POST, "/b?delete"), S3Operation::DeleteObjects);
        assert_eq!(route(Method::POST, "/b"), S3Operation::PostObject);
    }

    #[test]
    fn test_should_reject_head_on_bucket() {
        let err = S3Router::new()
            .resolve(&request(Method::HEAD, "/b"))
            .unwrap_err();
        assert_eq!(err.code, S3ErrorCode::MethodNotAllowed);
    }

    #[test]
    fn test_should_route_object_methods() {
        assert_eq!(route(Method::HEAD, "/b/k"), S3Operation::HeadObject);
        assert_eq!(route(Method::PUT, "/b/k"), S3Operation::PutObject);
        assert_eq!(route(Method::DELETE, "/b/k"), S3Operation::DeleteObject);

        let err = S3Router::new()
            .resolve(&request(Method::POST, "/b/k"))
            .unwrap_err();
        assert_eq!(err.code, S3ErrorCode::MethodNotAllowed);
    }

    #[test]
    fn test_should_route_copy_by_header() {
        let req = Request::builder()
            .method(Method::PUT)
            .uri("/b/dst")
            .header("x-amz-copy-source", "/b/src")
            .body(())
            .unwrap();
        let ctx = S3Router::new().resolve(&req).unwrap();
        assert_eq!(ctx.operation, S3Operation::CopyObject);
    }

    #[test]
    fn test_should_prefer_upload_id_over_object_route() {
        assert_eq!(
            route(Method::PUT, "/b/k?partNumber=1&uploadId=u1"),
            S3Operation::UploadPart
        );
        assert_eq!(route(Method::GET, "/b/k?uploadId=u1"), S3Operation::ListParts);
        assert_eq!(
            route(Method::DELETE, "/b/k?uploadId=u1"),
            S3Operation::AbortMultipartUpload
        );
        assert_eq!(
            route(Method::POST, "/b/k?uploadId=u1"),
            S3Operation::CompleteMultipartUpload
        );
    }

    #[test]
    fn test_should_route_uploads_marker() {
        assert_eq!(route(Method::GET, "/b?uploads"), S3Operation::ListMultipartUploads);
        assert_eq!(
            route(Method::POST, "/b/k?uploads"),
            S3Operation::CreateMultipartUpload
        );
        let err = S3Router::new()
            .resolve(&request(Method::PUT, "/b/k?uploads"))
            .unwrap_err();
        assert_eq!(err.code, S3ErrorCode::MethodNotAllowed);
    }

    #[test]
    fn test_should_decode_query_values() {
        let ctx = S3Router::new()
            .resolve(&request(Method::GET, "/b?prefix=a%2Fb+c&delimiter=%2F&marker"))
            .unwrap();
        assert_eq!(ctx.query("prefix"), Some("a/b c"));
        assert_eq!(ctx.query("delimiter"), Some("/"));
        assert!(ctx.has_query("marker"));
        assert_eq!(ctx.query("marker"), Some(""));
        assert!(ctx.query("missing").is_none());
    }

    #[test]
    fn test_should_require_key_for_object_handlers() {
        let ctx = S3Router::new().resolve(&request(Method::GET, "/b")).unwrap();
        assert_eq!(ctx.require_bucket().unwrap(), "b");
        assert_eq!(ctx.require_key().unwrap_err().code, S3ErrorCode::InvalidURI);
    }
}
