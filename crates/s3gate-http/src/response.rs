//! Engine results to HTTP responses.
//!
//! [`IntoS3Response`] is implemented for every engine result that carries
//! headers (object reads and writes, deletes, copies, completions). Pure XML
//! documents go through [`xml_response`], and failures through
//! [`error_to_response`].

use bytes::Bytes;
use http::StatusCode;
use http::header::{HeaderName, HeaderValue};
use s3gate_core::backend::{ObjectContent, ObjectInfo};
use s3gate_core::ops::multipart::CompleteMultipartUploadResponse;
use s3gate_core::ops::object::{CopyObjectResponse, PutObjectResponse};
use s3gate_core::range::ObjectRange;
use s3gate_core::utils::{CONTENT_TYPE_KEY, format_http_date};
use s3gate_core::versioning::DeleteOutcome;
use s3gate_model::error::S3Error;
use s3gate_xml::{S3Serialize, to_xml};

use crate::body::S3ResponseBody;

const XML_CONTENT_TYPE: &str = "application/xml";
const DEFAULT_OBJECT_CONTENT_TYPE: &str = "binary/octet-stream";

/// Conversion of an engine result into a complete response.
pub trait IntoS3Response {
    /// Build the response.
    ///
    /// # Errors
    ///
    /// `InternalError` if the response cannot be assembled.
    fn into_s3_response(self) -> Result<http::Response<S3ResponseBody>, S3Error>;
}

fn set_optional_header(
    builder: http::response::Builder,
    name: &str,
    value: Option<&str>,
) -> http::response::Builder {
    let name = HeaderName::from_bytes(name.as_bytes()).ok();
    match (name, value.and_then(|v| HeaderValue::from_str(v).ok())) {
        (Some(name), Some(hv)) => builder.header(name, hv),
        _ => builder,
    }
}

fn insert_optional_header(
    response: &mut http::Response<S3ResponseBody>,
    name: &'static str,
    value: Option<&str>,
) {
    if let Some(hv) = value.and_then(|v| HeaderValue::from_str(v).ok()) {
        response.headers_mut().insert(name, hv);
    }
}

fn build_response(
    builder: http::response::Builder,
    body: S3ResponseBody,
) -> Result<http::Response<S3ResponseBody>, S3Error> {
    builder.body(body).map_err(|e| {
        tracing::error!(error = %e, "failed to build HTTP response");
        S3Error::internal_error()
    })
}

/// Render `value` as the XML document `root` with status 200.
///
/// # Errors
///
/// `InternalError` if serialization fails.
pub fn xml_response<T: S3Serialize>(
    root: &str,
    value: &T,
) -> Result<http::Response<S3ResponseBody>, S3Error> {
    let xml = to_xml(root, value).map_err(|e| {
        tracing::error!(error = %e, root, "failed to serialize response document");
        S3Error::internal_error()
    })?;
    let builder = http::Response::builder()
        .status(StatusCode::OK)
        .header(http::header::CONTENT_TYPE, XML_CONTENT_TYPE);
    build_response(builder, S3ResponseBody::from_bytes(xml))
}

/// A bodiless 200, optionally carrying a `Location`.
///
/// # Errors
///
/// `InternalError` if the response cannot be assembled.
pub fn empty_response(location: Option<&str>) -> Result<http::Response<S3ResponseBody>, S3Error> {
    let builder = set_optional_header(
        http::Response::builder().status(StatusCode::OK),
        "Location",
        location,
    );
    build_response(builder, S3ResponseBody::empty())
}

/// A bodiless 204.
///
/// # Errors
///
/// `InternalError` if the response cannot be assembled.
pub fn no_content_response() -> Result<http::Response<S3ResponseBody>, S3Error> {
    build_response(
        http::Response::builder().status(StatusCode::NO_CONTENT),
        S3ResponseBody::empty(),
    )
}

/// Headers shared by GET and HEAD on an object.
fn object_headers(info: &ObjectInfo, range: Option<&ObjectRange>) -> http::response::Builder {
    let (status, length) = match range {
        Some(r) => (StatusCode::PARTIAL_CONTENT, r.length),
        None => (StatusCode::OK, info.size),
    };
    let content_type = info
        .metadata
        .get(CONTENT_TYPE_KEY)
        .map_or(DEFAULT_OBJECT_CONTENT_TYPE, String::as_str);

    let mut builder = http::Response::builder()
        .status(status)
        .header(http::header::ACCEPT_RANGES, "bytes")
        .header(http::header::CONTENT_LENGTH, length)
        .header(http::header::LAST_MODIFIED, format_http_date(info.last_modified));
    builder = set_optional_header(builder, "ETag", Some(&info.etag));
    builder = set_optional_header(builder, "Content-Type", Some(content_type));
    if let Some(r) = range {
        builder = builder.header(http::header::CONTENT_RANGE, r.content_range(info.size));
    }
    for (name, value) in &info.metadata {
        if name.starts_with("x-amz-") {
            builder = set_optional_header(builder, name, Some(value));
        }
    }
    set_optional_header(builder, "x-amz-version-id", info.version_id.as_deref())
}

/// HEAD response: the object headers without a body.
///
/// # Errors
///
/// `InternalError` if the response cannot be assembled.
pub fn head_response(
    info: &ObjectInfo,
    range: Option<&ObjectRange>,
) -> Result<http::Response<S3ResponseBody>, S3Error> {
    build_response(object_headers(info, range), S3ResponseBody::empty())
}

impl IntoS3Response for ObjectContent {
    fn into_s3_response(self) -> Result<http::Response<S3ResponseBody>, S3Error> {
        let builder = object_headers(&self.info, self.range.as_ref());
        build_response(builder, S3ResponseBody::streaming(self.body))
    }
}

impl IntoS3Response for PutObjectResponse {
    fn into_s3_response(self) -> Result<http::Response<S3ResponseBody>, S3Error> {
        let mut builder = http::Response::builder().status(StatusCode::OK);
        builder = set_optional_header(builder, "ETag", Some(&self.etag));
        builder = set_optional_header(builder, "x-amz-version-id", self.version_id.as_deref());
        build_response(builder, S3ResponseBody::empty())
    }
}

impl IntoS3Response for CopyObjectResponse {
    fn into_s3_response(self) -> Result<http::Response<S3ResponseBody>, S3Error> {
        let mut response = xml_response("CopyObjectResult", &self.result)?;
        insert_optional_header(
            &mut response,
            "x-amz-copy-source-version-id",
            self.source_version_id.as_deref(),
        );
        insert_optional_header(&mut response, "x-amz-version-id", self.version_id.as_deref());
        Ok(response)
    }
}

impl IntoS3Response for CompleteMultipartUploadResponse {
    fn into_s3_response(self) -> Result<http::Response<S3ResponseBody>, S3Error> {
        let mut response = xml_response("CompleteMultipartUploadResult", &self.result)?;
        insert_optional_header(&mut response, "x-amz-version-id", self.version_id.as_deref());
        Ok(response)
    }
}

impl IntoS3Response for DeleteOutcome {
    fn into_s3_response(self) -> Result<http::Response<S3ResponseBody>, S3Error> {
        let mut builder = http::Response::builder().status(StatusCode::NO_CONTENT);
        if self.delete_marker {
            builder = builder.header("x-amz-delete-marker", "true");
        }
        builder = set_optional_header(builder, "x-amz-version-id", self.version_id.as_deref());
        build_response(builder, S3ResponseBody::empty())
    }
}

/// Render an error as an `<Error>` document.
///
/// Extra headers carried by the error (such as `x-amz-delete-marker` or
/// `Allow`) are copied onto the response. HEAD responses pass
/// `with_body = false` and get the status and headers only.
#[must_use]
pub fn error_to_response(
    err: &S3Error,
    request_id: &str,
    host_id: &str,
    with_body: bool,
) -> http::Response<S3ResponseBody> {
    let mut builder = http::Response::builder().status(err.status_code);
    for (name, value) in &err.headers {
        builder = set_optional_header(builder, name, Some(value));
    }

    let body = if with_body {
        builder = builder.header(http::header::CONTENT_TYPE, XML_CONTENT_TYPE);
        let xml = s3gate_xml::error_to_xml(
            err.code.as_str(),
            &err.message,
            err.resource.as_deref(),
            request_id,
            host_id,
        );
        S3ResponseBody::from_bytes(Bytes::from(xml))
    } else {
        S3ResponseBody::empty()
    };

    builder.body(body).unwrap_or_else(|_| {
        http::Response::builder()
            .status(StatusCode::INTERNAL_SERVER_ERROR)
            .body(S3ResponseBody::empty())
            .expect("static response should be valid")
    })
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use http_body_util::BodyExt;
    use s3gate_core::body::ObjectBody;
    use s3gate_model::error::S3ErrorCode;
    use s3gate_model::output::CopyObjectResult;
    use s3gate_model::types::Metadata;

    use super::*;

    fn info() -> ObjectInfo {
        let mut metadata = Metadata::new();
        metadata.insert("content-type".to_owned(), "text/plain".to_owned());
        metadata.insert("x-amz-meta-color".to_owned(), "blue".to_owned());
        metadata.insert("last-modified".to_owned(), "ignored".to_owned());
        ObjectInfo {
            key: "k".to_owned(),
            version_id: Some("0000000000000001".to_owned()),
            size: 11,
            etag: "\"5eb63bbbe01eeed093cb22bb8f5acdc3\"".to_owned(),
            last_modified: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
            metadata,
        }
    }

    fn header<'a>(resp: &'a http::Response<S3ResponseBody>, name: &str) -> Option<&'a str> {
        resp.headers().get(name).and_then(|v| v.to_str().ok())
    }

    #[tokio::test]
    async fn test_should_render_full_object_headers() {
        let content = ObjectContent {
            info: info(),
            range: None,
            body: ObjectBody::from_bytes(Bytes::from_static(b"hello world")),
        };
        let resp = content.into_s3_response().unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(header(&resp, "Accept-Ranges"), Some("bytes"));
        assert_eq!(header(&resp, "Content-Length"), Some("11"));
        assert_eq!(header(&resp, "Content-Type"), Some("text/plain"));
        assert_eq!(
            header(&resp, "Last-Modified"),
            Some("Tue, 02 Jan 2024 03:04:05 GMT")
        );
        assert_eq!(header(&resp, "x-amz-meta-color"), Some("blue"));
        assert_eq!(header(&resp, "x-amz-version-id"), Some("0000000000000001"));
        assert!(resp.headers().get("Content-Range").is_none());

        let body = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body.as_ref(), b"hello world");
    }

    #[test]
    fn test_should_render_partial_content() {
        let range = ObjectRange {
            start: 6,
            length: 5,
        };
        let resp = head_response(&info(), Some(&range)).unwrap();
        assert_eq!(resp.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(header(&resp, "Content-Length"), Some("5"));
        assert_eq!(header(&resp, "Content-Range"), Some("bytes 6-10/11"));
    }

    #[test]
    fn test_should_default_content_type() {
        let mut bare = info();
        bare.metadata.clear();
        let resp = head_response(&bare, None).unwrap();
        assert_eq!(header(&resp, "Content-Type"), Some("binary/octet-stream"));
    }

    #[test]
    fn test_should_render_delete_marker_outcome() {
        let resp = DeleteOutcome {
            delete_marker: true,
            version_id: Some("0000000000000002".to_owned()),
        }
        .into_s3_response()
        .unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        assert_eq!(header(&resp, "x-amz-delete-marker"), Some("true"));
        assert_eq!(header(&resp, "x-amz-version-id"), Some("0000000000000002"));

        let plain = DeleteOutcome::default().into_s3_response().unwrap();
        assert!(plain.headers().get("x-amz-delete-marker").is_none());
    }

    #[tokio::test]
    async fn test_should_render_copy_result_with_version_headers() {
        let resp = CopyObjectResponse {
            result: CopyObjectResult {
                etag: "\"abc\"".to_owned(),
                last_modified: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
            },
            source_version_id: Some("src-v".to_owned()),
            version_id: None,
        }
        .into_s3_response()
        .unwrap();
        assert_eq!(header(&resp, "Content-Type"), Some("application/xml"));
        assert_eq!(header(&resp, "x-amz-copy-source-version-id"), Some("src-v"));
        assert!(resp.headers().get("x-amz-version-id").is_none());

        let body = resp.into_body().collect().await.unwrap().to_bytes();
        let xml = String::from_utf8(body.to_vec()).unwrap();
        assert!(xml.contains("<CopyObjectResult"));
        assert!(xml.contains("<ETag>&quot;abc&quot;</ETag>") || xml.contains("<ETag>\"abc\"</ETag>"));
    }

    #[tokio::test]
    async fn test_should_render_error_document() {
        let err = S3Error::no_such_bucket("photos");
        let resp = error_to_response(&err, "000000000000002A", "host", true);
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(header(&resp, "Content-Type"), Some("application/xml"));

        let body = resp.into_body().collect().await.unwrap().to_bytes();
        let xml = String::from_utf8(body.to_vec()).unwrap();
        assert!(xml.contains("<Code>NoSuchBucket</Code>"));
        assert!(xml.contains("<RequestId>000000000000002A</RequestId>"));
    }

    #[test]
    fn test_should_omit_error_body_for_head() {
        let err = S3Error::new(S3ErrorCode::NoSuchKey)
            .with_header("x-amz-delete-marker", "true");
        let resp = error_to_response(&err, "1", "host", false);
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(header(&resp, "x-amz-delete-marker"), Some("true"));
        assert!(resp.headers().get("Content-Type").is_none());
        assert!(http_body::Body::is_end_stream(resp.body()));
    }
}
