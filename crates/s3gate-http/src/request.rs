//! Request-side helpers: header access, body adaptation, XML decoding.

use std::io;

use bytes::{Bytes, BytesMut};
use futures::{StreamExt, TryStreamExt};
use http_body_util::BodyStream;
use s3gate_core::body::ObjectBody;
use s3gate_core::validation::parse_content_length;
use s3gate_model::error::{S3Error, S3ErrorCode};
use s3gate_model::types::Metadata;
use s3gate_xml::{S3Deserialize, from_xml};

/// Largest XML document accepted in a request body.
pub const MAX_XML_BODY: usize = 4 * 1024 * 1024;

/// Largest browser form accepted in a request body.
pub const MAX_FORM_BODY: usize = 64 * 1024 * 1024;

/// Adapt any HTTP body into an [`ObjectBody`] stream, keeping data frames only.
pub fn incoming_body<B>(body: B, length: Option<u64>) -> ObjectBody
where
    B: http_body::Body<Data = Bytes> + Send + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let stream = BodyStream::new(body)
        .map_err(io::Error::other)
        .try_filter_map(|frame| async move { Ok(frame.into_data().ok()) });
    ObjectBody::from_stream(stream, length)
}

/// A header value as text. Non-UTF-8 values read as absent.
#[must_use]
pub fn header_str<'a>(headers: &'a http::HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// `Content-Length`, when sent.
///
/// # Errors
///
/// `InvalidArgument` when the header is not a non-negative integer.
pub fn content_length(headers: &http::HeaderMap) -> Result<Option<u64>, S3Error> {
    match header_str(headers, http::header::CONTENT_LENGTH.as_str()) {
        Some(value) => Ok(Some(parse_content_length(Some(value))?)),
        None => Ok(None),
    }
}

/// Object metadata from the request headers.
#[must_use]
pub fn header_metadata(headers: &http::HeaderMap) -> Metadata {
    s3gate_core::ops::object::request_metadata(
        headers
            .iter()
            .filter_map(|(name, value)| Some((name.as_str(), value.to_str().ok()?))),
    )
}

/// Read a whole body, failing once it grows past `limit` bytes.
///
/// # Errors
///
/// `IncompleteBody` when the client stream fails, and `InvalidRequest` when
/// the body exceeds `limit`.
pub async fn collect_body(mut body: ObjectBody, limit: usize) -> Result<Bytes, S3Error> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| {
            tracing::debug!(error = %e, "request body stream failed");
            S3Error::with_message(S3ErrorCode::IncompleteBody, "failed to read the request body")
        })?;
        if buf.len() + chunk.len() > limit {
            return Err(S3Error::with_message(
                S3ErrorCode::InvalidRequest,
                format!("request body exceeds {limit} bytes"),
            ));
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf.freeze())
}

/// Collect and decode an XML request document.
///
/// # Errors
///
/// `MalformedXML` when the body is empty or does not parse, plus any error
/// from [`collect_body`].
pub async fn read_xml<T: S3Deserialize>(body: ObjectBody) -> Result<T, S3Error> {
    let bytes = collect_body(body, MAX_XML_BODY).await?;
    from_xml(&bytes).map_err(|e| S3Error::malformed_xml(e.to_string()))
}

#[cfg(test)]
mod tests {
    use http_body_util::Full;
    use s3gate_model::input::DeleteRequest;

    use super::*;

    #[tokio::test]
    async fn test_should_adapt_http_body() {
        let body = incoming_body(Full::new(Bytes::from_static(b"payload")), Some(7));
        assert_eq!(body.length(), Some(7));
        assert_eq!(body.collect().await.unwrap().as_ref(), b"payload");
    }

    #[test]
    fn test_should_parse_content_length() {
        let mut headers = http::HeaderMap::new();
        assert_eq!(content_length(&headers).unwrap(), None);
        headers.insert("content-length", "42".parse().unwrap());
        assert_eq!(content_length(&headers).unwrap(), Some(42));
        headers.insert("content-length", "-1".parse().unwrap());
        assert_eq!(
            content_length(&headers).unwrap_err().code,
            S3ErrorCode::InvalidArgument
        );
    }

    #[test]
    fn test_should_collect_amz_metadata_from_headers() {
        let mut headers = http::HeaderMap::new();
        headers.insert("x-amz-meta-color", "blue".parse().unwrap());
        headers.insert("content-type", "text/plain".parse().unwrap());
        headers.insert("x-amz-date", "20240101T000000Z".parse().unwrap());
        headers.insert("user-agent", "test".parse().unwrap());
        let metadata = header_metadata(&headers);
        assert_eq!(metadata.get("x-amz-meta-color").map(String::as_str), Some("blue"));
        assert_eq!(metadata.get("content-type").map(String::as_str), Some("text/plain"));
        assert!(metadata.contains_key("last-modified"));
        assert!(!metadata.contains_key("x-amz-date"));
        assert!(!metadata.contains_key("user-agent"));
    }

    #[tokio::test]
    async fn test_should_enforce_body_limit() {
        let body = ObjectBody::from_bytes(Bytes::from(vec![0u8; 16]));
        let err = collect_body(body, 8).await.unwrap_err();
        assert_eq!(err.code, S3ErrorCode::InvalidRequest);
    }

    #[tokio::test]
    async fn test_should_reject_empty_xml_body() {
        let err = read_xml::<DeleteRequest>(ObjectBody::empty())
            .await
            .unwrap_err();
        assert_eq!(err.code, S3ErrorCode::MalformedXML);
    }
}
