//! Shared helpers for the operation handlers.
//!
//! Continuation-token encoding, copy-source parsing, metadata extraction,
//! and HTTP date formatting.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;
use chrono::{DateTime, Utc};
use s3gate_model::types::Metadata;

use crate::error::{GatewayError, GatewayResult};

/// Metadata key holding the write time.
pub const LAST_MODIFIED_KEY: &str = "last-modified";

/// Metadata key holding the content type.
pub const CONTENT_TYPE_KEY: &str = "content-type";

/// Request headers that describe the request rather than the object.
const TRANSIENT_HEADERS: &[&str] = &[
    "x-amz-copy-source",
    "x-amz-copy-source-version-id",
    "x-amz-content-sha256",
    "x-amz-date",
    "x-amz-security-token",
    "x-amz-decoded-content-length",
];

// ---------------------------------------------------------------------------
// Continuation tokens
// ---------------------------------------------------------------------------

/// Encode the last key of a page as a v2 continuation token.
///
/// ```
/// use s3gate_core::utils::{decode_continuation_token, encode_continuation_token};
///
/// let token = encode_continuation_token("photos/2024/a.jpg");
/// assert_eq!(decode_continuation_token(&token).unwrap(), "photos/2024/a.jpg");
/// ```
#[must_use]
pub fn encode_continuation_token(key: &str) -> String {
    URL_SAFE.encode(key.as_bytes())
}

/// Decode a v2 continuation token.
///
/// # Errors
///
/// [`GatewayError::InvalidArgument`] when the token is not URL-safe base64
/// of a UTF-8 string.
pub fn decode_continuation_token(token: &str) -> GatewayResult<String> {
    let bytes = URL_SAFE
        .decode(token)
        .map_err(|_| GatewayError::invalid_argument("The continuation token provided is incorrect"))?;
    String::from_utf8(bytes)
        .map_err(|_| GatewayError::invalid_argument("The continuation token provided is incorrect"))
}

// ---------------------------------------------------------------------------
// Copy source
// ---------------------------------------------------------------------------

/// The object a copy reads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopySource {
    /// Source bucket.
    pub bucket: String,
    /// Source key, percent-decoded.
    pub key: String,
    /// Source version, from `?versionId=`.
    pub version_id: Option<String>,
}

/// Parse an `x-amz-copy-source` header: `[/]bucket/key[?versionId=id]`.
///
/// # Errors
///
/// [`GatewayError::InvalidArgument`] when bucket or key is missing or the
/// key is not valid percent-encoded UTF-8.
pub fn parse_copy_source(source: &str) -> GatewayResult<CopySource> {
    let source = source.strip_prefix('/').unwrap_or(source);
    let (path, version_id) = match source.split_once('?') {
        Some((path, query)) => (
            path,
            query
                .split('&')
                .find_map(|param| param.strip_prefix("versionId="))
                .filter(|v| !v.is_empty())
                .map(str::to_owned),
        ),
        None => (source, None),
    };

    let (bucket, key) = path
        .split_once('/')
        .filter(|(b, k)| !b.is_empty() && !k.is_empty())
        .ok_or_else(|| GatewayError::invalid_argument("Copy Source must mention the source bucket and key: sourcebucket/sourcekey"))?;

    let key = percent_encoding::percent_decode_str(key)
        .decode_utf8()
        .map_err(|_| GatewayError::invalid_argument("Copy Source key is not valid UTF-8"))?
        .into_owned();

    Ok(CopySource {
        bucket: bucket.to_owned(),
        key,
        version_id,
    })
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

/// Collect object metadata from request headers (or form fields).
///
/// Keeps every `x-amz-*` entry except request-scoped ones, plus
/// `Content-Type`, and stamps `Last-Modified` with `now`. Names are
/// lowercased; the first value of a repeated name wins.
pub fn extract_metadata<'a, I>(headers: I, now: DateTime<Utc>) -> Metadata
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut metadata = Metadata::new();
    for (name, value) in headers {
        let name = name.to_ascii_lowercase();
        let keep = (name.starts_with("x-amz-") && !TRANSIENT_HEADERS.contains(&name.as_str()))
            || name == CONTENT_TYPE_KEY;
        if keep {
            metadata.entry(name).or_insert_with(|| value.to_owned());
        }
    }
    metadata.insert(LAST_MODIFIED_KEY.to_owned(), format_http_date(now));
    metadata
}

/// Fill `target` with source entries it does not already carry, except the ACL.
pub fn merge_copy_metadata(target: &mut Metadata, source: &Metadata) {
    for (name, value) in source {
        if name != "x-amz-acl" && !target.contains_key(name) {
            target.insert(name.clone(), value.clone());
        }
    }
}

/// Format a timestamp as an RFC 7231 HTTP date.
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use s3gate_core::utils::format_http_date;
///
/// let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
/// assert_eq!(format_http_date(at), "Tue, 02 Jan 2024 03:04:05 GMT");
/// ```
#[must_use]
pub fn format_http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_should_reject_garbage_continuation_token() {
        assert!(matches!(
            decode_continuation_token("%%%"),
            Err(GatewayError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_should_use_url_safe_alphabet() {
        // U+FBFF is EF AF BF in UTF-8, which is "76+/" in the standard alphabet.
        let token = encode_continuation_token("\u{fbff}");
        assert!(!token.contains('+') && !token.contains('/'));
    }

    #[test]
    fn test_should_parse_copy_source() {
        let parsed = parse_copy_source("/src/dir/my%20file.txt?versionId=0000000000000003").unwrap();
        assert_eq!(parsed.bucket, "src");
        assert_eq!(parsed.key, "dir/my file.txt");
        assert_eq!(parsed.version_id.as_deref(), Some("0000000000000003"));

        let parsed = parse_copy_source("src/key").unwrap();
        assert!(parsed.version_id.is_none());

        for bad in ["", "/", "bucket", "bucket/", "/key"] {
            assert!(parse_copy_source(bad).is_err(), "expected invalid: {bad}");
        }
    }

    #[test]
    fn test_should_extract_metadata_from_headers() {
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let headers = [
            ("X-Amz-Meta-Color", "blue"),
            ("Content-Type", "text/plain"),
            ("x-amz-date", "20240102T030405Z"),
            ("Authorization", "secret"),
            ("Content-Length", "4"),
        ];
        let metadata = extract_metadata(headers, at);
        assert_eq!(metadata.get("x-amz-meta-color").map(String::as_str), Some("blue"));
        assert_eq!(metadata.get(CONTENT_TYPE_KEY).map(String::as_str), Some("text/plain"));
        assert_eq!(
            metadata.get(LAST_MODIFIED_KEY).map(String::as_str),
            Some("Tue, 02 Jan 2024 03:04:05 GMT")
        );
        assert_eq!(metadata.len(), 3);
    }

    #[test]
    fn test_should_merge_copy_metadata_without_acl() {
        let mut target = Metadata::new();
        target.insert("x-amz-meta-a".to_owned(), "request".to_owned());
        let mut source = Metadata::new();
        source.insert("x-amz-meta-a".to_owned(), "source".to_owned());
        source.insert("x-amz-meta-b".to_owned(), "source".to_owned());
        source.insert("x-amz-acl".to_owned(), "public-read".to_owned());

        merge_copy_metadata(&mut target, &source);
        assert_eq!(target["x-amz-meta-a"], "request");
        assert_eq!(target["x-amz-meta-b"], "source");
        assert!(!target.contains_key("x-amz-acl"));
    }
}
