//! Request validation.
//!
//! Everything here runs before the backend is called, so a rejected
//! request has no side effects.

use std::net::Ipv4Addr;
use std::sync::LazyLock;

use base64::Engine;
use regex::Regex;
use s3gate_model::types::Metadata;

use crate::error::{GatewayError, GatewayResult};

/// Maximum object key length in bytes.
pub const MAX_KEY_BYTES: usize = 1024;

/// Highest part number a multipart upload accepts.
pub const MAX_UPLOAD_PART_NUMBER: u32 = 10_000;

/// Upper bound for `max-keys`, `max-parts` and `max-uploads`.
pub const MAX_LIST_LIMIT: usize = 1000;

/// Maximum number of keys in one batch delete.
pub const MAX_DELETE_KEYS: usize = 1000;

const MIN_BUCKET_NAME_LEN: usize = 3;
const MAX_BUCKET_NAME_LEN: usize = 63;

static BUCKET_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([a-z0-9-]*[a-z0-9])?$").expect("bucket label pattern is valid")
});

/// Validate a bucket name.
///
/// - 3 to 63 characters
/// - dot-separated labels of lowercase letters, digits and hyphens, each
///   starting and ending with a letter or digit
/// - not an IPv4 address
///
/// # Errors
///
/// [`GatewayError::InvalidBucketName`] naming the broken rule.
///
/// # Examples
///
/// ```
/// use s3gate_core::validation::validate_bucket_name;
///
/// assert!(validate_bucket_name("my-bucket.logs").is_ok());
/// assert!(validate_bucket_name("10.0.0.1").is_err());
/// ```
pub fn validate_bucket_name(name: &str) -> GatewayResult<()> {
    let invalid = |reason: &str| GatewayError::InvalidBucketName {
        name: name.to_owned(),
        reason: reason.to_owned(),
    };

    if !(MIN_BUCKET_NAME_LEN..=MAX_BUCKET_NAME_LEN).contains(&name.len()) {
        return Err(invalid("bucket name must be >= 3 characters and <= 63"));
    }
    if name.parse::<Ipv4Addr>().is_ok() {
        return Err(invalid(
            "bucket names must not be formatted as an IP address",
        ));
    }
    if !name.split('.').all(|label| BUCKET_LABEL.is_match(label)) {
        return Err(invalid(
            "labels must start and end with 'a-z, 0-9', and contain only 'a-z, 0-9, -' in between",
        ));
    }
    Ok(())
}

/// Validate an object key's length.
///
/// # Errors
///
/// [`GatewayError::KeyTooLong`] beyond [`MAX_KEY_BYTES`].
pub fn validate_object_key(key: &str) -> GatewayResult<()> {
    if key.len() > MAX_KEY_BYTES {
        return Err(GatewayError::KeyTooLong {
            key: key.to_owned(),
        });
    }
    Ok(())
}

/// Serialized size of metadata: the byte length of every name plus value.
#[must_use]
pub fn metadata_size(metadata: &Metadata) -> usize {
    metadata.iter().map(|(k, v)| k.len() + v.len()).sum()
}

/// Check metadata against `limit` bytes. A zero limit disables the check.
///
/// # Errors
///
/// [`GatewayError::MetadataTooLarge`] when over the limit.
pub fn validate_metadata(metadata: &Metadata, limit: usize) -> GatewayResult<()> {
    let size = metadata_size(metadata);
    if limit > 0 && size > limit {
        return Err(GatewayError::MetadataTooLarge { size, limit });
    }
    Ok(())
}

/// Parse an integer query parameter, clamping it into `[min, max]`.
/// Absent or empty values give `default`.
///
/// # Errors
///
/// [`GatewayError::InvalidArgument`] when the value is not an integer.
pub fn parse_clamped_int(
    value: Option<&str>,
    default: usize,
    min: usize,
    max: usize,
) -> GatewayResult<usize> {
    let Some(value) = value.filter(|v| !v.is_empty()) else {
        return Ok(default);
    };
    let parsed: i64 = value
        .parse()
        .map_err(|_| GatewayError::invalid_argument(format!("invalid integer: {value}")))?;
    let clamped = parsed.clamp(
        i64::try_from(min).unwrap_or(i64::MAX),
        i64::try_from(max).unwrap_or(i64::MAX),
    );
    Ok(usize::try_from(clamped).unwrap_or(min))
}

/// Parse the `partNumber` query parameter.
///
/// # Errors
///
/// [`GatewayError::InvalidArgument`] when absent, not numeric, or outside
/// `1..=10000`.
pub fn parse_part_number(value: Option<&str>) -> GatewayResult<u32> {
    let number = value
        .and_then(|v| v.parse::<u32>().ok())
        .ok_or_else(|| GatewayError::invalid_argument("partNumber must be an integer"))?;
    if !(1..=MAX_UPLOAD_PART_NUMBER).contains(&number) {
        return Err(GatewayError::invalid_argument(format!(
            "partNumber must be between 1 and {MAX_UPLOAD_PART_NUMBER}"
        )));
    }
    Ok(number)
}

/// Parse a `Content-Length` header.
///
/// # Errors
///
/// [`GatewayError::MissingContentLength`] when absent, and
/// [`GatewayError::InvalidArgument`] when not a non-negative integer.
pub fn parse_content_length(value: Option<&str>) -> GatewayResult<u64> {
    let value = value.ok_or(GatewayError::MissingContentLength)?;
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| GatewayError::invalid_argument(format!("invalid Content-Length: {value}")))
}

/// Decode a `Content-MD5` header into the raw digest.
///
/// # Errors
///
/// [`GatewayError::InvalidDigest`] when present but empty, not base64, or
/// not 16 bytes long.
pub fn decode_content_md5(value: Option<&str>) -> GatewayResult<Option<[u8; 16]>> {
    let Some(value) = value else {
        return Ok(None);
    };
    if value.is_empty() {
        return Err(GatewayError::InvalidDigest);
    }
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(value)
        .map_err(|_| GatewayError::InvalidDigest)?;
    let digest: [u8; 16] = bytes
        .try_into()
        .map_err(|_| GatewayError::InvalidDigest)?;
    Ok(Some(digest))
}
