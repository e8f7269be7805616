//! Byte-range requests.
//!
//! [`RangeRequest::parse_header`] reads a `Range` header; [`RangeRequest::resolve`]
//! turns the request into a concrete [`ObjectRange`] for a known object size.
//! Only a single range is supported.

use crate::error::{GatewayError, GatewayResult};

const BYTES_UNIT: &str = "bytes=";

/// A parsed `Range: bytes=...` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeRequest {
    /// `bytes=start-` or `bytes=start-end` (inclusive end).
    FromStart {
        /// First byte.
        start: u64,
        /// Last byte, inclusive; `None` reads to the end of the object.
        end: Option<u64>,
    },
    /// `bytes=-n`: the last `n` bytes.
    Suffix {
        /// Number of trailing bytes.
        length: u64,
    },
}

/// A resolved range, always within the object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectRange {
    /// Offset of the first byte.
    pub start: u64,
    /// Number of bytes.
    pub length: u64,
}

impl ObjectRange {
    /// Offset of the last byte, inclusive.
    #[must_use]
    pub fn end(&self) -> u64 {
        (self.start + self.length).saturating_sub(1)
    }

    /// `Content-Range` header value for an object of `size` bytes.
    #[must_use]
    pub fn content_range(&self, size: u64) -> String {
        format!("bytes {}-{}/{size}", self.start, self.end())
    }
}

impl RangeRequest {
    /// Parse a `Range` header value. An absent or empty header is `Ok(None)`.
    ///
    /// # Errors
    ///
    /// [`GatewayError::InvalidRange`] for malformed values and
    /// [`GatewayError::NotImplemented`] for multiple ranges.
    pub fn parse_header(value: Option<&str>) -> GatewayResult<Option<Self>> {
        let Some(value) = value.filter(|v| !v.is_empty()) else {
            return Ok(None);
        };

        let spec = value
            .strip_prefix(BYTES_UNIT)
            .ok_or(GatewayError::InvalidRange)?;
        if spec.contains(',') {
            return Err(GatewayError::NotImplemented {
                message: "multiple ranges not supported".to_owned(),
            });
        }

        let spec = spec.trim();
        let (start, end) = spec.split_once('-').ok_or(GatewayError::InvalidRange)?;
        let (start, end) = (start.trim(), end.trim());

        if start.is_empty() {
            let length = parse_offset(end)?;
            return Ok(Some(Self::Suffix { length }));
        }

        let start = parse_offset(start)?;
        let end = if end.is_empty() {
            None
        } else {
            let end = parse_offset(end)?;
            if start > end {
                return Err(GatewayError::InvalidRange);
            }
            Some(end)
        };
        Ok(Some(Self::FromStart { start, end }))
    }

    /// Resolve against an object of `size` bytes, clamping reads past the end.
    ///
    /// # Errors
    ///
    /// [`GatewayError::InvalidRange`] when the range starts at or past the
    /// end of the object, or a suffix is longer than the object.
    pub fn resolve(&self, size: u64) -> GatewayResult<ObjectRange> {
        let (start, length) = match *self {
            Self::FromStart { start, end: None } => {
                (start, size.checked_sub(start).ok_or(GatewayError::InvalidRange)?)
            }
            Self::FromStart {
                start,
                end: Some(end),
            } => (
                start,
                end.checked_sub(start)
                    .ok_or(GatewayError::InvalidRange)?
                    .saturating_add(1),
            ),
            Self::Suffix { length } => {
                let start = size.checked_sub(length).ok_or(GatewayError::InvalidRange)?;
                (start, size - start)
            }
        };

        if start >= size {
            return Err(GatewayError::InvalidRange);
        }

        Ok(ObjectRange {
            start,
            length: length.min(size - start),
        })
    }
}

/// Resolve an optional request; `None` means the whole object.
///
/// # Errors
///
/// See [`RangeRequest::resolve`].
pub fn resolve(request: Option<&RangeRequest>, size: u64) -> GatewayResult<Option<ObjectRange>> {
    request.map(|r| r.resolve(size)).transpose()
}

fn parse_offset(value: &str) -> GatewayResult<u64> {
    value.parse::<u64>().map_err(|_| GatewayError::InvalidRange)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(value: &str) -> RangeRequest {
        RangeRequest::parse_header(Some(value))
            .expect("parse")
            .expect("present")
    }

    #[test]
    fn test_should_resolve_open_ended_range() {
        let range = parse("bytes=0-").resolve(100).unwrap();
        assert_eq!(range, ObjectRange { start: 0, length: 100 });
    }

    #[test]
    fn test_should_resolve_suffix_range() {
        let range = parse("bytes=-10").resolve(100).unwrap();
        assert_eq!(range, ObjectRange { start: 90, length: 10 });
    }

    #[test]
    fn test_should_clamp_range_past_end() {
        let range = parse("bytes=95-200").resolve(100).unwrap();
        assert_eq!(range, ObjectRange { start: 95, length: 5 });
        assert_eq!(range.content_range(100), "bytes 95-99/100");
    }

    #[test]
    fn test_should_reject_range_starting_past_end() {
        let err = parse("bytes=100-105").resolve(100).unwrap_err();
        assert!(matches!(err, GatewayError::InvalidRange));
    }

    #[test]
    fn test_should_reject_suffix_longer_than_object() {
        assert!(parse("bytes=-101").resolve(100).is_err());
        assert!(parse("bytes=-0").resolve(100).is_err());
    }

    #[test]
    fn test_should_resolve_explicit_range() {
        let range = parse("bytes= 10 - 19").resolve(100).unwrap();
        assert_eq!(range, ObjectRange { start: 10, length: 10 });
        assert_eq!(range.end(), 19);
    }

    #[test]
    fn test_should_treat_missing_header_as_whole_object() {
        assert!(RangeRequest::parse_header(None).unwrap().is_none());
        assert!(RangeRequest::parse_header(Some("")).unwrap().is_none());
        assert!(resolve(None, 10).unwrap().is_none());
    }

    #[test]
    fn test_should_reject_malformed_headers() {
        for value in ["items=0-1", "bytes=", "bytes=abc", "bytes=5-2", "bytes=x-3", "bytes=-y"] {
            let err = RangeRequest::parse_header(Some(value)).unwrap_err();
            assert!(matches!(err, GatewayError::InvalidRange), "value {value}");
        }
    }

    #[test]
    fn test_should_reject_multiple_ranges_as_not_implemented() {
        let err = RangeRequest::parse_header(Some("bytes=0-1,4-5")).unwrap_err();
        assert!(matches!(err, GatewayError::NotImplemented { .. }));
    }
}
