//! MD5-based ETags.
//!
//! A single-part ETag is the quoted hex MD5 of the content. A multipart
//! ETag is the MD5 of the concatenated raw part digests, suffixed with the
//! part count: `"<hex>-<n>"`.

use md5::{Digest, Md5};

/// Raw MD5 digest.
pub type Md5Digest = [u8; 16];

/// Compute the raw MD5 digest of `data`.
#[must_use]
pub fn compute_md5(data: &[u8]) -> Md5Digest {
    finish(Md5::new_with_prefix(data))
}

/// Finalize a running hasher into a raw digest.
#[must_use]
pub fn finish(hasher: Md5) -> Md5Digest {
    let mut digest = [0u8; 16];
    digest.copy_from_slice(&hasher.finalize());
    digest
}

/// Quote a digest as an ETag.
///
/// ```
/// use s3gate_core::checksums::{compute_md5, format_etag};
///
/// assert_eq!(
///     format_etag(&compute_md5(b"")),
///     "\"d41d8cd98f00b204e9800998ecf8427e\""
/// );
/// ```
#[must_use]
pub fn format_etag(digest: &Md5Digest) -> String {
    format!("\"{}\"", hex::encode(digest))
}

/// Compute the quoted ETag of `data`.
#[must_use]
pub fn compute_etag(data: &[u8]) -> String {
    format_etag(&compute_md5(data))
}

/// Compute the ETag of an object assembled from parts with these digests.
#[must_use]
pub fn compute_multipart_etag(part_digests: &[Md5Digest]) -> String {
    let mut hasher = Md5::new();
    for digest in part_digests {
        hasher.update(digest);
    }
    format!(
        "\"{}-{}\"",
        hex::encode(hasher.finalize()),
        part_digests.len()
    )
}

/// Drop surrounding double quotes, if any.
#[must_use]
pub fn strip_etag_quotes(etag: &str) -> &str {
    etag.trim().trim_matches('"')
}
