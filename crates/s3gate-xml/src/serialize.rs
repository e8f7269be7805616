//! Rendering response documents as XML.
//!
//! Every document goes through [`to_xml`], which writes the declaration and a
//! namespaced root element; [`S3Serialize`] implementations only write the
//! children.

use std::io::{self, Write};

use chrono::{DateTime, Utc};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesText, Event};
use s3gate_model::output::{
    CompleteMultipartUploadResult, CopyObjectResult, DeleteResult, InitiateMultipartUploadResult,
    ListAllMyBucketsResult, ListBucketResult, ListBucketResultV2, ListMultipartUploadsResult,
    ListPartsResult, ListVersionsResult, LocationConstraint,
};
use s3gate_model::types::{
    BucketInfo, DeleteFailure, DeletedObject, ObjectSummary, Owner, PartSummary,
    STANDARD_STORAGE_CLASS, UploadSummary, VersionSummary, VersioningConfiguration,
};

use crate::error::XmlError;

/// The protocol XML namespace.
pub const S3_NAMESPACE: &str = "http://s3.amazonaws.com/doc/2006-03-01/";

/// Types that can be written as the children of an XML element.
///
/// Uses `io::Result` because `quick_xml::Writer` closures require it.
pub trait S3Serialize {
    /// Write this value as child elements into `writer`.
    ///
    /// # Errors
    ///
    /// Returns `io::Error` if writing to the underlying writer fails.
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()>;
}

/// Render `value` as a complete document rooted at `root_element`.
///
/// # Errors
///
/// Returns `XmlError` if serialization fails.
pub fn to_xml<T: S3Serialize>(root_element: &str, value: &T) -> Result<Vec<u8>, XmlError> {
    let mut buf = Vec::with_capacity(512);
    let mut writer = Writer::new(&mut buf);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    writer
        .create_element(root_element)
        .with_attribute(("xmlns", S3_NAMESPACE))
        .write_inner_content(|w| value.serialize_xml(w))?;

    Ok(buf)
}

/// Format a timestamp as ISO 8601 with milliseconds and a `Z` suffix.
#[must_use]
pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn write_text_element<W: Write>(writer: &mut Writer<W>, tag: &str, text: &str) -> io::Result<()> {
    writer
        .create_element(tag)
        .write_text_content(BytesText::new(text))?;
    Ok(())
}

fn write_optional_text<W: Write>(
    writer: &mut Writer<W>,
    tag: &str,
    value: Option<&str>,
) -> io::Result<()> {
    if let Some(v) = value {
        write_text_element(writer, tag, v)?;
    }
    Ok(())
}

fn write_bool<W: Write>(writer: &mut Writer<W>, tag: &str, value: bool) -> io::Result<()> {
    write_text_element(writer, tag, if value { "true" } else { "false" })
}

fn write_number<W: Write, N: ToString>(
    writer: &mut Writer<W>,
    tag: &str,
    value: N,
) -> io::Result<()> {
    write_text_element(writer, tag, &value.to_string())
}

fn write_timestamp<W: Write>(
    writer: &mut Writer<W>,
    tag: &str,
    value: &DateTime<Utc>,
) -> io::Result<()> {
    write_text_element(writer, tag, &format_timestamp(value))
}

fn write_owner<W: Write>(writer: &mut Writer<W>, tag: &str, owner: &Owner) -> io::Result<()> {
    writer.create_element(tag).write_inner_content(|w| {
        write_text_element(w, "ID", &owner.id)?;
        write_text_element(w, "DisplayName", &owner.display_name)?;
        Ok(())
    })?;
    Ok(())
}

fn write_common_prefixes<W: Write>(writer: &mut Writer<W>, prefixes: &[String]) -> io::Result<()> {
    for prefix in prefixes {
        writer
            .create_element("CommonPrefixes")
            .write_inner_content(|w| write_text_element(w, "Prefix", prefix))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Nested elements
// ---------------------------------------------------------------------------

impl S3Serialize for Owner {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_owner(writer, "Owner", self)
    }
}

impl S3Serialize for BucketInfo {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        writer.create_element("Bucket").write_inner_content(|w| {
            write_text_element(w, "Name", &self.name)?;
            write_timestamp(w, "CreationDate", &self.creation_date)?;
            Ok(())
        })?;
        Ok(())
    }
}

impl S3Serialize for ObjectSummary {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        writer.create_element("Contents").write_inner_content(|w| {
            write_text_element(w, "Key", &self.key)?;
            write_timestamp(w, "LastModified", &self.last_modified)?;
            write_text_element(w, "ETag", &self.etag)?;
            write_number(w, "Size", self.size)?;
            write_text_element(w, "StorageClass", STANDARD_STORAGE_CLASS)?;
            if let Some(ref owner) = self.owner {
                owner.serialize_xml(w)?;
            }
            Ok(())
        })?;
        Ok(())
    }
}

impl S3Serialize for VersionSummary {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        let tag = if self.is_delete_marker {
            "DeleteMarker"
        } else {
            "Version"
        };
        writer.create_element(tag).write_inner_content(|w| {
            write_text_element(w, "Key", &self.key)?;
            write_text_element(w, "VersionId", &self.version_id)?;
            write_bool(w, "IsLatest", self.is_latest)?;
            write_timestamp(w, "LastModified", &self.last_modified)?;
            if !self.is_delete_marker {
                write_text_element(w, "ETag", &self.etag)?;
                write_number(w, "Size", self.size)?;
                write_text_element(w, "StorageClass", STANDARD_STORAGE_CLASS)?;
            }
            if let Some(ref owner) = self.owner {
                owner.serialize_xml(w)?;
            }
            Ok(())
        })?;
        Ok(())
    }
}

impl S3Serialize for PartSummary {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        writer.create_element("Part").write_inner_content(|w| {
            write_number(w, "PartNumber", self.part_number)?;
            write_timestamp(w, "LastModified", &self.last_modified)?;
            write_text_element(w, "ETag", &self.etag)?;
            write_number(w, "Size", self.size)?;
            Ok(())
        })?;
        Ok(())
    }
}

impl S3Serialize for UploadSummary {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        writer.create_element("Upload").write_inner_content(|w| {
            write_text_element(w, "Key", &self.key)?;
            write_text_element(w, "UploadId", &self.upload_id)?;
            if let Some(ref owner) = self.owner {
                write_owner(w, "Initiator", owner)?;
                owner.serialize_xml(w)?;
            }
            write_text_element(w, "StorageClass", STANDARD_STORAGE_CLASS)?;
            write_timestamp(w, "Initiated", &self.initiated)?;
            Ok(())
        })?;
        Ok(())
    }
}

impl S3Serialize for DeletedObject {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        writer.create_element("Deleted").write_inner_content(|w| {
            write_text_element(w, "Key", &self.key)?;
            write_optional_text(w, "VersionId", self.version_id.as_deref())?;
            if self.delete_marker {
                write_bool(w, "DeleteMarker", true)?;
                write_optional_text(
                    w,
                    "DeleteMarkerVersionId",
                    self.delete_marker_version_id.as_deref(),
                )?;
            }
            Ok(())
        })?;
        Ok(())
    }
}

impl S3Serialize for DeleteFailure {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        writer.create_element("Error").write_inner_content(|w| {
            write_text_element(w, "Key", &self.key)?;
            write_text_element(w, "Code", &self.code)?;
            write_text_element(w, "Message", &self.message)?;
            Ok(())
        })?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

impl S3Serialize for ListAllMyBucketsResult {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        if let Some(ref owner) = self.owner {
            owner.serialize_xml(writer)?;
        }
        writer.create_element("Buckets").write_inner_content(|w| {
            for bucket in &self.buckets {
                bucket.serialize_xml(w)?;
            }
            Ok(())
        })?;
        Ok(())
    }
}

impl S3Serialize for ListBucketResult {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_text_element(writer, "Name", &self.name)?;
        write_text_element(writer, "Prefix", &self.prefix)?;
        write_text_element(writer, "Marker", &self.marker)?;
        write_optional_text(writer, "NextMarker", self.next_marker.as_deref())?;
        write_number(writer, "MaxKeys", self.max_keys)?;
        write_optional_text(writer, "Delimiter", self.delimiter.as_deref())?;
        write_bool(writer, "IsTruncated", self.is_truncated)?;
        for obj in &self.contents {
            obj.serialize_xml(writer)?;
        }
        write_common_prefixes(writer, &self.common_prefixes)
    }
}

impl S3Serialize for ListBucketResultV2 {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_text_element(writer, "Name", &self.name)?;
        write_text_element(writer, "Prefix", &self.prefix)?;
        write_number(writer, "KeyCount", self.key_count)?;
        write_number(writer, "MaxKeys", self.max_keys)?;
        write_optional_text(writer, "Delimiter", self.delimiter.as_deref())?;
        write_bool(writer, "IsTruncated", self.is_truncated)?;
        write_optional_text(
            writer,
            "ContinuationToken",
            self.continuation_token.as_deref(),
        )?;
        write_optional_text(
            writer,
            "NextContinuationToken",
            self.next_continuation_token.as_deref(),
        )?;
        write_optional_text(writer, "StartAfter", self.start_after.as_deref())?;
        for obj in &self.contents {
            obj.serialize_xml(writer)?;
        }
        write_common_prefixes(writer, &self.common_prefixes)
    }
}

impl S3Serialize for ListVersionsResult {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_text_element(writer, "Name", &self.name)?;
        write_text_element(writer, "Prefix", &self.prefix)?;
        write_text_element(writer, "KeyMarker", &self.key_marker)?;
        write_text_element(writer, "VersionIdMarker", &self.version_id_marker)?;
        write_optional_text(writer, "NextKeyMarker", self.next_key_marker.as_deref())?;
        write_optional_text(
            writer,
            "NextVersionIdMarker",
            self.next_version_id_marker.as_deref(),
        )?;
        write_number(writer, "MaxKeys", self.max_keys)?;
        write_optional_text(writer, "Delimiter", self.delimiter.as_deref())?;
        write_bool(writer, "IsTruncated", self.is_truncated)?;
        for version in &self.versions {
            version.serialize_xml(writer)?;
        }
        write_common_prefixes(writer, &self.common_prefixes)
    }
}

impl S3Serialize for LocationConstraint {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        if !self.location.is_empty() {
            writer.write_event(Event::Text(BytesText::new(&self.location)))?;
        }
        Ok(())
    }
}

impl S3Serialize for VersioningConfiguration {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        let status = self.status.as_str();
        if !status.is_empty() {
            write_text_element(writer, "Status", status)?;
        }
        Ok(())
    }
}

impl S3Serialize for InitiateMultipartUploadResult {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_text_element(writer, "Bucket", &self.bucket)?;
        write_text_element(writer, "Key", &self.key)?;
        write_text_element(writer, "UploadId", &self.upload_id)?;
        Ok(())
    }
}

impl S3Serialize for CompleteMultipartUploadResult {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_text_element(writer, "Location", &self.location)?;
        write_text_element(writer, "Bucket", &self.bucket)?;
        write_text_element(writer, "Key", &self.key)?;
        write_text_element(writer, "ETag", &self.etag)?;
        Ok(())
    }
}

impl S3Serialize for ListPartsResult {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_text_element(writer, "Bucket", &self.bucket)?;
        write_text_element(writer, "Key", &self.key)?;
        write_text_element(writer, "UploadId", &self.upload_id)?;
        if let Some(ref owner) = self.owner {
            write_owner(writer, "Initiator", owner)?;
            owner.serialize_xml(writer)?;
        }
        write_text_element(writer, "StorageClass", STANDARD_STORAGE_CLASS)?;
        write_number(writer, "PartNumberMarker", self.part_number_marker)?;
        if let Some(next) = self.next_part_number_marker {
            write_number(writer, "NextPartNumberMarker", next)?;
        }
        write_number(writer, "MaxParts", self.max_parts)?;
        write_bool(writer, "IsTruncated", self.is_truncated)?;
        for part in &self.parts {
            part.serialize_xml(writer)?;
        }
        Ok(())
    }
}

impl S3Serialize for ListMultipartUploadsResult {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_text_element(writer, "Bucket", &self.bucket)?;
        write_text_element(writer, "KeyMarker", &self.key_marker)?;
        write_text_element(writer, "UploadIdMarker", &self.upload_id_marker)?;
        write_optional_text(writer, "NextKeyMarker", self.next_key_marker.as_deref())?;
        write_optional_text(
            writer,
            "NextUploadIdMarker",
            self.next_upload_id_marker.as_deref(),
        )?;
        write_number(writer, "MaxUploads", self.max_uploads)?;
        write_optional_text(writer, "Delimiter", self.delimiter.as_deref())?;
        write_text_element(writer, "Prefix", &self.prefix)?;
        write_bool(writer, "IsTruncated", self.is_truncated)?;
        for upload in &self.uploads {
            upload.serialize_xml(writer)?;
        }
        write_common_prefixes(writer, &self.common_prefixes)
    }
}

impl S3Serialize for DeleteResult {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        for deleted in &self.deleted {
            deleted.serialize_xml(writer)?;
        }
        for failure in &self.errors {
            failure.serialize_xml(writer)?;
        }
        Ok(())
    }
}

impl S3Serialize for CopyObjectResult {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_timestamp(writer, "LastModified", &self.last_modified)?;
        write_text_element(writer, "ETag", &self.etag)?;
        Ok(())
    }
}
