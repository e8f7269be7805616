//! Parsing XML request bodies.
//!
//! [`from_xml`] skips the declaration, consumes the root start tag and hands the
//! reader to the type's [`S3Deserialize`] implementation, which reads children
//! until the matching end tag.

use quick_xml::Reader;
use quick_xml::events::Event;
use s3gate_model::input::{CompleteMultipartUploadRequest, DeleteRequest};
use s3gate_model::types::{
    CompletedPart, ObjectIdentifier, VersioningConfiguration, VersioningStatus,
};

use crate::error::XmlError;

/// Types that can be parsed from the children of an XML element.
pub trait S3Deserialize: Sized {
    /// Parse an instance from `reader`.
    ///
    /// The reader is positioned just after the opening tag of this element;
    /// the implementation returns once the matching end tag is consumed.
    ///
    /// # Errors
    ///
    /// Returns `XmlError` if the XML is malformed or required fields are missing.
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError>;
}

/// Parse a whole document into `T`.
///
/// # Errors
///
/// Returns `XmlError` if the XML is malformed or deserialization fails.
pub fn from_xml<T: S3Deserialize>(xml: &[u8]) -> Result<T, XmlError> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event()? {
            Event::Start(_) => return T::deserialize_xml(&mut reader),
            Event::Eof => return Err(XmlError::MissingElement("root element".to_owned())),
            _ => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Read the text of the current element and consume its end tag.
fn read_text_content(reader: &mut Reader<&[u8]>) -> Result<String, XmlError> {
    let mut text = String::new();
    loop {
        match reader.read_event()? {
            Event::Text(e) => {
                let decoded = e
                    .decode()
                    .map_err(|err| XmlError::ParseError(err.to_string()))?;
                let unescaped = quick_xml::escape::unescape(&decoded)
                    .map_err(|err| XmlError::ParseError(err.to_string()))?;
                text.push_str(&unescaped);
            }
            Event::GeneralRef(r) => {
                if let Some(ch) = r.resolve_char_ref()? {
                    text.push(ch);
                } else {
                    let name = r
                        .decode()
                        .map_err(|err| XmlError::ParseError(err.to_string()))?;
                    let resolved = quick_xml::escape::resolve_predefined_entity(&name)
                        .ok_or_else(|| XmlError::ParseError(format!("unknown entity: {name}")))?;
                    text.push_str(resolved);
                }
            }
            Event::End(_) => return Ok(text),
            Event::Eof => {
                return Err(XmlError::UnexpectedElement(
                    "unexpected EOF while reading text content".to_owned(),
                ));
            }
            _ => {}
        }
    }
}

/// Skip an element and everything under it.
fn skip_element(reader: &mut Reader<&[u8]>) -> Result<(), XmlError> {
    let mut depth: u32 = 1;
    loop {
        match reader.read_event()? {
            Event::Start(_) => depth += 1,
            Event::End(_) => {
                depth -= 1;
                if depth == 0 {
                    return Ok(());
                }
            }
            Event::Eof => {
                return Err(XmlError::UnexpectedElement(
                    "unexpected EOF while skipping element".to_owned(),
                ));
            }
            _ => {}
        }
    }
}

fn parse_bool(s: &str) -> Result<bool, XmlError> {
    match s {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(XmlError::ParseError(format!("invalid boolean: {s}"))),
    }
}

fn tag_name(name: &quick_xml::name::QName<'_>) -> Result<String, XmlError> {
    std::str::from_utf8(name.as_ref())
        .map(ToOwned::to_owned)
        .map_err(|e| XmlError::ParseError(e.to_string()))
}

// ---------------------------------------------------------------------------
// Implementations
// ---------------------------------------------------------------------------

impl S3Deserialize for ObjectIdentifier {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut key = None;
        let mut version_id = None;

        loop {
            match reader.read_event()? {
                Event::Start(e) => match tag_name(&e.name())?.as_str() {
                    "Key" => key = Some(read_text_content(reader)?),
                    "VersionId" => {
                        version_id = Some(read_text_content(reader)?).filter(|v| !v.is_empty());
                    }
                    _ => skip_element(reader)?,
                },
                Event::End(_) => break,
                Event::Eof => {
                    return Err(XmlError::UnexpectedElement(
                        "unexpected EOF in Object".to_owned(),
                    ));
                }
                _ => {}
            }
        }

        Ok(ObjectIdentifier {
            key: key.ok_or_else(|| XmlError::MissingElement("Key".to_owned()))?,
            version_id,
        })
    }
}

impl S3Deserialize for DeleteRequest {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut objects = Vec::new();
        let mut quiet = false;

        loop {
            match reader.read_event()? {
                Event::Start(e) => match tag_name(&e.name())?.as_str() {
                    "Object" => objects.push(ObjectIdentifier::deserialize_xml(reader)?),
                    "Quiet" => {
                        let text = read_text_content(reader)?;
                        quiet = parse_bool(text.trim())?;
                    }
                    _ => skip_element(reader)?,
                },
                Event::End(_) => break,
                Event::Eof => {
                    return Err(XmlError::UnexpectedElement(
                        "unexpected EOF in Delete".to_owned(),
                    ));
                }
                _ => {}
            }
        }

        Ok(DeleteRequest { objects, quiet })
    }
}

impl S3Deserialize for CompletedPart {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut part_number = None;
        let mut etag = None;

        loop {
            match reader.read_event()? {
                Event::Start(e) => match tag_name(&e.name())?.as_str() {
                    "PartNumber" => {
                        let text = read_text_content(reader)?;
                        part_number = Some(text.trim().parse::<u32>().map_err(|_| {
                            XmlError::ParseError(format!("invalid part number: {text}"))
                        })?);
                    }
                    "ETag" => etag = Some(read_text_content(reader)?),
                    _ => skip_element(reader)?,
                },
                Event::End(_) => break,
                Event::Eof => {
                    return Err(XmlError::UnexpectedElement(
                        "unexpected EOF in Part".to_owned(),
                    ));
                }
                _ => {}
            }
        }

        Ok(CompletedPart {
            part_number: part_number
                .ok_or_else(|| XmlError::MissingElement("PartNumber".to_owned()))?,
            etag: etag.unwrap_or_default(),
        })
    }
}

impl S3Deserialize for CompleteMultipartUploadRequest {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut parts = Vec::new();

        loop {
            match reader.read_event()? {
                Event::Start(e) => match tag_name(&e.name())?.as_str() {
                    "Part" => parts.push(CompletedPart::deserialize_xml(reader)?),
                    _ => skip_element(reader)?,
                },
                Event::End(_) => break,
                Event::Eof => {
                    return Err(XmlError::UnexpectedElement(
                        "unexpected EOF in CompleteMultipartUpload".to_owned(),
                    ));
                }
                _ => {}
            }
        }

        Ok(CompleteMultipartUploadRequest { parts })
    }
}

impl S3Deserialize for VersioningConfiguration {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut status = VersioningStatus::None;

        loop {
            match reader.read_event()? {
                Event::Start(e) => match tag_name(&e.name())?.as_str() {
                    "Status" => {
                        let text = read_text_content(reader)?;
                        status = VersioningStatus::parse(text.trim()).ok_or_else(|| {
                            XmlError::ParseError(format!("invalid versioning status: {text}"))
                        })?;
                    }
                    _ => skip_element(reader)?,
                },
                Event::End(_) => break,
                Event::Eof => {
                    return Err(XmlError::UnexpectedElement(
                        "unexpected EOF in VersioningConfiguration".to_owned(),
                    ));
                }
                _ => {}
            }
        }

        Ok(VersioningConfiguration { status })
    }
}
