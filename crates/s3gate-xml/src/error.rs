//! Error XML formatting and the codec error type.

use std::io;

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesText, Event};

/// Errors raised while rendering or parsing protocol XML.
#[derive(Debug, thiserror::Error)]
pub enum XmlError {
    /// An I/O error during XML writing.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// An error from the underlying quick-xml library.
    #[error("XML processing error: {0}")]
    QuickXml(#[from] quick_xml::Error),

    /// A required element was missing.
    #[error("missing required XML element: {0}")]
    MissingElement(String),

    /// An element appeared where it is not allowed.
    #[error("unexpected XML element: {0}")]
    UnexpectedElement(String),

    /// Text content could not be converted to the expected value.
    #[error("failed to parse value: {0}")]
    ParseError(String),
}

/// Render an `<Error>` document.
///
/// The document is flat (no wrapper element) and always carries a `RequestId`
/// and a `HostId`:
///
/// ```xml
/// <?xml version="1.0" encoding="UTF-8"?>
/// <Error>
///   <Code>NoSuchBucket</Code>
///   <Message>The specified bucket does not exist</Message>
///   <Resource>/photos</Resource>
///   <RequestId>000000000000002A</RequestId>
///   <HostId>MDAwMDAw...</HostId>
/// </Error>
/// ```
pub fn error_to_xml(
    code: &str,
    message: &str,
    resource: Option<&str>,
    request_id: &str,
    host_id: &str,
) -> Vec<u8> {
    let mut buf = Vec::with_capacity(256);
    if let Err(e) = write_error_xml(&mut buf, code, message, resource, request_id, host_id) {
        tracing::error!(error = %e, code, "failed to serialize error XML");
        buf.clear();
    }
    buf
}

fn write_error_xml(
    buf: &mut Vec<u8>,
    code: &str,
    message: &str,
    resource: Option<&str>,
    request_id: &str,
    host_id: &str,
) -> io::Result<()> {
    let mut writer = Writer::new(buf);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    writer.create_element("Error").write_inner_content(|w| {
        w.create_element("Code")
            .write_text_content(BytesText::new(code))?;
        w.create_element("Message")
            .write_text_content(BytesText::new(message))?;
        if let Some(res) = resource.filter(|r| !r.is_empty()) {
            w.create_element("Resource")
                .write_text_content(BytesText::new(res))?;
        }
        w.create_element("RequestId")
            .write_text_content(BytesText::new(request_id))?;
        w.create_element("HostId")
            .write_text_content(BytesText::new(host_id))?;
        Ok(())
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_format_error_with_resource() {
        let xml = error_to_xml(
            "NoSuchBucket",
            "The specified bucket does not exist",
            Some("/photos"),
            "000000000000002A",
            "aG9zdA==",
        );
        let xml_str = std::str::from_utf8(&xml).expect("valid UTF-8");

        assert!(xml_str.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml_str.contains("<Code>NoSuchBucket</Code>"));
        assert!(xml_str.contains("<Resource>/photos</Resource>"));
        assert!(xml_str.contains("<RequestId>000000000000002A</RequestId>"));
        assert!(xml_str.contains("<HostId>aG9zdA==</HostId>"));
    }

    #[test]
    fn test_should_omit_empty_resource() {
        let xml = error_to_xml("SlowDown", "Please reduce your request rate.", Some(""), "01", "h");
        let xml_str = std::str::from_utf8(&xml).expect("valid UTF-8");

        assert!(xml_str.contains("<Code>SlowDown</Code>"));
        assert!(!xml_str.contains("<Resource>"));
    }

    #[test]
    fn test_should_escape_special_characters() {
        let xml = error_to_xml(
            "KeyTooLongError",
            "Your key is too long: a < b & c",
            Some("/b/a&b"),
            "02",
            "h",
        );
        let xml_str = std::str::from_utf8(&xml).expect("valid UTF-8");

        assert!(xml_str.contains("a &lt; b &amp; c"));
        assert!(xml_str.contains("/b/a&amp;b"));
    }
}
