//! `multipart/form-data` parser for browser form uploads.
//!
//! Works on the already-collected body. A submission must carry exactly one
//! `key` field and exactly one file part; every other field is returned as
//! a plain form field.

use bytes::Bytes;
use s3gate_model::error::{S3Error, S3ErrorCode};

/// A parsed form submission.
#[derive(Debug)]
pub struct MultipartForm {
    /// The object key from the `key` field.
    pub key: String,
    /// Remaining text fields, in submission order.
    pub fields: Vec<(String, String)>,
    /// The file content.
    pub file_data: Bytes,
    /// The file part's own `Content-Type`, if sent.
    pub file_content_type: Option<String>,
}

fn malformed(message: impl Into<String>) -> S3Error {
    S3Error::with_message(S3ErrorCode::MalformedPOSTRequest, message)
}

/// Extract the boundary from a `multipart/form-data; boundary=...` content type.
///
/// # Errors
///
/// `MalformedPOSTRequest` if the type is not `multipart/form-data` or has no
/// boundary.
pub fn extract_boundary(content_type: Option<&str>) -> Result<String, S3Error> {
    let content_type = content_type.unwrap_or_default();
    let mime: mime::Mime = content_type
        .parse()
        .map_err(|_| malformed("the body of a POST must be multipart/form-data"))?;
    if mime.type_() != mime::MULTIPART || mime.subtype() != mime::FORM_DATA {
        return Err(malformed(format!(
            "the body of a POST must be multipart/form-data, got {content_type}"
        )));
    }
    mime.get_param(mime::BOUNDARY)
        .map(|boundary| boundary.as_str().trim_matches('"').to_owned())
        .filter(|boundary| !boundary.is_empty())
        .ok_or_else(|| malformed("missing boundary in Content-Type"))
}

/// Parse a form body.
///
/// # Errors
///
/// `MalformedPOSTRequest` when no part can be read, and
/// `IncorrectNumberOfFilesInPostRequest` unless exactly one `key` field and
/// one file part are present.
pub fn parse_multipart(body: &[u8], boundary: &str) -> Result<MultipartForm, S3Error> {
    let delimiter = format!("--{boundary}");
    let parts = split_parts(body, delimiter.as_bytes());
    if parts.is_empty() {
        return Err(malformed("the form body contains no parts"));
    }

    let mut keys = Vec::new();
    let mut files = Vec::new();
    let mut fields = Vec::new();

    for part in parts {
        let (headers, content) =
            split_headers_body(part).ok_or_else(|| malformed("form part has no header block"))?;
        let headers = String::from_utf8_lossy(headers);
        let disposition = ContentDisposition::parse(&headers)
            .ok_or_else(|| malformed("form part has no Content-Disposition name"))?;

        if disposition.name.eq_ignore_ascii_case("file") || disposition.filename.is_some() {
            files.push((part_content_type(&headers), Bytes::copy_from_slice(content)));
        } else if disposition.name.eq_ignore_ascii_case("key") {
            keys.push(String::from_utf8_lossy(content).into_owned());
        } else {
            fields.push((
                disposition.name,
                String::from_utf8_lossy(content).into_owned(),
            ));
        }
    }

    if keys.len() != 1 || files.len() != 1 {
        return Err(S3Error::with_message(
            S3ErrorCode::IncorrectNumberOfFilesInPostRequest,
            format!(
                "POST requires exactly one key and one file, got {} and {}",
                keys.len(),
                files.len()
            ),
        ));
    }
    let (file_content_type, file_data) = files.remove(0);

    Ok(MultipartForm {
        key: keys.remove(0),
        fields,
        file_data,
        file_content_type,
    })
}

/// Split the body on `delimiter`, dropping the preamble and epilogue.
fn split_parts<'a>(body: &'a [u8], delimiter: &[u8]) -> Vec<&'a [u8]> {
    let mut parts = Vec::new();
    let Some(first) = find_bytes(body, delimiter) else {
        return parts;
    };
    let mut remaining = &body[first + delimiter.len()..];

    loop {
        if remaining.starts_with(b"--") {
            break;
        }
        remaining = skip_crlf(remaining);
        let Some(pos) = find_bytes(remaining, delimiter) else {
            break;
        };
        parts.push(strip_trailing_crlf(&remaining[..pos]));
        remaining = &remaining[pos + delimiter.len()..];
    }

    parts
}

fn split_headers_body(part: &[u8]) -> Option<(&[u8], &[u8])> {
    let separator = b"\r\n\r\n";
    find_bytes(part, separator).map(|pos| (&part[..pos], &part[pos + separator.len()..]))
}

struct ContentDisposition {
    name: String,
    filename: Option<String>,
}

impl ContentDisposition {
    fn parse(headers: &str) -> Option<Self> {
        let value = header_value(headers, "content-disposition")?;
        let mut name = None;
        let mut filename = None;
        for param in value.split(';').skip(1) {
            let Some((key, val)) = param.trim().split_once('=') else {
                continue;
            };
            let val = val.trim().trim_matches('"').to_owned();
            match key.trim().to_ascii_lowercase().as_str() {
                "name" => name = Some(val),
                "filename" => filename = Some(val),
                _ => {}
            }
        }
        Some(Self {
            name: name.filter(|n| !n.is_empty())?,
            filename,
        })
    }
}

fn part_content_type(headers: &str) -> Option<String> {
    header_value(headers, "content-type").map(str::to_owned)
}

fn header_value<'a>(headers: &'a str, name: &str) -> Option<&'a str> {
    headers.split("\r\n").find_map(|line| {
        let (key, value) = line.split_once(':')?;
        key.trim()
            .eq_ignore_ascii_case(name)
            .then(|| value.trim())
    })
}

fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn skip_crlf(data: &[u8]) -> &[u8] {
    data.strip_prefix(b"\r\n").unwrap_or(data)
}

fn strip_trailing_crlf(data: &[u8]) -> &[u8] {
    data.strip_suffix(b"\r\n").unwrap_or(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOUNDARY: &str = "----formboundary42";

    fn form(parts: &[(&str, Option<&str>, &str)]) -> Vec<u8> {
        let mut body = String::from("preamble\r\n");
        for (name, filename, value) in parts {
            body.push_str(&format!("--{BOUNDARY}\r\n"));
            match filename {
                Some(f) => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{f}\"\r\n\
                     Content-Type: text/plain\r\n\r\n"
                )),
                None => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{name}\"\r\n\r\n"
                )),
            }
            body.push_str(value);
            body.push_str("\r\n");
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));
        body.into_bytes()
    }

    #[test]
    fn test_should_extract_boundary() {
        let boundary =
            extract_boundary(Some("multipart/form-data; boundary=\"abc123\"")).unwrap();
        assert_eq!(boundary, "abc123");
    }

    #[test]
    fn test_should_reject_non_form_content_type() {
        for content_type in [None, Some("application/xml"), Some("multipart/form-data")] {
            let err = extract_boundary(content_type).unwrap_err();
            assert_eq!(err.code, S3ErrorCode::MalformedPOSTRequest);
        }
    }

    #[test]
    fn test_should_parse_key_file_and_fields() {
        let body = form(&[
            ("key", None, "uploads/a.txt"),
            ("x-amz-meta-color", None, "blue"),
            ("file", Some("a.txt"), "hello world"),
        ]);
        let parsed = parse_multipart(&body, BOUNDARY).unwrap();
        assert_eq!(parsed.key, "uploads/a.txt");
        assert_eq!(parsed.file_data.as_ref(), b"hello world");
        assert_eq!(parsed.file_content_type.as_deref(), Some("text/plain"));
        assert_eq!(
            parsed.fields,
            vec![("x-amz-meta-color".to_owned(), "blue".to_owned())]
        );
    }

    #[test]
    fn test_should_not_confuse_filename_with_name() {
        let body = form(&[("key", None, "k"), ("upload", Some("name.bin"), "data")]);
        let parsed = parse_multipart(&body, BOUNDARY).unwrap();
        assert_eq!(parsed.file_data.as_ref(), b"data");
        assert!(parsed.fields.is_empty());
    }

    #[test]
    fn test_should_require_exactly_one_key_and_file() {
        let cases = [
            form(&[("file", Some("a"), "x")]),
            form(&[("key", None, "k")]),
            form(&[("key", None, "k"), ("key", None, "j"), ("file", Some("a"), "x")]),
            form(&[("key", None, "k"), ("file", Some("a"), "x"), ("file", Some("b"), "y")]),
        ];
        for body in cases {
            let err = parse_multipart(&body, BOUNDARY).unwrap_err();
            assert_eq!(err.code, S3ErrorCode::IncorrectNumberOfFilesInPostRequest);
        }
    }

    #[test]
    fn test_should_reject_unparseable_body() {
        let err = parse_multipart(b"not a form at all", BOUNDARY).unwrap_err();
        assert_eq!(err.code, S3ErrorCode::MalformedPOSTRequest);

        let headerless = format!("--{BOUNDARY}\r\nno header block here\r\n--{BOUNDARY}--");
        let err = parse_multipart(headerless.as_bytes(), BOUNDARY).unwrap_err();
        assert_eq!(err.code, S3ErrorCode::MalformedPOSTRequest);
    }
}
