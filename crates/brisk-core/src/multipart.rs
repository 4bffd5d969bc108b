//! `multipart/form-data` parser.
//!
//! Works on the already-collected body. Parts with a `filename` become
//! [`UploadedFile`]s; every other part is a text field. Names may repeat.

use brisk_model::UploadedFile;
use bytes::Bytes;

/// A parsed multipart submission.
#[derive(Debug, Default)]
pub struct MultipartForm {
    /// Text fields in body order.
    pub fields: Vec<(String, String)>,
    /// File parts in body order.
    pub files: Vec<(String, UploadedFile)>,
}

/// Multipart parse failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MultipartError {
    /// The content type is not `multipart/form-data`.
    #[error("expected multipart/form-data, got {0:?}")]
    NotMultipart(String),
    /// No usable boundary parameter.
    #[error("missing boundary in content type")]
    MissingBoundary,
}

/// Extract the boundary from a `multipart/form-data; boundary=...` content type.
pub fn extract_boundary(content_type: &str) -> Result<String, MultipartError> {
    if !content_type
        .to_ascii_lowercase()
        .starts_with("multipart/form-data")
    {
        return Err(MultipartError::NotMultipart(content_type.to_owned()));
    }

    content_type
        .split(';')
        .filter_map(|part| {
            let (key, value) = part.trim().split_once('=')?;
            key.trim()
                .eq_ignore_ascii_case("boundary")
                .then(|| value.trim().trim_matches('"').to_owned())
        })
        .find(|b| !b.is_empty())
        .ok_or(MultipartError::MissingBoundary)
}

/// Parse a multipart body delimited by `boundary`.
#[must_use]
pub fn parse_multipart(body: &Bytes, boundary: &str) -> MultipartForm {
    let delimiter = format!("--{boundary}");
    let mut form = MultipartForm::default();

    for (start, end) in split_parts(body, delimiter.as_bytes()) {
        let part = &body[start..end];
        let Some(split) = find_bytes(part, b"\r\n\r\n") else {
            continue;
        };
        let headers = String::from_utf8_lossy(&part[..split]);
        let Some(disposition) = headers
            .split("\r\n")
            .find(|line| line.to_ascii_lowercase().starts_with("content-disposition:"))
        else {
            continue;
        };
        let Some(name) = quoted_param(disposition, "name") else {
            continue;
        };
        let data = body.slice(start + split + 4..end);

        match quoted_param(disposition, "filename") {
            Some(filename) => {
                let content_type = headers.split("\r\n").find_map(|line| {
                    let (key, value) = line.split_once(':')?;
                    key.trim()
                        .eq_ignore_ascii_case("content-type")
                        .then(|| value.trim().to_owned())
                });
                form.files.push((
                    name,
                    UploadedFile {
                        filename,
                        content_type,
                        data,
                    },
                ));
            }
            None => form
                .fields
                .push((name, String::from_utf8_lossy(&data).into_owned())),
        }
    }

    form
}

/// Byte ranges of every part between delimiters, without the framing CRLFs.
fn split_parts(body: &[u8], delimiter: &[u8]) -> Vec<(usize, usize)> {
    let mut parts = Vec::new();
    let Some(first) = find_bytes(body, delimiter) else {
        return parts;
    };
    let mut cursor = first + delimiter.len();

    loop {
        if body[cursor..].starts_with(b"--") {
            break;
        }
        if body[cursor..].starts_with(b"\r\n") {
            cursor += 2;
        }
        let Some(next) = find_bytes(&body[cursor..], delimiter) else {
            break;
        };
        let mut end = cursor + next;
        if body[..end].ends_with(b"\r\n") {
            end -= 2;
        }
        parts.push((cursor, end.max(cursor)));
        cursor += next + delimiter.len();
    }

    parts
}

/// Extract `param="value"` (or an unquoted value) from a header line.
fn quoted_param(line: &str, param: &str) -> Option<String> {
    line.split(';').skip(1).find_map(|piece| {
        let (key, value) = piece.trim().split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case(param)
            .then(|| value.trim().trim_matches('"').to_owned())
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
