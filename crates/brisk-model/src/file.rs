//! Uploaded file handles.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A file received in a `multipart/form-data` request.
///
/// Declare a field as [`FieldType::File`](crate::shape::FieldType::File) (or
/// `Files` for `Vec<UploadedFile>`) with a `file` tag to receive it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    /// Client-supplied file name.
    pub filename: String,
    /// Content type of the part, if the client sent one.
    #[serde(default)]
    pub content_type: Option<String>,
    /// File contents.
    pub data: Bytes,
}

impl UploadedFile {
    /// Size of the file in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the file is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
