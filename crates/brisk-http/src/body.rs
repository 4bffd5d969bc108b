//! Response body type.
//!
//! [`ResponseBody`] is either a buffered payload or empty. Everything the
//! framework writes (handler results, error documents, static files) is
//! small enough to buffer.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use http_body_util::Full;

/// Body of every response produced by the service.
#[derive(Debug, Default)]
pub enum ResponseBody {
    /// A complete payload.
    Buffered(Full<Bytes>),
    /// No payload (204 responses, HEAD requests).
    #[default]
    Empty,
}

impl ResponseBody {
    /// A buffered body.
    #[must_use]
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        Self::Buffered(Full::new(data.into()))
    }

    /// An empty body.
    #[must_use]
    pub fn empty() -> Self {
        Self::Empty
    }
}

impl http_body::Body for ResponseBody {
    type Data = Bytes;
    type Error = std::convert::Infallible;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<http_body::Frame<Self::Data>, Self::Error>>> {
        match self.get_mut() {
            Self::Buffered(full) => Pin::new(full).poll_frame(cx),
            Self::Empty => Poll::Ready(None),
        }
    }

    fn is_end_stream(&self) -> bool {
        match self {
            Self::Buffered(full) => full.is_end_stream(),
            Self::Empty => true,
        }
    }

    fn size_hint(&self) -> http_body::SizeHint {
        match self {
            Self::Buffered(full) => full.size_hint(),
            Self::Empty => http_body::SizeHint::with_exact(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use http_body::Body;

    use super::*;

    #[test]
    fn test_should_report_empty_body_as_end_of_stream() {
        let body = ResponseBody::default();
        assert!(body.is_end_stream());
        assert_eq!(body.size_hint().exact(), Some(0));
    }

    #[test]
    fn test_should_size_buffered_body() {
        let body = ResponseBody::from_bytes("hello");
        assert!(!body.is_end_stream());
        assert_eq!(body.size_hint().exact(), Some(5));
    }
}
