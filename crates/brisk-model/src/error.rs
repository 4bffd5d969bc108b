//! The per-request error value.
//!
//! Every request-time failure (decoding, validation, security rejection, or an
//! explicit abort from a handler) is expressed as an [`HttpError`]: a status
//! code plus a human-readable detail. It is converted to a response exactly
//! once, at the per-request boundary.

use http::StatusCode;
use serde::ser::SerializeStruct;

/// An error that short-circuits a request with the given status and detail.
///
/// Serializes as `{"code": 422, "detail": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("HTTP {}: {detail}", status.as_u16())]
pub struct HttpError {
    /// Response status.
    pub status: StatusCode,
    /// Human-readable detail.
    pub detail: String,
}

impl HttpError {
    /// Create an error with an explicit status.
    #[must_use]
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    /// Numeric status code.
    #[must_use]
    pub fn code(&self) -> u16 {
        self.status.as_u16()
    }

    /// 400 Bad Request.
    #[must_use]
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, detail)
    }

    /// 401 Unauthorized.
    #[must_use]
    pub fn unauthorized(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, detail)
    }

    /// 403 Forbidden.
    #[must_use]
    pub fn forbidden(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, detail)
    }

    /// 404 Not Found.
    #[must_use]
    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, detail)
    }

    /// 413 Payload Too Large.
    #[must_use]
    pub fn payload_too_large(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::PAYLOAD_TOO_LARGE, detail)
    }

    /// 415 Unsupported Media Type.
    #[must_use]
    pub fn unsupported_media_type(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::UNSUPPORTED_MEDIA_TYPE, detail)
    }

    /// 422 Unprocessable Entity, the default for validation failures.
    #[must_use]
    pub fn unprocessable(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, detail)
    }

    /// 500 Internal Server Error.
    #[must_use]
    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, detail)
    }

    /// Serialize into the JSON error body.
    #[must_use]
    pub fn to_json(&self) -> Vec<u8> {
        // Serializing a struct of a u16 and a String into a Vec cannot fail.
        serde_json::to_vec(self).unwrap_or_default()
    }
}

impl serde::Serialize for HttpError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("HttpError", 2)?;
        state.serialize_field("code", &self.code())?;
        state.serialize_field("detail", &self.detail)?;
        state.end()
    }
}
