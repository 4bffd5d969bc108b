//! Handler return values to HTTP responses.
//!
//! A handler may return anything implementing [`Responder`]. Returning
//! `Result<R, HttpError>` is how a handler aborts with a status and detail;
//! the error is rendered exactly like a decode or validation failure.

use brisk_model::HttpError;
use bytes::Bytes;
use http::StatusCode;
use http::header::{CONTENT_TYPE, HeaderValue};
use serde::Serialize;

use crate::body::ResponseBody;

/// The response type produced by every endpoint.
pub type Response = http::Response<ResponseBody>;

/// Conversion of a handler result into a response.
pub trait Responder {
    /// Build the response.
    fn respond(self) -> Response;
}

/// JSON response body.
#[derive(Debug, Clone, Copy, Default)]
pub struct Json<T>(pub T);

fn with_content_type(status: StatusCode, content_type: &'static str, body: ResponseBody) -> Response {
    let mut response = http::Response::new(body);
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

/// Render an [`HttpError`] as `{"code": .., "detail": ..}`.
#[must_use]
pub fn error_to_response(err: &HttpError) -> Response {
    with_content_type(
        err.status,
        "application/json",
        ResponseBody::from_bytes(err.to_json()),
    )
}

impl Responder for Response {
    fn respond(self) -> Response {
        self
    }
}

impl Responder for () {
    fn respond(self) -> Response {
        let mut response = http::Response::new(ResponseBody::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;
        response
    }
}

impl Responder for String {
    fn respond(self) -> Response {
        with_content_type(
            StatusCode::OK,
            "text/plain; charset=utf-8",
            ResponseBody::from_bytes(self),
        )
    }
}

impl Responder for &'static str {
    fn respond(self) -> Response {
        with_content_type(
            StatusCode::OK,
            "text/plain; charset=utf-8",
            ResponseBody::from_bytes(Bytes::from_static(self.as_bytes())),
        )
    }
}

impl<T: Serialize> Responder for Json<T> {
    fn respond(self) -> Response {
        match serde_json::to_vec(&self.0) {
            Ok(body) => with_content_type(
                StatusCode::OK,
                "application/json",
                ResponseBody::from_bytes(body),
            ),
            Err(err) => {
                tracing::error!(error = %err, "failed to serialize response body");
                error_to_response(&HttpError::internal("failed to serialize response"))
            }
        }
    }
}

impl Responder for HttpError {
    fn respond(self) -> Response {
        error_to_response(&self)
    }
}

impl<R: Responder> Responder for (StatusCode, R) {
    fn respond(self) -> Response {
        let mut response = self.1.respond();
        *response.status_mut() = self.0;
        response
    }
}

impl<R: Responder> Responder for Result<R, HttpError> {
    fn respond(self) -> Response {
        match self {
            Ok(value) => value.respond(),
            Err(err) => error_to_response(&err),
        }
    }
}
