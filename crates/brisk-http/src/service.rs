//! The hyper service.
//!
//! [`ApiService`] runs every request through:
//!
//! 1. route resolution (unmatched requests go to the not-found endpoint)
//! 2. body collection, bounded by `max_body_bytes` (413 beyond)
//! 3. the middleware chain and the endpoint (decode, validate, handler)
//! 4. common response headers (`x-request-id`, `server`)
//!
//! A panic anywhere in steps 1-3 is caught here and answered with a 500, so
//! one failing request never takes the server down.

use std::any::Any;
use std::backtrace::Backtrace;
use std::convert::Infallible;
use std::error::Error as StdError;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;

use brisk_model::{HttpError, PathParams, RequestContext};
use bytes::Bytes;
use futures::FutureExt;
use http::header::{HeaderName, HeaderValue, SERVER};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::service::Service;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::api::Api;
use crate::handler::Endpoint;
use crate::middleware::{Middleware, Next};
use crate::response::{Response, error_to_response};
use crate::router::Router;

/// Header carrying the per-request id.
pub const REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

struct Inner {
    router: Router<Endpoint>,
    middleware: Vec<Arc<dyn Middleware>>,
    not_found: Endpoint,
    max_body_bytes: usize,
}

/// Serves a frozen [`Api`].
#[derive(Clone)]
pub struct ApiService {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for ApiService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiService")
            .field("middleware", &self.inner.middleware.len())
            .field("max_body_bytes", &self.inner.max_body_bytes)
            .finish_non_exhaustive()
    }
}

impl ApiService {
    /// Freeze `api` for serving.
    #[must_use]
    pub fn new(api: Api) -> Self {
        Self {
            inner: Arc::new(Inner {
                max_body_bytes: api.config.max_body_bytes,
                router: api.router,
                middleware: api.middleware,
                not_found: api.not_found,
            }),
        }
    }
}

impl<B> Service<http::Request<B>> for ApiService
where
    B: http_body::Body<Data = Bytes> + Send + 'static,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: http::Request<B>) -> Self::Future {
        let inner = Arc::clone(&self.inner);

        Box::pin(async move {
            let request_id = Uuid::new_v4().to_string();
            let method = req.method().clone();
            let path = req.uri().path().to_owned();

            let response = match AssertUnwindSafe(process_request(&inner, req, &request_id))
                .catch_unwind()
                .await
            {
                Ok(response) => response,
                Err(panic) => {
                    error!(
                        %method,
                        path = %path,
                        request_id = %request_id,
                        panic = panic_message(panic.as_ref()),
                        "handler panicked"
                    );
                    error_to_response(&HttpError::internal("internal server error"))
                }
            };

            Ok(add_common_headers(response, &request_id))
        })
    }
}

async fn process_request<B>(inner: &Inner, req: http::Request<B>, request_id: &str) -> Response
where
    B: http_body::Body<Data = Bytes>,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let (parts, body) = req.into_parts();

    let (endpoint, params) = match inner.router.resolve(&parts.method, parts.uri.path()) {
        Some(matched) => {
            debug!(
                method = %parts.method,
                path = parts.uri.path(),
                pattern = matched.pattern,
                request_id,
                "matched route"
            );
            (matched.value, matched.params)
        }
        None => {
            debug!(method = %parts.method, path = parts.uri.path(), request_id, "no route");
            (&inner.not_found, PathParams::new())
        }
    };

    let body = match Limited::new(body, inner.max_body_bytes).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(err) if err.downcast_ref::<LengthLimitError>().is_some() => {
            warn!(request_id, limit = inner.max_body_bytes, "request body too large");
            return error_to_response(&HttpError::payload_too_large(format!(
                "request body exceeds {} bytes",
                inner.max_body_bytes
            )));
        }
        Err(err) => {
            error!(error = %err, request_id, "failed to collect request body");
            return error_to_response(&HttpError::bad_request("failed to read request body"));
        }
    };

    let ctx = RequestContext::new(parts, params, request_id);
    Next::new(endpoint, &inner.middleware).run(ctx, body).await
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

/// Route panics through `tracing`, with the backtrace of the panic site.
pub fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let backtrace = Backtrace::force_capture();
        error!(panic = %info, %backtrace, "panic");
    }));
}

fn add_common_headers(mut response: Response, request_id: &str) -> Response {
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(request_id) {
        headers.insert(REQUEST_ID, value);
    }
    headers.insert(SERVER, HeaderValue::from_static("brisk"));
    response
}
