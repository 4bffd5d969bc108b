//! Middleware chain.
//!
//! Middleware runs in registration order around every endpoint (including
//! static files and the not-found handler). Each link decides whether and
//! when to call [`Next::run`]; nothing runs in parallel.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use brisk_model::RequestContext;
use bytes::Bytes;
use futures::future::BoxFuture;

use crate::handler::Endpoint;
use crate::response::Response;

/// A link in the request chain.
pub trait Middleware: Send + Sync + 'static {
    /// Handle a request, usually by calling `next.run(ctx, body)`.
    fn handle<'a>(&'a self, ctx: RequestContext, body: Bytes, next: Next<'a>) -> BoxFuture<'a, Response>;
}

/// The rest of the chain.
pub struct Next<'a> {
    endpoint: &'a Endpoint,
    chain: &'a [Arc<dyn Middleware>],
}

impl fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("remaining", &self.chain.len())
            .finish_non_exhaustive()
    }
}

impl<'a> Next<'a> {
    pub(crate) fn new(endpoint: &'a Endpoint, chain: &'a [Arc<dyn Middleware>]) -> Self {
        Self { endpoint, chain }
    }

    /// Pass the request to the next middleware, or to the endpoint.
    pub fn run(self, ctx: RequestContext, body: Bytes) -> BoxFuture<'a, Response> {
        match self.chain.split_first() {
            Some((middleware, chain)) => middleware.handle(
                ctx,
                body,
                Next {
                    endpoint: self.endpoint,
                    chain,
                },
            ),
            None => (self.endpoint)(ctx, body),
        }
    }
}

/// Logs one line per request with its status and latency.
#[derive(Debug, Clone, Copy, Default)]
pub struct TraceRequests;

impl Middleware for TraceRequests {
    fn handle<'a>(&'a self, ctx: RequestContext, body: Bytes, next: Next<'a>) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let start = Instant::now();
            let method = ctx.method().clone();
            let path = ctx.path().to_owned();
            let request_id = ctx.request_id().to_owned();

            let response = next.run(ctx, body).await;

            tracing::info!(
                %method,
                path = %path,
                request_id = %request_id,
                status = response.status().as_u16(),
                latency_us = u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX),
                "request"
            );
            response
        })
    }
}
