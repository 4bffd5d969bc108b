//! Handler functions and their type-erased endpoints.
//!
//! Any async function taking an [`Input`] (optionally preceded by the
//! [`RequestContext`]) and returning a [`Responder`] is a [`Handler`]:
//!
//! ```rust,ignore
//! async fn get_user(input: GetUser) -> Result<Json<User>, HttpError> { .. }
//! async fn whoami(ctx: RequestContext, input: WhoAmI) -> String { .. }
//! ```

use std::future::Future;
use std::sync::Arc;

use brisk_core::Decoder;
use brisk_model::{Input, RequestContext};
use bytes::Bytes;
use futures::future::BoxFuture;

use crate::response::{Responder, Response, error_to_response};

/// An async handler with the argument list `Args`.
pub trait Handler<Args>: Clone + Send + Sync + 'static {
    /// The declared input type.
    type Input: Input;

    /// Invoke the handler with a decoded input.
    fn call(&self, ctx: RequestContext, input: Self::Input) -> BoxFuture<'static, Response>;
}

impl<F, Fut, I, R> Handler<(I,)> for F
where
    F: Fn(I) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    I: Input,
    R: Responder,
{
    type Input = I;

    fn call(&self, _ctx: RequestContext, input: I) -> BoxFuture<'static, Response> {
        let fut = self(input);
        Box::pin(async move { fut.await.respond() })
    }
}

impl<F, Fut, I, R> Handler<(RequestContext, I)> for F
where
    F: Fn(RequestContext, I) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    I: Input,
    R: Responder,
{
    type Input = I;

    fn call(&self, ctx: RequestContext, input: I) -> BoxFuture<'static, Response> {
        let fut = self(ctx, input);
        Box::pin(async move { fut.await.respond() })
    }
}

/// A type-erased endpoint: takes the request context and collected body.
pub type Endpoint = Arc<dyn Fn(RequestContext, Bytes) -> BoxFuture<'static, Response> + Send + Sync>;

/// Wrap a handler so that its input is decoded first.
pub(crate) fn endpoint<H, Args>(handler: H, decoder: Decoder) -> Endpoint
where
    H: Handler<Args>,
{
    let decoder = Arc::new(decoder);
    Arc::new(move |ctx: RequestContext, body: Bytes| -> BoxFuture<'static, Response> {
        let handler = handler.clone();
        let decoder = Arc::clone(&decoder);
        Box::pin(async move {
            match decoder.decode_into::<H::Input>(&ctx, &body).await {
                Ok(input) => handler.call(ctx, input).await,
                Err(err) => {
                    tracing::warn!(
                        request_id = ctx.request_id(),
                        shape = %decoder.plan().shape,
                        status = err.code(),
                        detail = %err.detail,
                        "request rejected"
                    );
                    error_to_response(&err)
                }
            }
        })
    })
}
