//! Security capabilities.
//!
//! A field typed as [`FieldType::Security`](crate::shape::FieldType::Security)
//! is not decoded from a single request location. Instead its
//! [`SecurityScheme`] is selected once at registration and, at request time,
//! its verifier is invoked after every plain field has been bound:
//!
//! - **Bearer**: the token from `Authorization: Bearer <token>`.
//! - **Basic**: the credentials from `Authorization: Basic <base64>`.
//! - **API key**: a nested shape whose header/query/cookie fields are decoded
//!   first; the decoded object is then handed to the verifier once.
//!
//! Whatever value the verifier returns is stored in the field, so a handler can
//! declare e.g. a `principal: User` field and receive the authenticated user.

use std::fmt;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::context::RequestContext;
use crate::error::HttpError;
use crate::shape::Shape;

/// Result of a verifier: the value stored in the security field.
pub type AuthResult = Result<serde_json::Value, HttpError>;

/// Future returned by a verifier.
pub type AuthFuture<'a> = BoxFuture<'a, AuthResult>;

/// Verifies an HTTP bearer token.
pub trait BearerAuth: Send + Sync + 'static {
    /// Verify `token` and produce the value bound to the field.
    fn verify<'a>(&'a self, ctx: &'a RequestContext, token: &'a str) -> AuthFuture<'a>;
}

/// Verifies HTTP basic credentials.
pub trait BasicAuth: Send + Sync + 'static {
    /// Verify `credentials` and produce the value bound to the field.
    fn verify<'a>(
        &'a self,
        ctx: &'a RequestContext,
        credentials: &'a BasicCredentials,
    ) -> AuthFuture<'a>;
}

/// Verifies an API-key object whose fields were decoded from the request.
pub trait ApiKeyAuth: Send + Sync + 'static {
    /// Verify the decoded key object and produce the value bound to the field.
    fn verify<'a>(&'a self, ctx: &'a RequestContext, keys: serde_json::Value) -> AuthFuture<'a>;
}

/// Username and password from a basic `Authorization` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    /// User name.
    pub username: String,
    /// Password.
    pub password: String,
}

/// Which security capability a field has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecurityKind {
    /// HTTP bearer.
    Bearer,
    /// HTTP basic.
    Basic,
    /// API key in header, query or cookie.
    ApiKey,
}

impl fmt::Display for SecurityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Bearer => "bearer",
            Self::Basic => "basic",
            Self::ApiKey => "apiKey",
        })
    }
}

/// The closed set of security capabilities a field can declare.
#[derive(Clone)]
pub enum SecurityScheme {
    /// HTTP bearer token.
    Bearer(Arc<dyn BearerAuth>),
    /// HTTP basic credentials.
    Basic(Arc<dyn BasicAuth>),
    /// API key object decoded from its own fields.
    ApiKey {
        /// Fields making up the key object.
        shape: Shape,
        /// Verifier invoked once per request with the decoded object.
        auth: Arc<dyn ApiKeyAuth>,
    },
}

impl SecurityScheme {
    /// Bearer scheme backed by a verifier.
    pub fn bearer(auth: impl BearerAuth) -> Self {
        Self::Bearer(Arc::new(auth))
    }

    /// Bearer scheme backed by a synchronous closure.
    pub fn bearer_fn<F>(f: F) -> Self
    where
        F: Fn(&RequestContext, &str) -> AuthResult + Send + Sync + 'static,
    {
        Self::Bearer(Arc::new(BearerFn(f)))
    }

    /// Basic scheme backed by a verifier.
    pub fn basic(auth: impl BasicAuth) -> Self {
        Self::Basic(Arc::new(auth))
    }

    /// Basic scheme backed by a synchronous closure.
    pub fn basic_fn<F>(f: F) -> Self
    where
        F: Fn(&RequestContext, &BasicCredentials) -> AuthResult + Send + Sync + 'static,
    {
        Self::Basic(Arc::new(BasicFn(f)))
    }

    /// API-key scheme: `shape` lists the key fields, `auth` verifies them.
    pub fn api_key(shape: Shape, auth: impl ApiKeyAuth) -> Self {
        Self::ApiKey {
            shape,
            auth: Arc::new(auth),
        }
    }

    /// API-key scheme backed by a synchronous closure.
    pub fn api_key_fn<F>(shape: Shape, f: F) -> Self
    where
        F: Fn(&RequestContext, serde_json::Value) -> AuthResult + Send + Sync + 'static,
    {
        Self::ApiKey {
            shape,
            auth: Arc::new(ApiKeyFn(f)),
        }
    }

    /// The capability kind.
    #[must_use]
    pub fn kind(&self) -> SecurityKind {
        match self {
            Self::Bearer(_) => SecurityKind::Bearer,
            Self::Basic(_) => SecurityKind::Basic,
            Self::ApiKey { .. } => SecurityKind::ApiKey,
        }
    }
}

impl fmt::Debug for SecurityScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bearer(_) => f.write_str("Bearer(..)"),
            Self::Basic(_) => f.write_str("Basic(..)"),
            Self::ApiKey { shape, .. } => f
                .debug_struct("ApiKey")
                .field("shape", &shape.name())
                .finish_non_exhaustive(),
        }
    }
}

struct BearerFn<F>(F);

impl<F> BearerAuth for BearerFn<F>
where
    F: Fn(&RequestContext, &str) -> AuthResult + Send + Sync + 'static,
{
    fn verify<'a>(&'a self, ctx: &'a RequestContext, token: &'a str) -> AuthFuture<'a> {
        futures::future::ready((self.0)(ctx, token)).boxed()
    }
}

struct BasicFn<F>(F);

impl<F> BasicAuth for BasicFn<F>
where
    F: Fn(&RequestContext, &BasicCredentials) -> AuthResult + Send + Sync + 'static,
{
    fn verify<'a>(
        &'a self,
        ctx: &'a RequestContext,
        credentials: &'a BasicCredentials,
    ) -> AuthFuture<'a> {
        futures::future::ready((self.0)(ctx, credentials)).boxed()
    }
}

struct ApiKeyFn<F>(F);

impl<F> ApiKeyAuth for ApiKeyFn<F>
where
    F: Fn(&RequestContext, serde_json::Value) -> AuthResult + Send + Sync + 'static,
{
    fn verify<'a>(&'a self, ctx: &'a RequestContext, keys: serde_json::Value) -> AuthFuture<'a> {
        futures::future::ready((self.0)(ctx, keys)).boxed()
    }
}
