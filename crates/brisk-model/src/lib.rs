//! Input shapes, request context, and error types for brisk.
//!
//! This crate holds the plain data that application code and the framework
//! share:
//!
//! - [`shape`]: the declarative description of a handler input ([`Shape`],
//!   [`Field`], [`FieldType`], [`Tags`]) and the [`Input`] trait.
//! - [`security`]: the closed set of security capabilities and their verifiers.
//! - [`context`]: the per-request [`RequestContext`] and router [`PathParams`].
//! - [`error`]: [`HttpError`], the single per-request error value.
//! - [`file`]: [`UploadedFile`] handles for multipart uploads.

pub mod context;
pub mod error;
pub mod file;
pub mod security;
pub mod shape;

pub use context::{PathParams, RequestContext};
pub use error::HttpError;
pub use file::UploadedFile;
pub use security::{
    ApiKeyAuth, AuthFuture, AuthResult, BasicAuth, BasicCredentials, BearerAuth, SecurityKind,
    SecurityScheme,
};
pub use shape::{Bits, Field, FieldType, Input, Shape, Tags};
