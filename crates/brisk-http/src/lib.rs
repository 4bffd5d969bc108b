//! Routing, handler registration, and the hyper service for brisk.
//!
//! - **Router** ([`router`]): per-method path tries with literal,
//!   parameterized and catch-all segments.
//! - **Registration** ([`api`]): [`Api`] compiles each handler's input shape
//!   once and inserts its paths and methods into the router.
//! - **Handlers** ([`handler`]): async functions taking an
//!   [`Input`](brisk_model::Input), optionally preceded by the
//!   [`RequestContext`](brisk_model::RequestContext).
//! - **Middleware** ([`middleware`]): a sequential chain around every endpoint.
//! - **Responses** ([`response`], [`body`]): the [`Responder`] conversions
//!   and the error document format.
//! - **Service** ([`service`]): [`ApiService`], the hyper `Service`.
//!
//! # Architecture
//!
//! ```text
//! HTTP Request
//!   -> ApiService (hyper Service, panic boundary)
//!     -> Router::resolve (or the not-found endpoint)
//!     -> bounded body collection
//!     -> Middleware chain
//!     -> Decoder (brisk-core) -> handler -> Responder
//!     -> x-request-id, server headers
//!   <- HTTP Response
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! let mut api = Api::new(ApiConfig::from_env());
//! api.register(get_user)?.register(create_user)?;
//! api.static_dir("/assets", "./public")?;
//! api.middleware(TraceRequests);
//! let service = api.into_service();
//! // Serve `service` with hyper.
//! ```

pub mod api;
pub mod body;
pub mod handler;
pub mod middleware;
pub mod response;
pub mod router;
pub mod service;
pub mod static_files;

pub use api::{Api, ApiError, RouteInfo};
pub use body::ResponseBody;
pub use handler::Handler;
pub use middleware::{Middleware, Next, TraceRequests};
pub use response::{Json, Responder, Response, error_to_response};
pub use router::{PathPattern, RouteError, Router};
pub use service::{ApiService, install_panic_hook};
