//! The registration surface.
//!
//! [`Api`] collects handlers, static directories and middleware. All checks
//! happen in [`Api::register`]; once every route is in, [`Api::into_service`]
//! freezes the router and the compiled plans for serving.

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use brisk_core::{
    ApiConfig, Decoder, DecoderConfig, FieldDescriptor, InputPlan, Localizer, RegistrationError,
    RouteDescriptor, check_fields, extract,
};
use brisk_model::{HttpError, Input, RequestContext};
use bytes::Bytes;
use futures::future::BoxFuture;
use http::Method;
use tracing::info;

use crate::handler::{self, Endpoint, Handler};
use crate::middleware::Middleware;
use crate::response::{Responder, Response, error_to_response};
use crate::router::{PathPattern, RouteError, Router};
use crate::service::ApiService;
use crate::static_files;

/// Registration failure. Meant to abort startup.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The input shape is malformed.
    #[error(transparent)]
    Registration(#[from] RegistrationError),
    /// A path pattern is malformed or already taken.
    #[error(transparent)]
    Route(#[from] RouteError),
    /// A static directory does not exist.
    #[error("static directory {path} does not exist")]
    StaticDir {
        /// The directory.
        path: String,
    },
}

/// A registered operation, as seen by documentation generators.
#[derive(Debug, Clone)]
pub struct RouteInfo {
    /// Parsed patterns, in declaration order.
    pub patterns: Vec<PathPattern>,
    /// The compiled input plan.
    pub plan: Arc<InputPlan>,
}

impl RouteInfo {
    /// Route metadata from the marker field.
    #[must_use]
    pub fn route(&self) -> &RouteDescriptor {
        &self.plan.route
    }

    /// HTTP methods.
    #[must_use]
    pub fn methods(&self) -> &[Method] {
        &self.plan.route.methods
    }

    /// Bindable fields in declaration order.
    #[must_use]
    pub fn descriptors(&self) -> &[FieldDescriptor] {
        &self.plan.descriptors
    }
}

/// Declarative API builder.
pub struct Api {
    pub(crate) config: ApiConfig,
    decoder_config: DecoderConfig,
    pub(crate) router: Router<Endpoint>,
    routes: Vec<RouteInfo>,
    pub(crate) middleware: Vec<Arc<dyn Middleware>>,
    pub(crate) not_found: Endpoint,
}

impl fmt::Debug for Api {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Api")
            .field("config", &self.config)
            .field("routes", &self.routes.len())
            .field("middleware", &self.middleware.len())
            .finish_non_exhaustive()
    }
}

impl Default for Api {
    fn default() -> Self {
        Self::new(ApiConfig::default())
    }
}

fn default_not_found() -> Endpoint {
    Arc::new(|ctx: RequestContext, _body: Bytes| -> BoxFuture<'static, Response> {
        let err = HttpError::not_found(format!("no route for {} {}", ctx.method(), ctx.path()));
        Box::pin(async move { error_to_response(&err) })
    })
}

impl Api {
    /// Create an empty API.
    #[must_use]
    pub fn new(config: ApiConfig) -> Self {
        let decoder_config = DecoderConfig::from(&config);
        Self {
            config,
            decoder_config,
            router: Router::new(),
            routes: Vec::new(),
            middleware: Vec::new(),
            not_found: default_not_found(),
        }
    }

    /// Render validation messages with `localizer`. Affects handlers
    /// registered afterwards.
    #[must_use]
    pub fn with_localizer(mut self, localizer: impl Localizer) -> Self {
        self.decoder_config = self.decoder_config.with_localizer(localizer);
        self
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// Register a handler under every path and method its input declares.
    ///
    /// # Errors
    ///
    /// Fails if the input shape is malformed, a pattern does not parse, a
    /// `path` field names a parameter missing from some pattern, or a
    /// method/pattern pair is already taken.
    pub fn register<H, Args>(&mut self, handler: H) -> Result<&mut Self, ApiError>
    where
        H: Handler<Args>,
    {
        let shape = <H::Input as Input>::shape();
        check_fields::<H::Input>(&shape)?;
        let plan = extract(&shape, &self.decoder_config)?;
        let patterns = plan
            .route
            .paths
            .iter()
            .map(|p| PathPattern::parse(p))
            .collect::<Result<Vec<_>, _>>()?;

        for pattern in &patterns {
            for (field, key) in plan.path_keys() {
                if !pattern.param_names().any(|name| name == key) {
                    return Err(RegistrationError::UnknownPathParam {
                        field: field.to_owned(),
                        key: key.to_owned(),
                        pattern: pattern.to_string(),
                    }
                    .into());
                }
            }
        }

        let decoder = Decoder::new(plan, self.decoder_config.clone());
        let plan = decoder.shared_plan();
        let endpoint = handler::endpoint(handler, decoder);
        for pattern in &patterns {
            for method in &plan.route.methods {
                self.router
                    .insert(method.clone(), pattern, Arc::clone(&endpoint))?;
            }
        }

        info!(
            shape = %plan.shape,
            methods = ?plan.route.methods,
            paths = ?plan.route.paths,
            fields = plan.descriptors.len(),
            "registered route"
        );
        self.routes.push(RouteInfo { patterns, plan });
        Ok(self)
    }

    /// Serve files below `dir` for GET and HEAD on `prefix` and everything
    /// under it.
    ///
    /// # Errors
    ///
    /// Fails if `dir` is not a directory or the prefix collides with a
    /// registered route.
    pub fn static_dir(&mut self, prefix: &str, dir: impl Into<PathBuf>) -> Result<&mut Self, ApiError> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(ApiError::StaticDir {
                path: dir.display().to_string(),
            });
        }
        let exact = PathPattern::parse(prefix)?;
        let all = PathPattern::prefix(prefix)?;
        info!(prefix = %exact, dir = %dir.display(), "serving static files");

        let endpoint = static_files::directory(dir);
        for method in [Method::GET, Method::HEAD] {
            self.router
                .insert(method.clone(), &exact, Arc::clone(&endpoint))?;
            self.router.insert(method, &all, Arc::clone(&endpoint))?;
        }
        Ok(self)
    }

    /// Replace the handler for unmatched requests.
    pub fn not_found<F, Fut, R>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: Responder,
    {
        self.not_found = Arc::new(move |ctx: RequestContext, _body: Bytes| -> BoxFuture<'static, Response> {
            let fut = handler(ctx);
            Box::pin(async move { fut.await.respond() })
        });
        self
    }

    /// Append a middleware. Middleware runs in the order added.
    pub fn middleware(&mut self, middleware: impl Middleware) -> &mut Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Every registered operation, in registration order.
    #[must_use]
    pub fn routes(&self) -> &[RouteInfo] {
        &self.routes
    }

    /// Freeze the API into a hyper service.
    #[must_use]
    pub fn into_service(self) -> ApiService {
        ApiService::new(self)
    }
}
