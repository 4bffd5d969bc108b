//! Request-scoped context shared with handlers and security verifiers.

use http::{HeaderMap, Method, Uri};

/// Path parameters captured by the router, in pattern order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams(Vec<(String, String)>);

impl PathParams {
    /// Create an empty parameter list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a captured parameter.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), value.into()));
    }

    /// Look up a parameter by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Iterate parameters in capture order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of captured parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether nothing was captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Drop captures after `len`; used when the router backtracks.
    pub fn truncate(&mut self, len: usize) {
        self.0.truncate(len);
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PathParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// The per-request context: request head, matched path parameters and the
/// request id. Exclusively owned by the task serving the request.
#[derive(Debug)]
pub struct RequestContext {
    parts: http::request::Parts,
    params: PathParams,
    request_id: String,
}

impl RequestContext {
    /// Create a context from the request head and router captures.
    #[must_use]
    pub fn new(parts: http::request::Parts, params: PathParams, request_id: impl Into<String>) -> Self {
        Self {
            parts,
            params,
            request_id: request_id.into(),
        }
    }

    /// HTTP method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.parts.method
    }

    /// Request URI.
    #[must_use]
    pub fn uri(&self) -> &Uri {
        &self.parts.uri
    }

    /// Request path.
    #[must_use]
    pub fn path(&self) -> &str {
        self.parts.uri.path()
    }

    /// Request headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    /// First value of a header as a string, if present and valid UTF-8.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.parts.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Path parameters captured by the router.
    #[must_use]
    pub fn params(&self) -> &PathParams {
        &self.params
    }

    /// Request id assigned at the service boundary.
    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Typed request extensions.
    #[must_use]
    pub fn extensions(&self) -> &http::Extensions {
        &self.parts.extensions
    }

    /// Mutable typed request extensions, for middleware.
    pub fn extensions_mut(&mut self) -> &mut http::Extensions {
        &mut self.parts.extensions
    }

    /// The raw request head.
    #[must_use]
    pub fn parts(&self) -> &http::request::Parts {
        &self.parts
    }

    /// Primary language tag from `Accept-Language`, e.g. `zh` for `zh-CN,zh;q=0.9`.
    #[must_use]
    pub fn language(&self) -> Option<&str> {
        let value = self.header("accept-language")?;
        let first = value.split(',').next()?.split(';').next()?.trim();
        let primary = first.split('-').next()?.trim();
        (!primary.is_empty() && primary != "*").then_some(primary)
    }
}
