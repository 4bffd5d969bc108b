//! Configuration.
//!
//! All configuration is driven by environment variables. [`ApiConfig`] is the
//! serializable top-level view; [`DecoderConfig`] is the part handed to the
//! decoder at construction time.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use brisk_model::HttpError;
use http::StatusCode;

use crate::locale::{English, Localizer};
use crate::violation::ValidationError;

/// A body media type with a codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    /// `application/json` and `*/*+json`.
    Json,
    /// `application/xml`, `text/xml` and `*/*+xml`.
    Xml,
}

impl MediaType {
    /// Short name used in tags and configuration.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Xml => "xml",
        }
    }

    /// Canonical MIME type.
    #[must_use]
    pub fn mime(self) -> mime::Mime {
        match self {
            Self::Json => mime::APPLICATION_JSON,
            Self::Xml => "application/xml"
                .parse()
                .unwrap_or(mime::APPLICATION_OCTET_STREAM),
        }
    }

    /// Classify a `Content-Type` header value, ignoring parameters.
    #[must_use]
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let parsed: mime::Mime = content_type.parse().ok()?;
        let suffix = parsed.suffix().map(|s| s.as_str());
        match (parsed.type_().as_str(), parsed.subtype().as_str(), suffix) {
            (_, "json", _) | (_, _, Some("json")) => Some(Self::Json),
            ("application" | "text", "xml", _) | (_, _, Some("xml")) => Some(Self::Xml),
            _ => None,
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "xml" => Ok(Self::Xml),
            other => Err(format!("unknown media type {other:?}")),
        }
    }
}

/// Top-level configuration for a brisk server.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiConfig {
    /// Bind address.
    pub listen: String,
    /// Log level used when `RUST_LOG` is unset.
    pub log_level: String,
    /// Status for decode and validation failures.
    pub validation_status: u16,
    /// Request body limit in bytes.
    pub max_body_bytes: usize,
    /// Accepted body media types.
    pub media_types: Vec<MediaType>,
    /// Default message language.
    pub language: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8080".to_owned(),
            log_level: "info".to_owned(),
            validation_status: StatusCode::UNPROCESSABLE_ENTITY.as_u16(),
            max_body_bytes: 10 * 1024 * 1024,
            media_types: vec![MediaType::Json, MediaType::Xml],
            language: "en".to_owned(),
        }
    }
}

impl ApiConfig {
    /// Load configuration from environment variables.
    ///
    /// Unparseable values are ignored and the default is kept.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(v) = lookup("BRISK_LISTEN") {
            config.listen = v;
        }
        if let Some(v) = lookup("LOG_LEVEL") {
            config.log_level = v;
        }
        if let Some(v) = lookup("BRISK_VALIDATION_STATUS") {
            match v.parse::<u16>().ok().and_then(|c| StatusCode::from_u16(c).ok()) {
                Some(status) => config.validation_status = status.as_u16(),
                None => tracing::warn!(value = %v, "ignoring invalid BRISK_VALIDATION_STATUS"),
            }
        }
        if let Some(v) = lookup("BRISK_MAX_BODY_BYTES") {
            match v.parse() {
                Ok(n) => config.max_body_bytes = n,
                Err(_) => tracing::warn!(value = %v, "ignoring invalid BRISK_MAX_BODY_BYTES"),
            }
        }
        if let Some(v) = lookup("BRISK_MEDIA_TYPES") {
            match v.split(',').map(str::parse).collect::<Result<Vec<_>, _>>() {
                Ok(types) if !types.is_empty() => config.media_types = types,
                _ => tracing::warn!(value = %v, "ignoring invalid BRISK_MEDIA_TYPES"),
            }
        }
        if let Some(v) = lookup("BRISK_LANGUAGE") {
            config.language = v;
        }

        config
    }

    /// Validation status as a [`StatusCode`].
    #[must_use]
    pub fn validation_status(&self) -> StatusCode {
        StatusCode::from_u16(self.validation_status).unwrap_or(StatusCode::UNPROCESSABLE_ENTITY)
    }
}

/// Explicit configuration handed to the extractor and decoder.
#[derive(Clone)]
pub struct DecoderConfig {
    /// Media types a body field may declare.
    pub media_types: Vec<MediaType>,
    /// Status for decode and validation failures.
    pub validation_status: StatusCode,
    /// Default language when the request names none.
    pub language: String,
    /// Active message renderer.
    pub localizer: Arc<dyn Localizer>,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self::from(&ApiConfig::default())
    }
}

impl From<&ApiConfig> for DecoderConfig {
    fn from(config: &ApiConfig) -> Self {
        Self {
            media_types: config.media_types.clone(),
            validation_status: config.validation_status(),
            language: config.language.clone(),
            localizer: Arc::new(English),
        }
    }
}

impl DecoderConfig {
    /// Replace the localizer.
    #[must_use]
    pub fn with_localizer(mut self, localizer: impl Localizer) -> Self {
        self.localizer = Arc::new(localizer);
        self
    }

    /// Whether `media` is accepted.
    #[must_use]
    pub fn accepts(&self, media: MediaType) -> bool {
        self.media_types.contains(&media)
    }

    /// Convert a validation failure into the per-request error, rendering
    /// the message in `language` (or the configured default).
    #[must_use]
    pub fn to_http_error(&self, language: Option<&str>, error: &ValidationError) -> HttpError {
        let language = language.unwrap_or(&self.language);
        HttpError::new(
            error.status(self.validation_status),
            self.localizer.render(Some(language), error),
        )
    }
}

impl fmt::Debug for DecoderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecoderConfig")
            .field("media_types", &self.media_types)
            .field("validation_status", &self.validation_status)
            .field("language", &self.language)
            .finish_non_exhaustive()
    }
}
