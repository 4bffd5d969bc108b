//! Rendering validation errors in the caller's language.
//!
//! A [`Localizer`] turns a structured [`ValidationError`] into text. The
//! active localizer is part of [`DecoderConfig`](crate::config::DecoderConfig);
//! there is no process-wide language table.
//!
//! Templates use three placeholders: `{field}` (the offending field),
//! `{value}` (the bound, limit or expected type) and `{input}` (the raw value
//! for parse failures).

use std::collections::HashMap;

use crate::violation::ValidationError;

/// Renders validation errors as human-readable text.
pub trait Localizer: Send + Sync + 'static {
    /// Render `error` in `language` (a primary tag like `en`), or in the
    /// localizer's default when `None` or unknown.
    fn render(&self, language: Option<&str>, error: &ValidationError) -> String;
}

const ENGLISH: &[(&str, &str)] = &[
    ("required", "{field} is required"),
    ("parse", "{field}: cannot parse {input:?} as {value}"),
    ("lt", "{field} must be less than {value}"),
    ("lte", "{field} must be less than or equal to {value}"),
    ("gt", "{field} must be greater than {value}"),
    ("gte", "{field} must be greater than or equal to {value}"),
    ("multiple", "{field} must be a multiple of {value}"),
    ("min", "{field} must have a length of at least {value}"),
    ("max", "{field} must have a length of at most {value}"),
    ("regexp", "{field} must match {value}"),
    ("enum", "{field} must be one of {value}"),
    ("unique", "{field} must not contain duplicates"),
    ("media", "{field}: unsupported media type {value:?}"),
    ("malformed", "{field}: malformed body: {value}"),
];

fn english_template(key: &str) -> &'static str {
    ENGLISH
        .iter()
        .find(|(k, _)| *k == key)
        .map_or("{field} is invalid", |(_, t)| t)
}

fn fill(template: &str, error: &ValidationError) -> String {
    let input = error.violation.input();
    template
        .replace("{field}", &error.field)
        .replace("{value:?}", &format!("{:?}", error.violation.value()))
        .replace("{value}", &error.violation.value())
        .replace("{input:?}", &format!("{input:?}"))
        .replace("{input}", input)
}

/// Built-in English messages.
#[derive(Debug, Clone, Copy, Default)]
pub struct English;

impl Localizer for English {
    fn render(&self, _language: Option<&str>, error: &ValidationError) -> String {
        fill(english_template(error.violation.key()), error)
    }
}

/// Per-language template tables with English fallback.
///
/// ```
/// use brisk_core::locale::{Catalog, Localizer};
/// use brisk_core::violation::ValidationError;
///
/// let catalog = Catalog::new("en").with_language("de", [("required", "{field} fehlt")]);
/// let err = ValidationError::required("n");
/// assert_eq!(catalog.render(Some("de"), &err), "n fehlt");
/// assert_eq!(catalog.render(Some("fr"), &err), "n is required");
/// ```
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    default_language: String,
    tables: HashMap<String, HashMap<String, String>>,
}

impl Catalog {
    /// Create a catalog whose default language is `default_language`.
    #[must_use]
    pub fn new(default_language: impl Into<String>) -> Self {
        Self {
            default_language: default_language.into(),
            tables: HashMap::new(),
        }
    }

    /// Add (or extend) the templates for `language`, keyed by violation key.
    #[must_use]
    pub fn with_language<K, V>(
        mut self,
        language: impl Into<String>,
        templates: impl IntoIterator<Item = (K, V)>,
    ) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let table = self.tables.entry(language.into()).or_default();
        for (key, template) in templates {
            table.insert(key.into(), template.into());
        }
        self
    }

    /// The configured default language.
    #[must_use]
    pub fn default_language(&self) -> &str {
        &self.default_language
    }

    fn template(&self, language: &str, key: &str) -> Option<&str> {
        self.tables
            .get(language)
            .and_then(|table| table.get(key))
            .map(String::as_str)
    }
}

impl Localizer for Catalog {
    fn render(&self, language: Option<&str>, error: &ValidationError) -> String {
        let key = error.violation.key();
        let template = language
            .and_then(|lang| self.template(lang, key))
            .or_else(|| self.template(&self.default_language, key))
            .unwrap_or_else(|| english_template(key));
        fill(template, error)
    }
}
