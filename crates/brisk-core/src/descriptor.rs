//! Compiled, cached metadata for one handler input.
//!
//! The extractor turns a [`Shape`](brisk_model::Shape) into an [`InputPlan`]:
//! the route descriptor, a flat list of [`FieldDescriptor`]s in declaration
//! order, and the [`Bound`] skeleton that every request clones. Nothing in
//! here is mutated after registration.

use std::fmt;
use std::sync::Arc;

use brisk_model::{ApiKeyAuth, FieldType, SecurityKind, SecurityScheme};
use http::Method;

use crate::bound::Bound;
use crate::config::MediaType;
use crate::constraint::ConstraintSet;

/// Field indices leading from the input root to a slot.
pub type Address = Vec<usize>;

/// Where a field's value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    /// A request header.
    Header,
    /// A cookie.
    Cookie,
    /// A path parameter captured by the router.
    Path,
    /// A query parameter.
    Query,
    /// An urlencoded or multipart form value.
    Form,
    /// A multipart file.
    File,
    /// The request body in the given media type.
    Body(MediaType),
    /// A security hook, invoked instead of decoded.
    Security(SecurityKind),
}

impl Source {
    /// Tag name of the source.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Header => "header",
            Self::Cookie => "cookie",
            Self::Path => "path",
            Self::Query => "query",
            Self::Form => "form",
            Self::File => "file",
            Self::Body(_) => "body",
            Self::Security(_) => "security",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Body(media) => write!(f, "body:{media}"),
            Self::Security(kind) => write!(f, "security:{kind}"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// A location tag value: `name` or `name,omitempty`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationTag {
    /// Location key; the field name when the tag leaves it empty.
    pub key: String,
    /// Second token present: the field is optional.
    pub omitempty: bool,
}

impl LocationTag {
    /// Parse a tag value, defaulting the key to `field`.
    #[must_use]
    pub fn parse(value: &str, field: &str) -> Self {
        let mut parts = value.split(',').map(str::trim);
        let key = parts.next().filter(|k| !k.is_empty()).unwrap_or(field);
        let omitempty = parts.any(|p| p == "omitempty");
        Self {
            key: key.to_owned(),
            omitempty,
        }
    }
}

/// The API-key object a sub-field belongs to.
#[derive(Clone)]
pub struct KeyOwner {
    /// Address of the API-key field.
    pub address: Address,
    /// Field path of the API-key field, for messages.
    pub field: String,
    /// Verifier invoked once with the decoded key object.
    pub auth: Arc<dyn ApiKeyAuth>,
}

impl fmt::Debug for KeyOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyOwner")
            .field("address", &self.address)
            .field("field", &self.field)
            .finish_non_exhaustive()
    }
}

/// Decode tree for a body, with per-media wire names.
#[derive(Debug, Clone)]
pub enum BodyNode {
    /// Bool, number or string.
    Scalar(FieldType),
    /// Raw bytes.
    Bytes,
    /// Any JSON value.
    Any,
    /// Homogeneous sequence.
    Slice(Box<BodyNode>),
    /// String-keyed map.
    Map(Box<BodyNode>),
    /// Nullable value.
    Optional(Box<BodyNode>),
    /// Nested object.
    Struct(Vec<BodyField>),
}

/// One field of a body object.
#[derive(Debug, Clone)]
pub struct BodyField {
    /// Serde key of the Rust field.
    pub name: String,
    /// Name on the wire (`json`/`xml` tag, or the field name).
    pub wire: String,
    /// Declared type.
    pub ty: FieldType,
    /// Compiled constraints, including `required`.
    pub constraints: ConstraintSet,
    /// Decode tree of the value.
    pub node: BodyNode,
}

/// One bindable unit of an input shape.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    /// Dotted field path from the input root, e.g. `auth.key`.
    pub name: String,
    /// Where the value comes from.
    pub source: Source,
    /// Location key: header, cookie, query, path or form name.
    pub key: String,
    /// Declared target type.
    pub ty: FieldType,
    /// Slot of the value in the [`Bound`] tree.
    pub address: Address,
    /// Compiled constraints.
    pub constraints: ConstraintSet,
    /// Decode tree, for body descriptors.
    pub body: Option<Arc<BodyNode>>,
    /// Verifier, for bearer and basic hooks.
    pub scheme: Option<SecurityScheme>,
    /// API-key object this field is decoded into.
    pub owner: Option<Arc<KeyOwner>>,
}

impl FieldDescriptor {
    /// Whether an absent or zero value is an error.
    #[must_use]
    pub fn required(&self) -> bool {
        self.constraints.required
    }

    /// Whether this descriptor is a bearer or basic hook.
    #[must_use]
    pub fn is_hook(&self) -> bool {
        matches!(self.source, Source::Security(_))
    }

    /// Name used in error messages: the location key for request locations,
    /// the field path otherwise.
    #[must_use]
    pub fn label(&self) -> &str {
        match self.source {
            Source::Header | Source::Cookie | Source::Path | Source::Query | Source::Form
            | Source::File => &self.key,
            Source::Body(_) | Source::Security(_) => &self.name,
        }
    }
}

/// Route metadata carried by the marker field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteDescriptor {
    /// Path patterns, as written.
    pub paths: Vec<String>,
    /// HTTP methods.
    pub methods: Vec<Method>,
    /// One-line summary.
    pub summary: Option<String>,
    /// Longer description.
    pub description: Option<String>,
    /// Grouping tags.
    pub tags: Vec<String>,
    /// Whether the operation is deprecated.
    pub deprecated: bool,
}

/// Everything registration learns about one input shape.
#[derive(Debug, Clone)]
pub struct InputPlan {
    /// Shape name.
    pub shape: String,
    /// Route metadata.
    pub route: RouteDescriptor,
    /// Bindable fields in declaration order.
    pub descriptors: Vec<FieldDescriptor>,
    /// Empty value tree cloned per request.
    pub skeleton: Bound,
    /// Whether any field is a file upload.
    pub has_files: bool,
}

impl InputPlan {
    /// Path-parameter keys the input expects, with their field paths.
    pub fn path_keys(&self) -> impl Iterator<Item = (&str, &str)> {
        self.descriptors
            .iter()
            .filter(|d| d.source == Source::Path)
            .map(|d| (d.name.as_str(), d.key.as_str()))
    }

    /// Media types the body accepts, in declaration order.
    pub fn body_media(&self) -> impl Iterator<Item = MediaType> + '_ {
        self.descriptors.iter().filter_map(|d| match d.source {
            Source::Body(media) => Some(media),
            _ => None,
        })
    }
}
