//! Declared input shapes.
//!
//! A [`Shape`] is the registration-time description of a handler's input type:
//! an ordered list of [`Field`]s, each with a [`FieldType`] and a set of
//! [`Tags`] that say where the value comes from (`header`, `query`, `path`,
//! `cookie`, `body`, `form`, `file`) and which constraints it must satisfy.
//!
//! Shapes are plain data. They are walked exactly once, when a handler is
//! registered, and compiled into field descriptors; request-time code never
//! looks at them again.
//!
//! ```
//! use brisk_model::shape::{Bits, Field, FieldType, Shape};
//!
//! let shape = Shape::new("GetUser")
//!     .field(Field::route().tag("path", "/users/{id}").tag("method", "GET"))
//!     .field(Field::new("id", FieldType::Uint(Bits::B64)).tag("path", "id"))
//!     .field(
//!         Field::new("verbose", FieldType::Bool)
//!             .tag("query", "verbose,omitempty"),
//!     );
//!
//! assert_eq!(shape.fields().len(), 3);
//! assert_eq!(shape.fields()[1].tags().get("path"), Some("id"));
//! ```

use std::fmt;

use serde::de::DeserializeOwned;

use crate::security::SecurityScheme;

/// A type that can be bound from an HTTP request.
///
/// The shape is consulted once at registration; the type itself is produced at
/// request time by deserializing the bound value tree.
pub trait Input: DeserializeOwned + Send + 'static {
    /// Describe the fields of this input and where each one comes from.
    fn shape() -> Shape;
}

/// Bit width of a numeric field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bits {
    /// 8-bit.
    B8,
    /// 16-bit.
    B16,
    /// 32-bit.
    B32,
    /// 64-bit (also used for `isize`/`usize`).
    B64,
}

impl Bits {
    /// Number of bits.
    #[must_use]
    pub fn width(self) -> u32 {
        match self {
            Self::B8 => 8,
            Self::B16 => 16,
            Self::B32 => 32,
            Self::B64 => 64,
        }
    }
}

/// The declared type of a field.
#[derive(Debug, Clone)]
pub enum FieldType {
    /// `bool`.
    Bool,
    /// Signed integer of the given width.
    Int(Bits),
    /// Unsigned integer of the given width.
    Uint(Bits),
    /// Floating point number of the given width (32 or 64).
    Float(Bits),
    /// UTF-8 string.
    String,
    /// Raw bytes (`bytes::Bytes`); as a body this bypasses the codecs.
    Bytes,
    /// Sequence of values.
    Slice(Box<FieldType>),
    /// String-keyed map.
    Map(Box<FieldType>),
    /// Optional value: absent stays `None`, present allocates the inner value.
    Optional(Box<FieldType>),
    /// Nested struct.
    Struct(Shape),
    /// A single uploaded file.
    File,
    /// Multiple uploaded files under one form name.
    Files,
    /// Arbitrary JSON value (`serde_json::Value`).
    Any,
    /// Security capability resolved by a verifier instead of decoded.
    Security(SecurityScheme),
    /// Route marker carrying path, method and documentation tags.
    Route,
}

impl FieldType {
    /// Shorthand for [`FieldType::Slice`].
    #[must_use]
    pub fn slice(elem: FieldType) -> Self {
        Self::Slice(Box::new(elem))
    }

    /// Shorthand for [`FieldType::Map`].
    #[must_use]
    pub fn map(value: FieldType) -> Self {
        Self::Map(Box::new(value))
    }

    /// Shorthand for [`FieldType::Optional`].
    #[must_use]
    pub fn optional(inner: FieldType) -> Self {
        Self::Optional(Box::new(inner))
    }

    /// Strip every `Optional` layer.
    #[must_use]
    pub fn deref_optional(&self) -> &FieldType {
        let mut ty = self;
        while let Self::Optional(inner) = ty {
            ty = inner;
        }
        ty
    }

    /// Whether the outermost layer is `Optional`.
    #[must_use]
    pub fn is_optional(&self) -> bool {
        matches!(self, Self::Optional(_))
    }

    /// Whether this is a boolean, numeric, or string type.
    #[must_use]
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Self::Bool | Self::Int(_) | Self::Uint(_) | Self::Float(_) | Self::String
        )
    }

    /// Whether this is a numeric type.
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Int(_) | Self::Uint(_) | Self::Float(_))
    }

    /// Whether a length (bytes, items or keys) can be measured.
    #[must_use]
    pub fn has_length(&self) -> bool {
        matches!(
            self,
            Self::String | Self::Bytes | Self::Slice(_) | Self::Map(_) | Self::Files
        )
    }

    /// Short human-readable name used in error messages.
    #[must_use]
    pub fn type_name(&self) -> String {
        match self {
            Self::Bool => "bool".to_owned(),
            Self::Int(bits) => format!("int{}", bits.width()),
            Self::Uint(bits) => format!("uint{}", bits.width()),
            Self::Float(bits) => format!("float{}", bits.width()),
            Self::String => "string".to_owned(),
            Self::Bytes => "bytes".to_owned(),
            Self::Slice(elem) => format!("[]{}", elem.type_name()),
            Self::Map(value) => format!("map[string]{}", value.type_name()),
            Self::Optional(inner) => format!("*{}", inner.type_name()),
            Self::Struct(shape) => shape.name().to_owned(),
            Self::File => "file".to_owned(),
            Self::Files => "[]file".to_owned(),
            Self::Any => "any".to_owned(),
            Self::Security(scheme) => format!("security:{}", scheme.kind()),
            Self::Route => "route".to_owned(),
        }
    }
}

/// Ordered field annotations, the equivalent of struct tags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tags(Vec<(String, String)>);

impl Tags {
    /// Create an empty tag set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a tag.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        if let Some(slot) = self.0.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.0.push((key, value));
        }
    }

    /// Look up a tag value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Whether the tag is present.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.0.iter().any(|(k, _)| k == key)
    }

    /// Iterate tags in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of tags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no tags.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One declared field of a [`Shape`].
#[derive(Debug, Clone)]
pub struct Field {
    name: String,
    ty: FieldType,
    tags: Tags,
}

impl Field {
    /// Name used for the route marker field.
    pub const ROUTE_NAME: &str = "__route";

    /// Create a field. `name` must match the serde name of the Rust field.
    #[must_use]
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
            tags: Tags::new(),
        }
    }

    /// Create the route marker field.
    #[must_use]
    pub fn route() -> Self {
        Self::new(Self::ROUTE_NAME, FieldType::Route)
    }

    /// Attach a tag.
    #[must_use]
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key, value);
        self
    }

    /// Field name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared type.
    #[must_use]
    pub fn ty(&self) -> &FieldType {
        &self.ty
    }

    /// Tags attached to this field.
    #[must_use]
    pub fn tags(&self) -> &Tags {
        &self.tags
    }
}

/// A declared struct: a name plus its fields in declaration order.
#[derive(Debug, Clone)]
pub struct Shape {
    name: String,
    fields: Vec<Field>,
}

impl Shape {
    /// Create an empty shape.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Append a field.
    #[must_use]
    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Shape name, used in diagnostics.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fields in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
