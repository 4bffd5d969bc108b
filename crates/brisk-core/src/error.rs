//! Registration-time errors.
//!
//! Everything that can be wrong with a declared input shape is detected once,
//! when the handler is registered, and reported as a [`RegistrationError`].
//! These are programmer errors: the application is expected to abort startup.

/// Error raised while compiling an input shape into field descriptors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
    /// The shape has no route marker field.
    #[error("{shape}: missing route marker field")]
    MissingRoute {
        /// Shape name.
        shape: String,
    },

    /// More than one route marker field.
    #[error("{shape}: route marker declared more than once")]
    DuplicateRoute {
        /// Shape name.
        shape: String,
    },

    /// The route marker carries no `path` tag.
    #[error("{shape}: route marker has no path")]
    MissingPath {
        /// Shape name.
        shape: String,
    },

    /// The route marker carries no `method` tag.
    #[error("{shape}: route marker has no method")]
    MissingMethod {
        /// Shape name.
        shape: String,
    },

    /// A method outside GET/PUT/POST/DELETE/OPTIONS/HEAD/PATCH/TRACE.
    #[error("{shape}: unsupported method {method:?}")]
    InvalidMethod {
        /// Shape name.
        shape: String,
        /// Offending method.
        method: String,
    },

    /// A field carries two location tags.
    #[error("field {field}: multiple location tags ({first}, {second})")]
    MultipleLocations {
        /// Field path.
        field: String,
        /// First location found.
        first: String,
        /// Second location found.
        second: String,
    },

    /// The declared type cannot be bound from the declared location.
    #[error("field {field}: type {ty} cannot be bound from {location}")]
    UnsupportedType {
        /// Field path.
        field: String,
        /// Declared type name.
        ty: String,
        /// Location tag.
        location: String,
    },

    /// A declared field the input type does not have.
    #[error("{shape}: field {field} is not a field of the input type")]
    UnknownField {
        /// Shape name.
        shape: String,
        /// Declared field name.
        field: String,
    },

    /// A file field with `omitempty` that is not `Optional`.
    #[error("field {field}: optional file must be declared Optional")]
    OptionalFile {
        /// Field path.
        field: String,
    },

    /// A constraint tag that does not apply to the field type.
    #[error("field {field}: constraint {constraint} does not apply to type {ty}")]
    ConstraintMismatch {
        /// Field path.
        field: String,
        /// Constraint tag.
        constraint: String,
        /// Declared type name.
        ty: String,
    },

    /// A constraint tag whose value cannot be parsed.
    #[error("field {field}: invalid {constraint} value {value:?}: {reason}")]
    InvalidConstraint {
        /// Field path.
        field: String,
        /// Constraint tag.
        constraint: String,
        /// Tag value as written.
        value: String,
        /// Parse failure.
        reason: String,
    },

    /// `form` or `file` fields next to a `body` field.
    #[error("{shape}: body cannot be combined with form or file fields")]
    BodyWithForm {
        /// Shape name.
        shape: String,
    },

    /// More than one body field.
    #[error("{shape}: more than one body field")]
    MultipleBodies {
        /// Shape name.
        shape: String,
    },

    /// A body media type that is unknown or not accepted by configuration.
    #[error("field {field}: unsupported body media type {media:?}")]
    UnsupportedMediaType {
        /// Field path.
        field: String,
        /// Media type as written.
        media: String,
    },

    /// An API-key sub-field outside header/query/cookie.
    #[error("field {field}: api key fields must come from header, query or cookie")]
    InvalidApiKeyLocation {
        /// Field path.
        field: String,
    },

    /// An API-key scheme without any key field.
    #[error("field {field}: api key scheme declares no key fields")]
    EmptyApiKey {
        /// Field path.
        field: String,
    },

    /// A path field whose parameter is missing from a registered pattern.
    #[error("field {field}: path parameter {key} is not in pattern {pattern}")]
    UnknownPathParam {
        /// Field path.
        field: String,
        /// Parameter name.
        key: String,
        /// Pattern missing it.
        pattern: String,
    },
}

/// Result type for registration.
pub type Result<T> = std::result::Result<T, RegistrationError>;
