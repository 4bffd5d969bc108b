//! Metadata extraction, request decoding, and validation for brisk.
//!
//! Everything here is transport-independent: it consumes a
//! [`RequestContext`](brisk_model::RequestContext) plus the collected body and
//! never touches a socket.
//!
//! - **Extraction** ([`extract`]): compiles a [`Shape`](brisk_model::Shape)
//!   into an [`InputPlan`] once, at registration. Every malformed declaration
//!   is reported here as a [`RegistrationError`].
//! - **Decoding** ([`decode`]): the [`Decoder`] binds one request to a plan,
//!   field by field in declaration order, then runs security hooks.
//! - **Validation** ([`validate`]): declarative constraints
//!   ([`ConstraintSet`]) checked against converted values.
//! - **Localization** ([`locale`]): renders a [`ValidationError`] into the
//!   client's language through a [`Localizer`].
//!
//! # Flow
//!
//! ```text
//! Shape --extract--> InputPlan (cached)
//!
//! RequestContext + body
//!   -> RequestData (lazy query / cookie / form parsing)
//!   -> per descriptor: lookup -> convert -> validate -> Bound
//!   -> security hooks
//!   -> Bound::deserialize_into::<T>()
//! ```

pub mod bound;
pub mod codec;
pub mod config;
pub mod constraint;
pub mod convert;
pub mod decimal;
pub mod decode;
pub mod descriptor;
pub mod error;
pub mod extract;
pub mod locale;
pub mod multipart;
pub mod request;
pub mod validate;
pub mod violation;

pub use bound::Bound;
pub use config::{ApiConfig, DecoderConfig, MediaType};
pub use constraint::ConstraintSet;
pub use decode::Decoder;
pub use descriptor::{FieldDescriptor, InputPlan, RouteDescriptor, Source};
pub use error::RegistrationError;
pub use extract::{check_fields, extract};
pub use locale::{Catalog, English, Localizer};
pub use violation::{ValidationError, Violation};
