//! The metadata extractor.
//!
//! [`extract`] walks an input [`Shape`] once, at registration, and compiles it
//! into an [`InputPlan`]:
//!
//! - the route marker becomes a [`RouteDescriptor`];
//! - every field with a location tag becomes a [`FieldDescriptor`] whose
//!   address is the chain of field indices from the root;
//! - untagged struct fields are expanded in place (mix-ins), composing their
//!   children's addresses with their own;
//! - security fields become hooks (bearer, basic) or are expanded into their
//!   key fields (API key);
//! - body fields get one descriptor per accepted media type.
//!
//! All type and constraint checks happen here; a plan that compiles never
//! fails at request time for structural reasons.

use std::collections::HashSet;
use std::sync::Arc;

use brisk_model::{Field, FieldType, SecurityScheme, Shape, Tags};
use http::Method;
use serde::de::DeserializeOwned;

use crate::bound::{Bound, Zero, struct_fields};
use crate::config::{DecoderConfig, MediaType};
use crate::constraint::ConstraintSet;
use crate::convert::zero_value;
use crate::descriptor::{
    BodyField, BodyNode, FieldDescriptor, InputPlan, KeyOwner, LocationTag, RouteDescriptor,
    Source,
};
use crate::error::{RegistrationError, Result};

const LOCATIONS: [&str; 7] = ["header", "cookie", "path", "query", "body", "form", "file"];

const METHODS: [&str; 8] = [
    "GET", "PUT", "POST", "DELETE", "OPTIONS", "HEAD", "PATCH", "TRACE",
];

/// Check that every top-level field `shape` declares is a serde field of `T`.
///
/// Nested struct shapes are not checked; their Rust types are not known here.
pub fn check_fields<T: DeserializeOwned>(shape: &Shape) -> Result<()> {
    let Some(known) = struct_fields::<T>() else {
        return Ok(());
    };
    match shape
        .fields()
        .iter()
        .find(|f| !matches!(f.ty(), FieldType::Route) && !known.contains(&f.name()))
    {
        Some(field) => Err(RegistrationError::UnknownField {
            shape: shape.name().to_owned(),
            field: field.name().to_owned(),
        }),
        None => Ok(()),
    }
}

/// Compile `shape` into an [`InputPlan`].
pub fn extract(shape: &Shape, config: &DecoderConfig) -> Result<InputPlan> {
    let mut walker = Walker {
        config,
        shape: shape.name(),
        route: None,
        descriptors: Vec::new(),
        has_files: false,
    };
    let skeleton = walker.walk(shape, &[], "", None)?;
    let route = walker.route.ok_or_else(|| RegistrationError::MissingRoute {
        shape: shape.name().to_owned(),
    })?;
    let descriptors = walker.descriptors;

    let bodies: HashSet<&[usize]> = descriptors
        .iter()
        .filter(|d| matches!(d.source, Source::Body(_)))
        .map(|d| d.address.as_slice())
        .collect();
    if bodies.len() > 1 {
        return Err(RegistrationError::MultipleBodies {
            shape: shape.name().to_owned(),
        });
    }
    let has_form = descriptors
        .iter()
        .any(|d| matches!(d.source, Source::Form | Source::File));
    if !bodies.is_empty() && has_form {
        return Err(RegistrationError::BodyWithForm {
            shape: shape.name().to_owned(),
        });
    }

    tracing::debug!(
        shape = %shape.name(),
        fields = descriptors.len(),
        paths = ?route.paths,
        "extracted input shape"
    );

    Ok(InputPlan {
        shape: shape.name().to_owned(),
        route,
        descriptors,
        skeleton,
        has_files: walker.has_files,
    })
}

struct Walker<'a> {
    config: &'a DecoderConfig,
    shape: &'a str,
    route: Option<RouteDescriptor>,
    descriptors: Vec<FieldDescriptor>,
    has_files: bool,
}

impl Walker<'_> {
    fn walk(
        &mut self,
        shape: &Shape,
        prefix: &[usize],
        path: &str,
        owner: Option<&Arc<KeyOwner>>,
    ) -> Result<Bound> {
        let mut slots = Vec::with_capacity(shape.fields().len());
        for (idx, field) in shape.fields().iter().enumerate() {
            let mut address = prefix.to_vec();
            address.push(idx);
            let name = if path.is_empty() {
                field.name().to_owned()
            } else {
                format!("{path}.{}", field.name())
            };
            let slot = self.field(field, address, name, owner)?;
            slots.push((Arc::from(field.name()), slot));
        }
        Ok(Bound::Struct {
            fields: slots,
            optional: false,
        })
    }

    fn field(
        &mut self,
        field: &Field,
        address: Vec<usize>,
        name: String,
        owner: Option<&Arc<KeyOwner>>,
    ) -> Result<Bound> {
        let ty = field.ty();
        if matches!(ty, FieldType::Route) {
            if address.len() != 1 || self.route.is_some() {
                return Err(RegistrationError::DuplicateRoute {
                    shape: self.shape.to_owned(),
                });
            }
            self.route = Some(self.route_descriptor(field.tags())?);
            return Ok(Bound::Skip);
        }

        match (location_of(field, &name)?, ty.deref_optional()) {
            (Some((location, _)), FieldType::Security(_)) => Err(unsupported(&name, ty, location)),
            (None, FieldType::Security(scheme)) => {
                if owner.is_some() {
                    return Err(unsupported(&name, ty, "apiKey"));
                }
                self.security(ty, scheme, address, name)
            }
            (Some((location, value)), _) => {
                self.location(field, location, value, address, name, owner)
            }
            (None, FieldType::Struct(sub)) => {
                let mut slot = self.walk(sub, &address, &name, owner)?;
                if let Bound::Struct { optional, .. } = &mut slot {
                    *optional = ty.is_optional();
                }
                Ok(slot)
            }
            (None, _) => Ok(Bound::Absent(zero_for(ty))),
        }
    }

    fn location(
        &mut self,
        field: &Field,
        location: &'static str,
        value: &str,
        address: Vec<usize>,
        name: String,
        owner: Option<&Arc<KeyOwner>>,
    ) -> Result<Bound> {
        let ty = field.ty();
        let target = ty.deref_optional();
        let source = match location {
            "header" => Source::Header,
            "cookie" => Source::Cookie,
            "query" => Source::Query,
            "path" => Source::Path,
            "form" => Source::Form,
            "file" => Source::File,
            _ => return self.body(field, value, address, name, owner),
        };
        if owner.is_some() && !matches!(source, Source::Header | Source::Query | Source::Cookie) {
            return Err(RegistrationError::InvalidApiKeyLocation { field: name });
        }

        let tag = LocationTag::parse(value, field.name());
        if source == Source::File {
            if !matches!(target, FieldType::File | FieldType::Files) {
                return Err(unsupported(&name, ty, location));
            }
            if tag.omitempty && matches!(target, FieldType::File) && !ty.is_optional() {
                return Err(RegistrationError::OptionalFile { field: name });
            }
            self.has_files = true;
        } else if !is_simple(target) {
            return Err(unsupported(&name, ty, location));
        }

        let required = !tag.omitempty && !ty.is_optional();
        let constraints = ConstraintSet::compile(&name, ty, field.tags(), required)?;
        self.descriptors.push(FieldDescriptor {
            name,
            source,
            key: tag.key,
            ty: ty.clone(),
            address,
            constraints,
            body: None,
            scheme: None,
            owner: owner.cloned(),
        });
        Ok(Bound::Absent(zero_for(ty)))
    }

    fn body(
        &mut self,
        field: &Field,
        value: &str,
        address: Vec<usize>,
        name: String,
        owner: Option<&Arc<KeyOwner>>,
    ) -> Result<Bound> {
        let ty = field.ty();
        if owner.is_some() {
            return Err(RegistrationError::InvalidApiKeyLocation { field: name });
        }

        let mut omitempty = false;
        let mut media_types = Vec::new();
        for token in value.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            if token == "omitempty" {
                omitempty = true;
                continue;
            }
            let media = token
                .parse::<MediaType>()
                .ok()
                .filter(|m| self.config.accepts(*m))
                .ok_or_else(|| RegistrationError::UnsupportedMediaType {
                    field: name.clone(),
                    media: token.to_owned(),
                })?;
            if !media_types.contains(&media) {
                media_types.push(media);
            }
        }
        if media_types.is_empty() {
            media_types.clone_from(&self.config.media_types);
        }

        let required = !omitempty && !ty.is_optional();
        let constraints = ConstraintSet::compile(&name, ty, field.tags(), required)?;
        let mut zero = zero_for(ty);
        for media in media_types {
            let node = body_node(ty, media, &name)?;
            if zero == Zero::None {
                zero = node.zero().map_or(Zero::None, Zero::Value);
            }
            self.descriptors.push(FieldDescriptor {
                name: name.clone(),
                source: Source::Body(media),
                key: field.name().to_owned(),
                ty: ty.clone(),
                address: address.clone(),
                constraints: constraints.clone(),
                body: Some(Arc::new(node)),
                scheme: None,
                owner: None,
            });
        }
        Ok(Bound::Absent(zero))
    }

    fn security(
        &mut self,
        ty: &FieldType,
        scheme: &SecurityScheme,
        address: Vec<usize>,
        name: String,
    ) -> Result<Bound> {
        match scheme {
            SecurityScheme::ApiKey { shape, auth } => {
                let owner = Arc::new(KeyOwner {
                    address: address.clone(),
                    field: name.clone(),
                    auth: Arc::clone(auth),
                });
                let before = self.descriptors.len();
                let slot = self.walk(shape, &address, &name, Some(&owner))?;
                if self.descriptors.len() == before {
                    return Err(RegistrationError::EmptyApiKey { field: name });
                }
                Ok(slot)
            }
            SecurityScheme::Bearer(_) | SecurityScheme::Basic(_) => {
                self.descriptors.push(FieldDescriptor {
                    name,
                    source: Source::Security(scheme.kind()),
                    key: http::header::AUTHORIZATION.as_str().to_owned(),
                    ty: ty.clone(),
                    address,
                    constraints: ConstraintSet {
                        required: !ty.is_optional(),
                        ..ConstraintSet::default()
                    },
                    body: None,
                    scheme: Some(scheme.clone()),
                    owner: None,
                });
                Ok(Bound::Absent(Zero::None))
            }
        }
    }

    fn route_descriptor(&self, tags: &Tags) -> Result<RouteDescriptor> {
        let split = |value: &str| -> Vec<String> {
            value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .collect()
        };

        let paths = tags.get("path").map(split).unwrap_or_default();
        if paths.is_empty() {
            return Err(RegistrationError::MissingPath {
                shape: self.shape.to_owned(),
            });
        }

        let mut methods = Vec::new();
        for method in tags.get("method").map(split).unwrap_or_default() {
            let upper = method.to_ascii_uppercase();
            let parsed = METHODS
                .contains(&upper.as_str())
                .then(|| Method::from_bytes(upper.as_bytes()).ok())
                .flatten()
                .ok_or_else(|| RegistrationError::InvalidMethod {
                    shape: self.shape.to_owned(),
                    method: method.clone(),
                })?;
            if !methods.contains(&parsed) {
                methods.push(parsed);
            }
        }
        if methods.is_empty() {
            return Err(RegistrationError::MissingMethod {
                shape: self.shape.to_owned(),
            });
        }

        Ok(RouteDescriptor {
            paths,
            methods,
            summary: tags.get("summary").map(str::to_owned),
            description: tags.get("desc").map(str::to_owned),
            tags: tags.get("tags").map(split).unwrap_or_default(),
            deprecated: tags
                .get("deprecated")
                .is_some_and(|v| v.is_empty() || v == "true"),
        })
    }
}

/// The single location tag on `field`, in declaration order.
fn location_of<'f>(field: &'f Field, name: &str) -> Result<Option<(&'static str, &'f str)>> {
    let mut found: Option<(&'static str, &str)> = None;
    for (key, value) in field.tags().iter() {
        let Some(&location) = LOCATIONS.iter().find(|l| **l == key) else {
            continue;
        };
        if let Some((first, _)) = found {
            return Err(RegistrationError::MultipleLocations {
                field: name.to_owned(),
                first: first.to_owned(),
                second: key.to_owned(),
            });
        }
        found = Some((location, value));
    }
    Ok(found)
}

fn is_simple(ty: &FieldType) -> bool {
    match ty {
        FieldType::Slice(elem) => elem.deref_optional().is_scalar(),
        other => other.is_scalar(),
    }
}

fn unsupported(field: &str, ty: &FieldType, location: &str) -> RegistrationError {
    RegistrationError::UnsupportedType {
        field: field.to_owned(),
        ty: ty.type_name(),
        location: location.to_owned(),
    }
}

fn zero_for(ty: &FieldType) -> Zero {
    match ty {
        FieldType::Bytes => Zero::Bytes,
        FieldType::Files => Zero::Files,
        other => zero_value(other).map_or(Zero::None, Zero::Value),
    }
}

fn body_node(ty: &FieldType, media: MediaType, path: &str) -> Result<BodyNode> {
    Ok(match ty {
        FieldType::Bool
        | FieldType::Int(_)
        | FieldType::Uint(_)
        | FieldType::Float(_)
        | FieldType::String => BodyNode::Scalar(ty.clone()),
        FieldType::Bytes => BodyNode::Bytes,
        FieldType::Any => BodyNode::Any,
        FieldType::Slice(elem) => BodyNode::Slice(Box::new(body_node(elem, media, path)?)),
        FieldType::Map(value) => BodyNode::Map(Box::new(body_node(value, media, path)?)),
        FieldType::Optional(inner) => BodyNode::Optional(Box::new(body_node(inner, media, path)?)),
        FieldType::Struct(shape) => {
            let mut fields = Vec::with_capacity(shape.fields().len());
            for field in shape.fields() {
                let tag = field.tags().get(media.as_str()).unwrap_or_default();
                if tag == "-" {
                    continue;
                }
                let name = format!("{path}.{}", field.name());
                let tag = LocationTag::parse(tag, field.name());
                let required = !tag.omitempty && !field.ty().is_optional();
                fields.push(BodyField {
                    name: field.name().to_owned(),
                    wire: tag.key,
                    ty: field.ty().clone(),
                    constraints: ConstraintSet::compile(&name, field.ty(), field.tags(), required)?,
                    node: body_node(field.ty(), media, &name)?,
                });
            }
            BodyNode::Struct(fields)
        }
        FieldType::File | FieldType::Files | FieldType::Security(_) | FieldType::Route => {
            return Err(unsupported(path, ty, "body"));
        }
    })
}
