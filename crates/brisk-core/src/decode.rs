//! The request decoder.
//!
//! For one matched request, [`Decoder::decode`] clones the plan's value
//! skeleton and fills it descriptor by descriptor, in declaration order:
//!
//! 1. plain fields (header, cookie, path, query, form, file, body) are
//!    looked up, converted and validated; the first failure aborts;
//! 2. security hooks run afterwards, so every field they may want to read is
//!    already bound. API-key verifiers run once per key object no matter how
//!    many of its fields were decoded.

use std::collections::HashSet;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use brisk_model::{BasicCredentials, FieldType, HttpError, RequestContext, SecurityScheme};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::bound::Bound;
use crate::codec;
use crate::config::{DecoderConfig, MediaType};
use crate::convert::{is_zero, parse_location};
use crate::descriptor::{FieldDescriptor, InputPlan, Source};
use crate::request::RequestData;
use crate::validate::{validate_body, validate_length, validate_value};
use crate::violation::{ValidationError, Violation};

/// Why decoding stopped.
enum Failure {
    Invalid(ValidationError),
    Http(HttpError),
}

impl From<ValidationError> for Failure {
    fn from(err: ValidationError) -> Self {
        Self::Invalid(err)
    }
}

impl From<HttpError> for Failure {
    fn from(err: HttpError) -> Self {
        Self::Http(err)
    }
}

type Step<T = ()> = Result<T, Failure>;

/// Binds requests to one input shape.
#[derive(Debug, Clone)]
pub struct Decoder {
    plan: Arc<InputPlan>,
    config: DecoderConfig,
}

impl Decoder {
    /// Create a decoder for a compiled plan.
    #[must_use]
    pub fn new(plan: InputPlan, config: DecoderConfig) -> Self {
        Self {
            plan: Arc::new(plan),
            config,
        }
    }

    /// The compiled plan.
    #[must_use]
    pub fn plan(&self) -> &InputPlan {
        &self.plan
    }

    /// A shared handle to the compiled plan.
    #[must_use]
    pub fn shared_plan(&self) -> Arc<InputPlan> {
        Arc::clone(&self.plan)
    }

    /// The configuration in effect.
    #[must_use]
    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Decode and validate `body` plus the request head into a value tree.
    pub async fn decode(&self, ctx: &RequestContext, body: &Bytes) -> Result<Bound, HttpError> {
        self.bind(ctx, body).await.map_err(|failure| match failure {
            Failure::Http(err) => err,
            Failure::Invalid(err) => {
                tracing::debug!(
                    shape = %self.plan.shape,
                    field = %err.field,
                    violation = err.violation.key(),
                    "request rejected"
                );
                self.config.to_http_error(ctx.language(), &err)
            }
        })
    }

    /// Decode into the handler's input type.
    pub async fn decode_into<T: DeserializeOwned>(
        &self,
        ctx: &RequestContext,
        body: &Bytes,
    ) -> Result<T, HttpError> {
        let bound = self.decode(ctx, body).await?;
        bound.deserialize_into().map_err(|err| {
            tracing::error!(shape = %self.plan.shape, error = %err, "input type does not match its shape");
            HttpError::internal("input binding failed")
        })
    }

    async fn bind(&self, ctx: &RequestContext, body: &Bytes) -> Step<Bound> {
        let data = RequestData::new(ctx, body, self.plan.has_files);
        let mut bound = self.plan.skeleton.clone();
        let mut selected_body: Option<Option<&FieldDescriptor>> = None;

        for desc in &self.plan.descriptors {
            match desc.source {
                Source::Security(_) => {}
                Source::Body(_) => {
                    // Media type is checked only once declaration order
                    // reaches the body.
                    let selected = match selected_body {
                        Some(selected) => selected,
                        None => *selected_body.insert(self.select_body(&data)?),
                    };
                    if selected.is_some_and(|d| std::ptr::eq(d, desc)) {
                        self.bind_body(desc, &data, &mut bound)?;
                    }
                }
                Source::File => bind_files(desc, &data, &mut bound)?,
                Source::Header | Source::Cookie | Source::Path | Source::Query | Source::Form => {
                    bind_location(desc, &data, &mut bound)?;
                }
            }
        }

        drop(data);

        let mut verified: HashSet<&[usize]> = HashSet::new();
        for desc in &self.plan.descriptors {
            if let Some(owner) = &desc.owner {
                if verified.insert(owner.address.as_slice()) {
                    let keys = bound.get(&owner.address).map_or(Value::Null, Bound::to_json);
                    let value = owner.auth.verify(ctx, keys).await?;
                    set(&mut bound, &owner.address, Bound::Value(value))?;
                }
            }
            if let Some(scheme) = &desc.scheme {
                if let Some(value) = run_hook(desc, scheme, ctx).await? {
                    set(&mut bound, &desc.address, Bound::Value(value))?;
                }
            }
        }

        Ok(bound)
    }

    fn select_body<'p>(&'p self, data: &RequestData<'_>) -> Step<Option<&'p FieldDescriptor>> {
        let mut bodies = self
            .plan
            .descriptors
            .iter()
            .filter(|d| matches!(d.source, Source::Body(_)));
        let Some(first) = bodies.next() else {
            return Ok(None);
        };
        let Some(content_type) = data.content_type() else {
            return Ok(Some(first));
        };
        if is_raw(first) || data.body().is_empty() {
            return Ok(Some(first));
        }
        let wanted = MediaType::from_content_type(content_type);
        std::iter::once(first)
            .chain(bodies)
            .find(|d| Some(d.source) == wanted.map(Source::Body))
            .map(Some)
            .ok_or_else(|| {
                ValidationError::new(
                    first.label(),
                    Violation::UnsupportedMediaType(content_type.to_owned()),
                )
                .into()
            })
    }

    fn bind_body(&self, desc: &FieldDescriptor, data: &RequestData<'_>, bound: &mut Bound) -> Step {
        let label = desc.label();
        let body = data.body();
        if body.is_empty() {
            if desc.required() {
                return Err(ValidationError::required(label).into());
            }
            return Ok(());
        }
        if is_raw(desc) {
            return set(bound, &desc.address, Bound::Bytes(body.clone()));
        }

        let (Source::Body(media), Some(node)) = (desc.source, desc.body.as_deref()) else {
            return Err(HttpError::internal("body descriptor without decode tree").into());
        };
        let mut value = codec::decode(media, body, node).map_err(|err| {
            ValidationError::new(label, Violation::MalformedBody(err.to_string()))
        })?;
        validate_body(label, &value, node)?;
        validate_value(label, &value, &desc.constraints)?;
        codec::fill_zeros(&mut value, node);
        tracing::trace!(field = label, media = %media, "decoded body");
        set(bound, &desc.address, Bound::Value(value))
    }
}

/// A body bound verbatim, whatever its content type.
fn is_raw(desc: &FieldDescriptor) -> bool {
    matches!(desc.source, Source::Body(_)) && matches!(desc.ty.deref_optional(), FieldType::Bytes)
}

fn set(bound: &mut Bound, address: &[usize], value: Bound) -> Step {
    bound
        .set(address, value)
        .map_err(|err| HttpError::internal(err.to_string()).into())
}

fn bind_location(desc: &FieldDescriptor, data: &RequestData<'_>, bound: &mut Bound) -> Step {
    let label = desc.label();
    let raw: Vec<&str> = match desc.source {
        Source::Header => data.header(&desc.key),
        Source::Cookie => data.cookie(&desc.key),
        Source::Path => data.path(&desc.key),
        Source::Query => data.query(&desc.key),
        _ => data.form(&desc.key)?,
    };
    let mut raw: Vec<&str> = raw.into_iter().filter(|v| !v.is_empty()).collect();

    if raw.is_empty() {
        match &desc.constraints.default {
            Some(default) => raw.push(default),
            None if desc.required() => return Err(ValidationError::required(label).into()),
            None => return Ok(()),
        }
    }

    let value = parse_location(&raw, &desc.ty).map_err(|v| ValidationError::new(label, v))?;
    if desc.required() && is_zero(&value) {
        return Err(ValidationError::required(label).into());
    }
    validate_value(label, &value, &desc.constraints)?;
    set(bound, &desc.address, Bound::Value(value))
}

fn bind_files(desc: &FieldDescriptor, data: &RequestData<'_>, bound: &mut Bound) -> Step {
    let label = desc.label();
    let files = data.files(&desc.key)?;
    if files.is_empty() {
        if desc.required() {
            return Err(ValidationError::required(label).into());
        }
        return Ok(());
    }
    match desc.ty.deref_optional() {
        FieldType::Files => {
            validate_length(label, files.len(), &desc.constraints)?;
            set(
                bound,
                &desc.address,
                Bound::Files(files.into_iter().cloned().collect()),
            )
        }
        _ => set(bound, &desc.address, Bound::File(files[0].clone())),
    }
}

/// Credentials after `scheme ` in an `Authorization` header.
fn credentials<'h>(header: &'h str, scheme: &str) -> Option<&'h str> {
    let (name, rest) = header.trim().split_once(' ')?;
    let rest = rest.trim();
    (name.eq_ignore_ascii_case(scheme) && !rest.is_empty()).then_some(rest)
}

fn basic_credentials(encoded: &str) -> Option<BasicCredentials> {
    let decoded = STANDARD.decode(encoded).ok()?;
    let text = String::from_utf8(decoded).ok()?;
    let (username, password) = text.split_once(':')?;
    Some(BasicCredentials {
        username: username.to_owned(),
        password: password.to_owned(),
    })
}

async fn run_hook(
    desc: &FieldDescriptor,
    scheme: &SecurityScheme,
    ctx: &RequestContext,
) -> Step<Option<Value>> {
    let header = ctx.header(&desc.key);
    match scheme {
        SecurityScheme::Bearer(auth) => {
            let Some(token) = header.and_then(|h| credentials(h, "Bearer")) else {
                return missing(desc, "missing bearer token");
            };
            Ok(Some(auth.verify(ctx, token).await?))
        }
        SecurityScheme::Basic(auth) => {
            let Some(encoded) = header.and_then(|h| credentials(h, "Basic")) else {
                return missing(desc, "missing basic credentials");
            };
            let creds = basic_credentials(encoded)
                .ok_or_else(|| HttpError::unauthorized("invalid basic credentials"))?;
            Ok(Some(auth.verify(ctx, &creds).await?))
        }
        SecurityScheme::ApiKey { .. } => Ok(None),
    }
}

fn missing(desc: &FieldDescriptor, detail: &str) -> Step<Option<Value>> {
    if desc.required() {
        Err(HttpError::unauthorized(detail).into())
    } else {
        Ok(None)
    }
}
