//! Body codecs.
//!
//! Both codecs produce a `serde_json::Value` keyed by the Rust field names
//! of the body type, guided by the compiled [`BodyNode`]: JSON keys are
//! renamed from their wire names, XML elements are mapped to object keys,
//! arrays and typed scalars.

use quick_xml::Reader;
use quick_xml::events::Event;
use serde_json::{Map, Value};

use crate::config::MediaType;
use crate::convert::{parse_scalar, zero_value};
use crate::descriptor::BodyNode;

/// Body decoding failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// The body is not well-formed.
    #[error("{0}")]
    Syntax(String),
    /// An XML text value does not fit the declared type.
    #[error("element {element}: cannot parse {input:?} as {expected}")]
    Value {
        /// Element name.
        element: String,
        /// Raw text.
        input: String,
        /// Expected type name.
        expected: String,
    },
}

/// Decode `body` in `media` according to `node`.
pub fn decode(media: MediaType, body: &[u8], node: &BodyNode) -> Result<Value, CodecError> {
    match media {
        MediaType::Json => decode_json(body, node),
        MediaType::Xml => decode_xml(body, node),
    }
}

/// Decode a JSON body, renaming wire keys to field names.
pub fn decode_json(body: &[u8], node: &BodyNode) -> Result<Value, CodecError> {
    let value: Value =
        serde_json::from_slice(body).map_err(|e| CodecError::Syntax(e.to_string()))?;
    Ok(rename(value, node))
}

fn rename(value: Value, node: &BodyNode) -> Value {
    match (value, node) {
        (value, BodyNode::Optional(inner)) => rename(value, inner),
        (Value::Array(items), BodyNode::Slice(elem)) => {
            Value::Array(items.into_iter().map(|v| rename(v, elem)).collect())
        }
        (Value::Object(map), BodyNode::Map(elem)) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, rename(v, elem)))
                .collect(),
        ),
        (Value::Object(mut map), BodyNode::Struct(fields)) => {
            let mut out = Map::with_capacity(map.len());
            for field in fields {
                if let Some(v) = map.remove(&field.wire) {
                    out.insert(field.name.clone(), rename(v, &field.node));
                }
            }
            Value::Object(out)
        }
        (value, _) => value,
    }
}

/// A parsed XML element.
#[derive(Debug, Default)]
struct Element {
    name: String,
    text: String,
    children: Vec<Element>,
}

/// Decode an XML body. The root element stands for the body value itself;
/// its name is not checked.
pub fn decode_xml(body: &[u8], node: &BodyNode) -> Result<Value, CodecError> {
    let root = parse_tree(body)?;
    element_value(&root, node)
}

fn syntax(err: impl ToString) -> CodecError {
    CodecError::Syntax(err.to_string())
}

fn parse_tree(body: &[u8]) -> Result<Element, CodecError> {
    let mut reader = Reader::from_reader(body);
    let mut stack: Vec<Element> = Vec::new();

    loop {
        match reader.read_event().map_err(syntax)? {
            Event::Start(e) => stack.push(Element {
                name: String::from_utf8_lossy(e.local_name().as_ref()).into_owned(),
                ..Element::default()
            }),
            Event::Empty(e) => {
                let element = Element {
                    name: String::from_utf8_lossy(e.local_name().as_ref()).into_owned(),
                    ..Element::default()
                };
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => return Ok(element),
                }
            }
            Event::Text(e) => {
                if let Some(current) = stack.last_mut() {
                    let decoded = e.decode().map_err(syntax)?;
                    let unescaped = quick_xml::escape::unescape(&decoded).map_err(syntax)?;
                    current.text.push_str(&unescaped);
                }
            }
            Event::CData(e) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Event::GeneralRef(e) => {
                if let Some(current) = stack.last_mut() {
                    if let Some(ch) = e.resolve_char_ref().map_err(syntax)? {
                        current.text.push(ch);
                    } else {
                        let name = e.decode().map_err(syntax)?;
                        let resolved = quick_xml::escape::resolve_predefined_entity(&name)
                            .ok_or_else(|| syntax(format!("unknown entity &{name};")))?;
                        current.text.push_str(resolved);
                    }
                }
            }
            Event::End(_) => {
                let Some(done) = stack.pop() else {
                    return Err(syntax("unbalanced end tag"));
                };
                match stack.last_mut() {
                    Some(parent) => parent.children.push(done),
                    None => return Ok(done),
                }
            }
            Event::Eof => return Err(syntax("missing root element")),
            _ => {}
        }
    }
}

fn element_value(element: &Element, node: &BodyNode) -> Result<Value, CodecError> {
    match node {
        BodyNode::Optional(inner) => element_value(element, inner),
        BodyNode::Scalar(ty) => {
            parse_scalar(element.text.trim(), ty).map_err(|_| CodecError::Value {
                element: element.name.clone(),
                input: element.text.trim().to_owned(),
                expected: ty.type_name(),
            })
        }
        BodyNode::Bytes => Ok(Value::String(element.text.trim().to_owned())),
        BodyNode::Any => Ok(any_value(element)),
        BodyNode::Slice(elem) => element
            .children
            .iter()
            .map(|child| element_value(child, elem))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        BodyNode::Map(elem) => element
            .children
            .iter()
            .map(|child| Ok((child.name.clone(), element_value(child, elem)?)))
            .collect::<Result<Map<_, _>, _>>()
            .map(Value::Object),
        BodyNode::Struct(fields) => {
            let mut out = Map::with_capacity(fields.len());
            for field in fields {
                let mut matching = element.children.iter().filter(|c| c.name == field.wire);
                let value = match field.node.deref_slice() {
                    Some(elem) => {
                        let items = matching
                            .map(|child| element_value(child, elem))
                            .collect::<Result<Vec<_>, _>>()?;
                        if items.is_empty() {
                            continue;
                        }
                        Value::Array(items)
                    }
                    None => match matching.next() {
                        Some(child) => element_value(child, &field.node)?,
                        None => continue,
                    },
                };
                out.insert(field.name.clone(), value);
            }
            Ok(Value::Object(out))
        }
    }
}

fn any_value(element: &Element) -> Value {
    if element.children.is_empty() {
        return Value::String(element.text.trim().to_owned());
    }
    let mut out = Map::new();
    for child in &element.children {
        let value = any_value(child);
        match out.get_mut(&child.name) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                out.insert(child.name.clone(), value);
            }
        }
    }
    Value::Object(out)
}

impl BodyNode {
    /// Element node if this is a (possibly optional) slice. Repeated XML
    /// elements with the same name bind to such fields.
    fn deref_slice(&self) -> Option<&BodyNode> {
        match self {
            Self::Optional(inner) => inner.deref_slice(),
            Self::Slice(elem) => Some(elem),
            _ => None,
        }
    }

    /// The value an absent or `null` field of this node decodes as, or
    /// `None` for optionals, which stay absent.
    #[must_use]
    pub fn zero(&self) -> Option<Value> {
        match self {
            Self::Scalar(ty) => zero_value(ty),
            Self::Bytes | Self::Slice(_) => Some(Value::Array(Vec::new())),
            Self::Any => Some(Value::Null),
            Self::Map(_) => Some(Value::Object(Map::new())),
            Self::Optional(_) => None,
            Self::Struct(fields) => Some(Value::Object(
                fields
                    .iter()
                    .filter_map(|f| Some((f.name.clone(), f.node.zero()?)))
                    .collect(),
            )),
        }
    }
}

/// Replace absent or `null` non-optional fields of a decoded body with their
/// zero values, so the tree deserializes into the declared type.
pub fn fill_zeros(value: &mut Value, node: &BodyNode) {
    match (value, node) {
        (Value::Null, BodyNode::Optional(_)) => {}
        (value, BodyNode::Optional(inner)) => fill_zeros(value, inner),
        (Value::Array(items), BodyNode::Slice(elem)) => {
            items.iter_mut().for_each(|item| fill_zeros(item, elem));
        }
        (Value::Object(map), BodyNode::Map(elem)) => {
            map.values_mut().for_each(|item| fill_zeros(item, elem));
        }
        (Value::Object(map), BodyNode::Struct(fields)) => {
            for field in fields {
                if let Some(item) = map.get_mut(&field.name).filter(|v| !v.is_null()) {
                    fill_zeros(item, &field.node);
                } else if let Some(zero) = field.node.zero() {
                    map.insert(field.name.clone(), zero);
                }
            }
        }
        _ => {}
    }
}
