//! The per-request value tree.
//!
//! At registration the extractor builds a [`Bound`] skeleton mirroring the
//! input shape: one slot per declared field, nested structs as
//! [`Bound::Struct`]. At request time the decoder clones the skeleton and
//! writes decoded values into it by [`Address`](crate::descriptor::Address),
//! never by name. The finished tree is then turned into the handler's input
//! type through its [`serde::Deserializer`] implementation.
//!
//! Absent optional leaves deserialize as `None`; absent required leaves
//! deserialize as their zero value.

use std::fmt;
use std::sync::Arc;

use brisk_model::UploadedFile;
use bytes::Bytes;
use serde::de::value::{MapDeserializer, SeqDeserializer};
use serde::Deserializer;
use serde::de::{self, IntoDeserializer, Visitor};
use serde_json::Value;

/// The zero value an absent slot deserializes as.
#[derive(Debug, Clone, PartialEq)]
pub enum Zero {
    /// Nothing: the slot deserializes as `None` (or is skipped).
    None,
    /// A JSON zero such as `0`, `false`, `""`, `[]` or `{}`.
    Value(Value),
    /// Empty bytes.
    Bytes,
    /// No files.
    Files,
}

/// One slot of the value tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Bound {
    /// Not set by the request.
    Absent(Zero),
    /// A decoded scalar, collection or body value.
    Value(Value),
    /// Raw bytes (a bytes body).
    Bytes(Bytes),
    /// One uploaded file.
    File(UploadedFile),
    /// Several uploaded files under one name.
    Files(Vec<UploadedFile>),
    /// A nested struct, fields in declaration order.
    Struct {
        /// Field name and slot pairs.
        fields: Vec<(Arc<str>, Bound)>,
        /// Whether the struct itself is optional.
        optional: bool,
    },
    /// The route marker: never emitted.
    Skip,
}

/// Failure to reach a slot or to build the handler input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct BindError(String);

impl de::Error for BindError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Self(msg.to_string())
    }
}

impl From<serde_json::Error> for BindError {
    fn from(err: serde_json::Error) -> Self {
        Self(err.to_string())
    }
}

impl Bound {
    /// Whether the slot, or any leaf below it, holds a request value.
    #[must_use]
    pub fn is_present(&self) -> bool {
        match self {
            Self::Absent(_) | Self::Skip => false,
            Self::Value(_) | Self::Bytes(_) | Self::File(_) | Self::Files(_) => true,
            Self::Struct { fields, .. } => fields.iter().any(|(_, b)| b.is_present()),
        }
    }

    /// Slot at `address`.
    #[must_use]
    pub fn get(&self, address: &[usize]) -> Option<&Bound> {
        address.iter().try_fold(self, |node, &idx| match node {
            Self::Struct { fields, .. } => fields.get(idx).map(|(_, b)| b),
            _ => None,
        })
    }

    /// Mutable slot at `address`.
    pub fn get_mut(&mut self, address: &[usize]) -> Option<&mut Bound> {
        address.iter().try_fold(self, |node, &idx| match node {
            Self::Struct { fields, .. } => fields.get_mut(idx).map(|(_, b)| b),
            _ => None,
        })
    }

    /// Replace the slot at `address`.
    pub fn set(&mut self, address: &[usize], value: Bound) -> Result<(), BindError> {
        let slot = self
            .get_mut(address)
            .ok_or_else(|| BindError(format!("no slot at address {address:?}")))?;
        *slot = value;
        Ok(())
    }

    /// JSON view of the present parts of the tree.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Absent(Zero::Value(v)) | Self::Value(v) => v.clone(),
            Self::Absent(_) | Self::Skip => Value::Null,
            Self::Bytes(b) => Value::String(String::from_utf8_lossy(b).into_owned()),
            Self::File(f) => Value::String(f.filename.clone()),
            Self::Files(files) => files
                .iter()
                .map(|f| Value::String(f.filename.clone()))
                .collect(),
            Self::Struct { fields, .. } => Value::Object(
                fields
                    .iter()
                    .filter(|(_, b)| b.is_emitted())
                    .map(|(k, b)| (k.to_string(), b.to_json()))
                    .collect(),
            ),
        }
    }

    /// Build the handler input from this tree.
    pub fn deserialize_into<T: de::DeserializeOwned>(self) -> Result<T, BindError> {
        T::deserialize(self)
    }

    fn is_emitted(&self) -> bool {
        match self {
            Self::Absent(Zero::None) | Self::Skip => false,
            Self::Struct { optional: true, .. } => self.is_present(),
            _ => true,
        }
    }

    fn is_none(&self) -> bool {
        match self {
            Self::Value(Value::Null) | Self::Absent(Zero::None) | Self::Skip => true,
            Self::Struct { optional, .. } => *optional && !self.is_present(),
            _ => false,
        }
    }
}

fn file_entries(file: UploadedFile) -> Vec<(&'static str, Bound)> {
    let content_type = file
        .content_type
        .map_or(Bound::Absent(Zero::None), |ct| Bound::Value(Value::String(ct)));
    vec![
        ("filename", Bound::Value(Value::String(file.filename))),
        ("content_type", content_type),
        ("data", Bound::Bytes(file.data)),
    ]
}

fn visit_entries<'de, K, I, V>(entries: I, visitor: V) -> Result<V::Value, BindError>
where
    K: IntoDeserializer<'de, BindError>,
    I: Iterator<Item = (K, Bound)>,
    V: Visitor<'de>,
{
    let mut map: MapDeserializer<'de, I, BindError> = MapDeserializer::new(entries);
    let value = visitor.visit_map(&mut map)?;
    map.end()?;
    Ok(value)
}

fn visit_items<'de, V: Visitor<'de>>(
    items: impl Iterator<Item = Bound>,
    visitor: V,
) -> Result<V::Value, BindError> {
    let mut seq: SeqDeserializer<_, BindError> = SeqDeserializer::new(items);
    let value = visitor.visit_seq(&mut seq)?;
    seq.end()?;
    Ok(value)
}

impl<'de> IntoDeserializer<'de, BindError> for Bound {
    type Deserializer = Self;

    fn into_deserializer(self) -> Self {
        self
    }
}

impl<'de> Deserializer<'de> for Bound {
    type Error = BindError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        match self {
            Self::Value(v) | Self::Absent(Zero::Value(v)) => {
                v.deserialize_any(visitor).map_err(BindError::from)
            }
            Self::Absent(Zero::None) | Self::Skip => visitor.visit_unit(),
            Self::Absent(Zero::Bytes) => visitor.visit_bytes(&[]),
            Self::Absent(Zero::Files) => visit_items(std::iter::empty(), visitor),
            Self::Bytes(b) => visitor.visit_bytes(&b),
            Self::File(f) => visit_entries(file_entries(f).into_iter(), visitor),
            Self::Files(files) => visit_items(files.into_iter().map(Self::File), visitor),
            Self::Struct { fields, .. } => visit_entries(
                fields
                    .into_iter()
                    .filter(|(_, b)| b.is_emitted())
                    .map(|(k, b)| (k.to_string(), b)),
                visitor,
            ),
        }
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        if self.is_none() {
            visitor.visit_none()
        } else {
            visitor.visit_some(self)
        }
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, BindError> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, BindError> {
        match self {
            Self::Value(v) | Self::Absent(Zero::Value(v)) => v
                .deserialize_enum(name, variants, visitor)
                .map_err(BindError::from),
            other => other.deserialize_any(visitor),
        }
    }

    serde::forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf unit unit_struct seq tuple tuple_struct map struct
        identifier ignored_any
    }
}

/// Serde field names of `T`, if `T` deserializes as a plain struct.
///
/// Derived `Deserialize` impls hand their field list to
/// `deserialize_struct`; that call is intercepted and deserialization stops
/// right there. Types deserialized any other way (maps, flattened structs,
/// hand-written impls) yield `None`.
#[must_use]
pub fn struct_fields<T: de::DeserializeOwned>() -> Option<&'static [&'static str]> {
    let mut fields = None;
    let _ = T::deserialize(FieldNames(&mut fields));
    fields
}

struct FieldNames<'a>(&'a mut Option<&'static [&'static str]>);

impl<'de> Deserializer<'de> for FieldNames<'_> {
    type Error = BindError;

    fn deserialize_any<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, BindError> {
        Err(BindError("not a struct".to_owned()))
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        _visitor: V,
    ) -> Result<V::Value, BindError> {
        *self.0 = Some(fields);
        Err(BindError("field names collected".to_owned()))
    }

    serde::forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf option unit unit_struct newtype_struct seq tuple
        tuple_struct map enum identifier ignored_any
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    fn object(fields: Vec<(&str, Bound)>) -> Bound {
        Bound::Struct {
            fields: fields.into_iter().map(|(k, b)| (Arc::from(k), b)).collect(),
            optional: false,
        }
    }

    #[derive(Debug, Deserialize)]
    struct Paging {
        page: u32,
        size: Option<u32>,
    }

    #[derive(Debug, Deserialize)]
    struct Query {
        n: i64,
        name: String,
        tags: Vec<String>,
        limit: Option<i32>,
        paging: Paging,
        extra: Option<Paging>,
    }

    #[test]
    fn test_should_deserialize_zero_values_and_none() {
        let tree = object(vec![
            ("n", Bound::Value(Value::from(42))),
            ("name", Bound::Absent(Zero::Value(Value::from("")))),
            ("tags", Bound::Absent(Zero::Value(Value::Array(vec![])))),
            ("limit", Bound::Absent(Zero::None)),
            (
                "paging",
                object(vec![
                    ("page", Bound::Absent(Zero::Value(Value::from(0)))),
                    ("size", Bound::Absent(Zero::None)),
                ]),
            ),
            (
                "extra",
                Bound::Struct {
                    fields: vec![(Arc::from("page"), Bound::Absent(Zero::Value(Value::from(0))))],
                    optional: true,
                },
            ),
        ]);
        let query: Query = tree.deserialize_into().unwrap();
        assert_eq!(query.n, 42);
        assert_eq!(query.name, "");
        assert!(query.tags.is_empty());
        assert_eq!(query.limit, None);
        assert_eq!(query.paging.page, 0);
        assert_eq!(query.paging.size, None);
        assert!(query.extra.is_none());
    }

    #[test]
    fn test_should_allocate_optional_struct_when_any_leaf_present() {
        let tree = object(vec![(
            "extra",
            Bound::Struct {
                fields: vec![
                    (Arc::from("page"), Bound::Value(Value::from(3))),
                    (Arc::from("size"), Bound::Absent(Zero::None)),
                ],
                optional: true,
            },
        )]);

        #[derive(Deserialize)]
        struct Outer {
            extra: Option<Paging>,
        }
        let outer: Outer = tree.deserialize_into().unwrap();
        assert_eq!(outer.extra.map(|p| p.page), Some(3));
    }

    #[test]
    fn test_should_deserialize_files_and_bytes() {
        #[derive(Deserialize)]
        struct Upload {
            avatar: UploadedFile,
            attachments: Vec<UploadedFile>,
            raw: Bytes,
        }
        let file = UploadedFile {
            filename: "a.png".into(),
            content_type: Some("image/png".into()),
            data: Bytes::from_static(b"png"),
        };
        let tree = object(vec![
            ("avatar", Bound::File(file.clone())),
            ("attachments", Bound::Absent(Zero::Files)),
            ("raw", Bound::Bytes(Bytes::from_static(b"xyz"))),
        ]);
        let upload: Upload = tree.deserialize_into().unwrap();
        assert_eq!(upload.avatar, file);
        assert!(upload.attachments.is_empty());
        assert_eq!(upload.raw.as_ref(), b"xyz");
    }

    #[test]
    fn test_should_set_and_get_by_address() {
        let mut tree = object(vec![
            ("a", Bound::Absent(Zero::None)),
            ("b", object(vec![("c", Bound::Absent(Zero::None))])),
        ]);
        tree.set(&[1, 0], Bound::Value(Value::from("x"))).unwrap();
        assert_eq!(tree.get(&[1, 0]), Some(&Bound::Value(Value::from("x"))));
        assert!(tree.set(&[0, 3], Bound::Skip).is_err());
        assert_eq!(tree.to_json(), serde_json::json!({"b": {"c": "x"}}));
    }

    #[test]
    fn test_should_list_struct_field_names() {
        #[derive(Deserialize)]
        #[allow(dead_code)]
        struct Query {
            q: String,
            #[serde(rename = "pageSize")]
            page_size: u32,
        }
        assert_eq!(struct_fields::<Query>(), Some(&["q", "pageSize"][..]));
        assert_eq!(struct_fields::<serde_json::Value>(), None);
    }
}
