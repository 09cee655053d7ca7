//! The `wasm-abi/1` manifest schema.

use std::collections::BTreeMap;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// The schema tag this crate understands.
pub const SCHEMA_VERSION: &str = "wasm-abi/1";

/// An application's ABI manifest.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(rename = "schema")]
    pub schema_version: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub types: BTreeMap<String, TypeDef>,
    #[serde(default)]
    pub methods: Vec<Method>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<Event>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_root: Option<String>,
}

impl Manifest {
    /// An empty manifest carrying the current schema tag.
    #[must_use]
    pub fn new() -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_owned(),
            ..Self::default()
        }
    }

    /// Renders the manifest as its canonical JSON document.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Parses a manifest from its JSON document.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    #[must_use]
    pub fn method(&self, name: &str) -> Option<&Method> {
        self.methods.iter().find(|method| method.name == name)
    }

    #[must_use]
    pub fn type_def(&self, name: &str) -> Option<&TypeDef> {
        self.types.get(name)
    }
}

/// A named type definition.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeDef {
    Record { fields: Vec<Field> },
    Variant { variants: Vec<Variant> },
    Alias { target: TypeRef },
}

/// A record field.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub type_: TypeRef,
}

/// One alternative of a variant type.
///
/// `code` is the wire discriminant; when absent it defaults to the
/// variant's position in the declaration.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<TypeRef>,
}

/// A callable method.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Method {
    pub name: String,
    #[serde(default)]
    pub params: Vec<Param>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returns: Option<TypeRef>,
    #[serde(default, skip_serializing_if = "core::ops::Not::not")]
    pub is_init: bool,
    #[serde(default, skip_serializing_if = "core::ops::Not::not")]
    pub is_view: bool,
}

/// A method parameter.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    #[serde(rename = "type")]
    pub type_: TypeRef,
}

/// An application event.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<TypeRef>,
}

/// A reference to a type.
///
/// The JSON forms are `{"kind": "<scalar>"}`, `{"kind": "unit"}`,
/// `{"kind": "option", "inner": …}`, `{"kind": "list", "items": …}`,
/// `{"kind": "map", "key": …, "value": …}`, and `{"$ref": "Name"}`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TypeRef {
    Scalar(ScalarType),
    Unit,
    Option { inner: Box<TypeRef> },
    List { items: Box<TypeRef> },
    Map { key: Box<TypeRef>, value: Box<TypeRef> },
    Reference { name: String },
}

impl TypeRef {
    #[must_use]
    pub const fn bool() -> Self {
        Self::Scalar(ScalarType::Bool)
    }

    #[must_use]
    pub const fn u32() -> Self {
        Self::Scalar(ScalarType::U32)
    }

    #[must_use]
    pub const fn u64() -> Self {
        Self::Scalar(ScalarType::U64)
    }

    #[must_use]
    pub const fn string() -> Self {
        Self::Scalar(ScalarType::String)
    }

    #[must_use]
    pub const fn bytes() -> Self {
        Self::Scalar(ScalarType::Bytes)
    }

    #[must_use]
    pub const fn unit() -> Self {
        Self::Unit
    }

    #[must_use]
    pub fn option(inner: Self) -> Self {
        Self::Option {
            inner: Box::new(inner),
        }
    }

    #[must_use]
    pub fn list(items: Self) -> Self {
        Self::List {
            items: Box::new(items),
        }
    }

    #[must_use]
    pub fn map(key: Self, value: Self) -> Self {
        Self::Map {
            key: Box::new(key),
            value: Box::new(value),
        }
    }

    #[must_use]
    pub fn reference(name: impl Into<String>) -> Self {
        Self::Reference { name: name.into() }
    }
}

/// Primitive scalar types.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ScalarType {
    Bool,
    U8,
    U16,
    U32,
    U64,
    U128,
    I8,
    I16,
    I32,
    I64,
    I128,
    F32,
    F64,
    String,
    Bytes,
}

impl ScalarType {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::U128 => "u128",
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::I128 => "i128",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::String => "string",
            Self::Bytes => "bytes",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "bool" => Self::Bool,
            "u8" => Self::U8,
            "u16" => Self::U16,
            "u32" => Self::U32,
            "u64" => Self::U64,
            "u128" => Self::U128,
            "i8" => Self::I8,
            "i16" => Self::I16,
            "i32" => Self::I32,
            "i64" => Self::I64,
            "i128" => Self::I128,
            "f32" => Self::F32,
            "f64" => Self::F64,
            "string" => Self::String,
            "bytes" => Self::Bytes,
            _ => return None,
        })
    }
}

/// Flat JSON shape both serde directions go through.
#[derive(Default, Serialize, Deserialize)]
struct RawTypeRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    items: Option<Box<RawTypeRef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    key: Option<Box<RawTypeRef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<Box<RawTypeRef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inner: Option<Box<RawTypeRef>>,
    #[serde(rename = "$ref", default, skip_serializing_if = "Option::is_none")]
    reference: Option<String>,
}

impl From<&TypeRef> for RawTypeRef {
    fn from(type_ref: &TypeRef) -> Self {
        match type_ref {
            TypeRef::Scalar(scalar) => Self {
                kind: Some(scalar.name().to_owned()),
                ..Self::default()
            },
            TypeRef::Unit => Self {
                kind: Some("unit".to_owned()),
                ..Self::default()
            },
            TypeRef::Option { inner } => Self {
                kind: Some("option".to_owned()),
                inner: Some(Box::new(Self::from(&**inner))),
                ..Self::default()
            },
            TypeRef::List { items } => Self {
                kind: Some("list".to_owned()),
                items: Some(Box::new(Self::from(&**items))),
                ..Self::default()
            },
            TypeRef::Map { key, value } => Self {
                kind: Some("map".to_owned()),
                key: Some(Box::new(Self::from(&**key))),
                value: Some(Box::new(Self::from(&**value))),
                ..Self::default()
            },
            TypeRef::Reference { name } => Self {
                reference: Some(name.clone()),
                ..Self::default()
            },
        }
    }
}

impl RawTypeRef {
    fn into_type_ref(self) -> Result<TypeRef, String> {
        if let Some(name) = self.reference {
            if self.kind.is_some() {
                return Err("a type reference cannot carry both `$ref` and `kind`".to_owned());
            }
            return Ok(TypeRef::Reference { name });
        }
        let kind = self
            .kind
            .ok_or_else(|| "a type reference needs `kind` or `$ref`".to_owned())?;
        match kind.as_str() {
            "unit" => Ok(TypeRef::Unit),
            "option" => {
                let inner = self
                    .inner
                    .ok_or_else(|| "`option` needs `inner`".to_owned())?;
                Ok(TypeRef::Option {
                    inner: Box::new(inner.into_type_ref()?),
                })
            }
            "list" => {
                let items = self.items.ok_or_else(|| "`list` needs `items`".to_owned())?;
                Ok(TypeRef::List {
                    items: Box::new(items.into_type_ref()?),
                })
            }
            "map" => {
                let key = self.key.ok_or_else(|| "`map` needs `key`".to_owned())?;
                let value = self.value.ok_or_else(|| "`map` needs `value`".to_owned())?;
                Ok(TypeRef::Map {
                    key: Box::new(key.into_type_ref()?),
                    value: Box::new(value.into_type_ref()?),
                })
            }
            other => ScalarType::from_name(other)
                .map(TypeRef::Scalar)
                .ok_or_else(|| format!("unknown type kind `{other}`")),
        }
    }
}

impl Serialize for TypeRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        RawTypeRef::from(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for TypeRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        RawTypeRef::deserialize(deserializer)?
            .into_type_ref()
            .map_err(D::Error::custom)
    }
}
