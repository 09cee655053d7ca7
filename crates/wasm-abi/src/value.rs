//! Structured values produced and consumed by the ABI codec.

/// A decoded ABI value.
///
/// Narrow integers widen on decode (`u8`/`u16`/`u32` become [`U64`],
/// their signed counterparts become [`I64`], `f32` becomes [`F64`]); the
/// manifest's [`TypeRef`](crate::schema::TypeRef) restores the exact
/// width on encode.
///
/// [`U64`]: AbiValue::U64
/// [`I64`]: AbiValue::I64
/// [`F64`]: AbiValue::F64
#[derive(Clone, Debug, PartialEq)]
pub enum AbiValue {
    Unit,
    Bool(bool),
    U64(u64),
    U128(u128),
    I64(i64),
    I128(i128),
    F64(f64),
    String(String),
    Bytes(Vec<u8>),
    Option(Option<Box<AbiValue>>),
    List(Vec<AbiValue>),
    Map(Vec<(AbiValue, AbiValue)>),
    Record(Vec<(String, AbiValue)>),
    Variant {
        name: String,
        code: u32,
        payload: Option<Box<AbiValue>>,
    },
}

impl AbiValue {
    /// A short name for diagnostics.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Unit => "unit",
            Self::Bool(_) => "bool",
            Self::U64(_) => "u64",
            Self::U128(_) => "u128",
            Self::I64(_) => "i64",
            Self::I128(_) => "i128",
            Self::F64(_) => "f64",
            Self::String(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::Option(_) => "option",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Record(_) => "record",
            Self::Variant { .. } => "variant",
        }
    }

    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_u64(&self) -> Option<u64> {
        match self {
            Self::U64(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::I64(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::F64(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&[AbiValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_record(&self) -> Option<&[(String, AbiValue)]> {
        match self {
            Self::Record(fields) => Some(fields),
            _ => None,
        }
    }

    /// The payload of an option, flattened: `None` when this is not an
    /// option or the option is absent.
    #[must_use]
    pub fn as_option(&self) -> Option<&AbiValue> {
        match self {
            Self::Option(Some(inner)) => Some(inner),
            _ => None,
        }
    }

    /// Looks up a record field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&AbiValue> {
        self.as_record()?
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    #[must_use]
    pub fn into_string(self) -> Option<String> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }
}
