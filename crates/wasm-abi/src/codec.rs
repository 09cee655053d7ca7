//! Type-directed binary codec.
//!
//! The wire layout is canonical and positional: fixed-width little-endian
//! integers, IEEE-754 floats, `u32`-length-prefixed strings and byte
//! strings, a one-byte presence tag for options, `u32`-counted sequences
//! and maps, record fields in declaration order, and a `u32` discriminant
//! for variants (the manifest's variant `code`). Decoding therefore needs
//! the [`TypeRef`] that produced the bytes — the same bytes decoded with
//! the same type reference yield the same value everywhere.

use thiserror::Error;

use crate::schema::{Manifest, ScalarType, TypeDef, TypeRef};
use crate::value::AbiValue;

const MAX_DEPTH: usize = 64;

/// Malformed or type-incompatible input bytes.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
#[non_exhaustive]
pub enum DecodeError {
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("invalid boolean byte {0}")]
    InvalidBool(u8),
    #[error("invalid option tag {0}")]
    InvalidOptionTag(u8),
    #[error("string payload is not valid UTF-8")]
    InvalidUtf8,
    #[error("unknown type `{0}`")]
    UnknownType(String),
    #[error("unknown variant code {code} for type `{type_name}`")]
    UnknownVariantCode { type_name: String, code: u32 },
    #[error("trailing bytes after value")]
    TrailingBytes,
    #[error("value nesting exceeds the supported depth")]
    DepthLimit,
}

/// A value that cannot be laid out as the requested type.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
#[non_exhaustive]
pub enum EncodeError {
    #[error("unknown type `{0}`")]
    UnknownType(String),
    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
    #[error("integer {value} does not fit in {width}")]
    IntegerRange { value: i128, width: &'static str },
    #[error("unknown variant `{name}` for type `{type_name}`")]
    UnknownVariant { type_name: String, name: String },
    #[error("record field `{name}` is missing")]
    MissingField { name: String },
    #[error("value nesting exceeds the supported depth")]
    DepthLimit,
}

/// Decodes `bytes` as a value of type `type_ref`, consuming all input.
pub fn decode_value(
    bytes: &[u8],
    type_ref: &TypeRef,
    manifest: &Manifest,
) -> Result<AbiValue, DecodeError> {
    let mut reader = bytes;
    let value = decode(&mut reader, type_ref, manifest, 0)?;
    if reader.is_empty() {
        Ok(value)
    } else {
        Err(DecodeError::TrailingBytes)
    }
}

/// Decodes `bytes` as a sequence of named fields laid out back to back,
/// consuming all input.
///
/// This is the record layout without a named type: the dispatcher uses it
/// to read multi-parameter method arguments directly against the
/// manifest's parameter list.
pub fn decode_fields(
    bytes: &[u8],
    fields: &[(&str, &TypeRef)],
    manifest: &Manifest,
) -> Result<Vec<(String, AbiValue)>, DecodeError> {
    let mut reader = bytes;
    let mut decoded = Vec::with_capacity(fields.len());
    for (name, type_ref) in fields {
        let value = decode(&mut reader, type_ref, manifest, 0)?;
        decoded.push(((*name).to_owned(), value));
    }
    if reader.is_empty() {
        Ok(decoded)
    } else {
        Err(DecodeError::TrailingBytes)
    }
}

/// Encodes `value` as a value of type `type_ref`.
pub fn encode_value(
    value: &AbiValue,
    type_ref: &TypeRef,
    manifest: &Manifest,
) -> Result<Vec<u8>, EncodeError> {
    let mut out = Vec::new();
    encode(value, type_ref, manifest, &mut out, 0)?;
    Ok(out)
}

// ============================================================
// Decoding
// ============================================================

fn decode(
    reader: &mut &[u8],
    type_ref: &TypeRef,
    manifest: &Manifest,
    depth: usize,
) -> Result<AbiValue, DecodeError> {
    if depth > MAX_DEPTH {
        return Err(DecodeError::DepthLimit);
    }
    match type_ref {
        TypeRef::Scalar(scalar) => decode_scalar(reader, *scalar),
        TypeRef::Unit => Ok(AbiValue::Unit),
        TypeRef::Option { inner } => match take_byte(reader)? {
            0 => Ok(AbiValue::Option(None)),
            1 => {
                let value = decode(reader, inner, manifest, depth + 1)?;
                Ok(AbiValue::Option(Some(Box::new(value))))
            }
            other => Err(DecodeError::InvalidOptionTag(other)),
        },
        TypeRef::List { items } => {
            let count = check_count(u32::from_le_bytes(take_array(reader)?), reader)?;
            let mut list = Vec::new();
            for _ in 0..count {
                list.push(decode(reader, items, manifest, depth + 1)?);
            }
            Ok(AbiValue::List(list))
        }
        TypeRef::Map { key, value } => {
            let count = check_count(u32::from_le_bytes(take_array(reader)?), reader)?;
            let mut entries = Vec::new();
            for _ in 0..count {
                let k = decode(reader, key, manifest, depth + 1)?;
                let v = decode(reader, value, manifest, depth + 1)?;
                entries.push((k, v));
            }
            Ok(AbiValue::Map(entries))
        }
        TypeRef::Reference { name } => {
            let def = manifest
                .type_def(name)
                .ok_or_else(|| DecodeError::UnknownType(name.clone()))?;
            decode_named(reader, name, def, manifest, depth)
        }
    }
}

fn decode_named(
    reader: &mut &[u8],
    name: &str,
    def: &TypeDef,
    manifest: &Manifest,
    depth: usize,
) -> Result<AbiValue, DecodeError> {
    match def {
        TypeDef::Record { fields } => {
            let mut decoded = Vec::with_capacity(fields.len());
            for field in fields {
                let value = decode(reader, &field.type_, manifest, depth + 1)?;
                decoded.push((field.name.clone(), value));
            }
            Ok(AbiValue::Record(decoded))
        }
        TypeDef::Variant { variants } => {
            let code = u32::from_le_bytes(take_array(reader)?);
            let variant = variants
                .iter()
                .enumerate()
                .find(|(index, variant)| variant.code.unwrap_or(*index as u32) == code)
                .map(|(_, variant)| variant)
                .ok_or_else(|| DecodeError::UnknownVariantCode {
                    type_name: name.to_owned(),
                    code,
                })?;
            let payload = match &variant.payload {
                Some(payload_ty) => Some(Box::new(decode(reader, payload_ty, manifest, depth + 1)?)),
                None => None,
            };
            Ok(AbiValue::Variant {
                name: variant.name.clone(),
                code,
                payload,
            })
        }
        TypeDef::Alias { target } => decode(reader, target, manifest, depth + 1),
    }
}

fn decode_scalar(reader: &mut &[u8], scalar: ScalarType) -> Result<AbiValue, DecodeError> {
    Ok(match scalar {
        ScalarType::Bool => match take_byte(reader)? {
            0 => AbiValue::Bool(false),
            1 => AbiValue::Bool(true),
            other => return Err(DecodeError::InvalidBool(other)),
        },
        ScalarType::U8 => AbiValue::U64(take_byte(reader)?.into()),
        ScalarType::U16 => AbiValue::U64(u16::from_le_bytes(take_array(reader)?).into()),
        ScalarType::U32 => AbiValue::U64(u32::from_le_bytes(take_array(reader)?).into()),
        ScalarType::U64 => AbiValue::U64(u64::from_le_bytes(take_array(reader)?)),
        ScalarType::U128 => AbiValue::U128(u128::from_le_bytes(take_array(reader)?)),
        ScalarType::I8 => AbiValue::I64(i64::from(take_byte(reader)? as i8)),
        ScalarType::I16 => AbiValue::I64(i16::from_le_bytes(take_array(reader)?).into()),
        ScalarType::I32 => AbiValue::I64(i32::from_le_bytes(take_array(reader)?).into()),
        ScalarType::I64 => AbiValue::I64(i64::from_le_bytes(take_array(reader)?)),
        ScalarType::I128 => AbiValue::I128(i128::from_le_bytes(take_array(reader)?)),
        ScalarType::F32 => AbiValue::F64(f32::from_le_bytes(take_array(reader)?).into()),
        ScalarType::F64 => AbiValue::F64(f64::from_le_bytes(take_array(reader)?)),
        ScalarType::String => {
            let bytes = take_len_prefixed(reader)?;
            AbiValue::String(
                String::from_utf8(bytes.to_vec()).map_err(|_| DecodeError::InvalidUtf8)?,
            )
        }
        ScalarType::Bytes => AbiValue::Bytes(take_len_prefixed(reader)?.to_vec()),
    })
}

/// Rejects sequence counts that cannot be honest: every element consumes
/// at least one byte of input (unit-only sequences are degenerate and
/// fall under the same rule).
fn check_count(count: u32, reader: &[u8]) -> Result<u32, DecodeError> {
    if count as usize > reader.len() {
        return Err(DecodeError::UnexpectedEof);
    }
    Ok(count)
}

fn take_byte(reader: &mut &[u8]) -> Result<u8, DecodeError> {
    let (first, rest) = reader.split_first().ok_or(DecodeError::UnexpectedEof)?;
    *reader = rest;
    Ok(*first)
}

fn take_array<const N: usize>(reader: &mut &[u8]) -> Result<[u8; N], DecodeError> {
    if reader.len() < N {
        return Err(DecodeError::UnexpectedEof);
    }
    let (taken, rest) = reader.split_at(N);
    *reader = rest;
    let mut out = [0; N];
    out.copy_from_slice(taken);
    Ok(out)
}

fn take_len_prefixed<'a>(reader: &mut &'a [u8]) -> Result<&'a [u8], DecodeError> {
    let len = u32::from_le_bytes(take_array(reader)?) as usize;
    if reader.len() < len {
        return Err(DecodeError::UnexpectedEof);
    }
    let (taken, rest) = reader.split_at(len);
    *reader = rest;
    Ok(taken)
}

// ============================================================
// Encoding
// ============================================================

fn encode(
    value: &AbiValue,
    type_ref: &TypeRef,
    manifest: &Manifest,
    out: &mut Vec<u8>,
    depth: usize,
) -> Result<(), EncodeError> {
    if depth > MAX_DEPTH {
        return Err(EncodeError::DepthLimit);
    }
    match type_ref {
        TypeRef::Scalar(scalar) => encode_scalar(value, *scalar, out),
        TypeRef::Unit => match value {
            AbiValue::Unit => Ok(()),
            other => Err(mismatch("unit", other)),
        },
        TypeRef::Option { inner } => match value {
            AbiValue::Option(None) => {
                out.push(0);
                Ok(())
            }
            AbiValue::Option(Some(payload)) => {
                out.push(1);
                encode(payload, inner, manifest, out, depth + 1)
            }
            other => Err(mismatch("option", other)),
        },
        TypeRef::List { items } => match value {
            AbiValue::List(list) => {
                out.extend_from_slice(&count_of(list.len()).to_le_bytes());
                for item in list {
                    encode(item, items, manifest, out, depth + 1)?;
                }
                Ok(())
            }
            other => Err(mismatch("list", other)),
        },
        TypeRef::Map { key, value: value_ty } => match value {
            AbiValue::Map(entries) => {
                out.extend_from_slice(&count_of(entries.len()).to_le_bytes());
                for (k, v) in entries {
                    encode(k, key, manifest, out, depth + 1)?;
                    encode(v, value_ty, manifest, out, depth + 1)?;
                }
                Ok(())
            }
            other => Err(mismatch("map", other)),
        },
        TypeRef::Reference { name } => {
            let def = manifest
                .type_def(name)
                .ok_or_else(|| EncodeError::UnknownType(name.clone()))?;
            encode_named(value, name, def, manifest, out, depth)
        }
    }
}

fn encode_named(
    value: &AbiValue,
    name: &str,
    def: &TypeDef,
    manifest: &Manifest,
    out: &mut Vec<u8>,
    depth: usize,
) -> Result<(), EncodeError> {
    match def {
        TypeDef::Record { fields } => {
            let record = match value {
                AbiValue::Record(fields) => fields,
                other => return Err(mismatch("record", other)),
            };
            for field in fields {
                let field_value = record
                    .iter()
                    .find(|(candidate, _)| *candidate == field.name)
                    .map(|(_, value)| value)
                    .ok_or_else(|| EncodeError::MissingField {
                        name: field.name.clone(),
                    })?;
                encode(field_value, &field.type_, manifest, out, depth + 1)?;
            }
            Ok(())
        }
        TypeDef::Variant { variants } => {
            let (variant_name, payload) = match value {
                AbiValue::Variant { name, payload, .. } => (name, payload),
                other => return Err(mismatch("variant", other)),
            };
            let (index, variant) = variants
                .iter()
                .enumerate()
                .find(|(_, variant)| variant.name == *variant_name)
                .ok_or_else(|| EncodeError::UnknownVariant {
                    type_name: name.to_owned(),
                    name: variant_name.clone(),
                })?;
            let code = variant.code.unwrap_or(index as u32);
            out.extend_from_slice(&code.to_le_bytes());
            match (&variant.payload, payload) {
                (Some(payload_ty), Some(payload)) => {
                    encode(payload, payload_ty, manifest, out, depth + 1)
                }
                (None, _) => Ok(()),
                (Some(_), None) => Err(EncodeError::MissingField {
                    name: format!("{variant_name}.payload"),
                }),
            }
        }
        TypeDef::Alias { target } => encode(value, target, manifest, out, depth + 1),
    }
}

fn encode_scalar(
    value: &AbiValue,
    scalar: ScalarType,
    out: &mut Vec<u8>,
) -> Result<(), EncodeError> {
    match scalar {
        ScalarType::Bool => match value {
            AbiValue::Bool(b) => out.push(u8::from(*b)),
            other => return Err(mismatch("bool", other)),
        },
        ScalarType::U8 => out.push(unsigned(value, u8::MAX.into(), "u8")? as u8),
        ScalarType::U16 => {
            let v = unsigned(value, u16::MAX.into(), "u16")? as u16;
            out.extend_from_slice(&v.to_le_bytes());
        }
        ScalarType::U32 => {
            let v = unsigned(value, u32::MAX.into(), "u32")? as u32;
            out.extend_from_slice(&v.to_le_bytes());
        }
        ScalarType::U64 => {
            let v = unsigned(value, u64::MAX, "u64")?;
            out.extend_from_slice(&v.to_le_bytes());
        }
        ScalarType::U128 => match value {
            AbiValue::U128(v) => out.extend_from_slice(&v.to_le_bytes()),
            AbiValue::U64(v) => out.extend_from_slice(&u128::from(*v).to_le_bytes()),
            other => return Err(mismatch("u128", other)),
        },
        ScalarType::I8 => {
            let v = signed(value, i8::MIN.into(), i8::MAX.into(), "i8")? as i8;
            out.push(v as u8);
        }
        ScalarType::I16 => {
            let v = signed(value, i16::MIN.into(), i16::MAX.into(), "i16")? as i16;
            out.extend_from_slice(&v.to_le_bytes());
        }
        ScalarType::I32 => {
            let v = signed(value, i32::MIN.into(), i32::MAX.into(), "i32")? as i32;
            out.extend_from_slice(&v.to_le_bytes());
        }
        ScalarType::I64 => {
            let v = signed(value, i64::MIN, i64::MAX, "i64")?;
            out.extend_from_slice(&v.to_le_bytes());
        }
        ScalarType::I128 => match value {
            AbiValue::I128(v) => out.extend_from_slice(&v.to_le_bytes()),
            AbiValue::I64(v) => out.extend_from_slice(&i128::from(*v).to_le_bytes()),
            other => return Err(mismatch("i128", other)),
        },
        ScalarType::F32 => match value {
            AbiValue::F64(v) => out.extend_from_slice(&(*v as f32).to_le_bytes()),
            other => return Err(mismatch("f32", other)),
        },
        ScalarType::F64 => match value {
            AbiValue::F64(v) => out.extend_from_slice(&v.to_le_bytes()),
            other => return Err(mismatch("f64", other)),
        },
        ScalarType::String => match value {
            AbiValue::String(s) => {
                out.extend_from_slice(&count_of(s.len()).to_le_bytes());
                out.extend_from_slice(s.as_bytes());
            }
            other => return Err(mismatch("string", other)),
        },
        ScalarType::Bytes => match value {
            AbiValue::Bytes(bytes) => {
                out.extend_from_slice(&count_of(bytes.len()).to_le_bytes());
                out.extend_from_slice(bytes);
            }
            other => return Err(mismatch("bytes", other)),
        },
    }
    Ok(())
}

fn unsigned(value: &AbiValue, max: u64, width: &'static str) -> Result<u64, EncodeError> {
    let v = match value {
        AbiValue::U64(v) => *v,
        other => return Err(mismatch(width, other)),
    };
    if v > max {
        return Err(EncodeError::IntegerRange {
            value: v.into(),
            width,
        });
    }
    Ok(v)
}

fn signed(value: &AbiValue, min: i64, max: i64, width: &'static str) -> Result<i64, EncodeError> {
    let v = match value {
        AbiValue::I64(v) => *v,
        other => return Err(mismatch(width, other)),
    };
    if v < min || v > max {
        return Err(EncodeError::IntegerRange {
            value: v.into(),
            width,
        });
    }
    Ok(v)
}

fn mismatch(expected: &'static str, found: &AbiValue) -> EncodeError {
    EncodeError::TypeMismatch {
        expected,
        found: found.type_name(),
    }
}

fn count_of(len: usize) -> u32 {
    u32::try_from(len).expect("value length exceeds the u32 wire limit")
}
