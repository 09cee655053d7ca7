//! WASM-level ABI for meld applications.
//!
//! An application ships a JSON *manifest* (schema tag `wasm-abi/1`)
//! describing its named types, methods, events, and state root. The
//! manifest is the single source of truth for how method arguments and
//! return values are laid out on the wire: [`codec`] decodes and encodes
//! values directed by a [`schema::TypeRef`], with no type information in
//! the bytes themselves.
//!
//! The build-time side that extracts a manifest from application source
//! lives outside this crate; here is everything a runtime needs.

pub mod codec;
pub mod schema;
pub mod validate;
pub mod value;

pub use codec::{decode_fields, decode_value, encode_value, DecodeError, EncodeError};
pub use schema::{Event, Field, Manifest, Method, Param, ScalarType, TypeDef, TypeRef, Variant};
pub use validate::{validate_manifest, ValidationError};
pub use value::AbiValue;
