//! Structural validation of ABI manifests.

use std::collections::BTreeSet;

use thiserror::Error;

use crate::schema::{Manifest, TypeDef, TypeRef, SCHEMA_VERSION};

/// A manifest that violates the `wasm-abi/1` contract.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
#[non_exhaustive]
pub enum ValidationError {
    #[error("unsupported schema version `{found}`")]
    UnsupportedSchemaVersion { found: String },
    #[error("invalid type reference `{ref_name}` at {path}")]
    InvalidTypeReference { ref_name: String, path: String },
    #[error("methods are not sorted: `{first}` precedes `{second}`")]
    MethodsNotSorted { first: String, second: String },
    #[error("duplicate method `{name}`")]
    DuplicateMethod { name: String },
    #[error("method `{name}` is marked both init and view")]
    InitViewConflict { name: String },
    #[error("duplicate variant code {code} in type `{type_name}`")]
    DuplicateVariantCode { type_name: String, code: u32 },
    #[error("state root `{name}` is not a declared type")]
    UnknownStateRoot { name: String },
}

/// Checks a manifest for internal consistency.
///
/// Verified here: the schema tag, method ordering and uniqueness,
/// init/view exclusivity, variant code uniqueness, the state root, and
/// that every `$ref` resolves to a declared type.
pub fn validate_manifest(manifest: &Manifest) -> Result<(), ValidationError> {
    if manifest.schema_version != SCHEMA_VERSION {
        return Err(ValidationError::UnsupportedSchemaVersion {
            found: manifest.schema_version.clone(),
        });
    }

    for pair in manifest.methods.windows(2) {
        let (first, second) = (&pair[0], &pair[1]);
        if first.name == second.name {
            return Err(ValidationError::DuplicateMethod {
                name: first.name.clone(),
            });
        }
        if first.name > second.name {
            return Err(ValidationError::MethodsNotSorted {
                first: first.name.clone(),
                second: second.name.clone(),
            });
        }
    }

    for method in &manifest.methods {
        if method.is_init && method.is_view {
            return Err(ValidationError::InitViewConflict {
                name: method.name.clone(),
            });
        }
        for param in &method.params {
            check_type_ref(
                manifest,
                &param.type_,
                &format!("method {}.params.{}", method.name, param.name),
            )?;
        }
        if let Some(returns) = &method.returns {
            check_type_ref(manifest, returns, &format!("method {}.returns", method.name))?;
        }
    }

    for (name, def) in &manifest.types {
        match def {
            TypeDef::Record { fields } => {
                for field in fields {
                    check_type_ref(
                        manifest,
                        &field.type_,
                        &format!("type {name}.{}", field.name),
                    )?;
                }
            }
            TypeDef::Variant { variants } => {
                let mut codes = BTreeSet::new();
                for (index, variant) in variants.iter().enumerate() {
                    let code = variant.code.unwrap_or(index as u32);
                    if !codes.insert(code) {
                        return Err(ValidationError::DuplicateVariantCode {
                            type_name: name.clone(),
                            code,
                        });
                    }
                    if let Some(payload) = &variant.payload {
                        check_type_ref(
                            manifest,
                            payload,
                            &format!("type {name}.{}", variant.name),
                        )?;
                    }
                }
            }
            TypeDef::Alias { target } => {
                check_type_ref(manifest, target, &format!("type {name}"))?;
            }
        }
    }

    for event in &manifest.events {
        if let Some(payload) = &event.payload {
            check_type_ref(manifest, payload, &format!("event {}", event.name))?;
        }
    }

    if let Some(state_root) = &manifest.state_root {
        if !manifest.types.contains_key(state_root) {
            return Err(ValidationError::UnknownStateRoot {
                name: state_root.clone(),
            });
        }
    }

    Ok(())
}

fn check_type_ref(
    manifest: &Manifest,
    type_ref: &TypeRef,
    path: &str,
) -> Result<(), ValidationError> {
    match type_ref {
        TypeRef::Scalar(_) | TypeRef::Unit => Ok(()),
        TypeRef::Option { inner } => check_type_ref(manifest, inner, path),
        TypeRef::List { items } => check_type_ref(manifest, items, path),
        TypeRef::Map { key, value } => {
            check_type_ref(manifest, key, path)?;
            check_type_ref(manifest, value, path)
        }
        TypeRef::Reference { name } => {
            if manifest.types.contains_key(name) {
                Ok(())
            } else {
                Err(ValidationError::InvalidTypeReference {
                    ref_name: name.clone(),
                    path: path.to_owned(),
                })
            }
        }
    }
}
