use claims::{assert_err, assert_ok};
use meld_wasm_abi::schema::{Event, Field, Manifest, Method, Param, TypeDef, TypeRef, Variant};
use meld_wasm_abi::validate::{validate_manifest, ValidationError};

fn method(name: &str) -> Method {
    Method {
        name: name.to_owned(),
        params: vec![],
        returns: None,
        is_init: false,
        is_view: false,
    }
}

#[test]
fn empty_manifest_with_tag_is_valid() {
    assert_ok!(validate_manifest(&Manifest::new()));
}

#[test]
fn wrong_schema_version_rejected() {
    let manifest = Manifest {
        schema_version: "wasm-abi/0".to_owned(),
        ..Manifest::default()
    };
    assert_eq!(
        validate_manifest(&manifest),
        Err(ValidationError::UnsupportedSchemaVersion {
            found: "wasm-abi/0".to_owned()
        }),
    );
}

#[test]
fn events_may_carry_payloads() {
    let mut manifest = Manifest::new();
    manifest.events.push(Event {
        name: "TestEvent".to_owned(),
        payload: Some(TypeRef::string()),
    });
    assert_ok!(validate_manifest(&manifest));
}

#[test]
fn variant_payloads_are_checked() {
    let mut manifest = Manifest::new();
    let _ = manifest.types.insert(
        "TestVariant".to_owned(),
        TypeDef::Variant {
            variants: vec![Variant {
                name: "TestVariant".to_owned(),
                code: None,
                payload: Some(TypeRef::string()),
            }],
        },
    );
    assert_ok!(validate_manifest(&manifest));
}

#[test]
fn resolvable_refs_pass() {
    let mut manifest = Manifest::new();
    let _ = manifest
        .types
        .insert("TestType".to_owned(), TypeDef::Record { fields: vec![] });
    manifest.methods.push(Method {
        returns: Some(TypeRef::reference("TestType")),
        ..method("test_method")
    });
    assert_ok!(validate_manifest(&manifest));
}

#[test]
fn dangling_refs_detected() {
    let mut manifest = Manifest::new();
    manifest.methods.push(Method {
        returns: Some(TypeRef::reference("NonExistentType")),
        ..method("test_method")
    });

    let result = validate_manifest(&manifest);
    match assert_err!(result) {
        ValidationError::InvalidTypeReference { ref_name, path } => {
            assert_eq!(ref_name, "NonExistentType");
            assert_eq!(path, "method test_method.returns");
        }
        other => panic!("expected InvalidTypeReference, got {other:?}"),
    }
}

#[test]
fn dangling_ref_inside_param_names_the_param() {
    let mut manifest = Manifest::new();
    manifest.methods.push(Method {
        params: vec![Param {
            name: "person".to_owned(),
            type_: TypeRef::list(TypeRef::reference("Person")),
        }],
        ..method("add_person")
    });

    match assert_err!(validate_manifest(&manifest)) {
        ValidationError::InvalidTypeReference { ref_name, path } => {
            assert_eq!(ref_name, "Person");
            assert_eq!(path, "method add_person.params.person");
        }
        other => panic!("expected InvalidTypeReference, got {other:?}"),
    }
}

#[test]
fn methods_must_be_sorted() {
    let mut manifest = Manifest::new();
    manifest.methods.push(method("z_method"));
    manifest.methods.push(method("a_method"));

    match assert_err!(validate_manifest(&manifest)) {
        ValidationError::MethodsNotSorted { first, second } => {
            assert_eq!(first, "z_method");
            assert_eq!(second, "a_method");
        }
        other => panic!("expected MethodsNotSorted, got {other:?}"),
    }

    manifest.methods.sort_by(|a, b| a.name.cmp(&b.name));
    assert_ok!(validate_manifest(&manifest));
}

#[test]
fn duplicate_methods_rejected() {
    let mut manifest = Manifest::new();
    manifest.methods.push(method("dup"));
    manifest.methods.push(method("dup"));
    assert_eq!(
        validate_manifest(&manifest),
        Err(ValidationError::DuplicateMethod {
            name: "dup".to_owned()
        }),
    );
}

#[test]
fn init_view_conflict_rejected() {
    let mut manifest = Manifest::new();
    manifest.methods.push(Method {
        is_init: true,
        is_view: true,
        ..method("init")
    });
    assert_eq!(
        validate_manifest(&manifest),
        Err(ValidationError::InitViewConflict {
            name: "init".to_owned()
        }),
    );
}

#[test]
fn duplicate_variant_codes_rejected() {
    let mut manifest = Manifest::new();
    let _ = manifest.types.insert(
        "Choice".to_owned(),
        TypeDef::Variant {
            variants: vec![
                Variant {
                    name: "A".to_owned(),
                    code: Some(1),
                    payload: None,
                },
                Variant {
                    name: "B".to_owned(),
                    code: Some(1),
                    payload: None,
                },
            ],
        },
    );
    assert_eq!(
        validate_manifest(&manifest),
        Err(ValidationError::DuplicateVariantCode {
            type_name: "Choice".to_owned(),
            code: 1,
        }),
    );
}

#[test]
fn implicit_codes_can_collide_with_explicit_ones() {
    // The second variant defaults to code 1; the first claims it
    // explicitly.
    let mut manifest = Manifest::new();
    let _ = manifest.types.insert(
        "Choice".to_owned(),
        TypeDef::Variant {
            variants: vec![
                Variant {
                    name: "A".to_owned(),
                    code: Some(1),
                    payload: None,
                },
                Variant {
                    name: "B".to_owned(),
                    code: None,
                    payload: None,
                },
            ],
        },
    );
    assert_err!(validate_manifest(&manifest));
}

#[test]
fn state_root_must_be_declared() {
    let mut manifest = Manifest::new();
    manifest.state_root = Some("Missing".to_owned());
    assert_eq!(
        validate_manifest(&manifest),
        Err(ValidationError::UnknownStateRoot {
            name: "Missing".to_owned()
        }),
    );
}
