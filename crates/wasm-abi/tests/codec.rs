use claims::{assert_err, assert_ok};
use meld_wasm_abi::codec::{decode_value, encode_value, DecodeError, EncodeError};
use meld_wasm_abi::schema::{Field, Manifest, TypeDef, TypeRef, Variant};
use meld_wasm_abi::value::AbiValue;

fn manifest_with_person() -> Manifest {
    let mut manifest = Manifest::new();
    let _ = manifest.types.insert(
        "Person".to_owned(),
        TypeDef::Record {
            fields: vec![
                Field {
                    name: "name".to_owned(),
                    type_: TypeRef::string(),
                },
                Field {
                    name: "age".to_owned(),
                    type_: TypeRef::u32(),
                },
            ],
        },
    );
    let _ = manifest.types.insert(
        "Action".to_owned(),
        TypeDef::Variant {
            variants: vec![
                Variant {
                    name: "Ping".to_owned(),
                    code: None,
                    payload: None,
                },
                Variant {
                    name: "SetName".to_owned(),
                    code: None,
                    payload: Some(TypeRef::string()),
                },
            ],
        },
    );
    manifest
}

fn round_trip(value: &AbiValue, type_ref: &TypeRef, manifest: &Manifest) {
    let bytes = assert_ok!(encode_value(value, type_ref, manifest));
    let decoded = assert_ok!(decode_value(&bytes, type_ref, manifest));
    assert_eq!(&decoded, value, "value must survive a round trip");
}

#[test]
fn scalar_round_trips() {
    let manifest = Manifest::new();
    round_trip(&AbiValue::Bool(true), &TypeRef::bool(), &manifest);
    round_trip(&AbiValue::U64(300), &TypeRef::u64(), &manifest);
    round_trip(&AbiValue::U64(255), &TypeRef::Scalar(meld_wasm_abi::ScalarType::U8), &manifest);
    round_trip(
        &AbiValue::I64(-7),
        &TypeRef::Scalar(meld_wasm_abi::ScalarType::I32),
        &manifest,
    );
    round_trip(
        &AbiValue::U128(u128::MAX),
        &TypeRef::Scalar(meld_wasm_abi::ScalarType::U128),
        &manifest,
    );
    round_trip(&AbiValue::String("héllo".to_owned()), &TypeRef::string(), &manifest);
    round_trip(&AbiValue::Bytes(vec![1, 2, 3]), &TypeRef::bytes(), &manifest);
}

#[test]
fn string_layout_is_length_prefixed_utf8() {
    let manifest = Manifest::new();
    let bytes = assert_ok!(encode_value(
        &AbiValue::String("ab".to_owned()),
        &TypeRef::string(),
        &manifest,
    ));
    assert_eq!(bytes, [2, 0, 0, 0, b'a', b'b'], "u32 LE length then bytes");
}

#[test]
fn option_round_trips() {
    let manifest = Manifest::new();
    let ty = TypeRef::option(TypeRef::u64());
    round_trip(&AbiValue::Option(None), &ty, &manifest);
    round_trip(
        &AbiValue::Option(Some(Box::new(AbiValue::U64(9)))),
        &ty,
        &manifest,
    );

    let absent = assert_ok!(encode_value(&AbiValue::Option(None), &ty, &manifest));
    assert_eq!(absent, [0], "absence is a single zero byte");
}

#[test]
fn list_and_map_round_trip() {
    let manifest = Manifest::new();
    round_trip(
        &AbiValue::List(vec![AbiValue::U64(1), AbiValue::U64(2)]),
        &TypeRef::list(TypeRef::u64()),
        &manifest,
    );
    round_trip(
        &AbiValue::Map(vec![(
            AbiValue::String("k".to_owned()),
            AbiValue::U64(1),
        )]),
        &TypeRef::map(TypeRef::string(), TypeRef::u64()),
        &manifest,
    );
}

#[test]
fn record_round_trips_in_declaration_order() {
    let manifest = manifest_with_person();
    let ty = TypeRef::reference("Person");
    let person = AbiValue::Record(vec![
        ("name".to_owned(), AbiValue::String("alice".to_owned())),
        ("age".to_owned(), AbiValue::U64(30)),
    ]);
    round_trip(&person, &ty, &manifest);

    // Field order in the value does not matter; the manifest decides
    // the layout.
    let reordered = AbiValue::Record(vec![
        ("age".to_owned(), AbiValue::U64(30)),
        ("name".to_owned(), AbiValue::String("alice".to_owned())),
    ]);
    let canonical = assert_ok!(encode_value(&person, &ty, &manifest));
    let shuffled = assert_ok!(encode_value(&reordered, &ty, &manifest));
    assert_eq!(canonical, shuffled, "layout follows field declarations");
}

#[test]
fn variant_uses_u32_code() {
    let manifest = manifest_with_person();
    let ty = TypeRef::reference("Action");
    let ping = AbiValue::Variant {
        name: "Ping".to_owned(),
        code: 0,
        payload: None,
    };
    let bytes = assert_ok!(encode_value(&ping, &ty, &manifest));
    assert_eq!(bytes, [0, 0, 0, 0], "bare variant is just its code");

    let set_name = AbiValue::Variant {
        name: "SetName".to_owned(),
        code: 1,
        payload: Some(Box::new(AbiValue::String("bob".to_owned()))),
    };
    round_trip(&set_name, &ty, &manifest);
}

#[test]
fn unknown_variant_code_rejected() {
    let manifest = manifest_with_person();
    let ty = TypeRef::reference("Action");
    let bytes = 9u32.to_le_bytes();
    assert_eq!(
        decode_value(&bytes, &ty, &manifest),
        Err(DecodeError::UnknownVariantCode {
            type_name: "Action".to_owned(),
            code: 9,
        }),
    );
}

#[test]
fn missing_record_field_rejected_on_encode() {
    let manifest = manifest_with_person();
    let ty = TypeRef::reference("Person");
    let incomplete = AbiValue::Record(vec![(
        "name".to_owned(),
        AbiValue::String("alice".to_owned()),
    )]);
    assert_eq!(
        encode_value(&incomplete, &ty, &manifest),
        Err(EncodeError::MissingField {
            name: "age".to_owned()
        }),
    );
}

#[test]
fn integer_range_checked_on_encode() {
    let manifest = Manifest::new();
    let result = encode_value(
        &AbiValue::U64(256),
        &TypeRef::Scalar(meld_wasm_abi::ScalarType::U8),
        &manifest,
    );
    assert_eq!(
        result,
        Err(EncodeError::IntegerRange {
            value: 256,
            width: "u8"
        }),
    );
}

#[test]
fn trailing_bytes_rejected() {
    let manifest = Manifest::new();
    let mut bytes = assert_ok!(encode_value(&AbiValue::U64(1), &TypeRef::u64(), &manifest));
    bytes.push(0);
    assert_eq!(
        decode_value(&bytes, &TypeRef::u64(), &manifest),
        Err(DecodeError::TrailingBytes),
    );
}

#[test]
fn truncated_input_rejected() {
    let manifest = Manifest::new();
    assert_err!(decode_value(&[1, 0], &TypeRef::u64(), &manifest));
}

#[test]
fn unknown_reference_rejected() {
    let manifest = Manifest::new();
    assert_eq!(
        decode_value(&[], &TypeRef::reference("Nope"), &manifest),
        Err(DecodeError::UnknownType("Nope".to_owned())),
    );
}

#[test]
fn same_bytes_same_type_same_value() {
    // The cross-implementation contract: decoding fixed bytes with a
    // fixed type reference is deterministic.
    let manifest = manifest_with_person();
    let ty = TypeRef::list(TypeRef::reference("Person"));
    let value = AbiValue::List(vec![AbiValue::Record(vec![
        ("name".to_owned(), AbiValue::String("a".to_owned())),
        ("age".to_owned(), AbiValue::U64(1)),
    ])]);
    let bytes = assert_ok!(encode_value(&value, &ty, &manifest));
    let first = assert_ok!(decode_value(&bytes, &ty, &manifest));
    let second = assert_ok!(decode_value(&bytes, &ty, &manifest));
    assert_eq!(first, second, "decoding is a pure function of its inputs");
}
