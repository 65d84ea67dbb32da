// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com
//
// Round-trip coverage: every supported kind, every dispatch path
// (surrogate, converter, custom, member-wise), collection shapes, arrays,
// nullables, constructed generics and the settings toggles.

use hgraph::{
    array_of, builtins, nullable_of, resolve, ArrayData, ObjectBody, Reader, SerializationSettings,
    TypeBuilder, Value, Writer,
};
use std::cell::RefCell;
use std::rc::Rc;

fn roundtrip(value: &Value) -> Value {
    let mut writer = Writer::new();
    writer.write(value).expect("write");
    let bytes = writer.into_bytes();
    Reader::new(&bytes).expect("open").read().expect("read")
}

fn roundtrip_with(settings: SerializationSettings, value: &Value) -> Value {
    let mut writer = Writer::with_settings(settings);
    writer.write(value).expect("write");
    let bytes = writer.into_bytes();
    Reader::new(&bytes).expect("open").read().expect("read")
}

#[test]
fn test_scalars_boxed_at_top() {
    assert!(roundtrip(&Value::Null).is_null());
    assert_eq!(roundtrip(&Value::from(true)).as_bool(), Some(true));
    assert_eq!(roundtrip(&Value::from('\u{1F980}')).as_char(), Some('\u{1F980}'));
    assert_eq!(roundtrip(&Value::I8(-128)).as_integral(), Some(-128));
    assert_eq!(roundtrip(&Value::U8(255)).as_integral(), Some(255));
    assert_eq!(roundtrip(&Value::I16(-30000)).as_integral(), Some(-30000));
    assert_eq!(roundtrip(&Value::U16(60000)).as_integral(), Some(60000));
    assert_eq!(roundtrip(&Value::from(-42i32)).as_i32(), Some(-42));
    assert_eq!(roundtrip(&Value::from(7u32)).as_u32(), Some(7));
    assert_eq!(roundtrip(&Value::from(i64::MIN)).as_i64(), Some(i64::MIN));
    assert_eq!(roundtrip(&Value::from(u64::MAX)).as_u64(), Some(u64::MAX));
    assert_eq!(roundtrip(&Value::from(1.5f32)).as_f32(), Some(1.5));
    assert_eq!(roundtrip(&Value::from(-2.25f64)).as_f64(), Some(-2.25));
}

#[test]
fn test_decimal_and_guid() {
    let decimal = [1u8, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16];
    let guid = [0xAAu8; 16];
    match roundtrip(&Value::decimal(decimal)) {
        Value::Decimal(d) => assert_eq!(d, decimal),
        other => panic!("expected decimal, got {other:?}"),
    }
    match roundtrip(&Value::guid(guid)) {
        Value::Guid(g) => assert_eq!(g, guid),
        other => panic!("expected guid, got {other:?}"),
    }
}

#[test]
fn test_strings_and_bytes() {
    assert_eq!(roundtrip(&Value::from("héllo wörld")).as_str(), Some("héllo wörld"));
    assert_eq!(roundtrip(&Value::from("")).as_str(), Some(""));
    assert_eq!(
        roundtrip(&Value::from(vec![0u8, 1, 2, 250])).as_bytes(),
        Some(&[0u8, 1, 2, 250][..])
    );
}

#[test]
fn test_composite_object() {
    let b = builtins();
    let sensor = TypeBuilder::reference("rt.Sensor", "tests")
        .field("id", b.uint32)
        .field("label", b.string)
        .field("reading", b.float64)
        .field("healthy", b.boolean)
        .build()
        .expect("register");

    let value = Value::object(sensor);
    if let Value::Object(obj) = &value {
        let mut body = obj.borrow_mut();
        body.set("id", 17u32);
        body.set("label", "bay-7");
        body.set("reading", 21.75f64);
        body.set("healthy", true);
    }

    let decoded = roundtrip(&value);
    let obj = decoded.as_object().expect("object");
    let body = obj.borrow();
    assert_eq!(body.get("id").and_then(Value::as_u32), Some(17));
    assert_eq!(body.get("label").and_then(Value::as_str), Some("bay-7"));
    assert_eq!(body.get("reading").and_then(Value::as_f64), Some(21.75));
    assert_eq!(body.get("healthy").and_then(Value::as_bool), Some(true));
}

#[test]
fn test_nested_object_and_null_reference() {
    let b = builtins();
    let leaf = TypeBuilder::reference("rt.Leaf", "tests")
        .field("n", b.int32)
        .build()
        .expect("register leaf");
    let branch = TypeBuilder::reference("rt.Branch", "tests")
        .field("left", leaf)
        .field("right", leaf)
        .build()
        .expect("register branch");

    let value = Value::object(branch);
    if let Value::Object(obj) = &value {
        let inner = Value::object(leaf);
        if let Value::Object(leaf_obj) = &inner {
            leaf_obj.borrow_mut().set("n", 9i32);
        }
        obj.borrow_mut().set("left", inner);
        // right stays null
    }

    let decoded = roundtrip(&value);
    let obj = decoded.as_object().expect("object");
    let body = obj.borrow();
    let left = body.get("left").expect("left").as_object().expect("leaf");
    assert_eq!(left.borrow().get("n").and_then(Value::as_i32), Some(9));
    assert!(body.get("right").expect("right").is_null());
}

#[test]
fn test_enum_member_and_boxed_enum() {
    let b = builtins();
    let color = TypeBuilder::enumeration("rt.Color", "tests", b.int32)
        .variant("Red", 0)
        .variant("Green", 1)
        .variant("Blue", 2)
        .build()
        .expect("register enum");
    let pixel = TypeBuilder::reference("rt.Pixel", "tests")
        .field("tint", color)
        .build()
        .expect("register pixel");

    let value = Value::object(pixel);
    if let Value::Object(obj) = &value {
        obj.borrow_mut().set("tint", Value::Enum(color, 2));
    }
    let decoded = roundtrip(&value);
    let obj = decoded.as_object().expect("object");
    assert_eq!(
        obj.borrow().get("tint").and_then(Value::as_enum),
        Some((color, 2))
    );

    // Boxed at the top type the enum travels with its descriptor.
    let boxed = roundtrip(&Value::Enum(color, 1));
    assert_eq!(boxed.as_enum(), Some((color, 1)));
}

#[test]
fn test_typed_collection_tail() {
    let b = builtins();
    let batch = TypeBuilder::reference("rt.Batch", "tests")
        .field("name", b.string)
        .typed_collection(b.int32)
        .build()
        .expect("register");

    let value = Value::object(batch);
    if let Value::Object(obj) = &value {
        let mut body = obj.borrow_mut();
        body.set("name", "primes");
        body.elements = Some(vec![2i32.into(), 3i32.into(), 5i32.into(), 7i32.into()]);
    }

    let decoded = roundtrip(&value);
    let obj = decoded.as_object().expect("object");
    let body = obj.borrow();
    let elements = body.elements.as_ref().expect("elements");
    let primes: Vec<i32> = elements.iter().filter_map(Value::as_i32).collect();
    assert_eq!(primes, vec![2, 3, 5, 7]);
}

#[test]
fn test_untyped_list_and_dict() {
    let list_ty = TypeBuilder::reference("rt.Anything", "tests")
        .untyped_list()
        .build()
        .expect("register list");
    let dict_ty = TypeBuilder::reference("rt.Lookup", "tests")
        .untyped_dict()
        .build()
        .expect("register dict");

    let list = Value::object(list_ty);
    if let Value::Object(obj) = &list {
        obj.borrow_mut().elements =
            Some(vec![Value::from(1i32), Value::from("two"), Value::Null]);
    }
    let decoded = roundtrip(&list);
    let obj = decoded.as_object().expect("list");
    let body = obj.borrow();
    let elements = body.elements.as_ref().expect("elements");
    assert_eq!(elements.len(), 3);
    assert_eq!(elements[0].as_i32(), Some(1));
    assert_eq!(elements[1].as_str(), Some("two"));
    assert!(elements[2].is_null());

    let dict = Value::object(dict_ty);
    if let Value::Object(obj) = &dict {
        obj.borrow_mut().entries = Some(vec![
            (Value::from("a"), Value::from(1i32)),
            (Value::from("b"), Value::from(2i32)),
        ]);
    }
    let decoded = roundtrip(&dict);
    let obj = decoded.as_object().expect("dict");
    let body = obj.borrow();
    let entries = body.entries.as_ref().expect("entries");
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].0.as_str(), Some("a"));
    assert_eq!(entries[0].1.as_i32(), Some(1));
    assert_eq!(entries[1].0.as_str(), Some("b"));
    assert_eq!(entries[1].1.as_i32(), Some(2));
}

#[test]
fn test_readonly_collection_suppresses_elements() {
    let frozen = TypeBuilder::reference("rt.Frozen", "tests")
        .untyped_list()
        .build()
        .expect("register");

    let value = Value::object(frozen);
    if let Value::Object(obj) = &value {
        let mut body = obj.borrow_mut();
        body.readonly = true;
        body.elements = Some(vec![Value::from(1i32)]);
    }

    let decoded = roundtrip(&value);
    let obj = decoded.as_object().expect("object");
    let body = obj.borrow();
    assert!(body.readonly);
    assert!(body.elements.as_ref().map_or(true, Vec::is_empty));
}

#[test]
fn test_rank_one_array() {
    let b = builtins();
    let value = Value::array(b.int32, vec![1i32.into(), 2i32.into(), 3i32.into()]);
    let decoded = roundtrip(&value);
    let obj = decoded.as_object().expect("array");
    let body = obj.borrow();
    assert!(body.ty.is_array());
    let data = body.array.as_ref().expect("array data");
    assert_eq!(data.lengths, vec![3]);
    let items: Vec<i32> = data.items.iter().filter_map(Value::as_i32).collect();
    assert_eq!(items, vec![1, 2, 3]);
}

#[test]
fn test_rank_two_array_row_major() {
    let b = builtins();
    let ty = array_of(b.int32, 2);
    let body = ObjectBody {
        ty,
        fields: Vec::new(),
        elements: None,
        entries: None,
        readonly: false,
        array: Some(ArrayData {
            lengths: vec![2, 3],
            items: (0..6).map(|i| Value::I32(i)).collect(),
        }),
    };
    let value = Value::Object(Rc::new(RefCell::new(body)));

    let decoded = roundtrip(&value);
    let obj = decoded.as_object().expect("array");
    let body = obj.borrow();
    let data = body.array.as_ref().expect("array data");
    assert_eq!(data.rank(), 2);
    assert_eq!(data.lengths, vec![2, 3]);
    let items: Vec<i32> = data.items.iter().filter_map(Value::as_i32).collect();
    assert_eq!(items, vec![0, 1, 2, 3, 4, 5]);
}

#[test]
fn test_nullable_member() {
    let b = builtins();
    let maybe_i32 = nullable_of(b.int32).expect("nullable");
    let record = TypeBuilder::reference("rt.MaybeHolder", "tests")
        .field("hint", maybe_i32)
        .build()
        .expect("register");

    let value = Value::object(record);
    if let Value::Object(obj) = &value {
        obj.borrow_mut().set("hint", Value::I32(5));
    }
    let decoded = roundtrip(&value);
    let obj = decoded.as_object().expect("object");
    assert_eq!(obj.borrow().get("hint").and_then(Value::as_i32), Some(5));
}

#[test]
fn test_null_in_nullable_slot_is_rejected_on_write() {
    let b = builtins();
    let maybe_i64 = nullable_of(b.int64).expect("nullable");
    let record = TypeBuilder::reference("rt.MaybeEmpty", "tests")
        .field("hint", maybe_i64)
        .build()
        .expect("register");

    // The compact nullable encoding has no null representation; the writer
    // refuses instead of producing an undecodable stream.
    let value = Value::object(record);
    let mut writer = Writer::new();
    assert!(writer.write(&value).is_err());
}

fn celsius_to_text(v: &Value) -> String {
    let deg = v
        .as_object()
        .and_then(|o| o.borrow().get("deg").and_then(Value::as_f64))
        .unwrap_or(0.0);
    format!("{deg}")
}

fn celsius_from_text(text: &str) -> Option<Value> {
    let deg: f64 = text.parse().ok()?;
    let ty = resolve("rt.Celsius", "tests")?;
    let value = Value::object(ty);
    if let Value::Object(obj) = &value {
        obj.borrow_mut().set("deg", deg);
    }
    Some(value)
}

#[test]
fn test_converter_path() {
    let b = builtins();
    let celsius = TypeBuilder::value("rt.Celsius", "tests")
        .field("deg", b.float64)
        .converter(celsius_to_text, celsius_from_text)
        .build()
        .expect("register");

    let value = Value::object(celsius);
    if let Value::Object(obj) = &value {
        obj.borrow_mut().set("deg", 36.6f64);
    }

    let decoded = roundtrip(&value);
    let obj = decoded.as_object().expect("reconstructed");
    assert_eq!(obj.borrow().get("deg").and_then(Value::as_f64), Some(36.6));
}

fn fahrenheit_to_text(v: &Value) -> String {
    let deg = v
        .as_object()
        .and_then(|o| o.borrow().get("deg").and_then(Value::as_f64))
        .unwrap_or(0.0);
    format!("{deg}")
}

fn fahrenheit_from_text(text: &str) -> Option<Value> {
    let deg: f64 = text.parse().ok()?;
    let ty = resolve("rt.Fahrenheit", "tests")?;
    let value = Value::object(ty);
    if let Value::Object(obj) = &value {
        obj.borrow_mut().set("deg", deg);
    }
    Some(value)
}

#[test]
fn test_ignore_converter_falls_through_to_members() {
    let b = builtins();
    let fahrenheit = TypeBuilder::value("rt.Fahrenheit", "tests")
        .field("deg", b.float64)
        .converter(fahrenheit_to_text, fahrenheit_from_text)
        .build()
        .expect("register");

    let value = Value::object(fahrenheit);
    if let Value::Object(obj) = &value {
        obj.borrow_mut().set("deg", 98.6f64);
    }

    let settings = SerializationSettings::new().with_ignore_converter(true);
    let decoded = roundtrip_with(settings, &value);
    let obj = decoded.as_object().expect("member-wise decode");
    assert_eq!(obj.borrow().get("deg").and_then(Value::as_f64), Some(98.6));
}

fn blob_emit(v: &Value) -> Vec<(String, Value)> {
    let (id, tag) = v
        .as_object()
        .map(|o| {
            let body = o.borrow();
            (
                body.get("id").and_then(Value::as_u32).unwrap_or(0),
                body.get("tag")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            )
        })
        .unwrap_or((0, String::new()));
    vec![
        ("id".to_string(), Value::from(id)),
        ("tag".to_string(), Value::from(tag)),
    ]
}

fn blob_reconstruct(bag: &[(String, Value)]) -> Option<Value> {
    let ty = resolve("rt.Blob", "tests")?;
    let value = Value::object(ty);
    if let Value::Object(obj) = &value {
        let mut body = obj.borrow_mut();
        for (name, item) in bag {
            body.set(name, item.clone());
        }
    }
    Some(value)
}

#[test]
fn test_custom_protocol_path() {
    let b = builtins();
    let blob = TypeBuilder::reference("rt.Blob", "tests")
        .field("id", b.uint32)
        .field("tag", b.string)
        .custom(blob_emit, Some(blob_reconstruct))
        .build()
        .expect("register");

    let value = Value::object(blob);
    if let Value::Object(obj) = &value {
        let mut body = obj.borrow_mut();
        body.set("id", 99u32);
        body.set("tag", "vault");
    }

    let decoded = roundtrip(&value);
    let obj = decoded.as_object().expect("reconstructed");
    let body = obj.borrow();
    assert_eq!(body.get("id").and_then(Value::as_u32), Some(99));
    assert_eq!(body.get("tag").and_then(Value::as_str), Some("vault"));
}

fn crate_emit(v: &Value) -> Vec<(String, Value)> {
    vec![(
        "n".to_string(),
        v.as_object()
            .and_then(|o| o.borrow().get("n").cloned())
            .unwrap_or(Value::Null),
    )]
}

#[test]
fn test_ignore_custom_falls_through_to_members() {
    let b = builtins();
    let crate_ty = TypeBuilder::reference("rt.Crate", "tests")
        .field("n", b.int32)
        .custom(crate_emit, None)
        .build()
        .expect("register");

    let value = Value::object(crate_ty);
    if let Value::Object(obj) = &value {
        obj.borrow_mut().set("n", 12i32);
    }

    let settings = SerializationSettings::new().with_ignore_custom(true);
    let decoded = roundtrip_with(settings, &value);
    let obj = decoded.as_object().expect("member-wise decode");
    assert_eq!(obj.borrow().get("n").and_then(Value::as_i32), Some(12));
}

fn instant_convert(v: &Value) -> Value {
    let ms = v
        .as_object()
        .and_then(|o| o.borrow().get("ms").and_then(Value::as_i64))
        .unwrap_or(0);
    let ty = resolve("rt.Stamp", "tests").expect("stamp registered");
    let value = Value::object(ty);
    if let Value::Object(obj) = &value {
        obj.borrow_mut().set("unix_ms", ms);
    }
    value
}

fn instant_revert(v: &Value) -> Value {
    let ms = v
        .as_object()
        .and_then(|o| o.borrow().get("unix_ms").and_then(Value::as_i64))
        .unwrap_or(0);
    let ty = resolve("rt.Instant", "tests").expect("instant registered");
    let value = Value::object(ty);
    if let Value::Object(obj) = &value {
        obj.borrow_mut().set("ms", ms);
    }
    value
}

#[test]
fn test_surrogate_path() {
    let b = builtins();
    let stamp = TypeBuilder::reference("rt.Stamp", "tests")
        .field("unix_ms", b.int64)
        .build()
        .expect("register stamp");
    let instant = TypeBuilder::value("rt.Instant", "tests")
        .field("ms", b.int64)
        .surrogate(stamp, instant_convert, instant_revert)
        .build()
        .expect("register instant");

    let value = Value::object(instant);
    if let Value::Object(obj) = &value {
        obj.borrow_mut().set("ms", 1_702_900_000_123i64);
    }

    let decoded = roundtrip(&value);
    let obj = decoded.as_object().expect("reverted instant");
    assert_eq!(
        obj.borrow().get("ms").and_then(Value::as_i64),
        Some(1_702_900_000_123)
    );
}

#[test]
fn test_skip_member_data() {
    let b = builtins();
    let compact = TypeBuilder::reference("rt.Compact", "tests")
        .field("a", b.int32)
        .field("b", b.string)
        .field("c", b.float64)
        .build()
        .expect("register");

    let value = Value::object(compact);
    if let Value::Object(obj) = &value {
        let mut body = obj.borrow_mut();
        body.set("a", 1i32);
        body.set("b", "two");
        body.set("c", 3.0f64);
    }

    let settings = SerializationSettings::new().with_skip_member_data(true);
    let decoded = roundtrip_with(settings, &value);
    let obj = decoded.as_object().expect("object");
    let body = obj.borrow();
    assert_eq!(body.get("a").and_then(Value::as_i32), Some(1));
    assert_eq!(body.get("b").and_then(Value::as_str), Some("two"));
    assert_eq!(body.get("c").and_then(Value::as_f64), Some(3.0));

    // The compact stream must actually be smaller: no member names ride
    // in the descriptor.
    let mut plain = Writer::new();
    plain.write(&value).expect("write plain");
    let mut compact_writer = Writer::with_settings(settings);
    compact_writer.write(&value).expect("write compact");
    assert!(compact_writer.into_bytes().len() < plain.into_bytes().len());
}

#[test]
fn test_type_values_roundtrip() {
    let b = builtins();
    // A well-known type comes back as the same handle via its preamble id.
    let decoded = roundtrip(&Value::Type(b.int32));
    assert_eq!(decoded.as_type().map(|t| t.full_name()), Some("i32"));

    // A user type travels as a full descriptor and resolves back.
    let gadget = TypeBuilder::reference("rt.Gadget", "tests")
        .field("weight", b.float32)
        .build()
        .expect("register");
    let decoded = roundtrip(&Value::Type(gadget));
    assert_eq!(decoded.as_type().map(|t| t.full_name()), Some("rt.Gadget"));
}

#[test]
fn test_constructed_generic_roundtrip() {
    let b = builtins();
    let def = TypeBuilder::generic_definition("rt.Box", "tests", &["T"])
        .field_param("value", 0)
        .build()
        .expect("register definition");
    let boxed_string = hgraph::construct_generic(def, &[b.string]).expect("construct");

    let value = Value::object(boxed_string);
    if let Value::Object(obj) = &value {
        obj.borrow_mut().set("value", "inside");
    }

    let decoded = roundtrip(&value);
    let obj = decoded.as_object().expect("constructed generic instance");
    let body = obj.borrow();
    assert_eq!(body.ty.full_name(), "rt.Box<string>");
    assert_eq!(body.get("value").and_then(Value::as_str), Some("inside"));
}
