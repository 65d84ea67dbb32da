// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com
//
// Byte-exact wire assertions. These pin the format itself: the version
// header, the settings word position, well-known id emission, id
// monotonicity and the reference framing. Any change here is a wire break
// and needs a version bump.

use hgraph::{builtins, Reader, SerializationSettings, TypeBuilder, Value, Writer};

fn encode(value: &Value) -> Vec<u8> {
    let mut writer = Writer::new();
    writer.write(value).expect("write");
    writer.into_bytes()
}

#[test]
fn test_null_stream() {
    // VERSION 0x0102 = [0x82, 0x02], settings 0, null id 0.
    assert_eq!(encode(&Value::Null), vec![0x82, 0x02, 0x00, 0x00]);
}

#[test]
fn test_empty_string_is_well_known_id_six() {
    assert_eq!(encode(&Value::from("")), vec![0x82, 0x02, 0x00, 0x06]);
}

#[test]
fn test_boxed_i32_layout() {
    // Fresh id 22, well-known i32 descriptor id 15, zig-zag(42) = 84.
    assert_eq!(
        encode(&Value::from(42i32)),
        vec![0x82, 0x02, 0x00, 22, 15, 84]
    );
}

#[test]
fn test_well_known_type_emits_id_only() {
    let b = builtins();
    // The writer must never emit a well-known object's body.
    assert_eq!(encode(&Value::Type(b.int32)), vec![0x82, 0x02, 0x00, 15]);
    assert_eq!(encode(&Value::Type(b.object)), vec![0x82, 0x02, 0x00, 1]);
    assert_eq!(encode(&Value::Type(b.decimal)), vec![0x82, 0x02, 0x00, 21]);
}

#[test]
fn test_i32_array_layout() {
    let b = builtins();
    let bytes = encode(&Value::array(
        b.int32,
        vec![1i32.into(), 2i32.into(), 3i32.into()],
    ));

    // Prefix: version, settings, fresh array id 22, fresh descriptor id 23.
    assert_eq!(&bytes[..5], &[0x82, 0x02, 0x00, 22, 23]);
    // Suffix: length 3, then zig-zag 1, 2, 3.
    assert_eq!(&bytes[bytes.len() - 4..], &[3, 2, 4, 6]);
}

#[test]
fn test_session_ids_are_monotone_in_encounter_order() {
    let bag_ty = TypeBuilder::reference("wire.Bag", "tests")
        .untyped_list()
        .build()
        .expect("register");

    let value = Value::object(bag_ty);
    if let Value::Object(obj) = &value {
        obj.borrow_mut().elements = Some(vec![Value::from("alpha"), Value::from("beta")]);
    }

    let bytes = encode(&value);
    // The two element strings are fresh reference objects written in
    // order; their bodies appear in encounter order in the stream.
    let alpha = bytes
        .windows(5)
        .position(|w| w == b"alpha")
        .expect("alpha body");
    let beta = bytes
        .windows(4)
        .position(|w| w == b"beta")
        .expect("beta body");
    assert!(alpha < beta);

    // Each string body is preceded by its length, the well-known string
    // descriptor id, and its fresh id; the fresh ids are consecutive.
    assert_eq!(bytes[alpha - 1], 5, "alpha length prefix");
    assert_eq!(bytes[alpha - 2], 2, "well-known string descriptor id");
    let alpha_id = bytes[alpha - 3];
    let beta_id = bytes[beta - 3];
    assert_eq!(beta_id, alpha_id + 1);
}

#[test]
fn test_settings_word_sits_between_version_and_root() {
    let settings = SerializationSettings::new()
        .with_ignore_converter(true)
        .with_ignore_custom(true);
    let mut writer = Writer::with_settings(settings);
    writer.write(&Value::Null).expect("write");
    let bytes = writer.into_bytes();
    assert_eq!(bytes, vec![0x82, 0x02, 0b110, 0x00]);
}

#[test]
fn test_shared_reference_reuses_id() {
    let b = builtins();
    let pair_ty = TypeBuilder::reference("wire.SharedPair", "tests")
        .field("first", b.bytes)
        .field("second", b.bytes)
        .build()
        .expect("register");

    let shared = Value::from(vec![0xDEu8, 0xAD, 0xBE, 0xEF]);
    let value = Value::object(pair_ty);
    if let Value::Object(obj) = &value {
        let mut body = obj.borrow_mut();
        body.set("first", shared.clone());
        body.set("second", shared.clone());
    }

    let bytes = encode(&value);
    let payload = [0xDEu8, 0xAD, 0xBE, 0xEF];
    let occurrences = bytes
        .windows(payload.len())
        .filter(|w| *w == &payload[..])
        .count();
    assert_eq!(occurrences, 1, "shared blob body must be written once");
}

#[test]
fn test_descriptor_body_once_per_type() {
    let b = builtins();
    let item_ty = TypeBuilder::reference("wire.RepeatItem", "tests")
        .field("n", b.int32)
        .build()
        .expect("register item");
    let bag_ty = TypeBuilder::reference("wire.RepeatBag", "tests")
        .untyped_list()
        .build()
        .expect("register bag");

    let value = Value::object(bag_ty);
    if let Value::Object(obj) = &value {
        let mut elements = Vec::new();
        for n in 0..3 {
            let item = Value::object(item_ty);
            if let Value::Object(io) = &item {
                io.borrow_mut().set("n", Value::I32(n));
            }
            elements.push(item);
        }
        obj.borrow_mut().elements = Some(elements);
    }

    let bytes = encode(&value);
    let name = b"wire.RepeatItem";
    let occurrences = bytes.windows(name.len()).filter(|w| *w == &name[..]).count();
    assert_eq!(
        occurrences, 1,
        "the descriptor body must ride the stream exactly once"
    );
}

#[test]
fn test_reader_observes_writer_settings() {
    let b = builtins();
    let compact_ty = TypeBuilder::reference("wire.CompactRecord", "tests")
        .field("n", b.int32)
        .build()
        .expect("register");

    let value = Value::object(compact_ty);
    if let Value::Object(obj) = &value {
        obj.borrow_mut().set("n", 4i32);
    }

    // The reader's own defaults say nothing about skip_member_data; it
    // must pick the mode up from the stream before the first payload byte.
    let settings = SerializationSettings::new().with_skip_member_data(true);
    let mut writer = Writer::with_settings(settings);
    writer.write(&value).expect("write");
    let bytes = writer.into_bytes();

    let decoded = Reader::new(&bytes).expect("open").read().expect("read");
    let obj = decoded.as_object().expect("object");
    assert_eq!(obj.borrow().get("n").and_then(Value::as_i32), Some(4));
}
