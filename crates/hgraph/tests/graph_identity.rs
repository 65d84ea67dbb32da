// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com
//
// Identity semantics across the round trip: shared references stay shared,
// cycles reconstruct, and post-construction callbacks fire in id order once
// the graph is whole.

use hgraph::{builtins, Member, Reader, TypeBuilder, Value, Writer};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

fn roundtrip(value: &Value) -> Value {
    let mut writer = Writer::new();
    writer.write(value).expect("write");
    let bytes = writer.into_bytes();
    Reader::new(&bytes).expect("open").read().expect("read")
}

#[test]
fn test_self_cycle() {
    let b = builtins();
    let node = TypeBuilder::reference("ident.SelfNode", "tests")
        .build()
        .expect("register");
    node.define_members(vec![Member::new("next", node), Member::new("id", b.int32)])
        .expect("define");

    let value = Value::object(node);
    if let Value::Object(obj) = &value {
        let mut body = obj.borrow_mut();
        body.set("next", value.clone());
        body.set("id", 1i32);
    }

    let decoded = roundtrip(&value);
    let obj = decoded.as_object().expect("node");
    let next = obj.borrow().get("next").cloned().expect("next");
    assert!(decoded.ptr_eq(&next), "cycle must close on the same instance");
    assert_eq!(obj.borrow().get("id").and_then(Value::as_i32), Some(1));
}

#[test]
fn test_mutual_cycle() {
    let ping = TypeBuilder::reference("ident.Ping", "tests")
        .build()
        .expect("register ping");
    let pong = TypeBuilder::reference("ident.Pong", "tests")
        .build()
        .expect("register pong");
    ping.define_members(vec![Member::new("peer", pong)])
        .expect("define ping");
    pong.define_members(vec![Member::new("peer", ping)])
        .expect("define pong");

    let a = Value::object(ping);
    let z = Value::object(pong);
    if let (Value::Object(ao), Value::Object(zo)) = (&a, &z) {
        ao.borrow_mut().set("peer", z.clone());
        zo.borrow_mut().set("peer", a.clone());
    }

    let decoded = roundtrip(&a);
    let decoded_ping = decoded.as_object().expect("ping");
    let decoded_pong = decoded_ping
        .borrow()
        .get("peer")
        .cloned()
        .expect("pong peer");
    let back = decoded_pong
        .as_object()
        .expect("pong")
        .borrow()
        .get("peer")
        .cloned()
        .expect("ping peer");
    assert!(decoded.ptr_eq(&back), "a -> b -> a must close the loop");
}

#[test]
fn test_list_elements_share_identity() {
    let b = builtins();
    let item = TypeBuilder::reference("ident.Item", "tests")
        .field("n", b.int32)
        .build()
        .expect("register item");
    let bag = TypeBuilder::reference("ident.Bag", "tests")
        .untyped_list()
        .build()
        .expect("register bag");

    let shared = Value::object(item);
    if let Value::Object(obj) = &shared {
        obj.borrow_mut().set("n", 5i32);
    }
    let value = Value::object(bag);
    if let Value::Object(obj) = &value {
        obj.borrow_mut().elements = Some(vec![shared.clone(), shared.clone()]);
    }

    let decoded = roundtrip(&value);
    let obj = decoded.as_object().expect("bag");
    let body = obj.borrow();
    let elements = body.elements.as_ref().expect("elements");
    assert_eq!(elements.len(), 2);
    assert!(
        elements[0].ptr_eq(&elements[1]),
        "shared element must decode to one instance"
    );
    assert_eq!(elements[0].as_object().map(|o| o.borrow().get("n").and_then(Value::as_i32)), Some(Some(5)));
}

#[test]
fn test_diamond_sharing() {
    let b = builtins();
    let point = TypeBuilder::reference("ident.Point", "tests")
        .field("x", b.int32)
        .build()
        .expect("register point");
    let edge = TypeBuilder::reference("ident.Edge", "tests")
        .field("from", point)
        .field("to", point)
        .build()
        .expect("register edge");

    let shared = Value::object(point);
    let value = Value::object(edge);
    if let Value::Object(obj) = &value {
        let mut body = obj.borrow_mut();
        body.set("from", shared.clone());
        body.set("to", shared.clone());
    }

    let decoded = roundtrip(&value);
    let obj = decoded.as_object().expect("edge");
    let body = obj.borrow();
    let from = body.get("from").cloned().expect("from");
    let to = body.get("to").cloned().expect("to");
    assert!(from.ptr_eq(&to), "diamond edges must share one instance");
}

#[test]
fn test_equal_strings_intern_to_one_instance() {
    let b = builtins();
    let pair = TypeBuilder::reference("ident.StrPair", "tests")
        .field("first", b.string)
        .field("second", b.string)
        .build()
        .expect("register");

    // Two distinct allocations with equal content: the writer interns
    // strings by value, so they decode as one shared instance.
    let value = Value::object(pair);
    if let Value::Object(obj) = &value {
        let mut body = obj.borrow_mut();
        body.set("first", Value::from("twin"));
        body.set("second", Value::from("twin"));
    }

    let decoded = roundtrip(&value);
    let obj = decoded.as_object().expect("pair");
    let body = obj.borrow();
    let first = body.get("first").cloned().expect("first");
    let second = body.get("second").cloned().expect("second");
    assert_eq!(first.as_str(), Some("twin"));
    assert!(first.ptr_eq(&second));
}

#[test]
fn test_cycle_through_array() {
    let holder = TypeBuilder::reference("ident.ArrayHolder", "tests")
        .build()
        .expect("register");
    let holder_array = hgraph::array_of(holder, 1);
    holder.define_members(vec![Member::new("peers", holder_array)])
        .expect("define");

    let value = Value::object(holder);
    if let Value::Object(obj) = &value {
        let array = Value::array(holder, vec![value.clone()]);
        obj.borrow_mut().set("peers", array);
    }

    let decoded = roundtrip(&value);
    let obj = decoded.as_object().expect("holder");
    let peers = obj.borrow().get("peers").cloned().expect("peers");
    let peers_obj = peers.as_object().expect("array");
    let peers_body = peers_obj.borrow();
    let items = &peers_body.array.as_ref().expect("array data").items;
    assert_eq!(items.len(), 1);
    assert!(
        decoded.ptr_eq(&items[0]),
        "array element must be the enclosing instance"
    );
}

static CALLBACK_ORDER: Mutex<Vec<i64>> = Mutex::new(Vec::new());
static CALLBACK_COUNT: AtomicUsize = AtomicUsize::new(0);

fn record_callback(value: &Value) {
    CALLBACK_COUNT.fetch_add(1, Ordering::SeqCst);
    if let Value::Object(obj) = value {
        let n = obj.borrow().get("n").and_then(Value::as_i64).unwrap_or(-1);
        CALLBACK_ORDER.lock().expect("order lock").push(n);
    }
}

#[test]
fn test_callbacks_fire_once_per_instance_in_id_order() {
    let b = builtins();
    let tracked = TypeBuilder::reference("ident.Tracked", "tests")
        .field("n", b.int64)
        .on_deserialized(record_callback)
        .build()
        .expect("register");
    let bag = TypeBuilder::reference("ident.TrackedBag", "tests")
        .untyped_list()
        .build()
        .expect("register bag");

    let value = Value::object(bag);
    if let Value::Object(obj) = &value {
        let mut elements = Vec::new();
        for n in [10i64, 20, 30] {
            let item = Value::object(tracked);
            if let Value::Object(io) = &item {
                io.borrow_mut().set("n", n);
            }
            elements.push(item);
        }
        obj.borrow_mut().elements = Some(elements);
    }

    let decoded = roundtrip(&value);
    assert!(decoded.as_object().is_some());
    assert_eq!(CALLBACK_COUNT.load(Ordering::SeqCst), 3);
    // Ids are allocated in encounter order, so callbacks observe the
    // elements in their written order.
    assert_eq!(*CALLBACK_ORDER.lock().expect("order lock"), vec![10, 20, 30]);
}
