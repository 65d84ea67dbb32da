// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-type behavior hooks: surrogates, string converters, the
//! custom-serialization protocol and the post-deserialization callback.
//!
//! All hooks are plain function pointers registered alongside the type, so a
//! [`RuntimeType`](super::RuntimeType) stays `Sync` and hook dispatch costs
//! one indirect call.

use super::runtime_type::TypeHandle;
use crate::value::Value;

/// Companion type that stands in for the original on the wire.
///
/// `convert` runs on write (original to surrogate), `revert` on read
/// (surrogate back to original).
#[derive(Debug, Clone, Copy)]
pub struct Surrogate {
    pub surrogate_type: TypeHandle,
    pub convert: fn(&Value) -> Value,
    pub revert: fn(&Value) -> Value,
}

/// Bidirectional, invariant-culture string form of a value.
///
/// `from_text` returns `None` when the text does not parse.
#[derive(Debug, Clone, Copy)]
pub struct Converter {
    pub to_text: fn(&Value) -> String,
    pub from_text: fn(&str) -> Option<Value>,
}

/// Named-value-bag serialization protocol.
///
/// `emit` produces the bag on write. `reconstruct` rebuilds an instance from
/// the bag on read; when absent (or when it returns `None`) the reader falls
/// back to an [`ObjectData`](crate::ObjectData) carrier holding the bag.
#[derive(Debug, Clone, Copy)]
pub struct CustomSerializable {
    pub emit: fn(&Value) -> Vec<(String, Value)>,
    pub reconstruct: Option<fn(&[(String, Value)]) -> Option<Value>>,
}

/// Callback invoked after the whole graph has been reconstructed, in id
/// order. Receives the freshly built instance.
pub type DeserializedCallback = fn(&Value);
