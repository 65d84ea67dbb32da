// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Carrier for values whose wire type has no local counterpart.
//!
//! When the reader cannot map a descriptor to a registered type (or cannot
//! construct one), it still consumes the payload and parks everything here:
//! the descriptor, the surrogate object or converter text when those paths
//! were taken, the custom-serialization bag, the member values by name, and
//! any collection contents. A later pipeline (code generation, re-keying,
//! inspection) can still operate on the preserved data.

use super::type_data::TypeData;
use crate::value::Value;
use std::fmt;
use std::rc::Rc;

/// Decoded payload of an unresolved type.
pub struct ObjectData {
    /// The wire descriptor that failed to resolve.
    pub type_data: Rc<TypeData>,
    /// The underlying object when the writer took the surrogate path.
    pub surrogate_object: Option<Value>,
    /// The invariant string when the writer took the converter path.
    pub converter_text: Option<String>,
    /// The named-value bag when the writer took the custom path.
    pub serialization_info: Option<Vec<(String, Value)>>,
    /// Member values by wire name, in wire order.
    pub members: Vec<(String, Value)>,
    /// List or typed-collection tail.
    pub elements: Option<Vec<Value>>,
    /// Dictionary tail, in wire order.
    pub entries: Option<Vec<(Value, Value)>>,
    /// Per-rank lengths when the value was an array.
    pub array_lengths: Option<Vec<u32>>,
}

impl ObjectData {
    pub fn new(type_data: Rc<TypeData>) -> Self {
        Self {
            type_data,
            surrogate_object: None,
            converter_text: None,
            serialization_info: None,
            members: Vec::new(),
            elements: None,
            entries: None,
            array_lengths: None,
        }
    }

    /// Display name of the unresolved type.
    pub fn type_name(&self) -> String {
        self.type_data.type_name()
    }

    /// First member value with the given name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.members
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }
}

impl fmt::Debug for ObjectData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ObjectData({}, {} members)",
            self.type_name(),
            self.members.len()
        )
    }
}
