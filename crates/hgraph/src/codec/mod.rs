// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The encoding engine: session context, wire descriptors, writer and
//! reader state machines, and the unresolved-type carrier.
//!
//! # Stream layout
//!
//! ```text
//! stream := varuint VERSION          (0x0102)
//!        ,  varuint SETTINGS          (emitted at recursion depth 1)
//!        ,  value                     (one root, written at the top type)
//! ```
//!
//! Every reference-typed payload is framed as `varuint id`, then — only when
//! the id is fresh — the optional actual-type descriptor and the body. Id 0
//! is null. Ids 1..=21 are the well-known preamble both peers share without
//! transmission; session ids start at 22 and are allocated in encounter
//! order.

mod context;
mod object_data;
mod reader;
mod type_data;
mod writer;

pub use context::{Context, WELL_KNOWN_COUNT};
pub use object_data::ObjectData;
pub use reader::Reader;
pub use type_data::{TypeData, TypeMember};
pub use writer::Writer;

/// Wire format version. Readers reject anything else.
pub const WIRE_VERSION: u64 = 0x0102;

const SETTINGS_SKIP_MEMBER_DATA: u64 = 1;
const SETTINGS_IGNORE_CONVERTER: u64 = 1 << 1;
const SETTINGS_IGNORE_CUSTOM: u64 = 1 << 2;
const SETTINGS_KNOWN_BITS: u64 =
    SETTINGS_SKIP_MEMBER_DATA | SETTINGS_IGNORE_CONVERTER | SETTINGS_IGNORE_CUSTOM;

/// Optional behaviors, encoded as a flag word right after the version
/// header so the reader observes them before the first payload byte.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SerializationSettings {
    /// Omit member lists from descriptors; both peers must agree on member
    /// order through their own registries.
    pub skip_member_data: bool,
    /// Never take the converter path, even when a type has one.
    pub ignore_converter: bool,
    /// Never take the custom-serialization path, even when a type has one.
    pub ignore_custom: bool,
}

impl SerializationSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_skip_member_data(mut self, value: bool) -> Self {
        self.skip_member_data = value;
        self
    }

    pub fn with_ignore_converter(mut self, value: bool) -> Self {
        self.ignore_converter = value;
        self
    }

    pub fn with_ignore_custom(mut self, value: bool) -> Self {
        self.ignore_custom = value;
        self
    }

    /// Encode as the wire flag word.
    pub fn to_flags(self) -> u64 {
        let mut flags = 0;
        if self.skip_member_data {
            flags |= SETTINGS_SKIP_MEMBER_DATA;
        }
        if self.ignore_converter {
            flags |= SETTINGS_IGNORE_CONVERTER;
        }
        if self.ignore_custom {
            flags |= SETTINGS_IGNORE_CUSTOM;
        }
        flags
    }

    /// Decode a wire flag word. Unknown bits are a decode error, not a
    /// silent no-op: a bit this build does not understand may change the
    /// byte layout that follows.
    pub fn from_flags(flags: u64) -> Option<Self> {
        if flags & !SETTINGS_KNOWN_BITS != 0 {
            return None;
        }
        Some(Self {
            skip_member_data: flags & SETTINGS_SKIP_MEMBER_DATA != 0,
            ignore_converter: flags & SETTINGS_IGNORE_CONVERTER != 0,
            ignore_custom: flags & SETTINGS_IGNORE_CUSTOM != 0,
        })
    }
}
