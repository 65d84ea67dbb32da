// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # HGraph - Identity-preserving binary object-graph serialization
//!
//! HGraph writes and reads arbitrary object graphs to a compact,
//! self-describing byte stream. Shared references and cycles survive the
//! round trip, runtime types travel alongside declared types, and enough
//! schema rides in the stream that a receiver can decode payloads whose
//! types it has never seen.
//!
//! ## Quick Start
//!
//! ```rust
//! use hgraph::{builtins, Reader, TypeBuilder, Value, Writer};
//!
//! # fn main() -> hgraph::Result<()> {
//! let b = builtins();
//! let sensor = TypeBuilder::reference("quickstart.Sensor", "demo")
//!     .field("id", b.uint32)
//!     .field("label", b.string)
//!     .build()
//!     .expect("fresh type name");
//!
//! let reading = Value::object(sensor);
//! if let Value::Object(obj) = &reading {
//!     let mut body = obj.borrow_mut();
//!     body.set("id", 42u32);
//!     body.set("label", "bay-7");
//! }
//!
//! let mut writer = Writer::new();
//! writer.write(&reading)?;
//! let bytes = writer.into_bytes();
//!
//! let decoded = Reader::new(&bytes)?.read()?;
//! let obj = decoded.as_object().expect("decoded instance");
//! assert_eq!(obj.borrow().get("id").and_then(Value::as_u32), Some(42));
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +------------------------------------------------------------------+
//! |                        Application Layer                          |
//! |        Value graphs  <->  TypeBuilder / type registry             |
//! +------------------------------------------------------------------+
//! |                         Codec Layer                               |
//! |   Writer / Reader state machines | Context (id registry)          |
//! |   TypeData (wire descriptors)    | ObjectData (fallback carrier)  |
//! +------------------------------------------------------------------+
//! |                       Primitive Layer                             |
//! |   ULEB128 varints | scalar / string / blob codecs                 |
//! +------------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Value`] | Type-erased graph node with reference identity |
//! | [`Writer`] | Encoding session: one root per stream |
//! | [`Reader`] | Decoding session: `read` converts, `read_raw` preserves |
//! | [`TypeBuilder`] | Registers runtime types into the global registry |
//! | [`ObjectData`] | Carrier for payloads whose type is unknown locally |
//!
//! ## Guarantees
//!
//! - **Round trip**: supported values decode structurally equal.
//! - **Sharing**: reference-equal nodes stay reference-equal after decode.
//! - **Cycles**: instances register at their id before their body decodes.
//! - **Version tolerance**: added members take defaults, removed members
//!   are consumed and discarded.
//! - **Unknown types**: decode to [`ObjectData`] carriers, never an error.
//!
//! ## Modules Overview
//!
//! - [`codec`] - Writer/Reader state machines and the wire descriptors
//! - [`reflect`] - Runtime type registry and the [`TypeBuilder`] API
//! - [`value`] - The dynamic [`Value`] graph model
//! - [`ser`] - Primitive wire encodings (varints, scalars, strings)
//! - [`logging`] - Compile-time switchable logging

// Allow the log macros to resolve inside this crate's own modules.
extern crate self as hgraph;

/// Writer/Reader state machines, session context and wire descriptors.
pub mod codec;
/// Error taxonomy shared by encoding and decoding sessions.
pub mod error;
/// Compile-time configurable logging (zero-cost when disabled).
pub mod logging;
/// Runtime type reflection and registration.
pub mod reflect;
/// Primitive wire encodings.
pub mod ser;
/// The dynamic value model.
pub mod value;

pub use codec::{
    Context, ObjectData, Reader, SerializationSettings, TypeData, Writer, WELL_KNOWN_COUNT,
    WIRE_VERSION,
};
pub use error::{CodecError, Result};
pub use reflect::{
    array_of, builtins, construct_generic, nullable_of, resolve, Builtins, CollectionShape,
    CollectionSpec, Converter, CustomSerializable, Member, PrimitiveKind, RegistryError,
    RuntimeType, Surrogate, TypeBuilder, TypeHandle,
};
pub use value::{ArrayData, ObjRef, ObjectBody, Value};
