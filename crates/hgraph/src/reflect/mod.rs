// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Runtime type reflection.
//!
//! The codec never sees concrete Rust types; it walks [`RuntimeType`]
//! descriptions registered here. A [`TypeHandle`] is interned and
//! process-global: both the writer (producing wire descriptors) and the
//! reader (resolving them back) go through this registry.
//!
//! # Registering types
//!
//! ```ignore
//! use hgraph::reflect::{builtins, TypeBuilder};
//!
//! let b = builtins();
//! let sensor = TypeBuilder::reference("telemetry.Sensor", "demo")
//!     .field("id", b.uint32)
//!     .field("label", b.string)
//!     .build()?;
//! ```

mod builder;
mod hooks;
mod kind;
mod registry;
mod runtime_type;

pub use builder::TypeBuilder;
pub use hooks::{Converter, CustomSerializable, DeserializedCallback, Surrogate};
pub use kind::{CollectionShape, PrimitiveKind};
pub use registry::{
    array_of, builtins, construct_generic, nullable_of, resolve, Builtins, RegistryError,
    CORE_ASSEMBLY,
};
pub use runtime_type::{same_type, CollectionSpec, Member, RuntimeType, TypeHandle};
