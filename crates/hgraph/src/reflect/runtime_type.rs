// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The in-memory reflection façade: [`RuntimeType`] and its members.
//!
//! Runtime types are process-global and interned by the registry; a
//! [`TypeHandle`] is a `&'static` reference whose address doubles as the
//! type's identity. Member lists are deferred through a `OnceLock` so
//! self-referential types can register first and define members second.

use super::hooks::{Converter, CustomSerializable, DeserializedCallback, Surrogate};
use super::kind::{CollectionShape, PrimitiveKind};
use std::fmt;
use std::sync::OnceLock;

/// Interned handle to a registered type. Address equality is type equality.
pub type TypeHandle = &'static RuntimeType;

/// Identity test for two handles.
#[inline]
pub fn same_type(a: TypeHandle, b: TypeHandle) -> bool {
    std::ptr::eq(a, b)
}

/// A named, typed member of a composite type.
#[derive(Debug, Clone)]
pub struct Member {
    pub name: String,
    pub ty: TypeHandle,
}

impl Member {
    pub fn new(name: impl Into<String>, ty: TypeHandle) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Collection behavior of a type.
#[derive(Debug, Clone, Copy)]
pub enum CollectionSpec {
    None,
    UntypedList,
    UntypedDict,
    Typed { element: TypeHandle },
    TypedDict { key: TypeHandle, value: TypeHandle },
}

impl CollectionSpec {
    pub fn shape(&self) -> CollectionShape {
        match self {
            Self::None => CollectionShape::None,
            Self::UntypedList => CollectionShape::UntypedList,
            Self::UntypedDict => CollectionShape::UntypedDict,
            Self::Typed { .. } => CollectionShape::TypedCollection,
            Self::TypedDict { .. } => CollectionShape::TypedDict,
        }
    }

    /// The element slot (typed collections) or key slot (typed dictionaries).
    pub fn first_type(&self) -> Option<TypeHandle> {
        match *self {
            Self::Typed { element } => Some(element),
            Self::TypedDict { key, .. } => Some(key),
            _ => None,
        }
    }

    /// The value slot of a typed dictionary.
    pub fn second_type(&self) -> Option<TypeHandle> {
        match *self {
            Self::TypedDict { value, .. } => Some(value),
            _ => None,
        }
    }
}

/// Runtime description of a type: kind, shape flags, hierarchy, members,
/// collection behavior and serialization hooks.
pub struct RuntimeType {
    pub(crate) full_name: String,
    pub(crate) assembly: String,
    pub(crate) kind: PrimitiveKind,
    pub(crate) is_reference: bool,
    pub(crate) is_sealed: bool,
    pub(crate) is_interface: bool,
    pub(crate) is_enum: bool,
    pub(crate) is_array: bool,
    pub(crate) is_nullable: bool,
    pub(crate) is_generic: bool,
    pub(crate) is_generic_definition: bool,
    pub(crate) is_generic_parameter: bool,
    pub(crate) array_rank: u32,
    pub(crate) generic_parameter_index: u32,
    pub(crate) base: Option<TypeHandle>,
    pub(crate) element: Option<TypeHandle>,
    pub(crate) generic_args: Vec<TypeHandle>,
    pub(crate) members: OnceLock<Vec<Member>>,
    pub(crate) collection: CollectionSpec,
    pub(crate) variants: Vec<(String, i64)>,
    pub(crate) surrogate: Option<Surrogate>,
    pub(crate) converter: Option<Converter>,
    pub(crate) custom: Option<CustomSerializable>,
    pub(crate) on_deserialized: Option<DeserializedCallback>,
}

impl RuntimeType {
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn assembly(&self) -> &str {
        &self.assembly
    }

    pub fn kind(&self) -> PrimitiveKind {
        self.kind
    }

    pub fn is_supported(&self) -> bool {
        self.kind != PrimitiveKind::None
    }

    pub fn is_reference(&self) -> bool {
        self.is_reference
    }

    pub fn is_sealed(&self) -> bool {
        self.is_sealed
    }

    pub fn is_interface(&self) -> bool {
        self.is_interface
    }

    pub fn is_enum(&self) -> bool {
        self.is_enum
    }

    pub fn is_array(&self) -> bool {
        self.is_array
    }

    pub fn is_nullable(&self) -> bool {
        self.is_nullable
    }

    pub fn is_generic(&self) -> bool {
        self.is_generic
    }

    pub fn is_generic_definition(&self) -> bool {
        self.is_generic_definition
    }

    pub fn is_generic_parameter(&self) -> bool {
        self.is_generic_parameter
    }

    /// A generic type with its arguments filled in.
    pub fn is_constructed_generic(&self) -> bool {
        self.is_generic && !self.is_generic_definition
    }

    pub fn is_custom_serializable(&self) -> bool {
        self.custom.is_some()
    }

    pub fn has_converter(&self) -> bool {
        self.converter.is_some()
    }

    pub fn array_rank(&self) -> u32 {
        self.array_rank
    }

    pub fn generic_parameter_index(&self) -> u32 {
        self.generic_parameter_index
    }

    pub fn base(&self) -> Option<TypeHandle> {
        self.base
    }

    /// Array element type, enum underlying type, or the generic definition
    /// of a constructed generic.
    pub fn element(&self) -> Option<TypeHandle> {
        self.element
    }

    /// Generic arguments (constructed generics) or parameter placeholders
    /// (generic definitions).
    pub fn generic_args(&self) -> &[TypeHandle] {
        &self.generic_args
    }

    /// Members declared directly on this type.
    pub fn declared_members(&self) -> &[Member] {
        self.members.get().map(Vec::as_slice).unwrap_or(&[])
    }

    /// The full member list: inherited (base-first), then declared. This
    /// order is authoritative for the wire: member values appear in exactly
    /// this order.
    pub fn all_members(&self) -> Vec<&Member> {
        let mut out = Vec::new();
        self.collect_members(&mut out);
        out
    }

    fn collect_members<'a>(&'a self, out: &mut Vec<&'a Member>) {
        if let Some(base) = self.base {
            base.collect_members(out);
        }
        out.extend(self.declared_members().iter());
    }

    /// Index of the most-derived member with the given name within
    /// [`all_members`](Self::all_members), if any.
    pub fn member_index(&self, name: &str) -> Option<usize> {
        let members = self.all_members();
        members.iter().rposition(|m| m.name == name)
    }

    /// Fill in the declared member list. Two-phase registration for
    /// self-referential types: register the type, then define its members.
    pub fn define_members(&self, members: Vec<Member>) -> Result<(), super::RegistryError> {
        self.members
            .set(members)
            .map_err(|_| super::RegistryError::MembersAlreadyDefined {
                type_name: self.full_name.clone(),
            })
    }

    pub fn collection(&self) -> &CollectionSpec {
        &self.collection
    }

    /// Enum variant (name, value) pairs. Local convenience only; variants
    /// never travel on the wire.
    pub fn variants(&self) -> &[(String, i64)] {
        &self.variants
    }

    /// Look up an enum variant value by name.
    pub fn variant_value(&self, name: &str) -> Option<i64> {
        self.variants
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    pub fn surrogate(&self) -> Option<&Surrogate> {
        self.surrogate.as_ref()
    }

    pub fn converter(&self) -> Option<&Converter> {
        self.converter.as_ref()
    }

    pub fn custom(&self) -> Option<&CustomSerializable> {
        self.custom.as_ref()
    }

    pub fn on_deserialized(&self) -> Option<DeserializedCallback> {
        self.on_deserialized
    }

    /// Whether the reader can produce an instance of this type.
    pub fn can_construct(&self) -> bool {
        self.kind == PrimitiveKind::Object
            && !self.is_interface
            && !self.is_generic_definition
            && !self.is_generic_parameter
    }

    /// Identity key: the interned address.
    pub fn key(&'static self) -> usize {
        self as *const RuntimeType as usize
    }
}

impl fmt::Debug for RuntimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Member lists can reference this type again; print shallowly.
        write!(f, "RuntimeType({})", self.full_name)
    }
}

// Interned types compare and hash by identity.
impl PartialEq for RuntimeType {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

impl Eq for RuntimeType {}

impl std::hash::Hash for RuntimeType {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        (self as *const RuntimeType as usize).hash(state);
    }
}
