// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The on-wire type descriptor.
//!
//! A `TypeData` is the serialized shadow of a [`RuntimeType`]: a flag word
//! carrying kind, shape and modifier bits, followed (for object kinds) by
//! element / surrogate / generic-argument references, the name section, and
//! the member list. Descriptors are reference objects in the stream, so the
//! reader registers a descriptor at its id *before* decoding its body; the
//! `OnceCell` slots here are what make that register-first protocol — and
//! therefore self-referential types — work.
//!
//! Constructed generics are compact on the wire: they carry only their
//! definition and argument list, and the `effective_*` accessors rebuild
//! members, base, surrogate and collection types by substitution.

use crate::reflect::{self, builtins, CollectionShape, PrimitiveKind, TypeHandle};
use std::cell::OnceCell;
use std::fmt;
use std::rc::Rc;

const FLAG_SUPPORTED: u64 = 1;
const FLAG_INTERFACE: u64 = 1 << 1;
const FLAG_CUSTOM: u64 = 1 << 2;
const FLAG_REFERENCE: u64 = 1 << 3;
const FLAG_SEALED: u64 = 1 << 4;
const FLAG_ARRAY: u64 = 1 << 5;
const FLAG_NULLABLE: u64 = 1 << 6;
const FLAG_ENUM: u64 = 1 << 7;
const FLAG_GENERIC: u64 = 1 << 8;
const FLAG_GENERIC_PARAMETER: u64 = 1 << 9;
const FLAG_GENERIC_DEFINITION: u64 = 1 << 10;
const FLAG_CONVERTER: u64 = 1 << 11;
const KIND_SHIFT: u32 = 12;
const KIND_MASK: u64 = 0x1F;
const SHAPE_SHIFT: u32 = 17;
const SHAPE_MASK: u64 = 0x7;

/// A named member in a wire descriptor.
#[derive(Clone)]
pub struct TypeMember {
    pub name: Rc<str>,
    pub ty: Rc<TypeData>,
}

/// On-wire type descriptor. See the module docs for the framing.
pub struct TypeData {
    flags: u64,
    kind: PrimitiveKind,
    collection: CollectionShape,
    element: OnceCell<Option<Rc<TypeData>>>,
    surrogate: OnceCell<Option<Rc<TypeData>>>,
    generic_args: OnceCell<Vec<Rc<TypeData>>>,
    full_name: OnceCell<Rc<str>>,
    assembly: OnceCell<Rc<str>>,
    generic_parameter_index: OnceCell<u32>,
    base: OnceCell<Option<Rc<TypeData>>>,
    array_rank: OnceCell<u32>,
    members: OnceCell<Vec<TypeMember>>,
    collection_types: OnceCell<[Option<Rc<TypeData>>; 2]>,
    resolved: OnceCell<Option<TypeHandle>>,
}

impl TypeData {
    fn empty(flags: u64, kind: PrimitiveKind, collection: CollectionShape) -> Self {
        Self {
            flags,
            kind,
            collection,
            element: OnceCell::new(),
            surrogate: OnceCell::new(),
            generic_args: OnceCell::new(),
            full_name: OnceCell::new(),
            assembly: OnceCell::new(),
            generic_parameter_index: OnceCell::new(),
            base: OnceCell::new(),
            array_rank: OnceCell::new(),
            members: OnceCell::new(),
            collection_types: OnceCell::new(),
            resolved: OnceCell::new(),
        }
    }

    /// Descriptor of an unsupported type: flag word zero, nothing else.
    pub(crate) fn unsupported() -> Rc<Self> {
        Rc::new(Self::empty(0, PrimitiveKind::None, CollectionShape::None))
    }

    /// Decode a flag word into an empty descriptor shell.
    pub(crate) fn from_flags(flags: u64) -> Result<Self, String> {
        if flags == 0 {
            return Ok(Self::empty(0, PrimitiveKind::None, CollectionShape::None));
        }
        if flags & FLAG_SUPPORTED == 0 {
            return Err("descriptor flag word missing its support bit".into());
        }
        let kind_code = (flags >> KIND_SHIFT) & KIND_MASK;
        let kind = PrimitiveKind::from_code(kind_code)
            .ok_or_else(|| format!("invalid primitive kind code {kind_code}"))?;
        let shape_code = (flags >> SHAPE_SHIFT) & SHAPE_MASK;
        let collection = CollectionShape::from_code(shape_code)
            .ok_or_else(|| format!("invalid collection shape code {shape_code}"))?;
        Ok(Self::empty(flags, kind, collection))
    }

    /// The flag word the writer emits for a runtime type.
    pub(crate) fn flags_for(ty: TypeHandle) -> u64 {
        if !ty.is_supported() {
            return 0;
        }
        let mut flags = FLAG_SUPPORTED;
        if ty.is_interface() {
            flags |= FLAG_INTERFACE;
        }
        if ty.is_custom_serializable() {
            flags |= FLAG_CUSTOM;
        }
        if ty.is_reference() {
            flags |= FLAG_REFERENCE;
        }
        if ty.is_sealed() {
            flags |= FLAG_SEALED;
        }
        if ty.is_array() {
            flags |= FLAG_ARRAY;
        }
        if ty.is_nullable() {
            flags |= FLAG_NULLABLE;
        }
        if ty.is_enum() {
            flags |= FLAG_ENUM;
        }
        if ty.is_generic() {
            flags |= FLAG_GENERIC;
        }
        if ty.is_generic_parameter() {
            flags |= FLAG_GENERIC_PARAMETER;
        }
        if ty.is_generic_definition() {
            flags |= FLAG_GENERIC_DEFINITION;
        }
        if ty.has_converter() {
            flags |= FLAG_CONVERTER;
        }
        flags |= ty.kind().code() << KIND_SHIFT;
        flags |= ty.collection().shape().code() << SHAPE_SHIFT;
        flags
    }

    pub fn flags(&self) -> u64 {
        self.flags
    }

    pub fn is_supported(&self) -> bool {
        self.flags != 0
    }

    pub fn kind(&self) -> PrimitiveKind {
        self.kind
    }

    pub fn collection(&self) -> CollectionShape {
        self.collection
    }

    pub fn is_interface(&self) -> bool {
        self.flags & FLAG_INTERFACE != 0
    }

    pub fn is_custom(&self) -> bool {
        self.flags & FLAG_CUSTOM != 0
    }

    pub fn is_reference(&self) -> bool {
        self.flags & FLAG_REFERENCE != 0
    }

    pub fn is_sealed(&self) -> bool {
        self.flags & FLAG_SEALED != 0
    }

    pub fn is_array(&self) -> bool {
        self.flags & FLAG_ARRAY != 0
    }

    pub fn is_nullable(&self) -> bool {
        self.flags & FLAG_NULLABLE != 0
    }

    pub fn is_enum(&self) -> bool {
        self.flags & FLAG_ENUM != 0
    }

    pub fn is_generic(&self) -> bool {
        self.flags & FLAG_GENERIC != 0
    }

    pub fn is_generic_parameter(&self) -> bool {
        self.flags & FLAG_GENERIC_PARAMETER != 0
    }

    pub fn is_generic_definition(&self) -> bool {
        self.flags & FLAG_GENERIC_DEFINITION != 0
    }

    pub fn is_constructed_generic(&self) -> bool {
        self.is_generic() && !self.is_generic_definition()
    }

    pub fn has_converter(&self) -> bool {
        self.flags & FLAG_CONVERTER != 0
    }

    /// Whether the flag word is followed by a descriptor body.
    pub fn has_body(&self) -> bool {
        self.is_supported() && matches!(self.kind, PrimitiveKind::None | PrimitiveKind::Object)
    }

    /// Array element type, enum underlying type, or generic definition.
    pub fn element(&self) -> Option<Rc<TypeData>> {
        self.element.get().and_then(Clone::clone)
    }

    pub fn surrogate_type(&self) -> Option<Rc<TypeData>> {
        self.surrogate.get().and_then(Clone::clone)
    }

    pub fn generic_args(&self) -> &[Rc<TypeData>] {
        self.generic_args.get().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn full_name(&self) -> Option<&str> {
        self.full_name.get().map(|s| &**s)
    }

    pub fn assembly(&self) -> Option<&str> {
        self.assembly.get().map(|s| &**s)
    }

    pub fn generic_parameter_index(&self) -> u32 {
        self.generic_parameter_index.get().copied().unwrap_or(0)
    }

    pub fn base(&self) -> Option<Rc<TypeData>> {
        self.base.get().and_then(Clone::clone)
    }

    pub fn array_rank(&self) -> u32 {
        self.array_rank.get().copied().unwrap_or(0)
    }

    /// The member list exactly as carried on the wire (empty for
    /// constructed generics; see [`effective_members`](Self::effective_members)).
    pub fn members(&self) -> &[TypeMember] {
        self.members.get().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn collection_types(&self) -> [Option<Rc<TypeData>>; 2] {
        self.collection_types.get().cloned().unwrap_or([None, None])
    }

    pub(crate) fn set_element(&self, value: Option<Rc<TypeData>>) {
        let _ = self.element.set(value);
    }

    pub(crate) fn set_surrogate(&self, value: Option<Rc<TypeData>>) {
        let _ = self.surrogate.set(value);
    }

    pub(crate) fn set_generic_args(&self, value: Vec<Rc<TypeData>>) {
        let _ = self.generic_args.set(value);
    }

    pub(crate) fn set_name(&self, full_name: Rc<str>, assembly: Rc<str>) {
        let _ = self.full_name.set(full_name);
        let _ = self.assembly.set(assembly);
    }

    pub(crate) fn set_generic_parameter_index(&self, value: u32) {
        let _ = self.generic_parameter_index.set(value);
    }

    pub(crate) fn set_base(&self, value: Option<Rc<TypeData>>) {
        let _ = self.base.set(value);
    }

    pub(crate) fn set_array_rank(&self, value: u32) {
        let _ = self.array_rank.set(value);
    }

    pub(crate) fn set_members(&self, value: Vec<TypeMember>) {
        let _ = self.members.set(value);
    }

    pub(crate) fn set_collection_types(&self, value: [Option<Rc<TypeData>>; 2]) {
        let _ = self.collection_types.set(value);
    }

    pub(crate) fn set_resolved(&self, value: Option<TypeHandle>) {
        let _ = self.resolved.set(value);
    }

    /// Members with generic substitution applied: a constructed generic
    /// derives its schema from its definition and argument list.
    pub fn effective_members(&self) -> Vec<TypeMember> {
        if self.is_constructed_generic() {
            if let Some(def) = self.element() {
                return def
                    .members()
                    .iter()
                    .map(|m| TypeMember {
                        name: m.name.clone(),
                        ty: Self::substitute(&m.ty, self.generic_args()),
                    })
                    .collect();
            }
            return Vec::new();
        }
        self.members().to_vec()
    }

    /// Base type with generic substitution applied.
    pub fn effective_base(&self) -> Option<Rc<TypeData>> {
        if self.is_constructed_generic() {
            let def = self.element()?;
            return def
                .base()
                .map(|b| Self::substitute(&b, self.generic_args()));
        }
        self.base()
    }

    /// Surrogate type with generic substitution applied. Constructed
    /// generics write a null surrogate slot and derive it here.
    pub fn effective_surrogate(&self) -> Option<Rc<TypeData>> {
        if self.is_constructed_generic() {
            let def = self.element()?;
            return def
                .surrogate_type()
                .map(|s| Self::substitute(&s, self.generic_args()));
        }
        self.surrogate_type()
    }

    /// Collection element/key/value types with generic substitution applied.
    pub fn effective_collection_types(&self) -> [Option<Rc<TypeData>>; 2] {
        if self.is_constructed_generic() {
            if let Some(def) = self.element() {
                let [first, second] = def.collection_types();
                return [
                    first.map(|t| Self::substitute(&t, self.generic_args())),
                    second.map(|t| Self::substitute(&t, self.generic_args())),
                ];
            }
            return [None, None];
        }
        self.collection_types()
    }

    /// Replace generic parameter descriptors by position. Total on the
    /// supported shapes and the identity under the definition's own
    /// parameter list.
    fn substitute(td: &Rc<TypeData>, args: &[Rc<TypeData>]) -> Rc<TypeData> {
        if td.is_generic_parameter() {
            let index = td.generic_parameter_index() as usize;
            return args.get(index).cloned().unwrap_or_else(|| td.clone());
        }
        if td.is_constructed_generic() {
            let inner: Vec<Rc<TypeData>> = td
                .generic_args()
                .iter()
                .map(|a| Self::substitute(a, args))
                .collect();
            let unchanged = inner
                .iter()
                .zip(td.generic_args().iter())
                .all(|(a, b)| Rc::ptr_eq(a, b));
            if unchanged {
                return td.clone();
            }
            let shell = Self::empty(td.flags, td.kind, td.collection);
            shell.set_element(td.element());
            shell.set_surrogate(None);
            shell.set_generic_args(inner);
            return Rc::new(shell);
        }
        if td.is_array() {
            if let Some(element) = td.element() {
                let substituted = Self::substitute(&element, args);
                if !Rc::ptr_eq(&substituted, &element) {
                    let shell = Self::empty(td.flags, td.kind, td.collection);
                    shell.set_element(Some(substituted));
                    shell.set_array_rank(td.array_rank());
                    return Rc::new(shell);
                }
            }
        }
        td.clone()
    }

    /// Map this descriptor to a registered local type, caching the answer.
    pub fn resolve(&self) -> Option<TypeHandle> {
        *self.resolved.get_or_init(|| self.resolve_uncached())
    }

    fn resolve_uncached(&self) -> Option<TypeHandle> {
        if !self.is_supported() {
            return None;
        }
        let b = builtins();
        match self.kind {
            PrimitiveKind::None => None,
            PrimitiveKind::Type => Some(b.type_data),
            PrimitiveKind::String => Some(b.string),
            PrimitiveKind::Bytes => Some(b.bytes),
            PrimitiveKind::Object => {
                if self.is_generic_parameter() {
                    return None;
                }
                if self.is_array() {
                    let element = self.element()?.resolve()?;
                    return Some(reflect::array_of(element, self.array_rank().max(1)));
                }
                if self.is_constructed_generic() {
                    let def = self.element()?.resolve()?;
                    let args: Option<Vec<TypeHandle>> =
                        self.generic_args().iter().map(|a| a.resolve()).collect();
                    return reflect::construct_generic(def, &args?).ok();
                }
                let name = self.full_name()?;
                reflect::resolve(name, self.assembly().unwrap_or(""))
            }
            scalar => b.scalar_of(scalar),
        }
    }

    /// Best-effort display name for diagnostics.
    pub fn type_name(&self) -> String {
        if let Some(name) = self.full_name() {
            return name.to_string();
        }
        match self.kind {
            PrimitiveKind::None => "<unsupported>".to_string(),
            PrimitiveKind::Object if self.is_array() => match self.element() {
                Some(e) => format!("{}[]", e.type_name()),
                None => "<array>".to_string(),
            },
            PrimitiveKind::Object if self.is_constructed_generic() => {
                let args: Vec<String> =
                    self.generic_args().iter().map(|a| a.type_name()).collect();
                match self.element() {
                    Some(def) => format!("{}<{}>", def.type_name(), args.join(",")),
                    None => "<generic>".to_string(),
                }
            }
            PrimitiveKind::Object => "<anonymous>".to_string(),
            PrimitiveKind::Type => "typedata".to_string(),
            PrimitiveKind::String => "string".to_string(),
            PrimitiveKind::Bytes => "bytes".to_string(),
            scalar => builtins()
                .scalar_of(scalar)
                .map(|h| h.full_name().to_string())
                .unwrap_or_else(|| format!("{scalar:?}")),
        }
    }
}

impl fmt::Debug for TypeData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Descriptor graphs can be self-referential; print shallowly.
        write!(f, "TypeData({})", self.type_name())
    }
}
