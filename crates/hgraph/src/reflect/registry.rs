// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Process-global type registry.
//!
//! Registered types are leaked into `'static` storage and interned three
//! ways: by `assembly::full_name` (user registrations and builtins), by
//! `(element, rank)` for synthesized array types, and by
//! `(definition, arguments)` for constructed generics. Lookups after first
//! population are lock-free reads.

use super::hooks::Surrogate;
use super::kind::PrimitiveKind;
use super::runtime_type::{
    same_type, CollectionSpec, Member, RuntimeType, TypeHandle,
};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::fmt;
use std::sync::{LazyLock, OnceLock};

/// Errors from type registration and generic construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A type with the same name and assembly is already registered.
    DuplicateType { type_name: String },
    /// `define_members` was called twice (or after `field` at build time).
    MembersAlreadyDefined { type_name: String },
    /// Generic construction was attempted on a non-definition.
    NotGenericDefinition { type_name: String },
    /// Argument count differs from the definition's parameter count.
    ArityMismatch { expected: usize, found: usize },
    /// Generic construction would produce a type that can never be
    /// instantiated: an open definition was passed as an argument.
    NotConstructible { type_name: String },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateType { type_name } => {
                write!(f, "type '{type_name}' is already registered")
            }
            Self::MembersAlreadyDefined { type_name } => {
                write!(f, "members of '{type_name}' are already defined")
            }
            Self::NotGenericDefinition { type_name } => {
                write!(f, "'{type_name}' is not a generic definition")
            }
            Self::ArityMismatch { expected, found } => {
                write!(f, "generic arity mismatch: expected {expected}, found {found}")
            }
            Self::NotConstructible { type_name } => {
                write!(
                    f,
                    "'{type_name}' is an open generic definition and cannot be a generic argument"
                )
            }
        }
    }
}

impl std::error::Error for RegistryError {}

static TYPES: LazyLock<DashMap<String, TypeHandle>> = LazyLock::new(DashMap::new);
static ARRAYS: LazyLock<DashMap<(usize, u32), TypeHandle>> = LazyLock::new(DashMap::new);
static GENERICS: LazyLock<DashMap<(usize, Vec<usize>), TypeHandle>> = LazyLock::new(DashMap::new);

fn map_key(assembly: &str, full_name: &str) -> String {
    format!("{assembly}::{full_name}")
}

fn leak(rt: RuntimeType) -> TypeHandle {
    Box::leak(Box::new(rt))
}

/// The fixed assembly name of the built-in types.
pub const CORE_ASSEMBLY: &str = "core";

/// Handles to the built-in types every session shares.
pub struct Builtins {
    /// Universal top type; every root is written at this type.
    pub object: TypeHandle,
    pub string: TypeHandle,
    /// The "type of type": descriptors themselves are values of this type.
    pub type_data: TypeHandle,
    /// Legacy descriptor slot retained for wire compatibility.
    pub type_info: TypeHandle,
    /// Generic definition of the nullable wrapper.
    pub nullable: TypeHandle,
    pub bytes: TypeHandle,
    pub guid: TypeHandle,
    pub boolean: TypeHandle,
    pub character: TypeHandle,
    pub uint8: TypeHandle,
    pub int8: TypeHandle,
    pub int16: TypeHandle,
    pub uint16: TypeHandle,
    pub int32: TypeHandle,
    pub uint32: TypeHandle,
    pub int64: TypeHandle,
    pub uint64: TypeHandle,
    pub float32: TypeHandle,
    pub float64: TypeHandle,
    pub decimal: TypeHandle,
}

impl Builtins {
    fn bare(name: &str, kind: PrimitiveKind, is_reference: bool, is_sealed: bool) -> RuntimeType {
        let members = OnceLock::new();
        let _ = members.set(Vec::new());
        RuntimeType {
            full_name: name.to_string(),
            assembly: CORE_ASSEMBLY.to_string(),
            kind,
            is_reference,
            is_sealed,
            is_interface: false,
            is_enum: false,
            is_array: false,
            is_nullable: false,
            is_generic: false,
            is_generic_definition: false,
            is_generic_parameter: false,
            array_rank: 0,
            generic_parameter_index: 0,
            base: None,
            element: None,
            generic_args: Vec::new(),
            members,
            collection: CollectionSpec::None,
            variants: Vec::new(),
            surrogate: None,
            converter: None,
            custom: None,
            on_deserialized: None,
        }
    }

    fn new() -> Self {
        let object = leak(Self::bare("object", PrimitiveKind::Object, true, false));
        let string = leak(Self::bare("string", PrimitiveKind::String, true, true));
        let type_data = leak(Self::bare("typedata", PrimitiveKind::Type, true, true));
        let type_info = leak(Self::bare("typeinfo", PrimitiveKind::Type, true, true));

        let mut nullable_rt = Self::bare("nullable", PrimitiveKind::Object, false, true);
        nullable_rt.is_nullable = true;
        nullable_rt.is_generic = true;
        nullable_rt.is_generic_definition = true;
        nullable_rt.generic_args = vec![new_generic_parameter("T", 0)];
        let nullable = leak(nullable_rt);

        let builtins = Self {
            object,
            string,
            type_data,
            type_info,
            nullable,
            bytes: leak(Self::bare("bytes", PrimitiveKind::Bytes, true, true)),
            guid: leak(Self::bare("guid", PrimitiveKind::Guid, false, true)),
            boolean: leak(Self::bare("bool", PrimitiveKind::Bool, false, true)),
            character: leak(Self::bare("char", PrimitiveKind::Char, false, true)),
            uint8: leak(Self::bare("u8", PrimitiveKind::U8, false, true)),
            int8: leak(Self::bare("i8", PrimitiveKind::I8, false, true)),
            int16: leak(Self::bare("i16", PrimitiveKind::I16, false, true)),
            uint16: leak(Self::bare("u16", PrimitiveKind::U16, false, true)),
            int32: leak(Self::bare("i32", PrimitiveKind::I32, false, true)),
            uint32: leak(Self::bare("u32", PrimitiveKind::U32, false, true)),
            int64: leak(Self::bare("i64", PrimitiveKind::I64, false, true)),
            uint64: leak(Self::bare("u64", PrimitiveKind::U64, false, true)),
            float32: leak(Self::bare("f32", PrimitiveKind::F32, false, true)),
            float64: leak(Self::bare("f64", PrimitiveKind::F64, false, true)),
            decimal: leak(Self::bare("decimal", PrimitiveKind::Decimal, false, true)),
        };

        for handle in builtins.all() {
            TYPES.insert(map_key(handle.assembly(), handle.full_name()), handle);
        }
        builtins
    }

    fn all(&self) -> [TypeHandle; 20] {
        [
            self.object,
            self.string,
            self.type_data,
            self.type_info,
            self.nullable,
            self.bytes,
            self.guid,
            self.boolean,
            self.character,
            self.uint8,
            self.int8,
            self.int16,
            self.uint16,
            self.int32,
            self.uint32,
            self.int64,
            self.uint64,
            self.float32,
            self.float64,
            self.decimal,
        ]
    }

    /// The well-known preamble: (id, type) pairs for the type slots.
    /// Id 6 is the empty string and has no type entry.
    pub fn preamble(&self) -> [(u64, TypeHandle); 20] {
        [
            (1, self.object),
            (2, self.string),
            (3, self.type_data),
            (4, self.type_info),
            (5, self.nullable),
            (7, self.bytes),
            (8, self.guid),
            (9, self.boolean),
            (10, self.character),
            (11, self.uint8),
            (12, self.int8),
            (13, self.int16),
            (14, self.uint16),
            (15, self.int32),
            (16, self.uint32),
            (17, self.int64),
            (18, self.uint64),
            (19, self.float32),
            (20, self.float64),
            (21, self.decimal),
        ]
    }

    /// The builtin carrying a scalar kind, if `kind` is one.
    pub fn scalar_of(&self, kind: PrimitiveKind) -> Option<TypeHandle> {
        Some(match kind {
            PrimitiveKind::Guid => self.guid,
            PrimitiveKind::Bool => self.boolean,
            PrimitiveKind::Char => self.character,
            PrimitiveKind::U8 => self.uint8,
            PrimitiveKind::I8 => self.int8,
            PrimitiveKind::I16 => self.int16,
            PrimitiveKind::U16 => self.uint16,
            PrimitiveKind::I32 => self.int32,
            PrimitiveKind::U32 => self.uint32,
            PrimitiveKind::I64 => self.int64,
            PrimitiveKind::U64 => self.uint64,
            PrimitiveKind::F32 => self.float32,
            PrimitiveKind::F64 => self.float64,
            PrimitiveKind::Decimal => self.decimal,
            _ => return None,
        })
    }
}

static BUILTINS: LazyLock<Builtins> = LazyLock::new(Builtins::new);

/// Access the built-in type handles (forcing their registration).
pub fn builtins() -> &'static Builtins {
    &BUILTINS
}

/// Create a generic parameter placeholder. Placeholders are anonymous: they
/// live outside the name registry and resolve positionally.
pub(crate) fn new_generic_parameter(name: &str, index: u32) -> TypeHandle {
    let mut rt = Builtins::bare(name, PrimitiveKind::Object, false, false);
    rt.assembly = String::new();
    rt.is_generic_parameter = true;
    rt.generic_parameter_index = index;
    leak(rt)
}

/// Intern a fully built type under its name. Fails on duplicates.
pub(crate) fn register_named(rt: RuntimeType) -> Result<TypeHandle, RegistryError> {
    let _ = builtins();
    let key = map_key(&rt.assembly, &rt.full_name);
    let handle = leak(rt);
    match TYPES.entry(key) {
        Entry::Occupied(_) => Err(RegistryError::DuplicateType {
            type_name: handle.full_name().to_string(),
        }),
        Entry::Vacant(slot) => {
            slot.insert(handle);
            Ok(handle)
        }
    }
}

/// Look up a registered type by name and assembly.
pub fn resolve(full_name: &str, assembly: &str) -> Option<TypeHandle> {
    let _ = builtins();
    TYPES.get(&map_key(assembly, full_name)).map(|h| *h)
}

/// The interned array type over `element` with the given rank.
///
/// Rank-1 arrays of `u8` are the builtin `bytes` type.
pub fn array_of(element: TypeHandle, rank: u32) -> TypeHandle {
    let b = builtins();
    let rank = rank.max(1);
    if rank == 1 && same_type(element, b.uint8) {
        return b.bytes;
    }
    let key = (element.key(), rank);
    if let Some(handle) = ARRAYS.get(&key) {
        return *handle;
    }

    let commas = ",".repeat((rank - 1) as usize);
    let mut rt = Builtins::bare(
        &format!("{}[{}]", element.full_name(), commas),
        PrimitiveKind::Object,
        true,
        true,
    );
    rt.assembly = element.assembly().to_string();
    rt.is_array = true;
    rt.array_rank = rank;
    rt.element = Some(element);
    rt.base = Some(b.object);
    let handle = leak(rt);
    *ARRAYS.entry(key).or_insert(handle)
}

/// The interned constructed generic: `def` with `args` substituted for its
/// parameters. The definition's members must be defined before construction;
/// the constructed type snapshots them through substitution.
pub fn construct_generic(
    def: TypeHandle,
    args: &[TypeHandle],
) -> Result<TypeHandle, RegistryError> {
    if !def.is_generic_definition() {
        return Err(RegistryError::NotGenericDefinition {
            type_name: def.full_name().to_string(),
        });
    }
    if args.len() != def.generic_args().len() {
        return Err(RegistryError::ArityMismatch {
            expected: def.generic_args().len(),
            found: args.len(),
        });
    }
    // Parameter placeholders are legal arguments (nested generics inside a
    // definition), open definitions are not.
    if let Some(open) = args.iter().find(|a| a.is_generic_definition()) {
        return Err(RegistryError::NotConstructible {
            type_name: open.full_name().to_string(),
        });
    }

    let key = (def.key(), args.iter().map(|a| a.key()).collect::<Vec<_>>());
    if let Some(handle) = GENERICS.get(&key) {
        return Ok(*handle);
    }

    let arg_names: Vec<&str> = args.iter().map(|a| a.full_name()).collect();
    let full_name = format!("{}<{}>", def.full_name(), arg_names.join(","));

    let members = OnceLock::new();
    let substituted: Result<Vec<Member>, RegistryError> = def
        .declared_members()
        .iter()
        .map(|m| Ok(Member::new(m.name.clone(), substitute(m.ty, args)?)))
        .collect();
    let _ = members.set(substituted?);

    let base = match def.base() {
        Some(b) => Some(substitute(b, args)?),
        None => None,
    };
    let collection = match *def.collection() {
        CollectionSpec::None => CollectionSpec::None,
        CollectionSpec::UntypedList => CollectionSpec::UntypedList,
        CollectionSpec::UntypedDict => CollectionSpec::UntypedDict,
        CollectionSpec::Typed { element } => CollectionSpec::Typed {
            element: substitute(element, args)?,
        },
        CollectionSpec::TypedDict { key, value } => CollectionSpec::TypedDict {
            key: substitute(key, args)?,
            value: substitute(value, args)?,
        },
    };
    let surrogate = match def.surrogate() {
        Some(s) => Some(Surrogate {
            surrogate_type: substitute(s.surrogate_type, args)?,
            convert: s.convert,
            revert: s.revert,
        }),
        None => None,
    };

    let rt = RuntimeType {
        full_name,
        assembly: def.assembly().to_string(),
        kind: PrimitiveKind::Object,
        is_reference: def.is_reference(),
        is_sealed: def.is_sealed(),
        is_interface: def.is_interface(),
        is_enum: false,
        is_array: false,
        is_nullable: same_type(def, builtins().nullable),
        is_generic: true,
        is_generic_definition: false,
        is_generic_parameter: false,
        array_rank: 0,
        generic_parameter_index: 0,
        base,
        element: Some(def),
        generic_args: args.to_vec(),
        members,
        collection,
        variants: Vec::new(),
        surrogate,
        converter: def.converter.clone(),
        custom: def.custom.clone(),
        on_deserialized: def.on_deserialized,
    };
    let handle = leak(rt);
    Ok(*GENERICS.entry(key).or_insert(handle))
}

/// Replace generic parameter placeholders in `ty` by position.
fn substitute(ty: TypeHandle, args: &[TypeHandle]) -> Result<TypeHandle, RegistryError> {
    if ty.is_generic_parameter() {
        let index = ty.generic_parameter_index() as usize;
        return Ok(args.get(index).copied().unwrap_or(ty));
    }
    if ty.is_constructed_generic() {
        let def = match ty.element() {
            Some(def) => def,
            None => return Ok(ty),
        };
        let inner: Result<Vec<TypeHandle>, RegistryError> =
            ty.generic_args().iter().map(|a| substitute(*a, args)).collect();
        let inner = inner?;
        let unchanged = inner
            .iter()
            .zip(ty.generic_args().iter())
            .all(|(a, b)| same_type(*a, *b));
        if unchanged {
            return Ok(ty);
        }
        return construct_generic(def, &inner);
    }
    if ty.is_array() {
        if let Some(element) = ty.element() {
            let substituted = substitute(element, args)?;
            if !same_type(substituted, element) {
                return Ok(array_of(substituted, ty.array_rank()));
            }
        }
    }
    Ok(ty)
}

/// Shorthand for `Nullable<inner>`.
pub fn nullable_of(inner: TypeHandle) -> Result<TypeHandle, RegistryError> {
    construct_generic(builtins().nullable, &[inner])
}
