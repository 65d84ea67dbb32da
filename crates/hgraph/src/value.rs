// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The dynamic value model: type-erased object graphs with identity.
//!
//! A [`Value`] holds any serializable node. Reference variants (`Str`,
//! `Bytes`, `Object`, `Unresolved`, `Type`) carry shared-pointer identity:
//! cloning a `Value` clones the pointer, not the data, and the writer uses
//! pointer identity to detect shared nodes and cycles.

use crate::codec::ObjectData;
use crate::reflect::{self, builtins, same_type, PrimitiveKind, TypeHandle};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Shared, mutable instance of a composite type.
pub type ObjRef = Rc<RefCell<ObjectBody>>;

/// Shared carrier for a value whose type could not be resolved locally.
pub type DataRef = Rc<RefCell<ObjectData>>;

/// A node in a dynamic object graph.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Char(char),
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    /// Raw 128-bit decimal representation.
    Decimal([u8; 16]),
    Guid([u8; 16]),
    Str(Rc<str>),
    Bytes(Rc<[u8]>),
    /// An enum value: the enum type and its underlying integral value.
    Enum(TypeHandle, i64),
    /// A runtime type written as its wire descriptor.
    Type(TypeHandle),
    /// A wire descriptor with no resolved local type (read side).
    TypeData(Rc<crate::codec::TypeData>),
    Object(ObjRef),
    Unresolved(DataRef),
}

impl Value {
    /// A fresh, default-initialized instance of a composite type.
    ///
    /// The handle must be constructible — a reference or value type, not an
    /// interface, a generic definition, or a generic parameter (see
    /// [`can_construct`](crate::reflect::RuntimeType::can_construct)).
    /// Passing a non-constructible handle is a caller bug: debug builds
    /// assert on it, release builds defer to the writer, which rejects the
    /// instance with `ConstructionFailed` when it reaches a stream.
    pub fn object(ty: TypeHandle) -> Value {
        debug_assert!(
            ty.can_construct(),
            "'{}' is not a constructible type",
            ty.full_name()
        );
        Value::Object(ObjectBody::instance(ty))
    }

    /// A rank-1 array value.
    ///
    /// # Panics
    ///
    /// Panics for `u8` elements: byte arrays are [`Value::Bytes`].
    pub fn array(element: TypeHandle, items: Vec<Value>) -> Value {
        assert!(
            !same_type(element, builtins().uint8),
            "byte arrays are Value::Bytes, not element arrays"
        );
        let ty = reflect::array_of(element, 1);
        let body = ObjectBody {
            ty,
            fields: Vec::new(),
            elements: None,
            entries: None,
            readonly: false,
            array: Some(ArrayData {
                lengths: vec![items.len() as u32],
                items,
            }),
        };
        Value::Object(Rc::new(RefCell::new(body)))
    }

    pub fn guid(bytes: [u8; 16]) -> Value {
        Value::Guid(bytes)
    }

    pub fn decimal(bytes: [u8; 16]) -> Value {
        Value::Decimal(bytes)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_char(&self) -> Option<char> {
        match self {
            Self::Char(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Self::I32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::I64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Self::U32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::U64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Self::F32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::F64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjRef> {
        match self {
            Self::Object(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_unresolved(&self) -> Option<&DataRef> {
        match self {
            Self::Unresolved(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_type(&self) -> Option<TypeHandle> {
        match self {
            Self::Type(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<(TypeHandle, i64)> {
        match self {
            Self::Enum(ty, v) => Some((*ty, *v)),
            _ => None,
        }
    }

    /// The underlying integral value of any integer variant.
    pub fn as_integral(&self) -> Option<i64> {
        Some(match self {
            Self::I8(v) => i64::from(*v),
            Self::U8(v) => i64::from(*v),
            Self::I16(v) => i64::from(*v),
            Self::U16(v) => i64::from(*v),
            Self::I32(v) => i64::from(*v),
            Self::U32(v) => i64::from(*v),
            Self::I64(v) => *v,
            Self::U64(v) => i64::try_from(*v).ok()?,
            Self::Enum(_, v) => *v,
            _ => return None,
        })
    }

    /// The runtime type this value would be written as when the declared
    /// type is the universal top type.
    pub fn runtime_type(&self) -> Option<TypeHandle> {
        let b = builtins();
        Some(match self {
            Self::Null => return None,
            Self::Bool(_) => b.boolean,
            Self::Char(_) => b.character,
            Self::I8(_) => b.int8,
            Self::U8(_) => b.uint8,
            Self::I16(_) => b.int16,
            Self::U16(_) => b.uint16,
            Self::I32(_) => b.int32,
            Self::U32(_) => b.uint32,
            Self::I64(_) => b.int64,
            Self::U64(_) => b.uint64,
            Self::F32(_) => b.float32,
            Self::F64(_) => b.float64,
            Self::Decimal(_) => b.decimal,
            Self::Guid(_) => b.guid,
            Self::Str(_) => b.string,
            Self::Bytes(_) => b.bytes,
            Self::Enum(ty, _) => *ty,
            Self::Type(_) | Self::TypeData(_) => b.type_data,
            Self::Object(o) => o.borrow().ty,
            Self::Unresolved(_) => return None,
        })
    }

    /// Pointer identity for reference variants; `false` otherwise.
    pub fn ptr_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Str(a), Self::Str(b)) => Rc::ptr_eq(a, b),
            (Self::Bytes(a), Self::Bytes(b)) => Rc::ptr_eq(a, b),
            (Self::Object(a), Self::Object(b)) => Rc::ptr_eq(a, b),
            (Self::Unresolved(a), Self::Unresolved(b)) => Rc::ptr_eq(a, b),
            (Self::TypeData(a), Self::TypeData(b)) => Rc::ptr_eq(a, b),
            (Self::Type(a), Self::Type(b)) => same_type(*a, *b),
            _ => false,
        }
    }

    /// Session identity key for reference variants that track sharing by
    /// address. Strings intern by value instead and return `None`.
    pub(crate) fn identity_key(&self) -> Option<usize> {
        match self {
            Self::Bytes(rc) => Some(Rc::as_ptr(rc) as *const u8 as usize),
            Self::Object(rc) => Some(Rc::as_ptr(rc) as usize),
            Self::Unresolved(rc) => Some(Rc::as_ptr(rc) as usize),
            Self::TypeData(rc) => Some(Rc::as_ptr(rc) as usize),
            Self::Type(h) => Some(h.key()),
            _ => None,
        }
    }

    /// The default a missing member takes during version-tolerant reads.
    pub fn default_of(ty: TypeHandle) -> Value {
        match ty.kind() {
            PrimitiveKind::Bool => Value::Bool(false),
            PrimitiveKind::Char => Value::Char('\0'),
            PrimitiveKind::I8 => Value::I8(0),
            PrimitiveKind::U8 => Value::U8(0),
            PrimitiveKind::I16 => Value::I16(0),
            PrimitiveKind::U16 => Value::U16(0),
            PrimitiveKind::I32 => Value::I32(0),
            PrimitiveKind::U32 => Value::U32(0),
            PrimitiveKind::I64 => Value::I64(0),
            PrimitiveKind::U64 => Value::U64(0),
            PrimitiveKind::F32 => Value::F32(0.0),
            PrimitiveKind::F64 => Value::F64(0.0),
            PrimitiveKind::Decimal => Value::Decimal([0; 16]),
            PrimitiveKind::Guid => Value::Guid([0; 16]),
            PrimitiveKind::None
            | PrimitiveKind::Type
            | PrimitiveKind::String
            | PrimitiveKind::Bytes => Value::Null,
            PrimitiveKind::Object => {
                if ty.is_enum() {
                    Value::Enum(ty, 0)
                } else if !ty.is_reference() && !ty.is_nullable() && ty.can_construct() {
                    Value::object(ty)
                } else {
                    Value::Null
                }
            }
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Graphs can be cyclic; reference variants print shallowly.
        match self {
            Self::Null => write!(f, "Null"),
            Self::Bool(v) => write!(f, "Bool({v})"),
            Self::Char(v) => write!(f, "Char({v:?})"),
            Self::I8(v) => write!(f, "I8({v})"),
            Self::U8(v) => write!(f, "U8({v})"),
            Self::I16(v) => write!(f, "I16({v})"),
            Self::U16(v) => write!(f, "U16({v})"),
            Self::I32(v) => write!(f, "I32({v})"),
            Self::U32(v) => write!(f, "U32({v})"),
            Self::I64(v) => write!(f, "I64({v})"),
            Self::U64(v) => write!(f, "U64({v})"),
            Self::F32(v) => write!(f, "F32({v})"),
            Self::F64(v) => write!(f, "F64({v})"),
            Self::Decimal(v) => write!(f, "Decimal({v:02x?})"),
            Self::Guid(v) => write!(f, "Guid({v:02x?})"),
            Self::Str(v) => write!(f, "Str({v:?})"),
            Self::Bytes(v) => write!(f, "Bytes({} bytes)", v.len()),
            Self::Enum(ty, v) => write!(f, "Enum({}, {v})", ty.full_name()),
            Self::Type(h) => write!(f, "Type({})", h.full_name()),
            Self::TypeData(td) => write!(f, "TypeData({})", td.type_name()),
            Self::Object(o) => {
                let body = o.borrow();
                write!(f, "Object({}, {} fields)", body.ty.full_name(), body.fields.len())
            }
            Self::Unresolved(d) => {
                write!(f, "Unresolved({})", d.borrow().type_name())
            }
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<char> for Value {
    fn from(v: char) -> Self {
        Self::Char(v)
    }
}

impl From<i8> for Value {
    fn from(v: i8) -> Self {
        Self::I8(v)
    }
}

impl From<u8> for Value {
    fn from(v: u8) -> Self {
        Self::U8(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Self::I16(v)
    }
}

impl From<u16> for Value {
    fn from(v: u16) -> Self {
        Self::U16(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::I32(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::U32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::I64(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Self::U64(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::F32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::F64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Str(Rc::from(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Str(Rc::from(v.as_str()))
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(Rc::from(v.into_boxed_slice()))
    }
}

/// Row-major array payload: one length per rank, elements with the last
/// index varying fastest.
#[derive(Debug, Clone)]
pub struct ArrayData {
    pub lengths: Vec<u32>,
    pub items: Vec<Value>,
}

impl ArrayData {
    pub fn rank(&self) -> u32 {
        self.lengths.len() as u32
    }

    pub fn flat_len(&self) -> usize {
        self.items.len()
    }
}

/// Instance state of a composite type: member values in declared order plus
/// the optional collection or array payload.
pub struct ObjectBody {
    pub ty: TypeHandle,
    /// Parallel to `ty.all_members()`.
    pub fields: Vec<Value>,
    /// List / typed-collection tail elements.
    pub elements: Option<Vec<Value>>,
    /// Dictionary tail, kept as ordered entries exactly as decoded. Keys are
    /// not re-hashed locally, so equal-but-distinct decoded keys stay
    /// distinct entries.
    pub entries: Option<Vec<(Value, Value)>>,
    /// Read-only collections suppress their element section on the wire.
    pub readonly: bool,
    pub array: Option<ArrayData>,
}

impl ObjectBody {
    /// Default-initialized body for a composite type.
    pub fn new(ty: TypeHandle) -> Self {
        let fields = ty
            .all_members()
            .iter()
            .map(|m| Value::default_of(m.ty))
            .collect();
        let shape = ty.collection().shape();
        Self {
            ty,
            fields,
            elements: if matches!(
                shape,
                crate::reflect::CollectionShape::UntypedList
                    | crate::reflect::CollectionShape::TypedCollection
            ) {
                Some(Vec::new())
            } else {
                None
            },
            entries: if shape.is_dict() { Some(Vec::new()) } else { None },
            readonly: false,
            array: None,
        }
    }

    /// Shared default-initialized instance.
    pub fn instance(ty: TypeHandle) -> ObjRef {
        Rc::new(RefCell::new(Self::new(ty)))
    }

    /// Member value by name, most-derived member winning on shadowing.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(self.ty.member_index(name)?)
    }

    /// Set a member value by name. Returns `false` when no such member.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> bool {
        match self.ty.member_index(name) {
            Some(index) if index < self.fields.len() => {
                self.fields[index] = value.into();
                true
            }
            _ => false,
        }
    }
}

impl fmt::Debug for ObjectBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ObjectBody({}, {} fields)",
            self.ty.full_name(),
            self.fields.len()
        )
    }
}
