// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The decoding state machine.
//!
//! Mirrors the writer exactly: reference slots decode an id first, fresh ids
//! decode the optional actual-type descriptor and then the body, and every
//! instance is registered at its id *before* its body is filled so cyclic
//! graphs reconstruct. Byte consumption is always driven by the wire
//! descriptor; the local type only decides where decoded values land, which
//! is what makes member addition and removal version-tolerant.
//!
//! Unresolvable types never abort a read: their payloads are consumed into
//! [`ObjectData`] carriers.

use super::context::Context;
use super::object_data::ObjectData;
use super::type_data::{TypeData, TypeMember};
use super::{SerializationSettings, WIRE_VERSION};
use crate::error::{CodecError, Result};
use crate::reflect::{builtins, CollectionShape, PrimitiveKind, TypeHandle};
use crate::ser::PrimitiveReader;
use crate::value::{ArrayData, ObjRef, ObjectBody, Value};
use std::cell::RefCell;
use std::rc::Rc;

/// Decoding session over a borrowed input stream.
pub struct Reader<'a> {
    input: PrimitiveReader<'a>,
    ctx: Context,
    settings: SerializationSettings,
    depth: u32,
    raw: bool,
}

impl<'a> Reader<'a> {
    /// Open a stream, validating the version header.
    pub fn new(bytes: &'a [u8]) -> Result<Self> {
        let mut input = PrimitiveReader::new(bytes);
        let version = input.read_varuint()?;
        if version != WIRE_VERSION {
            return Err(CodecError::UnsupportedVersion { found: version });
        }
        Ok(Self {
            input,
            ctx: Context::new(),
            settings: SerializationSettings::default(),
            depth: 0,
            raw: false,
        })
    }

    /// Decode the root value, converting through local surrogates,
    /// converters and custom reconstruction where available.
    pub fn read(mut self) -> Result<Value> {
        self.raw = false;
        self.read_root()
    }

    /// Decode the root value without local conversion: surrogate objects,
    /// converter text and custom bags stay boxed in [`ObjectData`] carriers.
    pub fn read_raw(mut self) -> Result<Value> {
        self.raw = true;
        self.read_root()
    }

    fn read_root(&mut self) -> Result<Value> {
        let expected = self.ctx.descriptor_of(builtins().object);
        let value = self.read_value(&expected)?;
        self.dispatch_callbacks();
        Ok(self.surface(value))
    }

    fn read_value(&mut self, expected: &Rc<TypeData>) -> Result<Value> {
        self.depth += 1;
        let result = self.read_value_inner(expected);
        self.depth -= 1;
        result
    }

    fn read_value_inner(&mut self, expected: &Rc<TypeData>) -> Result<Value> {
        if self.depth == 1 {
            let offset = self.input.offset();
            let flags = self.input.read_varuint()?;
            self.settings =
                SerializationSettings::from_flags(flags).ok_or_else(|| CodecError::Malformed {
                    offset,
                    reason: format!("unknown settings bits in 0x{flags:x}"),
                })?;
        }

        if expected.is_reference() {
            let id = self.input.read_varuint()?;
            if id == 0 {
                return Ok(Value::Null);
            }
            if let Some(cached) = self.ctx.try_get_object(id) {
                return Ok(cached);
            }
            let actual = if expected.is_sealed() {
                expected.clone()
            } else {
                self.read_actual_descriptor()?
            };
            if !actual.is_supported() {
                crate::warn!(
                    "{}, carrying payload as object data",
                    CodecError::UnresolvedType {
                        type_name: actual.type_name()
                    }
                );
                let value = Value::Unresolved(Rc::new(RefCell::new(ObjectData::new(actual))));
                self.ctx.register(id, value.clone())?;
                return Ok(value);
            }
            self.read_body(Some(id), &actual)
        } else {
            if !expected.is_supported() {
                return Ok(Value::Null);
            }
            self.read_body(None, expected)
        }
    }

    /// The actual-type descriptor preceding an unsealed payload.
    fn read_actual_descriptor(&mut self) -> Result<Rc<TypeData>> {
        let expected = self.ctx.descriptor_of(builtins().type_data);
        match self.read_value(&expected)? {
            Value::TypeData(td) => Ok(td),
            Value::Type(handle) => Ok(self.ctx.descriptor_of(handle)),
            _ => Err(CodecError::Malformed {
                offset: self.input.offset(),
                reason: "expected a type descriptor".into(),
            }),
        }
    }

    /// Payload dispatch, mirroring the writer's priority order. The wire
    /// descriptor plus the session settings fully determine which path the
    /// writer took.
    fn read_body(&mut self, id: Option<u64>, actual: &Rc<TypeData>) -> Result<Value> {
        if actual.effective_surrogate().is_some() {
            return self.read_surrogate(id, actual);
        }
        if actual.has_converter() && !self.settings.ignore_converter {
            return self.read_converted(id, actual);
        }
        if actual.is_custom() && !self.settings.ignore_custom {
            return self.read_custom(id, actual);
        }

        match actual.kind() {
            PrimitiveKind::None => Ok(Value::Null),
            PrimitiveKind::Object => self.read_composite(id, actual),
            PrimitiveKind::Type => self.read_type_body(id),
            PrimitiveKind::String => {
                let s = self.input.read_str()?;
                let value = Value::Str(Rc::from(s.as_str()));
                self.register_opt(id, &value)?;
                Ok(value)
            }
            PrimitiveKind::Bytes => {
                let bytes = self.input.read_blob()?;
                let value = Value::from(bytes);
                self.register_opt(id, &value)?;
                Ok(value)
            }
            scalar => {
                let value = self.read_scalar(scalar)?;
                self.register_opt(id, &value)?;
                Ok(value)
            }
        }
    }

    fn read_surrogate(&mut self, id: Option<u64>, actual: &Rc<TypeData>) -> Result<Value> {
        let object_desc = self.ctx.descriptor_of(builtins().object);
        let underlying = self.read_value(&object_desc)?;
        let underlying = self.surface(underlying);

        let local = if self.raw { None } else { actual.resolve() };
        let value = match local.and_then(|h| h.surrogate()) {
            Some(surrogate) => (surrogate.revert)(&underlying),
            None => {
                if !self.raw {
                    crate::warn!(
                        "no local surrogate for '{}', boxing the surrogate object",
                        actual.type_name()
                    );
                }
                let mut data = ObjectData::new(actual.clone());
                data.surrogate_object = Some(underlying);
                Value::Unresolved(Rc::new(RefCell::new(data)))
            }
        };
        self.register_opt(id, &value)?;
        Ok(value)
    }

    fn read_converted(&mut self, id: Option<u64>, actual: &Rc<TypeData>) -> Result<Value> {
        let string_desc = self.ctx.descriptor_of(builtins().string);
        let text = match self.read_value(&string_desc)? {
            Value::Str(s) => s,
            other => {
                return Err(CodecError::Malformed {
                    offset: self.input.offset(),
                    reason: format!("expected converter text, found {other:?}"),
                })
            }
        };

        let local = if self.raw { None } else { actual.resolve() };
        let value = match local.and_then(|h| h.converter()) {
            Some(converter) => match (converter.from_text)(&text) {
                Some(v) => v,
                None => {
                    crate::warn!(
                        "converter for '{}' rejected {text:?}, boxing the text",
                        actual.type_name()
                    );
                    Self::boxed_text(actual, &text)
                }
            },
            None => {
                if !self.raw {
                    crate::warn!(
                        "no local converter for '{}', boxing the text",
                        actual.type_name()
                    );
                }
                Self::boxed_text(actual, &text)
            }
        };
        self.register_opt(id, &value)?;
        Ok(value)
    }

    fn boxed_text(actual: &Rc<TypeData>, text: &str) -> Value {
        let mut data = ObjectData::new(actual.clone());
        data.converter_text = Some(text.to_string());
        Value::Unresolved(Rc::new(RefCell::new(data)))
    }

    fn read_custom(&mut self, id: Option<u64>, actual: &Rc<TypeData>) -> Result<Value> {
        let offset = self.input.offset();
        let count = self.input.read_varuint()? as usize;
        if count > self.input.remaining() {
            return Err(CodecError::Malformed {
                offset,
                reason: format!("custom bag count {count} exceeds remaining input"),
            });
        }
        let object_desc = self.ctx.descriptor_of(builtins().object);
        let mut bag = Vec::with_capacity(count);
        for _ in 0..count {
            let name = self.read_string_value()?;
            let item = self.read_value(&object_desc)?;
            let item = self.surface(item);
            bag.push((name.to_string(), item));
        }

        let local = if self.raw { None } else { actual.resolve() };
        if let Some(reconstruct) = local.and_then(|h| h.custom()).and_then(|c| c.reconstruct) {
            if let Some(value) = reconstruct(&bag) {
                self.register_opt(id, &value)?;
                return Ok(value);
            }
            crate::warn!(
                "custom reconstruction for '{}' declined the bag, boxing it",
                actual.type_name()
            );
        }
        let mut data = ObjectData::new(actual.clone());
        data.serialization_info = Some(bag);
        let value = Value::Unresolved(Rc::new(RefCell::new(data)));
        self.register_opt(id, &value)?;
        Ok(value)
    }

    fn read_composite(&mut self, id: Option<u64>, actual: &Rc<TypeData>) -> Result<Value> {
        if actual.is_array() {
            return self.read_array(id, actual);
        }
        if actual.is_nullable() {
            let inner = actual
                .generic_args()
                .first()
                .cloned()
                .ok_or_else(|| CodecError::Malformed {
                    offset: self.input.offset(),
                    reason: "nullable descriptor without an argument".into(),
                })?;
            let value = self.read_value(&inner)?;
            let value = self.surface(value);
            self.register_opt(id, &value)?;
            return Ok(value);
        }
        if actual.is_enum() {
            return self.read_enum(id, actual);
        }

        match actual.resolve() {
            Some(ty) if ty.can_construct() => self.read_instance(id, actual, ty),
            Some(_) => {
                crate::warn!(
                    "{}, carrying payload as object data",
                    CodecError::ConstructionFailed {
                        type_name: actual.type_name()
                    }
                );
                self.read_unresolved(id, actual)
            }
            None => {
                crate::warn!(
                    "{}, carrying payload as object data",
                    CodecError::UnresolvedType {
                        type_name: actual.type_name()
                    }
                );
                self.read_unresolved(id, actual)
            }
        }
    }

    fn read_enum(&mut self, id: Option<u64>, actual: &Rc<TypeData>) -> Result<Value> {
        let underlying = actual.element().ok_or_else(|| CodecError::Malformed {
            offset: self.input.offset(),
            reason: "enum descriptor without an underlying type".into(),
        })?;
        let raw_value = self.read_scalar(underlying.kind())?;
        let raw = raw_value
            .as_integral()
            .ok_or_else(|| CodecError::Malformed {
                offset: self.input.offset(),
                reason: "enum underlying value is not integral".into(),
            })?;
        let value = match actual.resolve() {
            Some(local) if local.is_enum() => Value::Enum(local, raw),
            _ => raw_value,
        };
        self.register_opt(id, &value)?;
        Ok(value)
    }

    fn read_instance(
        &mut self,
        id: Option<u64>,
        actual: &Rc<TypeData>,
        ty: TypeHandle,
    ) -> Result<Value> {
        let obj = ObjectBody::instance(ty);
        let value = Value::Object(obj.clone());
        self.register_opt(id, &value)?;

        if self.settings.skip_member_data {
            // Names were omitted; both sides agree on local member order.
            let member_types: Vec<TypeHandle> =
                ty.all_members().iter().map(|m| m.ty).collect();
            for (index, member_ty) in member_types.into_iter().enumerate() {
                let desc = self.ctx.descriptor_of(member_ty);
                let item = self.read_value(&desc)?;
                let item = self.surface(item);
                obj.borrow_mut().fields[index] = item;
            }
        } else {
            let wire_members = actual.effective_members();
            let local_members: Vec<(String, TypeHandle)> = ty
                .all_members()
                .iter()
                .map(|m| (m.name.clone(), m.ty))
                .collect();
            for (wire_pos, wire_member) in wire_members.iter().enumerate() {
                let item = self.read_value(&wire_member.ty)?;
                match Self::match_member(&wire_members, wire_pos, &local_members) {
                    Some(index) => {
                        let target_ty = local_members[index].1;
                        match Self::coerce(self.surface(item), target_ty) {
                            Some(coerced) => obj.borrow_mut().fields[index] = coerced,
                            None => {
                                crate::warn!(
                                    "member '{}' of '{}' carries an incompatible value, discarded",
                                    wire_member.name,
                                    ty.full_name()
                                );
                            }
                        }
                    }
                    None => {
                        crate::warn!(
                            "{} on '{}', value discarded",
                            CodecError::UnresolvedMember {
                                member: wire_member.name.to_string()
                            },
                            ty.full_name()
                        );
                    }
                }
            }
        }

        self.read_collection_tail(&obj, actual)?;
        Ok(value)
    }

    /// Map a wire member onto the local member list. Plain name lookup,
    /// except when a name is shadowed across the hierarchy: then the wire
    /// member's vertical position within its name chain maps onto the same
    /// position counted from the bottom of the local chain.
    fn match_member(
        wire_members: &[TypeMember],
        wire_pos: usize,
        local_members: &[(String, TypeHandle)],
    ) -> Option<usize> {
        let name: &str = &wire_members[wire_pos].name;
        let local_chain: Vec<usize> = local_members
            .iter()
            .enumerate()
            .filter(|(_, (n, _))| n == name)
            .map(|(i, _)| i)
            .collect();
        if local_chain.is_empty() {
            return None;
        }
        let wire_chain: Vec<usize> = wire_members
            .iter()
            .enumerate()
            .filter(|(_, m)| &*m.name == name)
            .map(|(i, _)| i)
            .collect();
        let pos_in_chain = wire_chain.iter().position(|i| *i == wire_pos)?;
        let offset = (local_chain.len() as i64 - wire_chain.len() as i64 + pos_in_chain as i64)
            .clamp(0, local_chain.len() as i64 - 1) as usize;
        Some(local_chain[offset])
    }

    fn read_unresolved(&mut self, id: Option<u64>, actual: &Rc<TypeData>) -> Result<Value> {
        let carrier = Rc::new(RefCell::new(ObjectData::new(actual.clone())));
        let value = Value::Unresolved(carrier.clone());
        self.register_opt(id, &value)?;

        for wire_member in actual.effective_members() {
            let item = self.read_value(&wire_member.ty)?;
            let item = self.surface(item);
            carrier
                .borrow_mut()
                .members
                .push((wire_member.name.to_string(), item));
        }

        let shape = actual.collection();
        if shape != CollectionShape::None {
            let readonly = self.input.read_bool()?;
            if !readonly {
                let count = self.read_count("collection")?;
                let [first, second] = actual.effective_collection_types();
                let object_desc = self.ctx.descriptor_of(builtins().object);
                if shape.is_dict() {
                    let key_desc = first.unwrap_or_else(|| object_desc.clone());
                    let value_desc = second.unwrap_or(object_desc);
                    let mut entries = Vec::with_capacity(count);
                    for _ in 0..count {
                        let k = self.read_value(&key_desc)?;
                        let k = self.surface(k);
                        let v = self.read_value(&value_desc)?;
                        let v = self.surface(v);
                        entries.push((k, v));
                    }
                    carrier.borrow_mut().entries = Some(entries);
                } else {
                    let element_desc = first.unwrap_or(object_desc);
                    let mut elements = Vec::with_capacity(count);
                    for _ in 0..count {
                        let item = self.read_value(&element_desc)?;
                        elements.push(self.surface(item));
                    }
                    carrier.borrow_mut().elements = Some(elements);
                }
            }
        }
        Ok(value)
    }

    fn read_array(&mut self, id: Option<u64>, actual: &Rc<TypeData>) -> Result<Value> {
        let rank = actual.array_rank().max(1) as usize;
        let mut lengths = Vec::with_capacity(rank);
        let mut total: u64 = 1;
        for _ in 0..rank {
            let offset = self.input.offset();
            let length = self.input.read_varuint()?;
            let length = u32::try_from(length).map_err(|_| CodecError::Malformed {
                offset,
                reason: format!("array length {length} out of range"),
            })?;
            total = total
                .checked_mul(u64::from(length))
                .ok_or_else(|| CodecError::Malformed {
                    offset,
                    reason: "array element count overflows".into(),
                })?;
            lengths.push(length);
        }
        if total > self.input.remaining() as u64 {
            return Err(CodecError::Malformed {
                offset: self.input.offset(),
                reason: format!("array element count {total} exceeds remaining input"),
            });
        }
        let total = total as usize;
        let element_desc = actual.element().ok_or_else(|| CodecError::Malformed {
            offset: self.input.offset(),
            reason: "array descriptor without an element type".into(),
        })?;

        match actual.resolve() {
            Some(ty) => {
                let obj: ObjRef = Rc::new(RefCell::new(ObjectBody {
                    ty,
                    fields: Vec::new(),
                    elements: None,
                    entries: None,
                    readonly: false,
                    array: Some(ArrayData {
                        lengths,
                        items: Vec::with_capacity(total),
                    }),
                }));
                let value = Value::Object(obj.clone());
                self.register_opt(id, &value)?;
                for _ in 0..total {
                    let item = self.read_value(&element_desc)?;
                    let item = self.surface(item);
                    let mut body = obj.borrow_mut();
                    if let Some(array) = body.array.as_mut() {
                        array.items.push(item);
                    }
                }
                Ok(value)
            }
            None => {
                crate::warn!(
                    "{}, carrying array payload as object data",
                    CodecError::UnresolvedType {
                        type_name: actual.type_name()
                    }
                );
                let carrier = Rc::new(RefCell::new(ObjectData::new(actual.clone())));
                carrier.borrow_mut().array_lengths = Some(lengths);
                carrier.borrow_mut().elements = Some(Vec::with_capacity(total));
                let value = Value::Unresolved(carrier.clone());
                self.register_opt(id, &value)?;
                for _ in 0..total {
                    let item = self.read_value(&element_desc)?;
                    let item = self.surface(item);
                    let mut data = carrier.borrow_mut();
                    if let Some(elements) = data.elements.as_mut() {
                        elements.push(item);
                    }
                }
                Ok(value)
            }
        }
    }

    fn read_collection_tail(&mut self, obj: &ObjRef, actual: &Rc<TypeData>) -> Result<()> {
        let shape = actual.collection();
        if shape == CollectionShape::None {
            return Ok(());
        }
        let readonly = self.input.read_bool()?;
        obj.borrow_mut().readonly = readonly;
        if readonly {
            return Ok(());
        }
        let count = self.read_count("collection")?;
        let [first, second] = actual.effective_collection_types();
        let object_desc = self.ctx.descriptor_of(builtins().object);

        if shape.is_dict() {
            let key_desc = first.unwrap_or_else(|| object_desc.clone());
            let value_desc = second.unwrap_or(object_desc);
            obj.borrow_mut().entries.get_or_insert_with(Vec::new);
            for _ in 0..count {
                let k = self.read_value(&key_desc)?;
                let k = self.surface(k);
                let v = self.read_value(&value_desc)?;
                let v = self.surface(v);
                let mut body = obj.borrow_mut();
                if let Some(entries) = body.entries.as_mut() {
                    entries.push((k, v));
                }
            }
        } else {
            let element_desc = first.unwrap_or(object_desc);
            obj.borrow_mut().elements.get_or_insert_with(Vec::new);
            for _ in 0..count {
                let item = self.read_value(&element_desc)?;
                let item = self.surface(item);
                let mut body = obj.borrow_mut();
                if let Some(elements) = body.elements.as_mut() {
                    elements.push(item);
                }
            }
        }
        Ok(())
    }

    /// Descriptor body decode. The shell registers before its slots fill,
    /// so descriptors may reference themselves.
    fn read_type_body(&mut self, id: Option<u64>) -> Result<Value> {
        let offset = self.input.offset();
        let flags = self.input.read_varuint()?;
        let shell = Rc::new(
            TypeData::from_flags(flags)
                .map_err(|reason| CodecError::Malformed { offset, reason })?,
        );
        let value = Value::TypeData(shell.clone());
        self.register_opt(id, &value)?;

        if shell.has_body() {
            let element = self.read_type_ref()?;
            shell.set_element(element);
            let surrogate = self.read_type_ref()?;
            shell.set_surrogate(surrogate);

            let count = self.read_count("generic argument list")?;
            let mut args = Vec::with_capacity(count);
            for _ in 0..count {
                let arg = self.read_type_ref()?.ok_or_else(|| CodecError::Malformed {
                    offset: self.input.offset(),
                    reason: "null generic argument".into(),
                })?;
                args.push(arg);
            }
            shell.set_generic_args(args);

            if !shell.is_constructed_generic() {
                let full_name = self.read_string_value()?;
                let assembly = self.read_string_value()?;
                shell.set_name(full_name, assembly);
                shell.set_generic_parameter_index(self.read_u32("generic parameter index")?);
                let base = self.read_type_ref()?;
                shell.set_base(base);
                shell.set_array_rank(self.read_u32("array rank")?);

                if shell.surrogate_type().is_none()
                    && !shell.is_interface()
                    && !shell.is_array()
                    && !shell.is_enum()
                    && !shell.is_generic_parameter()
                {
                    let member_count = self.read_count("member list")?;
                    let mut members = Vec::with_capacity(member_count);
                    for _ in 0..member_count {
                        let name = self.read_string_value()?;
                        let ty =
                            self.read_type_ref()?
                                .ok_or_else(|| CodecError::Malformed {
                                    offset: self.input.offset(),
                                    reason: "null member type".into(),
                                })?;
                        members.push(TypeMember { name, ty });
                    }
                    shell.set_members(members);
                    let first = self.read_type_ref()?;
                    let second = self.read_type_ref()?;
                    shell.set_collection_types([first, second]);
                }
            }
        }
        Ok(value)
    }

    /// A nullable descriptor reference: id 0 means no type.
    fn read_type_ref(&mut self) -> Result<Option<Rc<TypeData>>> {
        let expected = self.ctx.descriptor_of(builtins().type_data);
        match self.read_value(&expected)? {
            Value::Null => Ok(None),
            Value::TypeData(td) => Ok(Some(td)),
            Value::Type(handle) => Ok(Some(self.ctx.descriptor_of(handle))),
            other => Err(CodecError::Malformed {
                offset: self.input.offset(),
                reason: format!("expected a type reference, found {other:?}"),
            }),
        }
    }

    fn read_string_value(&mut self) -> Result<Rc<str>> {
        let expected = self.ctx.descriptor_of(builtins().string);
        match self.read_value(&expected)? {
            Value::Str(s) => Ok(s),
            Value::Null => Ok(Rc::from("")),
            other => Err(CodecError::Malformed {
                offset: self.input.offset(),
                reason: format!("expected a string, found {other:?}"),
            }),
        }
    }

    fn read_scalar(&mut self, kind: PrimitiveKind) -> Result<Value> {
        let offset = self.input.offset();
        let out_of_range = |what: &str, v: i64| CodecError::Malformed {
            offset,
            reason: format!("{what} value {v} out of range"),
        };
        Ok(match kind {
            PrimitiveKind::Bool => Value::Bool(self.input.read_bool()?),
            PrimitiveKind::Char => Value::Char(self.input.read_char()?),
            PrimitiveKind::I8 => {
                let v = self.input.read_varint()?;
                Value::I8(i8::try_from(v).map_err(|_| out_of_range("i8", v))?)
            }
            PrimitiveKind::I16 => {
                let v = self.input.read_varint()?;
                Value::I16(i16::try_from(v).map_err(|_| out_of_range("i16", v))?)
            }
            PrimitiveKind::I32 => {
                let v = self.input.read_varint()?;
                Value::I32(i32::try_from(v).map_err(|_| out_of_range("i32", v))?)
            }
            PrimitiveKind::I64 => Value::I64(self.input.read_varint()?),
            PrimitiveKind::U8 => {
                let v = self.input.read_varuint()?;
                Value::U8(u8::try_from(v).map_err(|_| out_of_range("u8", v as i64))?)
            }
            PrimitiveKind::U16 => {
                let v = self.input.read_varuint()?;
                Value::U16(u16::try_from(v).map_err(|_| out_of_range("u16", v as i64))?)
            }
            PrimitiveKind::U32 => {
                let v = self.input.read_varuint()?;
                Value::U32(u32::try_from(v).map_err(|_| out_of_range("u32", v as i64))?)
            }
            PrimitiveKind::U64 => Value::U64(self.input.read_varuint()?),
            PrimitiveKind::F32 => Value::F32(self.input.read_f32()?),
            PrimitiveKind::F64 => Value::F64(self.input.read_f64()?),
            PrimitiveKind::Decimal => Value::Decimal(self.input.read_decimal()?),
            PrimitiveKind::Guid => Value::Guid(self.input.read_guid()?),
            other => {
                return Err(CodecError::Malformed {
                    offset,
                    reason: format!("{other:?} is not a scalar kind"),
                })
            }
        })
    }

    /// Coerce a decoded value into a local member slot. Exact kinds pass
    /// through; integrals convert when in range; everything else is
    /// discarded by the caller.
    fn coerce(value: Value, ty: TypeHandle) -> Option<Value> {
        use PrimitiveKind as K;
        match ty.kind() {
            K::Bool => matches!(value, Value::Bool(_)).then_some(value),
            K::Char => matches!(value, Value::Char(_)).then_some(value),
            K::I8 => i8::try_from(value.as_integral()?).ok().map(Value::I8),
            K::I16 => i16::try_from(value.as_integral()?).ok().map(Value::I16),
            K::I32 => i32::try_from(value.as_integral()?).ok().map(Value::I32),
            K::I64 => value.as_integral().map(Value::I64),
            K::U8 => u8::try_from(value.as_integral()?).ok().map(Value::U8),
            K::U16 => u16::try_from(value.as_integral()?).ok().map(Value::U16),
            K::U32 => u32::try_from(value.as_integral()?).ok().map(Value::U32),
            K::U64 => match value {
                Value::U64(_) => Some(value),
                _ => u64::try_from(value.as_integral()?).ok().map(Value::U64),
            },
            K::F32 => matches!(value, Value::F32(_)).then_some(value),
            K::F64 => match value {
                Value::F64(_) => Some(value),
                Value::F32(v) => Some(Value::F64(f64::from(v))),
                _ => None,
            },
            K::Decimal => matches!(value, Value::Decimal(_)).then_some(value),
            K::Guid => matches!(value, Value::Guid(_)).then_some(value),
            K::String => matches!(value, Value::Str(_) | Value::Null).then_some(value),
            K::Bytes => matches!(value, Value::Bytes(_) | Value::Null).then_some(value),
            K::Type => {
                matches!(value, Value::Type(_) | Value::TypeData(_) | Value::Null)
                    .then_some(value)
            }
            K::None => Some(value),
            K::Object => {
                if ty.is_enum() {
                    return value.as_integral().map(|raw| Value::Enum(ty, raw));
                }
                Some(value)
            }
        }
    }

    /// Convert internal representations into their user-facing form:
    /// resolved descriptors become `Value::Type`. Raw reads skip this.
    fn surface(&self, value: Value) -> Value {
        if self.raw {
            return value;
        }
        if let Value::TypeData(td) = &value {
            if let Some(handle) = td.resolve() {
                return Value::Type(handle);
            }
        }
        value
    }

    /// A count prefix that must fit the remaining input.
    fn read_count(&mut self, what: &str) -> Result<usize> {
        let offset = self.input.offset();
        let count = self.input.read_varuint()? as usize;
        if count > self.input.remaining() {
            return Err(CodecError::Malformed {
                offset,
                reason: format!("{what} count {count} exceeds remaining input"),
            });
        }
        Ok(count)
    }

    fn read_u32(&mut self, what: &str) -> Result<u32> {
        let offset = self.input.offset();
        let v = self.input.read_varuint()?;
        u32::try_from(v).map_err(|_| CodecError::Malformed {
            offset,
            reason: format!("{what} {v} out of range"),
        })
    }

    fn register_opt(&mut self, id: Option<u64>, value: &Value) -> Result<()> {
        if let Some(id) = id {
            self.ctx.register(id, value.clone())?;
        }
        Ok(())
    }

    /// Post-construction callbacks, in id order, once the graph is whole.
    fn dispatch_callbacks(&mut self) {
        for id in self.ctx.session_ids() {
            if let Some(Value::Object(obj)) = self.ctx.try_get_object(id) {
                let ty = obj.borrow().ty;
                if let Some(callback) = ty.on_deserialized() {
                    callback(&Value::Object(obj));
                }
            }
        }
    }
}
