// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The encoding state machine.
//!
//! `write` walks the graph recursively. For every reference-typed slot the
//! writer emits the value's session id; only a fresh id is followed by a
//! payload, and the value is registered *before* its body is written so
//! cycles terminate. When the declared type is unsealed, the actual type's
//! descriptor precedes the body. Dispatch priority within a payload is:
//! surrogate, then converter, then the custom protocol, then the primitive
//! kind.

use super::context::Context;
use super::type_data::TypeData;
use super::{SerializationSettings, WIRE_VERSION};
use crate::error::{CodecError, Result};
use crate::reflect::{builtins, same_type, CollectionShape, PrimitiveKind, TypeHandle};
use crate::ser::PrimitiveWriter;
use crate::value::Value;

/// Encoding session over an owned output buffer.
pub struct Writer {
    out: PrimitiveWriter,
    ctx: Context,
    settings: SerializationSettings,
    depth: u32,
    wrote_root: bool,
}

impl Writer {
    pub fn new() -> Self {
        Self::with_settings(SerializationSettings::default())
    }

    pub fn with_settings(settings: SerializationSettings) -> Self {
        let mut out = PrimitiveWriter::new();
        out.write_varuint(WIRE_VERSION);
        Self {
            out,
            ctx: Context::new(),
            settings,
            depth: 0,
            wrote_root: false,
        }
    }

    pub fn settings(&self) -> SerializationSettings {
        self.settings
    }

    /// Encode the root value at the universal top type.
    pub fn write(&mut self, value: &Value) -> Result<()> {
        if self.wrote_root {
            return Err(CodecError::Unsupported {
                reason: "a stream carries exactly one root".into(),
            });
        }
        self.wrote_root = true;
        self.write_value(builtins().object, value)
    }

    /// Finish the session, handing back the encoded stream.
    pub fn into_bytes(self) -> Vec<u8> {
        self.out.into_bytes()
    }

    fn write_value(&mut self, expected: TypeHandle, value: &Value) -> Result<()> {
        self.depth += 1;
        let result = self.write_value_inner(expected, value);
        self.depth -= 1;
        result
    }

    fn write_value_inner(&mut self, expected: TypeHandle, value: &Value) -> Result<()> {
        if self.depth == 1 {
            self.out.write_varuint(self.settings.to_flags());
        }

        if expected.is_reference() {
            if value.is_null() {
                self.out.write_varuint(0);
                return Ok(());
            }
            if let Some(id) = self.ctx.try_get_id(value) {
                self.out.write_varuint(id);
                return Ok(());
            }
            let id = self.ctx.new_id();
            self.out.write_varuint(id);
            self.ctx.register(id, value.clone())?;

            let actual = value.runtime_type().ok_or_else(|| CodecError::Unsupported {
                reason: "an unresolved carrier cannot be re-serialized".into(),
            })?;
            if !expected.is_sealed() {
                self.write_type_data(actual)?;
            }
            if !expected.is_supported() || !actual.is_supported() {
                return Ok(());
            }
            self.write_body(actual, value)
        } else {
            if !expected.is_supported() {
                return Ok(());
            }
            if value.is_null() {
                return Err(CodecError::Unsupported {
                    reason: format!(
                        "null cannot be encoded at value type '{}'",
                        expected.full_name()
                    ),
                });
            }
            self.write_body(expected, value)
        }
    }

    /// Payload dispatch: surrogate, converter, custom protocol, kind.
    fn write_body(&mut self, ty: TypeHandle, value: &Value) -> Result<()> {
        if let Some(surrogate) = ty.surrogate() {
            let converted = (surrogate.convert)(value);
            return self.write_value(builtins().object, &converted);
        }
        if let Some(converter) = ty.converter() {
            if self.settings.ignore_converter {
                crate::debug!(
                    "{} on '{}', falling through to member-wise encoding",
                    CodecError::CapabilityRefused {
                        capability: "converter"
                    },
                    ty.full_name()
                );
            } else {
                let text = (converter.to_text)(value);
                return self.write_value(builtins().string, &Value::from(text));
            }
        }
        if let Some(custom) = ty.custom() {
            if self.settings.ignore_custom {
                crate::debug!(
                    "{} on '{}', falling through to member-wise encoding",
                    CodecError::CapabilityRefused {
                        capability: "custom-serializable"
                    },
                    ty.full_name()
                );
            } else {
                let bag = (custom.emit)(value);
                self.out.write_varuint(bag.len() as u64);
                for (name, item) in &bag {
                    self.write_value(builtins().string, &Value::from(name.clone()))?;
                    self.write_value(builtins().object, item)?;
                }
                return Ok(());
            }
        }

        match ty.kind() {
            PrimitiveKind::None => Ok(()),
            PrimitiveKind::Object => self.write_object(ty, value),
            PrimitiveKind::Type => match value {
                Value::Type(handle) => self.write_type_body(*handle),
                Value::TypeData(_) => Err(CodecError::Unsupported {
                    reason: "a foreign type descriptor cannot be re-serialized".into(),
                }),
                _ => Err(Self::mismatch(ty, value)),
            },
            PrimitiveKind::String => match value {
                Value::Str(s) => {
                    self.out.write_str(s);
                    Ok(())
                }
                _ => Err(Self::mismatch(ty, value)),
            },
            PrimitiveKind::Bytes => match value {
                Value::Bytes(b) => {
                    self.out.write_blob(b);
                    Ok(())
                }
                _ => Err(Self::mismatch(ty, value)),
            },
            scalar => self.write_scalar(ty, scalar, value),
        }
    }

    fn write_object(&mut self, ty: TypeHandle, value: &Value) -> Result<()> {
        if ty.is_array() {
            return self.write_array(ty, value);
        }
        if ty.is_nullable() {
            let inner = ty
                .generic_args()
                .first()
                .copied()
                .ok_or_else(|| Self::mismatch(ty, value))?;
            return self.write_value(inner, value);
        }
        if ty.is_enum() {
            let underlying = ty.element().ok_or_else(|| Self::mismatch(ty, value))?;
            let raw = value.as_integral().ok_or_else(|| Self::mismatch(ty, value))?;
            if underlying.kind().is_unsigned_integral() {
                self.out.write_varuint(raw as u64);
            } else {
                self.out.write_varint(raw);
            }
            return Ok(());
        }

        let obj = value.as_object().ok_or_else(|| Self::mismatch(ty, value))?;
        let body = obj.borrow();
        if !same_type(body.ty, ty) {
            return Err(CodecError::ConstructionFailed {
                type_name: format!(
                    "value of type '{}' written at sealed type '{}'",
                    body.ty.full_name(),
                    ty.full_name()
                ),
            });
        }
        let members = ty.all_members();
        if body.fields.len() != members.len() {
            return Err(CodecError::ConstructionFailed {
                type_name: ty.full_name().to_string(),
            });
        }
        let member_types: Vec<TypeHandle> = members.iter().map(|m| m.ty).collect();
        for (member_ty, field) in member_types.iter().copied().zip(body.fields.iter()) {
            self.write_value(member_ty, field)?;
        }

        match ty.collection().shape() {
            CollectionShape::None => Ok(()),
            CollectionShape::UntypedList | CollectionShape::TypedCollection => {
                let element_ty = ty.collection().first_type().unwrap_or(builtins().object);
                self.out.write_bool(body.readonly);
                if body.readonly {
                    return Ok(());
                }
                let elements = body.elements.as_ref().ok_or_else(|| {
                    CodecError::ConstructionFailed {
                        type_name: ty.full_name().to_string(),
                    }
                })?;
                let reported = elements.len();
                self.out.write_varuint(reported as u64);
                let mut iterated = 0usize;
                for item in elements.iter() {
                    self.write_value(element_ty, item)?;
                    iterated += 1;
                }
                if iterated != reported {
                    return Err(CodecError::CountMismatch { reported, iterated });
                }
                Ok(())
            }
            CollectionShape::UntypedDict | CollectionShape::TypedDict => {
                let key_ty = ty.collection().first_type().unwrap_or(builtins().object);
                let value_ty = ty.collection().second_type().unwrap_or(builtins().object);
                self.out.write_bool(body.readonly);
                if body.readonly {
                    return Ok(());
                }
                let entries = body.entries.as_ref().ok_or_else(|| {
                    CodecError::ConstructionFailed {
                        type_name: ty.full_name().to_string(),
                    }
                })?;
                let reported = entries.len();
                self.out.write_varuint(reported as u64);
                let mut iterated = 0usize;
                for (key, item) in entries.iter() {
                    self.write_value(key_ty, key)?;
                    self.write_value(value_ty, item)?;
                    iterated += 1;
                }
                if iterated != reported {
                    return Err(CodecError::CountMismatch { reported, iterated });
                }
                Ok(())
            }
        }
    }

    fn write_array(&mut self, ty: TypeHandle, value: &Value) -> Result<()> {
        let obj = value.as_object().ok_or_else(|| Self::mismatch(ty, value))?;
        let body = obj.borrow();
        let data = body
            .array
            .as_ref()
            .ok_or_else(|| Self::mismatch(ty, value))?;
        let declared = ty.array_rank().max(1);
        if data.rank() != declared {
            return Err(CodecError::ArrayRankMismatch {
                declared,
                actual: data.rank(),
            });
        }
        let expected_len: u64 = data.lengths.iter().map(|l| u64::from(*l)).product();
        if expected_len != data.items.len() as u64 {
            return Err(CodecError::CountMismatch {
                reported: expected_len as usize,
                iterated: data.items.len(),
            });
        }
        for length in &data.lengths {
            self.out.write_varuint(u64::from(*length));
        }
        let element_ty = ty.element().unwrap_or(builtins().object);
        for item in data.items.iter() {
            self.write_value(element_ty, item)?;
        }
        Ok(())
    }

    fn write_scalar(&mut self, ty: TypeHandle, kind: PrimitiveKind, value: &Value) -> Result<()> {
        match (kind, value) {
            (PrimitiveKind::Bool, Value::Bool(v)) => self.out.write_bool(*v),
            (PrimitiveKind::Char, Value::Char(v)) => self.out.write_char(*v),
            (PrimitiveKind::I8, Value::I8(v)) => self.out.write_varint(i64::from(*v)),
            (PrimitiveKind::U8, Value::U8(v)) => self.out.write_varuint(u64::from(*v)),
            (PrimitiveKind::I16, Value::I16(v)) => self.out.write_varint(i64::from(*v)),
            (PrimitiveKind::U16, Value::U16(v)) => self.out.write_varuint(u64::from(*v)),
            (PrimitiveKind::I32, Value::I32(v)) => self.out.write_varint(i64::from(*v)),
            (PrimitiveKind::U32, Value::U32(v)) => self.out.write_varuint(u64::from(*v)),
            (PrimitiveKind::I64, Value::I64(v)) => self.out.write_varint(*v),
            (PrimitiveKind::U64, Value::U64(v)) => self.out.write_varuint(*v),
            (PrimitiveKind::F32, Value::F32(v)) => self.out.write_f32(*v),
            (PrimitiveKind::F64, Value::F64(v)) => self.out.write_f64(*v),
            (PrimitiveKind::Decimal, Value::Decimal(v)) => self.out.write_decimal(v),
            (PrimitiveKind::Guid, Value::Guid(v)) => self.out.write_guid(v),
            _ => return Err(Self::mismatch(ty, value)),
        }
        Ok(())
    }

    /// Write a type as its wire descriptor, reference-framed.
    fn write_type_data(&mut self, ty: TypeHandle) -> Result<()> {
        self.write_value(builtins().type_data, &Value::Type(ty))
    }

    fn write_type_ref(&mut self, ty: Option<TypeHandle>) -> Result<()> {
        match ty {
            Some(handle) => self.write_type_data(handle),
            None => {
                self.out.write_varuint(0);
                Ok(())
            }
        }
    }

    /// Descriptor body: flag word, then — for object kinds — element,
    /// surrogate, generic arguments, the name section (non-constructed
    /// types only) and the member list.
    fn write_type_body(&mut self, ty: TypeHandle) -> Result<()> {
        let flags = TypeData::flags_for(ty);
        self.out.write_varuint(flags);
        if flags == 0 || ty.kind() != PrimitiveKind::Object {
            return Ok(());
        }

        self.write_type_ref(ty.element())?;
        let surrogate_ty = if ty.is_constructed_generic() {
            // Constructed generics derive their surrogate by substitution.
            None
        } else {
            ty.surrogate().map(|s| s.surrogate_type)
        };
        self.write_type_ref(surrogate_ty)?;
        let args = ty.generic_args().to_vec();
        self.out.write_varuint(args.len() as u64);
        for arg in args {
            self.write_type_data(arg)?;
        }

        if ty.is_constructed_generic() {
            return Ok(());
        }

        self.write_value(builtins().string, &Value::from(ty.full_name()))?;
        self.write_value(builtins().string, &Value::from(ty.assembly()))?;
        self.out.write_varuint(u64::from(ty.generic_parameter_index()));
        self.write_type_ref(ty.base())?;
        self.out.write_varuint(u64::from(ty.array_rank()));

        if ty.surrogate().is_none()
            && !ty.is_interface()
            && !ty.is_array()
            && !ty.is_enum()
            && !ty.is_generic_parameter()
        {
            if self.settings.skip_member_data {
                self.out.write_varuint(0);
            } else {
                let pairs: Vec<(String, TypeHandle)> = ty
                    .all_members()
                    .iter()
                    .map(|m| (m.name.clone(), m.ty))
                    .collect();
                self.out.write_varuint(pairs.len() as u64);
                for (name, member_ty) in pairs {
                    self.write_value(builtins().string, &Value::from(name))?;
                    self.write_type_data(member_ty)?;
                }
            }
            self.write_type_ref(ty.collection().first_type())?;
            self.write_type_ref(ty.collection().second_type())?;
        }
        Ok(())
    }

    fn mismatch(ty: TypeHandle, value: &Value) -> CodecError {
        CodecError::ConstructionFailed {
            type_name: format!("{value:?} is not a '{}'", ty.full_name()),
        }
    }
}

impl Default for Writer {
    fn default() -> Self {
        Self::new()
    }
}
