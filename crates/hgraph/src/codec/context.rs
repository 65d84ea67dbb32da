// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Session registry: the id ↔ object maps plus the well-known preamble.
//!
//! One `Context` backs one read or write session. Ids are allocated in
//! encounter order starting right after the well-known range. A value is
//! registered at its id before its body is processed, which is what makes
//! cyclic graphs encodable and decodable.
//!
//! The preamble (ids 1..=21) is fixed: the top type, string, the type of
//! type, the legacy descriptor slot, the nullable wrapper, the empty string,
//! and the primitive wrapper descriptors. Both peers materialize it from the
//! builtin registry instead of transmitting it; any disagreement would
//! silently misalign the stream, so its layout is part of the wire version.

use super::type_data::{TypeData, TypeMember};
use crate::error::{CodecError, Result};
use crate::reflect::{builtins, TypeHandle};
use crate::value::Value;
use std::collections::HashMap;
use std::rc::Rc;

/// Number of well-known ids. Session ids start at `WELL_KNOWN_COUNT + 1`.
pub const WELL_KNOWN_COUNT: u64 = 21;

/// Well-known id of the empty string.
pub(crate) const EMPTY_STRING_ID: u64 = 6;

/// Per-session reference registry.
pub struct Context {
    /// id → value (read side and well-known preamble).
    objects: HashMap<u64, Value>,
    /// identity key → id (write side and well-known preamble).
    ids: HashMap<usize, u64>,
    /// Strings intern by value within a session.
    strings: HashMap<Box<str>, u64>,
    /// Wire descriptors materialized from local types, one per handle.
    descriptors: HashMap<usize, Rc<TypeData>>,
    seed: u64,
}

impl Context {
    pub fn new() -> Self {
        let mut ctx = Self {
            objects: HashMap::new(),
            ids: HashMap::new(),
            strings: HashMap::new(),
            descriptors: HashMap::new(),
            seed: WELL_KNOWN_COUNT + 1,
        };
        for (id, handle) in builtins().preamble() {
            ctx.ids.insert(handle.key(), id);
            let descriptor = ctx.descriptor_of(handle);
            ctx.objects.insert(id, Value::TypeData(descriptor));
        }
        ctx.strings.insert(Box::from(""), EMPTY_STRING_ID);
        ctx.objects
            .insert(EMPTY_STRING_ID, Value::Str(Rc::from("")));
        ctx
    }

    /// The id of a previously registered value, consulting the well-known
    /// preamble first. Strings look up by content, reference values by
    /// identity.
    pub fn try_get_id(&self, value: &Value) -> Option<u64> {
        if let Value::Str(s) = value {
            return self.strings.get(&**s).copied();
        }
        let key = value.identity_key()?;
        self.ids.get(&key).copied()
    }

    /// The value registered at `id`, if any.
    pub fn try_get_object(&self, id: u64) -> Option<Value> {
        self.objects.get(&id).cloned()
    }

    /// Allocate the next session id. Strictly increasing.
    pub fn new_id(&mut self) -> u64 {
        let id = self.seed;
        self.seed += 1;
        id
    }

    /// Bind `value` to `id`. Fails for id 0 and for ids already bound in
    /// the well-known preamble or this session.
    pub fn register(&mut self, id: u64, value: Value) -> Result<()> {
        if id == 0 || self.objects.contains_key(&id) {
            return Err(CodecError::IdReuse { id });
        }
        if let Value::Str(s) = &value {
            self.strings.entry(Box::from(&**s)).or_insert(id);
        } else if let Some(key) = value.identity_key() {
            self.ids.insert(key, id);
        }
        self.objects.insert(id, value);
        Ok(())
    }

    /// The wire descriptor for a local type, materialized once per session.
    ///
    /// Registration into the memo precedes the body fill, mirroring the
    /// register-before-body protocol, so self-referential types terminate.
    pub fn descriptor_of(&mut self, ty: TypeHandle) -> Rc<TypeData> {
        if let Some(descriptor) = self.descriptors.get(&ty.key()) {
            return descriptor.clone();
        }
        let shell = match TypeData::from_flags(TypeData::flags_for(ty)) {
            Ok(td) => Rc::new(td),
            Err(_) => TypeData::unsupported(),
        };
        self.descriptors.insert(ty.key(), shell.clone());
        shell.set_resolved(Some(ty));

        if shell.has_body() {
            let element = ty.element().map(|e| self.descriptor_of(e));
            shell.set_element(element);
            let surrogate = if ty.is_constructed_generic() {
                None
            } else {
                ty.surrogate().map(|s| {
                    let handle = s.surrogate_type;
                    self.descriptor_of(handle)
                })
            };
            shell.set_surrogate(surrogate);
            let args: Vec<Rc<TypeData>> = ty
                .generic_args()
                .to_vec()
                .into_iter()
                .map(|a| self.descriptor_of(a))
                .collect();
            shell.set_generic_args(args);

            if !ty.is_constructed_generic() {
                shell.set_name(Rc::from(ty.full_name()), Rc::from(ty.assembly()));
                shell.set_generic_parameter_index(ty.generic_parameter_index());
                let base = ty.base().map(|b| self.descriptor_of(b));
                shell.set_base(base);
                shell.set_array_rank(ty.array_rank());

                if ty.surrogate().is_none()
                    && !ty.is_interface()
                    && !ty.is_array()
                    && !ty.is_enum()
                    && !ty.is_generic_parameter()
                {
                    let members: Vec<TypeMember> = ty
                        .all_members()
                        .iter()
                        .map(|m| TypeMember {
                            name: Rc::from(m.name.as_str()),
                            ty: self.descriptor_of(m.ty),
                        })
                        .collect();
                    shell.set_members(members);
                    let first = ty.collection().first_type().map(|t| self.descriptor_of(t));
                    let second = ty.collection().second_type().map(|t| self.descriptor_of(t));
                    shell.set_collection_types([first, second]);
                }
            }
        }
        shell
    }

    /// Session ids registered so far, ascending, excluding the preamble.
    pub(crate) fn session_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self
            .objects
            .keys()
            .copied()
            .filter(|id| *id > WELL_KNOWN_COUNT)
            .collect();
        ids.sort_unstable();
        ids
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
