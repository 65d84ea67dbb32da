// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fluent builder for registering runtime types.

use super::hooks::{Converter, CustomSerializable, DeserializedCallback, Surrogate};
use super::kind::PrimitiveKind;
use super::registry::{self, RegistryError};
use super::runtime_type::{CollectionSpec, Member, RuntimeType, TypeHandle};
use crate::value::Value;
use std::sync::OnceLock;

/// Builder for registering a [`RuntimeType`].
///
/// ```ignore
/// use hgraph::reflect::{builtins, TypeBuilder};
///
/// let b = builtins();
/// let point = TypeBuilder::value("geometry.Point", "demo")
///     .field("x", b.float64)
///     .field("y", b.float64)
///     .build()?;
/// ```
///
/// Self-referential types register first and define members second:
///
/// ```ignore
/// let node = TypeBuilder::reference("list.Node", "demo").build()?;
/// node.define_members(vec![Member::new("next", node)])?;
/// ```
#[derive(Debug)]
pub struct TypeBuilder {
    full_name: String,
    assembly: String,
    kind: PrimitiveKind,
    is_reference: bool,
    is_sealed: bool,
    is_interface: bool,
    is_enum: bool,
    is_generic_definition: bool,
    base: Option<TypeHandle>,
    element: Option<TypeHandle>,
    params: Vec<TypeHandle>,
    fields: Vec<Member>,
    collection: CollectionSpec,
    variants: Vec<(String, i64)>,
    surrogate: Option<Surrogate>,
    converter: Option<Converter>,
    custom: Option<CustomSerializable>,
    on_deserialized: Option<DeserializedCallback>,
}

impl TypeBuilder {
    fn new(full_name: impl Into<String>, assembly: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            assembly: assembly.into(),
            kind: PrimitiveKind::Object,
            is_reference: true,
            is_sealed: false,
            is_interface: false,
            is_enum: false,
            is_generic_definition: false,
            base: None,
            element: None,
            params: Vec::new(),
            fields: Vec::new(),
            collection: CollectionSpec::None,
            variants: Vec::new(),
            surrogate: None,
            converter: None,
            custom: None,
            on_deserialized: None,
        }
    }

    /// An unsealed reference type (class).
    pub fn reference(full_name: impl Into<String>, assembly: impl Into<String>) -> Self {
        Self::new(full_name, assembly)
    }

    /// A value type (struct): copied by content, sealed, no identity.
    pub fn value(full_name: impl Into<String>, assembly: impl Into<String>) -> Self {
        let mut builder = Self::new(full_name, assembly);
        builder.is_reference = false;
        builder.is_sealed = true;
        builder
    }

    /// An interface: reference-shaped but never constructible.
    pub fn interface(full_name: impl Into<String>, assembly: impl Into<String>) -> Self {
        let mut builder = Self::new(full_name, assembly);
        builder.is_interface = true;
        builder
    }

    /// An enumeration over the given underlying integral type.
    pub fn enumeration(
        full_name: impl Into<String>,
        assembly: impl Into<String>,
        underlying: TypeHandle,
    ) -> Self {
        let mut builder = Self::new(full_name, assembly);
        builder.is_reference = false;
        builder.is_sealed = true;
        builder.is_enum = true;
        builder.element = Some(underlying);
        builder
    }

    /// A generic definition with named parameter placeholders.
    pub fn generic_definition(
        full_name: impl Into<String>,
        assembly: impl Into<String>,
        params: &[&str],
    ) -> Self {
        let mut builder = Self::new(full_name, assembly);
        builder.is_generic_definition = true;
        builder.params = params
            .iter()
            .enumerate()
            .map(|(i, name)| registry::new_generic_parameter(name, i as u32))
            .collect();
        builder
    }

    /// Mark the type sealed (no subtypes; the wire omits its actual-type
    /// descriptor when it is the declared type).
    pub fn sealed(mut self) -> Self {
        self.is_sealed = true;
        self
    }

    /// Set the base type. Inherited members come first on the wire.
    pub fn base(mut self, base: TypeHandle) -> Self {
        self.base = Some(base);
        self
    }

    /// Add a member field.
    pub fn field(mut self, name: impl Into<String>, ty: TypeHandle) -> Self {
        self.fields.push(Member::new(name, ty));
        self
    }

    /// Add a member field typed by one of this definition's parameters.
    ///
    /// # Panics
    ///
    /// Panics when `param` is not a declared parameter index.
    pub fn field_param(mut self, name: impl Into<String>, param: usize) -> Self {
        assert!(
            param < self.params.len(),
            "generic parameter index {param} out of range"
        );
        self.fields.push(Member::new(name, self.params[param]));
        self
    }

    /// Add an enum variant.
    pub fn variant(mut self, name: impl Into<String>, value: i64) -> Self {
        self.variants.push((name.into(), value));
        self
    }

    /// Elements at the universal top type after the member fields.
    pub fn untyped_list(mut self) -> Self {
        self.collection = CollectionSpec::UntypedList;
        self
    }

    /// Key/value pairs at the universal top type after the member fields.
    pub fn untyped_dict(mut self) -> Self {
        self.collection = CollectionSpec::UntypedDict;
        self
    }

    /// Elements at a fixed type after the member fields.
    pub fn typed_collection(mut self, element: TypeHandle) -> Self {
        self.collection = CollectionSpec::Typed { element };
        self
    }

    /// Key/value pairs at fixed types after the member fields.
    pub fn typed_dict(mut self, key: TypeHandle, value: TypeHandle) -> Self {
        self.collection = CollectionSpec::TypedDict { key, value };
        self
    }

    /// Typed collection over a parameter of this generic definition.
    ///
    /// # Panics
    ///
    /// Panics when `param` is not a declared parameter index.
    pub fn typed_collection_param(mut self, param: usize) -> Self {
        assert!(
            param < self.params.len(),
            "generic parameter index {param} out of range"
        );
        self.collection = CollectionSpec::Typed {
            element: self.params[param],
        };
        self
    }

    /// Serialize through a surrogate type.
    pub fn surrogate(
        mut self,
        surrogate_type: TypeHandle,
        convert: fn(&Value) -> Value,
        revert: fn(&Value) -> Value,
    ) -> Self {
        self.surrogate = Some(Surrogate {
            surrogate_type,
            convert,
            revert,
        });
        self
    }

    /// Serialize as an invariant string.
    pub fn converter(
        mut self,
        to_text: fn(&Value) -> String,
        from_text: fn(&str) -> Option<Value>,
    ) -> Self {
        self.converter = Some(Converter { to_text, from_text });
        self
    }

    /// Serialize through the named-value-bag protocol.
    pub fn custom(
        mut self,
        emit: fn(&Value) -> Vec<(String, Value)>,
        reconstruct: Option<fn(&[(String, Value)]) -> Option<Value>>,
    ) -> Self {
        self.custom = Some(CustomSerializable { emit, reconstruct });
        self
    }

    /// Invoke a callback on each decoded instance once the graph is whole.
    pub fn on_deserialized(mut self, callback: DeserializedCallback) -> Self {
        self.on_deserialized = Some(callback);
        self
    }

    /// Register the type. Member lists stay open for
    /// [`define_members`](RuntimeType::define_members) when no field was
    /// added here.
    pub fn build(self) -> Result<TypeHandle, RegistryError> {
        let members = OnceLock::new();
        if !self.fields.is_empty() {
            let _ = members.set(self.fields);
        }
        registry::register_named(RuntimeType {
            full_name: self.full_name,
            assembly: self.assembly,
            kind: self.kind,
            is_reference: self.is_reference,
            is_sealed: self.is_sealed,
            is_interface: self.is_interface,
            is_enum: self.is_enum,
            is_array: false,
            is_nullable: false,
            is_generic: self.is_generic_definition,
            is_generic_definition: self.is_generic_definition,
            is_generic_parameter: false,
            array_rank: 0,
            generic_parameter_index: 0,
            base: self.base,
            element: self.element,
            generic_args: self.params,
            members,
            collection: self.collection,
            variants: self.variants,
            surrogate: self.surrogate,
            converter: self.converter,
            custom: self.custom,
            on_deserialized: self.on_deserialized,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflect::{builtins, same_type};

    #[test]
    fn test_value_type_defaults() {
        let b = builtins();
        let point = TypeBuilder::value("builder_tests.Point", "tests")
            .field("x", b.float64)
            .field("y", b.float64)
            .build()
            .expect("register");
        assert!(!point.is_reference());
        assert!(point.is_sealed());
        assert_eq!(point.all_members().len(), 2);
    }

    #[test]
    fn test_enumeration_carries_underlying_and_variants() {
        let b = builtins();
        let color = TypeBuilder::enumeration("builder_tests.Color", "tests", b.int32)
            .variant("Red", 0)
            .variant("Green", 1)
            .variant("Blue", 2)
            .build()
            .expect("register");
        assert!(color.is_enum());
        assert!(same_type(color.element().expect("underlying"), b.int32));
        assert_eq!(color.variant_value("Green"), Some(1));
        assert_eq!(color.variant_value("Mauve"), None);
    }

    #[test]
    fn test_collection_shapes() {
        let b = builtins();
        let bag = TypeBuilder::reference("builder_tests.Bag", "tests")
            .sealed()
            .untyped_list()
            .build()
            .expect("register");
        assert!(matches!(bag.collection(), CollectionSpec::UntypedList));

        let scores = TypeBuilder::reference("builder_tests.Scores", "tests")
            .typed_dict(b.string, b.int32)
            .build()
            .expect("register");
        let collection = scores.collection();
        assert!(same_type(collection.first_type().expect("key"), b.string));
        assert!(same_type(collection.second_type().expect("value"), b.int32));
    }

    #[test]
    fn test_interface_is_not_constructible() {
        let shape = TypeBuilder::interface("builder_tests.IShape", "tests")
            .build()
            .expect("register");
        assert!(shape.is_interface());
        assert!(!shape.can_construct());
    }
}
