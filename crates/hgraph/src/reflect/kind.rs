// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Closed kind and collection-shape tag sets with fixed wire codes.

/// Primitive kind of a type: the closed set of scalar and known-reference
/// kinds the wire format dispatches on. `Object` covers user-defined
/// reference and value types; `None` marks an unsupported type.
///
/// The wire codes occupy five bits of the descriptor flag word and are fixed
/// forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    None,
    Object,
    Type,
    String,
    Bytes,
    Guid,
    Bool,
    Char,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    Decimal,
}

impl PrimitiveKind {
    /// Five-bit wire code.
    pub const fn code(self) -> u64 {
        match self {
            Self::None => 0,
            Self::Object => 1,
            Self::Type => 2,
            Self::String => 3,
            Self::Bytes => 4,
            Self::Guid => 5,
            Self::Bool => 6,
            Self::Char => 7,
            Self::I8 => 8,
            Self::U8 => 9,
            Self::I16 => 10,
            Self::U16 => 11,
            Self::I32 => 12,
            Self::U32 => 13,
            Self::I64 => 14,
            Self::U64 => 15,
            Self::F32 => 16,
            Self::F64 => 17,
            Self::Decimal => 18,
        }
    }

    /// Inverse of [`code`](Self::code).
    pub fn from_code(code: u64) -> Option<Self> {
        Some(match code {
            0 => Self::None,
            1 => Self::Object,
            2 => Self::Type,
            3 => Self::String,
            4 => Self::Bytes,
            5 => Self::Guid,
            6 => Self::Bool,
            7 => Self::Char,
            8 => Self::I8,
            9 => Self::U8,
            10 => Self::I16,
            11 => Self::U16,
            12 => Self::I32,
            13 => Self::U32,
            14 => Self::I64,
            15 => Self::U64,
            16 => Self::F32,
            17 => Self::F64,
            18 => Self::Decimal,
            _ => return None,
        })
    }

    /// Kinds that are always reference objects, independent of type flags.
    pub fn is_known_reference(self) -> bool {
        matches!(self, Self::Type | Self::String | Self::Bytes)
    }

    /// Self-contained scalar kinds (no descriptor body, no identity).
    pub fn is_scalar(self) -> bool {
        !matches!(self, Self::None | Self::Object | Self::Type | Self::String | Self::Bytes)
    }

    /// Signed integral kinds (zig-zag encoded).
    pub fn is_signed_integral(self) -> bool {
        matches!(self, Self::I8 | Self::I16 | Self::I32 | Self::I64)
    }

    /// Unsigned integral kinds.
    pub fn is_unsigned_integral(self) -> bool {
        matches!(self, Self::U8 | Self::U16 | Self::U32 | Self::U64)
    }
}

/// Collection shape of a type, three bits of the descriptor flag word.
///
/// Typed shapes carry their element (or key/value) types in the descriptor's
/// trailing collection slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionShape {
    None,
    UntypedList,
    UntypedDict,
    TypedCollection,
    TypedDict,
}

impl CollectionShape {
    /// Three-bit wire code.
    pub const fn code(self) -> u64 {
        match self {
            Self::None => 0,
            Self::UntypedList => 1,
            Self::UntypedDict => 2,
            Self::TypedCollection => 3,
            Self::TypedDict => 4,
        }
    }

    /// Inverse of [`code`](Self::code).
    pub fn from_code(code: u64) -> Option<Self> {
        Some(match code {
            0 => Self::None,
            1 => Self::UntypedList,
            2 => Self::UntypedDict,
            3 => Self::TypedCollection,
            4 => Self::TypedDict,
            _ => return None,
        })
    }

    /// Whether the collection tail carries key/value pairs.
    pub fn is_dict(self) -> bool {
        matches!(self, Self::UntypedDict | Self::TypedDict)
    }
}
