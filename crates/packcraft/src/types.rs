//! Declared field types and the geometry they carry on their own.

use std::collections::BTreeMap;

use crate::capability::CompositeRef;

/// Built-in integer types. Multi-byte values are always big-endian on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Primitive {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
}

impl Primitive {
    /// Width in bytes.
    pub const fn width(self) -> usize {
        match self {
            Primitive::U8 | Primitive::I8 => 1,
            Primitive::U16 | Primitive::I16 => 2,
            Primitive::U32 | Primitive::I32 => 4,
            Primitive::U64 | Primitive::I64 => 8,
        }
    }

    pub const fn bits(self) -> usize {
        self.width() * 8
    }

    pub const fn is_signed(self) -> bool {
        matches!(
            self,
            Primitive::I8 | Primitive::I16 | Primitive::I32 | Primitive::I64
        )
    }

    pub const fn name(self) -> &'static str {
        match self {
            Primitive::U8 => "u8",
            Primitive::I8 => "i8",
            Primitive::U16 => "u16",
            Primitive::I16 => "i16",
            Primitive::U32 => "u32",
            Primitive::I32 => "i32",
            Primitive::U64 => "u64",
            Primitive::I64 => "i64",
        }
    }

    /// Largest unsigned value the type's bit pattern can hold.
    pub const fn max_raw(self) -> u64 {
        match self.bits() {
            64 => u64::MAX,
            bits => (1u64 << bits) - 1,
        }
    }
}

/// A named enumeration mapped onto an integer backing type.
///
/// Values without a named variant are still readable; they come back with no
/// variant name, which is what flag-style enums need.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EnumType {
    pub name: String,
    /// Natural backing width of the enumeration.
    pub backing: Primitive,
    /// Mapping from raw values to variant names.
    #[cfg_attr(feature = "serde", serde(default))]
    pub variants: BTreeMap<u64, String>,
}

impl EnumType {
    pub fn new(name: impl Into<String>, backing: Primitive) -> Self {
        Self {
            name: name.into(),
            backing,
            variants: BTreeMap::new(),
        }
    }

    /// Adds a variant; builder style.
    pub fn variant(mut self, name: impl Into<String>, value: u64) -> Self {
        self.variants.insert(value, name.into());
        self
    }

    pub fn name_of(&self, raw: u64) -> Option<&str> {
        self.variants.get(&raw).map(String::as_str)
    }

    pub fn value_of(&self, name: &str) -> Option<u64> {
        self.variants
            .iter()
            .find(|(_, variant)| variant.as_str() == name)
            .map(|(value, _)| *value)
    }
}

/// The type a field is declared with.
#[derive(Debug, Clone, PartialEq)]
pub enum DeclaredType {
    Primitive(Primitive),
    Enum(EnumType),
    /// A host type built from, and copied back into, its byte range.
    Composite(CompositeRef),
    /// An open-ended byte range with no further interpretation.
    Bytes,
    /// A byte array of fixed length.
    ByteArray(usize),
}

impl DeclaredType {
    /// Size that is a property of the type itself, if any.
    pub fn intrinsic_size(&self) -> Option<usize> {
        match self {
            DeclaredType::Primitive(primitive) => Some(primitive.width()),
            DeclaredType::Enum(enumeration) => Some(enumeration.backing.width()),
            DeclaredType::Composite(composite) => composite.static_size(),
            DeclaredType::Bytes => None,
            DeclaredType::ByteArray(len) => Some(*len),
        }
    }

    /// Integer type backing a scalar, enum or bit-field value.
    pub fn integer(&self) -> Option<Primitive> {
        match self {
            DeclaredType::Primitive(primitive) => Some(*primitive),
            DeclaredType::Enum(enumeration) => Some(enumeration.backing),
            _ => None,
        }
    }

    pub fn is_byte_range(&self) -> bool {
        matches!(self, DeclaredType::Bytes | DeclaredType::ByteArray(_))
    }

    pub fn name(&self) -> String {
        match self {
            DeclaredType::Primitive(primitive) => primitive.name().to_string(),
            DeclaredType::Enum(enumeration) => enumeration.name.clone(),
            DeclaredType::Composite(composite) => composite.name().to_string(),
            DeclaredType::Bytes => "bytes".to_string(),
            DeclaredType::ByteArray(len) => format!("[u8; {len}]"),
        }
    }
}

impl From<Primitive> for DeclaredType {
    fn from(value: Primitive) -> Self {
        DeclaredType::Primitive(value)
    }
}

impl From<EnumType> for DeclaredType {
    fn from(value: EnumType) -> Self {
        DeclaredType::Enum(value)
    }
}

impl From<CompositeRef> for DeclaredType {
    fn from(value: CompositeRef) -> Self {
        DeclaredType::Composite(value)
    }
}
