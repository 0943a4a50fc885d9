//! Accessor runtime: reads and writes fields of a concrete buffer through a [LayoutPlan].

use std::{fmt, ops::Range};

use crate::{
    bits::{read_be, sign_extend, write_be},
    capability::CompositeRef,
    errors::{ReadError, UnionFacet, WriteError},
    plan::{FieldShape, LayoutPlan, ResolvedField},
    types::{EnumType, Primitive},
    value::ValueProvider,
};

/// A field value read from a buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value<'a> {
    Unsigned(u64),
    Signed(i64),
    Enum(EnumValue<'a>),
    /// Raw byte range, e.g. a payload.
    Bytes(&'a [u8]),
    Composite(CompositeView<'a>),
}

/// Raw enum value plus its variant name when it has one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumValue<'a> {
    pub raw: u64,
    pub variant: Option<&'a str>,
}

/// A composite built over its field's byte range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompositeView<'a> {
    composite: &'a CompositeRef,
    bytes: &'a [u8],
}

impl<'a> CompositeView<'a> {
    pub fn name(&self) -> &'a str {
        self.composite.name()
    }

    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }
}

impl Value<'_> {
    /// Unsigned integer, or the raw value of an enum.
    pub fn as_unsigned(&self) -> Option<u64> {
        match self {
            Value::Unsigned(value) => Some(*value),
            Value::Enum(value) => Some(value.raw),
            _ => None,
        }
    }

    pub fn as_signed(&self) -> Option<i64> {
        match self {
            Value::Signed(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(bytes) => Some(bytes),
            Value::Composite(composite) => Some(composite.bytes),
            _ => None,
        }
    }

    pub fn variant(&self) -> Option<&str> {
        match self {
            Value::Enum(value) => value.variant,
            _ => None,
        }
    }
}

impl fmt::Display for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unsigned(value) => write!(f, "{value}"),
            Value::Signed(value) => write!(f, "{value}"),
            Value::Enum(EnumValue {
                variant: Some(variant),
                ..
            }) => f.write_str(variant),
            Value::Enum(EnumValue { raw, .. }) => write!(f, "{raw}"),
            Value::Bytes(bytes) => write!(f, "{} bytes", bytes.len()),
            Value::Composite(composite) => composite.composite.codec().format(composite.bytes, f),
        }
    }
}

fn field_range(field: &ResolvedField, data: &[u8]) -> Result<Range<usize>, ReadError> {
    let start = field.offset.eval(data)?;
    let len = field.size_expr.eval(data)?;
    let end = start.saturating_add(len);
    if end > data.len() {
        return Err(ReadError::OutOfBounds {
            start,
            end,
            len: data.len(),
        });
    }
    Ok(start..end)
}

fn read_integer(
    data: &[u8],
    offset: usize,
    primitive: Primitive,
) -> Result<Value<'static>, ReadError> {
    let raw = read_be(data, offset, primitive.width())?;
    if primitive.is_signed() {
        Ok(Value::Signed(sign_extend(raw, primitive.bits())))
    } else {
        Ok(Value::Unsigned(raw))
    }
}

fn enum_value(enumeration: &EnumType, raw: u64) -> Value<'_> {
    Value::Enum(EnumValue {
        raw,
        variant: enumeration.name_of(raw),
    })
}

impl LayoutPlan {
    /// Read-only view of `data`. Fails if `data` is shorter than [LayoutPlan::minimum_size].
    pub fn view<'a>(&'a self, data: &'a [u8]) -> Result<PacketView<'a>, ReadError> {
        self.check_len(data.len())?;
        Ok(PacketView { plan: self, data })
    }

    /// Mutable view of `data`. Fails if `data` is shorter than [LayoutPlan::minimum_size].
    pub fn view_mut<'a>(&'a self, data: &'a mut [u8]) -> Result<PacketViewMut<'a>, ReadError> {
        self.check_len(data.len())?;
        Ok(PacketViewMut { plan: self, data })
    }

    fn check_len(&self, actual: usize) -> Result<(), ReadError> {
        if actual < self.minimum_size {
            return Err(ReadError::PacketTooShort {
                expected: self.minimum_size,
                actual,
            });
        }
        Ok(())
    }

    fn lookup(&self, name: &str) -> Result<&ResolvedField, ReadError> {
        self.field(name)
            .ok_or_else(|| ReadError::UnknownField(name.to_string()))
    }

    fn alternate_plan(
        &self,
        union: &str,
        alternate: &str,
    ) -> Result<(&ResolvedField, &LayoutPlan), ReadError> {
        let field = self.lookup(union)?;
        let unknown = || ReadError::UnknownAlternate {
            union: union.to_string(),
            alternate: alternate.to_string(),
        };
        let plan = field
            .union()
            .and_then(|layout| layout.alternate(alternate))
            .map(|alternate| &alternate.plan)
            .ok_or_else(unknown)?;
        Ok((field, plan))
    }
}

/// Reads fields of one packet.
#[derive(Debug, Clone, Copy)]
pub struct PacketView<'a> {
    plan: &'a LayoutPlan,
    data: &'a [u8],
}

impl<'a> PacketView<'a> {
    pub fn plan(&self) -> &'a LayoutPlan {
        self.plan
    }

    /// The whole buffer.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Byte range a field occupies in this buffer. Bit-fields report their shared unit.
    pub fn range(&self, name: &str) -> Result<Range<usize>, ReadError> {
        field_range(self.plan.lookup(name)?, self.data)
    }

    /// Bytes a field occupies in this buffer.
    pub fn raw(&self, name: &str) -> Result<&'a [u8], ReadError> {
        let range = self.range(name)?;
        Ok(&self.data[range])
    }

    pub fn get(&self, name: &str) -> Result<Value<'a>, ReadError> {
        let field = self.plan.lookup(name)?;
        let provider = field.value_provider()?;
        let range = field_range(field, self.data)?;

        match provider {
            ValueProvider::Scalar(primitive) => read_integer(self.data, range.start, *primitive),
            ValueProvider::Enum {
                enumeration,
                backing,
            } => {
                let raw = read_be(self.data, range.start, backing.width())?;
                Ok(enum_value(enumeration, raw))
            }
            ValueProvider::BitField { slot, enumeration } => {
                let raw = slot.extract(read_be(self.data, range.start, slot.unit)?);
                Ok(match enumeration {
                    Some(enumeration) => enum_value(enumeration, raw),
                    None => Value::Unsigned(raw),
                })
            }
            ValueProvider::Composite(composite) => composite
                .codec()
                .construct(&self.data[range])
                .map(|bytes| Value::Composite(CompositeView { composite, bytes }))
                .ok_or_else(|| ReadError::Composite(composite.name().to_string())),
            ValueProvider::RawSlice => Ok(Value::Bytes(&self.data[range])),
        }
    }

    /// Views a union anchor's bytes through one of its alternates.
    pub fn alternate(&self, union: &str, alternate: &str) -> Result<PacketView<'a>, ReadError> {
        let (field, plan) = self.plan.alternate_plan(union, alternate)?;
        let range = field_range(field, self.data)?;
        plan.view(&self.data[range])
    }

    /// Sum of every field's size in this buffer.
    pub fn total_size(&self) -> Result<usize, ReadError> {
        self.plan.total_size.eval(self.data)
    }
}

/// Renders `Name: value; Payload: N bytes`. Union anchors are skipped.
impl fmt::Display for PacketView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for field in &self.plan.fields {
            if let FieldShape::Union(_) = field.shape {
                continue;
            }
            if !first {
                f.write_str("; ")?;
            }
            first = false;

            match self.get(&field.name) {
                Ok(value) => write!(f, "{}: {value}", field.name)?,
                Err(_) => write!(f, "{}: ?", field.name)?,
            }
        }
        Ok(())
    }
}

/// Reads and writes fields of one packet in place.
#[derive(Debug)]
pub struct PacketViewMut<'a> {
    plan: &'a LayoutPlan,
    data: &'a mut [u8],
}

impl<'a> PacketViewMut<'a> {
    pub fn as_view(&self) -> PacketView<'_> {
        PacketView {
            plan: self.plan,
            data: self.data,
        }
    }

    pub fn get(&self, name: &str) -> Result<Value<'_>, ReadError> {
        self.as_view().get(name)
    }

    /// Field, provider and range of a field that accepts writes.
    fn target(&self, name: &str) -> Result<(&'a ValueProvider, Range<usize>), WriteError> {
        let plan = self.plan;
        let field = plan.lookup(name)?;
        let leaf = field
            .leaf()
            .ok_or_else(|| field.union_access(UnionFacet::Value))?;
        if !leaf.writable {
            return Err(WriteError::ReadOnly(name.to_string()));
        }
        Ok((&leaf.provider, field_range(field, self.data)?))
    }

    /// Writes an unsigned value to an integer, enum or bit-field.
    ///
    /// Bit-fields are read-modify-written so sibling bits survive.
    pub fn set_unsigned(&mut self, name: &str, value: u64) -> Result<(), WriteError> {
        let (provider, range) = self.target(name)?;
        let invalid = || WriteError::InvalidValue(name.to_string());

        match provider {
            ValueProvider::Scalar(primitive) | ValueProvider::Enum { backing: primitive, .. } => {
                if value > primitive.max_raw() {
                    return Err(invalid());
                }
                write_be(self.data, range.start, primitive.width(), value)
            }
            ValueProvider::BitField { slot, .. } => {
                let unit = read_be(self.data, range.start, slot.unit)?;
                let unit = slot.insert(unit, value).ok_or_else(invalid)?;
                write_be(self.data, range.start, slot.unit, unit)
            }
            ValueProvider::Composite(_) | ValueProvider::RawSlice => {
                Err(WriteError::TypeMismatch(name.to_string()))
            }
        }
    }

    /// Writes a signed value. Non-negative values go to unsigned fields as-is.
    pub fn set_signed(&mut self, name: &str, value: i64) -> Result<(), WriteError> {
        let (provider, range) = self.target(name)?;

        match provider {
            ValueProvider::Scalar(primitive) if primitive.is_signed() => {
                let bits = primitive.bits() as u32;
                let min = i64::MIN >> (64 - bits);
                let max = i64::MAX >> (64 - bits);
                if value < min || value > max {
                    return Err(WriteError::InvalidValue(name.to_string()));
                }
                let raw = value as u64 & primitive.max_raw();
                write_be(self.data, range.start, primitive.width(), raw)
            }
            _ => {
                let value = u64::try_from(value)
                    .map_err(|_| WriteError::InvalidValue(name.to_string()))?;
                self.set_unsigned(name, value)
            }
        }
    }

    /// Writes an enum or enum bit-field by variant name.
    pub fn set_variant(&mut self, name: &str, variant: &str) -> Result<(), WriteError> {
        let (provider, _) = self.target(name)?;

        let enumeration = match provider {
            ValueProvider::Enum { enumeration, .. } => enumeration,
            ValueProvider::BitField {
                enumeration: Some(enumeration),
                ..
            } => enumeration,
            _ => return Err(WriteError::TypeMismatch(name.to_string())),
        };
        let raw = enumeration
            .value_of(variant)
            .ok_or_else(|| WriteError::InvalidValue(name.to_string()))?;
        self.set_unsigned(name, raw)
    }

    /// Copies `bytes` into a composite field through its codec.
    pub fn set_bytes(&mut self, name: &str, bytes: &[u8]) -> Result<(), WriteError> {
        let (provider, range) = self.target(name)?;

        match provider {
            ValueProvider::Composite(composite) => {
                if composite.codec().copy_into(bytes, &mut self.data[range]) {
                    Ok(())
                } else {
                    Err(WriteError::InvalidValue(name.to_string()))
                }
            }
            _ => Err(WriteError::TypeMismatch(name.to_string())),
        }
    }

    /// Mutable view of a union anchor's bytes through one of its alternates.
    pub fn alternate_mut(
        &mut self,
        union: &str,
        alternate: &str,
    ) -> Result<PacketViewMut<'_>, ReadError> {
        let (field, plan) = self.plan.alternate_plan(union, alternate)?;
        let range = field_range(field, self.data)?;
        plan.view_mut(&mut self.data[range])
    }
}
