//! Size resolution: how many bytes each field spans.

use crate::{
    bits::BitSlot,
    capability::SizeFn,
    errors::{DiagnosticKind, LayoutError, SchemaError},
    expr::{Expr, Term},
    field::FieldDescriptor,
    types::DeclaredType,
};

/// The resolved size facet of a field.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum SizeProvider {
    /// Length of a fixed byte array.
    Constant(usize),
    /// Primitive width, enum backing width, or a composite's `Size` constant.
    Intrinsic(usize),
    /// Byte count declared on the field.
    External(usize),
    /// Length computed from the buffer.
    Computed(SizeFn),
    /// Bits inside a unit shared with sibling bit-fields.
    BitWidth(u8),
    /// Everything from the field's offset to the end of the buffer.
    Remainder,
}

impl SizeProvider {
    /// Byte count known without a buffer. Bit-fields report none; their unit is counted per group.
    pub fn fixed(&self) -> Option<usize> {
        match self {
            SizeProvider::Constant(size)
            | SizeProvider::Intrinsic(size)
            | SizeProvider::External(size) => Some(*size),
            SizeProvider::Computed(_) | SizeProvider::BitWidth(_) | SizeProvider::Remainder => None,
        }
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, SizeProvider::Computed(_) | SizeProvider::Remainder)
    }

    /// Size expression of a field placed at `offset`.
    pub(crate) fn expr(&self, field: &str, offset: &Expr, slot: Option<&BitSlot>) -> Expr {
        match self {
            SizeProvider::Constant(size)
            | SizeProvider::Intrinsic(size)
            | SizeProvider::External(size) => Expr::literal(*size),
            SizeProvider::Computed(function) => Expr::term(Term::SizeOf {
                field: field.to_string(),
                function: function.clone(),
            }),
            SizeProvider::BitWidth(_) => Expr::literal(slot.map_or(0, |slot| slot.unit)),
            SizeProvider::Remainder => Expr::term(Term::Remaining {
                from: Box::new(offset.clone()),
            }),
        }
    }
}

/// Picks the size of one field.
///
/// Priority: bit width, size function, explicit size, intrinsic type size, remainder.
/// Only local checks happen here; whether a remainder is last is decided by the validator.
pub(crate) fn resolve_size(field: &FieldDescriptor) -> Result<SizeProvider, DiagnosticKind> {
    let explicit = field.bits.is_some() || field.size_function.is_some() || field.size.is_some();
    if field.remainder && explicit {
        return Err(LayoutError::ConflictingRemainder.into());
    }

    if let Some(width) = field.bits {
        if field.is_union() {
            return Err(SchemaError::UnionBitField.into());
        }
        let integer = field
            .effective_integer()
            .ok_or_else(|| SchemaError::BitFieldType {
                type_name: field.declared_type.name(),
            })?;
        if width == 0 || width as usize > integer.bits() {
            return Err(SchemaError::InvalidBitWidth {
                width,
                max: integer.bits(),
            }
            .into());
        }
        return Ok(SizeProvider::BitWidth(width));
    }

    if let Some(function) = &field.size_function {
        return Ok(SizeProvider::Computed(function.clone()));
    }

    if let Some(size) = field.size {
        return Ok(SizeProvider::External(size));
    }

    if field.remainder {
        return match field.declared_type {
            DeclaredType::Bytes => Ok(SizeProvider::Remainder),
            _ => Err(SchemaError::RemainderType {
                type_name: field.declared_type.name(),
            }
            .into()),
        };
    }

    match &field.declared_type {
        DeclaredType::ByteArray(len) => Ok(SizeProvider::Constant(*len)),
        DeclaredType::Bytes => Ok(SizeProvider::Remainder),
        DeclaredType::Enum(_) => field
            .effective_integer()
            .map(|backing| SizeProvider::Intrinsic(backing.width()))
            .ok_or_else(|| ambiguous(field)),
        other => other
            .intrinsic_size()
            .map(SizeProvider::Intrinsic)
            .ok_or_else(|| ambiguous(field)),
    }
}

fn ambiguous(field: &FieldDescriptor) -> DiagnosticKind {
    SchemaError::AmbiguousSize {
        type_name: field.declared_type.name(),
    }
    .into()
}
