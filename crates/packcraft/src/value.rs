//! Value provider resolution: how a field's bytes are read and written.

use crate::{
    bits::BitSlot,
    capability::CompositeRef,
    errors::SchemaError,
    field::FieldDescriptor,
    size::SizeProvider,
    types::{DeclaredType, EnumType, Primitive},
};

/// Read/write strategy of a leaf field.
///
/// Union anchors have no provider at all; see [crate::plan::FieldShape].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ValueProvider {
    /// Big-endian integer of the primitive's width.
    Scalar(Primitive),
    /// Integer of `backing` width mapped onto `enumeration`.
    Enum {
        enumeration: EnumType,
        backing: Primitive,
    },
    /// Masked bits of a shared unit, optionally mapped onto an enumeration.
    BitField {
        slot: BitSlot,
        enumeration: Option<EnumType>,
    },
    /// Host type built over the field's sub-range.
    Composite(CompositeRef),
    /// The addressed sub-range itself, read-only.
    RawSlice,
}

impl ValueProvider {
    /// Whether accessors may write through this provider at all.
    pub fn is_writable(&self) -> bool {
        !matches!(self, ValueProvider::RawSlice)
    }
}

/// Selects the provider for a standard field from its declared type and resolved size.
pub(crate) fn resolve_value(
    field: &FieldDescriptor,
    size: &SizeProvider,
    slot: Option<BitSlot>,
) -> Result<ValueProvider, SchemaError> {
    check_enum_backing(field)?;

    if let SizeProvider::BitWidth(_) = size {
        let enumeration = match &field.declared_type {
            DeclaredType::Enum(enumeration) => Some(enumeration.clone()),
            _ => None,
        };
        // The slot is always present for bit-widths; a missing one means placement failed upstream.
        return slot
            .map(|slot| ValueProvider::BitField { slot, enumeration })
            .ok_or_else(|| SchemaError::BitFieldType {
                type_name: field.declared_type.name(),
            });
    }

    match &field.declared_type {
        DeclaredType::Primitive(primitive) => {
            check_scalar_size(primitive.name(), primitive.width(), size)?;
            Ok(ValueProvider::Scalar(*primitive))
        }
        DeclaredType::Enum(enumeration) => {
            let backing = field.enum_backing.unwrap_or(enumeration.backing);
            check_scalar_size(&enumeration.name, backing.width(), size)?;
            Ok(ValueProvider::Enum {
                enumeration: enumeration.clone(),
                backing,
            })
        }
        DeclaredType::Composite(composite) => Ok(ValueProvider::Composite(composite.clone())),
        DeclaredType::Bytes | DeclaredType::ByteArray(_) => Ok(ValueProvider::RawSlice),
    }
}

fn check_enum_backing(field: &FieldDescriptor) -> Result<(), SchemaError> {
    let Some(requested) = field.enum_backing else {
        return Ok(());
    };

    match &field.declared_type {
        DeclaredType::Enum(enumeration) if requested.width() > enumeration.backing.width() => {
            Err(SchemaError::EnumBackingTooWide {
                requested: requested.name(),
                natural: enumeration.backing.name(),
            })
        }
        DeclaredType::Enum(_) => Ok(()),
        other => Err(SchemaError::EnumBackingOnNonEnum {
            type_name: other.name(),
        }),
    }
}

fn check_scalar_size(
    type_name: &str,
    width: usize,
    size: &SizeProvider,
) -> Result<(), SchemaError> {
    if size.is_dynamic() {
        return Err(SchemaError::DynamicScalar {
            type_name: type_name.to_string(),
        });
    }

    match size.fixed() {
        Some(actual) if actual != width => Err(SchemaError::ScalarSizeMismatch {
            type_name: type_name.to_string(),
            expected: width,
            actual,
        }),
        _ => Ok(()),
    }
}
