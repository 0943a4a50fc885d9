//! The resolved, immutable layout plan handed to accessor emitters.

use std::fmt;

use crate::{
    errors::{Diagnostic, InvalidUnionAccess, UnionFacet},
    expr::Expr,
    field::Accessibility,
    position::PositionProvider,
    size::SizeProvider,
    value::ValueProvider,
};

/// Every field's offset, size and read/write strategy for one schema.
///
/// A plan holds no buffer; it is pure layout metadata. Use
/// [LayoutPlan::view] to read a concrete packet through it.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct LayoutPlan {
    pub(crate) name: String,
    pub(crate) read_only: bool,
    pub(crate) fields: Vec<ResolvedField>,
    pub(crate) minimum_size: usize,
    pub(crate) total_size: Expr,
    #[cfg_attr(feature = "serde", serde(skip))]
    pub(crate) warnings: Vec<Diagnostic>,
}

impl LayoutPlan {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[ResolvedField] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&ResolvedField> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Buffer length required before any accessor may be invoked.
    pub fn minimum_size(&self) -> usize {
        self.minimum_size
    }

    /// Sum of all field sizes, including dynamic ones.
    pub fn total_size(&self) -> &Expr {
        &self.total_size
    }

    /// Diagnostics that were accepted instead of failing resolution.
    pub fn warnings(&self) -> &[Diagnostic] {
        &self.warnings
    }
}

/// One field of a [LayoutPlan].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ResolvedField {
    pub name: String,
    pub position: PositionProvider,
    pub offset: Expr,
    pub size: SizeProvider,
    /// Bytes spanned by the field; for bit-fields, the shared unit.
    pub size_expr: Expr,
    pub doc_lines: Vec<String>,
    pub shape: FieldShape,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum FieldShape {
    Leaf(LeafField),
    Union(UnionLayout),
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct LeafField {
    pub provider: ValueProvider,
    pub accessibility: Accessibility,
    /// False for read-only plans, read-only fields and raw slices.
    pub writable: bool,
}

/// Alternate interpretations sharing a union anchor's offset and size.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct UnionLayout {
    pub alternates: Vec<AlternatePlan>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct AlternatePlan {
    pub name: String,
    /// Offsets relative to the anchor.
    pub plan: LayoutPlan,
}

impl UnionLayout {
    pub fn alternate(&self, name: &str) -> Option<&AlternatePlan> {
        self.alternates.iter().find(|alternate| alternate.name == name)
    }
}

impl ResolvedField {
    pub fn is_union(&self) -> bool {
        matches!(self.shape, FieldShape::Union(_))
    }

    pub fn leaf(&self) -> Option<&LeafField> {
        match &self.shape {
            FieldShape::Leaf(leaf) => Some(leaf),
            FieldShape::Union(_) => None,
        }
    }

    pub fn union(&self) -> Option<&UnionLayout> {
        match &self.shape {
            FieldShape::Union(layout) => Some(layout),
            FieldShape::Leaf(_) => None,
        }
    }

    pub fn value_provider(&self) -> Result<&ValueProvider, InvalidUnionAccess> {
        self.leaf()
            .map(|leaf| &leaf.provider)
            .ok_or_else(|| self.union_access(UnionFacet::Value))
    }

    pub fn accessibility(&self) -> Result<Accessibility, InvalidUnionAccess> {
        self.leaf()
            .map(|leaf| leaf.accessibility)
            .ok_or_else(|| self.union_access(UnionFacet::Accessibility))
    }

    pub(crate) fn union_access(&self, facet: UnionFacet) -> InvalidUnionAccess {
        InvalidUnionAccess {
            field: self.name.clone(),
            facet,
        }
    }
}

impl fmt::Display for LayoutPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} (minimum {} bytes, total {})",
            self.name, self.minimum_size, self.total_size
        )?;
        for field in &self.fields {
            write!(f, "  {} @ {} [{}]", field.name, field.offset, field.size_expr)?;
            match &field.shape {
                FieldShape::Leaf(leaf) => match &leaf.provider {
                    ValueProvider::Scalar(primitive) => write!(f, " {}", primitive.name())?,
                    ValueProvider::Enum { enumeration, backing } => {
                        write!(f, " {} as {}", enumeration.name, backing.name())?
                    }
                    ValueProvider::BitField { slot, .. } => {
                        write!(f, " bits {:#x} >> {}", slot.unit_mask(), slot.shift)?
                    }
                    ValueProvider::Composite(composite) => write!(f, " {composite}")?,
                    ValueProvider::RawSlice => f.write_str(" bytes")?,
                },
                FieldShape::Union(layout) => {
                    let names: Vec<&str> = layout
                        .alternates
                        .iter()
                        .map(|alternate| alternate.name.as_str())
                        .collect();
                    write!(f, " union of {}", names.join(" | "))?;
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
