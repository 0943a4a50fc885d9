//! Field descriptors: the ordered input a [crate::schema::Schema] is built from.

use crate::{
    capability::{PositionFn, SizeFn},
    position::PositionProvider,
    types::{DeclaredType, Primitive},
};

/// Visibility the emitted accessor should have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Accessibility {
    #[default]
    Public,
    Crate,
    Private,
}

/// A single named field of a schema.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub name: String,
    pub declared_type: DeclaredType,
    pub doc_lines: Vec<String>,
    /// `None` means the default (public). Union anchors must leave this unset.
    pub accessibility: Option<Accessibility>,
    /// Disables writes through this field even in a mutable plan.
    pub read_only: bool,
    pub position: PositionProvider,
    /// Explicit byte count for types without a static size.
    pub size: Option<usize>,
    /// Size computed from the buffer at access time.
    pub size_function: Option<SizeFn>,
    /// Width in bits when the field shares a unit with sibling bit-fields.
    pub bits: Option<u8>,
    /// Explicitly request the rest of the buffer.
    pub remainder: bool,
    /// Narrower backing for an enum-typed field.
    pub enum_backing: Option<Primitive>,
    pub kind: FieldKind,
}

/// Leaf field or union anchor.
#[derive(Debug, Clone)]
pub enum FieldKind {
    Standard,
    /// Carries shared geometry for alternate interpretations of the same bytes.
    UnionAnchor(Vec<Alternate>),
}

/// One interpretation of a union anchor's bytes, laid out from the anchor's offset.
#[derive(Debug, Clone)]
pub struct Alternate {
    pub name: String,
    pub fields: Vec<FieldDescriptor>,
}

impl Alternate {
    pub fn new(name: impl Into<String>, fields: Vec<FieldDescriptor>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, declared_type: impl Into<DeclaredType>) -> Self {
        Self {
            name: name.into(),
            declared_type: declared_type.into(),
            doc_lines: Vec::new(),
            accessibility: None,
            read_only: false,
            position: PositionProvider::Sequential,
            size: None,
            size_function: None,
            bits: None,
            remainder: false,
            enum_backing: None,
            kind: FieldKind::Standard,
        }
    }

    /// A union anchor over an untyped byte range.
    pub fn union(name: impl Into<String>, alternates: Vec<Alternate>) -> Self {
        Self {
            kind: FieldKind::UnionAnchor(alternates),
            ..Self::new(name, DeclaredType::Bytes)
        }
    }

    pub fn doc(mut self, line: impl Into<String>) -> Self {
        self.doc_lines.push(line.into());
        self
    }

    pub fn at(mut self, offset: usize) -> Self {
        self.position = PositionProvider::Literal(offset);
        self
    }

    pub fn position_fn(mut self, function: PositionFn) -> Self {
        self.position = PositionProvider::Computed(function);
        self
    }

    pub fn sized(mut self, size: usize) -> Self {
        self.size = Some(size);
        self
    }

    pub fn size_fn(mut self, function: SizeFn) -> Self {
        self.size_function = Some(function);
        self
    }

    pub fn bits(mut self, width: u8) -> Self {
        self.bits = Some(width);
        self
    }

    pub fn remainder(mut self) -> Self {
        self.remainder = true;
        self
    }

    pub fn enum_backing(mut self, backing: Primitive) -> Self {
        self.enum_backing = Some(backing);
        self
    }

    pub fn accessibility(mut self, accessibility: Accessibility) -> Self {
        self.accessibility = Some(accessibility);
        self
    }

    pub fn private(self) -> Self {
        self.accessibility(Accessibility::Private)
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn is_union(&self) -> bool {
        matches!(self.kind, FieldKind::UnionAnchor(_))
    }

    /// Integer type that sizes a bit-field unit or an enum value, honoring the backing override.
    pub(crate) fn effective_integer(&self) -> Option<Primitive> {
        match &self.declared_type {
            DeclaredType::Enum(_) => self.enum_backing.or(self.declared_type.integer()),
            other => other.integer(),
        }
    }
}
