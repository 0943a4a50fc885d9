//! Error types for schema resolution and accessor evaluation.

use std::fmt;

use thiserror::Error;

/// Defects of a single field that are visible without looking at its neighbours.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// The declared type has no intrinsic size and the field carries no size override.
    #[error("type `{type_name}` has no intrinsic size and no explicit size")]
    AmbiguousSize {
        /// Name of the declared type
        type_name: String,
    },

    /// Bit width is zero or wider than the declared type.
    #[error("bit width {width} is outside 1..={max}")]
    InvalidBitWidth {
        /// Requested width
        width: u8,
        /// Widest width the declared type allows
        max: usize,
    },

    /// Bit-fields are only defined over integer and enum types.
    #[error("bit-fields require an integer or enum type, found `{type_name}`")]
    BitFieldType {
        /// Name of the declared type
        type_name: String,
    },

    /// A fixed-width scalar was given a byte count it cannot hold.
    #[error("`{type_name}` is {expected} bytes wide but the field is sized {actual}")]
    ScalarSizeMismatch {
        /// Name of the declared type
        type_name: String,
        /// Width of the type
        expected: usize,
        /// Size given by the override
        actual: usize,
    },

    /// A fixed-width scalar was given a size that is only known at runtime.
    #[error("`{type_name}` needs a fixed size")]
    DynamicScalar {
        /// Name of the declared type
        type_name: String,
    },

    /// Remainder sizing was requested for something that is not a byte range.
    #[error("remainder size requires a byte range type, found `{type_name}`")]
    RemainderType {
        /// Name of the declared type
        type_name: String,
    },

    /// The enum backing override is wider than the enum itself.
    #[error("enum backing `{requested}` is wider than the natural `{natural}`")]
    EnumBackingTooWide {
        /// Override from the schema
        requested: &'static str,
        /// Natural backing of the enum
        natural: &'static str,
    },

    /// An enum backing override was attached to a non-enum field.
    #[error("enum backing override on non-enum type `{type_name}`")]
    EnumBackingOnNonEnum {
        /// Name of the declared type
        type_name: String,
    },

    /// Union anchors carry no accessibility of their own.
    #[error("union anchors do not carry accessibility")]
    UnionAccessibility,

    /// Union anchors cannot be packed into a bit-field unit.
    #[error("union anchors cannot be bit-fields")]
    UnionBitField,

    /// A union anchor without any alternate interpretation.
    #[error("union anchor declares no alternates")]
    EmptyUnion,

    /// Field name is empty or repeated within one schema.
    #[error("field name is empty or duplicated")]
    InvalidFieldName,

    /// A named capability was not found in the registry.
    #[error("unknown {kind} `{name}`")]
    UnknownCapability {
        /// Capability category
        kind: &'static str,
        /// Name used by the schema
        name: String,
    },
}

/// Inconsistencies that only emerge once the whole ordered field list is resolved.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    /// A remainder-sized field has successors.
    #[error("remainder field is not the last field")]
    RemainderNotLast,

    /// A remainder request also carries an explicit size.
    #[error("remainder field conflicts with an explicit size")]
    ConflictingRemainder,

    /// Sibling bit-fields need more bits than their shared unit holds.
    #[error("bit-fields {fields:?} need {bits} bits but the unit holds {capacity}")]
    BitOverflow {
        /// Every member of the overflowing group
        fields: Vec<String>,
        /// Accumulated width
        bits: u32,
        /// Capacity of the unit
        capacity: u32,
    },

    /// An explicit position disagrees with the position implied by the predecessors.
    #[error("explicit position {actual} disagrees with sequential position {expected}")]
    PositionMismatch {
        /// Position implied by summing predecessor sizes
        expected: usize,
        /// Position given by the schema
        actual: usize,
    },

    /// A union alternate does not fit inside its anchor.
    #[error("alternate `{alternate}` needs {required} bytes but the anchor holds {available}")]
    AlternateTooLarge {
        /// Name of the alternate
        alternate: String,
        /// Minimum size of the alternate
        required: usize,
        /// Static size of the anchor
        available: usize,
    },
}

/// The facet of a union anchor that was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnionFacet {
    Value,
    Accessibility,
}

impl fmt::Display for UnionFacet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnionFacet::Value => f.write_str("value"),
            UnionFacet::Accessibility => f.write_str("accessibility"),
        }
    }
}

/// Attempt to read a union anchor as if it were a leaf field.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("union `{field}` has no directly readable {facet}")]
pub struct InvalidUnionAccess {
    /// Name of the union anchor
    pub field: String,
    /// What was asked for
    pub facet: UnionFacet,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticKind {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Layout(#[from] LayoutError),
}

/// One defect attributed to a field. Fields inside union alternates use a dotted path.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{field}: {kind}")]
pub struct Diagnostic {
    pub field: String,
    pub kind: DiagnosticKind,
}

impl Diagnostic {
    pub fn new(field: impl Into<String>, kind: impl Into<DiagnosticKind>) -> Self {
        Self {
            field: field.into(),
            kind: kind.into(),
        }
    }

    /// Re-roots the diagnostic under `prefix`.
    pub(crate) fn nested(mut self, prefix: &str) -> Self {
        self.field = format!("{prefix}.{}", self.field);
        self
    }
}

/// Every defect found while resolving one schema.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error(
    "schema `{schema}` failed to resolve with {count} diagnostic(s)",
    count = .diagnostics.len()
)]
pub struct ResolveError {
    pub schema: String,
    pub diagnostics: Vec<Diagnostic>,
}

impl ResolveError {
    /// Names of the offending fields, in report order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.diagnostics.iter().map(|d| d.field.as_str())
    }

    /// Returns true if some diagnostic is a [LayoutError].
    pub fn has_layout_error(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| matches!(d.kind, DiagnosticKind::Layout(_)))
    }

    /// Returns true if some diagnostic is a [SchemaError].
    pub fn has_schema_error(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| matches!(d.kind, DiagnosticKind::Schema(_)))
    }
}

/// Errors produced when reading through a [crate::view::PacketView].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReadError {
    /// Input is shorter than the plan's minimum size.
    #[error("packet too short: expected at least {expected} bytes, got {actual}")]
    PacketTooShort { expected: usize, actual: usize },

    /// A resolved range reaches past the end of the buffer.
    #[error("range {start}..{end} is outside a buffer of {len} bytes")]
    OutOfBounds { start: usize, end: usize, len: usize },

    #[error("no field named `{0}`")]
    UnknownField(String),

    #[error("union `{union}` has no alternate `{alternate}`")]
    UnknownAlternate { union: String, alternate: String },

    #[error(transparent)]
    InvalidUnionAccess(#[from] InvalidUnionAccess),

    /// A composite rejected the bytes it was constructed from.
    #[error("composite `{0}` rejected its byte range")]
    Composite(String),
}

/// Errors produced when writing through a [crate::view::PacketViewMut].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WriteError {
    /// Buffer is too short to write the value.
    #[error("write outside the buffer")]
    OutOfBounds,

    /// Value does not fit the field.
    #[error("value does not fit field `{0}`")]
    InvalidValue(String),

    /// The field or the whole plan is read-only.
    #[error("field `{0}` is read-only")]
    ReadOnly(String),

    #[error("no field named `{0}`")]
    MissingField(String),

    /// Value kind is not accepted by the field's provider.
    #[error("field `{0}` cannot store this kind of value")]
    TypeMismatch(String),

    #[error(transparent)]
    InvalidUnionAccess(#[from] InvalidUnionAccess),

    /// Locating or reading the field's bytes failed before the write.
    #[error(transparent)]
    Read(ReadError),
}

impl From<ReadError> for WriteError {
    fn from(value: ReadError) -> Self {
        match value {
            ReadError::UnknownField(name) => WriteError::MissingField(name),
            ReadError::InvalidUnionAccess(err) => WriteError::InvalidUnionAccess(err),
            other => WriteError::Read(other),
        }
    }
}
