//! Schema: ordered field descriptors resolved into a [LayoutPlan].

use std::collections::BTreeSet;

use tracing::{debug, debug_span, trace};

use crate::{
    config::ResolveConfig,
    errors::{Diagnostic, ResolveError, SchemaError},
    field::{FieldDescriptor, FieldKind},
    plan::{FieldShape, LayoutPlan, LeafField, ResolvedField},
    position::PositionResolver,
    size::resolve_size,
    union::resolve_union,
    validate::{PendingField, validate},
    value::resolve_value,
};

/// A named, ordered list of fields. Use [Schema::resolve] to build its [LayoutPlan].
#[derive(Debug, Clone)]
pub struct Schema {
    pub name: String,
    /// Plans of read-only schemas reject every write.
    pub read_only: bool,
    /// Fields in wire order.
    pub fields: Vec<FieldDescriptor>,
}

impl Schema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            read_only: false,
            fields: Vec::new(),
        }
    }

    /// Appends a field; builder style.
    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Resolves with the default [ResolveConfig].
    pub fn resolve(&self) -> Result<LayoutPlan, ResolveError> {
        self.resolve_with(&ResolveConfig::default())
    }

    /// Resolves every field and validates the whole layout.
    ///
    /// All defects are collected; a failing schema yields one [ResolveError]
    /// listing every offending field. Resolution is deterministic: the same
    /// schema always produces the same plan.
    pub fn resolve_with(&self, config: &ResolveConfig) -> Result<LayoutPlan, ResolveError> {
        let span = debug_span!("resolve", schema = %self.name);
        let _enter = span.enter();

        match resolve_fields(&self.name, &self.fields, self.read_only, config) {
            Ok(plan) => {
                debug!(
                    fields = plan.fields.len(),
                    minimum_size = plan.minimum_size,
                    warnings = plan.warnings.len(),
                    "schema resolved"
                );
                Ok(plan)
            }
            Err(diagnostics) => {
                debug!(diagnostics = diagnostics.len(), "schema failed to resolve");
                Err(ResolveError {
                    schema: self.name.clone(),
                    diagnostics,
                })
            }
        }
    }
}

/// Resolves one field list, shared by top-level schemas and union alternates.
pub(crate) fn resolve_fields(
    name: &str,
    fields: &[FieldDescriptor],
    read_only: bool,
    config: &ResolveConfig,
) -> Result<LayoutPlan, Vec<Diagnostic>> {
    let mut diagnostics = check_names(fields);
    let mut warnings = Vec::new();
    let mut positions = PositionResolver::new();

    // Sizes and positions first; bit slots are final only once every unit is closed.
    let placed: Vec<_> = fields
        .iter()
        .map(|field| {
            let size = resolve_size(field);
            let placement = positions.place(field, size.as_ref().ok());
            (size, placement)
        })
        .collect();
    let units = positions.finish();

    let mut pending = Vec::with_capacity(fields.len());
    for (source, (field, (size, placement))) in fields.iter().zip(placed).enumerate() {
        let size = match size {
            Ok(size) => size,
            Err(kind) => {
                diagnostics.push(Diagnostic::new(&field.name, kind));
                continue;
            }
        };
        let slot = placement.slot.map(|member| units.slot(member));
        let size_expr = size.expr(&field.name, &placement.offset, slot.as_ref());

        let shape = match &field.kind {
            FieldKind::Standard => match resolve_value(field, &size, slot) {
                Ok(provider) => FieldShape::Leaf(LeafField {
                    writable: !read_only && !field.read_only && provider.is_writable(),
                    accessibility: field.accessibility.unwrap_or_default(),
                    provider,
                }),
                Err(err) => {
                    diagnostics.push(Diagnostic::new(&field.name, err));
                    continue;
                }
            },
            FieldKind::UnionAnchor(alternates) => {
                if field.accessibility.is_some() {
                    diagnostics.push(Diagnostic::new(&field.name, SchemaError::UnionAccessibility));
                }
                if field.enum_backing.is_some() {
                    diagnostics.push(Diagnostic::new(
                        &field.name,
                        SchemaError::EnumBackingOnNonEnum {
                            type_name: field.declared_type.name(),
                        },
                    ));
                }
                let read_only = read_only || field.read_only;
                match resolve_union(&field.name, &size, alternates, read_only, config) {
                    Ok(layout) => {
                        for alternate in &layout.alternates {
                            let path = format!("{}.{}", field.name, alternate.name);
                            warnings.extend(
                                alternate
                                    .plan
                                    .warnings
                                    .iter()
                                    .map(|warning| warning.clone().nested(&path)),
                            );
                        }
                        FieldShape::Union(layout)
                    }
                    Err(errors) => {
                        diagnostics.extend(errors);
                        continue;
                    }
                }
            }
        };

        trace!(
            field = %field.name,
            offset = %placement.offset,
            size = %size_expr,
            "field resolved"
        );
        pending.push(PendingField {
            field: ResolvedField {
                name: field.name.clone(),
                position: field.position.clone(),
                offset: placement.offset,
                size,
                size_expr,
                doc_lines: field.doc_lines.clone(),
                shape,
            },
            predicted: placement.predicted,
            source,
        });
    }

    let validation = validate(&pending, fields.len(), config);
    diagnostics.extend(validation.errors);
    if !diagnostics.is_empty() {
        return Err(diagnostics);
    }
    warnings.extend(validation.warnings);

    Ok(LayoutPlan {
        name: name.to_string(),
        read_only,
        fields: pending.into_iter().map(|entry| entry.field).collect(),
        minimum_size: validation.minimum_size,
        total_size: validation.total_size,
        warnings,
    })
}

fn check_names(fields: &[FieldDescriptor]) -> Vec<Diagnostic> {
    let mut seen = BTreeSet::new();
    fields
        .iter()
        .filter(|field| field.name.is_empty() || !seen.insert(field.name.as_str()))
        .map(|field| Diagnostic::new(&field.name, SchemaError::InvalidFieldName))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        capability::{ByteArrayCodec, CompositeRef, SizeFn},
        config::MismatchPolicy,
        errors::{DiagnosticKind, LayoutError},
        expr::Expr,
        field::{Accessibility, Alternate},
        size::SizeProvider,
        types::{DeclaredType, EnumType, Primitive},
        value::ValueProvider,
    };

    fn icmp_echo() -> Schema {
        Schema::new("IcmpEcho")
            .field(FieldDescriptor::new("Type", Primitive::U8))
            .field(FieldDescriptor::new("Code", Primitive::U8))
            .field(FieldDescriptor::new("Checksum", Primitive::U16))
            .field(FieldDescriptor::new("Identifier", Primitive::U16))
            .field(FieldDescriptor::new("Sequence", Primitive::U16))
            .field(FieldDescriptor::new("Payload", DeclaredType::Bytes))
    }

    #[test]
    fn test_resolve_empty() {
        let plan = Schema::new("Empty").resolve().unwrap();
        assert_eq!(plan.fields().len(), 0);
        assert_eq!(plan.minimum_size(), 0);
        assert_eq!(plan.total_size(), &Expr::zero());
    }

    #[test]
    fn test_icmp_minimum_size() {
        let plan = icmp_echo().resolve().unwrap();

        assert_eq!(plan.minimum_size(), 8);
        assert_eq!(plan.field("Payload").unwrap().offset, Expr::literal(8));
        assert_eq!(plan.field("Payload").unwrap().size, SizeProvider::Remainder);
        assert_eq!(plan.total_size().to_string(), "8 + len(buf) - (8)");
        assert_eq!(plan.total_size().eval(&[0; 12]).unwrap(), 12);
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let schema = icmp_echo();
        assert_eq!(schema.resolve().unwrap(), schema.resolve().unwrap());
    }

    #[test]
    fn test_failures_are_aggregated() {
        let address = CompositeRef::new("Address", ByteArrayCodec::dynamic());
        let schema = Schema::new("Broken")
            .field(FieldDescriptor::new("Payload", DeclaredType::Bytes))
            .field(FieldDescriptor::new("Source", address))
            .field(FieldDescriptor::new("Flags", Primitive::U8).bits(9));

        let err = schema.resolve().unwrap_err();
        assert_eq!(err.schema, "Broken");
        assert_eq!(
            err.fields().collect::<Vec<_>>(),
            vec!["Source", "Flags", "Payload"]
        );
        assert!(err.has_layout_error());
        assert!(err.has_schema_error());
    }

    #[test]
    fn test_unknown_size_suppresses_later_mismatches() {
        let address = CompositeRef::new("Address", ByteArrayCodec::dynamic());
        let schema = Schema::new("Broken")
            .field(FieldDescriptor::new("Type", Primitive::U8))
            .field(FieldDescriptor::new("Source", address))
            .field(FieldDescriptor::new("Next", Primitive::U8))
            .field(FieldDescriptor::new("Check", Primitive::U8).at(8));

        assert_eq!(
            schema.resolve().unwrap_err().diagnostics,
            vec![Diagnostic::new(
                "Source",
                SchemaError::AmbiguousSize {
                    type_name: "Address".to_string()
                }
            )]
        );
    }

    #[test]
    fn test_overfull_bit_unit() {
        let schema = Schema::new("Packed")
            .field(FieldDescriptor::new("High", Primitive::U8).bits(5))
            .field(FieldDescriptor::new("Low", Primitive::U8).bits(4))
            .field(FieldDescriptor::new("Next", Primitive::U8));

        assert_eq!(
            schema.resolve().unwrap_err().diagnostics,
            vec![Diagnostic::new(
                "Low",
                LayoutError::BitOverflow {
                    fields: vec!["High".to_string(), "Low".to_string()],
                    bits: 9,
                    capacity: 8
                }
            )]
        );
    }

    #[test]
    fn test_mixed_width_bit_unit() {
        let flags = EnumType::new("FragmentFlags", Primitive::U8).variant("MoreFragments", 1);
        let schema = Schema::new("Fragment")
            .field(FieldDescriptor::new("Flags", flags).bits(3))
            .field(FieldDescriptor::new("Offset", Primitive::U16).bits(13))
            .field(FieldDescriptor::new("Ttl", Primitive::U8));

        let plan = schema.resolve().unwrap();
        assert_eq!(plan.minimum_size(), 3);
        assert_eq!(plan.field("Ttl").unwrap().offset, Expr::literal(2));
        assert_eq!(
            plan.to_string(),
            "Fragment (minimum 3 bytes, total 3)\n  Flags @ 0 [2] bits 0xe000 >> 13\n  Offset @ 0 [2] bits 0x1fff >> 0\n  Ttl @ 2 [1] u8\n"
        );
    }

    #[test]
    fn test_moving_remainder_last_fixes_schema() {
        let broken = Schema::new("Packet")
            .field(FieldDescriptor::new("Payload", DeclaredType::Bytes))
            .field(FieldDescriptor::new("Checksum", Primitive::U16));
        let err = broken.resolve().unwrap_err();
        assert_eq!(
            err.diagnostics,
            vec![Diagnostic::new("Payload", LayoutError::RemainderNotLast)]
        );

        let fixed = Schema::new("Packet")
            .field(FieldDescriptor::new("Checksum", Primitive::U16))
            .field(FieldDescriptor::new("Payload", DeclaredType::Bytes));
        assert_eq!(fixed.resolve().unwrap().minimum_size(), 2);
    }

    #[test]
    fn test_duplicate_names() {
        let schema = Schema::new("Packet")
            .field(FieldDescriptor::new("Type", Primitive::U8))
            .field(FieldDescriptor::new("Type", Primitive::U8));

        assert_eq!(
            schema.resolve().unwrap_err().diagnostics,
            vec![Diagnostic::new("Type", SchemaError::InvalidFieldName)]
        );
    }

    #[test]
    fn test_position_mismatch_warn_keeps_literal() {
        let schema = Schema::new("Packet")
            .field(FieldDescriptor::new("Type", Primitive::U8))
            .field(FieldDescriptor::new("Value", Primitive::U16).at(6));

        let err = schema.resolve().unwrap_err();
        assert_eq!(
            err.diagnostics[0].kind,
            DiagnosticKind::Layout(LayoutError::PositionMismatch {
                expected: 1,
                actual: 6
            })
        );

        let mut config = ResolveConfig::new();
        config.set_position_mismatch(MismatchPolicy::Warn);
        let plan = schema.resolve_with(&config).unwrap();
        assert_eq!(plan.field("Value").unwrap().offset, Expr::literal(6));
        assert_eq!(plan.warnings().len(), 1);
        assert_eq!(plan.minimum_size(), 8);
    }

    #[test]
    fn test_literal_after_computed_size_is_accepted() {
        let options = SizeFn::new("options_size", |_: &[u8]| 0);
        let schema = Schema::new("Packet")
            .field(FieldDescriptor::new("Options", DeclaredType::Bytes).size_fn(options))
            .field(FieldDescriptor::new("Marker", Primitive::U8).at(0));

        assert!(schema.resolve().is_ok());
    }

    #[test]
    fn test_union_anchor_shape() {
        let schema = Schema::new("Icmp")
            .field(FieldDescriptor::new("Type", Primitive::U8))
            .field(
                FieldDescriptor::union(
                    "Rest",
                    vec![Alternate::new(
                        "Mask",
                        vec![FieldDescriptor::new("Mask", Primitive::U32)],
                    )],
                )
                .sized(4),
            );

        let plan = schema.resolve().unwrap();
        let rest = plan.field("Rest").unwrap();
        assert!(rest.is_union());
        assert!(rest.value_provider().is_err());
        assert!(rest.accessibility().is_err());
        assert_eq!(plan.minimum_size(), 5);
    }

    #[test]
    fn test_union_anchor_rejects_accessibility() {
        let schema = Schema::new("Icmp").field(
            FieldDescriptor::union(
                "Rest",
                vec![Alternate::new("Mask", vec![FieldDescriptor::new("Mask", Primitive::U32)])],
            )
            .sized(4)
            .private(),
        );

        assert_eq!(
            schema.resolve().unwrap_err().diagnostics,
            vec![Diagnostic::new("Rest", SchemaError::UnionAccessibility)]
        );
    }

    #[test]
    fn test_union_anchor_rejects_bits_and_enum_backing() {
        let mask = || Alternate::new("Mask", vec![FieldDescriptor::new("Mask", Primitive::U32)]);

        let packed =
            Schema::new("Icmp").field(FieldDescriptor::union("Rest", vec![mask()]).bits(4));
        assert_eq!(
            packed.resolve().unwrap_err().diagnostics,
            vec![Diagnostic::new("Rest", SchemaError::UnionBitField)]
        );

        let backed = Schema::new("Icmp").field(
            FieldDescriptor::union("Rest", vec![mask()])
                .sized(4)
                .enum_backing(Primitive::U8),
        );
        assert_eq!(
            backed.resolve().unwrap_err().diagnostics,
            vec![Diagnostic::new(
                "Rest",
                SchemaError::EnumBackingOnNonEnum {
                    type_name: "bytes".to_string()
                }
            )]
        );
    }

    #[test]
    fn test_writability_and_accessibility() {
        let schema = Schema::new("Packet")
            .field(FieldDescriptor::new("Type", Primitive::U8).accessibility(Accessibility::Crate))
            .field(FieldDescriptor::new("Code", Primitive::U8).read_only())
            .field(FieldDescriptor::new("Payload", DeclaredType::Bytes));

        let plan = schema.resolve().unwrap();
        let leaf = plan.field("Type").unwrap().leaf().unwrap();
        assert_eq!(leaf.accessibility, Accessibility::Crate);
        assert!(leaf.writable);
        assert!(!plan.field("Code").unwrap().leaf().unwrap().writable);
        assert!(!plan.field("Payload").unwrap().leaf().unwrap().writable);

        let read_only = schema.read_only().resolve().unwrap();
        assert!(read_only.is_read_only());
        assert!(!read_only.field("Type").unwrap().leaf().unwrap().writable);
    }

    #[test]
    fn test_display_summary() {
        let schema = Schema::new("Ipv4Start")
            .field(FieldDescriptor::new("Version", Primitive::U8).bits(4))
            .field(FieldDescriptor::new("Ihl", Primitive::U8).bits(4))
            .field(FieldDescriptor::new("Length", Primitive::U16));

        let plan = schema.resolve().unwrap();
        assert!(matches!(
            plan.field("Ihl").unwrap().value_provider(),
            Ok(ValueProvider::BitField { .. })
        ));
        assert_eq!(
            plan.to_string(),
            "Ipv4Start (minimum 3 bytes, total 3)\n  Version @ 0 [1] bits 0xf0 >> 4\n  Ihl @ 0 [1] bits 0xf >> 0\n  Length @ 1 [2] u16\n"
        );
    }
}
