//! Union resolution: alternate interpretations of one anchor's bytes.

use std::collections::BTreeSet;

use tracing::trace;

use crate::{
    config::ResolveConfig,
    errors::{Diagnostic, LayoutError, SchemaError},
    field::Alternate,
    plan::{AlternatePlan, UnionLayout},
    schema::resolve_fields,
    size::SizeProvider,
};

/// Resolves every alternate of `anchor` as its own schema, offsets relative to the anchor.
///
/// Diagnostics from inside an alternate come back as `anchor.alternate.field`.
pub(crate) fn resolve_union(
    anchor: &str,
    size: &SizeProvider,
    alternates: &[Alternate],
    read_only: bool,
    config: &ResolveConfig,
) -> Result<UnionLayout, Vec<Diagnostic>> {
    if alternates.is_empty() {
        return Err(vec![Diagnostic::new(anchor, SchemaError::EmptyUnion)]);
    }

    let mut layout = UnionLayout::default();
    let mut diagnostics = Vec::new();
    let mut seen = BTreeSet::new();

    for alternate in alternates {
        let path = format!("{anchor}.{}", alternate.name);
        if alternate.name.is_empty() || !seen.insert(alternate.name.as_str()) {
            diagnostics.push(Diagnostic::new(path, SchemaError::InvalidFieldName));
            continue;
        }

        let plan = match resolve_fields(&alternate.name, &alternate.fields, read_only, config) {
            Ok(plan) => plan,
            Err(errors) => {
                diagnostics.extend(errors.into_iter().map(|diagnostic| diagnostic.nested(&path)));
                continue;
            }
        };

        // Dynamic anchors are checked against the buffer at access time.
        if let Some(available) = size.fixed() {
            if plan.minimum_size > available {
                diagnostics.push(Diagnostic::new(
                    anchor,
                    LayoutError::AlternateTooLarge {
                        alternate: alternate.name.clone(),
                        required: plan.minimum_size,
                        available,
                    },
                ));
                continue;
            }
        }

        trace!(
            union = anchor,
            alternate = %alternate.name,
            minimum_size = plan.minimum_size,
            "alternate resolved"
        );
        layout.alternates.push(AlternatePlan {
            name: alternate.name.clone(),
            plan,
        });
    }

    if diagnostics.is_empty() {
        Ok(layout)
    } else {
        Err(diagnostics)
    }
}
