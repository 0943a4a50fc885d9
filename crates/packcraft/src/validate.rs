//! Whole-schema consistency pass run after every field is resolved.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{trace, warn};

use crate::{
    bits::BitSlot,
    config::{MismatchPolicy, ResolveConfig},
    errors::{Diagnostic, LayoutError},
    expr::Expr,
    plan::{FieldShape, ResolvedField},
    position::PositionProvider,
    size::SizeProvider,
    value::ValueProvider,
};

/// A resolved field plus what the validator needs to know about how it got there.
#[derive(Debug, Clone)]
pub(crate) struct PendingField {
    pub field: ResolvedField,
    /// Offset implied by the predecessors, if it could be computed.
    pub predicted: Option<Expr>,
    /// Index of the field in the schema.
    pub source: usize,
}

#[derive(Debug, Default)]
pub(crate) struct Validation {
    pub minimum_size: usize,
    pub total_size: Expr,
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
}

pub(crate) fn validate(
    pending: &[PendingField],
    field_count: usize,
    config: &ResolveConfig,
) -> Validation {
    let mut validation = Validation::default();

    check_positions(pending, config, &mut validation);
    check_remainders(pending, field_count, &mut validation);
    check_bit_units(pending, &mut validation);
    compute_sizes(pending, &mut validation);

    validation
}

fn slot_of(field: &ResolvedField) -> Option<BitSlot> {
    match &field.shape {
        FieldShape::Leaf(leaf) => match &leaf.provider {
            ValueProvider::BitField { slot, .. } => Some(*slot),
            _ => None,
        },
        FieldShape::Union(_) => None,
    }
}

fn check_positions(pending: &[PendingField], config: &ResolveConfig, validation: &mut Validation) {
    for entry in pending {
        let PositionProvider::Literal(actual) = entry.field.position else {
            continue;
        };
        let Some(expected) = entry.predicted.as_ref().and_then(Expr::as_static) else {
            trace!(field = %entry.field.name, "sequential position is dynamic, literal accepted");
            continue;
        };
        if expected == actual {
            continue;
        }

        let diagnostic = Diagnostic::new(
            &entry.field.name,
            LayoutError::PositionMismatch { expected, actual },
        );
        match config.position_mismatch {
            MismatchPolicy::Error => validation.errors.push(diagnostic),
            MismatchPolicy::Warn => {
                warn!(
                    field = %entry.field.name,
                    expected,
                    actual,
                    "explicit position overrides sequential position"
                );
                validation.warnings.push(diagnostic);
            }
        }
    }
}

fn check_remainders(pending: &[PendingField], field_count: usize, validation: &mut Validation) {
    for entry in pending {
        if entry.field.size == SizeProvider::Remainder && entry.source + 1 != field_count {
            validation
                .errors
                .push(Diagnostic::new(&entry.field.name, LayoutError::RemainderNotLast));
        }
    }
}

fn check_bit_units(pending: &[PendingField], validation: &mut Validation) {
    let mut units: BTreeMap<usize, (Vec<String>, u32, u32)> = BTreeMap::new();

    for entry in pending {
        if let Some(slot) = slot_of(&entry.field) {
            let unit = units
                .entry(slot.group)
                .or_insert_with(|| (Vec::new(), 0, slot.capacity()));
            unit.0.push(entry.field.name.clone());
            unit.1 += slot.width as u32;
        }
    }

    for (fields, bits, capacity) in units.into_values() {
        if bits <= capacity {
            continue;
        }
        let culprit = fields.last().cloned().unwrap_or_default();
        validation.errors.push(Diagnostic::new(
            culprit,
            LayoutError::BitOverflow {
                fields,
                bits,
                capacity,
            },
        ));
    }
}

fn compute_sizes(pending: &[PendingField], validation: &mut Validation) {
    let mut counted_units = BTreeSet::new();
    let mut sum = 0usize;
    let mut furthest = 0usize;
    let mut total = Expr::zero();

    for entry in pending {
        let field = &entry.field;
        let slot = slot_of(field);

        // A bit-field unit is counted once, by its first member.
        let counts = slot.is_none_or(|slot| counted_units.insert(slot.group));
        let fixed = field.size.fixed().or(slot.map(|slot| slot.unit));

        if counts {
            sum += fixed.unwrap_or(0);
            total = total.plus(&field.size_expr);
        }

        if let (Some(offset), Some(len)) = (field.offset.as_static(), fixed) {
            furthest = furthest.max(offset + len);
        }
    }

    validation.minimum_size = sum.max(furthest);
    validation.total_size = total;
}
