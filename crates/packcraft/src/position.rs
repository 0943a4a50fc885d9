//! Position resolution: where each field starts.

use crate::{
    bits::{BitMember, BitPacker, BitUnits},
    capability::PositionFn,
    expr::{Expr, Term},
    field::FieldDescriptor,
    size::SizeProvider,
};

/// How a field's offset is determined.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum PositionProvider {
    /// Previous field's offset plus its size, 0 for the first field.
    #[default]
    Sequential,
    Literal(usize),
    /// Host function receiving the buffer and the sequential default.
    Computed(PositionFn),
}

/// Outcome of placing one field.
#[derive(Debug, Clone)]
pub(crate) struct Placement {
    pub offset: Expr,
    /// Offset implied by the predecessors; None while that chain is unknown.
    pub predicted: Option<Expr>,
    /// Resolved into a [crate::bits::BitSlot] once every unit is closed.
    pub slot: Option<BitMember>,
}

/// Walks the fields in declaration order keeping the sequential cursor.
#[derive(Debug)]
pub(crate) struct PositionResolver {
    cursor: Option<Expr>,
    packer: BitPacker,
    /// Whether the open bit unit sits at a known offset.
    unit_anchored: bool,
}

impl PositionResolver {
    pub(crate) fn new() -> Self {
        Self {
            cursor: Some(Expr::zero()),
            packer: BitPacker::default(),
            unit_anchored: true,
        }
    }

    /// Places `field`. A `None` size means its size failed to resolve.
    pub(crate) fn place(
        &mut self,
        field: &FieldDescriptor,
        size: Option<&SizeProvider>,
    ) -> Placement {
        let width = match size {
            Some(SizeProvider::BitWidth(width)) => Some(*width),
            _ => None,
        };
        let type_width = field.effective_integer().map_or(1, |integer| integer.width());

        // Sequential bit-fields share the open unit.
        if let (Some(width), PositionProvider::Sequential) = (width, &field.position) {
            if let Some((offset, member)) = self.packer.join(type_width, width) {
                let predicted = self.unit_anchored.then(|| offset.clone());
                self.close_if_full();
                return Placement {
                    predicted,
                    offset,
                    slot: Some(member),
                };
            }
        }

        self.close_unit();
        let predicted = self.cursor.clone();
        // Past an unknown size only an explicit position brings the chain back.
        let anchored =
            predicted.is_some() || !matches!(field.position, PositionProvider::Sequential);
        let default = predicted.clone().unwrap_or_default();

        let offset = match &field.position {
            PositionProvider::Sequential => default,
            PositionProvider::Literal(offset) => Expr::literal(*offset),
            PositionProvider::Computed(function) => Expr::term(Term::Position {
                function: function.clone(),
                default: Box::new(default),
            }),
        };

        let mut slot = None;
        match (width, size) {
            (Some(width), _) => {
                slot = Some(self.packer.start(offset.clone(), type_width, width));
                self.unit_anchored = anchored;
                self.cursor = None;
                self.close_if_full();
            }
            (None, Some(size)) => {
                let end = offset.clone().plus(&size.expr(&field.name, &offset, None));
                self.cursor = anchored.then_some(end);
            }
            (None, None) => self.cursor = None,
        }

        Placement {
            offset,
            predicted,
            slot,
        }
    }

    /// Closes any open unit and fixes every bit-field unit's width.
    pub(crate) fn finish(mut self) -> BitUnits {
        self.close_unit();
        self.packer.finish()
    }

    fn close_if_full(&mut self) {
        if self.packer.is_full() {
            self.close_unit();
        }
    }

    fn close_unit(&mut self) {
        if let Some(end) = self.packer.close() {
            self.cursor = self.unit_anchored.then_some(end);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        capability::SizeFn,
        types::{DeclaredType, EnumType, Primitive},
    };

    fn place_all(fields: &[FieldDescriptor], sizes: &[SizeProvider]) -> Vec<Placement> {
        place_with_units(fields, sizes).0
    }

    fn place_with_units(
        fields: &[FieldDescriptor],
        sizes: &[SizeProvider],
    ) -> (Vec<Placement>, BitUnits) {
        let mut resolver = PositionResolver::new();
        let placements = fields
            .iter()
            .zip(sizes)
            .map(|(field, size)| resolver.place(field, Some(size)))
            .collect();
        (placements, resolver.finish())
    }

    #[test]
    fn test_sequential_offsets() {
        let fields = vec![
            FieldDescriptor::new("Type", Primitive::U8),
            FieldDescriptor::new("Code", Primitive::U8),
            FieldDescriptor::new("Checksum", Primitive::U16),
            FieldDescriptor::new("Identifier", Primitive::U16),
        ];
        let sizes = vec![
            SizeProvider::Intrinsic(1),
            SizeProvider::Intrinsic(1),
            SizeProvider::Intrinsic(2),
            SizeProvider::Intrinsic(2),
        ];

        let offsets: Vec<_> = place_all(&fields, &sizes)
            .into_iter()
            .map(|placement| placement.offset.as_static())
            .collect();
        assert_eq!(offsets, vec![Some(0), Some(1), Some(2), Some(4)]);
    }

    #[test]
    fn test_literal_overrides_and_keeps_prediction() {
        let fields = vec![
            FieldDescriptor::new("Value", Primitive::U16).at(6),
            FieldDescriptor::new("Next", Primitive::U16),
        ];
        let sizes = vec![SizeProvider::Intrinsic(2), SizeProvider::Intrinsic(2)];

        let placements = place_all(&fields, &sizes);
        assert_eq!(placements[0].offset, Expr::literal(6));
        assert_eq!(placements[0].predicted, Some(Expr::zero()));
        assert_eq!(placements[1].offset, Expr::literal(8));
    }

    #[test]
    fn test_computed_receives_default() {
        let function = PositionFn::new("next_position", |_: &[u8], default| default);
        let fields = vec![
            FieldDescriptor::new("Value", Primitive::U16),
            FieldDescriptor::new("Next", Primitive::U16).position_fn(function),
        ];
        let sizes = vec![SizeProvider::Intrinsic(2), SizeProvider::Intrinsic(2)];

        let placements = place_all(&fields, &sizes);
        assert_eq!(placements[1].offset.to_string(), "next_position(buf, 2)");
        assert_eq!(placements[1].offset.eval(&[0; 4]).unwrap(), 2);
    }

    #[test]
    fn test_computed_size_flows_into_offsets() {
        let options = SizeFn::new("options_size", |_: &[u8]| 4);
        let fields = vec![
            FieldDescriptor::new("Options", DeclaredType::Bytes).size_fn(options.clone()),
            FieldDescriptor::new("Payload", DeclaredType::Bytes),
        ];
        let sizes = vec![SizeProvider::Computed(options), SizeProvider::Remainder];

        let placements = place_all(&fields, &sizes);
        assert_eq!(placements[1].offset.to_string(), "options_size(buf)");
    }

    #[test]
    fn test_bit_fields_share_a_byte() {
        let fields = vec![
            FieldDescriptor::new("Version", Primitive::U8).bits(4),
            FieldDescriptor::new("IHL", Primitive::U8).bits(4),
            FieldDescriptor::new("Dscp", Primitive::U8),
        ];
        let sizes = vec![
            SizeProvider::BitWidth(4),
            SizeProvider::BitWidth(4),
            SizeProvider::Intrinsic(1),
        ];

        let (placements, units) = place_with_units(&fields, &sizes);
        assert_eq!(placements[0].offset, Expr::zero());
        assert_eq!(placements[1].offset, Expr::zero());
        assert_eq!(placements[2].offset, Expr::literal(1));
        assert_eq!(units.slot(placements[0].slot.unwrap()).shift, 4);
        assert_eq!(units.slot(placements[1].slot.unwrap()).shift, 0);
    }

    #[test]
    fn test_mixed_width_siblings_share_the_widest_unit() {
        let flags = EnumType::new("FragmentFlags", Primitive::U8).variant("DontFragment", 2);
        let fields = vec![
            FieldDescriptor::new("FragmentFlags", flags).bits(3),
            FieldDescriptor::new("FragmentOffset", Primitive::U16).bits(13),
            FieldDescriptor::new("Ttl", Primitive::U8),
        ];
        let sizes = vec![
            SizeProvider::BitWidth(3),
            SizeProvider::BitWidth(13),
            SizeProvider::Intrinsic(1),
        ];

        let (placements, units) = place_with_units(&fields, &sizes);
        assert_eq!(placements[1].offset, Expr::zero());
        assert_eq!(placements[2].offset, Expr::literal(2));

        let flags = units.slot(placements[0].slot.unwrap());
        assert_eq!((flags.unit, flags.shift), (2, 13));
        assert_eq!(units.slot(placements[1].slot.unwrap()).shift, 0);
    }

    #[test]
    fn test_partial_unit_is_padded() {
        let fields = vec![
            FieldDescriptor::new("Flag", Primitive::U8).bits(1),
            FieldDescriptor::new("Next", Primitive::U16),
        ];
        let sizes = vec![SizeProvider::BitWidth(1), SizeProvider::Intrinsic(2)];

        let (placements, units) = place_with_units(&fields, &sizes);
        assert_eq!(placements[1].offset, Expr::literal(1));
        assert_eq!(units.slot(placements[0].slot.unwrap()).shift, 7);
    }

    #[test]
    fn test_closed_unit_starts_a_new_one() {
        let fields = vec![
            FieldDescriptor::new("A", Primitive::U8).bits(8),
            FieldDescriptor::new("B", Primitive::U8).bits(2),
        ];
        let sizes = vec![SizeProvider::BitWidth(8), SizeProvider::BitWidth(2)];

        let placements = place_all(&fields, &sizes);
        assert_eq!(placements[1].offset, Expr::literal(1));
        assert_ne!(
            placements[0].slot.unwrap().group,
            placements[1].slot.unwrap().group
        );
    }

    #[test]
    fn test_unknown_size_poisons_prediction() {
        let mut resolver = PositionResolver::new();
        resolver.place(&FieldDescriptor::new("Broken", DeclaredType::Bytes), None);

        let next = resolver.place(
            &FieldDescriptor::new("Next", Primitive::U8).at(4),
            Some(&SizeProvider::Intrinsic(1)),
        );
        assert_eq!(next.predicted, None);

        let after = resolver.place(
            &FieldDescriptor::new("After", Primitive::U8),
            Some(&SizeProvider::Intrinsic(1)),
        );
        assert_eq!(after.predicted, Some(Expr::literal(5)));
    }

    #[test]
    fn test_sequential_field_keeps_prediction_unknown() {
        let mut resolver = PositionResolver::new();
        resolver.place(&FieldDescriptor::new("Broken", DeclaredType::Bytes), None);

        let next = resolver.place(
            &FieldDescriptor::new("Next", Primitive::U8),
            Some(&SizeProvider::Intrinsic(1)),
        );
        assert_eq!(next.predicted, None);

        let flag = resolver.place(
            &FieldDescriptor::new("Flag", Primitive::U8).bits(8),
            Some(&SizeProvider::BitWidth(8)),
        );
        assert_eq!(flag.predicted, None);

        let check = resolver.place(
            &FieldDescriptor::new("Check", Primitive::U8).at(8),
            Some(&SizeProvider::Intrinsic(1)),
        );
        assert_eq!(check.predicted, None);
    }
}
