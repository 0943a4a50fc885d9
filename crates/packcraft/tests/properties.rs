//! Property-based tests for layout resolution and bit-field access.
//!
//! - Fixed-size schemas: offsets are prefix sums and MinimumSize is the total
//! - Resolution is deterministic
//! - Bit-field writes never disturb sibling bits

use packcraft::{
    field::FieldDescriptor,
    schema::Schema,
    types::Primitive,
    view::Value,
};
use proptest::prelude::*;

fn primitive_strategy() -> impl Strategy<Value = Primitive> {
    prop_oneof![
        Just(Primitive::U8),
        Just(Primitive::I8),
        Just(Primitive::U16),
        Just(Primitive::I16),
        Just(Primitive::U32),
        Just(Primitive::I32),
        Just(Primitive::U64),
        Just(Primitive::I64),
    ]
}

fn fixed_schema(primitives: &[Primitive]) -> Schema {
    primitives
        .iter()
        .enumerate()
        .fold(Schema::new("Fixed"), |schema, (i, primitive)| {
            schema.field(FieldDescriptor::new(format!("f{i}"), *primitive))
        })
}

// Widths of sibling bit-fields that exactly fill one byte.
fn byte_partition_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(1u8..=8, 1..=8).prop_map(|widths| {
        let mut used = 0;
        let mut fitting = Vec::new();
        for width in widths {
            if used + width > 8 {
                break;
            }
            used += width;
            fitting.push(width);
        }
        if used < 8 {
            fitting.push(8 - used);
        }
        fitting
    })
}

#[test]
fn prop_fixed_offsets_are_prefix_sums() {
    proptest!(|(primitives in prop::collection::vec(primitive_strategy(), 0..16))| {
        let plan = fixed_schema(&primitives).resolve().unwrap();

        let mut expected = 0;
        for (field, primitive) in plan.fields().iter().zip(&primitives) {
            prop_assert_eq!(field.offset.as_static(), Some(expected));
            expected += primitive.width();
        }
        prop_assert_eq!(plan.minimum_size(), expected);
        prop_assert_eq!(plan.total_size().as_static(), Some(expected));
    });
}

#[test]
fn prop_resolution_is_deterministic() {
    proptest!(|(primitives in prop::collection::vec(primitive_strategy(), 0..16))| {
        let schema = fixed_schema(&primitives);
        prop_assert_eq!(schema.resolve().unwrap(), schema.resolve().unwrap());
    });
}

#[test]
fn prop_bit_field_writes_keep_siblings() {
    proptest!(|(
        widths in byte_partition_strategy(),
        seed in any::<u8>(),
        target in any::<prop::sample::Index>(),
        value in any::<u64>()
    )| {
        let schema = widths
            .iter()
            .enumerate()
            .fold(Schema::new("Bits"), |schema, (i, width)| {
                schema.field(FieldDescriptor::new(format!("b{i}"), Primitive::U8).bits(*width))
            });
        let plan = schema.resolve().unwrap();
        prop_assert_eq!(plan.minimum_size(), 1);

        let mut data = [seed];
        let before: Vec<u64> = {
            let view = plan.view(&data).unwrap();
            (0..widths.len())
                .map(|i| view.get(&format!("b{i}")).unwrap().as_unsigned().unwrap())
                .collect()
        };

        let index = target.index(widths.len());
        let value = value & ((1u64 << widths[index]) - 1);
        let name = format!("b{index}");
        plan.view_mut(&mut data).unwrap().set_unsigned(&name, value).unwrap();

        let view = plan.view(&data).unwrap();
        for (i, old) in before.iter().enumerate() {
            let now = view.get(&format!("b{i}")).unwrap();
            if i == index {
                prop_assert_eq!(now, Value::Unsigned(value));
            } else {
                prop_assert_eq!(now, Value::Unsigned(*old));
            }
        }
    });
}
