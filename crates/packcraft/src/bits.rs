//! Low-level bit and byte helpers for big-endian fields.
//!
//! Bits inside a unit are numbered MSB-first: the first bit-field placed in a
//! unit occupies its highest bits, later siblings fill towards bit 0.

use crate::{
    errors::{ReadError, WriteError},
    expr::Expr,
};

/// Where a bit-field lives inside its shared unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct BitSlot {
    /// Width of the shared unit in bytes.
    pub unit: usize,
    /// Distance of the field's lowest bit from bit 0 of the unit.
    pub shift: u32,
    pub width: u8,
    /// Index of the unit among all bit-field units of the plan.
    pub group: usize,
}

impl BitSlot {
    pub fn mask(&self) -> u64 {
        low_mask(self.width as u32)
    }

    /// Mask of this field's bits in place, e.g. `0xF0` for a high nibble.
    pub fn unit_mask(&self) -> u64 {
        self.mask() << self.shift
    }

    pub fn capacity(&self) -> u32 {
        (self.unit * 8) as u32
    }

    /// Computes `(unit >> shift) & mask`.
    pub fn extract(&self, unit: u64) -> u64 {
        (unit >> self.shift) & self.mask()
    }

    /// Clears this field's bits and ORs in `value`, leaving siblings untouched.
    /// Returns None if `value` does not fit the width.
    pub fn insert(&self, unit: u64, value: u64) -> Option<u64> {
        if value > self.mask() {
            return None;
        }
        Some((unit & !self.unit_mask()) | (value << self.shift))
    }
}

/// Mask with the low `width` bits set.
pub fn low_mask(width: u32) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

fn checked_range(len: usize, offset: usize, width: usize) -> Option<std::ops::Range<usize>> {
    let end = offset.checked_add(width)?;
    (end <= len).then_some(offset..end)
}

/// Reads `width` bytes (at most 8) at `offset` as a big-endian unsigned value.
pub fn read_be(data: &[u8], offset: usize, width: usize) -> Result<u64, ReadError> {
    let range = checked_range(data.len(), offset, width).ok_or(ReadError::OutOfBounds {
        start: offset,
        end: offset.saturating_add(width),
        len: data.len(),
    })?;

    Ok(data[range]
        .iter()
        .fold(0u64, |acc, byte| (acc << 8) | *byte as u64))
}

/// Writes the low `width` bytes of `value` big-endian at `offset`.
pub fn write_be(
    data: &mut [u8],
    offset: usize,
    width: usize,
    value: u64,
) -> Result<(), WriteError> {
    let range = checked_range(data.len(), offset, width).ok_or(WriteError::OutOfBounds)?;

    let mut remaining = value;
    for byte in data[range].iter_mut().rev() {
        *byte = remaining as u8;
        remaining >>= 8;
    }

    Ok(())
}

/// Sign-extends the low `bits` of `value` to a full `i64`.
pub fn sign_extend(value: u64, bits: usize) -> i64 {
    let shift = 64 - bits;
    ((value << shift) as i64) >> shift
}

/// A bit-field's place in its unit before the unit's final width is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BitMember {
    pub group: usize,
    /// Bits used by earlier siblings of the same unit.
    pub start: u32,
    pub width: u8,
}

/// Packs consecutive bit-fields into shared units during position resolution.
///
/// A unit is as wide as the widest integer type among its members, so shifts
/// are only final once every member has joined; see [BitUnits].
#[derive(Debug, Default)]
pub(crate) struct BitPacker {
    open: Option<OpenUnit>,
    /// Width in bytes of every unit opened so far, indexed by group.
    units: Vec<usize>,
}

#[derive(Debug)]
struct OpenUnit {
    offset: Expr,
    used: u32,
    group: usize,
}

impl BitPacker {
    /// Places `width` bits of a `type_width`-byte integer in the open unit.
    /// Returns None when no unit is open.
    pub(crate) fn join(&mut self, type_width: usize, width: u8) -> Option<(Expr, BitMember)> {
        let open = self.open.as_mut()?;
        let unit = &mut self.units[open.group];
        *unit = (*unit).max(type_width);

        let member = BitMember {
            group: open.group,
            start: open.used,
            width,
        };
        open.used += width as u32;
        Some((open.offset.clone(), member))
    }

    /// Opens a new unit at `offset`. Any open unit must have been closed first.
    pub(crate) fn start(&mut self, offset: Expr, type_width: usize, width: u8) -> BitMember {
        let group = self.units.len();
        self.units.push(type_width);
        self.open = Some(OpenUnit {
            offset,
            used: width as u32,
            group,
        });

        BitMember {
            group,
            start: 0,
            width,
        }
    }

    /// True once the open unit's bits are used up.
    pub(crate) fn is_full(&self) -> bool {
        self.open
            .as_ref()
            .is_some_and(|open| open.used >= (self.units[open.group] * 8) as u32)
    }

    /// Closes the open unit and returns the offset just past it.
    pub(crate) fn close(&mut self) -> Option<Expr> {
        let open = self.open.take()?;
        Some(open.offset.plus_constant(self.units[open.group]))
    }

    /// Fixes the width of every unit.
    pub(crate) fn finish(self) -> BitUnits {
        BitUnits { units: self.units }
    }
}

/// Final unit widths of one resolved field list.
#[derive(Debug, Clone, Default)]
pub(crate) struct BitUnits {
    units: Vec<usize>,
}

impl BitUnits {
    /// Turns a member into its slot, numbering bits MSB-first.
    pub(crate) fn slot(&self, member: BitMember) -> BitSlot {
        let unit = self.units.get(member.group).copied().unwrap_or(1);
        let capacity = (unit * 8) as u32;

        BitSlot {
            unit,
            shift: capacity.saturating_sub(member.start + member.width as u32),
            width: member.width,
            group: member.group,
        }
    }
}
