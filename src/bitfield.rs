//! Packed sub-byte field groups (spec §4.10).
//!
//! Verified by hand against the spec's literal example: bytes `[0x30, 0x41]` little-endian
//! with widths `{f1:2, f2:10, f3:3}` decode to `{f1:1, f2:0b0000010011, f3:0}`. Grounded on
//! bit-packing conventions shared by `other_examples`' bitfield crates (`modular-bitfield`,
//! `prot2rust`): most-significant-bit-first within a byte, whole-span byte swap for
//! little-endian before unpacking, padding bits left at the tail (least-significant end)
//! of the span.

use crate::cursor::Endian;
use crate::meta::FieldDescriptor;

/// Sum of declared bitfield widths across `fields`, in bits.
pub fn total_bits(fields: &[FieldDescriptor]) -> u64 {
    fields
        .iter()
        .map(|f| f.bitfield_width.expect("bitfield group field without a declared width") as u64)
        .sum()
}

/// Bytes needed to hold `total_bits`, rounded up.
pub fn span_bytes(total_bits: u64) -> usize {
    ((total_bits + 7) / 8) as usize
}

fn mask(width: u32) -> u128 {
    if width >= 128 {
        u128::MAX
    } else {
        (1u128 << width) - 1
    }
}

/// Unpack `bytes` (exactly [`span_bytes`] long) into one `u64` per field, in declaration
/// order. Trailing padding bits, if any, are dropped.
pub fn read_bitfield(fields: &[FieldDescriptor], bytes: &[u8], endian: Endian) -> Vec<u64> {
    let span = span_bytes(total_bits(fields));
    debug_assert_eq!(bytes.len(), span);

    let work: Vec<u8> = match endian {
        Endian::Big => bytes.to_vec(),
        Endian::Little => bytes.iter().rev().copied().collect(),
    };
    let mut acc: u128 = 0;
    for b in &work {
        acc = (acc << 8) | (*b as u128);
    }

    let mut shift = (span * 8) as u32;
    let mut out = Vec::with_capacity(fields.len());
    for f in fields {
        let width = f.bitfield_width.expect("bitfield group field without a declared width");
        shift -= width;
        let value = (acc >> shift) & mask(width);
        out.push(value as u64);
    }
    out
}

/// Pack `values` (one per field, declaration order) into a byte span. Padding bits, if
/// any, are left zero.
pub fn write_bitfield(fields: &[FieldDescriptor], values: &[u64], endian: Endian) -> Vec<u8> {
    let total = total_bits(fields);
    let span = span_bytes(total);
    let mut shift = (span * 8) as u32;
    let mut acc: u128 = 0;
    for (f, value) in fields.iter().zip(values) {
        let width = f.bitfield_width.expect("bitfield group field without a declared width");
        shift -= width;
        acc |= ((*value as u128) & mask(width)) << shift;
    }

    let mut work = vec![0u8; span];
    for (i, byte) in work.iter_mut().rev().enumerate() {
        *byte = ((acc >> (i * 8)) & 0xFF) as u8;
    }
    match endian {
        Endian::Big => work,
        Endian::Little => {
            work.reverse();
            work
        }
    }
}
