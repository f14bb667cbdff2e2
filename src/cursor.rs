//! Random-access byte cursor: a reader over an immutable slice, and a writer that
//! journals typed writes and materializes a buffer on demand.
//!
//! Grounded on `Ian-Reitsma-the-block`'s `binary_cursor.rs` `Writer` (one method per
//! primitive width) and on `binread::attribute`'s byteorder-precedence documentation
//! (struct vs. field vs. ambient endianness).

use crate::codec::{self, Prim};
use crate::value::Value;

/// Byte order. There is no "native" variant in the public surface: callers choose one
/// explicitly, matching `#[br(big)]`/`#[br(little)]` always being explicit in the teacher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Big,
    Little,
}

impl Endian {
    /// The endianness of the host running this code. Only meaningful as an explicit
    /// caller choice (e.g. for formats that are documented as "native-endian"); the
    /// engine itself never defaults to it silently.
    pub fn native() -> Self {
        if cfg!(target_endian = "big") {
            Endian::Big
        } else {
            Endian::Little
        }
    }
}

/// The subset of cursor behavior shared by [`Reader`] and [`Writer`], so pre/post hooks
/// (offset jumps, peeks, endian switches) can be written once and used from either
/// interpreter.
pub trait CursorLike {
    fn offset(&self) -> u64;
    fn seek(&mut self, offset: u64);
    fn endian(&self) -> Endian;
    fn set_endian(&mut self, endian: Endian);
}

/// A random-access reader over a byte slice.
pub struct Reader<'a> {
    bytes: &'a [u8],
    offset: u64,
    endian: Endian,
}

impl<'a> Reader<'a> {
    pub fn new(bytes: &'a [u8], endian: Endian) -> Self {
        Self {
            bytes,
            offset: 0,
            endian,
        }
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn seek(&mut self, offset: u64) {
        self.offset = offset;
    }

    pub fn forward(&mut self, n: u64) {
        self.offset += n;
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn set_endian(&mut self, endian: Endian) {
        self.endian = endian;
    }

    /// Read one primitive. Returns [`Value::Eof`] without advancing the offset if the
    /// buffer is exhausted; never raises an error itself (the interpreter decides whether
    /// an unabsorbed EOF is fatal).
    pub fn read(&mut self, prim: Prim) -> Value {
        let width = prim.byte_width();
        match self.read_raw(width) {
            Some(bytes) => codec::decode(prim, &bytes, self.endian),
            None => Value::Eof,
        }
    }

    /// Read `n` raw bytes without interpreting them. Returns `None` (and does not
    /// advance) if fewer than `n` bytes remain — used by bitfields and magic checks,
    /// which are fixed-size reads that fall outside the primitive/EOF-sentinel pipeline.
    pub fn read_raw(&mut self, n: usize) -> Option<Vec<u8>> {
        let start = self.offset as usize;
        let end = start.checked_add(n)?;
        if end > self.bytes.len() {
            return None;
        }
        self.offset = end as u64;
        Some(self.bytes[start..end].to_vec())
    }

    /// Peek `n` raw bytes without advancing the offset.
    pub fn peek_raw(&self, n: usize) -> Option<Vec<u8>> {
        let start = self.offset as usize;
        let end = start.checked_add(n)?;
        if end > self.bytes.len() {
            return None;
        }
        Some(self.bytes[start..end].to_vec())
    }
}

/// A write-journal cursor. Writes are recorded as `(offset, bytes)` journal entries and
/// applied in journal order when materialized, so a later write at an already-written
/// address wins, and gaps between entries are zero-filled.
pub struct Writer {
    journal: Vec<(u64, Vec<u8>)>,
    offset: u64,
    endian: Endian,
}

impl Writer {
    pub fn new(endian: Endian) -> Self {
        Self {
            journal: Vec::new(),
            offset: 0,
            endian,
        }
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn seek(&mut self, offset: u64) {
        self.offset = offset;
    }

    pub fn forward(&mut self, n: u64) {
        self.offset += n;
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn set_endian(&mut self, endian: Endian) {
        self.endian = endian;
    }

    /// Encode and journal one primitive, advancing the offset by its byte width.
    pub fn write(&mut self, prim: Prim, value: &Value) -> Option<()> {
        let bytes = codec::encode(prim, value, self.endian)?;
        self.write_raw(&bytes);
        Some(())
    }

    /// Journal raw bytes at the current offset and advance past them.
    pub fn write_raw(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        self.journal.push((self.offset, bytes.to_vec()));
        self.offset += bytes.len() as u64;
    }

    /// The highest address touched by any journal entry, or the current offset if that
    /// is higher (e.g. after a trailing `forward` with no write). This is what
    /// `compute_bin_size` reports.
    pub fn extent(&self) -> u64 {
        self.journal
            .iter()
            .map(|(o, b)| o + b.len() as u64)
            .max()
            .unwrap_or(0)
            .max(self.offset)
    }

    /// Materialize the journal into a flat buffer, zero-filling any untouched gaps.
    pub fn into_buffer(self) -> Vec<u8> {
        let len = self.extent() as usize;
        let mut buf = vec![0u8; len];
        for (offset, bytes) in self.journal {
            let start = offset as usize;
            buf[start..start + bytes.len()].copy_from_slice(&bytes);
        }
        buf
    }
}

impl<'a> CursorLike for Reader<'a> {
    fn offset(&self) -> u64 {
        self.offset
    }
    fn seek(&mut self, offset: u64) {
        self.offset = offset;
    }
    fn endian(&self) -> Endian {
        self.endian
    }
    fn set_endian(&mut self, endian: Endian) {
        self.endian = endian;
    }
}

impl CursorLike for Writer {
    fn offset(&self) -> u64 {
        self.offset
    }
    fn seek(&mut self, offset: u64) {
        self.offset = offset;
    }
    fn endian(&self) -> Endian {
        self.endian
    }
    fn set_endian(&mut self, endian: Endian) {
        self.endian = endian;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_eof_does_not_advance() {
        let mut r = Reader::new(&[0x01], Endian::Big);
        assert_eq!(r.read(Prim::U16), Value::Eof);
        assert_eq!(r.offset(), 0);
    }

    #[test]
    fn writer_later_write_wins_at_same_address() {
        let mut w = Writer::new(Endian::Big);
        w.seek(0);
        w.write_raw(&[0xAA, 0xAA]);
        w.seek(0);
        w.write_raw(&[0xBB]);
        assert_eq!(w.into_buffer(), vec![0xBB, 0xAA]);
    }

    #[test]
    fn writer_zero_fills_gaps() {
        let mut w = Writer::new(Endian::Big);
        w.seek(2);
        w.write_raw(&[0x01]);
        assert_eq!(w.into_buffer(), vec![0x00, 0x00, 0x01]);
    }
}
