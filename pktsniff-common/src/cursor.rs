//! Bounds-checked reads over a captured buffer.
//!
//! Offsets passed to the read methods are relative to the cursor's base, so
//! a decoder can be written against the header layout it documents without
//! knowing where in the frame the header starts.

use crate::DecodeError;

#[derive(Debug, Clone, Copy)]
pub struct ByteCursor<'a> {
    buf: &'a [u8],
    base: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, base: 0 }
    }

    /// A cursor whose offset 0 is `base` bytes into `buf`.
    ///
    /// `base` may point past the end of `buf`; every read will then fail
    /// with [`DecodeError::Truncated`].
    pub fn at(buf: &'a [u8], base: usize) -> Self {
        Self { buf, base }
    }

    pub fn base(&self) -> usize {
        self.base
    }

    /// Bytes available from the cursor base to the end of the buffer.
    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.base)
    }

    /// Borrow `len` bytes starting at `offset`.
    pub fn slice(&self, offset: usize, len: usize) -> Result<&'a [u8], DecodeError> {
        let needed = offset.checked_add(len).ok_or(DecodeError::Truncated {
            needed: usize::MAX,
            available: self.remaining(),
        })?;
        let start = self.base.saturating_add(offset);
        let end = self.base.saturating_add(needed);
        self.buf.get(start..end).ok_or(DecodeError::Truncated {
            needed,
            available: self.remaining(),
        })
    }

    /// Everything from `offset` to the end of the buffer. An offset exactly at
    /// the end yields an empty slice.
    pub fn rest(&self, offset: usize) -> Result<&'a [u8], DecodeError> {
        let start = self.base.saturating_add(offset);
        self.buf.get(start..).ok_or(DecodeError::Truncated {
            needed: offset,
            available: self.remaining(),
        })
    }

    pub fn read_array<const N: usize>(&self, offset: usize) -> Result<[u8; N], DecodeError> {
        let bytes = self.slice(offset, N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    pub fn read_u8(&self, offset: usize) -> Result<u8, DecodeError> {
        Ok(self.read_array::<1>(offset)?[0])
    }

    /// Network byte order in, host order out.
    pub fn read_u16_be(&self, offset: usize) -> Result<u16, DecodeError> {
        self.read_array(offset).map(u16::from_be_bytes)
    }

    /// Network byte order in, host order out.
    pub fn read_u32_be(&self, offset: usize) -> Result<u32, DecodeError> {
        self.read_array(offset).map(u32::from_be_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_big_endian() {
        let buf = [0x12, 0x34, 0x56, 0x78, 0x9a];
        let cur = ByteCursor::new(&buf);
        assert_eq!(cur.read_u8(4).unwrap(), 0x9a);
        assert_eq!(cur.read_u16_be(0).unwrap(), 0x1234);
        assert_eq!(cur.read_u32_be(1).unwrap(), 0x3456789a);
    }

    #[test]
    fn test_offsets_are_relative_to_base() {
        let buf = [0, 0, 0, 0xab, 0xcd];
        let cur = ByteCursor::at(&buf, 3);
        assert_eq!(cur.remaining(), 2);
        assert_eq!(cur.read_u16_be(0).unwrap(), 0xabcd);
        assert_eq!(cur.rest(1).unwrap(), &[0xcd]);
        assert_eq!(cur.rest(2).unwrap(), &[] as &[u8]);
    }

    #[test]
    fn test_out_of_range_read_fails() {
        let buf = [1, 2, 3];
        let cur = ByteCursor::new(&buf);
        assert_eq!(
            cur.read_u32_be(0),
            Err(DecodeError::Truncated {
                needed: 4,
                available: 3
            })
        );
        assert!(cur.read_u16_be(2).is_err());
        assert!(cur.rest(4).is_err());
        assert!(cur.slice(usize::MAX, 2).is_err());
    }

    #[test]
    fn test_base_past_end_fails_cleanly() {
        let buf = [1, 2, 3];
        let cur = ByteCursor::at(&buf, 10);
        assert_eq!(cur.remaining(), 0);
        assert!(cur.read_u8(0).is_err());
        assert!(cur.rest(0).is_err());
    }
}
