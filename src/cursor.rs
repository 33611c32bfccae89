//! Bounds-checked little-endian reads over a borrowed byte slice.
//!
//! Grounded in `utils/byte_cursor.rs` and `utils/bytes.rs`: every read is
//! expressed as a pure function of `(slice, offset)` that returns `None`/an
//! error rather than panicking, and position tracking is a plain `usize`
//! rather than a `std::io::Cursor` wrapping a fallible `Seek`.

use crate::error::{Error, Result};

/// A read cursor over a borrowed byte slice, tracking a current position.
///
/// All absolute-offset reads (`u8_at`, `u16_at`, ...) are also exposed as
/// free functions in this module so callers that only need one-off reads
/// (most of `manifest::parse`) don't need to construct a cursor at all.
#[derive(Debug, Clone, Copy)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        ByteCursor { data, pos: 0 }
    }

    pub fn with_pos(data: &'a [u8], pos: usize) -> Result<Self> {
        if pos > data.len() {
            return Err(Error::OffsetOutOfBounds {
                what: "cursor position",
                offset: usize_to_u32(pos),
                len: data.len(),
            });
        }
        Ok(ByteCursor { data, pos })
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Seek to an absolute offset; fails when the offset is out of range.
    pub fn seek_to(&mut self, offset: usize) -> Result<()> {
        if offset > self.data.len() {
            return Err(Error::OffsetOutOfBounds {
                what: "cursor seek",
                offset: usize_to_u32(offset),
                len: self.data.len(),
            });
        }
        self.pos = offset;
        Ok(())
    }

    pub fn advance(&mut self, n: usize) -> Result<()> {
        let target = self.pos.checked_add(n).ok_or(Error::OffsetOutOfBounds {
            what: "cursor advance",
            offset: u32::MAX,
            len: self.data.len(),
        })?;
        self.seek_to(target)
    }

    /// A subslice of length `n` starting at the cursor; fails if it would
    /// run past the end of the underlying slice. Does not move the cursor.
    pub fn peek_slice(&self, n: usize) -> Result<&'a [u8]> {
        slice_at(self.data, self.pos, n, "cursor slice")
    }

    /// Reads and consumes a subslice of length `n`.
    pub fn read_slice(&mut self, n: usize) -> Result<&'a [u8]> {
        let s = self.peek_slice(n)?;
        self.pos += n;
        Ok(s)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let v = read_u8_named(self.data, self.pos, "u8")?;
        self.pos += 1;
        Ok(v)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let v = read_u16_named(self.data, self.pos, "u16")?;
        self.pos += 2;
        Ok(v)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let v = read_u32_named(self.data, self.pos, "u32")?;
        self.pos += 4;
        Ok(v)
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        let v = read_u64_named(self.data, self.pos, "u64")?;
        self.pos += 8;
        Ok(v)
    }

    pub fn read_sig(&mut self) -> Result<[u8; 4]> {
        let v = read_sig_named(self.data, self.pos, "signature")?;
        self.pos += 4;
        Ok(v)
    }
}

fn usize_to_u32(v: usize) -> u32 {
    u32::try_from(v).unwrap_or(u32::MAX)
}

pub fn require_len(buf: &[u8], off: usize, need: usize, what: &'static str) -> Result<()> {
    if off > buf.len() || buf.len() - off < need {
        return Err(Error::Truncated {
            what,
            offset: usize_to_u32(off),
            need,
            have: buf.len().saturating_sub(off),
        });
    }
    Ok(())
}

pub fn slice_at<'a>(buf: &'a [u8], off: usize, n: usize, what: &'static str) -> Result<&'a [u8]> {
    require_len(buf, off, n, what)?;
    Ok(&buf[off..off + n])
}

pub fn read_sig_named(buf: &[u8], off: usize, what: &'static str) -> Result<[u8; 4]> {
    let s = slice_at(buf, off, 4, what)?;
    Ok([s[0], s[1], s[2], s[3]])
}

pub fn read_u8_named(buf: &[u8], off: usize, what: &'static str) -> Result<u8> {
    let s = slice_at(buf, off, 1, what)?;
    Ok(s[0])
}

pub fn read_u16_named(buf: &[u8], off: usize, what: &'static str) -> Result<u16> {
    let s = slice_at(buf, off, 2, what)?;
    Ok(u16::from_le_bytes([s[0], s[1]]))
}

pub fn read_u32_named(buf: &[u8], off: usize, what: &'static str) -> Result<u32> {
    let s = slice_at(buf, off, 4, what)?;
    Ok(u32::from_le_bytes([s[0], s[1], s[2], s[3]]))
}

pub fn read_u64_named(buf: &[u8], off: usize, what: &'static str) -> Result<u64> {
    let s = slice_at(buf, off, 8, what)?;
    Ok(u64::from_le_bytes([
        s[0], s[1], s[2], s[3], s[4], s[5], s[6], s[7],
    ]))
}

pub fn read_array_named<const N: usize>(
    buf: &[u8],
    off: usize,
    what: &'static str,
) -> Result<[u8; N]> {
    let s = slice_at(buf, off, N, what)?;
    let mut out = [0u8; N];
    out.copy_from_slice(s);
    Ok(out)
}

/// Convert an absolute `u32` offset into a validated `usize` index into `len`
/// bytes. Every absolute offset read from the blob goes through this so the
/// "`o == 0` means absent" convention stays at the call site, not here.
pub fn u32_to_usize(offset: u32, what: &'static str, len: usize) -> Result<usize> {
    let off = usize::try_from(offset).map_err(|_| Error::OffsetOutOfBounds { what, offset, len })?;
    if off > len {
        return Err(Error::OffsetOutOfBounds { what, offset, len });
    }
    Ok(off)
}

pub fn usize_to_u32_saturating(v: usize) -> u32 {
    usize_to_u32(v)
}

/// `off + size`, validated against `len`. Used by every element decoder to
/// turn a `(header offset, declared size)` pair into a checked end index.
pub fn checked_end(len: usize, off: u32, size: u32, what: &'static str) -> Result<usize> {
    let off_usize = u32_to_usize(off, what, len)?;
    let size_usize = usize::try_from(size).map_err(|_| Error::SizeOutOfBounds {
        what,
        offset: off,
        size,
    })?;
    let end = off_usize
        .checked_add(size_usize)
        .ok_or(Error::SizeOutOfBounds {
            what,
            offset: off,
            size,
        })?;
    if end > len {
        return Err(Error::SizeOutOfBounds {
            what,
            offset: off,
            size,
        });
    }
    Ok(end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_little_endian_integers() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
        assert_eq!(read_u16_named(&data, 0, "x").unwrap(), 0x0201);
        assert_eq!(read_u32_named(&data, 0, "x").unwrap(), 0x0403_0201);
        assert_eq!(read_u64_named(&data, 0, "x").unwrap(), 0x0807_0605_0403_0201);
    }

    #[test]
    fn rejects_truncated_reads() {
        let data = [0x01, 0x02];
        assert!(matches!(
            read_u32_named(&data, 0, "x"),
            Err(Error::Truncated { .. })
        ));
    }

    #[test]
    fn cursor_advances_and_seeks() {
        let data = [1u8, 2, 3, 4, 5, 6];
        let mut c = ByteCursor::new(&data);
        assert_eq!(c.read_u8().unwrap(), 1);
        assert_eq!(c.read_u16().unwrap(), u16::from_le_bytes([2, 3]));
        c.seek_to(0).unwrap();
        assert_eq!(c.position(), 0);
        assert!(c.seek_to(100).is_err());
    }

    #[test]
    fn checked_end_rejects_overflowing_size() {
        assert!(checked_end(10, 5, 10, "x").is_err());
        assert_eq!(checked_end(10, 2, 8, "x").unwrap(), 10);
    }
}
