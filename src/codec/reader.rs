// Bounded fixed-width integer reads.
//
// A read that would run past the end of the buffer yields zero instead of
// failing, but the offset still advances by the full width. Repeated reads
// on a truncated patch therefore keep returning zero and never re-read
// valid data. Callers that need strict validation check `overran()` (or
// compare the offset against the buffer length) after the fact.

/// Byte order of a fixed-width integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Big,
    Little,
}

/// Widest supported read, in bytes.
pub const MAX_WIDTH: usize = 8;

/// Read `width` bytes (1..=8) at `offset` as an unsigned integer.
///
/// Returns `(value, new_offset)`. `new_offset` is always
/// `offset + width` (saturating), and `value` is `0` whenever that end
/// position lies beyond `buf.len()`.
#[inline]
pub fn read_fixed(buf: &[u8], offset: usize, width: usize, endian: Endian) -> (u64, usize) {
    debug_assert!(
        (1..=MAX_WIDTH).contains(&width),
        "read width {width} out of range"
    );
    let end = offset.saturating_add(width);
    let Some(bytes) = buf.get(offset..end) else {
        return (0, end);
    };

    let value = match endian {
        Endian::Big => bytes
            .iter()
            .fold(0u64, |acc, &b| (acc << 8) | u64::from(b)),
        Endian::Little => bytes
            .iter()
            .rev()
            .fold(0u64, |acc, &b| (acc << 8) | u64::from(b)),
    };
    (value, end)
}

// ---------------------------------------------------------------------------
// Cursor
// ---------------------------------------------------------------------------

/// Forward-only cursor over a byte buffer with bounded-read semantics.
///
/// Every read advances the position by its nominal width, even past the
/// end of the buffer. The first clamped read latches `overran()`.
#[derive(Debug, Clone)]
pub struct BoundedReader<'a> {
    data: &'a [u8],
    pos: usize,
    overran: bool,
}

impl<'a> BoundedReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self::at(data, 0)
    }

    /// Cursor starting at `pos`.
    pub fn at(data: &'a [u8], pos: usize) -> Self {
        Self {
            data,
            pos,
            overran: false,
        }
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Whether any read so far went past the end of the buffer.
    #[inline]
    pub fn overran(&self) -> bool {
        self.overran
    }

    /// Move the cursor forward without reading.
    #[inline]
    pub fn skip(&mut self, n: usize) {
        self.pos = self.pos.saturating_add(n);
        if self.pos > self.data.len() {
            self.overran = true;
        }
    }

    #[inline]
    pub fn read(&mut self, width: usize, endian: Endian) -> u64 {
        let (value, end) = read_fixed(self.data, self.pos, width, endian);
        if end > self.data.len() {
            self.overran = true;
        }
        self.pos = end;
        value
    }

    #[inline]
    pub fn read_be(&mut self, width: usize) -> u64 {
        self.read(width, Endian::Big)
    }

    #[inline]
    pub fn read_le(&mut self, width: usize) -> u64 {
        self.read(width, Endian::Little)
    }

    #[inline]
    pub fn read_u8(&mut self) -> u8 {
        self.read(1, Endian::Little) as u8
    }

    #[inline]
    pub fn read_u32_le(&mut self) -> u32 {
        self.read_le(4) as u32
    }

    /// Borrow up to `n` bytes and advance by exactly `n`.
    ///
    /// The returned slice is shorter than `n` when the buffer ends first;
    /// the missing tail reads as zero.
    pub fn take(&mut self, n: usize) -> &'a [u8] {
        let data = self.data;
        let start = self.pos.min(data.len());
        let end = self.pos.saturating_add(n);
        if end > data.len() {
            self.overran = true;
        }
        self.pos = end;
        &data[start..end.min(data.len())]
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn big_and_little_endian() {
        let buf = [0x12, 0x34, 0x56, 0x78];
        assert_eq!(read_fixed(&buf, 0, 3, Endian::Big), (0x12_3456, 3));
        assert_eq!(read_fixed(&buf, 0, 4, Endian::Little), (0x7856_3412, 4));
        assert_eq!(read_fixed(&buf, 2, 2, Endian::Big), (0x5678, 4));
        assert_eq!(read_fixed(&buf, 3, 1, Endian::Little), (0x78, 4));
    }

    #[test]
    fn full_width_read() {
        let buf = [1, 2, 3, 4, 5, 6, 7, 8];
        let (be, _) = read_fixed(&buf, 0, 8, Endian::Big);
        let (le, _) = read_fixed(&buf, 0, 8, Endian::Little);
        assert_eq!(be, 0x0102_0304_0506_0708);
        assert_eq!(le, 0x0807_0605_0403_0201);
    }

    #[test]
    fn overrun_returns_zero_and_advances() {
        let buf = [0xFF, 0xFF];
        assert_eq!(read_fixed(&buf, 1, 2, Endian::Big), (0, 3));
        assert_eq!(read_fixed(&buf, 5, 4, Endian::Little), (0, 9));
    }

    #[test]
    fn huge_offset_saturates() {
        let buf = [0u8; 4];
        assert_eq!(read_fixed(&buf, usize::MAX - 1, 4, Endian::Big), (0, usize::MAX));
    }

    #[test]
    fn cursor_latches_overrun() {
        let mut r = BoundedReader::new(&[0xAB, 0xCD, 0xEF]);
        assert_eq!(r.read_be(2), 0xABCD);
        assert!(!r.overran());
        assert_eq!(r.read_be(2), 0);
        assert!(r.overran());
        assert_eq!(r.position(), 4);
        // The valid trailing byte is not re-read.
        assert_eq!(r.read_u8(), 0);
        assert_eq!(r.position(), 5);
    }

    #[test]
    fn take_returns_available_prefix() {
        let data = [1, 2, 3, 4, 5];
        let mut r = BoundedReader::at(&data, 3);
        assert_eq!(r.take(4), &[4, 5]);
        assert_eq!(r.position(), 7);
        assert!(r.overran());
        assert!(r.take(2).is_empty());
    }

    #[test]
    fn skip_past_end_sets_overran() {
        let mut r = BoundedReader::new(&[0u8; 4]);
        r.skip(4);
        assert!(!r.overran());
        r.skip(1);
        assert!(r.overran());
    }
}
