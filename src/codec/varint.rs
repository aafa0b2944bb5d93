// Run-length integer encoding shared by UPS and BPS.
//
// Little-endian groups of 7 bits. A byte with bit 7 SET terminates the
// number (the opposite convention to LEB128). After every non-terminal
// byte the shift grows by 7 bits and the new shift is added to the
// accumulator, so each encoding length covers a disjoint value range and
// there are no redundant encodings.

use std::io::{self, Write};

use super::reader::BoundedReader;

/// Maximum encoded length for a 64-bit value.
pub const MAX_VARINT_LEN: usize = 10;

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decode a varint at `offset`, returning `(value, new_offset)`.
///
/// Bytes are read with bounded-read semantics: past the end of `buf` they
/// read as zero. Decoding stops at the terminator byte or as soon as the
/// offset has run past the buffer, so a truncated varint always finishes.
/// Arithmetic wraps on values beyond 64 bits.
pub fn read_varint(buf: &[u8], offset: usize) -> (u64, usize) {
    let mut reader = BoundedReader::at(buf, offset);
    let value = read_from(&mut reader);
    (value, reader.position())
}

/// Decode a varint from a cursor, advancing it.
pub fn read_from(reader: &mut BoundedReader<'_>) -> u64 {
    let mut value: u64 = 0;
    let mut shift: u64 = 1;

    loop {
        let byte = u64::from(reader.read_u8());
        value = value.wrapping_add((byte & 0x7F).wrapping_mul(shift));

        if byte & 0x80 != 0 || reader.overran() {
            break;
        }

        shift <<= 7;
        value = value.wrapping_add(shift);
    }

    value
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Encode `num` into `buf`, returning the number of bytes written (1..=10).
#[inline]
pub fn encode_varint(mut num: u64, buf: &mut [u8; MAX_VARINT_LEN]) -> usize {
    let mut i = 0;
    loop {
        let low = (num & 0x7F) as u8;
        num >>= 7;
        if num == 0 {
            buf[i] = low | 0x80;
            return i + 1;
        }
        buf[i] = low;
        i += 1;
        num -= 1;
    }
}

/// Encode `num` and write it to a `Write` sink.
pub fn write_varint<W: Write>(w: &mut W, num: u64) -> io::Result<()> {
    let mut buf = [0u8; MAX_VARINT_LEN];
    let len = encode_varint(num, &mut buf);
    w.write_all(&buf[..len])
}

/// Encoded byte-length of `num`.
pub fn sizeof_varint(num: u64) -> usize {
    let mut buf = [0u8; MAX_VARINT_LEN];
    encode_varint(num, &mut buf)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
