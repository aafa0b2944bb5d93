// IPS decoder.
//
// Layout:
//   "PATCH"
//   record*  : offset (3, BE) size (2, BE) data[size]
//            | offset (3, BE) 0x0000 count (2, BE) value (1)    -- RLE
//   "EOF"
//   [size (3, BE)]                                              -- optional
//
// IPS never declares the output size, so a first pass over the records
// finds the furthest byte touched. A 3-byte value directly after "EOF"
// that ends the file is a de-facto extension giving the full target size;
// it acts as a lower bound.

use std::ops::Range;

use crate::codec::BoundedReader;
use crate::engine::{PatchOptions, PatchOutput, PatchStatus};

use super::allocate_output;

pub const MAGIC: &[u8] = b"PATCH";

const HEADER_LEN: usize = 5;
/// Header plus the "EOF" marker.
const MIN_PATCH_LEN: usize = HEADER_LEN + 3;
/// "EOF" read as a 3-byte big-endian offset.
const EOF_MARKER: u64 = 0x45_4F46;

/// Summary of an IPS record stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IpsScan {
    /// Bytes needed to hold every record (and the footer size, if any).
    pub output_size: usize,
    /// Total records, literal and RLE.
    pub records: usize,
    pub rle_records: usize,
    /// Trailing target size after "EOF".
    pub footer_size: Option<usize>,
    /// Whether the "EOF" marker was found.
    pub eof: bool,
    /// Whether any record ran past the end of the patch.
    pub overran: bool,
}

/// Walk the record stream of `patch` (header assumed present) and compute
/// the output size.
pub fn scan(patch: &[u8]) -> IpsScan {
    let mut info = IpsScan::default();
    let mut r = BoundedReader::at(patch, HEADER_LEN);

    while r.position() < patch.len() {
        let offset = r.read_be(3);
        if offset == EOF_MARKER {
            info.eof = true;
            break;
        }

        let size = r.read_be(2);
        let end = if size == 0 {
            let count = r.read_be(2);
            r.skip(1);
            info.rle_records += 1;
            offset + count
        } else {
            r.skip(size as usize);
            offset + size
        };

        info.records += 1;
        info.output_size = info.output_size.max(end as usize);
    }

    if r.position().checked_add(3) == Some(patch.len()) {
        let footer = r.read_be(3) as usize;
        info.footer_size = Some(footer);
        info.output_size = info.output_size.max(footer);
    }

    info.overran = r.overran();
    info
}

/// Apply an IPS patch.
pub fn apply(source: &[u8], patch: &[u8], options: &PatchOptions) -> PatchOutput {
    if patch.len() < MIN_PATCH_LEN || !patch.starts_with(MAGIC) {
        return PatchOutput::failed(PatchStatus::InvalidPatch);
    }

    let info = scan(patch);
    log::debug!(
        "IPS: {} records ({} RLE), output {} bytes, footer {:?}, eof {}",
        info.records,
        info.rle_records,
        info.output_size,
        info.footer_size,
        info.eof
    );
    if info.overran {
        if options.strict {
            return PatchOutput::failed(PatchStatus::InvalidPatch);
        }
        log::warn!("IPS: record stream runs past the end of the patch");
    }

    let mut output = match allocate_output(info.output_size as u64, options) {
        Ok(buf) => buf,
        Err(status) => return PatchOutput::failed(status),
    };
    let keep = output.len().min(source.len());
    output[..keep].copy_from_slice(&source[..keep]);
    let out_len = output.len();

    let mut r = BoundedReader::at(patch, HEADER_LEN);
    while r.position() < patch.len() {
        let offset = r.read_be(3);
        if offset == EOF_MARKER {
            break;
        }
        let offset = offset as usize;

        let size = r.read_be(2) as usize;
        if size == 0 {
            let count = r.read_be(2) as usize;
            let value = r.read_u8();
            log::trace!("IPS: RLE {offset:#08X} x{count} = {value:#04X}");
            output[clamp(offset, count, out_len)].fill(value);
        } else {
            // Bytes past the end of the patch read as zero.
            let data = r.take(size);
            log::trace!("IPS: literal {offset:#08X} +{size}");
            let dst = &mut output[clamp(offset, size, out_len)];
            let n = dst.len().min(data.len());
            dst[..n].copy_from_slice(&data[..n]);
            dst[n..].fill(0);
        }
    }

    PatchOutput::success(output)
}

/// `start..start + len`, cut to `limit`.
fn clamp(start: usize, len: usize, limit: usize) -> Range<usize> {
    let end = start.saturating_add(len).min(limit);
    start.min(limit)..end
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
