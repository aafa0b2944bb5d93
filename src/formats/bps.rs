// BPS decoder.
//
// Layout:
//   "BPS1" input_size (varint) output_size (varint) metadata_size (varint)
//   metadata[metadata_size]
//   action*  : word (varint); action = word & 3, length = (word >> 2) + 1
//   input_crc (4, LE) output_crc (4, LE) patch_crc (4, LE)
//
// Actions:
//   0 SourceRead  copy from the source at the current output position
//   1 TargetRead  copy literal bytes from the patch
//   2 SourceCopy  copy from the source at a relative cursor
//   3 TargetCopy  copy from already-written output at a relative cursor
//
// The two relative cursors are moved by a signed delta stored as a varint
// with the sign in bit 0 and the magnitude in the remaining bits.
// TargetCopy is byte-at-a-time, so a cursor just behind the output
// position repeats bytes (LZ77-style runs).

use crate::codec::{BoundedReader, varint};
use crate::engine::{PatchOptions, PatchOutput, PatchStatus};

use super::{Checksums, FOOTER_LEN, allocate_output, to_len};

pub const MAGIC: &[u8] = b"BPS1";

const HEADER_LEN: usize = 4;
/// Smallest patch the reference patchers accept.
const MIN_PATCH_LEN: usize = HEADER_LEN + 3 + 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    SourceRead,
    TargetRead,
    SourceCopy,
    TargetCopy,
}

impl Action {
    #[inline]
    fn from_word(word: u64) -> Self {
        match word & 3 {
            0 => Self::SourceRead,
            1 => Self::TargetRead,
            2 => Self::SourceCopy,
            _ => Self::TargetCopy,
        }
    }
}

/// Parsed BPS header and footer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BpsHeader {
    pub input_size: u64,
    pub output_size: u64,
    pub metadata_size: u64,
    /// Offset of the metadata block.
    pub metadata_offset: usize,
    /// Offset of the first action (just past the metadata).
    pub body_offset: usize,
    pub checksums: Checksums,
}

impl BpsHeader {
    pub fn parse(patch: &[u8]) -> Result<Self, PatchStatus> {
        if patch.len() < MIN_PATCH_LEN || !patch.starts_with(MAGIC) {
            return Err(PatchStatus::InvalidPatch);
        }
        let mut r = BoundedReader::at(patch, HEADER_LEN);
        let input_size = varint::read_from(&mut r);
        let output_size = varint::read_from(&mut r);
        let metadata_size = varint::read_from(&mut r);
        let metadata_offset = r.position();
        let body_offset = metadata_offset.saturating_add(to_len(metadata_size));
        Ok(Self {
            input_size,
            output_size,
            metadata_size,
            metadata_offset,
            body_offset,
            checksums: Checksums::read_tail(patch),
        })
    }

    /// The metadata block, cut short if it runs into the footer.
    pub fn metadata<'a>(&self, patch: &'a [u8]) -> &'a [u8] {
        let limit = patch.len().saturating_sub(FOOTER_LEN);
        let start = self.metadata_offset.min(limit);
        let end = self.body_offset.min(limit);
        &patch[start..end]
    }
}

/// Decode a sign-and-magnitude relative offset.
#[inline]
fn read_delta(r: &mut BoundedReader<'_>) -> i64 {
    let word = varint::read_from(r);
    let magnitude = (word >> 1) as i64;
    if word & 1 != 0 { -magnitude } else { magnitude }
}

/// Apply a BPS patch.
pub fn apply(source: &[u8], patch: &[u8], options: &PatchOptions) -> PatchOutput {
    let header = match BpsHeader::parse(patch) {
        Ok(h) => h,
        Err(status) => return PatchOutput::failed(status),
    };
    log::debug!(
        "BPS: input {} bytes, output {} bytes, metadata {} bytes, crc in {:#010X} out {:#010X}",
        header.input_size,
        header.output_size,
        header.metadata_size,
        header.checksums.input,
        header.checksums.output
    );

    if (source.len() as u64) < header.input_size {
        log::debug!(
            "BPS: source has {} bytes, patch expects {}",
            source.len(),
            header.input_size
        );
        return PatchOutput::failed(PatchStatus::SizeMismatch);
    }
    let covered = &source[..header.input_size as usize];
    if let Err(status) = header.checksums.check_inputs(covered, patch, options) {
        return PatchOutput::failed(status);
    }

    let body_end = patch.len() - FOOTER_LEN;
    if options.strict && header.body_offset > body_end {
        return PatchOutput::failed(PatchStatus::InvalidPatch);
    }

    let mut output = match allocate_output(header.output_size, options) {
        Ok(buf) => buf,
        Err(status) => return PatchOutput::failed(status),
    };
    let out_len = output.len();

    let mut p = BoundedReader::at(patch, header.body_offset);
    let mut out_pos = 0usize;
    let mut source_rel = 0usize;
    let mut target_rel = 0usize;

    while p.position() < body_end {
        let word = varint::read_from(&mut p);
        let action = Action::from_word(word);
        let length = to_len((word >> 2) + 1);
        // Every action stops once the output is full.
        let room = length.min(out_len - out_pos);

        match action {
            Action::SourceRead => {
                let end = (out_pos + room).min(source.len());
                if out_pos < end {
                    output[out_pos..end].copy_from_slice(&source[out_pos..end]);
                    out_pos = end;
                }
            }
            Action::TargetRead => {
                // Bytes past the end of the patch stay zero.
                let data = p.take(room);
                output[out_pos..out_pos + data.len()].copy_from_slice(data);
                out_pos += room;
            }
            Action::SourceCopy => {
                let delta = read_delta(&mut p);
                source_rel = source_rel.wrapping_add_signed(delta as isize);
                for _ in 0..room {
                    output[out_pos] = source.get(source_rel).copied().unwrap_or(0);
                    out_pos += 1;
                    source_rel = source_rel.wrapping_add(1);
                }
            }
            Action::TargetCopy => {
                let delta = read_delta(&mut p);
                target_rel = target_rel.wrapping_add_signed(delta as isize);
                for _ in 0..room {
                    output[out_pos] = output.get(target_rel).copied().unwrap_or(0);
                    out_pos += 1;
                    target_rel = target_rel.wrapping_add(1);
                }
            }
        }
        log::trace!("BPS: {action:?} x{length}, output at {out_pos}");
    }

    if options.strict && p.overran() {
        return PatchOutput::failed(PatchStatus::InvalidPatch);
    }

    // Bytes no action wrote are still zero from the allocation.
    PatchOutput::verified(output, header.checksums.output)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
