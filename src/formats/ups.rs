// UPS decoder.
//
// Layout:
//   "UPS1" input_size (varint) output_size (varint)
//   hunk*   : skip (varint) xor[...] 0x00
//   input_crc (4, LE) output_crc (4, LE) patch_crc (4, LE)
//
// Source and output share one cursor. A hunk copies `skip` source bytes
// unchanged, then XORs source bytes with patch bytes up to and including
// a zero patch byte (which leaves its source byte unchanged). Because XOR
// is self-inverse, applying a patch to its own output gives back the
// input when the sizes match.

use crate::codec::{BoundedReader, varint};
use crate::engine::{PatchOptions, PatchOutput, PatchStatus};

use super::{Checksums, FOOTER_LEN, allocate_output, to_len};

pub const MAGIC: &[u8] = b"UPS1";

const HEADER_LEN: usize = 4;
/// Magic, two one-byte sizes and the checksum footer.
const MIN_PATCH_LEN: usize = HEADER_LEN + 2 + FOOTER_LEN;

/// Parsed UPS header and footer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsHeader {
    pub input_size: u64,
    pub output_size: u64,
    pub checksums: Checksums,
    /// Offset of the first hunk.
    pub body_offset: usize,
}

impl UpsHeader {
    pub fn parse(patch: &[u8]) -> Result<Self, PatchStatus> {
        if patch.len() < MIN_PATCH_LEN || !patch.starts_with(MAGIC) {
            return Err(PatchStatus::InvalidPatch);
        }
        let mut r = BoundedReader::at(patch, HEADER_LEN);
        let input_size = varint::read_from(&mut r);
        let output_size = varint::read_from(&mut r);
        Ok(Self {
            input_size,
            output_size,
            checksums: Checksums::read_tail(patch),
            body_offset: r.position(),
        })
    }
}

/// Apply a UPS patch.
pub fn apply(source: &[u8], patch: &[u8], options: &PatchOptions) -> PatchOutput {
    let header = match UpsHeader::parse(patch) {
        Ok(h) => h,
        Err(status) => return PatchOutput::failed(status),
    };
    log::debug!(
        "UPS: input {} bytes, output {} bytes, crc in {:#010X} out {:#010X}",
        header.input_size,
        header.output_size,
        header.checksums.input,
        header.checksums.output
    );

    // A larger source is accepted; only a short one is rejected.
    if (source.len() as u64) < header.input_size {
        log::debug!(
            "UPS: source has {} bytes, patch expects {}",
            source.len(),
            header.input_size
        );
        return PatchOutput::failed(PatchStatus::SizeMismatch);
    }
    let covered = &source[..header.input_size as usize];
    if let Err(status) = header.checksums.check_inputs(covered, patch, options) {
        return PatchOutput::failed(status);
    }

    let mut output = match allocate_output(header.output_size, options) {
        Ok(buf) => buf,
        Err(status) => return PatchOutput::failed(status),
    };
    let out_len = output.len();
    let body_end = patch.len() - FOOTER_LEN;

    let mut p = BoundedReader::at(patch, header.body_offset);
    let mut pos = 0usize;

    while p.position() < body_end {
        let skip = to_len(varint::read_from(&mut p));
        copy_source(&mut output, source, pos, skip);
        pos = pos.saturating_add(skip);

        // XOR run; writes past the end of the output are dropped.
        loop {
            let x = p.read_u8();
            if let Some(slot) = output.get_mut(pos) {
                *slot = source.get(pos).copied().unwrap_or(0) ^ x;
            }
            pos = pos.saturating_add(1);
            if x == 0 {
                break;
            }
        }
        log::trace!("UPS: hunk skip {skip}, cursor now {pos}");
    }

    if options.strict && p.overran() {
        return PatchOutput::failed(PatchStatus::InvalidPatch);
    }

    // Unpatched tail: remaining source bytes, zero past the source end.
    if pos < out_len {
        copy_source(&mut output, source, pos, out_len - pos);
    }

    PatchOutput::verified(output, header.checksums.output)
}

/// Copy `len` source bytes at `pos` into the output at the same position.
/// Missing source bytes are left zero; anything past the output is dropped.
fn copy_source(output: &mut [u8], source: &[u8], pos: usize, len: usize) {
    let end = pos.saturating_add(len).min(output.len());
    if pos >= end {
        return;
    }
    let src_end = end.min(source.len());
    if pos < src_end {
        output[pos..src_end].copy_from_slice(&source[pos..src_end]);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::crc32;
    use crate::codec::varint::write_varint;

    /// Assemble a UPS patch with a correct footer for `source` -> `target`.
    fn build(source: &[u8], target: &[u8], hunks: &[u8]) -> Vec<u8> {
        let mut p = MAGIC.to_vec();
        write_varint(&mut p, source.len() as u64).unwrap();
        write_varint(&mut p, target.len() as u64).unwrap();
        p.extend_from_slice(hunks);
        p.extend_from_slice(&crc32(source).to_le_bytes());
        p.extend_from_slice(&crc32(target).to_le_bytes());
        let patch_crc = crc32(&p);
        p.extend_from_slice(&patch_crc.to_le_bytes());
        p
    }

    fn apply_default(source: &[u8], patch: &[u8]) -> PatchOutput {
        apply(source, patch, &PatchOptions::default())
    }

    #[test]
    fn single_byte_change() {
        let source = b"ABCDEF";
        let target = b"ABxDEF";
        let patch = build(source, target, &[0x82, b'C' ^ b'x', 0x00]);
        let out = apply_default(source, &patch);
        assert_eq!(out.status, PatchStatus::Success);
        assert_eq!(out.data, target);
    }

    #[test]
    fn grows_past_source() {
        let source = b"AB";
        let target = b"ABCD";
        let patch = build(source, target, &[0x82, b'C', b'D', 0x00]);
        let out = apply_default(source, &patch);
        assert_eq!(out.status, PatchStatus::Success);
        assert_eq!(out.data, target);
    }

    #[test]
    fn shrinks_with_empty_body() {
        let source = b"ABCDEF";
        let target = b"ABC";
        let patch = build(source, target, &[]);
        assert_eq!(patch.len(), MIN_PATCH_LEN);
        let out = apply_default(source, &patch);
        assert_eq!(out.status, PatchStatus::Success);
        assert_eq!(out.data, target);
    }

    #[test]
    fn pads_with_zero_past_source() {
        let source = b"AB";
        let target = b"AB\0\0";
        let patch = build(source, target, &[]);
        let out = apply_default(source, &patch);
        assert_eq!(out.status, PatchStatus::Success);
        assert_eq!(out.data, target);
    }

    #[test]
    fn reapplying_restores_input() {
        let source = b"hello world";
        let target = b"jello wurld";
        let mut hunks = vec![0x80, b'h' ^ b'j', 0x00];
        // Cursor is at 2 after the first hunk; next change is at 7.
        hunks.extend_from_slice(&[0x85, b'o' ^ b'u', 0x00]);
        let patch = build(source, target, &hunks);

        let forward = apply_default(source, &patch);
        assert_eq!(forward.status, PatchStatus::Success);
        assert_eq!(forward.data, target);

        let back = apply_default(&forward.data, &patch);
        assert_eq!(back.data, source);
        // The stored output CRC is the target's, so the reverse run flags it.
        assert_eq!(back.status, PatchStatus::ChecksumMismatch);
    }

    #[test]
    fn corrupted_output_crc() {
        let source = b"ABCDEF";
        let target = b"ABxDEF";
        let mut patch = build(source, target, &[0x82, b'C' ^ b'x', 0x00]);
        let at = patch.len() - 8;
        patch[at] ^= 0xFF;
        let out = apply_default(source, &patch);
        assert_eq!(out.status, PatchStatus::ChecksumMismatch);
        assert_eq!(out.data, target);
    }

    #[test]
    fn short_source_is_size_mismatch() {
        let source = b"ABCDEF";
        let patch = build(source, b"ABCDEF", &[]);
        let out = apply_default(b"ABC", &patch);
        assert_eq!(out.status, PatchStatus::SizeMismatch);
        assert!(out.data.is_empty());
    }

    #[test]
    fn longer_source_is_tolerated() {
        let patch = build(b"ABC", b"ABx", &[0x82, b'C' ^ b'x', 0x00]);
        let out = apply_default(b"ABCDEFG", &patch);
        assert_eq!(out.status, PatchStatus::Success);
        assert_eq!(out.data, b"ABx");
    }

    #[test]
    fn bad_magic_and_short_patch() {
        let mut patch = build(b"A", b"B", &[0x80, b'A' ^ b'B', 0x00]);
        patch[3] = b'2';
        assert_eq!(apply_default(b"A", &patch).status, PatchStatus::InvalidPatch);
        assert_eq!(
            apply_default(b"A", &patch[..MIN_PATCH_LEN - 1]).status,
            PatchStatus::InvalidPatch
        );
    }

    #[test]
    fn optional_input_checks() {
        let source = b"ABCDEF";
        let target = b"ABxDEF";
        let patch = build(source, target, &[0x82, b'C' ^ b'x', 0x00]);
        let hardened = PatchOptions::hardened();

        assert_eq!(apply(source, &patch, &hardened).status, PatchStatus::Success);

        let out = apply(b"ABCDEx", &patch, &hardened);
        assert_eq!(out.status, PatchStatus::SourceChecksumMismatch);
        assert!(out.data.is_empty());

        let mut tampered = patch.clone();
        tampered[7] ^= 0x01;
        let out = apply(source, &tampered, &hardened);
        assert_eq!(out.status, PatchStatus::PatchChecksumMismatch);
    }

    #[test]
    fn xor_run_into_footer_keeps_tail_crcs() {
        // The only hunk has no terminator, so its run reads on into the
        // checksum footer. Those writes land past the declared output and
        // are dropped; the CRCs still come from the last 12 bytes.
        let patch = build(b"A", b"Z", &[0x80, b'A' ^ b'Z']);
        let header = UpsHeader::parse(&patch).unwrap();
        assert_eq!(header.checksums.output, crc32(b"Z"));

        let out = apply_default(b"A", &patch);
        assert_eq!(out.status, PatchStatus::Success);
        assert_eq!(out.data, b"Z");
    }

    #[test]
    fn xor_run_past_output_end_keeps_parsing() {
        let source = b"ABCD";
        let target = b"ab";
        // First run covers positions 0..4 of a 2-byte output; the second
        // hunk starts after its terminator.
        let hunks = [
            0x80,
            b'A' ^ b'a',
            b'B' ^ b'b',
            0x11,
            0x22,
            0x00,
            0x80,
            0x33,
            0x00,
        ];
        let patch = build(source, target, &hunks);
        let strict = PatchOptions {
            strict: true,
            ..Default::default()
        };
        let out = apply(source, &patch, &strict);
        assert_eq!(out.status, PatchStatus::Success);
        assert_eq!(out.data, target);
    }

    #[test]
    fn header_fields() {
        let patch = build(b"ABCDEF", b"ABC", &[]);
        let header = UpsHeader::parse(&patch).unwrap();
        assert_eq!(header.input_size, 6);
        assert_eq!(header.output_size, 3);
        assert_eq!(header.body_offset, 6);
        assert_eq!(header.checksums.output, crc32(b"ABC"));
        assert_eq!(header.checksums.input, crc32(b"ABCDEF"));
    }
}
