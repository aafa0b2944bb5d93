// Patch format decoders.
//
// # Modules
//
// - `ips` : "PATCH" record stream, implicit output size
// - `ups` : "UPS1" XOR runs with CRC-32 footer
// - `bps` : "BPS1" four-action copy stream with CRC-32 footer
//
// The three formats share the primitives in `crate::codec` but have no
// common trait; `PatchFormat` is the closed set the dispatcher matches on.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::codec::BoundedReader;
use crate::codec::crc32;
use crate::engine::{PatchError, PatchOptions, PatchStatus};

pub mod bps;
pub mod ips;
pub mod ups;

pub use bps::BpsHeader;
pub use ips::IpsScan;
pub use ups::UpsHeader;

// ---------------------------------------------------------------------------
// Format tag
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatchFormat {
    Ips,
    Ups,
    Bps,
}

impl PatchFormat {
    pub const ALL: [PatchFormat; 3] = [Self::Ips, Self::Ups, Self::Bps];

    pub fn name(self) -> &'static str {
        match self {
            Self::Ips => "IPS",
            Self::Ups => "UPS",
            Self::Bps => "BPS",
        }
    }

    /// Conventional file extension, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Ips => "ips",
            Self::Ups => "ups",
            Self::Bps => "bps",
        }
    }

    /// Header magic.
    pub fn magic(self) -> &'static [u8] {
        match self {
            Self::Ips => ips::MAGIC,
            Self::Ups => ups::MAGIC,
            Self::Bps => bps::MAGIC,
        }
    }

    /// Pick a format from a file extension (`.ips`, `.ups`, `.bps`).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        Self::ALL
            .into_iter()
            .find(|f| f.extension().eq_ignore_ascii_case(ext))
    }

    /// Pick a format from the leading magic bytes of a patch.
    pub fn detect(patch: &[u8]) -> Option<Self> {
        Self::ALL.into_iter().find(|f| patch.starts_with(f.magic()))
    }
}

impl fmt::Display for PatchFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PatchFormat {
    type Err = PatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().trim_start_matches('.');
        Self::ALL
            .into_iter()
            .find(|f| f.extension().eq_ignore_ascii_case(s))
            .ok_or(PatchError::UnknownFormat)
    }
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Size of the UPS/BPS checksum footer.
pub(crate) const FOOTER_LEN: usize = 12;

/// The three CRC-32 values at the tail of a UPS or BPS patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Checksums {
    pub input: u32,
    pub output: u32,
    pub patch: u32,
}

impl Checksums {
    /// Read the footer from the last 12 bytes of `patch`.
    pub(crate) fn read_tail(patch: &[u8]) -> Self {
        let mut r = BoundedReader::at(patch, patch.len().saturating_sub(FOOTER_LEN));
        Self {
            input: r.read_u32_le(),
            output: r.read_u32_le(),
            patch: r.read_u32_le(),
        }
    }

    /// Optional pre-decode checks of the source and patch CRCs.
    ///
    /// `source` is the prefix covered by the declared input size.
    pub(crate) fn check_inputs(
        &self,
        source: &[u8],
        patch: &[u8],
        options: &PatchOptions,
    ) -> Result<(), PatchStatus> {
        if options.verify_patch_crc {
            let body = &patch[..patch.len().saturating_sub(4)];
            let actual = crc32(body);
            if actual != self.patch {
                log::warn!(
                    "patch checksum mismatch: expected {:#010X}, got {actual:#010X}",
                    self.patch
                );
                return Err(PatchStatus::PatchChecksumMismatch);
            }
        }
        if options.verify_source_crc {
            let actual = crc32(source);
            if actual != self.input {
                log::warn!(
                    "source checksum mismatch: expected {:#010X}, got {actual:#010X}",
                    self.input
                );
                return Err(PatchStatus::SourceChecksumMismatch);
            }
        }
        Ok(())
    }
}

/// Narrow a decoded length or offset, saturating where `usize` is smaller.
#[inline]
pub(crate) fn to_len(n: u64) -> usize {
    usize::try_from(n).unwrap_or(usize::MAX)
}

/// Allocate a zero-filled output buffer of `size` bytes.
///
/// Fails (as `InvalidPatch`) when the size exceeds the configured limit,
/// does not fit in memory, or the allocation itself fails.
pub(crate) fn allocate_output(size: u64, options: &PatchOptions) -> Result<Vec<u8>, PatchStatus> {
    if let Some(limit) = options.max_output_size
        && size > limit
    {
        log::warn!("declared output size {size} exceeds limit {limit}");
        return Err(PatchStatus::InvalidPatch);
    }
    let len = usize::try_from(size).map_err(|_| PatchStatus::InvalidPatch)?;
    let mut output = Vec::new();
    if output.try_reserve_exact(len).is_err() {
        log::warn!("cannot allocate {len} output bytes");
        return Err(PatchStatus::InvalidPatch);
    }
    output.resize(len, 0);
    Ok(output)
}
