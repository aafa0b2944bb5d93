// Patch engine: result taxonomy, options and format dispatch.
//
// Every decode call is a pure function of (source, patch, options). The
// outcome is always a `PatchOutput`: the produced bytes plus a status code.
// Only `Success` and `ChecksumMismatch` carry bytes; every other status
// comes back with an empty buffer.

use std::fmt;

use crate::codec::crc32;
use crate::formats::{PatchFormat, bps, ips, ups};

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Outcome of applying a patch.
///
/// The discriminants are stable and usable as numeric result codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum PatchStatus {
    Success = 0,
    /// Bad magic, or the patch is too short to hold a header and footer.
    InvalidPatch = 1,
    /// The requested format name is not IPS, UPS or BPS.
    UnknownFormat = 2,
    /// The source is smaller than the patch's declared input size.
    SizeMismatch = 3,
    /// Decoding finished but the output CRC-32 differs from the stored one.
    /// The output is still returned.
    ChecksumMismatch = 4,
    /// Source CRC-32 differs from the stored one (only with
    /// `PatchOptions::verify_source_crc`).
    SourceChecksumMismatch = 5,
    /// Patch CRC-32 differs from the stored one (only with
    /// `PatchOptions::verify_patch_crc`).
    PatchChecksumMismatch = 6,
}

impl PatchStatus {
    #[inline]
    pub fn code(self) -> u32 {
        self as u32
    }

    #[inline]
    pub fn is_success(self) -> bool {
        self == Self::Success
    }

    /// Machine-friendly name, used in JSON stats.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::InvalidPatch => "invalid_patch",
            Self::UnknownFormat => "unknown_format",
            Self::SizeMismatch => "size_mismatch",
            Self::ChecksumMismatch => "checksum_mismatch",
            Self::SourceChecksumMismatch => "source_checksum_mismatch",
            Self::PatchChecksumMismatch => "patch_checksum_mismatch",
        }
    }
}

impl fmt::Display for PatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error form of every non-success `PatchStatus`, for use with `?`.
#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    #[error("invalid patch")]
    InvalidPatch,
    #[error("unknown patch format")]
    UnknownFormat,
    #[error("source is smaller than the patch's declared input size")]
    SizeMismatch,
    /// Output bytes are present but untrusted.
    #[error("output checksum mismatch (got {actual:#010X})")]
    ChecksumMismatch { output: Vec<u8>, actual: u32 },
    #[error("source checksum mismatch")]
    SourceChecksumMismatch,
    #[error("patch checksum mismatch")]
    PatchChecksumMismatch,
}

impl PatchError {
    pub fn status(&self) -> PatchStatus {
        match self {
            Self::InvalidPatch => PatchStatus::InvalidPatch,
            Self::UnknownFormat => PatchStatus::UnknownFormat,
            Self::SizeMismatch => PatchStatus::SizeMismatch,
            Self::ChecksumMismatch { .. } => PatchStatus::ChecksumMismatch,
            Self::SourceChecksumMismatch => PatchStatus::SourceChecksumMismatch,
            Self::PatchChecksumMismatch => PatchStatus::PatchChecksumMismatch,
        }
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Bytes produced by a decode together with its status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchOutput {
    pub data: Vec<u8>,
    pub status: PatchStatus,
}

impl PatchOutput {
    /// Fatal outcome: no bytes.
    pub(crate) fn failed(status: PatchStatus) -> Self {
        debug_assert!(status != PatchStatus::Success && status != PatchStatus::ChecksumMismatch);
        Self {
            data: Vec::new(),
            status,
        }
    }

    pub(crate) fn success(data: Vec<u8>) -> Self {
        Self {
            data,
            status: PatchStatus::Success,
        }
    }

    /// Compare the CRC-32 of `data` with the CRC stored in the patch.
    pub(crate) fn verified(data: Vec<u8>, expected_crc: u32) -> Self {
        let actual = crc32(&data);
        if actual == expected_crc {
            return Self::success(data);
        }
        log::warn!("output checksum mismatch: expected {expected_crc:#010X}, got {actual:#010X}");
        Self {
            data,
            status: PatchStatus::ChecksumMismatch,
        }
    }

    #[inline]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Convert into a `Result`, keeping the untrusted bytes of a
    /// checksum mismatch inside the error.
    pub fn into_result(self) -> Result<Vec<u8>, PatchError> {
        match self.status {
            PatchStatus::Success => Ok(self.data),
            PatchStatus::InvalidPatch => Err(PatchError::InvalidPatch),
            PatchStatus::UnknownFormat => Err(PatchError::UnknownFormat),
            PatchStatus::SizeMismatch => Err(PatchError::SizeMismatch),
            PatchStatus::ChecksumMismatch => {
                let actual = crc32(&self.data);
                Err(PatchError::ChecksumMismatch {
                    output: self.data,
                    actual,
                })
            }
            PatchStatus::SourceChecksumMismatch => Err(PatchError::SourceChecksumMismatch),
            PatchStatus::PatchChecksumMismatch => Err(PatchError::PatchChecksumMismatch),
        }
    }
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Decoder configuration. The default reproduces the lenient behaviour of
/// the reference patchers for all three formats.
#[derive(Debug, Clone, Default)]
pub struct PatchOptions {
    /// Treat any read past the end of the patch as `InvalidPatch`.
    pub strict: bool,
    /// UPS/BPS: check the stored source CRC-32 before decoding.
    pub verify_source_crc: bool,
    /// UPS/BPS: check the stored patch CRC-32 before decoding.
    pub verify_patch_crc: bool,
    /// Reject patches whose output would be larger than this many bytes.
    pub max_output_size: Option<u64>,
}

impl PatchOptions {
    /// Strict reads and all checksums verified.
    pub fn hardened() -> Self {
        Self {
            strict: true,
            verify_source_crc: true,
            verify_patch_crc: true,
            max_output_size: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Apply `patch` to `source` with default options.
pub fn patch(source: &[u8], patch: &[u8], format: PatchFormat) -> PatchOutput {
    patch_with_options(source, patch, format, &PatchOptions::default())
}

/// Apply `patch` to `source`.
pub fn patch_with_options(
    source: &[u8],
    patch: &[u8],
    format: PatchFormat,
    options: &PatchOptions,
) -> PatchOutput {
    log::debug!(
        "applying {format} patch: source {} bytes, patch {} bytes",
        source.len(),
        patch.len()
    );
    let out = match format {
        PatchFormat::Ips => ips::apply(source, patch, options),
        PatchFormat::Ups => ups::apply(source, patch, options),
        PatchFormat::Bps => bps::apply(source, patch, options),
    };
    log::debug!(
        "{format} patch finished: {} ({} output bytes)",
        out.status,
        out.data.len()
    );
    out
}

/// Apply a patch whose format is given by name (`"ips"`, `"ups"`, `"bps"`).
///
/// An unrecognised name yields `UnknownFormat` without looking at the
/// patch bytes.
pub fn patch_by_name(source: &[u8], patch_data: &[u8], name: &str) -> PatchOutput {
    match name.parse::<PatchFormat>() {
        Ok(format) => patch(source, patch_data, format),
        Err(_) => {
            log::debug!("unknown patch format name {name:?}");
            PatchOutput::failed(PatchStatus::UnknownFormat)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
