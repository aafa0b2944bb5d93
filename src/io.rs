// File-level helpers for applying patches.
//
// Both the source image and the patch are read fully into memory; the
// decoders have no streaming mode. Optionally computes a SHA-256 of the
// patched output (feature-gated behind `file-io`).

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

#[cfg(feature = "file-io")]
use sha2::Digest;

use crate::codec::crc32;
use crate::engine::{self, PatchOptions, PatchOutput, PatchStatus};
use crate::formats::PatchFormat;

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Statistics returned by `apply_file()`.
#[derive(Debug, Clone)]
pub struct ApplyStats {
    /// Format the patch was decoded as.
    pub format: PatchFormat,
    /// Source file size in bytes.
    pub source_size: u64,
    /// Patch file size in bytes.
    pub patch_size: u64,
    /// Patched output size in bytes (zero on fatal errors).
    pub output_size: u64,
    pub status: PatchStatus,
    /// CRC-32 of the output.
    pub output_crc32: u32,
    /// SHA-256 of the output (if `file-io` feature is enabled).
    pub output_sha256: Option<[u8; 32]>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error type for file I/O operations.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// I/O error (file open, read, write).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// Neither the extension nor the magic bytes identify the format.
    #[error("cannot determine patch format of {}", .0.display())]
    UnknownFormat(PathBuf),
}

// ---------------------------------------------------------------------------
// Format resolution
// ---------------------------------------------------------------------------

/// Explicit format, else the file extension, else the magic bytes.
pub fn resolve_format(
    explicit: Option<PatchFormat>,
    patch_path: &Path,
    patch: &[u8],
) -> Option<PatchFormat> {
    explicit
        .or_else(|| PatchFormat::from_path(patch_path))
        .or_else(|| {
            let detected = PatchFormat::detect(patch);
            if let Some(format) = detected {
                log::info!(
                    "{}: no recognised extension, detected {format} from header",
                    patch_path.display()
                );
            }
            detected
        })
}

// ---------------------------------------------------------------------------
// apply_file
// ---------------------------------------------------------------------------

/// Apply the patch at `patch_path` to the file at `source_path`.
///
/// Returns the decoder output (which may carry a non-success status) and
/// stats about the run. Only I/O failures and an unresolvable format are
/// reported as `Err`.
pub fn apply_file(
    source_path: &Path,
    patch_path: &Path,
    format: Option<PatchFormat>,
    options: &PatchOptions,
) -> Result<(PatchOutput, ApplyStats), IoError> {
    let source = std::fs::read(source_path)?;
    let patch = std::fs::read(patch_path)?;

    let format = resolve_format(format, patch_path, &patch)
        .ok_or_else(|| IoError::UnknownFormat(patch_path.to_path_buf()))?;

    let out = engine::patch_with_options(&source, &patch, format, options);

    #[cfg(feature = "file-io")]
    let output_sha256 = Some(sha2::Sha256::digest(&out.data).into());
    #[cfg(not(feature = "file-io"))]
    let output_sha256: Option<[u8; 32]> = None;

    let stats = ApplyStats {
        format,
        source_size: source.len() as u64,
        patch_size: patch.len() as u64,
        output_size: out.data.len() as u64,
        status: out.status,
        output_crc32: crc32(&out.data),
        output_sha256,
    };
    Ok((out, stats))
}

// ---------------------------------------------------------------------------
// write_output
// ---------------------------------------------------------------------------

const BUF_SIZE: usize = 64 * 1024; // 64 KiB

/// Write patched bytes to `path`, replacing any existing file.
pub fn write_output(path: &Path, data: &[u8]) -> Result<(), IoError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::with_capacity(BUF_SIZE, file);
    writer.write_all(data)?;
    writer.flush()?;
    Ok(())
}

/// Lowercase hex of a digest.
pub fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
