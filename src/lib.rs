//! Oxipatch: IPS, UPS and BPS patch application in Rust.
//!
//! The crate provides:
//! - Shared primitives: bounded reads, the UPS/BPS varint, CRC-32 (`codec`)
//! - One decoder per patch format (`formats`)
//! - A format-agnostic entry point and result taxonomy (`engine`)
//! - File-oriented helpers (`io`)
//! - An optional CLI (`cli` feature)
//!
//! # Quick Start
//!
//! ```
//! use oxipatch::engine::{self, PatchStatus};
//! use oxipatch::formats::PatchFormat;
//!
//! let source = [0u8; 4];
//! let mut patch = b"PATCH".to_vec();
//! patch.extend_from_slice(&[0x00, 0x00, 0x00, 0x00, 0x02, 0xAA, 0xBB]);
//! patch.extend_from_slice(b"EOF");
//!
//! let out = engine::patch(&source, &patch, PatchFormat::Ips);
//! assert_eq!(out.status, PatchStatus::Success);
//! assert_eq!(out.data, [0xAA, 0xBB]);
//! ```

pub mod codec;
pub mod engine;
pub mod formats;
pub mod io;

#[cfg(feature = "cli")]
pub mod cli;

pub use engine::{PatchError, PatchOptions, PatchOutput, PatchStatus, patch, patch_with_options};
pub use formats::PatchFormat;
