// Low-level primitives shared by the patch format decoders.
//
// # Modules
//
// - `reader` : Bounded fixed-width integer reads (big/little endian)
// - `varint` : UPS/BPS run-length integer encoding
// - `crc32`  : Table-driven CRC-32 used to verify UPS/BPS output

pub mod crc32;
pub mod reader;
pub mod varint;

pub use crc32::{crc32, crc32_update};
pub use reader::{BoundedReader, Endian, read_fixed};
pub use varint::read_varint;
