//! Smart-cube protocol library
//!
//! Wire-level codec for the encrypted BLE protocol spoken by the cube:
//! block cipher, checksum, frame construction and frame parsing.
//! Everything here is pure; transports and event delivery live in the relay.

pub mod constants;
pub mod error;
pub mod checksum;
pub mod crypto;
pub mod cube;
pub mod packets;

pub use constants::*;
pub use error::ProtocolError;

/// Start-of-frame marker, first byte of every plaintext frame
pub const FRAME_MARKER: u8 = 0xFE;

/// Cipher block size; every notification is a multiple of this
pub const BLOCK_SIZE: usize = 16;

/// Shortest buffer the parser will look at (marker, length, type)
pub const MIN_FRAME_SIZE: usize = 3;
