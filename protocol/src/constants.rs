//! Protocol constants and message type definitions

/// Message types carried in byte 2 of a decrypted frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    /// Cube hello: facelet state and battery, must be acknowledged
    CubeHello = 0x02,

    /// State change after a face turn
    StateChange = 0x03,

    /// Full state sync, never acknowledged
    StateSync = 0x04,
}

impl MessageType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x02 => Some(MessageType::CubeHello),
            0x03 => Some(MessageType::StateChange),
            0x04 => Some(MessageType::StateSync),
            _ => None,
        }
    }
}

/// Facelet state occupies bytes [7..34) of hello, change and sync frames
pub const STATE_OFFSET: usize = 7;
pub const STATE_END: usize = 34;

/// Move code byte in a state change frame
pub const MOVE_OFFSET: usize = 34;

/// Battery percentage byte in hello and state change frames
pub const BATTERY_OFFSET: usize = 35;

/// State change frames request an ACK by setting this byte to 1
pub const NEEDS_ACK_OFFSET: usize = 91;

/// Minimum decrypted length of a cube hello frame
pub const CUBE_HELLO_MIN_LEN: usize = 36;

/// Minimum decrypted length of a state sync frame
pub const STATE_SYNC_MIN_LEN: usize = 34;

/// ACK frame: marker, length, 5 echoed bytes, CRC
pub const ACK_FRAME_LEN: usize = 9;

/// Bytes [2..7) of the acknowledged frame are echoed back
pub const ACK_HEAD_OFFSET: usize = 2;
pub const ACK_HEAD_LEN: usize = 5;

/// App hello body: 11 zero bytes, reversed MAC, 2 zero bytes
pub const APP_HELLO_LEN: usize = 19;
pub const APP_HELLO_MAC_OFFSET: usize = 11;

/// MAC address length in bytes
pub const MAC_LEN: usize = 6;
