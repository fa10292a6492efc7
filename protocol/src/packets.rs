//! Cube frame construction and parsing
//!
//! Plaintext frame layout: `[0xFE][length][payload..][crc_lo][crc_hi]`, where
//! `length` counts the whole frame and the CRC covers everything before it.
//! Decrypted notifications may carry zero padding past `length`.

use crate::FRAME_MARKER;
use crate::checksum::crc16_modbus;
use crate::constants::*;
use crate::crypto::CubeCipher;
use crate::cube::{CubeState, MacAddress, Move, PACKED_STATE_LEN};
use crate::error::ProtocolError;

/// Trailer size (CRC-16, little-endian)
pub const CRC_LEN: usize = 2;

/// Event decoded from a single notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedEvent {
    /// Cube hello with full state and battery; always acknowledged
    DeviceAnnounce { state: CubeState, battery: u8 },

    /// Face turn report
    MoveNotification {
        move_code: Option<u8>,
        battery: Option<u8>,
        needs_ack: bool,
    },

    /// Periodic state sync; never acknowledged
    StateSync { state: CubeState },

    /// Anything else, including truncated or unmarked frames
    Unrecognized,
}

impl ParsedEvent {
    /// Whether the cube waits for an ACK of this frame
    pub fn needs_ack(&self) -> bool {
        match self {
            ParsedEvent::DeviceAnnounce { .. } => true,
            ParsedEvent::MoveNotification { needs_ack, .. } => *needs_ack,
            ParsedEvent::StateSync { .. } | ParsedEvent::Unrecognized => false,
        }
    }

    /// Resolve the reported turn, if any
    ///
    /// Absent or zero codes are not moves. Codes outside the table are
    /// a protocol violation.
    pub fn turn(&self) -> Result<Option<Move>, ProtocolError> {
        match self {
            ParsedEvent::MoveNotification {
                move_code: Some(code),
                ..
            } => Move::from_code(*code),
            _ => Ok(None),
        }
    }
}

/// Parse a decrypted notification
///
/// Malformed input is expected noise on the link and maps to
/// `ParsedEvent::Unrecognized` rather than an error.
pub fn parse(decrypted: &[u8]) -> ParsedEvent {
    if check_header(decrypted).is_err() {
        return ParsedEvent::Unrecognized;
    }

    match MessageType::from_u8(decrypted[2]) {
        Some(MessageType::CubeHello) => {
            if decrypted.len() < CUBE_HELLO_MIN_LEN {
                return ParsedEvent::Unrecognized;
            }
            ParsedEvent::DeviceAnnounce {
                state: read_state(decrypted),
                battery: decrypted[BATTERY_OFFSET],
            }
        }
        Some(MessageType::StateChange) => ParsedEvent::MoveNotification {
            move_code: decrypted.get(MOVE_OFFSET).copied(),
            battery: decrypted.get(BATTERY_OFFSET).copied(),
            needs_ack: decrypted.get(NEEDS_ACK_OFFSET) == Some(&1),
        },
        Some(MessageType::StateSync) => {
            if decrypted.len() < STATE_SYNC_MIN_LEN {
                return ParsedEvent::Unrecognized;
            }
            ParsedEvent::StateSync {
                state: read_state(decrypted),
            }
        }
        None => ParsedEvent::Unrecognized,
    }
}

/// Validate marker, minimum size and declared length
pub fn check_header(decrypted: &[u8]) -> Result<(), ProtocolError> {
    if decrypted.len() < crate::MIN_FRAME_SIZE {
        return Err(ProtocolError::MalformedFrame("shorter than header"));
    }
    if decrypted[0] != FRAME_MARKER {
        return Err(ProtocolError::MalformedFrame("bad marker"));
    }
    if usize::from(decrypted[1]) > decrypted.len() {
        return Err(ProtocolError::MalformedFrame("declared length exceeds buffer"));
    }
    Ok(())
}

fn read_state(decrypted: &[u8]) -> CubeState {
    let mut packed = [0u8; PACKED_STATE_LEN];
    packed.copy_from_slice(&decrypted[STATE_OFFSET..STATE_END]);
    CubeState::from_packed(&packed)
}

/// Check the CRC trailer at the position given by the length byte
///
/// Inbound CRCs are informational only; frames are never dropped on them.
pub fn verify_checksum(decrypted: &[u8]) -> bool {
    let Some(&declared) = decrypted.get(1) else {
        return false;
    };
    let length = usize::from(declared);
    if length < 2 + CRC_LEN || length > decrypted.len() {
        return false;
    }
    let crc = crc16_modbus(&decrypted[..length - CRC_LEN]);
    decrypted[length - CRC_LEN..length] == crc.to_le_bytes()
}

/// App hello body: 11 zero bytes, reversed MAC, 2 bytes left for the CRC
pub fn build_app_hello(mac_reversed: &[u8; MAC_LEN]) -> [u8; APP_HELLO_LEN] {
    let mut body = [0u8; APP_HELLO_LEN];
    body[APP_HELLO_MAC_OFFSET..APP_HELLO_MAC_OFFSET + MAC_LEN].copy_from_slice(mac_reversed);
    body
}

/// ACK for a decrypted frame: marker, length 9, bytes [2..7) of the source, CRC
///
/// Source bytes past the end of a short buffer are taken as zero.
pub fn build_ack_frame(decrypted: &[u8]) -> [u8; ACK_FRAME_LEN] {
    let mut ack = [0u8; ACK_FRAME_LEN];
    ack[0] = FRAME_MARKER;
    ack[1] = ACK_FRAME_LEN as u8;

    let head_end = ACK_HEAD_OFFSET + ACK_HEAD_LEN;
    let head = decrypted.get(ACK_HEAD_OFFSET..).unwrap_or_default();
    let head = &head[..head.len().min(ACK_HEAD_LEN)];
    ack[ACK_HEAD_OFFSET..ACK_HEAD_OFFSET + head.len()].copy_from_slice(head);

    let crc = crc16_modbus(&ack[..head_end]);
    ack[head_end..].copy_from_slice(&crc.to_le_bytes());
    ack
}

/// Wrap `body` into a plaintext frame of `body.len() + 2` bytes
///
/// The last two positions of `body` are CRC slots: they are overwritten with
/// the CRC of everything before them.
pub fn build_frame(body: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    if body.len() < CRC_LEN {
        return Err(ProtocolError::MalformedFrame("body has no room for checksum"));
    }
    let length = body.len() + 2;
    let declared =
        u8::try_from(length).map_err(|_| ProtocolError::MalformedFrame("frame longer than 255 bytes"))?;

    let mut frame = Vec::with_capacity(length);
    frame.push(FRAME_MARKER);
    frame.push(declared);
    frame.extend_from_slice(body);

    let crc = crc16_modbus(&frame[..length - CRC_LEN]);
    frame[length - CRC_LEN..].copy_from_slice(&crc.to_le_bytes());
    Ok(frame)
}

/// Build and encrypt a frame around `body`
pub fn build_encrypted_frame(cipher: &CubeCipher, body: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    Ok(cipher.encrypt(&build_frame(body)?))
}

/// Encrypted app hello announcing `mac`
pub fn build_encrypted_hello(cipher: &CubeCipher, mac: &MacAddress) -> Result<Vec<u8>, ProtocolError> {
    build_encrypted_frame(cipher, &build_app_hello(&mac.reversed()))
}

/// Encrypted ACK for a decrypted frame
///
/// The full ACK is built first, then everything after its two header bytes
/// is wrapped again; the ACK's own CRC lands in the CRC slots and is
/// recomputed by the outer frame.
pub fn build_encrypted_ack(cipher: &CubeCipher, decrypted: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    let ack = build_ack_frame(decrypted);
    build_encrypted_frame(cipher, &ack[2..])
}
