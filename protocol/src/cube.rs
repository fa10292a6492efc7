//! Cube domain types: facelet state, face turns and device address

use crate::constants::MAC_LEN;
use crate::error::ProtocolError;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Number of facelets on a 3x3x3 cube
pub const FACELET_COUNT: usize = 54;

/// Packed facelet bytes on the wire (two facelets per byte)
pub const PACKED_STATE_LEN: usize = FACELET_COUNT / 2;

/// Snapshot of all 54 facelet colours (codes 0..=5)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CubeState {
    facelets: [u8; FACELET_COUNT],
}

impl CubeState {
    /// Decode 27 packed bytes, low nibble first
    pub fn from_packed(packed: &[u8; PACKED_STATE_LEN]) -> Self {
        let mut facelets = [0u8; FACELET_COUNT];
        for (i, byte) in packed.iter().enumerate() {
            facelets[2 * i] = byte & 0x0F;
            facelets[2 * i + 1] = (byte >> 4) & 0x0F;
        }
        Self { facelets }
    }

    pub fn facelets(&self) -> &[u8; FACELET_COUNT] {
        &self.facelets
    }

    /// True when every facelet holds one of the six colour codes
    pub fn is_valid(&self) -> bool {
        self.facelets.iter().all(|&c| c <= 5)
    }
}

/// Nine facelets per face, faces separated by a space
impl fmt::Display for CubeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, face) in self.facelets.chunks(9).enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            for colour in face {
                write!(f, "{colour:x}")?;
            }
        }
        Ok(())
    }
}

impl Serialize for CubeState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.facelets.iter())
    }
}

/// A single quarter turn as reported by the cube
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Move {
    LeftPrime,
    Left,
    RightPrime,
    Right,
    DownPrime,
    Down,
    UpPrime,
    Up,
    FrontPrime,
    Front,
    BackPrime,
    Back,
}

/// Move codes 1..=12 in wire order
pub const MOVE_TABLE: [Move; 12] = [
    Move::LeftPrime,
    Move::Left,
    Move::RightPrime,
    Move::Right,
    Move::DownPrime,
    Move::Down,
    Move::UpPrime,
    Move::Up,
    Move::FrontPrime,
    Move::Front,
    Move::BackPrime,
    Move::Back,
];

impl Move {
    /// Resolve a wire move code
    ///
    /// Code 0 means "no move" and yields `Ok(None)`; codes above 12 are
    /// not part of the protocol.
    pub fn from_code(code: u8) -> Result<Option<Self>, ProtocolError> {
        match code {
            0 => Ok(None),
            1..=12 => Ok(Some(MOVE_TABLE[usize::from(code - 1)])),
            _ => Err(ProtocolError::UnknownMoveCode(code)),
        }
    }

    pub fn code(self) -> u8 {
        self as u8 + 1
    }

    /// Standard face-turn notation
    pub fn notation(self) -> &'static str {
        match self {
            Move::LeftPrime => "L'",
            Move::Left => "L",
            Move::RightPrime => "R'",
            Move::Right => "R",
            Move::DownPrime => "D'",
            Move::Down => "D",
            Move::UpPrime => "U'",
            Move::Up => "U",
            Move::FrontPrime => "F'",
            Move::Front => "F",
            Move::BackPrime => "B'",
            Move::Back => "B",
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.notation())
    }
}

impl Serialize for Move {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.notation())
    }
}

/// Bluetooth device address of the cube
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacAddress([u8; MAC_LEN]);

impl MacAddress {
    pub const fn new(bytes: [u8; MAC_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; MAC_LEN] {
        &self.0
    }

    /// Bytes in the order the app hello carries them
    pub fn reversed(&self) -> [u8; MAC_LEN] {
        let mut bytes = self.0;
        bytes.reverse();
        bytes
    }
}

impl FromStr for MacAddress {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ProtocolError::InvalidMacAddress(s.to_string());

        let mut bytes = [0u8; MAC_LEN];
        let mut parts = s.trim().split(':');
        for byte in bytes.iter_mut() {
            let part = parts.next().ok_or_else(invalid)?;
            if part.len() != 2 {
                return Err(invalid());
            }
            *byte = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(Self(bytes))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}
