//! Protocol error types

use crate::crypto::CryptoError;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Malformed frame: {0}")]
    MalformedFrame(&'static str),

    #[error("Unknown move code: {0}")]
    UnknownMoveCode(u8),

    #[error("Invalid MAC address: {0}")]
    InvalidMacAddress(String),

    #[error(transparent)]
    Crypto(#[from] CryptoError),
}
