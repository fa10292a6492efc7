//! Link to the cube
//!
//! The session only needs three primitives from the link: a notification
//! subscription, a fire-and-forget write and an unsubscribe. Anything that
//! can provide them (a BLE stack, a recorded capture) plugs in here.

pub mod replay;

pub use replay::ReplayTransport;

use std::future::Future;
use thiserror::Error;

/// Called once per raw notification; must not block
pub type NotificationCallback = Box<dyn Fn(&[u8]) + Send + Sync>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Subscribe failed: {0}")]
    Subscribe(String),

    #[error("Write failed: {0}")]
    Write(String),

    #[error("Capture line {line}: {reason}")]
    Capture { line: usize, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub trait CubeTransport: Send + Sync + 'static {
    /// Start delivering notifications to `callback`
    ///
    /// Dropping the callback signals that no further notifications follow.
    fn subscribe(
        &self,
        callback: NotificationCallback,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Write an encrypted frame without waiting for a response
    fn write(&self, frame: &[u8]) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Stop notifications and release the callback
    fn unsubscribe(&self) -> impl Future<Output = Result<(), TransportError>> + Send;
}
