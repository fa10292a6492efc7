//! Cube session: turns encrypted notifications into events and ACKs
//!
//! The transport callback decrypts and enqueues; a single consumer task
//! handles frames one at a time in arrival order, since the cube expects its
//! ACKs in the same order it sent the frames.

use crate::output::EventSink;
use crate::transport::{CubeTransport, TransportError};
use protocol::ProtocolError;
use protocol::crypto::CubeCipher;
use protocol::cube::MacAddress;
use protocol::packets::{self, ParsedEvent};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, trace, warn};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Transport failure: {0}")]
    Transport(#[from] TransportError),

    #[error("Failed to build frame: {0}")]
    Frame(#[from] ProtocolError),

    #[error("Consumer task failed: {0}")]
    Consumer(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Connecting,
    Streaming,
}

/// Frame handling shared with the consumer task
struct Dispatcher<T> {
    transport: Arc<T>,
    cipher: Arc<CubeCipher>,
    sinks: Vec<Arc<dyn EventSink>>,
}

// Manual impl: the transport itself need not be Clone
impl<T> Clone for Dispatcher<T> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            cipher: self.cipher.clone(),
            sinks: self.sinks.clone(),
        }
    }
}

impl<T: CubeTransport> Dispatcher<T> {
    /// Handle one decrypted frame to completion, ACK included
    async fn dispatch(&self, decrypted: &[u8]) -> Result<(), SessionError> {
        let event = packets::parse(decrypted);
        if event != ParsedEvent::Unrecognized && !packets::verify_checksum(decrypted) {
            trace!("Checksum mismatch in {}", hex::encode(decrypted));
        }

        match &event {
            ParsedEvent::DeviceAnnounce { state, battery } => {
                if !state.is_valid() {
                    warn!("Cube hello carries unknown facelet colours: {}", state);
                }
                for sink in &self.sinks {
                    sink.cube_announced(state, *battery);
                }
            }
            ParsedEvent::MoveNotification { battery, .. } => match event.turn() {
                Ok(Some(turn)) => {
                    debug!("Move {} (code {})", turn, turn.code());
                    for sink in &self.sinks {
                        sink.cube_moved(turn, *battery);
                    }
                }
                Ok(None) => {}
                // The cube still expects its ACK
                Err(e) => warn!("Ignoring move: {}", e),
            },
            ParsedEvent::StateSync { state } => {
                if !state.is_valid() {
                    warn!("State sync carries unknown facelet colours: {}", state);
                }
                for sink in &self.sinks {
                    sink.cube_synced(state);
                }
            }
            ParsedEvent::Unrecognized => {
                debug!("Ignoring unrecognized frame ({} bytes)", decrypted.len());
                return Ok(());
            }
        }

        if event.needs_ack() {
            let ack = packets::build_encrypted_ack(&self.cipher, decrypted)?;
            self.transport.write(&ack).await?;
            debug!("ACK sent for message type {:#04x}", decrypted[2]);
        }
        Ok(())
    }

    /// Drain the queue until shutdown or until the transport closes it
    async fn consume(
        self,
        mut queue: mpsc::UnboundedReceiver<Vec<u8>>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), SessionError> {
        // A dropped sender can never signal shutdown
        let mut sender_alive = true;
        loop {
            let frame = tokio::select! {
                biased;
                changed = shutdown.changed(), if sender_alive => {
                    if changed.is_ok() {
                        debug!("Shutdown requested, consumer stopping");
                        return Ok(());
                    }
                    sender_alive = false;
                    continue;
                }
                frame = queue.recv() => frame,
            };

            match frame {
                Some(decrypted) => self.dispatch(&decrypted).await?,
                None => {
                    info!("Notification stream closed");
                    return Ok(());
                }
            }
        }
    }
}

pub struct SessionProcessor<T> {
    dispatcher: Dispatcher<T>,
    mac: MacAddress,
    phase: Phase,
}

impl<T: CubeTransport> SessionProcessor<T> {
    pub fn new(
        transport: Arc<T>,
        cipher: CubeCipher,
        mac: MacAddress,
        sinks: Vec<Arc<dyn EventSink>>,
    ) -> Self {
        Self {
            dispatcher: Dispatcher {
                transport,
                cipher: Arc::new(cipher),
                sinks,
            },
            mac,
            phase: Phase::Connecting,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Run the session until `shutdown` fires or the transport closes
    ///
    /// Transport failures end the session and are returned; malformed
    /// frames are dropped and never surface here.
    pub async fn run(&mut self, shutdown: watch::Receiver<bool>) -> Result<(), SessionError> {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let cipher = self.dispatcher.cipher.clone();
        let transport = self.dispatcher.transport.clone();

        transport
            .subscribe(Box::new(move |raw: &[u8]| match cipher.decrypt(raw) {
                Ok(decrypted) => {
                    trace!("RX {}", hex::encode(&decrypted));
                    // Receiver gone means the session is shutting down
                    let _ = queue_tx.send(decrypted);
                }
                Err(e) => warn!("Dropping notification: {}", e),
            }))
            .await?;
        info!("Subscribed to cube notifications");

        let streamed = self.stream(queue_rx, shutdown).await;

        // Consumer is joined by now; no write can race the teardown
        match (transport.unsubscribe().await, streamed) {
            (Ok(()), streamed) => {
                info!("Unsubscribed from cube notifications");
                streamed
            }
            (Err(e), Ok(())) => Err(e.into()),
            (Err(e), Err(first)) => {
                warn!("Unsubscribe failed after session error: {}", e);
                Err(first)
            }
        }
    }

    async fn stream(
        &mut self,
        queue: mpsc::UnboundedReceiver<Vec<u8>>,
        shutdown: watch::Receiver<bool>,
    ) -> Result<(), SessionError> {
        self.phase = Phase::Streaming;

        let hello = packets::build_encrypted_hello(&self.dispatcher.cipher, &self.mac)?;
        self.dispatcher.transport.write(&hello).await?;
        info!("App hello sent for {}", self.mac);

        let consumer = tokio::spawn(self.dispatcher.clone().consume(queue, shutdown));
        consumer.await?
    }
}
