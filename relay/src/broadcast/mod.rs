//! WebSocket fan-out of decoded moves
//!
//! `ClientRegistry` owns the set of connected listeners. Each listener task
//! holds the receiving end of its own queue, so broadcasting never waits on
//! a slow socket.

use crate::config::BroadcastFormat;
use crate::output::EventSink;
use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use protocol::cube::{CubeState, Move};
use serde::Serialize;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

pub type ClientId = u64;

/// Connected WebSocket listeners
pub struct ClientRegistry {
    format: BroadcastFormat,
    next_id: AtomicU64,
    clients: Mutex<HashMap<ClientId, mpsc::UnboundedSender<String>>>,
}

#[derive(Serialize)]
struct MoveMessage {
    #[serde(rename = "move")]
    turn: Move,
    battery: Option<u8>,
}

#[derive(Serialize)]
struct AnnounceMessage<'a> {
    state: &'a CubeState,
    battery: u8,
}

impl ClientRegistry {
    pub fn new(format: BroadcastFormat) -> Self {
        Self {
            format,
            next_id: AtomicU64::new(1),
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Register a listener; messages arrive on the returned receiver
    pub fn add(&self) -> (ClientId, mpsc::UnboundedReceiver<String>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut clients) = self.clients.lock() {
            clients.insert(id, tx);
        }
        (id, rx)
    }

    pub fn remove(&self, id: ClientId) {
        if let Ok(mut clients) = self.clients.lock() {
            clients.remove(&id);
        }
    }

    pub fn len(&self) -> usize {
        self.clients.lock().map(|clients| clients.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Queue `message` for every listener, returning how many took it
    ///
    /// Listeners whose receiver is gone are dropped from the registry.
    pub fn broadcast(&self, message: &str) -> usize {
        let Ok(mut clients) = self.clients.lock() else {
            return 0;
        };
        clients.retain(|_, tx| tx.send(message.to_string()).is_ok());
        clients.len()
    }

    fn broadcast_json<T: Serialize>(&self, message: &T) -> usize {
        match serde_json::to_string(message) {
            Ok(json) => self.broadcast(&json),
            Err(e) => {
                error!("Failed to encode broadcast: {}", e);
                0
            }
        }
    }
}

impl EventSink for ClientRegistry {
    fn cube_announced(&self, state: &CubeState, battery: u8) {
        if self.format == BroadcastFormat::Json {
            let delivered = self.broadcast_json(&AnnounceMessage { state, battery });
            debug!("Cube hello sent to {} listeners", delivered);
        }
    }

    fn cube_moved(&self, turn: Move, battery: Option<u8>) {
        let delivered = match self.format {
            BroadcastFormat::Text => self.broadcast(turn.notation()),
            BroadcastFormat::Json => self.broadcast_json(&MoveMessage { turn, battery }),
        };
        debug!("Move {} sent to {} listeners", turn, delivered);
    }
}

/// Accept WebSocket listeners on `addr` until `shutdown` fires
pub async fn run_server(
    addr: &str,
    registry: Arc<ClientRegistry>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind WebSocket listener on {}", addr))?;

    info!("WebSocket server on ws://{}", addr);

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let registry = registry.clone();
                    tokio::spawn(async move {
                        if let Err(e) = serve_client(stream, peer, registry).await {
                            warn!("WebSocket client {} closed with error: {:#}", peer, e);
                        }
                    });
                }
                Err(e) => error!("Accept error: {}", e),
            },
            _ = shutdown.changed() => break,
        }
    }

    info!("WebSocket server stopped");
    Ok(())
}

async fn serve_client(
    stream: TcpStream,
    peer: SocketAddr,
    registry: Arc<ClientRegistry>,
) -> Result<()> {
    let ws = accept_async(stream)
        .await
        .with_context(|| format!("WebSocket handshake failed with {}", peer))?;
    let (mut sink, mut incoming) = ws.split();

    let (id, mut outbound) = registry.add();
    info!("WebSocket client {} connected ({} total)", peer, registry.len());

    let result: Result<()> = loop {
        tokio::select! {
            message = outbound.recv() => match message {
                Some(text) => {
                    if let Err(e) = sink.send(Message::Text(text)).await {
                        break Err(e.into());
                    }
                }
                None => break Ok(()),
            },
            frame = incoming.next() => match frame {
                Some(Ok(Message::Close(_))) | None => break Ok(()),
                // Listeners have nothing to say; pings are answered by tungstenite
                Some(Ok(_)) => {}
                Some(Err(e)) => break Err(e.into()),
            },
        }
    };

    registry.remove(id);
    info!("WebSocket client {} disconnected", peer);
    result
}
