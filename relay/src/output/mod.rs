//! Event sinks: where decoded cube events go

use protocol::cube::{CubeState, Move};
use tracing::info;

/// Consumer of decoded cube events
///
/// Calls are made from the session's consumer task and must return
/// promptly; slow delivery belongs behind a queue inside the sink.
pub trait EventSink: Send + Sync {
    /// Cube hello with full state
    fn cube_announced(&self, _state: &CubeState, _battery: u8) {}

    /// Single face turn
    fn cube_moved(&self, _turn: Move, _battery: Option<u8>) {}

    /// Periodic state sync; display only
    fn cube_synced(&self, _state: &CubeState) {}
}

/// Logs every event at info level
#[derive(Debug, Default)]
pub struct ConsoleDisplay;

impl EventSink for ConsoleDisplay {
    fn cube_announced(&self, state: &CubeState, battery: u8) {
        info!("Cube hello | battery {}% | state {}", battery, state);
    }

    fn cube_moved(&self, turn: Move, battery: Option<u8>) {
        match battery {
            Some(battery) => info!("Move {} | battery {}%", turn, battery),
            None => info!("Move {}", turn),
        }
    }

    fn cube_synced(&self, state: &CubeState) {
        info!("State sync | state {}", state);
    }
}
