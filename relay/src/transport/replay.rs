//! Replay of recorded notifications
//!
//! Capture format: one encrypted notification per line as hex. Blank lines
//! and lines starting with `#` are ignored.

use super::{CubeTransport, NotificationCallback, TransportError};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

pub struct ReplayTransport {
    notifications: Vec<Vec<u8>>,
    interval: Duration,
    feeder: Mutex<Option<JoinHandle<()>>>,
    writes: AtomicUsize,
}

impl ReplayTransport {
    pub fn new(notifications: Vec<Vec<u8>>, interval: Duration) -> Self {
        Self {
            notifications,
            interval,
            feeder: Mutex::new(None),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P, interval: Duration) -> Result<Self, TransportError> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::new(parse_capture(&content)?, interval))
    }

    pub fn notification_count(&self) -> usize {
        self.notifications.len()
    }

    /// Frames written by the session so far
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }
}

/// Parse a hex capture into raw notifications
pub fn parse_capture(content: &str) -> Result<Vec<Vec<u8>>, TransportError> {
    let mut notifications = Vec::new();
    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let compact: String = line.split_whitespace().collect();
        let bytes = hex::decode(&compact).map_err(|e| TransportError::Capture {
            line: index + 1,
            reason: e.to_string(),
        })?;
        notifications.push(bytes);
    }
    Ok(notifications)
}

impl CubeTransport for ReplayTransport {
    async fn subscribe(&self, callback: NotificationCallback) -> Result<(), TransportError> {
        let mut feeder = self.feeder.lock().await;
        if feeder.is_some() {
            return Err(TransportError::Subscribe("already subscribed".to_string()));
        }

        let notifications = self.notifications.clone();
        let interval = self.interval;
        *feeder = Some(tokio::spawn(async move {
            for notification in &notifications {
                if !interval.is_zero() {
                    tokio::time::sleep(interval).await;
                }
                callback(notification.as_slice());
            }
            debug!("Replay finished after {} notifications", notifications.len());
            // callback dropped here, closing the stream
        }));

        info!("Replaying {} notifications", self.notifications.len());
        Ok(())
    }

    async fn write(&self, frame: &[u8]) -> Result<(), TransportError> {
        if frame.is_empty() {
            return Err(TransportError::Write("empty frame".to_string()));
        }
        self.writes.fetch_add(1, Ordering::Relaxed);
        info!("TX {}", hex::encode(frame));
        Ok(())
    }

    async fn unsubscribe(&self) -> Result<(), TransportError> {
        let handle = self.feeder.lock().await.take();
        if let Some(handle) = handle {
            handle.abort();
            // Cancelled is the expected outcome
            let _ = handle.await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::Mutex as StdMutex;

    #[test]
    fn test_parse_capture() {
        let capture = "\
            # cube hello\n\
            00112233445566778899aabbccddeeff\n\
            \n\
            00 11 22 33 44 55 66 77 88 99 AA BB CC DD EE FF\n";
        let notifications = parse_capture(capture).unwrap();
        assert_eq!(notifications.len(), 2);
        assert_eq!(notifications[0], notifications[1]);
        assert_eq!(notifications[0][15], 0xFF);
    }

    #[test]
    fn test_parse_capture_reports_line() {
        let capture = "0011\nnot hex\n";
        match parse_capture(capture) {
            Err(TransportError::Capture { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_replay_delivers_in_order_then_closes() {
        let transport = ReplayTransport::new(vec![vec![1; 16], vec![2; 16], vec![3; 16]], Duration::ZERO);
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        transport
            .subscribe(Box::new(move |data: &[u8]| {
                let _ = tx.send(data[0]);
            }))
            .await
            .unwrap();

        let mut seen = Vec::new();
        while let Some(first) = rx.recv().await {
            seen.push(first);
        }
        assert_eq!(seen, vec![1, 2, 3]);

        transport.unsubscribe().await.unwrap();
    }

    #[tokio::test]
    async fn test_double_subscribe_fails() {
        let transport = ReplayTransport::new(Vec::new(), Duration::ZERO);
        transport.subscribe(Box::new(|_: &[u8]| {})).await.unwrap();
        assert!(transport.subscribe(Box::new(|_: &[u8]| {})).await.is_err());
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_feeder() {
        let transport = ReplayTransport::new(vec![vec![0; 16]; 100], Duration::from_secs(60));
        let seen = Arc::new(StdMutex::new(0usize));
        let counter = seen.clone();

        transport
            .subscribe(Box::new(move |_: &[u8]| {
                if let Ok(mut count) = counter.lock() {
                    *count += 1;
                }
            }))
            .await
            .unwrap();
        transport.unsubscribe().await.unwrap();

        assert_eq!(*seen.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_write_counts_frames() {
        let transport = ReplayTransport::new(Vec::new(), Duration::ZERO);
        transport.write(&[0u8; 16]).await.unwrap();
        transport.write(&[0u8; 32]).await.unwrap();
        assert_eq!(transport.writes(), 2);

        assert!(matches!(transport.write(&[]).await, Err(TransportError::Write(_))));
        assert_eq!(transport.writes(), 2);
    }
}
