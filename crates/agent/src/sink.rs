//! Outbound side of a turn's event channel.

use tokio::sync::mpsc;
use tracing::debug;

use crate::stream_event::StreamEvent;

/// Delivers events to the client until it goes away, then drops them.
///
/// The loop keeps running after a disconnect so the checkpoint still gets
/// written; emitting simply becomes a no-op.
pub struct EventSink {
    tx: mpsc::Sender<StreamEvent>,
    connected: bool,
}

impl EventSink {
    pub fn new(tx: mpsc::Sender<StreamEvent>) -> Self {
        Self { tx, connected: true }
    }

    /// Send `event`. Returns whether the client is still listening.
    pub async fn emit(&mut self, event: StreamEvent) -> bool {
        if !self.connected {
            return false;
        }
        if self.tx.send(event).await.is_err() {
            debug!("Client disconnected, suppressing further events");
            self.connected = false;
        }
        self.connected
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_in_order() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut sink = EventSink::new(tx);
        assert!(sink.emit(StreamEvent::Content { content: "a".into() }).await);
        assert!(sink.emit(StreamEvent::End).await);
        drop(sink);

        assert_eq!(rx.recv().await, Some(StreamEvent::Content { content: "a".into() }));
        assert_eq!(rx.recv().await, Some(StreamEvent::End));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn goes_quiet_after_disconnect() {
        let (tx, rx) = mpsc::channel(4);
        let mut sink = EventSink::new(tx);
        drop(rx);

        assert!(!sink.emit(StreamEvent::End).await);
        assert!(!sink.is_connected());
        assert!(!sink.emit(StreamEvent::End).await);
    }
}
