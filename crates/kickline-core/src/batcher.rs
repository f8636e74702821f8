//! Outbound command batching.
//!
//! The decision engine enqueues commands as the policy produces them and
//! flushes once per cycle boundary. A flush takes the whole batch, renders it
//! into a single payload, and sends it; the batch is empty afterwards.
//! Commands therefore land in exactly one flush, in enqueue order.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use kickline_types::Command;
use tracing::debug;

use crate::link::{Transport, TransportError};

/// Summary of one flush.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushReport {
    /// Number of commands sent.
    pub commands: usize,
    /// Payload size in bytes (zero for an empty flush).
    pub bytes: usize,
    /// Sequence number of this flush within the session, starting at 1.
    pub sequence: u64,
    /// When the flush happened.
    pub flushed_at: DateTime<Utc>,
}

/// Accumulates commands between cycle boundaries.
pub struct OutboundBatcher {
    transport: Arc<dyn Transport>,
    batch: Vec<Command>,
    flushes: u64,
}

impl OutboundBatcher {
    /// Create an empty batcher sending through `transport`.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            batch: Vec::new(),
            flushes: 0,
        }
    }

    /// Append a command to the pending batch.
    pub fn enqueue(&mut self, command: Command) {
        self.batch.push(command);
    }

    /// Append several commands, preserving their order.
    pub fn extend<I>(&mut self, commands: I)
    where
        I: IntoIterator<Item = Command>,
    {
        self.batch.extend(commands);
    }

    /// Commands waiting for the next flush.
    pub fn pending(&self) -> &[Command] {
        &self.batch
    }

    /// Number of flushes performed so far.
    pub const fn flushes(&self) -> u64 {
        self.flushes
    }

    /// Send the pending batch as one payload and clear it.
    ///
    /// The batch is taken before sending, so a failed send drops it rather
    /// than resending stale commands a cycle late. An empty batch sends
    /// nothing but still counts as a flush.
    pub async fn flush(&mut self) -> Result<FlushReport, TransportError> {
        let batch = std::mem::take(&mut self.batch);
        self.flushes = self.flushes.saturating_add(1);

        let payload: String = batch.iter().map(Command::render).collect();
        if !payload.is_empty() {
            self.transport.send(payload.as_bytes()).await?;
        }

        let report = FlushReport {
            commands: batch.len(),
            bytes: payload.len(),
            sequence: self.flushes,
            flushed_at: Utc::now(),
        };
        debug!(
            sequence = report.sequence,
            commands = report.commands,
            bytes = report.bytes,
            "flushed command batch"
        );
        Ok(report)
    }
}

impl std::fmt::Debug for OutboundBatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutboundBatcher")
            .field("batch", &self.batch)
            .field("flushes", &self.flushes)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<String>>,
        closed: bool,
    }

    #[async_trait]
    impl Transport for Recorder {
        async fn send(&self, payload: &[u8]) -> Result<(), TransportError> {
            if self.closed {
                return Err(TransportError::Closed);
            }
            self.sent
                .lock()
                .unwrap()
                .push(String::from_utf8(payload.to_vec()).unwrap());
            Ok(())
        }

        async fn recv(&self) -> Result<Vec<u8>, TransportError> {
            Err(TransportError::Closed)
        }

        fn endpoint(&self) -> SocketAddr {
            SocketAddr::from(([127, 0, 0, 1], 6000))
        }

        fn shutdown(&self) {}
    }

    #[tokio::test]
    async fn flush_preserves_enqueue_order_in_one_payload() {
        let recorder = Arc::new(Recorder::default());
        let mut batcher = OutboundBatcher::new(recorder.clone());
        batcher.enqueue(Command::Turn { moment: 30.0 });
        batcher.enqueue(Command::Dash { power: 65.0 });
        batcher.enqueue(Command::TurnNeck { angle: -12.5 });

        let report = batcher.flush().await.unwrap();
        assert_eq!(report.commands, 3);
        assert_eq!(report.sequence, 1);
        assert!(batcher.pending().is_empty());

        let sent = recorder.sent.lock().unwrap().clone();
        assert_eq!(sent, vec!["(turn 30)(dash 65)(turn_neck -12.5)"]);
        assert_eq!(report.bytes, sent.first().unwrap().len());
    }

    #[tokio::test]
    async fn empty_flush_sends_nothing_but_counts() {
        let recorder = Arc::new(Recorder::default());
        let mut batcher = OutboundBatcher::new(recorder.clone());

        let report = batcher.flush().await.unwrap();
        assert_eq!(report.commands, 0);
        assert_eq!(report.bytes, 0);
        assert_eq!(batcher.flushes(), 1);
        assert!(recorder.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn commands_after_a_flush_go_to_the_next_one() {
        let recorder = Arc::new(Recorder::default());
        let mut batcher = OutboundBatcher::new(recorder.clone());
        batcher.enqueue(Command::Dash { power: 50.0 });
        batcher.flush().await.unwrap();
        batcher.extend([Command::Turn { moment: 10.0 }, Command::Dash { power: 65.0 }]);
        batcher.flush().await.unwrap();

        let sent = recorder.sent.lock().unwrap().clone();
        assert_eq!(sent, vec!["(dash 50)", "(turn 10)(dash 65)"]);
    }

    #[tokio::test]
    async fn failed_send_still_clears_batch() {
        let recorder = Arc::new(Recorder {
            sent: Mutex::new(Vec::new()),
            closed: true,
        });
        let mut batcher = OutboundBatcher::new(recorder);
        batcher.enqueue(Command::Bye);

        let err = batcher.flush().await.unwrap_err();
        assert!(err.is_closed());
        assert!(batcher.pending().is_empty());
    }
}
