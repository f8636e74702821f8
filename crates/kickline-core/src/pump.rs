//! Inbound pump: transport → decoder → world state → signals.
//!
//! The pump's only suspension point is [`Transport::recv`], raced against
//! cancellation. Every received payload is decoded and applied to the shared
//! world under the write lock; the pump then tells the decision engine what
//! happened through a bounded signal channel. It never produces commands.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, info, trace, warn};

use crate::link::{DecodeError, MessageDecoder, Transport};
use crate::supervisor::{SessionFault, Supervisor};
use crate::world::SharedWorld;

/// Capacity of the pump-to-engine signal channel.
pub const SIGNAL_CAPACITY: usize = 64;

/// Pause after a failed receive before trying again.
pub const RECV_BACKOFF: Duration = Duration::from_millis(10);

/// Consecutive receive failures after which the session is given up.
pub const MAX_RECV_FAILURES: u32 = 50;

/// What the pump tells the decision engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// The server opened a new command window: flush the batch.
    CycleBoundary,
    /// The world changed: run a policy step.
    NewData,
}

/// Counters reported when the pump stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpReport {
    /// Payloads received.
    pub received: u64,
    /// Payloads dropped because they failed to decode.
    pub decode_failures: u64,
    /// Cycle boundaries observed.
    pub boundaries: u64,
}

/// The receive loop.
pub struct InboundPump {
    transport: Arc<dyn Transport>,
    decoder: Box<dyn MessageDecoder>,
    world: SharedWorld,
    signals: mpsc::Sender<Signal>,
    supervisor: Supervisor,
}

impl InboundPump {
    /// Assemble a pump. Nothing runs until [`run`](Self::run) is awaited.
    pub fn new(
        transport: Arc<dyn Transport>,
        decoder: Box<dyn MessageDecoder>,
        world: SharedWorld,
        signals: mpsc::Sender<Signal>,
        supervisor: Supervisor,
    ) -> Self {
        Self {
            transport,
            decoder,
            world,
            signals,
            supervisor,
        }
    }

    /// Receive until cancelled or until the session breaks.
    pub async fn run(mut self) -> PumpReport {
        let mut report = PumpReport::default();
        let mut failures: u32 = 0;
        info!("inbound pump started");

        loop {
            let received = tokio::select! {
                () = self.supervisor.cancelled() => break,
                received = self.transport.recv() => received,
            };

            let payload = match received {
                Ok(payload) => payload,
                Err(err) if err.is_closed() => {
                    if !self.supervisor.is_cancelled() {
                        error!("transport closed under a live session");
                        self.supervisor.fail(SessionFault::TransportClosed);
                    }
                    break;
                }
                Err(err) => {
                    failures = failures.saturating_add(1);
                    if failures >= MAX_RECV_FAILURES {
                        error!(error = %err, failures, "receive keeps failing, giving up");
                        self.supervisor.fail(SessionFault::TransportFailing {
                            consecutive: failures,
                        });
                        break;
                    }
                    warn!(error = %err, failures, "receive failed, retrying");
                    tokio::select! {
                        () = self.supervisor.cancelled() => break,
                        () = tokio::time::sleep(RECV_BACKOFF) => continue,
                    }
                }
            };
            failures = 0;
            report.received = report.received.saturating_add(1);

            let event = match self.decoder.decode(&payload) {
                Ok(event) => event,
                Err(err) => {
                    report.decode_failures = report.decode_failures.saturating_add(1);
                    if let Some(message) = Self::rejection(&self.world, &err).await {
                        error!(%message, "server rejected the handshake");
                        self.supervisor.fail(SessionFault::Rejected { message });
                        break;
                    }
                    warn!(error = %err, bytes = payload.len(), "dropping undecodable message");
                    continue;
                }
            };

            self.world.write().await.apply(&event);

            if event.is_cycle_boundary() {
                report.boundaries = report.boundaries.saturating_add(1);
                if !self.signal(Signal::CycleBoundary) {
                    break;
                }
            }
            if !self.signal(Signal::NewData) {
                break;
            }
        }

        info!(
            received = report.received,
            decode_failures = report.decode_failures,
            boundaries = report.boundaries,
            "inbound pump stopped"
        );
        report
    }

    /// A server error received before the join reply ends the session; later
    /// ones (e.g. an illegal command) are only logged.
    async fn rejection(world: &SharedWorld, err: &DecodeError) -> Option<String> {
        let DecodeError::Server { message } = err else {
            return None;
        };
        world
            .read()
            .await
            .identity()
            .is_none()
            .then(|| message.clone())
    }

    /// Hand a signal to the engine. Returns `false` once the engine is gone.
    fn signal(&self, signal: Signal) -> bool {
        match self.signals.try_send(signal) {
            Ok(()) => true,
            Err(TrySendError::Full(signal)) => {
                // Backlog from before the engine started; it is drained in
                // one wake once play begins.
                trace!(?signal, "signal channel full, coalescing");
                true
            }
            Err(TrySendError::Closed(_)) => {
                if !self.supervisor.is_cancelled() {
                    error!("decision engine is gone");
                    self.supervisor.fail(SessionFault::TaskDied { task: "engine" });
                }
                debug!("signal channel closed");
                false
            }
        }
    }
}

impl std::fmt::Debug for InboundPump {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InboundPump").finish_non_exhaustive()
    }
}
