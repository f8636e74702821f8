//! Decision engine: signals in, flushes and policy steps out.
//!
//! The engine owns the outbound batch and the per-session [`PolicyState`].
//! It sleeps on the signal channel and, on each wake, drains everything
//! pending:
//!
//! 1. one [`OutboundBatcher::flush`] per [`Signal::CycleBoundary`], in order;
//! 2. then, if any [`Signal::NewData`] arrived, exactly one policy step on a
//!    fresh [`WorldSnapshot`](crate::world::WorldSnapshot).
//!
//! A closed signal channel means the pump is gone; the engine records the
//! fault and stops. Policy failures never stop it: they become a
//! [`StepOutcome::Fallback`] and the fallback commands are queued instead.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::batcher::{FlushReport, OutboundBatcher};
use crate::policy::{self, Policy, PolicyState, StepOutcome};
use crate::pump::Signal;
use crate::supervisor::{SessionFault, Supervisor};
use crate::world::SharedWorld;

/// Signals collected in one wake.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Wake {
    /// Cycle boundaries drained.
    pub boundaries: usize,
    /// Whether any new-data signal was drained.
    pub new_data: bool,
}

impl Wake {
    /// Fold one signal into the wake.
    pub const fn note(&mut self, signal: Signal) {
        match signal {
            Signal::CycleBoundary => self.boundaries = self.boundaries.saturating_add(1),
            Signal::NewData => self.new_data = true,
        }
    }
}

/// What one wake did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WakeReport {
    /// One report per successful flush.
    pub flushes: Vec<FlushReport>,
    /// The policy step outcome, if a step ran.
    pub step: Option<StepOutcome>,
}

/// Counters reported when the engine stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineReport {
    /// Flushes performed.
    pub flushes: u64,
    /// Policy steps run.
    pub steps: u64,
    /// Steps that fell back to the safe default.
    pub fallbacks: u64,
}

/// The decision loop.
pub struct DecisionEngine {
    policy: Arc<dyn Policy>,
    world: SharedWorld,
    batcher: OutboundBatcher,
    signals: mpsc::Receiver<Signal>,
    supervisor: Supervisor,
    state: PolicyState,
    report: EngineReport,
}

impl DecisionEngine {
    /// Assemble an engine with fresh per-session policy state.
    pub fn new(
        policy: Arc<dyn Policy>,
        world: SharedWorld,
        batcher: OutboundBatcher,
        signals: mpsc::Receiver<Signal>,
        supervisor: Supervisor,
    ) -> Self {
        Self {
            policy,
            world,
            batcher,
            signals,
            supervisor,
            state: PolicyState::default(),
            report: EngineReport::default(),
        }
    }

    /// Per-session policy state.
    pub const fn state(&self) -> PolicyState {
        self.state
    }

    /// The outbound batcher.
    pub const fn batcher(&self) -> &OutboundBatcher {
        &self.batcher
    }

    /// Run until cancelled or until the session breaks.
    pub async fn run(mut self) -> EngineReport {
        info!("decision engine started");

        loop {
            let first = tokio::select! {
                () = self.supervisor.cancelled() => break,
                signal = self.signals.recv() => signal,
            };
            let Some(first) = first else {
                if !self.supervisor.is_cancelled() {
                    error!("inbound pump is gone");
                    self.supervisor.fail(SessionFault::TaskDied { task: "pump" });
                }
                break;
            };

            let mut wake = Wake::default();
            wake.note(first);
            while let Ok(signal) = self.signals.try_recv() {
                wake.note(signal);
            }

            if let Err(fault) = self.handle(wake).await {
                if !self.supervisor.is_cancelled() {
                    error!(%fault, "decision engine stopping");
                    self.supervisor.fail(fault);
                }
                break;
            }
        }

        info!(
            flushes = self.report.flushes,
            steps = self.report.steps,
            fallbacks = self.report.fallbacks,
            "decision engine stopped"
        );
        self.report
    }

    /// Process one wake: flushes first, then at most one policy step.
    pub async fn handle(&mut self, wake: Wake) -> Result<WakeReport, SessionFault> {
        let mut report = WakeReport::default();
        for _ in 0..wake.boundaries {
            if let Some(flush) = self.flush().await? {
                report.flushes.push(flush);
            }
        }
        if wake.new_data {
            report.step = Some(self.step().await);
        }
        Ok(report)
    }

    /// Flush the batch. A closed transport is a fault; any other send error
    /// loses this cycle's commands and is logged.
    pub async fn flush(&mut self) -> Result<Option<FlushReport>, SessionFault> {
        self.report.flushes = self.report.flushes.saturating_add(1);
        match self.batcher.flush().await {
            Ok(report) => Ok(Some(report)),
            Err(err) if err.is_closed() => Err(SessionFault::TransportClosed),
            Err(err) => {
                warn!(error = %err, "flush failed, batch dropped");
                Ok(None)
            }
        }
    }

    /// Run one policy step on a fresh snapshot and queue its commands.
    pub async fn step(&mut self) -> StepOutcome {
        let snapshot = self.world.read().await.snapshot();
        let (outcome, commands) = policy::decide(self.policy.as_ref(), &snapshot, &mut self.state);
        self.report.steps = self.report.steps.saturating_add(1);

        match &outcome {
            StepOutcome::Acted(count) => debug!(
                cycle = snapshot.cycle,
                phase = ?snapshot.phase,
                uniform = ?snapshot.uniform_number,
                commands = count,
                "policy step"
            ),
            StepOutcome::Fallback(err) => {
                self.report.fallbacks = self.report.fallbacks.saturating_add(1);
                warn!(
                    cycle = snapshot.cycle,
                    phase = ?snapshot.phase,
                    error = %err,
                    "policy step failed, issuing fallback"
                );
            }
        }

        self.batcher.extend(commands);
        outcome
    }
}

impl std::fmt::Debug for DecisionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecisionEngine")
            .field("batcher", &self.batcher)
            .field("state", &self.state)
            .field("report", &self.report)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use kickline_types::{Command, Event};

    use super::*;
    use crate::link::{Transport, TransportError};
    use crate::policy::{PolicyError, SCAN_TURN};
    use crate::world::{WorldSnapshot, WorldState};

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for Recorder {
        async fn send(&self, payload: &[u8]) -> Result<(), TransportError> {
            self.sent
                .lock()
                .unwrap()
                .push(String::from_utf8_lossy(payload).into_owned());
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

    /// Dashes on cycle 1, fails on cycle 13, idles otherwise.
    struct Scripted;

    impl Policy for Scripted {
        fn step(
            &self,
            world: &WorldSnapshot,
            _state: &mut PolicyState,
        ) -> Result<Vec<Command>, PolicyError> {
            match world.cycle {
                1 => Ok(vec![Command::Dash { power: 65.0 }]),
                13 => Err(PolicyError::MissingPose),
                _ => Ok(Vec::new()),
            }
        }
    }

    fn engine(
        recorder: Arc<Recorder>,
    ) -> (DecisionEngine, SharedWorld, mpsc::Sender<Signal>, Supervisor) {
        let world = WorldState::shared(0.7);
        let (tx, rx) = mpsc::channel(8);
        let supervisor = Supervisor::new();
        let engine = DecisionEngine::new(
            Arc::new(Scripted),
            world.clone(),
            OutboundBatcher::new(recorder),
            rx,
            supervisor.clone(),
        );
        (engine, world, tx, supervisor)
    }

    const BOUNDARY_AND_DATA: Wake = Wake {
        boundaries: 1,
        new_data: true,
    };

    #[tokio::test]
    async fn empty_flush_then_single_dash() {
        let recorder = Arc::new(Recorder::default());
        let (mut engine, world, _tx, _supervisor) = engine(recorder.clone());

        world.write().await.apply(&Event::CycleBoundary { time: 1 });
        let first = engine.handle(BOUNDARY_AND_DATA).await.unwrap();
        assert_eq!(first.flushes.len(), 1);
        assert_eq!(first.flushes.first().unwrap().commands, 0);
        assert_eq!(first.step, Some(StepOutcome::Acted(1)));
        assert!(recorder.sent().is_empty());

        world.write().await.apply(&Event::CycleBoundary { time: 2 });
        let second = engine.handle(BOUNDARY_AND_DATA).await.unwrap();
        assert_eq!(second.flushes.first().unwrap().commands, 1);
        assert_eq!(second.step, Some(StepOutcome::Acted(0)));
        assert_eq!(recorder.sent(), vec!["(dash 65)"]);
    }

    #[tokio::test]
    async fn flushes_precede_the_step_in_one_wake() {
        let recorder = Arc::new(Recorder::default());
        let (mut engine, world, _tx, _supervisor) = engine(recorder.clone());

        world.write().await.apply(&Event::CycleBoundary { time: 1 });
        engine.handle(BOUNDARY_AND_DATA).await.unwrap();

        // Two boundaries and data arrive together: the dash goes out on the
        // first flush, the second flush is empty, then the step runs.
        world.write().await.apply(&Event::CycleBoundary { time: 3 });
        let report = engine
            .handle(Wake {
                boundaries: 2,
                new_data: true,
            })
            .await
            .unwrap();
        let counts: Vec<usize> = report.flushes.iter().map(|f| f.commands).collect();
        assert_eq!(counts, vec![1, 0]);
        assert_eq!(recorder.sent(), vec!["(dash 65)"]);
        assert!(engine.batcher().pending().is_empty());
    }

    #[tokio::test]
    async fn failed_step_queues_scanning_turn() {
        let recorder = Arc::new(Recorder::default());
        let (mut engine, world, _tx, _supervisor) = engine(recorder.clone());

        world.write().await.apply(&Event::CycleBoundary { time: 13 });
        let outcome = engine.step().await;
        assert_eq!(outcome, StepOutcome::Fallback(PolicyError::MissingPose));
        assert_eq!(
            engine.batcher().pending(),
            &[Command::Turn { moment: SCAN_TURN }]
        );
    }

    #[tokio::test]
    async fn run_drains_signals_and_stops_on_cancel() {
        let recorder = Arc::new(Recorder::default());
        let (engine, world, tx, supervisor) = engine(recorder.clone());
        world.write().await.apply(&Event::CycleBoundary { time: 1 });

        // Queued before the engine starts, so all three land in one wake:
        // an empty flush, then a step that queues the dash.
        tx.send(Signal::NewData).await.unwrap();
        tx.send(Signal::CycleBoundary).await.unwrap();
        tx.send(Signal::NewData).await.unwrap();
        let task = tokio::spawn(engine.run());
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        tx.send(Signal::CycleBoundary).await.unwrap();

        tokio::time::timeout(std::time::Duration::from_secs(2), async {
            while recorder.sent().is_empty() {
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        supervisor.cancel();
        let report = task.await.unwrap();
        assert_eq!(report.steps, 1);
        assert_eq!(report.flushes, 2);
        assert_eq!(recorder.sent(), vec!["(dash 65)"]);
        assert_eq!(supervisor.fault(), None);
    }

    #[tokio::test]
    async fn closed_channel_is_a_pump_fault() {
        let recorder = Arc::new(Recorder::default());
        let (engine, _world, tx, supervisor) = engine(recorder);
        drop(tx);
        engine.run().await;
        assert_eq!(
            supervisor.fault(),
            Some(SessionFault::TaskDied { task: "pump" })
        );
    }
}
