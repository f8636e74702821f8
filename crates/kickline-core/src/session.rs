//! Session lifecycle.
//!
//! [`SessionController`] walks one agent through
//! `Disconnected → Connecting → Connected → Playing → Terminating →
//! Disconnected`. It opens the transport, runs the handshake, spawns the
//! inbound pump on connect and the decision engine on play, and tears both
//! down on disconnect. A controller serves exactly one session; once
//! disconnected it is retired and a new one must be built.

use std::sync::Arc;
use std::time::Duration;

use kickline_types::{Command, Side};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::batcher::OutboundBatcher;
use crate::config::AgentConfig;
use crate::engine::DecisionEngine;
use crate::link::{Link, Transport, TransportError};
use crate::policy::Policy;
use crate::pump::{InboundPump, SIGNAL_CAPACITY, Signal};
use crate::supervisor::{SessionFault, Supervisor};
use crate::world::{SharedWorld, WorldState};

/// How often the handshake checks for the endpoint change and join reply.
const HANDSHAKE_POLL: Duration = Duration::from_millis(10);

// ---------------------------------------------------------------------------
// States and errors
// ---------------------------------------------------------------------------

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No transport open.
    Disconnected,
    /// Handshake in progress.
    Connecting,
    /// Joined the match; the pump is running.
    Connected,
    /// The decision engine is running.
    Playing,
    /// Tearing down.
    Terminating,
}

impl SessionState {
    /// Returns the string representation used in structured logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Playing => "playing",
            Self::Terminating => "terminating",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An operation was attempted in the wrong lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionStateError {
    /// `connect` was called while a session is open.
    #[error("already connected (state: {state})")]
    AlreadyConnected {
        /// State at the time of the call.
        state: SessionState,
    },

    /// `play` was called without a connected session.
    #[error("not connected (state: {state})")]
    NotConnected {
        /// State at the time of the call.
        state: SessionState,
    },

    /// The controller has already been disconnected once.
    #[error("session controller is retired; build a new one to reconnect")]
    Retired,
}

/// Errors surfaced by [`SessionController`].
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Invalid lifecycle transition.
    #[error(transparent)]
    ConnectionState(#[from] ConnectionStateError),

    /// `play` was called while already playing.
    #[error("already playing")]
    AlreadyPlaying,

    /// The server refused the handshake.
    #[error("server rejected the handshake: {message}")]
    Rejected {
        /// The server's error text.
        message: String,
    },

    /// The server did not answer the handshake in time.
    #[error("handshake not answered within {waited_ms}ms")]
    HandshakeTimeout {
        /// How long the controller waited.
        waited_ms: u128,
    },

    /// Opening or using the transport failed.
    #[error("transport error: {source}")]
    Transport {
        /// The underlying transport error.
        #[from]
        source: TransportError,
    },

    /// The session broke.
    #[error("session fault: {0}")]
    Fault(#[from] SessionFault),
}

// ---------------------------------------------------------------------------
// Settings and identity
// ---------------------------------------------------------------------------

/// Timing and world parameters for a session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionSettings {
    /// Upper bound on the handshake.
    pub handshake_timeout: Duration,
    /// Upper bound on joining each task during disconnect.
    pub join_timeout: Duration,
    /// Ball distance at or below which the ball is kickable.
    pub kickable_margin: f64,
}

impl SessionSettings {
    /// Take the settings from a loaded configuration.
    pub const fn from_config(config: &AgentConfig) -> Self {
        Self {
            handshake_timeout: config.server.handshake_timeout(),
            join_timeout: config.server.join_timeout(),
            kickable_margin: config.policy.kickable_margin,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&AgentConfig::default())
    }
}

/// Who the server says we are.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    /// Team name sent in the handshake.
    pub team: String,
    /// Assigned side.
    pub side: Side,
    /// Assigned uniform number.
    pub uniform_number: u8,
}

/// Everything that exists only while a session is open.
struct LiveSession {
    transport: Arc<dyn Transport>,
    world: SharedWorld,
    supervisor: Supervisor,
    identity: SessionIdentity,
    pump: JoinHandle<crate::pump::PumpReport>,
    watcher: JoinHandle<()>,
    engine: Option<JoinHandle<crate::engine::EngineReport>>,
    signals: Option<mpsc::Receiver<Signal>>,
}

// ---------------------------------------------------------------------------
// SessionController
// ---------------------------------------------------------------------------

/// Owns one agent session and its two tasks.
pub struct SessionController {
    id: Uuid,
    link: Arc<dyn Link>,
    policy: Arc<dyn Policy>,
    settings: SessionSettings,
    state: SessionState,
    retired: bool,
    live: Option<LiveSession>,
}

impl SessionController {
    /// Create a disconnected controller.
    pub fn new(link: Arc<dyn Link>, policy: Arc<dyn Policy>, settings: SessionSettings) -> Self {
        Self {
            id: Uuid::now_v7(),
            link,
            policy,
            settings,
            state: SessionState::Disconnected,
            retired: false,
            live: None,
        }
    }

    /// Session identifier used in logs.
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Current lifecycle state. An open session whose pump or engine has
    /// faulted reports [`SessionState::Terminating`] until it is disconnected.
    pub fn state(&self) -> SessionState {
        match self.state {
            SessionState::Connected | SessionState::Playing if self.fault().is_some() => {
                SessionState::Terminating
            }
            state => state,
        }
    }

    /// Team, side, and uniform number, while connected.
    pub fn identity(&self) -> Option<&SessionIdentity> {
        self.live.as_ref().map(|live| &live.identity)
    }

    /// Shared world of the open session.
    pub fn world(&self) -> Option<SharedWorld> {
        self.live.as_ref().map(|live| Arc::clone(&live.world))
    }

    /// The fault that broke the open session, if any.
    pub fn fault(&self) -> Option<SessionFault> {
        self.live.as_ref().and_then(|live| live.supervisor.fault())
    }

    /// Resolve when either task stops on its own, with the reason. Pends
    /// forever when no session is open.
    pub async fn wait_for_fault(&self) -> SessionFault {
        match &self.live {
            Some(live) => live.supervisor.wait_for_fault().await,
            None => std::future::pending().await,
        }
    }

    /// Open the transport, start the pump, and complete the handshake.
    ///
    /// Sends `(init <team> (version <version>))`, then waits, bounded by the
    /// handshake timeout, for the transport to move to the server-assigned
    /// endpoint and for the join reply to assign a side and uniform number.
    pub async fn connect(
        &mut self,
        host: &str,
        port: u16,
        team: &str,
        version: u32,
    ) -> Result<(), SessionError> {
        if self.retired {
            return Err(ConnectionStateError::Retired.into());
        }
        if self.state != SessionState::Disconnected {
            return Err(ConnectionStateError::AlreadyConnected { state: self.state }.into());
        }

        self.state = SessionState::Connecting;
        info!(session = %self.id, host, port, team, version, "connecting");

        match self.establish(host, port, team, version).await {
            Ok(live) => {
                info!(
                    session = %self.id,
                    side = ?live.identity.side,
                    uniform = live.identity.uniform_number,
                    endpoint = %live.transport.endpoint(),
                    "connected"
                );
                self.live = Some(live);
                self.state = SessionState::Connected;
                Ok(())
            }
            Err(err) => {
                warn!(session = %self.id, error = %err, "connect failed");
                self.state = SessionState::Disconnected;
                Err(err)
            }
        }
    }

    async fn establish(
        &self,
        host: &str,
        port: u16,
        team: &str,
        version: u32,
    ) -> Result<LiveSession, SessionError> {
        let transport = self.link.open(host, port).await?;
        let world = WorldState::shared(self.settings.kickable_margin);
        let supervisor = Supervisor::new();
        let (tx, rx) = mpsc::channel(SIGNAL_CAPACITY);

        let pump = InboundPump::new(
            Arc::clone(&transport),
            self.link.decoder(team),
            Arc::clone(&world),
            tx,
            supervisor.clone(),
        );
        let pump = tokio::spawn(pump.run());

        let reply = handshake(&transport, &world, &supervisor, team, version);
        let result = tokio::time::timeout(self.settings.handshake_timeout, reply)
            .await
            .unwrap_or_else(|_elapsed| {
                Err(SessionError::HandshakeTimeout {
                    waited_ms: self.settings.handshake_timeout.as_millis(),
                })
            });

        match result {
            Ok((side, uniform_number)) => Ok(LiveSession {
                watcher: tokio::spawn(close_on_fault(
                    Arc::clone(&transport),
                    supervisor.clone(),
                    self.id,
                )),
                transport,
                world,
                supervisor,
                identity: SessionIdentity {
                    team: team.to_owned(),
                    side,
                    uniform_number,
                },
                pump,
                engine: None,
                signals: Some(rx),
            }),
            Err(err) => {
                supervisor.cancel();
                transport.shutdown();
                join_task(pump, "pump", self.settings.join_timeout).await;
                Err(err)
            }
        }
    }

    /// Start the decision engine with fresh policy state.
    pub fn play(&mut self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Connected => {}
            SessionState::Playing => return Err(SessionError::AlreadyPlaying),
            state => return Err(ConnectionStateError::NotConnected { state }.into()),
        }
        let state = self.state;
        let live = self
            .live
            .as_mut()
            .ok_or(ConnectionStateError::NotConnected { state })?;
        if let Some(fault) = live.supervisor.fault() {
            return Err(fault.into());
        }
        let signals = live
            .signals
            .take()
            .ok_or(ConnectionStateError::NotConnected { state })?;

        let engine = DecisionEngine::new(
            Arc::clone(&self.policy),
            Arc::clone(&live.world),
            OutboundBatcher::new(Arc::clone(&live.transport)),
            signals,
            live.supervisor.clone(),
        );
        live.engine = Some(tokio::spawn(engine.run()));
        self.state = SessionState::Playing;
        info!(session = %self.id, uniform = live.identity.uniform_number, "playing");
        Ok(())
    }

    /// Stop both tasks, say goodbye, and retire the controller. A no-op when
    /// already disconnected.
    pub async fn disconnect(&mut self) {
        if self.state == SessionState::Disconnected {
            return;
        }
        self.state = SessionState::Terminating;
        info!(session = %self.id, "disconnecting");

        if let Some(live) = self.live.take() {
            live.supervisor.cancel();
            if let Err(err) = live.transport.send(Command::Bye.render().as_bytes()).await {
                debug!(error = %err, "goodbye not sent");
            }
            live.transport.shutdown();
            join_task(live.pump, "pump", self.settings.join_timeout).await;
            join_task(live.watcher, "watcher", self.settings.join_timeout).await;
            if let Some(engine) = live.engine {
                join_task(engine, "engine", self.settings.join_timeout).await;
            }
        }

        self.state = SessionState::Disconnected;
        self.retired = true;
        info!(session = %self.id, "disconnected");
    }
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("retired", &self.retired)
            .field("identity", &self.identity())
            .finish_non_exhaustive()
    }
}

/// Send the handshake and wait for the endpoint change and the join reply.
async fn handshake(
    transport: &Arc<dyn Transport>,
    world: &SharedWorld,
    supervisor: &Supervisor,
    team: &str,
    version: u32,
) -> Result<(Side, u8), SessionError> {
    let initial = transport.endpoint();
    let init = Command::Init {
        team: team.to_owned(),
        version,
    };
    transport.send(init.render().as_bytes()).await?;
    debug!(endpoint = %initial, "handshake sent");

    loop {
        match supervisor.fault() {
            Some(SessionFault::Rejected { message }) => {
                return Err(SessionError::Rejected { message });
            }
            Some(fault) => return Err(fault.into()),
            None => {}
        }
        let moved = transport.endpoint() != initial;
        if let Some(identity) = world.read().await.identity().filter(|_| moved) {
            return Ok(identity);
        }
        tokio::time::sleep(HANDSHAKE_POLL).await;
    }
}

/// Say goodbye and close the transport as soon as either task faults, so a
/// broken session stops talking to the server before `disconnect` is called.
async fn close_on_fault(transport: Arc<dyn Transport>, supervisor: Supervisor, session: Uuid) {
    tokio::select! {
        biased;
        fault = supervisor.wait_for_fault() => {
            warn!(%session, %fault, "session faulted, closing transport");
            if let Err(err) = transport.send(Command::Bye.render().as_bytes()).await {
                debug!(error = %err, "goodbye not sent");
            }
            transport.shutdown();
        }
        () = supervisor.cancelled() => {}
    }
}

/// Join `handle` within `limit`, aborting it if it overruns.
async fn join_task<T>(mut handle: JoinHandle<T>, task: &'static str, limit: Duration) {
    match tokio::time::timeout(limit, &mut handle).await {
        Ok(Ok(_)) => debug!(task, "task joined"),
        Ok(Err(err)) => warn!(task, error = %err, "task ended abnormally"),
        Err(_) => {
            warn!(task, "task overran join timeout, aborting");
            handle.abort();
        }
    }
}
