//! In-memory server double shared by the integration tests.
//!
//! [`MockServer`] hands out a [`Link`] whose transport records every payload
//! the agent sends and delivers whatever the test injects. Payloads are plain
//! words understood by [`WordDecoder`] rather than real server messages.

#![allow(clippy::unwrap_used, dead_code, missing_docs)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use kickline_core::link::{DecodeError, Link, MessageDecoder, Transport, TransportError};
use kickline_core::policy::{Policy, PolicyError, PolicyState};
use kickline_core::session::SessionSettings;
use kickline_core::world::WorldSnapshot;
use kickline_types::{Command, Event, PlayMode, Side, WorldUpdate};
use tokio::sync::{mpsc, watch};

/// The port the mock moves the agent to after the handshake.
pub const PLAYER_PORT: u16 = 6001;

/// How the mock answers `init`.
#[derive(Clone, Copy)]
enum Reply {
    /// Move to the player port and join as `l 7`.
    Join,
    /// Refuse from the well-known port.
    Reject,
    /// Never answer.
    Silent,
}

pub struct MockTransport {
    inbound_tx: mpsc::UnboundedSender<Vec<u8>>,
    inbound_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    sent: Mutex<Vec<String>>,
    endpoint: Mutex<SocketAddr>,
    closed: watch::Sender<bool>,
    failing: AtomicBool,
    reply: Reply,
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, payload: &[u8]) -> Result<(), TransportError> {
        if *self.closed.borrow() {
            return Err(TransportError::Closed);
        }
        let text = String::from_utf8(payload.to_vec()).unwrap();
        let is_init = text.starts_with("(init");
        self.sent.lock().unwrap().push(text);

        if is_init {
            match self.reply {
                Reply::Join => {
                    *self.endpoint.lock().unwrap() =
                        SocketAddr::from(([127, 0, 0, 1], PLAYER_PORT));
                    self.inbound_tx.send(b"join l 7".to_vec()).unwrap();
                }
                Reply::Reject => {
                    self.inbound_tx
                        .send(b"error no_more_team_or_player_or_goalie".to_vec())
                        .unwrap();
                }
                Reply::Silent => {}
            }
        }
        Ok(())
    }

    async fn recv(&self) -> Result<Vec<u8>, TransportError> {
        let mut closed = self.closed.subscribe();
        if *closed.borrow_and_update() {
            return Err(TransportError::Closed);
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(std::io::Error::other("connection refused").into());
        }
        let mut inbound = self.inbound_rx.lock().await;
        tokio::select! {
            _ = closed.wait_for(|c| *c) => Err(TransportError::Closed),
            payload = inbound.recv() => payload.ok_or(TransportError::Closed),
        }
    }

    fn endpoint(&self) -> SocketAddr {
        *self.endpoint.lock().unwrap()
    }

    fn shutdown(&self) {
        self.closed.send_replace(true);
    }
}

/// Decodes the mock's word protocol.
pub struct WordDecoder;

impl MessageDecoder for WordDecoder {
    fn decode(&mut self, payload: &[u8]) -> Result<Event, DecodeError> {
        let text = std::str::from_utf8(payload)
            .ok()
            .ok_or(DecodeError::NotUtf8)?;
        let words: Vec<&str> = text.split_whitespace().collect();
        match words.as_slice() {
            ["join", side, number] => Ok(Event::WorldUpdate(WorldUpdate::Joined {
                side: Side::from_tag(side).unwrap(),
                uniform_number: number.parse().unwrap(),
                play_mode: PlayMode::BeforeKickOff,
            })),
            ["boundary", time] => Ok(Event::CycleBoundary {
                time: time.parse().unwrap(),
            }),
            ["play_on"] => Ok(Event::WorldUpdate(WorldUpdate::Referee {
                time: 0,
                play_mode: PlayMode::PlayOn,
            })),
            ["error", rest @ ..] => Err(DecodeError::Server {
                message: rest.join(" "),
            }),
            ["junk", ..] => Err(DecodeError::Malformed {
                reason: String::from("junk"),
            }),
            [head, ..] => Ok(Event::Unrecognized {
                head: (*head).to_owned(),
            }),
            [] => Err(DecodeError::Malformed {
                reason: String::from("empty"),
            }),
        }
    }
}

pub struct MockLink {
    transport: Arc<MockTransport>,
}

#[async_trait]
impl Link for MockLink {
    async fn open(&self, _host: &str, _port: u16) -> Result<Arc<dyn Transport>, TransportError> {
        Ok(self.transport.clone())
    }

    fn decoder(&self, _team: &str) -> Box<dyn MessageDecoder> {
        Box::new(WordDecoder)
    }
}

/// Test-side handle on the mock.
#[derive(Clone)]
pub struct MockServer {
    transport: Arc<MockTransport>,
}

impl MockServer {
    /// A server that answers the handshake with side `l`, uniform 7.
    pub fn new() -> Self {
        Self::build(Reply::Join)
    }

    /// A server that never answers the handshake.
    pub fn silent() -> Self {
        Self::build(Reply::Silent)
    }

    /// A server that refuses the handshake because the team is full.
    pub fn full() -> Self {
        Self::build(Reply::Reject)
    }

    fn build(reply: Reply) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            transport: Arc::new(MockTransport {
                inbound_tx: tx,
                inbound_rx: tokio::sync::Mutex::new(rx),
                sent: Mutex::new(Vec::new()),
                endpoint: Mutex::new(SocketAddr::from(([127, 0, 0, 1], 6000))),
                closed: watch::Sender::new(false),
                failing: AtomicBool::new(false),
                reply,
            }),
        }
    }

    pub fn link(&self) -> Arc<dyn Link> {
        Arc::new(MockLink {
            transport: self.transport.clone(),
        })
    }

    /// Deliver a payload to the agent.
    pub fn inject(&self, payload: &str) {
        self.transport
            .inbound_tx
            .send(payload.as_bytes().to_vec())
            .unwrap();
    }

    /// Everything the agent has sent so far.
    pub fn sent(&self) -> Vec<String> {
        self.transport.sent.lock().unwrap().clone()
    }

    /// Port of the endpoint the agent currently sends to.
    pub fn endpoint_port(&self) -> u16 {
        self.transport.endpoint().port()
    }

    /// Drop the connection from the server side.
    pub fn close(&self) {
        self.transport.shutdown();
    }

    /// Make every later receive fail with an I/O error.
    pub fn break_receives(&self) {
        self.transport.failing.store(true, Ordering::SeqCst);
    }

    /// Whether the transport has been shut down.
    pub fn is_closed(&self) -> bool {
        *self.transport.closed.borrow()
    }
}

/// Records the cycle of every step; dashes on cycle 1 only.
#[derive(Default)]
pub struct RecordingPolicy {
    cycles: Mutex<Vec<u32>>,
}

impl RecordingPolicy {
    pub fn cycles(&self) -> Vec<u32> {
        self.cycles.lock().unwrap().clone()
    }
}

impl Policy for RecordingPolicy {
    fn step(
        &self,
        world: &WorldSnapshot,
        _state: &mut PolicyState,
    ) -> Result<Vec<Command>, PolicyError> {
        self.cycles.lock().unwrap().push(world.cycle);
        if world.cycle == 1 {
            Ok(vec![Command::Dash { power: 65.0 }])
        } else {
            Ok(Vec::new())
        }
    }
}

pub fn settings() -> SessionSettings {
    SessionSettings {
        handshake_timeout: Duration::from_millis(500),
        join_timeout: Duration::from_millis(100),
        kickable_margin: 0.7,
    }
}

/// Poll `condition` until it holds, failing the test after two seconds.
pub async fn eventually<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
}
