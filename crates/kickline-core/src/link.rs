//! Collaborator contracts consumed by the session core.
//!
//! The core never touches sockets or message grammar directly. A [`Link`]
//! opens a [`Transport`] to the server and supplies the [`MessageDecoder`]
//! that turns raw payloads into [`Event`]s. `kickline-net` ships the UDP and
//! S-expression implementations; tests substitute in-memory doubles.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use kickline_types::Event;

/// Errors raised by a [`Transport`].
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// A socket operation failed. Non-fatal for a single message.
    #[error("transport I/O error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// The transport was shut down or the peer went away.
    #[error("transport closed")]
    Closed,

    /// The server address could not be resolved.
    #[error("cannot resolve server address {host}:{port}")]
    Unresolvable {
        /// Host that failed to resolve.
        host: String,
        /// Port that was requested.
        port: u16,
    },
}

impl TransportError {
    /// Whether the error ends the session.
    pub const fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

/// Errors raised by a [`MessageDecoder`]. Always non-fatal: the message is
/// dropped and the pump moves on.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The payload is not valid UTF-8.
    #[error("payload is not UTF-8")]
    NotUtf8,

    /// The payload does not follow the message grammar.
    #[error("malformed message: {reason}")]
    Malformed {
        /// What the decoder tripped over.
        reason: String,
    },

    /// The server reported an error of its own.
    #[error("server error: {message}")]
    Server {
        /// The server's error text.
        message: String,
    },
}

/// A bidirectional message channel to the server.
///
/// `recv` is the inbound pump's only suspension point, so implementations
/// must make [`shutdown`](Transport::shutdown) wake a pending `recv` with
/// [`TransportError::Closed`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one payload to the current server endpoint.
    async fn send(&self, payload: &[u8]) -> Result<(), TransportError>;

    /// Wait for the next payload from the server.
    async fn recv(&self) -> Result<Vec<u8>, TransportError>;

    /// The server endpoint commands are currently sent to. The server moves
    /// each player to a dedicated endpoint when it answers the handshake.
    fn endpoint(&self) -> SocketAddr;

    /// Close the transport and wake any pending `recv`. Idempotent.
    fn shutdown(&self);
}

/// Decodes raw server payloads into typed events.
pub trait MessageDecoder: Send {
    /// Decode one payload into exactly one event.
    fn decode(&mut self, payload: &[u8]) -> Result<Event, DecodeError>;
}

/// Factory for the session's collaborators.
#[async_trait]
pub trait Link: Send + Sync {
    /// Open a transport to `host:port`.
    async fn open(&self, host: &str, port: u16) -> Result<Arc<dyn Transport>, TransportError>;

    /// Create a decoder for a session of `team`.
    fn decoder(&self, team: &str) -> Box<dyn MessageDecoder>;
}
