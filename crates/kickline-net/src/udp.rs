//! UDP transport to the soccer server.
//!
//! The server listens for `init` on its well-known port and answers from a
//! fresh port dedicated to the player. [`UdpTransport`] records the source
//! of every datagram it receives and sends subsequent payloads there, so the
//! move happens without the session noticing.

use std::net::SocketAddr;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use kickline_core::link::{Link, MessageDecoder, Transport, TransportError};
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::decoder::SexpDecoder;

/// Largest datagram the server sends.
const RECV_BUFFER: usize = 8192;

/// A connectionless UDP socket that follows the server's endpoint.
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
    server: RwLock<SocketAddr>,
    closed: watch::Sender<bool>,
}

impl UdpTransport {
    /// Bind an ephemeral local port and target `server`.
    pub async fn bind(server: SocketAddr) -> Result<Self, TransportError> {
        let local: SocketAddr = if server.is_ipv4() {
            SocketAddr::from(([0, 0, 0, 0], 0))
        } else {
            SocketAddr::from(([0u16; 8], 0))
        };
        let socket = UdpSocket::bind(local).await?;
        debug!(local = %socket.local_addr()?, %server, "udp socket bound");
        Ok(Self {
            socket,
            server: RwLock::new(server),
            closed: watch::Sender::new(false),
        })
    }

    /// The local address the socket is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.socket.local_addr()?)
    }

    fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    fn follow(&self, from: SocketAddr) {
        let mut server = self.server.write().unwrap_or_else(PoisonError::into_inner);
        if *server != from {
            info!(previous = %*server, current = %from, "server endpoint moved");
            *server = from;
        }
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn send(&self, payload: &[u8]) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        let mut datagram = Vec::with_capacity(payload.len().saturating_add(1));
        datagram.extend_from_slice(payload);
        datagram.push(0);
        let target = self.endpoint();
        self.socket.send_to(&datagram, target).await?;
        Ok(())
    }

    async fn recv(&self) -> Result<Vec<u8>, TransportError> {
        let mut closed = self.closed.subscribe();
        if *closed.borrow_and_update() {
            return Err(TransportError::Closed);
        }

        let mut buf = vec![0u8; RECV_BUFFER];
        tokio::select! {
            _ = closed.wait_for(|c| *c) => Err(TransportError::Closed),
            received = self.socket.recv_from(&mut buf) => {
                let (len, from) = received?;
                self.follow(from);
                buf.truncate(len);
                Ok(buf)
            }
        }
    }

    fn endpoint(&self) -> SocketAddr {
        *self.server.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn shutdown(&self) {
        self.closed.send_replace(true);
    }
}

/// Opens [`UdpTransport`]s and hands out [`SexpDecoder`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct UdpLink;

#[async_trait]
impl Link for UdpLink {
    async fn open(&self, host: &str, port: u16) -> Result<Arc<dyn Transport>, TransportError> {
        let unresolvable = || TransportError::Unresolvable {
            host: host.to_owned(),
            port,
        };
        let candidates: Vec<SocketAddr> = tokio::net::lookup_host((host, port))
            .await
            .map_err(|err| {
                debug!(error = %err, host, port, "address lookup failed");
                unresolvable()
            })?
            .collect();
        let server = candidates
            .iter()
            .find(|addr| addr.is_ipv4())
            .or_else(|| candidates.first())
            .copied()
            .ok_or_else(unresolvable)?;

        Ok(Arc::new(UdpTransport::bind(server).await?))
    }

    fn decoder(&self, team: &str) -> Box<dyn MessageDecoder> {
        Box::new(SexpDecoder::new(team))
    }
}
