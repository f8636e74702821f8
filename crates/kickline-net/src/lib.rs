//! Network collaborators for the Kickline agent.
//!
//! Implements the `kickline-core` link contracts against a real soccer
//! server: a UDP [`Transport`](kickline_core::link::Transport) that follows
//! the per-player port reassignment, and a
//! [`MessageDecoder`](kickline_core::link::MessageDecoder) for the server's
//! S-expression messages.
//!
//! # Modules
//!
//! - [`decoder`] -- `init` / `hear` / `see` / `sense_body` decoding
//! - [`landmarks`] -- Field flag positions and self-localisation
//! - [`sexp`] -- S-expression reader
//! - [`udp`] -- [`UdpTransport`](udp::UdpTransport) and [`UdpLink`](udp::UdpLink)

pub mod decoder;
pub mod landmarks;
pub mod sexp;
pub mod udp;

pub use decoder::SexpDecoder;
pub use udp::{UdpLink, UdpTransport};
