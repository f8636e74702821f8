//! Session lifecycle, concurrency, and decision policy for the Kickline agent.
//!
//! One session runs two tokio tasks. The inbound pump receives server
//! messages, decodes them, and applies them to the shared world; the decision
//! engine flushes the outbound batch at every cycle boundary and runs the
//! policy whenever the world changes. The session controller starts, watches,
//! and stops both.
//!
//! ```text
//! transport -> InboundPump -> WorldState -> DecisionEngine -> OutboundBatcher -> transport
//! ```
//!
//! # Modules
//!
//! - [`batcher`] -- Per-cycle outbound command batching
//! - [`config`] -- Configuration loading from `kickline.yaml`
//! - [`engine`] -- The signal-driven decision loop
//! - [`link`] -- Transport, decoder, and link collaborator traits
//! - [`policy`] -- [`Policy`](policy::Policy) trait and the rule-based policy
//! - [`pump`] -- The inbound receive loop
//! - [`session`] -- [`SessionController`](session::SessionController) lifecycle
//! - [`supervisor`] -- Cancellation and fault reporting shared by both tasks
//! - [`turn_table`] -- Precomputed angle-to-turn lookup
//! - [`world`] -- Shared world state and snapshots

pub mod batcher;
pub mod config;
pub mod engine;
pub mod link;
pub mod policy;
pub mod pump;
pub mod session;
pub mod supervisor;
pub mod turn_table;
pub mod world;
