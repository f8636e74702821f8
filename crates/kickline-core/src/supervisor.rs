//! Cancellation and fault reporting shared by the session's two tasks.
//!
//! A [`Supervisor`] is cloned into the inbound pump and the decision engine.
//! The controller cancels both through it on disconnect; either task records a
//! [`SessionFault`] through it when the session can no longer continue, which
//! also cancels the other task.

use std::sync::Arc;

use tokio::sync::watch;

/// A condition that ends a session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionFault {
    /// The transport closed while the session was live.
    #[error("transport closed")]
    TransportClosed,

    /// Receiving kept failing without the transport closing.
    #[error("transport failed {consecutive} times in a row")]
    TransportFailing {
        /// Consecutive receive errors before giving up.
        consecutive: u32,
    },

    /// The server answered the handshake with an error.
    #[error("server rejected the session: {message}")]
    Rejected {
        /// The server's error text.
        message: String,
    },

    /// One of the session tasks stopped on its own.
    #[error("{task} task died")]
    TaskDied {
        /// Which task died (`pump` or `engine`).
        task: &'static str,
    },
}

/// Shared cancellation flag plus first-fault slot.
#[derive(Debug, Clone)]
pub struct Supervisor {
    cancel: Arc<watch::Sender<bool>>,
    fault: Arc<watch::Sender<Option<SessionFault>>>,
}

impl Supervisor {
    /// Create a supervisor with no cancellation and no fault.
    pub fn new() -> Self {
        Self {
            cancel: Arc::new(watch::Sender::new(false)),
            fault: Arc::new(watch::Sender::new(None)),
        }
    }

    /// Ask both tasks to stop.
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Resolve once cancellation has been requested.
    pub async fn cancelled(&self) {
        let mut rx = self.cancel.subscribe();
        // The sender lives in `self`, so the channel cannot close under us.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }

    /// Record `fault` (the first one wins) and cancel both tasks.
    pub fn fail(&self, fault: SessionFault) {
        self.fault.send_if_modified(|slot| {
            if slot.is_none() {
                *slot = Some(fault);
                true
            } else {
                false
            }
        });
        self.cancel();
    }

    /// The recorded fault, if any.
    pub fn fault(&self) -> Option<SessionFault> {
        self.fault.borrow().clone()
    }

    /// Resolve with the first fault recorded.
    pub async fn wait_for_fault(&self) -> SessionFault {
        let mut rx = self.fault.subscribe();
        loop {
            if let Some(fault) = rx.borrow_and_update().clone() {
                return fault;
            }
            if rx.changed().await.is_err() {
                return std::future::pending().await;
            }
        }
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}
