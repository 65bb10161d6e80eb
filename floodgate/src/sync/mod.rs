//! Synchronization gates used to force a specific concurrency shape.
//!
//! Scenarios need two primitives: a rendezvous point that holds exactly
//! N participants until all have arrived, and a signal-once gate that
//! tells the driver the server has saturated. Both carry explicit
//! deadlines and make failure visible to every waiter; a missed deadline
//! is never a silent pass.

mod rendezvous;
mod signal;

pub use rendezvous::RendezvousGate;
pub use signal::StarvationSignal;

use std::time::Duration;

/// Failures of a gate wait.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    /// The deadline elapsed before the gate resolved.
    #[error("gate deadline of {waited:?} elapsed")]
    TimedOut {
        /// The deadline that elapsed.
        waited: Duration,
    },

    /// Another participant missed its deadline and broke the gate.
    #[error("gate broken by a participant missing its deadline")]
    Broken,
}
