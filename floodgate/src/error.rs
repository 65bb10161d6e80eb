//! Error types for harness operations.

use std::io;
use std::time::Duration;

use crate::budget::BudgetError;
use crate::plan::PlanError;
use crate::sync::SyncError;
use crate::wire::WireError;

/// Result alias used throughout the harness.
pub type HarnessResult<T> = Result<T, HarnessError>;

/// Errors that can abort a scenario or fail a single request.
///
/// Setup and deadline errors are cross-cutting and abort the whole
/// scenario; the remaining variants surface through a single request and
/// are captured per session by the collector.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// Scenario setup failed before any assertion could run. Fatal.
    #[error("scenario setup failed: {0}")]
    Setup(#[source] io::Error),

    /// The worker budget leaves no capacity for handlers.
    #[error(transparent)]
    Budget(#[from] BudgetError),

    /// The server never exhibited the expected saturation behavior.
    #[error("no saturation signal within {waited:?}")]
    StarvationTimeout {
        /// How long the driver waited for the signal.
        waited: Duration,
    },

    /// Response collection did not drain every session in time.
    ///
    /// This is the hang the harness exists to catch: at least one
    /// session neither completed nor terminated.
    #[error("response collection exceeded its {waited:?} deadline")]
    CollectionTimeout {
        /// The overall collection deadline that elapsed.
        waited: Duration,
    },

    /// A synchronization gate failed inside a request handler.
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// A dispatch plan could not be loaded for a request.
    #[error(transparent)]
    Plan(#[from] PlanError),

    /// Malformed request or response bytes on the wire.
    #[error(transparent)]
    Wire(#[from] WireError),

    /// I/O failure while serving a single request.
    #[error("request I/O failed: {0}")]
    RequestIo(#[from] io::Error),
}
