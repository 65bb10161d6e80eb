//! # Floodgate
//!
//! A concurrency-stress harness for bounded worker-pool network servers.
//!
//! The harness deterministically reproduces worker starvation and
//! mid-response failure against a server under test, then proves three
//! things about it:
//!
//! - no client request silently hangs past a deadline,
//! - delivered data is byte-exact despite backpressure,
//! - a failure injected mid-response surfaces as a clean abort, never as
//!   corruption or deadlock.
//!
//! Reproducing a specific concurrency shape (N workers simultaneously
//! pinned) without flakiness requires exact accounting of a fixed worker
//! budget ([`WorkerBudget`]), rendezvous-based synchronization with
//! explicit deadlines ([`RendezvousGate`], [`StarvationSignal`]), and a
//! response collector decoupled from the saturated server
//! ([`collect_all`]). Fault behavior is injected as configuration:
//! stream decorators wrap each accepted connection
//! ([`HeadOnlyWriteFault`], [`WriteStallProbe`]) and handlers compose by
//! wrapping ([`DispatchPlanHandler`]).
//!
//! Independently, the [`plan`] module provides a named, replayable
//! dispatch-event log used to verify multi-hop request routing: the
//! first handler stage to see a request loads its plan and attaches it
//! to the request context; every later stage appends to the same log.

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]

/// Worker-budget accounting for the server under test.
pub mod budget;
/// Concurrent response collection.
pub mod collector;
/// Request-scoped typed attachment store.
pub mod context;
/// Scenario driver.
pub mod driver;
/// Error types and result alias.
pub mod error;
/// Network abstraction layer and stream shims.
pub mod network;
/// Named, replayable dispatch-event logs.
pub mod plan;
/// The bounded-worker server scenarios run against.
pub mod server;
/// Client sessions and per-session outcomes.
pub mod session;
/// Synchronization gates with explicit deadlines.
pub mod sync;
/// Minimal line-based request/response framing.
pub mod wire;

pub use budget::{BudgetError, SLOTS_PER_MULTIPLEXER, WorkerBudget};
pub use collector::collect_all;
pub use context::ContextMap;
pub use driver::{Scenario, ScenarioReport, ScenarioTimeouts, run};
pub use error::{HarnessError, HarnessResult};
pub use network::{
    BoxedByteStream, ByteStream, HeadOnlyWriteFault, NetworkProvider, StreamDecorator,
    TcpListenerTrait, TokioNetworkProvider, WriteStallProbe,
};
pub use plan::{
    DISPATCH_PLAN_HEADER, DispatchPlan, DispatchPlanHandler, PlanError, PlanStore, SharedPlan,
};
pub use server::{
    Handler, RendezvousHandler, Request, ResourceHandler, ResponseWriter, Server, ServerHandle,
    ServerSpec,
};
pub use session::{ClientSession, Expectation, SessionOutcome, SessionReport};
pub use sync::{RendezvousGate, StarvationSignal, SyncError};
pub use wire::{
    MAX_HEAD_BYTES, RequestHead, ResponseHead, WireError, format_request, format_response_head,
};
