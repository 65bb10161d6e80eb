//! Scenario driver: saturate a server, then prove every session ends.

use std::time::Duration;

use tokio::io::AsyncWriteExt;

use crate::collector::collect_all;
use crate::error::{HarnessError, HarnessResult};
use crate::network::{BoxedByteStream, NetworkProvider};
use crate::server::{Server, ServerHandle, ServerSpec};
use crate::session::{ClientSession, Expectation, SessionReport};
use crate::sync::StarvationSignal;

/// Deadlines for the three blocking phases of a scenario.
#[derive(Debug, Clone, Copy)]
pub struct ScenarioTimeouts {
    /// How long to wait for the saturation signal.
    pub starvation: Duration,
    /// How long rendezvousing handlers wait at their gate.
    pub rendezvous: Duration,
    /// Overall deadline for draining every session.
    pub collection: Duration,
}

impl Default for ScenarioTimeouts {
    fn default() -> Self {
        Self {
            starvation: Duration::from_secs(10),
            rendezvous: Duration::from_secs(10),
            collection: Duration::from_secs(20),
        }
    }
}

/// One saturation scenario.
pub struct Scenario {
    /// Number of client sessions to open. Convention: twice the worker
    /// total, guaranteeing over-subscription.
    pub sessions: usize,
    /// The raw request written on every session.
    pub request: Vec<u8>,
    /// The outcome every session must observe.
    pub expected: Expectation,
    /// Raised when the server under test has saturated.
    pub starvation: StarvationSignal,
    /// Phase deadlines.
    pub timeouts: ScenarioTimeouts,
}

/// Per-session results of a completed scenario.
#[derive(Debug)]
pub struct ScenarioReport {
    /// One report per session, ordered by session id.
    pub sessions: Vec<SessionReport>,
}

impl ScenarioReport {
    /// Whether every session observed its expected outcome.
    pub fn passed(&self) -> bool {
        self.sessions.iter().all(SessionReport::matched)
    }

    /// The sessions that deviated from their expectation.
    pub fn mismatches(&self) -> Vec<&SessionReport> {
        self.sessions
            .iter()
            .filter(|report| !report.matched())
            .collect()
    }
}

/// Run one scenario against a freshly started server.
///
/// Strict phase order: start the server, open every session and write
/// its request without reading anything back (this is what produces the
/// backpressure), wait for the saturation signal, drain every session
/// concurrently, compare outcomes. The server is stopped on every exit
/// path, including starvation and collection timeouts.
pub async fn run<N: NetworkProvider>(
    provider: &N,
    spec: ServerSpec,
    scenario: Scenario,
) -> HarnessResult<ScenarioReport> {
    let server = Server::start(provider.clone(), spec).await?;
    let result = drive(provider, &server, scenario).await;
    server.stop().await;
    result
}

async fn drive<N: NetworkProvider>(
    provider: &N,
    server: &ServerHandle,
    scenario: Scenario,
) -> HarnessResult<ScenarioReport> {
    let mut sessions = Vec::with_capacity(scenario.sessions);
    for id in 0..scenario.sessions {
        let stream = provider
            .connect(server.local_addr())
            .await
            .map_err(HarnessError::Setup)?;
        let mut stream: BoxedByteStream = Box::new(stream);
        stream
            .write_all(&scenario.request)
            .await
            .map_err(HarnessError::Setup)?;
        stream.flush().await.map_err(HarnessError::Setup)?;
        sessions.push(ClientSession {
            id,
            stream,
            expected: scenario.expected,
        });
    }
    tracing::info!(sessions = scenario.sessions, "all requests sent, waiting for saturation");

    scenario
        .starvation
        .wait(scenario.timeouts.starvation)
        .await
        .map_err(|_| HarnessError::StarvationTimeout {
            waited: scenario.timeouts.starvation,
        })?;
    tracing::info!("saturation observed, draining sessions");

    let reports = collect_all(sessions, scenario.timeouts.collection).await?;
    Ok(ScenarioReport { sessions: reports })
}
