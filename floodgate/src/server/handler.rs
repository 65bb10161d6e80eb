//! Request handler chain for the server under test.

use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::context::ContextMap;
use crate::error::HarnessResult;
use crate::network::BoxedByteStream;
use crate::sync::{RendezvousGate, StarvationSignal};
use crate::wire::{RequestHead, format_response_head};

/// A request as seen by handler stages.
#[derive(Debug)]
pub struct Request {
    /// Request method.
    pub method: String,
    /// Request target.
    pub target: String,
    /// Header name/value pairs in arrival order.
    pub headers: Vec<(String, String)>,
    /// Request-scoped attachments, discarded when the request ends.
    pub context: ContextMap,
}

impl Request {
    pub(crate) fn from_head(head: RequestHead) -> Self {
        Self {
            method: head.method,
            target: head.target,
            headers: head.headers,
            context: ContextMap::new(),
        }
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(candidate, _)| candidate.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Writes a response onto the connection a request arrived on.
pub struct ResponseWriter<'a> {
    stream: &'a mut BoxedByteStream,
    head_sent: bool,
}

impl<'a> ResponseWriter<'a> {
    pub(crate) fn new(stream: &'a mut BoxedByteStream) -> Self {
        Self {
            stream,
            head_sent: false,
        }
    }

    /// Write the response head, declaring the exact body size.
    pub async fn send_head(
        &mut self,
        status: u16,
        reason: &str,
        content_length: u64,
    ) -> HarnessResult<()> {
        if self.head_sent {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "head already sent").into());
        }
        self.stream
            .write_all(&format_response_head(status, reason, content_length))
            .await?;
        self.head_sent = true;
        Ok(())
    }

    /// Write a chunk of body bytes.
    pub async fn write_body(&mut self, chunk: &[u8]) -> HarnessResult<()> {
        self.stream.write_all(chunk).await?;
        Ok(())
    }

    /// Write a complete fixed response: head then body.
    pub async fn send(&mut self, status: u16, reason: &str, body: &[u8]) -> HarnessResult<()> {
        self.send_head(status, reason, body.len() as u64).await?;
        self.write_body(body).await
    }

    /// Whether the head has been written.
    pub fn head_sent(&self) -> bool {
        self.head_sent
    }
}

/// A request handler stage.
///
/// Handlers compose by wrapping: a stage holds its downstream as
/// `Arc<dyn Handler>` and delegates after doing its own work. An error
/// return aborts the connection without further writes.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Handle one request.
    async fn handle(
        &self,
        request: &mut Request,
        response: &mut ResponseWriter<'_>,
    ) -> HarnessResult<()>;
}

/// Holds the first `parties` requests at a rendezvous gate, then
/// responds identically on every request.
///
/// Per-request lifecycle: arrival atomically claims a sequence number;
/// the first `parties` arrivals wait at the gate (a timeout or broken
/// gate fails the request), later arrivals respond immediately. When the
/// gate releases, the handler raises the starvation signal: at that
/// moment exactly `parties` workers are known to be inside handlers
/// simultaneously.
pub struct RendezvousHandler {
    gate: RendezvousGate,
    deadline: Duration,
    signal: StarvationSignal,
    arrivals: AtomicUsize,
}

impl RendezvousHandler {
    /// Fixed response body, matching the declared content length of 13.
    pub const BODY: &'static [u8] = b"Hello World!\n";

    /// Create a handler rendezvousing `gate.parties()` requests.
    pub fn new(gate: RendezvousGate, deadline: Duration, signal: StarvationSignal) -> Self {
        Self {
            gate,
            deadline,
            signal,
            arrivals: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Handler for RendezvousHandler {
    async fn handle(
        &self,
        _request: &mut Request,
        response: &mut ResponseWriter<'_>,
    ) -> HarnessResult<()> {
        let arrival = self.arrivals.fetch_add(1, Ordering::SeqCst);
        if arrival < self.gate.parties() {
            self.gate.wait(self.deadline).await?;
            self.signal.raise();
        }
        response.send(200, "OK", Self::BODY).await
    }
}

/// Streams a configured file's bytes as the response body.
///
/// The bulk-transfer fixture: the body is written in fixed-size chunks
/// so a non-reading peer pins the writing worker mid-response.
pub struct ResourceHandler {
    path: PathBuf,
}

impl ResourceHandler {
    const CHUNK_SIZE: usize = 64 * 1024;

    /// Serve the file at `path` for every request.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl Handler for ResourceHandler {
    async fn handle(
        &self,
        request: &mut Request,
        response: &mut ResponseWriter<'_>,
    ) -> HarnessResult<()> {
        let mut file = tokio::fs::File::open(&self.path).await?;
        let len = file.metadata().await?.len();
        tracing::debug!(target_path = %request.target, bytes = len, "streaming resource");

        response.send_head(200, "OK", len).await?;
        let mut chunk = vec![0u8; Self::CHUNK_SIZE];
        loop {
            let n = file.read(&mut chunk).await?;
            if n == 0 {
                break;
            }
            response.write_body(&chunk[..n]).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rendezvous_body_matches_declared_length() {
        assert_eq!(RendezvousHandler::BODY.len(), 13);
    }
}
