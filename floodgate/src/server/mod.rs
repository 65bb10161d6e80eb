//! The bounded-worker server the harness points scenarios at.
//!
//! The server exposes only the narrow interface scenarios depend on:
//! start, stop, an injectable handler chain, an injectable stream
//! decorator, and a worker budget. One accept task queues incoming
//! connections; exactly `available_for_handlers` worker tasks pull from
//! the queue and run the handler chain. Connections beyond the worker
//! budget wait unserved in the queue; that is the saturation behavior
//! under test.
//!
//! The connection protocol is one request per connection: a line-based
//! request head, then a response, then close. A handler error drops the
//! connection without further writes, which is the clean-abort path
//! fault scenarios rely on.

pub mod handler;

pub use handler::{Handler, RendezvousHandler, Request, ResourceHandler, ResponseWriter};

use std::io;
use std::sync::Arc;

use tokio::io::AsyncReadExt;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

use crate::budget::WorkerBudget;
use crate::error::{HarnessError, HarnessResult};
use crate::network::{BoxedByteStream, NetworkProvider, StreamDecorator, TcpListenerTrait};
use crate::wire::RequestHead;

/// Configuration for a server under test.
pub struct ServerSpec {
    /// Worker budget; `available_for_handlers` worker tasks are spawned.
    pub budget: WorkerBudget,
    /// The handler chain run for every request.
    pub handler: Arc<dyn Handler>,
    /// Optional decorator applied to every accepted stream.
    pub decorator: Option<Arc<dyn StreamDecorator>>,
}

/// Starts servers; see [`ServerHandle`] for the running side.
pub struct Server;

impl Server {
    /// Bind to an ephemeral local port and start accepting.
    pub async fn start<N: NetworkProvider>(
        provider: N,
        spec: ServerSpec,
    ) -> HarnessResult<ServerHandle> {
        let listener = provider
            .bind("127.0.0.1:0")
            .await
            .map_err(HarnessError::Setup)?;
        let local_addr = listener.local_addr().map_err(HarnessError::Setup)?;

        let (conn_tx, conn_rx) = mpsc::unbounded_channel::<BoxedByteStream>();
        let conn_rx = Arc::new(Mutex::new(conn_rx));

        let decorator = spec.decorator.clone();
        let accept = tokio::spawn(accept_loop::<N>(listener, conn_tx, decorator));

        let worker_count = spec.budget.available_for_handlers();
        let mut workers = Vec::with_capacity(worker_count);
        for id in 0..worker_count {
            workers.push(tokio::spawn(worker_loop(
                id,
                conn_rx.clone(),
                spec.handler.clone(),
            )));
        }

        tracing::info!(
            addr = %local_addr,
            total = spec.budget.total(),
            workers = worker_count,
            "server started"
        );

        Ok(ServerHandle {
            local_addr,
            accept,
            workers,
        })
    }
}

/// A running server.
pub struct ServerHandle {
    local_addr: String,
    accept: JoinHandle<()>,
    workers: Vec<JoinHandle<()>>,
}

impl ServerHandle {
    /// The address the server is listening on.
    pub fn local_addr(&self) -> &str {
        &self.local_addr
    }

    /// Stop the server.
    ///
    /// Aborts the accept task and every worker; workers pinned in
    /// stalled writes are cancelled rather than drained.
    pub async fn stop(self) {
        self.accept.abort();
        let _ = self.accept.await;
        for worker in &self.workers {
            worker.abort();
        }
        for worker in self.workers {
            let _ = worker.await;
        }
        tracing::info!(addr = %self.local_addr, "server stopped");
    }
}

async fn accept_loop<N: NetworkProvider>(
    listener: N::TcpListener,
    conn_tx: mpsc::UnboundedSender<BoxedByteStream>,
    decorator: Option<Arc<dyn StreamDecorator>>,
) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                tracing::debug!(peer = %peer, "accepted connection");
                let mut stream: BoxedByteStream = Box::new(stream);
                if let Some(decorator) = &decorator {
                    stream = decorator.decorate(stream);
                }
                if conn_tx.send(stream).is_err() {
                    // Server dropped; stop accepting.
                    break;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "accept failed");
            }
        }
    }
}

async fn worker_loop(
    id: usize,
    conn_rx: Arc<Mutex<mpsc::UnboundedReceiver<BoxedByteStream>>>,
    handler: Arc<dyn Handler>,
) {
    loop {
        let conn = {
            let mut queue = conn_rx.lock().await;
            queue.recv().await
        };
        let Some(mut stream) = conn else {
            break;
        };
        if let Err(e) = serve_connection(id, &mut stream, handler.as_ref()).await {
            tracing::warn!(worker = id, error = %e, "connection aborted");
        }
        // Dropping the stream closes the connection.
    }
}

async fn serve_connection(
    id: usize,
    stream: &mut BoxedByteStream,
    handler: &dyn Handler,
) -> HarnessResult<()> {
    let mut buf = Vec::with_capacity(1024);
    let head = loop {
        if let Some((head, _consumed)) = RequestHead::parse(&buf)? {
            break head;
        }
        let n = stream.read_buf(&mut buf).await?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed before a complete request",
            )
            .into());
        }
    };

    let mut request = Request::from_head(head);
    tracing::debug!(
        worker = id,
        method = %request.method,
        target_path = %request.target,
        "dispatching request"
    );

    let mut response = ResponseWriter::new(stream);
    handler.handle(&mut request, &mut response).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::TokioNetworkProvider;
    use crate::wire::{ResponseHead, format_request};
    use async_trait::async_trait;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    struct FixedHandler;

    #[async_trait]
    impl Handler for FixedHandler {
        async fn handle(
            &self,
            request: &mut Request,
            response: &mut ResponseWriter<'_>,
        ) -> HarnessResult<()> {
            let body = format!("{} {}", request.method, request.target);
            response.send(200, "OK", body.as_bytes()).await
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn serves_one_request_per_connection() {
        let provider = TokioNetworkProvider::new();
        let spec = ServerSpec {
            budget: WorkerBudget::new(4, 0, 1).expect("budget"),
            handler: Arc::new(FixedHandler),
            decorator: None,
        };
        let server = Server::start(provider.clone(), spec).await.expect("start");

        let mut client = provider
            .connect(server.local_addr())
            .await
            .expect("connect");
        client
            .write_all(&format_request("/ping", "localhost", &[]))
            .await
            .expect("send request");

        let mut raw = Vec::new();
        client.read_to_end(&mut raw).await.expect("read response");

        let (head, consumed) = ResponseHead::parse(&raw)
            .expect("parse")
            .expect("complete head");
        assert_eq!(head.status, 200);
        assert_eq!(&raw[consumed..], b"GET /ping");

        server.stop().await;
    }
}
