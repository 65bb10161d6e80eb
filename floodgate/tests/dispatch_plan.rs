//! End-to-end dispatch-plan attachment through a running server.
//!
//! A chain of handler stages touches each request; the plan loaded by
//! the first stage must be reused, not reloaded, by every later stage,
//! and the event log must record exactly one load plus one event per
//! stage, in causal order.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use floodgate::{
    DISPATCH_PLAN_HEADER, DispatchPlanHandler, Handler, HarnessResult, NetworkProvider, PlanStore,
    Request, ResponseHead, ResponseWriter, Server, ServerHandle, ServerSpec, SharedPlan,
    TokioNetworkProvider, WorkerBudget, format_request,
};

/// Terminal stage: records its own passage, then answers with the event
/// log so the client can assert on it.
struct EventEchoHandler;

#[async_trait]
impl Handler for EventEchoHandler {
    async fn handle(
        &self,
        request: &mut Request,
        response: &mut ResponseWriter<'_>,
    ) -> HarnessResult<()> {
        let body = match request.context.get::<SharedPlan>() {
            Some(plan) => {
                let mut plan = plan.lock().await;
                plan.add_event(format!("EventEchoHandler: target={}", request.target));
                plan.events().join("\n")
            }
            None => "no plan".to_string(),
        };
        response.send(200, "OK", body.as_bytes()).await
    }
}

async fn start_plan_server(store: PlanStore, stages: usize) -> ServerHandle {
    let mut handler: Arc<dyn Handler> = Arc::new(EventEchoHandler);
    for _ in 0..stages {
        handler = Arc::new(DispatchPlanHandler::new(store.clone(), handler));
    }
    let spec = ServerSpec {
        budget: WorkerBudget::new(4, 0, 1).expect("budget"),
        handler,
        decorator: None,
    };
    Server::start(TokioNetworkProvider::new(), spec)
        .await
        .expect("start server")
}

async fn exchange(addr: &str, request: &[u8]) -> Vec<u8> {
    let provider = TokioNetworkProvider::new();
    let mut stream = provider.connect(addr).await.expect("connect");
    stream.write_all(request).await.expect("send request");
    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.expect("read response");
    raw
}

fn body_of(raw: &[u8]) -> String {
    let (head, consumed) = ResponseHead::parse(raw).expect("parse").expect("head");
    assert_eq!(head.status, 200);
    String::from_utf8_lossy(&raw[consumed..]).into_owned()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn two_stages_share_one_plan_load() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("demo-plan"), "forward /backend\n").expect("write plan");

    let server = start_plan_server(PlanStore::new(dir.path()), 2).await;
    let raw = exchange(
        server.local_addr(),
        &format_request("/app", "localhost", &[(DISPATCH_PLAN_HEADER, "demo-plan")]),
    )
    .await;
    server.stop().await;

    let body = body_of(&raw);
    let events: Vec<&str> = body.lines().collect();
    assert_eq!(
        events,
        [
            "Initial plan: demo-plan",
            "DispatchPlanHandler: method=GET target=/app",
            "DispatchPlanHandler: method=GET target=/app",
            "EventEchoHandler: target=/app",
        ]
    );

    // One load event, no matter how many stages saw the header.
    let loads = events
        .iter()
        .filter(|event| event.starts_with("Initial plan:"))
        .count();
    assert_eq!(loads, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn requests_without_the_header_pass_through() {
    let dir = tempfile::tempdir().expect("tempdir");
    let server = start_plan_server(PlanStore::new(dir.path()), 1).await;

    let raw = exchange(
        server.local_addr(),
        &format_request("/app", "localhost", &[]),
    )
    .await;
    server.stop().await;

    assert_eq!(body_of(&raw), "no plan");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn naming_a_missing_plan_fails_the_request() {
    let dir = tempfile::tempdir().expect("tempdir");
    let server = start_plan_server(PlanStore::new(dir.path()), 1).await;

    // The handler fails before writing anything, so the server drops the
    // connection: EOF with zero bytes delivered.
    let raw = exchange(
        server.local_addr(),
        &format_request("/app", "localhost", &[(DISPATCH_PLAN_HEADER, "no-such-plan")]),
    )
    .await;
    server.stop().await;

    assert!(raw.is_empty(), "expected a dropped connection, got {raw:?}");
}
