//! Handler stage that attaches a dispatch plan to each request.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{PlanStore, SharedPlan};
use crate::error::HarnessResult;
use crate::server::{Handler, Request, ResponseWriter};

/// Request header naming the plan to load.
pub const DISPATCH_PLAN_HEADER: &str = "X-Dispatch-Plan";

/// Loads the request's dispatch plan once and records its own passage.
///
/// On first contact with a request the handler loads the plan named by
/// the `X-Dispatch-Plan` header, records the load as the plan's first
/// event, and attaches the plan to the request context. Later stages of
/// the same request (including further instances of this handler) find
/// the attachment and never reload, even though the header is still
/// present. A request without the header passes through untouched; a
/// header naming a plan the store cannot resolve fails the request.
pub struct DispatchPlanHandler {
    store: PlanStore,
    inner: Arc<dyn Handler>,
}

impl DispatchPlanHandler {
    /// Wrap `inner` with plan attachment backed by `store`.
    pub fn new(store: PlanStore, inner: Arc<dyn Handler>) -> Self {
        Self { store, inner }
    }
}

#[async_trait]
impl Handler for DispatchPlanHandler {
    async fn handle(
        &self,
        request: &mut Request,
        response: &mut ResponseWriter<'_>,
    ) -> HarnessResult<()> {
        if !request.context.contains::<SharedPlan>() {
            match request.header(DISPATCH_PLAN_HEADER).map(str::to_string) {
                Some(name) => {
                    let mut plan = self.store.load(&name).await?;
                    plan.add_event(format!("Initial plan: {name}"));
                    request.context.insert::<SharedPlan>(Arc::new(Mutex::new(plan)));
                }
                None => {
                    tracing::info!(
                        path = %request.target,
                        "missing {DISPATCH_PLAN_HEADER} header, skipping dispatch-plan behaviors for this request"
                    );
                }
            }
        }

        if let Some(plan) = request.context.get::<SharedPlan>() {
            plan.lock().await.add_event(format!(
                "DispatchPlanHandler: method={} target={}",
                request.method, request.target
            ));
        }

        self.inner.handle(request, response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::BoxedByteStream;
    use crate::wire::RequestHead;

    struct NoopHandler;

    #[async_trait]
    impl Handler for NoopHandler {
        async fn handle(
            &self,
            _request: &mut Request,
            _response: &mut ResponseWriter<'_>,
        ) -> HarnessResult<()> {
            Ok(())
        }
    }

    fn request_with_header(name: Option<&str>) -> Request {
        let mut raw = b"GET /demo HTTP/1.1\r\nHost: localhost\r\n".to_vec();
        if let Some(name) = name {
            raw.extend_from_slice(format!("{DISPATCH_PLAN_HEADER}: {name}\r\n").as_bytes());
        }
        raw.extend_from_slice(b"\r\n");
        let (head, _) = RequestHead::parse(&raw).expect("parse").expect("head");
        Request::from_head(head)
    }

    async fn run_stage(handler: &DispatchPlanHandler, request: &mut Request) -> HarnessResult<()> {
        let (near, _far) = tokio::io::duplex(64);
        let mut stream: BoxedByteStream = Box::new(near);
        let mut response = ResponseWriter::new(&mut stream);
        handler.handle(request, &mut response).await
    }

    #[tokio::test]
    async fn loads_attaches_and_records_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("demo"), "step one\n").expect("write plan");

        let handler =
            DispatchPlanHandler::new(PlanStore::new(dir.path()), Arc::new(NoopHandler));
        let mut request = request_with_header(Some("demo"));

        // Two stages touch the same request; the plan is loaded once.
        run_stage(&handler, &mut request).await.expect("first stage");
        run_stage(&handler, &mut request).await.expect("second stage");

        let plan = request
            .context
            .get::<SharedPlan>()
            .expect("attached")
            .lock()
            .await;
        assert_eq!(
            plan.events(),
            [
                "Initial plan: demo",
                "DispatchPlanHandler: method=GET target=/demo",
                "DispatchPlanHandler: method=GET target=/demo",
            ]
        );
    }

    #[tokio::test]
    async fn missing_header_is_a_pass_through() {
        let dir = tempfile::tempdir().expect("tempdir");
        let handler =
            DispatchPlanHandler::new(PlanStore::new(dir.path()), Arc::new(NoopHandler));

        let mut request = request_with_header(None);
        run_stage(&handler, &mut request).await.expect("pass through");
        assert!(!request.context.contains::<SharedPlan>());
    }

    #[tokio::test]
    async fn unknown_plan_fails_the_request() {
        let dir = tempfile::tempdir().expect("tempdir");
        let handler =
            DispatchPlanHandler::new(PlanStore::new(dir.path()), Arc::new(NoopHandler));

        let mut request = request_with_header(Some("missing"));
        let err = run_stage(&handler, &mut request).await.expect_err("fails");
        assert!(err.to_string().contains("missing"));
    }
}
