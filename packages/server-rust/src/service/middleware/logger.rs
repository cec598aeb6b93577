//! Logger stage.
//!
//! Opens the per-request span, binds a [`Logger`] to it as a request fact, and
//! records duration and outcome once the rest of the pipeline completes.

use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use tower::{Layer, Service};
use tracing::{info_span, Instrument};
use uuid::Uuid;
use webpa_core::{fact, Logger};

use crate::service::operation::{Operation, OperationError, OperationFuture, OperationResponse};

// ---------------------------------------------------------------------------
// LoggerLayer
// ---------------------------------------------------------------------------

/// Tower layer that attaches a request-bound [`Logger`] to every operation.
#[derive(Debug, Clone)]
pub struct LoggerLayer {
    node_id: Arc<str>,
}

impl LoggerLayer {
    #[must_use]
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into().into(),
        }
    }
}

impl<S> Layer<S> for LoggerLayer {
    type Service = LoggerService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        LoggerService {
            inner,
            node_id: self.node_id.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// LoggerService
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LoggerService<S> {
    inner: S,
    node_id: Arc<str>,
}

impl<S> Service<Operation> for LoggerService<S>
where
    S: Service<Operation, Response = OperationResponse, Error = OperationError> + Send,
    S::Future: Send + 'static,
{
    type Response = OperationResponse;
    type Error = OperationError;
    type Future = OperationFuture;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut op: Operation) -> Self::Future {
        let request_id = Uuid::new_v4().to_string();
        let call_id = op.call_id;

        let span = info_span!(
            "request",
            request_id = %request_id,
            node_id = %self.node_id,
            call_id = call_id,
            duration_ms = tracing::field::Empty,
            outcome = tracing::field::Empty,
        );

        op.ctx = fact::set_logger(&op.ctx, Logger::new(request_id, span.clone()));

        // Downstream stages run their synchronous part inside the span too.
        let fut = span.in_scope(|| self.inner.call(op));

        Box::pin(
            async move {
                let start = Instant::now();
                let result = fut.await;

                let outcome = match &result {
                    Ok(_) => "ok",
                    Err(_) => "error",
                };

                #[allow(clippy::cast_possible_truncation)]
                let duration_ms = start.elapsed().as_millis() as u64;
                tracing::Span::current().record("duration_ms", duration_ms);
                tracing::Span::current().record("outcome", outcome);

                match &result {
                    Ok(_) => tracing::info!(call_id, duration_ms, outcome, "request complete"),
                    Err(err) => tracing::warn!(call_id, duration_ms, outcome, error = %err, "request failed"),
                }

                result
            }
            .instrument(span),
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use http::HeaderMap;
    use tower::{service_fn, ServiceExt};

    use super::*;

    #[tokio::test]
    async fn handler_sees_logger_fact() {
        let svc = LoggerLayer::new("node-1").layer(service_fn(|op: Operation| async move {
            let logger = fact::must_logger(&op.ctx);
            logger.info("handling");
            Ok::<_, OperationError>(OperationResponse::Json(serde_json::json!({
                "request_id": logger.request_id(),
            })))
        }));

        let resp = svc.oneshot(Operation::new(7, HeaderMap::new(), "")).await.unwrap();
        let OperationResponse::Json(body) = resp else {
            panic!("expected json response");
        };
        let request_id = body["request_id"].as_str().unwrap();
        assert!(Uuid::parse_str(request_id).is_ok());
    }

    #[tokio::test]
    async fn each_request_gets_its_own_logger() {
        let svc = LoggerLayer::new("node-1").layer(service_fn(|op: Operation| async move {
            let id = fact::must_logger(&op.ctx).request_id().to_string();
            Ok::<_, OperationError>(OperationResponse::Json(serde_json::Value::String(id)))
        }));

        let first = svc.clone().oneshot(Operation::new(1, HeaderMap::new(), "")).await.unwrap();
        let second = svc.oneshot(Operation::new(2, HeaderMap::new(), "")).await.unwrap();
        match (first, second) {
            (OperationResponse::Json(a), OperationResponse::Json(b)) => assert_ne!(a, b),
            other => panic!("unexpected responses: {other:?}"),
        }
    }

    #[tokio::test]
    async fn errors_pass_through() {
        let svc = LoggerLayer::new("node-1").layer(service_fn(|_op: Operation| async move {
            Err::<OperationResponse, _>(OperationError::Unauthorized)
        }));

        let err = svc.oneshot(Operation::new(3, HeaderMap::new(), "")).await.unwrap_err();
        assert!(matches!(err, OperationError::Unauthorized));
    }
}
