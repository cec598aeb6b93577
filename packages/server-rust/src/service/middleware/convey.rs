//! Convey stage: decodes the convey header into a [`Convey`](webpa_core::Convey) fact.

use std::sync::Arc;
use std::task::{Context, Poll};

use tower::{Layer, Service};
use webpa_core::{fact, parse_payload, ConveyError, Encoding};

use crate::service::operation::{Operation, OperationError, OperationFuture, OperationResponse};

// ---------------------------------------------------------------------------
// ConveyLayer
// ---------------------------------------------------------------------------

/// Tower layer that attaches the request's decoded convey payload.
///
/// Operations without the header pass through untouched; a value that is not
/// base64 JSON is rejected with `OperationError::InvalidConvey`.
#[derive(Debug, Clone)]
pub struct ConveyLayer {
    header: Arc<str>,
    encoding: Encoding,
}

impl ConveyLayer {
    #[must_use]
    pub fn new(header: impl Into<String>, encoding: Encoding) -> Self {
        Self {
            header: header.into().into(),
            encoding,
        }
    }
}

impl<S> Layer<S> for ConveyLayer {
    type Service = ConveyService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ConveyService {
            inner,
            header: self.header.clone(),
            encoding: self.encoding,
        }
    }
}

// ---------------------------------------------------------------------------
// ConveyService
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ConveyService<S> {
    inner: S,
    header: Arc<str>,
    encoding: Encoding,
}

impl<S> Service<Operation> for ConveyService<S>
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
        let encoding = self.encoding;
        let parsed = op.header(&self.header).map(|value| {
            value
                .map_err(|_| ConveyError::NotText)
                .and_then(|value| parse_payload(encoding, value))
        });
        match parsed {
            Some(Ok(payload)) => {
                tracing::debug!(entries = payload.len(), "convey payload attached");
                op.ctx = fact::set_convey(&op.ctx, payload);
            }
            Some(Err(err)) => {
                if let Some(logger) = fact::logger(&op.ctx) {
                    logger.warn(&format!("rejecting request: {err}"));
                }
                return Box::pin(async move { Err(OperationError::from(err)) });
            }
            None => {}
        }

        Box::pin(self.inner.call(op))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
