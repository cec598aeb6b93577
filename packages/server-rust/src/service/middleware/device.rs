//! Device identity stage: canonicalizes the device name header into a
//! [`DeviceId`](webpa_core::DeviceId) fact.

use std::sync::Arc;
use std::task::{Context, Poll};

use tower::{Layer, Service};
use webpa_core::{fact, parse_id, IdError};

use crate::service::operation::{Operation, OperationError, OperationFuture, OperationResponse};

// ---------------------------------------------------------------------------
// DeviceIdLayer
// ---------------------------------------------------------------------------

/// Tower layer that attaches the request's canonical device id.
///
/// Operations without the header pass through untouched; an unparseable
/// value is rejected with `OperationError::InvalidDeviceId`.
#[derive(Debug, Clone)]
pub struct DeviceIdLayer {
    header: Arc<str>,
}

impl DeviceIdLayer {
    #[must_use]
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into().into(),
        }
    }
}

impl<S> Layer<S> for DeviceIdLayer {
    type Service = DeviceIdService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        DeviceIdService {
            inner,
            header: self.header.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// DeviceIdService
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct DeviceIdService<S> {
    inner: S,
    header: Arc<str>,
}

impl<S> Service<Operation> for DeviceIdService<S>
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
        let parsed = op
            .header(&self.header)
            .map(|value| value.map_err(|value| IdError::Invalid { value }).and_then(parse_id));
        match parsed {
            Some(Ok(id)) => {
                tracing::debug!(device_id = %id, "device id attached");
                op.ctx = fact::set_device_id(&op.ctx, id);
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
