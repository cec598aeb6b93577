//! Stage-boundary recovery.
//!
//! `must_*` fact accessors unwind when a precondition fact is missing. This
//! layer catches unwinds raised by anything beneath it, both while the inner
//! service builds its future and while that future runs, and turns them into
//! an [`OperationError`] for the one request instead of taking down the task.
//!
//! The process panic hook still runs before the unwind reaches this layer, so
//! the default hook prints every recovered `MissingFact` to stderr. Binaries
//! that expect such failures can call [`quiet_missing_fact_panics`].

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::task::{Context, Poll};

use futures_util::FutureExt;
use tower::{Layer, Service};
use webpa_core::{fact, Logger, MissingFact};

use crate::service::operation::{Operation, OperationError, OperationFuture, OperationResponse};

// ---------------------------------------------------------------------------
// RecoverLayer
// ---------------------------------------------------------------------------

/// Tower layer that wraps a service in a [`RecoverService`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RecoverLayer;

impl<S> Layer<S> for RecoverLayer {
    type Service = RecoverService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RecoverService { inner }
    }
}

// ---------------------------------------------------------------------------
// RecoverService
// ---------------------------------------------------------------------------

/// Service that converts unwinds from its inner service into
/// `OperationError::MissingFact` or `OperationError::Panicked`.
#[derive(Debug, Clone)]
pub struct RecoverService<S> {
    inner: S,
}

impl<S> Service<Operation> for RecoverService<S>
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

    fn call(&mut self, op: Operation) -> Self::Future {
        let call_id = op.call_id;
        let logger = fact::logger(&op.ctx).cloned();

        let fut = match catch_unwind(AssertUnwindSafe(|| self.inner.call(op))) {
            Ok(fut) => fut,
            Err(payload) => {
                let err = recovered(call_id, logger.as_ref(), payload.as_ref());
                return Box::pin(async move { Err(err) });
            }
        };

        Box::pin(async move {
            match AssertUnwindSafe(fut).catch_unwind().await {
                Ok(result) => result,
                Err(payload) => Err(recovered(call_id, logger.as_ref(), payload.as_ref())),
            }
        })
    }
}

/// Install a panic hook that skips `MissingFact` payloads and defers to the
/// previously installed hook for everything else.
pub fn quiet_missing_fact_panics() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        if MissingFact::from_panic(info.payload()).is_none() {
            previous(info);
        }
    }));
}

fn recovered(call_id: u64, logger: Option<&Logger>, payload: &(dyn Any + Send)) -> OperationError {
    let err = match MissingFact::from_panic(payload) {
        Some(missing) => OperationError::MissingFact(missing),
        None => OperationError::Panicked {
            message: panic_message(payload),
        },
    };

    match logger {
        Some(logger) => logger.error(&format!("call {call_id} aborted: {err}")),
        None => tracing::error!(call_id, error = %err, "call aborted"),
    }
    err
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
