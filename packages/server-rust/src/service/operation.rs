use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use http::HeaderMap;
use webpa_core::{Context, ConveyError, IdError, MissingFact, TokenError};

/// A request flowing through the pipeline.
///
/// Stages attach facts by deriving a new context from `ctx` and storing the
/// derived handle back into the operation before passing it on.
#[derive(Debug, Clone)]
pub struct Operation {
    pub call_id: u64,
    pub ctx: Context,
    pub headers: HeaderMap,
    pub payload: Bytes,
}

impl Operation {
    #[must_use]
    pub fn new(call_id: u64, headers: HeaderMap, payload: impl Into<Bytes>) -> Self {
        Self {
            call_id,
            ctx: Context::root(),
            headers,
            payload: payload.into(),
        }
    }

    #[must_use]
    pub fn ctx(&self) -> &Context {
        &self.ctx
    }

    /// Header value as text.
    ///
    /// A value that is not visible ASCII yields `Err` with a lossy rendering
    /// of its bytes, so stages can reject it rather than treat it as absent.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<Result<&str, String>> {
        self.headers.get(name).map(|value| {
            value
                .to_str()
                .map_err(|_| String::from_utf8_lossy(value.as_bytes()).into_owned())
        })
    }
}

/// Successful response from an operation handler.
#[derive(Debug)]
pub enum OperationResponse {
    Ack { call_id: u64 },
    Json(serde_json::Value),
    Empty,
}

/// Boxed future returned by every pipeline stage.
pub type OperationFuture =
    Pin<Box<dyn Future<Output = Result<OperationResponse, OperationError>> + Send>>;

/// Errors returned by pipeline stages and handlers.
#[derive(Debug, thiserror::Error)]
pub enum OperationError {
    #[error("invalid device id: {0}")]
    InvalidDeviceId(#[from] IdError),
    #[error("invalid convey payload: {0}")]
    InvalidConvey(#[from] ConveyError),
    #[error("invalid token: {0}")]
    InvalidToken(#[from] TokenError),
    #[error("unauthorized")]
    Unauthorized,
    #[error("stage precondition failed: {0}")]
    MissingFact(MissingFact),
    #[error("stage panicked: {message}")]
    Panicked { message: String },
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}
