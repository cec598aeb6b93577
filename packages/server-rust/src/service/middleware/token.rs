//! Token stage: parses the `Authorization` header into a [`Token`] fact.

use std::fmt;
use std::sync::Arc;
use std::task::{Context, Poll};

use tower::{Layer, Service};
use webpa_core::{fact, Token, TokenError, Validator};

use crate::service::operation::{Operation, OperationError, OperationFuture, OperationResponse};

// ---------------------------------------------------------------------------
// TokenLayer
// ---------------------------------------------------------------------------

/// Tower layer that attaches the request's [`Token`].
///
/// A malformed header is rejected with `OperationError::InvalidToken`. A
/// missing header is rejected with `OperationError::Unauthorized` only when
/// `require_token` is set; otherwise the operation continues without a token
/// fact. When a validator is configured, tokens it refuses are rejected.
#[derive(Clone, Default)]
pub struct TokenLayer {
    require_token: bool,
    validator: Option<Arc<dyn Validator>>,
}

impl TokenLayer {
    #[must_use]
    pub fn new(require_token: bool) -> Self {
        Self {
            require_token,
            validator: None,
        }
    }

    #[must_use]
    pub fn with_validator(mut self, validator: impl Validator + 'static) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }
}

impl fmt::Debug for TokenLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenLayer")
            .field("require_token", &self.require_token)
            .field("validator", &self.validator.is_some())
            .finish()
    }
}

impl<S> Layer<S> for TokenLayer {
    type Service = TokenService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TokenService {
            inner,
            require_token: self.require_token,
            validator: self.validator.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// TokenService
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct TokenService<S> {
    inner: S,
    require_token: bool,
    validator: Option<Arc<dyn Validator>>,
}

impl<S> TokenService<S> {
    fn check(&self, op: &Operation) -> Result<Option<Token>, OperationError> {
        let token = match Token::from_headers(&op.headers) {
            Ok(token) => token,
            Err(TokenError::Missing) if !self.require_token => return Ok(None),
            Err(TokenError::Missing) => return Err(OperationError::Unauthorized),
            Err(err) => return Err(err.into()),
        };

        match &self.validator {
            Some(validator) if !validator.validate(&token) => Err(OperationError::Unauthorized),
            _ => Ok(Some(token)),
        }
    }
}

impl<S> Service<Operation> for TokenService<S>
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
        match self.check(&op) {
            Ok(Some(token)) => {
                tracing::debug!(token_type = %token.token_type(), "token attached");
                op.ctx = fact::set_token(&op.ctx, token);
            }
            Ok(None) => {}
            Err(err) => {
                if let Some(logger) = fact::logger(&op.ctx) {
                    logger.warn(&format!("rejecting request: {err}"));
                }
                return Box::pin(async move { Err(err) });
            }
        }

        Box::pin(self.inner.call(op))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
