//! Request-bound logger.
//!
//! A [`Logger`] pairs a request id with the `tracing` span opened for that
//! request. Events emitted through it are parented to the span, so they carry
//! the request's fields regardless of which task or thread emits them.

use tracing::Span;

#[derive(Debug, Clone)]
pub struct Logger {
    request_id: String,
    span: Span,
}

impl Logger {
    /// Bind a logger to an existing span.
    #[must_use]
    pub fn new(request_id: impl Into<String>, span: Span) -> Self {
        Self {
            request_id: request_id.into(),
            span,
        }
    }

    /// Open a `request` span for `request_id` and bind a logger to it.
    #[must_use]
    pub fn for_request(request_id: impl Into<String>) -> Self {
        let request_id = request_id.into();
        let span = tracing::info_span!("request", request_id = %request_id);
        Self { request_id, span }
    }

    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    #[must_use]
    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn debug(&self, message: &str) {
        tracing::debug!(parent: &self.span, "{message}");
    }

    pub fn info(&self, message: &str) {
        tracing::info!(parent: &self.span, "{message}");
    }

    pub fn warn(&self, message: &str) {
        tracing::warn!(parent: &self.span, "{message}");
    }

    pub fn error(&self, message: &str) {
        tracing::error!(parent: &self.span, "{message}");
    }
}
