//! Pipeline composition: stacks the fact-producing stages in front of a handler.

use tower::{Service, ServiceBuilder};
use webpa_core::ExactMatchValidator;

use super::convey::ConveyLayer;
use super::device::DeviceIdLayer;
use super::logger::LoggerLayer;
use super::recover::RecoverLayer;
use super::token::TokenLayer;
use crate::service::config::ServerConfig;
use crate::service::operation::{Operation, OperationError, OperationFuture, OperationResponse};

/// Build the operation pipeline by wrapping `handler` with the fact stages.
///
/// Layer order (outermost to innermost):
/// 1. `LoggerLayer` -- opens the request span and attaches the logger fact
/// 2. `RecoverLayer` -- stage boundary: turns `must_*` unwinds into errors
/// 3. `TokenLayer` -- attaches the token fact
/// 4. `DeviceIdLayer` -- attaches the device id fact
/// 5. `ConveyLayer` -- attaches the convey fact
///
/// Every stage threads the same context chain forward, so the handler sees
/// all facts produced upstream.
#[must_use]
pub fn build_operation_pipeline<S>(
    handler: S,
    config: &ServerConfig,
) -> impl Service<Operation, Response = OperationResponse, Error = OperationError, Future = OperationFuture>
       + Send
where
    S: Service<Operation, Response = OperationResponse, Error = OperationError> + Send,
    S::Future: Send + 'static,
{
    let mut token = TokenLayer::new(config.require_token);
    if !config.basic_auth.is_empty() {
        token = token.with_validator(ExactMatchValidator::basic(config.basic_auth.iter().cloned()));
    }

    ServiceBuilder::new()
        .layer(LoggerLayer::new(config.node_id.clone()))
        .layer(RecoverLayer)
        .layer(token)
        .layer(DeviceIdLayer::new(config.device_name_header.clone()))
        .layer(ConveyLayer::new(config.convey_header.clone(), config.convey_encoding))
        .service(handler)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
