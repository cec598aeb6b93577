//! `WebPA` Server — tower pipeline stages that attach request facts
//! (logger, token, device id, convey payload) to each operation's context.

pub mod logging;
pub mod service;

pub use logging::{init_tracing, LogFormat, LoggingConfig};
pub use service::{
    build_operation_pipeline, quiet_missing_fact_panics, Operation, OperationError,
    OperationFuture, OperationResponse, ServerConfig,
};
