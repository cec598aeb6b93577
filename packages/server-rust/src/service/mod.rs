//! Operation pipeline.
//!
//! 1. **Operations** (`operation`): request envelope carrying the fact context
//! 2. **Middleware** (`middleware`): Tower layers that attach request facts
//! 3. **Configuration** (`config`): header names, encodings, auth policy

pub mod config;
pub mod middleware;
pub mod operation;

pub use config::ServerConfig;
pub use middleware::{build_operation_pipeline, quiet_missing_fact_panics};
pub use operation::{Operation, OperationError, OperationFuture, OperationResponse};
