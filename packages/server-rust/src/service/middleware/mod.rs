//! Tower middleware layers for the operation pipeline.
//!
//! - [`logger`]: Request span and logger fact
//! - [`recover`]: Stage-boundary recovery for missing required facts
//! - [`token`]: Authorization token fact
//! - [`device`]: Canonical device id fact
//! - [`convey`]: Decoded convey payload fact
//! - [`pipeline`]: Composes all layers into a single service stack

pub mod convey;
pub mod device;
pub mod logger;
pub mod pipeline;
pub mod recover;
pub mod token;

pub use convey::ConveyLayer;
pub use device::DeviceIdLayer;
pub use logger::LoggerLayer;
pub use pipeline::build_operation_pipeline;
pub use recover::{quiet_missing_fact_panics, RecoverLayer};
pub use token::TokenLayer;
