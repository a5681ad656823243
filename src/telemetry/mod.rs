//! Telemetry for the resource core.
//!
//! Structured logging through `tracing`, plus spans around every service
//! operation.

mod logging;
mod spans;

pub use logging::{init_logging, LogConfig, LogError, LogFormat};
pub use spans::{traced, OperationSpan, SpanExt};
