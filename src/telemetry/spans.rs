//! Span helpers for resource operations.

use std::fmt::Display;
use std::future::Future;
use std::time::Instant;

use tracing::{info_span, Instrument, Span};

/// Extension trait for adding outcome fields to spans.
pub trait SpanExt {
    /// Record the result of an operation into the span.
    fn record_result<T, E>(&self, result: &Result<T, E>)
    where
        E: Display;
}

impl SpanExt for Span {
    fn record_result<T, E>(&self, result: &Result<T, E>)
    where
        E: Display,
    {
        match result {
            Ok(_) => {
                self.record("status", "ok");
            }
            Err(e) => {
                self.record("status", "error");
                self.record("error.message", e.to_string().as_str());
            }
        }
    }
}

/// Factory for standardized operation spans.
pub struct OperationSpan;

impl OperationSpan {
    /// Span for one call of `operation` (e.g. `service::vision::add_detector`).
    ///
    /// `status`, `error.message` and `latency_ms` are filled in by `traced`.
    pub fn new(operation: &'static str) -> Span {
        info_span!(
            "resource_operation",
            operation = operation,
            status = tracing::field::Empty,
            error.message = tracing::field::Empty,
            latency_ms = tracing::field::Empty,
        )
    }
}

/// Run `fut` inside `span` and record its outcome and latency.
pub async fn traced<T, E, F>(span: Span, fut: F) -> Result<T, E>
where
    E: Display,
    F: Future<Output = Result<T, E>>,
{
    let start = Instant::now();
    let result = fut.instrument(span.clone()).await;
    span.record("latency_ms", start.elapsed().as_millis() as u64);
    span.record_result(&result);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_traced_passes_result_through() {
        let ok: Result<u32, String> = traced(OperationSpan::new("test::ok"), async { Ok(7) }).await;
        assert_eq!(ok, Ok(7));

        let err: Result<u32, String> =
            traced(OperationSpan::new("test::err"), async { Err("boom".to_string()) }).await;
        assert_eq!(err, Err("boom".to_string()));
    }
}
