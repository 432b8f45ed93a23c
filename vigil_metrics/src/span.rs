//! Scoped timing guards.
//!
//! A [`Span`] captures its start time when opened and commits exactly one
//! record (latency, optional tokens, step outcome) to its collector when it
//! is dropped, on every exit path including early returns, `?` and panics.

use crate::collector::MetricsCollector;
use chrono::{DateTime, Utc};
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use vigil_core::TraceContext;

pub struct Span {
    collector: Arc<MetricsCollector>,
    operation: String,
    context: TraceContext,
    started: Instant,
    started_at: DateTime<Utc>,
    tokens: Option<(i64, i64)>,
    tool_call: bool,
    outcome: Option<bool>,
}

impl Span {
    pub(crate) fn open(
        collector: Arc<MetricsCollector>,
        operation: impl Into<String>,
        context: TraceContext,
    ) -> Self {
        let operation = operation.into();
        debug!(
            operation = %operation,
            trace_id = %context.trace_id,
            span_id = %context.span_id,
            parent_span_id = ?context.parent_span_id,
            "span.start"
        );

        Self {
            collector,
            operation,
            context,
            started: Instant::now(),
            started_at: Utc::now(),
            tokens: None,
            tool_call: false,
            outcome: None,
        }
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn context(&self) -> &TraceContext {
        &self.context
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Opens a span for a nested operation in the same trace.
    pub fn child(&self, operation: impl Into<String>) -> Span {
        Span::open(self.collector.clone(), operation, self.context.new_span())
    }

    /// Adds token usage to be committed with this span.
    pub fn record_tokens(&mut self, input_tokens: i64, output_tokens: i64) {
        let (input, output) = self.tokens.unwrap_or((0, 0));
        self.tokens = Some((
            input.saturating_add(input_tokens.max(0)),
            output.saturating_add(output_tokens.max(0)),
        ));
    }

    pub fn mark_tool_call(&mut self) {
        self.tool_call = true;
    }

    pub fn succeed(&mut self) {
        self.outcome = Some(true);
    }

    pub fn fail(&mut self) {
        self.outcome = Some(false);
    }

    /// Sets the outcome from `result` and commits, handing the result back.
    pub fn finish<T, E: Display>(mut self, result: Result<T, E>) -> Result<T, E> {
        match &result {
            Ok(_) => self.succeed(),
            Err(e) => {
                warn!(operation = %self.operation, error = %e, "span.error");
                self.fail();
            }
        }
        result
    }

    fn commit(&mut self) {
        let success = self.outcome.unwrap_or(!std::thread::panicking());
        let elapsed = self.started.elapsed();
        let latency_ms = elapsed.as_secs_f64() * 1000.0;

        self.collector.commit(
            &self.operation,
            latency_ms,
            self.tokens,
            success,
            self.tool_call,
        );

        if success {
            debug!(
                operation = %self.operation,
                trace_id = %self.context.trace_id,
                span_id = %self.context.span_id,
                elapsed_ms = latency_ms,
                "span.end"
            );
        } else {
            warn!(
                operation = %self.operation,
                trace_id = %self.context.trace_id,
                span_id = %self.context.span_id,
                elapsed_ms = latency_ms,
                "span.failed"
            );
        }
    }
}

impl Drop for Span {
    fn drop(&mut self) {
        self.commit();
    }
}

impl MetricsCollector {
    /// Opens a span that starts a new trace.
    pub fn span(self: &Arc<Self>, operation: impl Into<String>) -> Span {
        Span::open(self.clone(), operation, TraceContext::new())
    }

    pub fn span_with_context(
        self: &Arc<Self>,
        operation: impl Into<String>,
        context: TraceContext,
    ) -> Span {
        Span::open(self.clone(), operation, context)
    }

    /// Opens a span whose context is a child of `parent`.
    pub fn child_span(self: &Arc<Self>, parent: &TraceContext, operation: impl Into<String>) -> Span {
        Span::open(self.clone(), operation, parent.new_span())
    }

    /// Runs `future` inside a span; the span counts as failed unless the
    /// future resolves to `Ok`, so cancellation and panics record a failure.
    pub async fn instrument<F, T, E>(self: &Arc<Self>, operation: impl Into<String>, future: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut span = self.span(operation);
        span.fail();
        let result = future.await;
        span.finish(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    #[test]
    fn test_span_success() {
        let collector = Arc::new(MetricsCollector::new());
        {
            let span = collector.span("test_span");
            assert!(span.context().is_root());
        }

        let metrics = collector.operation_metrics("test_span");
        assert_eq!(metrics.total_steps, 1);
        assert_eq!(metrics.successful_steps, 1);
        assert_eq!(metrics.latency_samples, 1);
    }

    #[test]
    fn test_span_finish_with_error() {
        let collector = Arc::new(MetricsCollector::new());

        let result: Result<(), String> = collector
            .span("test_span_error")
            .finish(Err("boom".to_string()));

        assert!(result.is_err());
        let metrics = collector.operation_metrics("test_span_error");
        assert_eq!(metrics.failed_steps, 1);
        assert_eq!(metrics.error_rate, 1.0);
    }

    #[test]
    fn test_span_commits_once_on_panic() {
        let collector = Arc::new(MetricsCollector::new());
        let inner = collector.clone();

        let outcome = catch_unwind(AssertUnwindSafe(move || {
            let _span = inner.span("panicky");
            panic!("instrumented operation failed");
        }));

        assert!(outcome.is_err());
        let metrics = collector.operation_metrics("panicky");
        assert_eq!(metrics.total_steps, 1);
        assert_eq!(metrics.failed_steps, 1);
    }

    #[test]
    fn test_span_tokens_and_tool_call() {
        let collector = Arc::new(MetricsCollector::new());
        {
            let mut span = collector.span("tool_executor");
            span.record_tokens(100, 20);
            span.record_tokens(-5, 30);
            span.mark_tool_call();
            span.succeed();
        }

        let metrics = collector.operation_metrics("tool_executor");
        assert_eq!(metrics.input_tokens, 100);
        assert_eq!(metrics.output_tokens, 50);
        assert_eq!(metrics.tool_calls, 1);
        assert_eq!(metrics.tool_success_rate, 1.0);
    }

    #[test]
    fn test_child_span_shares_trace() {
        let collector = Arc::new(MetricsCollector::new());
        let parent = collector.span("episode");
        let child = parent.child("planner");

        assert_eq!(child.context().trace_id, parent.context().trace_id);
        assert_eq!(
            child.context().parent_span_id.as_deref(),
            Some(parent.context().span_id.as_str())
        );

        let sibling = collector.child_span(parent.context(), "reasoner");
        assert_eq!(sibling.context().trace_id, parent.context().trace_id);
    }

    #[tokio::test]
    async fn test_instrument_async() {
        let collector = Arc::new(MetricsCollector::new());

        let ok: Result<u32, String> = collector.instrument("fetch", async { Ok(7) }).await;
        let err: Result<u32, String> = collector
            .instrument("fetch", async { Err("timeout".to_string()) })
            .await;

        assert_eq!(ok, Ok(7));
        assert!(err.is_err());
        let metrics = collector.operation_metrics("fetch");
        assert_eq!(metrics.successful_steps, 1);
        assert_eq!(metrics.failed_steps, 1);
    }

    #[tokio::test]
    async fn test_instrument_cancelled_counts_as_failure() {
        let collector = Arc::new(MetricsCollector::new());
        let pending = collector.instrument("stuck", async {
            std::future::pending::<()>().await;
            Ok::<(), String>(())
        });

        let timed_out = tokio::time::timeout(Duration::from_millis(10), pending).await;

        assert!(timed_out.is_err());
        assert_eq!(collector.operation_metrics("stuck").failed_steps, 1);
    }
}
