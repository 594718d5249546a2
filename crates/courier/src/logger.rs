//! Trace logging capability.
//!
//! Every component takes its logger explicitly; nothing in this crate reaches
//! for a process-wide default. Logging is observational only.

use std::fmt;
use std::sync::Arc;

/// A sink for debug traces.
pub trait Logger: Send + Sync {
    fn debug(&self, message: fmt::Arguments<'_>);
}

/// Forwards traces to `tracing` under the `courier` target.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn debug(&self, message: fmt::Arguments<'_>) {
        tracing::debug!(target: "courier", "{}", message);
    }
}

/// Discards every trace.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopLogger;

impl Logger for NoopLogger {
    fn debug(&self, _message: fmt::Arguments<'_>) {}
}

pub type SharedLogger = Arc<dyn Logger>;

pub fn tracing_logger() -> SharedLogger {
    Arc::new(TracingLogger)
}
