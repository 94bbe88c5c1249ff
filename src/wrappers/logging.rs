//! [`LoggingWrapper`] — structured trace emission around `perform`.

use std::time::Instant;

use async_trait::async_trait;

use crate::dry_context::DryContext;
use crate::error::OpError;
use crate::metadata::OpMetadata;
use crate::op::{AnyOp, Op};
use crate::wet_context::WetContext;

/// ANSI color code for a starting/in-progress event. Exposed for tooling
/// that renders trace output itself rather than going through `tracing`.
pub const ANSI_YELLOW: &str = "\x1b[33m";
/// ANSI color code for a success event.
pub const ANSI_GREEN: &str = "\x1b[32m";
/// ANSI color code for a failure event.
pub const ANSI_RED: &str = "\x1b[31m";
/// ANSI reset code.
pub const ANSI_RESET: &str = "\x1b[0m";

/// Wraps an op, emitting three structured `tracing` events around
/// `perform`: a start event, a success event carrying wall-clock
/// duration, and a failure event carrying duration and the error
/// description. On failure, re-raises the error wrapped with
/// [`crate::error::wrap_nested_op_exception`] under this wrapper's name.
///
/// Event message strings are part of the crate's stable external
/// interface (§6): do not reword them.
pub struct LoggingWrapper<T> {
    name: String,
    inner: AnyOp<T>,
}

impl<T> LoggingWrapper<T> {
    /// Wrap `inner`, using its own metadata name as the trigger name.
    pub fn new(inner: AnyOp<T>) -> Self {
        let name = inner.metadata().name;
        Self { name, inner }
    }

    /// Wrap `inner` under an explicit trigger `name` (used by
    /// [`crate::helpers::perform`], which names the wrapper after the
    /// calling code's `file::line`).
    pub fn named(name: impl Into<String>, inner: AnyOp<T>) -> Self {
        Self {
            name: name.into(),
            inner,
        }
    }
}

#[async_trait]
impl<T: Send + Sync + 'static> Op<T> for LoggingWrapper<T> {
    async fn perform(&self, dry: &DryContext, wet: &WetContext) -> Result<T, OpError> {
        tracing::debug!(op = %self.name, "Starting op: {}", self.name);
        let start = Instant::now();
        match self.inner.perform(dry, wet).await {
            Ok(v) => {
                let secs = start.elapsed().as_secs_f64();
                tracing::info!(
                    op = %self.name,
                    duration_secs = secs,
                    "Op '{}' completed in {:.3} seconds",
                    self.name,
                    secs
                );
                Ok(v)
            }
            Err(err) => {
                let secs = start.elapsed().as_secs_f64();
                tracing::warn!(
                    op = %self.name,
                    duration_secs = secs,
                    error = %err,
                    "Op '{}' failed after {:.3} seconds: {}",
                    self.name,
                    secs,
                    err
                );
                if err.is_control_signal() {
                    return Err(err);
                }
                let inner_description = err.to_string();
                Err(crate::error::wrap_nested_op_exception(
                    &self.name,
                    OpError::ExecutionFailed(inner_description),
                ))
            }
        }
    }

    fn metadata(&self) -> OpMetadata {
        self.inner.metadata()
    }

    async fn rollback(&self, dry: &DryContext, wet: &WetContext) -> Result<(), OpError> {
        self.inner.rollback(dry, wet).await
    }
}
