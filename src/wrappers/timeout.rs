//! [`TimeBoundWrapper`] — deadline enforcement with cancellation.

use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::dry_context::DryContext;
use crate::error::OpError;
use crate::metadata::OpMetadata;
use crate::op::{AnyOp, Op};
use crate::wet_context::WetContext;
use crate::wrappers::logging::LoggingWrapper;

/// Races the wrapped op against a deadline.
///
/// On timeout, fails with [`OpError::Timeout`] carrying
/// `round(timeout_secs * 1000)` milliseconds. The wrapped op's task is
/// cancelled promptly: `tokio::time::timeout` drops the inner future the
/// moment the deadline elapses, so the op stops making progress at its
/// next suspension point.
///
/// Does not swallow the wrapped op's own errors — those propagate
/// unchanged, distinguishable from a timeout because they are not
/// `OpError::Timeout`.
pub struct TimeBoundWrapper<T> {
    name: String,
    timeout_secs: f64,
    inner: AnyOp<T>,
}

impl<T> TimeBoundWrapper<T> {
    /// Wrap `inner` with a `timeout_secs`-second deadline.
    pub fn new(timeout_secs: f64, inner: AnyOp<T>) -> Self {
        let name = inner.metadata().name.clone();
        Self {
            name,
            timeout_secs,
            inner,
        }
    }
}

#[async_trait]
impl<T: Send + Sync + 'static> Op<T> for TimeBoundWrapper<T> {
    async fn perform(&self, dry: &DryContext, wet: &WetContext) -> Result<T, OpError> {
        let budget = Duration::from_secs_f64(self.timeout_secs.max(0.0));
        let start = Instant::now();
        match tokio::time::timeout(budget, self.inner.perform(dry, wet)).await {
            Ok(result) => {
                let elapsed = start.elapsed();
                if self.timeout_secs > 0.0 && elapsed.as_secs_f64() > self.timeout_secs * 0.8 {
                    tracing::warn!(
                        op = %self.name,
                        elapsed_secs = elapsed.as_secs_f64(),
                        budget_secs = self.timeout_secs,
                        "Op '{}' is near its timeout budget",
                        self.name
                    );
                }
                result
            }
            Err(_elapsed) => {
                let ms = (self.timeout_secs * 1000.0).round() as u64;
                Err(OpError::Timeout(ms))
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

/// Compose `TimeBoundWrapper -> LoggingWrapper`: the timeout enforcement
/// sits innermost so that a timeout error is itself observed (and
/// re-raised under `name`) by the logging layer.
pub fn time_bound_with_logging<T: Send + Sync + 'static>(
    name: impl Into<String>,
    timeout_secs: f64,
    inner: AnyOp<T>,
) -> AnyOp<T> {
    let bound = AnyOp::new(TimeBoundWrapper::new(timeout_secs, inner));
    AnyOp::new(LoggingWrapper::named(name, bound))
}
