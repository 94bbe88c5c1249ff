//! Canned [`crate::op::Op`] implementations used by this crate's own tests
//! and, behind the `test-utils` feature, by downstream consumers testing
//! their own [`crate::batch::BatchOp`]/[`crate::loop_op::LoopOp`]
//! compositions.
//!
//! Grounded in `layer0::test_utils::echo_operator::EchoOperator` (a
//! minimal canned implementation of the crate's core trait) and
//! `layer0::test_utils::logging_hook::LoggingHook`'s
//! `Mutex<Vec<RecordedEvent>>` event-recording pattern, reused here by
//! [`TrackLog`].

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::dry_context::DryContext;
use crate::error::OpError;
use crate::metadata::OpMetadata;
use crate::op::Op;
use crate::wet_context::WetContext;

/// An op that always succeeds with a fixed, cloned value.
pub struct ConstOp<T> {
    name: String,
    value: T,
}

impl<T: Clone + Send + Sync + 'static> ConstOp<T> {
    /// Create a new `ConstOp` named `name` that always returns `value`.
    pub fn new(name: impl Into<String>, value: T) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

#[async_trait]
impl<T: Clone + Send + Sync + 'static> Op<T> for ConstOp<T> {
    async fn perform(&self, _dry: &DryContext, _wet: &WetContext) -> Result<T, OpError> {
        Ok(self.value.clone())
    }

    fn metadata(&self) -> OpMetadata {
        OpMetadata::new(self.name.clone())
    }
}

/// An op that always fails with [`OpError::ExecutionFailed`].
pub struct FailingOp {
    name: String,
}

impl FailingOp {
    /// Create a new `FailingOp` named `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Op<i64> for FailingOp {
    async fn perform(&self, _dry: &DryContext, _wet: &WetContext) -> Result<i64, OpError> {
        Err(OpError::ExecutionFailed(self.name.clone()))
    }

    fn metadata(&self) -> OpMetadata {
        OpMetadata::new(self.name.clone())
    }
}

/// Reads and returns the current value of a named counter in
/// [`DryContext`]. Used to assert loop iteration ordering (seed scenario
/// S2: `CounterOp` returns `dry["c"]`).
pub struct CounterOp {
    name: String,
    counter_var: String,
}

impl CounterOp {
    /// Create a `CounterOp` that reads `counter_var` from the dry context.
    pub fn new(name: impl Into<String>, counter_var: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            counter_var: counter_var.into(),
        }
    }
}

#[async_trait]
impl Op<i64> for CounterOp {
    async fn perform(&self, dry: &DryContext, _wet: &WetContext) -> Result<i64, OpError> {
        dry.get_required::<i64>(&self.counter_var)
    }

    fn metadata(&self) -> OpMetadata {
        OpMetadata::new(self.name.clone())
    }
}

/// Shared perform/rollback call log used by [`TrackOp`] to assert LIFO
/// rollback ordering (seed scenarios S3, S4).
#[derive(Default)]
pub struct TrackLog {
    performed: Mutex<Vec<i64>>,
    rolled_back: Mutex<Vec<i64>>,
}

impl TrackLog {
    /// Create a new, empty log.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// IDs of ops that successfully performed, in execution order.
    pub fn performed(&self) -> Vec<i64> {
        self.performed.lock().unwrap().clone()
    }

    /// IDs of ops that were rolled back, in the order rollback was
    /// invoked (should be LIFO relative to `performed`).
    pub fn rolled_back(&self) -> Vec<i64> {
        self.rolled_back.lock().unwrap().clone()
    }
}

/// An op that records its id on success and on rollback, and optionally
/// fails instead of succeeding.
pub struct TrackOp {
    id: i64,
    fail: bool,
    log: Arc<TrackLog>,
}

impl TrackOp {
    /// Create a `TrackOp` with the given `id`, recording into `log`.
    /// Fails instead of succeeding when `fail` is `true`.
    pub fn new(id: i64, fail: bool, log: Arc<TrackLog>) -> Self {
        Self { id, fail, log }
    }
}

#[async_trait]
impl Op<i64> for TrackOp {
    async fn perform(&self, _dry: &DryContext, _wet: &WetContext) -> Result<i64, OpError> {
        if self.fail {
            return Err(OpError::ExecutionFailed(format!("Track({}) failed", self.id)));
        }
        self.log.performed.lock().unwrap().push(self.id);
        Ok(self.id)
    }

    fn metadata(&self) -> OpMetadata {
        OpMetadata::new(format!("Track{}", self.id))
    }

    async fn rollback(&self, _dry: &DryContext, _wet: &WetContext) -> Result<(), OpError> {
        self.log.rolled_back.lock().unwrap().push(self.id);
        Ok(())
    }
}

/// An op that sleeps for a fixed duration before returning a fixed value.
/// Used to exercise [`crate::wrappers::timeout::TimeBoundWrapper`].
pub struct SleepOp {
    name: String,
    duration: Duration,
    value: i64,
}

impl SleepOp {
    /// Create a `SleepOp` that sleeps `duration` then returns `value`.
    pub fn new(name: impl Into<String>, duration: Duration, value: i64) -> Self {
        Self {
            name: name.into(),
            duration,
            value,
        }
    }
}

#[async_trait]
impl Op<i64> for SleepOp {
    async fn perform(&self, _dry: &DryContext, _wet: &WetContext) -> Result<i64, OpError> {
        tokio::time::sleep(self.duration).await;
        Ok(self.value)
    }

    fn metadata(&self) -> OpMetadata {
        OpMetadata::new(self.name.clone())
    }
}
