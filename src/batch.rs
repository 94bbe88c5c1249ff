//! [`BatchOp`] — a sequenced composite with LIFO rollback on failure.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::warn;

use crate::batch_metadata::BatchMetadataBuilder;
use crate::dry_context::DryContext;
use crate::error::OpError;
use crate::metadata::OpMetadata;
use crate::op::{AnyOp, Op};
use crate::wet_context::WetContext;

/// Lock `m`, recovering the inner value on poison rather than panicking —
/// the same convention [`crate::dry_context::DryContext`] and
/// [`crate::wet_context::WetContext`] use for their internal mutexes.
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// Roll back `ops` in reverse order, best-effort: an individual rollback
/// failure is logged and swallowed, never aborting the overall rollback
/// sweep (§7: "Rollback failures are swallowed").
pub(crate) async fn rollback_lifo<T>(ops: &[AnyOp<T>], dry: &DryContext, wet: &WetContext) {
    for op in ops.iter().rev() {
        if let Err(err) = op.rollback(dry, wet).await {
            warn!(op = %op.metadata().name, error = %err, "rollback failed, continuing best-effort");
        }
    }
}

/// An ordered sequence of [`AnyOp`] executed in declaration order.
///
/// On a non-abort failure with `continue_on_error = false`, everything
/// that succeeded so far is rolled back LIFO and the batch fails with
/// [`OpError::BatchFailed`]. With `continue_on_error = true`, a failing op
/// is recorded and skipped (no rollback for it) and the batch continues.
/// An abort (pre-existing or raised mid-flight) always rolls back
/// everything succeeded so far and propagates [`OpError::Aborted`],
/// regardless of `continue_on_error`.
pub struct BatchOp<T> {
    ops: Mutex<Vec<AnyOp<T>>>,
    continue_on_error: bool,
    last_succeeded: Mutex<Vec<AnyOp<T>>>,
}

impl<T> BatchOp<T> {
    /// Create a batch over `ops`, run in order.
    pub fn new(ops: Vec<AnyOp<T>>, continue_on_error: bool) -> Self {
        Self {
            ops: Mutex::new(ops),
            continue_on_error,
            last_succeeded: Mutex::new(Vec::new()),
        }
    }

    /// Append an op to the batch. Safe to call concurrently; `perform`
    /// snapshots the list at entry, so an `add_op` racing a `perform` may
    /// or may not be included in that run, but never corrupts it.
    pub fn add_op(&self, op: AnyOp<T>) {
        lock(&self.ops).push(op);
    }

    /// Number of ops currently in the batch.
    pub fn count(&self) -> usize {
        lock(&self.ops).len()
    }

    /// `true` if the batch has no ops.
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    fn snapshot(&self) -> Vec<AnyOp<T>> {
        lock(&self.ops).clone()
    }
}

#[async_trait]
impl<T: Send + Sync + 'static> Op<Vec<T>> for BatchOp<T> {
    async fn perform(&self, dry: &DryContext, wet: &WetContext) -> Result<Vec<T>, OpError> {
        let snapshot = self.snapshot();
        let mut results = Vec::with_capacity(snapshot.len());
        let mut succeeded: Vec<AnyOp<T>> = Vec::new();

        for (index, op) in snapshot.iter().enumerate() {
            if dry.is_aborted() {
                rollback_lifo(&succeeded, dry, wet).await;
                *lock(&self.last_succeeded) = Vec::new();
                return Err(OpError::Aborted(
                    dry.abort_reason().unwrap_or_else(|| "Operation aborted".to_owned()),
                ));
            }

            match op.perform(dry, wet).await {
                Ok(v) => {
                    results.push(v);
                    succeeded.push(op.clone());
                }
                Err(OpError::Aborted(reason)) => {
                    rollback_lifo(&succeeded, dry, wet).await;
                    *lock(&self.last_succeeded) = Vec::new();
                    return Err(OpError::Aborted(reason));
                }
                Err(other) => {
                    if self.continue_on_error {
                        warn!(
                            index,
                            op = %op.metadata().name,
                            error = %other,
                            "batch op failed, continuing (continue_on_error)"
                        );
                        continue;
                    }
                    rollback_lifo(&succeeded, dry, wet).await;
                    *lock(&self.last_succeeded) = Vec::new();
                    let name = op.metadata().name;
                    return Err(OpError::BatchFailed(format!(
                        "Op {index}-{name} failed: {other}"
                    )));
                }
            }
        }

        *lock(&self.last_succeeded) = succeeded;
        Ok(results)
    }

    fn metadata(&self) -> OpMetadata {
        BatchMetadataBuilder::new(self.snapshot()).build()
    }

    async fn rollback(&self, dry: &DryContext, wet: &WetContext) -> Result<(), OpError> {
        let succeeded = lock(&self.last_succeeded).clone();
        rollback_lifo(&succeeded, dry, wet).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{TrackLog, TrackOp};

    #[tokio::test]
    async fn all_succeed_preserves_order_invariant_1() {
        let log = TrackLog::new();
        let ops = vec![
            AnyOp::new(TrackOp::new(1, false, log.clone())),
            AnyOp::new(TrackOp::new(2, false, log.clone())),
            AnyOp::new(TrackOp::new(3, false, log.clone())),
        ];
        let batch = BatchOp::new(ops, false);
        let dry = DryContext::new();
        let wet = WetContext::new();
        let results = batch.perform(&dry, &wet).await.unwrap();
        assert_eq!(results, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn failure_rolls_back_prior_ops_lifo_invariant_2_s4() {
        let log = TrackLog::new();
        let ops = vec![
            AnyOp::new(TrackOp::new(1, false, log.clone())),
            AnyOp::new(TrackOp::new(2, false, log.clone())),
            AnyOp::new(TrackOp::new(3, true, log.clone())),
        ];
        let batch = BatchOp::new(ops, false);
        let dry = DryContext::new();
        let wet = WetContext::new();
        let err = batch.perform(&dry, &wet).await.unwrap_err();
        assert!(matches!(err, OpError::BatchFailed(_)));
        assert_eq!(log.performed(), vec![1, 2]);
        assert_eq!(log.rolled_back(), vec![2, 1]);
    }

    #[tokio::test]
    async fn continue_on_error_skips_rollback_invariant_3() {
        let log = TrackLog::new();
        let ops = vec![
            AnyOp::new(TrackOp::new(1, false, log.clone())),
            AnyOp::new(TrackOp::new(2, true, log.clone())),
            AnyOp::new(TrackOp::new(3, false, log.clone())),
        ];
        let batch = BatchOp::new(ops, true);
        let dry = DryContext::new();
        let wet = WetContext::new();
        let results = batch.perform(&dry, &wet).await.unwrap();
        assert_eq!(results, vec![1, 3]);
        assert!(log.rolled_back().is_empty());
    }

    #[tokio::test]
    async fn preexisting_abort_rolls_back_and_fails() {
        let log = TrackLog::new();
        let ops = vec![
            AnyOp::new(TrackOp::new(1, false, log.clone())),
            AnyOp::new(TrackOp::new(2, false, log.clone())),
        ];
        let batch = BatchOp::new(ops, false);
        let dry = DryContext::new();
        dry.set_abort(Some("cancelled".into()));
        let wet = WetContext::new();
        let err = batch.perform(&dry, &wet).await.unwrap_err();
        assert_eq!(err, OpError::Aborted("cancelled".into()));
        assert!(log.performed().is_empty());
    }

    #[tokio::test]
    async fn dynamic_add_op_is_included_if_added_before_perform() {
        let log = TrackLog::new();
        let batch: BatchOp<i64> = BatchOp::new(vec![], false);
        batch.add_op(AnyOp::new(TrackOp::new(1, false, log.clone())));
        batch.add_op(AnyOp::new(TrackOp::new(2, false, log.clone())));
        assert_eq!(batch.count(), 2);
        let dry = DryContext::new();
        let wet = WetContext::new();
        let results = batch.perform(&dry, &wet).await.unwrap();
        assert_eq!(results, vec![1, 2]);
    }

    #[tokio::test]
    async fn rollback_undoes_whole_batch_when_nested() {
        let log = TrackLog::new();
        let ops = vec![
            AnyOp::new(TrackOp::new(1, false, log.clone())),
            AnyOp::new(TrackOp::new(2, false, log.clone())),
        ];
        let batch = BatchOp::new(ops, false);
        let dry = DryContext::new();
        let wet = WetContext::new();
        batch.perform(&dry, &wet).await.unwrap();
        batch.rollback(&dry, &wet).await.unwrap();
        assert_eq!(log.rolled_back(), vec![2, 1]);
    }
}
