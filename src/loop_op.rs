//! [`LoopOp`] — a counter-driven repeated batch with per-iteration
//! rollback and in-band `continue`/`break` control signals.

use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::batch::{lock, rollback_lifo};
use crate::dry_context::DryContext;
use crate::error::OpError;
use crate::keys::{self, CURRENT_LOOP_ID};
use crate::metadata::OpMetadata;
use crate::op::{AnyOp, Op};
use crate::wet_context::WetContext;

/// Counter-driven iteration of a fixed sequence of ops, run up to `limit`
/// times, concatenating each iteration's per-op results.
///
/// Every instance gets a fresh, unique `loop_id` (a UUIDv4) at
/// construction, from which the private `continue_var`/`break_var`
/// [`DryContext`] keys are derived — see [`crate::keys`].
pub struct LoopOp<T> {
    counter_var: String,
    limit: i64,
    ops: Vec<AnyOp<T>>,
    continue_on_error: bool,
    loop_id: String,
    continue_var: String,
    break_var: String,
    last_succeeded: Mutex<Vec<AnyOp<T>>>,
}

impl<T> LoopOp<T> {
    /// Create a loop over `ops`, bounded by `limit` iterations and
    /// tracked via `counter_var` in the [`DryContext`].
    pub fn new(counter_var: impl Into<String>, limit: i64, ops: Vec<AnyOp<T>>, continue_on_error: bool) -> Self {
        let loop_id = Uuid::new_v4().to_string();
        let continue_var = keys::continue_var(&loop_id);
        let break_var = keys::break_var(&loop_id);
        Self {
            counter_var: counter_var.into(),
            limit,
            ops,
            continue_on_error,
            loop_id,
            continue_var,
            break_var,
            last_succeeded: Mutex::new(Vec::new()),
        }
    }

    /// This instance's unique loop id.
    pub fn loop_id(&self) -> &str {
        &self.loop_id
    }
}

#[async_trait]
impl<T: Send + Sync + 'static> Op<Vec<T>> for LoopOp<T> {
    async fn perform(&self, dry: &DryContext, wet: &WetContext) -> Result<Vec<T>, OpError> {
        let mut counter = dry.get_or_insert::<i64>(&self.counter_var, || 0);
        dry.insert(&self.loop_id, CURRENT_LOOP_ID);

        let mut results: Vec<T> = Vec::new();
        let mut all_succeeded: Vec<AnyOp<T>> = Vec::new();

        while counter < self.limit {
            if dry.is_aborted() {
                *lock(&self.last_succeeded) = Vec::new();
                return Err(OpError::Aborted(
                    dry.abort_reason().unwrap_or_else(|| "Operation aborted".to_owned()),
                ));
            }

            dry.insert(&false, self.continue_var.clone());
            dry.insert(&false, self.break_var.clone());

            let mut iteration_succeeded: Vec<AnyOp<T>> = Vec::new();
            let mut whole_loop_break = false;

            for op in &self.ops {
                if dry.is_aborted() {
                    rollback_lifo(&iteration_succeeded, dry, wet).await;
                    *lock(&self.last_succeeded) = Vec::new();
                    return Err(OpError::Aborted(
                        dry.abort_reason().unwrap_or_else(|| "Operation aborted".to_owned()),
                    ));
                }

                match op.perform(dry, wet).await {
                    Ok(v) => {
                        results.push(v);
                        iteration_succeeded.push(op.clone());
                        all_succeeded.push(op.clone());

                        if dry.get::<bool>(&self.continue_var) == Some(true) {
                            dry.insert(&false, self.continue_var.clone());
                            break;
                        }
                        if dry.get::<bool>(&self.break_var) == Some(true) {
                            whole_loop_break = true;
                            break;
                        }
                    }
                    Err(OpError::Aborted(reason)) => {
                        rollback_lifo(&iteration_succeeded, dry, wet).await;
                        *lock(&self.last_succeeded) = Vec::new();
                        return Err(OpError::Aborted(reason));
                    }
                    Err(OpError::LoopContinue) => {
                        break;
                    }
                    Err(OpError::LoopBreak) => {
                        whole_loop_break = true;
                        break;
                    }
                    Err(other) => {
                        rollback_lifo(&iteration_succeeded, dry, wet).await;
                        if self.continue_on_error {
                            break;
                        }
                        *lock(&self.last_succeeded) = Vec::new();
                        return Err(other);
                    }
                }
            }

            if whole_loop_break {
                *lock(&self.last_succeeded) = all_succeeded;
                return Ok(results);
            }

            counter += 1;
            dry.insert(&counter, self.counter_var.clone());
        }

        *lock(&self.last_succeeded) = all_succeeded;
        Ok(results)
    }

    fn metadata(&self) -> OpMetadata {
        OpMetadata::new("LoopOp").with_description(format!(
            "Loop of {} op(s) over up to {} iteration(s)",
            self.ops.len(),
            self.limit
        ))
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
    use crate::test_support::{CounterOp, TrackLog, TrackOp};

    struct TestOp(i64);

    #[async_trait]
    impl Op<i64> for TestOp {
        async fn perform(&self, _dry: &DryContext, _wet: &WetContext) -> Result<i64, OpError> {
            Ok(self.0)
        }

        fn metadata(&self) -> OpMetadata {
            OpMetadata::new(format!("TestOp({})", self.0))
        }
    }

    #[tokio::test]
    async fn s1_two_ops_three_iterations() {
        let ops = vec![AnyOp::new(TestOp(10)), AnyOp::new(TestOp(20))];
        let op: LoopOp<i64> = LoopOp::new("c", 3, ops, false);
        let dry = DryContext::new();
        let wet = WetContext::new();
        let results = op.perform(&dry, &wet).await.unwrap();
        assert_eq!(results, vec![10, 20, 10, 20, 10, 20]);
        assert_eq!(dry.get::<i64>("c"), Some(3));
    }

    #[tokio::test]
    async fn s2_counter_op_observes_each_iteration_value() {
        let ops = vec![AnyOp::new(CounterOp::new("Counter", "c"))];
        let op: LoopOp<i64> = LoopOp::new("c", 3, ops, false);
        let dry = DryContext::new();
        let wet = WetContext::new();
        let results = op.perform(&dry, &wet).await.unwrap();
        assert_eq!(results, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn s3_failure_in_iteration_two_rolls_back_that_iteration_only() {
        let log = TrackLog::new();
        let ops = vec![
            AnyOp::new(TrackOp::new(1, false, log.clone())),
            AnyOp::new(TrackOp::new(2, false, log.clone())),
            AnyOp::new(TrackOp::new(3, false, log.clone())),
            AnyOp::new(crate::test_support::FailingOp::new("boom")),
        ];
        let op: LoopOp<i64> = LoopOp::new("c", 2, ops, false);
        let dry = DryContext::new();
        let wet = WetContext::new();
        let err = op.perform(&dry, &wet).await.unwrap_err();
        assert!(matches!(err, OpError::ExecutionFailed(_)));
        assert_eq!(log.performed(), vec![1, 2, 3]);
        assert_eq!(log.rolled_back(), vec![3, 2, 1]);
    }

    #[tokio::test]
    async fn invariant_5_prior_iterations_not_rolled_back() {
        let log = TrackLog::new();
        let ops = vec![
            AnyOp::new(TrackOp::new(1, false, log.clone())),
            AnyOp::new(crate::test_support::FailingOp::new("boom")),
        ];
        let op: LoopOp<i64> = LoopOp::new("c", 3, ops, false);
        let dry = DryContext::new();
        let wet = WetContext::new();
        let _ = op.perform(&dry, &wet).await.unwrap_err();
        assert_eq!(log.rolled_back(), vec![1]);
    }

    struct BreakingOp(i64);

    #[async_trait]
    impl Op<i64> for BreakingOp {
        async fn perform(&self, dry: &DryContext, _wet: &WetContext) -> Result<i64, OpError> {
            if dry.get::<i64>("c") == Some(1) {
                return Err(crate::helpers::break_loop(dry));
            }
            Ok(self.0)
        }

        fn metadata(&self) -> OpMetadata {
            OpMetadata::new("BreakingOp")
        }
    }

    #[tokio::test]
    async fn invariant_6_thrown_break_terminates_loop_immediately() {
        let ops = vec![AnyOp::new(BreakingOp(7))];
        let op: LoopOp<i64> = LoopOp::new("c", 5, ops, false);
        let dry = DryContext::new();
        let wet = WetContext::new();
        let results = op.perform(&dry, &wet).await.unwrap();
        assert_eq!(results, vec![7]);
    }

    struct FlagBreakOp;

    #[async_trait]
    impl Op<i64> for FlagBreakOp {
        async fn perform(&self, dry: &DryContext, _wet: &WetContext) -> Result<i64, OpError> {
            if dry.get::<i64>("c") == Some(1) {
                dry.insert(&true, keys::break_var(dry.get::<String>(CURRENT_LOOP_ID).unwrap().as_str()));
            }
            Ok(99)
        }

        fn metadata(&self) -> OpMetadata {
            OpMetadata::new("FlagBreakOp")
        }
    }

    #[tokio::test]
    async fn invariant_7_flag_break_equivalent_to_thrown_break() {
        let ops = vec![AnyOp::new(FlagBreakOp)];
        let op: LoopOp<i64> = LoopOp::new("c", 5, ops, false);
        let dry = DryContext::new();
        let wet = WetContext::new();
        let results = op.perform(&dry, &wet).await.unwrap();
        assert_eq!(results, vec![99, 99]);
    }

    struct FlagContinueOp(i64);

    #[async_trait]
    impl Op<i64> for FlagContinueOp {
        async fn perform(&self, dry: &DryContext, _wet: &WetContext) -> Result<i64, OpError> {
            if self.0 == 1 && dry.get::<i64>("c") == Some(0) {
                dry.insert(&true, keys::continue_var(dry.get::<String>(CURRENT_LOOP_ID).unwrap().as_str()));
            }
            Ok(self.0)
        }

        fn metadata(&self) -> OpMetadata {
            OpMetadata::new(format!("FlagContinueOp({})", self.0))
        }
    }

    #[tokio::test]
    async fn invariant_8_flag_continue_skips_remaining_ops_and_advances_counter() {
        let ops = vec![AnyOp::new(FlagContinueOp(1)), AnyOp::new(FlagContinueOp(2))];
        let op: LoopOp<i64> = LoopOp::new("c", 2, ops, false);
        let dry = DryContext::new();
        let wet = WetContext::new();
        let results = op.perform(&dry, &wet).await.unwrap();
        assert_eq!(results, vec![1, 1, 2]);
        assert_eq!(dry.get::<i64>("c"), Some(2));
    }

    #[tokio::test]
    async fn zero_limit_runs_nothing() {
        let ops = vec![AnyOp::new(TestOp(1))];
        let op: LoopOp<i64> = LoopOp::new("c", 0, ops, false);
        let dry = DryContext::new();
        let wet = WetContext::new();
        let results = op.perform(&dry, &wet).await.unwrap();
        assert!(results.is_empty());
        assert_eq!(dry.get::<i64>("c"), Some(0));
    }

    #[tokio::test]
    async fn starting_counter_at_or_above_limit_returns_immediately() {
        let ops = vec![AnyOp::new(TestOp(1))];
        let op: LoopOp<i64> = LoopOp::new("c", 2, ops, false);
        let dry = DryContext::new();
        dry.insert(&5i64, "c");
        let wet = WetContext::new();
        let results = op.perform(&dry, &wet).await.unwrap();
        assert!(results.is_empty());
        assert_eq!(dry.get::<i64>("c"), Some(5));
    }

    #[tokio::test]
    async fn no_ops_but_limit_positive_still_advances_counter_l2() {
        let op: LoopOp<i64> = LoopOp::new("c", 3, vec![], false);
        let dry = DryContext::new();
        let wet = WetContext::new();
        let results = op.perform(&dry, &wet).await.unwrap();
        assert!(results.is_empty());
        assert_eq!(dry.get::<i64>("c"), Some(3));
    }

    #[tokio::test]
    async fn continue_on_error_rolls_back_iteration_then_advances() {
        let log = TrackLog::new();
        let ops = vec![
            AnyOp::new(TrackOp::new(1, false, log.clone())),
            AnyOp::new(crate::test_support::FailingOp::new("boom")),
        ];
        let op: LoopOp<i64> = LoopOp::new("c", 2, ops, true);
        let dry = DryContext::new();
        let wet = WetContext::new();
        let results = op.perform(&dry, &wet).await.unwrap();
        assert_eq!(results, vec![1, 1]);
        assert_eq!(log.rolled_back(), vec![1, 1]);
        assert_eq!(dry.get::<i64>("c"), Some(2));
    }

    #[tokio::test]
    async fn preexisting_abort_fails_before_any_op_runs() {
        let ops = vec![AnyOp::new(TestOp(1))];
        let op: LoopOp<i64> = LoopOp::new("c", 3, ops, false);
        let dry = DryContext::new();
        dry.set_abort(Some("stop".into()));
        let wet = WetContext::new();
        let err = op.perform(&dry, &wet).await.unwrap_err();
        assert_eq!(err, OpError::Aborted("stop".into()));
    }

    #[tokio::test]
    async fn rollback_undoes_every_succeeded_op_across_iterations() {
        let log = TrackLog::new();
        let ops = vec![AnyOp::new(TrackOp::new(1, false, log.clone()))];
        let op: LoopOp<i64> = LoopOp::new("c", 2, ops, false);
        let dry = DryContext::new();
        let wet = WetContext::new();
        op.perform(&dry, &wet).await.unwrap();
        op.rollback(&dry, &wet).await.unwrap();
        assert_eq!(log.rolled_back(), vec![1, 1]);
    }
}
