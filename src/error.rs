//! The unified failure taxonomy for the operation kernel.
//!
//! [`OpError`] is the single error type threaded through [`crate::op::Op`],
//! [`crate::batch::BatchOp`] and [`crate::loop_op::LoopOp`]. Two variants —
//! [`OpError::LoopContinue`] and [`OpError::LoopBreak`] — are internal
//! control-flow signals, not user-facing failures: they must be caught by
//! [`crate::loop_op::LoopOp`] and never allowed to escape to a caller.

use std::fmt;

use thiserror::Error;

/// The unified error (and internal control-signal) type for the kernel.
///
/// Display strings are part of the crate's stable external interface —
/// tests assert on them verbatim, so do not reword an existing variant's
/// `#[error(...)]` format string.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum OpError {
    /// An op's `perform` failed outright.
    #[error("Op execution failed: {0}")]
    ExecutionFailed(String),

    /// A [`crate::wrappers::timeout::TimeBoundWrapper`] deadline elapsed.
    #[error("Op timeout after {0}ms")]
    Timeout(u64),

    /// A [`crate::dry_context::DryContext`]/[`crate::wet_context::WetContext`]
    /// lookup or validation failure.
    #[error("Context error: {0}")]
    Context(String),

    /// A [`crate::batch::BatchOp`] failed (and was not configured to
    /// continue on error).
    #[error("Batch op failed: {0}")]
    BatchFailed(String),

    /// The context's abort flag was set; propagated end-to-end with the
    /// abort reason.
    #[error("Op aborted: {0}")]
    Aborted(String),

    /// Raised by [`crate::helpers`] trigger-style helpers.
    #[error("Trigger error: {0}")]
    Trigger(String),

    /// Catch-all for wrapped foreign errors.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),

    /// Internal: skip the remaining ops of the current loop iteration.
    ///
    /// Never surface this to a caller outside [`crate::loop_op::LoopOp`].
    #[error("Loop continue")]
    LoopContinue,

    /// Internal: stop the loop immediately and return accumulated results.
    ///
    /// Never surface this to a caller outside [`crate::loop_op::LoopOp`].
    #[error("Loop break")]
    LoopBreak,
}

impl OpError {
    /// `true` for the two internal control-flow variants.
    pub fn is_control_signal(&self) -> bool {
        matches!(self, OpError::LoopContinue | OpError::LoopBreak)
    }

    /// `true` for [`OpError::Aborted`].
    pub fn is_aborted(&self) -> bool {
        matches!(self, OpError::Aborted(_))
    }
}

/// Structural equality: two errors are equal when they are the same variant
/// with the same displayed message. [`OpError::Other`] compares by its
/// rendered description, since the wrapped `Box<dyn Error>` itself is not
/// comparable.
impl PartialEq for OpError {
    fn eq(&self, other: &Self) -> bool {
        use OpError::*;
        match (self, other) {
            (ExecutionFailed(a), ExecutionFailed(b)) => a == b,
            (Timeout(a), Timeout(b)) => a == b,
            (Context(a), Context(b)) => a == b,
            (BatchFailed(a), BatchFailed(b)) => a == b,
            (Aborted(a), Aborted(b)) => a == b,
            (Trigger(a), Trigger(b)) => a == b,
            (Other(a), Other(b)) => a.to_string() == b.to_string(),
            (LoopContinue, LoopContinue) => true,
            (LoopBreak, LoopBreak) => true,
            _ => false,
        }
    }
}

/// Rewrites an error's message to embed the name of the op that caught and
/// is re-raising it, preserving the variant. Control-signal variants pass
/// through unchanged — they carry no message and must never be mistaken
/// for a named failure.
pub fn wrap_nested_op_exception(op_name: &str, err: OpError) -> OpError {
    use OpError::*;
    match err {
        ExecutionFailed(msg) => ExecutionFailed(format!("{op_name}: {msg}")),
        Timeout(ms) => ExecutionFailed(format!("{op_name}: Op timeout after {ms}ms")),
        Context(msg) => Context(format!("{op_name}: {msg}")),
        BatchFailed(msg) => BatchFailed(format!("{op_name}: {msg}")),
        Aborted(reason) => Aborted(reason),
        Trigger(msg) => Trigger(format!("{op_name}: {msg}")),
        Other(e) => ExecutionFailed(format!("{op_name}: {e}")),
        LoopContinue => LoopContinue,
        LoopBreak => LoopBreak,
    }
}

/// Wraps an arbitrary runtime failure (e.g. a caught panic payload
/// rendered to a string) as `OpError::ExecutionFailed("Runtime error: ...")`.
pub fn wrap_runtime_exception(desc: impl fmt::Display) -> OpError {
    OpError::ExecutionFailed(format!("Runtime error: {desc}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_strings_are_stable() {
        assert_eq!(
            OpError::ExecutionFailed("boom".into()).to_string(),
            "Op execution failed: boom"
        );
        assert_eq!(OpError::Timeout(50).to_string(), "Op timeout after 50ms");
        assert_eq!(
            OpError::Context("bad".into()).to_string(),
            "Context error: bad"
        );
        assert_eq!(
            OpError::BatchFailed("nope".into()).to_string(),
            "Batch op failed: nope"
        );
        assert_eq!(
            OpError::Aborted("user cancelled".into()).to_string(),
            "Op aborted: user cancelled"
        );
        assert_eq!(
            OpError::Trigger("fired".into()).to_string(),
            "Trigger error: fired"
        );
        assert_eq!(OpError::LoopContinue.to_string(), "Loop continue");
        assert_eq!(OpError::LoopBreak.to_string(), "Loop break");
    }

    #[test]
    fn wrap_nested_embeds_op_name() {
        let wrapped = wrap_nested_op_exception("MyOp", OpError::ExecutionFailed("boom".into()));
        assert_eq!(wrapped.to_string(), "Op execution failed: MyOp: boom");
    }

    #[test]
    fn wrap_nested_preserves_control_signals() {
        assert_eq!(
            wrap_nested_op_exception("MyOp", OpError::LoopContinue),
            OpError::LoopContinue
        );
        assert_eq!(
            wrap_nested_op_exception("MyOp", OpError::LoopBreak),
            OpError::LoopBreak
        );
    }

    #[test]
    fn wrap_runtime_prefixes_description() {
        let err = wrap_runtime_exception("index out of bounds");
        assert_eq!(
            err.to_string(),
            "Op execution failed: Runtime error: index out of bounds"
        );
    }

    #[test]
    fn structural_equality() {
        assert_eq!(
            OpError::Context("k".into()),
            OpError::Context("k".into())
        );
        assert_ne!(OpError::Context("k".into()), OpError::Context("j".into()));
        assert_ne!(OpError::Context("k".into()), OpError::Trigger("k".into()));
    }
}
