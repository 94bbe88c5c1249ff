//! Reserved, framework-internal [`crate::dry_context::DryContext`] keys.
//!
//! User code must write these only through [`crate::helpers`]'s control-flow
//! functions (`abort`, `continue_loop`, `break_loop`) — never directly.

/// Key under which [`crate::loop_op::LoopOp::perform`] records the
/// currently-running loop's id, so that [`crate::helpers::continue_loop`]
/// and [`crate::helpers::break_loop`] know which loop's flags to set
/// without the caller naming a loop explicitly.
pub const CURRENT_LOOP_ID: &str = "__current_loop_id";

/// The per-loop "skip to next iteration" flag key.
pub fn continue_var(loop_id: &str) -> String {
    format!("__continue_loop_{loop_id}")
}

/// The per-loop "stop the loop now" flag key.
pub fn break_var(loop_id: &str) -> String {
    format!("__break_loop_{loop_id}")
}
