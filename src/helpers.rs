//! Ergonomic façades over [`DryContext`]/[`WetContext`] and the
//! cooperative control-flow helpers (`abort`, `continue_loop`, `break_loop`,
//! `check_abort`).

use std::panic::Location;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::dry_context::DryContext;
use crate::error::OpError;
use crate::keys::{self, CURRENT_LOOP_ID};
use crate::op::{AnyOp, Op};
use crate::wet_context::WetContext;
use crate::wrappers::logging::LoggingWrapper;

/// Store `v` under `k` in `dry`. Thin wrapper over [`DryContext::insert`]
/// for call-site symmetry with [`dry_get`]/[`dry_require`].
pub fn dry_put<T: Serialize>(dry: &DryContext, v: &T, k: &str) {
    dry.insert(v, k.to_owned());
}

/// Read `k` from `dry`, if present and well-typed.
pub fn dry_get<T: DeserializeOwned>(dry: &DryContext, k: &str) -> Option<T> {
    dry.get(k)
}

/// Read `k` from `dry`, failing loudly if absent or mistyped.
pub fn dry_require<T: DeserializeOwned>(dry: &DryContext, k: &str) -> Result<T, OpError> {
    dry.get_required(k)
}

/// Store an op's result under both its own name and the well-known
/// `"result"` key, so downstream ops can refer to either.
pub fn dry_result<T: Serialize>(v: &T, op_name: &str, dry: &DryContext) {
    dry.insert(v, op_name.to_owned());
    dry.insert(v, "result".to_owned());
}

/// Store a live reference `v` under `k` in `wet`.
pub fn wet_put_ref<T: Send + Sync + 'static>(wet: &WetContext, v: T, k: &str) {
    wet.put(v, k.to_owned());
}

/// Read a required reference of type `T` from `wet`.
pub fn wet_require_ref<T: Send + Sync + 'static>(
    wet: &WetContext,
    k: &str,
) -> Result<std::sync::Arc<T>, OpError> {
    wet.get_required(k)
}

/// Set the abort flag on `dry` and return the corresponding
/// [`OpError::Aborted`] — callers should `return Err(abort(dry, reason))`
/// (or use `?` after wrapping in `Err`) to both set the flag and fail this
/// op in one step.
pub fn abort(dry: &DryContext, reason: Option<String>) -> OpError {
    let reason = reason.unwrap_or_else(|| "Operation aborted".to_owned());
    dry.set_abort(Some(reason.clone()));
    OpError::Aborted(reason)
}

/// If `dry`'s abort flag is set, fail with [`OpError::Aborted`] carrying
/// the recorded reason.
pub fn check_abort(dry: &DryContext) -> Result<(), OpError> {
    if dry.is_aborted() {
        Err(OpError::Aborted(
            dry.abort_reason().unwrap_or_else(|| "Operation aborted".to_owned()),
        ))
    } else {
        Ok(())
    }
}

/// Set the currently-running loop's continue flag and return
/// [`OpError::LoopContinue`] — equivalent in effect to an op returning
/// this error directly without touching the flag (both paths are honored
/// identically by [`crate::loop_op::LoopOp`]).
pub fn continue_loop(dry: &DryContext) -> OpError {
    if let Some(loop_id) = dry.get::<String>(CURRENT_LOOP_ID) {
        dry.insert(&true, keys::continue_var(&loop_id));
    }
    OpError::LoopContinue
}

/// Set the currently-running loop's break flag and return
/// [`OpError::LoopBreak`] — equivalent in effect to an op returning this
/// error directly without touching the flag.
pub fn break_loop(dry: &DryContext) -> OpError {
    if let Some(loop_id) = dry.get::<String>(CURRENT_LOOP_ID) {
        dry.insert(&true, keys::break_var(&loop_id));
    }
    OpError::LoopBreak
}

/// Format a caller location as `"{filenameWithoutExt}::{line}"`, the
/// stable caller-name format used by [`crate::wrappers::logging`].
///
/// Grounded in `examples/BrandonLeeDotDev-handle-this`'s `#[track_caller]`
/// + `std::panic::Location::caller()` pattern for stamping a call site
/// without a proc-macro.
pub fn caller_name(loc: &Location<'_>) -> String {
    let file = loc.file();
    let stem = std::path::Path::new(file)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file);
    format!("{stem}::{}", loc.line())
}

/// Execute `op` wrapped in a [`LoggingWrapper`] named after the call site
/// of `perform` itself — the one-line façade most call sites use instead
/// of constructing a `LoggingWrapper` by hand.
///
/// `#[track_caller]` does not thread the caller's location through `async
/// fn`'s desugaring, so this must be a plain `fn` that resolves
/// `Location::caller()` synchronously, before the returned future is ever
/// polled, and captures it into the `async move` block.
#[track_caller]
pub fn perform<'a, T: Send + Sync + 'static>(
    op: AnyOp<T>,
    dry: &'a DryContext,
    wet: &'a WetContext,
) -> impl std::future::Future<Output = Result<T, OpError>> + 'a {
    let name = caller_name(Location::caller());
    async move {
        let wrapped = AnyOp::new(LoggingWrapper::named(name, op));
        wrapped.perform(dry, wet).await
    }
}

/// A facade so a bare `&dyn Op<T>` (not yet wrapped in [`AnyOp`]) can use
/// [`perform`] without an extra `AnyOp::new` at the call site.
///
/// Same non-`async fn` shape as [`perform`] and for the same reason: the
/// tail call below is a plain (non-async) call to a `#[track_caller]`
/// function, so the location propagates to `perform`'s own
/// `Location::caller()` instead of pointing at this line.
#[track_caller]
pub fn perform_op<'a, T, O>(
    op: O,
    dry: &'a DryContext,
    wet: &'a WetContext,
) -> impl std::future::Future<Output = Result<T, OpError>> + 'a
where
    T: Send + Sync + 'static,
    O: Op<T> + 'static,
{
    perform(AnyOp::new(op), dry, wet)
}
