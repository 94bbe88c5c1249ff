//! # ops-core — a composable asynchronous operation kernel
//!
//! `ops-core` describes units of asynchronous work ([`Op`]) that run
//! against a pair of contexts — [`DryContext`] for serializable data,
//! [`WetContext`] for live runtime references — and compose into
//! sequenced ([`BatchOp`]) or counter-driven ([`LoopOp`]) pipelines with
//! automatic LIFO rollback on failure.
//!
//! ## The Kernel
//!
//! | Piece | Type | What it does |
//! |-------|------|-------------|
//! | Contract | [`Op`], [`AnyOp`] | Polymorphic async unit with optional rollback |
//! | Data | [`DryContext`] | Thread-safe JSON-value store + abort flags |
//! | References | [`WetContext`] | Thread-safe opaque typed-reference store |
//! | Sequencing | [`BatchOp`] | Ordered execution, LIFO rollback on failure |
//! | Iteration | [`LoopOp`] | Counter-bounded repetition with continue/break |
//! | Introspection | [`OpMetadata`], [`BatchMetadataBuilder`] | Schemas + data-flow analysis |
//!
//! ## Decorator Wrappers
//!
//! [`wrappers::LoggingWrapper`], [`wrappers::TimeBoundWrapper`] and
//! [`wrappers::ValidatingWrapper`] each add one orthogonal concern around
//! an existing [`AnyOp`] without changing its output type.
//!
//! ## Design Principle
//!
//! Every composite propagates errors and abort/continue/break control
//! signals the same way regardless of what a leaf op actually does —
//! [`OpError`] is the single vocabulary composites and leaves share.
//!
//! ## Dependency Notes
//!
//! Schemas ([`metadata::Schema`]) are represented as `serde_json::Value`
//! trees rather than a generic `T: Serialize` parameter, since the kernel
//! must interpret a schema's `required`/`properties` fields at runtime
//! without knowing its shape ahead of time.

#![deny(missing_docs)]

pub mod batch;
pub mod batch_metadata;
pub mod dry_context;
pub mod error;
pub mod helpers;
pub mod keys;
pub mod loop_op;
pub mod metadata;
pub mod op;
pub mod wet_context;
pub mod wrappers;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_support;

pub use batch::BatchOp;
pub use batch_metadata::BatchMetadataBuilder;
pub use dry_context::{ControlFlags, DryContext};
pub use error::{wrap_nested_op_exception, wrap_runtime_exception, OpError};
pub use helpers::{
    abort, break_loop, caller_name, check_abort, continue_loop, dry_get, dry_put, dry_require,
    dry_result, perform, perform_op, wet_put_ref, wet_require_ref,
};
pub use loop_op::LoopOp;
pub use metadata::{properties, required_fields, OpMetadata, Schema};
pub use op::{AnyOp, Op};
pub use wet_context::WetContext;
pub use wrappers::{time_bound_with_logging, LoggingWrapper, TimeBoundWrapper, ValidatingWrapper};
