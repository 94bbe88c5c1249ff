//! The [`Op`] contract and its type-erased handle [`AnyOp`].

use std::sync::Arc;

use async_trait::async_trait;

use crate::dry_context::DryContext;
use crate::error::OpError;
use crate::metadata::OpMetadata;
use crate::wet_context::WetContext;

/// A polymorphic unit of asynchronous work against a pair of contexts.
///
/// `rollback` defaults to a successful no-op — only ops with a genuine
/// compensating action need to override it. Implementations must be
/// safely shareable across threads (`Send + Sync`), since composite
/// operators hold them behind `Arc`.
#[async_trait]
pub trait Op<T>: Send + Sync {
    /// Execute the op's work, failing with [`OpError`] on error.
    async fn perform(&self, dry: &DryContext, wet: &WetContext) -> Result<T, OpError>;

    /// Descriptive metadata for this op.
    fn metadata(&self) -> OpMetadata;

    /// Undo whatever this op did, best-effort. The default is a no-op.
    async fn rollback(&self, _dry: &DryContext, _wet: &WetContext) -> Result<(), OpError> {
        Ok(())
    }
}

/// A type-erased handle over `dyn Op<T>`, fixed to a single output type
/// `T`. Enables heterogeneous concrete op implementations to share a
/// single container ([`crate::batch::BatchOp`], [`crate::loop_op::LoopOp`])
/// parameterized only by output type, not by concrete op type.
///
/// Cheaply `Clone`: internally an `Arc<dyn Op<T>>`, so sharing an `AnyOp`
/// across composites never duplicates the underlying op.
pub struct AnyOp<T> {
    inner: Arc<dyn Op<T>>,
}

impl<T> AnyOp<T> {
    /// Wrap a concrete op into a type-erased handle.
    pub fn new<O: Op<T> + 'static>(op: O) -> Self {
        Self {
            inner: Arc::new(op),
        }
    }

    /// Wrap an already-shared op without re-allocating.
    pub fn from_arc(op: Arc<dyn Op<T>>) -> Self {
        Self { inner: op }
    }

    /// Execute the wrapped op.
    pub async fn perform(&self, dry: &DryContext, wet: &WetContext) -> Result<T, OpError> {
        self.inner.perform(dry, wet).await
    }

    /// Metadata of the wrapped op.
    pub fn metadata(&self) -> OpMetadata {
        self.inner.metadata()
    }

    /// Roll back the wrapped op.
    pub async fn rollback(&self, dry: &DryContext, wet: &WetContext) -> Result<(), OpError> {
        self.inner.rollback(dry, wet).await
    }
}

impl<T> Clone for AnyOp<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}
