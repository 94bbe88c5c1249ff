//! [`WetContext`] — the live, non-serializable reference substrate.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::OpError;

/// A thread-safe keyed store of opaque typed references (services,
/// connections, handles).
///
/// Unlike [`crate::dry_context::DryContext`], values are never serialized
/// and never copied by the framework — they are shared via `Arc` and
/// retrieved by expected type.
pub struct WetContext {
    values: Mutex<HashMap<String, Arc<dyn Any + Send + Sync>>>,
}

impl WetContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self {
            values: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<dyn Any + Send + Sync>>> {
        self.values.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Store a reference under `k`, overwriting any prior value.
    pub fn put<T: Send + Sync + 'static>(&self, v: T, k: impl Into<String>) {
        self.lock().insert(k.into(), Arc::new(v));
    }

    /// Retrieve a reference of type `T` stored at `k`. Returns `None` if
    /// the key is absent or the stored value is not a `T`.
    pub fn get<T: Send + Sync + 'static>(&self, k: &str) -> Option<Arc<T>> {
        let entry = self.lock().get(k).cloned()?;
        entry.downcast::<T>().ok()
    }

    /// Like [`WetContext::get`] but fails loudly, distinguishing a missing
    /// key from a present value of the wrong type.
    pub fn get_required<T: Send + Sync + 'static>(&self, k: &str) -> Result<Arc<T>, OpError> {
        let entry = self.lock().get(k).cloned().ok_or_else(|| {
            OpError::Context(format!("Required reference key '{k}' not found in WetContext"))
        })?;
        entry.downcast::<T>().map_err(|_| {
            OpError::Context(format!(
                "Type mismatch for wet context key '{k}': expected '{}'",
                std::any::type_name::<T>()
            ))
        })
    }

    /// `true` if a reference is present for `k`.
    pub fn contains(&self, k: &str) -> bool {
        self.lock().contains_key(k)
    }

    /// Snapshot of all keys currently present.
    pub fn keys(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    /// Overwrite `self` with every key from `other`.
    pub fn merge(&self, other: &WetContext) {
        let other_snapshot = other.lock();
        let mut mine = self.lock();
        for (k, v) in other_snapshot.iter() {
            mine.insert(k.clone(), v.clone());
        }
    }
}

impl Default for WetContext {
    fn default() -> Self {
        Self::new()
    }
}
