//! [`DryContext`] — the serializable, process-local data substrate.

use std::any::type_name;
use std::collections::HashMap;
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::OpError;

/// Cooperative control signals carried alongside the data map.
///
/// Once `aborted` is set it stays set until [`DryContext::clear_control_flags`]
/// is called explicitly (invariant I2 of the data model).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControlFlags {
    /// Whether the execution has been cooperatively cancelled.
    pub aborted: bool,
    /// Human-readable reason for the abort, if any.
    pub abort_reason: Option<String>,
}

struct Inner {
    values: HashMap<String, Value>,
    flags: ControlFlags,
}

/// A thread-safe, process-local keyed store of JSON-compatible values plus
/// cooperative abort flags.
///
/// Every value is serialized to a [`serde_json::Value`] tree *eagerly* at
/// `insert` time, so the store always holds a stable, canonical
/// representation — a non-serializable value is a programmer error and
/// must fail loudly right away rather than being discovered later at
/// retrieval time.
pub struct DryContext {
    inner: Mutex<Inner>,
}

impl DryContext {
    /// Create an empty context with no control flags set.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                values: HashMap::new(),
                flags: ControlFlags::default(),
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Serialize `v` and store it under `k`, overwriting any prior value.
    ///
    /// # Panics
    ///
    /// Panics if `v` cannot be serialized to JSON. This is by design: a
    /// non-serializable value reaching `DryContext::insert` is a programmer
    /// error, not a recoverable runtime condition (§7 of the spec).
    pub fn insert<T: Serialize>(&self, v: &T, k: impl Into<String>) {
        let json = serde_json::to_value(v)
            .unwrap_or_else(|e| panic!("DryContext::insert: value is not serializable: {e}"));
        self.lock().values.insert(k.into(), json);
    }

    /// Builder-style [`DryContext::insert`] that consumes and returns
    /// `self` by value for chaining.
    pub fn with<T: Serialize>(self, v: &T, k: impl Into<String>) -> Self {
        self.insert(v, k);
        self
    }

    /// Decode the value stored at `k` into `T`. Returns `None` if the key
    /// is absent *or* the stored value cannot be decoded into `T` — use
    /// [`DryContext::get_required`] to distinguish the two cases.
    pub fn get<T: DeserializeOwned>(&self, k: &str) -> Option<T> {
        let value = self.lock().values.get(k).cloned()?;
        serde_json::from_value(value).ok()
    }

    /// Like [`DryContext::get`] but fails loudly, distinguishing a missing
    /// key from a present value of the wrong shape.
    pub fn get_required<T: DeserializeOwned>(&self, k: &str) -> Result<T, OpError> {
        let value = self
            .lock()
            .values
            .get(k)
            .cloned()
            .ok_or_else(|| OpError::Context(format!("Required dry context key '{k}' not found")))?;
        serde_json::from_value(value.clone()).map_err(|_| {
            OpError::Context(format!(
                "Type mismatch for dry context key '{k}': expected '{}', but found '{}' value: {}",
                type_name::<T>(),
                json_kind(&value),
                value
            ))
        })
    }

    /// `true` if a value is present for `k`.
    pub fn contains(&self, k: &str) -> bool {
        self.lock().values.contains_key(k)
    }

    /// Snapshot of all keys currently present.
    pub fn keys(&self) -> Vec<String> {
        self.lock().values.keys().cloned().collect()
    }

    /// Snapshot of the full `{key -> value}` map, as canonicalized JSON.
    pub fn values(&self) -> HashMap<String, Value> {
        self.lock().values.clone()
    }

    /// Merge `other` into `self`.
    ///
    /// Overlapping keys are overwritten last-writer-wins. The abort flag is
    /// **not** overridden if `self` is already aborted — it is only set
    /// (with `other`'s reason) when `self` was not already aborted.
    pub fn merge(&self, other: &DryContext) {
        let other_snapshot = other.lock();
        let mut mine = self.lock();
        for (k, v) in other_snapshot.values.iter() {
            mine.values.insert(k.clone(), v.clone());
        }
        if !mine.flags.aborted && other_snapshot.flags.aborted {
            mine.flags.aborted = true;
            mine.flags.abort_reason = other_snapshot.flags.abort_reason.clone();
        }
    }

    /// Produce an independent clone: mutating the copy never affects the
    /// source (and vice versa).
    pub fn copy(&self) -> DryContext {
        let inner = self.lock();
        DryContext {
            inner: Mutex::new(Inner {
                values: inner.values.clone(),
                flags: inner.flags.clone(),
            }),
        }
    }

    /// Set the abort flag with an optional reason.
    pub fn set_abort(&self, reason: Option<String>) {
        let mut inner = self.lock();
        inner.flags.aborted = true;
        inner.flags.abort_reason = reason;
    }

    /// `true` if the abort flag is set.
    pub fn is_aborted(&self) -> bool {
        self.lock().flags.aborted
    }

    /// The current abort reason, if any.
    pub fn abort_reason(&self) -> Option<String> {
        self.lock().flags.abort_reason.clone()
    }

    /// Reset both control flags to their defaults.
    pub fn clear_control_flags(&self) {
        let mut inner = self.lock();
        inner.flags = ControlFlags::default();
    }

    /// Return the value at `k`, inserting `factory()` first if absent.
    pub fn get_or_insert<T>(&self, k: &str, factory: impl FnOnce() -> T) -> T
    where
        T: Serialize + DeserializeOwned,
    {
        if let Some(v) = self.get::<T>(k) {
            return v;
        }
        let v = factory();
        self.insert(&v, k.to_owned());
        v
    }

    /// Return the value at `k`, computing it from `(self, k)` and storing
    /// it first if absent.
    pub fn get_or_compute<T>(&self, k: &str, compute: impl FnOnce(&DryContext, &str) -> T) -> T
    where
        T: Serialize + DeserializeOwned,
    {
        if let Some(v) = self.get::<T>(k) {
            return v;
        }
        let v = compute(self, k);
        self.insert(&v, k.to_owned());
        v
    }

    /// Return the value at `k`, awaiting `factory` to produce and store it
    /// first if absent. `wet` is threaded through for factories that need
    /// live references (e.g. looking something up via a service handle).
    pub async fn ensure<T, F, Fut>(&self, k: &str, wet: &crate::wet_context::WetContext, factory: F) -> T
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&DryContext, &crate::wet_context::WetContext) -> Fut,
        Fut: std::future::Future<Output = T>,
    {
        if let Some(v) = self.get::<T>(k) {
            return v;
        }
        let v = factory(self, wet).await;
        self.insert(&v, k.to_owned());
        v
    }
}

impl Default for DryContext {
    fn default() -> Self {
        Self::new()
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
