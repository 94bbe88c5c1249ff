//! [`ValidatingWrapper`] — input/reference/output schema checks.
//!
//! JSON Schema validation proper is an external collaborator (§1, §9 of
//! the spec): this module implements only the minimal subset the kernel
//! itself is required to interpret — `required`, `type` in
//! `{integer, number, string, boolean}`, and `minimum`/`maximum` on
//! integers. Any stricter behavior is implementation-defined and anything
//! outside this subset is ignored rather than rejected.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::dry_context::DryContext;
use crate::error::OpError;
use crate::metadata::{properties, required_fields, OpMetadata, Schema};
use crate::op::{AnyOp, Op};
use crate::wet_context::WetContext;

/// Wraps an op with input/reference/output schema validation.
///
/// `validate_reference` is always effectively on when the wrapped op
/// declares a `reference_schema` with a `required` list, regardless of
/// the flag passed at construction — there is no "reference schema
/// exists but skip checking it" mode in the spec.
pub struct ValidatingWrapper<T> {
    validate_input: bool,
    validate_output: bool,
    inner: AnyOp<T>,
}

impl<T> ValidatingWrapper<T> {
    /// Wrap `inner` with both input and output validation enabled.
    pub fn new(inner: AnyOp<T>) -> Self {
        Self {
            validate_input: true,
            validate_output: true,
            inner,
        }
    }

    /// Wrap `inner` with explicit toggles for input/output validation.
    pub fn with_flags(validate_input: bool, validate_output: bool, inner: AnyOp<T>) -> Self {
        Self {
            validate_input,
            validate_output,
            inner,
        }
    }
}

fn dry_snapshot_as_object(dry: &DryContext) -> Value {
    Value::Object(dry.values().into_iter().collect())
}

/// One schema-violation description, JSON-Pointer-prefixed like
/// `/field: <reason>`, mirroring common JSON Schema validator wording.
fn violations(schema: &Schema, value: &Value) -> Vec<String> {
    let mut out = Vec::new();
    for field in required_fields(schema) {
        if value.get(&field).is_none() {
            out.push(format!("/{field}: '{field}' is a required property"));
        }
    }
    for (name, sub) in properties(schema) {
        let Some(field_value) = value.get(&name) else {
            continue;
        };
        if let Some(expected_type) = sub.get("type").and_then(Value::as_str) {
            if !matches_type(expected_type, field_value) {
                out.push(format!(
                    "/{name}: {field_value} is not of type '{expected_type}'"
                ));
                continue;
            }
        }
        if let Some(n) = field_value.as_i64() {
            if let Some(min) = sub.get("minimum").and_then(Value::as_i64) {
                if n < min {
                    out.push(format!("/{name}: {n} is less than the minimum of {min}"));
                }
            }
            if let Some(max) = sub.get("maximum").and_then(Value::as_i64) {
                if n > max {
                    out.push(format!("/{name}: {n} is greater than the maximum of {max}"));
                }
            }
        }
    }
    out
}

fn matches_type(expected: &str, value: &Value) -> bool {
    match expected {
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "string" => value.is_string(),
        "boolean" => value.is_boolean(),
        _ => true,
    }
}

#[async_trait]
impl<T: Send + Sync + Serialize + 'static> Op<T> for ValidatingWrapper<T> {
    async fn perform(&self, dry: &DryContext, wet: &WetContext) -> Result<T, OpError> {
        let meta = self.inner.metadata();

        if self.validate_input {
            if let Some(schema) = &meta.input_schema {
                let snapshot = dry_snapshot_as_object(dry);
                let probs = violations(schema, &snapshot);
                if !probs.is_empty() {
                    return Err(OpError::Context(format!(
                        "Input validation failed for {}: {}",
                        meta.name,
                        probs.join(", ")
                    )));
                }
            }
        }

        if let Some(schema) = &meta.reference_schema {
            for key in required_fields(schema) {
                if !wet.contains(&key) {
                    return Err(OpError::Context(format!(
                        "Required reference '{key}' not found in WetContext for op '{}'",
                        meta.name
                    )));
                }
            }
        }

        let result = self.inner.perform(dry, wet).await?;

        if self.validate_output {
            if let Some(schema) = &meta.output_schema {
                let serialized = serde_json::to_value(&result)
                    .map_err(|_| OpError::Context("Failed to serialize output for validation".to_owned()))?;
                let to_validate = if serialized.is_object() {
                    serialized
                } else {
                    serde_json::json!({ "value": serialized })
                };
                let probs = violations(schema, &to_validate);
                if !probs.is_empty() {
                    return Err(OpError::Context(format!(
                        "Output validation failed for {}: {}",
                        meta.name,
                        probs.join(", ")
                    )));
                }
            }
        }

        Ok(result)
    }

    fn metadata(&self) -> OpMetadata {
        self.inner.metadata()
    }

    async fn rollback(&self, dry: &DryContext, wet: &WetContext) -> Result<(), OpError> {
        self.inner.rollback(dry, wet).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::OpMetadata;
    use serde_json::json;

    struct RangeOp;

    #[async_trait]
    impl Op<i64> for RangeOp {
        async fn perform(&self, dry: &DryContext, _wet: &WetContext) -> Result<i64, OpError> {
            dry.get_required::<i64>("value")
        }

        fn metadata(&self) -> OpMetadata {
            OpMetadata::new("RangeOp").with_input_schema(json!({
                "required": ["value"],
                "properties": {"value": {"type": "integer", "minimum": 0, "maximum": 100}}
            }))
        }
    }

    #[tokio::test]
    async fn input_maximum_violation_s6() {
        let dry = DryContext::new();
        dry.insert(&150i64, "value");
        let wet = WetContext::new();
        let wrapped = ValidatingWrapper::new(AnyOp::new(RangeOp));
        let err = wrapped.perform(&dry, &wet).await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("maximum"), "message was: {msg}");
        assert!(msg.starts_with("Context error: Input validation failed for RangeOp"));
    }

    #[tokio::test]
    async fn input_required_violation() {
        let dry = DryContext::new();
        let wet = WetContext::new();
        let wrapped = ValidatingWrapper::new(AnyOp::new(RangeOp));
        let err = wrapped.perform(&dry, &wet).await.unwrap_err();
        assert!(err.to_string().contains("is a required property"));
    }

    #[tokio::test]
    async fn valid_input_passes() {
        let dry = DryContext::new();
        dry.insert(&42i64, "value");
        let wet = WetContext::new();
        let wrapped = ValidatingWrapper::new(AnyOp::new(RangeOp));
        assert_eq!(wrapped.perform(&dry, &wet).await.unwrap(), 42);
    }

    struct RefOp;

    #[async_trait]
    impl Op<i64> for RefOp {
        async fn perform(&self, _dry: &DryContext, _wet: &WetContext) -> Result<i64, OpError> {
            Ok(1)
        }

        fn metadata(&self) -> OpMetadata {
            OpMetadata::new("RefOp").with_reference_schema(json!({"required": ["db"]}))
        }
    }

    #[tokio::test]
    async fn missing_reference_fails() {
        let dry = DryContext::new();
        let wet = WetContext::new();
        let wrapped = ValidatingWrapper::new(AnyOp::new(RefOp));
        let err = wrapped.perform(&dry, &wet).await.unwrap_err();
        assert!(err.to_string().contains("Required reference 'db' not found"));
    }

    #[tokio::test]
    async fn present_reference_passes() {
        let dry = DryContext::new();
        let wet = WetContext::new();
        wet.put(7i64, "db");
        let wrapped = ValidatingWrapper::new(AnyOp::new(RefOp));
        assert_eq!(wrapped.perform(&dry, &wet).await.unwrap(), 1);
    }
}
