//! [`OpMetadata`] — the descriptive, schema-bearing side of an op.

use serde_json::Value;

/// An opaque schema tree. The kernel interprets only `required` (an array
/// of field names) and `properties` (an object of name -> sub-schema);
/// everything else is passed through untouched to external collaborators
/// (a JSON Schema validator, a documentation generator, ...).
pub type Schema = Value;

/// Descriptive metadata attached to every [`crate::op::Op`].
#[derive(Debug, Clone, Default)]
pub struct OpMetadata {
    /// The op's name.
    pub name: String,
    /// A human-readable description.
    pub description: Option<String>,
    /// Schema describing the [`crate::dry_context::DryContext`] fields this
    /// op requires.
    pub input_schema: Option<Schema>,
    /// Schema describing the [`crate::wet_context::WetContext`] references
    /// this op requires.
    pub reference_schema: Option<Schema>,
    /// Schema describing this op's output shape.
    pub output_schema: Option<Schema>,
}

impl OpMetadata {
    /// Construct metadata with just a name; every other field defaults to
    /// `None`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Builder-style setter for `description`.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Builder-style setter for `input_schema`.
    pub fn with_input_schema(mut self, schema: Schema) -> Self {
        self.input_schema = Some(schema);
        self
    }

    /// Builder-style setter for `reference_schema`.
    pub fn with_reference_schema(mut self, schema: Schema) -> Self {
        self.reference_schema = Some(schema);
        self
    }

    /// Builder-style setter for `output_schema`.
    pub fn with_output_schema(mut self, schema: Schema) -> Self {
        self.output_schema = Some(schema);
        self
    }
}

/// Read a schema's `required` array as a `Vec<String>`. Returns an empty
/// vec if the schema has no `required` field or it isn't an array of
/// strings.
pub fn required_fields(schema: &Schema) -> Vec<String> {
    schema
        .get("required")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(str::to_owned))
                .collect()
        })
        .unwrap_or_default()
}

/// Read a schema's `properties` object as `{name -> sub-schema}`. Returns
/// an empty map if the schema has no `properties` field.
pub fn properties(schema: &Schema) -> serde_json::Map<String, Value> {
    schema
        .get("properties")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn required_fields_reads_array() {
        let schema = json!({"required": ["a", "b"]});
        assert_eq!(required_fields(&schema), vec!["a", "b"]);
    }

    #[test]
    fn required_fields_defaults_empty() {
        let schema = json!({});
        assert!(required_fields(&schema).is_empty());
    }

    #[test]
    fn properties_reads_object() {
        let schema = json!({"properties": {"a": {"type": "integer"}}});
        let props = properties(&schema);
        assert!(props.contains_key("a"));
    }
}
