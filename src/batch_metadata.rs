//! [`BatchMetadataBuilder`] — data-flow analysis over a batch's ops.

use std::collections::HashSet;

use serde_json::{json, Map, Value};

use crate::metadata::{properties, required_fields, OpMetadata, Schema};
use crate::op::AnyOp;

/// Computes a synthetic [`OpMetadata`] for a [`crate::batch::BatchOp`] by
/// walking its ops in declaration order and tracking which output fields
/// become available before each subsequent op's inputs are considered.
pub struct BatchMetadataBuilder<T> {
    ops: Vec<AnyOp<T>>,
}

impl<T> BatchMetadataBuilder<T> {
    /// Build a metadata computer over `ops`, in declaration order.
    pub fn new(ops: Vec<AnyOp<T>>) -> Self {
        Self { ops }
    }

    /// Run the data-flow analysis and produce the batch's synthetic
    /// metadata.
    pub fn build(&self) -> OpMetadata {
        let mut available_outputs: HashSet<String> = HashSet::new();
        let mut externally_required: Vec<String> = Vec::new();
        let mut externally_required_set: HashSet<String> = HashSet::new();
        let mut merged_input_properties = Map::new();
        let mut merged_reference_properties = Map::new();
        let mut merged_reference_required: Vec<String> = Vec::new();
        let mut reference_required_set: HashSet<String> = HashSet::new();

        for op in &self.ops {
            let meta = op.metadata();

            if let Some(input_schema) = &meta.input_schema {
                for field in required_fields(input_schema) {
                    if !available_outputs.contains(&field) && externally_required_set.insert(field.clone()) {
                        externally_required.push(field);
                    }
                }
                for (name, sub_schema) in properties(input_schema) {
                    if externally_required_set.contains(&name) {
                        merged_input_properties.entry(name).or_insert(sub_schema);
                    }
                }
            }

            if let Some(reference_schema) = &meta.reference_schema {
                for (name, sub_schema) in properties(reference_schema) {
                    merged_reference_properties.entry(name).or_insert(sub_schema);
                }
                for field in required_fields(reference_schema) {
                    if reference_required_set.insert(field.clone()) {
                        merged_reference_required.push(field);
                    }
                }
            }

            if let Some(output_schema) = &meta.output_schema {
                let output_properties = properties(output_schema);
                if output_properties.is_empty()
                    && output_schema.get("type").and_then(Value::as_str) == Some("string")
                {
                    available_outputs.insert("result".to_owned());
                } else {
                    available_outputs.extend(output_properties.into_iter().map(|(name, _)| name));
                }
            }
        }

        let ops_count = self.ops.len();
        let input_schema: Schema = json!({
            "required": externally_required,
            "properties": Value::Object(merged_input_properties),
        });
        let reference_schema: Schema = json!({
            "required": merged_reference_required,
            "properties": Value::Object(merged_reference_properties),
        });
        let output_schema: Schema = json!({
            "type": "array",
            "items": {"type": "object"},
            "minItems": ops_count,
            "maxItems": ops_count,
        });

        OpMetadata::new("BatchOp")
            .with_description("Batch of N operations with data flow analysis")
            .with_input_schema(input_schema)
            .with_reference_schema(reference_schema)
            .with_output_schema(output_schema)
    }
}
