//! Output schemas declared per analysis mode

use schemars::generate::SchemaSettings;
use serde_json::{Value, json};

use crate::model::{ClauseFinding, ModeTag};
use crate::service::analysis::modes::spec_for;

/// Property name used when an array schema has to travel inside an object
pub const ARRAY_ENVELOPE_KEY: &str = "findings";

/// Machine-checkable schema for a mode, if the mode binds one
///
/// Only red flags binds a schema; the clause-level modes describe their small
/// object shape in the prompt and rely on response validation.
pub fn schema_for(mode: ModeTag) -> Option<Value> {
    spec_for(mode)
        .and_then(|spec| spec.schema)
        .map(|schema| schema())
}

/// Array-of-`ClauseFinding` schema with every subschema inlined
pub fn red_flags_schema() -> Value {
    let generator = SchemaSettings::draft07()
        .with(|settings| settings.inline_subschemas = true)
        .into_generator();

    let mut schema = generator
        .into_root_schema_for::<Vec<ClauseFinding>>()
        .to_value();

    if let Some(root) = schema.as_object_mut() {
        root.remove("$schema");
        root.remove("title");
    }

    schema
}

/// Wrap a schema so its root is an object
///
/// Structured-output providers only accept object roots, so an array schema is
/// sent as `{ "findings": [...] }` and unwrapped again by the normalizer.
pub fn object_rooted(schema: &Value) -> Value {
    if schema.get("type").and_then(Value::as_str) == Some("object") {
        return schema.clone();
    }

    json!({
        "type": "object",
        "properties": { ARRAY_ENVELOPE_KEY: schema },
        "required": [ARRAY_ENVELOPE_KEY],
        "additionalProperties": false
    })
}
