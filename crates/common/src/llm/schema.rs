//! JSON schemas for structured generation
//!
//! Schemas are derived from the Rust types the replies decode into, sent to
//! the model and checked against every reply before decoding.

use schemars::{schema_for, JsonSchema};
use serde_json::Value;

/// Named JSON schema sent to the model and checked on the way back
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSchema {
    pub name: String,
    pub description: String,
    pub schema: Value,
}

impl OutputSchema {
    pub fn new(name: impl Into<String>, description: impl Into<String>, schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            schema,
        }
    }

    /// Schema of `T` as derived by `schemars`
    ///
    /// `$schema` and `title` are dropped; the name travels separately.
    pub fn of<T: JsonSchema>(name: impl Into<String>, description: impl Into<String>) -> Self {
        let mut schema = schema_for!(T).to_value();
        if let Some(object) = schema.as_object_mut() {
            object.remove("$schema");
            object.remove("title");
        }
        Self::new(name, description, schema)
    }

    /// Check `value` against the schema, describing the first mismatch
    pub fn validate(&self, value: &Value) -> Result<(), String> {
        let validator = jsonschema::validator_for(&self.schema)
            .map_err(|e| format!("schema '{}' is invalid: {}", self.name, e))?;
        let result = match validator.iter_errors(value).next() {
            Some(error) => Err(error.to_string()),
            None => Ok(()),
        };
        result
    }
}

/// Parse a model reply as JSON, tolerating a surrounding markdown fence
pub fn parse_json_output(text: &str) -> Result<Value, String> {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    serde_json::from_str(body).map_err(|e| format!("reply is not valid JSON: {}", e))
}
