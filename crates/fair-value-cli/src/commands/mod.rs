pub mod history;
pub mod metrics;
pub mod valuation;

use serde_json::{Map, Value};

/// Add a `display` block of pre-formatted strings next to the result.
pub(crate) fn attach_display(output: &mut Value, fields: Vec<(&str, String)>) {
    if let Some(map) = output.as_object_mut() {
        let display: Map<String, Value> = fields
            .into_iter()
            .map(|(k, v)| (k.to_string(), Value::String(v)))
            .collect();
        map.insert("display".to_string(), Value::Object(display));
    }
}
