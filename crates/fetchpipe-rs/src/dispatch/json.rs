//! JSON payload parsing and JSONPath querying, via `serde_json` and
//! `jsonpath-rust`.

use jsonpath_rust::JsonPathQuery;
use serde_json::Value;

use crate::error::PipelineError;

/// Parse `body` as a JSON document.
pub fn parse(body: &str) -> Result<Value, PipelineError> {
    serde_json::from_str(body).map_err(|e| PipelineError::UnableToReadSource(e.to_string()))
}

/// Evaluate `expr` against `root`. The single-token path `$` is special
/// cased to "the root wrapped as a one-element array" rather than a
/// whole-tree dump (§4.F step d). A compile or evaluation failure is
/// treated as "no match", matching the XML path's behavior.
pub fn query(root: &Value, expr: &str) -> Vec<Value> {
    if expr.trim() == "$" {
        return vec![root.clone()];
    }
    match root.clone().path(expr) {
        Ok(Value::Array(items)) => items,
        Ok(other) => vec![other],
        Err(_) => Vec::new(),
    }
}
