//! Response-shape adapters
//!
//! Every value read from an API response goes through an explicit JSON pointer
//! declared by the workflow or the configuration. A pointer that does not match
//! is a [`E2eError::ResponseShape`], never a guess at another field.

use std::collections::BTreeSet;

use serde_json::Value;

use crate::client::ApiResponse;
use crate::error::{E2eError, E2eResult};

/// Parsed JSON body of a response, or a shape error naming the endpoint.
pub fn json_body<'a>(response: &'a ApiResponse, endpoint: &str) -> E2eResult<&'a Value> {
    response.json.as_ref().ok_or_else(|| E2eError::ResponseShape {
        endpoint: endpoint.to_string(),
        reason: "response body is not JSON".to_string(),
    })
}

/// Scalar at `pointer` rendered as a string; ids may be strings or numbers.
pub fn extract_scalar(body: &Value, pointer: &str, endpoint: &str) -> E2eResult<String> {
    match body.pointer(pointer) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(other) => Err(E2eError::ResponseShape {
            endpoint: endpoint.to_string(),
            reason: format!("{} is {}, expected a non-empty string or number", pointer, kind(other)),
        }),
        None => Err(E2eError::ResponseShape {
            endpoint: endpoint.to_string(),
            reason: format!("{} not present", pointer),
        }),
    }
}

/// Ids of the items of the array at `items_pointer`.
pub fn extract_ids(
    body: &Value,
    items_pointer: &str,
    id_field: &str,
    endpoint: &str,
) -> E2eResult<BTreeSet<String>> {
    let items = body
        .pointer(items_pointer)
        .ok_or_else(|| E2eError::ResponseShape {
            endpoint: endpoint.to_string(),
            reason: format!("{} not present", items_pointer),
        })?
        .as_array()
        .ok_or_else(|| E2eError::ResponseShape {
            endpoint: endpoint.to_string(),
            reason: format!("{} is not an array", items_pointer),
        })?;

    let id_pointer = format!("/{}", id_field.trim_start_matches('/'));
    items
        .iter()
        .map(|item| extract_scalar(item, &id_pointer, endpoint))
        .collect()
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "an empty string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
