//! Structural acceptance check for routine output.

use serde_json::Value;

use crate::error::{ExtractError, ExtractResult};

/// Fields of which at least one must be populated in at least one item.
const IDENTITY_FIELDS: [&str; 3] = ["name", "priceRaw", "priceNormalized"];

/// JavaScript truthiness of a JSON value.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Accept `output` only if it is a non-empty array in which some element has a
/// truthy `name`, `priceRaw` or `priceNormalized`.
pub fn validate_products(output: &Value) -> ExtractResult<()> {
    let Some(items) = output.as_array() else {
        return Err(ExtractError::ValidationFailed(format!(
            "expected an array of products, got {}",
            kind_of(output)
        )));
    };

    if items.is_empty() {
        return Err(ExtractError::ValidationFailed(
            "returned an empty array; no products were found in the page text".to_string(),
        ));
    }

    let has_identity = items.iter().any(|item| {
        IDENTITY_FIELDS
            .iter()
            .any(|field| item.get(field).is_some_and(is_truthy))
    });

    if !has_identity {
        return Err(ExtractError::ValidationFailed(format!(
            "none of the {} returned items has a name, priceRaw or priceNormalized",
            items.len()
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_array_fails() {
        assert!(matches!(
            validate_products(&json!([])),
            Err(ExtractError::ValidationFailed(_))
        ));
    }

    #[test]
    fn test_named_item_passes() {
        assert!(validate_products(&json!([{"name": "x"}])).is_ok());
    }

    #[test]
    fn test_unrecognized_fields_fail() {
        let err = validate_products(&json!([{"foo": "bar"}])).unwrap_err();
        assert!(err.to_string().contains("none of the 1"));
    }

    #[test]
    fn test_non_array_fails() {
        let err = validate_products(&json!({"name": "x"})).unwrap_err();
        assert!(err.to_string().contains("got object"));
    }

    #[test]
    fn test_falsy_values_do_not_count() {
        let output = json!([
            {"name": "", "priceRaw": null, "priceNormalized": 0},
            {"name": null}
        ]);
        assert!(validate_products(&output).is_err());
        assert!(validate_products(&json!([{"name": null}, {"priceNormalized": 9.99}])).is_ok());
    }
}
