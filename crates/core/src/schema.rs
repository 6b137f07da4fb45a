//! Argument validation against a tool's parameter schema.
//!
//! Models are free to emit anything inside `"args"`, so the registry checks
//! the arguments against the JSON-Schema subset tools actually declare:
//! a top-level `object`, `required` keys, per-property `type`, and `enum`.
//! Unknown keywords are ignored.

use serde_json::Value;

/// Check `args` against `schema`, returning a human-readable reason on mismatch.
pub fn validate_args(schema: &Value, args: &Value) -> Result<(), String> {
    if schema.get("type").and_then(Value::as_str) == Some("object") && !args.is_object() {
        return Err(format!("arguments must be a JSON object, got {}", type_name(args)));
    }

    let Some(obj) = args.as_object() else {
        return Ok(());
    };

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for key in required.iter().filter_map(Value::as_str) {
            if obj.get(key).is_none_or(Value::is_null) {
                return Err(format!("missing required argument '{key}'"));
            }
        }
    }

    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Ok(());
    };

    for (key, value) in obj {
        let Some(prop) = properties.get(key) else {
            continue;
        };
        if value.is_null() {
            continue;
        }
        if let Some(expected) = prop.get("type").and_then(Value::as_str)
            && !matches_type(expected, value)
        {
            return Err(format!(
                "argument '{key}' must be of type {expected}, got {}",
                type_name(value)
            ));
        }
        if let Some(allowed) = prop.get("enum").and_then(Value::as_array)
            && !allowed.contains(value)
        {
            let options: Vec<String> = allowed.iter().map(Value::to_string).collect();
            return Err(format!(
                "argument '{key}' must be one of [{}], got {value}",
                options.join(", ")
            ));
        }
    }

    Ok(())
}

fn matches_type(expected: &str, value: &Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        _ => true,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string" },
                "limit": { "type": "integer" },
                "status": { "type": "string", "enum": ["online", "offline"] }
            },
            "required": ["path"]
        })
    }

    #[test]
    fn accepts_valid_arguments() {
        assert!(validate_args(&schema(), &json!({"path": "/devices", "limit": 5})).is_ok());
    }

    #[test]
    fn rejects_missing_required() {
        let err = validate_args(&schema(), &json!({"limit": 5})).unwrap_err();
        assert!(err.contains("'path'"));
    }

    #[test]
    fn null_counts_as_missing() {
        assert!(validate_args(&schema(), &json!({"path": null})).is_err());
    }

    #[test]
    fn rejects_wrong_type() {
        let err = validate_args(&schema(), &json!({"path": 42})).unwrap_err();
        assert!(err.contains("type string"));
        assert!(validate_args(&schema(), &json!({"path": "/", "limit": 1.5})).is_err());
    }

    #[test]
    fn rejects_value_outside_enum() {
        let err = validate_args(&schema(), &json!({"path": "/", "status": "lost"})).unwrap_err();
        assert!(err.contains("one of"));
    }

    #[test]
    fn rejects_non_object_arguments() {
        assert!(validate_args(&schema(), &json!("/devices")).is_err());
    }

    #[test]
    fn unknown_properties_pass_through() {
        assert!(validate_args(&schema(), &json!({"path": "/", "extra": true})).is_ok());
    }
}
