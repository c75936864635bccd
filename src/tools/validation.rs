//! Check tool call arguments against a tool's JSON Schema.

use serde_json::Value;

/// Validate tool arguments against an object schema.
///
/// Checks the top-level type, required fields, property types, string enums
/// and the item type of arrays. Returns the first violation found.
pub fn validate_arguments(args: &Value, schema: &Value) -> Result<(), String> {
    if schema.get("type").and_then(Value::as_str) == Some("object") && !args.is_object() {
        return Err(format!("expected object arguments, got {}", type_name(args)));
    }
    let Some(obj) = args.as_object() else {
        return Ok(());
    };

    for field in schema
        .get("required")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
    {
        if !obj.contains_key(field) {
            return Err(format!("missing required field '{field}'"));
        }
    }

    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Ok(());
    };
    for (key, value) in obj {
        if let Some(property) = properties.get(key) {
            check_property(key, value, property)?;
        }
    }
    Ok(())
}

fn check_property(key: &str, value: &Value, property: &Value) -> Result<(), String> {
    if let Some(expected) = property.get("type").and_then(Value::as_str) {
        if !matches_type(value, expected) {
            return Err(format!(
                "field '{key}' expected type '{expected}', got {}",
                type_name(value)
            ));
        }
    }

    if let Some(allowed) = property.get("enum").and_then(Value::as_array) {
        if !allowed.contains(value) {
            return Err(format!("field '{key}' must be one of {}", Value::Array(allowed.clone())));
        }
    }

    if let (Some(items), Some(item_type)) = (
        value.as_array(),
        property
            .get("items")
            .and_then(|i| i.get("type"))
            .and_then(Value::as_str),
    ) {
        if let Some(bad) = items.iter().find(|item| !matches_type(item, item_type)) {
            return Err(format!(
                "field '{key}' expected items of type '{item_type}', got {}",
                type_name(bad)
            ));
        }
    }
    Ok(())
}

fn matches_type(value: &Value, expected: &str) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
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
    use crate::tools::ToolParameters;
    use serde_json::json;

    fn issue_schema() -> Value {
        ToolParameters::object()
            .string("title", "Issue title", true)
            .string_enum("state", "Issue state", &["open", "closed"], false)
            .string_array("labels", "Labels", false)
            .integer("limit", "Max results", false)
            .build()
            .schema
    }

    #[test]
    fn accepts_well_formed_arguments() {
        let args = json!({"title": "Crash", "state": "open", "labels": ["bug"], "extra": 1});
        assert!(validate_arguments(&args, &issue_schema()).is_ok());
    }

    #[test]
    fn rejects_non_object_arguments() {
        let err = validate_arguments(&json!("title"), &issue_schema()).unwrap_err();
        assert!(err.contains("expected object"));
    }

    #[test]
    fn rejects_missing_required_field() {
        let err = validate_arguments(&json!({"state": "open"}), &issue_schema()).unwrap_err();
        assert_eq!(err, "missing required field 'title'");
    }

    #[test]
    fn rejects_wrong_property_type() {
        let err = validate_arguments(&json!({"title": "x", "limit": "ten"}), &issue_schema())
            .unwrap_err();
        assert!(err.contains("field 'limit' expected type 'integer'"));
    }

    #[test]
    fn rejects_value_outside_enum() {
        let err = validate_arguments(&json!({"title": "x", "state": "merged"}), &issue_schema())
            .unwrap_err();
        assert!(err.contains("must be one of"));
    }

    #[test]
    fn rejects_non_string_array_items() {
        let err = validate_arguments(&json!({"title": "x", "labels": ["a", 2]}), &issue_schema())
            .unwrap_err();
        assert!(err.contains("expected items of type 'string'"));
    }

    #[test]
    fn empty_schema_accepts_anything() {
        assert!(validate_arguments(&json!({"anything": 42}), &json!({})).is_ok());
        assert!(validate_arguments(&Value::Null, &json!({})).is_ok());
    }
}
