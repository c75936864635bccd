//! Typed access to tool call arguments.

use crate::error::ChatError;

/// Arguments of one tool call, after bound arguments have been merged in.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolArguments {
    value: serde_json::Value,
}

impl ToolArguments {
    pub fn new(value: serde_json::Value) -> Self {
        Self { value }
    }

    /// Merge `bound` over the model-supplied arguments.
    ///
    /// Bound keys win. Non-object model arguments are replaced by the bound
    /// object when there is anything to bind.
    pub fn with_bound(
        model_args: &serde_json::Value,
        bound: &serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        if bound.is_empty() {
            return Self::new(model_args.clone());
        }
        let mut merged = match model_args {
            serde_json::Value::Object(map) => map.clone(),
            _ => serde_json::Map::new(),
        };
        for (key, value) in bound {
            merged.insert(key.clone(), value.clone());
        }
        Self::new(serde_json::Value::Object(merged))
    }

    /// Get the raw JSON value.
    pub fn raw(&self) -> &serde_json::Value {
        &self.value
    }

    pub fn into_value(self) -> serde_json::Value {
        self.value
    }

    fn missing(kind: &str, key: &str) -> ChatError {
        ChatError::InvalidArgument(format!("Missing {kind} argument: {key}"))
    }

    pub fn get_str(&self, key: &str) -> Result<&str, ChatError> {
        self.get_str_opt(key).ok_or_else(|| Self::missing("string", key))
    }

    pub fn get_str_opt(&self, key: &str) -> Option<&str> {
        self.value.get(key).and_then(|v| v.as_str())
    }

    pub fn get_i64(&self, key: &str) -> Result<i64, ChatError> {
        self.value
            .get(key)
            .and_then(|v| v.as_i64())
            .ok_or_else(|| Self::missing("integer", key))
    }

    pub fn get_bool(&self, key: &str) -> Result<bool, ChatError> {
        self.value
            .get(key)
            .and_then(|v| v.as_bool())
            .ok_or_else(|| Self::missing("boolean", key))
    }

    /// Get a list of strings, as declared with `string_array`.
    pub fn get_string_array(&self, key: &str) -> Result<Vec<String>, ChatError> {
        let items = self
            .value
            .get(key)
            .and_then(|v| v.as_array())
            .ok_or_else(|| Self::missing("string array", key))?;
        items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| ChatError::InvalidArgument(format!("Non-string item in {key}")))
            })
            .collect()
    }

    /// Deserialize the entire arguments into a typed struct.
    pub fn deserialize<T: serde::de::DeserializeOwned>(&self) -> Result<T, ChatError> {
        serde_json::from_value(self.value.clone()).map_err(|e| {
            ChatError::InvalidArgument(format!("Failed to deserialize arguments: {e}"))
        })
    }
}
