use serde_json::{Map, Number, Value};

pub const DEFAULT_MAX_DATA_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SecurityError {
    #[error("executable content detected at `{path}`: {reason}")]
    ExecutableContentDetected { path: String, reason: String },
    #[error("data at `{path}` exceeds the maximum nesting depth of {max_depth}")]
    NestingTooDeep { path: String, max_depth: usize },
    #[error("invalid key at `{path}`: {reason}")]
    InvalidKey { path: String, reason: String },
    #[error("unsupported value at `{path}`: {reason}")]
    UnsupportedValue { path: String, reason: String },
}

impl SecurityError {
    pub fn path(&self) -> &str {
        match self {
            Self::ExecutableContentDetected { path, .. }
            | Self::NestingTooDeep { path, .. }
            | Self::InvalidKey { path, .. }
            | Self::UnsupportedValue { path, .. } => path,
        }
    }
}

/// Boundary check for data that arrives from an untrusted source.
///
/// `serde_json::Value` cannot hold callable content, so the JSON pass only
/// enforces shape: bounded nesting and well-formed keys. The YAML pass is the
/// one that can observe executable content, in the form of tagged nodes
/// (`!js/function`, `!!python/object`, ...), and rejects those with the exact
/// traversal path before converting into the closed JSON model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecurityGate {
    max_depth: usize,
}

impl Default for SecurityGate {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DATA_DEPTH)
    }
}

impl SecurityGate {
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth: max_depth.max(1),
        }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn validate(&self, value: &Value, root: &str) -> Result<(), SecurityError> {
        self.walk_json(value, root, 0)
    }

    pub fn validate_map(&self, map: &Map<String, Value>, root: &str) -> Result<(), SecurityError> {
        self.walk_json_map(map, root, 0)
    }

    pub fn admit_yaml(
        &self,
        value: serde_yaml::Value,
        root: &str,
    ) -> Result<Value, SecurityError> {
        self.convert_yaml(value, root, 0)
    }

    fn check_depth(&self, path: &str, depth: usize) -> Result<(), SecurityError> {
        if depth >= self.max_depth {
            return Err(SecurityError::NestingTooDeep {
                path: path.to_string(),
                max_depth: self.max_depth,
            });
        }
        Ok(())
    }

    fn walk_json(&self, value: &Value, path: &str, depth: usize) -> Result<(), SecurityError> {
        match value {
            Value::Object(map) => self.walk_json_map(map, path, depth),
            Value::Array(items) => {
                self.check_depth(path, depth)?;
                for (index, item) in items.iter().enumerate() {
                    self.walk_json(item, &index_path(path, index), depth + 1)?;
                }
                Ok(())
            }
            Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => Ok(()),
        }
    }

    fn walk_json_map(
        &self,
        map: &Map<String, Value>,
        path: &str,
        depth: usize,
    ) -> Result<(), SecurityError> {
        self.check_depth(path, depth)?;
        for (key, value) in map {
            validate_key(key, path)?;
            self.walk_json(value, &key_path(path, key), depth + 1)?;
        }
        Ok(())
    }

    fn convert_yaml(
        &self,
        value: serde_yaml::Value,
        path: &str,
        depth: usize,
    ) -> Result<Value, SecurityError> {
        match value {
            serde_yaml::Value::Null => Ok(Value::Null),
            serde_yaml::Value::Bool(flag) => Ok(Value::Bool(flag)),
            serde_yaml::Value::String(text) => Ok(Value::String(text)),
            serde_yaml::Value::Number(number) => yaml_number(&number, path),
            serde_yaml::Value::Sequence(items) => {
                self.check_depth(path, depth)?;
                let mut converted = Vec::with_capacity(items.len());
                for (index, item) in items.into_iter().enumerate() {
                    converted.push(self.convert_yaml(item, &index_path(path, index), depth + 1)?);
                }
                Ok(Value::Array(converted))
            }
            serde_yaml::Value::Mapping(mapping) => {
                self.check_depth(path, depth)?;
                let mut converted = Map::new();
                for (key, item) in mapping {
                    let serde_yaml::Value::String(key) = key else {
                        return Err(SecurityError::InvalidKey {
                            path: path.to_string(),
                            reason: "mapping keys must be strings".to_string(),
                        });
                    };
                    validate_key(&key, path)?;
                    let item_path = key_path(path, &key);
                    let item = self.convert_yaml(item, &item_path, depth + 1)?;
                    if converted.insert(key.clone(), item).is_some() {
                        return Err(SecurityError::InvalidKey {
                            path: item_path,
                            reason: format!("duplicate key `{key}`"),
                        });
                    }
                }
                Ok(Value::Object(converted))
            }
            serde_yaml::Value::Tagged(tagged) => Err(SecurityError::ExecutableContentDetected {
                path: path.to_string(),
                reason: format!("tagged node `{}` is not plain data", tagged.tag),
            }),
        }
    }
}

fn validate_key(key: &str, path: &str) -> Result<(), SecurityError> {
    if key.trim().is_empty() {
        return Err(SecurityError::InvalidKey {
            path: path.to_string(),
            reason: "keys must be non-empty".to_string(),
        });
    }
    if key.chars().any(char::is_control) {
        return Err(SecurityError::InvalidKey {
            path: path.to_string(),
            reason: format!("key `{}` contains control characters", key.escape_debug()),
        });
    }
    Ok(())
}

fn yaml_number(number: &serde_yaml::Number, path: &str) -> Result<Value, SecurityError> {
    if let Some(value) = number.as_i64() {
        return Ok(Value::from(value));
    }
    if let Some(value) = number.as_u64() {
        return Ok(Value::from(value));
    }
    number
        .as_f64()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| SecurityError::UnsupportedValue {
            path: path.to_string(),
            reason: format!("number `{number}` is not finite"),
        })
}

pub(crate) fn key_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

pub(crate) fn index_path(parent: &str, index: usize) -> String {
    format!("{parent}[{index}]")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tagged_yaml_nodes_are_rejected_with_their_path() {
        let yaml: serde_yaml::Value = serde_yaml::from_str(
            r#"
Steps:
  - Name: run
    With:
      Callback: !js/function "function () { return 1; }"
"#,
        )
        .expect("yaml");

        let err = SecurityGate::default()
            .admit_yaml(yaml, "Workflow")
            .expect_err("tagged node should be rejected");
        assert_eq!(err.path(), "Workflow.Steps[0].With.Callback");
        assert!(matches!(err, SecurityError::ExecutableContentDetected { .. }));
    }

    #[test]
    fn nesting_limit_applies_to_json() {
        let value = json!({"a": {"b": {"c": 1}}});
        assert!(SecurityGate::new(3).validate(&value, "Request").is_ok());
        let err = SecurityGate::new(2)
            .validate(&value, "Request")
            .expect_err("too deep");
        assert_eq!(err.path(), "Request.a.b");
    }
}
