use crate::shared::ids::validate_path_segment;
use serde_json::Value;
use std::collections::BTreeMap;

/// Dot-separated lookup path such as `Request.DesiredState.Department`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DataPath {
    raw: String,
    segments: Vec<String>,
}

impl DataPath {
    pub fn parse(raw: &str) -> Result<Self, String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err("path must be non-empty".to_string());
        }
        let segments = trimmed
            .split('.')
            .map(|segment| validate_path_segment(segment).map(|_| segment.to_string()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            raw: trimmed.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn root(&self) -> &str {
        &self.segments[0]
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Resolves the path against bound roots. A JSON `null` counts as absent.
    pub fn lookup<'a>(&self, roots: &'a BTreeMap<String, Value>) -> Option<&'a Value> {
        let mut current = roots.get(self.root())?;
        for segment in &self.segments[1..] {
            current = current.as_object()?.get(segment)?;
        }
        if current.is_null() {
            return None;
        }
        Some(current)
    }
}

impl std::fmt::Display for DataPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.raw.fmt(f)
    }
}

/// String form of a scalar value; `None` for arrays, objects and null.
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "map",
    }
}
