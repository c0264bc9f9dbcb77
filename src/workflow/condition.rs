use crate::security::{index_path, key_path};
use crate::workflow::path::{scalar_text, DataPath};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Roots a condition may reference.
pub const CONDITION_ROOTS: &[&str] = &["Request", "Plan"];

const OPERATORS: &[&str] = &["Equals", "NotEquals", "Exists", "In", "All", "Any", "None"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConditionError {
    #[error("condition at `{path}` is malformed: {reason}")]
    InvalidShape { path: String, reason: String },
    #[error("condition at `{path}` uses unknown operator `{operator}`; expected one of: {}", OPERATORS.join(", "))]
    UnknownOperator { path: String, operator: String },
    #[error("condition at `{path}` has invalid data path `{value}`: {reason}")]
    InvalidPath {
        path: String,
        value: String,
        reason: String,
    },
    #[error("condition at `{path}` references root `{root}`; allowed roots: {}", allowed.join(", "))]
    DisallowedRoot {
        path: String,
        root: String,
        allowed: Vec<String>,
    },
}

/// Declarative predicate, parsed once and evaluated against bound roots.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Equals { path: DataPath, value: Value },
    NotEquals { path: DataPath, value: Value },
    Exists { path: DataPath },
    In { path: DataPath, values: Vec<Value> },
    All(Vec<Condition>),
    Any(Vec<Condition>),
    None(Vec<Condition>),
}

pub type ConditionScope = BTreeMap<String, Value>;

impl Condition {
    pub fn parse(value: &Value, location: &str) -> Result<Self, ConditionError> {
        parse_node(value, location, CONDITION_ROOTS)
    }

    pub fn evaluate(&self, scope: &ConditionScope) -> bool {
        match self {
            Self::Equals { path, value } => path
                .lookup(scope)
                .is_some_and(|actual| scalars_equal(actual, value)),
            Self::NotEquals { path, value } => !path
                .lookup(scope)
                .is_some_and(|actual| scalars_equal(actual, value)),
            Self::Exists { path } => path.lookup(scope).is_some(),
            Self::In { path, values } => path.lookup(scope).is_some_and(|actual| {
                values
                    .iter()
                    .any(|candidate| scalars_equal(actual, candidate))
            }),
            Self::All(children) => children.iter().all(|child| child.evaluate(scope)),
            Self::Any(children) => children.iter().any(|child| child.evaluate(scope)),
            Self::None(children) => !children.iter().any(|child| child.evaluate(scope)),
        }
    }

    /// Authored shape of the condition, used by the plan export.
    pub fn to_value(&self) -> Value {
        let node = |operator: &str, body: Value| {
            Value::Object(Map::from_iter([(operator.to_string(), body)]))
        };
        let children_value =
            |children: &[Condition]| Value::Array(children.iter().map(Self::to_value).collect());
        match self {
            Self::Equals { path, value } => node("Equals", path_value_body(path, value)),
            Self::NotEquals { path, value } => node("NotEquals", path_value_body(path, value)),
            Self::Exists { path } => node(
                "Exists",
                Value::Object(Map::from_iter([(
                    "Path".to_string(),
                    Value::String(path.to_string()),
                )])),
            ),
            Self::In { path, values } => node(
                "In",
                Value::Object(Map::from_iter([
                    ("Path".to_string(), Value::String(path.to_string())),
                    ("Values".to_string(), Value::Array(values.clone())),
                ])),
            ),
            Self::All(children) => node("All", children_value(children)),
            Self::Any(children) => node("Any", children_value(children)),
            Self::None(children) => node("None", children_value(children)),
        }
    }

    pub fn describe(&self) -> String {
        let list = |children: &[Condition]| {
            children
                .iter()
                .map(Self::describe)
                .collect::<Vec<_>>()
                .join(", ")
        };
        match self {
            Self::Equals { path, value } => format!("{path} == {}", display_scalar(value)),
            Self::NotEquals { path, value } => format!("{path} != {}", display_scalar(value)),
            Self::Exists { path } => format!("exists({path})"),
            Self::In { path, values } => format!(
                "{path} in [{}]",
                values
                    .iter()
                    .map(display_scalar)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            Self::All(children) => format!("all({})", list(children)),
            Self::Any(children) => format!("any({})", list(children)),
            Self::None(children) => format!("none({})", list(children)),
        }
    }
}

fn path_value_body(path: &DataPath, value: &Value) -> Value {
    Value::Object(Map::from_iter([
        ("Path".to_string(), Value::String(path.to_string())),
        ("Value".to_string(), value.clone()),
    ]))
}

fn display_scalar(value: &Value) -> String {
    match value {
        Value::String(text) => format!("'{text}'"),
        other => scalar_text(other).unwrap_or_else(|| other.to_string()),
    }
}

fn scalars_equal(actual: &Value, expected: &Value) -> bool {
    match (scalar_text(actual), scalar_text(expected)) {
        (Some(actual), Some(expected)) => actual == expected,
        _ => false,
    }
}

fn parse_node(value: &Value, location: &str, roots: &[&str]) -> Result<Condition, ConditionError> {
    let Some(map) = value.as_object() else {
        return Err(ConditionError::InvalidShape {
            path: location.to_string(),
            reason: "a condition must be a map with exactly one operator key".to_string(),
        });
    };
    if map.len() != 1 {
        return Err(ConditionError::InvalidShape {
            path: location.to_string(),
            reason: format!(
                "a condition must have exactly one operator key, found {}",
                map.len()
            ),
        });
    }
    let Some((operator, body)) = map.iter().next() else {
        return Err(ConditionError::InvalidShape {
            path: location.to_string(),
            reason: "a condition must have exactly one operator key".to_string(),
        });
    };
    let body_location = key_path(location, operator);

    match operator.as_str() {
        "Equals" => {
            let (path, value) = parse_path_value(body, &body_location, roots)?;
            Ok(Condition::Equals { path, value })
        }
        "NotEquals" => {
            let (path, value) = parse_path_value(body, &body_location, roots)?;
            Ok(Condition::NotEquals { path, value })
        }
        "Exists" => {
            let raw = match body {
                Value::String(raw) => raw.as_str(),
                Value::Object(fields) => {
                    ensure_only_keys(fields, &["Path"], &body_location)?;
                    required_string(fields, "Path", &body_location)?
                }
                _ => {
                    return Err(ConditionError::InvalidShape {
                        path: body_location,
                        reason: "`Exists` takes a path string or a map with `Path`".to_string(),
                    })
                }
            };
            let path = parse_data_path(raw, &body_location, roots)?;
            Ok(Condition::Exists { path })
        }
        "In" => {
            let fields = body_map(body, &body_location)?;
            ensure_only_keys(fields, &["Path", "Values"], &body_location)?;
            let raw = required_string(fields, "Path", &body_location)?;
            let path = parse_data_path(raw, &body_location, roots)?;
            let Some(Value::Array(values)) = fields.get("Values") else {
                return Err(ConditionError::InvalidShape {
                    path: body_location,
                    reason: "`In` requires a `Values` sequence".to_string(),
                });
            };
            for (index, candidate) in values.iter().enumerate() {
                ensure_scalar(
                    candidate,
                    &index_path(&key_path(&body_location, "Values"), index),
                )?;
            }
            Ok(Condition::In {
                path,
                values: values.clone(),
            })
        }
        "All" | "Any" | "None" => {
            let Value::Array(items) = body else {
                return Err(ConditionError::InvalidShape {
                    path: body_location,
                    reason: format!("`{operator}` requires a sequence of conditions"),
                });
            };
            if items.is_empty() {
                return Err(ConditionError::InvalidShape {
                    path: body_location,
                    reason: format!("`{operator}` requires at least one condition"),
                });
            }
            let children = items
                .iter()
                .enumerate()
                .map(|(index, item)| parse_node(item, &index_path(&body_location, index), roots))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(match operator.as_str() {
                "All" => Condition::All(children),
                "Any" => Condition::Any(children),
                _ => Condition::None(children),
            })
        }
        other => Err(ConditionError::UnknownOperator {
            path: location.to_string(),
            operator: other.to_string(),
        }),
    }
}

fn parse_path_value(
    body: &Value,
    location: &str,
    roots: &[&str],
) -> Result<(DataPath, Value), ConditionError> {
    let fields = body_map(body, location)?;
    ensure_only_keys(fields, &["Path", "Value"], location)?;
    let raw = required_string(fields, "Path", location)?;
    let path = parse_data_path(raw, location, roots)?;
    let Some(value) = fields.get("Value") else {
        return Err(ConditionError::InvalidShape {
            path: location.to_string(),
            reason: "missing required `Value`".to_string(),
        });
    };
    ensure_scalar(value, &key_path(location, "Value"))?;
    Ok((path, value.clone()))
}

fn body_map<'a>(body: &'a Value, location: &str) -> Result<&'a Map<String, Value>, ConditionError> {
    body.as_object().ok_or_else(|| ConditionError::InvalidShape {
        path: location.to_string(),
        reason: "operator body must be a map".to_string(),
    })
}

fn ensure_only_keys(
    fields: &Map<String, Value>,
    allowed: &[&str],
    location: &str,
) -> Result<(), ConditionError> {
    if let Some(unknown) = fields.keys().find(|key| !allowed.contains(&key.as_str())) {
        return Err(ConditionError::InvalidShape {
            path: location.to_string(),
            reason: format!(
                "unknown key `{unknown}`; allowed keys: {}",
                allowed.join(", ")
            ),
        });
    }
    Ok(())
}

fn required_string<'a>(
    fields: &'a Map<String, Value>,
    key: &str,
    location: &str,
) -> Result<&'a str, ConditionError> {
    fields
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ConditionError::InvalidShape {
            path: location.to_string(),
            reason: format!("missing required string `{key}`"),
        })
}

fn ensure_scalar(value: &Value, location: &str) -> Result<(), ConditionError> {
    if scalar_text(value).is_some() {
        return Ok(());
    }
    Err(ConditionError::InvalidShape {
        path: location.to_string(),
        reason: "comparison values must be scalars".to_string(),
    })
}

fn parse_data_path(raw: &str, location: &str, roots: &[&str]) -> Result<DataPath, ConditionError> {
    let path = DataPath::parse(raw).map_err(|reason| ConditionError::InvalidPath {
        path: location.to_string(),
        value: raw.to_string(),
        reason,
    })?;
    if !roots.contains(&path.root()) {
        return Err(ConditionError::DisallowedRoot {
            path: location.to_string(),
            root: path.root().to_string(),
            allowed: roots.iter().map(|root| root.to_string()).collect(),
        });
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scope() -> ConditionScope {
        BTreeMap::from([
            (
                "Request".to_string(),
                json!({"LifecycleEvent": "Leaver", "DesiredState": {"Department": "IT"}}),
            ),
            ("Plan".to_string(), json!({"LifecycleEvent": "Leaver"})),
        ])
    }

    #[test]
    fn composite_conditions_evaluate_against_scope() {
        let condition = Condition::parse(
            &json!({"All": [
                {"Equals": {"Path": "Plan.LifecycleEvent", "Value": "Leaver"}},
                {"In": {"Path": "Request.DesiredState.Department", "Values": ["HR", "IT"]}},
                {"None": [{"Exists": "Request.DesiredState.Manager"}]}
            ]}),
            "Condition",
        )
        .expect("parse");
        assert!(condition.evaluate(&scope()));
    }

    #[test]
    fn not_equals_is_true_for_missing_paths() {
        let condition = Condition::parse(
            &json!({"NotEquals": {"Path": "Request.DesiredState.Manager", "Value": "x"}}),
            "Condition",
        )
        .expect("parse");
        assert!(condition.evaluate(&scope()));
    }

    #[test]
    fn provider_roots_are_rejected() {
        let err = Condition::parse(
            &json!({"Exists": {"Path": "Providers.Identity"}}),
            "Steps[0].Condition",
        )
        .expect_err("disallowed root");
        assert!(matches!(err, ConditionError::DisallowedRoot { ref root, .. } if root == "Providers"));
    }

    #[test]
    fn nodes_need_exactly_one_operator() {
        let err = Condition::parse(
            &json!({"Exists": "Request.Input", "Equals": {"Path": "Request.Input", "Value": 1}}),
            "Condition",
        )
        .expect_err("two operators");
        assert!(matches!(err, ConditionError::InvalidShape { .. }));
    }
}
