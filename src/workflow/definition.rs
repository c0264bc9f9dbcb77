use crate::security::{index_path, key_path};
use crate::shared::ids::StepTypeId;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("workflow schema invalid at `{path}`: {reason}")]
pub struct WorkflowSchemaError {
    pub path: String,
    pub reason: String,
}

impl WorkflowSchemaError {
    fn new(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Normalized, code-free workflow definition.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowDefinition {
    pub name: String,
    pub lifecycle_event: String,
    pub version: Option<String>,
    pub description: Option<String>,
    pub steps: Vec<StepDefinition>,
    pub on_failure_steps: Vec<StepDefinition>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepDefinition {
    pub name: String,
    pub step_type: StepTypeId,
    pub description: Option<String>,
    pub with: Map<String, Value>,
    /// Raw condition; templates are resolved before it is parsed. An explicit
    /// null counts as no condition.
    pub condition: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "PascalCase")]
struct WorkflowDefinitionRaw {
    name: String,
    lifecycle_event: String,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    description: Option<String>,
    steps: Vec<Value>,
    #[serde(default)]
    on_failure_steps: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "PascalCase")]
struct StepDefinitionRaw {
    name: String,
    #[serde(rename = "Type")]
    step_type: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    with: Map<String, Value>,
    #[serde(default)]
    condition: Option<Value>,
}

pub const WORKFLOW_ROOT: &str = "Workflow";

impl WorkflowDefinition {
    pub fn from_value(value: &Value) -> Result<Self, WorkflowSchemaError> {
        let raw: WorkflowDefinitionRaw = serde_json::from_value(value.clone())
            .map_err(|err| WorkflowSchemaError::new(WORKFLOW_ROOT, err.to_string()))?;

        let name = required_text(&raw.name, &key_path(WORKFLOW_ROOT, "Name"))?;
        let lifecycle_event =
            required_text(&raw.lifecycle_event, &key_path(WORKFLOW_ROOT, "LifecycleEvent"))?;
        let version = optional_text(raw.version, &key_path(WORKFLOW_ROOT, "Version"))?;

        let steps = normalize_steps(&raw.steps, &key_path(WORKFLOW_ROOT, "Steps"))?;
        let on_failure_steps =
            normalize_steps(&raw.on_failure_steps, &key_path(WORKFLOW_ROOT, "OnFailureSteps"))?;

        Ok(Self {
            name,
            lifecycle_event,
            version,
            description: raw.description,
            steps,
            on_failure_steps,
        })
    }
}

fn normalize_steps(
    raw_steps: &[Value],
    list_path: &str,
) -> Result<Vec<StepDefinition>, WorkflowSchemaError> {
    let mut names = HashSet::new();
    let mut steps = Vec::with_capacity(raw_steps.len());
    for (index, raw) in raw_steps.iter().enumerate() {
        let step_path = index_path(list_path, index);
        let step = normalize_step(raw, &step_path)?;
        if !names.insert(step.name.clone()) {
            return Err(WorkflowSchemaError::new(
                key_path(&step_path, "Name"),
                format!("duplicate step name `{}`", step.name),
            ));
        }
        steps.push(step);
    }
    Ok(steps)
}

fn normalize_step(raw: &Value, step_path: &str) -> Result<StepDefinition, WorkflowSchemaError> {
    if let Some(fields) = raw.as_object() {
        if fields.contains_key("RequiresCapabilities") {
            return Err(WorkflowSchemaError::new(
                key_path(step_path, "RequiresCapabilities"),
                "required capabilities are derived from step metadata and cannot be authored",
            ));
        }
    }
    let step: StepDefinitionRaw = serde_json::from_value(raw.clone())
        .map_err(|err| WorkflowSchemaError::new(step_path, err.to_string()))?;

    let name = required_text(&step.name, &key_path(step_path, "Name"))?;
    let type_path = key_path(step_path, "Type");
    let step_type = required_text(&step.step_type, &type_path)?;
    let step_type =
        StepTypeId::parse(&step_type).map_err(|reason| WorkflowSchemaError::new(type_path, reason))?;

    Ok(StepDefinition {
        name,
        step_type,
        description: step.description,
        with: step.with,
        condition: step.condition,
    })
}

fn required_text(raw: &str, path: &str) -> Result<String, WorkflowSchemaError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(WorkflowSchemaError::new(path, "must be non-empty"));
    }
    Ok(trimmed.to_string())
}

fn optional_text(raw: Option<String>, path: &str) -> Result<Option<String>, WorkflowSchemaError> {
    raw.map(|value| required_text(&value, path)).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_step_keys_are_rejected_with_the_step_path() {
        let err = WorkflowDefinition::from_value(&json!({
            "Name": "Joiner",
            "LifecycleEvent": "Joiner",
            "Steps": [
                {"Name": "a", "Type": "EmitEvent"},
                {"Name": "b", "Type": "EmitEvent", "Script": "rm -rf /"}
            ]
        }))
        .expect_err("unknown key");
        assert_eq!(err.path, "Workflow.Steps[1]");
        assert!(err.reason.contains("Script"));
    }

    #[test]
    fn authored_capabilities_are_rejected() {
        let err = WorkflowDefinition::from_value(&json!({
            "Name": "Joiner",
            "LifecycleEvent": "Joiner",
            "Steps": [{"Name": "a", "Type": "EmitEvent", "RequiresCapabilities": ["X.Read"]}]
        }))
        .expect_err("derived field");
        assert_eq!(err.path, "Workflow.Steps[0].RequiresCapabilities");
    }
}
