use super::plan::{Plan, PlannedStep};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

pub const PLAN_EXPORT_SCHEMA_VERSION: &str = "1.0";

/// Machine-readable, redacted snapshot of a plan. Build time and engine
/// version are left out so identical inputs export identically.
pub fn export_plan(plan: &Plan) -> Value {
    let request = plan.request();
    let export = json!({
        "schemaVersion": PLAN_EXPORT_SCHEMA_VERSION,
        "request": {
            "type": request.lifecycle_event(),
            "correlationId": request.correlation_id().as_str(),
            "actor": request.actor(),
            "input": {
                "identityKeys": request.identity_keys(),
                "desiredState": request.desired_state(),
                "changes": request.changes(),
            },
        },
        "plan": {
            "workflow": {
                "name": plan.workflow_name(),
                "version": plan.workflow_version(),
                "lifecycleEvent": plan.lifecycle_event(),
            },
            "steps": plan.steps().iter().map(export_step).collect::<Vec<_>>(),
            "onFailureSteps": plan.on_failure_steps().iter().map(export_step).collect::<Vec<_>>(),
            "warnings": plan.warnings(),
        },
        "capabilities": {
            "required": plan.capabilities().required,
            "available": plan.capabilities().available,
        },
    });
    plan.redactor().redact(&export)
}

pub fn export_plan_json(plan: &Plan) -> String {
    format!("{:#}", export_plan(plan))
}

pub(crate) fn fingerprint(plan: &Plan) -> String {
    let canonical = export_plan(plan).to_string();
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect::<String>()
}

fn export_step(step: &PlannedStep) -> Value {
    let mut exported = Map::from_iter([
        ("name".to_string(), Value::String(step.name().to_string())),
        ("type".to_string(), Value::String(step.step_type().to_string())),
        ("status".to_string(), Value::String(step.status().as_str().to_string())),
        ("reason".to_string(), Value::String(step.reason().to_string())),
        ("with".to_string(), Value::Object(step.with().clone())),
        (
            "requiresCapabilities".to_string(),
            Value::Array(
                step.required_capabilities()
                    .iter()
                    .map(|id| Value::String(id.to_string()))
                    .collect(),
            ),
        ),
    ]);
    if let Some(description) = step.description() {
        exported.insert(
            "description".to_string(),
            Value::String(description.to_string()),
        );
    }
    if let Some(condition) = step.condition() {
        exported.insert("condition".to_string(), condition.to_value());
    }
    Value::Object(exported)
}
