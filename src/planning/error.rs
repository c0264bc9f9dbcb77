use crate::capabilities::registry::RegistryError;
use crate::capabilities::validator::CapabilityError;
use crate::request::RequestError;
use crate::security::SecurityError;
use crate::workflow::condition::ConditionError;
use crate::workflow::definition::WorkflowSchemaError;
use crate::workflow::template::LocatedTemplateError;
use serde_json::{json, Value};

#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("workflow schema invalid at `{path}`: {reason}")]
    Schema { path: String, reason: String },
    #[error(transparent)]
    Security(#[from] SecurityError),
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error(transparent)]
    Template(#[from] LocatedTemplateError),
    #[error(transparent)]
    Condition(#[from] ConditionError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Capabilities(#[from] CapabilityError),
}

impl From<WorkflowSchemaError> for PlanError {
    fn from(value: WorkflowSchemaError) -> Self {
        Self::Schema {
            path: value.path,
            reason: value.reason,
        }
    }
}

impl PlanError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Schema { .. } => "Schema",
            Self::Security(SecurityError::ExecutableContentDetected { .. }) => {
                "ExecutableContentDetected"
            }
            Self::Security(_) => "Security",
            Self::Request(_) => "Request",
            Self::Template(_) => "Template",
            Self::Condition(_) => "Condition",
            Self::Registry(RegistryError::MissingStepTypeMetadata { .. }) => {
                "MissingStepTypeMetadata"
            }
            Self::Registry(RegistryError::DuplicateStepTypeMetadata { .. }) => {
                "DuplicateStepTypeMetadata"
            }
            Self::Registry(_) => "StepMetadata",
            Self::Capabilities(CapabilityError::MissingCapabilities(_)) => "MissingCapabilities",
            Self::Capabilities(_) => "Capabilities",
        }
    }

    /// Structured payload for automated consumers such as CI gates.
    pub fn diagnostics(&self) -> Value {
        let mut diagnostics = json!({
            "kind": self.kind(),
            "message": self.to_string(),
        });
        let detail = match self {
            Self::Schema { path, .. } => json!({"path": path}),
            Self::Security(err) => json!({"path": err.path()}),
            Self::Template(err) => json!({"path": err.path}),
            Self::Registry(RegistryError::MissingStepTypeMetadata { step_type, steps }) => {
                json!({"stepType": step_type, "steps": steps})
            }
            Self::Registry(RegistryError::DuplicateStepTypeMetadata { step_type, owners }) => {
                json!({"stepType": step_type, "owners": owners})
            }
            Self::Capabilities(CapabilityError::MissingCapabilities(gap)) => json!({
                "missing": gap.missing,
                "affectedSteps": gap.affected_steps,
                "available": gap.available,
            }),
            _ => Value::Null,
        };
        if let (Value::Object(target), Value::Object(extra)) = (&mut diagnostics, detail) {
            target.extend(extra);
        }
        diagnostics
    }
}
