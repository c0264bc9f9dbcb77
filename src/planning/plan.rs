use crate::capabilities::validator::CapabilityValidation;
use crate::redaction::Redactor;
use crate::request::{CorrelationId, LifecycleRequest};
use crate::shared::ids::{CapabilityId, StepTypeId};
use crate::workflow::condition::Condition;
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StepPlanStatus {
    Run,
    Skip,
}

impl StepPlanStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Run => "Run",
            Self::Skip => "Skip",
        }
    }
}

/// One evaluated step. Parameters are already template-resolved and the
/// condition has already been decided.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedStep {
    pub(crate) name: String,
    pub(crate) step_type: StepTypeId,
    pub(crate) description: Option<String>,
    pub(crate) with: Map<String, Value>,
    pub(crate) condition: Option<Condition>,
    pub(crate) status: StepPlanStatus,
    pub(crate) reason: String,
    pub(crate) required_capabilities: Vec<CapabilityId>,
}

impl PlannedStep {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn step_type(&self) -> &StepTypeId {
        &self.step_type
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn with(&self) -> &Map<String, Value> {
        &self.with
    }

    /// Single parameter lookup.
    pub fn param(&self, key: &str) -> Option<&Value> {
        self.with.get(key)
    }

    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.with.get(key).and_then(Value::as_str)
    }

    pub fn condition(&self) -> Option<&Condition> {
        self.condition.as_ref()
    }

    pub fn status(&self) -> StepPlanStatus {
        self.status
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn is_skipped(&self) -> bool {
        self.status == StepPlanStatus::Skip
    }

    pub fn required_capabilities(&self) -> &[CapabilityId] {
        &self.required_capabilities
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanWarning {
    pub code: String,
    pub message: String,
}

/// Immutable result of planning. Execution reads it and never re-evaluates
/// conditions or capabilities.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub(crate) workflow_name: String,
    pub(crate) workflow_version: Option<String>,
    pub(crate) workflow_description: Option<String>,
    pub(crate) lifecycle_event: String,
    pub(crate) steps: Vec<PlannedStep>,
    pub(crate) on_failure_steps: Vec<PlannedStep>,
    pub(crate) request: LifecycleRequest,
    pub(crate) warnings: Vec<PlanWarning>,
    pub(crate) capabilities: CapabilityValidation,
    pub(crate) redactor: Redactor,
    pub(crate) engine_version: String,
    pub(crate) created_at: String,
}

impl Plan {
    pub fn workflow_name(&self) -> &str {
        &self.workflow_name
    }

    pub fn workflow_version(&self) -> Option<&str> {
        self.workflow_version.as_deref()
    }

    pub fn workflow_description(&self) -> Option<&str> {
        self.workflow_description.as_deref()
    }

    pub fn lifecycle_event(&self) -> &str {
        &self.lifecycle_event
    }

    pub fn steps(&self) -> &[PlannedStep] {
        &self.steps
    }

    pub fn on_failure_steps(&self) -> &[PlannedStep] {
        &self.on_failure_steps
    }

    /// Snapshot of the request taken at build time.
    pub fn request(&self) -> &LifecycleRequest {
        &self.request
    }

    pub fn correlation_id(&self) -> &CorrelationId {
        self.request.correlation_id()
    }

    pub fn warnings(&self) -> &[PlanWarning] {
        &self.warnings
    }

    pub fn capabilities(&self) -> &CapabilityValidation {
        &self.capabilities
    }

    /// Redaction rules in force when the plan was built; every output derived
    /// from the plan uses them.
    pub fn redactor(&self) -> &Redactor {
        &self.redactor
    }

    pub fn engine_version(&self) -> &str {
        &self.engine_version
    }

    pub fn created_at(&self) -> &str {
        &self.created_at
    }

    /// SHA-256 of the export artifact. Volatile fields are not part of it.
    pub fn fingerprint(&self) -> String {
        super::export::fingerprint(self)
    }
}
