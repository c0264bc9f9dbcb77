use super::events::Event;
use crate::redaction::Redactor;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExecutionStatus {
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OnFailureStatus {
    NotRun,
    Completed,
    PartiallyFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StepStatus {
    Completed,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    pub name: String,
    #[serde(rename = "type")]
    pub step_type: String,
    pub status: StepStatus,
    pub changed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepResult {
    pub(crate) fn completed(name: &str, step_type: &str, changed: bool) -> Self {
        Self {
            name: name.to_string(),
            step_type: step_type.to_string(),
            status: StepStatus::Completed,
            changed,
            error: None,
        }
    }

    pub(crate) fn skipped(name: &str, step_type: &str) -> Self {
        Self {
            name: name.to_string(),
            step_type: step_type.to_string(),
            status: StepStatus::Skipped,
            changed: false,
            error: None,
        }
    }

    pub(crate) fn failed(name: &str, step_type: &str, error: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            step_type: step_type.to_string(),
            status: StepStatus::Failed,
            changed: false,
            error: Some(error.into()),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == StepStatus::Failed
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OnFailureResult {
    pub status: OnFailureStatus,
    pub steps: Vec<StepResult>,
}

impl Default for OnFailureResult {
    fn default() -> Self {
        Self {
            status: OnFailureStatus::NotRun,
            steps: Vec::new(),
        }
    }
}

/// Outcome of one execution. Fields are read-only once returned.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub(crate) status: ExecutionStatus,
    pub(crate) correlation_id: String,
    pub(crate) workflow_name: String,
    pub(crate) steps: Vec<StepResult>,
    pub(crate) on_failure: OnFailureResult,
    pub(crate) events: Vec<Event>,
    #[serde(skip)]
    pub(crate) redactor: Redactor,
}

impl ExecutionResult {
    pub fn status(&self) -> ExecutionStatus {
        self.status
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub fn workflow_name(&self) -> &str {
        &self.workflow_name
    }

    pub fn steps(&self) -> &[StepResult] {
        &self.steps
    }

    pub fn on_failure(&self) -> &OnFailureResult {
        &self.on_failure
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Redacted interchange form of the result.
    pub fn to_value(&self) -> Value {
        self.redactor.redact_serialized(self)
    }
}
