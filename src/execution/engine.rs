use super::dispatcher::StepDispatcher;
use super::events::{EventSink, EventSinkError, EventType, EventWriter};
use super::handlers::StepContext;
use super::result::{ExecutionResult, ExecutionStatus, OnFailureResult, OnFailureStatus, StepResult};
use crate::config::EngineSettings;
use crate::planning::plan::{Plan, PlannedStep};
use crate::providers::ProviderSet;
use crate::security::SecurityGate;
use crate::shared::logging::{log_fields, EngineLog};
use serde_json::{json, Map, Value};

#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    /// The host event sink rejected an event. Forwarding stopped at that
    /// event, but both phases still ran; `result` is the complete outcome
    /// with every buffered event.
    #[error("event sink rejected event #{event_index}: {source}")]
    EventSink {
        event_index: usize,
        step: Option<String>,
        #[source]
        source: EventSinkError,
        result: Box<ExecutionResult>,
    },
}

enum Phase {
    Primary,
    OnFailure,
}

impl Phase {
    fn label(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::OnFailure => "on_failure",
        }
    }
}

/// Runs a built plan: fail-fast primary steps, then best-effort OnFailure
/// steps when the primary phase failed.
#[derive(Debug, Clone, Default)]
pub struct ExecutionEngine {
    gate: SecurityGate,
    log: EngineLog,
}

impl ExecutionEngine {
    pub fn new(settings: &EngineSettings) -> Self {
        Self {
            gate: settings.security_gate(),
            log: settings.engine_log(),
        }
    }

    pub fn execute(
        &self,
        plan: &Plan,
        providers: &ProviderSet,
        sink: Option<&dyn EventSink>,
    ) -> Result<ExecutionResult, ExecutionError> {
        let correlation_id = plan.correlation_id().to_string();
        let mut events = EventWriter::new(plan.redactor().clone(), correlation_id.clone(), sink);
        let dispatcher = StepDispatcher::new(providers, self.gate);
        self.log.info(
            "execution.started",
            "execution started",
            log_fields([
                ("correlation_id", json!(correlation_id)),
                ("workflow", json!(plan.workflow_name())),
                ("steps", json!(plan.steps().len())),
            ]),
        );

        let mut result = ExecutionResult {
            status: ExecutionStatus::Completed,
            correlation_id: correlation_id.clone(),
            workflow_name: plan.workflow_name().to_string(),
            steps: Vec::new(),
            on_failure: OnFailureResult::default(),
            events: Vec::new(),
            redactor: plan.redactor().clone(),
        };

        for step in plan.steps() {
            let step_result =
                self.run_step(plan, providers, &dispatcher, &mut events, step, &Phase::Primary);
            let failed = step_result.is_failed();
            result.steps.push(step_result);
            if failed {
                result.status = ExecutionStatus::Failed;
                break;
            }
        }

        if result.status == ExecutionStatus::Failed {
            self.log.warn(
                "execution.on_failure.started",
                "primary phase failed; running OnFailure steps",
                log_fields([
                    ("correlation_id", json!(correlation_id)),
                    ("on_failure_steps", json!(plan.on_failure_steps().len())),
                ]),
            );
            let mut any_failed = false;
            for step in plan.on_failure_steps() {
                let step_result =
                    self.run_step(plan, providers, &dispatcher, &mut events, step, &Phase::OnFailure);
                any_failed |= step_result.is_failed();
                result.on_failure.steps.push(step_result);
            }
            result.on_failure.status = if any_failed {
                OnFailureStatus::PartiallyFailed
            } else {
                OnFailureStatus::Completed
            };
        }

        let (buffered, sink_failure) = events.into_parts();
        result.events = buffered;
        self.log.info(
            "execution.completed",
            "execution completed",
            log_fields([
                ("correlation_id", json!(correlation_id)),
                ("status", json!(result.status)),
                ("on_failure_status", json!(result.on_failure.status)),
                ("events", json!(result.events.len())),
            ]),
        );

        let Some((event_index, source)) = sink_failure else {
            return Ok(result);
        };
        let step = result
            .events
            .get(event_index)
            .and_then(|event| event.step_name.clone());
        self.log.error(
            "execution.sink.failed",
            &source.message,
            log_fields([
                ("correlation_id", json!(correlation_id)),
                ("event_index", json!(event_index)),
                ("step", json!(step)),
            ]),
        );
        Err(ExecutionError::EventSink {
            event_index,
            step,
            source,
            result: Box::new(result),
        })
    }

    fn run_step(
        &self,
        plan: &Plan,
        providers: &ProviderSet,
        dispatcher: &StepDispatcher<'_>,
        events: &mut EventWriter<'_>,
        step: &PlannedStep,
        phase: &Phase,
    ) -> StepResult {
        let fields = |status: &str| {
            log_fields([
                ("correlation_id", json!(plan.correlation_id().as_str())),
                ("phase", json!(phase.label())),
                ("step", json!(step.name())),
                ("step_type", json!(step.step_type().as_str())),
                ("status", json!(status)),
            ])
        };

        if step.is_skipped() {
            events.write_event(
                EventType::StepSkipped,
                format!("Step '{}' skipped: {}", step.name(), step.reason()),
                Some(step.name()),
                None,
            );
            self.log
                .info("execution.step.skipped", step.reason(), fields("Skipped"));
            return StepResult::skipped(step.name(), step.step_type().as_str());
        }

        let step_result = {
            let mut ctx = StepContext::new(plan, providers, events, step.name());
            dispatcher.dispatch(&mut ctx, step)
        };

        match step_result.error.as_deref() {
            Some(error) => {
                let data = Map::from_iter([(
                    "Error".to_string(),
                    Value::String(error.to_string()),
                )]);
                events.write_event(
                    EventType::StepFailed,
                    format!("Step '{}' failed", step.name()),
                    Some(step.name()),
                    Some(data),
                );
                self.log.error("execution.step.failed", error, fields("Failed"));
            }
            None => {
                self.log
                    .info("execution.step.completed", "step completed", fields("Completed"));
            }
        }
        step_result
    }
}
