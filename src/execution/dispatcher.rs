use super::handlers::{RegisteredHandler, StepContext};
use super::result::StepResult;
use crate::planning::plan::PlannedStep;
use crate::providers::{AuthSession, ProviderSet};
use crate::request::LifecycleRequest;
use crate::security::{key_path, SecurityGate};
use serde_json::{Map, Value};

pub const AUTH_SESSION_NAME_KEY: &str = "AuthSessionName";
pub const AUTH_SESSION_OPTIONS_KEY: &str = "AuthSessionOptions";

/// Resolves a planned step to its registered handler and runs it, acquiring
/// an auth session first when the step asks for one.
#[derive(Debug, Clone, Copy)]
pub struct StepDispatcher<'p> {
    providers: &'p ProviderSet,
    gate: SecurityGate,
}

impl<'p> StepDispatcher<'p> {
    pub fn new(providers: &'p ProviderSet, gate: SecurityGate) -> Self {
        Self { providers, gate }
    }

    pub fn dispatch(&self, ctx: &mut StepContext<'_, '_>, step: &PlannedStep) -> StepResult {
        let step_type = step.step_type().as_str();
        let Some(handler) = self.providers.step_handlers().get(step_type) else {
            return StepResult::failed(
                step.name(),
                step_type,
                format!("no handler registered for step type `{step_type}`"),
            );
        };

        let session = match self.acquire_session(step, ctx.request()) {
            Ok(session) => session,
            Err(message) => return StepResult::failed(step.name(), step_type, message),
        };

        let outcome = match handler {
            RegisteredHandler::SessionAware(handler) => {
                handler.execute_with_session(ctx, step, session.as_ref())
            }
            RegisteredHandler::Plain(handler) => handler.execute(ctx, step),
        };
        match outcome {
            Ok(outcome) => StepResult::completed(step.name(), step_type, outcome.changed),
            Err(err) => StepResult::failed(step.name(), step_type, err.message),
        }
    }

    fn acquire_session(
        &self,
        step: &PlannedStep,
        request: &LifecycleRequest,
    ) -> Result<Option<AuthSession>, String> {
        let Some(name) = step.param(AUTH_SESSION_NAME_KEY) else {
            return Ok(None);
        };
        let Some(name) = name.as_str().map(str::trim).filter(|name| !name.is_empty()) else {
            return Err(format!("`With.{AUTH_SESSION_NAME_KEY}` must be a non-empty string"));
        };
        let mut options = match step.param(AUTH_SESSION_OPTIONS_KEY) {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(options)) => options.clone(),
            Some(_) => {
                return Err(format!("`With.{AUTH_SESSION_OPTIONS_KEY}` must be a map"));
            }
        };
        let options_path = key_path(&key_path(step.name(), "With"), AUTH_SESSION_OPTIONS_KEY);
        self.gate
            .validate_map(&options, &options_path)
            .map_err(|err| err.to_string())?;

        options.insert(
            "CorrelationId".to_string(),
            Value::String(request.correlation_id().to_string()),
        );
        if let Some(actor) = request.actor() {
            options.insert("Actor".to_string(), Value::String(actor.to_string()));
        }

        let Some(broker) = self.providers.auth_session_broker() else {
            return Err(format!(
                "step requests auth session `{name}` but no auth session broker is configured"
            ));
        };
        broker
            .acquire_session(name, options)
            .map(Some)
            .map_err(|err| format!("failed to acquire auth session `{name}`: {err}"))
    }
}
