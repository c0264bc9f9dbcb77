use super::events::{EventType, EventWriter};
use crate::planning::plan::{Plan, PlannedStep};
use crate::providers::{AuthSession, Provider, ProviderSet};
use crate::request::LifecycleRequest;
use crate::shared::ids::StepTypeId;
use serde_json::{Map, Value};
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StepOutcome {
    pub changed: bool,
}

impl StepOutcome {
    pub fn changed() -> Self {
        Self { changed: true }
    }

    pub fn unchanged() -> Self {
        Self { changed: false }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct StepError {
    pub message: String,
}

impl StepError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// What a handler can reach while it runs: the plan snapshot, the providers
/// and the event buffer of the current execution.
pub struct StepContext<'a, 's> {
    plan: &'a Plan,
    providers: &'a ProviderSet,
    events: &'a mut EventWriter<'s>,
    step_name: &'a str,
}

impl<'a, 's> StepContext<'a, 's> {
    pub(crate) fn new(
        plan: &'a Plan,
        providers: &'a ProviderSet,
        events: &'a mut EventWriter<'s>,
        step_name: &'a str,
    ) -> Self {
        Self {
            plan,
            providers,
            events,
            step_name,
        }
    }

    pub fn plan(&self) -> &Plan {
        self.plan
    }

    pub fn request(&self) -> &LifecycleRequest {
        self.plan.request()
    }

    pub fn provider(&self, alias: &str) -> Option<&Arc<dyn Provider>> {
        self.providers.provider(alias)
    }

    pub fn provider_as<T: Any>(&self, alias: &str) -> Option<&T> {
        self.providers.provider_as::<T>(alias)
    }

    /// Queues a handler-authored event attributed to the running step.
    pub fn emit_event(&mut self, message: impl Into<String>, data: Option<Map<String, Value>>) {
        self.events
            .write_event(EventType::Custom, message, Some(self.step_name), data);
    }
}

pub trait StepHandler: Send + Sync {
    fn execute(
        &self,
        ctx: &mut StepContext<'_, '_>,
        step: &PlannedStep,
    ) -> Result<StepOutcome, StepError>;
}

/// Handler that accepts an auth session acquired by the dispatcher.
pub trait SessionAwareStepHandler: Send + Sync {
    fn execute_with_session(
        &self,
        ctx: &mut StepContext<'_, '_>,
        step: &PlannedStep,
        session: Option<&AuthSession>,
    ) -> Result<StepOutcome, StepError>;
}

#[derive(Clone)]
pub enum RegisteredHandler {
    Plain(Arc<dyn StepHandler>),
    SessionAware(Arc<dyn SessionAwareStepHandler>),
}

impl RegisteredHandler {
    pub fn accepts_session(&self) -> bool {
        matches!(self, Self::SessionAware(_))
    }
}

impl std::fmt::Debug for RegisteredHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plain(_) => f.write_str("Plain"),
            Self::SessionAware(_) => f.write_str("SessionAware"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandlerRegistryError {
    #[error("invalid step type `{step_type}`: {reason}")]
    InvalidStepType { step_type: String, reason: String },
    #[error("a handler for step type `{step_type}` is already registered")]
    DuplicateHandler { step_type: String },
}

/// Step type to trusted handler, filled in by the host at composition time.
#[derive(Debug, Clone, Default)]
pub struct StepHandlerRegistry {
    handlers: BTreeMap<StepTypeId, RegisteredHandler>,
}

impl StepHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        step_type: &str,
        handler: Arc<dyn StepHandler>,
    ) -> Result<&mut Self, HandlerRegistryError> {
        self.insert(step_type, RegisteredHandler::Plain(handler))
    }

    pub fn register_session_aware(
        &mut self,
        step_type: &str,
        handler: Arc<dyn SessionAwareStepHandler>,
    ) -> Result<&mut Self, HandlerRegistryError> {
        self.insert(step_type, RegisteredHandler::SessionAware(handler))
    }

    fn insert(
        &mut self,
        step_type: &str,
        handler: RegisteredHandler,
    ) -> Result<&mut Self, HandlerRegistryError> {
        let id = StepTypeId::parse(step_type).map_err(|reason| {
            HandlerRegistryError::InvalidStepType {
                step_type: step_type.to_string(),
                reason,
            }
        })?;
        if self.handlers.contains_key(&id) {
            return Err(HandlerRegistryError::DuplicateHandler {
                step_type: step_type.to_string(),
            });
        }
        self.handlers.insert(id, handler);
        Ok(self)
    }

    pub fn get(&self, step_type: &str) -> Option<&RegisteredHandler> {
        self.handlers.get(step_type)
    }

    pub fn step_types(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(StepTypeId::as_str)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
