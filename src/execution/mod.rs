pub mod dispatcher;
pub mod engine;
pub mod events;
pub mod handlers;
pub mod result;

pub use dispatcher::{StepDispatcher, AUTH_SESSION_NAME_KEY, AUTH_SESSION_OPTIONS_KEY};
pub use engine::{ExecutionEngine, ExecutionError};
pub use events::{Event, EventSink, EventSinkError, EventType, EventWriter};
pub use handlers::{
    HandlerRegistryError, RegisteredHandler, SessionAwareStepHandler, StepContext, StepError,
    StepHandler, StepHandlerRegistry, StepOutcome,
};
pub use result::{
    ExecutionResult, ExecutionStatus, OnFailureResult, OnFailureStatus, StepResult, StepStatus,
};
