pub mod capabilities;
pub mod config;
pub mod execution;
pub mod planning;
pub mod providers;
pub mod redaction;
pub mod request;
pub mod security;
pub mod shared;
pub mod steps;
pub mod workflow;

pub use config::{ConfigError, EngineSettings};
pub use execution::{ExecutionEngine, ExecutionError, ExecutionResult};
pub use planning::{export_plan, Plan, PlanBuilder, PlanError};
pub use providers::{AuthSession, AuthSessionBroker, Provider, ProviderSet};
pub use request::{CorrelationId, LifecycleRequest};
