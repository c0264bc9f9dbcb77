pub mod builder;
pub mod error;
pub mod export;
pub mod plan;

pub use builder::PlanBuilder;
pub use error::PlanError;
pub use export::{export_plan, export_plan_json, PLAN_EXPORT_SCHEMA_VERSION};
pub use plan::{Plan, PlanWarning, PlannedStep, StepPlanStatus};
