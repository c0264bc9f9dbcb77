pub mod condition;
pub mod definition;
pub mod path;
pub mod template;

pub use condition::{Condition, ConditionError, ConditionScope, CONDITION_ROOTS};
pub use definition::{StepDefinition, WorkflowDefinition, WorkflowSchemaError};
pub use path::DataPath;
pub use template::{
    resolve_map, resolve_template, resolve_value, LocatedTemplateError, TemplateError,
    TemplateScope, TEMPLATE_ROOTS,
};
