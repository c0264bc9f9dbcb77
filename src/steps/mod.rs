pub mod emit_event;

pub use emit_event::{EmitEventStep, EMIT_EVENT_STEP_TYPE};

use crate::capabilities::registry::{StepMetadata, StepMetadataCatalog};
use crate::execution::handlers::{HandlerRegistryError, StepHandlerRegistry};
use std::sync::Arc;

pub const BUILTIN_OWNER: &str = "Builtin";

/// Metadata for the steps that ship with the engine.
pub fn builtin_catalog() -> StepMetadataCatalog {
    StepMetadataCatalog::from([(
        EMIT_EVENT_STEP_TYPE.to_string(),
        StepMetadata {
            required_capabilities: Vec::new(),
            description: Some("Emit a custom audit event".to_string()),
        },
    )])
}

pub fn register_builtin_handlers(
    registry: &mut StepHandlerRegistry,
) -> Result<(), HandlerRegistryError> {
    registry.register(EMIT_EVENT_STEP_TYPE, Arc::new(EmitEventStep))?;
    Ok(())
}
