use crate::execution::handlers::{StepContext, StepError, StepHandler, StepOutcome};
use crate::planning::plan::PlannedStep;
use serde_json::Value;

pub const EMIT_EVENT_STEP_TYPE: &str = "EmitEvent";

/// Writes one `Custom` event from `With.Message` and the optional `With.Data`
/// map. Touches no provider.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmitEventStep;

impl StepHandler for EmitEventStep {
    fn execute(
        &self,
        ctx: &mut StepContext<'_, '_>,
        step: &PlannedStep,
    ) -> Result<StepOutcome, StepError> {
        let message = step
            .param_str("Message")
            .map(str::trim)
            .filter(|message| !message.is_empty())
            .ok_or_else(|| StepError::new("`With.Message` must be a non-empty string"))?;
        let data = match step.param("Data") {
            None | Some(Value::Null) => None,
            Some(Value::Object(data)) => Some(data.clone()),
            Some(_) => return Err(StepError::new("`With.Data` must be a map")),
        };
        ctx.emit_event(message, data);
        Ok(StepOutcome::unchanged())
    }
}
