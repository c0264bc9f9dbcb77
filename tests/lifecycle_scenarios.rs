use lifecycle_engine::capabilities::registry::{StepMetadata, StepMetadataCatalog, StepMetadataRegistry};
use lifecycle_engine::capabilities::validator::{CapabilityError, CapabilityGap};
use lifecycle_engine::execution::{
    EventType, ExecutionEngine, ExecutionStatus, OnFailureStatus, StepHandlerRegistry, StepStatus,
};
use lifecycle_engine::planning::{export_plan, PlanBuilder, PlanError, StepPlanStatus};
use lifecycle_engine::providers::{Provider, ProviderSet};
use lifecycle_engine::request::LifecycleRequest;
use lifecycle_engine::steps::{builtin_catalog, register_builtin_handlers, BUILTIN_OWNER};
use serde_json::{json, Value};
use std::any::Any;
use std::sync::Arc;

struct ReadOnlyProvider;

impl Provider for ReadOnlyProvider {
    fn capabilities(&self) -> Vec<String> {
        vec!["X.Read".to_string()]
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn builtin_registry() -> StepMetadataRegistry {
    StepMetadataRegistry::new()
        .with_catalog(BUILTIN_OWNER, builtin_catalog())
        .expect("builtin")
}

fn builtin_providers() -> ProviderSet {
    let mut handlers = StepHandlerRegistry::new();
    register_builtin_handlers(&mut handlers).expect("handlers");
    ProviderSet::new().with_step_handlers(handlers)
}

fn joiner_request() -> LifecycleRequest {
    LifecycleRequest::builder("Joiner")
        .identity_key("EmployeeId", "1001")
        .desired("Department", "IT")
        .build()
        .expect("request")
}

fn joiner_workflow() -> Value {
    json!({
        "Name": "Joiner - Standard",
        "LifecycleEvent": "Joiner",
        "Steps": [{"Name": "Emit:Start", "Type": "EmitEvent", "With": {"Message": "Starting Joiner"}}]
    })
}

#[test]
fn scenario_a_zero_capability_workflow_runs_to_completion() {
    let registry = builtin_registry();
    let providers = builtin_providers();
    let plan = PlanBuilder::with_registry(&registry)
        .build(&joiner_workflow(), &joiner_request(), &providers)
        .expect("plan");
    assert_eq!(plan.steps().len(), 1);
    assert_eq!(plan.steps()[0].status(), StepPlanStatus::Run);

    let result = ExecutionEngine::default()
        .execute(&plan, &providers, None)
        .expect("execution");
    assert_eq!(result.status(), ExecutionStatus::Completed);
    assert_eq!(result.steps().len(), 1);
    assert_eq!(result.steps()[0].status, StepStatus::Completed);
    assert_eq!(result.events().len(), 1);
    assert_eq!(result.events()[0].message, "Starting Joiner");
    assert_eq!(result.correlation_id(), plan.correlation_id().as_str());
}

#[test]
fn scenario_b_missing_capability_fails_the_build() {
    let registry = StepMetadataRegistry::new()
        .with_catalog(
            "Directory",
            StepMetadataCatalog::from([(
                "EmitEvent".to_string(),
                StepMetadata::requiring(["X.Disable"]),
            )]),
        )
        .expect("catalog");
    let providers = ProviderSet::new()
        .with_provider("Directory", Arc::new(ReadOnlyProvider))
        .expect("provider");

    let err = PlanBuilder::with_registry(&registry)
        .build(&joiner_workflow(), &joiner_request(), &providers)
        .expect_err("gap");
    let PlanError::Capabilities(CapabilityError::MissingCapabilities(gap)) = err else {
        panic!("expected missing capabilities, got {err:?}");
    };
    assert_eq!(
        gap,
        CapabilityGap {
            missing: vec!["X.Disable".to_string()],
            affected_steps: vec!["Emit:Start".to_string()],
            available: vec!["X.Read".to_string()],
        }
    );
}

#[test]
fn scenario_c_false_condition_skips_without_invoking_the_handler() {
    let registry = builtin_registry();
    let providers = builtin_providers();
    let plan = PlanBuilder::with_registry(&registry)
        .build(
            &json!({
                "Name": "Joiner - Standard",
                "LifecycleEvent": "Joiner",
                "Steps": [
                    {"Name": "Emit:Start", "Type": "EmitEvent", "With": {"Message": "Starting Joiner"}},
                    {
                        "Name": "Emit:HR",
                        "Type": "EmitEvent",
                        "With": {"Message": "HR onboarding"},
                        "Condition": {"Equals": {"Path": "Request.DesiredState.Department", "Value": "HR"}}
                    }
                ]
            }),
            &joiner_request(),
            &providers,
        )
        .expect("plan");

    let result = ExecutionEngine::default()
        .execute(&plan, &providers, None)
        .expect("execution");
    assert_eq!(result.status(), ExecutionStatus::Completed);
    assert_eq!(result.steps()[1].status, StepStatus::Skipped);
    let skip_events = result
        .events()
        .iter()
        .filter(|event| event.event_type == EventType::StepSkipped)
        .count();
    assert_eq!(skip_events, 1);
    assert_eq!(result.events().len(), 2);
    assert!(result
        .events()
        .iter()
        .all(|event| event.message != "HR onboarding"));
}

#[test]
fn scenario_d_failure_runs_on_failure_steps_and_stays_failed() {
    let registry = builtin_registry();
    let providers = builtin_providers();
    let plan = PlanBuilder::with_registry(&registry)
        .build(
            &json!({
                "Name": "Joiner - Standard",
                "LifecycleEvent": "Joiner",
                "Steps": [
                    {"Name": "Emit:Broken", "Type": "EmitEvent", "With": {}},
                    {"Name": "Emit:Next", "Type": "EmitEvent", "With": {"Message": "never"}}
                ],
                "OnFailureSteps": [
                    {"Name": "Emit:Cleanup", "Type": "EmitEvent", "With": {"Message": "cleanup"}}
                ]
            }),
            &joiner_request(),
            &providers,
        )
        .expect("plan");

    let result = ExecutionEngine::default()
        .execute(&plan, &providers, None)
        .expect("execution");
    assert_eq!(result.status(), ExecutionStatus::Failed);
    assert_eq!(result.steps().len(), 1);
    assert_eq!(result.steps()[0].status, StepStatus::Failed);
    assert_eq!(result.on_failure().status, OnFailureStatus::Completed);
    assert_eq!(result.on_failure().steps.len(), 1);
    assert_eq!(result.on_failure().steps[0].status, StepStatus::Completed);
    assert!(result.events().iter().all(|event| event.message != "never"));
}

#[test]
fn scenario_e_passwords_are_redacted_at_every_output_boundary() {
    let registry = builtin_registry();
    let providers = builtin_providers();
    let plan = PlanBuilder::with_registry(&registry)
        .build(
            &json!({
                "Name": "Joiner - Standard",
                "LifecycleEvent": "Joiner",
                "Steps": [{
                    "Name": "Emit:Start",
                    "Type": "EmitEvent",
                    "With": {"Message": "Starting Joiner", "Data": {"Account": {"Password": "s3cr3t"}}}
                }]
            }),
            &joiner_request(),
            &providers,
        )
        .expect("plan");

    let exported = export_plan(&plan);
    assert_eq!(
        exported["plan"]["steps"][0]["with"]["Data"]["Account"]["Password"],
        "[REDACTED]"
    );

    let result = ExecutionEngine::default()
        .execute(&plan, &providers, None)
        .expect("execution");
    let data = result.events()[0].data.as_ref().expect("data");
    assert_eq!(data["Account"]["Password"], "[REDACTED]");
    assert!(!result.to_value().to_string().contains("s3cr3t"));

    // The plan itself keeps the resolved value for the handler.
    assert_eq!(
        plan.steps()[0].param("Data").expect("data")["Account"]["Password"],
        "s3cr3t"
    );
}

#[test]
fn fail_fast_records_exactly_the_steps_that_ran() {
    let registry = builtin_registry();
    let providers = builtin_providers();
    for failing in 0..4 {
        let steps = (0..4)
            .map(|index| {
                let with = if index == failing {
                    json!({})
                } else {
                    json!({"Message": format!("step {index}")})
                };
                json!({"Name": format!("Step{index}"), "Type": "EmitEvent", "With": with})
            })
            .collect::<Vec<_>>();
        let plan = PlanBuilder::with_registry(&registry)
            .build(
                &json!({"Name": "Joiner", "LifecycleEvent": "Joiner", "Steps": steps}),
                &joiner_request(),
                &providers,
            )
            .expect("plan");
        let result = ExecutionEngine::default()
            .execute(&plan, &providers, None)
            .expect("execution");
        assert_eq!(result.steps().len(), failing + 1);
        assert_eq!(result.status(), ExecutionStatus::Failed);
        assert_eq!(result.on_failure().status, OnFailureStatus::Completed);
    }
}
