use lifecycle_engine::workflow::definition::WorkflowDefinition;
use serde_json::json;

#[test]
fn workflow_definition_module_normalizes_a_full_definition() {
    let definition = WorkflowDefinition::from_value(&json!({
        "Name": " Leaver - Standard ",
        "LifecycleEvent": "Leaver",
        "Version": "2",
        "Description": "Disable and archive",
        "Steps": [
            {"Name": "Disable", "Type": "DisableIdentity", "With": {"IdentityKey": "{{Request.IdentityKeys.Upn}}"}},
            {"Name": "Notify", "Type": "EmitEvent", "Condition": {"Exists": "Request.Actor"}}
        ],
        "OnFailureSteps": [
            {"Name": "Notify", "Type": "EmitEvent", "With": {"Message": "leaver failed"}}
        ]
    }))
    .expect("definition");

    assert_eq!(definition.name, "Leaver - Standard");
    assert_eq!(definition.version.as_deref(), Some("2"));
    assert_eq!(definition.steps.len(), 2);
    assert_eq!(definition.steps[0].step_type.as_str(), "DisableIdentity");
    assert!(definition.steps[0].condition.is_none());
    assert!(definition.steps[1].condition.is_some());
    assert!(definition.steps[1].with.is_empty());
    assert_eq!(definition.on_failure_steps[0].name, "Notify");
}

#[test]
fn workflow_definition_module_rejects_invalid_shapes() {
    let cases = [
        (
            json!({"Name": "W", "LifecycleEvent": "Joiner", "Steps": [], "Trigger": "cron"}),
            "Workflow",
        ),
        (
            json!({"Name": "", "LifecycleEvent": "Joiner", "Steps": []}),
            "Workflow.Name",
        ),
        (
            json!({"Name": "W", "LifecycleEvent": " ", "Steps": []}),
            "Workflow.LifecycleEvent",
        ),
        (
            json!({"Name": "W", "LifecycleEvent": "Joiner", "Steps": [{"Name": "a", "Type": ""}]}),
            "Workflow.Steps[0].Type",
        ),
        (
            json!({"Name": "W", "LifecycleEvent": "Joiner", "Steps": [
                {"Name": "a", "Type": "EmitEvent"},
                {"Name": "a", "Type": "EmitEvent"}
            ]}),
            "Workflow.Steps[1].Name",
        ),
        (
            json!({"Name": "W", "LifecycleEvent": "Joiner", "Steps": [], "OnFailureSteps": [
                {"Name": "x", "Type": "Emit Event"}
            ]}),
            "Workflow.OnFailureSteps[0].Type",
        ),
    ];
    for (workflow, expected_path) in cases {
        let err = WorkflowDefinition::from_value(&workflow).expect_err(expected_path);
        assert_eq!(err.path, expected_path);
    }
}

#[test]
fn workflow_definition_module_allows_the_same_name_across_lists() {
    let definition = WorkflowDefinition::from_value(&json!({
        "Name": "W",
        "LifecycleEvent": "Joiner",
        "Steps": [{"Name": "Notify", "Type": "EmitEvent"}],
        "OnFailureSteps": [{"Name": "Notify", "Type": "EmitEvent"}]
    }))
    .expect("definition");
    assert_eq!(definition.steps[0].name, definition.on_failure_steps[0].name);
}
